//! Codec configuration.

use crate::error::{CodecError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Nesting limit used when none is configured.
pub const DEFAULT_MAX_DEPTH: usize = 100;

fn default_max_depth() -> usize {
    DEFAULT_MAX_DEPTH
}

/// What the decoder does with fields the schema does not declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownFieldPolicy {
    /// Keep the raw bytes and write them back after the known fields.
    #[default]
    Preserve,
    /// Drop them on decode and on encode.
    Discard,
}

/// Settings shared by every encode and decode call of a
/// [`MessageCodec`](crate::MessageCodec).
///
/// ```yaml
/// max_depth: 64
/// unknown_fields: discard
/// skip_default_scalars: true
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodecConfig {
    /// Deepest allowed nesting of messages and groups
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    #[serde(default)]
    pub unknown_fields: UnknownFieldPolicy,

    /// Omit singular scalars equal to their type default on encode
    /// (implicit presence). Oneof members are always written.
    #[serde(default)]
    pub skip_default_scalars: bool,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            unknown_fields: UnknownFieldPolicy::default(),
            skip_default_scalars: false,
        }
    }
}

impl CodecConfig {
    /// Load configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| CodecError::Config(format!("{}: {e}", path.display())))?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: CodecConfig =
            serde_yaml::from_str(yaml).map_err(|e| CodecError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_depth == 0 {
            return Err(CodecError::Config(
                "max_depth must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = CodecConfig::default();
        assert_eq!(config.max_depth, 100);
        assert_eq!(config.unknown_fields, UnknownFieldPolicy::Preserve);
        assert!(!config.skip_default_scalars);
        assert_eq!(CodecConfig::from_yaml("{}").unwrap(), config);
    }

    #[test]
    fn test_from_yaml() {
        let config = CodecConfig::from_yaml(
            "max_depth: 8\nunknown_fields: discard\nskip_default_scalars: true\n",
        )
        .unwrap();
        assert_eq!(config.max_depth, 8);
        assert_eq!(config.unknown_fields, UnknownFieldPolicy::Discard);
        assert!(config.skip_default_scalars);
    }

    #[test]
    fn test_invalid_config() {
        assert!(matches!(
            CodecConfig::from_yaml("max_depth: 0"),
            Err(CodecError::Config(_))
        ));
        assert!(matches!(
            CodecConfig::from_yaml("unknown_fields: keep"),
            Err(CodecError::Config(_))
        ));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "max_depth: 3").unwrap();
        let config = CodecConfig::from_file(file.path()).unwrap();
        assert_eq!(config.max_depth, 3);

        let missing = CodecConfig::from_file("/nonexistent/codec.yaml");
        assert!(matches!(missing, Err(CodecError::Config(_))));
    }
}
