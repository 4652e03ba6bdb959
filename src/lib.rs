//! bridge-proto
//!
//! Command-line front end for the `proto-codec` wire codec. The codec itself
//! lives in the workspace crates:
//!
//! - `proto_types` - descriptors, field values, wide integers and shared defaults
//! - `proto_codec` - varints, wire reader/writer and the message codec
//!
//! # CLI Usage
//!
//! ```bash
//! # Dump the raw tags of a payload without a schema
//! bridge-proto inspect --input payload.bin
//!
//! # List the message types of a descriptor table
//! bridge-proto schema --schema schema.yaml
//!
//! # Decode a base64 payload as test.Person
//! bridge-proto decode --schema schema.yaml --message-type test.Person \
//!   --input payload.b64 --base64
//!
//! # Decode and encode again, dropping unknown fields via config
//! bridge-proto --config codec.yaml reencode --schema schema.yaml \
//!   --message-type test.Person --input payload.bin --output clean.bin
//! ```

use anyhow::Context;
use clap::Parser;
use proto_codec::CodecConfig;
use std::path::PathBuf;

pub mod commands;
pub mod render;

/// Codec settings shared by every subcommand.
#[derive(Parser, Clone, Debug, Default)]
pub struct CodecOpts {
    /// YAML file with codec settings (max_depth, unknown_fields, skip_default_scalars)
    #[arg(long, global = true, value_name = "PATH", env = "BRIDGE_PROTO_CONFIG")]
    pub config: Option<PathBuf>,

    /// Maximum nesting depth of messages and groups (overrides the config file)
    #[arg(long, global = true)]
    pub max_depth: Option<usize>,
}

impl CodecOpts {
    /// Resolve the effective codec configuration: file values first, then
    /// command-line overrides.
    pub fn load_config(&self) -> anyhow::Result<CodecConfig> {
        let mut config = match &self.config {
            Some(path) => CodecConfig::from_file(path)
                .with_context(|| format!("Failed to load codec config from {path:?}"))?,
            None => CodecConfig::default(),
        };
        if let Some(max_depth) = self.max_depth {
            config.max_depth = max_depth;
        }
        config.validate().context("Invalid codec config")?;
        Ok(config)
    }
}

/// Where to read an encoded payload from.
#[derive(Parser, Clone, Debug)]
pub struct InputOpts {
    /// File holding the encoded message
    #[arg(long, value_name = "PATH")]
    pub input: PathBuf,

    /// Treat the input file as base64 text
    #[arg(long)]
    pub base64: bool,
}

/// Descriptor table and message type to decode against.
#[derive(Parser, Clone, Debug)]
pub struct MessageOpts {
    /// YAML or JSON descriptor table
    #[arg(long, value_name = "PATH")]
    pub schema: PathBuf,

    /// Fully qualified message type name
    #[arg(long)]
    pub message_type: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proto_codec::UnknownFieldPolicy;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_config_defaults() {
        let config = CodecOpts::default().load_config().unwrap();
        assert_eq!(config, CodecConfig::default());
    }

    #[test]
    fn test_load_config_override() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "max_depth: 8\nunknown_fields: discard").unwrap();

        let opts = CodecOpts {
            config: Some(file.path().to_path_buf()),
            max_depth: Some(16),
        };
        let config = opts.load_config().unwrap();
        assert_eq!(config.max_depth, 16);
        assert_eq!(config.unknown_fields, UnknownFieldPolicy::Discard);
    }

    #[test]
    fn test_load_config_rejects_zero_depth() {
        let opts = CodecOpts {
            config: None,
            max_depth: Some(0),
        };
        assert!(opts.load_config().is_err());
    }
}
