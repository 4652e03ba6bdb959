//! Message descriptors and the descriptor table.
//!
//! A [`Schema`] is produced by an external schema compiler and loaded once at
//! start-up, either from a YAML/JSON descriptor table or built in code. It is
//! validated on load and immutable afterwards.
//!
//! ```yaml
//! messages:
//!   - name: test.Person
//!     fields:
//!       - { name: name, number: 1, type: string }
//!       - { name: ids, number: 2, type: int32, modifier: repeated, packed: false }
//!       - { name: labels, number: 3, type: string, modifier: map, key_type: string }
//!       - { name: address, number: 4, type: message, message_type: test.Address }
//!   - name: test.Address
//!     fields:
//!       - { name: city, number: 1, type: string }
//! ```

use crate::error::{Result, SchemaError};
use crate::field::{FieldDescriptor, FieldModifier, FieldType, MAX_FIELD_NUMBER};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;
use tracing::debug;

/// Describes a message type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageDescriptor {
    /// Fully qualified message name (e.g., "mypackage.MyMessage")
    pub name: String,
    /// Fields in definition order
    #[serde(default)]
    pub fields: Vec<FieldDescriptor>,
    #[serde(skip)]
    by_number: HashMap<u32, usize>,
    #[serde(skip)]
    by_name: HashMap<String, usize>,
}

impl MessageDescriptor {
    pub fn new(name: impl Into<String>, fields: Vec<FieldDescriptor>) -> Self {
        let mut descriptor = Self {
            name: name.into(),
            fields,
            by_number: HashMap::new(),
            by_name: HashMap::new(),
        };
        descriptor.build_field_maps();
        descriptor
    }

    /// Get a field descriptor by number.
    pub fn field(&self, number: u32) -> Option<&FieldDescriptor> {
        self.by_number.get(&number).map(|idx| &self.fields[*idx])
    }

    /// Get a field descriptor by name.
    pub fn get_field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.by_name.get(name).map(|idx| &self.fields[*idx])
    }

    /// Members of oneof group `index`, in definition order.
    pub fn oneof_members(&self, index: u32) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields
            .iter()
            .filter(move |field| field.oneof == Some(index))
    }

    fn build_field_maps(&mut self) {
        self.by_number = self
            .fields
            .iter()
            .enumerate()
            .map(|(idx, field)| (field.number, idx))
            .collect();
        self.by_name = self
            .fields
            .iter()
            .enumerate()
            .map(|(idx, field)| (field.name.clone(), idx))
            .collect();
    }

    fn validate(&self, schema: &Schema) -> Result<()> {
        let mut numbers = HashSet::new();
        let mut names = HashSet::new();

        for field in &self.fields {
            if field.number == 0 || field.number > MAX_FIELD_NUMBER {
                return Err(SchemaError::InvalidFieldNumber {
                    message: self.name.clone(),
                    field: field.name.clone(),
                    number: field.number,
                });
            }
            if !numbers.insert(field.number) {
                return Err(SchemaError::DuplicateFieldNumber {
                    message: self.name.clone(),
                    number: field.number,
                });
            }
            if !names.insert(field.name.as_str()) {
                return Err(SchemaError::DuplicateFieldName {
                    message: self.name.clone(),
                    field: field.name.clone(),
                });
            }

            if field.field_type.is_message() {
                let target =
                    field
                        .message_type
                        .as_deref()
                        .ok_or_else(|| SchemaError::MissingMessageType {
                            message: self.name.clone(),
                            field: field.name.clone(),
                        })?;
                if schema.get_message(target).is_none() {
                    return Err(SchemaError::UnknownMessageType {
                        message: self.name.clone(),
                        field: field.name.clone(),
                        target: target.to_string(),
                    });
                }
            }

            if field.modifier == FieldModifier::Map {
                match field.key_type {
                    Some(key) if key.is_valid_map_key() => {}
                    key => {
                        return Err(SchemaError::InvalidMapKey {
                            message: self.name.clone(),
                            field: field.name.clone(),
                            key,
                        })
                    }
                }
                if field.field_type == FieldType::Group {
                    return Err(SchemaError::InvalidMapValue {
                        message: self.name.clone(),
                        field: field.name.clone(),
                        value: field.field_type,
                    });
                }
            }

            if field.oneof.is_some() && field.modifier != FieldModifier::Singular {
                return Err(SchemaError::OneofNotAllowed {
                    message: self.name.clone(),
                    field: field.name.clone(),
                    modifier: if field.is_map() { "a map" } else { "repeated" },
                });
            }

            if field.packed == Some(true)
                && !(field.modifier == FieldModifier::Repeated && field.field_type.is_packable())
            {
                return Err(SchemaError::PackedNotAllowed {
                    message: self.name.clone(),
                    field: field.name.clone(),
                });
            }
        }

        Ok(())
    }
}

/// Represents a validated descriptor table containing multiple message types.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Schema {
    messages: Vec<MessageDescriptor>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl Schema {
    /// Build and validate a schema from message descriptors.
    pub fn new(messages: Vec<MessageDescriptor>) -> Result<Self> {
        let mut schema = Self {
            messages,
            index: HashMap::new(),
        };
        schema.build()?;
        Ok(schema)
    }

    /// Load a descriptor table from a YAML or JSON file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse a descriptor table from a YAML string. JSON input is accepted
    /// as well, since YAML is a superset of it.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let mut schema: Schema = serde_yaml::from_str(yaml)?;
        schema.build()?;
        Ok(schema)
    }

    /// Index the table and validate every message.
    fn build(&mut self) -> Result<()> {
        self.index.clear();
        for (idx, message) in self.messages.iter_mut().enumerate() {
            message.build_field_maps();
            if self.index.insert(message.name.clone(), idx).is_some() {
                return Err(SchemaError::DuplicateMessage(message.name.clone()));
            }
        }
        for message in &self.messages {
            message.validate(self)?;
        }
        debug!(messages = self.messages.len(), "loaded descriptor table");
        Ok(())
    }

    /// Get a message descriptor by name.
    pub fn get_message(&self, name: &str) -> Option<&MessageDescriptor> {
        self.index.get(name).map(|idx| &self.messages[*idx])
    }

    /// Position of a message in [`Schema::messages`].
    pub fn message_index(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn messages(&self) -> &[MessageDescriptor] {
        &self.messages
    }

    /// List all message type names in the schema.
    pub fn list_messages(&self) -> Vec<String> {
        self.messages.iter().map(|m| m.name.clone()).collect()
    }
}
