//! Error types for proto-types crate.

use crate::FieldType;
use thiserror::Error;

/// Errors raised while loading or validating a descriptor table, or while
/// storing a value through a field descriptor.
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Failed to read schema file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse descriptor table: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Duplicate message type: {0}")]
    DuplicateMessage(String),

    #[error("Duplicate field number {number} in message {message}")]
    DuplicateFieldNumber { message: String, number: u32 },

    #[error("Duplicate field name '{field}' in message {message}")]
    DuplicateFieldName { message: String, field: String },

    #[error("Field '{field}' in message {message} has invalid number {number}")]
    InvalidFieldNumber {
        message: String,
        field: String,
        number: u32,
    },

    #[error("Field '{field}' in message {message} needs a message_type")]
    MissingMessageType { message: String, field: String },

    #[error("Field '{field}' in message {message} references unknown message type {target}")]
    UnknownMessageType {
        message: String,
        field: String,
        target: String,
    },

    #[error("Map field '{field}' in message {message} has invalid key type {key:?}")]
    InvalidMapKey {
        message: String,
        field: String,
        key: Option<FieldType>,
    },

    #[error("Map field '{field}' in message {message} cannot hold {value} values")]
    InvalidMapValue {
        message: String,
        field: String,
        value: FieldType,
    },

    #[error("Field '{field}' in message {message} cannot be packed")]
    PackedNotAllowed { message: String, field: String },

    #[error("Field '{field}' in message {message} is {modifier} and cannot belong to a oneof")]
    OneofNotAllowed {
        message: String,
        field: String,
        modifier: &'static str,
    },

    #[error("Message type not found: {0}")]
    MessageTypeNotFound(String),

    #[error("Field '{field}' not found in message {message}")]
    FieldNotFound { message: String, field: String },

    #[error("Field '{field}' expects {expected}, got {actual}")]
    FieldValueTypeMismatch {
        field: String,
        expected: String,
        actual: &'static str,
    },
}

/// Result type alias for proto-types operations.
pub type Result<T> = std::result::Result<T, SchemaError>;
