use proto_types::{FieldType, SchemaError, WireType};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Malformed varint: no terminating byte within 10 bytes")]
    MalformedVarint,

    #[error("Invalid wire type {0}")]
    InvalidWireType(u32),

    #[error("Invalid field number {0}")]
    InvalidFieldNumber(u64),

    #[error("Truncated message")]
    TruncatedMessage,

    #[error("Field {field} in {message}: {field_type} cannot be read from {actual} wire type")]
    WireTypeMismatch {
        message: String,
        field: u32,
        field_type: FieldType,
        actual: WireType,
    },

    #[error("Message nesting exceeds depth limit of {limit}")]
    MessageTooDeep { limit: usize },

    #[error("Field {field} in {message} expects {expected}, got {actual}")]
    FieldValueTypeMismatch {
        message: String,
        field: u32,
        expected: String,
        actual: &'static str,
    },

    #[error("Field {field} in {message} is not valid UTF-8")]
    InvalidUtf8 { message: String, field: u32 },

    #[error("Unexpected END_GROUP for field {0}")]
    UnexpectedEndGroup(u32),

    #[error("Message type not found: {0}")]
    MessageTypeNotFound(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Schema(#[from] SchemaError),
}

pub type Result<T> = std::result::Result<T, CodecError>;
