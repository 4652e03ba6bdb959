//! Descriptor tables and runtime values for bridge-proto.
//!
//! This crate holds everything the codec and its callers share:
//!
//! - [`field`] / [`schema`] - immutable descriptor tables produced by an external
//!   schema compiler and loaded once at start-up
//! - [`wide`] - 64-bit integers as two 32-bit halves, for hosts without native
//!   64-bit integers
//! - [`value`] / [`message`] - field values and message instances
//! - [`defaults`] - shared, frozen default values for unset fields
//!
//! # Example
//!
//! ```
//! use proto_types::{default_for, FieldDescriptor, FieldType, Message};
//!
//! let ids = FieldDescriptor::new("ids", 2, FieldType::Int32).repeated();
//! let mut message = Message::new();
//! assert!(message.get_or_default(&ids).unwrap().is_empty_collection());
//!
//! message.append(2, 300).unwrap();
//! assert!(default_for(&ids).unwrap().is_empty_collection());
//! ```

pub mod defaults;
pub mod error;
pub mod field;
pub mod message;
pub mod schema;
pub mod value;
pub mod wide;

pub use defaults::{default_for, default_for_type};
pub use error::{Result, SchemaError};
pub use field::{FieldDescriptor, FieldModifier, FieldType, WireType, MAX_FIELD_NUMBER};
pub use message::{Message, UnknownField};
pub use schema::{MessageDescriptor, Schema};
pub use value::{FieldValue, MapKey, MapValue};
pub use wide::{Signedness, WideInteger};
