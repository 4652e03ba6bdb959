//! Protobuf wire codec driven by a runtime descriptor table.
//!
//! Messages are encoded and decoded against a [`proto_types::Schema`] loaded
//! at start-up rather than against generated code. The layers, bottom-up:
//!
//! - [`varint`] - base-128 varints and zig-zag transforms
//! - [`reader`] / [`writer`] - wire primitives over `bytes` buffers
//! - [`plan`] - per-field strategies resolved once per schema
//! - [`codec`] - [`MessageCodec`], the message-level encoder and decoder
//! - [`inspect`] - schema-less listing of an encoded buffer
//!
//! Output is byte-compatible with other protobuf implementations; see the
//! interop tests for cross-checks against the `protobuf` crate.

pub mod codec;
pub mod config;
pub mod error;
pub mod inspect;
pub mod plan;
pub mod reader;
pub mod varint;
pub mod writer;

pub use codec::MessageCodec;
pub use config::{CodecConfig, UnknownFieldPolicy, DEFAULT_MAX_DEPTH};
pub use error::{CodecError, Result};
pub use inspect::{inspect, Listing, RawField, RawValue};
pub use reader::{Tag, WireReader};
pub use writer::{WireValue, WireWriter};
