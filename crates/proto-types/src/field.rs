//! Field-level descriptor types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Largest field number protobuf allows (2^29 - 1).
pub const MAX_FIELD_NUMBER: u32 = (1 << 29) - 1;

/// The 3-bit wire type carried in the low bits of every tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WireType {
    Varint,
    Fixed64,
    LengthDelimited,
    StartGroup,
    EndGroup,
    Fixed32,
}

impl WireType {
    pub fn from_bits(bits: u32) -> Option<WireType> {
        match bits {
            0 => Some(WireType::Varint),
            1 => Some(WireType::Fixed64),
            2 => Some(WireType::LengthDelimited),
            3 => Some(WireType::StartGroup),
            4 => Some(WireType::EndGroup),
            5 => Some(WireType::Fixed32),
            _ => None,
        }
    }

    pub fn bits(self) -> u32 {
        match self {
            WireType::Varint => 0,
            WireType::Fixed64 => 1,
            WireType::LengthDelimited => 2,
            WireType::StartGroup => 3,
            WireType::EndGroup => 4,
            WireType::Fixed32 => 5,
        }
    }
}

impl fmt::Display for WireType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WireType::Varint => "varint",
            WireType::Fixed64 => "fixed64",
            WireType::LengthDelimited => "length-delimited",
            WireType::StartGroup => "start-group",
            WireType::EndGroup => "end-group",
            WireType::Fixed32 => "fixed32",
        };
        f.write_str(name)
    }
}

/// Protobuf field type enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Bool,
    String,
    Bytes,
    Double,
    Float,
    Int32,
    Uint32,
    Sint32,
    Fixed32,
    Sfixed32,
    Int64,
    Uint64,
    Sint64,
    Fixed64,
    Sfixed64,
    Enum,
    Message,
    Group,
}

impl FieldType {
    /// Wire type a single value of this type is written with.
    pub fn wire_type(self) -> WireType {
        match self {
            FieldType::Bool
            | FieldType::Int32
            | FieldType::Uint32
            | FieldType::Sint32
            | FieldType::Int64
            | FieldType::Uint64
            | FieldType::Sint64
            | FieldType::Enum => WireType::Varint,
            FieldType::Fixed32 | FieldType::Sfixed32 | FieldType::Float => WireType::Fixed32,
            FieldType::Fixed64 | FieldType::Sfixed64 | FieldType::Double => WireType::Fixed64,
            FieldType::String | FieldType::Bytes | FieldType::Message => {
                WireType::LengthDelimited
            }
            FieldType::Group => WireType::StartGroup,
        }
    }

    /// Varint values of this type are zig-zag transformed.
    pub fn is_zigzag(self) -> bool {
        matches!(self, FieldType::Sint32 | FieldType::Sint64)
    }

    /// Scalars whose repeated form may use packed encoding.
    pub fn is_packable(self) -> bool {
        matches!(
            self.wire_type(),
            WireType::Varint | WireType::Fixed32 | WireType::Fixed64
        )
    }

    pub fn is_message(self) -> bool {
        matches!(self, FieldType::Message | FieldType::Group)
    }

    /// Types allowed as map keys: integer scalars and strings.
    pub fn is_valid_map_key(self) -> bool {
        matches!(
            self,
            FieldType::Int32
                | FieldType::Uint32
                | FieldType::Sint32
                | FieldType::Fixed32
                | FieldType::Sfixed32
                | FieldType::Int64
                | FieldType::Uint64
                | FieldType::Sint64
                | FieldType::Fixed64
                | FieldType::Sfixed64
                | FieldType::String
        )
    }

    pub fn type_name(self) -> &'static str {
        match self {
            FieldType::Bool => "bool",
            FieldType::String => "string",
            FieldType::Bytes => "bytes",
            FieldType::Double => "double",
            FieldType::Float => "float",
            FieldType::Int32 => "int32",
            FieldType::Uint32 => "uint32",
            FieldType::Sint32 => "sint32",
            FieldType::Fixed32 => "fixed32",
            FieldType::Sfixed32 => "sfixed32",
            FieldType::Int64 => "int64",
            FieldType::Uint64 => "uint64",
            FieldType::Sint64 => "sint64",
            FieldType::Fixed64 => "fixed64",
            FieldType::Sfixed64 => "sfixed64",
            FieldType::Enum => "enum",
            FieldType::Message => "message",
            FieldType::Group => "group",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

/// Cardinality of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldModifier {
    #[default]
    Singular,
    Repeated,
    Map,
}

/// Describes a single field in a message.
///
/// For `Map` fields, `field_type` is the value type and `key_type` the key
/// type; `message_type` names the value message when the value is a message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    /// Field name
    pub name: String,
    /// Field number (tag)
    pub number: u32,
    /// Field type
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub modifier: FieldModifier,
    /// Fully qualified nested message name for MESSAGE/GROUP values
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_type: Option<String>,
    /// Key type of a MAP field
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_type: Option<FieldType>,
    /// Packed encoding for repeated scalars; unset means packed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub packed: Option<bool>,
    /// Index of the oneof group this field belongs to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oneof: Option<u32>,
    /// Declared enum numbers, for ENUM fields
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<i32>>,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, number: u32, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            number,
            field_type,
            modifier: FieldModifier::Singular,
            message_type: None,
            key_type: None,
            packed: None,
            oneof: None,
            enum_values: None,
        }
    }

    /// A MESSAGE field pointing at `message_type`.
    pub fn message(name: impl Into<String>, number: u32, message_type: impl Into<String>) -> Self {
        Self::new(name, number, FieldType::Message).with_message_type(message_type)
    }

    /// A MAP field from `key_type` to `value_type`.
    pub fn map(
        name: impl Into<String>,
        number: u32,
        key_type: FieldType,
        value_type: FieldType,
    ) -> Self {
        let mut field = Self::new(name, number, value_type);
        field.modifier = FieldModifier::Map;
        field.key_type = Some(key_type);
        field
    }

    pub fn repeated(mut self) -> Self {
        self.modifier = FieldModifier::Repeated;
        self
    }

    pub fn packed(mut self, packed: bool) -> Self {
        self.packed = Some(packed);
        self
    }

    pub fn with_message_type(mut self, message_type: impl Into<String>) -> Self {
        self.message_type = Some(message_type.into());
        self
    }

    pub fn in_oneof(mut self, index: u32) -> Self {
        self.oneof = Some(index);
        self
    }

    pub fn with_enum_values(mut self, values: Vec<i32>) -> Self {
        self.enum_values = Some(values);
        self
    }

    pub fn is_repeated(&self) -> bool {
        self.modifier == FieldModifier::Repeated
    }

    pub fn is_map(&self) -> bool {
        self.modifier == FieldModifier::Map
    }

    /// Whether the encoder writes this field as a packed run.
    pub fn is_packed(&self) -> bool {
        self.is_repeated() && self.field_type.is_packable() && self.packed.unwrap_or(true)
    }

    /// Enum fields without a declared value list accept every number.
    pub fn is_known_enum_value(&self, value: i32) -> bool {
        match &self.enum_values {
            Some(values) => values.contains(&value),
            None => true,
        }
    }
}
