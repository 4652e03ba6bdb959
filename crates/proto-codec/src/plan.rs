//! Per-field encode/decode strategies, resolved once per schema.
//!
//! [`MessageCodec::new`](crate::MessageCodec::new) turns every field
//! descriptor into a [`FieldPlan`]: a [`ScalarCodec`] (or a resolved nested
//! message index) plus the field's shape. The hot encode/decode loops then
//! dispatch on these closed enums without consulting the descriptor table.

use crate::error::{CodecError, Result};
use crate::reader::WireReader;
use crate::varint::{zigzag_decode32, zigzag_decode64, zigzag_encode32, zigzag_encode64};
use crate::writer::WireValue;
use bytes::Bytes;
use proto_types::{
    FieldDescriptor, FieldModifier, FieldType, FieldValue, MessageDescriptor, Schema, Signedness,
    WideInteger, WireType,
};
use std::collections::HashMap;
use std::sync::Arc;

/// Conversion between one scalar field type and its wire form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarCodec {
    Bool,
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
    Float,
    Double,
    Enum,
    String,
    Bytes,
}

impl ScalarCodec {
    /// `None` for MESSAGE and GROUP, which are not scalars.
    pub fn for_type(field_type: FieldType) -> Option<ScalarCodec> {
        let codec = match field_type {
            FieldType::Bool => ScalarCodec::Bool,
            FieldType::Int32 => ScalarCodec::Int32,
            FieldType::Uint32 => ScalarCodec::Uint32,
            FieldType::Sint32 => ScalarCodec::Sint32,
            FieldType::Fixed32 => ScalarCodec::Fixed32,
            FieldType::Sfixed32 => ScalarCodec::Sfixed32,
            FieldType::Int64 => ScalarCodec::Int64,
            FieldType::Uint64 => ScalarCodec::Uint64,
            FieldType::Sint64 => ScalarCodec::Sint64,
            FieldType::Fixed64 => ScalarCodec::Fixed64,
            FieldType::Sfixed64 => ScalarCodec::Sfixed64,
            FieldType::Float => ScalarCodec::Float,
            FieldType::Double => ScalarCodec::Double,
            FieldType::Enum => ScalarCodec::Enum,
            FieldType::String => ScalarCodec::String,
            FieldType::Bytes => ScalarCodec::Bytes,
            FieldType::Message | FieldType::Group => return None,
        };
        Some(codec)
    }

    pub fn field_type(self) -> FieldType {
        match self {
            ScalarCodec::Bool => FieldType::Bool,
            ScalarCodec::Int32 => FieldType::Int32,
            ScalarCodec::Uint32 => FieldType::Uint32,
            ScalarCodec::Sint32 => FieldType::Sint32,
            ScalarCodec::Fixed32 => FieldType::Fixed32,
            ScalarCodec::Sfixed32 => FieldType::Sfixed32,
            ScalarCodec::Int64 => FieldType::Int64,
            ScalarCodec::Uint64 => FieldType::Uint64,
            ScalarCodec::Sint64 => FieldType::Sint64,
            ScalarCodec::Fixed64 => FieldType::Fixed64,
            ScalarCodec::Sfixed64 => FieldType::Sfixed64,
            ScalarCodec::Float => FieldType::Float,
            ScalarCodec::Double => FieldType::Double,
            ScalarCodec::Enum => FieldType::Enum,
            ScalarCodec::String => FieldType::String,
            ScalarCodec::Bytes => FieldType::Bytes,
        }
    }

    /// Wire type the encoder writes.
    pub fn wire_type(self) -> WireType {
        self.field_type().wire_type()
    }

    pub fn is_packable(self) -> bool {
        self.wire_type() != WireType::LengthDelimited
    }

    fn is_integer(self) -> bool {
        !matches!(
            self,
            ScalarCodec::Float | ScalarCodec::Double | ScalarCodec::String | ScalarCodec::Bytes
        )
    }

    /// Wire types the decoder reads a single value from. Integer kinds take
    /// any numeric wire type; floats take either fixed width.
    pub fn accepts(self, wire_type: WireType) -> bool {
        match wire_type {
            WireType::Varint => self.is_integer(),
            WireType::Fixed32 | WireType::Fixed64 => self.is_packable(),
            WireType::LengthDelimited => !self.is_packable(),
            WireType::StartGroup | WireType::EndGroup => false,
        }
    }

    /// Wire form of `value`, or `None` when the value's variant does not
    /// belong to this field type.
    pub fn to_wire(self, value: &FieldValue) -> Option<WireValue<'_>> {
        let wire = match (self, value) {
            (ScalarCodec::Bool, FieldValue::Bool(b)) => WireValue::Varint(u64::from(*b)),
            // negative values are sign-extended to ten bytes
            (ScalarCodec::Int32, FieldValue::Int32(v)) => WireValue::Varint(i64::from(*v) as u64),
            (ScalarCodec::Enum, FieldValue::Enum(v)) => WireValue::Varint(i64::from(*v) as u64),
            (ScalarCodec::Uint32, FieldValue::Uint32(v)) => WireValue::Varint(u64::from(*v)),
            (ScalarCodec::Sint32, FieldValue::Int32(v)) => {
                WireValue::Varint(u64::from(zigzag_encode32(*v)))
            }
            (ScalarCodec::Fixed32, FieldValue::Uint32(v)) => WireValue::Fixed32(*v),
            (ScalarCodec::Sfixed32, FieldValue::Int32(v)) => WireValue::Fixed32(*v as u32),
            (ScalarCodec::Int64, FieldValue::Wide(w)) if w.is_signed() => {
                WireValue::Varint(w.to_bits())
            }
            (ScalarCodec::Uint64, FieldValue::Wide(w)) if !w.is_signed() => {
                WireValue::Varint(w.to_bits())
            }
            (ScalarCodec::Sint64, FieldValue::Wide(w)) if w.is_signed() => {
                WireValue::Varint(zigzag_encode64(w.to_i64()))
            }
            (ScalarCodec::Fixed64, FieldValue::Wide(w)) if !w.is_signed() => {
                WireValue::Fixed64(w.to_bits())
            }
            (ScalarCodec::Sfixed64, FieldValue::Wide(w)) if w.is_signed() => {
                WireValue::Fixed64(w.to_bits())
            }
            (ScalarCodec::Float, FieldValue::Float(v)) => WireValue::Fixed32(v.to_bits()),
            (ScalarCodec::Double, FieldValue::Double(v)) => WireValue::Fixed64(v.to_bits()),
            (ScalarCodec::String, FieldValue::String(s)) => {
                WireValue::LengthDelimited(s.as_bytes())
            }
            (ScalarCodec::Bytes, FieldValue::Bytes(b)) => WireValue::LengthDelimited(b),
            _ => return None,
        };
        Some(wire)
    }

    /// Read one value written with `wire_type`, which must satisfy
    /// [`accepts`](Self::accepts).
    ///
    /// Returns `Ok(None)` when the bytes are not a value of this type, which
    /// for an accepted wire type only happens to STRING payloads that are not
    /// UTF-8. The caller attaches the field context to the error.
    pub fn read(
        self,
        reader: &mut WireReader,
        wire_type: WireType,
    ) -> Result<Option<FieldValue>> {
        if wire_type == WireType::LengthDelimited {
            let payload = reader.read_length_delimited()?;
            return Ok(self.decode_payload(payload));
        }
        let raw = match wire_type {
            WireType::Fixed32 => u64::from(reader.read_fixed32()?),
            WireType::Fixed64 => reader.read_fixed64()?,
            _ => reader.read_varint()?,
        };
        Ok(self.decode_raw(raw, wire_type))
    }

    fn decode_payload(self, payload: Bytes) -> Option<FieldValue> {
        match self {
            ScalarCodec::String => {
                let text = std::str::from_utf8(&payload).ok()?;
                Some(FieldValue::String(Arc::from(text)))
            }
            ScalarCodec::Bytes => Some(FieldValue::Bytes(payload)),
            _ => None,
        }
    }

    fn decode_raw(self, raw: u64, wire_type: WireType) -> Option<FieldValue> {
        let varint = wire_type == WireType::Varint;
        // a fixed32 payload read into a 64-bit signed field keeps its sign
        let signed64 = if wire_type == WireType::Fixed32 {
            raw as u32 as i32 as i64 as u64
        } else {
            raw
        };
        let value = match self {
            ScalarCodec::Bool => FieldValue::Bool(raw != 0),
            ScalarCodec::Int32 | ScalarCodec::Sfixed32 => FieldValue::Int32(raw as i32),
            ScalarCodec::Sint32 if varint => FieldValue::Int32(zigzag_decode32(raw as u32)),
            ScalarCodec::Sint32 => FieldValue::Int32(raw as i32),
            ScalarCodec::Uint32 | ScalarCodec::Fixed32 => FieldValue::Uint32(raw as u32),
            ScalarCodec::Int64 | ScalarCodec::Sfixed64 => {
                FieldValue::Wide(WideInteger::from_bits(signed64, Signedness::Signed))
            }
            ScalarCodec::Sint64 if varint => {
                FieldValue::Wide(WideInteger::from_i64(zigzag_decode64(raw)))
            }
            ScalarCodec::Sint64 => {
                FieldValue::Wide(WideInteger::from_bits(signed64, Signedness::Signed))
            }
            ScalarCodec::Uint64 | ScalarCodec::Fixed64 => {
                FieldValue::Wide(WideInteger::from_bits(raw, Signedness::Unsigned))
            }
            ScalarCodec::Float if wire_type == WireType::Fixed64 => {
                FieldValue::Float(f64::from_bits(raw) as f32)
            }
            ScalarCodec::Float => FieldValue::Float(f32::from_bits(raw as u32)),
            ScalarCodec::Double if wire_type == WireType::Fixed32 => {
                FieldValue::Double(f64::from(f32::from_bits(raw as u32)))
            }
            ScalarCodec::Double => FieldValue::Double(f64::from_bits(raw)),
            ScalarCodec::Enum => FieldValue::Enum(raw as i32),
            ScalarCodec::String | ScalarCodec::Bytes => return None,
        };
        Some(value)
    }

    /// Decode a packed run, appending every element to `out`.
    pub fn read_packed(self, payload: Bytes, out: &mut Vec<FieldValue>) -> Result<()> {
        let wire_type = self.wire_type();
        let mut reader = WireReader::new(payload);
        while !reader.is_eof() {
            if let Some(value) = self.read(&mut reader, wire_type)? {
                out.push(value);
            }
        }
        Ok(())
    }
}

/// How a field's individual values are coded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueCodec {
    Scalar(ScalarCodec),
    /// Length-delimited nested message, by plan index
    Message(usize),
    /// START_GROUP ... END_GROUP nested message, by plan index
    Group(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldShape {
    Singular,
    Repeated { packed: bool },
    Map { key: ScalarCodec },
}

#[derive(Debug, Clone)]
pub struct FieldPlan {
    pub number: u32,
    pub name: String,
    pub field_type: FieldType,
    pub value: ValueCodec,
    pub shape: FieldShape,
    pub oneof: Option<u32>,
    /// Rendered expectation for mismatch errors, e.g. "repeated int32"
    pub expected: String,
}

impl FieldPlan {
    fn build(
        descriptor: &MessageDescriptor,
        field: &FieldDescriptor,
        schema: &Schema,
    ) -> Result<Self> {
        let value = match ScalarCodec::for_type(field.field_type) {
            Some(codec) => ValueCodec::Scalar(codec),
            None => {
                let target = field.message_type.as_deref().unwrap_or_default();
                let index = schema
                    .message_index(target)
                    .ok_or_else(|| CodecError::MessageTypeNotFound(target.to_string()))?;
                if field.field_type == FieldType::Group {
                    ValueCodec::Group(index)
                } else {
                    ValueCodec::Message(index)
                }
            }
        };

        let (shape, expected) = match field.modifier {
            FieldModifier::Singular => (FieldShape::Singular, field.field_type.to_string()),
            FieldModifier::Repeated => (
                FieldShape::Repeated {
                    packed: field.is_packed(),
                },
                format!("repeated {}", field.field_type),
            ),
            FieldModifier::Map => {
                let key = field.key_type.and_then(ScalarCodec::for_type).ok_or_else(|| {
                    CodecError::Config(format!(
                        "map field {} in {} has no usable key type",
                        field.name, descriptor.name
                    ))
                })?;
                (
                    FieldShape::Map { key },
                    format!("map<{}, {}>", key.field_type(), field.field_type),
                )
            }
        };

        Ok(Self {
            number: field.number,
            name: field.name.clone(),
            field_type: field.field_type,
            value,
            shape,
            oneof: field.oneof,
            expected,
        })
    }
}

#[derive(Debug, Clone)]
pub struct MessagePlan {
    pub name: String,
    fields: Vec<FieldPlan>,
    by_number: HashMap<u32, usize>,
    /// Member field numbers of each oneof group
    oneofs: HashMap<u32, Vec<u32>>,
}

impl MessagePlan {
    pub fn field(&self, number: u32) -> Option<&FieldPlan> {
        self.by_number.get(&number).map(|idx| &self.fields[*idx])
    }

    pub fn fields(&self) -> &[FieldPlan] {
        &self.fields
    }

    /// Field numbers belonging to oneof group `group`, in declaration order.
    pub fn oneof_members(&self, group: u32) -> &[u32] {
        self.oneofs.get(&group).map(Vec::as_slice).unwrap_or_default()
    }
}

/// One plan per message, in [`Schema::messages`] order so that plan indices
/// match [`Schema::message_index`].
pub fn build_plans(schema: &Schema) -> Result<Vec<MessagePlan>> {
    schema
        .messages()
        .iter()
        .map(|descriptor| {
            let fields = descriptor
                .fields
                .iter()
                .map(|field| FieldPlan::build(descriptor, field, schema))
                .collect::<Result<Vec<_>>>()?;
            let by_number = fields
                .iter()
                .enumerate()
                .map(|(idx, field)| (field.number, idx))
                .collect();
            let mut oneofs: HashMap<u32, Vec<u32>> = HashMap::new();
            for field in &fields {
                if let Some(group) = field.oneof {
                    oneofs.entry(group).or_default().push(field.number);
                }
            }
            Ok(MessagePlan {
                name: descriptor.name.clone(),
                fields,
                by_number,
                oneofs,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_oneof_members_grouped() {
        let schema = Schema::new(vec![MessageDescriptor::new(
            "test.Contact",
            vec![
                FieldDescriptor::new("name", 1, FieldType::String),
                FieldDescriptor::new("email", 2, FieldType::String).in_oneof(0),
                FieldDescriptor::new("phone", 3, FieldType::String).in_oneof(0),
                FieldDescriptor::new("fax", 4, FieldType::String).in_oneof(1),
            ],
        )])
        .unwrap();
        let plans = build_plans(&schema).unwrap();
        assert_eq!(plans[0].oneof_members(0), &[2, 3]);
        assert_eq!(plans[0].oneof_members(1), &[4]);
        assert!(plans[0].oneof_members(7).is_empty());
    }

    #[test]
    fn test_accepted_wire_types() {
        assert!(ScalarCodec::Int32.accepts(WireType::Fixed64));
        assert!(ScalarCodec::Fixed64.accepts(WireType::Varint));
        assert!(ScalarCodec::Double.accepts(WireType::Fixed32));
        assert!(!ScalarCodec::Double.accepts(WireType::Varint));
        assert!(ScalarCodec::String.accepts(WireType::LengthDelimited));
        assert!(!ScalarCodec::Bytes.accepts(WireType::Varint));
        assert!(!ScalarCodec::Int32.accepts(WireType::LengthDelimited));
        assert!(!ScalarCodec::Bool.accepts(WireType::StartGroup));
    }

    #[test]
    fn test_negative_int32_sign_extended() {
        let wire = ScalarCodec::Int32.to_wire(&FieldValue::Int32(-1)).unwrap();
        assert_eq!(wire, WireValue::Varint(u64::MAX));
        let wire = ScalarCodec::Enum.to_wire(&FieldValue::Enum(-2)).unwrap();
        assert_eq!(wire, WireValue::Varint(u64::MAX - 1));
        let wire = ScalarCodec::Sint32.to_wire(&FieldValue::Int32(-1)).unwrap();
        assert_eq!(wire, WireValue::Varint(1));
    }

    #[test]
    fn test_to_wire_rejects_wrong_variant() {
        assert!(ScalarCodec::Int32.to_wire(&FieldValue::Uint32(1)).is_none());
        assert!(ScalarCodec::Enum.to_wire(&FieldValue::Int32(1)).is_none());
        let unsigned = FieldValue::Wide(WideInteger::from_u64(1));
        assert!(ScalarCodec::Int64.to_wire(&unsigned).is_none());
        assert!(ScalarCodec::Uint64.to_wire(&unsigned).is_some());
        assert!(ScalarCodec::String.to_wire(&FieldValue::from(vec![1u8])).is_none());
    }

    #[test]
    fn test_read_coerces_wire_types() {
        // sfixed32 -1 read into an int64 field
        let mut reader = WireReader::new(vec![0xFF, 0xFF, 0xFF, 0xFF]);
        let value = ScalarCodec::Int64.read(&mut reader, WireType::Fixed32).unwrap();
        assert_eq!(value.unwrap().as_wide().unwrap().to_i64(), -1);

        // varint 3 read into a fixed32 field
        let mut reader = WireReader::new(vec![0x03]);
        let value = ScalarCodec::Fixed32.read(&mut reader, WireType::Varint).unwrap();
        assert_eq!(value, Some(FieldValue::Uint32(3)));

        // double 1.5 read into a float field
        let mut reader = WireReader::new(1.5f64.to_le_bytes().to_vec());
        let value = ScalarCodec::Float.read(&mut reader, WireType::Fixed64).unwrap();
        assert_eq!(value, Some(FieldValue::Float(1.5)));
    }

    #[test]
    fn test_read_invalid_utf8() {
        let mut reader = WireReader::new(vec![0x02, 0xC3, 0x28]);
        let value = ScalarCodec::String
            .read(&mut reader, WireType::LengthDelimited)
            .unwrap();
        assert!(value.is_none());

        let mut reader = WireReader::new(vec![0x02, 0xC3, 0x28]);
        let value = ScalarCodec::Bytes
            .read(&mut reader, WireType::LengthDelimited)
            .unwrap();
        assert_eq!(value, Some(FieldValue::from(vec![0xC3, 0x28])));
    }

    #[test]
    fn test_read_packed() {
        let mut out = Vec::new();
        ScalarCodec::Sint32
            .read_packed(Bytes::from_static(&[0x01, 0x02, 0x03]), &mut out)
            .unwrap();
        assert_eq!(
            out,
            vec![FieldValue::Int32(-1), FieldValue::Int32(1), FieldValue::Int32(-2)]
        );

        let mut out = Vec::new();
        let err = ScalarCodec::Fixed32
            .read_packed(Bytes::from_static(&[0x01, 0x02, 0x03]), &mut out)
            .unwrap_err();
        assert!(matches!(err, CodecError::TruncatedMessage));
    }

    #[test]
    fn test_build_plans_resolves_messages() {
        let schema = Schema::new(vec![
            MessageDescriptor::new(
                "Outer",
                vec![
                    FieldDescriptor::message("inner", 1, "Inner"),
                    FieldDescriptor::new("legacy", 2, FieldType::Group)
                        .with_message_type("Inner")
                        .repeated(),
                    FieldDescriptor::new("ids", 3, FieldType::Uint32).repeated(),
                    FieldDescriptor::map("tags", 4, FieldType::String, FieldType::Sint64),
                ],
            ),
            MessageDescriptor::new("Inner", vec![]),
        ])
        .unwrap();
        let plans = build_plans(&schema).unwrap();
        assert_eq!(plans.len(), 2);

        let outer = &plans[0];
        assert_eq!(outer.field(1).unwrap().value, ValueCodec::Message(1));
        assert_eq!(outer.field(2).unwrap().value, ValueCodec::Group(1));
        assert_eq!(
            outer.field(3).unwrap().shape,
            FieldShape::Repeated { packed: true }
        );
        let tags = outer.field(4).unwrap();
        assert_eq!(
            tags.shape,
            FieldShape::Map {
                key: ScalarCodec::String
            }
        );
        assert_eq!(tags.expected, "map<string, sint64>");
        assert!(outer.field(5).is_none());
    }
}
