//! Schema-less view of an encoded buffer.
//!
//! Useful when the message type is unknown or the payload fails to decode:
//! every field is listed with its number, wire type and raw value. Groups
//! are expanded; length-delimited payloads are left opaque since they may be
//! strings, bytes, packed runs or nested messages.

use crate::config::DEFAULT_MAX_DEPTH;
use crate::error::{CodecError, Result};
use crate::reader::WireReader;
use bytes::Bytes;
use proto_types::WireType;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Varint(u64),
    Fixed32(u32),
    Fixed64(u64),
    LengthDelimited(Bytes),
    Group(Vec<RawField>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawField {
    pub number: u32,
    pub value: RawValue,
}

impl RawField {
    pub fn wire_type(&self) -> WireType {
        match self.value {
            RawValue::Varint(_) => WireType::Varint,
            RawValue::Fixed32(_) => WireType::Fixed32,
            RawValue::Fixed64(_) => WireType::Fixed64,
            RawValue::LengthDelimited(_) => WireType::LengthDelimited,
            RawValue::Group(_) => WireType::StartGroup,
        }
    }
}

/// List the fields of `data` in wire order.
pub fn inspect(data: impl Into<Bytes>) -> Result<Vec<RawField>> {
    inspect_with_depth(data, DEFAULT_MAX_DEPTH)
}

pub fn inspect_with_depth(data: impl Into<Bytes>, max_depth: usize) -> Result<Vec<RawField>> {
    let mut reader = WireReader::new(data).with_max_depth(max_depth);
    read_fields(&mut reader, None, 0, max_depth)
}

fn read_fields(
    reader: &mut WireReader,
    group: Option<u32>,
    depth: usize,
    max_depth: usize,
) -> Result<Vec<RawField>> {
    let mut fields = Vec::new();
    loop {
        if reader.is_eof() {
            return match group {
                Some(_) => Err(CodecError::TruncatedMessage),
                None => Ok(fields),
            };
        }
        let tag = reader.read_tag()?;
        let value = match tag.wire_type {
            WireType::Varint => RawValue::Varint(reader.read_varint()?),
            WireType::Fixed32 => RawValue::Fixed32(reader.read_fixed32()?),
            WireType::Fixed64 => RawValue::Fixed64(reader.read_fixed64()?),
            WireType::LengthDelimited => RawValue::LengthDelimited(reader.read_length_delimited()?),
            WireType::StartGroup => {
                if depth + 1 > max_depth {
                    return Err(CodecError::MessageTooDeep { limit: max_depth });
                }
                RawValue::Group(read_fields(reader, Some(tag.field_number), depth + 1, max_depth)?)
            }
            WireType::EndGroup => {
                return match group {
                    Some(number) if number == tag.field_number => Ok(fields),
                    _ => Err(CodecError::UnexpectedEndGroup(tag.field_number)),
                };
            }
        };
        fields.push(RawField {
            number: tag.field_number,
            value,
        });
    }
}

/// Renders one field per line, groups indented beneath their tag.
pub struct Listing<'a>(pub &'a [RawField]);

impl Listing<'_> {
    fn write(f: &mut fmt::Formatter<'_>, fields: &[RawField], indent: usize) -> fmt::Result {
        for field in fields {
            write!(
                f,
                "{:indent$}{} [{}] ",
                "",
                field.number,
                field.wire_type(),
                indent = indent
            )?;
            match &field.value {
                RawValue::Varint(v) => writeln!(f, "{v}")?,
                RawValue::Fixed32(v) => writeln!(f, "{v} (0x{v:08x})")?,
                RawValue::Fixed64(v) => writeln!(f, "{v} (0x{v:016x})")?,
                RawValue::LengthDelimited(bytes) => match std::str::from_utf8(bytes) {
                    Ok(text) if !text.chars().any(char::is_control) => {
                        writeln!(f, "{} bytes {text:?}", bytes.len())?
                    }
                    _ => writeln!(f, "{} bytes {:02x?}", bytes.len(), &bytes[..])?,
                },
                RawValue::Group(inner) => {
                    writeln!(f, "{{")?;
                    Self::write(f, inner, indent + 2)?;
                    writeln!(f, "{:indent$}}}", "", indent = indent)?;
                }
            }
        }
        Ok(())
    }
}

impl fmt::Display for Listing<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Self::write(f, self.0, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inspect_flat() {
        let fields = inspect(vec![0x0A, 0x02, b'h', b'i', 0x10, 0xAC, 0x02, 0x1D, 1, 0, 0, 0]).unwrap();
        assert_eq!(
            fields,
            vec![
                RawField {
                    number: 1,
                    value: RawValue::LengthDelimited(Bytes::from_static(b"hi")),
                },
                RawField {
                    number: 2,
                    value: RawValue::Varint(300),
                },
                RawField {
                    number: 3,
                    value: RawValue::Fixed32(1),
                },
            ]
        );
    }

    #[test]
    fn test_inspect_group() {
        let fields = inspect(vec![0x2B, 0x08, 0x01, 0x2C]).unwrap();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].wire_type(), WireType::StartGroup);
        assert_eq!(
            fields[0].value,
            RawValue::Group(vec![RawField {
                number: 1,
                value: RawValue::Varint(1),
            }])
        );

        assert!(matches!(
            inspect(vec![0x2B, 0x08, 0x01]),
            Err(CodecError::TruncatedMessage)
        ));
        assert!(matches!(
            inspect_with_depth(vec![0x0B, 0x0B, 0x0C, 0x0C], 1),
            Err(CodecError::MessageTooDeep { limit: 1 })
        ));
    }

    #[test]
    fn test_listing() {
        let fields = inspect(vec![0x0A, 0x02, b'h', b'i', 0x13, 0x08, 0x07, 0x14]).unwrap();
        let text = Listing(&fields).to_string();
        assert_eq!(
            text,
            "1 [length-delimited] 2 bytes \"hi\"\n2 [start-group] {\n  1 [varint] 7\n}\n"
        );
    }
}
