//! Wire output buffer.

use crate::varint::{encode_varint, encoded_len_varint};
use bytes::{BufMut, Bytes, BytesMut};
use proto_types::WireType;

/// One encoded scalar, ready to be written after its tag.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WireValue<'a> {
    Varint(u64),
    Fixed32(u32),
    Fixed64(u64),
    LengthDelimited(&'a [u8]),
}

impl WireValue<'_> {
    pub fn wire_type(&self) -> WireType {
        match self {
            WireValue::Varint(_) => WireType::Varint,
            WireValue::Fixed32(_) => WireType::Fixed32,
            WireValue::Fixed64(_) => WireType::Fixed64,
            WireValue::LengthDelimited(_) => WireType::LengthDelimited,
        }
    }

    /// Bytes this value occupies without its tag.
    pub fn encoded_len(&self) -> usize {
        match self {
            WireValue::Varint(v) => encoded_len_varint(*v),
            WireValue::Fixed32(_) => 4,
            WireValue::Fixed64(_) => 8,
            WireValue::LengthDelimited(bytes) => {
                encoded_len_varint(bytes.len() as u64) + bytes.len()
            }
        }
    }
}

/// Bytes taken by the tag of `field_number`. The wire type never changes
/// the length.
pub fn tag_len(field_number: u32) -> usize {
    encoded_len_varint(u64::from(field_number) << 3)
}

/// Accumulates an encoded message.
///
/// Length prefixes are written by the caller from a separate size pass, so
/// a whole message lands in one buffer.
#[derive(Debug, Default)]
pub struct WireWriter {
    buf: BytesMut,
}

impl WireWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
        }
    }

    pub fn write_tag(&mut self, field_number: u32, wire_type: WireType) {
        self.write_varint((u64::from(field_number) << 3) | u64::from(wire_type.bits()));
    }

    pub fn write_varint(&mut self, value: u64) {
        encode_varint(value, &mut self.buf);
    }

    pub fn write_fixed32(&mut self, value: u32) {
        self.buf.put_u32_le(value);
    }

    pub fn write_fixed64(&mut self, value: u64) {
        self.buf.put_u64_le(value);
    }

    pub fn write_length_delimited(&mut self, bytes: &[u8]) {
        self.write_varint(bytes.len() as u64);
        self.buf.put_slice(bytes);
    }

    /// Bytes that are already wire-encoded, such as a preserved unknown field.
    pub fn write_raw(&mut self, bytes: &[u8]) {
        self.buf.put_slice(bytes);
    }

    /// Write a value without a tag, as inside a packed run.
    pub fn write_value(&mut self, value: WireValue<'_>) {
        match value {
            WireValue::Varint(v) => self.write_varint(v),
            WireValue::Fixed32(v) => self.write_fixed32(v),
            WireValue::Fixed64(v) => self.write_fixed64(v),
            WireValue::LengthDelimited(bytes) => self.write_length_delimited(bytes),
        }
    }

    pub fn write_field(&mut self, field_number: u32, value: WireValue<'_>) {
        self.write_tag(field_number, value.wire_type());
        self.write_value(value);
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_bytes(self) -> Bytes {
        self.buf.freeze()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_and_varint() {
        let mut writer = WireWriter::new();
        writer.write_tag(1, WireType::Varint);
        writer.write_varint(150);
        assert_eq!(writer.as_slice(), &[0x08, 0x96, 0x01]);
    }

    #[test]
    fn test_encoded_len_matches_written() {
        let values = [
            WireValue::Varint(0),
            WireValue::Varint(u64::MAX),
            WireValue::Fixed32(7),
            WireValue::Fixed64(7),
            WireValue::LengthDelimited(&[0u8; 200]),
        ];
        for value in values {
            let mut writer = WireWriter::new();
            writer.write_field(16, value);
            assert_eq!(writer.len(), tag_len(16) + value.encoded_len());
        }
        assert_eq!(tag_len(15), 1);
        assert_eq!(tag_len(proto_types::MAX_FIELD_NUMBER), 5);
    }

    #[test]
    fn test_large_field_number() {
        let mut writer = WireWriter::new();
        writer.write_tag(proto_types::MAX_FIELD_NUMBER, WireType::Fixed32);
        assert_eq!(writer.as_slice(), &[0xFD, 0xFF, 0xFF, 0xFF, 0x0F]);
    }

    #[test]
    fn test_fixed_are_little_endian() {
        let mut writer = WireWriter::new();
        writer.write_fixed32(0x0403_0201);
        writer.write_fixed64(1);
        assert_eq!(
            writer.as_slice(),
            &[1, 2, 3, 4, 1, 0, 0, 0, 0, 0, 0, 0]
        );
    }

    #[test]
    fn test_length_delimited() {
        let mut writer = WireWriter::with_capacity(8);
        writer.write_field(1, WireValue::LengthDelimited(b"hi"));
        writer.write_field(2, WireValue::LengthDelimited(b""));
        assert_eq!(writer.len(), 6);
        assert_eq!(writer.into_bytes().as_ref(), &[0x0A, 0x02, b'h', b'i', 0x12, 0x00]);
    }

    #[test]
    fn test_write_raw_verbatim() {
        let mut writer = WireWriter::new();
        assert!(writer.is_empty());
        writer.write_raw(&[0xF8, 0x06, 0x01]);
        assert_eq!(writer.as_slice(), &[0xF8, 0x06, 0x01]);
    }
}
