//! Cursor over an encoded buffer.

use crate::config::DEFAULT_MAX_DEPTH;
use crate::error::{CodecError, Result};
use crate::varint::decode_varint;
use bytes::{Buf, Bytes};
use proto_types::{WireType, MAX_FIELD_NUMBER};

/// A decoded field key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tag {
    pub field_number: u32,
    pub wire_type: WireType,
}

/// Reads wire primitives from a shared [`Bytes`] buffer.
///
/// Length-delimited payloads and skipped fields are returned as slices of
/// the input, so nothing is copied.
#[derive(Debug, Clone)]
pub struct WireReader {
    buf: Bytes,
    pos: usize,
    tag_start: usize,
    max_depth: usize,
}

impl WireReader {
    pub fn new(buf: impl Into<Bytes>) -> Self {
        Self {
            buf: buf.into(),
            pos: 0,
            tag_start: 0,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Limit on group nesting while skipping.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn is_eof(&self) -> bool {
        self.pos >= self.buf.len()
    }

    pub fn read_tag(&mut self) -> Result<Tag> {
        self.tag_start = self.pos;
        let key = self.read_varint()?;
        let bits = (key & 0x7) as u32;
        let wire_type = WireType::from_bits(bits).ok_or(CodecError::InvalidWireType(bits))?;
        let number = key >> 3;
        if number == 0 || number > u64::from(MAX_FIELD_NUMBER) {
            return Err(CodecError::InvalidFieldNumber(number));
        }
        Ok(Tag {
            field_number: number as u32,
            wire_type,
        })
    }

    pub fn read_varint(&mut self) -> Result<u64> {
        let (value, consumed) = decode_varint(&self.buf[self.pos..])?;
        self.pos += consumed;
        Ok(value)
    }

    pub fn read_fixed32(&mut self) -> Result<u32> {
        let start = self.advance(4)?;
        Ok((&self.buf[start..start + 4]).get_u32_le())
    }

    pub fn read_fixed64(&mut self) -> Result<u64> {
        let start = self.advance(8)?;
        Ok((&self.buf[start..start + 8]).get_u64_le())
    }

    /// Varint length followed by that many bytes.
    pub fn read_length_delimited(&mut self) -> Result<Bytes> {
        let len = self.read_varint()?;
        if len > self.remaining() as u64 {
            return Err(CodecError::TruncatedMessage);
        }
        let len = len as usize;
        let start = self.advance(len)?;
        Ok(self.buf.slice(start..start + len))
    }

    /// Skip the value of the field whose tag was just read, returning the
    /// field's raw bytes including the tag.
    pub fn skip(&mut self, tag: Tag) -> Result<Bytes> {
        self.skip_nested(tag, 0)
    }

    /// [`skip`](Self::skip) for a field found `depth` levels below the top
    /// message, so group nesting counts against the same limit.
    pub fn skip_nested(&mut self, tag: Tag, depth: usize) -> Result<Bytes> {
        let start = self.tag_start;
        self.skip_value(tag, depth)?;
        Ok(self.buf.slice(start..self.pos))
    }

    fn skip_value(&mut self, tag: Tag, depth: usize) -> Result<()> {
        match tag.wire_type {
            WireType::Varint => {
                self.read_varint()?;
            }
            WireType::Fixed64 => {
                self.advance(8)?;
            }
            WireType::LengthDelimited => {
                self.read_length_delimited()?;
            }
            WireType::Fixed32 => {
                self.advance(4)?;
            }
            WireType::StartGroup => self.skip_group(tag.field_number, depth + 1)?,
            WireType::EndGroup => return Err(CodecError::UnexpectedEndGroup(tag.field_number)),
        }
        Ok(())
    }

    fn skip_group(&mut self, field_number: u32, depth: usize) -> Result<()> {
        if depth > self.max_depth {
            return Err(CodecError::MessageTooDeep {
                limit: self.max_depth,
            });
        }
        loop {
            if self.is_eof() {
                return Err(CodecError::TruncatedMessage);
            }
            let inner = self.read_tag()?;
            if inner.wire_type == WireType::EndGroup {
                if inner.field_number == field_number {
                    return Ok(());
                }
                return Err(CodecError::UnexpectedEndGroup(inner.field_number));
            }
            self.skip_value(inner, depth)?;
        }
    }

    /// Move past `len` bytes, returning where they start.
    fn advance(&mut self, len: usize) -> Result<usize> {
        if self.remaining() < len {
            return Err(CodecError::TruncatedMessage);
        }
        let start = self.pos;
        self.pos += len;
        Ok(start)
    }
}
