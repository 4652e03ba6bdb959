//! Base-128 varints and zig-zag transforms.

use crate::error::{CodecError, Result};
use bytes::BufMut;
use proto_types::{Signedness, WideInteger};

/// A 64-bit value never needs more than ten 7-bit groups.
pub const MAX_VARINT_LEN: usize = 10;

/// Append `value` as a varint, low-order group first.
pub fn encode_varint(mut value: u64, buf: &mut impl BufMut) {
    while value >= 0x80 {
        buf.put_u8((value as u8) | 0x80);
        value >>= 7;
    }
    buf.put_u8(value as u8);
}

/// Decode a varint from the front of `bytes`, returning the value and the
/// number of bytes consumed.
///
/// Bits past the 64th in the tenth byte are discarded. Fails with
/// [`CodecError::MalformedVarint`] when ten bytes carry the continuation bit,
/// and with [`CodecError::TruncatedMessage`] when the input ends first.
pub fn decode_varint(bytes: &[u8]) -> Result<(u64, usize)> {
    let mut value = 0u64;
    for (i, byte) in bytes.iter().take(MAX_VARINT_LEN).enumerate() {
        value |= u64::from(byte & 0x7f) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok((value, i + 1));
        }
    }
    if bytes.len() >= MAX_VARINT_LEN {
        Err(CodecError::MalformedVarint)
    } else {
        Err(CodecError::TruncatedMessage)
    }
}

pub fn encoded_len_varint(value: u64) -> usize {
    let bits = 64 - (value | 1).leading_zeros() as usize;
    bits.div_ceil(7)
}

/// Varint encoding of a wide integer's 64-bit pattern.
pub fn encode_wide(value: WideInteger, buf: &mut impl BufMut) {
    encode_varint(value.to_bits(), buf);
}

pub fn decode_wide(bytes: &[u8], signedness: Signedness) -> Result<(WideInteger, usize)> {
    let (bits, consumed) = decode_varint(bytes)?;
    Ok((WideInteger::from_bits(bits, signedness), consumed))
}

pub fn zigzag_encode32(value: i32) -> u32 {
    ((value << 1) ^ (value >> 31)) as u32
}

pub fn zigzag_decode32(value: u32) -> i32 {
    ((value >> 1) as i32) ^ -((value & 1) as i32)
}

pub fn zigzag_encode64(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

pub fn zigzag_decode64(value: u64) -> i64 {
    ((value >> 1) as i64) ^ -((value & 1) as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(value: u64) -> Vec<u8> {
        let mut buf = Vec::new();
        encode_varint(value, &mut buf);
        buf
    }

    #[test]
    fn test_varint_sizes() {
        let cases = [
            (0u64, 1usize),
            (1, 1),
            (127, 1),
            (128, 2),
            (300, 2),
            (16_383, 2),
            (16_384, 3),
            (u32::MAX as u64, 5),
            (i64::MAX as u64, 9),
            (1 << 63, 10),
            (u64::MAX, 10),
        ];
        for (value, len) in cases {
            let bytes = encode(value);
            assert_eq!(bytes.len(), len, "encoded length of {value}");
            assert_eq!(encoded_len_varint(value), len, "computed length of {value}");
            assert_eq!(decode_varint(&bytes).unwrap(), (value, len));
        }
    }

    #[test]
    fn test_known_encodings() {
        assert_eq!(encode(0), vec![0x00]);
        assert_eq!(encode(150), vec![0x96, 0x01]);
        assert_eq!(encode(300), vec![0xAC, 0x02]);
        assert_eq!(
            encode(u64::MAX),
            vec![0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x01]
        );
    }

    #[test]
    fn test_decode_stops_at_terminator() {
        let (value, consumed) = decode_varint(&[0xAC, 0x02, 0xFF, 0xFF]).unwrap();
        assert_eq!(value, 300);
        assert_eq!(consumed, 2);
    }

    #[test]
    fn test_malformed_and_truncated() {
        assert!(matches!(
            decode_varint(&[0xFF; 10]),
            Err(CodecError::MalformedVarint)
        ));
        assert!(matches!(
            decode_varint(&[0xFF; 11]),
            Err(CodecError::MalformedVarint)
        ));
        assert!(matches!(
            decode_varint(&[0x80, 0x80]),
            Err(CodecError::TruncatedMessage)
        ));
        assert!(matches!(decode_varint(&[]), Err(CodecError::TruncatedMessage)));
    }

    #[test]
    fn test_excess_high_bits_discarded() {
        let bytes = [0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x7F];
        assert_eq!(decode_varint(&bytes).unwrap(), (u64::MAX, 10));
    }

    #[test]
    fn test_zigzag_round_trip() {
        for value in [0i32, 1, -1, 2, -2, i32::MAX, i32::MIN] {
            assert_eq!(zigzag_decode32(zigzag_encode32(value)), value);
        }
        for value in [0i64, 1, -1, i32::MAX as i64, i32::MIN as i64, i64::MAX, i64::MIN] {
            assert_eq!(zigzag_decode64(zigzag_encode64(value)), value);
        }
        assert_eq!(zigzag_encode32(-1), 1);
        assert_eq!(zigzag_encode32(1), 2);
        assert_eq!(zigzag_encode32(i32::MIN), u32::MAX);
        assert_eq!(zigzag_encode64(i64::MIN), u64::MAX);
    }

    #[test]
    fn test_wide_varint() {
        let mut buf = Vec::new();
        encode_wide(WideInteger::from_i64(-1), &mut buf);
        assert_eq!(buf.len(), 10);
        let (value, consumed) = decode_wide(&buf, Signedness::Signed).unwrap();
        assert_eq!(value.to_i64(), -1);
        assert_eq!((value.high(), value.low()), (u32::MAX, u32::MAX));
        assert_eq!(consumed, 10);
    }
}
