//! 64-bit integers carried as two 32-bit halves.
//!
//! The scripting side of the bridge has no native 64-bit integer, so every
//! INT64/UINT64/SINT64/FIXED64/SFIXED64 value crosses the boundary as a
//! `(high, low)` pair. The signedness is fixed by the field type at the call
//! site: at the wire level INT64 and UINT64 are the same raw 64 bits and only
//! differ in how they are interpreted and rendered.

use std::fmt;
use std::ops::{BitAnd, BitOr, Shl, Shr};

/// How the 64 raw bits of a [`WideInteger`] are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signedness {
    Signed,
    Unsigned,
}

/// A 64-bit integer built from two 32-bit halves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WideInteger {
    high: u32,
    low: u32,
    signedness: Signedness,
}

impl WideInteger {
    /// Default value of INT64, SINT64 and SFIXED64 fields.
    pub const SIGNED_ZERO: WideInteger = WideInteger::from_parts(0, 0, Signedness::Signed);

    /// Default value of UINT64 and FIXED64 fields.
    pub const UNSIGNED_ZERO: WideInteger = WideInteger::from_parts(0, 0, Signedness::Unsigned);

    pub const fn from_parts(high: u32, low: u32, signedness: Signedness) -> Self {
        Self {
            high,
            low,
            signedness,
        }
    }

    /// Sign-extends a small signed integer.
    pub const fn from_i32(value: i32) -> Self {
        let high = if value < 0 { u32::MAX } else { 0 };
        Self::from_parts(high, value as u32, Signedness::Signed)
    }

    pub const fn from_u32(value: u32) -> Self {
        Self::from_parts(0, value, Signedness::Unsigned)
    }

    pub const fn from_i64(value: i64) -> Self {
        Self::from_bits(value as u64, Signedness::Signed)
    }

    pub const fn from_u64(value: u64) -> Self {
        Self::from_bits(value, Signedness::Unsigned)
    }

    /// Splits raw wire bits into halves.
    pub const fn from_bits(bits: u64, signedness: Signedness) -> Self {
        Self::from_parts((bits >> 32) as u32, bits as u32, signedness)
    }

    /// Joins the halves back into raw wire bits.
    pub const fn to_bits(self) -> u64 {
        ((self.high as u64) << 32) | self.low as u64
    }

    pub const fn to_i64(self) -> i64 {
        self.to_bits() as i64
    }

    pub const fn to_u64(self) -> u64 {
        self.to_bits()
    }

    pub const fn high(self) -> u32 {
        self.high
    }

    pub const fn low(self) -> u32 {
        self.low
    }

    pub const fn signedness(self) -> Signedness {
        self.signedness
    }

    pub const fn is_signed(self) -> bool {
        matches!(self.signedness, Signedness::Signed)
    }

    /// Same bits, different interpretation.
    pub const fn with_signedness(self, signedness: Signedness) -> Self {
        Self::from_parts(self.high, self.low, signedness)
    }

    pub const fn is_zero(self) -> bool {
        self.high == 0 && self.low == 0
    }

    pub const fn is_negative(self) -> bool {
        self.is_signed() && self.high & 0x8000_0000 != 0
    }

    /// Left shift by `amount` bits. Amounts are taken modulo 64.
    pub const fn shift_left(self, amount: u32) -> Self {
        let amount = amount & 63;
        let (high, low) = if amount == 0 {
            (self.high, self.low)
        } else if amount >= 32 {
            (self.low << (amount - 32), 0)
        } else {
            (
                (self.high << amount) | (self.low >> (32 - amount)),
                self.low << amount,
            )
        };
        Self::from_parts(high, low, self.signedness)
    }

    /// Right shift by `amount` bits: arithmetic when signed, logical when
    /// unsigned. Amounts are taken modulo 64.
    pub const fn shift_right(self, amount: u32) -> Self {
        let amount = amount & 63;
        let signed = self.is_signed();
        let fill = if self.is_negative() { u32::MAX } else { 0 };
        let (high, low) = if amount == 0 {
            (self.high, self.low)
        } else if amount >= 32 {
            let low = if signed {
                ((self.high as i32) >> (amount - 32)) as u32
            } else {
                self.high >> (amount - 32)
            };
            (fill, low)
        } else {
            let high = if signed {
                ((self.high as i32) >> amount) as u32
            } else {
                self.high >> amount
            };
            (high, (self.low >> amount) | (self.high << (32 - amount)))
        };
        Self::from_parts(high, low, self.signedness)
    }
}

impl Default for WideInteger {
    fn default() -> Self {
        Self::SIGNED_ZERO
    }
}

impl From<i64> for WideInteger {
    fn from(value: i64) -> Self {
        Self::from_i64(value)
    }
}

impl From<u64> for WideInteger {
    fn from(value: u64) -> Self {
        Self::from_u64(value)
    }
}

impl Shl<u32> for WideInteger {
    type Output = WideInteger;

    fn shl(self, amount: u32) -> Self::Output {
        self.shift_left(amount)
    }
}

impl Shr<u32> for WideInteger {
    type Output = WideInteger;

    fn shr(self, amount: u32) -> Self::Output {
        self.shift_right(amount)
    }
}

impl BitAnd for WideInteger {
    type Output = WideInteger;

    fn bitand(self, rhs: Self) -> Self::Output {
        Self::from_parts(self.high & rhs.high, self.low & rhs.low, self.signedness)
    }
}

impl BitOr for WideInteger {
    type Output = WideInteger;

    fn bitor(self, rhs: Self) -> Self::Output {
        Self::from_parts(self.high | rhs.high, self.low | rhs.low, self.signedness)
    }
}

impl fmt::Display for WideInteger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.signedness {
            Signedness::Signed => write!(f, "{}", self.to_i64()),
            Signedness::Unsigned => write!(f, "{}", self.to_u64()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLES: [i64; 8] = [
        0,
        1,
        -1,
        300,
        i32::MIN as i64,
        0x1234_5678_9abc_def0,
        i64::MAX,
        i64::MIN,
    ];

    #[test]
    fn test_from_i32_sign_extends() {
        let value = WideInteger::from_i32(-2);
        assert_eq!(value.high(), u32::MAX);
        assert_eq!(value.low(), 0xffff_fffe);
        assert_eq!(value.to_i64(), -2);
        assert!(value.is_negative());
    }

    #[test]
    fn test_from_u32_is_unsigned() {
        let value = WideInteger::from_u32(u32::MAX);
        assert_eq!(value.high(), 0);
        assert_eq!(value.to_u64(), u32::MAX as u64);
        assert!(!value.is_negative());
    }

    #[test]
    fn test_bits_round_trip() {
        for sample in SAMPLES {
            let value = WideInteger::from_i64(sample);
            assert_eq!(value.to_i64(), sample);
            assert_eq!(
                WideInteger::from_bits(value.to_bits(), Signedness::Signed),
                value
            );
        }
    }

    #[test]
    fn test_shifts_match_native() {
        for sample in SAMPLES {
            for amount in 0..64 {
                let signed = WideInteger::from_i64(sample);
                assert_eq!((signed << amount).to_i64(), sample.wrapping_shl(amount));
                assert_eq!((signed >> amount).to_i64(), sample >> amount);

                let unsigned = WideInteger::from_u64(sample as u64);
                assert_eq!((unsigned >> amount).to_u64(), (sample as u64) >> amount);
                assert_eq!(
                    (unsigned << amount).to_u64(),
                    (sample as u64).wrapping_shl(amount)
                );
            }
        }
    }

    #[test]
    fn test_bit_ops() {
        let a = WideInteger::from_u64(0xff00_ff00_0f0f_0f0f);
        let b = WideInteger::from_u64(0x0ff0_0ff0_00ff_00ff);
        assert_eq!((a & b).to_u64(), 0x0f00_0f00_000f_000f);
        assert_eq!((a | b).to_u64(), 0xfff0_fff0_0fff_0fff);
    }

    #[test]
    fn test_zero_constants() {
        assert!(WideInteger::SIGNED_ZERO.is_zero());
        assert!(WideInteger::UNSIGNED_ZERO.is_zero());
        assert!(WideInteger::SIGNED_ZERO.is_signed());
        assert!(!WideInteger::UNSIGNED_ZERO.is_signed());
        assert_ne!(WideInteger::SIGNED_ZERO, WideInteger::UNSIGNED_ZERO);
        assert!(!WideInteger::from_i32(-1).is_zero());
    }

    #[test]
    fn test_display_honors_signedness() {
        let bits = u64::MAX;
        assert_eq!(
            WideInteger::from_bits(bits, Signedness::Signed).to_string(),
            "-1"
        );
        assert_eq!(
            WideInteger::from_bits(bits, Signedness::Unsigned).to_string(),
            "18446744073709551615"
        );
        assert_eq!(
            WideInteger::from_i64(i64::MIN).to_string(),
            "-9223372036854775808"
        );
    }
}
