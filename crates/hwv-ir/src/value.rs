//! Concrete bit-vector values
//!
//! Values are stored LSB-first. The textual form `<width>'h<hex>` is what
//! shows up in counterexamples, reports and task manifests; `'b` and `'d`
//! radixes are accepted when parsing.

use bitvec::prelude::*;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Fixed-width bit-vector value
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct BitValue {
    bits: BitVec<u64, Lsb0>,
}

impl BitValue {
    /// All-zero value of the given width
    pub fn zero(width: u32) -> Self {
        Self {
            bits: bitvec![u64, Lsb0; 0; width as usize],
        }
    }

    /// Build a value from the low `width` bits of `value`
    pub fn from_u64(width: u32, value: u64) -> Self {
        let mut bits = bitvec![u64, Lsb0; 0; width as usize];
        for i in 0..(width as usize).min(64) {
            bits.set(i, (value >> i) & 1 == 1);
        }
        Self { bits }
    }

    /// Build a value from LSB-first bits
    pub fn from_bits(bits: &[bool]) -> Self {
        Self {
            bits: bits.iter().copied().collect(),
        }
    }

    pub fn width(&self) -> u32 {
        self.bits.len() as u32
    }

    /// Bit `index` (LSB = 0); out-of-range bits read as zero
    pub fn bit(&self, index: u32) -> bool {
        self.bits
            .get(index as usize)
            .map(|b| *b)
            .unwrap_or(false)
    }

    /// LSB-first bits
    pub fn to_bits(&self) -> Vec<bool> {
        self.bits.iter().map(|b| *b).collect()
    }

    /// Low 64 bits as an integer
    pub fn to_u64(&self) -> u64 {
        self.bits
            .iter()
            .take(64)
            .enumerate()
            .fold(0u64, |acc, (i, b)| if *b { acc | (1 << i) } else { acc })
    }

    pub fn is_zero(&self) -> bool {
        self.bits.not_any()
    }

    fn hex_digits(&self) -> String {
        let nibbles = self.bits.len().div_ceil(4).max(1);
        let mut out = String::with_capacity(nibbles);
        for n in (0..nibbles).rev() {
            let mut digit = 0u32;
            for k in 0..4 {
                if self.bits.get(n * 4 + k).map(|b| *b).unwrap_or(false) {
                    digit |= 1 << k;
                }
            }
            out.push(std::char::from_digit(digit, 16).unwrap_or('0'));
        }
        out
    }
}

impl fmt::Display for BitValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}'h{}", self.width(), self.hex_digits())
    }
}

/// Error returned when a value literal cannot be parsed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid bit-vector literal '{literal}': {reason}")]
pub struct ParseValueError {
    pub literal: String,
    pub reason: String,
}

impl FromStr for BitValue {
    type Err = ParseValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fail = |reason: &str| ParseValueError {
            literal: s.to_string(),
            reason: reason.to_string(),
        };

        let (width, rest) = s.split_once('\'').ok_or_else(|| fail("missing width"))?;
        let width: u32 = width.trim().parse().map_err(|_| fail("bad width"))?;
        let mut chars = rest.chars();
        let radix = match chars.next() {
            Some('h') | Some('H') => 16,
            Some('b') | Some('B') => 2,
            Some('d') | Some('D') => 10,
            _ => return Err(fail("unknown radix")),
        };
        let digits: String = chars.filter(|c| *c != '_').collect();
        if digits.is_empty() {
            return Err(fail("no digits"));
        }

        if radix == 10 {
            let value: u64 = digits.parse().map_err(|_| fail("bad decimal digits"))?;
            return Ok(Self::from_u64(width, value));
        }

        let per_digit = if radix == 16 { 4 } else { 1 };
        let mut bits = bitvec![u64, Lsb0; 0; width as usize];
        for (pos, c) in digits.chars().rev().enumerate() {
            let digit = c.to_digit(radix).ok_or_else(|| fail("bad digit"))?;
            for k in 0..per_digit {
                let index = pos * per_digit + k;
                if (digit >> k) & 1 == 1 {
                    if index >= width as usize {
                        return Err(fail("value does not fit in width"));
                    }
                    bits.set(index, true);
                }
            }
        }
        Ok(Self { bits })
    }
}

impl Serialize for BitValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for BitValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_u64_truncates() {
        let v = BitValue::from_u64(4, 0x1f);
        assert_eq!(v.width(), 4);
        assert_eq!(v.to_u64(), 0xf);
    }

    #[test]
    fn test_display_and_parse() {
        let v = BitValue::from_u64(12, 0xa5c);
        assert_eq!(v.to_string(), "12'ha5c");
        assert_eq!("12'ha5c".parse::<BitValue>().unwrap(), v);
        assert_eq!("3'b101".parse::<BitValue>().unwrap().to_u64(), 5);
        assert_eq!("8'd200".parse::<BitValue>().unwrap().to_u64(), 200);
        assert_eq!(BitValue::from_u64(1, 1).to_string(), "1'h1");
    }

    #[test]
    fn test_parse_rejects_overflow() {
        assert!("2'h7".parse::<BitValue>().is_err());
        assert!("8".parse::<BitValue>().is_err());
        assert!("8'x12".parse::<BitValue>().is_err());
    }

    #[test]
    fn test_wide_values() {
        let mut bits = vec![false; 70];
        bits[69] = true;
        let v = BitValue::from_bits(&bits);
        assert!(v.bit(69));
        assert_eq!(v.to_u64(), 0);
        assert_eq!(v.to_string().parse::<BitValue>().unwrap(), v);
    }

    #[test]
    fn test_serde_as_string() {
        let v = BitValue::from_u64(8, 0x2a);
        let json = serde_json::to_string(&v).unwrap();
        assert_eq!(json, "\"8'h2a\"");
        let back: BitValue = serde_json::from_str(&json).unwrap();
        assert_eq!(back, v);
    }
}
