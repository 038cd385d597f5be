//! # Address Resolution
//!
//! Parses the textual byte/bit addresses used by S7 tooling into a
//! [`MemoryAddress`].
//!
//! | Text | Byte offset | Bit offset |
//! |------|-------------|------------|
//! | `"10"` | 10 | none |
//! | `"10.3"` | 10 | 3 |
//! | `"10.8"` | error: bit out of range | |
//! | `"1.2.3"`, `"a.b"`, `""`, `"-1"` | error: invalid format | |
//!
//! Only ASCII digits are accepted in either part: no sign, no whitespace,
//! no separators.

use std::fmt;
use std::str::FromStr;

use crate::constants::MAX_BIT_OFFSET;
use crate::error::{PlcError, PlcResult};

/// A resolved location inside a memory area.
///
/// # Example
///
/// ```rust
/// use voltage_s7::MemoryAddress;
///
/// let addr: MemoryAddress = "10.3".parse().unwrap();
/// assert_eq!(addr.byte_offset(), 10);
/// assert_eq!(addr.bit_offset(), Some(3));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemoryAddress {
    byte_offset: u32,
    bit_offset: Option<u8>,
}

impl MemoryAddress {
    /// Address of a whole byte.
    pub const fn byte(byte_offset: u32) -> Self {
        Self {
            byte_offset,
            bit_offset: None,
        }
    }

    /// Address of a single bit. Fails if `bit_offset > 7`.
    pub fn bit(byte_offset: u32, bit_offset: u8) -> PlcResult<Self> {
        if bit_offset > MAX_BIT_OFFSET {
            return Err(PlcError::BitOffsetOutOfRange {
                bit: u32::from(bit_offset),
            });
        }
        Ok(Self {
            byte_offset,
            bit_offset: Some(bit_offset),
        })
    }

    #[inline]
    pub fn byte_offset(&self) -> u32 {
        self.byte_offset
    }

    #[inline]
    pub fn bit_offset(&self) -> Option<u8> {
        self.bit_offset
    }
}

impl fmt::Display for MemoryAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.bit_offset {
            Some(bit) => write!(f, "{}.{}", self.byte_offset, bit),
            None => write!(f, "{}", self.byte_offset),
        }
    }
}

impl FromStr for MemoryAddress {
    type Err = PlcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        resolve(s)
    }
}

/// Resolve an address string such as `"12"` or `"12.5"`.
pub fn resolve(text: &str) -> PlcResult<MemoryAddress> {
    let mut parts = text.split('.');
    let byte_text = parts.next().unwrap_or_default();
    let bit_text = parts.next();

    if parts.next().is_some() {
        return Err(PlcError::invalid_address(text));
    }

    let byte_offset = parse_digits(byte_text)
        .and_then(|digits| digits.parse::<u32>().ok())
        .ok_or_else(|| PlcError::invalid_address(text))?;

    match bit_text {
        None => Ok(MemoryAddress::byte(byte_offset)),
        Some(bit_text) => {
            // Oversized bit parts saturate so they still report out of range
            let bit = parse_digits(bit_text)
                .map(|digits| digits.parse::<u32>().unwrap_or(u32::MAX))
                .ok_or_else(|| PlcError::invalid_address(text))?;
            if bit > u32::from(MAX_BIT_OFFSET) {
                return Err(PlcError::BitOffsetOutOfRange { bit });
            }
            MemoryAddress::bit(byte_offset, bit as u8)
        }
    }
}

/// Accept a non-empty run of ASCII digits.
fn parse_digits(text: &str) -> Option<&str> {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(text)
}

// ============================================================================
// Tests
// ============================================================================
