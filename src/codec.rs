//! # S7 Codec
//!
//! Conversion between raw PLC memory and [`PlcValue`]s.
//!
//! ## Fixed-width kinds
//!
//! S7 CPUs store multi-byte values big-endian:
//!
//! | Kind | Bytes | Example |
//! |------|-------|---------|
//! | WORD 0x1234 | 2 | `[0x12, 0x34]` |
//! | DINT -2 | 4 | `[0xFF, 0xFF, 0xFF, 0xFE]` |
//! | REAL 25.0 | 4 | `[0x41, 0xC8, 0x00, 0x00]` |
//!
//! ## Strings
//!
//! A `STRING[254]` is a 256-byte block:
//!
//! ```text
//! +--------+--------+--------------------+-----------+
//! | max=254| len    | payload (len bytes)| zero fill |
//! +--------+--------+--------------------+-----------+
//!   byte 0   byte 1   bytes 2..2+len       ..256
//! ```
//!
//! Byte 0 always carries the declared capacity (254), never the actual
//! length. Payload bytes are single-byte characters (ISO 8859-1), so every
//! byte decodes to exactly one `char` and only U+0000..=U+00FF can be written.

use bytes::{BufMut, BytesMut};

use crate::constants::{STRING_BUFFER_LEN, STRING_HEADER_LEN, STRING_MAX_LEN};
use crate::error::{PlcError, PlcResult};
use crate::value::{DataType, PlcValue};

/// S7 codec for value encoding/decoding.
pub struct S7Codec;

impl S7Codec {
    /// Encode a value into the bytes written to PLC memory.
    ///
    /// `Bool` has no byte representation (it is written as a bit) and is
    /// rejected as an unsupported kind.
    pub fn encode(value: &PlcValue) -> PlcResult<Vec<u8>> {
        match value {
            PlcValue::Bool(_) => Err(PlcError::UnsupportedDataType {
                name: "BOOL (byte encoding)".to_string(),
            }),
            PlcValue::Byte(v) => Ok(vec![*v]),
            PlcValue::Word(v) => Ok(v.to_be_bytes().to_vec()),
            PlcValue::DWord(v) => Ok(v.to_be_bytes().to_vec()),
            PlcValue::Int(v) => Ok(v.to_be_bytes().to_vec()),
            PlcValue::DInt(v) => Ok(v.to_be_bytes().to_vec()),
            PlcValue::Real(v) => Ok(v.to_be_bytes().to_vec()),
            PlcValue::Str(s) => encode_string(s),
        }
    }

    /// Decode raw bytes read from PLC memory as the given kind.
    pub fn decode(data_type: DataType, raw: &[u8]) -> PlcResult<PlcValue> {
        let expected = data_type.byte_len();
        if data_type != DataType::Bool && raw.len() < expected {
            return Err(PlcError::transport(format!(
                "Short read for {}: expected {} bytes, got {}",
                data_type,
                expected,
                raw.len()
            )));
        }

        match data_type {
            DataType::Bool => raw
                .first()
                .map(|b| PlcValue::Bool(*b & 0x01 != 0))
                .ok_or_else(|| PlcError::transport("Short read for BOOL: no data")),
            DataType::Byte => Ok(PlcValue::Byte(raw[0])),
            DataType::Word => Ok(PlcValue::Word(u16::from_be_bytes([raw[0], raw[1]]))),
            DataType::Int => Ok(PlcValue::Int(i16::from_be_bytes([raw[0], raw[1]]))),
            DataType::DWord => Ok(PlcValue::DWord(u32::from_be_bytes(take_4(raw)))),
            DataType::DInt => Ok(PlcValue::DInt(i32::from_be_bytes(take_4(raw)))),
            DataType::Real => Ok(PlcValue::Real(f32::from_be_bytes(take_4(raw)))),
            DataType::String => Ok(PlcValue::Str(decode_string(raw))),
        }
    }
}

#[inline]
fn take_4(raw: &[u8]) -> [u8; 4] {
    [raw[0], raw[1], raw[2], raw[3]]
}

/// Build the 256-byte S7 string block for `text`.
///
/// # Example
///
/// ```rust
/// use voltage_s7::codec::encode_string;
///
/// let buf = encode_string("HI").unwrap();
/// assert_eq!(buf.len(), 256);
/// assert_eq!(&buf[..4], &[254, 2, b'H', b'I']);
/// ```
///
/// Characters above U+00FF have no single-byte form and fail with
/// `ValueFormat`.
pub fn encode_string(text: &str) -> PlcResult<Vec<u8>> {
    let len = text.chars().count();
    if len > STRING_MAX_LEN {
        return Err(PlcError::StringTooLong {
            len,
            max: STRING_MAX_LEN,
        });
    }
    let payload = text
        .chars()
        .map(|ch| u8::try_from(u32::from(ch)).ok())
        .collect::<Option<Vec<u8>>>()
        .ok_or_else(|| PlcError::value_format(DataType::String, text))?;

    let mut buf = BytesMut::with_capacity(STRING_BUFFER_LEN);
    buf.put_u8(STRING_MAX_LEN as u8);
    buf.put_u8(payload.len() as u8);
    buf.put_slice(&payload);
    buf.resize(STRING_BUFFER_LEN, 0);
    Ok(buf.to_vec())
}

/// Decode an S7 string block.
///
/// The payload length is taken from the header, bounded by the declared
/// capacity and by the data actually present. Each payload byte maps to the
/// `char` of the same code point. Trailing NULs are stripped.
pub fn decode_string(raw: &[u8]) -> String {
    if raw.len() < STRING_HEADER_LEN {
        return String::new();
    }

    let declared_max = raw[0] as usize;
    let actual = raw[1] as usize;
    let available = raw.len() - STRING_HEADER_LEN;
    let len = actual.min(declared_max).min(STRING_MAX_LEN).min(available);

    let payload = &raw[STRING_HEADER_LEN..STRING_HEADER_LEN + len];
    let text: String = payload.iter().map(|&b| char::from(b)).collect();
    text.trim_end_matches('\0').to_string()
}

/// Extract bit `bit` (0 = LSB) from a byte.
#[inline]
pub fn get_bit(byte: u8, bit: u8) -> bool {
    (byte >> (bit & 0x07)) & 0x01 != 0
}

/// Return `byte` with bit `bit` set or cleared.
#[inline]
pub fn set_bit(byte: u8, bit: u8, value: bool) -> u8 {
    let mask = 1u8 << (bit & 0x07);
    if value {
        byte | mask
    } else {
        byte & !mask
    }
}

// ============================================================================
// Tests
// ============================================================================
