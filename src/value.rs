//! # PLC Value Types
//!
//! The eight S7 data kinds supported by the session and the tagged value
//! that carries exactly one of them.
//!
//! # Memory Layout
//!
//! | Kind | Bytes | Rust type |
//! |------|-------|-----------|
//! | BOOL | 1 bit | `bool` |
//! | BYTE | 1 | `u8` |
//! | WORD | 2 | `u16` |
//! | DWORD | 4 | `u32` |
//! | INT | 2 | `i16` |
//! | DINT | 4 | `i32` |
//! | REAL | 4 | `f32` |
//! | STRING | 256 | `String` (max 254 bytes) |

use std::fmt;
use std::str::FromStr;

use crate::constants::STRING_BUFFER_LEN;
use crate::error::{PlcError, PlcResult};

/// Logical data kind of a PLC variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    Bool,
    Byte,
    Word,
    DWord,
    Int,
    DInt,
    Real,
    String,
}

impl DataType {
    /// All kinds, in the order they are usually offered to users.
    pub const ALL: [DataType; 8] = [
        DataType::Bool,
        DataType::Byte,
        DataType::Word,
        DataType::DWord,
        DataType::Int,
        DataType::DInt,
        DataType::Real,
        DataType::String,
    ];

    /// Parse a type name, ignoring case.
    pub fn parse(name: &str) -> PlcResult<Self> {
        match name.to_ascii_uppercase().as_str() {
            "BOOL" => Ok(DataType::Bool),
            "BYTE" => Ok(DataType::Byte),
            "WORD" => Ok(DataType::Word),
            "DWORD" => Ok(DataType::DWord),
            "INT" => Ok(DataType::Int),
            "DINT" => Ok(DataType::DInt),
            "REAL" => Ok(DataType::Real),
            "STRING" => Ok(DataType::String),
            _ => Err(PlcError::UnsupportedDataType {
                name: name.to_string(),
            }),
        }
    }

    /// Canonical upper-case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Bool => "BOOL",
            DataType::Byte => "BYTE",
            DataType::Word => "WORD",
            DataType::DWord => "DWORD",
            DataType::Int => "INT",
            DataType::DInt => "DINT",
            DataType::Real => "REAL",
            DataType::String => "STRING",
        }
    }

    /// Number of bytes read or written for this kind.
    ///
    /// `Bool` is a single bit and reports 0.
    #[inline]
    pub fn byte_len(&self) -> usize {
        match self {
            DataType::Bool => 0,
            DataType::Byte => 1,
            DataType::Word | DataType::Int => 2,
            DataType::DWord | DataType::DInt | DataType::Real => 4,
            DataType::String => STRING_BUFFER_LEN,
        }
    }

    /// Whether values of this kind address a single bit.
    #[inline]
    pub fn is_bit(&self) -> bool {
        matches!(self, DataType::Bool)
    }

    /// Parse value text strictly into this kind.
    ///
    /// Numbers must fit the target range exactly. Surrounding whitespace,
    /// negative values for unsigned kinds and digit separators are rejected.
    /// Strings are taken verbatim.
    pub fn parse_value(&self, text: &str) -> PlcResult<PlcValue> {
        let fail = || PlcError::value_format(*self, text);
        if *self != DataType::String && has_outer_whitespace(text) {
            return Err(fail());
        }

        match self {
            DataType::Bool => parse_bool(text).map(PlcValue::Bool).ok_or_else(fail),
            DataType::Byte => text.parse::<u8>().map(PlcValue::Byte).map_err(|_| fail()),
            DataType::Word => text.parse::<u16>().map(PlcValue::Word).map_err(|_| fail()),
            DataType::DWord => text.parse::<u32>().map(PlcValue::DWord).map_err(|_| fail()),
            DataType::Int => text.parse::<i16>().map(PlcValue::Int).map_err(|_| fail()),
            DataType::DInt => text.parse::<i32>().map(PlcValue::DInt).map_err(|_| fail()),
            DataType::Real => {
                let v = text.parse::<f32>().map_err(|_| fail())?;
                if !v.is_finite() {
                    return Err(fail());
                }
                Ok(PlcValue::Real(v))
            }
            DataType::String => Ok(PlcValue::Str(text.to_string())),
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataType {
    type Err = PlcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DataType::parse(s)
    }
}

fn has_outer_whitespace(text: &str) -> bool {
    text.trim() != text
}

fn parse_bool(text: &str) -> Option<bool> {
    if text.eq_ignore_ascii_case("true") {
        Some(true)
    } else if text.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

/// A value of one PLC data kind.
///
/// # Example
///
/// ```rust
/// use voltage_s7::{DataType, PlcValue};
///
/// let v = DataType::Int.parse_value("-300").unwrap();
/// assert_eq!(v, PlcValue::Int(-300));
/// assert_eq!(v.data_type(), DataType::Int);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum PlcValue {
    Bool(bool),
    Byte(u8),
    Word(u16),
    DWord(u32),
    Int(i16),
    DInt(i32),
    Real(f32),
    Str(String),
}

impl PlcValue {
    /// The kind carried by this value.
    pub fn data_type(&self) -> DataType {
        match self {
            PlcValue::Bool(_) => DataType::Bool,
            PlcValue::Byte(_) => DataType::Byte,
            PlcValue::Word(_) => DataType::Word,
            PlcValue::DWord(_) => DataType::DWord,
            PlcValue::Int(_) => DataType::Int,
            PlcValue::DInt(_) => DataType::DInt,
            PlcValue::Real(_) => DataType::Real,
            PlcValue::Str(_) => DataType::String,
        }
    }

    /// Numeric view of the value, `None` for strings.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PlcValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            PlcValue::Byte(v) => Some(f64::from(*v)),
            PlcValue::Word(v) => Some(f64::from(*v)),
            PlcValue::DWord(v) => Some(f64::from(*v)),
            PlcValue::Int(v) => Some(f64::from(*v)),
            PlcValue::DInt(v) => Some(f64::from(*v)),
            PlcValue::Real(v) => Some(f64::from(*v)),
            PlcValue::Str(_) => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PlcValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PlcValue::Str(s) => Some(s),
            _ => None,
        }
    }

    /// JSON representation used by the HTTP envelopes.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            PlcValue::Bool(v) => serde_json::Value::from(*v),
            PlcValue::Byte(v) => serde_json::Value::from(*v),
            PlcValue::Word(v) => serde_json::Value::from(*v),
            PlcValue::DWord(v) => serde_json::Value::from(*v),
            PlcValue::Int(v) => serde_json::Value::from(*v),
            PlcValue::DInt(v) => serde_json::Value::from(*v),
            PlcValue::Real(v) => serde_json::Value::from(*v),
            PlcValue::Str(v) => serde_json::Value::from(v.as_str()),
        }
    }
}

impl fmt::Display for PlcValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlcValue::Bool(v) => write!(f, "{}", v),
            PlcValue::Byte(v) => write!(f, "{}", v),
            PlcValue::Word(v) => write!(f, "{}", v),
            PlcValue::DWord(v) => write!(f, "{}", v),
            PlcValue::Int(v) => write!(f, "{}", v),
            PlcValue::DInt(v) => write!(f, "{}", v),
            PlcValue::Real(v) => write!(f, "{}", v),
            PlcValue::Str(v) => f.write_str(v),
        }
    }
}

// ============================================================================
// From implementations for ergonomic construction
// ============================================================================

impl From<bool> for PlcValue {
    fn from(v: bool) -> Self {
        PlcValue::Bool(v)
    }
}

impl From<u8> for PlcValue {
    fn from(v: u8) -> Self {
        PlcValue::Byte(v)
    }
}

impl From<u16> for PlcValue {
    fn from(v: u16) -> Self {
        PlcValue::Word(v)
    }
}

impl From<u32> for PlcValue {
    fn from(v: u32) -> Self {
        PlcValue::DWord(v)
    }
}

impl From<i16> for PlcValue {
    fn from(v: i16) -> Self {
        PlcValue::Int(v)
    }
}

impl From<i32> for PlcValue {
    fn from(v: i32) -> Self {
        PlcValue::DInt(v)
    }
}

impl From<f32> for PlcValue {
    fn from(v: f32) -> Self {
        PlcValue::Real(v)
    }
}

impl From<&str> for PlcValue {
    fn from(v: &str) -> Self {
        PlcValue::Str(v.to_string())
    }
}

impl From<String> for PlcValue {
    fn from(v: String) -> Self {
        PlcValue::Str(v)
    }
}

// ============================================================================
// Tests
// ============================================================================
