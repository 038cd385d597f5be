//! Error types for PLC data access
//!
//! Every failure the session can report is a [`PlcError`] variant. Input
//! problems (address, type name, value text) are rejected before the transport
//! is touched; transport faults are wrapped with the operation context that
//! triggered them.

use thiserror::Error;

use crate::value::DataType;

/// Result alias used throughout the crate.
pub type PlcResult<T> = Result<T, PlcError>;

/// Errors produced by address resolution, value marshaling and the session.
#[derive(Error, Debug)]
pub enum PlcError {
    /// Address text is not `N` or `N.M` with non-negative integers.
    #[error("Invalid address format: '{input}'")]
    InvalidAddressFormat { input: String },

    /// Bit part of an address is larger than 7.
    #[error("Bit offset {bit} out of range (must be 0-7)")]
    BitOffsetOutOfRange { bit: u32 },

    /// Operation attempted while no connection is open.
    #[error("Not connected to PLC")]
    NotConnected,

    /// Type name does not map to any supported kind.
    #[error("Unsupported data type: {name}")]
    UnsupportedDataType { name: String },

    /// Value text could not be parsed into the target kind.
    #[error("Cannot convert '{value}' to {kind}")]
    ValueFormat { kind: DataType, value: String },

    /// Encoded string does not fit into an S7 string.
    #[error("String too long: {len} bytes (max {max})")]
    StringTooLong { len: usize, max: usize },

    /// The driver failed while reading.
    #[error("Read failed at {context}: {source}")]
    TransportRead {
        context: String,
        #[source]
        source: Box<PlcError>,
    },

    /// The driver failed while writing.
    #[error("Write failed at {context}: {source}")]
    TransportWrite {
        context: String,
        #[source]
        source: Box<PlcError>,
    },

    /// Opening the connection failed.
    #[error("Connection to {endpoint} failed: {message}")]
    Connect { endpoint: String, message: String },

    /// Raw fault reported by the driver.
    #[error("Transport error: {message}")]
    Transport { message: String },

    /// Invalid configuration value.
    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

impl PlcError {
    /// Create an invalid address error
    pub fn invalid_address<S: Into<String>>(input: S) -> Self {
        Self::InvalidAddressFormat {
            input: input.into(),
        }
    }

    /// Create a value format error
    pub fn value_format<S: Into<String>>(kind: DataType, value: S) -> Self {
        Self::ValueFormat {
            kind,
            value: value.into(),
        }
    }

    /// Create a raw transport error
    pub fn transport<S: Into<String>>(message: S) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Create a connect error
    pub fn connect<E: Into<String>, M: Into<String>>(endpoint: E, message: M) -> Self {
        Self::Connect {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Wrap a driver fault raised during a read.
    pub fn read_failure<S: Into<String>>(context: S, source: PlcError) -> Self {
        Self::TransportRead {
            context: context.into(),
            source: Box::new(source),
        }
    }

    /// Wrap a driver fault raised during a write.
    pub fn write_failure<S: Into<String>>(context: S, source: PlcError) -> Self {
        Self::TransportWrite {
            context: context.into(),
            source: Box::new(source),
        }
    }

    /// Whether the error was caused by caller input or session state rather
    /// than by the device or driver.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidAddressFormat { .. }
                | Self::BitOffsetOutOfRange { .. }
                | Self::NotConnected
                | Self::UnsupportedDataType { .. }
                | Self::ValueFormat { .. }
                | Self::StringTooLong { .. }
        )
    }

    /// Whether the error came from the driver.
    pub fn is_transport_error(&self) -> bool {
        matches!(
            self,
            Self::TransportRead { .. }
                | Self::TransportWrite { .. }
                | Self::Transport { .. }
                | Self::Connect { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_error_classification() {
        assert!(PlcError::NotConnected.is_client_error());
        assert!(PlcError::invalid_address("a.b").is_client_error());
        assert!(PlcError::BitOffsetOutOfRange { bit: 8 }.is_client_error());
        assert!(PlcError::value_format(DataType::Byte, "256").is_client_error());
        assert!(PlcError::StringTooLong { len: 255, max: 254 }.is_client_error());

        let wrapped = PlcError::read_failure("DB1.DBX0.0", PlcError::transport("reset"));
        assert!(!wrapped.is_client_error());
        assert!(wrapped.is_transport_error());
        assert!(!PlcError::configuration("bad").is_client_error());
    }

    #[test]
    fn test_display_messages() {
        assert_eq!(
            PlcError::value_format(DataType::Byte, "256").to_string(),
            "Cannot convert '256' to BYTE"
        );
        assert_eq!(
            PlcError::BitOffsetOutOfRange { bit: 8 }.to_string(),
            "Bit offset 8 out of range (must be 0-7)"
        );
        let wrapped = PlcError::write_failure("DB1 @ 2 (INT)", PlcError::transport("timeout"));
        assert_eq!(
            wrapped.to_string(),
            "Write failed at DB1 @ 2 (INT): Transport error: timeout"
        );
    }

    #[test]
    fn test_source_chain() {
        use std::error::Error as _;

        let wrapped = PlcError::read_failure("ctx", PlcError::transport("broken pipe"));
        let source = wrapped.source().map(|s| s.to_string());
        assert_eq!(source.as_deref(), Some("Transport error: broken pipe"));
    }
}
