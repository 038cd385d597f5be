//! # Voltage S7 - Typed Data Access for Siemens S7 PLCs
//!
//! **Version:** 0.1.0
//! **License:** MIT
//!
//! A small async data-access layer that sits between application code (UI,
//! HTTP handlers, test loops) and an S7 protocol driver. Callers address PLC
//! memory with a data block number, a textual byte/bit address and a data
//! type name; the library validates, resolves and marshals the value.
//!
//! ## Features
//!
//! - **Single owner**: one [`DeviceSession`] per controller, shared via `Arc`
//! - **Serialized access**: the driver handle is never used concurrently
//! - **Strict typing**: values are parsed and range-checked before any I/O
//! - **Status events**: callbacks and a broadcast channel on every transition
//! - **Driver agnostic**: any [`PlcConnector`] / [`PlcTransport`] pair
//!
//! ## Supported Data Types
//!
//! | Name | Rust value | Bytes |
//! |------|------------|-------|
//! | BOOL | `bool` | bit |
//! | BYTE | `u8` | 1 |
//! | WORD | `u16` | 2 |
//! | DWORD | `u32` | 4 |
//! | INT | `i16` | 2 |
//! | DINT | `i32` | 4 |
//! | REAL | `f32` | 4 |
//! | STRING | `String` (max 254) | 256 |
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use voltage_s7::{AreaDescriptor, DeviceSession, PlcResult, PlcValue};
//! use voltage_s7::transport::memory::MemoryConnector;
//!
//! #[tokio::main]
//! async fn main() -> PlcResult<()> {
//!     let session = Arc::new(DeviceSession::new(MemoryConnector::new()));
//!     session.connect(&voltage_s7::Endpoint::new("192.168.0.10")).await?;
//!
//!     let db = AreaDescriptor::data_block(1000);
//!     session.write_typed(db, "2", "INT", "10", None).await?;
//!     assert_eq!(session.read_typed(db, "2", "INT", None).await?, PlcValue::Int(10));
//!
//!     session.disconnect().await;
//!     Ok(())
//! }
//! ```

// ============================================================================
// Core modules
// ============================================================================

/// Core error types and result handling
pub mod error;

/// Protocol constants and string layout
pub mod constants;

/// Textual byte/bit address resolution
pub mod address;

/// Memory areas and area descriptors
pub mod area;

/// Data type names and typed values
pub mod value;

/// Big-endian value and S7 string encoding
pub mod codec;

/// Driver abstraction and simulated driver
pub mod transport;

/// Connection owner and typed read/write dispatch
pub mod session;

// ============================================================================
// Application modules
// ============================================================================

/// Request/reply mapping for the HTTP surface
pub mod api;

/// JSON settings file
pub mod config;

/// Continuous read/write test
pub mod stress;

/// Log subscriber setup
pub mod logging;

// ============================================================================
// Re-exports for convenience
// ============================================================================

// === Async runtime (users can use voltage_s7::tokio) ===
pub use tokio;

// === Session API ===
pub use session::{DeviceSession, SessionStats, StatusCallback};

// === Error handling ===
pub use error::{PlcError, PlcResult};

// === Core types ===
pub use address::{resolve, MemoryAddress};
pub use area::{Area, AreaDescriptor};
pub use value::{DataType, PlcValue};
pub use codec::S7Codec;

// === Drivers ===
pub use transport::{CpuType, Endpoint, PlcConnector, PlcTransport};

// === Application ===
pub use api::{ApiStatus, PlcApi};
pub use config::{ConfigError, Settings, SettingsLoader};
pub use stress::{StopReason, StressReport, StressTest};

// === Limits ===
pub use constants::{MAX_BIT_OFFSET, STRING_BUFFER_LEN, STRING_MAX_LEN};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get library information
pub fn info() -> String {
    format!("Voltage S7 v{} - Typed data access for Siemens S7 PLCs", VERSION)
}
