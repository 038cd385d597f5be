//! Driver abstraction for S7 communication
//!
//! The session never speaks the wire protocol itself. It asks a
//! [`PlcConnector`] to open a connection for an [`Endpoint`] and then issues
//! byte- and bit-level reads and writes through the returned
//! [`PlcTransport`] handle.
//!
//! A transport handle is not expected to be safe for concurrent use; the
//! session serializes all calls into it.
//!
//! # Implementing a driver
//!
//! ```rust
//! use voltage_s7::{AreaDescriptor, Endpoint, PlcConnector, PlcResult, PlcTransport};
//!
//! struct NullTransport;
//!
//! impl PlcTransport for NullTransport {
//!     async fn read_bytes(&mut self, _: AreaDescriptor, _: u32, count: usize) -> PlcResult<Vec<u8>> {
//!         Ok(vec![0; count])
//!     }
//!     async fn read_bit(&mut self, _: AreaDescriptor, _: u32, _: u8) -> PlcResult<bool> {
//!         Ok(false)
//!     }
//!     async fn write_bytes(&mut self, _: AreaDescriptor, _: u32, _: &[u8]) -> PlcResult<()> {
//!         Ok(())
//!     }
//!     async fn write_bit(&mut self, _: AreaDescriptor, _: u32, _: u8, _: bool) -> PlcResult<()> {
//!         Ok(())
//!     }
//!     fn is_open(&self) -> bool {
//!         true
//!     }
//!     async fn close(&mut self) -> PlcResult<()> {
//!         Ok(())
//!     }
//! }
//!
//! struct NullConnector;
//!
//! impl PlcConnector for NullConnector {
//!     type Transport = NullTransport;
//!     async fn open(&self, _: &Endpoint) -> PlcResult<NullTransport> {
//!         Ok(NullTransport)
//!     }
//! }
//! ```

use std::fmt;
use std::future::Future;

use crate::area::AreaDescriptor;
use crate::constants::{DEFAULT_RACK, DEFAULT_S7_PORT, DEFAULT_SLOT};
use crate::error::PlcResult;

/// In-process simulated PLC
pub mod memory;

/// S7 CPU family, used by drivers to pick the connection type (TSAP).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CpuType {
    S7200,
    S7200Smart,
    Logo0BA8,
    S7300,
    S7400,
    #[default]
    S71200,
    S71500,
}

impl CpuType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CpuType::S7200 => "S7-200",
            CpuType::S7200Smart => "S7-200 SMART",
            CpuType::Logo0BA8 => "LOGO! 0BA8",
            CpuType::S7300 => "S7-300",
            CpuType::S7400 => "S7-400",
            CpuType::S71200 => "S7-1200",
            CpuType::S71500 => "S7-1500",
        }
    }
}

/// Network location and CPU parameters of one controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub ip: String,
    pub port: u16,
    pub cpu: CpuType,
    pub rack: u16,
    pub slot: u16,
}

impl Endpoint {
    /// Endpoint for an S7-1200 at `ip`, rack 0, slot 1.
    pub fn new<S: Into<String>>(ip: S) -> Self {
        Self {
            ip: ip.into(),
            port: DEFAULT_S7_PORT,
            cpu: CpuType::default(),
            rack: DEFAULT_RACK,
            slot: DEFAULT_SLOT,
        }
    }

    pub fn with_cpu(mut self, cpu: CpuType) -> Self {
        self.cpu = cpu;
        self
    }

    pub fn with_rack_slot(mut self, rack: u16, slot: u16) -> Self {
        self.rack = rack;
        self.slot = slot;
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// `ip:port` string for socket connections.
    pub fn address(&self) -> String {
        format!("{}:{}", self.ip, self.port)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}, rack {}, slot {})",
            self.address(),
            self.cpu.as_str(),
            self.rack,
            self.slot
        )
    }
}

/// An open connection to one controller.
///
/// Multi-byte values travel as big-endian byte runs; see
/// [`crate::codec::S7Codec`].
pub trait PlcTransport: Send {
    /// Read `count` bytes starting at `start`.
    fn read_bytes(
        &mut self,
        area: AreaDescriptor,
        start: u32,
        count: usize,
    ) -> impl Future<Output = PlcResult<Vec<u8>>> + Send;

    /// Read one bit.
    fn read_bit(
        &mut self,
        area: AreaDescriptor,
        byte: u32,
        bit: u8,
    ) -> impl Future<Output = PlcResult<bool>> + Send;

    /// Write `data` starting at `start`.
    fn write_bytes(
        &mut self,
        area: AreaDescriptor,
        start: u32,
        data: &[u8],
    ) -> impl Future<Output = PlcResult<()>> + Send;

    /// Write one bit, leaving the other bits of the byte untouched.
    fn write_bit(
        &mut self,
        area: AreaDescriptor,
        byte: u32,
        bit: u8,
        value: bool,
    ) -> impl Future<Output = PlcResult<()>> + Send;

    /// Whether the underlying link is still usable.
    fn is_open(&self) -> bool;

    /// Close the connection.
    fn close(&mut self) -> impl Future<Output = PlcResult<()>> + Send;
}

/// Opens transport handles.
pub trait PlcConnector: Send + Sync {
    type Transport: PlcTransport + 'static;

    /// Open a new connection to `endpoint`.
    fn open(&self, endpoint: &Endpoint) -> impl Future<Output = PlcResult<Self::Transport>> + Send;
}
