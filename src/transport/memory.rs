//! Simulated controller kept entirely in process memory.
//!
//! Every (area, DB number) pair owns a zero-initialised byte image that is
//! grown on demand up to [`MEMORY_AREA_SIZE`] bytes. Writes are echoed back
//! by later reads. The simulator can also be told to refuse connections or
//! to drop the link, which makes it useful for demos and tests.
//!
//! ```rust
//! # tokio_test::block_on(async {
//! use voltage_s7::{AreaDescriptor, Endpoint, PlcConnector, PlcTransport};
//! use voltage_s7::transport::memory::MemoryConnector;
//!
//! let connector = MemoryConnector::new();
//! let mut link = connector.open(&Endpoint::new("127.0.0.1")).await.unwrap();
//! link.write_bytes(AreaDescriptor::data_block(1), 0, &[1, 2]).await.unwrap();
//! assert_eq!(link.read_bytes(AreaDescriptor::data_block(1), 0, 2).await.unwrap(), vec![1, 2]);
//! # });
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::area::AreaDescriptor;
use crate::codec::{get_bit, set_bit};
use crate::error::{PlcError, PlcResult};
use crate::transport::{Endpoint, PlcConnector, PlcTransport};

/// Largest simulated area, in bytes.
pub const MEMORY_AREA_SIZE: usize = 65_536;

/// Shared state of the simulated controller.
#[derive(Debug, Default)]
pub struct MemoryPlc {
    images: Mutex<HashMap<AreaDescriptor, Vec<u8>>>,
    refuse_connections: AtomicBool,
    link_up: AtomicBool,
    opened: AtomicUsize,
}

impl MemoryPlc {
    fn with_image<R>(
        &self,
        area: AreaDescriptor,
        end: usize,
        f: impl FnOnce(&mut Vec<u8>) -> R,
    ) -> PlcResult<R> {
        if end > MEMORY_AREA_SIZE {
            return Err(PlcError::transport(format!(
                "Address out of range for {}: {} > {}",
                area, end, MEMORY_AREA_SIZE
            )));
        }
        let mut images = self
            .images
            .lock()
            .map_err(|_| PlcError::transport("Simulator state poisoned"))?;
        let image = images.entry(area).or_default();
        if image.len() < end {
            image.resize(end, 0);
        }
        Ok(f(image))
    }

    /// Snapshot of `count` bytes at `start`.
    pub fn peek(&self, area: AreaDescriptor, start: u32, count: usize) -> PlcResult<Vec<u8>> {
        let start = start as usize;
        self.with_image(area, start.saturating_add(count), |img| img[start..start + count].to_vec())
    }

    /// Write bytes directly, bypassing any connection.
    pub fn poke(&self, area: AreaDescriptor, start: u32, data: &[u8]) -> PlcResult<()> {
        let start = start as usize;
        self.with_image(area, start.saturating_add(data.len()), |img| {
            img[start..start + data.len()].copy_from_slice(data)
        })
    }

    /// Number of successful `open` calls so far.
    pub fn open_count(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// Make subsequent `open` calls fail.
    pub fn set_refuse_connections(&self, refuse: bool) {
        self.refuse_connections.store(refuse, Ordering::SeqCst);
    }

    /// Simulate a cable pull: every open transport starts failing and
    /// reports itself closed.
    pub fn drop_link(&self) {
        self.link_up.store(false, Ordering::SeqCst);
    }
}

/// Connector producing [`MemoryTransport`] handles onto one [`MemoryPlc`].
#[derive(Debug, Clone, Default)]
pub struct MemoryConnector {
    plc: Arc<MemoryPlc>,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Access to the simulated controller.
    pub fn plc(&self) -> &Arc<MemoryPlc> {
        &self.plc
    }
}

impl PlcConnector for MemoryConnector {
    type Transport = MemoryTransport;

    async fn open(&self, endpoint: &Endpoint) -> PlcResult<MemoryTransport> {
        if self.plc.refuse_connections.load(Ordering::SeqCst) {
            return Err(PlcError::transport(format!(
                "Connection refused by {}",
                endpoint.address()
            )));
        }
        self.plc.link_up.store(true, Ordering::SeqCst);
        self.plc.opened.fetch_add(1, Ordering::SeqCst);
        debug!("Simulated PLC opened for {}", endpoint);
        Ok(MemoryTransport {
            plc: Arc::clone(&self.plc),
            open: true,
        })
    }
}

/// Open handle onto a [`MemoryPlc`].
#[derive(Debug)]
pub struct MemoryTransport {
    plc: Arc<MemoryPlc>,
    open: bool,
}

impl MemoryTransport {
    fn ensure_link(&self) -> PlcResult<()> {
        if !self.is_open() {
            return Err(PlcError::transport("Link down"));
        }
        Ok(())
    }
}

impl PlcTransport for MemoryTransport {
    async fn read_bytes(
        &mut self,
        area: AreaDescriptor,
        start: u32,
        count: usize,
    ) -> PlcResult<Vec<u8>> {
        self.ensure_link()?;
        self.plc.peek(area, start, count)
    }

    async fn read_bit(&mut self, area: AreaDescriptor, byte: u32, bit: u8) -> PlcResult<bool> {
        self.ensure_link()?;
        let raw = self.plc.peek(area, byte, 1)?;
        Ok(get_bit(raw[0], bit))
    }

    async fn write_bytes(&mut self, area: AreaDescriptor, start: u32, data: &[u8]) -> PlcResult<()> {
        self.ensure_link()?;
        self.plc.poke(area, start, data)
    }

    async fn write_bit(
        &mut self,
        area: AreaDescriptor,
        byte: u32,
        bit: u8,
        value: bool,
    ) -> PlcResult<()> {
        self.ensure_link()?;
        let start = byte as usize;
        self.plc.with_image(area, start.saturating_add(1), |img| {
            img[start] = set_bit(img[start], bit, value);
        })
    }

    fn is_open(&self) -> bool {
        self.open && self.plc.link_up.load(Ordering::SeqCst)
    }

    async fn close(&mut self) -> PlcResult<()> {
        self.open = false;
        Ok(())
    }
}
