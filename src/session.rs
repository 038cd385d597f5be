//! Device session: one owned connection to one controller
//!
//! [`DeviceSession`] is the single point through which every caller (UI,
//! HTTP, test loops) reaches a PLC. It owns the transport handle, serializes
//! calls into it, resolves addresses, dispatches on the data type and
//! marshals values.
//!
//! # Guard order
//!
//! Every read/write checks, in order:
//!
//! 1. the session is connected (`NotConnected`)
//! 2. the address resolves (`InvalidAddressFormat`, `BitOffsetOutOfRange`)
//! 3. the type name is supported (`UnsupportedDataType`)
//! 4. for writes, the value parses and encodes (`ValueFormat`, `StringTooLong`)
//!
//! Only then is the transport lock taken. The lock covers the transport call
//! alone; parsing, decoding and logging happen outside it.
//!
//! # Connection status events
//!
//! An event is emitted for every transition: `true` after a successful
//! connect, `false` after a failed connect attempt, after `disconnect`, and
//! when the transport reports the link closed after a failed read/write.
//!
//! # Example
//!
//! ```rust
//! # tokio_test::block_on(async {
//! use std::sync::Arc;
//! use voltage_s7::{Area, DeviceSession, PlcValue};
//! use voltage_s7::transport::memory::MemoryConnector;
//!
//! let session = Arc::new(DeviceSession::new(MemoryConnector::new()));
//! assert!(session.connect_to("192.168.0.10").await);
//!
//! session.write(Area::DataBlock, 1, "2", "INT", "10").await.unwrap();
//! let value = session.read(Area::DataBlock, 1, "2", "INT").await.unwrap();
//! assert_eq!(value, PlcValue::Int(10));
//! # });
//! ```

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use tokio::sync::{broadcast, Mutex};
use tracing::{debug, error, info, warn};

use crate::address::{resolve, MemoryAddress};
use crate::area::{Area, AreaDescriptor};
use crate::codec::S7Codec;
use crate::constants::MAX_BIT_OFFSET;
use crate::error::{PlcError, PlcResult};
use crate::transport::{Endpoint, PlcConnector, PlcTransport};
use crate::value::{DataType, PlcValue};

/// Callback invoked with the new connection status.
pub type StatusCallback = Arc<dyn Fn(bool) + Send + Sync>;

/// Buffered status events per subscriber before the oldest are dropped.
const STATUS_CHANNEL_CAPACITY: usize = 16;

/// Counters describing the session's activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub reads: u64,
    pub writes: u64,
    pub failures: u64,
    pub connects: u64,
    pub disconnects: u64,
}

#[derive(Debug, Default)]
struct Counters {
    reads: AtomicU64,
    writes: AtomicU64,
    failures: AtomicU64,
    connects: AtomicU64,
    disconnects: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> SessionStats {
        SessionStats {
            reads: self.reads.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            connects: self.connects.load(Ordering::Relaxed),
            disconnects: self.disconnects.load(Ordering::Relaxed),
        }
    }
}

/// Where an operation landed, for log lines and error context.
#[derive(Debug, Clone, Copy)]
struct Target {
    area: AreaDescriptor,
    address: MemoryAddress,
    data_type: DataType,
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} @ {} ({})", self.area, self.address, self.data_type)
    }
}

/// Bytes or bit read back from the transport.
enum RawRead {
    Bit(bool),
    Bytes(Vec<u8>),
}

/// What will be handed to the transport for a write.
enum RawWrite {
    Bit(bool),
    Bytes(Vec<u8>),
}

/// Owner of one controller connection.
///
/// Share it between callers with `Arc<DeviceSession<_>>`.
pub struct DeviceSession<C: PlcConnector> {
    connector: C,
    handle: Mutex<Option<C::Transport>>,
    connected: AtomicBool,
    status_tx: broadcast::Sender<bool>,
    callbacks: RwLock<Vec<StatusCallback>>,
    counters: Counters,
}

impl<C: PlcConnector> DeviceSession<C> {
    /// Create a disconnected session that opens connections through
    /// `connector`.
    pub fn new(connector: C) -> Self {
        let (status_tx, _) = broadcast::channel(STATUS_CHANNEL_CAPACITY);
        Self {
            connector,
            handle: Mutex::new(None),
            connected: AtomicBool::new(false),
            status_tx,
            callbacks: RwLock::new(Vec::new()),
            counters: Counters::default(),
        }
    }

    /// The connector used to open transport handles.
    pub fn connector(&self) -> &C {
        &self.connector
    }

    // ========================================================================
    // Connection lifecycle
    // ========================================================================

    /// Open the connection to `endpoint`.
    ///
    /// Returns immediately if a connection is already open. Concurrent
    /// attempts are serialized; only the first one opens a transport.
    pub async fn connect(&self, endpoint: &Endpoint) -> PlcResult<()> {
        let mut guard = loop {
            let mut guard = self.handle.lock().await;
            if guard.is_none() {
                break guard;
            }
            if matches!(&*guard, Some(transport) if transport.is_open()) {
                drop(guard);
                info!("PLC already connected, skipping reconnect to {}", endpoint);
                return Ok(());
            }

            // Stale handle whose link went away without a failed call noticing.
            // Reported with the lock released, then the state is checked again.
            self.discard_handle(&mut guard).await;
            drop(guard);

            warn!("Discarded stale PLC connection before reconnecting");
            self.notify(false);
        };

        match self.connector.open(endpoint).await {
            Ok(transport) if transport.is_open() => {
                *guard = Some(transport);
                self.connected.store(true, Ordering::SeqCst);
                drop(guard);

                Counters::bump(&self.counters.connects);
                info!("PLC connected: {}", endpoint);
                self.notify(true);
                Ok(())
            }
            Ok(mut transport) => {
                close_quietly(&mut transport).await;
                drop(guard);

                warn!("PLC connection to {} did not come up, check the IP settings", endpoint);
                self.notify(false);
                Err(PlcError::connect(
                    endpoint.to_string(),
                    "transport reported closed after open",
                ))
            }
            Err(e) => {
                drop(guard);

                error!("PLC connection to {} failed: {}", endpoint, e);
                self.notify(false);
                Err(PlcError::connect(endpoint.to_string(), e.to_string()))
            }
        }
    }

    /// Connect to `ip` with default CPU parameters, reporting only success.
    ///
    /// Failures are logged, not returned.
    pub async fn connect_to(&self, ip: &str) -> bool {
        self.connect(&Endpoint::new(ip)).await.is_ok()
    }

    /// Close the connection. Does nothing if already disconnected.
    pub async fn disconnect(&self) {
        let mut guard = self.handle.lock().await;
        let Some(mut transport) = guard.take() else {
            debug!("PLC disconnect requested while not connected");
            return;
        };
        self.connected.store(false, Ordering::SeqCst);
        if let Err(e) = transport.close().await {
            warn!("Error while closing PLC connection: {}", e);
        }
        drop(guard);

        Counters::bump(&self.counters.disconnects);
        info!("PLC disconnected");
        self.notify(false);
    }

    /// Whether a connection is currently open. Never blocks.
    #[inline]
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    // ========================================================================
    // Status notification
    // ========================================================================

    /// Register a callback run on every connection status transition.
    ///
    /// Callbacks run on the task that caused the transition and must not
    /// block.
    pub fn on_connection_status_changed<F>(&self, callback: F)
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        match self.callbacks.write() {
            Ok(mut callbacks) => callbacks.push(Arc::new(callback)),
            Err(poisoned) => poisoned.into_inner().push(Arc::new(callback)),
        }
    }

    /// Receive connection status transitions on a channel.
    pub fn subscribe(&self) -> broadcast::Receiver<bool> {
        self.status_tx.subscribe()
    }

    fn notify(&self, connected: bool) {
        // No receivers is fine
        let _ = self.status_tx.send(connected);

        let callbacks: Vec<StatusCallback> = match self.callbacks.read() {
            Ok(callbacks) => callbacks.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        for callback in callbacks {
            callback(connected);
        }
    }

    /// Snapshot of the activity counters.
    pub fn get_stats(&self) -> SessionStats {
        self.counters.snapshot()
    }

    // ========================================================================
    // Caller surface
    // ========================================================================

    /// Read `type_name` at `address` in `area` (DB number `db` for data blocks).
    pub async fn read(
        &self,
        area: Area,
        db: u16,
        address: &str,
        type_name: &str,
    ) -> PlcResult<PlcValue> {
        self.read_typed(AreaDescriptor::new(area, db), address, type_name, None)
            .await
    }

    /// Write the text `value` as `type_name` at `address`.
    pub async fn write(
        &self,
        area: Area,
        db: u16,
        address: &str,
        type_name: &str,
        value: &str,
    ) -> PlcResult<()> {
        self.write_typed(AreaDescriptor::new(area, db), address, type_name, value, None)
            .await
    }

    // ========================================================================
    // Typed read
    // ========================================================================

    /// Read one typed value.
    ///
    /// For `BOOL`, the bit is taken from `bit_override`, then from the
    /// address text, then defaults to 0. Other kinds ignore any bit offset.
    pub async fn read_typed(
        &self,
        area: AreaDescriptor,
        address: &str,
        type_name: &str,
        bit_override: Option<u8>,
    ) -> PlcResult<PlcValue> {
        let result = self.read_inner(area, address, type_name, bit_override).await;
        match &result {
            Ok(value) => {
                Counters::bump(&self.counters.reads);
                info!("PLC read {} @ {} ({}) -> {}", area, address, type_name, value);
            }
            Err(e) => {
                Counters::bump(&self.counters.failures);
                error!("PLC read {} @ {} ({}) failed: {}", area, address, type_name, e);
            }
        }
        result
    }

    async fn read_inner(
        &self,
        area: AreaDescriptor,
        address_text: &str,
        type_name: &str,
        bit_override: Option<u8>,
    ) -> PlcResult<PlcValue> {
        if !self.is_connected() {
            return Err(PlcError::NotConnected);
        }
        let address = resolve(address_text)?;
        let data_type = DataType::parse(type_name)?;
        let target = Target {
            area,
            address,
            data_type,
        };

        let byte = address.byte_offset();
        let bit = if data_type.is_bit() {
            effective_bit(address, bit_override)?
        } else {
            0
        };
        let (result, link_lost) = {
            let mut guard = self.handle.lock().await;
            let transport = (*guard).as_mut().ok_or(PlcError::NotConnected)?;

            let result = if data_type.is_bit() {
                transport.read_bit(area, byte, bit).await.map(RawRead::Bit)
            } else {
                transport
                    .read_bytes(area, byte, data_type.byte_len())
                    .await
                    .map(RawRead::Bytes)
            };

            let link_lost = result.is_err() && !transport.is_open();
            if link_lost {
                self.discard_handle(&mut guard).await;
            }
            (result, link_lost)
        };

        if link_lost {
            warn!("PLC link lost during read at {}", target);
            self.notify(false);
        }

        match result.map_err(|e| PlcError::read_failure(target.to_string(), e))? {
            RawRead::Bit(bit) => Ok(PlcValue::Bool(bit)),
            RawRead::Bytes(raw) => S7Codec::decode(data_type, &raw)
                .map_err(|e| PlcError::read_failure(target.to_string(), e)),
        }
    }

    // ========================================================================
    // Typed write
    // ========================================================================

    /// Write one typed value given as text.
    ///
    /// The text is parsed strictly into the target kind before anything is
    /// sent; see [`DataType::parse_value`].
    pub async fn write_typed(
        &self,
        area: AreaDescriptor,
        address: &str,
        type_name: &str,
        value: &str,
        bit_override: Option<u8>,
    ) -> PlcResult<()> {
        let result = self
            .write_inner(area, address, type_name, bit_override, |data_type| {
                data_type.parse_value(value)
            })
            .await;
        self.log_write(area, address, type_name, &value, &result);
        result
    }

    /// Write an already typed value.
    pub async fn write_value(
        &self,
        area: AreaDescriptor,
        address: &str,
        value: &PlcValue,
        bit_override: Option<u8>,
    ) -> PlcResult<()> {
        let data_type = value.data_type();
        let result = self
            .write_inner(area, address, data_type.as_str(), bit_override, |_| {
                Ok(value.clone())
            })
            .await;
        self.log_write(area, address, data_type.as_str(), value, &result);
        result
    }

    fn log_write(
        &self,
        area: AreaDescriptor,
        address: &str,
        type_name: &str,
        value: &dyn fmt::Display,
        result: &PlcResult<()>,
    ) {
        match result {
            Ok(()) => {
                Counters::bump(&self.counters.writes);
                info!("PLC write {} @ {} ({}) <- {}", area, address, type_name, value);
            }
            Err(e) => {
                Counters::bump(&self.counters.failures);
                error!(
                    "PLC write {} @ {} ({}) <- {} failed: {}",
                    area, address, type_name, value, e
                );
            }
        }
    }

    async fn write_inner<F>(
        &self,
        area: AreaDescriptor,
        address_text: &str,
        type_name: &str,
        bit_override: Option<u8>,
        make_value: F,
    ) -> PlcResult<()>
    where
        F: FnOnce(DataType) -> PlcResult<PlcValue>,
    {
        if !self.is_connected() {
            return Err(PlcError::NotConnected);
        }
        let address = resolve(address_text)?;
        let data_type = DataType::parse(type_name)?;
        let value = make_value(data_type)?;
        let target = Target {
            area,
            address,
            data_type,
        };

        let payload = match value {
            PlcValue::Bool(b) => RawWrite::Bit(b),
            other => RawWrite::Bytes(S7Codec::encode(&other)?),
        };
        let bit = match payload {
            RawWrite::Bit(_) => effective_bit(address, bit_override)?,
            RawWrite::Bytes(_) => 0,
        };

        let byte = address.byte_offset();
        let (result, link_lost) = {
            let mut guard = self.handle.lock().await;
            let transport = (*guard).as_mut().ok_or(PlcError::NotConnected)?;

            let result = match &payload {
                RawWrite::Bit(b) => transport.write_bit(area, byte, bit, *b).await,
                RawWrite::Bytes(data) => transport.write_bytes(area, byte, data).await,
            };

            let link_lost = result.is_err() && !transport.is_open();
            if link_lost {
                self.discard_handle(&mut guard).await;
            }
            (result, link_lost)
        };

        if link_lost {
            warn!("PLC link lost during write at {}", target);
            self.notify(false);
        }

        result.map_err(|e| PlcError::write_failure(target.to_string(), e))
    }

    /// Drop the handle after the transport reported itself closed.
    async fn discard_handle(&self, guard: &mut Option<C::Transport>) {
        if let Some(mut transport) = guard.take() {
            close_quietly(&mut transport).await;
        }
        self.connected.store(false, Ordering::SeqCst);
    }
}

/// Bit used for a `BOOL` access: override, then address, then 0.
fn effective_bit(address: MemoryAddress, bit_override: Option<u8>) -> PlcResult<u8> {
    match bit_override {
        Some(bit) if bit > MAX_BIT_OFFSET => Err(PlcError::BitOffsetOutOfRange {
            bit: u32::from(bit),
        }),
        Some(bit) => Ok(bit),
        None => Ok(address.bit_offset().unwrap_or(0)),
    }
}

async fn close_quietly<T: PlcTransport>(transport: &mut T) {
    if let Err(e) = transport.close().await {
        debug!("Ignoring close error on discarded PLC connection: {}", e);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    use crate::constants::STRING_MAX_LEN;

    // =========================================================================
    // MockTransport recording every call
    // =========================================================================

    #[derive(Default)]
    struct MockState {
        calls: StdMutex<Vec<String>>,
        opens: AtomicUsize,
        refuse: AtomicBool,
        in_flight: AtomicBool,
        overlaps: AtomicUsize,
        bit_value: AtomicBool,
        fail_io: AtomicBool,
        link_up: AtomicBool,
        memory: StdMutex<Vec<u8>>,
    }

    impl MockState {
        fn record(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn io_calls(&self) -> usize {
            self.calls()
                .iter()
                .filter(|c| c.starts_with("read") || c.starts_with("write"))
                .count()
        }

        /// Flag overlapping transport calls.
        async fn enter(&self) {
            if self.in_flight.swap(true, Ordering::SeqCst) {
                self.overlaps.fetch_add(1, Ordering::SeqCst);
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }

        fn leave(&self) {
            self.in_flight.store(false, Ordering::SeqCst);
        }
    }

    #[derive(Clone, Default)]
    struct MockConnector {
        state: Arc<MockState>,
    }

    struct MockTransport {
        state: Arc<MockState>,
    }

    impl PlcConnector for MockConnector {
        type Transport = MockTransport;

        async fn open(&self, _endpoint: &Endpoint) -> PlcResult<MockTransport> {
            self.state.record("open".to_string());
            if self.state.refuse.load(Ordering::SeqCst) {
                return Err(PlcError::transport("refused"));
            }
            self.state.opens.fetch_add(1, Ordering::SeqCst);
            self.state.link_up.store(true, Ordering::SeqCst);
            Ok(MockTransport {
                state: Arc::clone(&self.state),
            })
        }
    }

    impl PlcTransport for MockTransport {
        async fn read_bytes(
            &mut self,
            _area: AreaDescriptor,
            start: u32,
            count: usize,
        ) -> PlcResult<Vec<u8>> {
            self.state.record(format!("read_bytes {} {}", start, count));
            self.state.enter().await;
            let result = if self.state.fail_io.load(Ordering::SeqCst) {
                Err(PlcError::transport("simulated read fault"))
            } else {
                let start = start as usize;
                let mut memory = self.state.memory.lock().unwrap();
                if memory.len() < start + count {
                    memory.resize(start + count, 0);
                }
                Ok(memory[start..start + count].to_vec())
            };
            self.state.leave();
            result
        }

        async fn read_bit(&mut self, _area: AreaDescriptor, byte: u32, bit: u8) -> PlcResult<bool> {
            self.state.record(format!("read_bit {}.{}", byte, bit));
            self.state.enter().await;
            let result = if self.state.fail_io.load(Ordering::SeqCst) {
                Err(PlcError::transport("simulated read fault"))
            } else {
                Ok(self.state.bit_value.load(Ordering::SeqCst))
            };
            self.state.leave();
            result
        }

        async fn write_bytes(
            &mut self,
            _area: AreaDescriptor,
            start: u32,
            data: &[u8],
        ) -> PlcResult<()> {
            self.state.record(format!("write_bytes {} {}", start, data.len()));
            self.state.enter().await;
            let result = if self.state.fail_io.load(Ordering::SeqCst) {
                Err(PlcError::transport("simulated write fault"))
            } else {
                let start = start as usize;
                let mut memory = self.state.memory.lock().unwrap();
                if memory.len() < start + data.len() {
                    memory.resize(start + data.len(), 0);
                }
                memory[start..start + data.len()].copy_from_slice(data);
                Ok(())
            };
            self.state.leave();
            result
        }

        async fn write_bit(
            &mut self,
            _area: AreaDescriptor,
            byte: u32,
            bit: u8,
            value: bool,
        ) -> PlcResult<()> {
            self.state.record(format!("write_bit {}.{} {}", byte, bit, value));
            self.state.bit_value.store(value, Ordering::SeqCst);
            Ok(())
        }

        fn is_open(&self) -> bool {
            self.state.link_up.load(Ordering::SeqCst)
        }

        async fn close(&mut self) -> PlcResult<()> {
            self.state.record("close".to_string());
            Ok(())
        }
    }

    fn db(n: u16) -> AreaDescriptor {
        AreaDescriptor::data_block(n)
    }

    async fn connected_session() -> (DeviceSession<MockConnector>, Arc<MockState>) {
        let connector = MockConnector::default();
        let state = Arc::clone(&connector.state);
        let session = DeviceSession::new(connector);
        session.connect(&Endpoint::new("10.0.0.1")).await.unwrap();
        (session, state)
    }

    fn record_events(session: &DeviceSession<MockConnector>) -> Arc<StdMutex<Vec<bool>>> {
        let events = Arc::new(StdMutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        session.on_connection_status_changed(move |status| sink.lock().unwrap().push(status));
        events
    }

    // =========================================================================
    // Connection lifecycle
    // =========================================================================

    #[tokio::test]
    async fn test_connect_twice_opens_once() {
        let connector = MockConnector::default();
        let state = Arc::clone(&connector.state);
        let session = DeviceSession::new(connector);

        assert!(session.connect_to("10.0.0.1").await);
        assert!(session.connect_to("10.0.0.1").await);
        assert_eq!(state.opens.load(Ordering::SeqCst), 1);
        assert!(session.is_connected());
    }

    #[tokio::test]
    async fn test_connect_failure_stays_disconnected() {
        let connector = MockConnector::default();
        connector.state.refuse.store(true, Ordering::SeqCst);
        let session = DeviceSession::new(connector);
        let events = record_events(&session);

        let err = session.connect(&Endpoint::new("10.0.0.1")).await.unwrap_err();
        assert!(matches!(err, PlcError::Connect { .. }));
        assert!(!session.is_connected());
        assert_eq!(*events.lock().unwrap(), vec![false]);
    }

    #[tokio::test]
    async fn test_disconnect_is_idempotent() {
        let (session, state) = connected_session().await;
        let events = record_events(&session);

        session.disconnect().await;
        session.disconnect().await;

        assert!(!session.is_connected());
        assert_eq!(state.calls().iter().filter(|c| *c == "close").count(), 1);
        assert_eq!(*events.lock().unwrap(), vec![false]);
        assert_eq!(session.get_stats().disconnects, 1);
    }

    #[tokio::test]
    async fn test_status_events_on_every_transition() {
        let connector = MockConnector::default();
        let session = DeviceSession::new(connector);
        let events = record_events(&session);
        let mut rx = session.subscribe();

        session.connect_to("10.0.0.1").await;
        session.connect_to("10.0.0.1").await; // no transition
        session.disconnect().await;

        assert_eq!(*events.lock().unwrap(), vec![true, false]);
        assert!(rx.recv().await.unwrap());
        assert!(!rx.recv().await.unwrap());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_reconnect_after_disconnect() {
        let (session, state) = connected_session().await;
        session.disconnect().await;
        assert!(session.connect_to("10.0.0.1").await);
        assert_eq!(state.opens.load(Ordering::SeqCst), 2);
    }

    // =========================================================================
    // Guards
    // =========================================================================

    #[tokio::test]
    async fn test_disconnected_never_touches_transport() {
        let connector = MockConnector::default();
        let state = Arc::clone(&connector.state);
        let session = DeviceSession::new(connector);

        for (addr, ty) in [("10.3", "BOOL"), ("a.b", "INT"), ("1", "NOPE"), ("5.8", "STRING")] {
            assert!(matches!(
                session.read_typed(db(1), addr, ty, None).await,
                Err(PlcError::NotConnected)
            ));
            assert!(matches!(
                session.write_typed(db(1), addr, ty, "x", None).await,
                Err(PlcError::NotConnected)
            ));
        }
        assert!(state.calls().is_empty());
    }

    #[tokio::test]
    async fn test_address_and_type_errors() {
        let (session, state) = connected_session().await;

        assert!(matches!(
            session.read_typed(db(1), "1.2.3", "INT", None).await,
            Err(PlcError::InvalidAddressFormat { .. })
        ));
        assert!(matches!(
            session.read_typed(db(1), "5.8", "BOOL", None).await,
            Err(PlcError::BitOffsetOutOfRange { bit: 8 })
        ));
        assert!(matches!(
            session.read_typed(db(1), "5", "LREAL", None).await,
            Err(PlcError::UnsupportedDataType { .. })
        ));
        assert!(matches!(
            session.read_typed(db(1), "5", "BOOL", Some(9)).await,
            Err(PlcError::BitOffsetOutOfRange { bit: 9 })
        ));
        assert_eq!(state.io_calls(), 0);
    }

    #[tokio::test]
    async fn test_byte_range_checked_before_transport() {
        let (session, state) = connected_session().await;

        session.write_typed(db(1), "0", "BYTE", "255", None).await.unwrap();
        for bad in ["256", "-1"] {
            assert!(matches!(
                session.write_typed(db(1), "0", "BYTE", bad, None).await,
                Err(PlcError::ValueFormat { kind: DataType::Byte, .. })
            ));
        }
        assert_eq!(state.io_calls(), 1);
    }

    // =========================================================================
    // Dispatch
    // =========================================================================

    #[tokio::test]
    async fn test_read_bool_at_resolved_bit() {
        let (session, state) = connected_session().await;
        state.bit_value.store(true, Ordering::SeqCst);

        let addr = resolve("10.3").unwrap();
        assert_eq!(addr.byte_offset(), 10);
        assert_eq!(addr.bit_offset(), Some(3));

        let value = session.read_typed(db(1), "10.3", "BOOL", None).await.unwrap();
        assert_eq!(value, PlcValue::Bool(true));
        assert_eq!(state.calls().last().unwrap(), "read_bit 10.3");
    }

    #[tokio::test]
    async fn test_bool_bit_selection() {
        let (session, state) = connected_session().await;

        session.read_typed(db(1), "4", "bool", None).await.unwrap();
        session.read_typed(db(1), "4.6", "bool", Some(2)).await.unwrap();
        session.write_typed(db(1), "4.5", "Bool", "true", None).await.unwrap();

        let calls = state.calls();
        assert!(calls.contains(&"read_bit 4.0".to_string()));
        assert!(calls.contains(&"read_bit 4.2".to_string()));
        assert!(calls.contains(&"write_bit 4.5 true".to_string()));
    }

    #[tokio::test]
    async fn test_numeric_ignores_bit_offset() {
        let (session, state) = connected_session().await;

        session.write_typed(db(1), "2.7", "INT", "-2", None).await.unwrap();
        let value = session.read_typed(db(1), "2.7", "int", None).await.unwrap();

        assert_eq!(value, PlcValue::Int(-2));
        assert!(state.calls().contains(&"write_bytes 2 2".to_string()));
        assert!(state.calls().contains(&"read_bytes 2 2".to_string()));
    }

    #[tokio::test]
    async fn test_numeric_kinds_round_trip() {
        let (session, _state) = connected_session().await;
        let cases = [
            ("BYTE", "200", PlcValue::Byte(200)),
            ("WORD", "65535", PlcValue::Word(65535)),
            ("DWORD", "4000000000", PlcValue::DWord(4_000_000_000)),
            ("INT", "-32768", PlcValue::Int(-32768)),
            ("DINT", "-100000", PlcValue::DInt(-100_000)),
            ("REAL", "3.5", PlcValue::Real(3.5)),
        ];
        for (ty, text, expected) in cases {
            session.write_typed(db(1), "20", ty, text, None).await.unwrap();
            assert_eq!(session.read_typed(db(1), "20", ty, None).await.unwrap(), expected);
        }
    }

    #[tokio::test]
    async fn test_string_round_trip_lengths() {
        let (session, _state) = connected_session().await;

        for len in [0, 1, 5, 100, STRING_MAX_LEN] {
            let text = "A".repeat(len);
            session.write_typed(db(1), "100", "STRING", &text, None).await.unwrap();
            let value = session.read_typed(db(1), "100", "STRING", None).await.unwrap();
            assert_eq!(value, PlcValue::Str(text));
        }

        session.write_typed(db(1), "100", "STRING", "HELLO", None).await.unwrap();
        let value = session.read_typed(db(1), "100", "STRING", None).await.unwrap();
        assert_eq!(value.as_str(), Some("HELLO"));
    }

    #[tokio::test]
    async fn test_string_too_long_rejected_before_transport() {
        let (session, state) = connected_session().await;
        let text = "A".repeat(STRING_MAX_LEN + 1);

        assert!(matches!(
            session.write_typed(db(1), "0", "STRING", &text, None).await,
            Err(PlcError::StringTooLong { len: 255, .. })
        ));
        assert_eq!(state.io_calls(), 0);
    }

    #[tokio::test]
    async fn test_write_value_typed() {
        let (session, _state) = connected_session().await;
        session
            .write_value(db(3), "8", &PlcValue::DInt(77), None)
            .await
            .unwrap();
        assert_eq!(
            session.read(Area::DataBlock, 3, "8", "DINT").await.unwrap(),
            PlcValue::DInt(77)
        );
    }

    // =========================================================================
    // Transport faults
    // =========================================================================

    #[tokio::test]
    async fn test_transport_fault_keeps_connection() {
        let (session, state) = connected_session().await;
        state.fail_io.store(true, Ordering::SeqCst);

        let err = session.read_typed(db(1), "0", "INT", None).await.unwrap_err();
        assert!(matches!(err, PlcError::TransportRead { .. }));
        assert!(err.to_string().contains("DB1 @ 0 (INT)"));

        let err = session.write_typed(db(1), "0", "INT", "1", None).await.unwrap_err();
        assert!(matches!(err, PlcError::TransportWrite { .. }));

        assert!(session.is_connected());
        assert_eq!(session.get_stats().failures, 2);
    }

    #[tokio::test]
    async fn test_link_loss_disconnects() {
        let (session, state) = connected_session().await;
        let events = record_events(&session);
        state.fail_io.store(true, Ordering::SeqCst);
        state.link_up.store(false, Ordering::SeqCst);

        let err = session.read_typed(db(1), "0", "WORD", None).await.unwrap_err();
        assert!(matches!(err, PlcError::TransportRead { .. }));
        assert!(!session.is_connected());
        assert_eq!(*events.lock().unwrap(), vec![false]);

        assert!(matches!(
            session.read_typed(db(1), "0", "WORD", None).await,
            Err(PlcError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_link_loss_on_write_disconnects() {
        let (session, state) = connected_session().await;
        let events = record_events(&session);
        state.fail_io.store(true, Ordering::SeqCst);
        state.link_up.store(false, Ordering::SeqCst);

        let err = session.write_typed(db(1), "0", "DINT", "7", None).await.unwrap_err();
        assert!(matches!(err, PlcError::TransportWrite { .. }));
        assert!(!session.is_connected());
        assert_eq!(*events.lock().unwrap(), vec![false]);
        assert_eq!(state.calls().iter().filter(|c| *c == "close").count(), 1);

        assert!(matches!(
            session.write_typed(db(1), "0", "DINT", "7", None).await,
            Err(PlcError::NotConnected)
        ));
        assert_eq!(state.io_calls(), 1);
    }

    #[tokio::test]
    async fn test_stale_handle_events_fire_without_transport_lock() {
        let (session, state) = connected_session().await;
        let session = Arc::new(session);
        let observed = Arc::new(StdMutex::new(Vec::new()));
        {
            let weak = Arc::downgrade(&session);
            let sink = Arc::clone(&observed);
            session.on_connection_status_changed(move |status| {
                let lock_free = weak
                    .upgrade()
                    .map(|s| s.handle.try_lock().is_ok())
                    .unwrap_or(false);
                sink.lock().unwrap().push((status, lock_free));
            });
        }
        state.link_up.store(false, Ordering::SeqCst);

        assert!(session.connect_to("10.0.0.1").await);
        assert_eq!(*observed.lock().unwrap(), vec![(false, true), (true, true)]);
        assert_eq!(state.opens.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_stale_handle_replaced_on_connect() {
        let (session, state) = connected_session().await;
        state.link_up.store(false, Ordering::SeqCst);

        assert!(session.connect_to("10.0.0.1").await);
        assert_eq!(state.opens.load(Ordering::SeqCst), 2);
        assert!(session.is_connected());
    }

    // =========================================================================
    // Concurrency
    // =========================================================================

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_reads_are_serialized() {
        let (session, state) = connected_session().await;
        let session = Arc::new(session);

        let mut handles = Vec::new();
        for task in 0..8u32 {
            let session = Arc::clone(&session);
            handles.push(tokio::spawn(async move {
                for i in 0..5u32 {
                    let addr = (task * 10 + i).to_string();
                    session.read_typed(db(1), &addr, "DINT", None).await.unwrap();
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(state.overlaps.load(Ordering::SeqCst), 0);
        assert_eq!(state.io_calls(), 40);
        assert_eq!(session.get_stats().reads, 40);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_connects_open_once() {
        let connector = MockConnector::default();
        let state = Arc::clone(&connector.state);
        let session = Arc::new(DeviceSession::new(connector));

        let mut handles = Vec::new();
        for _ in 0..6 {
            let session = Arc::clone(&session);
            handles.push(tokio::spawn(async move { session.connect_to("10.0.0.1").await }));
        }
        for handle in handles {
            assert!(handle.await.unwrap());
        }
        assert_eq!(state.opens.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_effective_bit() {
        let addr = resolve("3.4").unwrap();
        assert_eq!(effective_bit(addr, None).unwrap(), 4);
        assert_eq!(effective_bit(addr, Some(1)).unwrap(), 1);
        assert_eq!(effective_bit(resolve("3").unwrap(), None).unwrap(), 0);
        assert!(effective_bit(addr, Some(8)).is_err());
    }
}
