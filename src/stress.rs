//! Continuous read/write test
//!
//! Repeatedly writes one typed value through a [`DeviceSession`] (and
//! optionally reads it back) until told to stop, then reports timing.
//!
//! ```rust
//! # tokio_test::block_on(async {
//! use voltage_s7::{DeviceSession, StopReason, StressTest};
//! use voltage_s7::transport::memory::MemoryConnector;
//! use tokio::sync::watch;
//! use std::time::Duration;
//!
//! let session = DeviceSession::new(MemoryConnector::new());
//! session.connect_to("192.168.0.10").await;
//!
//! let (_stop_tx, stop_rx) = watch::channel(false);
//! let report = StressTest::default()
//!     .with_interval(Duration::from_millis(1))
//!     .with_max_iterations(3)
//!     .run(&session, stop_rx)
//!     .await
//!     .unwrap();
//! assert_eq!(report.iterations, 3);
//! assert_eq!(report.stop_reason, StopReason::Completed);
//! # });
//! ```

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::area::AreaDescriptor;
use crate::error::{PlcError, PlcResult};
use crate::session::DeviceSession;
use crate::transport::PlcConnector;
use crate::value::{DataType, PlcValue};

/// Data block used when none is configured.
pub const DEFAULT_STRESS_DB: u16 = 1000;

/// Pause between iterations when none is configured.
pub const DEFAULT_STRESS_INTERVAL: Duration = Duration::from_millis(50);

/// Why a run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum StopReason {
    /// The stop signal was raised.
    Stopped,
    /// The configured iteration count was reached.
    Completed,
    /// An operation failed; the message is the error's display text.
    Failed(String),
    /// The read-back value differed from what was written.
    Mismatch { expected: PlcValue, actual: PlcValue },
}

/// Outcome of a run.
#[derive(Debug, Clone)]
pub struct StressReport {
    /// Completed iterations.
    pub iterations: u64,
    /// Time spent in PLC calls, excluding the pauses.
    pub total: Duration,
    /// `total / iterations`, zero when nothing completed.
    pub average: Duration,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub stop_reason: StopReason,
}

impl StressReport {
    pub fn average_ms(&self) -> f64 {
        self.average.as_secs_f64() * 1000.0
    }
}

/// Continuous write (and optional read-back) loop.
#[derive(Debug, Clone)]
pub struct StressTest {
    pub area: AreaDescriptor,
    pub address: String,
    pub data_type: String,
    pub value: String,
    pub interval: Duration,
    pub verify: bool,
    pub max_iterations: Option<u64>,
}

impl Default for StressTest {
    fn default() -> Self {
        Self {
            area: AreaDescriptor::data_block(DEFAULT_STRESS_DB),
            address: "2".to_string(),
            data_type: DataType::Int.as_str().to_string(),
            value: "10".to_string(),
            interval: DEFAULT_STRESS_INTERVAL,
            verify: false,
            max_iterations: None,
        }
    }
}

impl StressTest {
    pub fn new<A, T, V>(area: AreaDescriptor, address: A, data_type: T, value: V) -> Self
    where
        A: Into<String>,
        T: Into<String>,
        V: Into<String>,
    {
        Self {
            area,
            address: address.into(),
            data_type: data_type.into(),
            value: value.into(),
            ..Self::default()
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Read the value back after each write and stop on a mismatch.
    pub fn with_verify(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }

    pub fn with_max_iterations(mut self, max: u64) -> Self {
        self.max_iterations = Some(max);
        self
    }

    /// Run until `stop` becomes `true`, an operation fails, or the iteration
    /// limit is reached.
    ///
    /// The pause between iterations is cut short by the stop signal; a PLC
    /// call already in progress is not. Dropping the sender counts as a stop.
    pub async fn run<C: PlcConnector>(
        &self,
        session: &DeviceSession<C>,
        mut stop: watch::Receiver<bool>,
    ) -> PlcResult<StressReport> {
        if !session.is_connected() {
            warn!("Continuous test refused: PLC not connected");
            return Err(PlcError::NotConnected);
        }

        info!(
            "Continuous test started: {} @ {} ({}) <- {}, every {:?}",
            self.area, self.address, self.data_type, self.value, self.interval
        );

        let started_at = Utc::now();
        let mut iterations: u64 = 0;
        let mut total = Duration::ZERO;

        let stop_reason = loop {
            if *stop.borrow() {
                break StopReason::Stopped;
            }
            if self.max_iterations.is_some_and(|max| iterations >= max) {
                break StopReason::Completed;
            }

            let begin = Instant::now();
            match self.iteration(session).await {
                Ok(None) => {}
                Ok(Some(reason)) => break reason,
                Err(e) => break StopReason::Failed(e.to_string()),
            }
            let elapsed = begin.elapsed();
            total += elapsed;
            iterations += 1;
            debug!("Iteration {} took {:.3} ms", iterations, elapsed.as_secs_f64() * 1000.0);

            tokio::select! {
                changed = stop.changed() => {
                    if changed.is_err() || *stop.borrow() {
                        break StopReason::Stopped;
                    }
                }
                _ = tokio::time::sleep(self.interval) => {}
            }
        };

        let average = if iterations == 0 {
            Duration::ZERO
        } else {
            total.div_f64(iterations as f64)
        };
        let report = StressReport {
            iterations,
            total,
            average,
            started_at,
            finished_at: Utc::now(),
            stop_reason,
        };

        match &report.stop_reason {
            StopReason::Failed(message) => warn!(
                "Continuous test aborted after {} iterations: {}",
                report.iterations, message
            ),
            StopReason::Mismatch { expected, actual } => warn!(
                "Continuous test read back {} instead of {} after {} iterations",
                actual, expected, report.iterations
            ),
            _ => {}
        }
        info!(
            "Continuous test finished: {} iterations, average {:.3} ms",
            report.iterations,
            report.average_ms()
        );
        Ok(report)
    }

    /// One write plus optional read-back. `Some` ends the run.
    async fn iteration<C: PlcConnector>(
        &self,
        session: &DeviceSession<C>,
    ) -> PlcResult<Option<StopReason>> {
        session
            .write_typed(self.area, &self.address, &self.data_type, &self.value, None)
            .await?;
        if !self.verify {
            return Ok(None);
        }

        let actual = session
            .read_typed(self.area, &self.address, &self.data_type, None)
            .await?;
        let expected = DataType::parse(&self.data_type)?.parse_value(&self.value)?;
        if actual == expected {
            Ok(None)
        } else {
            Ok(Some(StopReason::Mismatch { expected, actual }))
        }
    }
}
