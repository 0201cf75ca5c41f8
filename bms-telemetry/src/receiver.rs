//! Receiver engine
//!
//! Orchestrates the receive/decode/append pipeline: a dedicated worker
//! thread pulls frames from the bus transport, decodes them, and appends
//! the resulting samples to the series store. Consumer-facing calls
//! (`start`, `stop`, `snapshot`, `send_full_recharge_notice`) are safe to
//! invoke concurrently with the worker.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::config::ReceiverConfig;
use crate::decoder::{FrameDecoder, FULL_RECHARGE_BASE};
use crate::store::{SeriesSnapshot, SeriesStore};
use crate::transport::{BusTransport, SocketCanTransport};
use crate::types::{Frame, Result, Sample};

/// Bounded blocking window of one receive call. The worker re-checks its
/// run flag at every timeout, so this also bounds stop latency.
const RECEIVE_TIMEOUT: Duration = Duration::from_secs(1);

/// Backoff after a recovered transport error, so a dead bus does not spin
/// the worker hot.
const ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// One receiving session over one CAN bus
///
/// Owns the transport, decoder and store explicitly - multiple independent
/// engines can coexist in one process. The lifecycle is `Idle -> Running ->
/// Idle`; `start` and `stop` are both idempotent.
pub struct ReceiverEngine {
    config: ReceiverConfig,
    transport: Arc<dyn BusTransport>,
    decoder: FrameDecoder,
    store: Arc<SeriesStore>,
    running: Arc<AtomicBool>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl ReceiverEngine {
    /// Create an engine over the SocketCAN interface named in the config
    pub fn new(config: ReceiverConfig) -> Self {
        let transport = Arc::new(SocketCanTransport::new(config.channel.as_str(), config.bitrate));
        Self::with_transport(config, transport)
    }

    /// Create an engine over an arbitrary transport (used by tests and
    /// non-SocketCAN deployments)
    pub fn with_transport(config: ReceiverConfig, transport: Arc<dyn BusTransport>) -> Self {
        let decoder = FrameDecoder::new(config.board_id);
        let store = Arc::new(SeriesStore::new(config.max_points));
        Self {
            config,
            transport,
            decoder,
            store,
            running: Arc::new(AtomicBool::new(false)),
            worker: Mutex::new(None),
        }
    }

    /// Start the background receive loop
    ///
    /// Connects synchronously, so an unavailable bus surfaces as
    /// `TelemetryError::Connection` here rather than inside the worker.
    /// Calling `start` while already running is a no-op.
    pub fn start(&self) -> Result<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            log::debug!("Receiver already running on {}", self.config.channel);
            return Ok(());
        }

        if let Err(e) = self.transport.connect() {
            self.running.store(false, Ordering::SeqCst);
            return Err(e);
        }

        let transport = Arc::clone(&self.transport);
        let decoder = self.decoder;
        let store = Arc::clone(&self.store);
        let running = Arc::clone(&self.running);

        let spawned = thread::Builder::new()
            .name(format!("can-rx-{}", self.config.channel))
            .spawn(move || Self::receive_loop(&*transport, decoder, &store, &running));

        match spawned {
            Ok(handle) => {
                *self
                    .worker
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner) = Some(handle);
                log::info!(
                    "Receiver started on {} (board id {})",
                    self.config.channel,
                    self.config.board_id
                );
                Ok(())
            }
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                self.transport.close();
                Err(e.into())
            }
        }
    }

    fn receive_loop(
        transport: &dyn BusTransport,
        decoder: FrameDecoder,
        store: &SeriesStore,
        running: &AtomicBool,
    ) {
        log::debug!("Receive loop entered");

        while running.load(Ordering::SeqCst) {
            match transport.receive(RECEIVE_TIMEOUT) {
                Ok(Some(frame)) => {
                    for (key, value) in decoder.decode(&frame) {
                        store.append(key, Sample::new(frame.timestamp, value));
                    }
                }
                // Timeout: nothing on the bus, re-check the run flag
                Ok(None) => {}
                Err(e) => {
                    log::warn!("CAN receive error: {}", e);
                    thread::sleep(ERROR_BACKOFF);
                }
            }
        }

        log::debug!("Receive loop exited");
    }

    /// Stop the background receive loop and release the bus
    ///
    /// Synchronous: signals the worker, waits for it to observe the signal
    /// at its next timeout boundary, then closes the transport. Calling
    /// `stop` when idle is a no-op; calling it twice is safe.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);

        let handle = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(handle) = handle {
            if handle.join().is_err() {
                log::error!("Receive worker panicked");
            }
            self.transport.close();
            log::info!("Receiver stopped on {}", self.config.channel);
        }
    }

    /// Notify the BMS that a full recharge has completed
    ///
    /// Sends a zero-payload frame on the control family id. A send failure
    /// is logged and does not affect the running state.
    pub fn send_full_recharge_notice(&self) {
        let frame = Frame::now(FULL_RECHARGE_BASE + self.config.board_id, Vec::new());
        if let Err(e) = self.transport.send(&frame) {
            log::warn!("Full-recharge notice failed: {}", e);
        }
    }

    /// Independent copy of the buffered series; empty before the first
    /// received frame
    pub fn snapshot(&self) -> SeriesSnapshot {
        self.store.snapshot()
    }

    /// Whether the background worker is currently running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// The configuration this engine was built with
    pub fn config(&self) -> &ReceiverConfig {
        &self.config
    }
}

impl Drop for ReceiverEngine {
    fn drop(&mut self) {
        self.stop();
    }
}
