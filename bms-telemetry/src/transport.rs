//! CAN bus transport
//!
//! Defines the `BusTransport` seam the receiver engine drives, plus the
//! SocketCAN implementation used on real hardware. The trait exists so the
//! engine can be exercised against an in-memory bus in tests; the contract
//! is a blocking receive-with-timeout and a best-effort send.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use socketcan::{CanFrame, CanSocket, EmbeddedFrame, ExtendedId, Frame as SocketcanFrame, Socket};

use crate::types::{now_secs, Frame, Result, TelemetryError};

/// 29-bit extended arbitration id mask
const EFF_ID_MASK: u32 = 0x1FFF_FFFF;

/// Abstraction over one physical or virtual CAN bus connection
///
/// Implementations own at most one underlying handle. Setup and teardown
/// serialize against each other; `receive` and `send` are expected to be
/// driven from the receiver engine's single reader thread plus occasional
/// command sends from the consumer side.
pub trait BusTransport: Send + Sync {
    /// Open the underlying bus handle if not already open. Idempotent.
    fn connect(&self) -> Result<()>;

    /// Block up to `timeout` for one frame. `Ok(None)` means the timeout
    /// elapsed with no traffic - not an error.
    fn receive(&self, timeout: Duration) -> Result<Option<Frame>>;

    /// Best-effort send. A bus that was never opened treats this as a no-op.
    fn send(&self, frame: &Frame) -> Result<()>;

    /// Release the underlying handle. Idempotent, safe when never opened.
    fn close(&self);
}

/// SocketCAN transport over a Linux CAN interface
///
/// The socket is opened lazily on first use and cached. The mutex guards
/// only the cached handle slot; the blocking read happens on a cloned `Arc`
/// outside the lock, so `send` and `close` never wait out a full receive
/// timeout.
pub struct SocketCanTransport {
    channel: String,
    bitrate: u32,
    socket: Mutex<Option<Arc<CanSocket>>>,
}

impl SocketCanTransport {
    pub fn new(channel: impl Into<String>, bitrate: u32) -> Self {
        Self {
            channel: channel.into(),
            bitrate,
            socket: Mutex::new(None),
        }
    }

    /// Get or lazily open the cached socket handle.
    fn handle(&self) -> Result<Arc<CanSocket>> {
        let mut slot = self.socket.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(socket) = slot.as_ref() {
            return Ok(Arc::clone(socket));
        }

        let socket = CanSocket::open(&self.channel).map_err(|e| {
            TelemetryError::Connection(format!(
                "Failed to open CAN interface {}: {}",
                self.channel, e
            ))
        })?;

        log::info!(
            "CAN socket opened on {} (bitrate {} bit/s, configured at interface level)",
            self.channel,
            self.bitrate
        );

        let socket = Arc::new(socket);
        *slot = Some(Arc::clone(&socket));
        Ok(socket)
    }
}

impl BusTransport for SocketCanTransport {
    fn connect(&self) -> Result<()> {
        self.handle().map(|_| ())
    }

    fn receive(&self, timeout: Duration) -> Result<Option<Frame>> {
        let socket = self.handle()?;

        match socket.read_frame_timeout(timeout) {
            Ok(CanFrame::Data(frame)) => Ok(Some(Frame {
                id: frame.raw_id() & EFF_ID_MASK,
                data: frame.data().to_vec(),
                timestamp: now_secs(),
            })),
            // Remote and error frames carry no telemetry payload
            Ok(other) => {
                log::trace!("Ignoring non-data CAN frame: {:?}", other);
                Ok(None)
            }
            Err(e)
                if e.kind() == std::io::ErrorKind::WouldBlock
                    || e.kind() == std::io::ErrorKind::TimedOut =>
            {
                Ok(None)
            }
            Err(e) => Err(TelemetryError::Transport(format!(
                "CAN receive failed on {}: {}",
                self.channel, e
            ))),
        }
    }

    fn send(&self, frame: &Frame) -> Result<()> {
        let socket = {
            let slot = self.socket.lock().unwrap_or_else(PoisonError::into_inner);
            match slot.as_ref() {
                Some(socket) => Arc::clone(socket),
                None => {
                    log::debug!("Send on unopened CAN bus ignored (id 0x{:X})", frame.id);
                    return Ok(());
                }
            }
        };

        let id = ExtendedId::new(frame.id).ok_or_else(|| {
            TelemetryError::Transport(format!("Invalid extended CAN id 0x{:X}", frame.id))
        })?;
        let can_frame = CanFrame::new(id, &frame.data).ok_or_else(|| {
            TelemetryError::Transport(format!(
                "Payload of {} bytes does not fit a CAN frame",
                frame.data.len()
            ))
        })?;

        socket.write_frame(&can_frame).map_err(|e| {
            TelemetryError::Transport(format!("CAN send failed on {}: {}", self.channel, e))
        })
    }

    fn close(&self) {
        let mut slot = self.socket.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.take().is_some() {
            log::info!("CAN socket on {} closed", self.channel);
        }
    }
}
