//! Receiver configuration types
//!
//! The configuration is intentionally small: which bus to listen on, which
//! device on that bus to address, and how much history to keep per signal.
//! Everything else (chart layout, logging destinations, ...) belongs to the
//! application layer.

use serde::{Deserialize, Serialize};

/// Configuration for one CAN receiver
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiverConfig {
    /// SocketCAN channel name (e.g., "can0", "vcan0")
    #[serde(default = "default_channel")]
    pub channel: String,

    /// CAN bus bitrate in bits per second
    #[serde(default = "default_bitrate")]
    pub bitrate: u32,

    /// Board id offset distinguishing devices sharing the bus
    #[serde(default = "default_board_id")]
    pub board_id: u32,

    /// Maximum number of samples retained per signal series
    #[serde(default = "default_max_points")]
    pub max_points: usize,
}

fn default_channel() -> String {
    "can0".to_string()
}

fn default_bitrate() -> u32 {
    500_000
}

fn default_board_id() -> u32 {
    1
}

fn default_max_points() -> usize {
    5000
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            channel: default_channel(),
            bitrate: default_bitrate(),
            board_id: default_board_id(),
            max_points: default_max_points(),
        }
    }
}

impl ReceiverConfig {
    /// Create a configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: set the SocketCAN channel name
    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = channel.into();
        self
    }

    /// Builder method: set the bus bitrate
    pub fn with_bitrate(mut self, bitrate: u32) -> Self {
        self.bitrate = bitrate;
        self
    }

    /// Builder method: set the board id offset
    pub fn with_board_id(mut self, board_id: u32) -> Self {
        self.board_id = board_id;
        self
    }

    /// Builder method: set the per-signal series bound
    pub fn with_max_points(mut self, max_points: usize) -> Self {
        self.max_points = max_points;
        self
    }
}
