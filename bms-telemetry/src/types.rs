//! Core types for the BMS telemetry library
//!
//! This module defines the fundamental types flowing through the receive
//! pipeline: raw CAN frames, decoded signal identities and values, and the
//! samples buffered by the series store.

use chrono::Utc;
use serde::Serialize;
use std::fmt;

/// Result type for telemetry operations
pub type Result<T> = std::result::Result<T, TelemetryError>;

/// Current wall-clock time as fractional seconds since the Unix epoch.
pub(crate) fn now_secs() -> f64 {
    let now = Utc::now();
    now.timestamp() as f64 + f64::from(now.timestamp_subsec_micros()) / 1e6
}

/// Raw CAN frame as received from the bus
///
/// This represents a single CAN frame before any signal decoding: the
/// 29-bit arbitration id, up to 8 payload bytes, and the wall-clock time at
/// which it was received. Frames are never mutated after receipt.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Arbitration id (29-bit extended id, flag bits stripped)
    pub id: u32,
    /// Payload bytes (0-8 for classic CAN)
    pub data: Vec<u8>,
    /// Receive time in fractional seconds since the Unix epoch
    pub timestamp: f64,
}

impl Frame {
    /// Build a frame stamped with the current wall-clock time.
    pub fn now(id: u32, data: Vec<u8>) -> Self {
        Self {
            id,
            data,
            timestamp: now_secs(),
        }
    }

    /// Get the data length code (DLC) - number of data bytes
    pub fn dlc(&self) -> usize {
        self.data.len()
    }
}

/// Errors that can occur in the telemetry core
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("Failed to open CAN bus: {0}")]
    Connection(String),

    #[error("CAN bus I/O error: {0}")]
    Transport(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Identity of one decoded telemetry signal
///
/// Fixed signals have their own variant; per-cell and per-thermistor
/// signals carry the sub-id embedded in the frame payload. The wire name
/// (`"battery_voltage"`, `"cell_id_3"`, `"thrm_id_12"`) is rendered only at
/// the presentation boundary via `Display`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SignalKey {
    BatteryVoltage,
    BatteryCurrent,
    MinCellVoltage,
    MaxCellVoltage,
    Remain,
    Soc,
    Duty,
    BatteryAverageTemp,
    BatteryMaxTemp,
    PcbAverageTemp,
    PcbMaxTemp,
    /// Per-cell voltage, indexed by the cell id from the payload
    Cell(u8),
    /// Per-thermistor temperature, indexed by the thermistor id from the payload
    Thermistor(u8),
}

impl fmt::Display for SignalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalKey::BatteryVoltage => write!(f, "battery_voltage"),
            SignalKey::BatteryCurrent => write!(f, "battery_current"),
            SignalKey::MinCellVoltage => write!(f, "min_cell_voltage"),
            SignalKey::MaxCellVoltage => write!(f, "max_cell_voltage"),
            SignalKey::Remain => write!(f, "remain"),
            SignalKey::Soc => write!(f, "soc"),
            SignalKey::Duty => write!(f, "duty"),
            SignalKey::BatteryAverageTemp => write!(f, "battery_average_temp"),
            SignalKey::BatteryMaxTemp => write!(f, "battery_max_temp"),
            SignalKey::PcbAverageTemp => write!(f, "pcb_average_temp"),
            SignalKey::PcbMaxTemp => write!(f, "pcb_max_temp"),
            SignalKey::Cell(id) => write!(f, "cell_id_{}", id),
            SignalKey::Thermistor(id) => write!(f, "thrm_id_{}", id),
        }
    }
}

/// Signal value types produced by the decoder
///
/// Scaled fixed-point fields decode to `Float` (rounded to 2 decimals);
/// raw counters and temperatures pass through as `Integer`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SignalValue {
    /// Signed integer value
    Integer(i64),
    /// Floating-point value (after scaling)
    Float(f64),
}

impl SignalValue {
    /// Convert signal value to f64 for plotting and thresholds
    pub fn as_f64(&self) -> f64 {
        match self {
            SignalValue::Integer(v) => *v as f64,
            SignalValue::Float(v) => *v,
        }
    }
}

impl fmt::Display for SignalValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalValue::Integer(v) => write!(f, "{}", v),
            SignalValue::Float(v) => write!(f, "{:.2}", v),
        }
    }
}

/// One buffered measurement: receive time plus decoded value
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Sample {
    /// Receive time in fractional seconds since the Unix epoch
    pub timestamp: f64,
    /// Decoded signal value
    pub value: SignalValue,
}

impl Sample {
    pub fn new(timestamp: f64, value: SignalValue) -> Self {
        Self { timestamp, value }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_key_rendering() {
        assert_eq!(SignalKey::BatteryVoltage.to_string(), "battery_voltage");
        assert_eq!(SignalKey::PcbMaxTemp.to_string(), "pcb_max_temp");
        assert_eq!(SignalKey::Cell(3).to_string(), "cell_id_3");
        assert_eq!(SignalKey::Thermistor(12).to_string(), "thrm_id_12");
    }

    #[test]
    fn test_signal_value_conversions() {
        assert_eq!(SignalValue::Integer(42).as_f64(), 42.0);
        assert_eq!(SignalValue::Float(3.25).as_f64(), 3.25);
    }

    #[test]
    fn test_signal_value_display() {
        assert_eq!(format!("{}", SignalValue::Integer(-10)), "-10");
        assert_eq!(format!("{}", SignalValue::Float(0.05)), "0.05");
    }

    #[test]
    fn test_frame_dlc() {
        let frame = Frame::now(0x4001, vec![1, 2, 3]);
        assert_eq!(frame.dlc(), 3);
        assert!(frame.timestamp > 0.0);
    }
}
