//! BMS frame decoding engine
//!
//! Maps raw CAN frames to named signal values according to the fixed LYNK
//! BMS message matrix. Dispatch is by exact match of
//! `arbitration_id - board_id` against the family base ids; unknown ids and
//! short payloads decode to nothing, since foreign traffic on a shared bus
//! is expected.
//!
//! All multi-byte fields are little-endian. Scaled fixed-point fields are
//! rounded to 2 decimal places; raw counters and temperatures pass through
//! as integers.

use byteorder::{ByteOrder, LittleEndian};

use crate::types::{Frame, SignalKey, SignalValue};

/// Battery pack voltage/current message family
pub const BATTERY_VOLT_CURRENT_BASE: u32 = 0x4000;
/// Min/max cell voltage message family
pub const CELL_VOLTAGE_BASE: u32 = 0x4100;
/// State-of-charge / remaining capacity / duty message family
pub const SOC_DUTY_BASE: u32 = 0x4200;
/// Battery and PCB temperature quad message family
pub const TEMP_BASE: u32 = 0x4300;
/// Per-cell voltage message family (4 packed fields per frame)
pub const EACH_CELL_VOLTAGE_BASE: u32 = 0x4400;
/// Per-thermistor temperature message family (variable field count)
pub const EACH_TEMPERATURE_BASE: u32 = 0x4500;
/// Outbound full-recharge notification family (zero payload)
pub const FULL_RECHARGE_BASE: u32 = 0x4600;

/// Decoded signals from one frame, in payload field order
pub type DecodedSignals = Vec<(SignalKey, SignalValue)>;

/// Frame decoder for one BMS device
///
/// The board id is the per-device offset added to each family base id on
/// the wire; it is fixed for the lifetime of the decoder.
#[derive(Debug, Clone, Copy)]
pub struct FrameDecoder {
    board_id: u32,
}

impl FrameDecoder {
    pub fn new(board_id: u32) -> Self {
        Self { board_id }
    }

    pub fn board_id(&self) -> u32 {
        self.board_id
    }

    /// Decode one frame into zero or more (key, value) pairs
    ///
    /// Returns an empty vec for ids outside the matrix and for payloads
    /// shorter than the family layout requires - neither is an error.
    pub fn decode(&self, frame: &Frame) -> DecodedSignals {
        let Some(base) = frame.id.checked_sub(self.board_id) else {
            return Vec::new();
        };

        match base {
            BATTERY_VOLT_CURRENT_BASE => Self::decode_battery_volt_current(&frame.data),
            CELL_VOLTAGE_BASE => Self::decode_cell_voltage(&frame.data),
            SOC_DUTY_BASE => Self::decode_soc_duty(&frame.data),
            TEMP_BASE => Self::decode_temp(&frame.data),
            EACH_CELL_VOLTAGE_BASE => Self::decode_each_cell_voltage(&frame.data),
            EACH_TEMPERATURE_BASE => Self::decode_each_temperature(&frame.data),
            _ => {
                log::trace!("Ignoring frame with unknown id 0x{:X}", frame.id);
                Vec::new()
            }
        }
    }

    /// [battery_voltage (uint32), battery_current (int32)]
    fn decode_battery_volt_current(data: &[u8]) -> DecodedSignals {
        if data.len() < 8 {
            return Vec::new();
        }
        let voltage = LittleEndian::read_u32(&data[0..4]);
        let current = LittleEndian::read_i32(&data[4..8]);

        vec![
            (
                SignalKey::BatteryVoltage,
                SignalValue::Float(round2(f64::from(voltage) * 100e-6)),
            ),
            (
                SignalKey::BatteryCurrent,
                SignalValue::Float(round2(f64::from(current) * 1e-3)),
            ),
        ]
    }

    /// [min_cell_voltage (uint32), max_cell_voltage (uint32)]
    fn decode_cell_voltage(data: &[u8]) -> DecodedSignals {
        if data.len() < 8 {
            return Vec::new();
        }
        let min = LittleEndian::read_u32(&data[0..4]);
        let max = LittleEndian::read_u32(&data[4..8]);

        vec![
            (
                SignalKey::MinCellVoltage,
                SignalValue::Float(round2(f64::from(min) * 100e-6)),
            ),
            (
                SignalKey::MaxCellVoltage,
                SignalValue::Float(round2(f64::from(max) * 100e-6)),
            ),
        ]
    }

    /// [reserved (uint16), remain (uint16), soc (uint8), reserved (uint8),
    ///  duty (uint8), reserved (uint8)] - raw integers, no scaling
    fn decode_soc_duty(data: &[u8]) -> DecodedSignals {
        if data.len() < 8 {
            return Vec::new();
        }
        let remain = LittleEndian::read_u16(&data[2..4]);
        let soc = data[4];
        let duty = data[6];

        vec![
            (SignalKey::Remain, SignalValue::Integer(i64::from(remain))),
            (SignalKey::Soc, SignalValue::Integer(i64::from(soc))),
            (SignalKey::Duty, SignalValue::Integer(i64::from(duty))),
        ]
    }

    /// [battery_avg, battery_max, pcb_avg, pcb_max] - 4x int16, raw degrees
    fn decode_temp(data: &[u8]) -> DecodedSignals {
        if data.len() < 8 {
            return Vec::new();
        }

        vec![
            (
                SignalKey::BatteryAverageTemp,
                SignalValue::Integer(i64::from(LittleEndian::read_i16(&data[0..2]))),
            ),
            (
                SignalKey::BatteryMaxTemp,
                SignalValue::Integer(i64::from(LittleEndian::read_i16(&data[2..4]))),
            ),
            (
                SignalKey::PcbAverageTemp,
                SignalValue::Integer(i64::from(LittleEndian::read_i16(&data[4..6]))),
            ),
            (
                SignalKey::PcbMaxTemp,
                SignalValue::Integer(i64::from(LittleEndian::read_i16(&data[6..8]))),
            ),
        ]
    }

    /// 4x packed uint16: bits 9-15 = cell index, bits 0-8 = raw voltage
    fn decode_each_cell_voltage(data: &[u8]) -> DecodedSignals {
        if data.len() < 8 {
            return Vec::new();
        }

        let mut signals = Vec::with_capacity(4);
        for chunk in data[0..8].chunks_exact(2) {
            let field = LittleEndian::read_u16(chunk);
            let cell_id = ((field & 0xFE00) >> 9) as u8;
            let raw_voltage = field & 0x01FF;
            push_signal(
                &mut signals,
                SignalKey::Cell(cell_id),
                SignalValue::Float(round2(f64::from(raw_voltage) * 10e-3)),
            );
        }
        signals
    }

    /// N = payload_len/2 packed uint16: bits 10-15 = thermistor index,
    /// bit 9 = sign, bits 0-8 = magnitude (sign-magnitude, not two's
    /// complement)
    fn decode_each_temperature(data: &[u8]) -> DecodedSignals {
        if data.len() % 2 != 0 {
            return Vec::new();
        }

        let mut signals = Vec::with_capacity(data.len() / 2);
        for chunk in data.chunks_exact(2) {
            let field = LittleEndian::read_u16(chunk);
            let thrm_id = ((field & 0xFC00) >> 10) as u8;
            let compressed = field & 0x03FF;
            let magnitude = i64::from(compressed & 0x01FF);
            let temperature = if compressed & 0x0200 != 0 {
                -magnitude
            } else {
                magnitude
            };
            push_signal(
                &mut signals,
                SignalKey::Thermistor(thrm_id),
                SignalValue::Integer(temperature),
            );
        }
        signals
    }
}

/// Round to 2 decimal places
fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Append a signal, replacing an earlier field with the same key
///
/// Packed families can repeat an index within one frame; the last field
/// wins, keeping one sample per key per frame.
fn push_signal(signals: &mut DecodedSignals, key: SignalKey, value: SignalValue) {
    if let Some(slot) = signals.iter_mut().find(|(k, _)| *k == key) {
        slot.1 = value;
    } else {
        signals.push((key, value));
    }
}
