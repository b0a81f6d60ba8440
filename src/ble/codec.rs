//! GATT payload encoding and decoding.
//!
//! Bit-exact little-endian codecs for the three measurement characteristics
//! the peripheral notifies (FTMS Indoor Bike Data, Cycling Power Measurement,
//! RSC Measurement) and the static feature/range values it serves on read.
//! The decoders mirror the encoders; they exist for integration tests and
//! any embedded central-role tooling.

/// Indoor Bike Data flag: instantaneous cadence present (bit 2).
const IBD_FLAG_CADENCE: u16 = 0x0004;
/// Indoor Bike Data flag: instantaneous power present (bit 6).
const IBD_FLAG_POWER: u16 = 0x0040;

/// CPS Measurement flag: wheel revolution data present (bit 4).
const CPS_FLAG_WHEEL_REVS: u16 = 0x0010;
/// CPS Measurement flag: crank revolution data present (bit 5).
const CPS_FLAG_CRANK_REVS: u16 = 0x0020;

/// Cumulative wheel revolutions plus the 1/2048 s event timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WheelRevolutionData {
    pub cumulative_revs: u32,
    pub last_event_time_2048: u16,
}

/// Cumulative crank revolutions plus the 1/1024 s event timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrankRevolutionData {
    pub cumulative_revs: u16,
    pub last_event_time_1024: u16,
}

/// Encode FTMS Indoor Bike Data (0x2AD2).
///
/// Instantaneous speed is always present and pinned to zero; consumers that
/// want wheel speed derive it from the CPS wheel-revolution stream. Cadence
/// is carried in 0.5 rpm units.
pub fn encode_indoor_bike_data(
    cadence_rpm: u16,
    power_w: i16,
    include_cadence: bool,
    include_power: bool,
) -> Vec<u8> {
    let mut flags: u16 = 0;
    if include_cadence {
        flags |= IBD_FLAG_CADENCE;
    }
    if include_power {
        flags |= IBD_FLAG_POWER;
    }

    let mut data = Vec::with_capacity(8);
    data.extend_from_slice(&flags.to_le_bytes());
    data.extend_from_slice(&0u16.to_le_bytes());
    if include_cadence {
        data.extend_from_slice(&(cadence_rpm.saturating_mul(2)).to_le_bytes());
    }
    if include_power {
        data.extend_from_slice(&power_w.to_le_bytes());
    }
    data
}

/// Encode a Cycling Power Measurement (0x2A63).
pub fn encode_cps_measurement(
    power_w: i16,
    wheel: Option<WheelRevolutionData>,
    crank: Option<CrankRevolutionData>,
) -> Vec<u8> {
    let mut flags: u16 = 0;
    if wheel.is_some() {
        flags |= CPS_FLAG_WHEEL_REVS;
    }
    if crank.is_some() {
        flags |= CPS_FLAG_CRANK_REVS;
    }

    let mut data = Vec::with_capacity(14);
    data.extend_from_slice(&flags.to_le_bytes());
    data.extend_from_slice(&power_w.to_le_bytes());
    if let Some(wheel) = wheel {
        data.extend_from_slice(&wheel.cumulative_revs.to_le_bytes());
        data.extend_from_slice(&wheel.last_event_time_2048.to_le_bytes());
    }
    if let Some(crank) = crank {
        data.extend_from_slice(&crank.cumulative_revs.to_le_bytes());
        data.extend_from_slice(&crank.last_event_time_1024.to_le_bytes());
    }
    data
}

/// Encode an RSC Measurement (0x2A53): flags, speed in 1/256 m/s, cadence.
pub fn encode_rsc_measurement(speed_mps: f64, cadence_rpm: u8) -> Vec<u8> {
    let speed_raw = (speed_mps.max(0.0) * 256.0).round().min(u16::MAX as f64) as u16;
    let mut data = Vec::with_capacity(4);
    data.push(0x00);
    data.extend_from_slice(&speed_raw.to_le_bytes());
    data.push(cadence_rpm);
    data
}

/// Encode the Fitness Machine Feature value (0x2ACC), 8 bytes.
///
/// Lower word: bit 1 cadence supported, bit 14 power measurement supported.
/// Upper (target-setting) word: bit 3 power target, bit 13 indoor bike
/// simulation parameters.
pub fn encode_ftms_feature(cadence_supported: bool, power_supported: bool) -> [u8; 8] {
    let mut machine_features: u32 = 0;
    if cadence_supported {
        machine_features |= 1 << 1;
    }
    if power_supported {
        machine_features |= 1 << 14;
    }
    let target_features: u32 = (1 << 3) | (1 << 13);

    let mut data = [0u8; 8];
    data[..4].copy_from_slice(&machine_features.to_le_bytes());
    data[4..].copy_from_slice(&target_features.to_le_bytes());
    data
}

/// Encode the Supported Power Range value (0x2AD8): 0–1000 W in 1 W steps.
pub fn encode_supported_power_range() -> [u8; 6] {
    let mut data = [0u8; 6];
    data[..2].copy_from_slice(&0i16.to_le_bytes());
    data[2..4].copy_from_slice(&1000i16.to_le_bytes());
    data[4..].copy_from_slice(&1u16.to_le_bytes());
    data
}

/// Encode the Cycling Power Feature value (0x2A65): crank revs supported.
pub fn encode_cps_feature() -> [u8; 4] {
    0x0000_0008u32.to_le_bytes()
}

/// Encode the RSC Feature value (0x2A54): no optional features.
pub fn encode_rsc_feature() -> [u8; 2] {
    [0x00, 0x00]
}

/// Parsed FTMS Indoor Bike Data.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndoorBikeData {
    /// Instantaneous speed (raw field / 100), if present.
    pub speed_mps: Option<f64>,
    /// Average speed (raw field / 100), if present.
    pub avg_speed_mps: Option<f64>,
    /// Instantaneous cadence in rpm, if present.
    pub cadence_rpm: Option<u16>,
    /// Average cadence in rpm, if present.
    pub avg_cadence_rpm: Option<u16>,
    /// Instantaneous power in watts, if present.
    pub power_w: Option<i16>,
}

/// Parse FTMS Indoor Bike Data (0x2AD2).
///
/// Walks the flag-gated field layout; instantaneous speed is present
/// whenever the More Data bit (bit 0) is clear.
pub fn parse_indoor_bike_data(data: &[u8]) -> Option<IndoorBikeData> {
    if data.len() < 2 {
        return None;
    }
    let flags = u16::from_le_bytes([data[0], data[1]]);
    let mut result = IndoorBikeData::default();
    let mut offset = 2usize;

    let take_u16 = |offset: &mut usize| -> Option<u16> {
        if *offset + 2 > data.len() {
            return None;
        }
        let v = u16::from_le_bytes([data[*offset], data[*offset + 1]]);
        *offset += 2;
        Some(v)
    };

    if flags & 0x0001 == 0 {
        result.speed_mps = Some(take_u16(&mut offset)? as f64 / 100.0);
    }
    if flags & 0x0002 != 0 {
        result.avg_speed_mps = Some(take_u16(&mut offset)? as f64 / 100.0);
    }
    if flags & IBD_FLAG_CADENCE != 0 {
        result.cadence_rpm = Some(take_u16(&mut offset)? / 2);
    }
    if flags & 0x0008 != 0 {
        result.avg_cadence_rpm = Some(take_u16(&mut offset)? / 2);
    }
    if flags & IBD_FLAG_POWER != 0 {
        result.power_w = Some(take_u16(&mut offset)? as i16);
    }
    Some(result)
}

/// Parsed Cycling Power Measurement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CpsMeasurement {
    pub power_w: i16,
    pub wheel: Option<WheelRevolutionData>,
    pub crank: Option<CrankRevolutionData>,
}

/// Parse a Cycling Power Measurement (0x2A63).
pub fn parse_cps_measurement(data: &[u8]) -> Option<CpsMeasurement> {
    if data.len() < 4 {
        return None;
    }
    let flags = u16::from_le_bytes([data[0], data[1]]);
    let mut result = CpsMeasurement {
        power_w: i16::from_le_bytes([data[2], data[3]]),
        ..Default::default()
    };
    let mut offset = 4usize;

    if flags & CPS_FLAG_WHEEL_REVS != 0 {
        if offset + 6 > data.len() {
            return None;
        }
        result.wheel = Some(WheelRevolutionData {
            cumulative_revs: u32::from_le_bytes([
                data[offset],
                data[offset + 1],
                data[offset + 2],
                data[offset + 3],
            ]),
            last_event_time_2048: u16::from_le_bytes([data[offset + 4], data[offset + 5]]),
        });
        offset += 6;
    }

    if flags & CPS_FLAG_CRANK_REVS != 0 {
        if offset + 4 > data.len() {
            return None;
        }
        result.crank = Some(CrankRevolutionData {
            cumulative_revs: u16::from_le_bytes([data[offset], data[offset + 1]]),
            last_event_time_1024: u16::from_le_bytes([data[offset + 2], data[offset + 3]]),
        });
    }

    Some(result)
}

/// Parsed RSC Measurement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RscMeasurement {
    pub speed_mps: f64,
    pub cadence_rpm: u8,
}

/// Parse an RSC Measurement (0x2A53).
pub fn parse_rsc_measurement(data: &[u8]) -> Option<RscMeasurement> {
    if data.len() < 4 {
        return None;
    }
    Some(RscMeasurement {
        speed_mps: u16::from_le_bytes([data[1], data[2]]) as f64 / 256.0,
        cadence_rpm: data[3],
    })
}

/// Derives cadence from successive crank-revolution frames.
///
/// Both the revolution counter and the 1/1024 s event clock wrap at u16, so
/// deltas use wrapping arithmetic.
#[derive(Debug, Clone, Default)]
pub struct CrankCadenceTracker {
    last: Option<CrankRevolutionData>,
}

impl CrankCadenceTracker {
    /// Fresh tracker with no history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one frame; returns cadence in rpm once two frames have arrived.
    pub fn update(&mut self, crank: CrankRevolutionData) -> Option<f64> {
        let prev = self.last.replace(crank)?;
        let rev_delta = crank.cumulative_revs.wrapping_sub(prev.cumulative_revs);
        let time_delta = crank
            .last_event_time_1024
            .wrapping_sub(prev.last_event_time_1024);
        if time_delta == 0 {
            return None;
        }
        let seconds = time_delta as f64 / 1024.0;
        Some(rev_delta as f64 / seconds * 60.0)
    }
}
