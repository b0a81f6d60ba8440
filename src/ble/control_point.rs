//! FTMS Control Point protocol machine.
//!
//! Consumes raw write payloads on the Fitness Machine Control Point
//! (0x2AD9), validates them, mutates the shared [`ControlState`] and
//! produces the indication response plus any Fitness Machine Status
//! notifications, some of which are emitted after a delay. All multi-byte
//! integers are little-endian.

/// Response header: ResponseCode opcode.
const RESPONSE_OPCODE: u8 = 0x80;

/// Machine Status opcode: reset.
const STATUS_RESET: u8 = 0x01;
/// Machine Status opcode: stopped or paused by the user.
const STATUS_STOPPED: u8 = 0x02;
/// Machine Status opcode: started or resumed by the user.
const STATUS_STARTED: u8 = 0x04;
/// Machine Status opcode: target power changed.
const STATUS_TARGET_POWER_CHANGED: u8 = 0x08;
/// Machine Status opcode: target speed changed.
const STATUS_TARGET_SPEED_CHANGED: u8 = 0x10;
/// Machine Status opcode: target inclination changed.
const STATUS_TARGET_INCLINE_CHANGED: u8 = 0x11;
/// Machine Status opcode: indoor bike simulation parameters changed.
const STATUS_SIM_PARAMS_CHANGED: u8 = 0x12;
/// Machine Status opcode: wheel circumference changed.
const STATUS_WHEEL_CIRC_CHANGED: u8 = 0x13;
/// Machine Status opcode: spin-down requested.
const STATUS_SPIN_DOWN_STARTED: u8 = 0x14;
/// Machine Status opcode: spin-down ignored / complete.
const STATUS_SPIN_DOWN_STATUS: u8 = 0x15;
/// Machine Status opcode: targeted cadence changed.
const STATUS_TARGET_CADENCE_CHANGED: u8 = 0x16;

/// Delay before the reset status notification, seconds.
const RESET_STATUS_DELAY_S: f64 = 0.5;
/// Delay before the spin-down completion status, seconds.
const SPIN_DOWN_COMPLETE_DELAY_S: f64 = 2.5;

/// Control Point request opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OpCode {
    RequestControl = 0x00,
    Reset = 0x01,
    SetTargetSpeed = 0x02,
    SetTargetInclination = 0x03,
    SetTargetResistanceLevel = 0x04,
    SetTargetPower = 0x05,
    StartOrResume = 0x07,
    StopOrPause = 0x08,
    SetIndoorBikeSimulation = 0x11,
    SetWheelCircumference = 0x12,
    SpinDownControl = 0x13,
    SetTargetedCadence = 0x14,
}

impl OpCode {
    /// Decode a request opcode byte.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x00 => Some(OpCode::RequestControl),
            0x01 => Some(OpCode::Reset),
            0x02 => Some(OpCode::SetTargetSpeed),
            0x03 => Some(OpCode::SetTargetInclination),
            0x04 => Some(OpCode::SetTargetResistanceLevel),
            0x05 => Some(OpCode::SetTargetPower),
            0x07 => Some(OpCode::StartOrResume),
            0x08 => Some(OpCode::StopOrPause),
            0x11 => Some(OpCode::SetIndoorBikeSimulation),
            0x12 => Some(OpCode::SetWheelCircumference),
            0x13 => Some(OpCode::SpinDownControl),
            0x14 => Some(OpCode::SetTargetedCadence),
            _ => None,
        }
    }
}

/// Control Point result codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ResultCode {
    Success = 0x01,
    OpCodeNotSupported = 0x02,
    InvalidParameter = 0x03,
    OperationFailed = 0x04,
    ControlNotPermitted = 0x05,
}

/// Trainer state owned by the protocol machine.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlState {
    /// A consumer holds control of the machine.
    pub has_control: bool,
    /// The session is running.
    pub is_started: bool,
    /// ERG target, watts.
    pub target_power_w: i32,
    /// Simulated headwind, m/s.
    pub wind_speed_mps: f64,
    /// Simulated grade, percent.
    pub grade_pct: f64,
    /// Rolling resistance coefficient.
    pub crr: f64,
    /// Wind resistance coefficient, kg/m.
    pub cw: f64,
    /// Wheel circumference used for CPS wheel-event counters, meters.
    pub cps_wheel_circumference_m: f64,
}

impl Default for ControlState {
    fn default() -> Self {
        Self {
            has_control: true,
            is_started: true,
            target_power_w: 250,
            wind_speed_mps: 0.0,
            grade_pct: 0.0,
            crr: 0.004,
            cw: 0.51,
            cps_wheel_circumference_m: 2.096,
        }
    }
}

/// A status notification to push on 0x2ADA, possibly after a delay.
///
/// The delay is measured from reception of the triggering write, not from
/// delivery of the response indication.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusNotification {
    pub payload: Vec<u8>,
    pub delay_s: f64,
}

impl StatusNotification {
    fn immediate(payload: Vec<u8>) -> Self {
        Self {
            payload,
            delay_s: 0.0,
        }
    }

    fn delayed(payload: Vec<u8>, delay_s: f64) -> Self {
        Self { payload, delay_s }
    }
}

/// Everything one control-point write produces.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandResult {
    /// Indication bytes, or `None` for an empty write (no response at all).
    pub response: Option<Vec<u8>>,
    /// Status notifications in emission order.
    pub statuses: Vec<StatusNotification>,
    /// Parsed opcode, when the byte mapped to one.
    pub opcode: Option<OpCode>,
    /// Human-readable outcome for the event feed.
    pub log: String,
}

impl CommandResult {
    fn reply(opcode: OpCode, code: ResultCode, log: impl Into<String>) -> Self {
        Self {
            response: Some(vec![RESPONSE_OPCODE, opcode as u8, code as u8]),
            statuses: Vec::new(),
            opcode: Some(opcode),
            log: log.into(),
        }
    }

    fn with_status(mut self, status: StatusNotification) -> Self {
        self.statuses.push(status);
        self
    }
}

/// The protocol machine. Stateless apart from the strict-control policy
/// flag; all trainer state lives in [`ControlState`].
#[derive(Debug, Clone, Default)]
pub struct ControlPoint {
    /// Refuse RequestControl while another consumer holds control.
    ///
    /// Off by default: the open-access policy suits single-consumer use,
    /// where a reconnecting app should never be locked out.
    pub strict: bool,
}

impl ControlPoint {
    /// Machine with the default open-control policy.
    pub fn new() -> Self {
        Self::default()
    }

    /// Process one write payload against the shared state.
    pub fn handle(&self, state: &mut ControlState, payload: &[u8]) -> CommandResult {
        let Some(&op_byte) = payload.first() else {
            return CommandResult {
                response: None,
                statuses: Vec::new(),
                opcode: None,
                log: "empty control point write".to_string(),
            };
        };

        let Some(opcode) = OpCode::from_byte(op_byte) else {
            return CommandResult {
                response: Some(vec![
                    RESPONSE_OPCODE,
                    op_byte,
                    ResultCode::OpCodeNotSupported as u8,
                ]),
                statuses: Vec::new(),
                opcode: None,
                log: format!("unsupported opcode 0x{:02X}", op_byte),
            };
        };

        if opcode != OpCode::RequestControl && !state.has_control {
            return CommandResult::reply(
                opcode,
                ResultCode::ControlNotPermitted,
                format!("{:?} rejected: control not requested", opcode),
            );
        }

        let params = &payload[1..];
        match opcode {
            OpCode::RequestControl => self.request_control(state),
            OpCode::Reset => Self::reset(state),
            OpCode::SetTargetSpeed => Self::set_target_speed(params),
            OpCode::SetTargetInclination => Self::set_target_inclination(state, params),
            OpCode::SetTargetResistanceLevel => CommandResult::reply(
                opcode,
                ResultCode::OpCodeNotSupported,
                "resistance mode not supported",
            ),
            OpCode::SetTargetPower => Self::set_target_power(state, params),
            OpCode::StartOrResume => Self::start_or_resume(state),
            OpCode::StopOrPause => Self::stop_or_pause(state),
            OpCode::SetIndoorBikeSimulation => Self::set_simulation(state, params),
            OpCode::SetWheelCircumference => Self::set_wheel_circumference(state, params),
            OpCode::SpinDownControl => Self::spin_down(params),
            OpCode::SetTargetedCadence => Self::set_targeted_cadence(params),
        }
    }

    fn request_control(&self, state: &mut ControlState) -> CommandResult {
        if self.strict && state.has_control {
            return CommandResult::reply(
                OpCode::RequestControl,
                ResultCode::ControlNotPermitted,
                "control already held",
            );
        }
        state.has_control = true;
        CommandResult::reply(
            OpCode::RequestControl,
            ResultCode::Success,
            "control granted",
        )
    }

    /// Reset drops control and stops the session. The target power is kept
    /// so a consumer-set wattage survives the reset.
    fn reset(state: &mut ControlState) -> CommandResult {
        state.has_control = false;
        state.is_started = false;
        CommandResult::reply(OpCode::Reset, ResultCode::Success, "machine reset")
            .with_status(StatusNotification::delayed(
                vec![STATUS_RESET],
                RESET_STATUS_DELAY_S,
            ))
    }

    fn set_target_power(state: &mut ControlState, params: &[u8]) -> CommandResult {
        let Some(raw) = read_i16(params) else {
            return short_payload(OpCode::SetTargetPower);
        };
        if !(0..=4000).contains(&i32::from(raw)) {
            return CommandResult::reply(
                OpCode::SetTargetPower,
                ResultCode::InvalidParameter,
                format!("target power {} W out of range", raw),
            );
        }
        state.target_power_w = i32::from(raw);
        let mut status = vec![STATUS_TARGET_POWER_CHANGED];
        status.extend_from_slice(&raw.to_le_bytes());
        CommandResult::reply(
            OpCode::SetTargetPower,
            ResultCode::Success,
            format!("target power set to {} W", raw),
        )
        .with_status(StatusNotification::immediate(status))
    }

    fn start_or_resume(state: &mut ControlState) -> CommandResult {
        let transition = !state.is_started;
        state.is_started = true;
        let mut result =
            CommandResult::reply(OpCode::StartOrResume, ResultCode::Success, "session started");
        if transition {
            result = result.with_status(StatusNotification::immediate(vec![STATUS_STARTED]));
        }
        result
    }

    fn stop_or_pause(state: &mut ControlState) -> CommandResult {
        let transition = state.is_started;
        state.is_started = false;
        let mut result =
            CommandResult::reply(OpCode::StopOrPause, ResultCode::Success, "session stopped");
        if transition {
            result = result.with_status(StatusNotification::immediate(vec![STATUS_STOPPED]));
        }
        result
    }

    fn set_simulation(state: &mut ControlState, params: &[u8]) -> CommandResult {
        if params.len() < 6 {
            return short_payload(OpCode::SetIndoorBikeSimulation);
        }
        let wind_raw = i16::from_le_bytes([params[0], params[1]]);
        let grade_raw = i16::from_le_bytes([params[2], params[3]]);
        let crr_raw = params[4];
        let cw_raw = params[5];

        if wind_raw == i16::MIN || grade_raw.unsigned_abs() > 4000 {
            return CommandResult::reply(
                OpCode::SetIndoorBikeSimulation,
                ResultCode::InvalidParameter,
                format!(
                    "simulation parameters out of range (wind {}, grade {})",
                    wind_raw, grade_raw
                ),
            );
        }

        state.wind_speed_mps = f64::from(wind_raw) * 0.001;
        state.grade_pct = f64::from(grade_raw) * 0.01;
        state.crr = f64::from(crr_raw) * 0.0001;
        state.cw = f64::from(cw_raw) * 0.01;

        let mut status = vec![STATUS_SIM_PARAMS_CHANGED];
        status.extend_from_slice(&params[..6]);
        CommandResult::reply(
            OpCode::SetIndoorBikeSimulation,
            ResultCode::Success,
            format!(
                "simulation set: wind {:.3} m/s, grade {:.2}%, crr {:.4}, cw {:.2}",
                state.wind_speed_mps, state.grade_pct, state.crr, state.cw
            ),
        )
        .with_status(StatusNotification::immediate(status))
    }

    fn spin_down(params: &[u8]) -> CommandResult {
        match params.first() {
            Some(0x01) => CommandResult::reply(
                OpCode::SpinDownControl,
                ResultCode::Success,
                "spin-down calibration started",
            )
            .with_status(StatusNotification::immediate(vec![STATUS_SPIN_DOWN_STARTED]))
            .with_status(StatusNotification::delayed(
                vec![STATUS_SPIN_DOWN_STATUS],
                SPIN_DOWN_COMPLETE_DELAY_S,
            )),
            Some(0x02) => CommandResult::reply(
                OpCode::SpinDownControl,
                ResultCode::Success,
                "spin-down ignored",
            )
            .with_status(StatusNotification::immediate(vec![STATUS_SPIN_DOWN_STATUS])),
            Some(other) => CommandResult::reply(
                OpCode::SpinDownControl,
                ResultCode::InvalidParameter,
                format!("unknown spin-down subcommand 0x{:02X}", other),
            ),
            None => short_payload(OpCode::SpinDownControl),
        }
    }

    fn set_target_speed(params: &[u8]) -> CommandResult {
        let Some(raw) = read_u16(params) else {
            return short_payload(OpCode::SetTargetSpeed);
        };
        let mut status = vec![STATUS_TARGET_SPEED_CHANGED];
        status.extend_from_slice(&raw.to_le_bytes());
        CommandResult::reply(
            OpCode::SetTargetSpeed,
            ResultCode::Success,
            format!("target speed acknowledged ({} cm/s)", raw),
        )
        .with_status(StatusNotification::immediate(status))
    }

    fn set_target_inclination(state: &mut ControlState, params: &[u8]) -> CommandResult {
        let Some(raw) = read_i16(params) else {
            return short_payload(OpCode::SetTargetInclination);
        };
        state.grade_pct = f64::from(raw) / 10.0;
        let mut status = vec![STATUS_TARGET_INCLINE_CHANGED];
        status.extend_from_slice(&raw.to_le_bytes());
        CommandResult::reply(
            OpCode::SetTargetInclination,
            ResultCode::Success,
            format!("inclination set to {:.1}%", state.grade_pct),
        )
        .with_status(StatusNotification::immediate(status))
    }

    fn set_wheel_circumference(state: &mut ControlState, params: &[u8]) -> CommandResult {
        let Some(raw) = read_u16(params) else {
            return short_payload(OpCode::SetWheelCircumference);
        };
        state.cps_wheel_circumference_m = f64::from(raw) / 1000.0;
        let mut status = vec![STATUS_WHEEL_CIRC_CHANGED];
        status.extend_from_slice(&raw.to_le_bytes());
        CommandResult::reply(
            OpCode::SetWheelCircumference,
            ResultCode::Success,
            format!("wheel circumference set to {} mm", raw),
        )
        .with_status(StatusNotification::immediate(status))
    }

    fn set_targeted_cadence(params: &[u8]) -> CommandResult {
        let Some(raw) = read_u16(params) else {
            return short_payload(OpCode::SetTargetedCadence);
        };
        let mut status = vec![STATUS_TARGET_CADENCE_CHANGED];
        status.extend_from_slice(&raw.to_le_bytes());
        CommandResult::reply(
            OpCode::SetTargetedCadence,
            ResultCode::Success,
            format!("target cadence acknowledged ({:.1} rpm)", raw as f64 / 2.0),
        )
        .with_status(StatusNotification::immediate(status))
    }
}

fn read_i16(params: &[u8]) -> Option<i16> {
    if params.len() < 2 {
        return None;
    }
    Some(i16::from_le_bytes([params[0], params[1]]))
}

fn read_u16(params: &[u8]) -> Option<u16> {
    if params.len() < 2 {
        return None;
    }
    Some(u16::from_le_bytes([params[0], params[1]]))
}

fn short_payload(opcode: OpCode) -> CommandResult {
    CommandResult::reply(
        opcode,
        ResultCode::InvalidParameter,
        format!("{:?}: payload too short", opcode),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn machine() -> (ControlPoint, ControlState) {
        (ControlPoint::new(), ControlState::default())
    }

    #[test]
    fn test_reset_drops_control_and_schedules_status() {
        let (cp, mut state) = machine();
        let result = cp.handle(&mut state, &[0x01]);
        assert_eq!(result.response.unwrap(), vec![0x80, 0x01, 0x01]);
        assert!(!state.has_control);
        assert!(!state.is_started);
        assert_eq!(state.target_power_w, 250, "reset must keep target power");
        assert_eq!(result.statuses.len(), 1);
        assert_eq!(result.statuses[0].payload, vec![0x01]);
        assert!((result.statuses[0].delay_s - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_set_target_power() {
        let (cp, mut state) = machine();
        let result = cp.handle(&mut state, &[0x05, 0xFA, 0x00]);
        assert_eq!(result.response.unwrap(), vec![0x80, 0x05, 0x01]);
        assert_eq!(state.target_power_w, 250);
        assert_eq!(result.statuses[0].payload, vec![0x08, 0xFA, 0x00]);
        assert_eq!(result.statuses[0].delay_s, 0.0);
    }

    #[test]
    fn test_set_target_power_out_of_range() {
        let (cp, mut state) = machine();
        // -1 W as an i16.
        let result = cp.handle(&mut state, &[0x05, 0xFF, 0xFF]);
        assert_eq!(result.response.unwrap(), vec![0x80, 0x05, 0x03]);
        assert_eq!(state.target_power_w, 250);
        assert!(result.statuses.is_empty());
    }

    #[test]
    fn test_set_indoor_bike_simulation() {
        let (cp, mut state) = machine();
        // Wind 0, grade 5.00%, crr 0.004, cw 0.51.
        let result = cp.handle(&mut state, &[0x11, 0x00, 0x00, 0xF4, 0x01, 0x28, 0x33]);
        assert_eq!(result.response.unwrap(), vec![0x80, 0x11, 0x01]);
        assert_eq!(
            result.statuses[0].payload,
            vec![0x12, 0x00, 0x00, 0xF4, 0x01, 0x28, 0x33]
        );
        assert!((state.grade_pct - 5.0).abs() < 1e-9);
        assert!((state.crr - 0.004).abs() < 1e-9);
        assert!((state.cw - 0.51).abs() < 1e-9);
    }

    #[test]
    fn test_guarded_opcode_without_control() {
        let (cp, mut state) = machine();
        state.has_control = false;
        let result = cp.handle(&mut state, &[0x05, 0xFA, 0x00]);
        assert_eq!(result.response.unwrap(), vec![0x80, 0x05, 0x05]);
        assert_eq!(state.target_power_w, 250);
    }

    #[test]
    fn test_request_control_always_succeeds_by_default() {
        let (cp, mut state) = machine();
        state.has_control = false;
        let result = cp.handle(&mut state, &[0x00]);
        assert_eq!(result.response.unwrap(), vec![0x80, 0x00, 0x01]);
        assert!(state.has_control);

        // Even while control is nominally held.
        let result = cp.handle(&mut state, &[0x00]);
        assert_eq!(result.response.unwrap(), vec![0x80, 0x00, 0x01]);
    }

    #[test]
    fn test_strict_mode_refuses_held_control() {
        let cp = ControlPoint { strict: true };
        let mut state = ControlState::default();
        let result = cp.handle(&mut state, &[0x00]);
        assert_eq!(result.response.unwrap(), vec![0x80, 0x00, 0x05]);
    }

    #[test]
    fn test_start_stop_emit_status_only_on_transition() {
        let (cp, mut state) = machine();
        // Already started: no status.
        assert!(cp.handle(&mut state, &[0x07]).statuses.is_empty());
        let stopped = cp.handle(&mut state, &[0x08]);
        assert_eq!(stopped.statuses[0].payload, vec![0x02]);
        assert!(cp.handle(&mut state, &[0x08]).statuses.is_empty());
        let started = cp.handle(&mut state, &[0x07]);
        assert_eq!(started.statuses[0].payload, vec![0x04]);
    }

    #[test]
    fn test_spin_down_start_schedules_completion() {
        let (cp, mut state) = machine();
        let result = cp.handle(&mut state, &[0x13, 0x01]);
        assert_eq!(result.response.unwrap(), vec![0x80, 0x13, 0x01]);
        assert_eq!(result.statuses.len(), 2);
        assert_eq!(result.statuses[0].payload, vec![0x14]);
        assert_eq!(result.statuses[0].delay_s, 0.0);
        assert_eq!(result.statuses[1].payload, vec![0x15]);
        assert!((result.statuses[1].delay_s - 2.5).abs() < 1e-9);
    }

    #[test]
    fn test_spin_down_ignore() {
        let (cp, mut state) = machine();
        let result = cp.handle(&mut state, &[0x13, 0x02]);
        assert_eq!(result.statuses.len(), 1);
        assert_eq!(result.statuses[0].payload, vec![0x15]);
    }

    #[test]
    fn test_resistance_mode_not_supported() {
        let (cp, mut state) = machine();
        let result = cp.handle(&mut state, &[0x04, 0x64, 0x00]);
        assert_eq!(result.response.unwrap(), vec![0x80, 0x04, 0x02]);
    }

    #[test]
    fn test_unknown_opcode() {
        let (cp, mut state) = machine();
        let result = cp.handle(&mut state, &[0x42]);
        assert_eq!(result.response.unwrap(), vec![0x80, 0x42, 0x02]);
        assert!(result.opcode.is_none());
    }

    #[test]
    fn test_empty_write_has_no_response() {
        let (cp, mut state) = machine();
        let result = cp.handle(&mut state, &[]);
        assert!(result.response.is_none());
        assert!(result.statuses.is_empty());
    }

    #[test]
    fn test_short_payload_is_invalid_parameter() {
        let (cp, mut state) = machine();
        let result = cp.handle(&mut state, &[0x05, 0xFA]);
        assert_eq!(result.response.unwrap(), vec![0x80, 0x05, 0x03]);
    }

    #[test]
    fn test_set_target_inclination_updates_grade() {
        let (cp, mut state) = machine();
        // 25 tenths = 2.5%.
        let result = cp.handle(&mut state, &[0x03, 0x19, 0x00]);
        assert_eq!(result.statuses[0].payload, vec![0x11, 0x19, 0x00]);
        assert!((state.grade_pct - 2.5).abs() < 1e-9);
    }

    #[test]
    fn test_set_wheel_circumference_updates_cps_wheel() {
        let (cp, mut state) = machine();
        let result = cp.handle(&mut state, &[0x12, 0x40, 0x08]); // 2112 mm
        assert_eq!(result.statuses[0].payload, vec![0x13, 0x40, 0x08]);
        assert!((state.cps_wheel_circumference_m - 2.112).abs() < 1e-9);
    }
}
