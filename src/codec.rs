//! Conversion between typed commands/readings and register words.
//!
//! Everything here is pure: no function touches the bus, and every decoder
//! accepts any 16-bit input. Values outside the documented domain are
//! reported as [`DecodeAnomaly`] next to the decoded result.

use num::FromPrimitive;
use num_derive::FromPrimitive;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::registers::{Field, Register};

/// Supply voltage per LSB of the voltage byte.
pub const VOLTS_PER_LSB: f32 = 1.0;
/// Internal temperature per LSB of the temperature byte.
pub const CELSIUS_PER_LSB: f32 = 1.0;

/// Fault bits, low byte of the fault/position word.
const FAULT_CONTROL_COMMAND: u16 = 1 << 0;
/// No communication within 1s.
const FAULT_COMMUNICATION: u16 = 1 << 1;
const FAULT_OVERCURRENT: u16 = 1 << 2;
/// Supply outside 20V to 30V.
const FAULT_VOLTAGE: u16 = 1 << 3;
const FAULT_ENABLING: u16 = 1 << 4;
/// Internal temperature at or above 85 degree celsius.
const FAULT_OVERTEMPERATURE: u16 = 1 << 5;
const FAULT_SELF: u16 = 1 << 6;

/// A command the gripper accepts.
///
/// Numeric fields are signed so that any caller value can be expressed;
/// [`encode_command`] rejects everything outside `0..=255`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    /// Set `rACT`. The gripper opens and closes once to calibrate.
    Activate,
    /// Keep `rACT`, clear `rGTO`. The fingers halt where they are.
    Stop,
    /// Stage speed and force. Does not start a motion.
    SetSpeedForce { speed: i32, force: i32 },
    /// Stage the target position, `0` fully open, `255` fully closed.
    /// Does not start a motion.
    MoveToPosition { position: i32 },
    /// Set `rGTO`, moving to the staged target.
    ExecuteMove,
    /// Clear the control word. Resets the gripper and clears all faults.
    Reset,
    /// Emergency automatic release, slowly driving every axis to its
    /// mechanical limit. `open` selects the opening direction. The gripper
    /// raises a fault once done and must be reset and re-activated.
    AutoRelease { open: bool },
}

/// Words to write for a [`Command`], starting at the block of `register`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedCommand {
    pub register: Register,
    pub words: Vec<u16>,
}

/// Builder for the control word.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControlWord {
    pub enable: bool,
    pub parameterless_mode: bool,
    pub go_to: bool,
    pub auto_release: bool,
    pub release_open: bool,
}

impl ControlWord {
    pub fn new() -> Self {
        Self::default()
    }

    /// `rACT`. Must stay set in every command after activation, clearing it
    /// resets the gripper.
    pub fn enable(mut self, b: bool) -> Self {
        self.enable = b;
        self
    }
    /// `rMODE`. When set, the gripper ignores the staged parameters and uses
    /// its stored preset.
    pub fn parameterless_mode(mut self, b: bool) -> Self {
        self.parameterless_mode = b;
        self
    }
    /// `rGTO`
    pub fn go_to(mut self, b: bool) -> Self {
        self.go_to = b;
        self
    }
    /// `rATR`, overrides everything but `rACT`.
    pub fn auto_release(mut self, b: bool) -> Self {
        self.auto_release = b;
        self
    }
    /// `rARD`. Set it no later than `rATR`, the direction latches when the
    /// release starts.
    pub fn release_open(mut self, b: bool) -> Self {
        self.release_open = b;
        self
    }

    /// Pack into the control register word.
    pub fn to_word(&self) -> u16 {
        [
            (Field::ControlEnable, self.enable),
            (Field::ControlMode, self.parameterless_mode),
            (Field::ControlGoTo, self.go_to),
            (Field::ControlAutoRelease, self.auto_release),
            (Field::ControlReleaseDirection, self.release_open),
        ]
        .into_iter()
        .fold(0, |word, (field, set)| field.layout().insert(word, set as u16))
    }
}

/// Validate and pack a command.
pub fn encode_command(command: &Command) -> Result<EncodedCommand, ValidationError> {
    let (register, word) = match *command {
        Command::Activate | Command::Stop => {
            (Register::Control, ControlWord::new().enable(true).to_word())
        }
        Command::ExecuteMove => (
            Register::Control,
            ControlWord::new().enable(true).go_to(true).to_word(),
        ),
        Command::Reset => (Register::Control, ControlWord::new().to_word()),
        Command::AutoRelease { open } => (
            Register::Control,
            ControlWord::new()
                .enable(true)
                .auto_release(true)
                .release_open(open)
                .to_word(),
        ),
        Command::SetSpeedForce { speed, force } => {
            let speed = ValidationError::check_u8("speed", speed)?;
            let force = ValidationError::check_u8("force", force)?;
            let word = Field::TargetSpeed.layout().insert(0, speed.into());
            let word = Field::TargetForce.layout().insert(word, force.into());
            (Register::SpeedForce, word)
        }
        Command::MoveToPosition { position } => {
            let position = ValidationError::check_u8("position", position)?;
            let word = Field::TargetPosition.layout().insert(0, position.into());
            (Register::Position, word)
        }
    };

    Ok(EncodedCommand {
        register,
        words: vec![word],
    })
}

/// Register value outside its documented domain. Decoding still succeeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DecodeAnomaly {
    /// The field holds a value with no documented meaning.
    OutOfRange { field: Field, raw: u16 },
    /// Bits documented as reserved are set.
    ReservedBits { field: Field, raw: u16 },
}

/// The gripper's activation status, `gSTA`.
#[repr(u8)]
#[derive(Debug, Clone, Copy, FromPrimitive, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActivationStatus {
    /// Gripper is in reset or running an automatic inspection.
    ResetOrInspection = 0,
    /// Activation in progress.
    Activating = 1,
    /// Activation completed.
    Activated = 3,
    /// Reserved value reported by the device.
    Unknown = 0xFF,
}

/// Object detection status, `gOBJ`. Only meaningful while `gGTO` is set.
#[repr(u8)]
#[derive(Debug, Clone, Copy, FromPrimitive, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObjectDetection {
    /// Fingers are moving towards the requested position.
    MovingOnly = 0,
    /// Fingers stopped on contact while opening (inner support grip).
    AtOpenLimit = 1,
    /// Fingers stopped on contact while closing (outer clamp).
    AtCloseLimit = 2,
    /// Fingers reached the requested position, no object or object dropped.
    NoObject = 3,
    /// Value outside the documented encoding.
    Unknown = 0xFF,
}

impl ObjectDetection {
    /// Whether the fingers stopped against an object.
    pub fn detected_object(&self) -> bool {
        matches!(
            self,
            ObjectDetection::AtOpenLimit | ObjectDetection::AtCloseLimit
        )
    }
}

/// Fault flags of the gripper. Any number of them can be set at once.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GripperFaultStatus {
    pub control_command_error: bool,
    /// No communication within 1 second.
    pub communication_fault: bool,
    pub overcurrent: bool,
    /// Supply outside 20V to 30V.
    pub voltage_abnormal: bool,
    pub enabling_error: bool,
    /// Internal temperature at or above 85 degree celsius.
    pub overtemperature: bool,
    pub self_fault: bool,
}

impl GripperFaultStatus {
    /// Whether any fault is raised.
    pub fn any(&self) -> bool {
        self.active().next().is_some()
    }

    /// Names of the raised faults.
    pub fn active(&self) -> impl Iterator<Item = &'static str> {
        [
            ("control_command_error", self.control_command_error),
            ("communication_fault", self.communication_fault),
            ("overcurrent", self.overcurrent),
            ("voltage_abnormal", self.voltage_abnormal),
            ("enabling_error", self.enabling_error),
            ("overtemperature", self.overtemperature),
            ("self_fault", self.self_fault),
        ]
        .into_iter()
        .filter_map(|(name, set)| set.then_some(name))
    }
}

impl std::fmt::Display for GripperFaultStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut active = self.active().peekable();
        if active.peek().is_none() {
            return write!(f, "no fault");
        }
        let names: Vec<_> = active.collect();
        write!(f, "{}", names.join(", "))
    }
}

/// Decoded status read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GripperStatus {
    /// Activation completed.
    pub activated: bool,
    /// A "go to" is in progress.
    pub moving: bool,
    /// Actual finger position, `0` open, `255` closed.
    pub position: u8,
    pub object: ObjectDetection,
    /// Echo of `rACT`.
    pub enabled: bool,
    /// Workpiece drop flag.
    pub dropped: bool,
    /// Echo of `rMODE`.
    pub parameterless_mode: bool,
    /// Echo of `rGTO`.
    pub go_to: bool,
    pub activation: ActivationStatus,
    /// Faults reported in the same read.
    pub faults: GripperFaultStatus,
    pub anomalies: Vec<DecodeAnomaly>,
}

/// Decoded fault/position register.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaultPosition {
    pub fault: GripperFaultStatus,
    pub position: u8,
    pub anomalies: Vec<DecodeAnomaly>,
}

/// Speed and force currently configured on the gripper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeedForce {
    pub speed: u8,
    pub force: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VoltageTemperature {
    /// Volts.
    pub voltage: f32,
    /// Degree celsius.
    pub temperature: f32,
}

/// Firmware version word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoftwareVersion(pub u16);

impl std::fmt::Display for SoftwareVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{:04X}", self.0)
    }
}

fn get(field: Field, words: &[u16]) -> u16 {
    let layout = field.layout();
    let word = words
        .get(layout.word_offset as usize)
        .copied()
        .unwrap_or_default();
    layout.extract(word)
}

fn get_bool(field: Field, words: &[u16]) -> bool {
    get(field, words) != 0
}

fn get_u8(field: Field, words: &[u16]) -> u8 {
    // Every 8-bit field is masked to one byte.
    get(field, words) as u8
}

fn reserved(field: Field, words: &[u16], anomalies: &mut Vec<DecodeAnomaly>) {
    let raw = get(field, words);
    if raw != 0 {
        anomalies.push(DecodeAnomaly::ReservedBits { field, raw });
    }
}

fn faults_from(field: Field, words: &[u16]) -> GripperFaultStatus {
    let bits = get(field, words);
    GripperFaultStatus {
        control_command_error: bits & FAULT_CONTROL_COMMAND != 0,
        communication_fault: bits & FAULT_COMMUNICATION != 0,
        overcurrent: bits & FAULT_OVERCURRENT != 0,
        voltage_abnormal: bits & FAULT_VOLTAGE != 0,
        enabling_error: bits & FAULT_ENABLING != 0,
        overtemperature: bits & FAULT_OVERTEMPERATURE != 0,
        self_fault: bits & FAULT_SELF != 0,
    }
}

/// Decode the two-word status block.
pub fn decode_status(words: [u16; 2]) -> GripperStatus {
    let mut anomalies = Vec::new();

    let raw = get(Field::StatusActivation, &words);
    let activation = ActivationStatus::from_u16(raw)
        .filter(|s| *s != ActivationStatus::Unknown)
        .unwrap_or_else(|| {
            anomalies.push(DecodeAnomaly::OutOfRange {
                field: Field::StatusActivation,
                raw,
            });
            ActivationStatus::Unknown
        });

    let raw = get(Field::StatusObject, &words);
    let object = ObjectDetection::from_u16(raw)
        .filter(|o| *o != ObjectDetection::Unknown)
        .unwrap_or_else(|| {
            anomalies.push(DecodeAnomaly::OutOfRange {
                field: Field::StatusObject,
                raw,
            });
            ObjectDetection::Unknown
        });

    reserved(Field::StatusReserved, &words, &mut anomalies);
    reserved(Field::StatusFaultReserved, &words, &mut anomalies);

    let go_to = get_bool(Field::StatusGoTo, &words);

    GripperStatus {
        activated: activation == ActivationStatus::Activated,
        moving: go_to && object == ObjectDetection::MovingOnly,
        position: get_u8(Field::StatusPosition, &words),
        object,
        enabled: get_bool(Field::StatusEnabled, &words),
        dropped: get_bool(Field::StatusDropped, &words),
        parameterless_mode: get_bool(Field::StatusMode, &words),
        go_to,
        activation,
        faults: faults_from(Field::StatusFaults, &words),
        anomalies,
    }
}

/// Decode the fault bits of a fault/position word.
pub fn decode_faults(word: u16) -> GripperFaultStatus {
    faults_from(Field::Faults, &[word])
}

/// Decode a fault/position word.
pub fn decode_fault_position(word: u16) -> FaultPosition {
    let words = [word];
    let mut anomalies = Vec::new();
    reserved(Field::FaultReserved, &words, &mut anomalies);
    FaultPosition {
        fault: decode_faults(word),
        position: get_u8(Field::CurrentPosition, &words),
        anomalies,
    }
}

/// Decode the speed/force echo word, speed in the low byte.
pub fn decode_speed_force(word: u16) -> SpeedForce {
    let words = [word];
    SpeedForce {
        speed: get_u8(Field::SpeedEcho, &words),
        force: get_u8(Field::ForceEcho, &words),
    }
}

/// Decode the voltage/temperature word, scaled by [`VOLTS_PER_LSB`] and
/// [`CELSIUS_PER_LSB`].
pub fn decode_voltage_temperature(word: u16) -> VoltageTemperature {
    let words = [word];
    VoltageTemperature {
        voltage: f32::from(get_u8(Field::Voltage, &words)) * VOLTS_PER_LSB,
        temperature: f32::from(get_u8(Field::Temperature, &words)) * CELSIUS_PER_LSB,
    }
}

/// Decode the firmware version word.
pub fn decode_software_version(word: u16) -> SoftwareVersion {
    SoftwareVersion(get(Field::SoftwareVersion, &[word]))
}
