//! Register map of the gripper.
//!
//! Two tables live here. [`Field::layout`] is the compile-time bit layout of
//! every field the codec touches, and [`RegisterMap`] is the validated address
//! table saying where each register block lives on the bus.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// A register block exposed by the gripper.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Register {
    /// Control word, `rACT`, `rMODE`, `rGTO`, `rATR`, `rARD`.
    Control,
    /// Target position, high byte.
    Position,
    /// Target speed (low byte) and force (high byte).
    SpeedForce,
    /// Status byte followed by the fault/position word.
    Status,
    /// Fault bits (low byte) and actual position (high byte).
    FaultPosition,
    /// Echo of the configured speed (low byte) and force (high byte).
    SpeedForceStatus,
    /// Supply voltage (low byte) and internal temperature (high byte).
    VoltageTemperature,
    /// Firmware version word.
    SoftwareVersion,
}

impl Register {
    /// Every register block, in table order.
    pub const ALL: [Register; 8] = [
        Register::Control,
        Register::Position,
        Register::SpeedForce,
        Register::Status,
        Register::FaultPosition,
        Register::SpeedForceStatus,
        Register::VoltageTemperature,
        Register::SoftwareVersion,
    ];

    /// Number of words the codec reads or writes for this block.
    pub const fn word_count(self) -> u16 {
        match self {
            Register::Status => 2,
            _ => 1,
        }
    }

    /// Whether the block is written by commands.
    pub const fn is_writable(self) -> bool {
        matches!(
            self,
            Register::Control | Register::Position | Register::SpeedForce
        )
    }

    const fn index(self) -> usize {
        self as usize
    }
}

impl std::fmt::Display for Register {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Modbus table a block is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Access {
    /// Holding registers, function codes 3 and 16.
    #[default]
    Holding,
    /// Input registers, function code 4. Read only.
    Input,
}

/// Position of a field inside its register block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitField {
    pub register: Register,
    /// Word index from the start of the block.
    pub word_offset: u16,
    pub mask: u16,
    pub shift: u32,
}

impl BitField {
    const fn new(register: Register, word_offset: u16, mask: u16, shift: u32) -> Self {
        Self {
            register,
            word_offset,
            mask,
            shift,
        }
    }

    /// Pull the field out of its word.
    pub const fn extract(&self, word: u16) -> u16 {
        (word & self.mask) >> self.shift
    }

    /// Write `value` into the field of `word`, leaving the other bits alone.
    pub const fn insert(&self, word: u16, value: u16) -> u16 {
        (word & !self.mask) | ((value << self.shift) & self.mask)
    }

    /// Largest value the field can hold.
    pub const fn max_value(&self) -> u16 {
        self.mask >> self.shift
    }
}

/// Every field the codec reads or writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    /// `rACT`, enable the gripper. Clearing it resets the gripper and its faults.
    ControlEnable,
    /// `rMODE`, parameterless control mode.
    ControlMode,
    /// `rGTO`, move to the staged target.
    ControlGoTo,
    /// `rATR`, emergency automatic release.
    ControlAutoRelease,
    /// `rARD`, automatic release direction, set means opening.
    ControlReleaseDirection,
    TargetPosition,
    TargetSpeed,
    TargetForce,
    /// `gACT`
    StatusEnabled,
    /// Workpiece drop flag.
    StatusDropped,
    /// `gMODE`
    StatusMode,
    /// `gGTO`
    StatusGoTo,
    /// `gSTA`, two bits.
    StatusActivation,
    /// `gOBJ`, two bits.
    StatusObject,
    /// Undocumented high byte of the status word.
    StatusReserved,
    StatusFaults,
    StatusFaultReserved,
    StatusPosition,
    Faults,
    FaultReserved,
    CurrentPosition,
    SpeedEcho,
    ForceEcho,
    Voltage,
    Temperature,
    SoftwareVersion,
}

impl Field {
    /// Bit layout of the field.
    pub const fn layout(self) -> BitField {
        use Register as R;
        match self {
            Field::ControlEnable => BitField::new(R::Control, 0, 0x0001, 0),
            Field::ControlMode => BitField::new(R::Control, 0, 0x0002, 1),
            Field::ControlGoTo => BitField::new(R::Control, 0, 0x0008, 3),
            Field::ControlAutoRelease => BitField::new(R::Control, 0, 0x0010, 4),
            Field::ControlReleaseDirection => BitField::new(R::Control, 0, 0x0020, 5),
            Field::TargetPosition => BitField::new(R::Position, 0, 0xFF00, 8),
            Field::TargetSpeed => BitField::new(R::SpeedForce, 0, 0x00FF, 0),
            Field::TargetForce => BitField::new(R::SpeedForce, 0, 0xFF00, 8),
            Field::StatusEnabled => BitField::new(R::Status, 0, 0x0001, 0),
            Field::StatusDropped => BitField::new(R::Status, 0, 0x0002, 1),
            Field::StatusMode => BitField::new(R::Status, 0, 0x0004, 2),
            Field::StatusGoTo => BitField::new(R::Status, 0, 0x0008, 3),
            Field::StatusActivation => BitField::new(R::Status, 0, 0x0030, 4),
            Field::StatusObject => BitField::new(R::Status, 0, 0x00C0, 6),
            Field::StatusReserved => BitField::new(R::Status, 0, 0xFF00, 8),
            Field::StatusFaults => BitField::new(R::Status, 1, 0x007F, 0),
            Field::StatusFaultReserved => BitField::new(R::Status, 1, 0x0080, 7),
            Field::StatusPosition => BitField::new(R::Status, 1, 0xFF00, 8),
            Field::Faults => BitField::new(R::FaultPosition, 0, 0x007F, 0),
            Field::FaultReserved => BitField::new(R::FaultPosition, 0, 0x0080, 7),
            Field::CurrentPosition => BitField::new(R::FaultPosition, 0, 0xFF00, 8),
            Field::SpeedEcho => BitField::new(R::SpeedForceStatus, 0, 0x00FF, 0),
            Field::ForceEcho => BitField::new(R::SpeedForceStatus, 0, 0xFF00, 8),
            Field::Voltage => BitField::new(R::VoltageTemperature, 0, 0x00FF, 0),
            Field::Temperature => BitField::new(R::VoltageTemperature, 0, 0xFF00, 8),
            Field::SoftwareVersion => BitField::new(R::SoftwareVersion, 0, 0xFFFF, 0),
        }
    }
}

/// Where a register block lives on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterBlock {
    pub register: Register,
    pub address: u16,
    pub count: u16,
    #[serde(default)]
    pub access: Access,
}

impl RegisterBlock {
    /// Block of the codec's expected size.
    pub const fn new(register: Register, address: u16, access: Access) -> Self {
        Self {
            register,
            address,
            count: register.word_count(),
            access,
        }
    }

    fn end(&self) -> u32 {
        self.address as u32 + self.count as u32
    }
}

/// Resolved location of a [`Field`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldLocation {
    /// Start address of the field's register block.
    pub address: u16,
    pub word_offset: u16,
    pub mask: u16,
    pub shift: u32,
}

/// Validated address table, one block per [`Register`].
///
/// Built once and never changed afterwards; every lookup is infallible
/// because [`RegisterMap::new`] refuses incomplete or inconsistent tables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<RegisterBlock>", into = "Vec<RegisterBlock>")]
pub struct RegisterMap {
    blocks: [RegisterBlock; 8],
}

impl RegisterMap {
    /// Control block address from the device manual.
    pub const HOMWING_CONTROL: u16 = 0x03E8;
    /// First status block address.
    ///
    /// Unverified default: the device notes only document the control
    /// block. Override the table through
    /// [`GripperConfig::registers`](crate::GripperConfig::registers) once the
    /// read-back addresses are confirmed for your firmware.
    pub const HOMWING_STATUS: u16 = 0x07D0;

    const HOMWING: [RegisterBlock; 8] = [
        RegisterBlock::new(Register::Control, Self::HOMWING_CONTROL, Access::Holding),
        RegisterBlock::new(Register::Position, Self::HOMWING_CONTROL + 1, Access::Holding),
        RegisterBlock::new(Register::SpeedForce, Self::HOMWING_CONTROL + 2, Access::Holding),
        RegisterBlock::new(Register::Status, Self::HOMWING_STATUS, Access::Input),
        RegisterBlock::new(Register::FaultPosition, Self::HOMWING_STATUS + 1, Access::Input),
        RegisterBlock::new(Register::SpeedForceStatus, Self::HOMWING_STATUS + 2, Access::Input),
        RegisterBlock::new(Register::VoltageTemperature, Self::HOMWING_STATUS + 3, Access::Input),
        RegisterBlock::new(Register::SoftwareVersion, Self::HOMWING_STATUS + 4, Access::Input),
    ];

    /// Default table of the Homwing parallel gripper.
    pub fn homwing() -> Self {
        Self {
            blocks: Self::HOMWING,
        }
    }

    /// Build a table from its blocks, checking it is complete and consistent.
    pub fn new(blocks: impl IntoIterator<Item = RegisterBlock>) -> Result<Self, ConfigError> {
        let mut slots: [Option<RegisterBlock>; 8] = [None; 8];

        for block in blocks {
            let register = block.register;
            if slots[register.index()].is_some() {
                return Err(ConfigError::DuplicateRegister(register));
            }
            if block.count != register.word_count() {
                return Err(ConfigError::WordCount {
                    register,
                    expected: register.word_count(),
                    actual: block.count,
                });
            }
            if block.end() > u16::MAX as u32 + 1 {
                return Err(ConfigError::AddressOverflow(register));
            }
            if register.is_writable() && block.access == Access::Input {
                return Err(ConfigError::ReadOnlyAccess(register));
            }
            slots[register.index()] = Some(block);
        }

        let mut table = Self::HOMWING;
        for register in Register::ALL {
            table[register.index()] =
                slots[register.index()].ok_or(ConfigError::MissingRegister(register))?;
        }

        let writable: Vec<&RegisterBlock> =
            table.iter().filter(|b| b.register.is_writable()).collect();
        for (i, a) in writable.iter().enumerate() {
            for b in &writable[i + 1..] {
                if (a.address as u32) < b.end() && (b.address as u32) < a.end() {
                    return Err(ConfigError::Overlap(a.register, b.register));
                }
            }
        }

        // A status read covers the fault/position word as its second word.
        let status = table[Register::Status.index()];
        let fault = table[Register::FaultPosition.index()];
        if status.address as u32 + 1 != fault.address as u32 || status.access != fault.access {
            return Err(ConfigError::StatusLayout {
                status: status.address,
                fault_position: fault.address,
            });
        }

        Ok(Self { blocks: table })
    }

    /// Block of a register.
    pub fn block(&self, register: Register) -> &RegisterBlock {
        &self.blocks[register.index()]
    }

    /// Resolve a field to its bus location.
    pub fn address_of(&self, field: Field) -> FieldLocation {
        let layout = field.layout();
        FieldLocation {
            address: self.block(layout.register).address,
            word_offset: layout.word_offset,
            mask: layout.mask,
            shift: layout.shift,
        }
    }

    /// Blocks in table order.
    pub fn blocks(&self) -> &[RegisterBlock] {
        &self.blocks
    }
}

impl Default for RegisterMap {
    fn default() -> Self {
        Self::homwing()
    }
}

impl TryFrom<Vec<RegisterBlock>> for RegisterMap {
    type Error = ConfigError;

    fn try_from(value: Vec<RegisterBlock>) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<RegisterMap> for Vec<RegisterBlock> {
    fn from(value: RegisterMap) -> Self {
        value.blocks.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn homwing_blocks() -> Vec<RegisterBlock> {
        RegisterMap::homwing().blocks().to_vec()
    }

    #[test]
    fn homwing_table_passes_validation() {
        let map = RegisterMap::new(homwing_blocks()).unwrap();
        assert_eq!(map, RegisterMap::homwing());
        assert_eq!(map.block(Register::Control).address, 0x03E8);
        assert_eq!(map.block(Register::Status).count, 2);
    }

    #[test]
    fn every_field_resolves_inside_its_block() {
        let map = RegisterMap::homwing();
        for register in Register::ALL {
            assert_eq!(map.block(register).register, register);
        }
        let fields = [
            Field::ControlEnable,
            Field::TargetPosition,
            Field::StatusObject,
            Field::StatusPosition,
            Field::CurrentPosition,
            Field::Temperature,
            Field::SoftwareVersion,
        ];
        for field in fields {
            let layout = field.layout();
            let location = map.address_of(field);
            assert_eq!(location.address, map.block(layout.register).address);
            assert!(location.word_offset < map.block(layout.register).count);
        }
    }

    #[test]
    fn bit_field_insert_and_extract() {
        let force = Field::TargetForce.layout();
        let word = force.insert(0x0012, 0xAB);
        assert_eq!(word, 0xAB12);
        assert_eq!(force.extract(word), 0xAB);
        assert_eq!(force.max_value(), 0xFF);
        assert_eq!(Field::StatusActivation.layout().max_value(), 0b11);
    }

    #[test]
    fn missing_register_is_rejected() {
        let blocks: Vec<_> = homwing_blocks()
            .into_iter()
            .filter(|b| b.register != Register::SoftwareVersion)
            .collect();
        assert!(matches!(
            RegisterMap::new(blocks),
            Err(ConfigError::MissingRegister(Register::SoftwareVersion))
        ));
    }

    #[test]
    fn duplicate_register_is_rejected() {
        let mut blocks = homwing_blocks();
        blocks.push(RegisterBlock::new(Register::Control, 0x0100, Access::Holding));
        assert!(matches!(
            RegisterMap::new(blocks),
            Err(ConfigError::DuplicateRegister(Register::Control))
        ));
    }

    #[test]
    fn wrong_word_count_is_rejected() {
        let mut blocks = homwing_blocks();
        blocks[3].count = 1;
        assert!(matches!(
            RegisterMap::new(blocks),
            Err(ConfigError::WordCount {
                register: Register::Status,
                expected: 2,
                actual: 1
            })
        ));
    }

    #[test]
    fn overlapping_command_blocks_are_rejected() {
        let mut blocks = homwing_blocks();
        blocks[1].address = blocks[0].address;
        assert!(matches!(
            RegisterMap::new(blocks),
            Err(ConfigError::Overlap(Register::Control, Register::Position))
        ));
    }

    #[test]
    fn command_block_on_input_table_is_rejected() {
        let mut blocks = homwing_blocks();
        blocks[2].access = Access::Input;
        assert!(matches!(
            RegisterMap::new(blocks),
            Err(ConfigError::ReadOnlyAccess(Register::SpeedForce))
        ));
    }

    #[test]
    fn status_must_precede_fault_position() {
        let mut blocks = homwing_blocks();
        blocks[4].address += 1;
        assert!(matches!(
            RegisterMap::new(blocks),
            Err(ConfigError::StatusLayout { .. })
        ));
    }

    #[test]
    fn address_past_end_of_bus_is_rejected() {
        let mut blocks = homwing_blocks();
        blocks[3].address = 0xFFFF;
        assert!(matches!(
            RegisterMap::new(blocks),
            Err(ConfigError::AddressOverflow(Register::Status))
        ));
    }

    #[test]
    fn map_deserializes_through_validation() {
        let json = serde_json::to_string(&RegisterMap::homwing()).unwrap();
        let map: RegisterMap = serde_json::from_str(&json).unwrap();
        assert_eq!(map, RegisterMap::homwing());

        let truncated = r#"[{"register": "control", "address": 256, "count": 1}]"#;
        assert!(serde_json::from_str::<RegisterMap>(truncated).is_err());
    }
}
