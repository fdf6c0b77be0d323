#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use homwing_rs::*;

pub const POLL: Duration = Duration::from_millis(100);

/// In-memory transport replaying scripted register contents.
///
/// Each address holds a queue of responses; the last one repeats forever.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    slave_id: u8,
    reads: HashMap<u16, VecDeque<Vec<u16>>>,
    pub read_log: Vec<(Access, u16, u16)>,
    pub writes: Vec<(u16, Vec<u16>)>,
    pub fail_with: Option<std::io::ErrorKind>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self {
            slave_id: ModbusTransport::DEFAULT_SLAVE_ID,
            ..Default::default()
        }
    }

    pub fn respond(mut self, address: u16, responses: impl IntoIterator<Item = Vec<u16>>) -> Self {
        self.reads
            .entry(address)
            .or_default()
            .extend(responses);
        self
    }

    pub fn status_reads(&self) -> usize {
        self.read_log
            .iter()
            .filter(|(_, address, _)| *address == RegisterMap::HOMWING_STATUS)
            .count()
    }
}

impl Transport for ScriptedTransport {
    async fn read_registers(
        &mut self,
        access: Access,
        address: u16,
        count: u16,
    ) -> Result<Vec<u16>, TransportError> {
        self.read_log.push((access, address, count));
        if let Some(kind) = self.fail_with {
            return Err(std::io::Error::new(kind, "scripted failure").into());
        }
        let queue = self
            .reads
            .get_mut(&address)
            .ok_or(tokio_modbus::Exception::IllegalDataAddress)?;
        let words = if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        };
        Ok(words.ok_or(tokio_modbus::Exception::IllegalDataAddress)?)
    }

    async fn write_registers(&mut self, address: u16, words: &[u16]) -> Result<(), TransportError> {
        if let Some(kind) = self.fail_with {
            return Err(std::io::Error::new(kind, "scripted failure").into());
        }
        self.writes.push((address, words.to_vec()));
        Ok(())
    }

    fn slave_id(&self) -> u8 {
        self.slave_id
    }

    fn set_slave_id(&mut self, slave_id: u8) -> Result<(), ValidationError> {
        if slave_id > MAX_SLAVE_ID {
            return Err(ValidationError::OutOfRange {
                field: "slave_id",
                value: slave_id.into(),
                min: 0,
                max: MAX_SLAVE_ID.into(),
            });
        }
        self.slave_id = slave_id;
        Ok(())
    }
}

/// Status block words: status byte, then fault bits and position.
pub fn status(bits: u16, faults: u16, position: u8) -> Vec<u16> {
    vec![bits, (u16::from(position) << 8) | faults]
}

pub const ACTIVATING: u16 = 0x0011;
pub const ACTIVATED: u16 = 0x0031;
/// Activated, `gGTO` set, fingers in motion.
pub const MOVING: u16 = 0x0039;
/// Activated, `gGTO` set, requested position reached.
pub const ARRIVED: u16 = 0x00F9;
/// Activated, `gGTO` set, stopped on an object while closing.
pub const GRIPPED: u16 = 0x00B9;

pub const OVERCURRENT: u16 = 1 << 2;
pub const OVERTEMPERATURE: u16 = 1 << 5;

pub fn driver(
    transport: ScriptedTransport,
) -> (GripperDriver<ScriptedTransport, ManualClock>, ManualClock) {
    let clock = ManualClock::new();
    let driver = GripperDriver::with_clock(transport, RegisterMap::homwing(), clock.clone());
    (driver, clock)
}
