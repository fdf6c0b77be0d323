//! Error types of the driver, one enum per concern.

use std::time::Duration;

use thiserror::Error;

use crate::codec::{GripperFaultStatus, GripperStatus};
use crate::registers::Register;

/// A caller supplied a value outside its domain. Raised before any bus access.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} = {value} is outside {min}..={max}")]
    OutOfRange {
        field: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },
}

impl ValidationError {
    pub(crate) fn check_u8(field: &'static str, value: i32) -> Result<u8, Self> {
        u8::try_from(value).map_err(|_| ValidationError::OutOfRange {
            field,
            value: value.into(),
            min: u8::MIN.into(),
            max: u8::MAX.into(),
        })
    }
}

/// Failure of a single bus transaction. Never retried by the driver.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("std io error, serial comm error")]
    IOError(#[from] std::io::Error),
    #[error("Modbus protocol or transport errors.")]
    ModbusError(#[from] tokio_modbus::Error),
    #[error("A server (slave) exception: {0}")]
    ModbusException(#[from] tokio_modbus::Exception),
    #[error("expected {expected} registers from 0x{address:04X}, got {actual}")]
    ShortResponse {
        address: u16,
        expected: u16,
        actual: usize,
    },
}

/// Inconsistent register table or configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("register map has no entry for {0}")]
    MissingRegister(Register),
    #[error("register map lists {0} more than once")]
    DuplicateRegister(Register),
    #[error("{register} spans {actual} words, the codec expects {expected}")]
    WordCount {
        register: Register,
        expected: u16,
        actual: u16,
    },
    #[error("{0} runs past the end of the register space")]
    AddressOverflow(Register),
    #[error("{0} is written by commands and cannot live in the input table")]
    ReadOnlyAccess(Register),
    #[error("{0} and {1} overlap")]
    Overlap(Register, Register),
    #[error(
        "status block at 0x{status:04X} must be directly followed by fault/position, \
         found 0x{fault_position:04X}"
    )]
    StatusLayout { status: u16, fault_position: u16 },
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("cannot read configuration file")]
    Io(#[from] std::io::Error),
    #[error("malformed configuration")]
    Json(#[from] serde_json::Error),
}

/// Error returned by [`GripperDriver`](crate::GripperDriver) operations.
#[derive(Debug, Error)]
pub enum GripperError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("{operation} did not complete within {timeout:?}")]
    Timeout {
        operation: &'static str,
        timeout: Duration,
        /// Last status observed before giving up.
        last_status: Box<GripperStatus>,
    },
    #[error("gripper fault during {operation}: {faults}")]
    FaultDetected {
        operation: &'static str,
        faults: GripperFaultStatus,
    },
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl From<tokio_modbus::Error> for GripperError {
    fn from(value: tokio_modbus::Error) -> Self {
        GripperError::Transport(value.into())
    }
}

impl From<tokio_modbus::Exception> for GripperError {
    fn from(value: tokio_modbus::Exception) -> Self {
        GripperError::Transport(value.into())
    }
}

impl From<std::io::Error> for GripperError {
    fn from(value: std::io::Error) -> Self {
        GripperError::Transport(value.into())
    }
}
