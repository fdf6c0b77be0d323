//! # Homwing-rs
//!
//! `homwing-rs` is a library for interfacing with Homwing electric parallel
//! grippers over Modbus RTU.
//!
//! The crate is split the way the protocol is:
//! - [`registers`]: the register map, field layouts and the validated address table.
//! - [`codec`]: pure conversion between commands/readings and register words.
//! - [`transport`]: the [`Transport`] seam and its `tokio-modbus` implementation.
//! - [`driver`]: [`GripperDriver`], the commands and the polling waits.
//!
//! ## Example
//! ```no_run
//! use std::time::Duration;
//! use homwing_rs::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), GripperError> {
//!     let config = GripperConfig::new("/dev/ttyUSB0");
//!     let mut gripper = GripperDriver::connect(&config)?;
//!     let poll = Duration::from_millis(100);
//!
//!     // reset, then activate; the gripper opens and closes once.
//!     gripper
//!         .reset()
//!         .await?
//!         .activate()
//!         .await?
//!         .wait_for_activation(poll, Duration::from_secs(5))
//!         .await?;
//!
//!     // stage parameters, then move.
//!     gripper
//!         .set_speed_force(255, 20)
//!         .await?
//!         .move_to_position(200)
//!         .await?
//!         .execute_move()
//!         .await?;
//!     let status = gripper.wait_for_move(poll, Duration::from_secs(5)).await?;
//!     println!("object: {:?}, position: {}", status.object, status.position);
//!
//!     println!("{:?}", gripper.read_voltage_temperature().await?);
//!     Ok(())
//! }
//! ```

pub mod clock;
pub mod codec;
pub mod config;
pub mod driver;
pub mod error;
pub mod registers;
pub mod transport;

pub use clock::{Clock, ManualClock, TokioClock};
pub use codec::{
    decode_fault_position, decode_faults, decode_software_version, decode_speed_force,
    decode_status, decode_voltage_temperature, encode_command, ActivationStatus, Command,
    ControlWord, DecodeAnomaly, EncodedCommand, FaultPosition, GripperFaultStatus, GripperStatus,
    ObjectDetection, SoftwareVersion, SpeedForce, VoltageTemperature,
};
pub use config::{GripperConfig, SerialConfig};
pub use driver::{DriverState, GripperDriver};
pub use error::{ConfigError, GripperError, TransportError, ValidationError};
pub use registers::{Access, BitField, Field, FieldLocation, Register, RegisterBlock, RegisterMap};
pub use transport::{ModbusTransport, Transport, MAX_SLAVE_ID};
