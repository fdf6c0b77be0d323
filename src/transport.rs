//! Register access on the bus.

use std::future::Future;

use tokio_modbus::prelude::*;
use tokio_serial::SerialPortBuilderExt;

use crate::config::SerialConfig;
use crate::error::{TransportError, ValidationError};
use crate::registers::Access;

/// Register reads and writes addressed to one slave.
///
/// Implementations perform exactly one bus transaction per call and never
/// retry.
pub trait Transport {
    fn read_registers(
        &mut self,
        access: Access,
        address: u16,
        count: u16,
    ) -> impl Future<Output = Result<Vec<u16>, TransportError>> + Send;

    fn write_registers(
        &mut self,
        address: u16,
        words: &[u16],
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    fn slave_id(&self) -> u8;

    /// Address subsequent transactions to another slave.
    fn set_slave_id(&mut self, slave_id: u8) -> Result<(), ValidationError>;
}

/// Highest slave address allowed on a Modbus RTU bus.
pub const MAX_SLAVE_ID: u8 = 247;

pub(crate) fn check_slave_id(slave_id: u8) -> Result<u8, ValidationError> {
    if slave_id > MAX_SLAVE_ID {
        return Err(ValidationError::OutOfRange {
            field: "slave_id",
            value: slave_id.into(),
            min: 0,
            max: MAX_SLAVE_ID.into(),
        });
    }
    Ok(slave_id)
}

/// Unwrap a `tokio-modbus` reply, keeping both the transport error and the
/// slave's exception.
fn settle<T, E>(reply: Result<Result<T, E>, tokio_modbus::Error>) -> Result<T, TransportError>
where
    TransportError: From<E>,
{
    Ok(reply??)
}

/// [`Transport`] over a `tokio-modbus` client context.
pub struct ModbusTransport {
    ctx: client::Context,
    slave_id: u8,
}

impl ModbusTransport {
    /// The default Modbus slave ID of the gripper.
    pub const DEFAULT_SLAVE_ID: u8 = 9;

    /// Wrap an existing context, addressing `slave_id`.
    pub fn new(mut ctx: client::Context, slave_id: u8) -> Result<Self, ValidationError> {
        let slave_id = check_slave_id(slave_id)?;
        ctx.set_slave(Slave(slave_id));
        Ok(Self { ctx, slave_id })
    }

    /// Open the serial port, 8N1, and attach to `slave_id`.
    pub fn open(serial: &SerialConfig, slave_id: u8) -> Result<Self, crate::GripperError> {
        let slave_id = check_slave_id(slave_id)?;
        let port = tokio_serial::new(serial.path.as_str(), serial.baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .stop_bits(tokio_serial::StopBits::One)
            .parity(tokio_serial::Parity::None)
            .timeout(serial.timeout())
            .open_native_async()
            .map_err(std::io::Error::from)?;

        let ctx = rtu::attach_slave(port, Slave(slave_id));
        tracing::debug!(
            path = %serial.path,
            baud = serial.baud_rate,
            slave_id,
            "serial port opened"
        );

        Ok(Self { ctx, slave_id })
    }

    /// Close the connection.
    pub async fn disconnect(mut self) -> Result<(), TransportError> {
        settle(self.ctx.disconnect().await)
    }
}

impl Transport for ModbusTransport {
    async fn read_registers(
        &mut self,
        access: Access,
        address: u16,
        count: u16,
    ) -> Result<Vec<u16>, TransportError> {
        match access {
            Access::Holding => settle(self.ctx.read_holding_registers(address, count).await),
            Access::Input => settle(self.ctx.read_input_registers(address, count).await),
        }
    }

    async fn write_registers(&mut self, address: u16, words: &[u16]) -> Result<(), TransportError> {
        settle(self.ctx.write_multiple_registers(address, words).await)
    }

    fn slave_id(&self) -> u8 {
        self.slave_id
    }

    fn set_slave_id(&mut self, slave_id: u8) -> Result<(), ValidationError> {
        self.slave_id = check_slave_id(slave_id)?;
        self.ctx.set_slave(Slave(self.slave_id));
        Ok(())
    }
}

impl std::fmt::Debug for ModbusTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModbusTransport")
            .field("slave_id", &self.slave_id)
            .finish_non_exhaustive()
    }
}
