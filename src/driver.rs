//! Gripper driver and its polling waits.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::clock::{Clock, TokioClock};
use crate::codec::{
    self, Command, FaultPosition, GripperStatus, SoftwareVersion, SpeedForce, VoltageTemperature,
};
use crate::config::GripperConfig;
use crate::error::{GripperError, TransportError};
use crate::registers::{Register, RegisterMap};
use crate::transport::{ModbusTransport, Transport};

/// Driver-side view of the gripper's lifecycle.
///
/// Only commands and waits move the state; plain reads never do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DriverState {
    /// Nothing written yet, or the control register was cleared.
    Uninitialized,
    /// Activation written, completion not yet observed.
    Activating,
    /// Activation observed by [`GripperDriver::wait_for_activation`].
    Activated,
    /// Parameters staged or last move completed.
    Idle,
    /// A move was started and has not been observed to finish.
    Moving,
    Stopped,
    /// A wait observed a fault bit.
    Faulted,
}

/// Data structure for driving the gripper over a [`Transport`].
///
/// One driver holds one session: every method takes `&mut self`, so at most
/// one transaction is in flight. Share a driver between tasks behind a lock
/// held for the whole command and wait sequence, e.g.
/// `tokio::sync::Mutex<GripperDriver<_>>`.
///
/// The waits only ever read, so dropping a wait future (for instance through
/// `tokio::time::timeout` or `select!`) never leaves a command half written.
pub struct GripperDriver<T, C = TokioClock> {
    transport: T,
    clock: C,
    registers: RegisterMap,
    state: DriverState,
}

impl GripperDriver<ModbusTransport> {
    /// Open the configured serial port.
    pub fn connect(config: &GripperConfig) -> Result<Self, GripperError> {
        config.validate()?;
        let transport = ModbusTransport::open(&config.serial, config.slave_id)?;
        Ok(Self::with_registers(transport, config.registers.clone()))
    }
}

impl<T: Transport> GripperDriver<T> {
    /// Driver over `transport` with the default register table.
    pub fn new(transport: T) -> Self {
        Self::with_registers(transport, RegisterMap::homwing())
    }

    pub fn with_registers(transport: T, registers: RegisterMap) -> Self {
        Self::with_clock(transport, registers, TokioClock)
    }
}

impl<T: Transport, C: Clock> GripperDriver<T, C> {
    pub fn with_clock(transport: T, registers: RegisterMap, clock: C) -> Self {
        Self {
            transport,
            clock,
            registers,
            state: DriverState::Uninitialized,
        }
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    pub fn register_map(&self) -> &RegisterMap {
        &self.registers
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    fn transition(&mut self, next: DriverState) {
        if self.state != next {
            info!(from = ?self.state, to = ?next, "gripper state changed");
            self.state = next;
        }
    }

    /// Validate, encode and write a command. Does not change the driver state.
    pub async fn send(&mut self, command: &Command) -> Result<(), GripperError> {
        let encoded = codec::encode_command(command)?;
        let address = self.registers.block(encoded.register).address;
        debug!(?command, address, words = ?encoded.words, "write");
        self.transport.write_registers(address, &encoded.words).await?;
        Ok(())
    }

    async fn read_words<const N: usize>(
        &mut self,
        register: Register,
    ) -> Result<[u16; N], GripperError> {
        let block = *self.registers.block(register);
        let words = self
            .transport
            .read_registers(block.access, block.address, block.count)
            .await?;
        debug!(%register, address = block.address, ?words, "read");

        words
            .get(..N)
            .and_then(|w| <[u16; N]>::try_from(w).ok())
            .ok_or_else(|| {
                TransportError::ShortResponse {
                    address: block.address,
                    expected: block.count,
                    actual: words.len(),
                }
                .into()
            })
    }

    /// Set the activation bit `rACT`. Returns without waiting for completion.
    ///
    /// ## Warning
    /// The gripper opens and closes once to calibrate. Make sure nothing
    /// obstructs the fingers.
    pub async fn activate(&mut self) -> Result<&mut Self, GripperError> {
        self.send(&Command::Activate).await?;
        self.transition(DriverState::Activating);
        Ok(self)
    }

    /// Poll until activation completes, sleeping `poll_interval` between reads.
    ///
    /// Fails with [`GripperError::Timeout`] once `timeout` has elapsed, leaving
    /// the state at `Activating`, or with [`GripperError::FaultDetected`] as
    /// soon as a read shows a fault. A `timeout` past the end of the clock's
    /// range, such as [`Duration::MAX`], waits without a deadline.
    pub async fn wait_for_activation(
        &mut self,
        poll_interval: Duration,
        timeout: Duration,
    ) -> Result<&mut Self, GripperError> {
        self.poll_until("wait_for_activation", poll_interval, timeout, |s| s.activated)
            .await?;
        self.transition(DriverState::Activated);
        Ok(self)
    }

    /// Stage the target position. Motion starts with [`Self::execute_move`].
    ///
    /// `0` is fully open and `255` fully closed, with a quasi-linear
    /// relationship in between whatever the fingertips.
    pub async fn move_to_position(&mut self, position: i32) -> Result<&mut Self, GripperError> {
        self.send(&Command::MoveToPosition { position }).await?;
        self.staged();
        Ok(self)
    }

    /// Stage speed and force. Setting them does not start a motion.
    ///
    /// The force fixes the maximum motor current; when it is exceeded the
    /// fingers stop and report an object detection.
    pub async fn set_speed_force(
        &mut self,
        speed: i32,
        force: i32,
    ) -> Result<&mut Self, GripperError> {
        self.send(&Command::SetSpeedForce { speed, force }).await?;
        self.staged();
        Ok(self)
    }

    fn staged(&mut self) {
        if self.state == DriverState::Activated {
            self.transition(DriverState::Idle);
        }
    }

    /// Set `rGTO`, moving to the staged target with the staged parameters.
    pub async fn execute_move(&mut self) -> Result<&mut Self, GripperError> {
        self.send(&Command::ExecuteMove).await?;
        self.transition(DriverState::Moving);
        Ok(self)
    }

    /// Stage speed, force and position, then start the move.
    ///
    /// All three values are checked before the first write.
    pub async fn execute_control_movement(
        &mut self,
        speed: i32,
        force: i32,
        position: i32,
    ) -> Result<&mut Self, GripperError> {
        codec::encode_command(&Command::SetSpeedForce { speed, force })?;
        codec::encode_command(&Command::MoveToPosition { position })?;
        self.set_speed_force(speed, force).await?;
        self.move_to_position(position).await?;
        self.execute_move().await
    }

    /// Poll until the fingers stop, returning the final status.
    ///
    /// A fault wins over completion: a read showing both a finished move and
    /// a fault fails with [`GripperError::FaultDetected`].
    pub async fn wait_for_move(
        &mut self,
        poll_interval: Duration,
        timeout: Duration,
    ) -> Result<GripperStatus, GripperError> {
        let status = self
            .poll_until("wait_for_move", poll_interval, timeout, |s| !s.moving)
            .await?;
        self.transition(DriverState::Idle);
        Ok(status)
    }

    /// Halt the fingers. Legal from any state.
    pub async fn stop(&mut self) -> Result<&mut Self, GripperError> {
        self.send(&Command::Stop).await?;
        self.transition(DriverState::Stopped);
        Ok(self)
    }

    /// Clear the control register, resetting the gripper and its faults.
    pub async fn reset(&mut self) -> Result<&mut Self, GripperError> {
        self.send(&Command::Reset).await?;
        self.transition(DriverState::Uninitialized);
        Ok(self)
    }

    /// ### Automatic release feature.
    ///
    /// Slowly drives the fingers to their mechanical limit, opening when
    /// `open` is set. The gripper reports a fault once done; it must be reset
    /// and re-activated before any other motion.
    pub async fn auto_release(&mut self, open: bool) -> Result<&mut Self, GripperError> {
        self.send(&Command::AutoRelease { open }).await?;
        self.transition(DriverState::Stopped);
        Ok(self)
    }

    async fn poll_until(
        &mut self,
        operation: &'static str,
        poll_interval: Duration,
        timeout: Duration,
        done: impl Fn(&GripperStatus) -> bool,
    ) -> Result<GripperStatus, GripperError> {
        // A timeout too large to represent never expires.
        let deadline = self.clock.now().checked_add(timeout);
        loop {
            let status = self.read_gripper_status().await?;
            if status.faults.any() {
                warn!(operation, faults = %status.faults, "gripper fault");
                self.transition(DriverState::Faulted);
                return Err(GripperError::FaultDetected {
                    operation,
                    faults: status.faults,
                });
            }
            if done(&status) {
                return Ok(status);
            }

            let now = self.clock.now();
            let nap = match deadline {
                Some(deadline) if now >= deadline => {
                    warn!(operation, ?timeout, "gave up waiting");
                    return Err(GripperError::Timeout {
                        operation,
                        timeout,
                        last_status: Box::new(status),
                    });
                }
                Some(deadline) => poll_interval.min(deadline - now),
                None => poll_interval,
            };
            self.clock.sleep(nap).await;
        }
    }

    /// Read the status block: activation, motion, object detection, position
    /// and the fault bits of the same instant.
    pub async fn read_gripper_status(&mut self) -> Result<GripperStatus, GripperError> {
        let words = self.read_words::<2>(Register::Status).await?;
        let status = codec::decode_status(words);
        for anomaly in &status.anomalies {
            warn!(?anomaly, "unexpected status value");
        }
        Ok(status)
    }

    /// Read the fault bits and the actual finger position.
    pub async fn read_fault_position(&mut self) -> Result<FaultPosition, GripperError> {
        let [word] = self.read_words::<1>(Register::FaultPosition).await?;
        let fault_position = codec::decode_fault_position(word);
        for anomaly in &fault_position.anomalies {
            warn!(?anomaly, "unexpected fault value");
        }
        Ok(fault_position)
    }

    /// Read back the speed and force currently configured on the gripper.
    pub async fn read_speed_force(&mut self) -> Result<SpeedForce, GripperError> {
        let [word] = self.read_words::<1>(Register::SpeedForceStatus).await?;
        Ok(codec::decode_speed_force(word))
    }

    /// Read the supply voltage and internal temperature.
    pub async fn read_voltage_temperature(&mut self) -> Result<VoltageTemperature, GripperError> {
        let [word] = self.read_words::<1>(Register::VoltageTemperature).await?;
        Ok(codec::decode_voltage_temperature(word))
    }

    /// Read the firmware version word.
    pub async fn read_software_version(&mut self) -> Result<SoftwareVersion, GripperError> {
        let [word] = self.read_words::<1>(Register::SoftwareVersion).await?;
        Ok(codec::decode_software_version(word))
    }
}

impl<T: std::fmt::Debug, C> std::fmt::Debug for GripperDriver<T, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GripperDriver")
            .field("transport", &self.transport)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
