//! IO driver trait and error types.
//!
//! This module defines:
//! - `IoDriver` trait - the capability contract every board driver implements
//! - `IoError` enum - error taxonomy of the contract
//! - `DriverFactory` type alias - factory function type
//! - `I2cWrite` / `I2cRead` - resolved I2C request shapes

use crate::hal::config::{
    BoardConfig, I2cConfig, OneWireDevice, PingSettings, PulseInSettings, SerialConfig,
    ServoConfig, StepperConfig, StepperStep,
};
use crate::hal::events::EventBus;
use crate::hal::ident::{PinId, PortId};
use crate::hal::types::{
    AnalogHandler, BytesHandler, CompletionHandler, DevicesHandler, DigitalHandler,
    DurationHandler, Mode, Pin, SubscriptionId, Value,
};
use std::time::Duration;
use thiserror::Error;

/// Error taxonomy of the IO contract.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IoError {
    /// Operation not implemented by this driver
    #[error("Operation '{operation}' is not supported by driver '{driver}'")]
    UnsupportedOperation {
        /// Runtime-facing operation name.
        operation: String,
        /// Driver name.
        driver: String,
    },

    /// Mode not in the pin's capability set
    #[error("Pin {pin} does not support mode {mode}")]
    UnsupportedMode {
        /// Canonical pin index.
        pin: usize,
        /// Requested mode.
        mode: Mode,
    },

    /// Operation requires a different current mode
    #[error("Pin {pin} must be in mode {required}, currently {current}")]
    ModeMismatch {
        /// Canonical pin index.
        pin: usize,
        /// Mode the operation requires.
        required: Mode,
        /// Mode the pin is in.
        current: Mode,
    },

    /// Pin identifier does not normalize
    #[error("Unknown pin: {0}")]
    UnknownPin(String),

    /// Port or bus identifier does not normalize
    #[error("Unknown port: {0}")]
    UnknownPort(String),

    /// Argument list matches none of the operation's shapes
    #[error("Invalid arguments for '{operation}': {reason}")]
    InvalidArgumentShape {
        /// Runtime-facing operation name.
        operation: String,
        /// What did not match.
        reason: String,
    },

    /// Value outside the accepted range
    #[error("Invalid value: {0}")]
    InvalidValue(String),

    /// Underlying bus or hardware failure
    #[error("Transport error in '{driver}': {detail}")]
    Transport {
        /// Driver name.
        driver: String,
        /// Driver-specific detail.
        detail: String,
    },

    /// Driver has not been initialized
    #[error("Driver '{0}' is not ready")]
    NotReady(String),

    /// Board description error
    #[error("Configuration error: {0}")]
    Config(String),

    /// No driver registered under this name
    #[error("Driver not found: {0}")]
    DriverNotFound(String),
}

/// Factory function type for creating driver instances.
pub type DriverFactory = fn() -> Box<dyn IoDriver>;

// ─── Resolved I2C requests ──────────────────────────────────────────

/// I2C write, optionally prefixed by a register address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct I2cWrite {
    /// Device address.
    pub address: u16,
    /// Register prefix, `None` for a raw write.
    pub register: Option<u8>,
    /// Payload in transmission order.
    pub bytes: Vec<u8>,
}

impl I2cWrite {
    /// Raw write without register prefix.
    pub fn raw(address: u16, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            address,
            register: None,
            bytes: bytes.into(),
        }
    }

    /// Write prefixed by `register`.
    pub fn to_register(address: u16, register: u8, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            address,
            register: Some(register),
            bytes: bytes.into(),
        }
    }

    /// Bytes as they appear on the bus.
    pub fn frame(&self) -> Vec<u8> {
        let mut frame = Vec::with_capacity(self.bytes.len() + 1);
        frame.extend(self.register);
        frame.extend_from_slice(&self.bytes);
        frame
    }
}

/// I2C read, optionally from a register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct I2cRead {
    /// Device address.
    pub address: u16,
    /// Register to read from, `None` = device's current pointer.
    pub register: Option<u8>,
    /// Bytes per delivery.
    pub bytes_to_read: usize,
}

impl I2cRead {
    /// Read from the device's current register pointer.
    pub fn new(address: u16, bytes_to_read: usize) -> Self {
        Self {
            address,
            register: None,
            bytes_to_read,
        }
    }

    /// Read starting at `register`.
    pub fn from_register(address: u16, register: u8, bytes_to_read: usize) -> Self {
        Self {
            address,
            register: Some(register),
            bytes_to_read,
        }
    }
}

// ─── Driver trait ───────────────────────────────────────────────────

/// Capability contract for board drivers.
///
/// An automation runtime addresses every board through this trait. Drivers
/// own their pin table and peripheral state; callers hold identifiers only.
///
/// # Lifecycle
///
/// 1. `init()` - build tables from the board description, become ready
/// 2. `cycle()` - called every poll interval; delivers read results
/// 3. `shutdown()` - tear down subscriptions and release hardware
///
/// # Synchronous vs asynchronous
///
/// Configuration, mode and write calls complete (or fail) before returning
/// and never wait for I/O. The `*_read` family registers interest and
/// returns a `SubscriptionId`; results arrive through the handler from
/// `cycle()`. Errors detected after registration go to `events()`.
///
/// # Defaults
///
/// Compatibility aliases forward to their canonical method. Operations
/// without a meaningful base behavior (reset, reporting toggles, pulse-in,
/// one-wire, stepper, subscription cancel) fail with
/// `IoError::UnsupportedOperation` unless the driver overrides them.
pub trait IoDriver: Send {
    // ── Capability queries ──────────

    /// Driver identifier (e.g., "simulation").
    fn name(&self) -> &str;

    /// Driver semantic version.
    fn version(&self) -> &'static str;

    /// Pin table; index = pin number. Empty before `init()`.
    fn pins(&self) -> &[Pin];

    /// Pin indices that support analog mode.
    fn analog_pins(&self) -> &[usize];

    /// On-board LED.
    fn default_led(&self) -> PinId;

    /// Readiness / informational / error event channel.
    fn events(&self) -> &EventBus;

    /// Whether initialization completed.
    fn is_ready(&self) -> bool {
        self.events().is_ready()
    }

    // ── Lifecycle ───────────────────

    /// Initialize from a board description. Emits `Ready` on success.
    fn init(&mut self, config: &BoardConfig) -> Result<(), IoError>;

    /// Run one polling cycle; `dt` is the time since the previous cycle.
    ///
    /// Read handlers run inside this call while the caller holds `&mut self`,
    /// so a handler must not call back into the same driver. Runtimes hand
    /// handlers a deferred command queue instead (`boardio_hal::CommandQueue`).
    fn cycle(&mut self, dt: Duration);

    /// Tear down all subscriptions and release resources.
    fn shutdown(&mut self) -> Result<(), IoError>;

    // ── Normalization ───────────────

    /// Resolve a pin identifier to its canonical index.
    fn normalize(&self, pin: &PinId) -> Result<usize, IoError>;

    /// Resolve a serial port identifier to its canonical index.
    fn normalize_port(&self, port: &PortId) -> Result<usize, IoError>;

    // ── Pins ────────────────────────

    /// Put `pin` into `mode`. Idempotent.
    fn pin_mode(&mut self, pin: &PinId, mode: Mode) -> Result<(), IoError>;

    /// Drive an OUTPUT pin.
    fn digital_write(&mut self, pin: &PinId, value: Value) -> Result<(), IoError>;

    /// Set the duty cycle of a PWM pin.
    fn pwm_write(&mut self, pin: &PinId, value: u32) -> Result<(), IoError>;

    /// Alias of `pwm_write`.
    fn analog_write(&mut self, pin: &PinId, value: u32) -> Result<(), IoError> {
        self.pwm_write(pin, value)
    }

    /// Move a SERVO pin to `value` degrees.
    fn servo_write(&mut self, pin: &PinId, value: u32) -> Result<(), IoError>;

    /// Set the pulse bounds of a servo. Replaces any previous bounds.
    fn servo_config(&mut self, config: ServoConfig) -> Result<(), IoError>;

    /// Continuous analog reads of an ANALOG pin.
    fn analog_read(&mut self, pin: &PinId, handler: AnalogHandler)
    -> Result<SubscriptionId, IoError>;

    /// Continuous digital reads of an INPUT pin.
    fn digital_read(
        &mut self,
        pin: &PinId,
        handler: DigitalHandler,
    ) -> Result<SubscriptionId, IoError>;

    /// One-shot time-of-flight measurement. The handler is never called if
    /// the echo times out.
    fn ping_read(
        &mut self,
        settings: PingSettings,
        handler: DurationHandler,
    ) -> Result<SubscriptionId, IoError>;

    // ── I2C ─────────────────────────

    /// Configure an I2C peripheral. Replaces any previous configuration.
    fn i2c_config(&mut self, config: I2cConfig) -> Result<(), IoError>;

    /// Queue a write. Writes to one device keep their order.
    fn i2c_write(&mut self, request: I2cWrite) -> Result<(), IoError>;

    /// Write a single byte to `register`.
    fn i2c_write_reg(&mut self, address: u16, register: u8, value: u8) -> Result<(), IoError>;

    /// Continuous read: the handler fires once per polling cycle.
    fn i2c_read(&mut self, request: I2cRead, handler: BytesHandler)
    -> Result<SubscriptionId, IoError>;

    /// One-shot read: the handler fires exactly once.
    fn i2c_read_once(
        &mut self,
        request: I2cRead,
        handler: BytesHandler,
    ) -> Result<SubscriptionId, IoError>;

    /// Raw write without register prefix.
    fn i2c_write_raw(&mut self, address: u16, bytes: &[u8]) -> Result<(), IoError> {
        self.i2c_write(I2cWrite::raw(address, bytes))
    }

    /// Write prefixed by `register`.
    fn i2c_write_to_register(
        &mut self,
        address: u16,
        register: u8,
        bytes: &[u8],
    ) -> Result<(), IoError> {
        self.i2c_write(I2cWrite::to_register(address, register, bytes))
    }

    /// Alias of `i2c_config`.
    fn send_i2c_config(&mut self, config: I2cConfig) -> Result<(), IoError> {
        self.i2c_config(config)
    }

    /// Alias of `i2c_write`.
    fn send_i2c_write_request(&mut self, request: I2cWrite) -> Result<(), IoError> {
        self.i2c_write(request)
    }

    /// Alias of `i2c_read_once`.
    fn send_i2c_read_request(
        &mut self,
        request: I2cRead,
        handler: BytesHandler,
    ) -> Result<SubscriptionId, IoError> {
        self.i2c_read_once(request, handler)
    }

    // ── Serial ──────────────────────

    /// Configure (open) a serial port. Replaces any previous configuration.
    fn serial_config(&mut self, config: SerialConfig) -> Result<(), IoError>;

    /// Transmit bytes.
    fn serial_write(&mut self, port: &PortId, bytes: &[u8]) -> Result<(), IoError>;

    /// Deliver received bytes; at most `max_bytes` per invocation when set.
    fn serial_read(
        &mut self,
        port: &PortId,
        max_bytes: Option<usize>,
        handler: BytesHandler,
    ) -> Result<SubscriptionId, IoError>;

    /// Stop reading. The handler is not invoked once this returns.
    fn serial_stop(&mut self, port: &PortId) -> Result<(), IoError>;

    /// Stop reading and close the port.
    fn serial_close(&mut self, port: &PortId) -> Result<(), IoError>;

    /// Discard buffered data.
    fn serial_flush(&mut self, port: &PortId) -> Result<(), IoError>;

    // ── Extensions without base behavior ──

    /// Cancel a read subscription. The handler is not invoked once this returns.
    fn cancel_read(&mut self, _id: SubscriptionId) -> Result<(), IoError> {
        Err(self.unsupported("cancelRead"))
    }

    /// Reset the board.
    fn reset(&mut self) -> Result<(), IoError> {
        Err(self.unsupported("reset"))
    }

    /// Enable or disable analog reporting.
    fn report_analog_pin(&mut self, _pin: &PinId, _enable: bool) -> Result<(), IoError> {
        Err(self.unsupported("reportAnalogPin"))
    }

    /// Enable or disable digital reporting.
    fn report_digital_pin(&mut self, _pin: &PinId, _enable: bool) -> Result<(), IoError> {
        Err(self.unsupported("reportDigitalPin"))
    }

    /// Measure the duration of a pulse.
    fn pulse_in(
        &mut self,
        _settings: PulseInSettings,
        _handler: DurationHandler,
    ) -> Result<SubscriptionId, IoError> {
        Err(self.unsupported("pulseIn"))
    }

    /// Configure a one-wire bus on `pin`.
    fn one_wire_config(&mut self, _pin: &PinId, _parasitic_power: bool) -> Result<(), IoError> {
        Err(self.unsupported("sendOneWireConfig"))
    }

    /// Search the bus for devices.
    fn one_wire_search(
        &mut self,
        _pin: &PinId,
        _handler: DevicesHandler,
    ) -> Result<SubscriptionId, IoError> {
        Err(self.unsupported("sendOneWireSearch"))
    }

    /// Search the bus for devices in alarm state.
    fn one_wire_alarms_search(
        &mut self,
        _pin: &PinId,
        _handler: DevicesHandler,
    ) -> Result<SubscriptionId, IoError> {
        Err(self.unsupported("sendOneWireAlarmsSearch"))
    }

    /// Read from a device.
    fn one_wire_read(
        &mut self,
        _pin: &PinId,
        _device: OneWireDevice,
        _bytes_to_read: usize,
        _handler: BytesHandler,
    ) -> Result<SubscriptionId, IoError> {
        Err(self.unsupported("sendOneWireRead"))
    }

    /// Reset the bus.
    fn one_wire_reset(&mut self, _pin: &PinId) -> Result<(), IoError> {
        Err(self.unsupported("sendOneWireReset"))
    }

    /// Write to a device, or to all devices when `device` is `None`.
    fn one_wire_write(
        &mut self,
        _pin: &PinId,
        _device: Option<OneWireDevice>,
        _data: &[u8],
    ) -> Result<(), IoError> {
        Err(self.unsupported("sendOneWireWrite"))
    }

    /// Insert a bus delay.
    fn one_wire_delay(&mut self, _pin: &PinId, _delay: Duration) -> Result<(), IoError> {
        Err(self.unsupported("sendOneWireDelay"))
    }

    /// Write then read in one transaction.
    fn one_wire_write_and_read(
        &mut self,
        _pin: &PinId,
        _device: OneWireDevice,
        _data: &[u8],
        _bytes_to_read: usize,
        _handler: BytesHandler,
    ) -> Result<SubscriptionId, IoError> {
        Err(self.unsupported("sendOneWireWriteAndRead"))
    }

    /// Configure a stepper.
    fn stepper_config(&mut self, _config: StepperConfig) -> Result<(), IoError> {
        Err(self.unsupported("stepperConfig"))
    }

    /// Move a stepper; the handler fires when the move completes.
    fn stepper_step(
        &mut self,
        _device: usize,
        _step: StepperStep,
        _handler: CompletionHandler,
    ) -> Result<SubscriptionId, IoError> {
        Err(self.unsupported("stepperStep"))
    }

    /// `UnsupportedOperation` naming `operation` and this driver.
    fn unsupported(&self, operation: &str) -> IoError {
        IoError::UnsupportedOperation {
            operation: operation.to_string(),
            driver: self.name().to_string(),
        }
    }
}
