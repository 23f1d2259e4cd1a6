//! Argument disambiguation for runtime-facing calls.
//!
//! An automation runtime hands over untyped argument lists where one
//! optional numeric parameter may be left out (`i2cRead(addr, [reg,] n, cb)`,
//! `serialRead(port, [max,] cb)`, `i2cWrite(addr, [reg,] bytes)`) or where a
//! record may replace positional numbers (`servoConfig`). This module
//! resolves them by **runtime type**, not by position, in one place:
//!
//! - the argument at the pivot slot has the type of the operation's
//!   trailing argument (handler for reads, byte array for writes): the
//!   optional number was omitted
//! - it is a number: that number is the optional parameter and the
//!   trailing argument follows it
//! - `servoConfig`: a sole record is destructured; one to three bare
//!   numbers map to (pin), (pin, min), (pin, min, max); a record followed
//!   by numbers is rejected
//!
//! `classify()` is pure and produces a typed `Call`; `invoke()` classifies
//! and applies the call to any `IoDriver`, so every driver sees identical
//! call semantics.

use crate::hal::config::{
    I2cConfig, OneWireDevice, PingSettings, PulseInSettings, SerialConfig, ServoConfig,
    StepperConfig, StepDirection, StepperStep,
};
use crate::hal::driver::{I2cRead, I2cWrite, IoDriver, IoError};
use crate::hal::ident::{PinId, PortId};
use crate::hal::types::{Mode, SubscriptionId, Value};
use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

// ─── Readings & handlers ────────────────────────────────────────────

/// Result delivered to a runtime handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reading {
    /// Byte payload (I2C, serial, one-wire).
    Bytes(Vec<u8>),
    /// Analog sample.
    Analog(u32),
    /// Digital level.
    Digital(Value),
    /// Measured duration (ping, pulse-in).
    Duration(Duration),
    /// One-wire search result.
    Devices(Vec<OneWireDevice>),
    /// Long-running command finished.
    Done,
}

/// Untyped handler supplied by a runtime.
pub struct Handler(Box<dyn FnMut(Reading) + Send>);

impl Handler {
    /// Wrap a closure.
    pub fn new(f: impl FnMut(Reading) + Send + 'static) -> Self {
        Self(Box::new(f))
    }

    /// Invoke the handler.
    pub fn call(&mut self, reading: Reading) {
        (self.0)(reading)
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Handler")
    }
}

// ─── Arg ────────────────────────────────────────────────────────────

/// One untyped argument.
#[derive(Debug)]
pub enum Arg {
    /// Number.
    Int(i64),
    /// String (symbolic pin or port name).
    Str(String),
    /// Byte array.
    Bytes(Vec<u8>),
    /// Callback.
    Handler(Handler),
    /// Mode value.
    Mode(Mode),
    /// Servo options record.
    Servo(ServoConfig),
    /// I2C options record.
    I2c(I2cConfig),
    /// Serial options record.
    Serial(SerialConfig),
    /// Ping settings record.
    Ping(PingSettings),
    /// Stepper options record.
    Stepper(StepperConfig),
}

/// Runtime type of an `Arg`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgKind {
    /// `Arg::Int`.
    Int,
    /// `Arg::Str`.
    Str,
    /// `Arg::Bytes`.
    Bytes,
    /// `Arg::Handler`.
    Handler,
    /// `Arg::Mode`.
    Mode,
    /// `Arg::Servo`.
    Servo,
    /// `Arg::I2c`.
    I2c,
    /// `Arg::Serial`.
    Serial,
    /// `Arg::Ping`.
    Ping,
    /// `Arg::Stepper`.
    Stepper,
}

impl Arg {
    /// Callback argument.
    pub fn handler(f: impl FnMut(Reading) + Send + 'static) -> Self {
        Self::Handler(Handler::new(f))
    }

    /// Runtime type.
    pub fn kind(&self) -> ArgKind {
        match self {
            Self::Int(_) => ArgKind::Int,
            Self::Str(_) => ArgKind::Str,
            Self::Bytes(_) => ArgKind::Bytes,
            Self::Handler(_) => ArgKind::Handler,
            Self::Mode(_) => ArgKind::Mode,
            Self::Servo(_) => ArgKind::Servo,
            Self::I2c(_) => ArgKind::I2c,
            Self::Serial(_) => ArgKind::Serial,
            Self::Ping(_) => ArgKind::Ping,
            Self::Stepper(_) => ArgKind::Stepper,
        }
    }
}

impl From<i64> for Arg {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for Arg {
    fn from(v: i32) -> Self {
        Self::Int(v.into())
    }
}

impl From<&str> for Arg {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for Arg {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl From<Vec<u8>> for Arg {
    fn from(v: Vec<u8>) -> Self {
        Self::Bytes(v)
    }
}

impl From<&[u8]> for Arg {
    fn from(v: &[u8]) -> Self {
        Self::Bytes(v.to_vec())
    }
}

impl From<Mode> for Arg {
    fn from(v: Mode) -> Self {
        Self::Mode(v)
    }
}

impl From<ServoConfig> for Arg {
    fn from(v: ServoConfig) -> Self {
        Self::Servo(v)
    }
}

impl From<I2cConfig> for Arg {
    fn from(v: I2cConfig) -> Self {
        Self::I2c(v)
    }
}

impl From<SerialConfig> for Arg {
    fn from(v: SerialConfig) -> Self {
        Self::Serial(v)
    }
}

impl From<PingSettings> for Arg {
    fn from(v: PingSettings) -> Self {
        Self::Ping(v)
    }
}

impl From<StepperConfig> for Arg {
    fn from(v: StepperConfig) -> Self {
        Self::Stepper(v)
    }
}

// ─── Operation ──────────────────────────────────────────────────────

/// Runtime-facing operation names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Set a pin's active mode.
    PinMode,
    /// Drive an output pin high or low.
    DigitalWrite,
    /// Alias of `PwmWrite`.
    AnalogWrite,
    /// Set a PWM duty value.
    PwmWrite,
    /// Move a servo to an angle in degrees.
    ServoWrite,
    /// Set a servo's pulse width bounds.
    ServoConfig,
    /// Subscribe to analog samples.
    AnalogRead,
    /// Subscribe to digital level changes.
    DigitalRead,
    /// One-shot ultrasonic echo measurement.
    PingRead,
    /// Configure an I2C peripheral.
    I2cConfig,
    /// Alias of `I2cConfig`.
    SendI2cConfig,
    /// Write bytes to an I2C peripheral, optionally at a register.
    I2cWrite,
    /// Alias of `I2cWrite`.
    SendI2cWriteRequest,
    /// Write one byte to an I2C register.
    I2cWriteReg,
    /// Continuous I2C read.
    I2cRead,
    /// One-shot I2C read.
    I2cReadOnce,
    /// Alias of `I2cReadOnce`.
    SendI2cReadRequest,
    /// Configure a serial port.
    SerialConfig,
    /// Transmit bytes on a serial port.
    SerialWrite,
    /// Subscribe to received serial bytes.
    SerialRead,
    /// Stop reading a serial port.
    SerialStop,
    /// Close a serial port.
    SerialClose,
    /// Discard buffered serial data.
    SerialFlush,
    /// Resolve a pin identifier to its index.
    Normalize,
    /// End a read subscription.
    CancelRead,
    /// Reset the board.
    Reset,
    /// Toggle analog reporting for a pin.
    ReportAnalogPin,
    /// Toggle digital reporting for a pin.
    ReportDigitalPin,
    /// Measure a pulse on a pin.
    PulseIn,
    /// Configure a 1-Wire bus.
    OneWireConfig,
    /// Enumerate 1-Wire devices.
    OneWireSearch,
    /// Enumerate 1-Wire devices in alarm state.
    OneWireAlarmsSearch,
    /// Read from a 1-Wire device.
    OneWireRead,
    /// Reset a 1-Wire bus.
    OneWireReset,
    /// Write to a 1-Wire bus.
    OneWireWrite,
    /// Delay 1-Wire bus activity.
    OneWireDelay,
    /// Write to then read from a 1-Wire device.
    OneWireWriteAndRead,
    /// Configure a stepper motor.
    StepperConfig,
    /// Run a stepper motor.
    StepperStep,
}

impl Operation {
    /// Every operation.
    pub const ALL: [Operation; 39] = [
        Self::PinMode,
        Self::DigitalWrite,
        Self::AnalogWrite,
        Self::PwmWrite,
        Self::ServoWrite,
        Self::ServoConfig,
        Self::AnalogRead,
        Self::DigitalRead,
        Self::PingRead,
        Self::I2cConfig,
        Self::SendI2cConfig,
        Self::I2cWrite,
        Self::SendI2cWriteRequest,
        Self::I2cWriteReg,
        Self::I2cRead,
        Self::I2cReadOnce,
        Self::SendI2cReadRequest,
        Self::SerialConfig,
        Self::SerialWrite,
        Self::SerialRead,
        Self::SerialStop,
        Self::SerialClose,
        Self::SerialFlush,
        Self::Normalize,
        Self::CancelRead,
        Self::Reset,
        Self::ReportAnalogPin,
        Self::ReportDigitalPin,
        Self::PulseIn,
        Self::OneWireConfig,
        Self::OneWireSearch,
        Self::OneWireAlarmsSearch,
        Self::OneWireRead,
        Self::OneWireReset,
        Self::OneWireWrite,
        Self::OneWireDelay,
        Self::OneWireWriteAndRead,
        Self::StepperConfig,
        Self::StepperStep,
    ];

    /// Name used by automation runtimes.
    pub const fn name(self) -> &'static str {
        match self {
            Self::PinMode => "pinMode",
            Self::DigitalWrite => "digitalWrite",
            Self::AnalogWrite => "analogWrite",
            Self::PwmWrite => "pwmWrite",
            Self::ServoWrite => "servoWrite",
            Self::ServoConfig => "servoConfig",
            Self::AnalogRead => "analogRead",
            Self::DigitalRead => "digitalRead",
            Self::PingRead => "pingRead",
            Self::I2cConfig => "i2cConfig",
            Self::SendI2cConfig => "sendI2CConfig",
            Self::I2cWrite => "i2cWrite",
            Self::SendI2cWriteRequest => "sendI2CWriteRequest",
            Self::I2cWriteReg => "i2cWriteReg",
            Self::I2cRead => "i2cRead",
            Self::I2cReadOnce => "i2cReadOnce",
            Self::SendI2cReadRequest => "sendI2CReadRequest",
            Self::SerialConfig => "serialConfig",
            Self::SerialWrite => "serialWrite",
            Self::SerialRead => "serialRead",
            Self::SerialStop => "serialStop",
            Self::SerialClose => "serialClose",
            Self::SerialFlush => "serialFlush",
            Self::Normalize => "normalize",
            Self::CancelRead => "cancelRead",
            Self::Reset => "reset",
            Self::ReportAnalogPin => "reportAnalogPin",
            Self::ReportDigitalPin => "reportDigitalPin",
            Self::PulseIn => "pulseIn",
            Self::OneWireConfig => "sendOneWireConfig",
            Self::OneWireSearch => "sendOneWireSearch",
            Self::OneWireAlarmsSearch => "sendOneWireAlarmsSearch",
            Self::OneWireRead => "sendOneWireRead",
            Self::OneWireReset => "sendOneWireReset",
            Self::OneWireWrite => "sendOneWireWrite",
            Self::OneWireDelay => "sendOneWireDelay",
            Self::OneWireWriteAndRead => "sendOneWireWriteAndRead",
            Self::StepperConfig => "stepperConfig",
            Self::StepperStep => "stepperStep",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Operation {
    type Err = IoError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|op| op.name() == s)
            .ok_or_else(|| IoError::InvalidArgumentShape {
                operation: s.to_string(),
                reason: "unknown operation".to_string(),
            })
    }
}

// ─── Classified calls ───────────────────────────────────────────────

/// A call whose argument shape has been resolved.
#[derive(Debug)]
pub enum Call {
    /// `pin_mode`.
    PinMode { pin: PinId, mode: Mode },
    /// `digital_write`.
    DigitalWrite { pin: PinId, value: Value },
    /// `pwm_write`, also reached from `analogWrite`.
    PwmWrite { pin: PinId, value: u32 },
    /// `servo_write`.
    ServoWrite { pin: PinId, value: u32 },
    /// `servo_config`.
    ServoConfig(ServoConfig),
    /// `analog_read`.
    AnalogRead { pin: PinId, handler: Handler },
    /// `digital_read`.
    DigitalRead { pin: PinId, handler: Handler },
    /// `ping_read`.
    PingRead { settings: PingSettings, handler: Handler },
    /// `i2c_config`.
    I2cConfig(I2cConfig),
    /// `i2c_write`, with or without a register.
    I2cWrite(I2cWrite),
    /// `i2c_write_reg`.
    I2cWriteReg { address: u16, register: u8, value: u8 },
    /// `i2c_read`, or `i2c_read_once` when `once` is set.
    I2cRead { request: I2cRead, once: bool, handler: Handler },
    /// `serial_config`.
    SerialConfig(SerialConfig),
    /// `serial_write`.
    SerialWrite { port: PortId, bytes: Vec<u8> },
    /// `serial_read`.
    SerialRead { port: PortId, max_bytes: Option<usize>, handler: Handler },
    /// `serial_stop`.
    SerialStop(PortId),
    /// `serial_close`.
    SerialClose(PortId),
    /// `serial_flush`.
    SerialFlush(PortId),
    /// `normalize`.
    Normalize(PinId),
    /// `cancel_read`.
    CancelRead(SubscriptionId),
    /// `reset`.
    Reset,
    /// `report_analog_pin`.
    ReportAnalogPin { pin: PinId, enable: bool },
    /// `report_digital_pin`.
    ReportDigitalPin { pin: PinId, enable: bool },
    /// `pulse_in`.
    PulseIn { settings: PulseInSettings, handler: Handler },
    /// `one_wire_config`.
    OneWireConfig { pin: PinId, parasitic_power: bool },
    /// `one_wire_search`, or `one_wire_alarms_search` when `alarms` is set.
    OneWireSearch { pin: PinId, alarms: bool, handler: Handler },
    /// `one_wire_read`.
    OneWireRead { pin: PinId, device: OneWireDevice, bytes_to_read: usize, handler: Handler },
    /// `one_wire_reset`.
    OneWireReset(PinId),
    /// `one_wire_write`.
    OneWireWrite { pin: PinId, device: Option<OneWireDevice>, data: Vec<u8> },
    /// `one_wire_delay`.
    OneWireDelay { pin: PinId, delay: Duration },
    /// `one_wire_write_and_read`.
    OneWireWriteAndRead {
        pin: PinId,
        device: OneWireDevice,
        data: Vec<u8>,
        bytes_to_read: usize,
        handler: Handler,
    },
    /// `stepper_config`.
    StepperConfig(StepperConfig),
    /// `stepper_step`.
    StepperStep { device: usize, step: StepperStep, handler: Handler },
}

/// What an invoked call produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Synchronous call completed.
    Done,
    /// Read registered.
    Subscribed(SubscriptionId),
    /// Canonical pin index (`normalize`).
    Normalized(usize),
}

/// Whether an optional numeric parameter was supplied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Optional {
    /// Left out; use the default/absent value.
    Omitted,
    /// Supplied.
    Present,
}

/// Decide whether the optional number before `pivot` was supplied.
///
/// `terminal` is the type of the operation's trailing argument. If the
/// argument at `pivot` has that type the optional number was omitted; if it
/// is a number, the optional number was supplied. Anything else matches no
/// shape.
pub fn resolve_optional(kinds: &[ArgKind], pivot: usize, terminal: ArgKind) -> Option<Optional> {
    match kinds.get(pivot) {
        Some(kind) if *kind == terminal => Some(Optional::Omitted),
        Some(ArgKind::Int) => Some(Optional::Present),
        _ => None,
    }
}

// ─── Argument cursor ────────────────────────────────────────────────

/// Expected slot type in a shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Int,
    /// Number or name.
    Ident,
    Bytes,
    Handler,
    Exact(ArgKind),
}

impl Slot {
    fn accepts(self, kind: ArgKind) -> bool {
        match self {
            Self::Int => kind == ArgKind::Int,
            Self::Ident => matches!(kind, ArgKind::Int | ArgKind::Str),
            Self::Bytes => kind == ArgKind::Bytes,
            Self::Handler => kind == ArgKind::Handler,
            Self::Exact(k) => kind == k,
        }
    }
}

struct Args {
    op: Operation,
    kinds: Vec<ArgKind>,
    items: VecDeque<Arg>,
}

impl Args {
    fn new(op: Operation, args: Vec<Arg>) -> Self {
        let kinds = args.iter().map(Arg::kind).collect();
        Self {
            op,
            kinds,
            items: args.into(),
        }
    }

    fn fits(&self, shape: &[Slot]) -> bool {
        self.kinds.len() == shape.len()
            && self.kinds.iter().zip(shape).all(|(k, s)| s.accepts(*k))
    }

    fn shape_error(&self, reason: impl Into<String>) -> IoError {
        IoError::InvalidArgumentShape {
            operation: self.op.name().to_string(),
            reason: format!("{} (got {:?})", reason.into(), self.kinds),
        }
    }

    /// Check the whole list against one shape.
    fn expect(&self, shape: &[Slot]) -> Result<(), IoError> {
        if self.fits(shape) {
            Ok(())
        } else {
            Err(self.shape_error(format!("expected {shape:?}")))
        }
    }

    fn optional(&self, pivot: usize, terminal: ArgKind) -> Result<Optional, IoError> {
        resolve_optional(&self.kinds, pivot, terminal).ok_or_else(|| {
            self.shape_error(format!(
                "argument {pivot} must be a number or {terminal:?}"
            ))
        })
    }

    fn next(&mut self) -> Result<Arg, IoError> {
        self.items
            .pop_front()
            .ok_or_else(|| self.shape_error("missing argument"))
    }

    fn int(&mut self) -> Result<i64, IoError> {
        match self.next()? {
            Arg::Int(v) => Ok(v),
            other => Err(self.shape_error(format!("expected number, got {:?}", other.kind()))),
        }
    }

    fn unsigned<T: TryFrom<i64>>(&mut self, what: &str) -> Result<T, IoError> {
        let raw = self.int()?;
        T::try_from(raw).map_err(|_| IoError::InvalidValue(format!("{what} out of range: {raw}")))
    }

    fn flag(&mut self, what: &str) -> Result<bool, IoError> {
        Ok(bool::from(Value::try_from(self.int()?).map_err(|_| {
            IoError::InvalidValue(format!("{what} must be 0 or 1"))
        })?))
    }

    fn pin(&mut self) -> Result<PinId, IoError> {
        match self.next()? {
            Arg::Int(v) => usize::try_from(v)
                .map(PinId::Index)
                .map_err(|_| IoError::UnknownPin(v.to_string())),
            Arg::Str(s) => Ok(PinId::Name(s)),
            other => Err(self.shape_error(format!("expected pin, got {:?}", other.kind()))),
        }
    }

    fn port(&mut self) -> Result<PortId, IoError> {
        match self.next()? {
            Arg::Int(v) => usize::try_from(v)
                .map(PortId::Index)
                .map_err(|_| IoError::UnknownPort(v.to_string())),
            Arg::Str(s) => Ok(PortId::Name(s)),
            other => Err(self.shape_error(format!("expected port, got {:?}", other.kind()))),
        }
    }

    fn bytes(&mut self) -> Result<Vec<u8>, IoError> {
        match self.next()? {
            Arg::Bytes(b) => Ok(b),
            other => Err(self.shape_error(format!("expected bytes, got {:?}", other.kind()))),
        }
    }

    fn device(&mut self) -> Result<OneWireDevice, IoError> {
        OneWireDevice::try_from(self.bytes()?.as_slice())
    }

    fn handler(&mut self) -> Result<Handler, IoError> {
        match self.next()? {
            Arg::Handler(h) => Ok(h),
            other => Err(self.shape_error(format!("expected handler, got {:?}", other.kind()))),
        }
    }

    fn mode(&mut self) -> Result<Mode, IoError> {
        match self.next()? {
            Arg::Mode(m) => Ok(m),
            Arg::Int(v) => Mode::ALL
                .into_iter()
                .find(|m| *m as i64 == v)
                .ok_or_else(|| IoError::InvalidValue(format!("unknown mode {v}"))),
            Arg::Str(s) => s.parse::<Mode>().map_err(IoError::InvalidValue),
            other => Err(self.shape_error(format!("expected mode, got {:?}", other.kind()))),
        }
    }
}

// ─── Classification ─────────────────────────────────────────────────

/// Resolve the argument shape of `op`.
///
/// # Errors
/// `InvalidArgumentShape` when the list matches none of the operation's
/// shapes; `InvalidValue` when a number does not fit its parameter.
pub fn classify(op: Operation, args: Vec<Arg>) -> Result<Call, IoError> {
    use Slot::{Bytes, Handler as H, Ident, Int};

    let mut a = Args::new(op, args);
    let call = match op {
        Operation::PinMode => {
            a.expect(&[Ident, Slot::Exact(ArgKind::Mode)])
                .or_else(|_| a.expect(&[Ident, Int]))
                .or_else(|_| a.expect(&[Ident, Slot::Exact(ArgKind::Str)]))?;
            Call::PinMode {
                pin: a.pin()?,
                mode: a.mode()?,
            }
        }
        Operation::DigitalWrite => {
            a.expect(&[Ident, Int])?;
            let pin = a.pin()?;
            Call::DigitalWrite {
                pin,
                value: Value::try_from(a.int()?)?,
            }
        }
        Operation::AnalogWrite | Operation::PwmWrite => {
            a.expect(&[Ident, Int])?;
            Call::PwmWrite {
                pin: a.pin()?,
                value: a.unsigned("pwm value")?,
            }
        }
        Operation::ServoWrite => {
            a.expect(&[Ident, Int])?;
            Call::ServoWrite {
                pin: a.pin()?,
                value: a.unsigned("servo value")?,
            }
        }
        Operation::ServoConfig => Call::ServoConfig(classify_servo_config(&mut a)?),
        Operation::AnalogRead | Operation::DigitalRead => {
            a.expect(&[Ident, H])?;
            let pin = a.pin()?;
            let handler = a.handler()?;
            if op == Operation::AnalogRead {
                Call::AnalogRead { pin, handler }
            } else {
                Call::DigitalRead { pin, handler }
            }
        }
        Operation::PingRead => {
            let settings = if a.fits(&[Slot::Exact(ArgKind::Ping), H]) {
                match a.next()? {
                    Arg::Ping(s) => s,
                    other => {
                        let found = other.kind();
                        return Err(a.shape_error(format!("expected ping settings, got {found:?}")));
                    }
                }
            } else {
                a.expect(&[Ident, H])?;
                PingSettings::new(a.pin()?)
            };
            Call::PingRead {
                settings,
                handler: a.handler()?,
            }
        }
        Operation::I2cConfig | Operation::SendI2cConfig => {
            if a.fits(&[Slot::Exact(ArgKind::I2c)]) {
                match a.next()? {
                    Arg::I2c(cfg) => Call::I2cConfig(cfg),
                    other => {
                        let found = other.kind();
                        return Err(a.shape_error(format!("expected i2c options, got {found:?}")));
                    }
                }
            } else {
                a.expect(&[Int])?;
                Call::I2cConfig(I2cConfig::new(a.unsigned("i2c address")?))
            }
        }
        Operation::I2cWrite | Operation::SendI2cWriteRequest => {
            let register = a.optional(1, ArgKind::Bytes)?;
            let request = match register {
                Optional::Omitted => {
                    a.expect(&[Int, Bytes])?;
                    I2cWrite::raw(a.unsigned("i2c address")?, a.bytes()?)
                }
                Optional::Present => {
                    a.expect(&[Int, Int, Bytes])?;
                    let address = a.unsigned("i2c address")?;
                    let register = a.unsigned("i2c register")?;
                    I2cWrite::to_register(address, register, a.bytes()?)
                }
            };
            Call::I2cWrite(request)
        }
        Operation::I2cWriteReg => {
            a.expect(&[Int, Int, Int])?;
            Call::I2cWriteReg {
                address: a.unsigned("i2c address")?,
                register: a.unsigned("i2c register")?,
                value: a.unsigned("i2c register value")?,
            }
        }
        Operation::I2cRead | Operation::I2cReadOnce | Operation::SendI2cReadRequest => {
            let register = a.optional(2, ArgKind::Handler)?;
            let request = match register {
                Optional::Omitted => {
                    a.expect(&[Int, Int, H])?;
                    let address = a.unsigned("i2c address")?;
                    I2cRead::new(address, a.unsigned("bytes to read")?)
                }
                Optional::Present => {
                    a.expect(&[Int, Int, Int, H])?;
                    let address = a.unsigned("i2c address")?;
                    let register = a.unsigned("i2c register")?;
                    I2cRead::from_register(address, register, a.unsigned("bytes to read")?)
                }
            };
            Call::I2cRead {
                request,
                once: op != Operation::I2cRead,
                handler: a.handler()?,
            }
        }
        Operation::SerialConfig => {
            a.expect(&[Slot::Exact(ArgKind::Serial)])?;
            match a.next()? {
                Arg::Serial(cfg) => Call::SerialConfig(cfg),
                other => {
                    let found = other.kind();
                    return Err(a.shape_error(format!("expected serial options, got {found:?}")));
                }
            }
        }
        Operation::SerialWrite => {
            a.expect(&[Ident, Bytes])?;
            Call::SerialWrite {
                port: a.port()?,
                bytes: a.bytes()?,
            }
        }
        Operation::SerialRead => {
            let max = a.optional(1, ArgKind::Handler)?;
            let (port, max_bytes) = match max {
                Optional::Omitted => {
                    a.expect(&[Ident, H])?;
                    (a.port()?, None)
                }
                Optional::Present => {
                    a.expect(&[Ident, Int, H])?;
                    let port = a.port()?;
                    let max: usize = a.unsigned("max bytes to read")?;
                    if max == 0 {
                        return Err(IoError::InvalidValue(
                            "max bytes to read must be positive".to_string(),
                        ));
                    }
                    (port, Some(max))
                }
            };
            Call::SerialRead {
                port,
                max_bytes,
                handler: a.handler()?,
            }
        }
        Operation::SerialStop | Operation::SerialClose | Operation::SerialFlush => {
            a.expect(&[Ident])?;
            let port = a.port()?;
            match op {
                Operation::SerialStop => Call::SerialStop(port),
                Operation::SerialClose => Call::SerialClose(port),
                _ => Call::SerialFlush(port),
            }
        }
        Operation::Normalize => {
            a.expect(&[Ident])?;
            Call::Normalize(a.pin()?)
        }
        Operation::CancelRead => {
            a.expect(&[Int])?;
            Call::CancelRead(SubscriptionId(a.unsigned("subscription id")?))
        }
        Operation::Reset => {
            a.expect(&[])?;
            Call::Reset
        }
        Operation::ReportAnalogPin | Operation::ReportDigitalPin => {
            a.expect(&[Ident, Int])?;
            let pin = a.pin()?;
            let enable = a.flag("report flag")?;
            if op == Operation::ReportAnalogPin {
                Call::ReportAnalogPin { pin, enable }
            } else {
                Call::ReportDigitalPin { pin, enable }
            }
        }
        Operation::PulseIn => {
            let pulse_out = a.optional(3, ArgKind::Handler)?;
            let pin;
            let value;
            let pulse;
            match pulse_out {
                Optional::Omitted => {
                    a.expect(&[Ident, Int, Int, H])?;
                    pin = a.pin()?;
                    value = Value::try_from(a.int()?)?;
                    pulse = None;
                }
                Optional::Present => {
                    a.expect(&[Ident, Int, Int, Int, H])?;
                    pin = a.pin()?;
                    value = Value::try_from(a.int()?)?;
                    pulse = Some(Duration::from_micros(a.unsigned("pulse out")?));
                }
            }
            let timeout = Duration::from_micros(a.unsigned("timeout")?);
            Call::PulseIn {
                settings: PulseInSettings {
                    pin,
                    value,
                    pulse_out: pulse,
                    timeout,
                },
                handler: a.handler()?,
            }
        }
        Operation::OneWireConfig => {
            a.expect(&[Ident, Int])?;
            Call::OneWireConfig {
                pin: a.pin()?,
                parasitic_power: a.flag("parasitic power flag")?,
            }
        }
        Operation::OneWireSearch | Operation::OneWireAlarmsSearch => {
            a.expect(&[Ident, H])?;
            Call::OneWireSearch {
                pin: a.pin()?,
                alarms: op == Operation::OneWireAlarmsSearch,
                handler: a.handler()?,
            }
        }
        Operation::OneWireRead => {
            a.expect(&[Ident, Bytes, Int, H])?;
            Call::OneWireRead {
                pin: a.pin()?,
                device: a.device()?,
                bytes_to_read: a.unsigned("bytes to read")?,
                handler: a.handler()?,
            }
        }
        Operation::OneWireReset => {
            a.expect(&[Ident])?;
            Call::OneWireReset(a.pin()?)
        }
        Operation::OneWireWrite => {
            // Two byte arrays: device then data. One: data for every device.
            if a.fits(&[Ident, Bytes, Bytes]) {
                Call::OneWireWrite {
                    pin: a.pin()?,
                    device: Some(a.device()?),
                    data: a.bytes()?,
                }
            } else {
                a.expect(&[Ident, Bytes])?;
                Call::OneWireWrite {
                    pin: a.pin()?,
                    device: None,
                    data: a.bytes()?,
                }
            }
        }
        Operation::OneWireDelay => {
            a.expect(&[Ident, Int])?;
            Call::OneWireDelay {
                pin: a.pin()?,
                delay: Duration::from_micros(a.unsigned("delay")?),
            }
        }
        Operation::OneWireWriteAndRead => {
            a.expect(&[Ident, Bytes, Bytes, Int, H])?;
            Call::OneWireWriteAndRead {
                pin: a.pin()?,
                device: a.device()?,
                data: a.bytes()?,
                bytes_to_read: a.unsigned("bytes to read")?,
                handler: a.handler()?,
            }
        }
        Operation::StepperConfig => {
            a.expect(&[Slot::Exact(ArgKind::Stepper)])?;
            match a.next()? {
                Arg::Stepper(cfg) => Call::StepperConfig(cfg),
                other => {
                    let found = other.kind();
                    return Err(a.shape_error(format!("expected stepper options, got {found:?}")));
                }
            }
        }
        Operation::StepperStep => {
            let full = a.fits(&[Int, Int, Int, Int, Int, Int, H]);
            if !full {
                a.expect(&[Int, Int, Int, Int, H])?;
            }
            let device = a.unsigned("stepper device")?;
            let direction = if a.flag("direction")? {
                StepDirection::Cw
            } else {
                StepDirection::Ccw
            };
            let steps = a.unsigned("steps")?;
            let speed = a.unsigned("speed")?;
            let (accel, decel) = if full {
                (a.unsigned("accel")?, a.unsigned("decel")?)
            } else {
                (0, 0)
            };
            Call::StepperStep {
                device,
                step: StepperStep {
                    direction,
                    steps,
                    speed,
                    accel,
                    decel,
                },
                handler: a.handler()?,
            }
        }
    };
    Ok(call)
}

fn classify_servo_config(a: &mut Args) -> Result<ServoConfig, IoError> {
    match a.kinds.as_slice() {
        [ArgKind::Servo] => match a.next()? {
            Arg::Servo(cfg) => Ok(cfg),
            other => Err(a.shape_error(format!("expected servo options, got {:?}", other.kind()))),
        },
        [ArgKind::Servo, ..] => {
            Err(a.shape_error("options record cannot be combined with positional arguments"))
        }
        [ArgKind::Int | ArgKind::Str] => Ok(ServoConfig::new(a.pin()?)),
        [ArgKind::Int | ArgKind::Str, ArgKind::Int] => {
            let mut cfg = ServoConfig::new(a.pin()?);
            cfg.min = Some(a.unsigned("servo min")?);
            Ok(cfg)
        }
        [ArgKind::Int | ArgKind::Str, ArgKind::Int, ArgKind::Int] => {
            let pin = a.pin()?;
            let min = a.unsigned("servo min")?;
            let max = a.unsigned("servo max")?;
            Ok(ServoConfig::new(pin).with_range(min, max))
        }
        _ => Err(a.shape_error("expected options record or (pin[, min[, max]])")),
    }
}

// ─── Application ────────────────────────────────────────────────────

impl Call {
    /// Apply to `driver`, adapting runtime handlers to the typed ones.
    pub fn apply(self, driver: &mut dyn IoDriver) -> Result<Outcome, IoError> {
        use Outcome::{Done, Subscribed};

        match self {
            Call::PinMode { pin, mode } => driver.pin_mode(&pin, mode).map(|_| Done),
            Call::DigitalWrite { pin, value } => driver.digital_write(&pin, value).map(|_| Done),
            Call::PwmWrite { pin, value } => driver.pwm_write(&pin, value).map(|_| Done),
            Call::ServoWrite { pin, value } => driver.servo_write(&pin, value).map(|_| Done),
            Call::ServoConfig(cfg) => driver.servo_config(cfg).map(|_| Done),
            Call::AnalogRead { pin, mut handler } => driver
                .analog_read(&pin, Box::new(move |v: u32| handler.call(Reading::Analog(v))))
                .map(Subscribed),
            Call::DigitalRead { pin, mut handler } => driver
                .digital_read(&pin, Box::new(move |v: Value| handler.call(Reading::Digital(v))))
                .map(Subscribed),
            Call::PingRead {
                settings,
                mut handler,
            } => driver
                .ping_read(
                    settings,
                    Box::new(move |d: Duration| handler.call(Reading::Duration(d))),
                )
                .map(Subscribed),
            Call::I2cConfig(cfg) => driver.i2c_config(cfg).map(|_| Done),
            Call::I2cWrite(request) => driver.i2c_write(request).map(|_| Done),
            Call::I2cWriteReg {
                address,
                register,
                value,
            } => driver.i2c_write_reg(address, register, value).map(|_| Done),
            Call::I2cRead {
                request,
                once,
                mut handler,
            } => {
                let typed =
                    Box::new(move |data: &[u8]| handler.call(Reading::Bytes(data.to_vec())));
                if once {
                    driver.i2c_read_once(request, typed).map(Subscribed)
                } else {
                    driver.i2c_read(request, typed).map(Subscribed)
                }
            }
            Call::SerialConfig(cfg) => driver.serial_config(cfg).map(|_| Done),
            Call::SerialWrite { port, bytes } => driver.serial_write(&port, &bytes).map(|_| Done),
            Call::SerialRead {
                port,
                max_bytes,
                mut handler,
            } => driver
                .serial_read(
                    &port,
                    max_bytes,
                    Box::new(move |data: &[u8]| handler.call(Reading::Bytes(data.to_vec()))),
                )
                .map(Subscribed),
            Call::SerialStop(port) => driver.serial_stop(&port).map(|_| Done),
            Call::SerialClose(port) => driver.serial_close(&port).map(|_| Done),
            Call::SerialFlush(port) => driver.serial_flush(&port).map(|_| Done),
            Call::Normalize(pin) => driver.normalize(&pin).map(Outcome::Normalized),
            Call::CancelRead(id) => driver.cancel_read(id).map(|_| Done),
            Call::Reset => driver.reset().map(|_| Done),
            Call::ReportAnalogPin { pin, enable } => {
                driver.report_analog_pin(&pin, enable).map(|_| Done)
            }
            Call::ReportDigitalPin { pin, enable } => {
                driver.report_digital_pin(&pin, enable).map(|_| Done)
            }
            Call::PulseIn {
                settings,
                mut handler,
            } => driver
                .pulse_in(
                    settings,
                    Box::new(move |d: Duration| handler.call(Reading::Duration(d))),
                )
                .map(Subscribed),
            Call::OneWireConfig {
                pin,
                parasitic_power,
            } => driver.one_wire_config(&pin, parasitic_power).map(|_| Done),
            Call::OneWireSearch {
                pin,
                alarms,
                mut handler,
            } => {
                let typed = Box::new(move |devices: Vec<OneWireDevice>| {
                    handler.call(Reading::Devices(devices))
                });
                if alarms {
                    driver.one_wire_alarms_search(&pin, typed).map(Subscribed)
                } else {
                    driver.one_wire_search(&pin, typed).map(Subscribed)
                }
            }
            Call::OneWireRead {
                pin,
                device,
                bytes_to_read,
                mut handler,
            } => driver
                .one_wire_read(
                    &pin,
                    device,
                    bytes_to_read,
                    Box::new(move |data: &[u8]| handler.call(Reading::Bytes(data.to_vec()))),
                )
                .map(Subscribed),
            Call::OneWireReset(pin) => driver.one_wire_reset(&pin).map(|_| Done),
            Call::OneWireWrite { pin, device, data } => {
                driver.one_wire_write(&pin, device, &data).map(|_| Done)
            }
            Call::OneWireDelay { pin, delay } => driver.one_wire_delay(&pin, delay).map(|_| Done),
            Call::OneWireWriteAndRead {
                pin,
                device,
                data,
                bytes_to_read,
                mut handler,
            } => driver
                .one_wire_write_and_read(
                    &pin,
                    device,
                    &data,
                    bytes_to_read,
                    Box::new(move |data: &[u8]| handler.call(Reading::Bytes(data.to_vec()))),
                )
                .map(Subscribed),
            Call::StepperConfig(cfg) => driver.stepper_config(cfg).map(|_| Done),
            Call::StepperStep {
                device,
                step,
                mut handler,
            } => driver
                .stepper_step(device, step, Box::new(move || handler.call(Reading::Done)))
                .map(Subscribed),
        }
    }
}

/// Classify `args` for `op` and apply the call to `driver`.
pub fn invoke(
    driver: &mut dyn IoDriver,
    op: Operation,
    args: Vec<Arg>,
) -> Result<Outcome, IoError> {
    classify(op, args)?.apply(driver)
}
