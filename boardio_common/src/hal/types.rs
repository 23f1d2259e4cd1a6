//! Pin, mode and signal value types.
//!
//! This module defines the capability model every driver exposes:
//! - `Mode` - the capability a pin is configured for (with an unset sentinel)
//! - `ModeSet` - the set of capabilities a pin can assume
//! - `Value` - binary signal level for digital contexts
//! - `Pin` - one entry of a driver's pin table
//! - `SubscriptionId` and handler aliases for the asynchronous read family

use bitflags::bitflags;
use core::fmt;
use core::str::FromStr;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::hal::config::OneWireDevice;
use crate::hal::driver::IoError;

// ─── Mode ───────────────────────────────────────────────────────────

/// Capability a pin is currently configured for.
///
/// `Unknown` is the state of a pin nobody has configured yet. It is never
/// part of a pin's supported set and cannot be requested via `pin_mode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Mode {
    /// Digital input.
    Input = 0,
    /// Digital output.
    Output = 1,
    /// Analog input.
    Analog = 2,
    /// Pulse-width modulated output.
    Pwm = 3,
    /// Hobby servo output.
    Servo = 4,
    /// Not configured.
    #[default]
    Unknown = 0x7F,
}

impl Mode {
    /// Every concrete mode, in declaration order.
    pub const ALL: [Mode; 5] = [Mode::Input, Mode::Output, Mode::Analog, Mode::Pwm, Mode::Servo];

    /// Single-member set for this mode. `Unknown` maps to the empty set.
    pub const fn flag(self) -> ModeSet {
        match self {
            Self::Input => ModeSet::INPUT,
            Self::Output => ModeSet::OUTPUT,
            Self::Analog => ModeSet::ANALOG,
            Self::Pwm => ModeSet::PWM,
            Self::Servo => ModeSet::SERVO,
            Self::Unknown => ModeSet::empty(),
        }
    }

    /// Whether a pin in this mode produces readings (inputs report values).
    pub const fn is_reporting(self) -> bool {
        matches!(self, Self::Input | Self::Analog)
    }

    /// Whether a pin in this mode is driven by the board.
    pub const fn is_driven(self) -> bool {
        matches!(self, Self::Output | Self::Pwm | Self::Servo)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Input => write!(f, "INPUT"),
            Self::Output => write!(f, "OUTPUT"),
            Self::Analog => write!(f, "ANALOG"),
            Self::Pwm => write!(f, "PWM"),
            Self::Servo => write!(f, "SERVO"),
            Self::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

impl FromStr for Mode {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "input" => Ok(Self::Input),
            "output" => Ok(Self::Output),
            "analog" => Ok(Self::Analog),
            "pwm" => Ok(Self::Pwm),
            "servo" => Ok(Self::Servo),
            "unknown" => Ok(Self::Unknown),
            _ => Err(format!("unknown Mode: {s:?}")),
        }
    }
}

// ─── ModeSet ────────────────────────────────────────────────────────

bitflags! {
    /// Set of capabilities a pin can assume. Fixed at driver construction.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct ModeSet: u8 {
        /// Digital input.
        const INPUT = 1 << 0;
        /// Digital output.
        const OUTPUT = 1 << 1;
        /// Analog input.
        const ANALOG = 1 << 2;
        /// PWM output.
        const PWM = 1 << 3;
        /// Servo output.
        const SERVO = 1 << 4;
    }
}

impl ModeSet {
    /// Whether `mode` is a member. `Unknown` is never a member.
    pub fn supports(&self, mode: Mode) -> bool {
        mode != Mode::Unknown && self.contains(mode.flag())
    }

    /// Iterate the member modes in declaration order.
    pub fn modes(&self) -> impl Iterator<Item = Mode> + '_ {
        Mode::ALL.into_iter().filter(|m| self.supports(*m))
    }
}

impl FromIterator<Mode> for ModeSet {
    fn from_iter<I: IntoIterator<Item = Mode>>(iter: I) -> Self {
        iter.into_iter()
            .fold(ModeSet::empty(), |acc, mode| acc | mode.flag())
    }
}

// ─── Value ──────────────────────────────────────────────────────────

/// Binary signal level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Value {
    /// Logic low.
    #[default]
    Low = 0,
    /// Logic high.
    High = 1,
}

impl Value {
    /// Level of a raw pin value; any non-zero level reads as `High`.
    pub fn from_level(level: u32) -> Self {
        if level == 0 { Self::Low } else { Self::High }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        if value { Self::High } else { Self::Low }
    }
}

impl From<Value> for bool {
    fn from(value: Value) -> Self {
        matches!(value, Value::High)
    }
}

impl From<Value> for u32 {
    fn from(value: Value) -> Self {
        value as u32
    }
}

impl TryFrom<i64> for Value {
    type Error = IoError;
    fn try_from(raw: i64) -> Result<Self, Self::Error> {
        match raw {
            0 => Ok(Self::Low),
            1 => Ok(Self::High),
            other => Err(IoError::InvalidValue(format!(
                "digital level must be 0 or 1, got {other}"
            ))),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "LOW"),
            Self::High => write!(f, "HIGH"),
        }
    }
}

// ─── Pin ────────────────────────────────────────────────────────────

/// One entry of a driver's pin table. The table index is the pin number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Pin {
    /// Capabilities this pin can assume.
    pub supported_modes: ModeSet,
    /// Active capability. Always `Unknown` or a member of `supported_modes`.
    pub mode: Mode,
    /// Last known or last commanded level.
    pub value: u32,
    /// Whether asynchronous value-change reports are enabled.
    pub reporting: bool,
    /// Index into the analog subsystem, `None` for non-analog pins.
    pub analog_channel: Option<u8>,
}

impl Pin {
    /// Create an unconfigured pin.
    pub fn new(supported_modes: ModeSet, analog_channel: Option<u8>) -> Self {
        Self {
            supported_modes,
            mode: Mode::Unknown,
            value: 0,
            reporting: false,
            analog_channel,
        }
    }

    /// Whether `mode` is in this pin's capability set.
    pub fn supports(&self, mode: Mode) -> bool {
        self.supported_modes.supports(mode)
    }

    /// Capability gate for an operation requiring `required`.
    ///
    /// # Errors
    /// - `UnsupportedMode` if the pin can never assume `required`
    /// - `ModeMismatch` if it can but is currently in another mode
    pub fn require(&self, index: usize, required: Mode) -> Result<(), IoError> {
        if !self.supports(required) {
            return Err(IoError::UnsupportedMode {
                pin: index,
                mode: required,
            });
        }
        if self.mode != required {
            return Err(IoError::ModeMismatch {
                pin: index,
                required,
                current: self.mode,
            });
        }
        Ok(())
    }

    /// Transition to `mode`, applying mode-appropriate defaults.
    ///
    /// Returns `Ok(false)` when the pin was already in `mode` (no-op).
    /// Leaving a reporting mode disables reporting; entering a driven mode
    /// resets the value to zero. Nothing is mutated on error.
    pub fn set_mode(&mut self, index: usize, mode: Mode) -> Result<bool, IoError> {
        if !self.supports(mode) {
            return Err(IoError::UnsupportedMode { pin: index, mode });
        }
        if self.mode == mode {
            return Ok(false);
        }
        if self.mode.is_reporting() {
            self.reporting = false;
        }
        if mode.is_driven() {
            self.value = 0;
        }
        self.mode = mode;
        Ok(true)
    }
}

// ─── Subscriptions ──────────────────────────────────────────────────

/// Identity of a registered read subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SubscriptionId(pub u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub#{}", self.0)
    }
}

/// Receives byte payloads (I2C, serial, one-wire reads).
pub type BytesHandler = Box<dyn FnMut(&[u8]) + Send>;

/// Receives analog readings.
pub type AnalogHandler = Box<dyn FnMut(u32) + Send>;

/// Receives digital levels.
pub type DigitalHandler = Box<dyn FnMut(Value) + Send>;

/// Receives a measured duration (ping, pulse-in).
pub type DurationHandler = Box<dyn FnMut(Duration) + Send>;

/// Receives one-wire device addresses found by a search.
pub type DevicesHandler = Box<dyn FnMut(Vec<OneWireDevice>) + Send>;

/// Signals completion of a long-running command (stepper moves).
pub type CompletionHandler = Box<dyn FnMut() + Send>;
