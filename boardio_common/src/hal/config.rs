//! Board description and peripheral configuration records.
//!
//! This module contains:
//! - `BoardConfig` - board topology loaded from `board.toml`
//! - `PinConfig` / `SerialPortConfig` / `I2cBusConfig` / `I2cDeviceConfig`
//! - peripheral records passed to drivers at runtime: `I2cConfig`,
//!   `SerialConfig`, `ServoConfig`, `PingSettings`, `PulseInSettings`,
//!   `StepperConfig`, `StepperStep`, `OneWireDevice`

use crate::hal::consts::{
    DEFAULT_ANALOG_RESOLUTION, DEFAULT_LED_PIN, DEFAULT_PING_PULSE_OUT_US,
    DEFAULT_POLL_INTERVAL_US, DEFAULT_PWM_RESOLUTION, DEFAULT_SERIAL_CHUNK_SIZE,
    DEFAULT_SERVO_MAX_US, DEFAULT_SERVO_MIN_US, MAX_I2C_ADDRESS, MAX_I2C_BUSES, MAX_PINS,
    MAX_RESOLUTION_BITS, MAX_SERIAL_PORTS,
};
use crate::hal::driver::IoError;
use crate::hal::ident::{BusId, IdentKind, NameTable, PinId, PortId};
use crate::hal::types::{Mode, ModeSet, Pin, Value};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::time::Duration;

fn default_poll_interval_us() -> u32 {
    DEFAULT_POLL_INTERVAL_US
}

fn default_pwm_resolution() -> u8 {
    DEFAULT_PWM_RESOLUTION
}

fn default_analog_resolution() -> u8 {
    DEFAULT_ANALOG_RESOLUTION
}

fn default_serial_chunk_size() -> usize {
    DEFAULT_SERIAL_CHUNK_SIZE
}

// ─── Board description ──────────────────────────────────────────────

/// Board topology loaded from `board.toml`.
///
/// The pin table and each pin's capabilities are static for the lifetime
/// of a driver; everything here is read once at `init()`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BoardConfig {
    /// Human-readable board name.
    pub name: String,

    /// On-board LED. Defaults to pin 13 when the board has one.
    #[serde(default)]
    pub default_led: Option<PinId>,

    /// Polling interval of the driver cycle in microseconds.
    #[serde(default = "default_poll_interval_us")]
    pub poll_interval_us: u32,

    /// PWM resolution in bits.
    #[serde(default = "default_pwm_resolution")]
    pub pwm_resolution: u8,

    /// ADC resolution in bits.
    #[serde(default = "default_analog_resolution")]
    pub analog_resolution: u8,

    /// Bytes per serial read invocation when the caller sets no bound.
    #[serde(default = "default_serial_chunk_size")]
    pub serial_chunk_size: usize,

    /// Pin table, index = pin number.
    pub pins: Vec<PinConfig>,

    /// Serial ports, index = port number.
    #[serde(default)]
    pub serial_ports: Vec<SerialPortConfig>,

    /// I2C buses, index = bus number. An empty list means one unnamed bus.
    #[serde(default)]
    pub i2c_buses: Vec<I2cBusConfig>,

    /// Devices attached to the I2C buses (used by simulation).
    #[serde(default)]
    pub i2c_devices: Vec<I2cDeviceConfig>,
}

/// One pin of the board description.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PinConfig {
    /// Supported modes.
    pub modes: Vec<Mode>,

    /// Symbolic names accepted for this pin.
    #[serde(default)]
    pub aliases: Vec<String>,

    /// Analog channel, required iff `modes` contains `analog`.
    #[serde(default)]
    pub analog_channel: Option<u8>,

    /// Simulated external level seen by inputs.
    #[serde(default)]
    pub initial_value: u32,

    /// Simulated echo time for ping reads, in microseconds.
    #[serde(default)]
    pub echo_us: Option<u64>,
}

/// One serial port of the board description.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SerialPortConfig {
    /// Symbolic port name (e.g. "HW_SERIAL1").
    #[serde(default)]
    pub name: Option<String>,

    /// Fixed RX pin, if the port is tied to pins.
    #[serde(default)]
    pub rx_pin: Option<PinId>,

    /// Fixed TX pin, if the port is tied to pins.
    #[serde(default)]
    pub tx_pin: Option<PinId>,

    /// Echo written bytes back into the receive buffer (simulation).
    #[serde(default)]
    pub loopback: bool,
}

/// One I2C bus of the board description.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct I2cBusConfig {
    /// Symbolic bus name (e.g. "i2c-1").
    #[serde(default)]
    pub name: Option<String>,
}

/// Device attached to an I2C bus.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct I2cDeviceConfig {
    /// Device address.
    pub address: u16,

    /// Bus index.
    #[serde(default)]
    pub bus: usize,

    /// Initial register contents, starting at register 0.
    #[serde(default)]
    pub memory: Vec<u8>,
}

impl BoardConfig {
    /// Validate the board description.
    ///
    /// # Validation Rules
    /// 1. at least one pin, at most `MAX_PINS`
    /// 2. every pin declares at least one mode, no `unknown`
    /// 3. `analog_channel` present iff the pin supports `analog`; channels unique
    /// 4. aliases unique across the namespace
    /// 5. resolutions in `1..=MAX_RESOLUTION_BITS`, poll interval and chunk size > 0
    /// 6. `default_led` and fixed serial pins resolve
    /// 7. I2C devices sit on an existing bus with a unique in-range address
    pub fn validate(&self) -> Result<(), IoError> {
        if self.pins.is_empty() {
            return Err(IoError::Config("board declares no pins".to_string()));
        }
        if self.pins.len() > MAX_PINS {
            return Err(IoError::Config(format!(
                "Too many pins: {} (max {})",
                self.pins.len(),
                MAX_PINS
            )));
        }
        if self.serial_ports.len() > MAX_SERIAL_PORTS {
            return Err(IoError::Config(format!(
                "Too many serial ports: {} (max {})",
                self.serial_ports.len(),
                MAX_SERIAL_PORTS
            )));
        }
        if self.i2c_buses.len() > MAX_I2C_BUSES {
            return Err(IoError::Config(format!(
                "Too many I2C buses: {} (max {})",
                self.i2c_buses.len(),
                MAX_I2C_BUSES
            )));
        }
        if self.poll_interval_us == 0 {
            return Err(IoError::Config(
                "poll_interval_us must be greater than 0".to_string(),
            ));
        }
        if self.serial_chunk_size == 0 {
            return Err(IoError::Config(
                "serial_chunk_size must be greater than 0".to_string(),
            ));
        }
        for (what, bits) in [
            ("pwm_resolution", self.pwm_resolution),
            ("analog_resolution", self.analog_resolution),
        ] {
            if bits == 0 || bits > MAX_RESOLUTION_BITS {
                return Err(IoError::Config(format!(
                    "{what} must be 1..={MAX_RESOLUTION_BITS} bits, got {bits}"
                )));
            }
        }

        let mut channels = HashSet::new();
        for (idx, pin) in self.pins.iter().enumerate() {
            if pin.modes.is_empty() {
                return Err(IoError::Config(format!("pin {idx} declares no modes")));
            }
            if pin.modes.contains(&Mode::Unknown) {
                return Err(IoError::Config(format!(
                    "pin {idx} lists 'unknown' as a supported mode"
                )));
            }
            let analog = pin.modes.contains(&Mode::Analog);
            match (analog, pin.analog_channel) {
                (true, None) => {
                    return Err(IoError::Config(format!(
                        "pin {idx} supports analog but has no analog_channel"
                    )));
                }
                (false, Some(ch)) => {
                    return Err(IoError::Config(format!(
                        "pin {idx} has analog_channel {ch} but does not support analog"
                    )));
                }
                (true, Some(ch)) => {
                    if !channels.insert(ch) {
                        return Err(IoError::Config(format!(
                            "Duplicate analog channel: {ch}"
                        )));
                    }
                }
                (false, None) => {}
            }
        }

        // Alias collisions and identifier resolution are checked by building
        // the tables.
        let pins = self.pin_names()?;
        self.port_names()?;
        let buses = self.bus_names()?;

        if let Some(led) = &self.default_led {
            pins.pin(led)
                .map_err(|e| IoError::Config(format!("default_led: {e}")))?;
        }
        for (idx, port) in self.serial_ports.iter().enumerate() {
            for pin in [&port.rx_pin, &port.tx_pin].into_iter().flatten() {
                pins.pin(pin)
                    .map_err(|e| IoError::Config(format!("serial port {idx}: {e}")))?;
            }
        }

        let mut devices = HashSet::new();
        for dev in &self.i2c_devices {
            if dev.address > MAX_I2C_ADDRESS {
                return Err(IoError::Config(format!(
                    "I2C address 0x{:X} out of range",
                    dev.address
                )));
            }
            buses
                .resolve_index(dev.bus)
                .map_err(|e| IoError::Config(format!("I2C device 0x{:02X}: {e}", dev.address)))?;
            if dev.memory.len() > crate::hal::consts::I2C_REGISTER_SPACE {
                return Err(IoError::Config(format!(
                    "I2C device 0x{:02X} memory exceeds register space",
                    dev.address
                )));
            }
            if !devices.insert((dev.bus, dev.address)) {
                return Err(IoError::Config(format!(
                    "Duplicate I2C device 0x{:02X} on bus {}",
                    dev.address, dev.bus
                )));
            }
        }

        Ok(())
    }

    /// Build the initial pin table.
    pub fn pin_table(&self) -> Vec<Pin> {
        self.pins
            .iter()
            .map(|p| {
                let modes = p.modes.iter().copied().collect::<ModeSet>();
                let mut pin = Pin::new(modes, p.analog_channel);
                pin.value = p.initial_value;
                pin
            })
            .collect()
    }

    /// Indices of pins that can be put into analog mode.
    pub fn analog_pins(&self) -> Vec<usize> {
        self.pins
            .iter()
            .enumerate()
            .filter(|(_, p)| p.modes.contains(&Mode::Analog))
            .map(|(idx, _)| idx)
            .collect()
    }

    /// Pin normalization table. Analog pins are also reachable as `A<channel>`
    /// unless that name is taken by an explicit alias.
    pub fn pin_names(&self) -> Result<NameTable, IoError> {
        let mut table = NameTable::new(IdentKind::Pin, self.pins.len());
        for (idx, pin) in self.pins.iter().enumerate() {
            for alias in &pin.aliases {
                table.alias(alias, idx)?;
            }
        }
        let explicit: HashSet<&str> = self
            .pins
            .iter()
            .flat_map(|p| p.aliases.iter().map(|a| a.trim()))
            .collect();
        for (idx, pin) in self.pins.iter().enumerate() {
            if let Some(ch) = pin.analog_channel {
                let name = format!("A{ch}");
                if !explicit.contains(name.as_str()) {
                    table.alias(&name, idx)?;
                }
            }
        }
        Ok(table)
    }

    /// Serial port normalization table.
    pub fn port_names(&self) -> Result<NameTable, IoError> {
        let mut table = NameTable::new(IdentKind::Port, self.serial_ports.len());
        for (idx, port) in self.serial_ports.iter().enumerate() {
            if let Some(name) = &port.name {
                table.alias(name, idx)?;
            }
        }
        Ok(table)
    }

    /// I2C bus normalization table. A board without declared buses has one.
    pub fn bus_names(&self) -> Result<NameTable, IoError> {
        let mut table = NameTable::new(IdentKind::Bus, self.i2c_buses.len().max(1));
        for (idx, bus) in self.i2c_buses.iter().enumerate() {
            if let Some(name) = &bus.name {
                table.alias(name, idx)?;
            }
        }
        Ok(table)
    }

    /// On-board LED reference.
    pub fn default_led(&self) -> PinId {
        self.default_led.clone().unwrap_or_else(|| {
            if DEFAULT_LED_PIN < self.pins.len() {
                PinId::Index(DEFAULT_LED_PIN)
            } else {
                PinId::Index(0)
            }
        })
    }

    /// Polling interval as `Duration`.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_micros(self.poll_interval_us as u64)
    }

    /// Largest value accepted by `pwm_write`.
    pub fn pwm_max(&self) -> u32 {
        (1u32 << self.pwm_resolution) - 1
    }

    /// Largest value produced by `analog_read`.
    pub fn analog_max(&self) -> u32 {
        (1u32 << self.analog_resolution) - 1
    }
}

// ─── Peripheral records ─────────────────────────────────────────────

/// I2C peripheral configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct I2cConfig {
    /// Device address.
    pub address: u16,
    /// Bus selector, `None` = default bus.
    pub bus: Option<BusId>,
    /// Controller port on multi-controller boards.
    pub port: Option<usize>,
    /// Minimum delay between transactions to this device.
    pub delay: Option<Duration>,
}

impl I2cConfig {
    /// Configuration for `address` on the default bus.
    pub fn new(address: u16) -> Self {
        Self {
            address,
            bus: None,
            port: None,
            delay: None,
        }
    }

    /// Select a bus.
    pub fn on_bus(mut self, bus: impl Into<BusId>) -> Self {
        self.bus = Some(bus.into());
        self
    }

    /// Set the inter-transaction delay.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

/// Serial port configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialConfig {
    /// Port to configure.
    pub port_id: PortId,
    /// Baud rate, `None` = driver default.
    pub baud: Option<u32>,
    /// RX pin override.
    pub rx_pin: Option<PinId>,
    /// TX pin override.
    pub tx_pin: Option<PinId>,
}

impl SerialConfig {
    /// Configuration for `port_id` with driver defaults.
    pub fn new(port_id: impl Into<PortId>) -> Self {
        Self {
            port_id: port_id.into(),
            baud: None,
            rx_pin: None,
            tx_pin: None,
        }
    }

    /// Set the baud rate.
    pub fn with_baud(mut self, baud: u32) -> Self {
        self.baud = Some(baud);
        self
    }

    /// Assign RX/TX pins.
    pub fn with_pins(mut self, rx: impl Into<PinId>, tx: impl Into<PinId>) -> Self {
        self.rx_pin = Some(rx.into());
        self.tx_pin = Some(tx.into());
        self
    }
}

/// Servo configuration: pulse width bounds in microseconds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServoConfig {
    /// Servo pin.
    pub pin: PinId,
    /// Pulse width at 0 degrees.
    pub min: Option<u16>,
    /// Pulse width at full travel.
    pub max: Option<u16>,
}

impl ServoConfig {
    /// Configuration with default bounds.
    pub fn new(pin: impl Into<PinId>) -> Self {
        Self {
            pin: pin.into(),
            min: None,
            max: None,
        }
    }

    /// Set both pulse bounds.
    pub fn with_range(mut self, min: u16, max: u16) -> Self {
        self.min = Some(min);
        self.max = Some(max);
        self
    }

    /// Effective `(min, max)` bounds.
    ///
    /// # Errors
    /// `InvalidValue` if `min >= max`.
    pub fn bounds(&self) -> Result<(u16, u16), IoError> {
        let min = self.min.unwrap_or(DEFAULT_SERVO_MIN_US);
        let max = self.max.unwrap_or(DEFAULT_SERVO_MAX_US);
        if min >= max {
            return Err(IoError::InvalidValue(format!(
                "servo pulse range [{min}, {max}] is empty"
            )));
        }
        Ok((min, max))
    }
}

/// Settings of a one-shot ping (time-of-flight) measurement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PingSettings {
    /// Trigger/echo pin.
    pub pin: PinId,
    /// Trigger level.
    pub value: Value,
    /// Trigger pulse length.
    pub pulse_out: Duration,
}

impl PingSettings {
    /// Default settings: high trigger, 5 µs pulse.
    pub fn new(pin: impl Into<PinId>) -> Self {
        Self {
            pin: pin.into(),
            value: Value::High,
            pulse_out: Duration::from_micros(DEFAULT_PING_PULSE_OUT_US),
        }
    }
}

/// Settings of a pulse-in measurement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PulseInSettings {
    /// Measured pin.
    pub pin: PinId,
    /// Level whose duration is measured.
    pub value: Value,
    /// Optional trigger pulse emitted before measuring.
    pub pulse_out: Option<Duration>,
    /// Give up after this long.
    pub timeout: Duration,
}

/// One-wire ROM address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct OneWireDevice(pub [u8; 8]);

impl TryFrom<&[u8]> for OneWireDevice {
    type Error = IoError;
    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        let rom: [u8; 8] = bytes.try_into().map_err(|_| {
            IoError::InvalidValue(format!(
                "one-wire address must be 8 bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(Self(rom))
    }
}

impl fmt::Display for OneWireDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.0 {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

/// Stepper driver wiring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepperKind {
    /// Step/direction driver board.
    Driver,
    /// Two-wire motor.
    TwoWire,
    /// Four-wire motor.
    FourWire,
}

/// Stepper configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepperConfig {
    /// Stepper device number.
    pub device: usize,
    /// Wiring.
    pub kind: StepperKind,
    /// Steps per revolution.
    pub steps_per_rev: u16,
    /// Pins in wiring order (dir/step or motor pins).
    pub pins: Vec<PinId>,
}

/// Stepper rotation direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepDirection {
    /// Counter-clockwise.
    Ccw,
    /// Clockwise.
    Cw,
}

/// One stepper move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepperStep {
    /// Rotation direction.
    pub direction: StepDirection,
    /// Number of steps.
    pub steps: u32,
    /// Speed in 0.01 rad/s.
    pub speed: u32,
    /// Acceleration in 0.01 rad/s².
    pub accel: u32,
    /// Deceleration in 0.01 rad/s².
    pub decel: u32,
}
