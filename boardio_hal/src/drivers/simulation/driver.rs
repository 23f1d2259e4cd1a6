//! Simulation driver implementation.
//!
//! The `SimulationDriver` implements the `IoDriver` contract against a
//! board description, emulating pins, I2C devices and serial ports in
//! software for development and testing without physical hardware.

use super::i2c::{I2cBank, SimDevice};
use super::pins::PinBank;
use super::serial::SerialBank;
use boardio_common::hal::config::{BoardConfig, I2cConfig, PingSettings, SerialConfig, ServoConfig};
use boardio_common::hal::driver::{I2cRead, I2cWrite, IoDriver, IoError};
use boardio_common::hal::events::EventBus;
use boardio_common::hal::ident::{PinId, PortId};
use boardio_common::hal::types::{
    AnalogHandler, BytesHandler, DigitalHandler, DurationHandler, Mode, Pin, SubscriptionId,
    Value,
};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Peripheral state built at `init()`.
struct Board {
    pins: PinBank,
    i2c: I2cBank,
    serial: SerialBank,
}

impl Board {
    fn subscription_count(&self) -> usize {
        self.pins.subscription_count()
            + self.i2c.subscription_count()
            + self.serial.subscription_count()
    }
}

/// Simulation driver implementing the IoDriver trait.
pub struct SimulationDriver {
    /// Driver name
    name: &'static str,
    /// Driver version
    version: &'static str,
    /// Event channel
    events: EventBus,
    /// Simulated board, `None` before init and after shutdown
    board: Option<Board>,
    /// On-board LED
    default_led: PinId,
    /// Last issued subscription id
    last_subscription: u64,
}

impl SimulationDriver {
    /// Create a new simulation driver instance.
    pub fn new() -> Self {
        Self {
            name: "simulation",
            version: env!("CARGO_PKG_VERSION"),
            events: EventBus::new(),
            board: None,
            default_led: PinId::Index(0),
            last_subscription: 0,
        }
    }

    fn board(&self) -> Result<&Board, IoError> {
        self.board
            .as_ref()
            .ok_or_else(|| IoError::NotReady(self.name.to_string()))
    }

    fn board_mut(&mut self) -> Result<&mut Board, IoError> {
        self.board
            .as_mut()
            .ok_or_else(|| IoError::NotReady(self.name.to_string()))
    }

    fn next_subscription(&mut self) -> SubscriptionId {
        self.last_subscription += 1;
        SubscriptionId(self.last_subscription)
    }

    fn resolve_pin(&self, pin: &PinId) -> Result<usize, IoError> {
        self.board()?.pins.normalize(pin)
    }

    fn resolve_port(&self, port: &PortId) -> Result<usize, IoError> {
        self.board()?.serial.normalize(port)
    }

    // ── Simulation controls ─────────

    /// Drive the level an input pin sees from outside the board.
    pub fn set_input(&mut self, pin: &PinId, level: u32) -> Result<(), IoError> {
        let idx = self.resolve_pin(pin)?;
        self.board_mut()?.pins.set_input(idx, level);
        Ok(())
    }

    /// Set (or clear with `None`) the echo time a ping on `pin` measures.
    pub fn set_echo(&mut self, pin: &PinId, echo: Option<Duration>) -> Result<(), IoError> {
        let idx = self.resolve_pin(pin)?;
        self.board_mut()?.pins.set_echo(idx, echo);
        Ok(())
    }

    /// Feed bytes into a serial port's receive buffer.
    pub fn inject_serial(&mut self, port: &PortId, bytes: &[u8]) -> Result<(), IoError> {
        let idx = self.resolve_port(port)?;
        self.board_mut()?.serial.inject(idx, bytes);
        Ok(())
    }

    /// Bytes transmitted on a serial port since its last flush.
    pub fn serial_output(&self, port: &PortId) -> Result<Vec<u8>, IoError> {
        let idx = self.resolve_port(port)?;
        Ok(self.board()?.serial.transmitted(idx).to_vec())
    }

    /// Attach (or replace) an I2C device.
    pub fn attach_i2c_device(
        &mut self,
        bus: usize,
        address: u16,
        memory: &[u8],
    ) -> Result<(), IoError> {
        self.board_mut()?.i2c.attach(bus, address, memory)
    }

    /// Simulated I2C device at `address` on `bus`.
    pub fn i2c_device(&self, bus: usize, address: u16) -> Option<&SimDevice> {
        self.board.as_ref()?.i2c.device(bus, address)
    }

    /// Number of live read subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.board.as_ref().map_or(0, Board::subscription_count)
    }

    /// Servo pulse width, in microseconds, for the pin's current position.
    pub fn servo_pulse_width(&self, pin: &PinId) -> Result<u32, IoError> {
        let idx = self.resolve_pin(pin)?;
        let pins = &self.board()?.pins;
        pins.pins()[idx].require(idx, Mode::Servo)?;
        Ok(pins.pulse_width(idx, pins.pins()[idx].value))
    }
}

impl Default for SimulationDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl IoDriver for SimulationDriver {
    fn name(&self) -> &str {
        self.name
    }

    fn version(&self) -> &'static str {
        self.version
    }

    fn pins(&self) -> &[Pin] {
        match &self.board {
            Some(board) => board.pins.pins(),
            None => &[],
        }
    }

    fn analog_pins(&self) -> &[usize] {
        match &self.board {
            Some(board) => board.pins.analog_pins(),
            None => &[],
        }
    }

    fn default_led(&self) -> PinId {
        self.default_led.clone()
    }

    fn events(&self) -> &EventBus {
        &self.events
    }

    fn is_ready(&self) -> bool {
        self.board.is_some() && self.events.is_ready()
    }

    fn init(&mut self, config: &BoardConfig) -> Result<(), IoError> {
        config.validate()?;
        if self.board.is_some() {
            warn!("Simulation driver re-initialized, previous state discarded");
        }

        let board = Board {
            pins: PinBank::from_config(config)?,
            i2c: I2cBank::from_config(self.name, config)?,
            serial: SerialBank::from_config(config)?,
        };
        info!(
            "Initializing simulation driver for '{}': {} pins ({} analog), \
             {} serial ports, {} I2C devices",
            config.name,
            config.pins.len(),
            board.pins.analog_pins().len(),
            config.serial_ports.len(),
            config.i2c_devices.len()
        );

        self.default_led = config.default_led();
        self.board = Some(board);
        self.events.mark_ready(self.name);
        Ok(())
    }

    fn cycle(&mut self, dt: Duration) {
        let Some(board) = self.board.as_mut() else {
            return;
        };

        let mut errors = Vec::new();
        board.i2c.flush_writes(&mut errors);
        board.pins.poll();
        board.i2c.poll(dt, &mut errors);
        board.serial.poll();

        for err in errors {
            self.events.error(err);
        }
    }

    fn shutdown(&mut self) -> Result<(), IoError> {
        info!("Shutting down simulation driver");
        if let Some(mut board) = self.board.take() {
            debug!("Dropping {} subscription(s)", board.subscription_count());
            board.pins.clear();
            board.i2c.clear();
            board.serial.clear();
        }
        Ok(())
    }

    fn normalize(&self, pin: &PinId) -> Result<usize, IoError> {
        self.resolve_pin(pin)
    }

    fn normalize_port(&self, port: &PortId) -> Result<usize, IoError> {
        self.resolve_port(port)
    }

    fn pin_mode(&mut self, pin: &PinId, mode: Mode) -> Result<(), IoError> {
        let idx = self.resolve_pin(pin)?;
        self.board_mut()?.pins.set_mode(idx, mode)
    }

    fn digital_write(&mut self, pin: &PinId, value: Value) -> Result<(), IoError> {
        let idx = self.resolve_pin(pin)?;
        self.board_mut()?.pins.digital_write(idx, value)
    }

    fn pwm_write(&mut self, pin: &PinId, value: u32) -> Result<(), IoError> {
        let idx = self.resolve_pin(pin)?;
        self.board_mut()?.pins.pwm_write(idx, value)
    }

    fn servo_write(&mut self, pin: &PinId, value: u32) -> Result<(), IoError> {
        let idx = self.resolve_pin(pin)?;
        self.board_mut()?.pins.servo_write(idx, value)
    }

    fn servo_config(&mut self, config: ServoConfig) -> Result<(), IoError> {
        let idx = self.resolve_pin(&config.pin)?;
        let bounds = config.bounds()?;
        self.board_mut()?.pins.servo_config(idx, bounds)
    }

    fn analog_read(
        &mut self,
        pin: &PinId,
        handler: AnalogHandler,
    ) -> Result<SubscriptionId, IoError> {
        let idx = self.resolve_pin(pin)?;
        let id = self.next_subscription();
        self.board_mut()?.pins.watch_analog(id, idx, handler)?;
        Ok(id)
    }

    fn digital_read(
        &mut self,
        pin: &PinId,
        handler: DigitalHandler,
    ) -> Result<SubscriptionId, IoError> {
        let idx = self.resolve_pin(pin)?;
        let id = self.next_subscription();
        self.board_mut()?.pins.watch_digital(id, idx, handler)?;
        Ok(id)
    }

    fn ping_read(
        &mut self,
        settings: PingSettings,
        handler: DurationHandler,
    ) -> Result<SubscriptionId, IoError> {
        let idx = self.resolve_pin(&settings.pin)?;
        let id = self.next_subscription();
        debug!(
            "ping trigger {} for {:?} on pin {}",
            settings.value, settings.pulse_out, idx
        );
        self.board_mut()?.pins.ping(id, idx, handler)?;
        Ok(id)
    }

    fn i2c_config(&mut self, config: I2cConfig) -> Result<(), IoError> {
        self.board_mut()?.i2c.configure(&config)
    }

    fn i2c_write(&mut self, request: I2cWrite) -> Result<(), IoError> {
        self.board_mut()?.i2c.write(request)
    }

    fn i2c_write_reg(&mut self, address: u16, register: u8, value: u8) -> Result<(), IoError> {
        self.i2c_write(I2cWrite::to_register(address, register, [value]))
    }

    fn i2c_read(
        &mut self,
        request: I2cRead,
        handler: BytesHandler,
    ) -> Result<SubscriptionId, IoError> {
        let id = self.next_subscription();
        self.board_mut()?.i2c.read(id, request, false, handler)?;
        Ok(id)
    }

    fn i2c_read_once(
        &mut self,
        request: I2cRead,
        handler: BytesHandler,
    ) -> Result<SubscriptionId, IoError> {
        let id = self.next_subscription();
        self.board_mut()?.i2c.read(id, request, true, handler)?;
        Ok(id)
    }

    fn serial_config(&mut self, config: SerialConfig) -> Result<(), IoError> {
        let port = self.resolve_port(&config.port_id)?;
        for pin in [&config.rx_pin, &config.tx_pin].into_iter().flatten() {
            let idx = self.resolve_pin(pin)?;
            debug!("serial {} uses pin {}", port, idx);
        }
        self.board_mut()?.serial.configure(port, config.baud)
    }

    fn serial_write(&mut self, port: &PortId, bytes: &[u8]) -> Result<(), IoError> {
        let idx = self.resolve_port(port)?;
        self.board_mut()?.serial.write(idx, bytes);
        Ok(())
    }

    fn serial_read(
        &mut self,
        port: &PortId,
        max_bytes: Option<usize>,
        handler: BytesHandler,
    ) -> Result<SubscriptionId, IoError> {
        let idx = self.resolve_port(port)?;
        if max_bytes == Some(0) {
            return Err(IoError::InvalidValue(
                "max bytes to read must be positive".to_string(),
            ));
        }
        let id = self.next_subscription();
        self.board_mut()?.serial.read(idx, id, max_bytes, handler);
        Ok(id)
    }

    fn serial_stop(&mut self, port: &PortId) -> Result<(), IoError> {
        let idx = self.resolve_port(port)?;
        self.board_mut()?.serial.stop(idx);
        Ok(())
    }

    fn serial_close(&mut self, port: &PortId) -> Result<(), IoError> {
        let idx = self.resolve_port(port)?;
        self.board_mut()?.serial.close(idx);
        Ok(())
    }

    fn serial_flush(&mut self, port: &PortId) -> Result<(), IoError> {
        let idx = self.resolve_port(port)?;
        self.board_mut()?.serial.flush(idx);
        Ok(())
    }

    fn cancel_read(&mut self, id: SubscriptionId) -> Result<(), IoError> {
        let board = self.board_mut()?;
        if board.pins.cancel(id) || board.i2c.cancel(id) || board.serial.cancel(id) {
            debug!("{} cancelled", id);
        } else {
            debug!("{} not active, nothing to cancel", id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn board() -> BoardConfig {
        toml::from_str(
            r#"
name = "unit"

[[pins]]
modes = ["input", "output"]
aliases = ["LED"]
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_not_ready_before_init() {
        let mut drv = SimulationDriver::new();
        assert!(!drv.is_ready());
        assert!(drv.pins().is_empty());
        assert!(matches!(
            drv.pin_mode(&PinId::Index(0), Mode::Output),
            Err(IoError::NotReady(_))
        ));
    }

    #[test]
    fn test_init_and_shutdown() {
        let mut drv = SimulationDriver::new();
        drv.init(&board()).unwrap();
        assert!(drv.is_ready());
        assert_eq!(drv.pins().len(), 1);
        assert_eq!(drv.default_led(), PinId::Index(0));
        drv.shutdown().unwrap();
        assert!(!drv.is_ready());
        assert!(drv.pins().is_empty());
    }

    #[test]
    fn test_invalid_board_rejected() {
        let mut drv = SimulationDriver::new();
        let mut cfg = board();
        cfg.pins.clear();
        assert!(matches!(drv.init(&cfg), Err(IoError::Config(_))));
        assert!(!drv.is_ready());
    }

    #[test]
    fn test_subscription_ids_are_unique() {
        let mut drv = SimulationDriver::new();
        drv.init(&board()).unwrap();
        drv.pin_mode(&"LED".into(), Mode::Input).unwrap();
        let a = drv.digital_read(&"LED".into(), Box::new(|_| {})).unwrap();
        let b = drv.digital_read(&0.into(), Box::new(|_| {})).unwrap();
        assert_ne!(a, b);
        assert_eq!(drv.subscription_count(), 2);
    }
}
