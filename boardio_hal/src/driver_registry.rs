//! Driver registry for IO drivers.
//!
//! `DriverRegistry` maps driver names to factory functions. It is built at
//! startup and handed to `IoCore`; there is no global registry.

use boardio_common::hal::driver::{DriverFactory, IoDriver, IoError};
use std::collections::BTreeMap;

use crate::drivers::register_all_drivers;

/// Registry of available IO drivers.
pub struct DriverRegistry {
    factories: BTreeMap<&'static str, DriverFactory>,
}

impl DriverRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// Registry holding every built-in driver.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        register_all_drivers(&mut registry);
        registry
    }

    /// Register a driver factory.
    ///
    /// # Panics
    /// Panics if a driver with the same name is already registered.
    pub fn register(&mut self, name: &'static str, factory: DriverFactory) {
        if self.factories.contains_key(name) {
            panic!("Driver '{name}' is already registered");
        }
        self.factories.insert(name, factory);
    }

    /// Get a driver factory by name.
    pub fn get_factory(&self, name: &str) -> Option<DriverFactory> {
        self.factories.get(name).copied()
    }

    /// Create a driver instance by name.
    ///
    /// # Errors
    /// Returns `IoError::DriverNotFound` if no driver with the given name is registered.
    pub fn create_driver(&self, name: &str) -> Result<Box<dyn IoDriver>, IoError> {
        let factory = self
            .get_factory(name)
            .ok_or_else(|| IoError::DriverNotFound(name.to_string()))?;
        Ok(factory())
    }

    /// Registered driver names, sorted.
    pub fn list_drivers(&self) -> Vec<&'static str> {
        self.factories.keys().copied().collect()
    }
}

impl Default for DriverRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use boardio_common::hal::config::{
        BoardConfig, I2cConfig, PingSettings, SerialConfig, ServoConfig,
    };
    use boardio_common::hal::driver::{I2cRead, I2cWrite};
    use boardio_common::hal::events::EventBus;
    use boardio_common::hal::ident::{PinId, PortId};
    use boardio_common::hal::types::{
        AnalogHandler, BytesHandler, DigitalHandler, DurationHandler, Mode, Pin, SubscriptionId,
        Value,
    };
    use std::time::Duration;

    /// Driver that accepts nothing; exercises the trait defaults.
    struct TestDriver {
        events: EventBus,
    }

    impl IoDriver for TestDriver {
        fn name(&self) -> &str {
            "test"
        }

        fn version(&self) -> &'static str {
            "0.1.0"
        }

        fn pins(&self) -> &[Pin] {
            &[]
        }

        fn analog_pins(&self) -> &[usize] {
            &[]
        }

        fn default_led(&self) -> PinId {
            PinId::Index(0)
        }

        fn events(&self) -> &EventBus {
            &self.events
        }

        fn init(&mut self, _config: &BoardConfig) -> Result<(), IoError> {
            self.events.mark_ready("test");
            Ok(())
        }

        fn cycle(&mut self, _dt: Duration) {}

        fn shutdown(&mut self) -> Result<(), IoError> {
            Ok(())
        }

        fn normalize(&self, pin: &PinId) -> Result<usize, IoError> {
            Err(IoError::UnknownPin(pin.to_string()))
        }

        fn normalize_port(&self, port: &PortId) -> Result<usize, IoError> {
            Err(IoError::UnknownPort(port.to_string()))
        }

        fn pin_mode(&mut self, pin: &PinId, _mode: Mode) -> Result<(), IoError> {
            self.normalize(pin).map(|_| ())
        }

        fn digital_write(&mut self, pin: &PinId, _value: Value) -> Result<(), IoError> {
            self.normalize(pin).map(|_| ())
        }

        fn pwm_write(&mut self, pin: &PinId, _value: u32) -> Result<(), IoError> {
            self.normalize(pin).map(|_| ())
        }

        fn servo_write(&mut self, pin: &PinId, _value: u32) -> Result<(), IoError> {
            self.normalize(pin).map(|_| ())
        }

        fn servo_config(&mut self, config: ServoConfig) -> Result<(), IoError> {
            self.normalize(&config.pin).map(|_| ())
        }

        fn analog_read(
            &mut self,
            pin: &PinId,
            _h: AnalogHandler,
        ) -> Result<SubscriptionId, IoError> {
            self.normalize(pin).map(|_| SubscriptionId(0))
        }

        fn digital_read(
            &mut self,
            pin: &PinId,
            _h: DigitalHandler,
        ) -> Result<SubscriptionId, IoError> {
            self.normalize(pin).map(|_| SubscriptionId(0))
        }

        fn ping_read(
            &mut self,
            s: PingSettings,
            _h: DurationHandler,
        ) -> Result<SubscriptionId, IoError> {
            self.normalize(&s.pin).map(|_| SubscriptionId(0))
        }

        fn i2c_config(&mut self, _config: I2cConfig) -> Result<(), IoError> {
            Ok(())
        }

        fn i2c_write(&mut self, _request: I2cWrite) -> Result<(), IoError> {
            Ok(())
        }

        fn i2c_write_reg(&mut self, _a: u16, _r: u8, _v: u8) -> Result<(), IoError> {
            Ok(())
        }

        fn i2c_read(
            &mut self,
            _r: I2cRead,
            _h: BytesHandler,
        ) -> Result<SubscriptionId, IoError> {
            Ok(SubscriptionId(1))
        }

        fn i2c_read_once(
            &mut self,
            _r: I2cRead,
            _h: BytesHandler,
        ) -> Result<SubscriptionId, IoError> {
            Ok(SubscriptionId(2))
        }

        fn serial_config(&mut self, config: SerialConfig) -> Result<(), IoError> {
            self.normalize_port(&config.port_id).map(|_| ())
        }

        fn serial_write(&mut self, port: &PortId, _bytes: &[u8]) -> Result<(), IoError> {
            self.normalize_port(port).map(|_| ())
        }

        fn serial_read(
            &mut self,
            port: &PortId,
            _max: Option<usize>,
            _h: BytesHandler,
        ) -> Result<SubscriptionId, IoError> {
            self.normalize_port(port).map(|_| SubscriptionId(0))
        }

        fn serial_stop(&mut self, port: &PortId) -> Result<(), IoError> {
            self.normalize_port(port).map(|_| ())
        }

        fn serial_close(&mut self, port: &PortId) -> Result<(), IoError> {
            self.normalize_port(port).map(|_| ())
        }

        fn serial_flush(&mut self, port: &PortId) -> Result<(), IoError> {
            self.normalize_port(port).map(|_| ())
        }
    }

    fn create_test_driver() -> Box<dyn IoDriver> {
        Box::new(TestDriver {
            events: EventBus::new(),
        })
    }

    #[test]
    fn registry_register_and_create() {
        let mut reg = DriverRegistry::new();
        reg.register("test_driver", create_test_driver);

        let driver = reg.create_driver("test_driver").expect("should create");
        assert_eq!(driver.name(), "test");
    }

    #[test]
    fn registry_driver_not_found() {
        let reg = DriverRegistry::new();
        let result = reg.create_driver("nonexistent");
        assert!(matches!(result, Err(IoError::DriverNotFound(_))));
    }

    #[test]
    fn registry_list_drivers() {
        let mut reg = DriverRegistry::new();
        reg.register("beta", create_test_driver);
        reg.register("alpha", create_test_driver);
        assert_eq!(reg.list_drivers(), vec!["alpha", "beta"]);
    }

    #[test]
    fn registry_builtin_has_simulation() {
        let reg = DriverRegistry::with_builtin();
        assert!(reg.list_drivers().contains(&"simulation"));
    }

    #[test]
    #[should_panic(expected = "already registered")]
    fn registry_duplicate_panics() {
        let mut reg = DriverRegistry::new();
        reg.register("dup", create_test_driver);
        reg.register("dup", create_test_driver);
    }

    #[test]
    fn default_aliases_forward_to_canonical() {
        let mut drv = create_test_driver();
        let id = drv
            .send_i2c_read_request(I2cRead::new(0x10, 1), Box::new(|_| {}))
            .unwrap();
        assert_eq!(id, SubscriptionId(2));
        assert!(matches!(
            drv.analog_write(&PinId::Index(3), 10),
            Err(IoError::UnknownPin(_))
        ));
    }

    #[test]
    fn default_extensions_are_unsupported() {
        let mut drv = create_test_driver();
        match drv.reset() {
            Err(IoError::UnsupportedOperation { operation, driver }) => {
                assert_eq!(operation, "reset");
                assert_eq!(driver, "test");
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert!(matches!(
            drv.cancel_read(SubscriptionId(1)),
            Err(IoError::UnsupportedOperation { .. })
        ));
        assert!(matches!(
            drv.one_wire_reset(&PinId::Index(2)),
            Err(IoError::UnsupportedOperation { .. })
        ));
    }

    #[test]
    fn default_readiness_follows_event_bus() {
        let mut drv = create_test_driver();
        assert!(!drv.is_ready());
        let cfg: BoardConfig =
            toml::from_str("name = \"t\"\n[[pins]]\nmodes = [\"input\"]\n").unwrap();
        drv.init(&cfg).unwrap();
        assert!(drv.is_ready());
    }
}
