//! Simulated I2C buses.
//!
//! Devices are register files with an auto-incrementing pointer: the first
//! byte of a write frame sets the pointer, following bytes are stored at
//! consecutive registers. Writes are queued and reach the devices at the
//! start of the next cycle, in the order they were issued.

use boardio_common::hal::config::{BoardConfig, I2cConfig};
use boardio_common::hal::consts::{I2C_REGISTER_SPACE, MAX_I2C_ADDRESS, MAX_I2C_READ};
use boardio_common::hal::driver::{I2cRead, I2cWrite, IoError};
use boardio_common::hal::ident::NameTable;
use boardio_common::hal::types::{BytesHandler, SubscriptionId};
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tracing::{debug, trace};

/// Register file of one simulated device.
#[derive(Debug, Clone)]
pub struct SimDevice {
    memory: Vec<u8>,
    pointer: u8,
    writes: Vec<Vec<u8>>,
}

impl SimDevice {
    /// Device whose registers start with `initial`, the rest zeroed.
    pub fn new(initial: &[u8]) -> Self {
        let mut memory = vec![0; I2C_REGISTER_SPACE];
        let len = initial.len().min(I2C_REGISTER_SPACE);
        memory[..len].copy_from_slice(&initial[..len]);
        Self {
            memory,
            pointer: 0,
            writes: Vec::new(),
        }
    }

    fn write(&mut self, frame: &[u8]) {
        if let Some((&register, data)) = frame.split_first() {
            self.pointer = register;
            for &byte in data {
                self.memory[self.pointer as usize] = byte;
                self.pointer = self.pointer.wrapping_add(1);
            }
        }
        self.writes.push(frame.to_vec());
    }

    fn read(&mut self, register: Option<u8>, len: usize) -> Vec<u8> {
        if let Some(register) = register {
            self.pointer = register;
        }
        (0..len)
            .map(|_| {
                let byte = self.memory[self.pointer as usize];
                self.pointer = self.pointer.wrapping_add(1);
                byte
            })
            .collect()
    }

    /// Register contents.
    pub fn memory(&self) -> &[u8] {
        &self.memory
    }

    /// Write frames in arrival order.
    pub fn writes(&self) -> &[Vec<u8>] {
        &self.writes
    }
}

fn missing(driver: &str, bus: usize, address: u16) -> IoError {
    IoError::Transport {
        driver: driver.to_string(),
        detail: format!("no device at 0x{address:02X} on bus {bus}"),
    }
}

#[derive(Debug, Clone, Copy)]
struct Peripheral {
    bus: usize,
    delay: Duration,
}

struct I2cSubscription {
    id: SubscriptionId,
    request: I2cRead,
    once: bool,
    handler: BytesHandler,
    wait: Duration,
}

/// All I2C buses of the simulated board.
pub struct I2cBank {
    driver: String,
    buses: NameTable,
    devices: HashMap<(usize, u16), SimDevice>,
    peripherals: HashMap<u16, Peripheral>,
    pending: VecDeque<(Peripheral, I2cWrite)>,
    subscriptions: Vec<I2cSubscription>,
}

impl I2cBank {
    pub fn from_config(driver: &str, config: &BoardConfig) -> Result<Self, IoError> {
        let devices = config
            .i2c_devices
            .iter()
            .map(|d| ((d.bus, d.address), SimDevice::new(&d.memory)))
            .collect();
        Ok(Self {
            driver: driver.to_string(),
            buses: config.bus_names()?,
            devices,
            peripherals: HashMap::new(),
            pending: VecDeque::new(),
            subscriptions: Vec::new(),
        })
    }

    fn check_address(address: u16) -> Result<(), IoError> {
        if address > MAX_I2C_ADDRESS {
            return Err(IoError::InvalidValue(format!(
                "I2C address 0x{address:X} out of range"
            )));
        }
        Ok(())
    }

    /// Configure a peripheral. Replaces any previous configuration.
    pub fn configure(&mut self, config: &I2cConfig) -> Result<(), IoError> {
        Self::check_address(config.address)?;
        let bus = match &config.bus {
            Some(bus) => self.buses.bus(bus)?,
            None => 0,
        };
        if let Some(port) = config.port {
            debug!("i2c 0x{:02X}: controller port {} ignored", config.address, port);
        }
        let delay = config.delay.unwrap_or_default();
        self.peripherals
            .insert(config.address, Peripheral { bus, delay });
        debug!("i2c 0x{:02X} on bus {} (delay {:?})", config.address, bus, delay);
        Ok(())
    }

    /// Peripheral for `address`, configured on the default bus if unknown.
    fn peripheral(&mut self, address: u16) -> Result<Peripheral, IoError> {
        Self::check_address(address)?;
        Ok(*self.peripherals.entry(address).or_insert_with(|| {
            debug!("i2c 0x{:02X} used before configuration, defaulting to bus 0", address);
            Peripheral {
                bus: 0,
                delay: Duration::ZERO,
            }
        }))
    }

    /// Queue a write for the bus the peripheral is configured on now.
    pub fn write(&mut self, request: I2cWrite) -> Result<(), IoError> {
        let peripheral = self.peripheral(request.address)?;
        trace!("i2c 0x{:02X} queued {} byte(s)", request.address, request.bytes.len());
        self.pending.push_back((peripheral, request));
        Ok(())
    }

    pub fn read(
        &mut self,
        id: SubscriptionId,
        request: I2cRead,
        once: bool,
        handler: BytesHandler,
    ) -> Result<(), IoError> {
        Self::check_address(request.address)?;
        if !(1..=MAX_I2C_READ).contains(&request.bytes_to_read) {
            return Err(IoError::InvalidValue(format!(
                "bytes to read {} outside 1..={}",
                request.bytes_to_read, MAX_I2C_READ
            )));
        }
        self.peripheral(request.address)?;
        self.subscriptions.push(I2cSubscription {
            id,
            request,
            once,
            handler,
            wait: Duration::ZERO,
        });
        debug!(
            "{} i2c {} 0x{:02X} ({} byte(s))",
            id,
            if once { "read once" } else { "read" },
            request.address,
            request.bytes_to_read
        );
        Ok(())
    }

    /// Deliver queued writes to their devices.
    pub fn flush_writes(&mut self, errors: &mut Vec<IoError>) {
        while let Some((Peripheral { bus, .. }, request)) = self.pending.pop_front() {
            match self.devices.get_mut(&(bus, request.address)) {
                Some(device) => device.write(&request.frame()),
                None => errors.push(missing(&self.driver, bus, request.address)),
            }
        }
    }

    /// Serve read subscriptions. One-shot reads end after this cycle,
    /// whether or not the device answered.
    pub fn poll(&mut self, dt: Duration, errors: &mut Vec<IoError>) {
        let peripherals = &self.peripherals;
        let devices = &mut self.devices;
        let driver = &self.driver;
        self.subscriptions.retain_mut(|sub| {
            let address = sub.request.address;
            let peripheral = peripherals.get(&address).copied().unwrap_or(Peripheral {
                bus: 0,
                delay: Duration::ZERO,
            });
            if sub.wait > dt {
                sub.wait -= dt;
                return true;
            }
            sub.wait = peripheral.delay;
            match devices.get_mut(&(peripheral.bus, address)) {
                Some(device) => {
                    let data = device.read(sub.request.register, sub.request.bytes_to_read);
                    (sub.handler)(&data);
                }
                None => errors.push(missing(driver, peripheral.bus, address)),
            }
            if sub.once {
                debug!("{} i2c read once complete", sub.id);
            }
            !sub.once
        });
    }

    pub fn attach(&mut self, bus: usize, address: u16, memory: &[u8]) -> Result<(), IoError> {
        Self::check_address(address)?;
        let bus = self.buses.resolve_index(bus)?;
        self.devices.insert((bus, address), SimDevice::new(memory));
        Ok(())
    }

    pub fn device(&self, bus: usize, address: u16) -> Option<&SimDevice> {
        self.devices.get(&(bus, address))
    }

    pub fn cancel(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscriptions.len();
        self.subscriptions.retain(|s| s.id != id);
        before != self.subscriptions.len()
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn clear(&mut self) {
        self.subscriptions.clear();
        self.pending.clear();
    }
}
