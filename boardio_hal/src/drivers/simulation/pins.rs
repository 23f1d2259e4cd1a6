//! Simulated pin table.
//!
//! `PinBank` owns the pin table, the external levels seen by inputs and
//! the pin-level read subscriptions (analog, digital, ping).

use boardio_common::hal::config::BoardConfig;
use boardio_common::hal::consts::SERVO_MAX_DEGREES;
use boardio_common::hal::driver::IoError;
use boardio_common::hal::ident::{NameTable, PinId};
use boardio_common::hal::types::{
    AnalogHandler, DigitalHandler, DurationHandler, Mode, Pin, SubscriptionId, Value,
};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, trace};

enum Watch {
    Analog(AnalogHandler),
    Digital {
        handler: DigitalHandler,
        last: Option<Value>,
    },
}

struct PinSubscription {
    id: SubscriptionId,
    pin: usize,
    watch: Watch,
}

struct PendingPing {
    id: SubscriptionId,
    pin: usize,
    handler: DurationHandler,
}

/// Pin table of the simulated board.
pub struct PinBank {
    pins: Vec<Pin>,
    names: NameTable,
    analog_pins: Vec<usize>,
    pwm_max: u32,
    analog_max: u32,
    /// Level applied to each pin from outside the board.
    external: Vec<u32>,
    servo_bounds: HashMap<usize, (u16, u16)>,
    echoes: HashMap<usize, Duration>,
    subscriptions: Vec<PinSubscription>,
    pings: Vec<PendingPing>,
}

impl PinBank {
    /// Build from a validated board description.
    pub fn from_config(config: &BoardConfig) -> Result<Self, IoError> {
        let pins = config.pin_table();
        let external = pins.iter().map(|p| p.value).collect();
        let echoes = config
            .pins
            .iter()
            .enumerate()
            .filter_map(|(idx, p)| p.echo_us.map(|us| (idx, Duration::from_micros(us))))
            .collect();
        Ok(Self {
            pins,
            names: config.pin_names()?,
            analog_pins: config.analog_pins(),
            pwm_max: config.pwm_max(),
            analog_max: config.analog_max(),
            external,
            servo_bounds: HashMap::new(),
            echoes,
            subscriptions: Vec::new(),
            pings: Vec::new(),
        })
    }

    pub fn pins(&self) -> &[Pin] {
        &self.pins
    }

    pub fn analog_pins(&self) -> &[usize] {
        &self.analog_pins
    }

    pub fn normalize(&self, pin: &PinId) -> Result<usize, IoError> {
        self.names.pin(pin)
    }

    /// Put `pin` into `mode`. Subscriptions that relied on the old mode end.
    pub fn set_mode(&mut self, pin: usize, mode: Mode) -> Result<(), IoError> {
        let previous = self.pins[pin].mode;
        if !self.pins[pin].set_mode(pin, mode)? {
            trace!("pin {} already in {}", pin, mode);
            return Ok(());
        }
        if previous.is_reporting() {
            let before = self.subscriptions.len();
            self.subscriptions.retain(|s| s.pin != pin);
            let dropped = before - self.subscriptions.len();
            if dropped > 0 {
                debug!("pin {}: {} -> {}, dropped {} read(s)", pin, previous, mode, dropped);
            }
        }
        debug!("pin {}: {} -> {}", pin, previous, mode);
        Ok(())
    }

    pub fn digital_write(&mut self, pin: usize, value: Value) -> Result<(), IoError> {
        self.pins[pin].require(pin, Mode::Output)?;
        self.pins[pin].value = value.into();
        trace!("pin {} <- {}", pin, value);
        Ok(())
    }

    pub fn pwm_write(&mut self, pin: usize, value: u32) -> Result<(), IoError> {
        self.pins[pin].require(pin, Mode::Pwm)?;
        if value > self.pwm_max {
            return Err(IoError::InvalidValue(format!(
                "pwm value {value} exceeds {} on pin {pin}",
                self.pwm_max
            )));
        }
        self.pins[pin].value = value;
        trace!("pin {} pwm <- {}", pin, value);
        Ok(())
    }

    pub fn servo_write(&mut self, pin: usize, degrees: u32) -> Result<(), IoError> {
        self.pins[pin].require(pin, Mode::Servo)?;
        if degrees > SERVO_MAX_DEGREES {
            return Err(IoError::InvalidValue(format!(
                "servo angle {degrees} exceeds {SERVO_MAX_DEGREES} on pin {pin}"
            )));
        }
        self.pins[pin].value = degrees;
        trace!("pin {} servo <- {}deg ({}us)", pin, degrees, self.pulse_width(pin, degrees));
        Ok(())
    }

    /// Store pulse bounds. Does not change the pin's mode.
    pub fn servo_config(&mut self, pin: usize, bounds: (u16, u16)) -> Result<(), IoError> {
        if !self.pins[pin].supports(Mode::Servo) {
            return Err(IoError::UnsupportedMode {
                pin,
                mode: Mode::Servo,
            });
        }
        self.servo_bounds.insert(pin, bounds);
        debug!("pin {} servo range {}..{}us", pin, bounds.0, bounds.1);
        Ok(())
    }

    /// Pulse width for `degrees` under the pin's configured bounds.
    pub fn pulse_width(&self, pin: usize, degrees: u32) -> u32 {
        let (min, max) = self.servo_bounds.get(&pin).copied().unwrap_or((
            boardio_common::hal::consts::DEFAULT_SERVO_MIN_US,
            boardio_common::hal::consts::DEFAULT_SERVO_MAX_US,
        ));
        let span = u32::from(max - min);
        u32::from(min) + span * degrees.min(SERVO_MAX_DEGREES) / SERVO_MAX_DEGREES
    }

    pub fn watch_analog(
        &mut self,
        id: SubscriptionId,
        pin: usize,
        handler: AnalogHandler,
    ) -> Result<(), IoError> {
        self.pins[pin].require(pin, Mode::Analog)?;
        self.pins[pin].reporting = true;
        self.subscriptions.push(PinSubscription {
            id,
            pin,
            watch: Watch::Analog(handler),
        });
        debug!("{} analog read on pin {}", id, pin);
        Ok(())
    }

    pub fn watch_digital(
        &mut self,
        id: SubscriptionId,
        pin: usize,
        handler: DigitalHandler,
    ) -> Result<(), IoError> {
        self.pins[pin].require(pin, Mode::Input)?;
        self.pins[pin].reporting = true;
        self.subscriptions.push(PinSubscription {
            id,
            pin,
            watch: Watch::Digital {
                handler,
                last: None,
            },
        });
        debug!("{} digital read on pin {}", id, pin);
        Ok(())
    }

    /// Queue a ping on a pin able to both trigger and listen.
    pub fn ping(
        &mut self,
        id: SubscriptionId,
        pin: usize,
        handler: DurationHandler,
    ) -> Result<(), IoError> {
        for mode in [Mode::Output, Mode::Input] {
            if !self.pins[pin].supports(mode) {
                return Err(IoError::UnsupportedMode { pin, mode });
            }
        }
        self.pings.push(PendingPing { id, pin, handler });
        debug!("{} ping on pin {}", id, pin);
        Ok(())
    }

    /// Drive the external level of a pin.
    pub fn set_input(&mut self, pin: usize, level: u32) {
        self.external[pin] = level;
    }

    /// Set or clear the echo a ping on `pin` will measure.
    pub fn set_echo(&mut self, pin: usize, echo: Option<Duration>) {
        match echo {
            Some(d) => self.echoes.insert(pin, d),
            None => self.echoes.remove(&pin),
        };
    }

    pub fn cancel(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscriptions.len() + self.pings.len();
        self.subscriptions.retain(|s| s.id != id);
        self.pings.retain(|p| p.id != id);
        before != self.subscriptions.len() + self.pings.len()
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len() + self.pings.len()
    }

    pub fn clear(&mut self) {
        self.subscriptions.clear();
        self.pings.clear();
        for pin in &mut self.pins {
            pin.reporting = false;
        }
    }

    /// Sample inputs and deliver pin reads, in registration order.
    pub fn poll(&mut self) {
        for sub in &mut self.subscriptions {
            let pin = &mut self.pins[sub.pin];
            if !pin.reporting {
                continue;
            }
            let level = self.external[sub.pin];
            match &mut sub.watch {
                Watch::Analog(handler) => {
                    let sample = level.min(self.analog_max);
                    pin.value = sample;
                    handler(sample);
                }
                Watch::Digital { handler, last } => {
                    let value = Value::from_level(level);
                    pin.value = value.into();
                    if *last != Some(value) {
                        *last = Some(value);
                        handler(value);
                    }
                }
            }
        }

        for mut ping in self.pings.drain(..) {
            match self.echoes.get(&ping.pin) {
                Some(echo) => (ping.handler)(*echo),
                None => debug!("{} ping on pin {} timed out", ping.id, ping.pin),
            }
        }
    }
}
