//! IO contract constants.
//!
//! Limits and board-independent defaults used by drivers when a board
//! description leaves a value unset.

/// Canonical service name (used for logging).
pub const IO_SERVICE_NAME: &str = "boardio";

/// Maximum number of pins a board description may declare.
pub const MAX_PINS: usize = 256;

/// Maximum number of serial ports.
pub const MAX_SERIAL_PORTS: usize = 16;

/// Maximum number of I2C buses.
pub const MAX_I2C_BUSES: usize = 8;

/// Highest valid I2C address (10-bit addressing).
pub const MAX_I2C_ADDRESS: u16 = 0x3FF;

/// Size of the register space of a simulated I2C device.
pub const I2C_REGISTER_SPACE: usize = 256;

/// Largest I2C read request, one full sweep of the register space.
pub const MAX_I2C_READ: usize = I2C_REGISTER_SPACE;

/// Default polling interval in microseconds (~50 Hz sampling).
pub const DEFAULT_POLL_INTERVAL_US: u32 = 19_000;

/// Default PWM resolution in bits.
pub const DEFAULT_PWM_RESOLUTION: u8 = 8;

/// Default analog-to-digital resolution in bits.
pub const DEFAULT_ANALOG_RESOLUTION: u8 = 10;

/// Maximum resolution accepted for PWM and analog channels.
pub const MAX_RESOLUTION_BITS: u8 = 16;

/// Default number of bytes per serial read invocation when the caller
/// does not bound it.
pub const DEFAULT_SERIAL_CHUNK_SIZE: usize = 32;

/// Default serial baud rate.
pub const DEFAULT_BAUD: u32 = 57_600;

/// Default servo minimum pulse width in microseconds.
pub const DEFAULT_SERVO_MIN_US: u16 = 544;

/// Default servo maximum pulse width in microseconds.
pub const DEFAULT_SERVO_MAX_US: u16 = 2400;

/// Upper bound of a servo position in degrees.
pub const SERVO_MAX_DEGREES: u32 = 180;

/// Default trigger pulse length for ping reads in microseconds.
pub const DEFAULT_PING_PULSE_OUT_US: u64 = 5;

/// Pin used as on-board LED when the board description names none.
pub const DEFAULT_LED_PIN: usize = 13;

/// Default board description path.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/boardio/board.toml";
