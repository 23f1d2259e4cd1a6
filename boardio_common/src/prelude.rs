//! Prelude module for common re-exports.
//!
//! `use boardio_common::prelude::*;` brings in the contract types a driver
//! or runtime needs without listing individual paths.

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{ConfigError, ConfigLoader};
pub use crate::hal::config::{
    BoardConfig, I2cConfig, PingSettings, PulseInSettings, SerialConfig, ServoConfig,
};

// ─── Contract ───────────────────────────────────────────────────────
pub use crate::hal::driver::{DriverFactory, I2cRead, I2cWrite, IoDriver, IoError};
pub use crate::hal::events::{EventBus, IoEvent};
pub use crate::hal::ident::{BusId, PinId, PortId};
pub use crate::hal::types::{Mode, ModeSet, Pin, SubscriptionId, Value};

// ─── Dispatch ───────────────────────────────────────────────────────
pub use crate::hal::dispatch::{Arg, Operation, Outcome, Reading, invoke};
