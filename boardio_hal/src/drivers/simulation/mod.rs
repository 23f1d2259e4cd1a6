//! Simulation driver module.
//!
//! Software board for development and testing without physical hardware:
//! pins with settable external levels, register-addressed I2C devices and
//! serial ports with receive buffers.

mod driver;
mod i2c;
mod pins;
mod serial;

pub use driver::SimulationDriver;
pub use i2c::SimDevice;

use boardio_common::hal::driver::IoDriver;

/// Factory function to create a simulation driver instance.
pub fn create_driver() -> Box<dyn IoDriver> {
    Box::new(SimulationDriver::new())
}
