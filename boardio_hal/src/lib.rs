//! # boardio HAL Library
//!
//! Runtime side of the IO capability contract.
//!
//! Drivers implement the `IoDriver` trait defined in
//! `boardio_common::hal::driver`.
//!
//! # Module Structure
//!
//! - [`core`] - IoCore struct, polling loop management
//! - [`driver_registry`] - Driver factory registration
//! - [`drivers`] - IO driver implementations
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        boardio_hal                           │
//! │  ┌──────────────┐    ┌──────────────┐    ┌────────────────┐  │
//! │  │  board.toml  │───►│    IoCore    │◄──►│ DriverRegistry │  │
//! │  └──────────────┘    │ (poll loop)  │    └────────────────┘  │
//! │                      └──────┬───────┘                        │
//! │                             │ cycle(dt)                      │
//! │                             ▼                                │
//! │   runtime ──invoke()──► ┌────────────┐ ──events──► listeners │
//! │                         │  IoDriver  │ (trait object)        │
//! │                         └────────────┘                       │
//! └──────────────────────────────────────────────────────────────┘
//! ```

#![deny(missing_docs)]

pub mod core;
pub mod driver_registry;
pub mod drivers;

// Re-export key types for convenience
pub use crate::core::{Command, CommandQueue, IoCore, SharedDriver, TimingStats};
pub use crate::driver_registry::DriverRegistry;
pub use crate::drivers::simulation::SimulationDriver;
