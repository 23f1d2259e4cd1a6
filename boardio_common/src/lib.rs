//! boardio common library
//!
//! The IO capability contract shared by board drivers and the runtimes that
//! call them.
//!
//! # Module Structure
//!
//! - [`hal`] - capability contract: pin model, identifiers, driver trait,
//!   events and argument dispatch
//! - [`config`] - configuration loading traits and types
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! ```rust
//! use boardio_common::prelude::*;
//!
//! let pin = PinId::from("A0");
//! assert_eq!(pin, PinId::Name("A0".to_string()));
//! ```

pub mod config;
pub mod hal;
pub mod prelude;
