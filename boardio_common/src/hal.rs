//! IO capability contract.
//!
//! - [`types`] - pin, mode and value model
//! - [`ident`] - pin/port/bus identifiers and normalization
//! - [`config`] - board description and peripheral records
//! - [`driver`] - `IoDriver` trait and `IoError`
//! - [`events`] - driver event channel
//! - [`dispatch`] - untyped argument classification for runtimes
//! - [`consts`] - limits and defaults

pub mod config;
pub mod consts;
pub mod dispatch;
pub mod driver;
pub mod events;
pub mod ident;
pub mod types;
