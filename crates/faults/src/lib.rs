//! Fault-action engine for the faultline agent.
//!
//! A fixed set of [`FaultAction`]s is built from a [`FaultConfig`] into an
//! [`ActionRegistry`]. A [`SelectionPolicy`] decides which one runs for each
//! event the monitored node reports: [`CommandDriven`] follows externally
//! set modes, [`Weighted`] draws at random by configured probability.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

mod action;
mod command;
pub mod config;
mod error;
mod policy;
mod registry;

pub use action::{FaultAction, Timed};
pub use command::ExternalCommand;
pub use config::{FaultConfig, SelectionMode};
pub use error::{Error, Result};
pub use policy::{CommandDriven, ModeFlags, SelectionPolicy, Weighted};
pub use registry::ActionRegistry;
