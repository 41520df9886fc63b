//! Fault-injection agent for a single Raft node.
//!
//! The [`Agent`] accepts the monitored node's connection, runs every event
//! it reports through a [`Dispatcher`] that selects and performs a fault
//! action, and acknowledges each event once the action has completed. A
//! [`Controller`] exposes the same actions, the mode toggles and the
//! observation bridge to an operator.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

mod agent;
mod controller;
mod dispatcher;
mod error;
mod status;

pub use agent::{Agent, endpoint_for, policy_for};
pub use controller::{Controller, StatusSubscription};
pub use dispatcher::Dispatcher;
pub use error::{Error, Result};
pub use status::{AgentStatus, Availability, AvailabilityMirror};
