//! Wire data model shared by the agent and the monitored node.
//!
//! The monitored node reports what it observes (votes, replication, commits,
//! suspicions, state changes) as [`Event`] records and blocks until the agent
//! answers each one with exactly one [`Response`]. Records travel over a
//! stream socket using one of the [`Framing`] variants.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

mod action;
mod error;
mod event;
pub mod framing;
mod response;

pub use action::ActionType;
pub use error::{Error, Result};
pub use event::{Event, EventKind, NodeState};
pub use framing::{Framing, WireCodec};
pub use response::{Response, ResponseTag};
