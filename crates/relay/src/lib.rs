//! Transport between the fault-injection agent and its monitored node.
//!
//! The [`Transport`] listens on a Unix or TCP [`Endpoint`], accepts the
//! monitored node, and re-accepts it whenever a [`ResetSignal`] is raised
//! (after a stop action, on operator demand, or when the peer goes away).
//! Decoded events travel to the dispatcher as [`Envelope`]s drawn from
//! free-list [`Pool`]s; acknowledgements travel back through the write loop.
//! Log lines and state reports are exposed through the observation bridge
//! ([`LogConsumers`], [`NodeStateMirror`]).

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::redundant_pub_crate)]

mod endpoint;
mod error;
mod observe;
mod pool;
mod reset;
mod transport;

pub use endpoint::{BoxedReader, BoxedWriter, Endpoint};
pub use error::{Error, Result};
pub use observe::{ConsumerId, LogConsumer, LogConsumers, NodeSnapshot, NodeStateMirror};
pub use pool::{Pool, PoolStats, Poolable, Pooled};
pub use reset::ResetSignal;
pub use transport::{Envelope, Transport, TransportConfig, TransportHandle};
