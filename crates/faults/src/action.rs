//! Fault actions and how they are carried out.

use std::time::Duration;

use faultline_events::{ActionType, Event, EventKind, Response};
use serde_json::json;
use tracing::info;

use crate::command::ExternalCommand;
use crate::error::{Error, Result};

/// Follow-up command run after a fixed delay.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Timed {
    /// Delay before the command runs.
    pub after: Duration,
    /// Command to run.
    pub command: ExternalCommand,
}

/// A fault that can be injected into the monitored node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FaultAction {
    /// Do nothing.
    Noop,
    /// Hold the current event for a fixed time.
    Halt {
        /// How long to sleep.
        max_duration: Duration,
    },
    /// Suspend the monitored process.
    Pause {
        /// Suspend command.
        pause: ExternalCommand,
        /// Resume automatically after a delay.
        auto_continue: Option<Timed>,
    },
    /// Resume a suspended process.
    Continue {
        /// Resume command.
        command: ExternalCommand,
    },
    /// Stop the monitored process and drop its connection.
    Stop {
        /// Stop command.
        command: ExternalCommand,
        /// Restart automatically after a delay.
        auto_restart: Option<Timed>,
    },
    /// Start a stopped process.
    Restart {
        /// Restart command.
        command: ExternalCommand,
    },
    /// Reserved; currently does nothing.
    ResendLastMessage,
}

impl FaultAction {
    /// Identifier of this action.
    #[must_use]
    pub const fn action_type(&self) -> ActionType {
        match self {
            Self::Noop => ActionType::Noop,
            Self::Halt { .. } => ActionType::Halt,
            Self::Pause { .. } => ActionType::Pause,
            Self::Continue { .. } => ActionType::Continue,
            Self::Stop { .. } => ActionType::Stop,
            Self::Restart { .. } => ActionType::Restart,
            Self::ResendLastMessage => ActionType::ResendLastMessage,
        }
    }

    /// Human-readable name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Noop => "No-op",
            Self::Halt { .. } => "Halt",
            Self::Pause { .. } => "Pause",
            Self::Continue { .. } => "Continue",
            Self::Stop { .. } => "Stop",
            Self::Restart { .. } => "Restart",
            Self::ResendLastMessage => "Resend last message",
        }
    }

    /// Carry out the action.
    ///
    /// `request_reset` is invoked after a successful stop so the transport
    /// re-accepts instead of reading from a dead peer.
    ///
    /// # Errors
    ///
    /// Returns an error if an external command fails. Nothing is retried.
    pub async fn perform(&self, request_reset: &(dyn Fn() + Send + Sync)) -> Result<()> {
        match self {
            Self::Noop | Self::ResendLastMessage => Ok(()),
            Self::Halt { max_duration } => {
                info!("halting for {:?}", max_duration);
                tokio::time::sleep(*max_duration).await;
                Ok(())
            }
            Self::Pause {
                pause,
                auto_continue,
            } => {
                info!("pausing monitored node");
                pause.run().await?;
                if let Some(timed) = auto_continue {
                    tokio::time::sleep(timed.after).await;
                    info!("continuing monitored node after {:?}", timed.after);
                    timed.command.run().await?;
                }
                Ok(())
            }
            Self::Continue { command } => {
                info!("continuing monitored node");
                command.run().await
            }
            Self::Stop {
                command,
                auto_restart,
            } => {
                info!("stopping monitored node");
                command.run().await?;
                request_reset();
                if let Some(timed) = auto_restart {
                    tokio::time::sleep(timed.after).await;
                    info!("restarting monitored node after {:?}", timed.after);
                    timed.command.run().await?;
                }
                Ok(())
            }
            Self::Restart { command } => {
                info!("restarting monitored node");
                command.run().await
            }
        }
    }

    /// Fill in the acknowledgement for `event`.
    ///
    /// No-op and resend leave the default acknowledgement untouched.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedEvent`] for events the agent cannot
    /// interpret; the caller then sends the default acknowledgement.
    pub fn generate_response(&self, event: &Event, response: &mut Response) -> Result<()> {
        if matches!(event.kind, EventKind::Unknown | EventKind::Response) {
            return Err(Error::UnsupportedEvent(event.kind));
        }

        match self {
            Self::Noop | Self::ResendLastMessage => {}
            Self::Halt { max_duration } => {
                response.action = Some(ActionType::Halt);
                response.payload = Some(json!({ "haltedMs": max_duration.as_millis() }));
            }
            other => response.action = Some(other.action_type()),
        }
        Ok(())
    }
}
