//! Commands issued to the agent from outside the event flow.

use std::sync::Arc;

use faultline_events::{ActionType, NodeState};
use faultline_faults::{ActionRegistry, ModeFlags};
use faultline_relay::{ConsumerId, NodeSnapshot, Transport};
use tokio::sync::watch;
use tracing::{error, info};

use crate::error::Result;
use crate::status::{AgentStatus, Availability, AvailabilityMirror};

/// Operator-facing handle to a running agent.
///
/// Actions run here bypass the dispatcher and the selection policy. Nothing
/// is locked while an action runs, so a continue or restart can rescue a
/// node whose pause or stop command hangs.
#[derive(Clone)]
pub struct Controller {
    availability: AvailabilityMirror,
    modes: ModeFlags,
    registry: Arc<ActionRegistry>,
    transport: Arc<Transport>,
}

impl Controller {
    /// Create a controller sharing state with the dispatcher.
    #[must_use]
    pub fn new(
        registry: Arc<ActionRegistry>,
        modes: ModeFlags,
        availability: AvailabilityMirror,
        transport: Arc<Transport>,
    ) -> Self {
        Self {
            availability,
            modes,
            registry,
            transport,
        }
    }

    /// Run the action named by `identifier`.
    ///
    /// Accepts wire identifiers (`PAUSE_ACTION_TYPE`) and short names
    /// (`pause`).
    ///
    /// # Errors
    ///
    /// Returns an error if the identifier is unknown or the action fails.
    pub async fn execute(&self, identifier: &str) -> Result<ActionType> {
        let kind: ActionType = identifier.parse()?;
        self.run(kind).await?;
        Ok(kind)
    }

    /// Run `kind` directly.
    ///
    /// # Errors
    ///
    /// Returns an error if the action fails.
    pub async fn run(&self, kind: ActionType) -> Result<()> {
        let reset = self.transport.reset_signal();

        let action = self.registry.get(kind);

        info!("executing {} on request", action.name());
        if let Err(e) = action.perform(&|| reset.request()).await {
            error!("{} failed: {}", action.name(), e);
            return Err(e.into());
        }
        self.availability.record(kind);
        Ok(())
    }

    /// Turn step-by-step mode on or off.
    ///
    /// Turning it off while the node is paused resumes the node.
    ///
    /// # Errors
    ///
    /// Returns an error if the resuming continue fails. The mode is changed
    /// regardless.
    pub async fn set_step_by_step(&self, enable: bool) -> Result<()> {
        self.modes.set_step_by_step(enable);
        info!("step-by-step mode {}", if enable { "on" } else { "off" });

        if !enable && self.availability.get() == Availability::Paused {
            self.run(ActionType::Continue).await?;
        }
        Ok(())
    }

    /// Turn education mode on or off.
    pub fn set_education(&self, enable: bool) {
        self.modes.set_education(enable);
        info!("education mode {}", if enable { "on" } else { "off" });
    }

    /// Let a node paused in step-by-step mode take one step.
    ///
    /// # Errors
    ///
    /// Returns an error if the continue command fails.
    pub async fn next_step(&self) -> Result<()> {
        self.run(ActionType::Continue).await
    }

    /// Drop the node's connection and wait for it to reconnect.
    pub fn force_reset(&self) {
        info!("reset requested by operator");
        self.transport.request_reset();
    }

    /// Current agent state.
    #[must_use]
    pub fn status(&self) -> AgentStatus {
        let node = self.transport.node_snapshot();
        AgentStatus {
            availability: self.availability.get(),
            step_by_step: self.modes.step_by_step(),
            education: self.modes.education(),
            node_state: node.state,
            term: node.term,
            leader_id: node.leader_id,
            commit_index: node.commit_index,
        }
    }

    /// Follow status changes as they happen.
    #[must_use]
    pub fn subscribe_status(&self) -> StatusSubscription {
        StatusSubscription {
            availability: self.availability.subscribe(),
            modes: self.modes.subscribe(),
            node: self.transport.node_state_mirror().subscribe(),
            controller: self.clone(),
        }
    }

    /// Last role the node reported.
    #[must_use]
    pub fn node_state(&self) -> NodeState {
        self.transport.node_state()
    }

    /// Receive every log line the node reports.
    pub fn subscribe_logs<F>(&self, consumer: F) -> ConsumerId
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.transport.register_log_consumer(consumer)
    }

    /// Stop receiving log lines. Returns false if `id` was not registered.
    pub fn unsubscribe_logs(&self, id: ConsumerId) -> bool {
        self.transport.unregister_log_consumer(id)
    }
}

/// Stream of [`AgentStatus`] updates.
///
/// Wakes on an availability change, a mode toggle or new node progress.
/// Changes that land together are reported once.
pub struct StatusSubscription {
    availability: watch::Receiver<Availability>,
    modes: watch::Receiver<()>,
    node: watch::Receiver<NodeSnapshot>,
    controller: Controller,
}

impl StatusSubscription {
    /// Wait for the next change and return the status after it.
    ///
    /// Returns `None` once every source has shut down.
    pub async fn changed(&mut self) -> Option<AgentStatus> {
        tokio::select! {
            Ok(()) = self.availability.changed() => {}
            Ok(()) = self.modes.changed() => {}
            Ok(()) = self.node.changed() => {}
            else => return None,
        }
        self.availability.borrow_and_update();
        self.modes.borrow_and_update();
        self.node.borrow_and_update();
        Some(self.controller.status())
    }
}
