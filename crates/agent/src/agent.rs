//! Wiring of transport, dispatcher and controller.

use std::sync::Arc;

use faultline_faults::{
    ActionRegistry, CommandDriven, FaultConfig, ModeFlags, SelectionMode, SelectionPolicy,
    Weighted,
};
use faultline_relay::{Endpoint, Envelope, Transport, TransportConfig};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::controller::Controller;
use crate::dispatcher::Dispatcher;
use crate::error::{Error, Result};
use crate::status::AvailabilityMirror;

/// Endpoint named by `config`; a TCP address takes precedence.
///
/// # Errors
///
/// Returns an error if neither endpoint is configured.
pub fn endpoint_for(config: &FaultConfig) -> Result<Endpoint> {
    if let Some(addr) = config.tcp_address {
        return Ok(Endpoint::Tcp(addr));
    }
    config
        .unix_domain_socket_path
        .clone()
        .filter(|path| !path.as_os_str().is_empty())
        .map(Endpoint::Unix)
        .ok_or_else(|| Error::Config("no endpoint configured".into()))
}

/// Selection policy named by `config`.
///
/// With faults disabled, weighted selection falls back to command-driven
/// selection.
///
/// # Errors
///
/// Returns an error if the configured weights are unusable.
pub fn policy_for(config: &FaultConfig, modes: &ModeFlags) -> Result<Arc<dyn SelectionPolicy>> {
    match config.selection {
        SelectionMode::Weighted if config.faults_enabled => {
            Ok(Arc::new(Weighted::new(&config.weights())?))
        }
        SelectionMode::Weighted => {
            warn!("faults disabled, ignoring weighted selection");
            Ok(Arc::new(CommandDriven::new(modes.clone())))
        }
        SelectionMode::Command => Ok(Arc::new(CommandDriven::new(modes.clone()))),
    }
}

/// A fully wired agent for one monitored node.
pub struct Agent {
    controller: Controller,
    dispatcher: Dispatcher,
    events: mpsc::Receiver<Envelope>,
    transport: Arc<Transport>,
}

impl Agent {
    /// Build every component from `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or incomplete.
    pub fn new(config: &FaultConfig) -> Result<Self> {
        config.validate()?;

        let endpoint = endpoint_for(config)?;
        let (event_tx, events) = mpsc::channel(config.queues.events);
        let transport = Arc::new(Transport::new(
            TransportConfig {
                endpoint,
                framing: config.framing,
                max_frame_size: config.max_frame_size,
                response_queue_capacity: config.queues.responses,
            },
            event_tx,
        ));

        let registry = Arc::new(ActionRegistry::from_config(config)?);
        let modes = ModeFlags::new(config.education_mode, false);
        let availability = AvailabilityMirror::default();
        let policy = policy_for(config, &modes)?;

        let dispatcher = Dispatcher::new(policy, Arc::clone(&registry), transport.response_sender())
            .with_availability(availability.clone());
        let controller = Controller::new(registry, modes, availability, Arc::clone(&transport));

        Ok(Self {
            controller,
            dispatcher,
            events,
            transport,
        })
    }

    /// Handle for operator commands.
    #[must_use]
    pub fn controller(&self) -> Controller {
        self.controller.clone()
    }

    /// The agent's transport.
    #[must_use]
    pub fn transport(&self) -> Arc<Transport> {
        Arc::clone(&self.transport)
    }

    /// Run until `cancel` fires or the transport fails.
    ///
    /// A transport failure cancels `cancel` so every loop shuts down.
    ///
    /// # Errors
    ///
    /// Returns an error if the node's connection cannot be (re-)established.
    pub async fn run(self, cancel: CancellationToken) -> Result<()> {
        let handle = self.transport.start(cancel.clone())?;
        let dispatcher = tokio::spawn(self.dispatcher.run(self.events, cancel.clone()));
        info!("agent running");

        let read = handle.read.await?;
        if let Err(e) = &read {
            error!("transport failed: {}", e);
        }
        cancel.cancel();

        handle.write.await?;
        dispatcher.await?;
        info!("agent stopped");

        read.map_err(Error::from)
    }
}
