//! Agent configuration file.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use faultline_events::Framing;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default capacity of the queue between transport and dispatcher.
pub const DEFAULT_EVENT_QUEUE_CAPACITY: usize = 10_000;

/// Default capacity of the queue between dispatcher and write loop.
pub const DEFAULT_RESPONSE_QUEUE_CAPACITY: usize = 1024;

/// How the dispatcher chooses an action for an arriving event.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SelectionMode {
    /// Free-running or step-by-step, driven by external commands.
    #[default]
    Command,
    /// Random draw weighted by each action's probability.
    Weighted,
}

/// Probability-only action settings.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct WeightConfig {
    /// Relative weight in weighted selection.
    pub probability: f64,
}

/// Halt settings.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct HaltConfig {
    /// Relative weight in weighted selection.
    pub probability: f64,
    /// Sleep duration in milliseconds.
    pub max_duration: u64,
}

/// Pause and continue settings.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct PauseConfig {
    /// Relative weight in weighted selection.
    pub probability: f64,
    /// When set, a pause is followed by a continue after this many
    /// milliseconds.
    pub max_duration: Option<u64>,
    /// Command that suspends the monitored process.
    pub pause_command: String,
    /// Command that resumes the monitored process.
    pub continue_command: String,
}

/// Stop and restart settings.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct StopConfig {
    /// Relative weight in weighted selection.
    pub probability: f64,
    /// When set, a stop is followed by a restart after this many
    /// milliseconds.
    pub max_duration: Option<u64>,
    /// Command that stops the monitored process or container.
    pub stop_command: String,
    /// Command that restarts the monitored process or container.
    pub restart_command: String,
}

/// Per-action settings.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ActionsConfig {
    /// No-op.
    pub noop: WeightConfig,
    /// Halt.
    pub halt: HaltConfig,
    /// Pause and continue.
    pub pause: PauseConfig,
    /// Stop and restart.
    pub stop: StopConfig,
    /// Resend last message.
    pub resend_last_message: WeightConfig,
}

/// Bounded queue capacities.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct QueueConfig {
    /// Events waiting for the dispatcher.
    pub events: usize,
    /// Responses waiting for the write loop.
    pub responses: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            events: DEFAULT_EVENT_QUEUE_CAPACITY,
            responses: DEFAULT_RESPONSE_QUEUE_CAPACITY,
        }
    }
}

const fn default_faults_enabled() -> bool {
    true
}

const fn default_max_frame_size() -> usize {
    faultline_events::framing::MAX_FRAME_SIZE
}

/// Top-level agent configuration.
///
/// ```yaml
/// unix-domain-socket-path: /tmp/raft-node-1.sock
/// faults-enabled: true
/// actions:
///   pause:
///     pause-command: docker pause raft-node-1
///     continue-command: docker unpause raft-node-1
///   stop:
///     stop-command: docker stop raft-node-1
///     restart-command: docker start raft-node-1
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct FaultConfig {
    /// Unix socket the monitored node connects to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unix_domain_socket_path: Option<PathBuf>,

    /// TCP address the monitored node connects to, used instead of the
    /// Unix socket when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tcp_address: Option<SocketAddr>,

    /// Record framing on the connection.
    #[serde(default)]
    pub framing: Framing,

    /// Largest record accepted from the node, in bytes.
    #[serde(default = "default_max_frame_size")]
    pub max_frame_size: usize,

    /// When false, arriving events never trigger a fault.
    #[serde(default = "default_faults_enabled")]
    pub faults_enabled: bool,

    /// Initial state of education mode.
    #[serde(default)]
    pub education_mode: bool,

    /// Selection policy for arriving events.
    #[serde(default)]
    pub selection: SelectionMode,

    /// Queue capacities.
    #[serde(default)]
    pub queues: QueueConfig,

    /// Per-action settings.
    #[serde(default)]
    pub actions: ActionsConfig,
}

impl Default for FaultConfig {
    fn default() -> Self {
        Self {
            unix_domain_socket_path: None,
            tcp_address: None,
            framing: Framing::default(),
            max_frame_size: default_max_frame_size(),
            faults_enabled: default_faults_enabled(),
            education_mode: false,
            selection: SelectionMode::default(),
            queues: QueueConfig::default(),
            actions: ActionsConfig::default(),
        }
    }
}

impl FaultConfig {
    /// Parse and validate a YAML document.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not valid YAML or fails
    /// [`validate`](Self::validate).
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or the content is invalid.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| Error::Io("failed to read config file", e))?;
        Self::from_yaml(&content)
    }

    /// Render the configuration as YAML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Check the configuration is complete.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        let socket_empty = self
            .unix_domain_socket_path
            .as_ref()
            .is_none_or(|path| path.as_os_str().is_empty());
        if socket_empty && self.tcp_address.is_none() {
            return Err(Error::Config("unix domain socket path is empty".into()));
        }

        let commands = [
            ("pause command", &self.actions.pause.pause_command),
            ("continue command", &self.actions.pause.continue_command),
            ("stop command", &self.actions.stop.stop_command),
            ("restart command", &self.actions.stop.restart_command),
        ];
        for (name, command) in commands {
            if command.trim().is_empty() {
                return Err(Error::Config(format!("{name} is empty")));
            }
        }

        if self.max_frame_size == 0 {
            return Err(Error::Config("max-frame-size must be positive".into()));
        }
        if self.queues.events == 0 || self.queues.responses == 0 {
            return Err(Error::Config("queue capacities must be positive".into()));
        }

        Ok(())
    }

    /// Selection weights in the order the weighted policy draws them.
    #[must_use]
    pub fn weights(&self) -> Vec<(faultline_events::ActionType, f64)> {
        use faultline_events::ActionType;

        vec![
            (ActionType::Noop, self.actions.noop.probability),
            (ActionType::Halt, self.actions.halt.probability),
            (ActionType::Pause, self.actions.pause.probability),
            (ActionType::Stop, self.actions.stop.probability),
            (
                ActionType::ResendLastMessage,
                self.actions.resend_last_message.probability,
            ),
        ]
    }
}
