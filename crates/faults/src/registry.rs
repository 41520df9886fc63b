//! One configured [`FaultAction`] per [`ActionType`].

use std::time::Duration;

use faultline_events::ActionType;

use crate::action::{FaultAction, Timed};
use crate::command::ExternalCommand;
use crate::config::FaultConfig;
use crate::error::Result;

/// Fixed set of fault actions built from configuration.
#[derive(Clone, Debug)]
pub struct ActionRegistry {
    // Indexed by `ActionType as usize`, in `ActionType::ALL` order
    actions: [FaultAction; ActionType::ALL.len()],
}

impl ActionRegistry {
    /// Build every action from `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if a pause, continue, stop or restart command is
    /// missing.
    pub fn from_config(config: &FaultConfig) -> Result<Self> {
        let actions = &config.actions;

        let pause =
            ExternalCommand::parse(&actions.pause.pause_command, "actions.pause.pause-command")?;
        let resume = ExternalCommand::parse(
            &actions.pause.continue_command,
            "actions.pause.continue-command",
        )?;
        let stop =
            ExternalCommand::parse(&actions.stop.stop_command, "actions.stop.stop-command")?;
        let restart = ExternalCommand::parse(
            &actions.stop.restart_command,
            "actions.stop.restart-command",
        )?;

        let auto_continue = actions.pause.max_duration.map(|ms| Timed {
            after: Duration::from_millis(ms),
            command: resume.clone(),
        });
        let auto_restart = actions.stop.max_duration.map(|ms| Timed {
            after: Duration::from_millis(ms),
            command: restart.clone(),
        });

        Ok(Self {
            actions: [
                FaultAction::Noop,
                FaultAction::Halt {
                    max_duration: Duration::from_millis(actions.halt.max_duration),
                },
                FaultAction::Pause {
                    pause,
                    auto_continue,
                },
                FaultAction::Continue { command: resume },
                FaultAction::Stop {
                    command: stop,
                    auto_restart,
                },
                FaultAction::Restart { command: restart },
                FaultAction::ResendLastMessage,
            ],
        })
    }

    /// Action registered for `kind`.
    #[must_use]
    pub const fn get(&self, kind: ActionType) -> &FaultAction {
        &self.actions[kind as usize]
    }

    /// Every registered action.
    pub fn iter(&self) -> impl Iterator<Item = &FaultAction> {
        self.actions.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn config() -> FaultConfig {
        let mut config = FaultConfig::default();
        config.actions.halt.max_duration = 100;
        config.actions.pause.pause_command = "docker pause node".into();
        config.actions.pause.continue_command = "docker unpause node".into();
        config.actions.stop.stop_command = "docker stop node".into();
        config.actions.stop.restart_command = "docker start node".into();
        config
    }

    #[test]
    fn test_one_action_per_type() {
        let registry = ActionRegistry::from_config(&config()).unwrap();

        for kind in ActionType::ALL {
            assert_eq!(registry.get(kind).action_type(), kind);
        }
        assert_eq!(registry.iter().count(), ActionType::ALL.len());
        assert_eq!(registry.get(ActionType::Noop).name(), "No-op");
        assert_eq!(
            registry.get(ActionType::ResendLastMessage).name(),
            "Resend last message"
        );
    }

    #[test]
    fn test_missing_pause_command_rejected() {
        let mut config = config();
        config.actions.pause.pause_command.clear();

        let err = ActionRegistry::from_config(&config).unwrap_err();
        assert!(matches!(err, Error::MissingCommand("actions.pause.pause-command")));
    }

    #[test]
    fn test_max_duration_enables_auto_resume() {
        let mut config = config();
        config.actions.stop.max_duration = Some(500);
        let registry = ActionRegistry::from_config(&config).unwrap();

        let FaultAction::Stop { auto_restart, .. } = registry.get(ActionType::Stop) else {
            panic!("stop registered under wrong type");
        };
        let timed = auto_restart.as_ref().unwrap();
        assert_eq!(timed.after, Duration::from_millis(500));
        assert_eq!(timed.command.to_string(), "docker start node");

        let FaultAction::Pause { auto_continue, .. } = registry.get(ActionType::Pause) else {
            panic!("pause registered under wrong type");
        };
        assert!(auto_continue.is_none());
    }
}
