//! External commands that control the monitored process.

use std::fmt;
use std::process::Stdio;

use tokio::process::Command;
use tracing::debug;

use crate::error::{Error, Result};

/// A program and its arguments, parsed once from a configured command line.
///
/// The line is split on single spaces with no quoting, so two consecutive
/// spaces produce an empty argument.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExternalCommand {
    line: String,
    program: String,
    args: Vec<String>,
}

impl ExternalCommand {
    /// Parse a command line.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingCommand`] if the line is blank.
    pub fn parse(line: &str, setting: &'static str) -> Result<Self> {
        if line.trim().is_empty() {
            return Err(Error::MissingCommand(setting));
        }

        let mut parts = line.split(' ').map(str::to_owned);
        let program = parts.next().unwrap_or_default();
        Ok(Self {
            line: line.to_owned(),
            program,
            args: parts.collect(),
        })
    }

    /// Program to execute.
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Arguments passed to the program.
    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Run the command to completion.
    ///
    /// # Errors
    ///
    /// Returns an error if the command cannot be spawned or exits with a
    /// non-zero status.
    pub async fn run(&self) -> Result<()> {
        debug!("running `{}`", self.line);
        let status = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .status()
            .await
            .map_err(|source| Error::Spawn {
                command: self.line.clone(),
                source,
            })?;

        if status.success() {
            Ok(())
        } else {
            Err(Error::NonZeroExit {
                command: self.line.clone(),
                status,
            })
        }
    }
}

impl fmt::Display for ExternalCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_on_spaces() {
        let command = ExternalCommand::parse("docker pause raft-node-1", "pause").unwrap();

        assert_eq!(command.program(), "docker");
        assert_eq!(command.args(), ["pause", "raft-node-1"]);
        assert_eq!(command.to_string(), "docker pause raft-node-1");
    }

    #[test]
    fn test_consecutive_spaces_keep_empty_args() {
        let command = ExternalCommand::parse("kill  -STOP", "pause").unwrap();

        assert_eq!(command.program(), "kill");
        assert_eq!(command.args(), ["", "-STOP"]);
    }

    #[test]
    fn test_blank_rejected() {
        assert!(matches!(
            ExternalCommand::parse("   ", "actions.stop.stop-command"),
            Err(Error::MissingCommand("actions.stop.stop-command"))
        ));
    }

    #[tokio::test]
    async fn test_run_reports_exit_status() {
        ExternalCommand::parse("true", "t").unwrap().run().await.unwrap();

        let err = ExternalCommand::parse("false", "f")
            .unwrap()
            .run()
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NonZeroExit { .. }));
    }

    #[tokio::test]
    async fn test_run_reports_spawn_failure() {
        let err = ExternalCommand::parse("/nonexistent/faultline-binary", "x")
            .unwrap()
            .run()
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Spawn { .. }));
    }
}
