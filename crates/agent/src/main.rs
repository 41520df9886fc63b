//! Fault-injection agent binary.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

use std::path::PathBuf;

use clap::Parser;
use faultline_agent::Agent;
use faultline_faults::FaultConfig;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[derive(Clone, Debug, Parser)]
#[command(version, about = "Fault-injection agent for a Raft node", long_about = None)]
struct Args {
    /// Path to the fault configuration file
    #[arg(long, default_value = "faults.yaml", env = "FAULTLINE_CONFIG")]
    config: PathBuf,

    /// Maximum log level
    #[arg(long, default_value_t = tracing::Level::INFO, env = "FAULTLINE_LOG_LEVEL")]
    log_level: tracing::Level,

    /// Start in education mode
    #[arg(long)]
    education: bool,
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match (
            signal(SignalKind::terminate()),
            signal(SignalKind::interrupt()),
        ) {
            (Ok(mut sigterm), Ok(mut sigint)) => {
                tokio::select! {
                    _ = sigterm.recv() => info!("Received SIGTERM"),
                    _ = sigint.recv() => info!("Received SIGINT"),
                }
                return;
            }
            (Err(e), _) | (_, Err(e)) => error!("failed to install signal handlers: {}", e),
        }
    }

    until_interrupted(tokio::signal::ctrl_c()).await;
}

async fn until_interrupted(interrupt: impl Future<Output = std::io::Result<()>>) {
    match interrupt.await {
        Ok(()) => info!("Received interrupt signal"),
        Err(e) => {
            // Without a signal source, run until the agent stops on its own
            error!("failed to listen for interrupt signal: {}", e);
            std::future::pending::<()>().await;
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt().with_max_level(args.log_level).init();

    let mut config = FaultConfig::from_file(&args.config)?;
    if args.education {
        config.education_mode = true;
    }
    info!(
        "loaded {}:\n{}",
        args.config.display(),
        config.to_yaml()?
    );

    let agent = Agent::new(&config)?;

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Shutting down");
        signal_cancel.cancel();
    });

    if let Err(e) = agent.run(cancel).await {
        error!("agent error: {}", e);
        return Err(e.into());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_interrupt_ends_wait() {
        until_interrupted(async { Ok(()) }).await;
    }

    #[tokio::test]
    async fn test_listener_failure_does_not_shut_down() {
        let wait = until_interrupted(async { Err(std::io::Error::other("no signal source")) });

        assert!(
            tokio::time::timeout(Duration::from_millis(50), wait)
                .await
                .is_err()
        );
    }
}
