//! Rendezvous endpoints the monitored node connects to.

use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, UnixListener};
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Read half of an accepted connection.
pub type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;

/// Write half of an accepted connection.
pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Where the agent listens for its monitored node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Endpoint {
    /// Local stream socket at a filesystem path.
    Unix(PathBuf),
    /// TCP address, for cross-host deployments.
    Tcp(SocketAddr),
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unix(path) => write!(f, "unix:{}", path.display()),
            Self::Tcp(addr) => write!(f, "tcp:{addr}"),
        }
    }
}

impl Endpoint {
    /// Listen and accept exactly one peer.
    ///
    /// A stale socket file left by a previous listener is removed first. The
    /// listener is dropped once the peer is accepted.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint cannot be bound or accept fails.
    pub async fn accept_one(&self) -> Result<(BoxedReader, BoxedWriter)> {
        match self {
            Self::Unix(path) => {
                self.remove_stale().await?;
                let listener = UnixListener::bind(path).map_err(|source| Error::Bind {
                    endpoint: self.to_string(),
                    source,
                })?;
                debug!("listening on {}", self);

                let (stream, _) = listener.accept().await.map_err(|source| Error::Accept {
                    endpoint: self.to_string(),
                    source,
                })?;
                let (reader, writer) = stream.into_split();
                Ok((Box::new(reader), Box::new(writer)))
            }
            Self::Tcp(addr) => {
                let listener = TcpListener::bind(addr)
                    .await
                    .map_err(|source| Error::Bind {
                        endpoint: self.to_string(),
                        source,
                    })?;
                debug!("listening on {}", self);

                let (stream, peer) = listener.accept().await.map_err(|source| Error::Accept {
                    endpoint: self.to_string(),
                    source,
                })?;
                debug!("accepted {} on {}", peer, self);
                if let Err(e) = stream.set_nodelay(true) {
                    warn!("failed to set TCP_NODELAY: {}", e);
                }
                let (reader, writer) = stream.into_split();
                Ok((Box::new(reader), Box::new(writer)))
            }
        }
    }

    /// Remove the socket file, if this is a Unix endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be removed.
    pub async fn remove_stale(&self) -> Result<()> {
        if let Self::Unix(path) = self {
            match tokio::fs::remove_file(path).await {
                Ok(()) => debug!("removed stale socket {}", path.display()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(Error::Io("failed to remove stale socket", e)),
            }
        }
        Ok(())
    }
}
