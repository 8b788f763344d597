use std::net::TcpListener;
use std::os::unix::net::UnixListener;
use std::path::PathBuf;

use tracing::warn;

use uibridge_proto::{Endpoint, SocketStream};

use crate::error::BridgeError;

/// The bridge's listening endpoint: TCP or unix-domain. Accepted streams
/// come back as [`SocketStream`]s so the rest of the bridge never cares
/// which transport a peer arrived on.
pub enum Listener {
    Tcp(TcpListener),
    Unix { listener: UnixListener, path: PathBuf },
}

impl Listener {
    /// Binds the endpoint. A stale unix socket file from a previous run
    /// is removed first. Failure here is fatal to the caller; the bridge
    /// has no useful work without its listening endpoint.
    pub fn bind(endpoint: &Endpoint) -> Result<Self, BridgeError> {
        let bind_err = |source| BridgeError::Bind {
            endpoint: endpoint.to_string(),
            source,
        };

        match endpoint {
            Endpoint::Tcp(addr) => Ok(Self::Tcp(TcpListener::bind(addr).map_err(bind_err)?)),
            Endpoint::Unix(path) => {
                if path.exists() {
                    std::fs::remove_file(path).map_err(bind_err)?;
                }
                let listener = UnixListener::bind(path).map_err(bind_err)?;
                Ok(Self::Unix {
                    listener,
                    path: path.clone(),
                })
            }
        }
    }

    /// The endpoint actually bound. Differs from the requested one when
    /// binding TCP port 0.
    pub fn local_endpoint(&self) -> Result<Endpoint, BridgeError> {
        match self {
            Self::Tcp(listener) => Ok(Endpoint::Tcp(listener.local_addr()?)),
            Self::Unix { path, .. } => Ok(Endpoint::Unix(path.clone())),
        }
    }

    pub fn set_nonblocking(&self, nonblocking: bool) -> Result<(), BridgeError> {
        match self {
            Self::Tcp(listener) => listener.set_nonblocking(nonblocking)?,
            Self::Unix { listener, .. } => listener.set_nonblocking(nonblocking)?,
        }
        Ok(())
    }

    /// Accepts one connection, returning the stream and a peer label for
    /// logs. The accepted stream is forced back to blocking mode; only
    /// the listener itself polls.
    pub fn accept(&self) -> std::io::Result<(SocketStream, String)> {
        match self {
            Self::Tcp(listener) => {
                let (stream, addr) = listener.accept()?;
                let _ = stream.set_nonblocking(false);
                Ok((SocketStream::from(stream), addr.to_string()))
            }
            Self::Unix { listener, .. } => {
                let (stream, _) = listener.accept()?;
                let _ = stream.set_nonblocking(false);
                Ok((SocketStream::from(stream), "local".to_string()))
            }
        }
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        if let Self::Unix { path, .. } = self {
            if let Err(err) = std::fs::remove_file(&*path) {
                if err.kind() != std::io::ErrorKind::NotFound {
                    warn!("failed to remove socket file {}: {}", path.display(), err);
                }
            }
        }
    }
}
