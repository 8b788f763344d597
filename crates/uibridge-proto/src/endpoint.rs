use std::fmt;
use std::net::{SocketAddr, ToSocketAddrs};
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::ProtoError;

/// Default driver-facing TCP port.
pub const DEFAULT_PORT: u16 = 8888;

const ENDPOINT_ENV: &str = "UIBRIDGE_ENDPOINT";

/// Where the bridge listens and peers connect: a TCP address or a local
/// (unix-domain) socket path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Tcp(SocketAddr),
    Unix(PathBuf),
}

impl Endpoint {
    pub fn default_tcp() -> Self {
        Self::Tcp(SocketAddr::from(([127, 0, 0, 1], DEFAULT_PORT)))
    }

    pub fn tcp_localhost(port: u16) -> Self {
        Self::Tcp(SocketAddr::from(([127, 0, 0, 1], port)))
    }

    /// Reads `UIBRIDGE_ENDPOINT`; unset or unparsable falls back to
    /// localhost:8888.
    pub fn from_env() -> Self {
        std::env::var(ENDPOINT_ENV)
            .ok()
            .and_then(|raw| raw.parse().ok())
            .unwrap_or_else(Self::default_tcp)
    }
}

impl FromStr for Endpoint {
    type Err = ProtoError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let raw = raw.trim();
        if let Some(path) = raw.strip_prefix("unix:") {
            if path.is_empty() {
                return Err(ProtoError::InvalidEndpoint(raw.to_string()));
            }
            return Ok(Self::Unix(PathBuf::from(path)));
        }

        let addr_part = raw.strip_prefix("tcp:").unwrap_or(raw);

        // A bare port means localhost.
        if let Ok(port) = addr_part.parse::<u16>() {
            return Ok(Self::tcp_localhost(port));
        }

        addr_part
            .to_socket_addrs()
            .ok()
            .and_then(|mut addrs| addrs.next())
            .map(Self::Tcp)
            .ok_or_else(|| ProtoError::InvalidEndpoint(raw.to_string()))
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp(addr) => write!(f, "tcp:{}", addr),
            Self::Unix(path) => write!(f, "unix:{}", path.display()),
        }
    }
}
