use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{Result, TransportError};

/// Prefix selecting a Unix domain socket endpoint.
pub const UNIX_PREFIX: &str = "unix:";

/// Where a server listens or a client connects.
///
/// Textual form: `unix:/run/app.sock` for a Unix domain socket, anything
/// else is handed to the resolver as a TCP `host:port`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Tcp(String),
    #[cfg(unix)]
    Unix(PathBuf),
}

impl Endpoint {
    /// Parse an endpoint string.
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        if input.is_empty() {
            return Err(TransportError::InvalidEndpoint(input.to_string()));
        }

        if let Some(path) = input.strip_prefix(UNIX_PREFIX) {
            // Accept both `unix:/p` and `unix:///p`.
            let path = path.strip_prefix("//").unwrap_or(path);
            if path.is_empty() {
                return Err(TransportError::InvalidEndpoint(input.to_string()));
            }
            return Self::unix(path);
        }

        Ok(Self::Tcp(input.to_string()))
    }

    /// TCP endpoint from a `host:port` string.
    pub fn tcp(addr: impl Into<String>) -> Self {
        Self::Tcp(addr.into())
    }

    /// Unix domain socket endpoint.
    #[cfg(unix)]
    pub fn unix(path: impl Into<PathBuf>) -> Result<Self> {
        Ok(Self::Unix(path.into()))
    }

    #[cfg(not(unix))]
    pub fn unix(path: impl Into<PathBuf>) -> Result<Self> {
        let path: PathBuf = path.into();
        Err(TransportError::InvalidEndpoint(format!(
            "{UNIX_PREFIX}{} (unix sockets unsupported on this platform)",
            path.display()
        )))
    }

    /// Transport name for diagnostics.
    pub fn transport_name(&self) -> &'static str {
        match self {
            Self::Tcp(_) => "tcp",
            #[cfg(unix)]
            Self::Unix(_) => "unix-domain-socket",
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp(addr) => f.write_str(addr),
            #[cfg(unix)]
            Self::Unix(path) => write!(f, "{UNIX_PREFIX}{}", path.display()),
        }
    }
}

impl FromStr for Endpoint {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
