//! Remote addresses a connection can be dialed at.

use redis_watchdog_core::ConfigurationError;
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

const UNIX_PREFIX: &str = "unix:";

/// Where to connect.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Address {
    /// A resolved socket address.
    Tcp(SocketAddr),

    /// A host name and port, resolved when dialed.
    Host {
        /// DNS name or literal.
        host: String,
        /// TCP port.
        port: u16,
    },

    /// A local (unix domain) socket path.
    Unix(PathBuf),
}

impl Address {
    /// Creates a host/port address.
    pub fn host(host: impl Into<String>, port: u16) -> Self {
        Address::Host {
            host: host.into(),
            port,
        }
    }

    /// Returns true if dialing this address needs local socket support.
    pub fn is_local(&self) -> bool {
        matches!(self, Address::Unix(_))
    }
}

impl From<SocketAddr> for Address {
    fn from(addr: SocketAddr) -> Self {
        Address::Tcp(addr)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Address::Tcp(addr) => write!(f, "{}", addr),
            Address::Host { host, port } => write!(f, "{}:{}", host, port),
            Address::Unix(path) => write!(f, "{}{}", UNIX_PREFIX, path.display()),
        }
    }
}

impl FromStr for Address {
    type Err = ConfigurationError;

    /// Parses `unix:/path`, `ip:port`, or `host:port`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason| ConfigurationError::InvalidAddress {
            input: s.to_string(),
            reason,
        };

        if let Some(path) = s.strip_prefix(UNIX_PREFIX) {
            if path.is_empty() {
                return Err(invalid("empty socket path"));
            }
            return Ok(Address::Unix(PathBuf::from(path)));
        }

        if let Ok(addr) = s.parse::<SocketAddr>() {
            return Ok(Address::Tcp(addr));
        }

        let (host, port) = s.rsplit_once(':').ok_or_else(|| invalid("missing port"))?;
        if host.is_empty() {
            return Err(invalid("missing host"));
        }
        let port = port.parse::<u16>().map_err(|_| invalid("port is not a number"))?;
        Ok(Address::host(host, port))
    }
}
