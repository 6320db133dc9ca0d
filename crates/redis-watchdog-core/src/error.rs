//! Client error taxonomy.
//!
//! Failures fall into kinds with different propagation policies, and the
//! types below keep them structurally apart:
//!
//! | Kind | Type | Retried? | Owner |
//! |------|------|----------|-------|
//! | Transport failure | [`ConnectError`] | always, with backoff | watchdog |
//! | Address lookup failure | [`ResolveError`] | yes, falls back to last address | watchdog |
//! | Setup / capability failure | [`ConfigurationError`] | never | caller at setup |
//! | Server-reported command failure | [`CommandError`] | never, never reconnects | codec layer |
//!
//! [`ClientError`] is the tagged union an application sees.
//!
//! ```
//! use redis_watchdog_core::{ClientError, CommandError, ConnectError};
//!
//! let transport: ClientError = ConnectError::NoAddress.into();
//! assert!(transport.is_transient());
//!
//! let command: ClientError = CommandError::new("WRONGTYPE Operation against a key").into();
//! assert!(!command.is_transient());
//! assert_eq!(command.as_command().map(|c| c.prefix()), Some("WRONGTYPE"));
//! ```

use std::io;
use std::time::Duration;
use thiserror::Error;

/// A transient failure to establish a transport connection.
#[derive(Debug, Error)]
pub enum ConnectError {
    /// The remote end refused the connection.
    #[error("connection refused by {address}")]
    Refused {
        /// Address that was dialed.
        address: String,
    },

    /// The attempt did not complete within the configured connect timeout.
    #[error("connect to {address} timed out after {after:?}")]
    TimedOut {
        /// Address that was dialed.
        address: String,
        /// The timeout that elapsed.
        after: Duration,
    },

    /// No address is known to dial.
    #[error("no remote address known")]
    NoAddress,

    /// The factory cannot dial this kind of address.
    #[error("address {address} is not supported by this connector")]
    Unsupported {
        /// Address that was rejected.
        address: String,
    },

    /// Any other transport-level failure.
    #[error("transport error: {0}")]
    Io(#[from] io::Error),
}

impl ConnectError {
    /// Classifies an I/O error returned while dialing `address`.
    pub fn from_io(address: impl ToString, error: io::Error) -> Self {
        match error.kind() {
            io::ErrorKind::ConnectionRefused => ConnectError::Refused {
                address: address.to_string(),
            },
            io::ErrorKind::TimedOut => ConnectError::TimedOut {
                address: address.to_string(),
                after: Duration::ZERO,
            },
            _ => ConnectError::Io(error),
        }
    }
}

/// The address resolver could not produce an address.
#[derive(Debug, Error)]
#[error("cannot resolve address: {message}")]
pub struct ResolveError {
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl ResolveError {
    /// Creates a resolution error with a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a resolution error wrapping an underlying cause.
    pub fn with_source<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// The human readable message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// A setup-time configuration failure. Never retried.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// A transport mode was requested that this build or platform lacks.
    #[error("{transport} transport is not available: {reason}")]
    NativeTransportUnavailable {
        /// The requested transport (e.g. `"unix-socket"`).
        transport: &'static str,
        /// Why it is unavailable.
        reason: &'static str,
    },

    /// An address could not be constructed from user input.
    #[error("invalid address {input:?}: {reason}")]
    InvalidAddress {
        /// The offending input.
        input: String,
        /// What is wrong with it.
        reason: &'static str,
    },

    /// The I/O event loop could not be created.
    #[error("cannot create event loop: {0}")]
    EventLoop(#[source] io::Error),
}

/// A failure reported by the server for one command.
///
/// Owned by the protocol layer. It says nothing about the health of the
/// connection and must never trigger a reconnect.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct CommandError {
    message: String,
}

impl CommandError {
    /// Wraps an error reply from the server.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Full error message as sent by the server.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The leading error code, e.g. `ERR` or `WRONGTYPE`.
    pub fn prefix(&self) -> &str {
        self.message
            .split_whitespace()
            .next()
            .unwrap_or_default()
    }
}

/// Any failure surfaced by the client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Transport could not be established or was lost.
    #[error(transparent)]
    Transport(#[from] ConnectError),

    /// The reconnect address could not be resolved.
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// Invalid setup; fix the configuration.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// The server rejected a command.
    #[error(transparent)]
    Command(#[from] CommandError),
}

impl ClientError {
    /// True for failures that clear up by themselves once the connection
    /// is re-established.
    pub fn is_transient(&self) -> bool {
        matches!(self, ClientError::Transport(_) | ClientError::Resolve(_))
    }

    /// True if the watchdog should react to this failure by reconnecting.
    pub fn triggers_reconnect(&self) -> bool {
        matches!(self, ClientError::Transport(_))
    }

    /// The server-reported command failure, if this is one.
    pub fn as_command(&self) -> Option<&CommandError> {
        match self {
            ClientError::Command(e) => Some(e),
            _ => None,
        }
    }
}
