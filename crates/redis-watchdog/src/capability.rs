//! Native transport capability probe.
//!
//! Local (unix domain) socket support is decided once, at compile time, and
//! carried around as a value. Code that needs it asks the descriptor instead
//! of probing the platform again, and a missing capability surfaces as a
//! [`ConfigurationError`] during setup rather than on the first connect.

use crate::address::Address;
use redis_watchdog_core::ConfigurationError;
use std::path::Path;
use tokio::runtime::{Builder, Runtime};

const TRANSPORT: &str = "unix-socket";

/// Whether this build can use native local-socket transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NativeTransport {
    unavailable: Option<&'static str>,
}

impl NativeTransport {
    /// Detects the capability of the current build.
    pub fn detect() -> Self {
        if cfg!(unix) {
            Self { unavailable: None }
        } else {
            Self::unavailable("local sockets are not supported on this platform")
        }
    }

    /// A descriptor that reports the capability as missing.
    pub fn unavailable(reason: &'static str) -> Self {
        Self {
            unavailable: Some(reason),
        }
    }

    /// Whether local sockets can be used.
    pub fn is_available(&self) -> bool {
        self.unavailable.is_none()
    }

    /// Why the capability is missing, if it is.
    pub fn unavailability_reason(&self) -> Option<&'static str> {
        self.unavailable
    }

    /// Fails with [`ConfigurationError::NativeTransportUnavailable`] if the
    /// capability is missing.
    pub fn require_available(&self) -> Result<(), ConfigurationError> {
        match self.unavailable {
            None => Ok(()),
            Some(reason) => Err(ConfigurationError::NativeTransportUnavailable {
                transport: TRANSPORT,
                reason,
            }),
        }
    }

    /// Builds a multi-threaded I/O event loop with `threads` workers.
    ///
    /// `0` lets the runtime pick one worker per core.
    pub fn create_event_loop(&self, threads: usize) -> Result<Runtime, ConfigurationError> {
        self.require_available()?;

        let mut builder = Builder::new_multi_thread();
        if threads > 0 {
            builder.worker_threads(threads);
        }
        builder
            .thread_name("redis-watchdog-io")
            .enable_all()
            .build()
            .map_err(ConfigurationError::EventLoop)
    }

    /// Turns a filesystem path into a local socket address.
    pub fn create_local_socket_address(
        &self,
        path: impl AsRef<Path>,
    ) -> Result<Address, ConfigurationError> {
        self.require_available()?;

        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(ConfigurationError::InvalidAddress {
                input: String::new(),
                reason: "socket path is empty",
            });
        }
        Ok(Address::Unix(path.to_path_buf()))
    }
}

impl Default for NativeTransport {
    fn default() -> Self {
        Self::detect()
    }
}
