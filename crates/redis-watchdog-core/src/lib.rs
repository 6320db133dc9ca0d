//! Core infrastructure for redis-watchdog.
//!
//! This crate holds the pieces shared by the connection watchdog and the
//! layers built on top of it:
//! - Lifecycle event system for observability
//! - The client error taxonomy, which keeps transient transport failures
//!   apart from server-reported command failures

pub mod error;
pub mod events;

pub use error::{ClientError, CommandError, ConfigurationError, ConnectError, ResolveError};
pub use events::{EventListener, EventListeners, FnListener, LifecycleEvent};
