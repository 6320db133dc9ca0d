//! Watchdog integration suites.
//!
//! - backoff.rs: delay sequence, saturation, reset after success
//! - lifecycle.rs: duplicate and stale notifications, single-flight attempts
//! - cancellation.rs: switching reconnection off and shutting down
//! - logging.rs: one warning per outage, one info line on recovery
//! - resolver.rs: address resolution and fallback
//! - transport.rs: real TCP sockets and the tower adapter

mod resolver;
mod support;
