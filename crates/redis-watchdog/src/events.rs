//! Lifecycle events published by the watchdog.
//!
//! Every variant carries the watchdog `name` and the `timestamp` at which the
//! supervisor emitted it.

use crate::address::Address;
use crate::channel::ChannelId;
use redis_watchdog_core::events::LifecycleEvent;
use std::time::{Duration, Instant};

/// Events emitted by the watchdog.
#[derive(Debug, Clone)]
pub enum ReconnectEvent {
    /// A channel became active and is now tracked.
    ChannelActive {
        name: String,
        timestamp: Instant,
        channel: ChannelId,
        /// Remote address reported by the channel, if it knows one.
        address: Option<Address>,
    },
    /// The tracked channel became inactive.
    ChannelInactive {
        name: String,
        timestamp: Instant,
        channel: ChannelId,
    },
    /// A reconnect attempt was armed.
    ReconnectScheduled {
        name: String,
        timestamp: Instant,
        /// Backoff level, 1-based and capped at 14.
        attempt: u32,
        /// Time until the attempt runs.
        delay: Duration,
    },
    /// A reconnect attempt is starting.
    ReconnectAttempt {
        name: String,
        timestamp: Instant,
        attempt: u32,
        /// Address being dialed; `None` when none is known yet.
        address: Option<Address>,
    },
    /// The resolver failed; the attempt continues with the last known address.
    ResolveFailed {
        name: String,
        timestamp: Instant,
        attempt: u32,
        error: String,
    },
    /// A reconnect attempt failed and will be retried.
    ConnectFailed {
        name: String,
        timestamp: Instant,
        attempt: u32,
        /// Rendered [`ConnectError`](redis_watchdog_core::ConnectError).
        error: String,
    },
    /// A reconnect attempt succeeded.
    Reconnected {
        name: String,
        timestamp: Instant,
        attempt: u32,
        address: Address,
    },
    /// Reconnection was switched off.
    ReconnectDisabled {
        name: String,
        timestamp: Instant,
        /// Whether an armed reconnect timer was cancelled.
        cancelled_pending: bool,
    },
}

impl LifecycleEvent for ReconnectEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ReconnectEvent::ChannelActive { .. } => "channel_active",
            ReconnectEvent::ChannelInactive { .. } => "channel_inactive",
            ReconnectEvent::ReconnectScheduled { .. } => "reconnect_scheduled",
            ReconnectEvent::ReconnectAttempt { .. } => "reconnect_attempt",
            ReconnectEvent::ResolveFailed { .. } => "resolve_failed",
            ReconnectEvent::ConnectFailed { .. } => "connect_failed",
            ReconnectEvent::Reconnected { .. } => "reconnected",
            ReconnectEvent::ReconnectDisabled { .. } => "reconnect_disabled",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            ReconnectEvent::ChannelActive { timestamp, .. }
            | ReconnectEvent::ChannelInactive { timestamp, .. }
            | ReconnectEvent::ReconnectScheduled { timestamp, .. }
            | ReconnectEvent::ReconnectAttempt { timestamp, .. }
            | ReconnectEvent::ResolveFailed { timestamp, .. }
            | ReconnectEvent::ConnectFailed { timestamp, .. }
            | ReconnectEvent::Reconnected { timestamp, .. }
            | ReconnectEvent::ReconnectDisabled { timestamp, .. } => *timestamp,
        }
    }

    fn watchdog_name(&self) -> &str {
        match self {
            ReconnectEvent::ChannelActive { name, .. }
            | ReconnectEvent::ChannelInactive { name, .. }
            | ReconnectEvent::ReconnectScheduled { name, .. }
            | ReconnectEvent::ReconnectAttempt { name, .. }
            | ReconnectEvent::ResolveFailed { name, .. }
            | ReconnectEvent::ConnectFailed { name, .. }
            | ReconnectEvent::Reconnected { name, .. }
            | ReconnectEvent::ReconnectDisabled { name, .. } => name,
        }
    }
}
