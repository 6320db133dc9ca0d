//! Observable watchdog state.

use crate::address::Address;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::watch;

/// Where the watchdog is in its reconnect cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ConnectionState {
    /// A live channel is tracked.
    Connected,

    /// No channel, and nothing pending: reconnection is off or was never needed.
    Disconnected,

    /// A reconnect attempt is armed on the timer.
    RetryScheduled,

    /// A reconnect attempt is executing.
    Retrying,
}

impl ConnectionState {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            ConnectionState::Connected => "connected",
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::RetryScheduled => "retry_scheduled",
            ConnectionState::Retrying => "retrying",
        }
    }
}

struct Shared {
    state: watch::Sender<ConnectionState>,
    attempts: AtomicU32,
    reconnect_enabled: AtomicBool,
    reconnects: AtomicU64,
    remote_address: RwLock<Option<Address>>,
}

/// Read-only view of a watchdog, updated by its actor.
///
/// Cheap to clone; reads never wait on the actor.
#[derive(Clone)]
pub struct WatchdogState {
    shared: Arc<Shared>,
}

impl WatchdogState {
    pub(crate) fn new(reconnect_enabled: bool, remote_address: Option<Address>) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            shared: Arc::new(Shared {
                state,
                attempts: AtomicU32::new(0),
                reconnect_enabled: AtomicBool::new(reconnect_enabled),
                reconnects: AtomicU64::new(0),
                remote_address: RwLock::new(remote_address),
            }),
        }
    }

    /// Current state.
    pub fn state(&self) -> ConnectionState {
        *self.shared.state.borrow()
    }

    /// Consecutive scheduled attempts since the last successful connection.
    pub fn attempts(&self) -> u32 {
        self.shared.attempts.load(Ordering::Acquire)
    }

    /// Whether a lost channel will be reconnected.
    pub fn is_reconnect_enabled(&self) -> bool {
        self.shared.reconnect_enabled.load(Ordering::Acquire)
    }

    /// Number of successful reconnects since the watchdog started.
    pub fn reconnects(&self) -> u64 {
        self.shared.reconnects.load(Ordering::Acquire)
    }

    /// The last known remote address.
    pub fn remote_address(&self) -> Option<Address> {
        self.shared
            .remote_address
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Waits until the state equals `target`.
    ///
    /// Short-lived states can be skipped over if the actor moves on before
    /// this task is polled; wait for stable states such as `Connected`.
    pub async fn wait_for(&self, target: ConnectionState) {
        let mut rx = self.shared.state.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = rx.wait_for(|state| *state == target).await;
    }

    pub(crate) fn set_state(&self, state: ConnectionState) {
        self.shared.state.send_replace(state);
    }

    pub(crate) fn set_attempts(&self, attempts: u32) {
        self.shared.attempts.store(attempts, Ordering::Release);
    }

    pub(crate) fn set_reconnect_enabled(&self, enabled: bool) {
        self.shared
            .reconnect_enabled
            .store(enabled, Ordering::Release);
    }

    pub(crate) fn record_reconnect(&self) {
        self.shared.reconnects.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn set_remote_address(&self, address: Address) {
        *self
            .shared
            .remote_address
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(address);
    }
}

impl std::fmt::Debug for WatchdogState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchdogState")
            .field("state", &self.state())
            .field("attempts", &self.attempts())
            .field("reconnect_enabled", &self.is_reconnect_enabled())
            .field("reconnects", &self.reconnects())
            .finish()
    }
}
