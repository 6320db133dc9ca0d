//! Transport channel abstraction.

use crate::address::Address;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Process-unique identity of a transport channel.
///
/// The watchdog uses it to tell a late notification about an old channel
/// apart from one about the channel it currently tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelId(u64);

impl ChannelId {
    /// Allocates a fresh id.
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        ChannelId(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    /// The raw id value.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One live network connection.
///
/// Lifecycle notifications are not part of this trait: whoever owns the I/O
/// for the channel reports "became active" / "became inactive" through
/// [`WatchdogHandle`](crate::WatchdogHandle), exactly once per transition.
pub trait TransportChannel: Send + Sync + 'static {
    /// Stable identity of this channel.
    fn id(&self) -> ChannelId;

    /// The address this channel is connected to, if known.
    fn remote_address(&self) -> Option<Address>;

    /// Whether the channel is currently usable.
    fn is_active(&self) -> bool;
}
