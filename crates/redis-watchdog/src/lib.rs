//! Connection watchdog for Redis-style clients.
//!
//! A watchdog sits next to the I/O layer of one logical connection. When the
//! channel it tracks goes inactive, it reconnects in the background with a
//! bounded exponential backoff until a new channel is live or reconnection is
//! switched off.
//!
//! # Features
//!
//! - **Bounded backoff**: 4 ms doubling per attempt up to 32 768 ms by default,
//!   reset after every successful reconnect ([`ReconnectPolicy`])
//! - **Address resolution**: an optional [`AddressResolver`] is asked for the
//!   address before each attempt, falling back to the last known address
//! - **Single-flight attempts**: all state lives in one actor task, so two
//!   reconnect attempts never overlap
//! - **Quiet logs**: one warning per outage, one info line on recovery
//! - **Event system**: every transition is published as a [`ReconnectEvent`]
//! - **Metrics** (feature `metrics`): attempt, failure and reconnect counters
//!
//! # Example
//!
//! ```rust,no_run
//! use redis_watchdog::{
//!     Address, ConnectionFactory, ReconnectPolicy, TcpConnector, TokioTimer, TransportChannel,
//!     Watchdog,
//! };
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Watchdog::builder()
//!     .name("primary")
//!     .policy(ReconnectPolicy::shift())
//!     .connect_timeout(Duration::from_secs(2))
//!     .on_reconnected(|address| println!("back on {}", address))
//!     .build();
//!
//! let connector = TcpConnector::new();
//! let watchdog = Watchdog::spawn(config, connector.clone(), TokioTimer::new());
//!
//! // Initial connect, done by the client.
//! let channel = connector.connect(&"127.0.0.1:6379".parse::<Address>()?).await?;
//! watchdog.channel_active(channel.clone())?;
//!
//! // Later, when the codec sees the connection drop:
//! channel.close();
//! watchdog.channel_inactive(&channel)?;
//!
//! // Whoever needs the connection waits for the replacement.
//! let replacement = watchdog.connected().await?;
//! assert!(replacement.is_active());
//! # Ok(())
//! # }
//! ```

mod address;
mod capability;
mod channel;
mod config;
mod events;
mod factory;
mod policy;
mod resolver;
mod state;
mod supervisor;
mod timer;
mod transport;

pub use address::Address;
pub use capability::NativeTransport;
pub use channel::{ChannelId, TransportChannel};
pub use config::{WatchdogConfig, WatchdogConfigBuilder};
pub use events::ReconnectEvent;
pub use factory::{ConnectionFactory, ServiceConnector};
pub use policy::{IntervalFunction, ReconnectPolicy, RETRY_ATTEMPTS_MAX};
pub use resolver::{
    resolver_async_fn, resolver_fn, AddressResolver, AsyncFnResolver, FnResolver, StaticResolver,
};
pub use state::{ConnectionState, WatchdogState};
pub use supervisor::{Watchdog, WatchdogHandle, WatchdogStopped};
pub use timer::{CancelToken, TimerCallback, TimerService, TokioTimer};
#[cfg(unix)]
pub use transport::UnixConnector;
pub use transport::{StreamChannel, TcpConnector};

pub use redis_watchdog_core::{
    ClientError, CommandError, ConfigurationError, ConnectError, EventListener, EventListeners,
    FnListener, LifecycleEvent, ResolveError,
};
