//! The reconnect supervisor.
//!
//! All supervisor state is owned by one actor task. Lifecycle notifications
//! from the I/O side and timer fires arrive as messages on a single queue and
//! are handled one at a time; a reconnect attempt is awaited inside the actor,
//! so no two attempts for one watchdog can overlap and no update is lost to a
//! race between a connect completing and a late notification for the old
//! channel.
//!
//! While an attempt is pending the actor keeps reading its queue. An active
//! channel or a shutdown abandons the attempt, so a connect that never
//! completes cannot wedge the watchdog.

use crate::address::Address;
use crate::channel::{ChannelId, TransportChannel};
use crate::config::{WatchdogConfig, WatchdogConfigBuilder};
use crate::events::ReconnectEvent;
use crate::factory::ConnectionFactory;
use crate::policy::RETRY_ATTEMPTS_MAX;
use crate::state::{ConnectionState, WatchdogState};
use crate::timer::{CancelToken, TimerService};
#[cfg(feature = "metrics")]
use metrics::{counter, gauge};
use redis_watchdog_core::{ConnectError, ResolveError};
use std::collections::VecDeque;
use std::future::Future;
use std::ops::ControlFlow;
use std::pin::pin;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, trace, warn};

/// Returned when notifying a watchdog whose actor has already exited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("watchdog has stopped")]
pub struct WatchdogStopped;

enum Message<C> {
    Active(Arc<C>),
    Inactive(ChannelId),
    Fire { generation: u64 },
    SetReconnect(bool),
    Shutdown,
}

type Inbox<C> = mpsc::UnboundedReceiver<Message<C>>;

/// Entry point for starting watchdogs.
///
/// ```no_run
/// use redis_watchdog::{TcpConnector, TokioTimer, Watchdog, WatchdogConfig};
///
/// # async fn example() {
/// let config = WatchdogConfig::builder().name("primary").build();
/// let watchdog = Watchdog::spawn(config, TcpConnector::new(), TokioTimer::new());
///
/// // The I/O layer reports lifecycle transitions:
/// // watchdog.channel_active(channel.clone());
/// // watchdog.channel_inactive(&channel);
/// # let _ = watchdog;
/// # }
/// ```
#[derive(Debug)]
pub struct Watchdog;

impl Watchdog {
    /// Shorthand for [`WatchdogConfig::builder`].
    pub fn builder() -> WatchdogConfigBuilder {
        WatchdogConfig::builder()
    }

    /// Starts the supervisor actor and returns a handle to it.
    ///
    /// The actor runs until [`WatchdogHandle::shutdown`] is called or every
    /// handle is dropped.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a tokio runtime.
    pub fn spawn<F, T>(config: WatchdogConfig, factory: F, timer: T) -> WatchdogHandle<F::Channel>
    where
        F: ConnectionFactory,
        T: TimerService,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let (slot, slot_rx) = watch::channel(None);
        let state = WatchdogState::new(config.reconnect, config.initial_address.clone());

        let supervisor = Supervisor::new(
            config,
            factory,
            timer,
            tx.downgrade(),
            state.clone(),
            slot,
        );
        tokio::spawn(supervisor.run(rx));

        WatchdogHandle {
            tx,
            state,
            slot: slot_rx,
        }
    }
}

/// Handle to a running watchdog.
///
/// Notifications are queued and never block the caller, so they are safe to
/// send from I/O callbacks.
pub struct WatchdogHandle<C> {
    tx: mpsc::UnboundedSender<Message<C>>,
    state: WatchdogState,
    slot: watch::Receiver<Option<Arc<C>>>,
}

impl<C> Clone for WatchdogHandle<C> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            state: self.state.clone(),
            slot: self.slot.clone(),
        }
    }
}

impl<C> std::fmt::Debug for WatchdogHandle<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchdogHandle")
            .field("state", &self.state)
            .field("stopped", &self.tx.is_closed())
            .finish()
    }
}

impl<C: TransportChannel> WatchdogHandle<C> {
    /// Reports that `channel` became active. The watchdog tracks it from now on
    /// and resets its backoff.
    pub fn channel_active(&self, channel: Arc<C>) -> Result<(), WatchdogStopped> {
        self.send(Message::Active(channel))
    }

    /// Reports that `channel` became inactive.
    pub fn channel_inactive(&self, channel: &C) -> Result<(), WatchdogStopped> {
        self.send(Message::Inactive(channel.id()))
    }

    /// Turns reconnection on or off.
    ///
    /// Turning it off cancels an armed reconnect timer. An attempt that is
    /// already executing runs to completion: if it succeeds the new channel
    /// is kept, if it fails nothing further is scheduled.
    pub fn set_reconnect(&self, enabled: bool) -> Result<(), WatchdogStopped> {
        self.send(Message::SetReconnect(enabled))
    }

    /// Observable state.
    pub fn state(&self) -> &WatchdogState {
        &self.state
    }

    /// The channel currently considered live, if any.
    pub fn channel(&self) -> Option<Arc<C>> {
        self.slot.borrow().clone()
    }

    /// Waits until a live channel is available and returns it.
    pub async fn connected(&self) -> Result<Arc<C>, WatchdogStopped> {
        let mut slot = self.slot.clone();
        let current = slot
            .wait_for(Option::is_some)
            .await
            .map_err(|_| WatchdogStopped)?;
        current.clone().ok_or(WatchdogStopped)
    }

    /// Disables reconnection and stops the actor, abandoning any attempt in
    /// progress. Idempotent.
    pub fn shutdown(&self) {
        let _ = self.tx.send(Message::Shutdown);
    }

    /// Whether the actor has exited.
    pub fn is_stopped(&self) -> bool {
        self.tx.is_closed()
    }

    fn send(&self, message: Message<C>) -> Result<(), WatchdogStopped> {
        self.tx.send(message).map_err(|_| WatchdogStopped)
    }
}

struct Tracked<C> {
    id: ChannelId,
    channel: Weak<C>,
}

impl<C: TransportChannel> Tracked<C> {
    fn is_live(&self) -> bool {
        self.channel
            .upgrade()
            .is_some_and(|channel| channel.is_active())
    }
}

struct Pending {
    generation: u64,
    token: CancelToken,
}

/// Why an attempt ended before its connect or lookup completed.
enum Interrupted {
    /// A channel was reported active and is now tracked.
    Superseded,
    /// The actor has to exit.
    Stopped,
}

impl Interrupted {
    fn into_flow(self) -> ControlFlow<()> {
        match self {
            Interrupted::Superseded => ControlFlow::Continue(()),
            Interrupted::Stopped => ControlFlow::Break(()),
        }
    }
}

async fn with_timeout<T, E>(
    work: impl Future<Output = Result<T, E>>,
    limit: Option<Duration>,
    on_timeout: impl FnOnce(Duration) -> E,
) -> Result<T, E> {
    match limit {
        Some(after) => tokio::time::timeout(after, work)
            .await
            .unwrap_or_else(|_| Err(on_timeout(after))),
        None => work.await,
    }
}

struct Supervisor<F: ConnectionFactory, T> {
    config: WatchdogConfig,
    factory: F,
    timer: T,
    tx: mpsc::WeakUnboundedSender<Message<F::Channel>>,
    state: WatchdogState,
    slot: watch::Sender<Option<Arc<F::Channel>>>,
    reconnect: bool,
    attempts: u32,
    channel: Option<Tracked<F::Channel>>,
    remote_address: Option<Address>,
    first_attempt: bool,
    pending: Option<Pending>,
    generation: u64,
    backlog: VecDeque<Message<F::Channel>>,
}

impl<F, T> Supervisor<F, T>
where
    F: ConnectionFactory,
    T: TimerService,
{
    fn new(
        config: WatchdogConfig,
        factory: F,
        timer: T,
        tx: mpsc::WeakUnboundedSender<Message<F::Channel>>,
        state: WatchdogState,
        slot: watch::Sender<Option<Arc<F::Channel>>>,
    ) -> Self {
        Self {
            reconnect: config.reconnect,
            remote_address: config.initial_address.clone(),
            config,
            factory,
            timer,
            tx,
            state,
            slot,
            attempts: 0,
            channel: None,
            first_attempt: false,
            pending: None,
            generation: 0,
            backlog: VecDeque::new(),
        }
    }

    async fn run(mut self, mut rx: Inbox<F::Channel>) {
        debug!(watchdog = %self.config.name, "watchdog started");

        loop {
            let message = match self.backlog.pop_front() {
                Some(message) => message,
                None => match rx.recv().await {
                    Some(message) => message,
                    None => break,
                },
            };

            let flow = match message {
                Message::Active(channel) => {
                    self.on_active(channel);
                    ControlFlow::Continue(())
                }
                Message::Inactive(id) => {
                    self.on_inactive(id);
                    ControlFlow::Continue(())
                }
                Message::Fire { generation } => self.on_fire(generation, &mut rx).await,
                Message::SetReconnect(enabled) => {
                    self.set_reconnect(enabled);
                    ControlFlow::Continue(())
                }
                Message::Shutdown => {
                    self.set_reconnect(false);
                    ControlFlow::Break(())
                }
            };
            if flow.is_break() {
                break;
            }
        }

        if let Some(pending) = self.pending.take() {
            pending.token.cancel();
        }
        self.channel = None;
        self.slot.send_replace(None);
        self.enter(ConnectionState::Disconnected);
        debug!(watchdog = %self.config.name, "watchdog stopped");
    }

    fn on_active(&mut self, channel: Arc<F::Channel>) {
        if let Some(pending) = self.pending.take() {
            pending.token.cancel();
        }

        let id = channel.id();
        let address = channel.remote_address();
        self.bind(channel);

        debug!(watchdog = %self.config.name, channel = %id, "channel active");
        self.config
            .event_listeners
            .emit(&ReconnectEvent::ChannelActive {
                name: self.config.name.clone(),
                timestamp: Instant::now(),
                channel: id,
                address,
            });
    }

    fn on_inactive(&mut self, id: ChannelId) {
        if let Some(tracked) = &self.channel {
            if tracked.id != id && tracked.is_live() {
                debug!(
                    watchdog = %self.config.name,
                    channel = %id,
                    tracked = %tracked.id,
                    "ignoring inactive notification for an untracked channel"
                );
                return;
            }
        }

        self.channel = None;
        self.slot.send_replace(None);

        debug!(watchdog = %self.config.name, channel = %id, "channel inactive");
        self.config
            .event_listeners
            .emit(&ReconnectEvent::ChannelInactive {
                name: self.config.name.clone(),
                timestamp: Instant::now(),
                channel: id,
            });

        if !self.reconnect {
            self.enter(ConnectionState::Disconnected);
            return;
        }

        // Repeated notifications within one outage must not start a second
        // retry chain or re-arm the first-attempt logging.
        if self.pending.is_some() {
            return;
        }

        self.first_attempt = true;
        self.schedule_reconnect();
    }

    fn schedule_reconnect(&mut self) {
        if self.channel.as_ref().is_some_and(Tracked::is_live) || self.pending.is_some() {
            return;
        }

        let attempt = (self.attempts + 1).min(RETRY_ATTEMPTS_MAX);
        self.set_attempts(attempt);
        let delay = self.config.policy.delay_for_attempt(attempt);

        self.generation += 1;
        let generation = self.generation;
        let tx = self.tx.clone();
        let token = self.timer.schedule(
            delay,
            Box::new(move || {
                if let Some(tx) = tx.upgrade() {
                    let _ = tx.send(Message::Fire { generation });
                }
            }),
        );
        self.pending = Some(Pending { generation, token });
        self.enter(ConnectionState::RetryScheduled);

        debug!(
            watchdog = %self.config.name,
            attempt,
            delay_ms = delay.as_millis() as u64,
            "reconnect scheduled"
        );
        self.config
            .event_listeners
            .emit(&ReconnectEvent::ReconnectScheduled {
                name: self.config.name.clone(),
                timestamp: Instant::now(),
                attempt,
                delay,
            });
    }

    async fn on_fire(&mut self, generation: u64, rx: &mut Inbox<F::Channel>) -> ControlFlow<()> {
        match &self.pending {
            Some(pending) if pending.generation == generation => {}
            _ => {
                trace!(watchdog = %self.config.name, generation, "ignoring stale timer");
                return ControlFlow::Continue(());
            }
        }
        self.pending = None;

        if !self.reconnect {
            self.enter(ConnectionState::Disconnected);
            return ControlFlow::Continue(());
        }
        if self.channel.as_ref().is_some_and(Tracked::is_live) {
            self.enter(ConnectionState::Connected);
            return ControlFlow::Continue(());
        }

        self.attempt(rx).await
    }

    async fn attempt(&mut self, rx: &mut Inbox<F::Channel>) -> ControlFlow<()> {
        let first = self.first_attempt;
        let attempt = self.attempts;
        self.enter(ConnectionState::Retrying);

        if first {
            info!(watchdog = %self.config.name, "connecting");
        }

        if let Some(resolver) = self.config.resolver.clone() {
            let lookup = with_timeout(resolver.resolve(), self.config.connect_timeout, |after| {
                ResolveError::new(format!("address lookup timed out after {:?}", after))
            });
            let resolved = match self.race(rx, lookup).await {
                Ok(resolved) => resolved,
                Err(interrupted) => return interrupted.into_flow(),
            };

            match resolved {
                Ok(address) => {
                    self.state.set_remote_address(address.clone());
                    self.remote_address = Some(address);
                }
                Err(error) => {
                    if first {
                        warn!(
                            watchdog = %self.config.name,
                            error = %error,
                            "cannot retrieve the current address from the resolver, using the last known address"
                        );
                    }

                    #[cfg(feature = "metrics")]
                    counter!("watchdog_resolve_failures_total", "watchdog" => self.config.name.clone())
                        .increment(1);

                    self.config
                        .event_listeners
                        .emit(&ReconnectEvent::ResolveFailed {
                            name: self.config.name.clone(),
                            timestamp: Instant::now(),
                            attempt,
                            error: error.to_string(),
                        });
                }
            }
        }

        let address = self.remote_address.clone();
        self.config
            .event_listeners
            .emit(&ReconnectEvent::ReconnectAttempt {
                name: self.config.name.clone(),
                timestamp: Instant::now(),
                attempt,
                address: address.clone(),
            });

        #[cfg(feature = "metrics")]
        counter!("watchdog_reconnect_attempts_total", "watchdog" => self.config.name.clone())
            .increment(1);

        let outcome = match address {
            Some(address) => {
                let target = address.to_string();
                let connecting = with_timeout(
                    self.factory.connect(&address),
                    self.config.connect_timeout,
                    move |after| ConnectError::TimedOut {
                        address: target,
                        after,
                    },
                );
                match self.race(rx, connecting).await {
                    Ok(result) => result.map(|channel| (channel, address)),
                    Err(interrupted) => return interrupted.into_flow(),
                }
            }
            None => Err(ConnectError::NoAddress),
        };
        self.first_attempt = false;

        match outcome {
            Ok((channel, address)) => {
                info!(watchdog = %self.config.name, "reconnected to {}", address);

                #[cfg(feature = "metrics")]
                counter!("watchdog_reconnects_total", "watchdog" => self.config.name.clone())
                    .increment(1);

                self.bind(channel);
                self.state.record_reconnect();
                self.config
                    .event_listeners
                    .emit(&ReconnectEvent::Reconnected {
                        name: self.config.name.clone(),
                        timestamp: Instant::now(),
                        attempt,
                        address,
                    });
            }
            Err(error) => {
                if first {
                    warn!(watchdog = %self.config.name, attempt, error = %error, "cannot connect");
                }

                #[cfg(feature = "metrics")]
                counter!("watchdog_connect_failures_total", "watchdog" => self.config.name.clone())
                    .increment(1);

                self.config
                    .event_listeners
                    .emit(&ReconnectEvent::ConnectFailed {
                        name: self.config.name.clone(),
                        timestamp: Instant::now(),
                        attempt,
                        error: error.to_string(),
                    });

                if self.reconnect {
                    self.schedule_reconnect();
                } else {
                    self.enter(ConnectionState::Disconnected);
                }
            }
        }
        ControlFlow::Continue(())
    }

    /// Drives one step of an attempt while still serving the inbox.
    ///
    /// An active channel or a shutdown abandons `work` at once. Reconnect
    /// toggles apply immediately; everything else is replayed after the
    /// attempt.
    async fn race<O>(
        &mut self,
        rx: &mut Inbox<F::Channel>,
        work: impl Future<Output = O>,
    ) -> Result<O, Interrupted> {
        let mut work = pin!(work);
        loop {
            tokio::select! {
                output = &mut work => return Ok(output),
                message = rx.recv() => match message {
                    Some(Message::Active(channel)) => {
                        debug!(
                            watchdog = %self.config.name,
                            "attempt superseded by an active channel"
                        );
                        self.on_active(channel);
                        return Err(Interrupted::Superseded);
                    }
                    Some(Message::SetReconnect(enabled)) => self.set_reconnect(enabled),
                    Some(Message::Shutdown) => {
                        self.set_reconnect(false);
                        return Err(Interrupted::Stopped);
                    }
                    Some(message) => self.backlog.push_back(message),
                    None => return Err(Interrupted::Stopped),
                },
            }
        }
    }

    fn set_reconnect(&mut self, enabled: bool) {
        if self.reconnect == enabled {
            return;
        }
        self.reconnect = enabled;
        self.state.set_reconnect_enabled(enabled);

        if enabled {
            debug!(watchdog = %self.config.name, "reconnect enabled");
            return;
        }

        let cancelled_pending = match self.pending.take() {
            Some(pending) => {
                pending.token.cancel();
                self.enter(ConnectionState::Disconnected);
                true
            }
            None => false,
        };

        debug!(watchdog = %self.config.name, cancelled_pending, "reconnect disabled");
        self.config
            .event_listeners
            .emit(&ReconnectEvent::ReconnectDisabled {
                name: self.config.name.clone(),
                timestamp: Instant::now(),
                cancelled_pending,
            });
    }

    fn bind(&mut self, channel: Arc<F::Channel>) {
        self.first_attempt = false;
        self.set_attempts(0);

        if let Some(address) = channel.remote_address() {
            self.state.set_remote_address(address.clone());
            self.remote_address = Some(address);
        }

        self.channel = Some(Tracked {
            id: channel.id(),
            channel: Arc::downgrade(&channel),
        });
        self.slot.send_replace(Some(channel));
        self.enter(ConnectionState::Connected);
    }

    fn set_attempts(&mut self, attempts: u32) {
        self.attempts = attempts;
        self.state.set_attempts(attempts);

        #[cfg(feature = "metrics")]
        gauge!("watchdog_backoff_attempts", "watchdog" => self.config.name.clone())
            .set(attempts as f64);
    }

    fn enter(&self, state: ConnectionState) {
        if self.state.state() != state {
            trace!(watchdog = %self.config.name, state = state.as_str(), "state transition");
        }
        self.state.set_state(state);
    }
}
