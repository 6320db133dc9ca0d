//! Shared fixtures: a scripted connector, a channel double and an event log.

#![allow(dead_code)]

use futures::future::BoxFuture;
use redis_watchdog::{
    Address, ChannelId, ConnectError, ConnectionFactory, ConnectionState, EventListener,
    LifecycleEvent, ReconnectEvent, TokioTimer, TransportChannel, Watchdog, WatchdogConfigBuilder,
    WatchdogHandle,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub fn primary() -> Address {
    Address::host("cache-primary.internal", 6379)
}

pub fn replica() -> Address {
    Address::host("cache-replica.internal", 6379)
}

/// Channel double with an externally controlled activity flag.
#[derive(Debug)]
pub struct MockChannel {
    id: ChannelId,
    address: Option<Address>,
    active: AtomicBool,
}

impl MockChannel {
    pub fn new(address: Address) -> Arc<Self> {
        Arc::new(Self {
            id: ChannelId::next(),
            address: Some(address),
            active: AtomicBool::new(true),
        })
    }

    /// A channel that does not know its remote address.
    pub fn anonymous() -> Arc<Self> {
        Arc::new(Self {
            id: ChannelId::next(),
            address: None,
            active: AtomicBool::new(true),
        })
    }

    pub fn close(&self) {
        self.active.store(false, Ordering::SeqCst);
    }
}

impl TransportChannel for MockChannel {
    fn id(&self) -> ChannelId {
        self.id
    }

    fn remote_address(&self) -> Option<Address> {
        self.address.clone()
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

/// What a single connect attempt does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Connect,
    Refuse,
    /// Never completes; only a connect timeout ends it.
    Hang,
}

struct Inner {
    script: Mutex<VecDeque<Outcome>>,
    then: Outcome,
    dialed: Mutex<Vec<Address>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

/// Connector that plays back a script of outcomes, then repeats `then`.
#[derive(Clone)]
pub struct MockConnector {
    inner: Arc<Inner>,
    latency: Duration,
}

impl MockConnector {
    pub fn new(script: impl IntoIterator<Item = Outcome>, then: Outcome) -> Self {
        Self {
            inner: Arc::new(Inner {
                script: Mutex::new(script.into_iter().collect()),
                then,
                dialed: Mutex::new(Vec::new()),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
            }),
            latency: Duration::ZERO,
        }
    }

    /// Refuses `failures` times, then connects.
    pub fn failing(failures: usize) -> Self {
        Self::new(std::iter::repeat_n(Outcome::Refuse, failures), Outcome::Connect)
    }

    /// Refuses forever.
    pub fn refusing() -> Self {
        Self::new([], Outcome::Refuse)
    }

    /// Every attempt takes `latency` before it resolves.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn dialed(&self) -> Vec<Address> {
        self.inner.dialed.lock().unwrap().clone()
    }

    pub fn attempts(&self) -> usize {
        self.inner.dialed.lock().unwrap().len()
    }

    pub fn max_in_flight(&self) -> usize {
        self.inner.max_in_flight.load(Ordering::SeqCst)
    }
}

struct InFlight(Arc<Inner>);

impl InFlight {
    fn enter(inner: Arc<Inner>) -> Self {
        let now = inner.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        inner.max_in_flight.fetch_max(now, Ordering::SeqCst);
        Self(inner)
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

impl ConnectionFactory for MockConnector {
    type Channel = MockChannel;

    fn connect(
        &self,
        address: &Address,
    ) -> BoxFuture<'static, Result<Arc<MockChannel>, ConnectError>> {
        let address = address.clone();
        self.inner.dialed.lock().unwrap().push(address.clone());
        let outcome = self
            .inner
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(self.inner.then);
        let inner = Arc::clone(&self.inner);
        let latency = self.latency;

        Box::pin(async move {
            let _guard = InFlight::enter(inner);
            if !latency.is_zero() {
                tokio::time::sleep(latency).await;
            }
            match outcome {
                Outcome::Connect => Ok(MockChannel::new(address)),
                Outcome::Refuse => Err(ConnectError::Refused {
                    address: address.to_string(),
                }),
                Outcome::Hang => {
                    futures::future::pending::<()>().await;
                    Err(ConnectError::NoAddress)
                }
            }
        })
    }
}

/// Records every event the watchdog emits.
#[derive(Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<ReconnectEvent>>>,
}

impl EventListener<ReconnectEvent> for EventLog {
    fn on_event(&self, event: &ReconnectEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

impl EventLog {
    pub fn events(&self) -> Vec<ReconnectEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, event_type: &str) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.event_type() == event_type)
            .count()
    }

    /// `(attempt, delay)` of every scheduled reconnect, in order.
    pub fn scheduled(&self) -> Vec<(u32, Duration)> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|e| match e {
                ReconnectEvent::ReconnectScheduled { attempt, delay, .. } => {
                    Some((*attempt, *delay))
                }
                _ => None,
            })
            .collect()
    }

    pub fn delays_ms(&self) -> Vec<u64> {
        self.scheduled()
            .into_iter()
            .map(|(_, delay)| delay.as_millis() as u64)
            .collect()
    }

    pub fn connect_errors(&self) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|e| match e {
                ReconnectEvent::ConnectFailed { error, .. } => Some(error.clone()),
                _ => None,
            })
            .collect()
    }
}

/// Spawns a watchdog and reports an initial live channel at [`primary`].
pub async fn start(
    config: WatchdogConfigBuilder,
    connector: MockConnector,
) -> (WatchdogHandle<MockChannel>, Arc<MockChannel>) {
    let watchdog = Watchdog::spawn(config.build(), connector, TokioTimer::new());
    let channel = MockChannel::new(primary());
    watchdog.channel_active(Arc::clone(&channel)).unwrap();
    watchdog.state().wait_for(ConnectionState::Connected).await;
    (watchdog, channel)
}

/// Closes `channel` and reports it inactive.
pub fn lose(watchdog: &WatchdogHandle<MockChannel>, channel: &MockChannel) {
    channel.close();
    watchdog.channel_inactive(channel).unwrap();
}

/// Loses `channel` and waits until the watchdog has armed its first retry.
pub async fn lose_and_wait_scheduled(
    watchdog: &WatchdogHandle<MockChannel>,
    channel: &MockChannel,
) {
    lose(watchdog, channel);
    watchdog
        .state()
        .wait_for(ConnectionState::RetryScheduled)
        .await;
}

/// Waits until the watchdog tracks a channel other than `old`.
pub async fn replacement_for(
    watchdog: &WatchdogHandle<MockChannel>,
    old: ChannelId,
) -> Arc<MockChannel> {
    loop {
        if let Some(channel) = watchdog.channel() {
            if channel.id() != old && channel.is_active() {
                return channel;
            }
        }
        watchdog.state().wait_for(ConnectionState::Connected).await;
        tokio::task::yield_now().await;
    }
}
