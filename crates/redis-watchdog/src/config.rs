use crate::address::Address;
use crate::events::ReconnectEvent;
use crate::policy::ReconnectPolicy;
use crate::resolver::AddressResolver;
use redis_watchdog_core::events::{EventListener, EventListeners, FnListener};
use std::sync::Arc;
use std::time::Duration;

/// Configuration for a connection watchdog.
pub struct WatchdogConfig {
    pub(crate) name: String,
    pub(crate) reconnect: bool,
    pub(crate) policy: ReconnectPolicy,
    pub(crate) connect_timeout: Option<Duration>,
    pub(crate) resolver: Option<Arc<dyn AddressResolver>>,
    pub(crate) initial_address: Option<Address>,
    pub(crate) event_listeners: EventListeners<ReconnectEvent>,
}

impl WatchdogConfig {
    /// Creates a new builder.
    pub fn builder() -> WatchdogConfigBuilder {
        WatchdogConfigBuilder::new()
    }

    /// Name used in logs, events, and metric labels.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether reconnection starts out enabled.
    pub fn reconnect(&self) -> bool {
        self.reconnect
    }

    /// The backoff policy.
    pub fn policy(&self) -> &ReconnectPolicy {
        &self.policy
    }

    /// Upper bound for a single connect attempt, if any.
    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout
    }

    /// Whether an address resolver is configured.
    pub fn has_resolver(&self) -> bool {
        self.resolver.is_some()
    }
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        WatchdogConfigBuilder::new().build()
    }
}

impl std::fmt::Debug for WatchdogConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchdogConfig")
            .field("name", &self.name)
            .field("reconnect", &self.reconnect)
            .field("policy", &self.policy)
            .field("connect_timeout", &self.connect_timeout)
            .field("resolver", &self.resolver.is_some())
            .field("initial_address", &self.initial_address)
            .field("event_listeners", &self.event_listeners.len())
            .finish()
    }
}

/// Builder for [`WatchdogConfig`].
pub struct WatchdogConfigBuilder {
    name: String,
    reconnect: bool,
    policy: ReconnectPolicy,
    connect_timeout: Option<Duration>,
    resolver: Option<Arc<dyn AddressResolver>>,
    initial_address: Option<Address>,
    event_listeners: EventListeners<ReconnectEvent>,
}

impl Default for WatchdogConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl WatchdogConfigBuilder {
    /// Creates a new builder with defaults.
    ///
    /// Defaults:
    /// - name: `"<unnamed>"`
    /// - reconnect: enabled
    /// - policy: [`ReconnectPolicy::Shift`] (4 ms doubling up to 32 768 ms)
    /// - connect_timeout: none
    /// - resolver: none (reuse the last known address)
    pub fn new() -> Self {
        Self {
            name: "<unnamed>".to_string(),
            reconnect: true,
            policy: ReconnectPolicy::default(),
            connect_timeout: None,
            resolver: None,
            initial_address: None,
            event_listeners: EventListeners::new(),
        }
    }

    /// Sets the watchdog name.
    pub fn name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }

    /// Sets whether a lost channel is reconnected. Can be changed later
    /// through the handle.
    pub fn reconnect(mut self, enabled: bool) -> Self {
        self.reconnect = enabled;
        self
    }

    /// Sets the backoff policy.
    pub fn policy(mut self, policy: ReconnectPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Fails a connect attempt that takes longer than `timeout`.
    ///
    /// Without a timeout a hanging connect holds up the reconnect loop
    /// until the transport gives up on its own.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Consults `resolver` before every reconnect attempt.
    pub fn resolver<R>(mut self, resolver: R) -> Self
    where
        R: AddressResolver,
    {
        self.resolver = Some(Arc::new(resolver));
        self
    }

    /// Address to dial if the connection is lost before any channel was
    /// ever observed.
    pub fn initial_address(mut self, address: Address) -> Self {
        self.initial_address = Some(address);
        self
    }

    /// Registers a listener for every event.
    pub fn listener<L>(mut self, listener: L) -> Self
    where
        L: EventListener<ReconnectEvent> + 'static,
    {
        self.event_listeners.add(listener);
        self
    }

    /// Registers a callback when a reconnect attempt is armed.
    ///
    /// # Callback Signature
    /// `Fn(u32, Duration)` - attempt number and the delay before it runs.
    pub fn on_scheduled<F>(mut self, f: F) -> Self
    where
        F: Fn(u32, Duration) + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &ReconnectEvent| {
                if let ReconnectEvent::ReconnectScheduled { attempt, delay, .. } = event {
                    f(*attempt, *delay);
                }
            }));
        self
    }

    /// Registers a callback when a reconnect attempt fails.
    ///
    /// # Callback Signature
    /// `Fn(u32, &str)` - attempt number and the error message.
    pub fn on_connect_failed<F>(mut self, f: F) -> Self
    where
        F: Fn(u32, &str) + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &ReconnectEvent| {
                if let ReconnectEvent::ConnectFailed { attempt, error, .. } = event {
                    f(*attempt, error.as_str());
                }
            }));
        self
    }

    /// Registers a callback when the connection is re-established.
    ///
    /// # Callback Signature
    /// `Fn(&Address)` - the address that was dialed.
    pub fn on_reconnected<F>(mut self, f: F) -> Self
    where
        F: Fn(&Address) + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &ReconnectEvent| {
                if let ReconnectEvent::Reconnected { address, .. } = event {
                    f(address);
                }
            }));
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> WatchdogConfig {
        WatchdogConfig {
            name: self.name,
            reconnect: self.reconnect,
            policy: self.policy,
            connect_timeout: self.connect_timeout,
            resolver: self.resolver,
            initial_address: self.initial_address,
            event_listeners: self.event_listeners,
        }
    }
}
