//! Watchdog metrics regression tests

use super::helpers::*;
use futures::future::BoxFuture;
use redis_watchdog::{
    Address, ChannelId, ConnectError, ConnectionFactory, ConnectionState, ResolveError,
    TokioTimer, TransportChannel, Watchdog, resolver_fn,
};
use serial_test::serial;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

struct Chan {
    id: ChannelId,
    active: AtomicBool,
}

impl Chan {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            id: ChannelId::next(),
            active: AtomicBool::new(true),
        })
    }
}

impl TransportChannel for Chan {
    fn id(&self) -> ChannelId {
        self.id
    }

    fn remote_address(&self) -> Option<Address> {
        Some(Address::host("cache", 6379))
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

struct Flaky {
    failures: usize,
    calls: AtomicUsize,
}

impl ConnectionFactory for Flaky {
    type Channel = Chan;

    fn connect(&self, address: &Address) -> BoxFuture<'static, Result<Arc<Chan>, ConnectError>> {
        let result = if self.calls.fetch_add(1, Ordering::SeqCst) < self.failures {
            Err(ConnectError::Refused {
                address: address.to_string(),
            })
        } else {
            Ok(Chan::new())
        };
        Box::pin(async move { result })
    }
}

async fn run_outage(name: &str, failures: usize, failing_resolver: bool) {
    let mut builder = Watchdog::builder().name(name);
    if failing_resolver {
        builder = builder.resolver(resolver_fn(|| Err(ResolveError::new("unavailable"))));
    }
    let watchdog = Watchdog::spawn(
        builder.build(),
        Flaky {
            failures,
            calls: AtomicUsize::new(0),
        },
        TokioTimer::new(),
    );

    let first = Chan::new();
    watchdog.channel_active(Arc::clone(&first)).unwrap();
    first.active.store(false, Ordering::SeqCst);
    watchdog.channel_inactive(&first).unwrap();

    watchdog
        .state()
        .wait_for(ConnectionState::RetryScheduled)
        .await;
    watchdog.state().wait_for(ConnectionState::Connected).await;
    watchdog.shutdown();
}

#[tokio::test(start_paused = true)]
#[serial]
async fn watchdog_metrics_exist() {
    init_recorder();

    run_outage("metrics_watchdog", 2, false).await;
    let snapshot = get_metrics_snapshot();

    assert_counter_exists(&snapshot, "watchdog_reconnect_attempts_total");
    assert_metric_has_label(
        &snapshot,
        "watchdog_reconnect_attempts_total",
        "watchdog",
        "metrics_watchdog",
    );

    assert_counter_exists(&snapshot, "watchdog_connect_failures_total");
    assert_metric_has_label(
        &snapshot,
        "watchdog_connect_failures_total",
        "watchdog",
        "metrics_watchdog",
    );

    assert_counter_exists(&snapshot, "watchdog_reconnects_total");
    assert_metric_has_label(
        &snapshot,
        "watchdog_reconnects_total",
        "watchdog",
        "metrics_watchdog",
    );

    assert_gauge_exists(&snapshot, "watchdog_backoff_attempts");
    assert_metric_has_label(
        &snapshot,
        "watchdog_backoff_attempts",
        "watchdog",
        "metrics_watchdog",
    );
}

#[tokio::test(start_paused = true)]
#[serial]
async fn watchdog_metric_values() {
    init_recorder();

    run_outage("metrics_values", 3, false).await;
    let snapshot = get_metrics_snapshot();

    assert_eq!(
        counter_value(&snapshot, "watchdog_reconnect_attempts_total", "metrics_values"),
        Some(4)
    );
    assert_eq!(
        counter_value(&snapshot, "watchdog_connect_failures_total", "metrics_values"),
        Some(3)
    );
    assert_eq!(
        counter_value(&snapshot, "watchdog_reconnects_total", "metrics_values"),
        Some(1)
    );
    // Reset to zero by the successful reconnect.
    assert_eq!(
        gauge_value(&snapshot, "watchdog_backoff_attempts", "metrics_values"),
        Some(0.0)
    );
}

#[tokio::test(start_paused = true)]
#[serial]
async fn resolver_failure_metric() {
    init_recorder();

    run_outage("metrics_resolver", 1, true).await;
    let snapshot = get_metrics_snapshot();

    assert_counter_exists(&snapshot, "watchdog_resolve_failures_total");
    assert_eq!(
        counter_value(&snapshot, "watchdog_resolve_failures_total", "metrics_resolver"),
        Some(2)
    );
}
