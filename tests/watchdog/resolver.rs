use super::support::*;
use redis_watchdog::{
    Address, ReconnectEvent, ResolveError, StaticResolver, TransportChannel, Watchdog,
    resolver_async_fn, resolver_fn,
};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Resolver answering from a script, then repeating the last answer.
fn scripted(
    answers: Vec<Result<Address, &'static str>>,
) -> impl Fn() -> Result<Address, ResolveError> + Send + Sync + 'static {
    let answers = Arc::new(Mutex::new(VecDeque::from(answers)));
    move || {
        let mut answers = answers.lock().unwrap();
        let answer = if answers.len() > 1 {
            answers.pop_front()
        } else {
            answers.front().cloned()
        };
        match answer {
            Some(Ok(address)) => Ok(address),
            Some(Err(message)) => Err(ResolveError::new(message)),
            None => Err(ResolveError::new("no answer")),
        }
    }
}

#[tokio::test(start_paused = true)]
async fn failed_lookup_falls_back_to_the_previous_address() {
    let log = EventLog::default();
    let relocated = Address::host("cache-relocated.internal", 6379);
    let connector = MockConnector::failing(2);
    let resolver = resolver_fn(scripted(vec![
        Ok(relocated.clone()),
        Err("sentinel unreachable"),
        Ok(replica()),
    ]));

    let (watchdog, first) = start(
        Watchdog::builder().resolver(resolver).listener(log.clone()),
        connector.clone(),
    )
    .await;

    lose_and_wait_scheduled(&watchdog, &first).await;
    let second = replacement_for(&watchdog, first.id()).await;

    // Attempt 2 reuses what attempt 1 resolved; attempt 3 follows the resolver.
    assert_eq!(
        connector.dialed(),
        vec![relocated.clone(), relocated, replica()]
    );
    assert_eq!(second.remote_address(), Some(replica()));
    assert_eq!(watchdog.state().remote_address(), Some(replica()));

    let resolve_failures: Vec<(u32, String)> = log
        .events()
        .into_iter()
        .filter_map(|e| match e {
            ReconnectEvent::ResolveFailed { attempt, error, .. } => Some((attempt, error)),
            _ => None,
        })
        .collect();
    assert_eq!(
        resolve_failures,
        vec![(2, "cannot resolve address: sentinel unreachable".to_string())]
    );
}

#[tokio::test(start_paused = true)]
async fn lookup_failure_before_any_resolution_uses_the_channel_address() {
    let connector = MockConnector::failing(0);
    let resolver = resolver_fn(scripted(vec![Err("directory down")]));

    let (watchdog, first) = start(Watchdog::builder().resolver(resolver), connector.clone()).await;

    lose_and_wait_scheduled(&watchdog, &first).await;
    replacement_for(&watchdog, first.id()).await;

    assert_eq!(connector.dialed(), vec![primary()]);
}

#[tokio::test(start_paused = true)]
async fn resolver_is_consulted_before_every_attempt() {
    let connector = MockConnector::failing(3);
    let (watchdog, first) = start(
        Watchdog::builder().resolver(StaticResolver::new(replica())),
        connector.clone(),
    )
    .await;

    lose_and_wait_scheduled(&watchdog, &first).await;
    replacement_for(&watchdog, first.id()).await;

    assert_eq!(connector.dialed(), vec![replica(); 4]);
}

#[tokio::test(start_paused = true)]
async fn async_resolver_delay_counts_toward_the_attempt() {
    let connector = MockConnector::failing(0);
    let resolver = resolver_async_fn(|| async {
        tokio::time::sleep(Duration::from_millis(30)).await;
        Ok(replica())
    });

    let (watchdog, first) = start(Watchdog::builder().resolver(resolver), connector.clone()).await;

    let lost_at = tokio::time::Instant::now();
    lose_and_wait_scheduled(&watchdog, &first).await;
    let second = replacement_for(&watchdog, first.id()).await;

    assert!(lost_at.elapsed() >= Duration::from_millis(34));
    assert_eq!(second.remote_address(), Some(replica()));
    assert_eq!(connector.max_in_flight(), 1);
}

#[tokio::test(start_paused = true)]
async fn hung_lookup_times_out_and_uses_the_last_address() {
    let log = EventLog::default();
    let connector = MockConnector::failing(0);
    let resolver =
        resolver_async_fn(|| futures::future::pending::<Result<Address, ResolveError>>());

    let (watchdog, first) = start(
        Watchdog::builder()
            .resolver(resolver)
            .connect_timeout(Duration::from_millis(100))
            .listener(log.clone()),
        connector.clone(),
    )
    .await;

    lose_and_wait_scheduled(&watchdog, &first).await;
    replacement_for(&watchdog, first.id()).await;

    assert_eq!(connector.dialed(), vec![primary()]);
    let errors: Vec<String> = log
        .events()
        .into_iter()
        .filter_map(|e| match e {
            ReconnectEvent::ResolveFailed { error, .. } => Some(error),
            _ => None,
        })
        .collect();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("timed out after 100ms"), "{}", errors[0]);
}
