//! Watchdog reconnecting a TCP connection after the server drops it.
//!
//! A local listener plays the server: it closes the first connection after a
//! short delay and keeps every later one open. The watchdog notices the loss
//! through `channel_inactive` and dials again with its default backoff.
//!
//! Run with:
//! ```sh
//! cargo run -p redis-watchdog --example watchdog_basic
//! ```

use redis_watchdog::{
    Address, ConnectionFactory, TcpConnector, TokioTimer, TransportChannel, Watchdog,
};
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::net::TcpListener;
use tracing::Level;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_max_level(Level::DEBUG).init();

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let address = Address::from(listener.local_addr()?);

    tokio::spawn(async move {
        let mut accepted = 0;
        while let Ok((socket, peer)) = listener.accept().await {
            accepted += 1;
            println!("server: accepted {} (connection {})", peer, accepted);
            let hold = if accepted == 1 {
                Duration::from_millis(200)
            } else {
                Duration::from_secs(60)
            };
            tokio::spawn(async move {
                tokio::time::sleep(hold).await;
                drop(socket);
            });
        }
    });

    let config = Watchdog::builder()
        .name("example")
        .connect_timeout(Duration::from_secs(1))
        .on_scheduled(|attempt, delay| {
            println!("watchdog: attempt {} in {:?}", attempt, delay);
        })
        .on_reconnected(|address| println!("watchdog: reconnected to {}", address))
        .build();

    let connector = TcpConnector::new();
    let watchdog = Watchdog::spawn(config, connector.clone(), TokioTimer::new());

    let channel = connector.connect(&address).await?;
    watchdog.channel_active(channel.clone())?;

    // Codec side: read until the server hangs up.
    let mut stream = channel.take_stream().ok_or("stream already taken")?;
    let mut buf = [0u8; 64];
    let read = stream.read(&mut buf).await?;
    println!("client: connection closed by server ({} bytes read)", read);
    channel.close();
    watchdog.channel_inactive(&channel)?;

    let replacement = loop {
        let candidate = watchdog.connected().await?;
        if candidate.id() != channel.id() {
            break candidate;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    };

    println!(
        "client: now on channel {} ({:?}), {} reconnect(s)",
        replacement.id(),
        watchdog.state().state(),
        watchdog.state().reconnects()
    );

    watchdog.shutdown();
    Ok(())
}
