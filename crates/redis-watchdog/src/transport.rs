//! Tokio-backed connection factories.

use crate::address::Address;
#[cfg(unix)]
use crate::capability::NativeTransport;
use crate::channel::{ChannelId, TransportChannel};
use crate::factory::ConnectionFactory;
use futures::future::BoxFuture;
#[cfg(unix)]
use redis_watchdog_core::ConfigurationError;
use redis_watchdog_core::ConnectError;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::net::TcpStream;
#[cfg(unix)]
use tokio::net::UnixStream;

/// A connected byte stream and its activity flag.
///
/// The codec layer takes the stream out with [`take_stream`](Self::take_stream)
/// and calls [`close`](Self::close) when the connection ends, before reporting
/// the channel inactive to the watchdog.
pub struct StreamChannel<S> {
    id: ChannelId,
    address: Address,
    stream: Mutex<Option<S>>,
    active: AtomicBool,
}

impl<S> StreamChannel<S> {
    /// Wraps a freshly connected stream.
    pub fn new(stream: S, address: Address) -> Self {
        Self {
            id: ChannelId::next(),
            address,
            stream: Mutex::new(Some(stream)),
            active: AtomicBool::new(true),
        }
    }

    /// The address this channel was dialed at.
    pub fn address(&self) -> &Address {
        &self.address
    }

    /// Hands the stream to the caller. Returns `None` after the first call
    /// or after [`close`](Self::close).
    pub fn take_stream(&self) -> Option<S> {
        self.stream
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
    }

    /// Marks the channel inactive and drops the stream if it was not taken.
    pub fn close(&self) {
        self.active.store(false, Ordering::Release);
        self.take_stream();
    }
}

impl<S: Send + 'static> TransportChannel for StreamChannel<S> {
    fn id(&self) -> ChannelId {
        self.id
    }

    fn remote_address(&self) -> Option<Address> {
        Some(self.address.clone())
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

impl<S> fmt::Debug for StreamChannel<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamChannel")
            .field("id", &self.id)
            .field("address", &self.address)
            .field("active", &self.active.load(Ordering::Acquire))
            .finish()
    }
}

/// Dials TCP addresses.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    nodelay: bool,
}

impl TcpConnector {
    /// A connector with `TCP_NODELAY` enabled.
    pub fn new() -> Self {
        Self { nodelay: true }
    }

    /// Sets `TCP_NODELAY` on new connections.
    pub fn nodelay(mut self, nodelay: bool) -> Self {
        self.nodelay = nodelay;
        self
    }
}

impl Default for TcpConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionFactory for TcpConnector {
    type Channel = StreamChannel<TcpStream>;

    fn connect(
        &self,
        address: &Address,
    ) -> BoxFuture<'static, Result<Arc<Self::Channel>, ConnectError>> {
        let address = address.clone();
        let nodelay = self.nodelay;

        Box::pin(async move {
            let stream = match &address {
                Address::Tcp(addr) => TcpStream::connect(addr).await,
                Address::Host { host, port } => TcpStream::connect((host.as_str(), *port)).await,
                Address::Unix(_) => {
                    return Err(ConnectError::Unsupported {
                        address: address.to_string(),
                    });
                }
            }
            .map_err(|e| ConnectError::from_io(&address, e))?;

            if nodelay {
                stream
                    .set_nodelay(true)
                    .map_err(|e| ConnectError::from_io(&address, e))?;
            }

            Ok(Arc::new(StreamChannel::new(stream, address)))
        })
    }
}

/// Dials local (unix domain) socket addresses.
#[cfg(unix)]
#[derive(Debug, Clone)]
pub struct UnixConnector {
    native: NativeTransport,
}

#[cfg(unix)]
impl UnixConnector {
    /// Creates a connector after checking native transport support.
    pub fn new() -> Result<Self, ConfigurationError> {
        Self::with_capability(NativeTransport::detect())
    }

    /// Creates a connector for an explicit capability descriptor.
    pub fn with_capability(native: NativeTransport) -> Result<Self, ConfigurationError> {
        native.require_available()?;
        Ok(Self { native })
    }

    /// The capability this connector was created with.
    pub fn capability(&self) -> NativeTransport {
        self.native
    }
}

#[cfg(unix)]
impl ConnectionFactory for UnixConnector {
    type Channel = StreamChannel<UnixStream>;

    fn connect(
        &self,
        address: &Address,
    ) -> BoxFuture<'static, Result<Arc<Self::Channel>, ConnectError>> {
        let address = address.clone();

        Box::pin(async move {
            let Address::Unix(path) = &address else {
                return Err(ConnectError::Unsupported {
                    address: address.to_string(),
                });
            };
            let stream = UnixStream::connect(path)
                .await
                .map_err(|e| ConnectError::from_io(&address, e))?;

            Ok(Arc::new(StreamChannel::new(stream, address)))
        })
    }
}
