//! Connection factories.

use crate::address::Address;
use crate::channel::TransportChannel;
use futures::future::BoxFuture;
use redis_watchdog_core::ConnectError;
use std::sync::Arc;
use tower::{Service, ServiceExt};

/// Establishes new transport channels.
///
/// Each call is an independent attempt. The watchdog awaits the returned
/// future to completion before it schedules anything else, so a factory
/// never sees two overlapping calls from the same watchdog.
pub trait ConnectionFactory: Send + Sync + 'static {
    /// The channel type produced on success.
    type Channel: TransportChannel;

    /// Dials `address`.
    fn connect(
        &self,
        address: &Address,
    ) -> BoxFuture<'static, Result<Arc<Self::Channel>, ConnectError>>;
}

impl<F: ConnectionFactory> ConnectionFactory for Arc<F> {
    type Channel = F::Channel;

    fn connect(
        &self,
        address: &Address,
    ) -> BoxFuture<'static, Result<Arc<Self::Channel>, ConnectError>> {
        (**self).connect(address)
    }
}

/// Adapts a Tower [`Service`] that takes an [`Address`] into a
/// [`ConnectionFactory`].
///
/// ```
/// use redis_watchdog::{Address, ConnectionFactory, ServiceConnector};
/// # use redis_watchdog::{ChannelId, TransportChannel};
/// # use redis_watchdog_core::ConnectError;
/// # use std::sync::Arc;
/// # struct Chan(ChannelId);
/// # impl TransportChannel for Chan {
/// #     fn id(&self) -> ChannelId { self.0 }
/// #     fn remote_address(&self) -> Option<Address> { None }
/// #     fn is_active(&self) -> bool { true }
/// # }
///
/// let factory = ServiceConnector::new(tower::service_fn(|_addr: Address| async move {
///     Ok::<_, ConnectError>(Arc::new(Chan(ChannelId::next())))
/// }));
/// # let _ = factory;
/// ```
#[derive(Debug, Clone)]
pub struct ServiceConnector<S> {
    inner: S,
}

impl<S> ServiceConnector<S> {
    /// Wraps `inner`. The service is cloned once per connect attempt.
    pub fn new(inner: S) -> Self {
        Self { inner }
    }
}

impl<S, C> ConnectionFactory for ServiceConnector<S>
where
    S: Service<Address, Response = Arc<C>> + Clone + Send + Sync + 'static,
    S::Error: Into<ConnectError>,
    S::Future: Send + 'static,
    C: TransportChannel,
{
    type Channel = C;

    fn connect(&self, address: &Address) -> BoxFuture<'static, Result<Arc<C>, ConnectError>> {
        let service = self.inner.clone();
        let address = address.clone();
        Box::pin(async move { service.oneshot(address).await.map_err(Into::into) })
    }
}
