//! Address resolvers consulted before each reconnect attempt.

use crate::address::Address;
use futures::future::BoxFuture;
use redis_watchdog_core::ResolveError;
use std::future::Future;

/// Supplies the address to dial for the next reconnect attempt.
///
/// Called once per attempt. Results may legitimately differ between calls,
/// for example when a directory service reports a failover. A failure never
/// stops the reconnect loop: the watchdog falls back to the last known
/// address.
pub trait AddressResolver: Send + Sync + 'static {
    /// Produces the address for the next attempt.
    fn resolve(&self) -> BoxFuture<'static, Result<Address, ResolveError>>;
}

/// Always resolves to the same address.
#[derive(Debug, Clone)]
pub struct StaticResolver {
    address: Address,
}

impl StaticResolver {
    /// Creates a resolver for `address`.
    pub fn new(address: Address) -> Self {
        Self { address }
    }
}

impl AddressResolver for StaticResolver {
    fn resolve(&self) -> BoxFuture<'static, Result<Address, ResolveError>> {
        Box::pin(futures::future::ready(Ok(self.address.clone())))
    }
}

/// Resolver backed by a synchronous closure. See [`resolver_fn`].
#[derive(Clone)]
pub struct FnResolver<F> {
    f: F,
}

/// Builds a resolver from a closure.
///
/// ```
/// use redis_watchdog::{resolver_fn, Address, AddressResolver};
///
/// let resolver = resolver_fn(|| Ok(Address::host("primary.redis", 6379)));
/// # let _ = resolver.resolve();
/// ```
pub fn resolver_fn<F>(f: F) -> FnResolver<F>
where
    F: Fn() -> Result<Address, ResolveError> + Send + Sync + 'static,
{
    FnResolver { f }
}

impl<F> AddressResolver for FnResolver<F>
where
    F: Fn() -> Result<Address, ResolveError> + Send + Sync + 'static,
{
    fn resolve(&self) -> BoxFuture<'static, Result<Address, ResolveError>> {
        Box::pin(futures::future::ready((self.f)()))
    }
}

/// Resolver backed by an async closure, for lookups that do I/O.
#[derive(Clone)]
pub struct AsyncFnResolver<F> {
    f: F,
}

/// Builds a resolver from a closure returning a future.
pub fn resolver_async_fn<F, Fut>(f: F) -> AsyncFnResolver<F>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Address, ResolveError>> + Send + 'static,
{
    AsyncFnResolver { f }
}

impl<F, Fut> AddressResolver for AsyncFnResolver<F>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Address, ResolveError>> + Send + 'static,
{
    fn resolve(&self) -> BoxFuture<'static, Result<Address, ResolveError>> {
        Box::pin((self.f)())
    }
}
