//! The coordination service interface.
//!
//! A [`Coordinator`] offers the primitives the allocator needs from an
//! etcd-like store: sessions, named mutual-exclusion locks, a key-value space
//! with prefix listing, and leases that keys can be bound to. A key bound to a
//! lease disappears when the lease expires or is revoked.
//!
//! Every session is backed by a lease of its own. Closing the session, or
//! letting it expire, releases its locks and deletes the keys bound to that
//! lease, which is how ZooKeeper-style ephemeral nodes are expressed.

use core::{fmt, future::Future, time::Duration};
use futures::Stream;

/// Default TTL of a coordination session.
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(60);

/// Identifier of a lease granted by the coordination service.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LeaseId(i64);

impl LeaseId {
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for LeaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:x}", self.0)
    }
}

/// A stored key and its value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyValue {
    pub key: String,
    pub value: String,
    /// The lease the key is bound to, if any.
    pub lease: Option<LeaseId>,
}

/// A successful lease renewal, as yielded by [`Coordinator::keep_alive`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LeaseRenewal {
    pub lease: LeaseId,
    /// Time to live granted by this renewal.
    pub ttl: Duration,
}

/// Options for [`Coordinator::open_session`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionOptions {
    /// How long the session (its locks and the keys bound to it) survives
    /// after its owner stops keeping it alive.
    pub ttl: Duration,
}

impl SessionOptions {
    pub const fn new(ttl: Duration) -> Self {
        Self { ttl }
    }
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self::new(DEFAULT_SESSION_TTL)
    }
}

/// Client of a coordination service.
///
/// Implementations wrap a real client (etcd, ZooKeeper, ...) or an in-process
/// model such as [`MemoryCoordinator`](crate::MemoryCoordinator). All futures
/// are `Send` so the allocator can run on a multi-threaded runtime.
pub trait Coordinator: Send + Sync + 'static {
    /// Backend error, preserved as the source of allocation errors.
    type Error: std::error::Error + Send + Sync + 'static;
    /// A session that owns locks and, through its lease, ephemeral keys.
    type Session: Send + Sync + 'static;
    /// A held lock. Released by [`Coordinator::unlock`].
    type Lock: Send;
    /// Stream of renewals of one lease. Ends when the lease can no longer be
    /// kept alive.
    type KeepAlive: Stream<Item = LeaseRenewal> + Send + Unpin + 'static;

    /// Returns `false` once the client can no longer reach the service.
    fn is_connected(&self) -> bool;

    fn open_session(
        &self,
        options: &SessionOptions,
    ) -> impl Future<Output = Result<Self::Session, Self::Error>> + Send;

    /// The lease backing `session`.
    fn session_lease(&self, session: &Self::Session) -> LeaseId;

    /// Ends `session`: its locks are released and keys bound to its lease
    /// are deleted.
    fn close_session(
        &self,
        session: Self::Session,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Waits until the lock at `path` is held by `session`.
    fn lock(
        &self,
        session: &Self::Session,
        path: &str,
    ) -> impl Future<Output = Result<Self::Lock, Self::Error>> + Send;

    fn unlock(&self, lock: Self::Lock) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Returns every key starting with `prefix`, in key order.
    fn list(&self, prefix: &str) -> impl Future<Output = Result<Vec<KeyValue>, Self::Error>> + Send;

    /// Writes `key`, optionally bound to `lease`.
    fn put(
        &self,
        key: &str,
        value: &str,
        lease: Option<LeaseId>,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Writes `key` unless it already exists, optionally bound to `lease`.
    /// Returns whether the key was created.
    fn create(
        &self,
        key: &str,
        value: &str,
        lease: Option<LeaseId>,
    ) -> impl Future<Output = Result<bool, Self::Error>> + Send;

    fn grant(&self, ttl: Duration) -> impl Future<Output = Result<LeaseId, Self::Error>> + Send;

    /// Starts renewing `lease` for as long as the returned stream is polled.
    fn keep_alive(
        &self,
        lease: LeaseId,
    ) -> impl Future<Output = Result<Self::KeepAlive, Self::Error>> + Send;

    /// Revokes `lease`, deleting every key bound to it.
    fn revoke(&self, lease: LeaseId) -> impl Future<Output = Result<(), Self::Error>> + Send;
}
