//! Node-id allocation.
//!
//! Each process sharing a `(namespace, key)` pair takes the lowest node id not
//! registered by a live process. Allocation runs under a coordination lock, so
//! two processes never pick the same id. The registration key is bound to a
//! lease that a background task keeps alive; when the process dies the lease
//! expires and the id becomes free again.
//!
//! The lease is either one granted for the registration
//! ([`Registration::Lease`]) or the lease behind the allocation session
//! ([`Registration::Session`]), which then stays open for the lifetime of the
//! allocation.

mod config;
mod keepalive;

pub use config::*;

use core::time::Duration;
use std::{collections::HashSet, sync::Arc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::instrument;
use xid::{EncoderBuilder, TimeSource, Xid};

use self::keepalive::Release;
use crate::{
    coordinator::{Coordinator, LeaseId, SessionOptions},
    error::{Error, Result, Stage},
};

/// Allocates node ids from a coordination service.
///
/// # Example
/// ```
/// use xid::{Encoder, IdGenStatus};
/// use xid_coord::{MemoryCoordinator, NodeAllocator};
/// use std::sync::Arc;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> anyhow::Result<()> {
/// let coord = Arc::new(MemoryCoordinator::new());
/// let allocator = NodeAllocator::new(Arc::clone(&coord), "orders");
///
/// let allocation = allocator.allocate().await?;
/// assert_eq!(allocation.node_id(), 0);
/// assert_eq!(coord.get("/xid/orders/node-0").as_deref(), Some("node-0"));
///
/// let encoder = allocation.configure(Encoder::builder()).build()?;
/// assert!(matches!(encoder.next_id(), IdGenStatus::Ready { .. }));
///
/// allocation.shutdown().await;
/// assert_eq!(coord.get("/xid/orders/node-0"), None);
/// # Ok(())
/// # }
/// ```
pub struct NodeAllocator<C> {
    client: Option<Arc<C>>,
    config: AllocatorConfig,
}

impl<C> Clone for NodeAllocator<C> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            config: self.config.clone(),
        }
    }
}

impl<C: Coordinator> NodeAllocator<C> {
    /// Creates an allocator for `key` with default settings.
    pub fn new(client: Arc<C>, key: impl Into<String>) -> Self {
        Self::from_parts(Some(client), AllocatorConfig::new(key))
    }

    /// Creates an allocator from a possibly missing client. A missing client
    /// makes every [`allocate`](Self::allocate) fail with
    /// [`Error::InvalidClient`].
    pub const fn from_parts(client: Option<Arc<C>>, config: AllocatorConfig) -> Self {
        Self { client, config }
    }

    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.config.namespace = namespace.into();
        self
    }

    #[must_use]
    pub fn with_lease_ttl(mut self, ttl: Duration) -> Self {
        self.config.lease_ttl = ttl;
        self
    }

    /// Caps the node ids handed out. Must not exceed the encoder layout's
    /// [`Xid::max_node_id`], or building an encoder from the allocation fails.
    #[must_use]
    pub fn with_max_node(mut self, max_node: u64) -> Self {
        self.config.max_node = max_node;
        self
    }

    #[must_use]
    pub fn with_registration(mut self, registration: Registration) -> Self {
        self.config.registration = registration;
        self
    }

    #[must_use]
    pub fn with_session_options(mut self, options: SessionOptions) -> Self {
        self.config.session = options;
        self
    }

    pub const fn config(&self) -> &AllocatorConfig {
        &self.config
    }

    /// Allocates a node id and starts keeping its registration alive.
    ///
    /// Must be called within a Tokio runtime; the keepalive runs as a spawned
    /// task. Callers wanting a deadline wrap this in
    /// [`tokio::time::timeout`]. A cancelled allocation leaves its lock to
    /// the coordination session, which releases it when it expires.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidClient`] if the client is missing or disconnected.
    /// - [`Error::InvalidKey`] if the key is empty.
    /// - [`Error::NodeExhausted`] if every id in `0..=max_node` is taken.
    /// - [`Error::Coordination`] if the backend fails at any [`Stage`]. No
    ///   registration is left behind in that case.
    #[instrument(level = "debug", skip(self), fields(key = %self.config.key))]
    pub async fn allocate(&self) -> Result<Allocation> {
        let client = match &self.client {
            Some(client) if client.is_connected() => Arc::clone(client),
            _ => return Err(Error::InvalidClient),
        };
        if self.config.key.is_empty() {
            return Err(Error::InvalidKey);
        }

        let session = client
            .open_session(&self.config.session)
            .await
            .map_err(|e| Error::coordination(Stage::Session, e))?;

        let lock_path = self.config.lock_path();
        let lock = match client.lock(&session, &lock_path).await {
            Ok(lock) => lock,
            Err(e) => {
                close_session(&*client, session).await;
                return Err(Error::coordination(Stage::Lock, e));
            }
        };
        tracing::debug!(lock = %lock_path, "allocation lock acquired");

        let registered = match self.config.registration {
            Registration::Lease => self.register_leased(&*client).await,
            Registration::Session => self.register_in_session(&*client, &session).await,
        };
        let unlocked = client.unlock(lock).await;

        let (node_id, lease) = match registered {
            Ok(registration) => registration,
            Err(e) => {
                if let Err(unlock_err) = unlocked {
                    tracing::warn!(lock = %lock_path, error = %unlock_err, "failed to release allocation lock");
                }
                close_session(&*client, session).await;
                return Err(e);
            }
        };
        let release = match self.config.registration {
            Registration::Lease => {
                close_session(&*client, session).await;
                Release::Revoke(lease)
            }
            Registration::Session => Release::CloseSession(session),
        };
        if let Err(e) = unlocked {
            release.run(&*client).await;
            return Err(Error::coordination(Stage::Unlock, e));
        }

        let renewals = match client.keep_alive(lease).await {
            Ok(renewals) => renewals,
            Err(e) => {
                release.run(&*client).await;
                return Err(Error::coordination(Stage::KeepAlive, e));
            }
        };

        let key = self.config.node_key(node_id);
        let token = CancellationToken::new();
        let handle = keepalive::spawn(
            Arc::clone(&client),
            lease,
            key.clone(),
            renewals,
            release,
            token.clone(),
        );

        tracing::info!(
            node_id,
            %lease,
            key = %key,
            registration = ?self.config.registration,
            "node id allocated"
        );
        Ok(Allocation {
            node_id,
            lease,
            key,
            handle,
            token,
        })
    }

    /// Returns the node ids already registered under the prefix.
    async fn scan(&self, client: &C) -> Result<HashSet<u64>> {
        let existing = client
            .list(&self.config.prefix())
            .await
            .map_err(|e| Error::coordination(Stage::Scan, e))?;

        let taken: HashSet<u64> = existing
            .iter()
            .filter_map(|kv| parse_node_value(&kv.value))
            .collect();
        tracing::debug!(registered = taken.len(), "registrations scanned");
        Ok(taken)
    }

    fn exhausted(&self) -> Error {
        let prefix = self.config.prefix();
        let max_node = self.config.max_node;
        tracing::warn!(%prefix, max_node, "node ids exhausted");
        Error::NodeExhausted { prefix, max_node }
    }

    /// Picks the lowest free node id and registers it under a fresh lease.
    /// Runs with the allocation lock held.
    async fn register_leased(&self, client: &C) -> Result<(u64, LeaseId)> {
        let taken = self.scan(client).await?;
        let Some(node_id) = (0..=self.config.max_node).find(|id| !taken.contains(id)) else {
            return Err(self.exhausted());
        };
        tracing::debug!(node_id, "free node id found");

        let lease = client
            .grant(self.config.lease_ttl)
            .await
            .map_err(|e| Error::coordination(Stage::Grant, e))?;

        let key = self.config.node_key(node_id);
        if let Err(e) = client.put(&key, &node_value(node_id), Some(lease)).await {
            revoke_quietly(client, lease).await;
            return Err(Error::coordination(Stage::Register, e));
        }
        Ok((node_id, lease))
    }

    /// Creates the registration of the lowest free node id, bound to
    /// `session`. An id whose key turns out to exist already is skipped.
    /// Runs with the allocation lock held.
    async fn register_in_session(
        &self,
        client: &C,
        session: &C::Session,
    ) -> Result<(u64, LeaseId)> {
        let lease = client.session_lease(session);
        let taken = self.scan(client).await?;

        for node_id in (0..=self.config.max_node).filter(|id| !taken.contains(id)) {
            let key = self.config.node_key(node_id);
            let created = client
                .create(&key, &node_value(node_id), Some(lease))
                .await
                .map_err(|e| Error::coordination(Stage::Register, e))?;
            if created {
                return Ok((node_id, lease));
            }
            tracing::debug!(node_id, key = %key, "node key already exists, skipping");
        }
        Err(self.exhausted())
    }
}

async fn close_session<C: Coordinator>(client: &C, session: C::Session) {
    if let Err(e) = client.close_session(session).await {
        tracing::warn!(error = %e, "failed to close coordination session");
    }
}

async fn revoke_quietly<C: Coordinator>(client: &C, lease: LeaseId) {
    match client.revoke(lease).await {
        Ok(()) => tracing::debug!(%lease, "lease revoked"),
        Err(e) => tracing::warn!(%lease, error = %e, "failed to revoke lease"),
    }
}

/// A registered node id, kept alive by a background task.
///
/// Dropping an `Allocation` detaches the task: the registration then lives as
/// long as the process. Call [`shutdown`](Self::shutdown) to release it.
#[derive(Debug)]
pub struct Allocation {
    node_id: u64,
    lease: LeaseId,
    key: String,
    handle: JoinHandle<()>,
    token: CancellationToken,
}

impl Allocation {
    pub const fn node_id(&self) -> u64 {
        self.node_id
    }

    /// The lease the registration is bound to. For
    /// [`Registration::Session`] this is the session's lease.
    pub const fn lease(&self) -> LeaseId {
        self.lease
    }

    /// The registration key, `{namespace}/{key}/node-{id}`.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Applies the allocated node id to an encoder builder.
    pub fn configure<ID, T>(&self, builder: EncoderBuilder<ID, T>) -> EncoderBuilder<ID, T>
    where
        ID: Xid,
        T: TimeSource,
    {
        builder.node_id(self.node_id)
    }

    /// Returns `false` once the keepalive task has exited, i.e. the
    /// registration is gone or going.
    pub fn is_active(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Returns a token that stops the keepalive task when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Stops the keepalive task and waits for it to release the registration:
    /// the lease is revoked, or the registration session closed.
    pub async fn shutdown(self) {
        self.token.cancel();
        if let Err(e) = self.handle.await {
            tracing::warn!(node_id = self.node_id, error = %e, "keepalive task failed");
        }
    }
}
