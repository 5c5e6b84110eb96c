use core::time::Duration;
use xid::{DefaultXid, Xid};

use crate::coordinator::SessionOptions;

/// Default namespace all allocation keys live under.
pub const DEFAULT_NAMESPACE: &str = "/xid";

/// Default TTL of a registration lease.
pub const DEFAULT_LEASE_TTL: Duration = Duration::from_secs(120);

/// What a node registration is bound to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Registration {
    /// A lease of its own with [`AllocatorConfig::lease_ttl`], kept alive by
    /// the allocation. The allocation session is closed right after
    /// registering.
    #[default]
    Lease,
    /// The allocation session itself, which stays open until the allocation
    /// shuts down. The registration behaves like a ZooKeeper ephemeral node:
    /// it is created only if absent and vanishes with the session.
    Session,
}

/// Settings of a [`NodeAllocator`](crate::NodeAllocator).
///
/// Keys are laid out as:
///
/// ```text
/// {namespace}/{key}/locker      allocation lock
/// {namespace}/{key}/node-{i}    registration of node id i (value "node-{i}")
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AllocatorConfig {
    pub namespace: String,
    /// Logical service name; processes sharing it draw from one node space.
    pub key: String,
    /// Lease TTL for [`Registration::Lease`]. Session-bound registrations
    /// live as long as the session.
    pub lease_ttl: Duration,
    /// Largest node id handed out.
    pub max_node: u64,
    pub session: SessionOptions,
    pub registration: Registration,
}

impl AllocatorConfig {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_owned(),
            key: key.into(),
            lease_ttl: DEFAULT_LEASE_TTL,
            max_node: DefaultXid::max_node_id(),
            session: SessionOptions::default(),
            registration: Registration::Lease,
        }
    }

    /// `{namespace}/{key}/`, the prefix scanned for registrations.
    pub fn prefix(&self) -> String {
        format!("{}/{}/", self.namespace.trim_end_matches('/'), self.key)
    }

    pub fn lock_path(&self) -> String {
        format!("{}locker", self.prefix())
    }

    pub fn node_key(&self, node_id: u64) -> String {
        format!("{}{}", self.prefix(), node_value(node_id))
    }
}

/// The value stored for node id `node_id`.
pub fn node_value(node_id: u64) -> String {
    format!("node-{node_id}")
}

/// Parses a registration value back into its node id. Values written by
/// anything else (lock records, foreign tools) yield `None`.
pub fn parse_node_value(value: &str) -> Option<u64> {
    value.strip_prefix("node-")?.parse().ok()
}
