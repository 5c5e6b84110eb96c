//! An in-process [`Coordinator`].
//!
//! `MemoryCoordinator` models the coordination contract inside one process:
//! locks are exclusive and owned by a session, leases expire after their TTL
//! unless kept alive, and keys bound to a lease vanish with it. Each session
//! is backed by a lease that a heartbeat renews while the session handle is
//! alive. A handle dropped without [`close_session`](Coordinator::close_session)
//! stops the heartbeat, and the session lapses once its TTL runs out. Time is
//! read from [`tokio::time::Instant`], so tests can pause and advance it.
//!
//! Expired leases are purged lazily, on the next operation that touches the
//! store, and eagerly when an abandoned session reaches its deadline.

use core::{fmt, time::Duration};
use parking_lot::{Mutex, MutexGuard};
use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::{Arc, Weak},
};
use tokio::{
    sync::{OwnedMutexGuard, mpsc},
    time::{Instant, Interval, MissedTickBehavior, interval, sleep, sleep_until},
};
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::coordinator::{Coordinator, KeyValue, LeaseId, LeaseRenewal, SessionOptions};

/// Buffered renewals per keepalive stream.
const KEEPALIVE_BUFFER: usize = 16;

/// A [`Coordinator`] operation, used to inject failures and latency.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    OpenSession,
    CloseSession,
    Lock,
    Unlock,
    List,
    Put,
    Create,
    Grant,
    KeepAlive,
    Revoke,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self {
            Self::OpenSession => "open_session",
            Self::CloseSession => "close_session",
            Self::Lock => "lock",
            Self::Unlock => "unlock",
            Self::List => "list",
            Self::Put => "put",
            Self::Create => "create",
            Self::Grant => "grant",
            Self::KeepAlive => "keep_alive",
            Self::Revoke => "revoke",
        };
        f.write_str(op)
    }
}

/// Errors returned by [`MemoryCoordinator`].
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum MemoryError {
    #[error("coordinator is closed")]
    Closed,

    #[error("session {0} is not open")]
    SessionNotFound(u64),

    #[error("lock {0} is not held by this handle")]
    LockNotHeld(String),

    #[error("lease {0} not found")]
    LeaseNotFound(LeaseId),

    #[error("ttl must be non-zero")]
    InvalidTtl,

    #[error("injected {0} failure")]
    Injected(Operation),
}

/// A session opened on a [`MemoryCoordinator`].
///
/// Dropping the handle without closing the session stops its heartbeat; the
/// session then lapses after its TTL, like one whose owner crashed.
pub struct MemorySession {
    id: u64,
    lease: LeaseId,
    _heartbeat: DropGuard,
}

impl MemorySession {
    pub const fn id(&self) -> u64 {
        self.id
    }

    pub const fn lease(&self) -> LeaseId {
        self.lease
    }
}

impl fmt::Debug for MemorySession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemorySession")
            .field("id", &self.id)
            .field("lease", &self.lease)
            .finish()
    }
}

/// A lock held on a [`MemoryCoordinator`]. The lock stays held until it is
/// unlocked or its session ends.
#[derive(Debug)]
pub struct MemoryLock {
    path: String,
    session: u64,
    generation: u64,
}

impl MemoryLock {
    pub fn path(&self) -> &str {
        &self.path
    }

    pub const fn session(&self) -> u64 {
        self.session
    }
}

#[derive(Debug)]
struct Entry {
    value: String,
    lease: Option<LeaseId>,
}

#[derive(Debug)]
struct Lease {
    ttl: Duration,
    deadline: Instant,
}

#[derive(Debug)]
struct HeldLock {
    session: u64,
    generation: u64,
    _guard: OwnedMutexGuard<()>,
}

#[derive(Debug, Default)]
struct State {
    closed: bool,
    kv: BTreeMap<String, Entry>,
    leases: HashMap<LeaseId, Lease>,
    /// Open sessions and the lease backing each.
    sessions: HashMap<u64, LeaseId>,
    /// Locks currently held, by path.
    held: HashMap<String, HeldLock>,
    failures: HashSet<Operation>,
    delays: HashMap<Operation, Duration>,
    next_lease: i64,
    next_session: u64,
    next_lock: u64,
}

impl State {
    fn purge_expired(&mut self, now: Instant) {
        let expired: HashSet<LeaseId> = self
            .leases
            .iter()
            .filter(|(_, lease)| lease.deadline <= now)
            .map(|(id, _)| *id)
            .collect();
        for lease in &expired {
            tracing::debug!(%lease, "lease expired");
            self.remove_lease(*lease);
        }
    }

    fn grant_lease(&mut self, ttl: Duration) -> LeaseId {
        self.next_lease += 1;
        let lease = LeaseId::new(self.next_lease);
        self.leases.insert(
            lease,
            Lease {
                ttl,
                deadline: Instant::now() + ttl,
            },
        );
        lease
    }

    /// Removes `lease`, the keys bound to it, and any session it backs along
    /// with that session's locks.
    fn remove_lease(&mut self, lease: LeaseId) -> bool {
        let existed = self.leases.remove(&lease).is_some();
        self.kv.retain(|_, entry| entry.lease != Some(lease));

        let ended: Vec<u64> = self
            .sessions
            .iter()
            .filter(|&(_, backing)| *backing == lease)
            .map(|(&id, _)| id)
            .collect();
        for session in ended {
            self.sessions.remove(&session);
            self.held.retain(|_, held| held.session != session);
            tracing::debug!(session, "session ended");
        }
        existed
    }

    fn check_lease(&self, lease: Option<LeaseId>) -> Result<(), MemoryError> {
        match lease {
            Some(lease) if !self.leases.contains_key(&lease) => {
                Err(MemoryError::LeaseNotFound(lease))
            }
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Default)]
struct Inner {
    state: Mutex<State>,
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl Inner {
    /// Sleeps for the latency injected for `op`, if any.
    async fn stall(&self, op: Operation) {
        let delay = self.state.lock().delays.remove(&op);
        if let Some(delay) = delay {
            tracing::trace!(%op, ?delay, "injected latency");
            sleep(delay).await;
        }
    }

    /// Locks the store for `op`, failing if the coordinator is closed or a
    /// failure was injected for `op`.
    fn begin(&self, op: Operation) -> Result<MutexGuard<'_, State>, MemoryError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(MemoryError::Closed);
        }
        if state.failures.remove(&op) {
            return Err(MemoryError::Injected(op));
        }
        state.purge_expired(Instant::now());
        Ok(state)
    }

    fn renew(&self, lease: LeaseId) -> Option<Duration> {
        let mut state = self.state.lock();
        if state.closed {
            return None;
        }
        let now = Instant::now();
        state.purge_expired(now);
        let entry = state.leases.get_mut(&lease)?;
        entry.deadline = now + entry.ttl;
        Some(entry.ttl)
    }

    fn deadline(&self, lease: LeaseId) -> Option<Instant> {
        self.state.lock().leases.get(&lease).map(|entry| entry.deadline)
    }
}

/// An in-process coordination service. Clones share the same store.
///
/// # Example
/// ```
/// use core::time::Duration;
/// use xid_coord::{Coordinator, MemoryCoordinator};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), xid_coord::MemoryError> {
/// let coord = MemoryCoordinator::new();
/// let lease = coord.grant(Duration::from_secs(30)).await?;
/// coord.put("/xid/orders/node-0", "node-0", Some(lease)).await?;
/// assert_eq!(coord.get("/xid/orders/node-0").as_deref(), Some("node-0"));
///
/// coord.revoke(lease).await?;
/// assert_eq!(coord.get("/xid/orders/node-0"), None);
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug, Default)]
pub struct MemoryCoordinator {
    inner: Arc<Inner>,
}

impl MemoryCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Disconnects the coordinator. Every later operation fails with
    /// [`MemoryError::Closed`] and running keepalive streams end.
    pub fn close(&self) {
        self.inner.state.lock().closed = true;
    }

    /// Makes the next call of `op` fail with [`MemoryError::Injected`].
    pub fn fail_next(&self, op: Operation) {
        self.inner.state.lock().failures.insert(op);
    }

    /// Makes the next call of `op` wait for `delay` before it runs.
    pub fn delay_next(&self, op: Operation, delay: Duration) {
        self.inner.state.lock().delays.insert(op, delay);
    }

    /// Returns the value stored at `key`.
    pub fn get(&self, key: &str) -> Option<String> {
        let mut state = self.inner.state.lock();
        state.purge_expired(Instant::now());
        state.kv.get(key).map(|entry| entry.value.clone())
    }

    /// Returns every key starting with `prefix`, in key order.
    pub fn list_keys(&self, prefix: &str) -> Vec<String> {
        let mut state = self.inner.state.lock();
        state.purge_expired(Instant::now());
        state
            .kv
            .range(prefix.to_owned()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.clone())
            .collect()
    }

    pub fn lease_exists(&self, lease: LeaseId) -> bool {
        let mut state = self.inner.state.lock();
        state.purge_expired(Instant::now());
        state.leases.contains_key(&lease)
    }

    /// Number of live leases, session leases included.
    pub fn lease_count(&self) -> usize {
        let mut state = self.inner.state.lock();
        state.purge_expired(Instant::now());
        state.leases.len()
    }

    pub fn session_exists(&self, session: u64) -> bool {
        let mut state = self.inner.state.lock();
        state.purge_expired(Instant::now());
        state.sessions.contains_key(&session)
    }

    /// Expires `lease` immediately, as if its TTL had elapsed. Returns whether
    /// the lease existed.
    pub fn expire_lease(&self, lease: LeaseId) -> bool {
        let existed = self.inner.state.lock().remove_lease(lease);
        if existed {
            tracing::debug!(%lease, "lease force-expired");
        }
        existed
    }

    /// Expires `session` immediately, releasing its locks and deleting the
    /// keys bound to its lease. Returns whether the session was open.
    pub fn expire_session(&self, session: u64) -> bool {
        let mut state = self.inner.state.lock();
        let Some(lease) = state.sessions.get(&session).copied() else {
            return false;
        };
        state.remove_lease(lease);
        tracing::debug!(session, "session force-expired");
        true
    }
}

impl Coordinator for MemoryCoordinator {
    type Error = MemoryError;
    type Session = MemorySession;
    type Lock = MemoryLock;
    type KeepAlive = ReceiverStream<LeaseRenewal>;

    fn is_connected(&self) -> bool {
        !self.inner.state.lock().closed
    }

    async fn open_session(&self, options: &SessionOptions) -> Result<MemorySession, MemoryError> {
        if options.ttl.is_zero() {
            return Err(MemoryError::InvalidTtl);
        }
        self.inner.stall(Operation::OpenSession).await;
        let (id, lease) = {
            let mut state = self.inner.begin(Operation::OpenSession)?;
            let lease = state.grant_lease(options.ttl);
            state.next_session += 1;
            let id = state.next_session;
            state.sessions.insert(id, lease);
            (id, lease)
        };

        let stop = CancellationToken::new();
        tokio::spawn(session_heartbeat(
            Arc::downgrade(&self.inner),
            lease,
            options.ttl,
            stop.clone(),
        ));
        tracing::debug!(session = id, %lease, "session opened");
        Ok(MemorySession {
            id,
            lease,
            _heartbeat: stop.drop_guard(),
        })
    }

    fn session_lease(&self, session: &MemorySession) -> LeaseId {
        session.lease
    }

    async fn close_session(&self, session: MemorySession) -> Result<(), MemoryError> {
        self.inner.stall(Operation::CloseSession).await;
        let mut state = self.inner.begin(Operation::CloseSession)?;
        if !state.sessions.contains_key(&session.id) {
            return Err(MemoryError::SessionNotFound(session.id));
        }
        state.remove_lease(session.lease);
        tracing::debug!(session = session.id, "session closed");
        Ok(())
    }

    async fn lock(&self, session: &MemorySession, path: &str) -> Result<MemoryLock, MemoryError> {
        self.inner.stall(Operation::Lock).await;
        let mutex = {
            let state = self.inner.begin(Operation::Lock)?;
            if !state.sessions.contains_key(&session.id) {
                return Err(MemoryError::SessionNotFound(session.id));
            }
            drop(state);
            let mut locks = self.inner.locks.lock();
            Arc::clone(locks.entry(path.to_owned()).or_default())
        };
        let guard = mutex.lock_owned().await;

        let mut state = self.inner.state.lock();
        state.purge_expired(Instant::now());
        if state.closed {
            return Err(MemoryError::Closed);
        }
        // The session may have ended while waiting.
        if !state.sessions.contains_key(&session.id) {
            return Err(MemoryError::SessionNotFound(session.id));
        }
        state.next_lock += 1;
        let generation = state.next_lock;
        state.held.insert(
            path.to_owned(),
            HeldLock {
                session: session.id,
                generation,
                _guard: guard,
            },
        );
        Ok(MemoryLock {
            path: path.to_owned(),
            session: session.id,
            generation,
        })
    }

    async fn unlock(&self, lock: MemoryLock) -> Result<(), MemoryError> {
        self.inner.stall(Operation::Unlock).await;
        let mut state = self.inner.state.lock();
        state.purge_expired(Instant::now());

        // Released even when the unlock reports failure.
        let held = state
            .held
            .get(&lock.path)
            .is_some_and(|held| held.generation == lock.generation);
        if held {
            state.held.remove(&lock.path);
        }

        if state.closed {
            return Err(MemoryError::Closed);
        }
        if state.failures.remove(&Operation::Unlock) {
            return Err(MemoryError::Injected(Operation::Unlock));
        }
        if !held {
            return Err(MemoryError::LockNotHeld(lock.path));
        }
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<KeyValue>, MemoryError> {
        self.inner.stall(Operation::List).await;
        let state = self.inner.begin(Operation::List)?;
        Ok(state
            .kv
            .range(prefix.to_owned()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, entry)| KeyValue {
                key: key.clone(),
                value: entry.value.clone(),
                lease: entry.lease,
            })
            .collect())
    }

    async fn put(&self, key: &str, value: &str, lease: Option<LeaseId>) -> Result<(), MemoryError> {
        self.inner.stall(Operation::Put).await;
        let mut state = self.inner.begin(Operation::Put)?;
        state.check_lease(lease)?;
        state.kv.insert(
            key.to_owned(),
            Entry {
                value: value.to_owned(),
                lease,
            },
        );
        Ok(())
    }

    async fn create(
        &self,
        key: &str,
        value: &str,
        lease: Option<LeaseId>,
    ) -> Result<bool, MemoryError> {
        self.inner.stall(Operation::Create).await;
        let mut state = self.inner.begin(Operation::Create)?;
        state.check_lease(lease)?;
        if state.kv.contains_key(key) {
            return Ok(false);
        }
        state.kv.insert(
            key.to_owned(),
            Entry {
                value: value.to_owned(),
                lease,
            },
        );
        Ok(true)
    }

    async fn grant(&self, ttl: Duration) -> Result<LeaseId, MemoryError> {
        if ttl.is_zero() {
            return Err(MemoryError::InvalidTtl);
        }
        self.inner.stall(Operation::Grant).await;
        let lease = self.inner.begin(Operation::Grant)?.grant_lease(ttl);
        tracing::debug!(%lease, ttl_secs = ttl.as_secs(), "lease granted");
        Ok(lease)
    }

    async fn keep_alive(&self, lease: LeaseId) -> Result<Self::KeepAlive, MemoryError> {
        self.inner.stall(Operation::KeepAlive).await;
        let ttl = {
            let state = self.inner.begin(Operation::KeepAlive)?;
            state
                .leases
                .get(&lease)
                .map(|entry| entry.ttl)
                .ok_or(MemoryError::LeaseNotFound(lease))?
        };

        let (tx, rx) = mpsc::channel(KEEPALIVE_BUFFER);
        tokio::spawn(renew_loop(Arc::downgrade(&self.inner), lease, ttl, tx));
        Ok(ReceiverStream::new(rx))
    }

    async fn revoke(&self, lease: LeaseId) -> Result<(), MemoryError> {
        self.inner.stall(Operation::Revoke).await;
        let mut state = self.inner.begin(Operation::Revoke)?;
        if !state.remove_lease(lease) {
            return Err(MemoryError::LeaseNotFound(lease));
        }
        tracing::debug!(%lease, "lease revoked");
        Ok(())
    }
}

/// Ticks every third of `ttl`, the first tick immediately.
fn renewal_interval(ttl: Duration) -> Interval {
    let mut ticker = interval((ttl / 3).max(Duration::from_millis(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

/// Renews `lease` every third of its TTL until the lease is gone, the
/// coordinator is closed or dropped, or the receiver goes away.
async fn renew_loop(
    inner: Weak<Inner>,
    lease: LeaseId,
    ttl: Duration,
    tx: mpsc::Sender<LeaseRenewal>,
) {
    let mut ticker = renewal_interval(ttl);

    loop {
        tokio::select! {
            () = tx.closed() => break,
            _ = ticker.tick() => {
                let renewed = inner.upgrade().and_then(|inner| inner.renew(lease));
                let Some(ttl) = renewed else { break };
                if tx.send(LeaseRenewal { lease, ttl }).await.is_err() {
                    break;
                }
            }
        }
    }
    tracing::trace!(%lease, "keepalive stream ended");
}

/// Keeps a session's lease alive until `stop` fires. A session whose handle
/// went away without closing it then lapses at its deadline.
async fn session_heartbeat(
    inner: Weak<Inner>,
    lease: LeaseId,
    ttl: Duration,
    stop: CancellationToken,
) {
    let mut ticker = renewal_interval(ttl);

    loop {
        tokio::select! {
            () = stop.cancelled() => break,
            _ = ticker.tick() => {
                let renewed = inner.upgrade().and_then(|inner| inner.renew(lease));
                if renewed.is_none() {
                    return;
                }
            }
        }
    }

    let Some(deadline) = inner.upgrade().and_then(|inner| inner.deadline(lease)) else {
        return;
    };
    tracing::trace!(%lease, "session abandoned, waiting for it to lapse");
    sleep_until(deadline).await;
    if let Some(inner) = inner.upgrade() {
        inner.state.lock().purge_expired(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use tokio::time::{sleep, timeout};

    const TTL: Duration = Duration::from_secs(10);

    #[tokio::test(start_paused = true)]
    async fn lease_expiry_removes_bound_keys() {
        let coord = MemoryCoordinator::new();
        let lease = coord.grant(TTL).await.unwrap();
        coord.put("/a/leased", "x", Some(lease)).await.unwrap();
        coord.put("/a/plain", "y", None).await.unwrap();

        sleep(TTL - Duration::from_secs(1)).await;
        assert!(coord.lease_exists(lease));

        sleep(Duration::from_secs(2)).await;
        assert!(!coord.lease_exists(lease));
        assert_eq!(coord.list_keys("/a/"), vec!["/a/plain".to_owned()]);
    }

    #[tokio::test(start_paused = true)]
    async fn keep_alive_extends_lease() {
        let coord = MemoryCoordinator::new();
        let lease = coord.grant(TTL).await.unwrap();
        coord.put("/k", "v", Some(lease)).await.unwrap();

        let mut renewals = coord.keep_alive(lease).await.unwrap();
        let consumer = tokio::spawn(async move {
            let mut count = 0_usize;
            while renewals.next().await.is_some() {
                count += 1;
            }
            count
        });

        sleep(TTL * 6).await;
        assert!(coord.lease_exists(lease));
        assert_eq!(coord.get("/k").as_deref(), Some("v"));

        coord.revoke(lease).await.unwrap();
        let count = consumer.await.unwrap();
        assert!(count >= 18, "expected regular renewals, got {count}");
        assert_eq!(coord.get("/k"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn keep_alive_stream_ends_when_lease_expires() {
        let coord = MemoryCoordinator::new();
        let lease = coord.grant(TTL).await.unwrap();
        let mut renewals = coord.keep_alive(lease).await.unwrap();

        let first = renewals.next().await.unwrap();
        assert_eq!(first, LeaseRenewal { lease, ttl: TTL });

        assert!(coord.expire_lease(lease));
        while renewals.next().await.is_some() {}
        assert!(!coord.lease_exists(lease));
    }

    #[tokio::test(start_paused = true)]
    async fn lock_is_exclusive() {
        let coord = MemoryCoordinator::new();
        let s1 = coord.open_session(&SessionOptions::default()).await.unwrap();
        let s2 = coord.open_session(&SessionOptions::default()).await.unwrap();

        let held = coord.lock(&s1, "/l").await.unwrap();
        assert_eq!(held.path(), "/l");
        assert!(
            timeout(Duration::from_secs(1), coord.lock(&s2, "/l"))
                .await
                .is_err()
        );

        coord.unlock(held).await.unwrap();
        let next = timeout(Duration::from_secs(1), coord.lock(&s2, "/l"))
            .await
            .unwrap()
            .unwrap();
        coord.unlock(next).await.unwrap();

        coord.close_session(s1).await.unwrap();
        coord.close_session(s2).await.unwrap();
    }

    #[tokio::test]
    async fn lock_requires_open_session() {
        let coord = MemoryCoordinator::new();
        let session = coord.open_session(&SessionOptions::default()).await.unwrap();
        let id = session.id();
        assert!(coord.expire_session(id));

        assert_eq!(
            coord.lock(&session, "/l").await.err(),
            Some(MemoryError::SessionNotFound(id))
        );
        assert_eq!(
            coord.close_session(session).await,
            Err(MemoryError::SessionNotFound(id))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn closing_session_releases_its_locks_and_keys() {
        let coord = MemoryCoordinator::new();
        let s1 = coord.open_session(&SessionOptions::default()).await.unwrap();
        let s2 = coord.open_session(&SessionOptions::default()).await.unwrap();

        let held = coord.lock(&s1, "/l").await.unwrap();
        assert_eq!(held.session(), s1.id());
        assert!(coord.create("/eph", "x", Some(coord.session_lease(&s1))).await.unwrap());
        let s1_lease = s1.lease();

        coord.close_session(s1).await.unwrap();
        assert!(!coord.lease_exists(s1_lease));
        assert_eq!(coord.get("/eph"), None);

        let next = timeout(Duration::from_secs(1), coord.lock(&s2, "/l"))
            .await
            .unwrap()
            .unwrap();
        // The old handle no longer owns the lock.
        assert_eq!(
            coord.unlock(held).await,
            Err(MemoryError::LockNotHeld("/l".to_owned()))
        );
        coord.unlock(next).await.unwrap();
        coord.close_session(s2).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn open_session_outlives_its_ttl() {
        let coord = MemoryCoordinator::new();
        let options = SessionOptions::new(Duration::from_secs(3));
        let session = coord.open_session(&options).await.unwrap();

        sleep(Duration::from_secs(60)).await;
        assert!(coord.session_exists(session.id()));
        assert!(coord.lease_exists(session.lease()));
        coord.close_session(session).await.unwrap();
        assert_eq!(coord.lease_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn abandoned_session_lapses_after_ttl_and_frees_lock() {
        let coord = MemoryCoordinator::new();
        let options = SessionOptions::new(Duration::from_secs(3));
        let abandoned = coord.open_session(&options).await.unwrap();
        let id = abandoned.id();
        let lease = abandoned.lease();
        let _lock = coord.lock(&abandoned, "/l").await.unwrap();
        coord.put("/eph", "x", Some(lease)).await.unwrap();
        drop(abandoned);

        let other = coord.open_session(&options).await.unwrap();
        let started = Instant::now();
        let lock = timeout(Duration::from_secs(10), coord.lock(&other, "/l"))
            .await
            .unwrap()
            .unwrap();
        assert!(started.elapsed() <= Duration::from_secs(3));
        assert!(!coord.session_exists(id));
        assert!(!coord.lease_exists(lease));
        assert_eq!(coord.get("/eph"), None);

        coord.unlock(lock).await.unwrap();
        coord.close_session(other).await.unwrap();
    }

    #[tokio::test]
    async fn zero_session_ttl_is_rejected() {
        let coord = MemoryCoordinator::new();
        assert_eq!(
            coord
                .open_session(&SessionOptions::new(Duration::ZERO))
                .await
                .err(),
            Some(MemoryError::InvalidTtl)
        );
    }

    #[tokio::test]
    async fn create_does_not_overwrite() {
        let coord = MemoryCoordinator::new();
        assert!(coord.create("/k", "first", None).await.unwrap());
        assert!(!coord.create("/k", "second", None).await.unwrap());
        assert_eq!(coord.get("/k").as_deref(), Some("first"));

        let bogus = LeaseId::new(42);
        assert_eq!(
            coord.create("/other", "v", Some(bogus)).await,
            Err(MemoryError::LeaseNotFound(bogus))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn injected_delay_fires_once() {
        let coord = MemoryCoordinator::new();
        coord.delay_next(Operation::List, Duration::from_secs(30));

        assert!(
            timeout(Duration::from_secs(1), coord.list("/"))
                .await
                .is_err()
        );
        assert!(
            timeout(Duration::from_secs(1), coord.list("/"))
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn injected_failures_fire_once() {
        let coord = MemoryCoordinator::new();
        coord.fail_next(Operation::Grant);

        assert_eq!(
            coord.grant(TTL).await,
            Err(MemoryError::Injected(Operation::Grant))
        );
        assert!(coord.grant(TTL).await.is_ok());
    }

    #[tokio::test]
    async fn put_rejects_unknown_lease() {
        let coord = MemoryCoordinator::new();
        let bogus = LeaseId::new(99);
        assert_eq!(
            coord.put("/k", "v", Some(bogus)).await,
            Err(MemoryError::LeaseNotFound(bogus))
        );
        assert_eq!(coord.get("/k"), None);
    }

    #[tokio::test]
    async fn list_is_prefix_scoped_and_ordered() {
        let coord = MemoryCoordinator::new();
        coord.put("/xid/b/node-1", "node-1", None).await.unwrap();
        coord.put("/xid/a/node-0", "node-0", None).await.unwrap();
        coord.put("/xid/a/node-2", "node-2", None).await.unwrap();
        coord.put("/xid/ab/node-0", "node-0", None).await.unwrap();

        let kvs = coord.list("/xid/a/").await.unwrap();
        let keys: Vec<_> = kvs.iter().map(|kv| kv.key.as_str()).collect();
        assert_eq!(keys, ["/xid/a/node-0", "/xid/a/node-2"]);
    }

    #[tokio::test]
    async fn closed_coordinator_rejects_everything() {
        let coord = MemoryCoordinator::new();
        let lease = coord.grant(TTL).await.unwrap();
        assert!(coord.is_connected());

        coord.close();
        assert!(!coord.is_connected());
        assert_eq!(coord.grant(TTL).await, Err(MemoryError::Closed));
        assert_eq!(coord.revoke(lease).await, Err(MemoryError::Closed));
        assert!(
            coord
                .open_session(&SessionOptions::default())
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn zero_ttl_is_rejected() {
        let coord = MemoryCoordinator::new();
        assert_eq!(coord.grant(Duration::ZERO).await, Err(MemoryError::InvalidTtl));
    }
}
