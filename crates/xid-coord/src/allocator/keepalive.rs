use futures::StreamExt;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::{close_session, revoke_quietly};
use crate::coordinator::{Coordinator, LeaseId};

/// How a registration is torn down.
pub(crate) enum Release<C: Coordinator> {
    /// Revoke the registration's own lease.
    Revoke(LeaseId),
    /// Close the session the registration is bound to.
    CloseSession(C::Session),
}

impl<C: Coordinator> Release<C> {
    pub(crate) async fn run(self, client: &C) {
        match self {
            Self::Revoke(lease) => revoke_quietly(client, lease).await,
            Self::CloseSession(session) => close_session(client, session).await,
        }
    }
}

/// Spawns the task that keeps a registration alive.
///
/// The task consumes lease renewals until the renewal stream ends (the lease
/// could not be kept alive) or `token` is cancelled. Either way it then
/// releases the registration, which deletes its key, and exits.
pub(crate) fn spawn<C: Coordinator>(
    client: Arc<C>,
    lease: LeaseId,
    key: String,
    mut renewals: C::KeepAlive,
    release: Release<C>,
    token: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tracing::debug!(%lease, key = %key, "keepalive started");

        loop {
            tokio::select! {
                biased;
                () = token.cancelled() => {
                    tracing::debug!(%lease, key = %key, "keepalive cancelled");
                    break;
                }
                renewal = renewals.next() => match renewal {
                    Some(renewal) => {
                        tracing::trace!(%lease, ttl_secs = renewal.ttl.as_secs(), "lease renewed");
                    }
                    None => {
                        tracing::warn!(%lease, key = %key, "keepalive stream closed, registration lost");
                        break;
                    }
                },
            }
        }

        release.run(&*client).await;
        tracing::debug!(%lease, key = %key, "registration released");
    })
}
