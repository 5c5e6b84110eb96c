//! Error types for node-id allocation.
//!
//! Allocation fails for one of three reasons: the inputs are unusable
//! (`InvalidClient`, `InvalidKey`), every node id in the namespace is taken
//! (`NodeExhausted`), or the coordination backend returned an error at some
//! step of the protocol (`Coordination`). The backend error is kept as the
//! `source` so callers can downcast it to their backend's error type.

use core::fmt;

pub type Result<T, E = Error> = core::result::Result<T, E>;

/// A type-erased backend error.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The step of the allocation protocol that failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Stage {
    /// Opening the coordination session.
    Session,
    /// Acquiring the allocation lock.
    Lock,
    /// Listing existing registrations.
    Scan,
    /// Granting the registration lease.
    Grant,
    /// Writing the registration key.
    Register,
    /// Releasing the allocation lock.
    Unlock,
    /// Starting the lease keepalive.
    KeepAlive,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stage = match self {
            Self::Session => "opening session",
            Self::Lock => "acquiring lock",
            Self::Scan => "scanning registrations",
            Self::Grant => "granting lease",
            Self::Register => "registering node",
            Self::Unlock => "releasing lock",
            Self::KeepAlive => "starting keepalive",
        };
        f.write_str(stage)
    }
}

/// Unified error type for node-id allocation.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// No coordination client was supplied, or it reports itself
    /// disconnected.
    #[error("coordination client is missing or disconnected")]
    InvalidClient,

    /// The allocation key is empty.
    #[error("allocation key must not be empty")]
    InvalidKey,

    /// Every node id in `0..=max_node` is registered under `prefix`.
    #[error("no free node id under {prefix} (all of 0..={max_node} are registered)")]
    NodeExhausted { prefix: String, max_node: u64 },

    /// The coordination backend failed during `stage`.
    #[error("coordination failed while {stage}")]
    Coordination {
        stage: Stage,
        #[source]
        source: BoxError,
    },
}

impl Error {
    pub(crate) fn coordination<E>(stage: Stage, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Coordination {
            stage,
            source: Box::new(source),
        }
    }

    /// Returns `true` if the namespace has no free node id left.
    pub const fn is_exhausted(&self) -> bool {
        matches!(self, Self::NodeExhausted { .. })
    }

    /// Returns the failed protocol step for coordination errors.
    pub const fn stage(&self) -> Option<Stage> {
        match self {
            Self::Coordination { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}
