/// A result type defaulting to this crate's [`Error`].
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// All errors that `xid` can produce.
///
/// Every variant is a configuration error raised while building an
/// [`Encoder`] or decoding a raw value. Minting an id never fails: a wall clock
/// that moves backwards is reported through [`IdGenStatus::Pending`] instead.
///
/// [`Encoder`]: crate::Encoder
/// [`IdGenStatus::Pending`]: crate::IdGenStatus::Pending
#[derive(Clone, Debug, PartialEq, Eq, Hash, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The node id does not fit in the layout's node field.
    #[error("node id {node_id} not allowed (valid range is 0..={max})")]
    NodeIdNotAllowed {
        /// The rejected node id.
        node_id: u64,
        /// The largest node id the layout can encode.
        max: u64,
    },

    /// The epoch lies after the current time of the encoder's clock.
    #[error("epoch {epoch_secs}s is later than the current time {now_secs}s")]
    EpochInFuture {
        /// The requested epoch, in seconds since the Unix epoch.
        epoch_secs: u64,
        /// The clock reading at build time.
        now_secs: u64,
    },

    /// The process-wide encoder was already set.
    #[error("global encoder already initialized")]
    AlreadyInitialized,

    /// A raw value is outside the id space (ids are never negative).
    #[error("invalid id {0}: outside the id space")]
    InvalidId(i64),
}
