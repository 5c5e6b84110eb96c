use crate::Xid;

/// Sentinel returned by [`Encoder::next_i64`] when the wall clock reports a
/// second earlier than the last one the encoder used.
///
/// [`Encoder::next_i64`]: crate::Encoder::next_i64
pub const CLOCK_ROLLBACK: i64 = -1;

/// Represents the result of attempting to mint a new id.
///
/// - [`IdGenStatus::Ready`] indicates a new ID was successfully generated.
/// - [`IdGenStatus::Pending`] means the wall clock is behind the last second
///   the encoder used. Nothing was minted and the encoder state is untouched.
///
/// The encoder does not compensate for a clock that stepped backwards. Callers
/// retry later or treat it as an error.
///
/// # Example
///
/// ```
/// use xid::{Encoder, IdGenStatus};
///
/// let encoder = Encoder::builder().node_id(1).build()?;
/// match encoder.next_id() {
///     IdGenStatus::Ready { id } => println!("ID: {id}"),
///     IdGenStatus::Pending { yield_for } => println!("Clock behind, retry in {yield_for}s"),
/// }
/// # Ok::<(), xid::Error>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdGenStatus<ID: Xid> {
    /// A unique ID was generated and is ready to use.
    Ready {
        /// The generated ID.
        id: ID,
    },
    /// No ID could be generated because the clock moved backwards.
    Pending {
        /// How many seconds the clock is behind the encoder's last second.
        yield_for: u64,
    },
}
