use core::{fmt, hash::Hash};

/// A packed, time-ordered 64-bit identifier.
///
/// Implementors split a `u64` into a reserved high part, a `timestamp`
/// (seconds since an epoch), a `node_id` and a `sequence`, from the most to
/// the least significant bit. Because the timestamp occupies the high bits,
/// ordering ids numerically orders them by time first.
///
/// Layouts are normally declared with [`define_xid!`], which also enforces
/// that all 64 bits are accounted for.
///
/// # Example
///
/// ```
/// use xid::{Xid, XidTwitter};
///
/// let id = XidTwitter::from_components(1000, 2, 1);
/// assert_eq!(id.timestamp(), 1000);
/// assert_eq!(id.node_id(), 2);
/// assert_eq!(id.sequence(), 1);
/// ```
///
/// [`define_xid!`]: crate::define_xid
pub trait Xid:
    Copy
    + Clone
    + fmt::Display
    + fmt::Debug
    + PartialOrd
    + Ord
    + PartialEq
    + Eq
    + Hash
    + Send
    + Sync
    + 'static
{
    /// Returns the timestamp portion of the ID.
    fn timestamp(&self) -> u64;

    /// Returns the maximum possible value for the timestamp field.
    fn max_timestamp() -> u64;

    /// Returns the node ID portion of the ID.
    fn node_id(&self) -> u64;

    /// Returns the maximum possible value for the node ID field.
    fn max_node_id() -> u64;

    /// Returns the sequence portion of the ID.
    fn sequence(&self) -> u64;

    /// Returns the maximum possible value for the sequence field.
    fn max_sequence() -> u64;

    /// Constructs a new ID from its components.
    fn from_components(timestamp: u64, node_id: u64, sequence: u64) -> Self;

    /// Converts this type into its raw representation.
    fn to_raw(&self) -> u64;

    /// Converts a raw value into this type.
    fn from_raw(raw: u64) -> Self;

    /// Returns the ID as a signed integer. Never negative, since the sign bit
    /// is always reserved.
    fn to_i64(&self) -> i64 {
        self.to_raw() as i64
    }

    /// Returns `sequence + 1`, wrapping to zero past [`Xid::max_sequence`].
    fn next_sequence(sequence: u64) -> u64 {
        sequence.wrapping_add(1) & Self::max_sequence()
    }
}
