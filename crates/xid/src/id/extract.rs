//! Decoding helpers for raw ids of the build's [`DefaultXid`] layout.
//!
//! These are pure shift/mask functions: no encoder, clock or lock involved, so
//! they are safe to call from any thread. The timestamp is relative to the
//! producing encoder's epoch; see [`Encoder::unix_secs`] to map it back.
//!
//! [`Encoder::unix_secs`]: crate::Encoder::unix_secs

use crate::DefaultXid;

/// Returns the timestamp field (seconds since the producer's epoch).
///
/// # Example
/// ```
/// use xid::{DefaultXid, Xid, extract_node, extract_sequence, extract_time};
///
/// let id = DefaultXid::from_components(1_700_000_000, 7, 3).to_i64();
/// assert_eq!(extract_time(id), 1_700_000_000);
/// assert_eq!(extract_node(id), 7);
/// assert_eq!(extract_sequence(id), 3);
/// ```
pub const fn extract_time(id: i64) -> u64 {
    debug_assert!(id >= 0, "ids are never negative");
    ((id as u64) >> DefaultXid::TIMESTAMP_SHIFT) & DefaultXid::TIMESTAMP_MASK
}

/// Returns the node id field.
pub const fn extract_node(id: i64) -> u64 {
    debug_assert!(id >= 0, "ids are never negative");
    ((id as u64) >> DefaultXid::NODE_ID_SHIFT) & DefaultXid::NODE_ID_MASK
}

/// Returns the intra-second sequence field.
pub const fn extract_sequence(id: i64) -> u64 {
    debug_assert!(id >= 0, "ids are never negative");
    ((id as u64) >> DefaultXid::SEQUENCE_SHIFT) & DefaultXid::SEQUENCE_MASK
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Xid;

    #[test]
    fn extract_matches_layout_accessors() {
        let id = DefaultXid::from_components(1_234_567, DefaultXid::max_node_id(), 42);
        let raw = id.to_i64();

        assert_eq!(extract_time(raw), id.timestamp());
        assert_eq!(extract_node(raw), id.node_id());
        assert_eq!(extract_sequence(raw), id.sequence());
    }

    #[test]
    fn extract_is_pure() {
        let raw = DefaultXid::from_components(99, 1, 2).to_i64();
        assert_eq!(extract_time(raw), extract_time(raw));
        assert_eq!(extract_node(raw), extract_node(raw));
        assert_eq!(extract_sequence(raw), extract_sequence(raw));
    }

    #[test]
    fn extract_zero() {
        assert_eq!(extract_time(0), 0);
        assert_eq!(extract_node(0), 0);
        assert_eq!(extract_sequence(0), 0);
    }

    #[test]
    #[should_panic(expected = "ids are never negative")]
    fn extract_rejects_rollback_sentinel() {
        extract_node(-1);
    }
}
