//! Declarative id layouts.
//!
//! Every layout is a newtype over `u64` generated by [`define_xid!`]. The
//! shipped layouts use second-resolution timestamps and reserve the sign bit so
//! that ids survive storage as `i64` (SQL `BIGINT`, JSON numbers, Java `long`).

/// Declares an [`Xid`]-compatible type with a custom bit layout.
///
/// The id is packed from **MSB to LSB**:
///
/// ```text
///  Bit Index:  63                                                    0
///              +--------------+---------------+-----------+-----------+
///  Field:      | reserved (R) | timestamp (T) | node (N)  | seq (S)   |
///              +--------------+---------------+-----------+-----------+
///              |<------------ MSB ------- 64 bits ------- LSB ------->|
/// ```
///
/// `R + T + N + S` must equal 64 and `R` must be at least 1; both are checked
/// at compile time.
///
/// ## Example
///
/// ```
/// use xid::{Xid, define_xid};
///
/// define_xid!(
///     /// Four nodes, sixteen ids per second.
///     TinyXid,
///     reserved: 1,
///     timestamp: 57,
///     node: 2,
///     sequence: 4
/// );
///
/// let id = TinyXid::from_components(42, 3, 15);
/// assert_eq!(id.timestamp(), 42);
/// assert_eq!(id.node_id(), 3);
/// assert_eq!(id.sequence(), 15);
/// assert_eq!(TinyXid::max_node_id(), 3);
/// ```
///
/// [`Xid`]: crate::Xid
#[macro_export]
macro_rules! define_xid {
    (
        $(#[$meta:meta])*
        $name:ident,
        reserved: $reserved_bits:expr,
        timestamp: $timestamp_bits:expr,
        node: $node_bits:expr,
        sequence: $sequence_bits:expr
    ) => {
        $(#[$meta])*
        #[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name {
            id: u64,
        }

        const _: () = {
            // Compile-time check: total bit width _must_ equal 64 so that
            // producers and decoders never disagree on a shift.
            assert!(
                $reserved_bits + $timestamp_bits + $node_bits + $sequence_bits == u64::BITS,
                "Xid layout must account for exactly 64 bits"
            );
            assert!(
                $reserved_bits >= 1,
                "Xid layout must reserve the sign bit"
            );
        };

        impl $name {
            pub const RESERVED_BITS: u32 = $reserved_bits;
            pub const TIMESTAMP_BITS: u32 = $timestamp_bits;
            pub const NODE_ID_BITS: u32 = $node_bits;
            pub const SEQUENCE_BITS: u32 = $sequence_bits;

            pub const SEQUENCE_SHIFT: u32 = 0;
            pub const NODE_ID_SHIFT: u32 = Self::SEQUENCE_SHIFT + Self::SEQUENCE_BITS;
            pub const TIMESTAMP_SHIFT: u32 = Self::NODE_ID_SHIFT + Self::NODE_ID_BITS;
            pub const RESERVED_SHIFT: u32 = Self::TIMESTAMP_SHIFT + Self::TIMESTAMP_BITS;

            pub const TIMESTAMP_MASK: u64 = (1 << Self::TIMESTAMP_BITS) - 1;
            pub const NODE_ID_MASK: u64 = (1 << Self::NODE_ID_BITS) - 1;
            pub const SEQUENCE_MASK: u64 = (1 << Self::SEQUENCE_BITS) - 1;

            /// Packs the three fields, masking each one to its width.
            pub const fn from(timestamp: u64, node_id: u64, sequence: u64) -> Self {
                let t = (timestamp & Self::TIMESTAMP_MASK) << Self::TIMESTAMP_SHIFT;
                let n = (node_id & Self::NODE_ID_MASK) << Self::NODE_ID_SHIFT;
                let s = (sequence & Self::SEQUENCE_MASK) << Self::SEQUENCE_SHIFT;
                Self { id: t | n | s }
            }

            /// Extracts the timestamp from the packed ID.
            pub const fn timestamp(&self) -> u64 {
                (self.id >> Self::TIMESTAMP_SHIFT) & Self::TIMESTAMP_MASK
            }

            /// Extracts the node ID from the packed ID.
            pub const fn node_id(&self) -> u64 {
                (self.id >> Self::NODE_ID_SHIFT) & Self::NODE_ID_MASK
            }

            /// Extracts the sequence number from the packed ID.
            pub const fn sequence(&self) -> u64 {
                (self.id >> Self::SEQUENCE_SHIFT) & Self::SEQUENCE_MASK
            }

            /// Returns the maximum representable timestamp value based on
            /// `Self::TIMESTAMP_BITS`.
            pub const fn max_timestamp() -> u64 {
                Self::TIMESTAMP_MASK
            }

            /// Returns the maximum representable node ID value based on
            /// `Self::NODE_ID_BITS`.
            pub const fn max_node_id() -> u64 {
                Self::NODE_ID_MASK
            }

            /// Returns the maximum representable sequence value based on
            /// `Self::SEQUENCE_BITS`.
            pub const fn max_sequence() -> u64 {
                Self::SEQUENCE_MASK
            }

            /// Returns the ID as a signed integer.
            pub const fn to_i64(&self) -> i64 {
                self.id as i64
            }

            /// Returns the ID as a zero-padded 19-digit string, so that
            /// lexicographic order matches numeric order.
            pub fn to_padded_string(&self) -> String {
                format!("{:019}", self.id)
            }
        }

        impl $crate::Xid for $name {
            fn timestamp(&self) -> u64 {
                self.timestamp()
            }

            fn max_timestamp() -> u64 {
                Self::TIMESTAMP_MASK
            }

            fn node_id(&self) -> u64 {
                self.node_id()
            }

            fn max_node_id() -> u64 {
                Self::NODE_ID_MASK
            }

            fn sequence(&self) -> u64 {
                self.sequence()
            }

            fn max_sequence() -> u64 {
                Self::SEQUENCE_MASK
            }

            fn from_components(timestamp: u64, node_id: u64, sequence: u64) -> Self {
                debug_assert!(timestamp <= Self::TIMESTAMP_MASK, "timestamp overflow");
                debug_assert!(node_id <= Self::NODE_ID_MASK, "node_id overflow");
                debug_assert!(sequence <= Self::SEQUENCE_MASK, "sequence overflow");
                Self::from(timestamp, node_id, sequence)
            }

            fn to_raw(&self) -> u64 {
                self.id
            }

            fn from_raw(raw: u64) -> Self {
                Self { id: raw }
            }
        }

        impl core::convert::TryFrom<i64> for $name {
            type Error = $crate::Error;

            fn try_from(raw: i64) -> core::result::Result<Self, Self::Error> {
                if raw < 0 || (raw as u64) >> Self::RESERVED_SHIFT != 0 {
                    return Err($crate::Error::InvalidId(raw));
                }
                Ok(Self { id: raw as u64 })
            }
        }

        impl core::convert::From<$name> for i64 {
            fn from(id: $name) -> i64 {
                id.to_i64()
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.id)
            }
        }

        impl core::fmt::Debug for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                let full = core::any::type_name::<Self>();
                let name = full.rsplit("::").next().unwrap_or(full);
                f.debug_struct(name)
                    .field("id", &format_args!("{} (0x{:x})", self.id, self.id))
                    .field("padded", &self.to_padded_string())
                    .field("timestamp", &self.timestamp())
                    .field("node_id", &self.node_id())
                    .field("sequence", &self.sequence())
                    .finish()
            }
        }

        $crate::cfg_serde! {
            impl $crate::__private::serde::Serialize for $name {
                fn serialize<S>(&self, serializer: S) -> core::result::Result<S::Ok, S::Error>
                where
                    S: $crate::__private::serde::Serializer,
                {
                    serializer.serialize_i64(self.to_i64())
                }
            }

            impl<'de> $crate::__private::serde::Deserialize<'de> for $name {
                fn deserialize<D>(deserializer: D) -> core::result::Result<Self, D::Error>
                where
                    D: $crate::__private::serde::Deserializer<'de>,
                {
                    let raw = <i64 as $crate::__private::serde::Deserialize>::deserialize(deserializer)?;
                    <Self as core::convert::TryFrom<i64>>::try_from(raw)
                        .map_err(<D::Error as $crate::__private::serde::de::Error>::custom)
                }
            }
        }
    };
}

define_xid!(
    /// A 64-bit id with a 21-bit sequence.
    ///
    /// - 1 bit reserved
    /// - 34 bits timestamp (seconds since the encoder's epoch, good until
    ///   ~2514 with the Unix epoch)
    /// - 8 bits node ID
    /// - 21 bits sequence (2,097,152 ids per node per second)
    ///
    /// ```text
    ///  Bit Index:  63           63 62            29 28          21 20              0
    ///              +--------------+----------------+--------------+----------------+
    ///  Field:      | reserved (1) | timestamp (34) | node ID (8)  | sequence (21)  |
    ///              +--------------+----------------+--------------+----------------+
    ///              |<------------ MSB ------------ 64 bits ----------- LSB ------->|
    /// ```
    Xid21,
    reserved: 1,
    timestamp: 34,
    node: 8,
    sequence: 21
);

define_xid!(
    /// A 64-bit id with a 22-bit sequence.
    ///
    /// - 1 bit reserved
    /// - 33 bits timestamp (seconds since the encoder's epoch, good until
    ///   ~2242 with the Unix epoch)
    /// - 8 bits node ID
    /// - 22 bits sequence (4,194,304 ids per node per second)
    ///
    /// ```text
    ///  Bit Index:  63           63 62            30 29          22 21              0
    ///              +--------------+----------------+--------------+----------------+
    ///  Field:      | reserved (1) | timestamp (33) | node ID (8)  | sequence (22)  |
    ///              +--------------+----------------+--------------+----------------+
    ///              |<------------ MSB ------------ 64 bits ----------- LSB ------->|
    /// ```
    Xid22,
    reserved: 1,
    timestamp: 33,
    node: 8,
    sequence: 22
);

define_xid!(
    /// A 64-bit id using the Twitter field widths with second resolution.
    ///
    /// - 1 bit reserved
    /// - 41 bits timestamp
    /// - 10 bits node ID
    /// - 12 bits sequence
    ///
    /// ```text
    ///  Bit Index:  63           63 62            22 21             12 11             0
    ///              +--------------+----------------+-----------------+---------------+
    ///  Field:      | reserved (1) | timestamp (41) | node ID (10)    | sequence (12) |
    ///              +--------------+----------------+-----------------+---------------+
    ///              |<----------- MSB ---------- 64 bits ----------- LSB ------------>|
    /// ```
    XidTwitter,
    reserved: 1,
    timestamp: 41,
    node: 10,
    sequence: 12
);

/// The layout selected at build time through the `seq-21` or `seq-22`
/// feature.
#[cfg(feature = "seq-21")]
pub type DefaultXid = Xid21;

/// The layout selected at build time through the `seq-21` or `seq-22`
/// feature.
#[cfg(all(feature = "seq-22", not(feature = "seq-21")))]
pub type DefaultXid = Xid22;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Error, Xid};

    #[test]
    fn xid21_fields_and_bounds() {
        let ts = Xid21::max_timestamp();
        let node = Xid21::max_node_id();
        let seq = Xid21::max_sequence();
        assert_eq!(node, 255);
        assert_eq!(seq, (1 << 21) - 1);

        let id = Xid21::from_components(ts, node, seq);
        assert_eq!(id.timestamp(), ts);
        assert_eq!(id.node_id(), node);
        assert_eq!(id.sequence(), seq);
        assert_eq!(id.to_i64(), i64::MAX);
    }

    #[test]
    fn xid22_fields_and_bounds() {
        assert_eq!(Xid22::max_timestamp(), (1 << 33) - 1);
        assert_eq!(Xid22::max_node_id(), 255);
        assert_eq!(Xid22::max_sequence(), (1 << 22) - 1);

        let id = Xid22::from_components(1, 2, 3);
        assert_eq!(id.to_raw(), (1 << 30) | (2 << 22) | 3);
    }

    #[test]
    fn twitter_layout_matches_known_shifts() {
        let id = XidTwitter::from_components(1, 7, 5);
        assert_eq!(id.to_raw(), (1 << 22) | (7 << 12) | 5);
        assert_eq!(XidTwitter::max_node_id(), 1023);
        assert_eq!(XidTwitter::max_sequence(), 4095);
    }

    #[test]
    fn timestamp_dominates_ordering() {
        let older = Xid21::from_components(10, 255, Xid21::max_sequence());
        let newer = Xid21::from_components(11, 0, 0);
        assert!(older < newer);
        assert!(older.to_i64() < newer.to_i64());
    }

    #[test]
    fn try_from_rejects_negative_values() {
        assert_eq!(Xid21::try_from(-1_i64), Err(Error::InvalidId(-1)));
        assert_eq!(Xid21::try_from(i64::MIN), Err(Error::InvalidId(i64::MIN)));

        let id = Xid21::try_from(12345_i64).unwrap();
        assert_eq!(i64::from(id), 12345);
    }

    #[test]
    fn next_sequence_wraps() {
        assert_eq!(Xid21::next_sequence(0), 1);
        assert_eq!(Xid21::next_sequence(Xid21::max_sequence()), 0);
        assert_eq!(XidTwitter::next_sequence(4095), 0);
    }

    #[test]
    fn padded_string_preserves_order() {
        let a = Xid21::from_components(1, 0, 0).to_padded_string();
        let b = Xid21::from_components(100, 0, 0).to_padded_string();
        assert_eq!(a.len(), 19);
        assert_eq!(b.len(), 19);
        assert!(a < b);
    }

    #[test]
    #[should_panic(expected = "timestamp overflow")]
    fn timestamp_overflow_panics() {
        Xid21::from_components(Xid21::max_timestamp() + 1, 0, 0);
    }

    #[test]
    #[should_panic(expected = "node_id overflow")]
    fn node_id_overflow_panics() {
        Xid21::from_components(0, 256, 0);
    }

    #[test]
    #[should_panic(expected = "sequence overflow")]
    fn sequence_overflow_panics() {
        Xid21::from_components(0, 0, Xid21::max_sequence() + 1);
    }

    #[test]
    fn debug_shows_fields() {
        let id = Xid21::from_components(3, 2, 1);
        let debug = format!("{id:?}");
        assert!(debug.starts_with("Xid21"));
        assert!(debug.contains("node_id: 2"));
        assert!(debug.contains("sequence: 1"));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn serde_uses_signed_integer() {
        let id = Xid21::from_components(1_700_000_000, 4, 9);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, id.to_i64().to_string());
        let back: Xid21 = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);

        assert!(serde_json::from_str::<Xid21>("-5").is_err());
    }
}
