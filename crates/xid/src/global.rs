//! A process-wide encoder.
//!
//! Most services mint every id from one node id. This module holds that
//! encoder behind a [`OnceLock`] so it can be set once at startup (typically
//! with a node id from a coordination service) and read from anywhere.
//!
//! ```
//! use xid::{Encoder, extract_node};
//!
//! xid::global::init(Encoder::builder().node_id(12))?;
//! let id = xid::global::next();
//! assert_eq!(extract_node(id), 12);
//! # Ok::<(), xid::Error>(())
//! ```

use std::sync::OnceLock;

use crate::{
    error::{Error, Result},
    generator::{Encoder, EncoderBuilder},
};

static GLOBAL: OnceLock<Encoder> = OnceLock::new();

/// Builds and installs the global encoder.
///
/// # Errors
///
/// - Any error from [`EncoderBuilder::build`]; nothing is installed.
/// - [`Error::AlreadyInitialized`] if an encoder was already installed,
///   either by an earlier `init` or lazily by [`next`] or [`get`].
pub fn init(builder: EncoderBuilder) -> Result<()> {
    let encoder = builder.build()?;
    GLOBAL.set(encoder).map_err(|_| Error::AlreadyInitialized)?;

    #[cfg(feature = "tracing")]
    if let Some(encoder) = GLOBAL.get() {
        tracing::info!(
            node_id = encoder.node_id(),
            epoch_offset = encoder.epoch_offset(),
            "global encoder initialized"
        );
    }
    Ok(())
}

/// Returns the global encoder, installing the default one (node `0`, Unix
/// epoch) if [`init`] was never called.
pub fn get() -> &'static Encoder {
    GLOBAL.get_or_init(Encoder::default)
}

/// Mints the next id from the global encoder, or returns
/// [`CLOCK_ROLLBACK`](crate::CLOCK_ROLLBACK) if the wall clock moved
/// backwards.
pub fn next() -> i64 {
    get().next_i64()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{extract_node, extract_sequence, extract_time};

    // The global is shared by every test in this binary, so all global
    // behavior is checked in one test.
    #[test]
    fn global_is_set_once() {
        let bad = init(Encoder::builder().node_id(u64::MAX));
        assert!(matches!(bad, Err(Error::NodeIdNotAllowed { .. })));
        assert!(GLOBAL.get().is_none());

        init(Encoder::builder().node_id(5)).unwrap();
        assert_eq!(get().node_id(), 5);

        let again = init(Encoder::builder().node_id(6));
        assert_eq!(again, Err(Error::AlreadyInitialized));
        assert_eq!(get().node_id(), 5);

        let a = next();
        let b = next();
        assert!(a < b);
        assert_eq!(extract_node(a), 5);
        if extract_time(a) == extract_time(b) {
            assert_eq!(extract_sequence(b), extract_sequence(a) + 1);
        }
    }
}
