use core::{marker::PhantomData, time::Duration};

use crate::{
    error::{Error, Result},
    generator::Encoder,
    id::{DefaultXid, Xid},
    time::{SystemClock, TimeSource},
};

/// Validated construction of an [`Encoder`].
///
/// Settings are checked by [`EncoderBuilder::build`] in the order they apply
/// to the encoder (node id, then epoch) and the first invalid one is
/// returned. Nothing is validated earlier, so a builder can be passed around
/// and completed by different parts of an application, e.g. a node id handed
/// out by a coordination service.
///
/// # Example
/// ```
/// use core::time::Duration;
/// use xid::{EncoderBuilder, Error, XidTwitter};
///
/// let encoder = EncoderBuilder::new()
///     .layout::<XidTwitter>()
///     .node_id(1023)
///     .epoch(Duration::from_secs(1_600_000_000))
///     .build()?;
/// assert_eq!(encoder.epoch_offset(), 1_600_000_000);
///
/// let err = EncoderBuilder::new().layout::<XidTwitter>().node_id(1024).build();
/// assert!(matches!(err, Err(Error::NodeIdNotAllowed { node_id: 1024, max: 1023 })));
/// # Ok::<(), xid::Error>(())
/// ```
#[derive(Clone, Debug)]
pub struct EncoderBuilder<ID = DefaultXid, T = SystemClock> {
    node_id: u64,
    epoch: Duration,
    time: T,
    _id: PhantomData<fn() -> ID>,
}

impl Default for EncoderBuilder<DefaultXid, SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl EncoderBuilder<DefaultXid, SystemClock> {
    /// Node `0`, Unix epoch, default layout, system clock.
    pub const fn new() -> Self {
        Self {
            node_id: 0,
            epoch: Duration::ZERO,
            time: SystemClock,
            _id: PhantomData,
        }
    }
}

impl<ID, T> EncoderBuilder<ID, T>
where
    ID: Xid,
    T: TimeSource,
{
    /// Sets the node id embedded in every id. Must be at most
    /// [`Xid::max_node_id`] of the layout.
    #[must_use]
    pub fn node_id(mut self, node_id: u64) -> Self {
        self.node_id = node_id;
        self
    }

    /// Sets the epoch, as a [`Duration`] since 1970-01-01 UTC. Timestamps are
    /// encoded relative to it, which extends the usable range of the layout.
    /// A zero epoch keeps the Unix epoch.
    #[must_use]
    pub fn epoch(mut self, epoch: Duration) -> Self {
        self.epoch = epoch;
        self
    }

    /// Replaces the clock.
    pub fn clock<U: TimeSource>(self, time: U) -> EncoderBuilder<ID, U> {
        EncoderBuilder {
            node_id: self.node_id,
            epoch: self.epoch,
            time,
            _id: PhantomData,
        }
    }

    /// Selects the id layout.
    pub fn layout<L: Xid>(self) -> EncoderBuilder<L, T> {
        EncoderBuilder {
            node_id: self.node_id,
            epoch: self.epoch,
            time: self.time,
            _id: PhantomData,
        }
    }

    /// Validates the settings and creates the encoder.
    ///
    /// # Errors
    ///
    /// - [`Error::NodeIdNotAllowed`] if the node id does not fit the layout.
    /// - [`Error::EpochInFuture`] if a non-zero epoch is later than the
    ///   clock's current second.
    pub fn build(self) -> Result<Encoder<ID, T>> {
        let max = ID::max_node_id();
        if self.node_id > max {
            return Err(Error::NodeIdNotAllowed {
                node_id: self.node_id,
                max,
            });
        }

        let epoch_secs = self.epoch.as_secs();
        if epoch_secs != 0 {
            let now_secs = self.time.current_secs();
            if epoch_secs > now_secs {
                return Err(Error::EpochInFuture {
                    epoch_secs,
                    now_secs,
                });
            }
        }

        Ok(Encoder::from_parts(self.node_id, epoch_secs, self.time))
    }
}
