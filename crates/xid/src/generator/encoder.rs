use core::{cmp::Ordering, marker::PhantomData, time::Duration};
use parking_lot::Mutex;

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::{
    generator::{CLOCK_ROLLBACK, EncoderBuilder, IdGenStatus},
    id::{DefaultXid, Xid},
    time::{SystemClock, TimeSource},
};

/// Sleep between clock polls while waiting out an exhausted sequence.
const EXHAUSTED_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Mutable encoder state, guarded by the encoder's mutex.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct State {
    /// Last wall-clock second an id was minted in (Unix seconds). Starts at
    /// the epoch and never decreases.
    pub(crate) last_second: u64,
    /// Sequence the next id minted in `last_second` takes. Exceeds the
    /// layout's `max_sequence()` once the second is exhausted.
    pub(crate) sequence: u64,
}

/// A lock-based, thread-safe id encoder.
///
/// Turns `(wall-clock second, node id, intra-second sequence)` into a packed
/// [`Xid`]. All state mutation happens under a single [`Mutex`] that is held
/// only while deciding the second/sequence pair and composing the id. No I/O
/// happens under it.
///
/// ## Features
/// - ✅ Thread-safe
/// - ✅ Safely implement any [`Xid`] layout
/// - ✅ Strictly increasing ids per encoder, except across a clock rollback
///
/// ## Behavior
/// - Same second: the sequence increments. When it wraps, the encoder polls
///   the clock (sleeping 1ms between polls) until the next second and mints
///   there with sequence `0`.
/// - Newer second: the sequence resets to `0`.
/// - Older second, or a second before the epoch: [`IdGenStatus::Pending`]
///   and no state change.
///
/// Multiple encoders in one process are independent; give each one its own
/// node id.
pub struct Encoder<ID = DefaultXid, T = SystemClock>
where
    ID: Xid,
    T: TimeSource,
{
    pub(crate) state: Mutex<State>,
    node_id: u64,
    epoch_offset: u64,
    time: T,
    _id: PhantomData<fn() -> ID>,
}

impl Encoder<DefaultXid, SystemClock> {
    /// Returns a builder for an encoder with the default layout and the system
    /// clock.
    ///
    /// # Example
    /// ```
    /// use xid::{CUSTOM_EPOCH, Encoder};
    ///
    /// let encoder = Encoder::builder()
    ///     .node_id(3)
    ///     .epoch(CUSTOM_EPOCH)
    ///     .build()?;
    /// assert_eq!(encoder.node_id(), 3);
    /// # Ok::<(), xid::Error>(())
    /// ```
    pub fn builder() -> EncoderBuilder {
        EncoderBuilder::new()
    }
}

impl Default for Encoder<DefaultXid, SystemClock> {
    /// Node `0`, Unix epoch, system clock.
    fn default() -> Self {
        Self::from_parts(0, 0, SystemClock)
    }
}

impl<ID, T> Encoder<ID, T>
where
    ID: Xid,
    T: TimeSource,
{
    /// Creates an encoder from already validated parts.
    pub(crate) fn from_parts(node_id: u64, epoch_offset: u64, time: T) -> Self {
        Self {
            state: Mutex::new(State {
                last_second: epoch_offset,
                sequence: 0,
            }),
            node_id,
            epoch_offset,
            time,
            _id: PhantomData,
        }
    }

    /// Returns the node id embedded in every id.
    pub const fn node_id(&self) -> u64 {
        self.node_id
    }

    /// Returns the epoch offset in seconds since the Unix epoch.
    pub const fn epoch_offset(&self) -> u64 {
        self.epoch_offset
    }

    /// Maps an id's timestamp back to seconds since the Unix epoch.
    pub fn unix_secs(&self, id: ID) -> u64 {
        id.timestamp() + self.epoch_offset
    }

    /// Mints the next id.
    ///
    /// Returns [`IdGenStatus::Ready`] with a new id, or
    /// [`IdGenStatus::Pending`] if the wall clock is behind the last second
    /// this encoder minted in, or behind its epoch.
    ///
    /// # Example
    /// ```
    /// use xid::{Encoder, IdGenStatus, Xid};
    ///
    /// let encoder = Encoder::builder().node_id(9).build()?;
    /// let id = loop {
    ///     match encoder.next_id() {
    ///         IdGenStatus::Ready { id } => break id,
    ///         IdGenStatus::Pending { .. } => std::thread::yield_now(),
    ///     }
    /// };
    /// assert_eq!(id.node_id(), 9);
    /// # Ok::<(), xid::Error>(())
    /// ```
    #[cfg_attr(feature = "tracing", instrument(level = "trace", skip(self)))]
    pub fn next_id(&self) -> IdGenStatus<ID> {
        let now = self.time.current_secs();
        let mut state = self.state.lock();

        match now.cmp(&state.last_second) {
            Ordering::Equal => {
                if state.sequence > ID::max_sequence() {
                    state.last_second = self.cold_wait_next_second(state.last_second);
                    state.sequence = 0;
                }
            }
            Ordering::Greater => {
                state.sequence = 0;
                state.last_second = now;
            }
            Ordering::Less => return Self::cold_clock_behind(now, state.last_second),
        }

        let sequence = state.sequence;
        state.sequence += 1;
        let timestamp = state.last_second - self.epoch_offset;
        IdGenStatus::Ready {
            id: ID::from_components(timestamp, self.node_id, sequence),
        }
    }

    /// Mints the next id as a raw `i64`, or [`CLOCK_ROLLBACK`] (`-1`) if the
    /// wall clock moved backwards.
    pub fn next_i64(&self) -> i64 {
        match self.next_id() {
            IdGenStatus::Ready { id } => id.to_i64(),
            IdGenStatus::Pending { .. } => CLOCK_ROLLBACK,
        }
    }

    #[cold]
    #[inline(never)]
    fn cold_wait_next_second(&self, last_second: u64) -> u64 {
        #[cfg(feature = "tracing")]
        tracing::debug!(
            last_second,
            node_id = self.node_id,
            "sequence exhausted, waiting for the next second"
        );
        loop {
            let now = self.time.current_secs();
            if now > last_second {
                return now;
            }
            std::thread::sleep(EXHAUSTED_POLL_INTERVAL);
        }
    }

    #[cold]
    #[inline(never)]
    fn cold_clock_behind(now: u64, last_second: u64) -> IdGenStatus<ID> {
        let yield_for = last_second - now;
        #[cfg(feature = "tracing")]
        tracing::warn!(now, last_second, yield_for, "wall clock moved backwards");
        IdGenStatus::Pending { yield_for }
    }
}
