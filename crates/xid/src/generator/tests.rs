use crate::{
    CLOCK_ROLLBACK, DefaultXid, Encoder, EncoderBuilder, Error, IdGenStatus, SystemClock,
    TimeSource, Xid, Xid21, XidTwitter, define_xid, extract_node, extract_sequence, extract_time,
    generator::encoder::State,
};
use core::time::Duration;
use std::collections::HashSet;
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicU64, AtomicUsize, Ordering},
};
use std::thread::scope;

define_xid!(
    /// Sixteen ids per node per second, to exercise sequence exhaustion.
    TinyXid,
    reserved: 1,
    timestamp: 55,
    node: 4,
    sequence: 4
);

struct MockTime {
    secs: AtomicU64,
}

impl MockTime {
    fn new(secs: u64) -> Arc<Self> {
        Arc::new(Self {
            secs: AtomicU64::new(secs),
        })
    }

    fn set(&self, secs: u64) {
        self.secs.store(secs, Ordering::SeqCst);
    }
}

impl TimeSource for MockTime {
    fn current_secs(&self) -> u64 {
        self.secs.load(Ordering::SeqCst)
    }
}

/// Reports `before` for the first `switch_at` reads, then `after`.
struct SwitchTime {
    before: u64,
    after: u64,
    switch_at: usize,
    reads: AtomicUsize,
}

impl TimeSource for SwitchTime {
    fn current_secs(&self) -> u64 {
        if self.reads.fetch_add(1, Ordering::SeqCst) < self.switch_at {
            self.before
        } else {
            self.after
        }
    }
}

trait IdGenStatusExt<T: Xid> {
    fn unwrap_ready(self) -> T;
    fn unwrap_pending(self) -> u64;
}

impl<T: Xid> IdGenStatusExt<T> for IdGenStatus<T> {
    fn unwrap_ready(self) -> T {
        match self {
            Self::Ready { id } => id,
            Self::Pending { yield_for } => {
                panic!("unexpected pending (yield for: {yield_for})")
            }
        }
    }

    fn unwrap_pending(self) -> u64 {
        match self {
            Self::Ready { id } => panic!("unexpected ready ({id})"),
            Self::Pending { yield_for } => yield_for,
        }
    }
}

fn snapshot<ID: Xid, T: TimeSource>(encoder: &Encoder<ID, T>) -> State {
    *encoder.state.lock()
}

fn run_sequence_exhaustion<ID: Xid>() {
    let per_second = ID::max_sequence() + 1;
    let clock = SwitchTime {
        before: 42,
        after: 43,
        // Every mint reads the clock once; the read after the last one in
        // second 42 is the first poll of the exhausted wait.
        switch_at: per_second as usize + 1,
        reads: AtomicUsize::new(0),
    };
    let encoder = EncoderBuilder::new()
        .layout::<ID>()
        .node_id(1)
        .clock(clock)
        .build()
        .unwrap();

    let mut last = None;
    for expected in 0..per_second {
        let id = encoder.next_id().unwrap_ready();
        assert_eq!(id.timestamp(), 42);
        assert_eq!(id.sequence(), expected);
        assert!(last < Some(id));
        last = Some(id);
    }

    let id = encoder.next_id().unwrap_ready();
    assert_eq!(id.timestamp(), 43);
    assert_eq!(id.sequence(), 0);
    assert_eq!(id.node_id(), 1);
    assert!(last < Some(id));
}

#[test]
fn sequence_increments_within_same_second() {
    let clock = MockTime::new(42);
    let encoder = EncoderBuilder::new().clock(clock).build().unwrap();

    let id1 = encoder.next_id().unwrap_ready();
    let id2 = encoder.next_id().unwrap_ready();
    let id3 = encoder.next_id().unwrap_ready();

    assert_eq!(id1.timestamp(), 42);
    assert_eq!(id2.timestamp(), 42);
    assert_eq!(id3.timestamp(), 42);
    assert_eq!(id1.sequence(), 0);
    assert_eq!(id2.sequence(), 1);
    assert_eq!(id3.sequence(), 2);
    assert!(id1 < id2 && id2 < id3);
}

#[test]
fn twitter_layout_end_to_end() {
    let clock = MockTime::new(1_700_000_000);
    let encoder = EncoderBuilder::new()
        .layout::<XidTwitter>()
        .node_id(7)
        .clock(clock)
        .build()
        .unwrap();

    let id0 = encoder.next_id().unwrap_ready();
    let id1 = encoder.next_id().unwrap_ready();
    let id2 = encoder.next_id().unwrap_ready();

    assert!(id0 < id1 && id1 < id2);
    for id in [id0, id1, id2] {
        assert_eq!(id.node_id(), 7);
        assert_eq!(id.timestamp(), 1_700_000_000);
    }
    assert_eq!(id1.sequence(), id0.sequence() + 1);
    assert_eq!(id2.sequence(), id1.sequence() + 1);
}

#[test]
fn new_second_resets_sequence() {
    let clock = MockTime::new(42);
    let encoder = EncoderBuilder::new()
        .node_id(3)
        .clock(Arc::clone(&clock))
        .build()
        .unwrap();

    encoder.next_id().unwrap_ready();
    let before = encoder.next_id().unwrap_ready();
    assert_eq!(before.sequence(), 1);

    clock.set(45);
    let after = encoder.next_id().unwrap_ready();
    assert_eq!(after.timestamp(), 45);
    assert_eq!(after.sequence(), 0);
    assert!(before < after);
}

#[test]
fn clock_rollback_returns_pending_without_state_change() {
    let clock = MockTime::new(100);
    let encoder = EncoderBuilder::new()
        .clock(Arc::clone(&clock))
        .build()
        .unwrap();

    let first = encoder.next_id().unwrap_ready();
    let before = snapshot(&encoder);
    assert_eq!(
        before,
        State {
            last_second: 100,
            sequence: 1
        }
    );

    clock.set(97);
    assert_eq!(encoder.next_id().unwrap_pending(), 3);
    assert_eq!(encoder.next_i64(), CLOCK_ROLLBACK);
    assert_eq!(snapshot(&encoder), before);

    clock.set(100);
    let resumed = encoder.next_id().unwrap_ready();
    assert_eq!(resumed.sequence(), 1);
    assert!(first < resumed);
}

#[test]
fn clock_behind_epoch_is_pending_and_never_repeats_ids() {
    let clock = MockTime::new(1_000);
    let encoder = EncoderBuilder::new()
        .epoch(Duration::from_secs(1_000))
        .clock(Arc::clone(&clock))
        .build()
        .unwrap();
    assert_eq!(
        snapshot(&encoder),
        State {
            last_second: 1_000,
            sequence: 0
        }
    );

    clock.set(995);
    assert_eq!(encoder.next_id().unwrap_pending(), 5);
    clock.set(997);
    assert_eq!(encoder.next_id().unwrap_pending(), 3);
    assert_eq!(encoder.next_i64(), CLOCK_ROLLBACK);

    clock.set(1_000);
    let first = encoder.next_id().unwrap_ready();
    let second = encoder.next_id().unwrap_ready();
    assert_eq!(first.timestamp(), 0);
    assert_eq!(first.sequence(), 0);
    assert_eq!(second.sequence(), 1);
    assert!(first < second);
}

#[test]
fn first_id_in_epoch_second_has_sequence_zero() {
    let encoder = EncoderBuilder::new()
        .clock(MockTime::new(0))
        .build()
        .unwrap();
    let ids: Vec<_> = (0..3).map(|_| encoder.next_id().unwrap_ready()).collect();
    assert_eq!(
        ids.iter().map(|id| id.sequence()).collect::<Vec<_>>(),
        [0, 1, 2]
    );
    assert!(ids.iter().all(|id| id.timestamp() == 0));

    let encoder = EncoderBuilder::new()
        .epoch(Duration::from_secs(1_000))
        .clock(MockTime::new(1_000))
        .build()
        .unwrap();
    let id = encoder.next_id().unwrap_ready();
    assert_eq!((id.timestamp(), id.sequence()), (0, 0));
}

#[test]
fn sequence_exhaustion_rolls_over_tiny_layout() {
    run_sequence_exhaustion::<TinyXid>();
}

#[test]
fn sequence_exhaustion_rolls_over_default_layout() {
    run_sequence_exhaustion::<DefaultXid>();
}

#[test]
fn node_id_is_embedded_in_every_id() {
    let encoder = EncoderBuilder::new()
        .node_id(DefaultXid::max_node_id())
        .clock(MockTime::new(5))
        .build()
        .unwrap();

    for _ in 0..1000 {
        let raw = encoder.next_i64();
        assert_eq!(extract_node(raw), DefaultXid::max_node_id());
    }
}

#[test]
fn extract_time_recovers_second_minus_epoch() {
    let clock = MockTime::new(1_000);
    let encoder = EncoderBuilder::new()
        .epoch(Duration::from_secs(400))
        .clock(Arc::clone(&clock))
        .build()
        .unwrap();

    let raw = encoder.next_i64();
    assert_eq!(extract_time(raw), 600);
    assert_eq!(extract_sequence(raw), 0);

    let id = DefaultXid::try_from(raw).unwrap();
    assert_eq!(encoder.unix_secs(id), 1_000);
}

#[test]
fn builder_rejects_node_id_out_of_range() {
    let err = EncoderBuilder::new()
        .node_id(Xid21::max_node_id() + 1)
        .layout::<Xid21>()
        .build()
        .err();
    assert_eq!(
        err,
        Some(Error::NodeIdNotAllowed {
            node_id: 256,
            max: 255
        })
    );
}

#[test]
fn builder_rejects_future_epoch() {
    let err = EncoderBuilder::new()
        .epoch(Duration::from_secs(2_000))
        .clock(MockTime::new(1_000))
        .build()
        .err();
    assert_eq!(
        err,
        Some(Error::EpochInFuture {
            epoch_secs: 2_000,
            now_secs: 1_000
        })
    );
}

#[test]
fn builder_zero_epoch_is_noop() {
    let encoder = EncoderBuilder::new()
        .epoch(Duration::ZERO)
        .clock(MockTime::new(0))
        .build()
        .unwrap();
    assert_eq!(encoder.epoch_offset(), 0);
}

#[test]
fn builder_fails_fast_on_first_invalid_setting() {
    let err = EncoderBuilder::new()
        .node_id(10_000)
        .epoch(Duration::from_secs(u64::MAX))
        .clock(MockTime::new(1))
        .build()
        .err();
    assert!(matches!(err, Some(Error::NodeIdNotAllowed { .. })));
}

#[test]
fn default_encoder_uses_node_zero() {
    let encoder = Encoder::default();
    assert_eq!(encoder.node_id(), 0);
    assert_eq!(encoder.epoch_offset(), 0);

    let raw = encoder.next_i64();
    assert!(raw > 0);
    assert_eq!(extract_node(raw), 0);
}

#[test]
fn system_clock_ids_are_strictly_increasing() {
    let encoder = EncoderBuilder::new()
        .node_id(1)
        .clock(SystemClock)
        .build()
        .unwrap();

    let mut last = encoder.next_id().unwrap_ready();
    for _ in 0..100_000 {
        let id = loop {
            match encoder.next_id() {
                IdGenStatus::Ready { id } => break id,
                IdGenStatus::Pending { .. } => std::thread::yield_now(),
            }
        };
        assert!(id > last);
        assert_eq!(id.node_id(), 1);
        last = id;
    }
}

#[test]
fn threaded_ids_are_unique() {
    const THREADS: usize = 8;
    const IDS_PER_THREAD: usize = 25_000;
    const TOTAL_IDS: usize = THREADS * IDS_PER_THREAD;

    let encoder = Arc::new(Encoder::builder().node_id(2).build().unwrap());
    let seen_ids = Arc::new(Mutex::new(HashSet::with_capacity(TOTAL_IDS)));

    scope(|s| {
        for _ in 0..THREADS {
            let encoder = Arc::clone(&encoder);
            let seen_ids = Arc::clone(&seen_ids);

            s.spawn(move || {
                let mut last = None;
                for _ in 0..IDS_PER_THREAD {
                    let id = loop {
                        match encoder.next_id() {
                            IdGenStatus::Ready { id } => break id,
                            IdGenStatus::Pending { .. } => std::thread::yield_now(),
                        }
                    };
                    assert!(last < Some(id));
                    last = Some(id);
                    assert!(seen_ids.lock().unwrap().insert(id));
                }
            });
        }
    });

    let final_count = seen_ids.lock().unwrap().len();
    assert_eq!(final_count, TOTAL_IDS, "Expected {TOTAL_IDS} unique IDs");
}
