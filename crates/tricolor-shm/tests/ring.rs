//! Ring protocol tests against real named semaphores and a real segment.
//!
//! Producers run on threads of the test process; each one opens its own
//! handles by name exactly as a separate process would.

use std::io;
use std::sync::atomic::{AtomicU32, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use tricolor_shm::{
    LayoutError, Publish, RING_CAPACITY, RingNames, RingOwner, RingProducer, ShmError,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn unique_names(tag: &str) -> RingNames {
    static COUNTER: AtomicU32 = AtomicU32::new(0);
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    RingNames::new(&format!("tricolor_ring_{}_{tag}_{n}", std::process::id())).unwrap()
}

fn wait_for(what: &str, mut cond: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while !cond() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        thread::sleep(Duration::from_millis(10));
    }
}

#[test]
fn register_and_detach_track_active_producers() {
    init_tracing();
    let names = unique_names("count");
    let owner = RingOwner::<u64>::create(&names).unwrap();

    let mut a = RingProducer::<u64>::open(&names).unwrap();
    let b = RingProducer::<u64>::open(&names).unwrap();
    assert_eq!(owner.active_producers(), 0, "attaching alone does not count");

    a.register();
    a.register();
    assert!(a.is_registered() && !b.is_registered());
    assert_eq!(owner.active_producers(), 1, "register is idempotent");

    drop(b);
    assert_eq!(owner.active_producers(), 1, "unregistered detach is a no-op");

    a.detach().unwrap();
    assert_eq!(owner.active_producers(), 0);
}

#[test]
fn values_arrive_in_publish_order_across_wraparound() {
    init_tracing();
    let names = unique_names("fifo");
    let mut owner = RingOwner::<u64>::create(&names).unwrap();
    let total = (RING_CAPACITY * 3) as u64;

    let producer = {
        let names = names.clone();
        thread::spawn(move || {
            let mut producer = RingProducer::<u64>::open(&names).unwrap();
            producer.register();
            for i in 0..total {
                let outcome = producer.publish(i, || false).unwrap();
                assert!(!outcome.is_cancelled());
            }
        })
    };

    let mut received = Vec::new();
    while received.len() < total as usize {
        if let Some(v) = owner.consume(|| false).unwrap() {
            received.push(v);
        }
    }
    producer.join().unwrap();

    assert_eq!(received, (0..total).collect::<Vec<_>>());
    let status = owner.status().unwrap().unwrap();
    assert_eq!(status.free, RING_CAPACITY as u32);
    assert_eq!(status.used, 0);
    assert_eq!(status.write_pos, status.read_pos);
    assert_eq!(status.write_pos, (total % RING_CAPACITY as u64) as u32);
}

#[test]
fn concurrent_producers_fill_distinct_slots() {
    init_tracing();
    let names = unique_names("mpsc");
    let mut owner = RingOwner::<u32>::create(&names).unwrap();
    const PER_PRODUCER: u32 = 20;

    let handles: Vec<_> = (0..2u32)
        .map(|id| {
            let names = names.clone();
            thread::spawn(move || {
                let mut producer = RingProducer::<u32>::open(&names).unwrap();
                producer.register();
                let mut slots = Vec::new();
                for seq in 0..PER_PRODUCER {
                    match producer.publish((id << 16) | seq, || false).unwrap() {
                        Publish::Published { slot } => slots.push(slot),
                        Publish::Cancelled => panic!("unexpected cancellation"),
                    }
                }
                slots
            })
        })
        .collect();

    let mut slots: Vec<u32> = handles
        .into_iter()
        .flat_map(|h| h.join().unwrap())
        .collect();
    slots.sort_unstable();
    assert_eq!(slots, (0..2 * PER_PRODUCER).collect::<Vec<_>>());

    let status = owner.status().unwrap().unwrap();
    assert_eq!(status.used, 2 * PER_PRODUCER);
    assert_eq!(status.free + status.used, RING_CAPACITY as u32);
    assert_eq!(status.write_pos, 2 * PER_PRODUCER);
    assert_eq!(status.active_producers, 0);

    let mut last_seq = [None::<u32>; 2];
    for _ in 0..2 * PER_PRODUCER {
        let v = owner.consume(|| false).unwrap().unwrap();
        let (id, seq) = ((v >> 16) as usize, v & 0xffff);
        match last_seq[id] {
            None => assert_eq!(seq, 0),
            Some(prev) => assert_eq!(seq, prev + 1),
        }
        last_seq[id] = Some(seq);
    }
    assert_eq!(last_seq, [Some(PER_PRODUCER - 1); 2]);

    let status = owner.status().unwrap().unwrap();
    assert_eq!(status.free, RING_CAPACITY as u32);
    assert_eq!(status.used, 0);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
struct Record {
    pairs: [(u32, u32); 8],
    len: u32,
}

#[test]
fn records_round_trip_unchanged() {
    init_tracing();
    let names = unique_names("record");
    let mut owner = RingOwner::<Record>::create(&names).unwrap();
    let producer = RingProducer::<Record>::open(&names).unwrap();

    let mut record = Record {
        pairs: [(0, 0); 8],
        len: 3,
    };
    record.pairs[0] = (0, 1);
    record.pairs[1] = (7, 3);
    record.pairs[2] = (u32::MAX, 42);

    producer.publish(record, || false).unwrap();
    assert_eq!(owner.consume(|| false).unwrap(), Some(record));
}

#[test]
fn shutdown_releases_producer_parked_on_full_ring() {
    init_tracing();
    let names = unique_names("full");
    let mut owner = RingOwner::<u64>::create(&names).unwrap();

    let producer = {
        let names = names.clone();
        thread::spawn(move || {
            let mut producer = RingProducer::<u64>::open(&names).unwrap();
            producer.register();
            for i in 0..RING_CAPACITY as u64 {
                assert!(!producer.publish(i, || false).unwrap().is_cancelled());
            }
            // The ring is full: this one parks on the free-slots semaphore.
            producer.publish(u64::MAX, || false).unwrap()
        })
    };

    wait_for("ring to fill", || {
        owner.status().unwrap().unwrap().used == RING_CAPACITY as u32
    });
    thread::sleep(Duration::from_millis(200));

    let report = owner.shutdown().unwrap();
    assert_eq!(report.producers_released, 1);
    assert_eq!(producer.join().unwrap(), Publish::Cancelled);
}

#[test]
fn shutdown_is_idempotent_and_removes_names() {
    init_tracing();
    let names = unique_names("idem");
    let mut owner = RingOwner::<u64>::create(&names).unwrap();
    let mut producer = RingProducer::<u64>::open(&names).unwrap();
    producer.register();

    let first = owner.shutdown().unwrap();
    let second = owner.shutdown().unwrap();
    assert_eq!(first, second);
    assert_eq!(first.producers_released, 1);

    assert!(owner.is_quit());
    assert!(owner.status().unwrap().is_none());
    assert_eq!(owner.consume(|| false).unwrap(), None);

    // The attached producer keeps its own mapping and sees the quit flag.
    assert!(producer.is_quit());
    assert_eq!(producer.publish(1, || false).unwrap(), Publish::Cancelled);
    producer.detach().unwrap();

    let err = RingProducer::<u64>::open(&names).err().unwrap();
    assert_eq!(err.io_kind(), Some(io::ErrorKind::NotFound));
}

#[test]
fn second_owner_in_same_namespace_is_rejected() {
    init_tracing();
    let names = unique_names("excl");
    let owner = RingOwner::<u64>::create(&names).unwrap();

    let err = RingOwner::<u64>::create(&names).err().unwrap();
    assert_eq!(err.io_kind(), Some(io::ErrorKind::AlreadyExists));

    // The failed attempt must not have removed the first owner's names.
    RingProducer::<u64>::open(&names).unwrap().detach().unwrap();
    drop(owner);
}

#[test]
fn producer_rejects_mismatched_slot_size() {
    init_tracing();
    let names = unique_names("geom");
    let _owner = RingOwner::<u64>::create(&names).unwrap();

    match RingProducer::<u32>::open(&names) {
        Err(ShmError::Layout(LayoutError::SlotSizeMismatch { expected, found })) => {
            assert_eq!(expected, 4);
            assert_eq!(found, 8);
        }
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("mismatched producer attached"),
    }
}

#[test]
fn producer_without_owner_fails() {
    init_tracing();
    let names = unique_names("orphan");
    let err = RingProducer::<u64>::open(&names).err().unwrap();
    assert_eq!(err.io_kind(), Some(io::ErrorKind::NotFound));
}

#[test]
fn consume_gives_up_when_cancelled() {
    init_tracing();
    let names = unique_names("cancel");
    let mut owner = RingOwner::<u64>::create(&names).unwrap();
    assert_eq!(owner.consume(|| true).unwrap(), None);

    owner.request_quit();
    assert_eq!(owner.consume(|| false).unwrap(), None);
}

#[test]
fn publish_after_quit_writes_nothing() {
    init_tracing();
    let names = unique_names("late");
    let owner = RingOwner::<u64>::create(&names).unwrap();
    let producer = RingProducer::<u64>::open(&names).unwrap();

    owner.request_quit();
    assert_eq!(producer.publish(5, || false).unwrap(), Publish::Cancelled);

    let status = owner.status().unwrap().unwrap();
    assert_eq!(status.used, 0);
    assert_eq!(status.free, RING_CAPACITY as u32);
    assert_eq!(status.write_pos, 0);
}
