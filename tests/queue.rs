use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use disruptor_queue::{
    BlockingQueue, CancelToken, ConcurrentQueue, ConcurrentRingBuffer, DisruptorBlockingQueue,
    QueueBuilder, QueueError, SpinPolicy,
};
use proptest::prelude::*;

const POLICIES: [SpinPolicy; 3] = [
    SpinPolicy::Blocking,
    SpinPolicy::Spinning,
    SpinPolicy::Waiting,
];

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_test_writer()
        .try_init();
}

#[test]
fn test_mpmc_put_take_loses_nothing() {
    init_tracing();
    const PRODUCERS: usize = 4;
    const CONSUMERS: usize = 3;
    const PER_PRODUCER: usize = 5_000;
    const TOTAL: usize = PRODUCERS * PER_PRODUCER;

    for policy in POLICIES {
        let queue = Arc::new(DisruptorBlockingQueue::with_spin_policy(16, policy).unwrap());
        let remaining = Arc::new(AtomicUsize::new(TOTAL));

        let producers: Vec<_> = (0..PRODUCERS)
            .map(|p| {
                let queue = queue.clone();
                thread::spawn(move || {
                    for i in 0..PER_PRODUCER {
                        queue.put(p * PER_PRODUCER + i);
                    }
                })
            })
            .collect();

        let consumers: Vec<_> = (0..CONSUMERS)
            .map(|_| {
                let queue = queue.clone();
                let remaining = remaining.clone();
                thread::spawn(move || {
                    let mut seen = Vec::new();
                    // reserve one element before taking it so no consumer blocks forever
                    while remaining
                        .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
                        .is_ok()
                    {
                        seen.push(queue.take());
                    }
                    seen
                })
            })
            .collect();

        for producer in producers {
            producer.join().unwrap();
        }
        let mut all = HashSet::new();
        for consumer in consumers {
            for value in consumer.join().unwrap() {
                assert!(all.insert(value), "duplicate {value} under {policy:?}");
            }
        }
        assert_eq!(all.len(), TOTAL);
        assert!(queue.is_empty());
    }
}

#[test]
fn test_per_producer_order_is_preserved() {
    const PER_PRODUCER: u32 = 10_000;
    let queue = Arc::new(ConcurrentRingBuffer::new(32).unwrap());

    let producers: Vec<_> = (0..2u32)
        .map(|p| {
            let queue = queue.clone();
            thread::spawn(move || {
                for i in 0..PER_PRODUCER {
                    let mut item = (p, i);
                    while let Err(back) = queue.offer(item) {
                        item = back;
                        thread::yield_now();
                    }
                }
            })
        })
        .collect();

    let mut last = [None::<u32>; 2];
    let mut received = 0;
    while received < 2 * PER_PRODUCER {
        match queue.poll() {
            Some((p, i)) => {
                let p = p as usize;
                assert!(last[p].map_or(true, |prev| prev < i));
                last[p] = Some(i);
                received += 1;
            }
            None => thread::yield_now(),
        }
    }
    for producer in producers {
        producer.join().unwrap();
    }
}

#[test]
fn test_size_never_exceeds_capacity() {
    let queue = Arc::new(DisruptorBlockingQueue::with_spin_policy(8, SpinPolicy::Spinning).unwrap());
    let producer = {
        let queue = queue.clone();
        thread::spawn(move || {
            for i in 0..20_000 {
                queue.put(i);
            }
        })
    };
    for _ in 0..20_000 {
        assert!(queue.size() <= queue.capacity());
        assert!(queue.remaining_capacity() <= queue.capacity());
        queue.take();
    }
    producer.join().unwrap();
}

#[test]
fn test_remove_round_trip() {
    init_tracing();
    let queue = QueueBuilder::with_capacity(4).build::<&str>().unwrap();
    queue.add_all(["a", "b", "c"]);
    assert!(queue.remove(&"b"));
    assert_eq!(queue.size(), 2);
    assert_eq!(queue.take(), "a");
    assert_eq!(queue.take(), "c");
    assert!(queue.is_empty());
}

#[test]
fn test_remove_while_contended() {
    let queue = Arc::new(DisruptorBlockingQueue::new(64).unwrap());
    let producer = {
        let queue = queue.clone();
        thread::spawn(move || {
            for i in 0..10_000u32 {
                queue.put(i);
            }
        })
    };

    let mut taken = Vec::new();
    let mut removed = 0;
    while taken.len() + removed < 10_000 {
        if let Some(multiple) = queue.iter().find(|v| v % 7 == 0) {
            if queue.remove(&multiple) {
                removed += 1;
            }
        }
        if let Some(v) = queue.poll() {
            taken.push(v);
        }
    }
    producer.join().unwrap();

    assert!(taken.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(taken.len() + removed, 10_000);
}

#[test]
fn test_clear_under_traffic_never_duplicates() {
    init_tracing();
    const PRODUCERS: u32 = 3;
    const PER_PRODUCER: u32 = 5_000;
    const CLEARS: usize = 2_000;

    let queue = Arc::new(DisruptorBlockingQueue::new(64).unwrap());
    let done = Arc::new(AtomicBool::new(false));

    let producers: Vec<_> = (0..PRODUCERS)
        .map(|p| {
            let queue = queue.clone();
            thread::spawn(move || {
                for i in 0..PER_PRODUCER {
                    let mut item = p * PER_PRODUCER + i;
                    while let Err(back) = queue.offer(item) {
                        item = back;
                        thread::yield_now();
                    }
                }
            })
        })
        .collect();

    let clearer = {
        let queue = queue.clone();
        thread::spawn(move || {
            for _ in 0..CLEARS {
                queue.clear();
                thread::yield_now();
            }
        })
    };

    let consumer = {
        let queue = queue.clone();
        let done = done.clone();
        thread::spawn(move || {
            let mut seen = HashSet::new();
            loop {
                match queue.poll() {
                    Some(v) => assert!(seen.insert(v), "{v} polled twice"),
                    None if done.load(Ordering::Acquire) => break,
                    None => thread::yield_now(),
                }
            }
            seen
        })
    };

    for producer in producers {
        producer.join().unwrap();
    }
    clearer.join().unwrap();
    done.store(true, Ordering::Release);
    let seen = consumer.join().unwrap();

    assert!(seen.iter().all(|v| *v < PRODUCERS * PER_PRODUCER));
    assert!(queue.size() <= queue.capacity());

    // the ring still holds exactly `capacity` elements after all that
    queue.clear();
    for i in 0..queue.capacity() as u32 {
        assert_eq!(queue.offer(i), Ok(()));
    }
    assert!(queue.is_full());
    assert_eq!(queue.offer(u32::MAX), Err(u32::MAX));
    assert_eq!(queue.size(), queue.capacity());
}

#[test]
fn test_mixed_consumers_account_for_every_element() {
    const PRODUCERS: u32 = 4;
    const PER_PRODUCER: u32 = 5_000;
    const TOTAL: usize = (PRODUCERS * PER_PRODUCER) as usize;

    for policy in POLICIES {
        let queue = Arc::new(DisruptorBlockingQueue::with_spin_policy(32, policy).unwrap());
        let accounted = Arc::new(AtomicUsize::new(0));

        let producers: Vec<_> = (0..PRODUCERS)
            .map(|p| {
                let queue = queue.clone();
                thread::spawn(move || {
                    for i in 0..PER_PRODUCER {
                        queue.put(p * PER_PRODUCER + i);
                    }
                })
            })
            .collect();

        let batcher = {
            let queue = queue.clone();
            let accounted = accounted.clone();
            thread::spawn(move || {
                let mut got = Vec::new();
                let mut buf = vec![None; 8];
                while accounted.load(Ordering::Acquire) < TOTAL {
                    let moved = queue.remove_batch(&mut buf);
                    got.extend(buf.iter_mut().take(moved).filter_map(Option::take));
                    accounted.fetch_add(moved, Ordering::AcqRel);
                    if moved == 0 {
                        thread::yield_now();
                    }
                }
                got
            })
        };

        let remover = {
            let queue = queue.clone();
            let accounted = accounted.clone();
            thread::spawn(move || {
                let mut got = Vec::new();
                while accounted.load(Ordering::Acquire) < TOTAL {
                    match queue.peek() {
                        // another consumer may take it between peek and remove
                        Some(v) if queue.remove(&v) => {
                            got.push(v);
                            accounted.fetch_add(1, Ordering::AcqRel);
                        }
                        _ => thread::yield_now(),
                    }
                }
                got
            })
        };

        let poller = {
            let queue = queue.clone();
            let accounted = accounted.clone();
            thread::spawn(move || {
                let mut got = Vec::new();
                while accounted.load(Ordering::Acquire) < TOTAL {
                    if let Some(v) = queue.poll_timeout(Duration::from_millis(1)) {
                        got.push(v);
                        accounted.fetch_add(1, Ordering::AcqRel);
                    }
                }
                got
            })
        };

        for producer in producers {
            producer.join().unwrap();
        }
        let mut all = HashSet::new();
        for consumer in [batcher, remover, poller] {
            for v in consumer.join().unwrap() {
                assert!(all.insert(v), "{v} consumed twice under {policy:?}");
            }
        }
        assert_eq!(all.len(), TOTAL);
        assert!(queue.is_empty());
    }
}

#[test]
fn test_handoff_and_zero_timeout() {
    for policy in POLICIES {
        let queue = Arc::new(DisruptorBlockingQueue::with_spin_policy(1, policy).unwrap());
        assert_eq!(queue.offer_timeout(1, Duration::ZERO), Ok(()));
        assert_eq!(queue.offer_timeout(2, Duration::ZERO), Err(2));

        let consumer = {
            let queue = queue.clone();
            thread::spawn(move || (queue.take(), queue.take()))
        };
        assert_eq!(queue.offer_timeout(3, Duration::from_secs(5)), Ok(()));
        assert_eq!(consumer.join().unwrap(), (1, 3));
    }
}

#[test]
fn test_offer_timeout_bounds() {
    init_tracing();
    for policy in POLICIES {
        let queue = DisruptorBlockingQueue::with_spin_policy(1, policy).unwrap();
        queue.put(0);
        let timeout = Duration::from_millis(25);
        let start = Instant::now();
        assert_eq!(queue.offer_timeout(1, timeout), Err(1));
        let elapsed = start.elapsed();
        assert!(elapsed >= timeout, "{policy:?} returned after {elapsed:?}");
        assert!(elapsed < timeout + Duration::from_millis(500));
    }
}

#[test]
fn test_cancel_is_distinct_from_timeout() {
    let queue = Arc::new(DisruptorBlockingQueue::<u8>::with_spin_policy(2, SpinPolicy::Blocking).unwrap());
    let token = CancelToken::new();
    let waiter = {
        let queue = queue.clone();
        let token = token.clone();
        thread::spawn(move || queue.take_interruptibly(&token).map_err(QueueError::from))
    };
    thread::sleep(Duration::from_millis(20));
    token.cancel();
    assert_eq!(waiter.join().unwrap(), Err(QueueError::Interrupted));
    assert_eq!(queue.poll_timeout(Duration::from_millis(5)), None);
}

#[test]
fn test_drain_into_other_queue() {
    let source = DisruptorBlockingQueue::with_items(8, 0..6).unwrap();
    let dest = DisruptorBlockingQueue::new(4).unwrap();
    assert_eq!(source.drain_into(&dest, 100), Ok((4, vec![])));
    assert!(dest.is_full());
    assert_eq!(source.size(), 2);
    assert_eq!(dest.iter().collect::<Vec<_>>(), vec![0, 1, 2, 3]);
}

#[derive(Debug, Clone)]
enum Op {
    Offer(u16),
    Poll,
    Peek,
    Batch(usize),
    Remove(u16),
    Clear,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => any::<u16>().prop_map(|v| Op::Offer(v % 32)),
        3 => Just(Op::Poll),
        1 => Just(Op::Peek),
        1 => (0usize..6).prop_map(Op::Batch),
        1 => any::<u16>().prop_map(|v| Op::Remove(v % 32)),
        1 => Just(Op::Clear),
    ]
}

proptest! {
    #[test]
    fn prop_single_thread_matches_vecdeque(
        requested in 1usize..20,
        ops in proptest::collection::vec(op(), 0..200),
    ) {
        let queue = DisruptorBlockingQueue::new(requested).unwrap();
        let capacity = queue.capacity();
        prop_assert!(capacity.is_power_of_two() && capacity >= requested);

        let mut model = VecDeque::new();
        for op in ops {
            match op {
                Op::Offer(v) => {
                    let result = queue.offer(v);
                    if model.len() < capacity {
                        prop_assert_eq!(result, Ok(()));
                        model.push_back(v);
                    } else {
                        prop_assert_eq!(result, Err(v));
                    }
                }
                Op::Poll => prop_assert_eq!(queue.poll(), model.pop_front()),
                Op::Peek => prop_assert_eq!(queue.peek(), model.front().copied()),
                Op::Batch(n) => {
                    let mut buf = vec![None; n];
                    let moved = queue.remove_batch(&mut buf);
                    let expected: Vec<_> = model.drain(..n.min(model.len())).collect();
                    prop_assert_eq!(moved, expected.len());
                    let got: Vec<_> = buf.into_iter().flatten().collect();
                    prop_assert_eq!(got, expected);
                }
                Op::Remove(v) => {
                    let before = model.len();
                    model.retain(|x| *x != v);
                    prop_assert_eq!(queue.remove(&v), model.len() < before);
                }
                Op::Clear => {
                    queue.clear();
                    model.clear();
                }
            }
            prop_assert_eq!(queue.size(), model.len());
            prop_assert_eq!(queue.is_full(), model.len() == capacity);
        }
        prop_assert_eq!(queue.iter().collect::<Vec<_>>(), model.into_iter().collect::<Vec<_>>());
    }
}
