use crate::{Error, Pool, Worker};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier, Mutex};
use std::thread::{scope, sleep};
use std::time::{Duration, Instant};

/// Appends every payload to a record private to this worker.
struct Recorder {
    record: Arc<Mutex<Vec<u32>>>,
}

impl Worker<u32> for Recorder {
    fn process(&mut self, payload: u32) {
        self.record.lock().unwrap().push(payload);
    }
}

/// Counts how many of its instances have been dropped.
struct DropGuard {
    dropped: Arc<AtomicUsize>,
}

impl Worker<u32> for DropGuard {
    fn process(&mut self, _payload: u32) {}
}

impl Drop for DropGuard {
    fn drop(&mut self) {
        self.dropped.fetch_add(1, Ordering::SeqCst);
    }
}

fn recorders(count: usize) -> (Vec<Recorder>, Vec<Arc<Mutex<Vec<u32>>>>) {
    let records: Vec<_> = (0..count).map(|_| Arc::new(Mutex::new(Vec::new()))).collect();
    let workers = records
        .iter()
        .map(|record| Recorder {
            record: Arc::clone(record),
        })
        .collect();
    (workers, records)
}

fn drain(records: &[Arc<Mutex<Vec<u32>>>]) -> Vec<u32> {
    let mut all: Vec<u32> = records
        .iter()
        .flat_map(|record| record.lock().unwrap().clone())
        .collect();
    all.sort_unstable();
    all
}

fn wait_until(deadline: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < deadline {
        if cond() {
            return true;
        }
        sleep(Duration::from_millis(1));
    }
    cond()
}

#[test]
fn basic_dispatch() {
    let (workers, records) = recorders(2);
    let pool = Pool::new(workers);

    pool.process(1);
    pool.process(2);
    pool.process(3);
    pool.close().unwrap();

    assert_eq!(drain(&records), vec![1, 2, 3]);
}

#[test]
fn no_duplicate_delivery_across_producers() {
    const WORKERS: usize = 4;
    const PRODUCERS: u32 = 8;
    const PER_PRODUCER: u32 = 512;

    let seen = Arc::new(Mutex::new(HashSet::new()));
    let duplicates = Arc::new(AtomicUsize::new(0));
    let workers = (0..WORKERS).map(|_| {
        let seen = Arc::clone(&seen);
        let duplicates = Arc::clone(&duplicates);
        move |n: u32| {
            if !seen.lock().unwrap().insert(n) {
                duplicates.fetch_add(1, Ordering::SeqCst);
            }
        }
    });
    let pool = Pool::new(workers);

    scope(|s| {
        for p in 0..PRODUCERS {
            let pool = &pool;
            s.spawn(move || {
                for i in 0..PER_PRODUCER {
                    pool.process(p * PER_PRODUCER + i);
                }
            });
        }
    });
    pool.close().unwrap();

    assert_eq!(duplicates.load(Ordering::SeqCst), 0);
    assert_eq!(seen.lock().unwrap().len(), (PRODUCERS * PER_PRODUCER) as usize);
}

#[test]
fn more_payloads_than_workers_all_complete() {
    const TOTAL: u32 = 1000;

    let (workers, records) = recorders(3);
    let pool = Pool::new(workers);
    // Offers are claimed in the order posted, so once every worker is idle
    // the first payloads are spread across all of them.
    assert!(wait_until(Duration::from_secs(5), || pool.idle() == 3));

    for n in 0..TOTAL {
        pool.process(n);
    }
    pool.close().unwrap();

    assert_eq!(drain(&records), (0..TOTAL).collect::<Vec<_>>());
    for record in &records {
        assert!(!record.lock().unwrap().is_empty());
    }
}

#[test]
fn concurrent_producers_single_slow_worker() {
    const PRODUCERS: u32 = 5;

    let active = Arc::new(AtomicUsize::new(0));
    let max_active = Arc::new(AtomicUsize::new(0));
    let processed = Arc::new(Mutex::new(Vec::new()));

    let worker = {
        let active = Arc::clone(&active);
        let max_active = Arc::clone(&max_active);
        let processed = Arc::clone(&processed);
        move |n: u32| {
            let now = active.fetch_add(1, Ordering::SeqCst) + 1;
            max_active.fetch_max(now, Ordering::SeqCst);
            sleep(Duration::from_millis(10));
            processed.lock().unwrap().push(n);
            active.fetch_sub(1, Ordering::SeqCst);
        }
    };
    let pool = Pool::new([worker]);
    let barrier = Barrier::new(PRODUCERS as usize);

    scope(|s| {
        for n in 0..PRODUCERS {
            let pool = &pool;
            let barrier = &barrier;
            s.spawn(move || {
                barrier.wait();
                pool.process(n);
            });
        }
    });
    pool.close().unwrap();

    let mut processed = processed.lock().unwrap().clone();
    processed.sort_unstable();
    assert_eq!(processed, vec![0, 1, 2, 3, 4]);
    assert_eq!(max_active.load(Ordering::SeqCst), 1);
}

#[test]
fn process_after_close_is_rejected() {
    let (workers, records) = recorders(1);
    let pool = Pool::new(workers);
    pool.close().unwrap();

    assert!(!pool.is_running());
    assert!(matches!(pool.try_process(42), Err(Error::PoolNotRunning)));
    assert!(drain(&records).is_empty());
}

#[test]
#[should_panic(expected = "the pool is not running")]
fn process_after_close_panics() {
    let (workers, _records) = recorders(1);
    let pool = Pool::new(workers);
    pool.close().unwrap();

    pool.process(42);
}

#[test]
fn close_joins_every_worker() {
    const WORKERS: usize = 6;

    let dropped = Arc::new(AtomicUsize::new(0));
    let workers = (0..WORKERS).map(|_| DropGuard {
        dropped: Arc::clone(&dropped),
    });
    let pool = Pool::new(workers);
    for n in 0..32 {
        pool.process(n);
    }

    pool.close().unwrap();
    // A worker is dropped when its agent thread exits.
    assert_eq!(dropped.load(Ordering::SeqCst), WORKERS);
    assert_eq!(pool.idle(), 0);
}

#[test]
fn close_is_idempotent() {
    let (workers, _records) = recorders(2);
    let pool = Pool::new(workers);

    pool.close().unwrap();
    pool.close().unwrap();
    assert!(!pool.is_running());
}

#[test]
fn drop_closes_pool() {
    let dropped = Arc::new(AtomicUsize::new(0));
    {
        let pool = Pool::new((0..3).map(|_| DropGuard {
            dropped: Arc::clone(&dropped),
        }));
        pool.process(1);
    }
    assert_eq!(dropped.load(Ordering::SeqCst), 3);
}

#[test]
fn close_waits_for_in_flight_work() {
    let finished = Arc::new(AtomicBool::new(false));
    let worker = {
        let finished = Arc::clone(&finished);
        move |_n: u32| {
            sleep(Duration::from_millis(100));
            finished.store(true, Ordering::SeqCst);
        }
    };
    let pool = Pool::new([worker]);

    pool.process(1);
    pool.close().unwrap();

    assert!(finished.load(Ordering::SeqCst));
}

#[test]
fn blocked_producer_fails_when_pool_closes() {
    let (tx, rx) = std::sync::mpsc::channel();
    let worker = move |n: u32| {
        sleep(Duration::from_millis(200));
        tx.send(n).unwrap();
    };
    let pool = Pool::new([worker]);

    // Occupy the only worker so the next producer has to wait.
    pool.process(1);

    scope(|s| {
        let waiting = s.spawn(|| pool.try_process(2));
        sleep(Duration::from_millis(50));
        pool.close().unwrap();

        assert!(matches!(waiting.join().unwrap(), Err(Error::PoolNotRunning)));
    });

    assert_eq!(rx.try_iter().collect::<Vec<_>>(), vec![1]);
}

#[test]
fn idle_offers_never_exceed_workers() {
    const WORKERS: usize = 4;

    let (workers, _records) = recorders(WORKERS);
    let pool = Pool::new(workers);
    assert_eq!(pool.len(), WORKERS);
    assert!(!pool.is_empty());

    // Every worker eventually offers itself.
    assert!(wait_until(Duration::from_secs(5), || pool.idle() == WORKERS));

    let done = AtomicBool::new(false);
    scope(|s| {
        s.spawn(|| {
            while !done.load(Ordering::SeqCst) {
                assert!(pool.idle() <= pool.len());
            }
        });
        for n in 0..2000 {
            pool.process(n);
        }
        done.store(true, Ordering::SeqCst);
    });

    pool.close().unwrap();
}

#[test]
fn panicking_worker_is_reported_and_others_keep_serving() {
    let (tx, rx) = std::sync::mpsc::channel();
    let workers = (0..2).map(|_| {
        let tx = tx.clone();
        move |n: u32| {
            if n == 13 {
                panic!("unlucky payload");
            }
            tx.send(n).unwrap();
        }
    });
    let pool = Pool::new(workers);

    pool.process(13);
    for n in 0..10 {
        pool.process(n);
    }

    match pool.close() {
        Err(Error::WorkerPanicked { message, .. }) => assert_eq!(message, "unlucky payload"),
        other => panic!("expected WorkerPanicked, got {other:?}"),
    }

    let mut served: Vec<u32> = rx.try_iter().collect();
    served.sort_unstable();
    assert_eq!(served, (0..10).collect::<Vec<_>>());
}

#[test]
fn try_new_rejects_empty_worker_set() {
    let result = Pool::<u32>::try_new(Vec::<Recorder>::new());
    assert!(matches!(result, Err(Error::NoWorkers)));
}

#[test]
fn debug_reports_state() {
    let (workers, _records) = recorders(1);
    let pool = Pool::new(workers);
    pool.close().unwrap();

    let out = format!("{pool:?}");
    assert!(out.contains("size: 1"));
    assert!(out.contains("running: false"));
}

#[test]
fn builder_from_pool_infers_payload_from_workers() {
    let (tx, rx) = std::sync::mpsc::channel();
    let workers = (0..2).map(|_| {
        let tx = tx.clone();
        move |line: String| {
            let name = std::thread::current().name().map(str::to_owned);
            tx.send((line, name)).unwrap();
        }
    });

    let pool = Pool::builder()
        .name("reader")
        .stack_size(256 * 1024)
        .build(workers)
        .unwrap();
    assert_eq!(pool.len(), 2);

    pool.process(String::from("first"));
    pool.process(String::from("second"));
    pool.close().unwrap();

    let mut seen: Vec<(String, Option<String>)> = rx.try_iter().collect();
    seen.sort();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0].0, "first");
    assert_eq!(seen[1].0, "second");
    for (_, name) in &seen {
        assert!(name.as_deref().unwrap().starts_with("reader-"));
    }
}
