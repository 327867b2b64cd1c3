//! Integration tests for rwtree
//!
//! These tests drive the public API from many threads at once and check the
//! properties callers rely on: every operation is atomic, whole-map scans see
//! no interleaved writer, and writers are never starved by readers.

use crossbeam::channel;
use rwtree::metrics::MetricsCollector;
use rwtree::{ConcurrentOrderedMap, Error, ExclusiveLock, SharedLock, SharedMutex};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

const DEADLINE: Duration = Duration::from_secs(10);

#[test]
fn test_disjoint_writers_and_readers() {
    let map = Arc::new(ConcurrentOrderedMap::new());
    let num_threads = 8;
    let keys_per_thread = 500;
    let barrier = Arc::new(Barrier::new(num_threads * 2));

    let mut handles = vec![];
    for thread_id in 0..num_threads {
        let map = Arc::clone(&map);
        let barrier = Arc::clone(&barrier);
        handles.push(thread::spawn(move || {
            barrier.wait();
            for i in 0..keys_per_thread {
                let key = i * num_threads + thread_id;
                assert!(map.emplace(key, key * 2, false));
                assert_eq!(map.perform(&key, |_, value| *value / 2), Some(key));
                if i % 4 == 0 {
                    assert_eq!(map.remove(&key), Some(key * 2));
                }
            }
        }));
    }

    for _ in 0..num_threads {
        let map = Arc::clone(&map);
        let barrier = Arc::clone(&barrier);
        handles.push(thread::spawn(move || {
            barrier.wait();
            for probe in 0..num_threads * keys_per_thread {
                if let Some(value) = map.find(&probe) {
                    assert_eq!(value, probe * 2);
                }
                if let Some((key, value)) = map.find_infimum_key(&probe) {
                    assert!(key <= probe);
                    assert_eq!(value, key * 2);
                }
                if let Some((key, _)) = map.lower_bound_key(&probe) {
                    assert!(key >= probe);
                }
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }

    // Every fourth insertion of each writer was removed again
    let expected: Vec<usize> = (0..num_threads * keys_per_thread)
        .filter(|key| (key / num_threads) % 4 != 0)
        .collect();
    assert_eq!(map.keys(), expected);
}

#[test]
fn test_scans_never_observe_a_partial_update() {
    let map: Arc<ConcurrentOrderedMap<u32, u64>> = Arc::new((0..256).map(|key| (key, 0)).collect());
    let stop = Arc::new(AtomicBool::new(false));
    let scans = Arc::new(AtomicUsize::new(0));

    let writers: Vec<_> = (0..2)
        .map(|_| {
            let map = Arc::clone(&map);
            thread::spawn(move || {
                for _ in 0..200 {
                    // All values move to the next generation in one critical section
                    map.for_each(|_, value| {
                        *value += 1;
                        true
                    });
                }
            })
        })
        .collect();

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let map = Arc::clone(&map);
            let stop = Arc::clone(&stop);
            let scans = Arc::clone(&scans);
            thread::spawn(move || {
                while !stop.load(Ordering::Relaxed) {
                    let mut generation = None;
                    map.for_each_ro(|_, value| {
                        let first = *generation.get_or_insert(*value);
                        assert_eq!(first, *value, "scan observed two generations");
                        true
                    });
                    scans.fetch_add(1, Ordering::Relaxed);
                }
            })
        })
        .collect();

    for writer in writers {
        writer.join().unwrap();
    }
    stop.store(true, Ordering::Relaxed);
    for reader in readers {
        reader.join().unwrap();
    }

    assert!(scans.load(Ordering::Relaxed) > 0);
    assert_eq!(map.for_each_ro(|_, value| *value == 400), 256);
}

#[test]
fn test_writer_progress_under_saturating_readers() {
    let map: Arc<ConcurrentOrderedMap<u32, u32>> = Arc::new((0..1024).map(|key| (key, key)).collect());
    let stop = Arc::new(AtomicBool::new(false));

    let readers: Vec<_> = (0..8)
        .map(|_| {
            let map = Arc::clone(&map);
            let stop = Arc::clone(&stop);
            thread::spawn(move || {
                while !stop.load(Ordering::Relaxed) {
                    map.for_each_ro(|_, _| true);
                    map.find_infimum(&512);
                }
            })
        })
        .collect();

    let (done_tx, done_rx) = channel::bounded(1);
    let writer = {
        let map = Arc::clone(&map);
        thread::spawn(move || {
            for key in 1024..1124 {
                map.emplace(key, key, false);
            }
            done_tx.send(()).unwrap();
        })
    };

    let progressed = done_rx.recv_timeout(DEADLINE);
    stop.store(true, Ordering::Relaxed);
    for reader in readers {
        reader.join().unwrap();
    }
    writer.join().unwrap();

    assert!(progressed.is_ok(), "writer starved by readers");
    assert_eq!(map.len(), 1124);
}

#[test]
fn test_delete_if_under_concurrent_inserts() {
    let map = Arc::new(ConcurrentOrderedMap::new());
    let inserted = 4 * 1000;

    let writers: Vec<_> = (0..4u64)
        .map(|thread_id| {
            let map = Arc::clone(&map);
            thread::spawn(move || {
                for i in 0..1000 {
                    map.emplace(thread_id * 1000 + i, i, false);
                }
            })
        })
        .collect();

    let sweeper = {
        let map = Arc::clone(&map);
        thread::spawn(move || {
            let mut erased = 0;
            for _ in 0..50 {
                erased += map.delete_if(|_, value| *value % 2 == 1);
                thread::yield_now();
            }
            erased
        })
    };

    for writer in writers {
        writer.join().unwrap();
    }
    let mut erased = sweeper.join().unwrap();
    erased += map.delete_if(|_, value| *value % 2 == 1);

    assert_eq!(erased, inserted / 2);
    assert_eq!(map.len(), inserted / 2);
    assert_eq!(map.for_each_ro(|_, value| value % 2 == 0), inserted / 2);
}

#[test]
fn test_contention_is_reported_in_metrics() {
    let map = Arc::new(ConcurrentOrderedMap::new());
    map.emplace(0, 0u64, false);
    let entered = Arc::new(Barrier::new(2));

    let holder = {
        let map = Arc::clone(&map);
        let entered = Arc::clone(&entered);
        thread::spawn(move || {
            map.perform(&0, |_, value| {
                entered.wait();
                thread::sleep(Duration::from_millis(50));
                *value += 1;
            })
        })
    };

    entered.wait();
    // Blocks until the holder is done, counting one contended acquisition
    assert_eq!(map.find(&0), Some(1));
    holder.join().unwrap();

    let metrics = map.metrics();
    assert!(metrics.contended_operations >= 1);
    assert!(metrics.contention_rate() > 0.0);
}

#[test]
fn test_guards_with_shared_mutex() {
    let mutex = Arc::new(SharedMutex::new());

    let reader = SharedLock::new(&mutex);
    assert!(reader.owns_lock());
    assert_eq!(mutex.reader_count(), 1);

    let (locked_tx, locked_rx) = channel::bounded(1);
    let writer = {
        let mutex = Arc::clone(&mutex);
        thread::spawn(move || {
            let guard = ExclusiveLock::new(&mutex);
            locked_tx.send(guard.owns_lock()).unwrap();
        })
    };

    // The writer is queued behind the reader and new readers are turned away
    while mutex.pending_writers() == 0 {
        thread::yield_now();
    }
    assert!(!SharedLock::try_new(&mutex).owns_lock());
    assert!(locked_rx.try_recv().is_err());

    drop(reader);
    assert_eq!(locked_rx.recv_timeout(DEADLINE), Ok(true));
    writer.join().unwrap();
    assert!(!mutex.is_locked());

    let mut deferred = ExclusiveLock::deferred(&mutex);
    assert_eq!(deferred.unlock(), Err(Error::LockNotHeld));
    deferred.lock().unwrap();
    assert!(mutex.is_locked_exclusive());
    assert_eq!(deferred.try_lock(), Err(Error::LockAlreadyHeld));
    drop(deferred);
    assert!(!mutex.is_locked());
}
