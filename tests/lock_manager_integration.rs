//! Integration tests for page locking through the buffer pool.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use common::{pid, read_u32, wait_until_waiting, write_u32, Fixture};
use stratumdb::{Error, Permission, TransactionId};

/// A writer waits for a reader and is granted once the reader lets go.
#[test]
fn test_exclusive_waits_for_shared() {
    let fx = Fixture::new(4, 1);
    let t1 = TransactionId::new();
    let t2 = TransactionId::new();

    fx.pool.get_page(t1, pid(0), Permission::Shared).unwrap();

    let handle = {
        let pool = Arc::clone(&fx.pool);
        thread::spawn(move || pool.get_page(t2, pid(0), Permission::Exclusive).map(|_| ()))
    };

    wait_until_waiting(&fx.pool, t2);
    assert!(!fx.pool.holds_lock(t2, pid(0)));

    fx.pool.release_page(t1, pid(0));
    handle.join().unwrap().unwrap();

    assert!(fx.pool.lock_manager().holds_exclusive(t2, pid(0)));
    assert!(!fx.pool.holds_lock(t1, pid(0)));
}

#[test]
fn test_readers_share() {
    let fx = Fixture::new(4, 1);
    let readers: Vec<TransactionId> = (0..4).map(|_| TransactionId::new()).collect();

    for &tid in &readers {
        fx.pool.get_page(tid, pid(0), Permission::Shared).unwrap();
    }

    let mut expected = readers.clone();
    expected.sort_unstable();
    assert_eq!(fx.pool.lock_manager().holders(pid(0)), expected);
}

/// Two transactions waiting on each other: exactly one is aborted, and the
/// other is granted once the aborted one finishes.
#[test]
fn test_deadlock_aborts_exactly_one() {
    let fx = Fixture::new(4, 2);
    let t1 = TransactionId::new();
    let t2 = TransactionId::new();

    fx.pool.get_page(t1, pid(0), Permission::Exclusive).unwrap();
    fx.pool.get_page(t2, pid(1), Permission::Exclusive).unwrap();

    let handle = {
        let pool = Arc::clone(&fx.pool);
        thread::spawn(move || pool.get_page(t1, pid(1), Permission::Exclusive).map(|_| ()))
    };
    wait_until_waiting(&fx.pool, t1);

    let second = fx.pool.get_page(t2, pid(0), Permission::Exclusive);
    match second {
        Err(Error::TransactionAborted(tid)) => assert_eq!(tid, t2),
        other => panic!("expected abort, got {other:?}"),
    }
    assert!(!fx.pool.lock_manager().is_waiting(t2));

    fx.pool.transaction_complete(t2, false).unwrap();
    handle.join().unwrap().unwrap();

    assert!(fx.pool.lock_manager().holds_exclusive(t1, pid(0)));
    assert!(fx.pool.lock_manager().holds_exclusive(t1, pid(1)));
    assert!(!fx.pool.lock_manager().is_waiting(t1));
}

/// Three transactions in a ring: the one closing the cycle is aborted.
#[test]
fn test_three_way_deadlock() {
    let fx = Fixture::new(4, 3);
    let tids: Vec<TransactionId> = (0..3).map(|_| TransactionId::new()).collect();
    for (n, &tid) in tids.iter().enumerate() {
        fx.pool
            .get_page(tid, pid(n as u32), Permission::Exclusive)
            .unwrap();
    }

    let mut handles = Vec::new();
    for n in 0..2 {
        let pool = Arc::clone(&fx.pool);
        let tid = tids[n];
        handles.push(thread::spawn(move || {
            pool.get_page(tid, pid(n as u32 + 1), Permission::Exclusive)
                .map(|_| ())
        }));
        wait_until_waiting(&fx.pool, tid);
    }

    let err = fx
        .pool
        .get_page(tids[2], pid(0), Permission::Exclusive)
        .unwrap_err();
    assert!(err.is_aborted());

    fx.pool.transaction_complete(tids[2], false).unwrap();
    handles.pop().unwrap().join().unwrap().unwrap();
    fx.pool.transaction_complete(tids[1], true).unwrap();
    handles.pop().unwrap().join().unwrap().unwrap();
    fx.pool.transaction_complete(tids[0], true).unwrap();

    assert_eq!(fx.pool.lock_manager().lock_count(), 0);
}

#[test]
fn test_sole_reader_upgrades_without_blocking() {
    let fx = Fixture::new(4, 1);
    let t1 = TransactionId::new();

    fx.pool.get_page(t1, pid(0), Permission::Shared).unwrap();
    fx.pool.get_page(t1, pid(0), Permission::Exclusive).unwrap();

    assert!(fx.pool.lock_manager().holds_exclusive(t1, pid(0)));
    assert_eq!(fx.pool.lock_manager().holders(pid(0)), vec![t1]);
}

#[test]
fn test_transaction_complete_releases_every_lock() {
    let fx = Fixture::new(8, 6);
    let t1 = TransactionId::new();

    for n in 0..6 {
        let perm = if n % 2 == 0 {
            Permission::Shared
        } else {
            Permission::Exclusive
        };
        fx.pool.get_page(t1, pid(n), perm).unwrap();
    }
    assert_eq!(fx.pool.lock_manager().locked_pages(t1).len(), 6);

    fx.pool.transaction_complete(t1, true).unwrap();

    for n in 0..6 {
        assert!(!fx.pool.holds_lock(t1, pid(n)));
    }
    assert!(fx.pool.lock_manager().locked_pages(t1).is_empty());
    assert_eq!(fx.pool.lock_manager().lock_count(), 0);

    let t2 = TransactionId::new();
    for n in 0..6 {
        fx.pool.get_page(t2, pid(n), Permission::Exclusive).unwrap();
    }
}

/// Writers to one page never overlap and no increment is lost.
#[test]
fn test_exclusive_writers_are_serialized() {
    const THREADS: usize = 8;
    const ROUNDS: u32 = 25;

    let fx = Fixture::new(4, 1);
    let inside = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let pool = Arc::clone(&fx.pool);
            let inside = Arc::clone(&inside);
            thread::spawn(move || {
                for _ in 0..ROUNDS {
                    let tid = TransactionId::new();
                    let page = pool.get_page(tid, pid(0), Permission::Exclusive).unwrap();
                    assert_eq!(inside.fetch_add(1, Ordering::SeqCst), 0);

                    let value = read_u32(&page.data());
                    thread::yield_now();
                    write_u32(&mut page.data_mut(), value + 1);
                    page.mark_dirty(tid);

                    inside.fetch_sub(1, Ordering::SeqCst);
                    pool.transaction_complete(tid, true).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(read_u32(&fx.store().raw_page(0).unwrap()), THREADS as u32 * ROUNDS);
}

/// Transactions locking two pages in opposite orders deadlock repeatedly;
/// aborted ones retry, and every committed update is applied exactly once.
#[test]
fn test_deadlock_victims_retry_to_completion() {
    const THREADS: usize = 4;
    const ROUNDS: u32 = 10;

    let fx = Fixture::new(4, 2);
    let aborts = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..THREADS)
        .map(|i| {
            let pool = Arc::clone(&fx.pool);
            let aborts = Arc::clone(&aborts);
            let order = if i % 2 == 0 { [0, 1] } else { [1, 0] };
            thread::spawn(move || {
                let mut committed = 0;
                while committed < ROUNDS {
                    let tid = TransactionId::new();
                    let attempt = order.iter().try_for_each(|&n| {
                        let page = pool.get_page(tid, pid(n), Permission::Exclusive)?;
                        let value = read_u32(&page.data());
                        write_u32(&mut page.data_mut(), value + 1);
                        page.mark_dirty(tid);
                        thread::sleep(Duration::from_micros(200));
                        Ok::<(), Error>(())
                    });
                    match attempt {
                        Ok(()) => {
                            pool.transaction_complete(tid, true).unwrap();
                            committed += 1;
                        }
                        Err(err) => {
                            assert!(err.is_aborted(), "unexpected error: {err}");
                            aborts.fetch_add(1, Ordering::Relaxed);
                            pool.transaction_complete(tid, false).unwrap();
                        }
                    }
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let expected = THREADS as u32 * ROUNDS;
    assert_eq!(read_u32(&fx.store().raw_page(0).unwrap()), expected);
    assert_eq!(read_u32(&fx.store().raw_page(1).unwrap()), expected);
    assert_eq!(fx.pool.lock_manager().lock_count(), 0);
}
