use ballast_pool::{ObjectPool, ObjectPoolConfig, ObjectPoolError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// A reusable scratch buffer, the classic object-pool tenant.
fn scratch_pool(initial: usize, max: usize) -> ObjectPool<String> {
    ObjectPool::with_reset(
        ObjectPoolConfig::builder()
            .initial_size(initial)
            .max_size(max)
            .name("scratch")
            .config(),
        || String::with_capacity(256),
        |s| {
            s.clear();
            true
        },
    )
}

#[test]
fn warm_up_and_reuse() {
    let created = Arc::new(AtomicUsize::new(0));
    let c = Arc::clone(&created);
    let pool: ObjectPool<usize> = ObjectPool::new(
        ObjectPoolConfig::builder()
            .initial_size(4)
            .max_size(8)
            .name("counted")
            .config(),
        move || c.fetch_add(1, Ordering::SeqCst),
    );
    assert_eq!(created.load(Ordering::SeqCst), 4, "eager warm-up");

    // Borrow/return cycles reuse warmed objects; nothing new is created.
    for _ in 0..10 {
        let obj = pool.borrow().unwrap();
        pool.put_back(obj);
    }
    assert_eq!(created.load(Ordering::SeqCst), 4);
    assert_eq!(pool.stats().hits, 10);
}

#[test]
fn exhaustion_fails_fast_without_queuing() {
    let pool = scratch_pool(0, 2);
    let a = pool.borrow().unwrap();
    let b = pool.borrow().unwrap();

    let err = pool.borrow().unwrap_err();
    assert!(matches!(err, ObjectPoolError::Exhausted { in_use: 2, .. }));

    pool.put_back(a);
    assert!(pool.borrow().is_ok());
    pool.put_back(b);
}

#[test]
fn dirty_objects_are_cleaned_on_return() {
    let pool = scratch_pool(1, 2);
    let mut s = pool.borrow().unwrap();
    s.push_str("leftover state");
    pool.put_back(s);

    let s = pool.borrow().unwrap();
    assert!(s.is_empty());
    pool.put_back(s);
}

#[test]
fn objects_failing_reset_are_destroyed_not_reused() {
    // Reset rejects any buffer that grew beyond 1 KiB.
    let pool: ObjectPool<Vec<u8>> = ObjectPool::with_reset(
        ObjectPoolConfig::builder().max_size(4).name("bounded").config(),
        Vec::new,
        |buf| {
            if buf.capacity() > 1024 {
                return false;
            }
            buf.clear();
            true
        },
    );

    let mut oversized = pool.borrow().unwrap();
    oversized.reserve(4096);
    pool.put_back(oversized);

    let stats = pool.stats();
    assert_eq!(stats.destroyed, 1);
    assert_eq!(stats.idle, 0, "bloated buffer not pooled");
}

#[test]
fn resize_applies_new_bounds() {
    let pool = scratch_pool(6, 8);
    pool.resize(2, 3);
    let stats = pool.stats();
    assert_eq!(stats.max_size, 3);
    assert!(stats.idle <= 3);

    // Growing the floor eagerly fills back up.
    pool.resize(5, 10);
    assert_eq!(pool.stats().idle, 5);
}

#[test]
fn drain_destroys_idle_and_rejects_borrows() {
    let pool = scratch_pool(3, 8);
    pool.drain();
    assert_eq!(pool.stats().idle, 0);
    assert_eq!(pool.stats().destroyed, 3);
    assert!(matches!(pool.borrow(), Err(ObjectPoolError::Drained { .. })));
}

#[test]
fn sustained_hits_grow_the_pool() {
    let pool: ObjectPool<u64> = ObjectPool::new(
        ObjectPoolConfig::builder()
            .initial_size(2)
            .max_size(4)
            .autosize(2, 32)
            .autosize_check_every(25)
            .name("hot")
            .config(),
        || 0,
    );

    for _ in 0..60 {
        let obj = pool.borrow().unwrap();
        pool.put_back(obj);
    }
    assert!(
        pool.stats().max_size > 4,
        "hit-rate near 1.0 grows capacity, got {}",
        pool.stats().max_size
    );
    assert!(pool.stats().max_size <= 32, "bounded by the hard limit");
}
