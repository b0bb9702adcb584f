//! Concurrency tests for the callback registry
//!
//! These tests verify that concurrent register/unregister/lookup on one registry never
//! hands the same slot to two live closures and never routes a call to the wrong closure.

#![allow(non_snake_case)]

use plugify_gen::runtime::CallbackRegistry;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

type Handler = dyn Fn(usize) -> usize + Send + Sync;

#[test]
fn CallbackRegistry___concurrent_register___hands_out_distinct_slots() {
    let registry: Arc<CallbackRegistry<Handler>> = Arc::new(CallbackRegistry::new(64));
    let num_threads = 32;
    let barrier = Arc::new(Barrier::new(num_threads));

    let handles: Vec<_> = (0..num_threads)
        .map(|i| {
            let registry = registry.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                let slot = registry.register(Arc::new(move |x| x + i)).unwrap();
                (i, slot)
            })
        })
        .collect();

    let assigned: Vec<(usize, usize)> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let slots: HashSet<usize> = assigned.iter().map(|(_, slot)| *slot).collect();
    assert_eq!(slots.len(), num_threads);
    assert_eq!(registry.len(), num_threads);
    for (i, slot) in assigned {
        let handler = registry.get(slot).unwrap();
        assert_eq!(handler(100), 100 + i);
    }
}

#[test]
fn CallbackRegistry___register_beyond_capacity___exactly_capacity_succeed() {
    let registry: Arc<CallbackRegistry<Handler>> = Arc::new(CallbackRegistry::new(8));
    let num_threads = 24;
    let barrier = Arc::new(Barrier::new(num_threads));

    let handles: Vec<_> = (0..num_threads)
        .map(|_| {
            let registry = registry.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                registry.register(Arc::new(|x| x))
            })
        })
        .collect();

    let succeeded = handles
        .into_iter()
        .filter_map(|h| h.join().unwrap())
        .count();

    assert_eq!(succeeded, registry.capacity());
    assert_eq!(registry.len(), registry.capacity());
}

#[test]
fn CallbackRegistry___churn___calls_reach_only_their_own_closure() {
    let registry: Arc<CallbackRegistry<Handler>> = Arc::new(CallbackRegistry::new(4));
    let num_threads = 4;
    let iterations = 500;
    let barrier = Arc::new(Barrier::new(num_threads));
    let misrouted = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..num_threads)
        .map(|id| {
            let registry = registry.clone();
            let barrier = barrier.clone();
            let misrouted = misrouted.clone();
            thread::spawn(move || {
                barrier.wait();
                for _ in 0..iterations {
                    // Capacity equals the thread count, so a slot is always free here.
                    let slot = registry.register(Arc::new(move |_| id)).unwrap();
                    let handler = registry.get(slot).unwrap();
                    if handler(0) != id {
                        misrouted.fetch_add(1, Ordering::Relaxed);
                    }
                    assert!(registry.unregister(slot));
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(misrouted.load(Ordering::Relaxed), 0);
    assert!(registry.is_empty());
}

#[test]
fn CallbackRegistry___closure_reentering_registry___does_not_deadlock() {
    let registry: Arc<CallbackRegistry<Handler>> = Arc::new(CallbackRegistry::new(4));
    let inner = registry.clone();

    let slot = registry
        .register(Arc::new(move |x| {
            let nested = inner.register(Arc::new(|y| y * 2)).unwrap();
            let result = inner.get(nested).unwrap()(x);
            inner.unregister(nested);
            result
        }))
        .unwrap();

    let handler = registry.get(slot).unwrap();
    assert_eq!(handler(21), 42);
    assert_eq!(registry.len(), 1);
}
