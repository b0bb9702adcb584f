#![allow(non_snake_case)]

use super::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

type Handler = dyn Fn(i32) -> i32 + Send + Sync;

#[test]
fn CallbackRegistry___register___returns_distinct_slots_from_zero() {
    let registry: CallbackRegistry<Handler> = CallbackRegistry::new(4);

    let a = registry.register(Arc::new(|x: i32| x + 1)).unwrap();
    let b = registry.register(Arc::new(|x: i32| x * 10)).unwrap();

    assert_eq!(a, 0);
    assert_eq!(b, 1);
    assert_eq!(registry.len(), 2);
}

#[test]
fn CallbackRegistry___get___invokes_only_the_registered_closure() {
    let registry: CallbackRegistry<dyn Fn() + Send + Sync> = CallbackRegistry::new(2);
    let calls_a = Arc::new(AtomicUsize::new(0));
    let calls_b = Arc::new(AtomicUsize::new(0));
    let counter_a = calls_a.clone();
    let counter_b = calls_b.clone();
    let a = registry
        .register(Arc::new(move || {
            counter_a.fetch_add(1, Ordering::SeqCst);
        }))
        .unwrap();
    let _b = registry
        .register(Arc::new(move || {
            counter_b.fetch_add(1, Ordering::SeqCst);
        }))
        .unwrap();

    let callback = registry.get(a).unwrap();
    callback();

    assert_eq!(calls_a.load(Ordering::SeqCst), 1);
    assert_eq!(calls_b.load(Ordering::SeqCst), 0);
}

#[test]
fn CallbackRegistry___unregister___releases_slot_for_lifo_reuse() {
    let registry: CallbackRegistry<Handler> = CallbackRegistry::new(3);
    let a = registry.register(Arc::new(|x: i32| x)).unwrap();
    let b = registry.register(Arc::new(|x: i32| x)).unwrap();

    assert!(registry.unregister(a));
    assert!(registry.unregister(b));
    let reused = registry.register(Arc::new(|x: i32| -x)).unwrap();

    assert_eq!(reused, b);
    assert!(registry.get(a).is_none());
    assert_eq!(registry.get(reused).unwrap()(5), -5);
}

#[test]
fn CallbackRegistry___register___full_registry_returns_none() {
    let registry: CallbackRegistry<Handler> = CallbackRegistry::new(1);
    registry.register(Arc::new(|x: i32| x)).unwrap();

    assert!(registry.register(Arc::new(|x: i32| x)).is_none());
    assert_eq!(registry.capacity(), 1);
}

#[test]
fn CallbackRegistry___unregister___unknown_slot_is_false() {
    let registry: CallbackRegistry<Handler> = CallbackRegistry::new(2);

    assert!(!registry.unregister(0));
    assert!(!registry.unregister(7));
    assert!(registry.is_empty());
}

#[test]
fn CallbackRegistry___static_registry___is_usable_across_threads() {
    static REGISTRY: CallbackRegistry<Handler> = CallbackRegistry::new(8);

    let handles: Vec<_> = (0..4)
        .map(|i| std::thread::spawn(move || REGISTRY.register(Arc::new(move |x: i32| x + i)).unwrap()))
        .collect();
    let mut slots: Vec<usize> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    slots.sort_unstable();

    assert_eq!(slots, [0, 1, 2, 3]);
}

#[test]
fn REGISTRY_SOURCE___is_self_contained() {
    assert!(REGISTRY_SOURCE.contains("pub struct CallbackRegistry"));
    assert!(!REGISTRY_SOURCE.contains("crate::"));
}
