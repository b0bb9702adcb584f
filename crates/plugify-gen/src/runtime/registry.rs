//! Fixed-capacity slot registry for callback closures.
//!
//! Generated Rust bindings embed this file verbatim, so it depends on `std` only. Each slot
//! maps an integer handle to a shared closure; released slots are reused last-in, first-out.
//! All mutations take the registry's mutex. Lookups clone the closure out of the lock, so a
//! closure may register or unregister other callbacks while it runs.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

struct Slots<F: ?Sized> {
    entries: Vec<Option<Arc<F>>>,
    free: Vec<usize>,
}

/// Slot array plus LIFO free list.
pub struct CallbackRegistry<F: ?Sized> {
    capacity: usize,
    slots: Mutex<Slots<F>>,
}

impl<F: ?Sized> CallbackRegistry<F> {
    /// Create an empty registry. Usable in `static` items.
    pub const fn new(capacity: usize) -> Self {
        Self {
            capacity,
            slots: Mutex::new(Slots {
                entries: Vec::new(),
                free: Vec::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Slots<F>> {
        // A panicking closure never runs under the lock, so poisoned state is still consistent.
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        if slots.entries.len() < self.capacity {
            slots.entries = (0..self.capacity).map(|_| None).collect();
            slots.free = (0..self.capacity).rev().collect();
        }
        slots
    }

    /// Store `callback` in a free slot and return the slot index, or `None` when every slot
    /// is taken.
    pub fn register(&self, callback: Arc<F>) -> Option<usize> {
        let mut slots = self.lock();
        let slot = slots.free.pop()?;
        slots.entries[slot] = Some(callback);
        Some(slot)
    }

    /// Release `slot`. Returns `false` if it was not registered.
    pub fn unregister(&self, slot: usize) -> bool {
        let mut slots = self.lock();
        match slots.entries.get_mut(slot).and_then(Option::take) {
            Some(_) => {
                slots.free.push(slot);
                true
            }
            None => false,
        }
    }

    /// The closure currently registered in `slot`.
    pub fn get(&self, slot: usize) -> Option<Arc<F>> {
        self.lock().entries.get(slot).and_then(Clone::clone)
    }

    /// Number of occupied slots.
    pub fn len(&self) -> usize {
        self.lock().entries.iter().filter(|e| e.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
