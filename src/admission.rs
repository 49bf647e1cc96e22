//! Per-key admission for guarded runs.
//!
//! The engine only sees failures that have been recorded. Attempts that were allowed
//! but have not finished yet are tracked here, so a burst of concurrent callers cannot
//! all pass the same check. A caller is admitted while the in-flight count is within
//! the allowance the engine reports; beyond it the caller waits for a running attempt
//! to finish and is checked again against the updated record.
//!
//! Admission is shared by a guard and its clones.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::futures::Notified;
use tokio::sync::Notify;

#[derive(Debug, Default)]
struct Slot {
    // Serialises check-then-reserve for one key.
    gate: tokio::sync::Mutex<()>,
    in_flight: AtomicU32,
    released: Notify,
}

#[derive(Debug, Default, Clone)]
pub(crate) struct Admissions {
    slots: Arc<Mutex<HashMap<String, Arc<Slot>>>>,
}

impl Admissions {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Handle on `key`'s slot, created on first use and dropped with its last handle.
    pub(crate) fn slot(&self, key: &str) -> SlotHandle {
        let slot = self.lock().entry(key.to_string()).or_default().clone();
        SlotHandle { admissions: self.clone(), key: key.to_string(), slot }
    }

    /// Keys with a caller waiting or running.
    #[cfg(test)]
    pub(crate) fn tracked(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Arc<Slot>>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

pub(crate) struct SlotHandle {
    admissions: Admissions,
    key: String,
    slot: Arc<Slot>,
}

impl SlotHandle {
    /// Wait for exclusive use of the key's gate.
    pub(crate) async fn enter(&self) -> Gate<'_> {
        let held = self.slot.gate.lock().await;
        // Registered before reading the count so no release between the two is missed.
        let released = self.slot.released.notified();
        let in_flight = self.slot.in_flight.load(Ordering::SeqCst);
        Gate { slot: &self.slot, held, released, in_flight }
    }
}

impl Drop for SlotHandle {
    fn drop(&mut self) {
        let mut slots = self.admissions.lock();
        let idle = self.slot.in_flight.load(Ordering::SeqCst) == 0
            && Arc::strong_count(&self.slot) == 2
            && slots.get(&self.key).is_some_and(|current| Arc::ptr_eq(current, &self.slot));
        if idle {
            slots.remove(&self.key);
        }
    }
}

/// Exclusive hold on a key's gate, taken before asking the engine.
pub(crate) struct Gate<'a> {
    slot: &'a Slot,
    held: tokio::sync::MutexGuard<'a, ()>,
    released: Notified<'a>,
    in_flight: u32,
}

impl<'a> Gate<'a> {
    /// Attempts admitted on this key that have not finished.
    pub(crate) fn in_flight(&self) -> u32 {
        self.in_flight
    }

    /// Give up the gate and wait until a running attempt finishes.
    pub(crate) async fn wait(self) {
        let Gate { held, released, .. } = self;
        drop(held);
        released.await;
    }

    /// Count the caller as in flight and give up the gate.
    pub(crate) fn reserve(self) -> Reservation<'a> {
        self.slot.in_flight.fetch_add(1, Ordering::SeqCst);
        Reservation { slot: self.slot }
    }
}

/// An admitted attempt. Dropping it, after its outcome is recorded, wakes waiters.
pub(crate) struct Reservation<'a> {
    slot: &'a Slot,
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        self.slot.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.slot.released.notify_waiters();
    }
}
