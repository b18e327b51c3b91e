//! Per-item exclusive locks.
//!
//! One lock per item id, created lazily and dropped from the registry again
//! once nobody holds or waits for it. Multi-item acquisitions always lock in
//! ascending `ItemId` order, so two transfers over the same pair of items
//! cannot deadlock.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use thiserror::Error;

use stockledger_core::ItemId;

/// How often a waiter wakes to check for cancellation.
const CANCEL_POLL: Duration = Duration::from_millis(10);

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LockError {
    #[error("cancelled while waiting for item {0}")]
    Cancelled(ItemId),

    #[error("timed out after {timeout:?} waiting for item {item_id}")]
    TimedOut { item_id: ItemId, timeout: Duration },

    #[error("item lock poisoned")]
    Poisoned,
}

/// Cooperative cancellation flag shared between a caller and a pending operation.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Default)]
struct Slot {
    held: Mutex<bool>,
    released: Condvar,
}

impl Slot {
    fn release(&self) {
        let mut held = match self.held.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *held = false;
        self.released.notify_one();
    }
}

type Registry = Mutex<HashMap<ItemId, Arc<Slot>>>;

/// Drop `slot` from the registry if the caller's handle is the last one
/// outside the map. New handles are only cloned under the registry lock, so
/// the count cannot grow while we look at it.
fn retire(registry: &Registry, item_id: ItemId, slot: Arc<Slot>) {
    let mut slots = match registry.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    let idle = slots
        .get(&item_id)
        .is_some_and(|stored| Arc::ptr_eq(stored, &slot) && Arc::strong_count(&slot) == 2);
    if idle {
        slots.remove(&item_id);
    }
}

/// Registry of per-item locks.
#[derive(Debug, Default)]
pub struct ItemLocks {
    slots: Arc<Registry>,
}

/// Holds one or more item locks; releases them (in reverse order) on drop.
#[must_use = "item locks are released as soon as the guard is dropped"]
#[derive(Debug)]
pub struct ItemGuard {
    registry: Arc<Registry>,
    held: Vec<(ItemId, Arc<Slot>)>,
}

impl ItemGuard {
    pub fn items(&self) -> impl Iterator<Item = ItemId> + '_ {
        self.held.iter().map(|(id, _)| *id)
    }
}

impl Drop for ItemGuard {
    fn drop(&mut self) {
        while let Some((item_id, slot)) = self.held.pop() {
            slot.release();
            retire(&self.registry, item_id, slot);
        }
    }
}

impl ItemLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire exclusive access to every item in `items`.
    ///
    /// Duplicates are ignored. Waits at most `timeout` per item (forever when
    /// `None`) and gives up as soon as `cancel` fires. On failure, locks taken
    /// so far are released.
    pub fn acquire(
        &self,
        items: &[ItemId],
        timeout: Option<Duration>,
        cancel: &CancellationToken,
    ) -> Result<ItemGuard, LockError> {
        let mut ordered = items.to_vec();
        ordered.sort();
        ordered.dedup();

        let mut guard = ItemGuard {
            registry: self.slots.clone(),
            held: Vec::with_capacity(ordered.len()),
        };
        for item_id in ordered {
            let slot = self.slot(item_id)?;
            if let Err(err) = Self::wait_for(&slot, item_id, timeout, cancel) {
                retire(&self.slots, item_id, slot);
                return Err(err);
            }
            guard.held.push((item_id, slot));
        }
        Ok(guard)
    }

    /// Number of items that currently have a lock entry.
    pub fn tracked(&self) -> usize {
        self.slots.lock().map(|slots| slots.len()).unwrap_or(0)
    }

    fn slot(&self, item_id: ItemId) -> Result<Arc<Slot>, LockError> {
        let mut slots = self.slots.lock().map_err(|_| LockError::Poisoned)?;
        Ok(slots.entry(item_id).or_default().clone())
    }

    fn wait_for(
        slot: &Slot,
        item_id: ItemId,
        timeout: Option<Duration>,
        cancel: &CancellationToken,
    ) -> Result<(), LockError> {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut held = slot.held.lock().map_err(|_| LockError::Poisoned)?;

        while *held {
            if cancel.is_cancelled() {
                return Err(LockError::Cancelled(item_id));
            }
            let mut wait = CANCEL_POLL;
            if let Some(deadline) = deadline {
                let now = Instant::now();
                if now >= deadline {
                    return Err(LockError::TimedOut {
                        item_id,
                        timeout: timeout.unwrap_or_default(),
                    });
                }
                wait = wait.min(deadline - now);
            }
            held = slot
                .released
                .wait_timeout(held, wait)
                .map_err(|_| LockError::Poisoned)?
                .0;
        }

        if cancel.is_cancelled() {
            return Err(LockError::Cancelled(item_id));
        }
        *held = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::thread;

    #[test]
    fn guard_releases_on_drop() {
        let locks = ItemLocks::new();
        let id = ItemId::new();
        let cancel = CancellationToken::new();

        let guard = locks.acquire(&[id], None, &cancel).unwrap();
        assert_eq!(guard.items().collect::<Vec<_>>(), vec![id]);
        drop(guard);

        let _again = locks
            .acquire(&[id], Some(Duration::from_millis(50)), &cancel)
            .unwrap();
    }

    #[test]
    fn released_locks_leave_no_entries_behind() {
        let locks = ItemLocks::new();
        let cancel = CancellationToken::new();
        for _ in 0..100 {
            let ids = [ItemId::new(), ItemId::new()];
            let guard = locks.acquire(&ids, None, &cancel).unwrap();
            assert_eq!(locks.tracked(), 2);
            drop(guard);
        }
        assert_eq!(locks.tracked(), 0);
    }

    #[test]
    fn entry_survives_while_a_waiter_is_queued() {
        let locks = Arc::new(ItemLocks::new());
        let id = ItemId::new();
        let held = locks.acquire(&[id], None, &CancellationToken::new()).unwrap();

        let (tx, rx) = mpsc::channel();
        let waiter = {
            let locks = locks.clone();
            thread::spawn(move || {
                let guard = locks.acquire(&[id], None, &CancellationToken::new());
                let _ = tx.send(guard.is_ok());
            })
        };

        thread::sleep(Duration::from_millis(30));
        drop(held);
        assert!(rx.recv_timeout(Duration::from_secs(2)).unwrap());
        waiter.join().unwrap();
        assert_eq!(locks.tracked(), 0);
    }

    #[test]
    fn failed_waits_leave_no_entries_behind() {
        let locks = ItemLocks::new();
        let id = ItemId::new();
        let cancel = CancellationToken::new();
        let held = locks.acquire(&[id], None, &cancel).unwrap();

        locks
            .acquire(&[id], Some(Duration::from_millis(10)), &cancel)
            .unwrap_err();
        assert_eq!(locks.tracked(), 1);
        drop(held);
        assert_eq!(locks.tracked(), 0);
    }

    #[test]
    fn duplicate_ids_are_locked_once() {
        let locks = ItemLocks::new();
        let id = ItemId::new();
        let guard = locks
            .acquire(&[id, id], Some(Duration::from_millis(50)), &CancellationToken::new())
            .unwrap();
        assert_eq!(guard.items().count(), 1);
    }

    #[test]
    fn contended_lock_times_out() {
        let locks = ItemLocks::new();
        let id = ItemId::new();
        let cancel = CancellationToken::new();
        let _held = locks.acquire(&[id], None, &cancel).unwrap();

        let err = locks
            .acquire(&[id], Some(Duration::from_millis(30)), &cancel)
            .unwrap_err();
        assert!(matches!(err, LockError::TimedOut { item_id, .. } if item_id == id));
    }

    #[test]
    fn waiter_can_be_cancelled() {
        let locks = Arc::new(ItemLocks::new());
        let id = ItemId::new();
        let _held = locks.acquire(&[id], None, &CancellationToken::new()).unwrap();

        let cancel = CancellationToken::new();
        let (tx, rx) = mpsc::channel();
        let waiter = {
            let locks = locks.clone();
            let cancel = cancel.clone();
            thread::spawn(move || {
                let result = locks.acquire(&[id], None, &cancel).map(|_| ());
                let _ = tx.send(result);
            })
        };

        thread::sleep(Duration::from_millis(30));
        cancel.cancel();
        let result = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(result, Err(LockError::Cancelled(id)));
        waiter.join().unwrap();
    }

    #[test]
    fn failed_multi_acquire_releases_earlier_locks() {
        let locks = ItemLocks::new();
        let mut ids = [ItemId::new(), ItemId::new()];
        ids.sort();
        let cancel = CancellationToken::new();

        let _second = locks.acquire(&[ids[1]], None, &cancel).unwrap();
        let err = locks
            .acquire(&ids, Some(Duration::from_millis(20)), &cancel)
            .unwrap_err();
        assert!(matches!(err, LockError::TimedOut { .. }));

        // The first id must be free again.
        let _first = locks
            .acquire(&[ids[0]], Some(Duration::from_millis(20)), &cancel)
            .unwrap();
    }
}
