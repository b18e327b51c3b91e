//! Best-effort stock snapshot cache.
//!
//! The cache is advisory: a miss, a failure, or an empty cache never changes
//! what the ledger returns, only how fast. The ledger refreshes entries under
//! the item's lock after every successful write.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use stockledger_core::{AggregateRoot, ItemId};
use stockledger_inventory::{Sku, StockItem};

/// Read-mostly view of an item's stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockSnapshot {
    pub item_id: ItemId,
    pub sku: Sku,
    pub quantity: i64,
    pub reorder_point: i64,
    pub reorder_quantity: i64,
    pub active: bool,
    pub version: u64,
}

impl StockSnapshot {
    /// Snapshot a created item; `None` for an empty aggregate.
    pub fn of(item: &StockItem) -> Option<Self> {
        Some(Self {
            item_id: item.id_typed(),
            sku: item.sku()?.clone(),
            quantity: item.quantity(),
            reorder_point: item.reorder().reorder_point(),
            reorder_quantity: item.reorder().reorder_quantity(),
            active: item.is_active(),
            version: item.version(),
        })
    }
}

/// Cache port keyed by item id. All operations are infallible by contract.
pub trait StockCache: Send + Sync {
    fn get(&self, item_id: &ItemId) -> Option<StockSnapshot>;
    fn set(&self, snapshot: StockSnapshot);
    fn invalidate(&self, item_id: &ItemId);
}

impl<C> StockCache for Arc<C>
where
    C: StockCache + ?Sized,
{
    fn get(&self, item_id: &ItemId) -> Option<StockSnapshot> {
        (**self).get(item_id)
    }

    fn set(&self, snapshot: StockSnapshot) {
        (**self).set(snapshot)
    }

    fn invalidate(&self, item_id: &ItemId) {
        (**self).invalidate(item_id)
    }
}

/// Cache that stores nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopStockCache;

impl StockCache for NoopStockCache {
    fn get(&self, _item_id: &ItemId) -> Option<StockSnapshot> {
        None
    }

    fn set(&self, _snapshot: StockSnapshot) {}

    fn invalidate(&self, _item_id: &ItemId) {}
}

/// Hit/miss counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

/// In-process cache for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryStockCache {
    entries: RwLock<HashMap<ItemId, StockSnapshot>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl InMemoryStockCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl StockCache for InMemoryStockCache {
    fn get(&self, item_id: &ItemId) -> Option<StockSnapshot> {
        let found = self
            .entries
            .read()
            .ok()
            .and_then(|entries| entries.get(item_id).cloned());
        let counter = if found.is_some() { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
        found
    }

    fn set(&self, snapshot: StockSnapshot) {
        if let Ok(mut entries) = self.entries.write() {
            entries.insert(snapshot.item_id, snapshot);
        }
    }

    fn invalidate(&self, item_id: &ItemId) {
        if let Ok(mut entries) = self.entries.write() {
            entries.remove(item_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(item_id: ItemId, quantity: i64) -> StockSnapshot {
        StockSnapshot {
            item_id,
            sku: Sku::parse("SKU-1").unwrap(),
            quantity,
            reorder_point: 10,
            reorder_quantity: 20,
            active: true,
            version: 1,
        }
    }

    #[test]
    fn set_get_invalidate() {
        let cache = InMemoryStockCache::new();
        let id = ItemId::new();

        assert!(cache.get(&id).is_none());
        cache.set(snapshot(id, 5));
        assert_eq!(cache.get(&id).map(|s| s.quantity), Some(5));
        cache.invalidate(&id);
        assert!(cache.is_empty());

        assert_eq!(cache.stats(), CacheStats { hits: 1, misses: 1 });
    }

    #[test]
    fn noop_cache_never_hits() {
        let cache = NoopStockCache;
        let id = ItemId::new();
        cache.set(snapshot(id, 5));
        assert!(cache.get(&id).is_none());
    }
}
