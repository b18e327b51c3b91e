use std::collections::HashMap;
use std::sync::RwLock;

use stockledger_core::{AggregateRoot, ItemId};
use stockledger_inventory::{Sku, StockItem, Transaction, Warehouse, WarehouseCode};

use super::r#trait::{CommitBatch, LedgerStore, StoreError};

#[derive(Debug, Default)]
struct Tables {
    items: HashMap<ItemId, StockItem>,
    skus: HashMap<Sku, ItemId>,
    transactions: HashMap<ItemId, Vec<Transaction>>,
    warehouses: HashMap<WarehouseCode, Warehouse>,
    last_sequence: u64,
}

/// In-memory ledger store.
///
/// Intended for tests/dev. A single `RwLock` over all tables makes every
/// commit trivially atomic.
#[derive(Debug, Default)]
pub struct InMemoryLedgerStore {
    tables: RwLock<Tables>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of transaction rows across all items.
    pub fn transaction_count(&self) -> usize {
        self.tables
            .read()
            .map(|t| t.transactions.values().map(Vec::len).sum())
            .unwrap_or(0)
    }
}

impl LedgerStore for InMemoryLedgerStore {
    fn insert_item(&self, item: StockItem) -> Result<(), StoreError> {
        let sku = item
            .sku()
            .cloned()
            .ok_or_else(|| StoreError::Unavailable("cannot insert an uncreated item".to_string()))?;

        let mut tables = self.tables.write().map_err(|_| StoreError::LockPoisoned)?;

        if tables.skus.contains_key(&sku) {
            return Err(StoreError::DuplicateSku(sku.to_string()));
        }
        if tables.items.contains_key(&item.id_typed()) {
            return Err(StoreError::Concurrency(format!(
                "item {} already stored",
                item.id_typed()
            )));
        }

        tables.skus.insert(sku, item.id_typed());
        tables.items.insert(item.id_typed(), item);
        Ok(())
    }

    fn load_item(&self, item_id: ItemId) -> Result<Option<StockItem>, StoreError> {
        let tables = self.tables.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(tables.items.get(&item_id).cloned())
    }

    fn item_version(&self, item_id: ItemId) -> Result<Option<u64>, StoreError> {
        let tables = self.tables.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(tables
            .items
            .get(&item_id)
            .filter(|item| item.is_created())
            .map(|item| item.version()))
    }

    fn find_item_by_sku(&self, sku: &Sku) -> Result<Option<StockItem>, StoreError> {
        let tables = self.tables.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(tables
            .skus
            .get(sku)
            .and_then(|id| tables.items.get(id))
            .cloned())
    }

    fn list_items(&self) -> Result<Vec<StockItem>, StoreError> {
        let tables = self.tables.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(tables.items.values().cloned().collect())
    }

    fn insert_warehouse(&self, warehouse: Warehouse) -> Result<(), StoreError> {
        let mut tables = self.tables.write().map_err(|_| StoreError::LockPoisoned)?;
        if tables.warehouses.contains_key(warehouse.code()) {
            return Err(StoreError::DuplicateWarehouse(warehouse.code().to_string()));
        }
        tables.warehouses.insert(warehouse.code().clone(), warehouse);
        Ok(())
    }

    fn save_warehouse(&self, warehouse: Warehouse) -> Result<(), StoreError> {
        let mut tables = self.tables.write().map_err(|_| StoreError::LockPoisoned)?;
        match tables.warehouses.get_mut(warehouse.code()) {
            Some(row) => {
                *row = warehouse;
                Ok(())
            }
            None => Err(StoreError::WarehouseNotFound(warehouse.code().to_string())),
        }
    }

    fn load_warehouse(&self, code: &WarehouseCode) -> Result<Option<Warehouse>, StoreError> {
        let tables = self.tables.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(tables.warehouses.get(code).cloned())
    }

    fn list_warehouses(&self) -> Result<Vec<Warehouse>, StoreError> {
        let tables = self.tables.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(tables.warehouses.values().cloned().collect())
    }

    fn commit(&self, batch: CommitBatch) -> Result<Vec<Transaction>, StoreError> {
        let mut tables = self.tables.write().map_err(|_| StoreError::LockPoisoned)?;

        // Validate everything before touching any row.
        for write in &batch.items {
            let id = write.item.id_typed();
            let stored = tables.items.get(&id).ok_or(StoreError::ItemNotFound(id))?;
            if !write.expected_version.matches(stored.version()) {
                return Err(StoreError::Concurrency(format!(
                    "item {id}: expected {:?}, found {}",
                    write.expected_version,
                    stored.version()
                )));
            }
        }
        for txn in &batch.transactions {
            if !tables.items.contains_key(&txn.item_id) {
                return Err(StoreError::ItemNotFound(txn.item_id));
            }
        }

        for write in batch.items {
            tables.items.insert(write.item.id_typed(), write.item);
        }

        let mut committed = Vec::with_capacity(batch.transactions.len());
        for mut txn in batch.transactions {
            tables.last_sequence += 1;
            txn.sequence = tables.last_sequence;
            tables
                .transactions
                .entry(txn.item_id)
                .or_default()
                .push(txn.clone());
            committed.push(txn);
        }

        Ok(committed)
    }

    fn load_transactions(
        &self,
        item_id: ItemId,
        after_sequence: u64,
        limit: usize,
    ) -> Result<Vec<Transaction>, StoreError> {
        let tables = self.tables.read().map_err(|_| StoreError::LockPoisoned)?;
        let Some(log) = tables.transactions.get(&item_id) else {
            return Ok(vec![]);
        };

        let start = log.partition_point(|t| t.sequence <= after_sequence);
        Ok(log[start..].iter().take(limit).cloned().collect())
    }

    fn last_sequence(&self) -> Result<u64, StoreError> {
        let tables = self.tables.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(tables.last_sequence)
    }
}
