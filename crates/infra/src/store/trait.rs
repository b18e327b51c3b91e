use std::sync::Arc;

use thiserror::Error;

use stockledger_core::{AggregateRoot, ExpectedVersion, ItemId};
use stockledger_inventory::{Sku, StockItem, Transaction, Warehouse, WarehouseCode};

/// Durable store operation error.
///
/// These are **infrastructure errors** as opposed to domain errors
/// (validation, insufficient stock). The ledger maps them onto its own
/// error taxonomy.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("sku already exists: {0}")]
    DuplicateSku(String),

    #[error("item not found: {0}")]
    ItemNotFound(ItemId),

    #[error("warehouse already exists: {0}")]
    DuplicateWarehouse(String),

    #[error("warehouse not found: {0}")]
    WarehouseNotFound(String),

    #[error("optimistic concurrency check failed: {0}")]
    Concurrency(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("lock poisoned")]
    LockPoisoned,
}

/// An item row to write back, guarded by the version it was read at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemWrite {
    pub item: StockItem,
    pub expected_version: ExpectedVersion,
}

impl ItemWrite {
    pub fn new(item: StockItem, expected_version: ExpectedVersion) -> Self {
        Self {
            item,
            expected_version,
        }
    }
}

/// A unit of work: item updates plus transaction rows to append.
///
/// Committed atomically: either every item write and every append happens, or
/// none does.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitBatch {
    pub items: Vec<ItemWrite>,
    pub transactions: Vec<Transaction>,
}

impl CommitBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_item(mut self, item: StockItem, expected_version: ExpectedVersion) -> Self {
        self.items.push(ItemWrite::new(item, expected_version));
        self
    }

    pub fn append(mut self, transaction: Transaction) -> Self {
        self.transactions.push(transaction);
        self
    }
}

/// Durable storage for items and the append-only transaction log.
///
/// ## Commit Semantics
///
/// `commit()`:
/// - checks every `ItemWrite` against the stored version (optimistic locking)
/// - assigns each appended transaction the next ledger-wide `sequence`
/// - persists all rows atomically (all or nothing)
///
/// ## Log Semantics
///
/// Transactions are never updated or deleted. Per item they are returned in
/// ascending `sequence` order, which matches timestamp order because the
/// ledger appends under the item's lock with non-decreasing timestamps.
pub trait LedgerStore: Send + Sync {
    /// Insert a newly created item. Fails with `DuplicateSku` if its SKU is taken.
    fn insert_item(&self, item: StockItem) -> Result<(), StoreError>;

    fn load_item(&self, item_id: ItemId) -> Result<Option<StockItem>, StoreError>;

    /// Stored version of a created item, without materializing the row.
    fn item_version(&self, item_id: ItemId) -> Result<Option<u64>, StoreError> {
        Ok(self
            .load_item(item_id)?
            .filter(StockItem::is_created)
            .map(|item| item.version()))
    }

    fn find_item_by_sku(&self, sku: &Sku) -> Result<Option<StockItem>, StoreError>;

    fn list_items(&self) -> Result<Vec<StockItem>, StoreError>;

    /// Register a warehouse. Fails with `DuplicateWarehouse` if its code is taken.
    fn insert_warehouse(&self, warehouse: Warehouse) -> Result<(), StoreError>;

    /// Overwrite an existing warehouse row. Fails with `WarehouseNotFound` otherwise.
    fn save_warehouse(&self, warehouse: Warehouse) -> Result<(), StoreError>;

    fn load_warehouse(&self, code: &WarehouseCode) -> Result<Option<Warehouse>, StoreError>;

    fn list_warehouses(&self) -> Result<Vec<Warehouse>, StoreError>;

    /// Atomically apply a batch; returns the appended rows with sequences assigned.
    fn commit(&self, batch: CommitBatch) -> Result<Vec<Transaction>, StoreError>;

    /// Up to `limit` transactions for an item with `sequence > after_sequence`,
    /// ascending.
    fn load_transactions(
        &self,
        item_id: ItemId,
        after_sequence: u64,
        limit: usize,
    ) -> Result<Vec<Transaction>, StoreError>;

    /// Highest sequence number assigned so far (0 when the log is empty).
    fn last_sequence(&self) -> Result<u64, StoreError>;
}

impl<S> LedgerStore for Arc<S>
where
    S: LedgerStore + ?Sized,
{
    fn insert_item(&self, item: StockItem) -> Result<(), StoreError> {
        (**self).insert_item(item)
    }

    fn load_item(&self, item_id: ItemId) -> Result<Option<StockItem>, StoreError> {
        (**self).load_item(item_id)
    }

    fn item_version(&self, item_id: ItemId) -> Result<Option<u64>, StoreError> {
        (**self).item_version(item_id)
    }

    fn find_item_by_sku(&self, sku: &Sku) -> Result<Option<StockItem>, StoreError> {
        (**self).find_item_by_sku(sku)
    }

    fn list_items(&self) -> Result<Vec<StockItem>, StoreError> {
        (**self).list_items()
    }

    fn insert_warehouse(&self, warehouse: Warehouse) -> Result<(), StoreError> {
        (**self).insert_warehouse(warehouse)
    }

    fn save_warehouse(&self, warehouse: Warehouse) -> Result<(), StoreError> {
        (**self).save_warehouse(warehouse)
    }

    fn load_warehouse(&self, code: &WarehouseCode) -> Result<Option<Warehouse>, StoreError> {
        (**self).load_warehouse(code)
    }

    fn list_warehouses(&self) -> Result<Vec<Warehouse>, StoreError> {
        (**self).list_warehouses()
    }

    fn commit(&self, batch: CommitBatch) -> Result<Vec<Transaction>, StoreError> {
        (**self).commit(batch)
    }

    fn load_transactions(
        &self,
        item_id: ItemId,
        after_sequence: u64,
        limit: usize,
    ) -> Result<Vec<Transaction>, StoreError> {
        (**self).load_transactions(item_id, after_sequence, limit)
    }

    fn last_sequence(&self) -> Result<u64, StoreError> {
        (**self).last_sequence()
    }
}
