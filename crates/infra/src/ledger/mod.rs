//! The stock ledger engine.
//!
//! `StockLedger` is the only writer of item quantities and the transaction
//! log. Every mutating call follows the same pipeline:
//!
//! ```text
//! request
//!   ↓
//! 1. Validate what can be checked without state (quantity, self-transfer)
//!   ↓
//! 2. Lock every touched item (ascending ItemId; timeout + cancellation)
//!   ↓
//! 3. Load current rows from the store
//!   ↓
//! 4. Decide: StockItem::handle (pure), then apply the resulting events
//!   ↓
//! 5. Commit item rows + transaction rows atomically (expected versions)
//!   ↓
//! 6. Refresh the cache, still under the lock
//!   ↓
//! 7. Release locks, publish events (best-effort)
//! ```
//!
//! A `ConcurrencyConflict` from step 5 re-runs steps 3-6 up to
//! `LedgerConfig::max_conflict_retries` times.
//!
//! Warehouses are a small registry next to the items. An item's location
//! must name a registered, active warehouse when it is created or moved.

pub mod error;
pub mod events;
pub mod history;
pub mod locks;
pub mod types;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use stockledger_core::{
    Aggregate, AggregateRoot, DomainError, ExpectedVersion, ItemId, TransferId,
};
use stockledger_events::{EventBus, EventEnvelope};
use stockledger_inventory::{
    CreateItem, DeactivateItem, ItemCommand, ItemEvent, ItemSpec, ItemUpdate, Location,
    MoveStock, Movement, ReorderSignal, Sku, StockItem, StockMoved, Transaction,
    TransactionFilter, TransactionType, UpdateItem, Warehouse, WarehouseCode, WarehouseSpec,
    validate_quantity,
};

use crate::cache::{StockCache, StockSnapshot};
use crate::clock::{Clock, SystemClock};
use crate::config::LedgerConfig;
use crate::store::{CommitBatch, LedgerStore, StoreError};

pub use error::{ErrorKind, LedgerError};
pub use events::LedgerEvent;
pub use history::{TransactionHistory, TransactionIter};
pub use locks::{CancellationToken, ItemGuard, ItemLocks, LockError};
pub use types::{
    AppliedTransaction, InventoryMetrics, ItemFilter, StockLevel, StockValuation,
    TransactionRequest,
};

/// Transactional stock-accounting engine.
///
/// ## Generic Parameters
///
/// - `S`: durable store (`LedgerStore`)
/// - `C`: stock cache (`StockCache`)
/// - `B`: event sink (`EventBus<EventEnvelope<LedgerEvent>>`)
pub struct StockLedger<S, C, B> {
    store: S,
    cache: C,
    bus: B,
    clock: Arc<dyn Clock>,
    config: LedgerConfig,
    locks: ItemLocks,
    warehouse_writes: Mutex<()>,
    event_sequence: AtomicU64,
}

impl<S, C, B> core::fmt::Debug for StockLedger<S, C, B> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("StockLedger")
            .field("config", &self.config)
            .field("published", &self.event_sequence.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl<S, C, B> StockLedger<S, C, B> {
    pub fn new(store: S, cache: C, bus: B) -> Self {
        Self {
            store,
            cache,
            bus,
            clock: Arc::new(SystemClock),
            config: LedgerConfig::default(),
            locks: ItemLocks::new(),
            warehouse_writes: Mutex::new(()),
            event_sequence: AtomicU64::new(0),
        }
    }

    pub fn with_config(mut self, config: LedgerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn locks(&self) -> &ItemLocks {
        &self.locks
    }
}

/// Decided-but-uncommitted state for one touched item.
struct Leg {
    item: StockItem,
    expected: ExpectedVersion,
    before: i64,
    moved: StockMoved,
}

impl<S, C, B> StockLedger<S, C, B>
where
    S: LedgerStore,
    C: StockCache,
    B: EventBus<EventEnvelope<LedgerEvent>>,
{
    // ---------------------------------------------------------------------
    // Items
    // ---------------------------------------------------------------------

    /// Register a new item with zero stock.
    pub fn create_item(&self, spec: ItemSpec) -> Result<StockItem, LedgerError> {
        self.ensure_stockable(spec.location())?;
        let item_id = ItemId::new();
        let sku = spec.sku().clone();
        let mut item = StockItem::empty(item_id);
        let events = item.handle(&ItemCommand::CreateItem(CreateItem {
            item_id,
            spec,
            occurred_at: self.clock.now(),
        }))?;
        for event in &events {
            item.apply(event);
        }

        if let Err(err) = self.store.insert_item(item.clone()) {
            let err = LedgerError::from(err);
            warn!(%item_id, %sku, error = %err, "item creation rejected");
            return Err(err);
        }
        if let Some(snapshot) = StockSnapshot::of(&item) {
            self.cache.set(snapshot);
        }

        info!(%item_id, %sku, "item created");
        self.publish(LedgerEvent::ItemCreated {
            item_id,
            sku,
            occurred_at: item.created_at().unwrap_or_else(|| self.clock.now()),
        });
        Ok(item)
    }

    /// Soft-deactivate an item. Further transactions against it fail with `UnknownItem`.
    pub fn deactivate_item(&self, item_id: ItemId) -> Result<StockItem, LedgerError> {
        let (item, changed) = self.mutate_item(item_id, "deactivate_item", |occurred_at| {
            ItemCommand::DeactivateItem(DeactivateItem {
                item_id,
                occurred_at,
            })
        })?;

        if changed {
            info!(%item_id, quantity = item.quantity(), "item deactivated");
            self.publish(LedgerEvent::ItemDeactivated {
                item_id,
                occurred_at: item.updated_at().unwrap_or_else(|| self.clock.now()),
            });
        }
        Ok(item)
    }

    /// Change descriptive fields and reorder thresholds. Never touches sku or quantity.
    pub fn update_item(&self, item_id: ItemId, update: ItemUpdate) -> Result<StockItem, LedgerError> {
        self.ensure_stockable(update.location.as_ref())?;
        let (item, changed) = self.mutate_item(item_id, "update_item", |occurred_at| {
            ItemCommand::UpdateItem(UpdateItem {
                item_id,
                update: update.clone(),
                occurred_at,
            })
        })?;

        if changed {
            info!(%item_id, version = item.version(), "item updated");
            self.publish(LedgerEvent::ItemUpdated {
                item_id,
                occurred_at: item.updated_at().unwrap_or_else(|| self.clock.now()),
            });
        }
        Ok(item)
    }

    pub fn get_item(&self, item_id: ItemId) -> Result<StockItem, LedgerError> {
        self.load_created(item_id)
    }

    /// Look an item up by its business identifier.
    pub fn get_item_by_sku(&self, sku: &str) -> Result<StockItem, LedgerError> {
        let sku = Sku::parse(sku)?;
        match self.store.find_item_by_sku(&sku)? {
            Some(item) if item.is_created() => Ok(item),
            _ => Err(LedgerError::UnknownItem(sku.to_string())),
        }
    }

    /// Items matching `filter`, ordered by sku, paged by `offset`/`limit`.
    pub fn list_items(&self, filter: &ItemFilter) -> Result<Vec<StockItem>, LedgerError> {
        let limit = filter.limit.unwrap_or(self.config.default_list_limit);
        let mut items: Vec<StockItem> = self
            .store
            .list_items()?
            .into_iter()
            .filter(|item| filter.matches(item))
            .collect();
        items.sort_by(types::by_sku);
        Ok(items.into_iter().skip(filter.offset).take(limit).collect())
    }

    /// Active items whose stock is at or below their reorder point, ordered by sku.
    pub fn low_stock_items(&self) -> Result<Vec<StockLevel>, LedgerError> {
        let mut items: Vec<StockItem> = self
            .store
            .list_items()?
            .into_iter()
            .filter(|item| item.is_active() && item.is_at_or_below_reorder_point())
            .collect();
        items.sort_by(types::by_sku);
        Ok(items.iter().filter_map(StockLevel::of).collect())
    }

    /// Value of stock on hand per currency, optionally for one warehouse.
    ///
    /// Items without a unit price are skipped.
    pub fn stock_valuation(&self, warehouse: Option<&str>) -> Result<StockValuation, LedgerError> {
        let filter = ItemFilter {
            warehouse: warehouse.map(str::to_string),
            ..ItemFilter::default()
        };
        let mut valuation = StockValuation::default();
        for item in self.store.list_items()?.iter().filter(|i| filter.matches(i)) {
            valuation.add(item);
        }
        Ok(valuation)
    }

    /// Item count, low-stock count and stock value from one read of the store.
    pub fn metrics_summary(&self) -> Result<InventoryMetrics, LedgerError> {
        let items: Vec<StockItem> = self
            .store
            .list_items()?
            .into_iter()
            .filter(StockItem::is_created)
            .collect();
        let low_stock_items = items
            .iter()
            .filter(|item| item.is_active() && item.is_at_or_below_reorder_point())
            .count();
        let mut stock_value = StockValuation::default();
        for item in &items {
            stock_value.add(item);
        }
        Ok(InventoryMetrics::new(items.len(), low_stock_items, stock_value))
    }

    // ---------------------------------------------------------------------
    // Warehouses
    // ---------------------------------------------------------------------

    pub fn register_warehouse(&self, spec: WarehouseSpec) -> Result<Warehouse, LedgerError> {
        let warehouse = Warehouse::register(spec, self.clock.now());
        let code = warehouse.code().clone();
        let _writes = self.warehouse_writes()?;
        if let Err(err) = self.store.insert_warehouse(warehouse.clone()) {
            let err = LedgerError::from(err);
            warn!(%code, error = %err, "warehouse registration rejected");
            return Err(err);
        }
        info!(%code, warehouse_name = warehouse.name(), "warehouse registered");
        Ok(warehouse)
    }

    pub fn get_warehouse(&self, code: &str) -> Result<Warehouse, LedgerError> {
        let code = WarehouseCode::parse(code)?;
        self.store
            .load_warehouse(&code)?
            .ok_or_else(|| LedgerError::UnknownWarehouse(code.to_string()))
    }

    /// Registered warehouses ordered by code, optionally only active ones.
    pub fn list_warehouses(&self, active_only: bool) -> Result<Vec<Warehouse>, LedgerError> {
        let mut warehouses: Vec<Warehouse> = self
            .store
            .list_warehouses()?
            .into_iter()
            .filter(|w| !active_only || w.is_active())
            .collect();
        warehouses.sort_by(|a, b| a.code().cmp(b.code()));
        Ok(warehouses)
    }

    /// Stop accepting new items into a warehouse. Items already there keep
    /// their location and stay transactable.
    pub fn deactivate_warehouse(&self, code: &str) -> Result<Warehouse, LedgerError> {
        let warehouse = self.mutate_warehouse(code, |w, at| w.deactivate(at))?;
        info!(code = %warehouse.code(), "warehouse deactivated");
        Ok(warehouse)
    }

    /// Record occupied capacity, bounded by the warehouse's total.
    pub fn record_warehouse_usage(&self, code: &str, used: u64) -> Result<Warehouse, LedgerError> {
        let warehouse = self.mutate_warehouse(code, |w, at| w.record_usage(used, at))?;
        debug!(code = %warehouse.code(), used, "warehouse usage recorded");
        Ok(warehouse)
    }

    // ---------------------------------------------------------------------
    // Stock
    // ---------------------------------------------------------------------

    pub fn apply_transaction(
        &self,
        request: TransactionRequest,
    ) -> Result<AppliedTransaction, LedgerError> {
        self.apply_transaction_cancellable(request, &CancellationToken::new())
    }

    /// Apply a transaction, giving up with `Cancelled` if `cancel` fires
    /// before the commit. Once committed, cancellation has no effect.
    pub fn apply_transaction_cancellable(
        &self,
        request: TransactionRequest,
        cancel: &CancellationToken,
    ) -> Result<AppliedTransaction, LedgerError> {
        let kind = request.transaction_type.kind();
        match self.try_apply(&request, cancel) {
            Ok(applied) => {
                self.announce(&request, &applied);
                Ok(applied)
            }
            Err(err) => {
                warn!(
                    item_id = %request.item_id,
                    transaction_type = %kind,
                    quantity = request.quantity,
                    error = %err,
                    "transaction rejected"
                );
                self.publish(LedgerEvent::TransactionRejected {
                    item_id: request.item_id,
                    kind,
                    error: err.kind(),
                    occurred_at: self.clock.now(),
                });
                Err(err)
            }
        }
    }

    /// Current stock for an item. Reflects every `apply_transaction` that
    /// completed before this call.
    ///
    /// A cached snapshot is served only if its version matches the stored row.
    pub fn get_stock(&self, item_id: ItemId) -> Result<StockLevel, LedgerError> {
        let _guard = self.lock(&[item_id], &CancellationToken::new())?;

        let stored = self
            .store
            .item_version(item_id)?
            .ok_or_else(|| LedgerError::UnknownItem(item_id.to_string()))?;
        if let Some(snapshot) = self.cache.get(&item_id) {
            if snapshot.version == stored {
                return Ok(StockLevel::from(snapshot));
            }
            debug!(%item_id, cached = snapshot.version, stored, "discarding stale cache entry");
        }

        let item = self.load_created(item_id)?;
        let snapshot = StockSnapshot::of(&item)
            .ok_or_else(|| LedgerError::UnknownItem(item_id.to_string()))?;
        self.cache.set(snapshot.clone());
        Ok(StockLevel::from(snapshot))
    }

    /// Transaction history of an item, bounded to what is committed now.
    pub fn list_transactions(
        &self,
        item_id: ItemId,
        filter: TransactionFilter,
    ) -> Result<TransactionHistory<'_, S>, LedgerError> {
        self.load_created(item_id)?;
        let until = self.store.last_sequence()?;
        Ok(TransactionHistory::new(
            &self.store,
            item_id,
            filter,
            self.config.history_page_size,
            until,
        ))
    }

    // ---------------------------------------------------------------------
    // Internals
    // ---------------------------------------------------------------------

    fn try_apply(
        &self,
        request: &TransactionRequest,
        cancel: &CancellationToken,
    ) -> Result<AppliedTransaction, LedgerError> {
        validate_quantity(request.quantity)?;
        if let TransactionType::Transfer { destination } = request.transaction_type {
            if destination == request.item_id {
                return Err(LedgerError::InvalidQuantity(
                    "transfer source and destination must differ".to_string(),
                ));
            }
        }

        let _guard = self.lock(&request.items(), cancel)?;
        self.with_retries("apply_transaction", || self.apply_locked(request, cancel))
    }

    fn apply_locked(
        &self,
        request: &TransactionRequest,
        cancel: &CancellationToken,
    ) -> Result<AppliedTransaction, LedgerError> {
        let now = self.clock.now();
        let source = self.load_created(request.item_id)?;

        let mut plan = Vec::with_capacity(2);
        let mut transfer_id = None;
        match request.transaction_type {
            TransactionType::Receive => plan.push((source, Movement::Receive)),
            TransactionType::Issue => plan.push((source, Movement::Issue)),
            TransactionType::Adjust { direction } => {
                plan.push((source, Movement::Adjust { direction }))
            }
            TransactionType::Transfer { destination } => {
                let target = self.load_created(destination)?;
                transfer_id = Some(TransferId::new());
                plan.push((source, Movement::TransferOut { destination }));
                plan.push((
                    target,
                    Movement::TransferIn {
                        source: request.item_id,
                    },
                ));
            }
        }

        let mut legs = Vec::with_capacity(plan.len());
        for (item, movement) in plan {
            legs.push(Self::decide(item, movement, request.quantity, now)?);
        }

        if cancel.is_cancelled() {
            return Err(LedgerError::Cancelled(format!(
                "transaction on {} cancelled before commit",
                request.item_id
            )));
        }

        let mut batch = CommitBatch::new();
        for leg in &legs {
            batch = batch
                .write_item(leg.item.clone(), leg.expected)
                .append(Transaction::from_stock_moved(
                    &leg.moved,
                    &request.meta,
                    transfer_id,
                ));
        }
        let transactions = self.store.commit(batch)?;

        let mut stock = Vec::with_capacity(legs.len());
        let mut reorder_signals = Vec::new();
        for leg in &legs {
            if let Some(snapshot) = StockSnapshot::of(&leg.item) {
                self.cache.set(snapshot);
            }
            stock.extend(StockLevel::of(&leg.item));
            reorder_signals.extend(leg.item.reorder_signal_since(leg.before));
        }

        Ok(AppliedTransaction {
            transactions,
            stock,
            reorder_signals,
        })
    }

    fn decide(
        mut item: StockItem,
        movement: Movement,
        quantity: i64,
        now: DateTime<Utc>,
    ) -> Result<Leg, LedgerError> {
        let before = item.quantity();
        let expected = ExpectedVersion::Exact(item.version());
        let events = item.handle(&ItemCommand::MoveStock(MoveStock {
            item_id: item.id_typed(),
            movement,
            quantity,
            occurred_at: now,
        }))?;

        let mut moved = None;
        for event in &events {
            item.apply(event);
            if let ItemEvent::StockMoved(m) = event {
                moved = Some(m.clone());
            }
        }
        let moved = moved.ok_or_else(|| {
            LedgerError::InvalidQuantity(format!("no stock movement decided for {}", item.id_typed()))
        })?;

        Ok(Leg {
            item,
            expected,
            before,
            moved,
        })
    }

    /// Lock, load, decide, commit and cache a non-stock change to one item.
    /// Returns the item and whether anything changed.
    fn mutate_item(
        &self,
        item_id: ItemId,
        operation: &'static str,
        command: impl Fn(DateTime<Utc>) -> ItemCommand,
    ) -> Result<(StockItem, bool), LedgerError> {
        let _guard = self.lock(&[item_id], &CancellationToken::new())?;

        self.with_retries(operation, || {
            let mut item = self.load_created(item_id)?;
            let events = item.handle(&command(self.clock.now()))?;
            if events.is_empty() {
                return Ok((item, false));
            }

            let expected = ExpectedVersion::Exact(item.version());
            for event in &events {
                item.apply(event);
            }
            self.store
                .commit(CommitBatch::new().write_item(item.clone(), expected))?;

            if let Some(snapshot) = StockSnapshot::of(&item) {
                self.cache.set(snapshot);
            }
            Ok((item, true))
        })
    }

    fn with_retries<T>(
        &self,
        operation: &'static str,
        mut attempt: impl FnMut() -> Result<T, LedgerError>,
    ) -> Result<T, LedgerError> {
        let mut retries = 0;
        loop {
            match attempt() {
                Err(err) if err.is_retryable() && retries < self.config.max_conflict_retries => {
                    retries += 1;
                    debug!(operation, retries, error = %err, "retrying after concurrency conflict");
                }
                other => return other,
            }
        }
    }

    fn mutate_warehouse(
        &self,
        code: &str,
        change: impl FnOnce(&mut Warehouse, DateTime<Utc>) -> Result<(), DomainError>,
    ) -> Result<Warehouse, LedgerError> {
        let _writes = self.warehouse_writes()?;
        let mut warehouse = self.get_warehouse(code)?;
        change(&mut warehouse, self.clock.now())?;
        self.store.save_warehouse(warehouse.clone())?;
        Ok(warehouse)
    }

    fn warehouse_writes(&self) -> Result<MutexGuard<'_, ()>, LedgerError> {
        self.warehouse_writes
            .lock()
            .map_err(|_| LedgerError::Store(StoreError::LockPoisoned))
    }

    /// A location must point at a registered, active warehouse.
    fn ensure_stockable(&self, location: Option<&Location>) -> Result<(), LedgerError> {
        let Some(location) = location else {
            return Ok(());
        };
        match self.store.load_warehouse(location.warehouse())? {
            Some(warehouse) if warehouse.is_active() => Ok(()),
            Some(_) => Err(LedgerError::UnknownWarehouse(format!(
                "{} is inactive",
                location.warehouse()
            ))),
            None => Err(LedgerError::UnknownWarehouse(location.warehouse().to_string())),
        }
    }

    fn lock(&self, items: &[ItemId], cancel: &CancellationToken) -> Result<ItemGuard, LedgerError> {
        Ok(self.locks.acquire(items, self.config.lock_timeout, cancel)?)
    }

    fn load_created(&self, item_id: ItemId) -> Result<StockItem, LedgerError> {
        match self.store.load_item(item_id)? {
            Some(item) if item.is_created() => Ok(item),
            _ => Err(LedgerError::UnknownItem(item_id.to_string())),
        }
    }

    fn announce(&self, request: &TransactionRequest, applied: &AppliedTransaction) {
        let Some(primary) = applied.primary() else {
            return;
        };
        let destination = match request.transaction_type {
            TransactionType::Transfer { destination } => Some(destination),
            _ => None,
        };

        info!(
            item_id = %request.item_id,
            transaction_id = %primary.id,
            sequence = primary.sequence,
            transaction_type = %primary.kind(),
            quantity = primary.quantity,
            resulting_quantity = primary.resulting_quantity,
            created_by = %primary.created_by,
            "transaction applied"
        );

        for level in &applied.stock {
            if level.at_or_below_reorder_point {
                warn!(
                    item_id = %level.item_id,
                    sku = %level.sku,
                    current_quantity = level.current_quantity,
                    reorder_point = level.reorder_point,
                    "item has reached reorder point"
                );
            }
        }

        self.publish(LedgerEvent::TransactionApplied {
            item_id: request.item_id,
            kind: primary.kind(),
            quantity: primary.quantity,
            resulting_quantity: primary.resulting_quantity,
            destination,
            destination_quantity: destination.and_then(|d| applied.resulting_quantity(d)),
            reorder_crossed: applied.reorder_crossed(),
            occurred_at: primary.timestamp,
        });

        for signal in &applied.reorder_signals {
            self.publish_reorder(signal, primary.timestamp);
        }
    }

    fn publish_reorder(&self, signal: &ReorderSignal, occurred_at: DateTime<Utc>) {
        self.publish(LedgerEvent::ReorderPointCrossed {
            signal: signal.clone(),
            occurred_at,
        });
    }

    /// Best-effort: the commit already happened, so a bus failure is only logged.
    fn publish(&self, event: LedgerEvent) {
        let sequence = self.event_sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let envelope = EventEnvelope::wrap(event.item_id(), sequence, event);
        let event_type = envelope.event_type().to_string();
        if let Err(err) = self.bus.publish(envelope) {
            warn!(event_type = %event_type, sequence, error = ?err, "failed to publish ledger event");
        }
    }
}
