//! Inventory stock domain.
//!
//! Business rules for items and stock movements, implemented purely as
//! deterministic domain logic (no IO, no locking, no storage).

pub mod item;
pub mod movement;
pub mod reorder;
pub mod spec;
pub mod transaction;
pub mod warehouse;

pub use item::{
    CreateItem, DeactivateItem, ItemCommand, ItemCreated, ItemDeactivated, ItemEvent, ItemUpdated,
    MoveStock, StockItem, StockMoved, UpdateItem,
};
pub use movement::{
    AdjustDirection, Movement, TransactionKind, TransactionType, apply_delta, validate_quantity,
};
pub use reorder::{ReorderPolicy, ReorderSignal};
pub use spec::{Category, ItemSpec, ItemUpdate, Location, Sku, UnitOfMeasure, UnitPrice};
pub use transaction::{SYSTEM_ACTOR, Transaction, TransactionFilter, TransactionMeta};
pub use warehouse::{Warehouse, WarehouseCode, WarehouseContact, WarehouseSpec};
