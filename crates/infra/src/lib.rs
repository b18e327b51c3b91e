//! Infrastructure layer: the stock ledger engine and its ports.
//!
//! - `ledger`: `StockLedger`, per-item locks, history cursor, ledger events
//! - `store`: durable storage port + in-memory backend
//! - `cache`: best-effort stock snapshot cache
//! - `config` / `clock`: runtime settings and time source

pub mod cache;
pub mod clock;
pub mod config;
pub mod ledger;
pub mod store;

pub use cache::{InMemoryStockCache, NoopStockCache, StockCache, StockSnapshot};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::LedgerConfig;
pub use ledger::{
    AppliedTransaction, CancellationToken, ErrorKind, InventoryMetrics, ItemFilter, LedgerError,
    LedgerEvent, StockLedger, StockLevel, StockValuation, TransactionHistory, TransactionRequest,
};
pub use store::{InMemoryLedgerStore, LedgerStore, StoreError};
