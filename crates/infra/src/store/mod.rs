//! Durable storage boundary for items and the transaction log.
//!
//! The ledger only talks to storage through `LedgerStore`, so a SQL backend
//! can replace the in-memory one without touching domain code.

pub mod in_memory;
pub mod r#trait;

pub use in_memory::InMemoryLedgerStore;
pub use r#trait::{CommitBatch, ItemWrite, LedgerStore, StoreError};
