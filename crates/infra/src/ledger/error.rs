use serde::{Deserialize, Serialize};
use thiserror::Error;

use stockledger_core::DomainError;

use super::locks::LockError;
use crate::store::StoreError;

/// Stable error classification, used in events and structured logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidSpec,
    DuplicateSku,
    UnknownItem,
    DuplicateWarehouse,
    UnknownWarehouse,
    InvalidQuantity,
    InsufficientStock,
    ConcurrencyConflict,
    Cancelled,
    Storage,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::InvalidSpec => "invalid_spec",
            ErrorKind::DuplicateSku => "duplicate_sku",
            ErrorKind::UnknownItem => "unknown_item",
            ErrorKind::DuplicateWarehouse => "duplicate_warehouse",
            ErrorKind::UnknownWarehouse => "unknown_warehouse",
            ErrorKind::InvalidQuantity => "invalid_quantity",
            ErrorKind::InsufficientStock => "insufficient_stock",
            ErrorKind::ConcurrencyConflict => "concurrency_conflict",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Storage => "storage",
        }
    }
}

impl core::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned by every `StockLedger` operation.
///
/// All variants are recoverable outcomes. Only `ConcurrencyConflict` is safe to
/// retry as-is; the ledger already retries it internally up to the configured
/// limit before surfacing it.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("invalid item spec: {0}")]
    InvalidSpec(String),

    #[error("duplicate sku: {0}")]
    DuplicateSku(String),

    #[error("unknown item: {0}")]
    UnknownItem(String),

    #[error("duplicate warehouse: {0}")]
    DuplicateWarehouse(String),

    #[error("unknown warehouse: {0}")]
    UnknownWarehouse(String),

    #[error("invalid quantity: {0}")]
    InvalidQuantity(String),

    #[error("insufficient stock (available: {available}, requested: {requested})")]
    InsufficientStock { available: i64, requested: i64 },

    #[error("concurrency conflict: {0}")]
    ConcurrencyConflict(String),

    /// The caller cancelled, or the lock wait timed out, before commit.
    #[error("cancelled before commit: {0}")]
    Cancelled(String),

    #[error("storage failure: {0}")]
    Store(StoreError),
}

impl LedgerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::InvalidSpec(_) => ErrorKind::InvalidSpec,
            LedgerError::DuplicateSku(_) => ErrorKind::DuplicateSku,
            LedgerError::UnknownItem(_) => ErrorKind::UnknownItem,
            LedgerError::DuplicateWarehouse(_) => ErrorKind::DuplicateWarehouse,
            LedgerError::UnknownWarehouse(_) => ErrorKind::UnknownWarehouse,
            LedgerError::InvalidQuantity(_) => ErrorKind::InvalidQuantity,
            LedgerError::InsufficientStock { .. } => ErrorKind::InsufficientStock,
            LedgerError::ConcurrencyConflict(_) => ErrorKind::ConcurrencyConflict,
            LedgerError::Cancelled(_) => ErrorKind::Cancelled,
            LedgerError::Store(_) => ErrorKind::Storage,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, LedgerError::ConcurrencyConflict(_))
    }
}

impl From<DomainError> for LedgerError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::InvalidSpec(msg) => LedgerError::InvalidSpec(msg),
            DomainError::DuplicateSku(sku) => LedgerError::DuplicateSku(sku),
            DomainError::UnknownItem(msg) => LedgerError::UnknownItem(msg),
            DomainError::UnknownWarehouse(msg) => LedgerError::UnknownWarehouse(msg),
            DomainError::InvalidQuantity(msg) => LedgerError::InvalidQuantity(msg),
            DomainError::InsufficientStock {
                available,
                requested,
            } => LedgerError::InsufficientStock {
                available,
                requested,
            },
            DomainError::ConcurrencyConflict(msg) => LedgerError::ConcurrencyConflict(msg),
        }
    }
}

impl From<StoreError> for LedgerError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::DuplicateSku(sku) => LedgerError::DuplicateSku(sku),
            StoreError::ItemNotFound(id) => LedgerError::UnknownItem(id.to_string()),
            StoreError::DuplicateWarehouse(code) => LedgerError::DuplicateWarehouse(code),
            StoreError::WarehouseNotFound(code) => LedgerError::UnknownWarehouse(code),
            StoreError::Concurrency(msg) => LedgerError::ConcurrencyConflict(msg),
            other => LedgerError::Store(other),
        }
    }
}

impl From<LockError> for LedgerError {
    fn from(value: LockError) -> Self {
        match value {
            LockError::Poisoned => LedgerError::Store(StoreError::LockPoisoned),
            other => LedgerError::Cancelled(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockledger_core::ItemId;

    #[test]
    fn store_conflicts_become_retryable_ledger_conflicts() {
        let err = LedgerError::from(StoreError::Concurrency("stale".into()));
        assert_eq!(err.kind(), ErrorKind::ConcurrencyConflict);
        assert!(err.is_retryable());
    }

    #[test]
    fn missing_rows_are_unknown_items() {
        let id = ItemId::new();
        let err = LedgerError::from(StoreError::ItemNotFound(id));
        assert_eq!(err, LedgerError::UnknownItem(id.to_string()));
        assert!(!err.is_retryable());
    }

    #[test]
    fn warehouse_errors_map_to_their_own_kinds() {
        let err = LedgerError::from(StoreError::DuplicateWarehouse("WH1".into()));
        assert_eq!(err.kind(), ErrorKind::DuplicateWarehouse);
        let err = LedgerError::from(DomainError::unknown_warehouse("WH9"));
        assert_eq!(err, LedgerError::UnknownWarehouse("WH9".into()));
        assert_eq!(err.kind().to_string(), "unknown_warehouse");
    }

    #[test]
    fn domain_errors_keep_their_kind() {
        let err = LedgerError::from(DomainError::insufficient_stock(30, 40));
        assert_eq!(err.kind(), ErrorKind::InsufficientStock);
        assert_eq!(err.kind().to_string(), "insufficient_stock");
        assert_eq!(
            LedgerError::from(StoreError::Unavailable("down".into())).kind(),
            ErrorKind::Storage
        );
    }

    #[test]
    fn lock_timeouts_surface_as_cancellation() {
        let err = LedgerError::from(LockError::TimedOut {
            item_id: ItemId::new(),
            timeout: std::time::Duration::from_millis(5),
        });
        assert_eq!(err.kind(), ErrorKind::Cancelled);
        assert_eq!(
            LedgerError::from(LockError::Poisoned),
            LedgerError::Store(StoreError::LockPoisoned)
        );
    }
}
