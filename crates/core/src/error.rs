//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures (validation,
/// invariants, conflicts). Infrastructure concerns belong elsewhere.
///
/// Every variant is a recoverable outcome for the caller. Only
/// `ConcurrencyConflict` may be retried without caller correction.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// An item definition was malformed (empty sku/name, bad thresholds).
    #[error("invalid item spec: {0}")]
    InvalidSpec(String),

    /// An item with the same SKU already exists.
    #[error("duplicate sku: {0}")]
    DuplicateSku(String),

    /// The referenced item does not exist or is inactive.
    #[error("unknown item: {0}")]
    UnknownItem(String),

    /// The referenced warehouse is not registered or is inactive.
    #[error("unknown warehouse: {0}")]
    UnknownWarehouse(String),

    /// A quantity was non-positive or otherwise malformed.
    #[error("invalid quantity: {0}")]
    InvalidQuantity(String),

    /// Applying the movement would drive stock below zero.
    #[error("insufficient stock (available: {available}, requested: {requested})")]
    InsufficientStock { available: i64, requested: i64 },

    /// A lost update was detected (e.g. stale version at commit time).
    #[error("concurrency conflict: {0}")]
    ConcurrencyConflict(String),
}

impl DomainError {
    pub fn invalid_spec(msg: impl Into<String>) -> Self {
        Self::InvalidSpec(msg.into())
    }

    pub fn duplicate_sku(sku: impl Into<String>) -> Self {
        Self::DuplicateSku(sku.into())
    }

    pub fn unknown_item(msg: impl Into<String>) -> Self {
        Self::UnknownItem(msg.into())
    }

    pub fn unknown_warehouse(msg: impl Into<String>) -> Self {
        Self::UnknownWarehouse(msg.into())
    }

    pub fn invalid_quantity(msg: impl Into<String>) -> Self {
        Self::InvalidQuantity(msg.into())
    }

    pub fn insufficient_stock(available: i64, requested: i64) -> Self {
        Self::InsufficientStock {
            available,
            requested,
        }
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::ConcurrencyConflict(msg.into())
    }

    /// Whether the failed operation may be retried after re-reading state.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ConcurrencyConflict(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_conflicts_are_retryable() {
        assert!(DomainError::conflict("stale").is_retryable());
        assert!(!DomainError::insufficient_stock(1, 2).is_retryable());
        assert!(!DomainError::invalid_quantity("zero").is_retryable());
        assert!(!DomainError::unknown_item("x").is_retryable());
    }

    #[test]
    fn insufficient_stock_message_carries_amounts() {
        let msg = DomainError::insufficient_stock(30, 40).to_string();
        assert!(msg.contains("available: 30"));
        assert!(msg.contains("requested: 40"));
    }
}
