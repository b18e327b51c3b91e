//! Reorder-point evaluation.

use serde::{Deserialize, Serialize};

use stockledger_core::{DomainError, DomainResult, ItemId, ValueObject};

use crate::spec::Sku;

/// Reorder thresholds for an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "ReorderPolicyRecord")]
pub struct ReorderPolicy {
    reorder_point: i64,
    reorder_quantity: i64,
}

#[derive(Deserialize)]
struct ReorderPolicyRecord {
    reorder_point: i64,
    reorder_quantity: i64,
}

impl TryFrom<ReorderPolicyRecord> for ReorderPolicy {
    type Error = DomainError;

    fn try_from(raw: ReorderPolicyRecord) -> Result<Self, Self::Error> {
        Self::new(raw.reorder_point, raw.reorder_quantity)
    }
}

impl ReorderPolicy {
    pub fn new(reorder_point: i64, reorder_quantity: i64) -> DomainResult<Self> {
        if reorder_point < 0 {
            return Err(DomainError::invalid_spec("reorder_point cannot be negative"));
        }
        if reorder_quantity <= 0 {
            return Err(DomainError::invalid_spec("reorder_quantity must be positive"));
        }
        Ok(Self {
            reorder_point,
            reorder_quantity,
        })
    }

    pub fn reorder_point(&self) -> i64 {
        self.reorder_point
    }

    pub fn reorder_quantity(&self) -> i64 {
        self.reorder_quantity
    }

    /// Whether `quantity` sits at or below the reorder point.
    pub fn is_at_or_below(&self, quantity: i64) -> bool {
        quantity <= self.reorder_point
    }

    /// Whether moving from `before` to `after` crosses the threshold downward.
    ///
    /// Fires only on the transition from `>= reorder_point` to `< reorder_point`;
    /// further decreases while already below do not count.
    pub fn crossed_below(&self, before: i64, after: i64) -> bool {
        before >= self.reorder_point && after < self.reorder_point
    }
}

impl Default for ReorderPolicy {
    /// Never signals: zero reorder point, smallest valid reorder quantity.
    fn default() -> Self {
        Self {
            reorder_point: 0,
            reorder_quantity: 1,
        }
    }
}

impl ValueObject for ReorderPolicy {}

/// Signal that an item has dropped below its reorder point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReorderSignal {
    pub item_id: ItemId,
    pub sku: Sku,
    pub current_quantity: i64,
    pub reorder_point: i64,
    pub reorder_quantity: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crossing_fires_only_on_downward_transition() {
        let policy = ReorderPolicy::new(100, 500).unwrap();

        assert!(policy.crossed_below(120, 90));
        assert!(policy.crossed_below(100, 99));
        assert!(!policy.crossed_below(90, 85));
        assert!(!policy.crossed_below(150, 100));
        assert!(!policy.crossed_below(90, 150));
    }

    #[test]
    fn at_or_below_includes_the_threshold() {
        let policy = ReorderPolicy::new(20, 10).unwrap();
        assert!(policy.is_at_or_below(20));
        assert!(policy.is_at_or_below(0));
        assert!(!policy.is_at_or_below(21));
    }

    #[test]
    fn zero_reorder_point_never_crosses() {
        let policy = ReorderPolicy::new(0, 1).unwrap();
        assert!(!policy.crossed_below(5, 0));
    }
}
