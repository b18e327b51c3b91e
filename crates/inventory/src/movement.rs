//! Transaction types and the quantity arithmetic behind them.

use serde::{Deserialize, Serialize};

use stockledger_core::{DomainError, DomainResult, ItemId};

/// Direction of a manual stock adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdjustDirection {
    Increase,
    Decrease,
}

/// Transaction type as submitted by a caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransactionType {
    /// Goods received into stock.
    Receive,
    /// Goods issued out of stock.
    Issue,
    /// Manual correction in either direction.
    Adjust { direction: AdjustDirection },
    /// Move stock from the submitting item to `destination`.
    Transfer { destination: ItemId },
}

impl TransactionType {
    pub fn kind(&self) -> TransactionKind {
        match self {
            TransactionType::Receive => TransactionKind::Receive,
            TransactionType::Issue => TransactionKind::Issue,
            TransactionType::Adjust { .. } => TransactionKind::Adjust,
            TransactionType::Transfer { .. } => TransactionKind::Transfer,
        }
    }
}

/// Flat transaction kind, used for filtering and reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Receive,
    Issue,
    Adjust,
    Transfer,
}

impl TransactionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TransactionKind::Receive => "receive",
            TransactionKind::Issue => "issue",
            TransactionKind::Adjust => "adjust",
            TransactionKind::Transfer => "transfer",
        }
    }
}

impl core::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The effect of a transaction on one item (one "leg").
///
/// A transfer decomposes into a `TransferOut` leg on the source and a
/// `TransferIn` leg on the destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "leg", rename_all = "snake_case")]
pub enum Movement {
    Receive,
    Issue,
    Adjust { direction: AdjustDirection },
    TransferOut { destination: ItemId },
    TransferIn { source: ItemId },
}

impl Movement {
    pub fn kind(&self) -> TransactionKind {
        match self {
            Movement::Receive => TransactionKind::Receive,
            Movement::Issue => TransactionKind::Issue,
            Movement::Adjust { .. } => TransactionKind::Adjust,
            Movement::TransferOut { .. } | Movement::TransferIn { .. } => TransactionKind::Transfer,
        }
    }

    pub fn increases_stock(&self) -> bool {
        matches!(
            self,
            Movement::Receive
                | Movement::TransferIn { .. }
                | Movement::Adjust {
                    direction: AdjustDirection::Increase
                }
        )
    }

    /// The other item involved, for transfer legs.
    pub fn counterpart(&self) -> Option<ItemId> {
        match self {
            Movement::TransferOut { destination } => Some(*destination),
            Movement::TransferIn { source } => Some(*source),
            _ => None,
        }
    }

    /// Signed effect of moving `quantity` units.
    pub fn delta(&self, quantity: i64) -> i64 {
        if self.increases_stock() { quantity } else { -quantity }
    }
}

/// Validate a transaction magnitude.
pub fn validate_quantity(quantity: i64) -> DomainResult<i64> {
    if quantity <= 0 {
        return Err(DomainError::invalid_quantity(format!(
            "quantity must be positive, got {quantity}"
        )));
    }
    Ok(quantity)
}

/// Compute the stock level after applying `movement` of `quantity` units.
///
/// Pure and total over valid inputs. Never clamps: a result below zero is
/// rejected with `InsufficientStock`, arithmetic overflow with `InvalidQuantity`.
pub fn apply_delta(previous: i64, movement: &Movement, quantity: i64) -> DomainResult<i64> {
    let quantity = validate_quantity(quantity)?;

    let next = if movement.increases_stock() {
        previous.checked_add(quantity)
    } else {
        previous.checked_sub(quantity)
    }
    .ok_or_else(|| DomainError::invalid_quantity("quantity overflows stock level"))?;

    if next < 0 {
        return Err(DomainError::insufficient_stock(previous, quantity));
    }
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const DECREASE: Movement = Movement::Adjust {
        direction: AdjustDirection::Decrease,
    };

    #[test]
    fn receive_and_issue_move_in_opposite_directions() {
        assert_eq!(apply_delta(10, &Movement::Receive, 5).unwrap(), 15);
        assert_eq!(apply_delta(10, &Movement::Issue, 5).unwrap(), 5);
        assert_eq!(apply_delta(10, &DECREASE, 10).unwrap(), 0);
    }

    #[test]
    fn non_positive_quantity_is_invalid() {
        for q in [0, -1, i64::MIN] {
            let err = apply_delta(10, &Movement::Receive, q).unwrap_err();
            assert!(matches!(err, DomainError::InvalidQuantity(_)));
        }
    }

    #[test]
    fn issuing_more_than_available_is_rejected_not_clamped() {
        let err = apply_delta(90, &Movement::Issue, 200).unwrap_err();
        assert_eq!(err, DomainError::insufficient_stock(90, 200));
    }

    #[test]
    fn overflow_is_invalid_quantity() {
        let err = apply_delta(i64::MAX, &Movement::Receive, 1).unwrap_err();
        assert!(matches!(err, DomainError::InvalidQuantity(_)));
    }

    #[test]
    fn transfer_legs_carry_counterparts() {
        let other = ItemId::new();
        let out = Movement::TransferOut { destination: other };
        assert_eq!(out.kind(), TransactionKind::Transfer);
        assert_eq!(out.counterpart(), Some(other));
        assert_eq!(out.delta(4), -4);
        assert_eq!(Movement::TransferIn { source: other }.delta(4), 4);
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 512,
            ..ProptestConfig::default()
        })]

        /// Property: a successful application never yields negative stock and
        /// always changes it by exactly the signed delta.
        #[test]
        fn successful_application_matches_signed_delta(
            previous in 0i64..1_000_000,
            quantity in 1i64..1_000_000,
            increase in any::<bool>(),
        ) {
            let movement = if increase { Movement::Receive } else { Movement::Issue };
            match apply_delta(previous, &movement, quantity) {
                Ok(next) => {
                    prop_assert!(next >= 0);
                    prop_assert_eq!(next, previous + movement.delta(quantity));
                }
                Err(DomainError::InsufficientStock { available, requested }) => {
                    prop_assert!(!increase);
                    prop_assert!(requested > available);
                }
                Err(other) => prop_assert!(false, "unexpected error: {other:?}"),
            }
        }
    }
}
