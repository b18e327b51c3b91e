use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockledger_core::ItemId;
use stockledger_events::Event;
use stockledger_inventory::{ReorderSignal, Sku, TransactionKind};

use super::error::ErrorKind;

/// Facts the ledger publishes to its event sink.
///
/// Published only after the corresponding commit (or rejection) is final.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LedgerEvent {
    ItemCreated {
        item_id: ItemId,
        sku: Sku,
        occurred_at: DateTime<Utc>,
    },
    ItemUpdated {
        item_id: ItemId,
        occurred_at: DateTime<Utc>,
    },
    ItemDeactivated {
        item_id: ItemId,
        occurred_at: DateTime<Utc>,
    },
    TransactionApplied {
        item_id: ItemId,
        kind: TransactionKind,
        quantity: i64,
        resulting_quantity: i64,
        destination: Option<ItemId>,
        destination_quantity: Option<i64>,
        reorder_crossed: bool,
        occurred_at: DateTime<Utc>,
    },
    TransactionRejected {
        item_id: ItemId,
        kind: TransactionKind,
        error: ErrorKind,
        occurred_at: DateTime<Utc>,
    },
    ReorderPointCrossed {
        signal: ReorderSignal,
        occurred_at: DateTime<Utc>,
    },
}

impl LedgerEvent {
    /// The item this event is primarily about.
    pub fn item_id(&self) -> ItemId {
        match self {
            LedgerEvent::ItemCreated { item_id, .. }
            | LedgerEvent::ItemUpdated { item_id, .. }
            | LedgerEvent::ItemDeactivated { item_id, .. }
            | LedgerEvent::TransactionApplied { item_id, .. }
            | LedgerEvent::TransactionRejected { item_id, .. } => *item_id,
            LedgerEvent::ReorderPointCrossed { signal, .. } => signal.item_id,
        }
    }
}

impl Event for LedgerEvent {
    fn event_type(&self) -> &'static str {
        match self {
            LedgerEvent::ItemCreated { .. } => "stock.item.created",
            LedgerEvent::ItemUpdated { .. } => "stock.item.updated",
            LedgerEvent::ItemDeactivated { .. } => "stock.item.deactivated",
            LedgerEvent::TransactionApplied { .. } => "stock.transaction.applied",
            LedgerEvent::TransactionRejected { .. } => "stock.transaction.rejected",
            LedgerEvent::ReorderPointCrossed { .. } => "stock.reorder_point.crossed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            LedgerEvent::ItemCreated { occurred_at, .. }
            | LedgerEvent::ItemUpdated { occurred_at, .. }
            | LedgerEvent::ItemDeactivated { occurred_at, .. }
            | LedgerEvent::TransactionApplied { occurred_at, .. }
            | LedgerEvent::TransactionRejected { occurred_at, .. }
            | LedgerEvent::ReorderPointCrossed { occurred_at, .. } => *occurred_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejected_event_serializes_with_snake_case_tags() {
        let event = LedgerEvent::TransactionRejected {
            item_id: ItemId::new(),
            kind: TransactionKind::Issue,
            error: ErrorKind::InsufficientStock,
            occurred_at: Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "transaction_rejected");
        assert_eq!(json["kind"], "issue");
        assert_eq!(json["error"], "insufficient_stock");
        assert_eq!(event.event_type(), "stock.transaction.rejected");
    }
}
