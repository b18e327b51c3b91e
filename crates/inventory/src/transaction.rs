//! Applied transaction records (the append-only ledger rows).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockledger_core::{DomainError, DomainResult, ItemId, TransactionId, TransferId};

use crate::item::StockMoved;
use crate::movement::{Movement, TransactionKind};
use crate::spec::normalize_optional;

/// Actor recorded when a caller does not name one.
pub const SYSTEM_ACTOR: &str = "system";

/// Caller-supplied bookkeeping attached to a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "TransactionMetaRecord")]
pub struct TransactionMeta {
    reference: Option<String>,
    created_by: String,
    notes: Option<String>,
}

#[derive(Deserialize)]
struct TransactionMetaRecord {
    reference: Option<String>,
    created_by: String,
    notes: Option<String>,
}

impl TryFrom<TransactionMetaRecord> for TransactionMeta {
    type Error = DomainError;

    fn try_from(raw: TransactionMetaRecord) -> Result<Self, Self::Error> {
        let mut meta = Self::new(raw.created_by)?;
        meta.reference = raw.reference.and_then(normalize_optional);
        meta.notes = raw.notes.and_then(normalize_optional);
        Ok(meta)
    }
}

impl TransactionMeta {
    pub fn new(created_by: impl AsRef<str>) -> DomainResult<Self> {
        let created_by = created_by.as_ref().trim();
        if created_by.is_empty() {
            return Err(DomainError::invalid_spec("created_by cannot be empty"));
        }
        Ok(Self {
            reference: None,
            created_by: created_by.to_string(),
            notes: None,
        })
    }

    /// External document id (PO number, SO number, ...).
    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = normalize_optional(reference.into());
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = normalize_optional(notes.into());
        self
    }

    pub fn reference(&self) -> Option<&str> {
        self.reference.as_deref()
    }

    pub fn created_by(&self) -> &str {
        &self.created_by
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }
}

impl Default for TransactionMeta {
    fn default() -> Self {
        Self {
            reference: None,
            created_by: SYSTEM_ACTOR.to_string(),
            notes: None,
        }
    }
}

/// One applied, immutable ledger row.
///
/// `sequence` is assigned by the store at commit and is 0 until then.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub sequence: u64,
    pub item_id: ItemId,
    pub movement: Movement,
    pub quantity: i64,
    pub delta: i64,
    pub resulting_quantity: i64,
    pub transfer_id: Option<TransferId>,
    pub reference: Option<String>,
    pub created_by: String,
    pub notes: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub applied: bool,
}

impl Transaction {
    /// Build the ledger row for a decided `StockMoved` event.
    pub fn from_stock_moved(
        event: &StockMoved,
        meta: &TransactionMeta,
        transfer_id: Option<TransferId>,
    ) -> Self {
        Self {
            id: TransactionId::new(),
            sequence: 0,
            item_id: event.item_id,
            movement: event.movement,
            quantity: event.quantity,
            delta: event.delta,
            resulting_quantity: event.resulting_quantity,
            transfer_id,
            reference: meta.reference.clone(),
            created_by: meta.created_by.clone(),
            notes: meta.notes.clone(),
            timestamp: event.occurred_at,
            applied: true,
        }
    }

    pub fn kind(&self) -> TransactionKind {
        self.movement.kind()
    }

    pub fn counterpart(&self) -> Option<ItemId> {
        self.movement.counterpart()
    }
}

/// Optional filters for a transaction history query.
///
/// `from` is inclusive, `to` exclusive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionFilter {
    pub kind: Option<TransactionKind>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl TransactionFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn of_kind(mut self, kind: TransactionKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn from(mut self, from: DateTime<Utc>) -> Self {
        self.from = Some(from);
        self
    }

    pub fn until(mut self, to: DateTime<Utc>) -> Self {
        self.to = Some(to);
        self
    }

    pub fn matches(&self, txn: &Transaction) -> bool {
        if self.kind.is_some_and(|k| k != txn.kind()) {
            return false;
        }
        if self.from.is_some_and(|from| txn.timestamp < from) {
            return false;
        }
        if self.to.is_some_and(|to| txn.timestamp >= to) {
            return false;
        }
        true
    }
}
