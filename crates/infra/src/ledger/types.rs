use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use stockledger_core::ItemId;
use stockledger_inventory::{
    Category, ReorderSignal, Sku, StockItem, Transaction, TransactionMeta, TransactionType,
};

use crate::cache::StockSnapshot;

/// A caller's request to move stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRequest {
    pub item_id: ItemId,
    pub transaction_type: TransactionType,
    /// Positive magnitude; the direction comes from `transaction_type`.
    pub quantity: i64,
    pub meta: TransactionMeta,
}

impl TransactionRequest {
    pub fn new(item_id: ItemId, transaction_type: TransactionType, quantity: i64) -> Self {
        Self {
            item_id,
            transaction_type,
            quantity,
            meta: TransactionMeta::default(),
        }
    }

    pub fn with_meta(mut self, meta: TransactionMeta) -> Self {
        self.meta = meta;
        self
    }

    /// Every item the request touches, source first.
    pub fn items(&self) -> Vec<ItemId> {
        match self.transaction_type {
            TransactionType::Transfer { destination } => vec![self.item_id, destination],
            _ => vec![self.item_id],
        }
    }
}

/// Current stock of one item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLevel {
    pub item_id: ItemId,
    pub sku: Sku,
    pub current_quantity: i64,
    pub reorder_point: i64,
    pub reorder_quantity: i64,
    pub at_or_below_reorder_point: bool,
    pub version: u64,
}

impl From<StockSnapshot> for StockLevel {
    fn from(s: StockSnapshot) -> Self {
        Self {
            item_id: s.item_id,
            sku: s.sku,
            current_quantity: s.quantity,
            reorder_point: s.reorder_point,
            reorder_quantity: s.reorder_quantity,
            at_or_below_reorder_point: s.quantity <= s.reorder_point,
            version: s.version,
        }
    }
}

impl StockLevel {
    pub(crate) fn of(item: &StockItem) -> Option<Self> {
        StockSnapshot::of(item).map(Self::from)
    }
}

/// Outcome of a successful `apply_transaction`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedTransaction {
    /// Committed rows: one for single-item types, out-leg then in-leg for transfers.
    pub transactions: Vec<Transaction>,
    /// Stock of every touched item after commit, in the same order.
    pub stock: Vec<StockLevel>,
    pub reorder_signals: Vec<ReorderSignal>,
}

impl AppliedTransaction {
    /// The row recorded against the requesting item.
    pub fn primary(&self) -> Option<&Transaction> {
        self.transactions.first()
    }

    pub fn resulting_quantity(&self, item_id: ItemId) -> Option<i64> {
        self.stock
            .iter()
            .find(|s| s.item_id == item_id)
            .map(|s| s.current_quantity)
    }

    pub fn reorder_crossed(&self) -> bool {
        !self.reorder_signals.is_empty()
    }
}

/// Filter for `list_items`. `limit: None` uses the configured default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemFilter {
    pub category: Option<Category>,
    pub warehouse: Option<String>,
    pub active: Option<bool>,
    pub offset: usize,
    pub limit: Option<usize>,
}

impl ItemFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn in_category(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }

    pub fn in_warehouse(mut self, warehouse: impl Into<String>) -> Self {
        self.warehouse = Some(warehouse.into());
        self
    }

    pub fn active(mut self, active: bool) -> Self {
        self.active = Some(active);
        self
    }

    pub fn page(mut self, offset: usize, limit: usize) -> Self {
        self.offset = offset;
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, item: &StockItem) -> bool {
        if !item.is_created() {
            return false;
        }
        if self.category.is_some_and(|c| c != item.category()) {
            return false;
        }
        if let Some(active) = self.active {
            if item.is_active() != active {
                return false;
            }
        }
        match &self.warehouse {
            Some(code) => item
                .location()
                .is_some_and(|l| l.warehouse().as_str().eq_ignore_ascii_case(code)),
            None => true,
        }
    }
}

/// Total stock value per currency, in minor units.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockValuation {
    pub by_currency: BTreeMap<String, i128>,
    /// Items that carried a price and contributed to the totals.
    pub items_valued: usize,
}

impl StockValuation {
    pub fn total(&self, currency: &str) -> i128 {
        self.by_currency.get(currency).copied().unwrap_or(0)
    }

    pub(crate) fn add(&mut self, item: &StockItem) {
        let Some(price) = item.unit_price() else {
            return;
        };
        *self
            .by_currency
            .entry(price.currency().to_string())
            .or_insert(0) += i128::from(item.quantity()) * i128::from(price.amount());
        self.items_valued += 1;
    }
}

/// Headline numbers for monitoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryMetrics {
    /// Every created item, active or not.
    pub total_items: usize,
    /// Active items at or below their reorder point.
    pub low_stock_items: usize,
    pub stock_value: StockValuation,
    /// `low_stock_items` as a share of `total_items`, 0 when there are none.
    pub low_stock_percentage: f64,
}

impl InventoryMetrics {
    pub(crate) fn new(total_items: usize, low_stock_items: usize, stock_value: StockValuation) -> Self {
        let low_stock_percentage = if total_items == 0 {
            0.0
        } else {
            low_stock_items as f64 / total_items as f64 * 100.0
        };
        Self {
            total_items,
            low_stock_items,
            stock_value,
            low_stock_percentage,
        }
    }
}

/// Ordering used for deterministic listings.
pub(crate) fn by_sku(a: &StockItem, b: &StockItem) -> std::cmp::Ordering {
    a.sku()
        .map(Sku::as_str)
        .cmp(&b.sku().map(Sku::as_str))
        .then_with(|| a.id_typed().cmp(&b.id_typed()))
}
