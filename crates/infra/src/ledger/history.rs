//! Lazy, restartable transaction history.

use std::collections::VecDeque;

use stockledger_core::ItemId;
use stockledger_inventory::{Transaction, TransactionFilter};

use super::error::LedgerError;
use crate::store::LedgerStore;

/// A bounded view over one item's transaction log.
///
/// The upper bound is fixed when the history is created, so iteration is
/// finite even while new transactions are being applied, and every call to
/// `iter()` replays the same rows from the start.
#[derive(Debug)]
pub struct TransactionHistory<'a, S> {
    store: &'a S,
    item_id: ItemId,
    filter: TransactionFilter,
    page_size: usize,
    until_sequence: u64,
}

impl<'a, S: LedgerStore> TransactionHistory<'a, S> {
    pub(crate) fn new(
        store: &'a S,
        item_id: ItemId,
        filter: TransactionFilter,
        page_size: usize,
        until_sequence: u64,
    ) -> Self {
        Self {
            store,
            item_id,
            filter,
            page_size: page_size.max(1),
            until_sequence,
        }
    }

    pub fn item_id(&self) -> ItemId {
        self.item_id
    }

    pub fn filter(&self) -> &TransactionFilter {
        &self.filter
    }

    /// Start a fresh pass over the history.
    pub fn iter(&self) -> TransactionIter<'a, S> {
        TransactionIter {
            store: self.store,
            item_id: self.item_id,
            filter: self.filter.clone(),
            page_size: self.page_size,
            until_sequence: self.until_sequence,
            cursor: 0,
            buffer: VecDeque::new(),
            done: false,
        }
    }

    /// Collect the whole history, stopping at the first storage error.
    pub fn to_vec(&self) -> Result<Vec<Transaction>, LedgerError> {
        self.iter().collect()
    }
}

impl<'a, S: LedgerStore> IntoIterator for &TransactionHistory<'a, S> {
    type Item = Result<Transaction, LedgerError>;
    type IntoIter = TransactionIter<'a, S>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over a `TransactionHistory`, fetching one page at a time.
#[derive(Debug)]
pub struct TransactionIter<'a, S> {
    store: &'a S,
    item_id: ItemId,
    filter: TransactionFilter,
    page_size: usize,
    until_sequence: u64,
    cursor: u64,
    buffer: VecDeque<Transaction>,
    done: bool,
}

impl<S: LedgerStore> TransactionIter<'_, S> {
    fn fill(&mut self) -> Result<(), LedgerError> {
        let page = self
            .store
            .load_transactions(self.item_id, self.cursor, self.page_size)?;

        if page.len() < self.page_size {
            self.done = true;
        }
        if let Some(last) = page.last() {
            self.cursor = last.sequence;
        }

        for txn in page {
            if txn.sequence > self.until_sequence {
                self.done = true;
                break;
            }
            if self.filter.matches(&txn) {
                self.buffer.push_back(txn);
            }
        }
        Ok(())
    }
}

impl<S: LedgerStore> Iterator for TransactionIter<'_, S> {
    type Item = Result<Transaction, LedgerError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(txn) = self.buffer.pop_front() {
                return Some(Ok(txn));
            }
            if self.done {
                return None;
            }
            if let Err(e) = self.fill() {
                self.done = true;
                return Some(Err(e));
            }
        }
    }
}
