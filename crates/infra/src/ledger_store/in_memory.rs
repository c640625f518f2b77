use std::sync::RwLock;

use stockledger_core::{LedgerEntryId, ProductId};
use stockledger_inventory::{DateRange, LedgerEntry, NewLedgerEntry};

use super::r#trait::LedgerStore;
use crate::error::StoreError;

/// In-memory append-only ledger.
///
/// Intended for tests/dev. Entries live in one vector in sequence order;
/// per-product reads scan it.
#[derive(Debug, Default)]
pub struct InMemoryLedgerStore {
    entries: RwLock<Vec<LedgerEntry>>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every entry in append order.
    pub fn all(&self) -> Result<Vec<LedgerEntry>, StoreError> {
        let entries = self.entries.read().map_err(|_| StoreError::poisoned("ledger"))?;
        Ok(entries.clone())
    }
}

impl LedgerStore for InMemoryLedgerStore {
    fn append(&self, entries: Vec<NewLedgerEntry>) -> Result<Vec<LedgerEntry>, StoreError> {
        if entries.is_empty() {
            return Ok(vec![]);
        }

        // Validate the whole batch first so a bad entry leaves nothing behind.
        for (idx, e) in entries.iter().enumerate() {
            e.validate().map_err(|err| {
                StoreError::Validation(format!("ledger entry at index {idx}: {err}"))
            })?;
        }

        let mut ledger = self.entries.write().map_err(|_| StoreError::poisoned("ledger"))?;
        let mut next = ledger.last().map(|e| e.sequence).unwrap_or(0);

        let committed: Vec<LedgerEntry> = entries
            .into_iter()
            .map(|e| {
                next += 1;
                e.into_entry(LedgerEntryId::new(), next)
            })
            .collect();

        ledger.extend(committed.iter().cloned());
        Ok(committed)
    }

    fn entries_for_product(&self, product_id: ProductId) -> Result<Vec<LedgerEntry>, StoreError> {
        let ledger = self.entries.read().map_err(|_| StoreError::poisoned("ledger"))?;
        Ok(ledger
            .iter()
            .filter(|e| e.product_id == product_id)
            .cloned()
            .collect())
    }

    fn entries_between(&self, range: &DateRange) -> Result<Vec<LedgerEntry>, StoreError> {
        let ledger = self.entries.read().map_err(|_| StoreError::poisoned("ledger"))?;
        Ok(ledger
            .iter()
            .filter(|e| range.contains(e.movement_date))
            .cloned()
            .collect())
    }
}
