use std::sync::Arc;

use rust_decimal::Decimal;

use stockledger_core::ProductId;
use stockledger_inventory::{DateRange, LedgerEntry, NewLedgerEntry, RunningBalance, earnings};

use crate::error::StoreError;

/// Append-only movement ledger.
///
/// ## Append Semantics
///
/// `append()`:
/// - validates every entry before touching storage
/// - assigns ids and a ledger-wide `sequence` (last + 1, no gaps)
/// - persists the batch atomically (all or nothing)
///
/// Entries are immutable once appended. Reads return them in append order.
pub trait LedgerStore: Send + Sync {
    fn append(&self, entries: Vec<NewLedgerEntry>) -> Result<Vec<LedgerEntry>, StoreError>;

    fn entries_for_product(&self, product_id: ProductId) -> Result<Vec<LedgerEntry>, StoreError>;

    /// Entries of every product whose movement date falls inside `range`.
    fn entries_between(&self, range: &DateRange) -> Result<Vec<LedgerEntry>, StoreError>;

    /// Quantity and value of `product_id` by replaying its entries.
    fn running_balance(&self, product_id: ProductId) -> Result<RunningBalance, StoreError> {
        Ok(RunningBalance::replay(&self.entries_for_product(product_id)?)?)
    }

    /// Gross margin of the OUT entries inside `range`.
    fn earnings_between(&self, range: &DateRange) -> Result<Decimal, StoreError> {
        Ok(earnings(&self.entries_between(range)?, range)?)
    }
}

impl<S> LedgerStore for Arc<S>
where
    S: LedgerStore + ?Sized,
{
    fn append(&self, entries: Vec<NewLedgerEntry>) -> Result<Vec<LedgerEntry>, StoreError> {
        (**self).append(entries)
    }

    fn entries_for_product(&self, product_id: ProductId) -> Result<Vec<LedgerEntry>, StoreError> {
        (**self).entries_for_product(product_id)
    }

    fn entries_between(&self, range: &DateRange) -> Result<Vec<LedgerEntry>, StoreError> {
        (**self).entries_between(range)
    }
}
