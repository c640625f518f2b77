use std::sync::Arc;

use stockledger_core::{LotId, ProductId};
use stockledger_inventory::{NewLot, StockLot, total_quantity};

use crate::error::StoreError;

/// Storage of stock lots.
///
/// Implementations must:
/// - assign a fresh id and a strictly increasing `sequence` on creation
/// - make `decrement` atomic per lot and reject amounts above the remaining
///   quantity with `InsufficientStock`
/// - return lots of a product in allocation order
///
/// `restore` and `discard_lot` exist only to undo a movement that failed
/// before its commit point; nothing else should call them.
pub trait LotStore: Send + Sync {
    fn create_lot(&self, lot: NewLot) -> Result<LotId, StoreError>;

    fn decrement(&self, lot_id: LotId, amount: i64) -> Result<(), StoreError>;

    fn get_lot(&self, lot_id: LotId) -> Result<StockLot, StoreError>;

    /// Lots of `product_id`, earliest expiry first (no expiry last), then
    /// purchase date, then sequence. Exhausted lots are included.
    fn list_lots_by_product(&self, product_id: ProductId) -> Result<Vec<StockLot>, StoreError>;

    fn restore(&self, lot_id: LotId, amount: i64) -> Result<(), StoreError>;

    fn discard_lot(&self, lot_id: LotId) -> Result<(), StoreError>;

    /// Remaining units across every lot of `product_id`.
    fn quantity_on_hand(&self, product_id: ProductId) -> Result<i64, StoreError> {
        Ok(total_quantity(&self.list_lots_by_product(product_id)?)?)
    }
}

impl<S> LotStore for Arc<S>
where
    S: LotStore + ?Sized,
{
    fn create_lot(&self, lot: NewLot) -> Result<LotId, StoreError> {
        (**self).create_lot(lot)
    }

    fn decrement(&self, lot_id: LotId, amount: i64) -> Result<(), StoreError> {
        (**self).decrement(lot_id, amount)
    }

    fn get_lot(&self, lot_id: LotId) -> Result<StockLot, StoreError> {
        (**self).get_lot(lot_id)
    }

    fn list_lots_by_product(&self, product_id: ProductId) -> Result<Vec<StockLot>, StoreError> {
        (**self).list_lots_by_product(product_id)
    }

    fn restore(&self, lot_id: LotId, amount: i64) -> Result<(), StoreError> {
        (**self).restore(lot_id, amount)
    }

    fn discard_lot(&self, lot_id: LotId) -> Result<(), StoreError> {
        (**self).discard_lot(lot_id)
    }
}
