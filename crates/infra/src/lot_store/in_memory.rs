use std::collections::HashMap;
use std::sync::RwLock;

use stockledger_core::{LotId, ProductId};
use stockledger_inventory::{NewLot, StockLot, sort_for_allocation};

use super::r#trait::LotStore;
use crate::error::StoreError;

#[derive(Debug, Default)]
struct LotTable {
    lots: HashMap<LotId, StockLot>,
    by_product: HashMap<ProductId, Vec<LotId>>,
    last_sequence: u64,
}

/// In-memory lot store.
///
/// Intended for tests/dev. One `RwLock` guards the whole table, which makes
/// every single-lot operation atomic.
#[derive(Debug, Default)]
pub struct InMemoryLotStore {
    table: RwLock<LotTable>,
}

impl InMemoryLotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every lot ever created and not discarded, across products.
    pub fn len(&self) -> usize {
        self.table.read().map(|t| t.lots.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl LotStore for InMemoryLotStore {
    fn create_lot(&self, lot: NewLot) -> Result<LotId, StoreError> {
        lot.validate()?;

        let mut table = self.table.write().map_err(|_| StoreError::poisoned("lot table"))?;
        table.last_sequence += 1;
        let sequence = table.last_sequence;

        let id = LotId::new();
        let product_id = lot.product_id;
        table.lots.insert(id, lot.into_lot(id, sequence));
        table.by_product.entry(product_id).or_default().push(id);

        Ok(id)
    }

    fn decrement(&self, lot_id: LotId, amount: i64) -> Result<(), StoreError> {
        let mut table = self.table.write().map_err(|_| StoreError::poisoned("lot table"))?;
        let lot = table
            .lots
            .get_mut(&lot_id)
            .ok_or_else(|| StoreError::NotFound(format!("lot {lot_id}")))?;
        lot.decrement(amount)?;
        Ok(())
    }

    fn get_lot(&self, lot_id: LotId) -> Result<StockLot, StoreError> {
        let table = self.table.read().map_err(|_| StoreError::poisoned("lot table"))?;
        table
            .lots
            .get(&lot_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("lot {lot_id}")))
    }

    fn list_lots_by_product(&self, product_id: ProductId) -> Result<Vec<StockLot>, StoreError> {
        let table = self.table.read().map_err(|_| StoreError::poisoned("lot table"))?;
        let mut lots: Vec<StockLot> = table
            .by_product
            .get(&product_id)
            .map(|ids| ids.iter().filter_map(|id| table.lots.get(id).cloned()).collect())
            .unwrap_or_default();
        sort_for_allocation(&mut lots);
        Ok(lots)
    }

    fn restore(&self, lot_id: LotId, amount: i64) -> Result<(), StoreError> {
        let mut table = self.table.write().map_err(|_| StoreError::poisoned("lot table"))?;
        let lot = table
            .lots
            .get_mut(&lot_id)
            .ok_or_else(|| StoreError::NotFound(format!("lot {lot_id}")))?;
        lot.restore(amount)?;
        Ok(())
    }

    fn discard_lot(&self, lot_id: LotId) -> Result<(), StoreError> {
        let mut table = self.table.write().map_err(|_| StoreError::poisoned("lot table"))?;
        let lot = table
            .lots
            .remove(&lot_id)
            .ok_or_else(|| StoreError::NotFound(format!("lot {lot_id}")))?;
        if let Some(ids) = table.by_product.get_mut(&lot.product_id) {
            ids.retain(|id| *id != lot_id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone, Utc};
    use rust_decimal_macros::dec;
    use stockledger_core::{MovementKey, ProviderId};

    fn new_lot(product_id: ProductId, qty: i64, expiry: Option<NaiveDate>) -> NewLot {
        NewLot {
            product_id,
            quantity: qty,
            unit_cost: dec!(2),
            provider_id: ProviderId::new(),
            purchase_date: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            expiry_date: expiry,
            source: MovementKey::new("purchase:test").unwrap(),
        }
    }

    #[test]
    fn create_assigns_increasing_sequences() {
        let store = InMemoryLotStore::new();
        let product = ProductId::new();
        let a = store.create_lot(new_lot(product, 5, None)).unwrap();
        let b = store.create_lot(new_lot(product, 5, None)).unwrap();
        assert!(store.get_lot(a).unwrap().sequence < store.get_lot(b).unwrap().sequence);
    }

    #[test]
    fn create_rejects_invalid_lots() {
        let store = InMemoryLotStore::new();
        let err = store.create_lot(new_lot(ProductId::new(), 0, None)).unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
        assert!(store.is_empty());
    }

    #[test]
    fn decrement_past_zero_fails_and_leaves_lot_intact() {
        let store = InMemoryLotStore::new();
        let id = store.create_lot(new_lot(ProductId::new(), 5, None)).unwrap();

        let err = store.decrement(id, 6).unwrap_err();
        assert!(matches!(
            err,
            StoreError::InsufficientStock { requested: 6, available: 5, .. }
        ));
        assert_eq!(store.get_lot(id).unwrap().quantity, 5);

        store.decrement(id, 5).unwrap();
        assert_eq!(store.get_lot(id).unwrap().quantity, 0);
        assert!(matches!(store.decrement(id, 0), Err(StoreError::Validation(_))));
    }

    #[test]
    fn unknown_lot_is_not_found() {
        let store = InMemoryLotStore::new();
        assert!(matches!(store.get_lot(LotId::new()), Err(StoreError::NotFound(_))));
        assert!(matches!(store.decrement(LotId::new(), 1), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn listing_follows_allocation_order() {
        let store = InMemoryLotStore::new();
        let product = ProductId::new();
        let late = NaiveDate::from_ymd_opt(2024, 6, 1);
        let early = NaiveDate::from_ymd_opt(2024, 3, 1);

        let none = store.create_lot(new_lot(product, 1, None)).unwrap();
        let l = store.create_lot(new_lot(product, 1, late)).unwrap();
        let e = store.create_lot(new_lot(product, 1, early)).unwrap();
        store.create_lot(new_lot(ProductId::new(), 1, None)).unwrap();

        let ids: Vec<LotId> = store
            .list_lots_by_product(product)
            .unwrap()
            .into_iter()
            .map(|lot| lot.id)
            .collect();
        assert_eq!(ids, vec![e, l, none]);
        assert_eq!(store.quantity_on_hand(product).unwrap(), 3);
    }

    #[test]
    fn compensation_restores_and_discards() {
        let store = InMemoryLotStore::new();
        let product = ProductId::new();
        let id = store.create_lot(new_lot(product, 5, None)).unwrap();

        store.decrement(id, 3).unwrap();
        store.restore(id, 3).unwrap();
        assert_eq!(store.get_lot(id).unwrap().quantity, 5);

        store.discard_lot(id).unwrap();
        assert!(store.list_lots_by_product(product).unwrap().is_empty());
        assert!(matches!(store.discard_lot(id), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn on_hand_overflow_is_an_error_not_a_panic() {
        let store = InMemoryLotStore::new();
        let product = ProductId::new();
        store.create_lot(new_lot(product, i64::MAX, None)).unwrap();
        store.create_lot(new_lot(product, i64::MAX, None)).unwrap();

        assert!(matches!(
            store.quantity_on_hand(product),
            Err(StoreError::InvariantViolation(_))
        ));
    }
}
