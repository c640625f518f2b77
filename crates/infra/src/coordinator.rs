//! Movement coordinator: the write path for purchases and sales.
//!
//! Every movement runs the same pipeline:
//!
//! ```text
//! Purchase / Sale
//!   ↓
//! 1. Shape validation (no store access)            → Rejected
//!   ↓
//! 2. Reserve the idempotency key                   → replay returns stored result
//!   ↓
//! 3. Catalog check                                 → Rejected
//!   ↓  Validated
//! 4. Lock every product of the movement
//!   ↓
//! 5. Create lots / plan and decrement lots         → Failed (compensated)
//!   ↓  Applied
//! 6. Append ledger entries (commit point)          → Failed (compensated)
//!   ↓  Committed
//! 7. Complete the record, publish inventory events
//! ```
//!
//! Nothing of a movement that stops before step 6 remains visible: created
//! lots are discarded, decremented lots are restored and the reservation is
//! released so the caller may retry. Publication happens only after the
//! commit point and never undoes it.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::Value as JsonValue;
use thiserror::Error;
use uuid::Uuid;

use stockledger_core::{DomainError, LotId, MovementKey, ProductId};
use stockledger_events::{Event, EventBus, EventEnvelope, InMemoryEventBus};
use stockledger_inventory::{
    AllocationPlan, AllocationPolicy, CommitResult, DateRange, InventoryEvent, LedgerEntry,
    Movement, MovementKind, MovementState, NewLedgerEntry, NewLot, RunningBalance, StockLot,
    allocate_many,
};
use stockledger_purchasing::Purchase;
use stockledger_sales::Sale;

use crate::config::CoordinatorSettings;
use crate::error::StoreError;
use crate::external::{CatalogError, InMemoryProductCatalog, ProductCatalog};
use crate::ledger_store::{InMemoryLedgerStore, LedgerStore};
use crate::locks::{LockError, ProductLocks};
use crate::lot_store::{InMemoryLotStore, LotStore};
use crate::movement_records::{
    InMemoryMovementRecordStore, MovementDocument, MovementRecord, MovementRecordStore,
    Reservation,
};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoordinatorError {
    /// The document is malformed or reuses a key for different content.
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: ProductId,
        requested: i64,
        available: i64,
    },

    #[error("not found: {0}")]
    NotFound(String),

    /// Same key in flight, or a product section could not be entered in time.
    #[error("concurrent conflict: {0}")]
    ConcurrentConflict(String),

    #[error("storage failure: {0}")]
    StorageFailure(String),

    /// Product catalog timed out or is down.
    #[error("external service failure: {0}")]
    ExternalService(String),

    #[error("invariant violated: {0}")]
    InvariantViolation(String),
}

impl From<DomainError> for CoordinatorError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) | DomainError::InvalidId(msg) => {
                CoordinatorError::Validation(msg)
            }
            DomainError::InvariantViolation(msg) => CoordinatorError::InvariantViolation(msg),
            DomainError::NotFound(what) => CoordinatorError::NotFound(what),
            DomainError::Conflict(msg) => CoordinatorError::ConcurrentConflict(msg),
            DomainError::InsufficientStock {
                product_id,
                requested,
                available,
            } => CoordinatorError::InsufficientStock {
                product_id,
                requested,
                available,
            },
        }
    }
}

impl From<StoreError> for CoordinatorError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::NotFound(what) => CoordinatorError::NotFound(what),
            StoreError::InsufficientStock {
                product_id,
                requested,
                available,
            } => CoordinatorError::InsufficientStock {
                product_id,
                requested,
                available,
            },
            StoreError::Validation(msg) => CoordinatorError::Validation(msg),
            StoreError::InvariantViolation(msg) => CoordinatorError::InvariantViolation(msg),
            StoreError::Duplicate(msg) => CoordinatorError::ConcurrentConflict(msg),
            StoreError::Unavailable(msg) => CoordinatorError::StorageFailure(msg),
        }
    }
}

impl From<CatalogError> for CoordinatorError {
    fn from(value: CatalogError) -> Self {
        match value {
            CatalogError::NotFound(id) => CoordinatorError::NotFound(format!("product {id}")),
            other => CoordinatorError::ExternalService(other.to_string()),
        }
    }
}

impl From<LockError> for CoordinatorError {
    fn from(value: LockError) -> Self {
        match value {
            LockError::Timeout { .. } => CoordinatorError::ConcurrentConflict(value.to_string()),
            LockError::Poisoned => CoordinatorError::StorageFailure(value.to_string()),
        }
    }
}

/// Lot mutations done by a movement that has not committed yet.
///
/// Dropping the log before [`UndoLog::commit`] undoes them, newest first.
/// This also covers a panic raised while the movement is staged.
struct UndoLog<'a, L: LotStore> {
    lots: &'a L,
    key: &'a MovementKey,
    created: Vec<LotId>,
    decremented: Vec<(LotId, i64)>,
    committed: bool,
}

impl<'a, L: LotStore> UndoLog<'a, L> {
    fn new(lots: &'a L, key: &'a MovementKey) -> Self {
        Self {
            lots,
            key,
            created: Vec::new(),
            decremented: Vec::new(),
            committed: false,
        }
    }

    fn commit(mut self) {
        self.committed = true;
    }
}

impl<L: LotStore> Drop for UndoLog<'_, L> {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        for (lot_id, amount) in self.decremented.drain(..).rev() {
            if let Err(err) = self.lots.restore(lot_id, amount) {
                tracing::error!(movement = %self.key, lot_id = %lot_id, error = %err, "failed to restore lot");
            }
        }
        for lot_id in self.created.drain(..).rev() {
            if let Err(err) = self.lots.discard_lot(lot_id) {
                tracing::error!(movement = %self.key, lot_id = %lot_id, error = %err, "failed to discard lot");
            }
        }
    }
}

/// Idempotency reservation of a movement in progress.
///
/// Released on drop unless the movement reached its commit point, so an
/// abandoned movement (error or panic) leaves its key free for a retry.
struct HeldReservation<'a, R: MovementRecordStore> {
    records: &'a R,
    key: &'a MovementKey,
    held: bool,
}

impl<R: MovementRecordStore> HeldReservation<'_, R> {
    fn keep(mut self) {
        self.held = false;
    }
}

impl<R: MovementRecordStore> Drop for HeldReservation<'_, R> {
    fn drop(&mut self) {
        if !self.held {
            return;
        }
        if let Err(err) = self.records.release(self.key) {
            tracing::error!(movement = %self.key, error = %err, "failed to release movement reservation");
        }
    }
}

/// What a movement wants to append once its lot mutations succeeded.
#[derive(Debug)]
struct Staged {
    lots_created: Vec<LotId>,
    allocations: Vec<AllocationPlan>,
    entries: Vec<NewLedgerEntry>,
    total: Decimal,
}

/// Coordinator wired with the in-memory stores, catalog and bus.
pub type InMemoryCoordinator = MovementCoordinator<
    Arc<InMemoryLotStore>,
    Arc<InMemoryLedgerStore>,
    Arc<InMemoryMovementRecordStore>,
    Arc<InMemoryProductCatalog>,
    Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>,
>;

/// Applies purchases and sales to the lot store and the ledger as single
/// movements.
///
/// ## Generic Parameters
///
/// - `L`: lot store
/// - `G`: ledger store
/// - `R`: movement record (idempotency) store
/// - `C`: product catalog client
/// - `B`: event bus receiving committed inventory events
#[derive(Debug)]
pub struct MovementCoordinator<L, G, R, C, B> {
    lots: L,
    ledger: G,
    records: R,
    catalog: C,
    bus: B,
    locks: ProductLocks,
    settings: CoordinatorSettings,
}

impl InMemoryCoordinator {
    pub fn in_memory(settings: CoordinatorSettings) -> Self {
        Self::new(
            Arc::new(InMemoryLotStore::new()),
            Arc::new(InMemoryLedgerStore::new()),
            Arc::new(InMemoryMovementRecordStore::new()),
            Arc::new(InMemoryProductCatalog::new()),
            Arc::new(InMemoryEventBus::new()),
            settings,
        )
    }
}

impl<L, G, R, C, B> MovementCoordinator<L, G, R, C, B> {
    pub fn new(
        lots: L,
        ledger: G,
        records: R,
        catalog: C,
        bus: B,
        settings: CoordinatorSettings,
    ) -> Self {
        Self {
            lots,
            ledger,
            records,
            catalog,
            bus,
            locks: ProductLocks::new(),
            settings,
        }
    }

    pub fn settings(&self) -> &CoordinatorSettings {
        &self.settings
    }

    pub fn lot_store(&self) -> &L {
        &self.lots
    }

    pub fn ledger_store(&self) -> &G {
        &self.ledger
    }

    pub fn record_store(&self) -> &R {
        &self.records
    }

    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }
}

impl<L, G, R, C, B> MovementCoordinator<L, G, R, C, B>
where
    L: LotStore,
    G: LedgerStore,
    R: MovementRecordStore,
    C: ProductCatalog,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    /// Record a purchase: one lot and one IN entry per line.
    #[tracing::instrument(skip_all, fields(movement = %purchase.movement_key()))]
    pub fn record_purchase(&self, purchase: Purchase) -> Result<CommitResult, CoordinatorError> {
        let key = purchase.movement_key();
        let products: Vec<ProductId> = purchase.lines.iter().map(|l| l.product_id).collect();
        let shape = purchase.validate();

        self.execute(
            Movement::received(key.clone(), MovementKind::Purchase),
            MovementDocument::Purchase(purchase.clone()),
            shape,
            products,
            |undo| self.stage_purchase(&purchase, &key, undo),
        )
    }

    /// Record a sale: every line is allocated across lots, one OUT entry per
    /// lot fragment. Fails with `InsufficientStock` and changes nothing when
    /// any line cannot be covered.
    #[tracing::instrument(skip_all, fields(movement = %sale.movement_key()))]
    pub fn record_sale(&self, sale: Sale) -> Result<CommitResult, CoordinatorError> {
        let key = sale.movement_key();
        let products: Vec<ProductId> = sale.lines.iter().map(|l| l.product_id).collect();
        let shape = sale.validate();

        self.execute(
            Movement::received(key.clone(), MovementKind::Sale),
            MovementDocument::Sale(sale.clone()),
            shape,
            products,
            |undo| self.stage_sale(&sale, &key, undo),
        )
    }

    /// Remaining units of a product across all its lots.
    #[tracing::instrument(skip(self))]
    pub fn query_stock(&self, product_id: ProductId) -> Result<i64, CoordinatorError> {
        let _guard = self.locks.acquire([product_id], self.settings.lock_timeout)?;
        Ok(self.lots.quantity_on_hand(product_id)?)
    }

    /// Ledger entries of a product inside `range`, in append order.
    #[tracing::instrument(skip(self))]
    pub fn query_ledger(
        &self,
        product_id: ProductId,
        range: DateRange,
    ) -> Result<Vec<LedgerEntry>, CoordinatorError> {
        let _guard = self.locks.acquire([product_id], self.settings.lock_timeout)?;
        Ok(self
            .ledger
            .entries_for_product(product_id)?
            .into_iter()
            .filter(|e| range.contains(e.movement_date))
            .collect())
    }

    pub fn running_balance(&self, product_id: ProductId) -> Result<RunningBalance, CoordinatorError> {
        let _guard = self.locks.acquire([product_id], self.settings.lock_timeout)?;
        Ok(self.ledger.running_balance(product_id)?)
    }

    /// Gross margin of every sale inside `range`.
    pub fn earnings_between(&self, range: DateRange) -> Result<Decimal, CoordinatorError> {
        Ok(self.ledger.earnings_between(&range)?)
    }

    /// Lots of a product in allocation order, exhausted ones included.
    pub fn lots(&self, product_id: ProductId) -> Result<Vec<StockLot>, CoordinatorError> {
        let _guard = self.locks.acquire([product_id], self.settings.lock_timeout)?;
        Ok(self.lots.list_lots_by_product(product_id)?)
    }

    pub fn movement(&self, key: &MovementKey) -> Result<Option<MovementRecord>, CoordinatorError> {
        Ok(self.records.get(key)?)
    }

    fn execute<F>(
        &self,
        mut movement: Movement,
        document: MovementDocument,
        shape: Result<(), DomainError>,
        products: Vec<ProductId>,
        stage: F,
    ) -> Result<CommitResult, CoordinatorError>
    where
        F: FnOnce(&mut UndoLog<'_, L>) -> Result<Staged, CoordinatorError>,
    {
        if let Err(err) = shape {
            return Err(Self::reject(&mut movement, err.into()));
        }

        let key = movement.key().clone();
        match self.records.reserve(&key, &document) {
            Ok(Reservation::Reserved) => {}
            Ok(Reservation::AlreadyCommitted(result)) => {
                tracing::info!(movement = %key, "movement already committed; returning stored result");
                return Ok(result);
            }
            Err(err) => {
                let err = CoordinatorError::from(err);
                tracing::warn!(movement = %key, error = %err, "movement reservation refused");
                return Err(err);
            }
        }
        let reservation = HeldReservation {
            records: &self.records,
            key: &key,
            held: true,
        };

        let result = self.commit_reserved(&mut movement, products, stage)?;
        // Committed: the ledger holds the movement, so the key must never be
        // handed out again even if completing the record fails below.
        reservation.keep();

        // A lost record only costs the replay shortcut for this key.
        if let Err(err) = self.records.complete(&key, result.clone()) {
            tracing::error!(movement = %key, error = %err, "failed to complete movement record");
        }

        tracing::info!(
            movement = %key,
            state = %movement.state(),
            entries = result.ledger_entries.len(),
            total = %result.total,
            "movement committed"
        );

        self.publish(&result);
        Ok(result)
    }

    fn commit_reserved<F>(
        &self,
        movement: &mut Movement,
        products: Vec<ProductId>,
        stage: F,
    ) -> Result<CommitResult, CoordinatorError>
    where
        F: FnOnce(&mut UndoLog<'_, L>) -> Result<Staged, CoordinatorError>,
    {
        if let Err(err) = self.check_catalog(&products) {
            return Err(Self::reject(movement, err));
        }
        movement.advance(MovementState::Validated)?;

        let guard = match self.locks.acquire(products, self.settings.lock_timeout) {
            Ok(guard) => guard,
            Err(err) => return Err(Self::fail(movement, err.into())),
        };
        tracing::debug!(movement = %movement.key(), products = ?guard.products(), "product sections entered");

        // Declared after the lock guard so that an abandoned movement is undone
        // while its products are still held.
        let key = movement.key().clone();
        let mut undo = UndoLog::new(&self.lots, &key);
        let staged = match stage(&mut undo) {
            Ok(staged) => staged,
            Err(err) => return Err(Self::fail(movement, err)),
        };
        movement.advance(MovementState::Applied)?;

        let ledger_entries = match self.ledger.append(staged.entries) {
            Ok(entries) => entries,
            Err(err) => return Err(Self::fail(movement, err.into())),
        };
        undo.commit();
        drop(guard);
        movement.advance(MovementState::Committed)?;

        Ok(CommitResult {
            movement: movement.key().clone(),
            kind: movement.kind(),
            lots_created: staged.lots_created,
            allocations: staged.allocations,
            ledger_entries,
            total: staged.total,
            committed_at: Utc::now(),
        })
    }

    fn stage_purchase(
        &self,
        purchase: &Purchase,
        key: &MovementKey,
        undo: &mut UndoLog<'_, L>,
    ) -> Result<Staged, CoordinatorError> {
        let mut on_hand: BTreeMap<ProductId, i64> = BTreeMap::new();
        for line in &purchase.lines {
            let current = match on_hand.get(&line.product_id) {
                Some(quantity) => *quantity,
                None => self.lots.quantity_on_hand(line.product_id)?,
            };
            let next = current.checked_add(line.quantity).ok_or_else(|| {
                CoordinatorError::Validation(format!(
                    "line {}: stock of product {} would exceed the representable quantity",
                    line.line_no, line.product_id
                ))
            })?;
            on_hand.insert(line.product_id, next);
        }

        let mut lots_created = Vec::with_capacity(purchase.lines.len());
        let mut entries = Vec::with_capacity(purchase.lines.len());

        for line in &purchase.lines {
            let lot_id = self.lots.create_lot(NewLot {
                product_id: line.product_id,
                quantity: line.quantity,
                unit_cost: line.unit_price,
                provider_id: purchase.provider_id,
                purchase_date: purchase.purchased_at,
                expiry_date: line.expiry_date,
                source: key.clone(),
            })?;
            undo.created.push(lot_id);
            lots_created.push(lot_id);

            let lot = self.lots.get_lot(lot_id)?;
            entries.push(NewLedgerEntry::inbound(&lot));
        }

        Ok(Staged {
            lots_created,
            allocations: Vec::new(),
            entries,
            total: purchase.total,
        })
    }

    fn stage_sale(
        &self,
        sale: &Sale,
        key: &MovementKey,
        undo: &mut UndoLog<'_, L>,
    ) -> Result<Staged, CoordinatorError> {
        let requests: Vec<(ProductId, i64)> = sale
            .lines
            .iter()
            .map(|l| (l.product_id, l.quantity))
            .collect();

        let mut lots_by_product = BTreeMap::new();
        for product_id in sale.quantities_by_product()?.into_keys() {
            lots_by_product.insert(product_id, self.lots.list_lots_by_product(product_id)?);
        }

        let policy = AllocationPolicy {
            skip_expired_before: self
                .settings
                .skip_expired_lots
                .then(|| sale.sold_at.date_naive()),
        };
        let plans = allocate_many(&requests, &lots_by_product, &policy)?;

        for plan in &plans {
            for line in &plan.lines {
                self.lots.decrement(line.lot_id, line.quantity)?;
                undo.decremented.push((line.lot_id, line.quantity));
            }
        }

        let entries = sale
            .lines
            .iter()
            .zip(&plans)
            .flat_map(|(sale_line, plan)| {
                plan.lines.iter().map(move |l| {
                    NewLedgerEntry::outbound(
                        plan.product_id,
                        l.lot_id,
                        l.quantity,
                        sale_line.unit_price,
                        l.unit_cost,
                        sale.sold_at,
                        key.clone(),
                    )
                })
            })
            .collect();

        Ok(Staged {
            lots_created: Vec::new(),
            allocations: plans,
            entries,
            total: sale.total_amount,
        })
    }

    fn check_catalog(&self, products: &[ProductId]) -> Result<(), CoordinatorError> {
        if !self.settings.require_known_products {
            return Ok(());
        }

        let distinct: BTreeSet<ProductId> = products.iter().copied().collect();
        for product_id in distinct {
            let summary = self
                .catalog
                .fetch_product(product_id, self.settings.catalog_timeout)?;
            if !summary.active {
                return Err(CoordinatorError::Validation(format!(
                    "product {product_id} ({}) is inactive",
                    summary.name
                )));
            }
        }
        Ok(())
    }

    fn publish(&self, result: &CommitResult) {
        for entry in &result.ledger_entries {
            let expiry = match result.kind {
                MovementKind::Purchase => self
                    .lots
                    .get_lot(entry.lot_id)
                    .ok()
                    .and_then(|lot| lot.expiry_date),
                MovementKind::Sale => None,
            };
            let event = InventoryEvent::from_entry(entry, expiry);

            let payload = match serde_json::to_value(&event) {
                Ok(payload) => payload,
                Err(err) => {
                    tracing::warn!(movement = %entry.movement, error = %err, "failed to serialize inventory event");
                    continue;
                }
            };

            let envelope = EventEnvelope::new(
                Uuid::now_v7(),
                entry.product_id,
                entry.movement.clone(),
                event.event_type(),
                entry.sequence,
                payload,
            );
            if let Err(err) = self.bus.publish(envelope) {
                tracing::warn!(movement = %entry.movement, product_id = %entry.product_id, error = ?err, "inventory event publication failed");
            }
        }
    }

    fn reject(movement: &mut Movement, err: CoordinatorError) -> CoordinatorError {
        Self::terminate(movement, MovementState::Rejected, err)
    }

    fn fail(movement: &mut Movement, err: CoordinatorError) -> CoordinatorError {
        Self::terminate(movement, MovementState::Failed, err)
    }

    fn terminate(movement: &mut Movement, state: MovementState, err: CoordinatorError) -> CoordinatorError {
        if let Err(transition) = movement.advance(state) {
            return transition.into();
        }
        tracing::warn!(movement = %movement.key(), state = %state, error = %err, "movement stopped");
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, NaiveDate, TimeZone};
    use rust_decimal_macros::dec;
    use stockledger_core::{ProviderId, PurchaseId, SaleId};
    use stockledger_inventory::MovementType;
    use stockledger_sales::PaymentMethod;

    fn at(m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, m, d, 10, 0, 0).unwrap()
    }

    fn coordinator() -> InMemoryCoordinator {
        InMemoryCoordinator::in_memory(CoordinatorSettings::default())
    }

    fn purchase(product: ProductId, qty: i64, cost: Decimal, expiry: Option<NaiveDate>) -> Purchase {
        let mut p = Purchase::new(PurchaseId::new(), ProviderId::new(), at(1, 1));
        p.add_line(product, qty, cost, expiry);
        p
    }

    fn sale(product: ProductId, qty: i64, price: Decimal) -> Sale {
        let mut s = Sale::new(SaleId::new(), "Rosa", PaymentMethod::Cash, at(3, 1));
        s.add_line(product, qty, price, Decimal::ZERO);
        s
    }

    #[test]
    fn purchase_creates_one_lot_and_one_in_entry_per_line() {
        let c = coordinator();
        let a = c.catalog().register("A");
        let b = c.catalog().register("B");

        let mut p = Purchase::new(PurchaseId::new(), ProviderId::new(), at(1, 1));
        p.add_line(a, 10, dec!(2), None).add_line(b, 4, dec!(5), None);
        let result = c.record_purchase(p).unwrap();

        assert_eq!(result.kind, MovementKind::Purchase);
        assert_eq!(result.lots_created.len(), 2);
        assert_eq!(result.ledger_entries.len(), 2);
        assert!(result.ledger_entries.iter().all(|e| e.movement_type == MovementType::In));
        assert_eq!(result.total, dec!(40));
        assert_eq!(c.query_stock(a).unwrap(), 10);
        assert_eq!(c.query_stock(b).unwrap(), 4);
    }

    #[test]
    fn sale_draws_from_earliest_expiry_first() {
        let c = coordinator();
        let p = c.catalog().register("Amoxicillin");
        c.record_purchase(purchase(p, 10, dec!(3), NaiveDate::from_ymd_opt(2024, 9, 1)))
            .unwrap();
        c.record_purchase(purchase(p, 10, dec!(2), NaiveDate::from_ymd_opt(2024, 6, 1)))
            .unwrap();

        let result = c.record_sale(sale(p, 4, dec!(10))).unwrap();
        let out = &result.ledger_entries;
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].unit_cost, dec!(2));
        assert_eq!(out[0].total_price, dec!(40));
        assert_eq!(result.cost_of_goods(), dec!(8));
        assert_eq!(c.query_stock(p).unwrap(), 16);
    }

    #[test]
    fn shape_errors_reject_before_reserving() {
        let c = coordinator();
        let p = c.catalog().register("A");
        let mut s = sale(p, 1, dec!(1));
        s.customer_name.clear();
        let key = s.movement_key();

        assert!(matches!(c.record_sale(s), Err(CoordinatorError::Validation(_))));
        assert!(c.movement(&key).unwrap().is_none());
    }

    #[test]
    fn unknown_product_is_not_found_and_releases_the_key() {
        let c = coordinator();
        let unknown = ProductId::new();
        let p = purchase(unknown, 1, dec!(1), None);
        let key = p.movement_key();

        assert!(matches!(c.record_purchase(p), Err(CoordinatorError::NotFound(_))));
        assert!(c.movement(&key).unwrap().is_none());
        assert!(c.lot_store().is_empty());
    }

    #[test]
    fn catalog_outage_is_an_external_service_error() {
        let c = coordinator();
        let p = c.catalog().register("A");
        c.catalog().set_unavailable(true);

        let err = c.record_purchase(purchase(p, 1, dec!(1), None)).unwrap_err();
        assert!(matches!(err, CoordinatorError::ExternalService(_)));
    }

    #[test]
    fn catalog_check_can_be_disabled() {
        let c = InMemoryCoordinator::in_memory(CoordinatorSettings {
            require_known_products: false,
            ..CoordinatorSettings::default()
        });
        let p = ProductId::new();
        c.record_purchase(purchase(p, 3, dec!(1), None)).unwrap();
        assert_eq!(c.query_stock(p).unwrap(), 3);
    }

    #[test]
    fn expired_lots_are_skipped_when_configured() {
        let c = InMemoryCoordinator::in_memory(CoordinatorSettings {
            skip_expired_lots: true,
            ..CoordinatorSettings::default()
        });
        let p = c.catalog().register("Insulin");
        // Expired before the sale date (2024-03-01).
        c.record_purchase(purchase(p, 5, dec!(1), NaiveDate::from_ymd_opt(2024, 2, 1)))
            .unwrap();
        c.record_purchase(purchase(p, 5, dec!(2), NaiveDate::from_ymd_opt(2024, 12, 1)))
            .unwrap();

        let err = c.record_sale(sale(p, 6, dec!(9))).unwrap_err();
        assert_eq!(
            err,
            CoordinatorError::InsufficientStock {
                product_id: p,
                requested: 6,
                available: 5
            }
        );

        let ok = c.record_sale(sale(p, 5, dec!(9))).unwrap();
        assert_eq!(ok.ledger_entries[0].unit_cost, dec!(2));
    }

    #[test]
    fn committed_movements_are_published_in_ledger_order() {
        let c = coordinator();
        let sub = c.bus().subscribe();
        let p = c.catalog().register("A");

        c.record_purchase(purchase(p, 10, dec!(1), None)).unwrap();
        c.record_sale(sale(p, 3, dec!(2))).unwrap();

        let envelopes = sub.drain();
        assert_eq!(envelopes.len(), 2);
        assert_eq!(envelopes[0].event_type(), "inventory.lot.received");
        assert_eq!(envelopes[1].event_type(), "inventory.stock.issued");
        assert!(envelopes[0].sequence_number() < envelopes[1].sequence_number());

        let issued: InventoryEvent = serde_json::from_value(envelopes[1].payload().clone()).unwrap();
        assert_eq!(issued.quantity_delta(), -3);
    }

    #[test]
    fn failed_sale_publishes_nothing() {
        let c = coordinator();
        let p = c.catalog().register("A");
        c.record_purchase(purchase(p, 1, dec!(1), None)).unwrap();

        let sub = c.bus().subscribe();
        assert!(c.record_sale(sale(p, 2, dec!(1))).is_err());
        assert!(sub.try_recv().is_err());
    }

    #[test]
    fn error_mapping() {
        let p = ProductId::new();
        assert_eq!(
            CoordinatorError::from(StoreError::Duplicate("x".into())),
            CoordinatorError::ConcurrentConflict("x".into())
        );
        assert_eq!(
            CoordinatorError::from(StoreError::Unavailable("x".into())),
            CoordinatorError::StorageFailure("x".into())
        );
        assert_eq!(
            CoordinatorError::from(StoreError::from(DomainError::invariant("x"))),
            CoordinatorError::InvariantViolation("x".into())
        );
        assert!(matches!(
            CoordinatorError::from(CatalogError::Timeout(std::time::Duration::from_millis(5))),
            CoordinatorError::ExternalService(_)
        ));
        assert!(matches!(
            CoordinatorError::from(LockError::Timeout {
                products: vec![p],
                waited: std::time::Duration::ZERO
            }),
            CoordinatorError::ConcurrentConflict(_)
        ));
        assert_eq!(
            CoordinatorError::from(DomainError::insufficient_stock(p, 3, 1)),
            CoordinatorError::InsufficientStock {
                product_id: p,
                requested: 3,
                available: 1
            }
        );
    }
}
