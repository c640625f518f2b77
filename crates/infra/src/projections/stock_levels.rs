use std::collections::HashMap;
use std::sync::RwLock;

use serde_json::Value as JsonValue;
use thiserror::Error;

use stockledger_core::{MovementKey, ProductId};
use stockledger_events::EventEnvelope;
use stockledger_inventory::InventoryEvent;

/// Queryable stock read model: current level per product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockLevel {
    pub product_id: ProductId,
    pub on_hand: i64,
    pub received: i64,
    pub issued: i64,
    pub last_movement: Option<MovementKey>,
}

impl StockLevel {
    fn empty(product_id: ProductId) -> Self {
        Self {
            product_id,
            on_hand: 0,
            received: 0,
            issued: 0,
            last_movement: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum StockProjectionError {
    #[error("failed to deserialize inventory event: {0}")]
    Deserialize(String),

    #[error("event product {event} does not match envelope product {envelope}")]
    ProductMismatch { envelope: ProductId, event: ProductId },

    #[error("invalid sequence number 0 for product {0}")]
    ZeroSequence(ProductId),

    #[error("stock counters of product {0} overflow")]
    Overflow(ProductId),

    #[error("projection state poisoned")]
    Poisoned,
}

#[derive(Debug, Default)]
struct State {
    levels: HashMap<ProductId, StockLevel>,
    /// Last applied ledger sequence per product.
    cursors: HashMap<ProductId, u64>,
}

/// Stock level projection.
///
/// Consumes published envelopes (JSON payloads) and keeps a per-product
/// stock level. Envelope sequence numbers come from the ledger, so they grow
/// per product but are not contiguous; anything at or below the cursor is a
/// replay and is ignored. Read models are disposable and rebuildable.
#[derive(Debug, Default)]
pub struct StockLevelsProjection {
    state: RwLock<State>,
}

impl StockLevelsProjection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, product_id: &ProductId) -> Option<StockLevel> {
        self.state.read().ok()?.levels.get(product_id).cloned()
    }

    pub fn list(&self) -> Vec<StockLevel> {
        let mut levels: Vec<StockLevel> = self
            .state
            .read()
            .map(|s| s.levels.values().cloned().collect())
            .unwrap_or_default();
        levels.sort_by_key(|l| l.product_id);
        levels
    }

    /// Apply a published envelope. Idempotent for at-least-once delivery.
    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), StockProjectionError> {
        let product_id = envelope.product_id();
        let seq = envelope.sequence_number();
        if seq == 0 {
            return Err(StockProjectionError::ZeroSequence(product_id));
        }

        let mut state = self.state.write().map_err(|_| StockProjectionError::Poisoned)?;
        let last = state.cursors.get(&product_id).copied().unwrap_or(0);
        if seq <= last {
            // Duplicate or replay; safe to ignore.
            return Ok(());
        }

        let event: InventoryEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| StockProjectionError::Deserialize(e.to_string()))?;
        if event.product_id() != product_id {
            return Err(StockProjectionError::ProductMismatch {
                envelope: product_id,
                event: event.product_id(),
            });
        }

        let level = state
            .levels
            .entry(product_id)
            .or_insert_with(|| StockLevel::empty(product_id));
        // Work on a copy so an overflowing event leaves the level untouched.
        let mut next = level.clone();
        let (counter, quantity) = match &event {
            InventoryEvent::LotReceived(e) => (&mut next.received, e.quantity),
            InventoryEvent::StockIssued(e) => (&mut next.issued, e.quantity),
        };
        let overflow = || StockProjectionError::Overflow(product_id);
        *counter = counter.checked_add(quantity).ok_or_else(overflow)?;
        next.on_hand = next
            .on_hand
            .checked_add(event.quantity_delta())
            .ok_or_else(overflow)?;
        next.last_movement = Some(envelope.movement().clone());
        *level = next;

        // Advance cursor after successful apply.
        state.cursors.insert(product_id, seq);
        Ok(())
    }

    /// Rebuild the read model from scratch by replaying envelopes.
    pub fn rebuild_from_scratch(
        &self,
        envelopes: impl IntoIterator<Item = EventEnvelope<JsonValue>>,
    ) -> Result<(), StockProjectionError> {
        {
            let mut state = self.state.write().map_err(|_| StockProjectionError::Poisoned)?;
            state.levels.clear();
            state.cursors.clear();
        }

        let mut envs: Vec<_> = envelopes.into_iter().collect();
        envs.sort_by_key(|e| e.sequence_number());

        for env in &envs {
            self.apply_envelope(env)?;
        }
        Ok(())
    }
}
