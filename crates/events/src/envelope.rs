use serde::{Deserialize, Serialize};
use uuid::Uuid;

use stockledger_core::{MovementKey, ProductId};

/// Envelope for a published inventory event.
///
/// - `product_id` identifies the stream the event belongs to.
/// - `movement` is the idempotency key of the movement that produced it, so
///   consumers can correlate every event of one purchase or sale.
/// - `sequence_number` is the ledger sequence of the entry the event
///   mirrors; it increases monotonically per product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope<E> {
    event_id: Uuid,
    product_id: ProductId,
    movement: MovementKey,
    event_type: String,
    sequence_number: u64,
    payload: E,
}

impl<E> EventEnvelope<E> {
    pub fn new(
        event_id: Uuid,
        product_id: ProductId,
        movement: MovementKey,
        event_type: impl Into<String>,
        sequence_number: u64,
        payload: E,
    ) -> Self {
        Self {
            event_id,
            product_id,
            movement,
            event_type: event_type.into(),
            sequence_number,
            payload,
        }
    }

    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    pub fn product_id(&self) -> ProductId {
        self.product_id
    }

    pub fn movement(&self) -> &MovementKey {
        &self.movement
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn sequence_number(&self) -> u64 {
        self.sequence_number
    }

    pub fn payload(&self) -> &E {
        &self.payload
    }

    pub fn into_payload(self) -> E {
        self.payload
    }
}
