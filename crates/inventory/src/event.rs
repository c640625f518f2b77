use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockledger_core::{LotId, MovementKey, ProductId};
use stockledger_events::Event;

use crate::ledger::{LedgerEntry, MovementType};

/// Event: LotReceived (a purchase line created a lot).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LotReceived {
    pub product_id: ProductId,
    pub lot_id: LotId,
    pub quantity: i64,
    pub unit_cost: Decimal,
    pub expiry_date: Option<NaiveDate>,
    pub movement: MovementKey,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StockIssued (a sale took units from a lot).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockIssued {
    pub product_id: ProductId,
    pub lot_id: LotId,
    pub quantity: i64,
    pub unit_price: Decimal,
    pub unit_cost: Decimal,
    pub movement: MovementKey,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InventoryEvent {
    LotReceived(LotReceived),
    StockIssued(StockIssued),
}

impl InventoryEvent {
    /// Mirror one committed ledger entry as an event.
    pub fn from_entry(entry: &LedgerEntry, expiry_date: Option<NaiveDate>) -> Self {
        match entry.movement_type {
            MovementType::In => InventoryEvent::LotReceived(LotReceived {
                product_id: entry.product_id,
                lot_id: entry.lot_id,
                quantity: entry.quantity,
                unit_cost: entry.unit_cost,
                expiry_date,
                movement: entry.movement.clone(),
                occurred_at: entry.movement_date,
            }),
            MovementType::Out => InventoryEvent::StockIssued(StockIssued {
                product_id: entry.product_id,
                lot_id: entry.lot_id,
                quantity: entry.quantity,
                unit_price: entry.unit_price,
                unit_cost: entry.unit_cost,
                movement: entry.movement.clone(),
                occurred_at: entry.movement_date,
            }),
        }
    }

    pub fn product_id(&self) -> ProductId {
        match self {
            InventoryEvent::LotReceived(e) => e.product_id,
            InventoryEvent::StockIssued(e) => e.product_id,
        }
    }

    /// Stock delta carried by the event.
    pub fn quantity_delta(&self) -> i64 {
        match self {
            InventoryEvent::LotReceived(e) => e.quantity,
            InventoryEvent::StockIssued(e) => -e.quantity,
        }
    }
}

impl Event for InventoryEvent {
    fn event_type(&self) -> &'static str {
        match self {
            InventoryEvent::LotReceived(_) => "inventory.lot.received",
            InventoryEvent::StockIssued(_) => "inventory.stock.issued",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            InventoryEvent::LotReceived(e) => e.occurred_at,
            InventoryEvent::StockIssued(e) => e.occurred_at,
        }
    }
}
