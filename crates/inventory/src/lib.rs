//! Inventory ledger domain (lots, kardex, allocation).
//!
//! This crate contains the business rules for stock lots and the movement
//! ledger, implemented purely as deterministic domain logic (no IO, no
//! storage, no locking).

pub mod allocation;
pub mod event;
pub mod ledger;
pub mod lot;
pub mod movement;

pub use allocation::{AllocationLine, AllocationPlan, AllocationPolicy, allocate, allocate_many};
pub use event::{InventoryEvent, LotReceived, StockIssued};
pub use ledger::{
    DateRange, LedgerEntry, MovementType, NewLedgerEntry, RunningBalance, earnings,
};
pub use lot::{NewLot, StockLot, allocation_order, sort_for_allocation, total_quantity};
pub use movement::{CommitResult, Movement, MovementKind, MovementState};
