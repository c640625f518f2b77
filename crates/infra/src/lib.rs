//! Infrastructure layer: stores, locking, configuration, external services
//! and the movement coordinator that ties them together.

pub mod config;
pub mod coordinator;
pub mod error;
pub mod external;
pub mod ledger_store;
pub mod locks;
pub mod lot_store;
pub mod movement_records;
pub mod projections;


pub use crate::config::{CoordinatorSettings, InventoryConfig};
pub use crate::coordinator::{CoordinatorError, InMemoryCoordinator, MovementCoordinator};
pub use crate::error::StoreError;
