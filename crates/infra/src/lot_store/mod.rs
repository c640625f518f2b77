//! Lot store boundary.
//!
//! The lot store owns the physical batches of stock. Every quantity change
//! goes through it so no lot can drop below zero, whatever the caller does.

pub mod in_memory;
pub mod r#trait;

pub use in_memory::InMemoryLotStore;
pub use r#trait::LotStore;
