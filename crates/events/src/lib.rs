//! Inventory events and their publication mechanics.
//!
//! Events are published only after a movement has been committed to the
//! lot store and the ledger; the stores remain the source of truth.

pub mod bus;
pub mod envelope;
pub mod event;
pub mod in_memory_bus;

pub use bus::{EventBus, Subscription};
pub use envelope::EventEnvelope;
pub use event::Event;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
