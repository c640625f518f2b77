//! Purchasing documents.
//!
//! A purchase arrives fully formed from the purchase request handler; this
//! crate only describes it and checks its shape. Turning it into lots and
//! ledger entries is the movement coordinator's job.

pub mod purchase;

pub use purchase::{Purchase, PurchaseLine};
