//! Sales documents.
//!
//! Pure description and shape validation of a sale (no IO, no storage). Stock
//! is drawn from lots by the allocation engine once the sale is accepted.

pub mod sale;

pub use sale::{PaymentMethod, Sale, SaleLine};
