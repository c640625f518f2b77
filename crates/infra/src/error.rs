use thiserror::Error;

use stockledger_core::{DomainError, ProductId};

/// Store operation error.
///
/// These are infrastructure errors raised by the lot, ledger and movement
/// record stores. Domain rule failures detected inside a store (a decrement
/// past zero, a malformed entry) are carried over from [`DomainError`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: ProductId,
        requested: i64,
        available: i64,
    },

    #[error("invalid store operation: {0}")]
    Validation(String),

    /// Stored data breaks a domain invariant (e.g. a stock total that no
    /// longer fits the quantity type).
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// Key already present (e.g. a movement record still in flight).
    #[error("duplicate: {0}")]
    Duplicate(String),

    /// Backend unusable (lock poisoning, storage down).
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub(crate) fn poisoned(what: &str) -> Self {
        StoreError::Unavailable(format!("{what} lock poisoned"))
    }
}

impl From<DomainError> for StoreError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::InsufficientStock {
                product_id,
                requested,
                available,
            } => StoreError::InsufficientStock {
                product_id,
                requested,
                available,
            },
            DomainError::NotFound(what) => StoreError::NotFound(what),
            DomainError::Conflict(msg) => StoreError::Duplicate(msg),
            DomainError::InvariantViolation(msg) => StoreError::InvariantViolation(msg),
            DomainError::Validation(msg) | DomainError::InvalidId(msg) => {
                StoreError::Validation(msg)
            }
        }
    }
}
