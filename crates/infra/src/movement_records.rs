//! Idempotency records for purchases and sales.
//!
//! A movement key is reserved before any lot or ledger mutation. Once the
//! movement commits, its record keeps the document and the `CommitResult`,
//! so a replay of the same key is answered from here without touching stock.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockledger_core::MovementKey;
use stockledger_inventory::CommitResult;
use stockledger_purchasing::Purchase;
use stockledger_sales::Sale;

use crate::error::StoreError;

/// The request document a movement was recorded from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum MovementDocument {
    Purchase(Purchase),
    Sale(Sale),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RecordStatus {
    InFlight,
    Committed { result: CommitResult },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementRecord {
    pub key: MovementKey,
    pub document: MovementDocument,
    pub status: RecordStatus,
    pub reserved_at: DateTime<Utc>,
}

impl MovementRecord {
    pub fn result(&self) -> Option<&CommitResult> {
        match &self.status {
            RecordStatus::Committed { result } => Some(result),
            RecordStatus::InFlight => None,
        }
    }
}

/// Outcome of [`MovementRecordStore::reserve`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reservation {
    /// The key is now held by the caller, who must `complete` or `release` it.
    Reserved,
    /// The same document was already committed under this key.
    AlreadyCommitted(CommitResult),
}

/// Storage of movement records keyed by idempotency key.
///
/// `reserve` must be atomic: two callers racing on one key never both get
/// `Reserved`. Errors:
/// - `Validation` when the key is known with a different document
/// - `Duplicate` when the key is reserved and not committed yet
pub trait MovementRecordStore: Send + Sync {
    fn reserve(
        &self,
        key: &MovementKey,
        document: &MovementDocument,
    ) -> Result<Reservation, StoreError>;

    fn complete(&self, key: &MovementKey, result: CommitResult) -> Result<(), StoreError>;

    /// Drop an in-flight reservation. Committed records cannot be released.
    fn release(&self, key: &MovementKey) -> Result<(), StoreError>;

    fn get(&self, key: &MovementKey) -> Result<Option<MovementRecord>, StoreError>;
}

impl<S> MovementRecordStore for Arc<S>
where
    S: MovementRecordStore + ?Sized,
{
    fn reserve(
        &self,
        key: &MovementKey,
        document: &MovementDocument,
    ) -> Result<Reservation, StoreError> {
        (**self).reserve(key, document)
    }

    fn complete(&self, key: &MovementKey, result: CommitResult) -> Result<(), StoreError> {
        (**self).complete(key, result)
    }

    fn release(&self, key: &MovementKey) -> Result<(), StoreError> {
        (**self).release(key)
    }

    fn get(&self, key: &MovementKey) -> Result<Option<MovementRecord>, StoreError> {
        (**self).get(key)
    }
}

/// In-memory movement record store (tests/dev).
#[derive(Debug, Default)]
pub struct InMemoryMovementRecordStore {
    records: RwLock<HashMap<MovementKey, MovementRecord>>,
}

impl InMemoryMovementRecordStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MovementRecordStore for InMemoryMovementRecordStore {
    fn reserve(
        &self,
        key: &MovementKey,
        document: &MovementDocument,
    ) -> Result<Reservation, StoreError> {
        let mut records = self
            .records
            .write()
            .map_err(|_| StoreError::poisoned("movement records"))?;

        if let Some(existing) = records.get(key) {
            if existing.document != *document {
                return Err(StoreError::Validation(format!(
                    "movement key {key} was already used for a different document"
                )));
            }
            return match &existing.status {
                RecordStatus::Committed { result } => Ok(Reservation::AlreadyCommitted(result.clone())),
                RecordStatus::InFlight => Err(StoreError::Duplicate(format!(
                    "movement {key} is still in flight"
                ))),
            };
        }

        records.insert(
            key.clone(),
            MovementRecord {
                key: key.clone(),
                document: document.clone(),
                status: RecordStatus::InFlight,
                reserved_at: Utc::now(),
            },
        );
        Ok(Reservation::Reserved)
    }

    fn complete(&self, key: &MovementKey, result: CommitResult) -> Result<(), StoreError> {
        let mut records = self
            .records
            .write()
            .map_err(|_| StoreError::poisoned("movement records"))?;
        let record = records
            .get_mut(key)
            .ok_or_else(|| StoreError::NotFound(format!("movement {key}")))?;

        if record.status != RecordStatus::InFlight {
            return Err(StoreError::Duplicate(format!("movement {key} already committed")));
        }
        record.status = RecordStatus::Committed { result };
        Ok(())
    }

    fn release(&self, key: &MovementKey) -> Result<(), StoreError> {
        let mut records = self
            .records
            .write()
            .map_err(|_| StoreError::poisoned("movement records"))?;

        let committed = match records.get(key) {
            None => return Ok(()),
            Some(record) => record.result().is_some(),
        };
        if committed {
            return Err(StoreError::Validation(format!(
                "movement {key} is committed and cannot be released"
            )));
        }
        records.remove(key);
        Ok(())
    }

    fn get(&self, key: &MovementKey) -> Result<Option<MovementRecord>, StoreError> {
        let records = self
            .records
            .read()
            .map_err(|_| StoreError::poisoned("movement records"))?;
        Ok(records.get(key).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use stockledger_core::{ProductId, SaleId};
    use stockledger_inventory::MovementKind;
    use stockledger_sales::PaymentMethod;

    fn sale() -> Sale {
        let mut s = Sale::new(SaleId::new(), "Luis", PaymentMethod::Card, Utc::now());
        s.add_line(ProductId::new(), 2, dec!(3), Decimal::ZERO);
        s
    }

    fn result_for(key: &MovementKey) -> CommitResult {
        CommitResult {
            movement: key.clone(),
            kind: MovementKind::Sale,
            lots_created: vec![],
            allocations: vec![],
            ledger_entries: vec![],
            total: dec!(6),
            committed_at: Utc::now(),
        }
    }

    #[test]
    fn reserve_complete_then_replay() {
        let store = InMemoryMovementRecordStore::new();
        let s = sale();
        let key = s.movement_key();
        let doc = MovementDocument::Sale(s);

        assert_eq!(store.reserve(&key, &doc).unwrap(), Reservation::Reserved);
        assert!(matches!(store.reserve(&key, &doc), Err(StoreError::Duplicate(_))));

        let result = result_for(&key);
        store.complete(&key, result.clone()).unwrap();

        assert_eq!(
            store.reserve(&key, &doc).unwrap(),
            Reservation::AlreadyCommitted(result.clone())
        );
        assert_eq!(store.get(&key).unwrap().unwrap().result(), Some(&result));
    }

    #[test]
    fn different_document_under_same_key_is_rejected() {
        let store = InMemoryMovementRecordStore::new();
        let s = sale();
        let key = s.movement_key();
        store.reserve(&key, &MovementDocument::Sale(s.clone())).unwrap();

        let mut other = s;
        other.customer_name = "Someone else".to_string();
        let err = store.reserve(&key, &MovementDocument::Sale(other)).unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
    }

    #[test]
    fn release_frees_in_flight_keys_only() {
        let store = InMemoryMovementRecordStore::new();
        let s = sale();
        let key = s.movement_key();
        let doc = MovementDocument::Sale(s);

        store.reserve(&key, &doc).unwrap();
        store.release(&key).unwrap();
        assert!(store.get(&key).unwrap().is_none());
        assert_eq!(store.reserve(&key, &doc).unwrap(), Reservation::Reserved);

        store.complete(&key, result_for(&key)).unwrap();
        assert!(store.release(&key).is_err());
    }
}
