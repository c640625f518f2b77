//! Per-product critical sections.
//!
//! A movement holds every product it touches from planning until its ledger
//! append. All products of one movement are taken in a single step (nothing
//! is held while waiting), so two movements over overlapping product sets
//! cannot deadlock.

use std::collections::{BTreeSet, HashSet};
use std::sync::{Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

use thiserror::Error;

use stockledger_core::ProductId;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LockError {
    #[error("timed out after {waited:?} waiting for products {products:?}")]
    Timeout {
        products: Vec<ProductId>,
        waited: Duration,
    },

    #[error("product lock table poisoned")]
    Poisoned,
}

/// Set of products currently held, plus a condvar signalled on release.
#[derive(Debug, Default)]
pub struct ProductLocks {
    held: Mutex<HashSet<ProductId>>,
    released: Condvar,
}

impl ProductLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold every product in `products` (duplicates are fine).
    ///
    /// Waits at most `timeout`; a zero timeout only tries once. A timeout too
    /// large to express as a deadline waits without one.
    pub fn acquire(
        &self,
        products: impl IntoIterator<Item = ProductId>,
        timeout: Duration,
    ) -> Result<ProductGuard<'_>, LockError> {
        let wanted: Vec<ProductId> = products.into_iter().collect::<BTreeSet<_>>().into_iter().collect();
        let deadline = Instant::now().checked_add(timeout);

        let mut held = self.held.lock().map_err(|_| LockError::Poisoned)?;
        while wanted.iter().any(|p| held.contains(p)) {
            held = match deadline {
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        return Err(LockError::Timeout {
                            products: wanted,
                            waited: timeout,
                        });
                    }
                    self.released
                        .wait_timeout(held, remaining)
                        .map_err(|_| LockError::Poisoned)?
                        .0
                }
                None => self.released.wait(held).map_err(|_| LockError::Poisoned)?,
            };
        }

        held.extend(wanted.iter().copied());
        Ok(ProductGuard {
            locks: self,
            products: wanted,
        })
    }

    /// Number of products currently held.
    pub fn held_count(&self) -> usize {
        self.held.lock().map(|h| h.len()).unwrap_or(0)
    }
}

/// Releases its products on drop.
#[derive(Debug)]
pub struct ProductGuard<'a> {
    locks: &'a ProductLocks,
    products: Vec<ProductId>,
}

impl ProductGuard<'_> {
    pub fn products(&self) -> &[ProductId] {
        &self.products
    }
}

impl Drop for ProductGuard<'_> {
    fn drop(&mut self) {
        // Releasing must work even after a panic elsewhere poisoned the table.
        let mut held = self.locks.held.lock().unwrap_or_else(PoisonError::into_inner);
        for p in &self.products {
            held.remove(p);
        }
        self.locks.released.notify_all();
    }
}
