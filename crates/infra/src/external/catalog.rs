//! Product catalog client.
//!
//! Products are owned by an external catalog; the inventory core only asks
//! whether a product exists and is sellable before moving stock.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use stockledger_core::ProductId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSummary {
    pub product_id: ProductId,
    pub name: String,
    /// Inactive products cannot be moved.
    pub active: bool,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error("product {0} not found in catalog")]
    NotFound(ProductId),

    #[error("catalog did not answer within {0:?}")]
    Timeout(Duration),

    #[error("catalog unavailable: {0}")]
    Unavailable(String),
}

pub trait ProductCatalog: Send + Sync {
    /// Look up one product, giving up after `timeout`.
    fn fetch_product(
        &self,
        product_id: ProductId,
        timeout: Duration,
    ) -> Result<ProductSummary, CatalogError>;
}

impl<C> ProductCatalog for Arc<C>
where
    C: ProductCatalog + ?Sized,
{
    fn fetch_product(
        &self,
        product_id: ProductId,
        timeout: Duration,
    ) -> Result<ProductSummary, CatalogError> {
        (**self).fetch_product(product_id, timeout)
    }
}

/// In-memory catalog for tests/dev.
///
/// `set_latency` simulates a slow backend: lookups whose latency exceeds the
/// caller's timeout fail with `Timeout` instead of sleeping.
#[derive(Debug, Default)]
pub struct InMemoryProductCatalog {
    products: RwLock<HashMap<ProductId, ProductSummary>>,
    latency: RwLock<Duration>,
    unavailable: AtomicBool,
}

impl InMemoryProductCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an active product and return its id.
    pub fn register(&self, name: impl Into<String>) -> ProductId {
        let product_id = ProductId::new();
        self.upsert(ProductSummary {
            product_id,
            name: name.into(),
            active: true,
        });
        product_id
    }

    pub fn upsert(&self, product: ProductSummary) {
        if let Ok(mut products) = self.products.write() {
            products.insert(product.product_id, product);
        }
    }

    pub fn set_latency(&self, latency: Duration) {
        if let Ok(mut l) = self.latency.write() {
            *l = latency;
        }
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }
}

impl ProductCatalog for InMemoryProductCatalog {
    fn fetch_product(
        &self,
        product_id: ProductId,
        timeout: Duration,
    ) -> Result<ProductSummary, CatalogError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(CatalogError::Unavailable("catalog marked down".to_string()));
        }

        let latency = self
            .latency
            .read()
            .map(|l| *l)
            .map_err(|_| CatalogError::Unavailable("latency lock poisoned".to_string()))?;
        if latency > timeout {
            return Err(CatalogError::Timeout(timeout));
        }

        let products = self
            .products
            .read()
            .map_err(|_| CatalogError::Unavailable("catalog lock poisoned".to_string()))?;
        products
            .get(&product_id)
            .cloned()
            .ok_or(CatalogError::NotFound(product_id))
    }
}
