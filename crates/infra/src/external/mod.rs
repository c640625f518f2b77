//! External service clients/adapters.

pub mod catalog;

pub use catalog::{CatalogError, InMemoryProductCatalog, ProductCatalog, ProductSummary};
