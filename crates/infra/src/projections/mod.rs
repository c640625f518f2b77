//! Projection implementations (read model builders).
//!
//! Projections consume published inventory events and build query-optimized
//! read models. All projections are:
//! - **Rebuildable**: Can be reconstructed from the event stream
//! - **Idempotent**: Safe for at-least-once delivery

pub mod stock_levels;

pub use stock_levels::{StockLevel, StockLevelsProjection, StockProjectionError};
