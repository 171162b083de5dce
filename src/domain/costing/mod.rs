//! Cost version aggregate
//!
//! Versioned electricity price table. Versions are scoped globally or
//! per classroom, never overlap in time within a scope, and are never
//! deleted — only closed. Required for reproducible historical pricing.

pub mod model;
pub mod repository;

pub use model::{CostScope, CostVersion, NewCostVersion, PriceQuote};
pub use repository::CostVersionRepository;
