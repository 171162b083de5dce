//! Ledger aggregate
//!
//! Append-only, immutable records of energy consumed during closed
//! intervals. Corrections are compensating entries, never edits.

pub mod model;
pub mod repository;

pub use model::{Confidence, CostCalculation, LedgerEntry, LedgerKey, Method, Portion, Quality};
pub use repository::LedgerRepository;
