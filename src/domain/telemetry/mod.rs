//! Telemetry aggregate
//!
//! Contains the immutable TelemetryRecord entity and its repository
//! interface. Records are validated once at the ingestion boundary and
//! never mutated afterwards except for the `processed` flag.

pub mod model;
pub mod repository;

pub use model::{EnergyReading, SwitchSample, TelemetryRecord};
pub use repository::TelemetryRepository;
