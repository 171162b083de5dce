//! # AutoVolt Energy Accounting Service
//!
//! Power-consumption accounting pipeline for the AutoVolt classroom IoT
//! system: normalized device telemetry in, an immutable priced energy
//! ledger and derived daily/monthly cost summaries out.
//!
//! ## Architecture
//!
//! The project follows Clean Architecture principles:
//!
//! - **domain**: Core entities (telemetry, ledger, cost versions,
//!   aggregates, device registry) and repository traits
//! - **application**: The pipeline services — ingestor, ledger
//!   generator, cost service, aggregation engine, reconciliation sweep
//! - **infrastructure**: SeaORM persistence and the in-memory provider
//! - **shared**: Errors and graceful-shutdown coordination
//!
//! Transport (MQTT topics, HTTP routing, auth) lives outside this
//! crate; it constructs [`domain::TelemetryRecord`] values and the
//! administrative commands, and reads summaries back.

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod shared;

pub use config::{default_config_path, AppConfig};

// Re-export database types for easy access
pub use infrastructure::{connect_and_migrate, InMemoryProvider, SeaOrmRepositoryProvider};

// Re-export the pipeline services
pub use application::services::{
    AggregationScheduler, AggregationService, CostService, HealthService, LedgerGenerator,
    ReconciliationJob, TelemetryIngestor,
};
pub use application::{ChangeTracker, PipelineMetrics};
