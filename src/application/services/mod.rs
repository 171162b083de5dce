pub mod aggregation;
pub mod cost_service;
pub mod health;
pub mod ingestor;
pub mod ledger_generator;
pub mod reconciliation;
pub mod scheduler;

pub use aggregation::{AggregationService, DailyBatch, MonthlyBatch, RecalcOutcome};
pub use cost_service::CostService;
pub use health::{HealthReport, HealthService};
pub use ingestor::{IngestOutcome, IngestStats, TelemetryIngestor};
pub use ledger_generator::{LedgerConfig, LedgerGenerator};
pub use reconciliation::{ReconcileOutcome, ReconciliationConfig, ReconciliationJob};
pub use scheduler::{AggregationScheduler, SchedulerConfig};
