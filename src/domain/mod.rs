pub mod aggregate;
pub mod costing;
pub mod device;
pub mod ledger;
pub mod repositories;
pub mod telemetry;

// Re-export commonly used types
pub use aggregate::{
    AggregateRepository, DailyAggregate, DailySummary, DailyTotal, DeviceDailyUsage,
    MonthlyAggregate, MonthlySummary, QualitySummary, TimelineBucket,
};
pub use costing::{CostScope, CostVersion, CostVersionRepository, NewCostVersion, PriceQuote};
pub use device::{Device, DeviceRepository, DeviceStatus};
pub use ledger::{
    Confidence, CostCalculation, LedgerEntry, LedgerKey, LedgerRepository, Method, Quality,
};
pub use repositories::{DomainResult, RepositoryProvider};
pub use telemetry::{EnergyReading, SwitchSample, TelemetryRecord, TelemetryRepository};

// Re-export DomainError from shared for convenience
pub use crate::shared::errors::DomainError;
