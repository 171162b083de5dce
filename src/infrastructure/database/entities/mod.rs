pub mod cost_version;
pub mod daily_aggregate;
pub mod device;
pub mod ledger_entry;
pub mod monthly_aggregate;
pub mod telemetry_record;
