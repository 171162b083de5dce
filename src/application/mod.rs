pub mod metrics;
pub mod services;
pub mod tracker;

pub use metrics::PipelineMetrics;
pub use tracker::ChangeTracker;
