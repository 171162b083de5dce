//! Pipeline counters
//!
//! One injected metrics object per process instead of ambient globals,
//! so components stay independently testable. Every increment is also
//! mirrored to the Prometheus recorder installed in `main`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use chrono::{DateTime, Utc};

#[derive(Default)]
pub struct PipelineMetrics {
    events_ingested: AtomicU64,
    events_discarded: AtomicU64,
    ledger_entries_created: AtomicU64,
    duplicate_entries: AtomicU64,
    resets_detected: AtomicU64,
    out_of_order_events: AtomicU64,
    errors: AtomicU64,
    last_aggregation_run: RwLock<Option<DateTime<Utc>>>,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_ingested(&self) {
        self.events_ingested.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("energy_events_ingested_total").increment(1);
    }

    pub fn record_discarded(&self) {
        self.events_discarded.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("energy_events_discarded_total").increment(1);
    }

    pub fn record_entry_created(&self) {
        self.ledger_entries_created.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("energy_ledger_entries_total").increment(1);
    }

    pub fn record_duplicate(&self) {
        self.duplicate_entries.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("energy_ledger_duplicates_total").increment(1);
    }

    pub fn record_reset(&self) {
        self.resets_detected.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("energy_counter_resets_total").increment(1);
    }

    pub fn record_out_of_order(&self) {
        self.out_of_order_events.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("energy_out_of_order_total").increment(1);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("energy_pipeline_errors_total").increment(1);
    }

    pub fn mark_aggregation_run(&self, at: DateTime<Utc>) {
        if let Ok(mut slot) = self.last_aggregation_run.write() {
            *slot = Some(at);
        }
    }

    pub fn events_ingested(&self) -> u64 {
        self.events_ingested.load(Ordering::Relaxed)
    }

    pub fn events_discarded(&self) -> u64 {
        self.events_discarded.load(Ordering::Relaxed)
    }

    pub fn ledger_entries_created(&self) -> u64 {
        self.ledger_entries_created.load(Ordering::Relaxed)
    }

    pub fn duplicate_entries(&self) -> u64 {
        self.duplicate_entries.load(Ordering::Relaxed)
    }

    pub fn resets_detected(&self) -> u64 {
        self.resets_detected.load(Ordering::Relaxed)
    }

    pub fn out_of_order_events(&self) -> u64 {
        self.out_of_order_events.load(Ordering::Relaxed)
    }

    pub fn errors(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }

    pub fn last_aggregation_run(&self) -> Option<DateTime<Utc>> {
        self.last_aggregation_run.read().ok().and_then(|g| *g)
    }
}

// ── Tests ──────────────────────────────────────────────────────
