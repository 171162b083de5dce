//! Aggregate invalidation tracker
//!
//! Cached daily/monthly aggregates stay valid until new ledger entries
//! touch their day or a retroactive cost correction lands. The ledger
//! generator marks exact (classroom, day) keys; cost corrections set a
//! stale-from watermark because their blast radius is "everything from
//! that date on". Summary reads consult this before trusting a cached
//! aggregate.

use std::sync::RwLock;

use dashmap::DashMap;

pub struct ChangeTracker {
    dirty_days: DashMap<(String, String), ()>,
    /// Earliest "YYYY-MM-DD" made stale by a cost correction
    stale_from: RwLock<Option<String>>,
}

impl ChangeTracker {
    pub fn new() -> Self {
        Self {
            dirty_days: DashMap::new(),
            stale_from: RwLock::new(None),
        }
    }

    /// New ledger data for one classroom-day.
    pub fn mark_day(&self, classroom: &str, date: &str) {
        self.dirty_days
            .insert((classroom.to_string(), date.to_string()), ());
    }

    /// Retroactive cost correction effective from `date` onwards.
    pub fn mark_stale_from(&self, date: &str) {
        if let Ok(mut slot) = self.stale_from.write() {
            let keep_existing = matches!(slot.as_deref(), Some(existing) if existing <= date);
            if !keep_existing {
                *slot = Some(date.to_string());
            }
        }
    }

    pub fn is_dirty(&self, classroom: &str, date: &str) -> bool {
        if self
            .dirty_days
            .contains_key(&(classroom.to_string(), date.to_string()))
        {
            return true;
        }
        self.stale_watermark()
            .map(|w| date >= w.as_str())
            .unwrap_or(false)
    }

    /// Whether any day of "YYYY-MM" is dirty for the classroom.
    pub fn is_month_dirty(&self, classroom: &str, month: &str) -> bool {
        if self
            .dirty_days
            .iter()
            .any(|e| e.key().0 == classroom && e.key().1.starts_with(month))
        {
            return true;
        }
        self.stale_watermark()
            .map(|w| month >= &w.as_str()[..month.len().min(w.len())])
            .unwrap_or(false)
    }

    pub fn clear_day(&self, classroom: &str, date: &str) {
        self.dirty_days
            .remove(&(classroom.to_string(), date.to_string()));
    }

    pub fn stale_watermark(&self) -> Option<String> {
        self.stale_from.read().ok().and_then(|g| g.clone())
    }

    /// Called once a full pass has recomputed everything from the
    /// watermark forward.
    pub fn reset_stale(&self) {
        if let Ok(mut slot) = self.stale_from.write() {
            *slot = None;
        }
    }
}

impl Default for ChangeTracker {
    fn default() -> Self {
        Self::new()
    }
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marked_day_is_dirty_until_cleared() {
        let t = ChangeTracker::new();
        assert!(!t.is_dirty("Lab1", "2026-01-10"));

        t.mark_day("Lab1", "2026-01-10");
        assert!(t.is_dirty("Lab1", "2026-01-10"));
        assert!(!t.is_dirty("Lab2", "2026-01-10"));
        assert!(t.is_month_dirty("Lab1", "2026-01"));

        t.clear_day("Lab1", "2026-01-10");
        assert!(!t.is_dirty("Lab1", "2026-01-10"));
    }

    #[test]
    fn watermark_dirties_all_later_days() {
        let t = ChangeTracker::new();
        t.mark_stale_from("2026-01-15");

        assert!(t.is_dirty("Lab1", "2026-01-15"));
        assert!(t.is_dirty("Lab2", "2026-02-01"));
        assert!(!t.is_dirty("Lab1", "2026-01-14"));
        assert!(t.is_month_dirty("Lab1", "2026-01"));
        assert!(t.is_month_dirty("Lab1", "2026-03"));

        t.reset_stale();
        assert!(!t.is_dirty("Lab1", "2026-01-15"));
    }

    #[test]
    fn watermark_keeps_earliest_date() {
        let t = ChangeTracker::new();
        t.mark_stale_from("2026-02-01");
        t.mark_stale_from("2026-01-15");
        t.mark_stale_from("2026-03-01");
        assert_eq!(t.stale_watermark().as_deref(), Some("2026-01-15"));
    }
}
