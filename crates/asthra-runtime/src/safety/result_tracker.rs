//! Tracking of Result values to catch ones the generated code never
//! inspects.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use crate::atomics::monotonic_now_ns;

/// Unhandled results older than this are flagged by
/// `check_unhandled_results`, per spec §4.4.3.
pub const UNHANDLED_THRESHOLD_NS: u64 = 5_000_000_000;

#[derive(Debug, Clone)]
pub struct ResultRecord {
    pub id: u64,
    pub handled: bool,
    pub creation_time_ns: u64,
    pub handling_time_ns: Option<u64>,
    pub creation_label: String,
    pub handling_label: Option<String>,
    pub error_context: String,
}

static NEXT_RESULT_ID: AtomicU64 = AtomicU64::new(1);

/// Registry of every Result value produced, so unhandled ones can be
/// detected by a periodic scan.
#[derive(Default)]
pub struct ResultTracker {
    entries: Mutex<Vec<ResultRecord>>,
}

impl ResultTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, creation_label: impl Into<String>, error_context: impl Into<String>) -> u64 {
        let id = NEXT_RESULT_ID.fetch_add(1, Ordering::Relaxed);
        let record = ResultRecord {
            id,
            handled: false,
            creation_time_ns: monotonic_now_ns(),
            handling_time_ns: None,
            creation_label: creation_label.into(),
            handling_label: None,
            error_context: error_context.into(),
        };
        self.entries.lock().expect("result tracker mutex poisoned").push(record);
        id
    }

    /// Marks the result handled. Returns `Err` if `id` is not tracked.
    pub fn mark_handled(&self, id: u64, handling_label: impl Into<String>) -> Result<(), String> {
        let mut entries = self.entries.lock().expect("result tracker mutex poisoned");
        match entries.iter_mut().find(|r| r.id == id) {
            Some(record) => {
                record.handled = true;
                record.handling_time_ns = Some(monotonic_now_ns());
                record.handling_label = Some(handling_label.into());
                Ok(())
            }
            None => Err(format!("result id {id} not found")),
        }
    }

    /// Scans for entries unhandled past [`UNHANDLED_THRESHOLD_NS`] and
    /// returns one violation message per offending entry.
    pub fn check_unhandled(&self) -> Vec<String> {
        let entries = self.entries.lock().expect("result tracker mutex poisoned");
        let now = monotonic_now_ns();
        entries
            .iter()
            .filter(|r| !r.handled && now.saturating_sub(r.creation_time_ns) > UNHANDLED_THRESHOLD_NS)
            .map(|r| {
                format!(
                    "unhandled Result id={} created at {} ({}), age={}ns exceeds threshold",
                    r.id,
                    r.creation_time_ns,
                    r.creation_label,
                    now.saturating_sub(r.creation_time_ns)
                )
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("result tracker mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handled_within_threshold_produces_no_violation() {
        let tracker = ResultTracker::new();
        let id = tracker.register("call site A", "");
        tracker.mark_handled(id, "consumed immediately").unwrap();
        assert!(tracker.check_unhandled().is_empty());
    }

    #[test]
    fn mark_handled_on_unknown_id_is_not_found() {
        let tracker = ResultTracker::new();
        assert!(tracker.mark_handled(9999, "x").is_err());
    }

    #[test]
    fn unhandled_past_threshold_produces_exactly_one_violation() {
        let tracker = ResultTracker::new();
        tracker.register("call site B", "div by zero");
        // Directly manipulate creation time via re-registration isn't
        // possible from outside; instead simulate aging by checking the
        // threshold constant directly against a synthetic record.
        let entries = tracker.entries.lock().unwrap();
        drop(entries);
        let mut entries = tracker.entries.lock().unwrap();
        entries[0].creation_time_ns = 0;
        drop(entries);
        let violations = tracker.check_unhandled();
        assert_eq!(violations.len(), 1);
    }
}
