//! Cursor state carried between re-entrant batch invocations.
//!
//! The host persists a [`BatchState`] between cron runs and hands it back
//! unchanged; the driver returns an updated copy after every invocation.

use serde::{Deserialize, Serialize};

/// Highest fraction reported while the cursor has not yet passed `max_id`.
const MAX_UNFINISHED_FRACTION: f64 = 0.999;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchState {
    /// Entities visited so far in this run.
    pub progress: u64,
    /// Last local id visited; the next page starts strictly after it.
    pub last_id: i64,
    /// Qualifying entities at the start of the run.
    pub total_count: u64,
    /// Highest qualifying id at the start of the run. Entities created later
    /// are left for the next run.
    pub max_id: Option<i64>,
    /// Entities whose attempt failed so far in this run.
    #[serde(default)]
    pub failed: u64,
    /// Entities visited but left alone by the worker.
    #[serde(default)]
    pub skipped: u64,
    pub initialized: bool,
    pub finished: bool,
}

impl BatchState {
    /// Records the snapshot taken on the first invocation of a run.
    pub fn initialize(&mut self, total_count: u64, max_id: Option<i64>) {
        self.progress = 0;
        self.last_id = 0;
        self.failed = 0;
        self.skipped = 0;
        self.total_count = total_count;
        self.max_id = max_id;
        self.initialized = true;
        self.finished = total_count == 0 || max_id.is_none();
    }

    /// Advances the cursor past a page of visited ids (ascending).
    ///
    /// The run finishes once the cursor reaches `max_id` or a page comes back
    /// short, whichever happens first.
    pub fn advance(&mut self, visited_ids: &[i64], batch_size: u32) {
        if let Some(&last) = visited_ids.last() {
            debug_assert!(last > self.last_id, "cursor must move forward");
            self.last_id = last;
        }
        self.progress = self.progress.saturating_add(visited_ids.len() as u64);

        let short_page = visited_ids.len() < batch_size as usize;
        let passed_max = self.max_id.is_none_or(|max| self.last_id >= max);
        if short_page || passed_max {
            self.finished = true;
        }
    }

    /// `progress / total_count`, reported as exactly `1.0` only once finished.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn finished_fraction(&self) -> f64 {
        if self.finished {
            return 1.0;
        }
        if self.total_count == 0 {
            return 0.0;
        }
        (self.progress as f64 / self.total_count as f64).min(MAX_UNFINISHED_FRACTION)
    }
}

/// Outcome of one driver invocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub processed_count: u64,
    pub failed_count: u64,
    pub skipped_count: u64,
    pub finished_fraction: f64,
    /// Human-readable summary, set on the invocation that finishes the run.
    pub message: Option<String>,
}

impl BatchReport {
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.message.is_some()
    }
}

/// Completion message reported once a run has visited every entity.
///
/// Skipped entities are not counted as processed; they are listed next to
/// the failures when there are any.
#[must_use]
pub fn completion_message(entity_label: &str, state: &BatchState) -> String {
    let processed = state.progress.saturating_sub(state.skipped);
    if state.skipped == 0 {
        format!(
            "Processed {processed} {entity_label} entities ({} failed).",
            state.failed
        )
    } else {
        format!(
            "Processed {processed} {entity_label} entities ({} failed, {} skipped).",
            state.failed, state.skipped
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_snapshot_finishes_immediately() {
        let mut state = BatchState::default();
        state.initialize(0, None);
        assert!(state.finished);
        assert!((state.finished_fraction() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn reaching_max_id_on_full_page_finishes() {
        let mut state = BatchState::default();
        state.initialize(4, Some(8));
        state.advance(&[2, 4], 2);
        assert!(!state.finished);
        assert!((state.finished_fraction() - 0.5).abs() < f64::EPSILON);
        state.advance(&[6, 8], 2);
        assert!(state.finished);
        assert_eq!(state.progress, 4);
        assert_eq!(state.last_id, 8);
    }

    #[test]
    fn short_page_finishes_even_below_max_id() {
        let mut state = BatchState::default();
        state.initialize(5, Some(9));
        state.advance(&[1, 2, 3], 3);
        state.advance(&[5], 3);
        assert!(state.finished);
    }

    #[test]
    fn fraction_stays_below_one_until_finished() {
        let state = BatchState {
            progress: 10,
            last_id: 10,
            total_count: 10,
            max_id: Some(12),
            failed: 0,
            skipped: 0,
            initialized: true,
            finished: false,
        };
        assert!(state.finished_fraction() < 1.0);
    }

    #[test]
    fn state_serializes_with_named_fields() {
        let mut state = BatchState::default();
        state.initialize(3, Some(30));
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["total_count"], 3);
        assert_eq!(json["max_id"], 30);
        let back: BatchState = serde_json::from_value(json).unwrap();
        assert_eq!(back, state);
    }

    #[test]
    fn completion_message_reports_counts() {
        let state = BatchState {
            progress: 12,
            failed: 2,
            ..BatchState::default()
        };
        assert_eq!(
            completion_message("commerce_order", &state),
            "Processed 12 commerce_order entities (2 failed)."
        );
    }

    #[test]
    fn completion_message_leaves_skipped_entities_out_of_the_processed_count() {
        let state = BatchState {
            progress: 12,
            failed: 2,
            skipped: 3,
            ..BatchState::default()
        };
        assert_eq!(
            completion_message("commerce_order", &state),
            "Processed 9 commerce_order entities (2 failed, 3 skipped)."
        );
    }

    #[test]
    fn state_saved_before_skips_were_counted_still_loads() {
        let json = serde_json::json!({
            "progress": 4,
            "last_id": 9,
            "total_count": 10,
            "max_id": 20,
            "initialized": true,
            "finished": false
        });
        let state: BatchState = serde_json::from_value(json).unwrap();
        assert_eq!(state.skipped, 0);
        assert_eq!(state.failed, 0);
    }
}
