//! Debouncer for search panel edits
//!
//! Accumulates field edits within a configurable quiet window so that fast
//! typing produces a single submission instead of one per keystroke.

use crate::engine::query::QueryField;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Default quiet window in milliseconds
pub const DEFAULT_DEBOUNCE_MS: u64 = 150;

/// Debouncer that accumulates field edits within a time window
pub struct FieldDebouncer {
    window: Duration,
    /// Latest value per field; later edits overwrite earlier ones
    pending: HashMap<QueryField, String>,
    /// Time of the last edit (any field)
    last_edit: Option<Instant>,
}

impl FieldDebouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: HashMap::new(),
            last_edit: None,
        }
    }

    pub fn from_millis(ms: u64) -> Self {
        Self::new(Duration::from_millis(ms))
    }

    /// Record an edit
    pub fn add_edit(&mut self, field: QueryField, value: String) {
        self.last_edit = Some(Instant::now());
        self.pending.insert(field, value);
    }

    /// Check if the quiet window has elapsed since the last edit
    pub fn is_ready(&self) -> bool {
        self.has_pending()
            && self
                .last_edit
                .is_some_and(|last| last.elapsed() >= self.window)
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Time left before the pending edits are ready (None if nothing pending)
    pub fn time_until_ready(&self) -> Option<Duration> {
        if !self.has_pending() {
            return None;
        }
        self.last_edit
            .map(|last| self.window.saturating_sub(last.elapsed()))
    }

    /// Take all pending edits. Returns None if nothing is pending.
    pub fn flush(&mut self) -> Option<Vec<(QueryField, String)>> {
        if self.pending.is_empty() {
            return None;
        }
        self.last_edit = None;
        Some(self.pending.drain().collect())
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn test_single_edit() {
        let mut debouncer = FieldDebouncer::from_millis(30);
        debouncer.add_edit(QueryField::Pattern, "he".to_string());

        assert!(debouncer.has_pending());
        assert!(!debouncer.is_ready());

        sleep(Duration::from_millis(40));
        assert!(debouncer.is_ready());

        let edits = debouncer.flush().unwrap();
        assert_eq!(edits, vec![(QueryField::Pattern, "he".to_string())]);
        assert!(!debouncer.has_pending());
        assert!(debouncer.flush().is_none());
    }

    #[test]
    fn test_last_edit_per_field_wins() {
        let mut debouncer = FieldDebouncer::from_millis(10);
        debouncer.add_edit(QueryField::Pattern, "h".to_string());
        debouncer.add_edit(QueryField::Pattern, "he".to_string());
        debouncer.add_edit(QueryField::Pattern, "hel".to_string());
        debouncer.add_edit(QueryField::IncludeFile, "src".to_string());
        assert_eq!(debouncer.pending_count(), 2);

        sleep(Duration::from_millis(20));
        let mut edits = debouncer.flush().unwrap();
        edits.sort_by_key(|(field, _)| *field == QueryField::IncludeFile);
        assert_eq!(edits[0], (QueryField::Pattern, "hel".to_string()));
        assert_eq!(edits[1], (QueryField::IncludeFile, "src".to_string()));
    }

    #[test]
    fn test_time_until_ready() {
        let mut debouncer = FieldDebouncer::from_millis(500);
        assert!(debouncer.time_until_ready().is_none());
        debouncer.add_edit(QueryField::Rewrite, "x".to_string());
        assert!(debouncer.time_until_ready().unwrap() > Duration::ZERO);
    }
}
