//! Streaming search-result engine
//!
//! [`SearchEngine`] owns the aggregate for one session. Queries are submitted
//! under a fresh [`GenerationId`]; matcher output arrives as [`StreamEvent`]s
//! and is only applied while its generation is still the active one. A newer
//! submission is the only cancellation mechanism: older events simply stop
//! matching.
//!
//! Every state change bumps the version on the [`NotificationBus`]. Observers
//! get the version number only and re-read [`SearchEngine::snapshot`].
//!
//! The engine is single-owner and not `Send`; matcher threads talk to it
//! through a channel drained by the owning thread.

pub mod debouncer;
pub mod event;
pub mod generation;
pub mod notify;
pub mod query;
pub mod types;

pub use debouncer::FieldDebouncer;
pub use event::{
    DismissDiffRequest, OpenRequest, Outbound, Outbox, PreviewRequest, ReplaceAllRequest,
    SearchFailure, SearchRequest, StreamEvent,
};
pub use generation::{GenerationController, GenerationId, COUNTER_MODULUS};
pub use notify::{NotificationBus, Subscription};
pub use query::{PatternQuery, Query, QueryField, RuleDocument, Strictness};
pub use types::{ByteSpan, Diff, FileChange, FileGroup, KeyGroup, LangEntry, MatchRecord, Position, Range};

use crate::aggregate::{Aggregate, DuplicatePolicy};
use crate::error::{EngineError, Result};
use serde::Serialize;
use tracing::{debug, info};

/// Lifecycle of the active generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Nothing submitted yet
    Idle,
    /// Submitted, no data yet
    Searching,
    /// At least one batch applied
    Streaming,
    /// Terminal success
    Done,
    /// Terminal failure
    Errored,
}

impl Phase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Done | Phase::Errored)
    }
}

/// Whether an inbound event changed anything
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    Applied,
    /// Tagged with a generation other than the active one
    Stale,
    /// Active generation, but its stream already ended
    AfterTerminal,
}

/// Read-only view of the engine state
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot<'a> {
    pub version: u64,
    pub generation: GenerationId,
    pub phase: Phase,
    pub searching: bool,
    pub has_stale_result: bool,
    pub query_in_flight: &'a Query,
    pub error: Option<&'a SearchFailure>,
    pub groups: &'a [KeyGroup],
}

/// Session engine, generic over where outbound requests go
pub struct SearchEngine<O: Outbox> {
    generations: GenerationController,
    phase: Phase,
    aggregate: Aggregate,
    query_in_flight: Query,
    draft: PatternQuery,
    searching: bool,
    has_stale_result: bool,
    error: Option<SearchFailure>,
    policy: DuplicatePolicy,
    bus: NotificationBus,
    outbox: O,
}

impl<O: Outbox> SearchEngine<O> {
    pub fn new(outbox: O) -> Self {
        Self {
            generations: GenerationController::new(),
            phase: Phase::Idle,
            aggregate: Aggregate::new(),
            query_in_flight: Query::default(),
            draft: PatternQuery::default(),
            searching: false,
            has_stale_result: false,
            error: None,
            policy: DuplicatePolicy::default(),
            bus: NotificationBus::new(),
            outbox,
        }
    }

    pub fn with_duplicate_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn outbox(&self) -> &O {
        &self.outbox
    }

    pub fn outbox_mut(&mut self) -> &mut O {
        &mut self.outbox
    }

    // ---------------------------------------------------------------------
    // Reads
    // ---------------------------------------------------------------------

    pub fn snapshot(&self) -> Snapshot<'_> {
        Snapshot {
            version: self.bus.current_version(),
            generation: self.generations.active(),
            phase: self.phase,
            searching: self.searching,
            has_stale_result: self.has_stale_result,
            query_in_flight: &self.query_in_flight,
            error: self.error.as_ref(),
            groups: self.aggregate.groups(),
        }
    }

    pub fn aggregate(&self) -> &Aggregate {
        &self.aggregate
    }

    pub fn current_version(&self) -> u64 {
        self.bus.current_version()
    }

    pub fn active_generation(&self) -> GenerationId {
        self.generations.active()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_searching(&self) -> bool {
        self.searching
    }

    pub fn error(&self) -> Option<&SearchFailure> {
        self.error.as_ref()
    }

    pub fn query_in_flight(&self) -> &Query {
        &self.query_in_flight
    }

    pub fn draft(&self) -> &PatternQuery {
        &self.draft
    }

    pub fn find_index(&self, file_path: &str) -> Option<(usize, usize)> {
        self.aggregate.find_index(file_path)
    }

    /// Register a change observer; it receives the new version only
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: FnMut(u64) + 'static,
    {
        self.bus.subscribe(callback)
    }

    // ---------------------------------------------------------------------
    // Generation control
    // ---------------------------------------------------------------------

    /// Submit a query under a new generation, pre-empting any running one.
    ///
    /// Blank queries complete immediately with an empty result and never reach
    /// the matcher.
    pub fn submit(&mut self, query: impl Into<Query>) -> GenerationId {
        let query = query.into();
        let generation = self.generations.issue();

        self.searching = true;
        self.has_stale_result = true;
        self.error = None;
        self.phase = Phase::Searching;

        if query.is_blank() {
            info!(%generation, "blank query, completing with empty result");
            self.drop_stale_result();
            self.query_in_flight = query;
            self.searching = false;
            self.phase = Phase::Done;
        } else {
            info!(%generation, "submitting query");
            self.outbox.dispatch(Outbound::Search(SearchRequest {
                generation,
                query: query.clone(),
            }));
            self.query_in_flight = query;
        }

        self.bus.notify();
        generation
    }

    /// Apply one matcher event if it belongs to the active generation
    pub fn handle_event(&mut self, event: StreamEvent) -> EventOutcome {
        let generation = event.generation();
        if !self.generations.is_active(generation) {
            debug!(%generation, active = %self.generations.active(), "dropping stale event");
            return EventOutcome::Stale;
        }

        match event {
            StreamEvent::Refresh {
                file_path, matches, ..
            } => {
                if self.aggregate.replace_file(&file_path, matches) {
                    self.bus.notify();
                }
                return EventOutcome::Applied;
            }
            _ if self.phase.is_terminal() => {
                debug!(%generation, "dropping event after terminal event");
                return EventOutcome::AfterTerminal;
            }
            StreamEvent::Batch { matches, .. } => {
                self.drop_stale_result();
                debug!(%generation, count = matches.len(), "applying batch");
                self.aggregate.absorb(matches, self.policy);
                self.phase = Phase::Streaming;
            }
            StreamEvent::Done { query, .. } => {
                self.drop_stale_result();
                info!(%generation, matches = self.aggregate.match_count(), "search finished");
                self.searching = false;
                self.query_in_flight = query;
                self.phase = Phase::Done;
            }
            StreamEvent::Error { error, .. } => {
                info!(%generation, %error, "search failed");
                self.aggregate.clear();
                self.has_stale_result = false;
                self.searching = false;
                self.error = Some(error);
                self.phase = Phase::Errored;
            }
        }

        self.bus.notify();
        EventOutcome::Applied
    }

    /// Swap in fresh records for one file, e.g. after it changed on disk.
    ///
    /// An empty list removes the file from its key group.
    pub fn refresh_file(
        &mut self,
        generation: GenerationId,
        file_path: impl Into<String>,
        matches: Vec<MatchRecord>,
    ) -> EventOutcome {
        self.handle_event(StreamEvent::Refresh {
            generation,
            file_path: file_path.into(),
            matches,
        })
    }

    fn drop_stale_result(&mut self) {
        if self.has_stale_result {
            self.has_stale_result = false;
            self.aggregate.clear();
        }
    }

    // ---------------------------------------------------------------------
    // Query draft
    // ---------------------------------------------------------------------

    /// Edit one search panel field without submitting
    pub fn edit_field(&mut self, field: QueryField, value: String) {
        self.draft.set(field, value);
    }

    /// Restrict the draft to a folder picked from outside the panel, then re-run it
    pub fn set_include_file(&mut self, include_file: impl Into<String>) -> GenerationId {
        self.draft.include_file = include_file.into();
        self.refresh()
    }

    /// Re-submit the current draft
    pub fn refresh(&mut self) -> GenerationId {
        self.submit(self.draft.clone())
    }

    /// Blank the pattern and re-submit, leaving an empty result
    pub fn clear(&mut self) -> GenerationId {
        self.draft.pattern.clear();
        self.refresh()
    }

    // ---------------------------------------------------------------------
    // Mutations
    // ---------------------------------------------------------------------

    /// Dismiss one record. Missing targets are ignored.
    pub fn dismiss_match(&mut self, key: &str, record: &MatchRecord) {
        let Some(dismissed) = self.aggregate.dismiss_match(key, record) else {
            debug!(key, file = %record.file, "dismiss target no longer present");
            return;
        };

        self.outbox.dispatch(Outbound::DismissDiff(DismissDiffRequest {
            file_path: record.file.clone(),
            diffs: dismissed.remaining_diffs,
            locations_to_select: record.range,
        }));
        self.bus.notify();
    }

    /// Dismiss every record of `key` in one file. Missing targets are ignored.
    pub fn dismiss_file(&mut self, key: &str, file_path: &str) {
        if self.aggregate.dismiss_file(key, file_path) {
            self.bus.notify();
        } else {
            debug!(key, file_path, "dismiss target no longer present");
        }
    }

    /// Send every pending replacement to the file writer in one request.
    ///
    /// The aggregate is left as is; callers re-submit afterwards.
    pub fn replace_all(&mut self) -> Result<usize> {
        if !self.query_in_flight.has_rewrite() {
            return Err(EngineError::RewriteUnavailable);
        }

        let changes = self.aggregate.collect_changes();
        let files = changes.len();
        info!(generation = %self.generations.active(), files, "requesting replace all");
        self.outbox.dispatch(Outbound::ReplaceAll(ReplaceAllRequest {
            generation: self.generations.active(),
            query: self.query_in_flight.clone(),
            changes,
        }));
        Ok(files)
    }

    /// Open a result: plain open without a rewrite, diff preview with one
    pub fn open(&mut self, file_path: &str, range: Range) {
        let request = if self.query_in_flight.has_rewrite() {
            Outbound::PreviewDiff(PreviewRequest {
                file_path: file_path.to_string(),
                range,
                diffs: self.aggregate.file_diffs(file_path),
            })
        } else {
            Outbound::OpenFile(OpenRequest {
                file_path: file_path.to_string(),
                range,
            })
        };
        self.outbox.dispatch(request);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    fn record(key: &str, value: &str, file: &str, line: u32) -> MatchRecord {
        MatchRecord::new(
            LangEntry::new(key, value),
            file,
            Range::single_line(line, 4, 4 + key.len() as u32, line as usize * 64),
        )
    }

    fn engine() -> SearchEngine<Vec<Outbound>> {
        SearchEngine::new(Vec::new())
    }

    #[test]
    fn test_new_engine_is_idle() {
        let engine = engine();
        let snapshot = engine.snapshot();
        assert_eq!(snapshot.phase, Phase::Idle);
        assert!(!snapshot.searching);
        assert!(snapshot.groups.is_empty());
    }

    #[test]
    fn test_submit_dispatches_search_and_notifies() {
        let mut engine = engine();
        let notified = Rc::new(Cell::new(0));
        let notified_clone = Rc::clone(&notified);
        let _sub = engine.subscribe(move |_| notified_clone.set(notified_clone.get() + 1));

        let generation = engine.submit(PatternQuery::new("hello"));

        assert_eq!(notified.get(), 1);
        assert!(engine.is_searching());
        assert_eq!(engine.phase(), Phase::Searching);
        match engine.outbox().as_slice() {
            [Outbound::Search(request)] => {
                assert_eq!(request.generation, generation);
                assert_eq!(request.query.as_pattern().unwrap().pattern, "hello");
            }
            other => panic!("unexpected outbox: {:?}", other),
        }
    }

    #[test]
    fn test_blank_submit_completes_without_matcher() {
        let mut engine = engine();
        let before = engine.active_generation();
        let generation = engine.submit(PatternQuery::new("  "));

        assert_ne!(generation, before);
        assert!(engine.outbox().is_empty());
        assert!(!engine.is_searching());
        assert_eq!(engine.phase(), Phase::Done);
    }

    #[test]
    fn test_stale_result_kept_until_first_batch() {
        let mut engine = engine();
        let g1 = engine.submit(PatternQuery::new("a"));
        engine.handle_event(StreamEvent::Batch {
            generation: g1,
            matches: vec![record("I18N.a", "A", "a.ts", 1)],
        });

        let g2 = engine.submit(PatternQuery::new("b"));
        assert!(engine.snapshot().has_stale_result);
        assert_eq!(engine.aggregate().match_count(), 1);

        engine.handle_event(StreamEvent::Batch {
            generation: g2,
            matches: vec![record("I18N.b", "B", "b.ts", 2)],
        });
        assert!(!engine.snapshot().has_stale_result);
        assert!(engine.aggregate().key_group("I18N.a").is_none());
        assert!(engine.aggregate().key_group("I18N.b").is_some());
    }

    #[test]
    fn test_stale_event_changes_nothing() {
        let mut engine = engine();
        let g1 = engine.submit(PatternQuery::new("a"));
        let _g2 = engine.submit(PatternQuery::new("b"));
        let version = engine.current_version();

        for event in [
            StreamEvent::Batch {
                generation: g1,
                matches: vec![record("I18N.a", "A", "a.ts", 1)],
            },
            StreamEvent::Error {
                generation: g1,
                error: SearchFailure::new("boom"),
            },
            StreamEvent::Done {
                generation: g1,
                query: PatternQuery::new("a").into(),
            },
        ] {
            assert_eq!(engine.handle_event(event), EventOutcome::Stale);
        }

        assert_eq!(engine.current_version(), version);
        assert!(engine.is_searching());
        assert!(engine.error().is_none());
        assert_eq!(engine.phase(), Phase::Searching);
    }

    #[test]
    fn test_error_clears_and_stores_failure() {
        let mut engine = engine();
        let g = engine.submit(PatternQuery::new("a"));
        engine.handle_event(StreamEvent::Batch {
            generation: g,
            matches: vec![record("I18N.a", "A", "a.ts", 1)],
        });
        engine.handle_event(StreamEvent::Error {
            generation: g,
            error: SearchFailure::new("rg exited with 2"),
        });

        let snapshot = engine.snapshot();
        assert_eq!(snapshot.phase, Phase::Errored);
        assert!(!snapshot.searching);
        assert!(snapshot.groups.is_empty());
        assert_eq!(snapshot.error.unwrap().message, "rg exited with 2");

        // the next submission clears the stored error
        engine.submit(PatternQuery::new("b"));
        assert!(engine.error().is_none());
    }

    #[test]
    fn test_events_after_terminal_are_ignored() {
        let mut engine = engine();
        let g = engine.submit(PatternQuery::new("a"));
        engine.handle_event(StreamEvent::Done {
            generation: g,
            query: PatternQuery::new("a").into(),
        });
        let outcome = engine.handle_event(StreamEvent::Batch {
            generation: g,
            matches: vec![record("I18N.a", "A", "a.ts", 1)],
        });
        assert_eq!(outcome, EventOutcome::AfterTerminal);
        assert!(engine.aggregate().is_empty());
    }

    #[test]
    fn test_done_echo_replaces_query_in_flight() {
        let mut engine = engine();
        let g = engine.submit(PatternQuery::new("a"));
        engine.handle_event(StreamEvent::Done {
            generation: g,
            query: PatternQuery::new("a").with_rewrite("b").into(),
        });
        assert!(engine.query_in_flight().has_rewrite());
    }

    #[test]
    fn test_refresh_event_after_done() {
        let mut engine = engine();
        let g = engine.submit(PatternQuery::new("a"));
        engine.handle_event(StreamEvent::Batch {
            generation: g,
            matches: vec![
                record("I18N.a", "A", "a.ts", 1),
                record("I18N.a", "A", "b.ts", 2),
            ],
        });
        engine.handle_event(StreamEvent::Done {
            generation: g,
            query: PatternQuery::new("a").into(),
        });

        let outcome = engine.handle_event(StreamEvent::Refresh {
            generation: g,
            file_path: "a.ts".to_string(),
            matches: Vec::new(),
        });
        assert_eq!(outcome, EventOutcome::Applied);
        assert_eq!(engine.find_index("a.ts"), None);
        assert_eq!(engine.find_index("b.ts"), Some((0, 0)));
    }

    #[test]
    fn test_dismiss_match_sends_remaining_diffs() {
        let mut engine = engine();
        let g = engine.submit(PatternQuery::new("a").with_rewrite("X"));
        let first = record("I18N.a", "A", "a.ts", 1).with_replacement("X");
        let second = record("I18N.a", "A", "a.ts", 2).with_replacement("X");
        engine.handle_event(StreamEvent::Batch {
            generation: g,
            matches: vec![first.clone(), second.clone()],
        });
        engine.outbox_mut().clear();

        engine.dismiss_match("I18N.a", &first);

        match engine.outbox().as_slice() {
            [Outbound::DismissDiff(request)] => {
                assert_eq!(request.file_path, "a.ts");
                assert_eq!(request.locations_to_select, first.range);
                assert_eq!(request.diffs.len(), 1);
                assert_eq!(request.diffs[0].range, second.range);
            }
            other => panic!("unexpected outbox: {:?}", other),
        }
    }

    #[test]
    fn test_dismiss_missing_target_is_silent() {
        let mut engine = engine();
        engine.submit(PatternQuery::new("a"));
        engine.outbox_mut().clear();
        let version = engine.current_version();

        engine.dismiss_match("I18N.a", &record("I18N.a", "A", "a.ts", 1));
        engine.dismiss_file("I18N.a", "a.ts");

        assert_eq!(engine.current_version(), version);
        assert!(engine.outbox().is_empty());
    }

    #[test]
    fn test_replace_all_requires_rewrite() {
        let mut engine = engine();
        engine.submit(PatternQuery::new("a"));
        engine.outbox_mut().clear();

        assert!(matches!(engine.replace_all(), Err(EngineError::RewriteUnavailable)));
        assert!(engine.outbox().is_empty());
    }

    #[test]
    fn test_replace_all_accepts_rule_with_fix() {
        let mut engine = engine();
        engine.submit(RuleDocument {
            yaml: "rule:\n  pattern: a\nfix: b".to_string(),
        });
        engine.outbox_mut().clear();

        assert_eq!(engine.replace_all().unwrap(), 0);
        assert!(matches!(engine.outbox().as_slice(), [Outbound::ReplaceAll(_)]));
    }

    #[test]
    fn test_open_without_rewrite_opens_file() {
        let mut engine = engine();
        engine.submit(PatternQuery::new("a"));
        engine.outbox_mut().clear();

        let range = Range::single_line(3, 0, 4, 90);
        engine.open("a.ts", range);
        assert_eq!(
            engine.outbox().as_slice(),
            [Outbound::OpenFile(OpenRequest {
                file_path: "a.ts".to_string(),
                range,
            })]
        );
    }

    #[test]
    fn test_open_with_rewrite_previews_diffs() {
        let mut engine = engine();
        let g = engine.submit(PatternQuery::new("a").with_rewrite("X"));
        let m = record("I18N.a", "A", "a.ts", 1).with_replacement("X");
        engine.handle_event(StreamEvent::Batch {
            generation: g,
            matches: vec![m.clone()],
        });
        engine.outbox_mut().clear();

        engine.open("a.ts", m.range);
        match engine.outbox().as_slice() {
            [Outbound::PreviewDiff(request)] => {
                assert_eq!(request.diffs.len(), 1);
                assert_eq!(request.diffs[0].replacement, "X");
            }
            other => panic!("unexpected outbox: {:?}", other),
        }
    }

    #[test]
    fn test_draft_fields_feed_refresh() {
        let mut engine = engine();
        engine.edit_field(QueryField::Pattern, "hello".to_string());
        engine.edit_field(QueryField::ExcludeFile, "dist".to_string());
        engine.set_include_file("src/pages");

        match engine.outbox().last() {
            Some(Outbound::Search(request)) => {
                let q = request.query.as_pattern().unwrap();
                assert_eq!(q.pattern, "hello");
                assert_eq!(q.include_file, "src/pages");
                assert_eq!(q.exclude_file, "dist");
            }
            other => panic!("unexpected outbox: {:?}", other),
        }
    }

    #[test]
    fn test_clear_blanks_pattern() {
        let mut engine = engine();
        engine.edit_field(QueryField::Pattern, "hello".to_string());
        let g = engine.refresh();
        engine.handle_event(StreamEvent::Batch {
            generation: g,
            matches: vec![record("I18N.a", "A", "a.ts", 1)],
        });

        engine.clear();
        assert!(engine.draft().pattern.is_empty());
        assert!(engine.aggregate().is_empty());
        assert_eq!(engine.phase(), Phase::Done);
    }
}
