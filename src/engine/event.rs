//! Messages crossing the engine boundary
//!
//! Inbound: [`StreamEvent`]s produced by a matcher for one generation.
//! Outbound: [`Outbound`] requests handed to collaborators through an [`Outbox`].

use crate::engine::generation::GenerationId;
use crate::engine::query::Query;
use crate::engine::types::{Diff, FileChange, MatchRecord, Range};
use serde::{Deserialize, Serialize};
use std::sync::mpsc::Sender;

/// Terminal failure reported by a matcher
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchFailure {
    pub message: String,
}

impl SearchFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for SearchFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

/// Event streamed back for a generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum StreamEvent {
    /// A chunk of matches; zero or more per generation
    Batch {
        generation: GenerationId,
        matches: Vec<MatchRecord>,
    },
    /// Successful end of the stream, echoing the query that ran
    Done {
        generation: GenerationId,
        query: Query,
    },
    /// Failed end of the stream
    Error {
        generation: GenerationId,
        error: SearchFailure,
    },
    /// Fresh records for one file, e.g. after it was edited on disk
    #[serde(rename_all = "camelCase")]
    Refresh {
        generation: GenerationId,
        file_path: String,
        matches: Vec<MatchRecord>,
    },
}

impl StreamEvent {
    pub fn generation(&self) -> GenerationId {
        match self {
            StreamEvent::Batch { generation, .. }
            | StreamEvent::Done { generation, .. }
            | StreamEvent::Error { generation, .. }
            | StreamEvent::Refresh { generation, .. } => *generation,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Done { .. } | StreamEvent::Error { .. })
    }
}

/// Ask the matcher to run a query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub generation: GenerationId,
    pub query: Query,
}

/// Ask the file writer to apply every pending replacement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplaceAllRequest {
    pub generation: GenerationId,
    pub query: Query,
    pub changes: Vec<FileChange>,
}

/// Tell the decoration layer a diff was dismissed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DismissDiffRequest {
    pub file_path: String,
    pub diffs: Vec<Diff>,
    pub locations_to_select: Range,
}

/// Open a file at a location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenRequest {
    pub file_path: String,
    pub range: Range,
}

/// Preview the pending replacements of one file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewRequest {
    pub file_path: String,
    pub range: Range,
    pub diffs: Vec<Diff>,
}

/// Requests the engine hands to its collaborators
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Outbound {
    Search(SearchRequest),
    ReplaceAll(ReplaceAllRequest),
    DismissDiff(DismissDiffRequest),
    OpenFile(OpenRequest),
    PreviewDiff(PreviewRequest),
}

/// Fire-and-forget sink for outbound requests
pub trait Outbox {
    fn dispatch(&mut self, request: Outbound);
}

/// Collects requests in memory
impl Outbox for Vec<Outbound> {
    fn dispatch(&mut self, request: Outbound) {
        self.push(request);
    }
}

/// Forwards requests to another part of the process
impl Outbox for Sender<Outbound> {
    fn dispatch(&mut self, request: Outbound) {
        if self.send(request).is_err() {
            tracing::warn!("outbound receiver dropped; request discarded");
        }
    }
}
