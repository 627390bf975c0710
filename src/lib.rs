//! # keyfind - Streaming i18n key search
//!
//! keyfind finds where translation keys are used in a codebase by the text of
//! their translation. Results stream in from a matcher, get grouped by key and
//! file, and can be dismissed, opened, or rewritten in place.
//!
//! ## Architecture
//!
//! The crate is organized into these main modules:
//!
//! - [`engine`] - Generations, stream event handling, change notification
//! - [`aggregate`] - Grouping and merging of match records
//! - [`matcher`] - Locale dictionary and ripgrep-backed matcher
//! - [`rewrite`] - Applies replace-all changes to files
//! - [`server`] - Stdio sidecar for editor hosts
//! - [`output`] - Terminal formatting of grouped results
//! - [`config`] - Persistent settings and workspace detection
//!
//! ## Quick Start
//!
//! ```ignore
//! use keyfind::engine::{PatternQuery, SearchEngine, StreamEvent};
//!
//! let mut engine = SearchEngine::new(Vec::new());
//! let generation = engine.submit(PatternQuery::new("确定"));
//!
//! // The outbox now holds the search request; feed the matcher's answers back
//! engine.handle_event(StreamEvent::Batch { generation, matches });
//! engine.handle_event(StreamEvent::Done { generation, query });
//!
//! for group in engine.aggregate().groups() {
//!     println!("{} {}", group.lang.key, group.lang.value);
//! }
//! ```
//!
//! ## Streaming model
//!
//! Every submission gets a new generation id. Events carrying an older id are
//! dropped, so there is no explicit cancellation. The previous result stays
//! visible until the first batch (or `done`) of the new generation arrives.

pub mod aggregate;
pub mod config;
pub mod engine;
pub mod error;
pub mod matcher;
pub mod output;
pub mod rewrite;
pub mod server;
