//! Ripgrep-backed matcher
//!
//! Turns a [`SearchRequest`] into a ripgrep run and streams the results back as
//! [`StreamEvent`]s on a channel. Each run lives on its own thread; nothing
//! stops it early. Once a newer generation is active, its events are simply
//! dropped by the engine.
//!
//! - [`locale`] - locale dictionary loading and key selection
//! - [`paths`] - include/exclude filter parsing
//! - [`ripgrep`] - `rg --json` line parsing

pub mod locale;
pub mod paths;
pub mod ripgrep;

pub use locale::LocaleDictionary;
pub use paths::PathFilter;
pub use ripgrep::{LineBuffer, RecordContext};

use crate::engine::{GenerationId, PatternQuery, Query, SearchFailure, SearchRequest, StreamEvent};
use crate::error::{LocaleError, MatcherError};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::sync::mpsc::Sender;
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

/// Read size for ripgrep's stdout
const READ_CHUNK: usize = 64 * 1024;

/// Matcher settings
#[derive(Debug, Clone)]
pub struct MatcherConfig {
    /// Workspace root ripgrep runs in
    pub root: PathBuf,
    /// ripgrep executable
    pub ripgrep_path: PathBuf,
    /// Prefix in front of dictionary keys in source code
    pub key_prefix: String,
    /// Globs always excluded
    pub default_excludes: Vec<String>,
}

impl MatcherConfig {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            ripgrep_path: PathBuf::from("rg"),
            key_prefix: "I18N.".to_string(),
            default_excludes: vec!["node_modules/**".to_string(), ".git/**".to_string()],
        }
    }
}

/// Anything that can answer a search request with stream events
pub trait Matcher {
    /// Start answering `request`. Events for it go to `events`.
    fn start(&self, request: SearchRequest, events: Sender<StreamEvent>) -> JoinHandle<()>;
}

/// Searches source files for dictionary keys with ripgrep
#[derive(Clone)]
pub struct RipgrepMatcher {
    config: Arc<MatcherConfig>,
    dictionary: Arc<LocaleDictionary>,
}

impl RipgrepMatcher {
    pub fn new(config: MatcherConfig, dictionary: LocaleDictionary) -> Self {
        Self {
            config: Arc::new(config),
            dictionary: Arc::new(dictionary),
        }
    }

    pub fn dictionary(&self) -> &LocaleDictionary {
        &self.dictionary
    }

    /// Regex alternation of every prefixed key whose translation contains `pattern`.
    ///
    /// Returns `None` when no key qualifies.
    pub fn key_pattern(&self, pattern: &str) -> Option<String> {
        let alternation = self
            .dictionary
            .keys_containing(pattern)
            .map(|key| regex::escape(&format!("{}{}", self.config.key_prefix, key)))
            .collect::<Vec<_>>()
            .join("|");
        (!alternation.is_empty()).then_some(alternation)
    }

    /// Full ripgrep argument list for a query and its key alternation
    pub fn build_args(&self, query: &PatternQuery, key_pattern: &str) -> Vec<String> {
        let mut args: Vec<String> = [
            "--json",
            "--color",
            "never",
            "--no-heading",
            "--line-number",
            "--column",
            "--byte-offset",
            "--case-sensitive",
            "--word-regexp",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        for glob in &self.config.default_excludes {
            args.push("--glob".to_string());
            args.push(format!("!{}", glob));
        }

        let excludes = PathFilter::parse(&query.exclude_file, &self.config.root);
        for entry in excludes.globs.iter().chain(excludes.paths.iter()) {
            args.push("--glob".to_string());
            args.push(format!("!{}", entry));
        }

        let includes = PathFilter::parse(&query.include_file, &self.config.root);
        for glob in &includes.globs {
            args.push("--glob".to_string());
            args.push(glob.clone());
        }

        args.push("--regexp".to_string());
        args.push(key_pattern.to_string());
        args.extend(includes.paths);
        args
    }

    /// Run one query to completion on the calling thread
    pub fn run(&self, request: SearchRequest, events: &Sender<StreamEvent>) {
        let generation = request.generation;
        let outcome = match &request.query {
            Query::Pattern(query) => self.run_pattern(generation, query, events),
            Query::Rule(_) => Err(MatcherError::RuleUnsupported),
        };

        let terminal = match outcome {
            Ok(()) => StreamEvent::Done {
                generation,
                query: request.query,
            },
            Err(e) => {
                warn!(%generation, "search failed: {}", e);
                StreamEvent::Error {
                    generation,
                    error: SearchFailure::new(e.to_string()),
                }
            }
        };
        // The receiver may be gone if the session ended
        let _ = events.send(terminal);
    }

    fn run_pattern(
        &self,
        generation: GenerationId,
        query: &PatternQuery,
        events: &Sender<StreamEvent>,
    ) -> Result<(), MatcherError> {
        if query.pattern.trim().is_empty() {
            return Ok(());
        }

        let Some(key_pattern) = self.key_pattern(&query.pattern) else {
            debug!(%generation, "no dictionary entry contains the pattern");
            let _ = events.send(StreamEvent::Batch {
                generation,
                matches: Vec::new(),
            });
            return Ok(());
        };

        let args = self.build_args(query, &key_pattern);
        debug!(%generation, ?args, "running ripgrep");

        let mut child = Command::new(&self.config.ripgrep_path)
            .args(&args)
            .current_dir(&self.config.root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| MatcherError::Spawn {
                program: self.config.ripgrep_path.display().to_string(),
                source,
            })?;

        let ctx = RecordContext {
            dictionary: &self.dictionary,
            key_prefix: &self.config.key_prefix,
            replacement: (!query.rewrite.is_empty()).then_some(query.rewrite.as_str()),
        };

        let streamed = match child.stdout.take() {
            Some(stdout) => stream_lines(stdout, &ctx, generation, events),
            None => Ok(0),
        };
        let total = reap_on_error(&mut child, streamed)?;

        let status = child.wait()?;
        // 0: matches found, 1: no matches
        match status.code() {
            Some(0) | Some(1) => {
                info!(%generation, total, "ripgrep finished");
                Ok(())
            }
            Some(code) => Err(MatcherError::ExitStatus(code)),
            None => Err(MatcherError::Terminated),
        }
    }
}

impl Matcher for RipgrepMatcher {
    fn start(&self, request: SearchRequest, events: Sender<StreamEvent>) -> JoinHandle<()> {
        let matcher = self.clone();
        thread::spawn(move || matcher.run(request, &events))
    }
}

/// Split ripgrep's stdout into lines and stream the records of each one
fn stream_lines<R: Read>(
    mut stdout: R,
    ctx: &RecordContext<'_>,
    generation: GenerationId,
    events: &Sender<StreamEvent>,
) -> io::Result<usize> {
    let mut total = 0usize;
    let mut buffer = LineBuffer::new();
    let mut chunk = vec![0u8; READ_CHUNK];
    loop {
        let n = stdout.read(&mut chunk)?;
        if n == 0 {
            break;
        }
        for line in buffer.push(&chunk[..n]) {
            total += send_line(ctx, generation, &line, events);
        }
    }
    if let Some(rest) = buffer.finish() {
        total += send_line(ctx, generation, &rest, events);
    }
    Ok(total)
}

/// Kill and reap the child when reading its output failed
fn reap_on_error<T>(child: &mut Child, result: io::Result<T>) -> Result<T, MatcherError> {
    result.map_err(|e| {
        warn!("reading ripgrep output failed: {}", e);
        let _ = child.kill();
        let _ = child.wait();
        MatcherError::Io(e)
    })
}

/// Parse one output line and stream its records. Malformed lines are skipped.
fn send_line(
    ctx: &RecordContext<'_>,
    generation: GenerationId,
    line: &[u8],
    events: &Sender<StreamEvent>,
) -> usize {
    match ctx.parse_line(line) {
        Ok(matches) if matches.is_empty() => 0,
        Ok(matches) => {
            let count = matches.len();
            let _ = events.send(StreamEvent::Batch {
                generation,
                matches,
            });
            count
        }
        Err(e) => {
            warn!(%generation, "skipping malformed ripgrep line: {}", e);
            0
        }
    }
}

/// Load the locale file (if any) and build a matcher over it
pub fn open_matcher(
    config: MatcherConfig,
    locale_file: Option<&Path>,
) -> Result<RipgrepMatcher, LocaleError> {
    let dictionary = match locale_file {
        Some(path) => LocaleDictionary::load(path)?,
        None => {
            warn!("no locale file configured; every key will have an empty value");
            LocaleDictionary::default()
        }
    };
    info!(entries = dictionary.len(), "locale dictionary loaded");
    Ok(RipgrepMatcher::new(config, dictionary))
}
