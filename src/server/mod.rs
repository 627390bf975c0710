//! Stdio sidecar for editor hosts
//!
//! The host drives one [`SearchEngine`] over length-prefixed JSON frames on
//! stdin and receives notifications on stdout.
//!
//! Architecture:
//! - Reader thread: decodes host frames and forwards them to the session loop
//! - Matcher threads: one per submitted generation, forwarding stream events
//! - Session loop: owns the engine, drains the outbox after every step and
//!   polls the field debouncer between messages

pub mod protocol;

use crate::aggregate::DuplicatePolicy;
use crate::config::AppConfig;
use crate::engine::{
    FieldDebouncer, GenerationId, Outbound, Query, RuleDocument, SearchEngine, StreamEvent,
    Subscription,
};
use crate::matcher::Matcher;
use crate::rewrite::{apply_changes, FileResult};
use protocol::{read_frame, write_message, HostMessage, HostNotification, ReplaceOutcome};
use std::cell::Cell;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Session settings
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Workspace root replacements are resolved against
    pub root: PathBuf,
    pub debounce_ms: u64,
    pub rewrite_threads: usize,
    pub duplicate_policy: DuplicatePolicy,
}

impl SessionOptions {
    pub fn from_config(root: PathBuf, config: &AppConfig) -> Self {
        Self {
            root,
            debounce_ms: config.debounce_ms,
            rewrite_threads: config.rewrite_threads,
            duplicate_policy: config.duplicate_policy,
        }
    }
}

/// Everything the session loop reacts to
#[derive(Debug)]
pub enum LoopEvent {
    Host(HostMessage),
    /// A frame arrived but did not decode
    HostInvalid(String),
    HostClosed,
    Stream(StreamEvent),
    /// Replace all finished writing; `query` is re-run if `generation` is still active
    Replaced {
        generation: GenerationId,
        query: Query,
        results: Vec<FileResult>,
    },
}

/// One host connection and the engine it drives
pub struct Session<M: Matcher, W: Write> {
    engine: SearchEngine<Vec<Outbound>>,
    matcher: M,
    writer: W,
    options: SessionOptions,
    debouncer: FieldDebouncer,
    loop_tx: Sender<LoopEvent>,
    stream_tx: Sender<StreamEvent>,
    changed: Rc<Cell<Option<u64>>>,
    subscription: Option<Subscription>,
}

impl<M: Matcher, W: Write> Session<M, W> {
    pub fn new(
        matcher: M,
        writer: W,
        options: SessionOptions,
        loop_tx: Sender<LoopEvent>,
        stream_tx: Sender<StreamEvent>,
    ) -> Self {
        let engine = SearchEngine::new(Vec::new()).with_duplicate_policy(options.duplicate_policy);
        let changed = Rc::new(Cell::new(None));
        let pending = Rc::clone(&changed);
        let subscription = engine.subscribe(move |version| pending.set(Some(version)));

        Self {
            engine,
            matcher,
            writer,
            debouncer: FieldDebouncer::from_millis(options.debounce_ms),
            options,
            loop_tx,
            stream_tx,
            changed,
            subscription: Some(subscription),
        }
    }

    pub fn engine(&self) -> &SearchEngine<Vec<Outbound>> {
        &self.engine
    }

    /// How long the loop may block before pending edits are due
    pub fn next_deadline(&self) -> Option<Duration> {
        self.debouncer.time_until_ready()
    }

    /// Handle one loop event. Returns `false` once the session should end.
    pub fn step(&mut self, event: LoopEvent) -> io::Result<bool> {
        match event {
            LoopEvent::HostClosed => {
                info!("host closed the connection");
                return Ok(false);
            }
            LoopEvent::Host(HostMessage::Shutdown) => {
                info!("shutdown requested");
                return Ok(false);
            }
            LoopEvent::Host(message) => self.handle_message(message)?,
            LoopEvent::HostInvalid(message) => {
                write_message(&mut self.writer, &HostNotification::Error { message })?;
            }
            LoopEvent::Stream(event) => {
                self.engine.handle_event(event);
            }
            LoopEvent::Replaced {
                generation,
                query,
                results,
            } => {
                let files = results.iter().map(ReplaceOutcome::from_result).collect();
                write_message(&mut self.writer, &HostNotification::ReplaceApplied { files })?;
                if self.engine.active_generation() == generation {
                    self.engine.submit(query);
                } else {
                    debug!(%generation, "replace finished after a newer search, not re-running");
                }
            }
        }

        self.flush()?;
        Ok(true)
    }

    /// Submit debounced edits once they went quiet
    pub fn tick(&mut self) -> io::Result<()> {
        if self.debouncer.is_ready() {
            self.apply_pending_edits();
            self.engine.refresh();
            self.flush()?;
        }
        Ok(())
    }

    /// Stop observing the engine and hand back the writer
    pub fn finish(mut self) -> W {
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
        self.writer
    }

    fn handle_message(&mut self, message: HostMessage) -> io::Result<()> {
        debug!(?message, "host message");
        match message {
            HostMessage::Search { query } => {
                self.engine.submit(query);
            }
            HostMessage::Yaml { yaml } => {
                self.engine.submit(RuleDocument { yaml });
            }
            HostMessage::EditField { field, value } => {
                self.debouncer.add_edit(field, value);
            }
            HostMessage::SetIncludeFile { include_file } => {
                self.apply_pending_edits();
                self.engine.set_include_file(include_file);
            }
            HostMessage::RefreshAllSearch => {
                self.apply_pending_edits();
                self.engine.refresh();
            }
            HostMessage::ClearSearchResults => {
                // Edits typed before the clear must not resurrect the search
                self.debouncer.flush();
                self.engine.clear();
            }
            HostMessage::DismissMatch { key, record } => {
                self.engine.dismiss_match(&key, &record);
            }
            HostMessage::DismissFile { key, file_path } => {
                self.engine.dismiss_file(&key, &file_path);
            }
            HostMessage::RefreshSearchResult {
                generation,
                file_path,
                matches,
            } => {
                self.engine.refresh_file(generation, file_path, matches);
            }
            HostMessage::ReplaceAll => {
                if let Err(e) = self.engine.replace_all() {
                    write_message(
                        &mut self.writer,
                        &HostNotification::Error {
                            message: e.to_string(),
                        },
                    )?;
                }
            }
            HostMessage::Open { file_path, range } => {
                self.engine.open(&file_path, range);
            }
            HostMessage::GetSnapshot => {
                write_message(
                    &mut self.writer,
                    &HostNotification::Snapshot(self.engine.snapshot()),
                )?;
            }
            HostMessage::Shutdown => {}
        }
        Ok(())
    }

    fn apply_pending_edits(&mut self) {
        if let Some(edits) = self.debouncer.flush() {
            for (field, value) in edits {
                self.engine.edit_field(field, value);
            }
        }
    }

    /// Route queued outbound requests, then report the latest version
    fn flush(&mut self) -> io::Result<()> {
        for request in std::mem::take(self.engine.outbox_mut()) {
            match request {
                Outbound::Search(request) => {
                    // Detached: a superseded run finishes on its own
                    let _handle = self.matcher.start(request, self.stream_tx.clone());
                }
                Outbound::ReplaceAll(request) => {
                    let root = self.options.root.clone();
                    let threads = self.options.rewrite_threads;
                    let events = self.loop_tx.clone();
                    thread::spawn(move || {
                        let results = apply_changes(&root, &request.changes, threads);
                        let _ = events.send(LoopEvent::Replaced {
                            generation: request.generation,
                            query: request.query,
                            results,
                        });
                    });
                }
                Outbound::DismissDiff(request) => {
                    write_message(&mut self.writer, &HostNotification::DismissDiff(request))?;
                }
                Outbound::OpenFile(request) => {
                    write_message(&mut self.writer, &HostNotification::OpenFile(request))?;
                }
                Outbound::PreviewDiff(request) => {
                    write_message(&mut self.writer, &HostNotification::PreviewDiff(request))?;
                }
            }
        }

        if let Some(version) = self.changed.take() {
            write_message(&mut self.writer, &HostNotification::Changed { version })?;
        }
        Ok(())
    }
}

/// Decode host frames on a background thread
fn spawn_reader<R: Read + Send + 'static>(mut reader: R, events: Sender<LoopEvent>) -> JoinHandle<()> {
    thread::spawn(move || loop {
        let frame = match read_frame(&mut reader) {
            Ok(frame) => frame,
            Err(e) => {
                if e.kind() != io::ErrorKind::UnexpectedEof {
                    warn!("host stream failed: {}", e);
                }
                let _ = events.send(LoopEvent::HostClosed);
                break;
            }
        };

        let event = match serde_json::from_slice::<HostMessage>(&frame) {
            Ok(message) => LoopEvent::Host(message),
            Err(e) => LoopEvent::HostInvalid(format!("Invalid message: {}", e)),
        };
        if events.send(event).is_err() {
            break;
        }
    })
}

/// Move matcher events into the session loop
fn spawn_forwarder(stream_rx: Receiver<StreamEvent>, events: Sender<LoopEvent>) -> JoinHandle<()> {
    thread::spawn(move || {
        for event in stream_rx {
            if events.send(LoopEvent::Stream(event)).is_err() {
                break;
            }
        }
    })
}

/// Run a session until the host shuts it down or closes its end
pub fn serve<M, R, W>(matcher: M, reader: R, writer: W, options: SessionOptions) -> io::Result<()>
where
    M: Matcher,
    R: Read + Send + 'static,
    W: Write,
{
    let (loop_tx, loop_rx) = mpsc::channel();
    let (stream_tx, stream_rx) = mpsc::channel();

    spawn_reader(reader, loop_tx.clone());
    spawn_forwarder(stream_rx, loop_tx.clone());

    info!(root = %options.root.display(), "session started");
    let mut session = Session::new(matcher, writer, options, loop_tx, stream_tx);

    loop {
        let event = match session.next_deadline() {
            Some(wait) => match loop_rx.recv_timeout(wait) {
                Ok(event) => Some(event),
                Err(RecvTimeoutError::Timeout) => None,
                Err(RecvTimeoutError::Disconnected) => break,
            },
            None => match loop_rx.recv() {
                Ok(event) => Some(event),
                Err(_) => break,
            },
        };

        if let Some(event) = event {
            if !session.step(event)? {
                break;
            }
        }
        session.tick()?;
    }

    session.finish();
    info!("session ended");
    Ok(())
}
