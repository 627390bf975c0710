//! Error types for the engine and its collaborators

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T, E = EngineError> = std::result::Result<T, E>;

/// Errors returned by engine operations
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("replace all needs a query with a rewrite template or a `fix:` rule")]
    RewriteUnavailable,
}

/// Errors while loading a locale dictionary
#[derive(Debug, Error)]
pub enum LocaleError {
    #[error("failed to read locale file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("locale file {path} is not valid JSON: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("locale file {0} must contain a JSON object at the top level")]
    NotAnObject(PathBuf),
}

/// Errors raised by the matcher before or while running ripgrep
#[derive(Debug, Error)]
pub enum MatcherError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },
    #[error("ripgrep exited with status {0}")]
    ExitStatus(i32),
    #[error("ripgrep was terminated by a signal")]
    Terminated,
    #[error("reading ripgrep output failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("rule documents are not supported by the ripgrep matcher")]
    RuleUnsupported,
}

/// Errors while applying replacements to one file
#[derive(Debug, Error)]
pub enum RewriteError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}
