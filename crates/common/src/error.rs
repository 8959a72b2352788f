//! Typed errors raised at the I/O boundary. The pure analytics never return these.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("document is neither a list nor a `result.{key}` wrapped list")]
    UnexpectedShape { key: &'static str },
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("snapshot {0} not found")]
    NotFound(String),
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("malformed snapshot document {name}: {source}")]
    Malformed {
        name: String,
        #[source]
        source: DocumentError,
    },
    #[error("snapshot fetch timed out after {0}s")]
    TimedOut(u64),
    #[error("manifest path {0} points outside the snapshot directory")]
    OutsideStore(PathBuf),
}

#[derive(Debug, thiserror::Error)]
pub enum GeneratorError {
    #[error("failed to start generator `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("generator timed out after {0}s")]
    TimedOut(u64),
    #[error("generator exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },
    #[error("could not clear previous output {path}: {source}")]
    ClearOutput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("generator finished but did not produce {0}")]
    MissingOutput(PathBuf),
    #[error("invalid generator request: {0}")]
    InvalidRequest(String),
}
