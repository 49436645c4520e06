//! Crate-wide error type.
//!
//! [`TraceError`] is the lowest common denominator: a tag ([`ErrorKind`])
//! plus a message, with the source path and/or uncompressed byte range
//! attached when known. Each module's public functions return their own
//! richer `thiserror` enum instead (`gzindex::IndexError`,
//! `reader::ReaderError`, `bag::BagError`), and each of those implements
//! `From<_> for TraceError` for callers that want to unify errors from more
//! than one module into a single type.

use std::fmt;
use std::path::PathBuf;

/// Coarse classification of everything that can go wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidArgument,
    FileIo,
    IndexCorrupt,
    SourceChanged,
    Compression,
    Initialization,
    PipelineType,
    Aggregation,
    DistributedTransport,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::InvalidArgument => "invalid argument",
            ErrorKind::FileIo => "file I/O",
            ErrorKind::IndexCorrupt => "index corrupt",
            ErrorKind::SourceChanged => "source changed",
            ErrorKind::Compression => "compression",
            ErrorKind::Initialization => "initialization",
            ErrorKind::PipelineType => "pipeline type",
            ErrorKind::Aggregation => "aggregation",
            ErrorKind::DistributedTransport => "distributed transport",
        };
        f.write_str(s)
    }
}

/// A single error type for the whole crate, carrying context for display.
#[derive(Debug, thiserror::Error)]
#[error("{kind}: {message}{}{}",
    .path.as_ref().map(|p| format!(" (path={})", p.display())).unwrap_or_default(),
    .range.map(|(s, e)| format!(" (range={s}..{e})")).unwrap_or_default())]
pub struct TraceError {
    pub kind: ErrorKind,
    pub message: String,
    pub path: Option<PathBuf>,
    pub range: Option<(u64, u64)>,
}

impl TraceError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into(), path: None, range: None }
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_range(mut self, start: u64, end: u64) -> Self {
        self.range = Some((start, end));
        self
    }
}

impl From<std::io::Error> for TraceError {
    fn from(e: std::io::Error) -> Self {
        TraceError::new(ErrorKind::FileIo, e.to_string())
    }
}

impl From<rusqlite::Error> for TraceError {
    fn from(e: rusqlite::Error) -> Self {
        TraceError::new(ErrorKind::IndexCorrupt, e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, TraceError>;
