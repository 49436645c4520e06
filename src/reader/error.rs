//! Error type for the streaming reader (`session`, `jsonlines`).
use crate::error::{ErrorKind, TraceError};
use crate::gzindex::error::IndexError;

#[derive(Debug, thiserror::Error)]
pub enum ReaderError {
    #[error("file I/O: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Index(#[from] IndexError),
    #[error("compression: {0}")]
    Compression(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("initialization: {0}")]
    Initialization(String),
}

impl From<ReaderError> for TraceError {
    fn from(e: ReaderError) -> Self {
        let kind = match &e {
            ReaderError::Io(_) => ErrorKind::FileIo,
            ReaderError::Index(_) => ErrorKind::IndexCorrupt,
            ReaderError::Compression(_) => ErrorKind::Compression,
            ReaderError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            ReaderError::Initialization(_) => ErrorKind::Initialization,
        };
        TraceError::new(kind, e.to_string())
    }
}
