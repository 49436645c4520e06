//! # tracebag — random-access gzip trace indexing and a lazy distributed
//! bag pipeline
//!
//! - A sidecar SQLite index (`gzindex`) makes append-only, gzip-compressed
//!   JSON-Lines trace logs seekable by byte offset or by line number
//!   without re-inflating from the start of the file.
//! - A streaming `Reader` (`reader`) resumes decompression from the
//!   nearest checkpoint below a requested offset, using a captured 32 KiB
//!   deflate window.
//! - A lazy `Bag<T, C>` (`bag`) records map/flatmap/map_partitions/
//!   repartition/groupby/distributed_groupby/reduce combinators and
//!   materializes the whole plan in one pass against a chosen execution
//!   context: sequential, threaded, or (feature `mpi`) MPI.

pub mod error;
pub mod gzindex;
pub mod reader;
pub mod bag;

pub use error::{ErrorKind, Result, TraceError};
pub use gzindex::{Checkpoint, Chunk, FileIdentity, IndexError, IndexOptions, IndexStore, Indexer};
pub use reader::{DocumentParser, Reader, ReaderError, SerdeJsonParser};
pub use bag::{Bag, BagError, StageKind};
pub use bag::context::{ContextError, ExecutionContext, Partitions, SequentialContext, ThreadedContext, ThreadedContextConfig};

#[cfg(feature = "mpi")]
pub use bag::context::MpiContext;
