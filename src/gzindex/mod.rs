//! C1/C2/C3 — random-access gzip indexing.
//!
//! Builds and maintains a SQLite sidecar index ([`store::IndexStore`]) of
//! newline-bounded chunks and deflate-block-boundary checkpoints
//! ([`model`]) for an append-only gzip file, by driving a block-aware
//! inflater ([`inflate`]) over it once ([`builder`]).

pub mod builder;
pub mod error;
pub mod inflate;
pub mod model;
pub mod store;

pub use builder::{build_index, IndexOptions};
pub use error::IndexError;
pub use model::{Checkpoint, Chunk, FileIdentity};
pub use store::IndexStore;

use std::path::{Path, PathBuf};

/// High-level facade: owns an index store for one `.gz` file and knows how
/// to keep it in sync (`need_rebuild`/`build`), mirroring the original's
/// `dft::indexer::Indexer` RAII wrapper.
pub struct Indexer {
    gz_path: PathBuf,
    logical_name: String,
    store: IndexStore,
    opts: IndexOptions,
}

impl Indexer {
    pub fn open(gz_path: impl AsRef<Path>, idx_path: impl AsRef<Path>, opts: IndexOptions) -> Result<Self, IndexError> {
        let gz_path = gz_path.as_ref().to_path_buf();
        let logical_name = gz_path.to_string_lossy().into_owned();
        let store = IndexStore::open(idx_path.as_ref())?;
        Ok(Self { gz_path, logical_name, store, opts })
    }

    pub fn need_rebuild(&self) -> Result<bool, IndexError> {
        let current_sha = inflate::sha256_file(&self.gz_path)?;
        match self.store.get_file_identity(&self.logical_name)? {
            Some(identity) => Ok(identity.sha256_hex != current_sha),
            None => Ok(true),
        }
    }

    pub fn build(&mut self) -> Result<(), IndexError> {
        builder::build_index(&mut self.store, &self.gz_path, &self.logical_name, self.opts)
    }

    pub fn store(&self) -> &IndexStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut IndexStore {
        &mut self.store
    }

    pub fn file_id(&self) -> Result<Option<i64>, IndexError> {
        self.store.file_id(&self.logical_name)
    }
}
