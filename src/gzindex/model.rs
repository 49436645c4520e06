//! Persisted row types for the gzip sidecar index.
use serde::{Deserialize, Serialize};

/// A newline-bounded uncompressed range, with its compressed counterpart.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub chunk_idx: u64,
    pub c_offset: u64,
    pub c_size: u64,
    pub uc_offset: u64,
    pub uc_size: u64,
    pub num_events: u64,
}

impl Chunk {
    #[inline]
    pub fn uc_end(&self) -> u64 {
        self.uc_offset + self.uc_size
    }

    #[inline]
    pub fn contains_uc(&self, pos: u64) -> bool {
        pos >= self.uc_offset && pos < self.uc_end()
    }
}

/// A deflate-block-boundary resume point: 32 KiB of dictionary, compressed.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Checkpoint {
    pub uc_offset: u64,
    pub c_offset: u64,
    pub bits: u8,
    /// `deflate`-compressed copy of the 32 KiB sliding-window dictionary,
    /// right-aligned and zero-padded on the left if fewer bytes existed.
    pub dict_compressed: Vec<u8>,
}

pub const DICT_WINDOW: usize = 32 * 1024;
pub const DEFAULT_CHECKPOINT_INTERVAL: u64 = 32 * 1024 * 1024;
pub const DEFAULT_CHUNK_TARGET: u64 = 4 * 1024 * 1024;
pub const MIN_CHECKPOINT_UC_OFFSET: u64 = DICT_WINDOW as u64;

/// Identity of the source file an index was built for.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct FileIdentity {
    pub logical_name: String,
    pub byte_size: u64,
    pub mtime_unix: i64,
    pub sha256_hex: String,
}
