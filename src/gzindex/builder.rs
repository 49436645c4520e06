//! C2 — single-pass index builder.
use std::fs::File;
use std::io::Read;
use std::path::Path;

use tracing::{debug, info, instrument};

use crate::gzindex::error::IndexError;
use crate::gzindex::inflate::{compress_dictionary, sha256_file, Advance, Inflater};
use crate::gzindex::model::{
    Checkpoint, Chunk, FileIdentity, DEFAULT_CHECKPOINT_INTERVAL, DEFAULT_CHUNK_TARGET,
    MIN_CHECKPOINT_UC_OFFSET,
};
use crate::gzindex::store::IndexStore;

/// Tunables for [`build_index`], in the teacher's plain-struct-with-`Default` idiom.
#[derive(Debug, Clone, Copy)]
pub struct IndexOptions {
    pub chunk_target: u64,
    pub checkpoint_interval: u64,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            chunk_target: DEFAULT_CHUNK_TARGET,
            checkpoint_interval: DEFAULT_CHECKPOINT_INTERVAL,
        }
    }
}

const SCRATCH_SIZE: usize = 64 * 1024;
const READ_SIZE: usize = 64 * 1024;

/// Scan `path` once, replacing any existing index rows for `logical_name`
/// with freshly computed chunks and checkpoints.
#[instrument(skip(store, opts), fields(path = %path.display()))]
pub fn build_index(
    store: &mut IndexStore,
    path: &Path,
    logical_name: &str,
    opts: IndexOptions,
) -> Result<(), IndexError> {
    let meta = std::fs::metadata(path)?;
    let sha256_hex = sha256_file(path)?;
    let identity = FileIdentity {
        logical_name: logical_name.to_string(),
        byte_size: meta.len(),
        mtime_unix: meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0),
        sha256_hex,
    };

    if let Some(existing) = store.get_file_identity(logical_name)? {
        if existing.sha256_hex == identity.sha256_hex {
            debug!(logical_name, "index already up to date, skipping rebuild");
            return Ok(());
        }
    }

    let mtime = chrono::DateTime::from_timestamp(identity.mtime_unix, 0)
        .map(|t| t.to_rfc3339())
        .unwrap_or_default();
    info!(logical_name, mtime, "rebuilding gzip index");
    let file_id = store.begin_rebuild(&identity)?;

    let mut file = File::open(path)?;
    let mut inflater = Inflater::new_gzip()?;

    let mut read_buf = [0u8; READ_SIZE];
    let mut scratch = [0u8; SCRATCH_SIZE];
    let mut read_pos: usize = 0;
    let mut read_len: usize = 0;

    let mut uc_pos: u64 = 0;
    let mut c_pos: u64 = 0;
    let mut chunk_idx: u64 = 0;
    let mut chunk_uc_start: u64 = 0;
    let mut chunk_c_start: u64 = 0;
    let mut events_in_chunk: u64 = 0;
    let mut last_checkpoint_uc: Option<u64> = None;

    loop {
        // Reset every iteration, like the original's `last_newline_pos`:
        // the chunk-close check below only trusts a newline found in the
        // block that just crossed the threshold, not one from several
        // blocks back.
        let mut last_newline_uc: Option<u64> = None;

        if read_pos >= read_len {
            read_len = file.read(&mut read_buf)?;
            read_pos = 0;
        }
        let input = &read_buf[read_pos..read_len];
        let (consumed, produced, advance) = inflater.step(input, &mut scratch)?;
        read_pos += consumed;
        c_pos += consumed as u64;

        if produced > 0 {
            for (i, &b) in scratch[..produced].iter().enumerate() {
                if b == b'\n' {
                    events_in_chunk += 1;
                    last_newline_uc = Some(uc_pos + i as u64 + 1);
                }
            }
            uc_pos += produced as u64;
        }

        if let Advance::Progress { at_block_boundary, .. } = advance {
            if at_block_boundary {
                let due = uc_pos >= MIN_CHECKPOINT_UC_OFFSET
                    && last_checkpoint_uc
                        .map(|last| uc_pos - last >= opts.checkpoint_interval)
                        .unwrap_or(true);
                if due {
                    if let Some(dict) = inflater.export_dictionary()? {
                        let bits = (inflater_bits_hint(&advance)) as u8;
                        let dict_compressed = compress_dictionary(&dict)
                            .map_err(|e| IndexError::Compression(e.to_string()))?;
                        store.put_checkpoint(
                            file_id,
                            &Checkpoint { uc_offset: uc_pos, c_offset: c_pos, bits, dict_compressed },
                        )?;
                        last_checkpoint_uc = Some(uc_pos);
                    }
                }
            }
        }

        if uc_pos - chunk_uc_start >= opts.chunk_target {
            if let Some(boundary) = last_newline_uc.filter(|&b| b > chunk_uc_start) {
                store.put_chunk(
                    file_id,
                    &Chunk {
                        chunk_idx,
                        c_offset: chunk_c_start,
                        c_size: c_pos - chunk_c_start,
                        uc_offset: chunk_uc_start,
                        uc_size: boundary - chunk_uc_start,
                        num_events: events_in_chunk,
                    },
                )?;
                chunk_idx += 1;
                chunk_uc_start = boundary;
                chunk_c_start = c_pos;
                events_in_chunk = 0;
            }
        }

        if matches!(advance, Advance::End) {
            break;
        }
        if read_len == 0 && consumed == 0 && produced == 0 {
            return Err(IndexError::Compression("truncated gzip stream".to_string()));
        }
    }

    if uc_pos > chunk_uc_start {
        store.put_chunk(
            file_id,
            &Chunk {
                chunk_idx,
                c_offset: chunk_c_start,
                c_size: c_pos - chunk_c_start,
                uc_offset: chunk_uc_start,
                uc_size: uc_pos - chunk_uc_start,
                num_events: events_in_chunk,
            },
        )?;
    }

    store.commit_rebuild(file_id, opts.chunk_target, opts.checkpoint_interval)?;
    info!(logical_name, chunks = chunk_idx + 1, "index rebuild complete");
    Ok(())
}

/// `inflater.step` only reports `bits` via `Advance::Progress`; this pulls
/// it back out for the checkpoint row without re-threading the whole match.
fn inflater_bits_hint(advance: &Advance) -> u8 {
    match advance {
        Advance::Progress { bits, .. } => *bits,
        Advance::End => 0,
    }
}
