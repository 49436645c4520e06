//! C4 — streaming reader with a checkpoint-resuming inflate cursor.
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::{debug, trace};

use crate::gzindex::inflate::{decompress_dictionary, Advance, Inflater};
use crate::gzindex::model::Checkpoint;
use crate::gzindex::store::IndexStore;
use crate::reader::error::ReaderError;

const READ_SIZE: usize = 64 * 1024;
const LOOKBACK_WINDOW: u64 = 512;
const SMALL_RANGE_CAP: u64 = 1024 * 1024;

/// Ported from `original_source/src/reader/reader.cpp`'s
/// `FIRST_CHECKPOINT_THRESHOLD`: below this target, prefer the very first
/// checkpoint over one nearer but still below the threshold.
const FIRST_CHECKPOINT_THRESHOLD: u64 = 33_554_401;

/// Advances a raw-deflate inflater that was just resumed from a checkpoint,
/// tracking the uncompressed position so callers can skip or read.
struct InflateCursor {
    file: File,
    inflater: Inflater,
    read_buf: Box<[u8; READ_SIZE]>,
    read_pos: usize,
    read_len: usize,
    uc_pos: u64,
    finished: bool,
}

impl InflateCursor {
    /// Start decoding from the very beginning of the gzip file, for when no
    /// checkpoint exists yet (small files never accumulate the 32 KiB
    /// window a checkpoint needs). Mirrors the original reader's
    /// `inflate_init(..., 0, 0)` fallback when `find_checkpoint` fails.
    fn from_start(path: &Path) -> Result<Self, ReaderError> {
        let file = File::open(path)?;
        let inflater = Inflater::new_gzip()?;
        Ok(Self {
            file,
            inflater,
            read_buf: Box::new([0u8; READ_SIZE]),
            read_pos: 0,
            read_len: 0,
            uc_pos: 0,
            finished: false,
        })
    }

    fn from_checkpoint(path: &Path, cp: &Checkpoint) -> Result<Self, ReaderError> {
        let mut file = File::open(path)?;
        let seek_to = cp.c_offset.saturating_sub(if cp.bits != 0 { 1 } else { 0 });
        file.seek(SeekFrom::Start(seek_to))?;

        let straddle_byte = if cp.bits != 0 {
            let mut b = [0u8; 1];
            file.read_exact(&mut b)?;
            Some(b[0])
        } else {
            None
        };

        let dict = decompress_dictionary(&cp.dict_compressed)
            .map_err(|e| ReaderError::Compression(e.to_string()))?;
        let mut inflater = Inflater::new_raw()?;
        inflater.resume(cp.bits, straddle_byte, &dict)?;

        Ok(Self {
            file,
            inflater,
            read_buf: Box::new([0u8; READ_SIZE]),
            read_pos: 0,
            read_len: 0,
            uc_pos: cp.uc_offset,
            finished: false,
        })
    }

    /// Discard exactly `n` uncompressed bytes.
    fn skip(&mut self, mut n: u64) -> Result<(), ReaderError> {
        let mut sink = [0u8; 8192];
        while n > 0 {
            let want = n.min(sink.len() as u64) as usize;
            let got = self.read_into(&mut sink[..want])?;
            if got == 0 {
                return Err(ReaderError::InvalidArgument("skip ran past end of stream".to_string()));
            }
            n -= got as u64;
        }
        Ok(())
    }

    /// Fill `out` as much as possible; returns bytes written (0 only at EOF).
    fn read_into(&mut self, out: &mut [u8]) -> Result<usize, ReaderError> {
        if self.finished || out.is_empty() {
            return Ok(0);
        }
        loop {
            if self.read_pos >= self.read_len {
                self.read_len = self.file.read(&mut *self.read_buf)?;
                self.read_pos = 0;
            }
            let input = &self.read_buf[self.read_pos..self.read_len];
            let (consumed, produced, advance) = self.inflater.step(input, out)?;
            self.read_pos += consumed;
            self.uc_pos += produced as u64;
            if matches!(advance, Advance::End) {
                self.finished = true;
            }
            if produced > 0 {
                return Ok(produced);
            }
            if self.read_len == 0 {
                // no more compressed input and no output produced: real EOF
                self.finished = true;
                return Ok(0);
            }
            // block-only progress (no output yet); loop and pull more input
        }
    }
}

/// Which alignment a session enforces on its output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    Raw,
    LineAligned,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    Uninit,
    Initialized,
    Streaming,
    Finished,
}

struct Session {
    start: u64,
    end: u64,
    mode: SessionMode,
    state: SessionState,
    cursor: Option<InflateCursor>,
    carry: Vec<u8>,
    bytes_emitted: u64,
}

/// A random-access reader over one gzip file, backed by a shared index store.
pub struct Reader {
    path: PathBuf,
    store: Arc<Mutex<IndexStore>>,
    file_id: i64,
    session: Option<Session>,
}

impl Reader {
    pub fn open(path: impl AsRef<Path>, store: Arc<Mutex<IndexStore>>, logical_name: &str) -> Result<Self, ReaderError> {
        let file_id = store
            .lock()
            .unwrap()
            .file_id(logical_name)?
            .ok_or_else(|| ReaderError::Initialization(format!("no index for file: {}", path.as_ref().display())))?;
        Ok(Self { path: path.as_ref().to_path_buf(), store, file_id, session: None })
    }

    pub fn max_bytes(&self) -> Result<u64, ReaderError> {
        let chunks = self.store.lock().unwrap().iter_chunks(self.file_id)?;
        Ok(chunks.last().map(|c| c.uc_end()).unwrap_or(0))
    }

    pub fn num_lines(&self) -> Result<u64, ReaderError> {
        let chunks = self.store.lock().unwrap().iter_chunks(self.file_id)?;
        Ok(chunks.iter().map(|c| c.num_events).sum())
    }

    pub fn reset(&mut self) {
        self.session = None;
    }

    /// Checkpoint to resume from for a target uncompressed offset, per
    /// `try_initialize_with_checkpoint`: below the threshold, prefer the
    /// very first checkpoint over one nearer but still below it; only
    /// above the threshold, look up the checkpoint nearest `target`.
    fn find_resume_checkpoint(&self, target: u64) -> Result<Option<Checkpoint>, ReaderError> {
        let store = self.store.lock().unwrap();
        let cp = if target < FIRST_CHECKPOINT_THRESHOLD {
            store.find_checkpoint(self.file_id, 0)?
        } else {
            store.find_checkpoint(self.file_id, target)?
        };
        Ok(cp)
    }

    fn ensure_session(&mut self, start: u64, end: u64, mode: SessionMode) -> Result<(), ReaderError> {
        if end < start {
            return Err(ReaderError::InvalidArgument(format!("end < start ({start}..{end})")));
        }
        let needs_new = match &self.session {
            Some(s) => s.start != start || s.end != end || s.mode != mode || s.state == SessionState::Finished,
            None => true,
        };
        if !needs_new {
            return Ok(());
        }
        debug!(start, end, ?mode, "opening new reader session");

        let aligned_start = match mode {
            SessionMode::Raw => start,
            SessionMode::LineAligned => self.locate_line_start(start)?,
        };

        let cp = self.find_resume_checkpoint(aligned_start)?;
        let mut cursor = match cp {
            Some(cp) => InflateCursor::from_checkpoint(&self.path, &cp)?,
            None => InflateCursor::from_start(&self.path)?,
        };
        if aligned_start > cursor.uc_pos {
            cursor.skip(aligned_start - cursor.uc_pos)?;
        }

        self.session = Some(Session {
            start: aligned_start,
            end,
            mode,
            state: SessionState::Initialized,
            cursor: Some(cursor),
            carry: Vec::new(),
            bytes_emitted: 0,
        });
        Ok(())
    }

    /// Nearest `\n`-aligned position at or before `start`, per §4.4 "Start alignment".
    fn locate_line_start(&mut self, start: u64) -> Result<u64, ReaderError> {
        if start == 0 {
            return Ok(0);
        }
        let lookback_start = start.saturating_sub(LOOKBACK_WINDOW);
        let cp = self.find_resume_checkpoint(lookback_start)?;
        let mut cursor = match cp {
            Some(cp) => InflateCursor::from_checkpoint(&self.path, &cp)?,
            None => InflateCursor::from_start(&self.path)?,
        };
        if lookback_start > cursor.uc_pos {
            cursor.skip(lookback_start - cursor.uc_pos)?;
        }
        let mut window = vec![0u8; (start - lookback_start) as usize];
        let mut filled = 0;
        while filled < window.len() {
            let n = cursor.read_into(&mut window[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        window.truncate(filled);
        match window.iter().rposition(|&b| b == b'\n') {
            Some(idx) => Ok(lookback_start + idx as u64 + 1),
            None => Ok(lookback_start),
        }
    }

    /// Raw-byte read: up to `buf.len()` bytes of `[start, end)`, no line alignment.
    pub fn read(&mut self, start: u64, end: u64, buf: &mut [u8]) -> Result<usize, ReaderError> {
        self.ensure_session(start, end, SessionMode::Raw)?;
        let sess = self.session.as_mut().expect("just ensured");
        if sess.state == SessionState::Finished {
            return Ok(0);
        }
        let remaining = sess.end.saturating_sub(sess.start + sess.bytes_emitted);
        if remaining == 0 {
            sess.state = SessionState::Finished;
            return Ok(0);
        }
        let cap = (buf.len() as u64).min(remaining) as usize;
        let cursor = sess.cursor.as_mut().expect("raw session always has a cursor");
        let n = cursor.read_into(&mut buf[..cap])?;
        sess.bytes_emitted += n as u64;
        sess.state = if n == 0 { SessionState::Finished } else { SessionState::Streaming };
        Ok(n)
    }

    /// Line-aligned read: every returned buffer ends at a `\n` (or EOF).
    pub fn read_line_bytes(&mut self, start: u64, end: u64, buf: &mut [u8]) -> Result<usize, ReaderError> {
        self.ensure_session(start, end, SessionMode::LineAligned)?;
        let sess = self.session.as_mut().expect("just ensured");
        if sess.state == SessionState::Finished {
            return Ok(0);
        }
        let small_range = end - start < SMALL_RANGE_CAP;
        let cursor = sess.cursor.as_mut().expect("line session always has a cursor");

        // Fill `scratch` from carryover + fresh inflate output, never reading
        // past `end` by more than one block's worth for small ranges.
        let mut scratch = std::mem::take(&mut sess.carry);
        loop {
            if let Some(last_nl) = scratch.iter().rposition(|&b| b == b'\n') {
                let take = (last_nl + 1).min(buf.len());
                if take > 0 {
                    buf[..take].copy_from_slice(&scratch[..take]);
                    sess.carry = scratch[take..].to_vec();
                    sess.bytes_emitted += take as u64;
                    sess.state = SessionState::Streaming;
                    return Ok(take);
                }
            }
            let remaining_to_end = sess.end.saturating_sub(sess.start + sess.bytes_emitted + scratch.len() as u64);
            if remaining_to_end == 0 && !small_range {
                // large range: allowed to overrun to finish the final line
            } else if remaining_to_end == 0 && small_range && !scratch.is_empty() {
                // small range exhausted without a trailing newline: flush what's left
                let take = scratch.len().min(buf.len());
                buf[..take].copy_from_slice(&scratch[..take]);
                sess.carry.clear();
                sess.bytes_emitted += take as u64;
                sess.state = SessionState::Finished;
                return Ok(take);
            }
            let mut chunk = [0u8; 8192];
            let want = if small_range { (remaining_to_end as usize).min(chunk.len()).max(1) } else { chunk.len() };
            let n = cursor.read_into(&mut chunk[..want])?;
            if n == 0 {
                let take = scratch.len().min(buf.len());
                buf[..take].copy_from_slice(&scratch[..take]);
                sess.carry.clear();
                sess.bytes_emitted += take as u64;
                sess.state = SessionState::Finished;
                return Ok(take);
            }
            scratch.extend_from_slice(&chunk[..n]);
        }
    }

    /// Concatenated content of 1-based lines `[start_line, end_line]`.
    pub fn read_lines(&mut self, start_line: u64, end_line: u64) -> Result<String, ReaderError> {
        if start_line == 0 || end_line < start_line {
            return Err(ReaderError::InvalidArgument("invalid line range".to_string()));
        }
        let max_bytes = self.max_bytes()?;
        self.ensure_session(0, max_bytes, SessionMode::LineAligned)?;
        let mut out = String::new();
        let mut buf = vec![0u8; 64 * 1024];
        let mut line_no: u64 = 0;
        loop {
            let n = self.read_line_bytes(0, max_bytes, &mut buf)?;
            if n == 0 {
                break;
            }
            for line in buf[..n].split_inclusive(|&b| b == b'\n') {
                line_no += 1;
                if line_no >= start_line && line_no <= end_line {
                    out.push_str(&String::from_utf8_lossy(line));
                }
                if line_no > end_line {
                    return Ok(out);
                }
            }
        }
        trace!(start_line, end_line, found = line_no, "read_lines exhausted input");
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gzindex::model::Checkpoint;

    fn reader_with_checkpoints(uc_offsets: &[u64]) -> Reader {
        let mut store = IndexStore::open(Path::new(":memory:")).unwrap();
        for &uc_offset in uc_offsets {
            store
                .put_checkpoint(1, &Checkpoint { uc_offset, c_offset: uc_offset / 2, bits: 0, dict_compressed: Vec::new() })
                .unwrap();
        }
        Reader { path: PathBuf::from("unused"), store: Arc::new(Mutex::new(store)), file_id: 1, session: None }
    }

    #[test]
    fn below_threshold_prefers_first_checkpoint_over_nearer_one() {
        let reader = reader_with_checkpoints(&[100, 10_000_000]);
        let cp = reader.find_resume_checkpoint(20_000_000).unwrap().unwrap();
        assert_eq!(cp.uc_offset, 100);
    }

    #[test]
    fn at_or_above_threshold_uses_nearest_checkpoint() {
        let reader = reader_with_checkpoints(&[100, 10_000_000]);
        let cp = reader.find_resume_checkpoint(FIRST_CHECKPOINT_THRESHOLD).unwrap().unwrap();
        assert_eq!(cp.uc_offset, 10_000_000);
    }

    #[test]
    fn below_threshold_with_no_checkpoints_returns_none() {
        let reader = reader_with_checkpoints(&[]);
        assert!(reader.find_resume_checkpoint(1_000).unwrap().is_none());
    }
}
