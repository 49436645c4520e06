//! Block-boundary-aware deflate inflation.
//!
//! `flate2`'s safe `Decompress` wrapper has no equivalent of `Z_BLOCK`,
//! `inflatePrime`, or `inflateGetDictionary` — the three zlib primitives a
//! random-access reader needs — so this module talks to `libz-sys`
//! directly. The FFI surface is kept to this one file; everything above it
//! only sees [`Inflater`], [`Advance`], and [`IndexError`](crate::gzindex::error::IndexError).

use std::io;
use std::mem::MaybeUninit;

use libc::{c_int, c_uint};

use crate::gzindex::error::IndexError;
use crate::gzindex::model::DICT_WINDOW;

/// Outcome of advancing the inflater by one `Z_BLOCK` step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// More output may follow; `at_block_boundary` tells the caller whether
    /// a checkpoint could be taken right now.
    Progress { at_block_boundary: bool, bits: u8 },
    /// The stream is exhausted (`Z_STREAM_END`).
    End,
}

/// Mode an [`Inflater`] was initialized in.
enum Mode {
    /// zlib auto-detects a gzip or zlib header (`windowBits = 15 + 32`).
    Gzip,
    /// Raw deflate, no header, used when resuming from a checkpoint.
    Raw,
}

/// A single zlib inflate stream plus the scratch state needed to report
/// block boundaries and export/import 32 KiB dictionaries.
pub struct Inflater {
    strm: Box<libz_sys::z_stream>,
    mode: Mode,
    finished: bool,
}

impl Inflater {
    /// Start inflating a gzip member from its first byte.
    pub fn new_gzip() -> Result<Self, IndexError> {
        Self::init(47, Mode::Gzip) // 15 + 32: auto-detect gzip/zlib header
    }

    /// Start a raw-deflate stream, to be primed immediately via
    /// [`Inflater::resume`].
    pub fn new_raw() -> Result<Self, IndexError> {
        Self::init(-15, Mode::Raw)
    }

    fn init(window_bits: c_int, mode: Mode) -> Result<Self, IndexError> {
        unsafe {
            let mut strm: Box<libz_sys::z_stream> = Box::new(MaybeUninit::zeroed().assume_init());
            let rc = libz_sys::inflateInit2_(
                strm.as_mut(),
                window_bits,
                libz_sys::zlibVersion(),
                std::mem::size_of::<libz_sys::z_stream>() as c_int,
            );
            if rc != libz_sys::Z_OK {
                return Err(IndexError::Compression(format!("inflateInit2 failed with code {rc}")));
            }
            Ok(Self { strm, mode, finished: false })
        }
    }

    /// Re-point the inflater at a checkpoint: prime the straddling bits and
    /// install the 32 KiB dictionary. `bits` and `dict` come from a
    /// [`crate::gzindex::model::Checkpoint`]; `straddle_byte` is the single
    /// compressed byte read from `c_offset - 1` when `bits != 0`.
    pub fn resume(&mut self, bits: u8, straddle_byte: Option<u8>, dict: &[u8; DICT_WINDOW]) -> Result<(), IndexError> {
        debug_assert!(matches!(self.mode, Mode::Raw));
        unsafe {
            let rc = libz_sys::inflateReset2(self.strm.as_mut(), -15);
            if rc != libz_sys::Z_OK {
                return Err(IndexError::Compression("inflateReset2 failed".to_string()));
            }
            if bits != 0 {
                let ch = straddle_byte.ok_or_else(|| {
                    IndexError::Initialization("checkpoint has bits but no straddle byte".to_string())
                })?;
                let prime_value = (ch as c_int) >> (8 - bits as c_int);
                let rc = libz_sys::inflatePrime(self.strm.as_mut(), bits as c_int, prime_value);
                if rc != libz_sys::Z_OK {
                    return Err(IndexError::Compression("inflatePrime failed".to_string()));
                }
            }
            let rc = libz_sys::inflateSetDictionary(self.strm.as_mut(), dict.as_ptr(), dict.len() as c_uint);
            if rc != libz_sys::Z_OK {
                return Err(IndexError::Compression("inflateSetDictionary failed".to_string()));
            }
        }
        self.finished = false;
        Ok(())
    }

    /// Feed `input` (may be a subslice of a larger read buffer; `next_in`
    /// only needs to stay valid for the duration of this call) and write
    /// decompressed bytes into `out`. Returns `(consumed, produced,
    /// advance)`.
    pub fn step(&mut self, input: &[u8], out: &mut [u8]) -> Result<(usize, usize, Advance), IndexError> {
        if self.finished {
            return Ok((0, 0, Advance::End));
        }
        unsafe {
            self.strm.next_in = input.as_ptr() as *mut u8;
            self.strm.avail_in = input.len() as c_uint;
            self.strm.next_out = out.as_mut_ptr();
            self.strm.avail_out = out.len() as c_uint;

            let rc = libz_sys::inflate(self.strm.as_mut(), libz_sys::Z_BLOCK);
            let consumed = input.len() - self.strm.avail_in as usize;
            let produced = out.len() - self.strm.avail_out as usize;

            match rc {
                libz_sys::Z_OK | libz_sys::Z_BUF_ERROR => {
                    let at_boundary = (self.strm.data_type & 0xc0) == 0x80;
                    let bits = (self.strm.data_type & 0x07) as u8;
                    Ok((consumed, produced, Advance::Progress { at_block_boundary: at_boundary, bits }))
                }
                libz_sys::Z_STREAM_END => {
                    self.finished = true;
                    Ok((consumed, produced, Advance::End))
                }
                other => Err(IndexError::Compression(format!("inflate failed with code {other}: {}", self.msg()))),
            }
        }
    }

    /// Export up to 32 KiB of the most recently produced uncompressed
    /// bytes, right-aligned and zero-padded on the left. Returns `None` if
    /// fewer than 32 KiB have been produced so far (matching the original
    /// indexer's rule that no checkpoint exists before the window fills).
    pub fn export_dictionary(&mut self) -> Result<Option<[u8; DICT_WINDOW]>, IndexError> {
        let mut raw = [0u8; DICT_WINDOW];
        let mut have: c_uint = 0;
        unsafe {
            let rc = libz_sys::inflateGetDictionary(self.strm.as_mut(), raw.as_mut_ptr(), &mut have);
            if rc != libz_sys::Z_OK {
                return Err(IndexError::Compression("inflateGetDictionary failed".to_string()));
            }
        }
        if (have as usize) < DICT_WINDOW {
            return Ok(None);
        }
        Ok(Some(raw))
    }

    fn msg(&self) -> String {
        unsafe {
            if self.strm.msg.is_null() {
                "<no message>".to_string()
            } else {
                std::ffi::CStr::from_ptr(self.strm.msg).to_string_lossy().into_owned()
            }
        }
    }
}

impl Drop for Inflater {
    fn drop(&mut self) {
        unsafe {
            libz_sys::inflateEnd(self.strm.as_mut());
        }
    }
}

/// Compress a 32 KiB dictionary window for storage as a `Checkpoint::dict_compressed` blob.
pub fn compress_dictionary(dict: &[u8; DICT_WINDOW]) -> io::Result<Vec<u8>> {
    use flate2::write::DeflateEncoder;
    use flate2::Compression;
    use std::io::Write;
    let mut enc = DeflateEncoder::new(Vec::new(), Compression::default());
    enc.write_all(dict)?;
    enc.finish()
}

/// Inverse of [`compress_dictionary`].
pub fn decompress_dictionary(blob: &[u8]) -> io::Result<[u8; DICT_WINDOW]> {
    use flate2::read::DeflateDecoder;
    use std::io::Read;
    let mut dec = DeflateDecoder::new(blob);
    let mut out = [0u8; DICT_WINDOW];
    dec.read_exact(&mut out)?;
    Ok(out)
}

/// Compute SHA-256 of an entire file, streaming, for `FileIdentity`.
pub fn sha256_file(path: &std::path::Path) -> io::Result<String> {
    use sha2::{Digest, Sha256};
    use std::io::Read;
    let mut f = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = f.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}
