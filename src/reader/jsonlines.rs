//! C5 — JSON-lines adapter atop the streaming reader.
use crate::reader::error::ReaderError;
use crate::reader::session::Reader;

/// Contract for parsing one line into an owned document. Implemented by
/// [`SerdeJsonParser`] by default; callers with their own tracer-specific
/// JSON library can supply their own impl instead.
pub trait DocumentParser {
    type Document;
    fn parse_document(&self, line: &[u8]) -> Result<Self::Document, ReaderError>;
}

/// Default `serde_json`-backed parser, used when the crate is exercised
/// standalone without a user-supplied JSON library.
pub struct SerdeJsonParser;

impl DocumentParser for SerdeJsonParser {
    type Document = serde_json::Value;
    fn parse_document(&self, line: &[u8]) -> Result<Self::Document, ReaderError> {
        serde_json::from_slice(line).map_err(|e| ReaderError::InvalidArgument(format!("malformed JSON line: {e}")))
    }
}

const READ_BUF: usize = 256 * 1024;

/// Parse every complete line in the uncompressed byte range `[start, end)`.
pub fn read_documents_by_byte_range<P: DocumentParser>(
    reader: &mut Reader,
    parser: &P,
    start: u64,
    end: u64,
) -> Result<Vec<P::Document>, ReaderError> {
    let mut out = Vec::new();
    let mut buf = vec![0u8; READ_BUF];
    loop {
        let n = reader.read_line_bytes(start, end, &mut buf)?;
        if n == 0 {
            break;
        }
        for line in buf[..n].split(|&b| b == b'\n') {
            if !line.is_empty() {
                out.push(parser.parse_document(line)?);
            }
        }
    }
    Ok(out)
}

/// Parse every line whose 1-based index lies in `[start_line, end_line]`.
pub fn read_documents_by_line_range<P: DocumentParser>(
    reader: &mut Reader,
    parser: &P,
    start_line: u64,
    end_line: u64,
) -> Result<Vec<P::Document>, ReaderError> {
    let text = reader.read_lines(start_line, end_line)?;
    text.lines().filter(|l| !l.is_empty()).map(|l| parser.parse_document(l.as_bytes())).collect()
}
