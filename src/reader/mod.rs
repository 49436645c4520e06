//! C4/C5 — random-access streaming reader and its JSON-lines adapter.
pub mod error;
pub mod jsonlines;
pub mod session;

pub use error::ReaderError;
pub use jsonlines::{read_documents_by_byte_range, read_documents_by_line_range, DocumentParser, SerdeJsonParser};
pub use session::{Reader, SessionMode};
