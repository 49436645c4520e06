use std::io::Write;
use std::sync::{Arc, Mutex};

use flate2::write::GzEncoder;
use flate2::Compression;
use tempfile::tempdir;

use tracebag::gzindex::{build_index, IndexOptions, IndexStore};
use tracebag::reader::{read_documents_by_line_range, Reader};

fn make_trace(dir: &std::path::Path, n: usize, pad_len: usize) -> (std::path::PathBuf, std::path::PathBuf) {
    let gz_path = dir.join("trace.jsonl.gz");
    let idx_path = dir.join("trace.idx");
    let file = std::fs::File::create(&gz_path).unwrap();
    let mut enc = GzEncoder::new(file, Compression::default());
    let pad = "y".repeat(pad_len);
    for i in 0..n {
        writeln!(enc, r#"{{"id":{i},"pad":"{pad}"}}"#).unwrap();
    }
    enc.finish().unwrap();
    (gz_path, idx_path)
}

#[test]
fn read_lines_small_file_falls_back_to_from_start_cursor() {
    let dir = tempdir().unwrap();
    let (gz_path, idx_path) = make_trace(dir.path(), 20, 0);

    let mut store = IndexStore::open(&idx_path).unwrap();
    build_index(&mut store, &gz_path, "trace", IndexOptions::default()).unwrap();
    let store = Arc::new(Mutex::new(store));

    let mut reader = Reader::open(&gz_path, store, "trace").unwrap();
    let text = reader.read_lines(1, 3).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].contains(r#""id":0"#));
    assert!(lines[2].contains(r#""id":2"#));
}

#[test]
fn read_lines_past_checkpoint_boundary_resumes_correctly() {
    let dir = tempdir().unwrap();
    // Pad lines so the file comfortably crosses the 32 KiB checkpoint
    // minimum with a handful of checkpoints to resume from.
    let (gz_path, idx_path) = make_trace(dir.path(), 3000, 200);

    let mut store = IndexStore::open(&idx_path).unwrap();
    let opts = IndexOptions { chunk_target: 32 * 1024, checkpoint_interval: 32 * 1024 };
    build_index(&mut store, &gz_path, "trace", opts).unwrap();
    let store = Arc::new(Mutex::new(store));

    let mut reader = Reader::open(&gz_path, store, "trace").unwrap();
    let num_lines = reader.num_lines().unwrap();
    assert_eq!(num_lines, 3000);

    let text = reader.read_lines(2500, 2502).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].contains(r#""id":2499"#));
    assert!(lines[2].contains(r#""id":2501"#));
}

#[test]
fn raw_byte_read_never_exceeds_requested_window() {
    let dir = tempdir().unwrap();
    let (gz_path, idx_path) = make_trace(dir.path(), 50, 0);

    let mut store = IndexStore::open(&idx_path).unwrap();
    build_index(&mut store, &gz_path, "trace", IndexOptions::default()).unwrap();
    let store = Arc::new(Mutex::new(store));

    let mut reader = Reader::open(&gz_path, store, "trace").unwrap();
    let mut buf = [0u8; 16];
    let n = reader.read(0, 16, &mut buf).unwrap();
    assert!(n <= 16);
}

#[test]
fn read_documents_by_line_range_parses_json() {
    let dir = tempdir().unwrap();
    let (gz_path, idx_path) = make_trace(dir.path(), 10, 0);

    let mut store = IndexStore::open(&idx_path).unwrap();
    build_index(&mut store, &gz_path, "trace", IndexOptions::default()).unwrap();
    let store = Arc::new(Mutex::new(store));

    let mut reader = Reader::open(&gz_path, store, "trace").unwrap();
    let docs = read_documents_by_line_range(&mut reader, &tracebag::reader::SerdeJsonParser, 1, 5).unwrap();
    assert_eq!(docs.len(), 5);
    assert_eq!(docs[0]["id"], 0);
    assert_eq!(docs[4]["id"], 4);
}
