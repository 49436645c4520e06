use std::io::Write;

use flate2::write::GzEncoder;
use flate2::Compression;
use tempfile::tempdir;

use tracebag::gzindex::{build_index, IndexOptions, IndexStore};

fn write_gz_lines(path: &std::path::Path, lines: impl Iterator<Item = String>) {
    let file = std::fs::File::create(path).unwrap();
    let mut enc = GzEncoder::new(file, Compression::default());
    for line in lines {
        enc.write_all(line.as_bytes()).unwrap();
        enc.write_all(b"\n").unwrap();
    }
    enc.finish().unwrap();
}

#[test]
fn build_index_small_file_produces_one_chunk_no_checkpoints() {
    let dir = tempdir().unwrap();
    let gz_path = dir.path().join("trace.jsonl.gz");
    write_gz_lines(&gz_path, (0..50).map(|i| format!(r#"{{"id":{i}}}"#)));

    let idx_path = dir.path().join("trace.idx");
    let mut store = IndexStore::open(&idx_path).unwrap();
    build_index(&mut store, &gz_path, "trace", IndexOptions::default()).unwrap();

    let file_id = store.file_id("trace").unwrap().unwrap();
    let chunks = store.iter_chunks(file_id).unwrap();
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].num_events, 50);

    // No 32 KiB of output accumulated, so no checkpoint exists yet.
    assert!(store.find_checkpoint(file_id, 0).unwrap().is_none());
}

#[test]
fn build_index_large_file_produces_checkpoints_and_multiple_chunks() {
    let dir = tempdir().unwrap();
    let gz_path = dir.path().join("trace.jsonl.gz");
    // ~200 bytes/line * 5000 lines ~= 1 MiB uncompressed, enough for at
    // least one checkpoint past the 32 KiB minimum.
    let long_field = "x".repeat(150);
    write_gz_lines(&gz_path, (0..5000).map(|i| format!(r#"{{"id":{i},"pad":"{long_field}"}}"#)));

    let idx_path = dir.path().join("trace.idx");
    let mut store = IndexStore::open(&idx_path).unwrap();
    let opts = IndexOptions { chunk_target: 64 * 1024, checkpoint_interval: 64 * 1024 };
    build_index(&mut store, &gz_path, "trace", opts).unwrap();

    let file_id = store.file_id("trace").unwrap().unwrap();
    let chunks = store.iter_chunks(file_id).unwrap();
    assert!(chunks.len() > 1, "expected several chunks, got {}", chunks.len());

    let total_events: u64 = chunks.iter().map(|c| c.num_events).sum();
    assert_eq!(total_events, 5000);

    let cp = store.find_checkpoint(file_id, u64::MAX).unwrap();
    assert!(cp.is_some(), "expected at least one checkpoint for a file this size");
}

#[test]
fn build_index_is_idempotent_for_unchanged_file() {
    let dir = tempdir().unwrap();
    let gz_path = dir.path().join("trace.jsonl.gz");
    write_gz_lines(&gz_path, (0..10).map(|i| format!(r#"{{"id":{i}}}"#)));

    let idx_path = dir.path().join("trace.idx");
    let mut store = IndexStore::open(&idx_path).unwrap();
    build_index(&mut store, &gz_path, "trace", IndexOptions::default()).unwrap();
    let file_id_first = store.file_id("trace").unwrap().unwrap();

    // Rebuilding against the same bytes should skip the rewrite, not error.
    build_index(&mut store, &gz_path, "trace", IndexOptions::default()).unwrap();
    let file_id_second = store.file_id("trace").unwrap().unwrap();
    assert_eq!(file_id_first, file_id_second);
}

#[test]
fn build_index_rebuilds_when_file_identity_changes() {
    let dir = tempdir().unwrap();
    let gz_path = dir.path().join("trace.jsonl.gz");
    let idx_path = dir.path().join("trace.idx");
    let mut store = IndexStore::open(&idx_path).unwrap();

    write_gz_lines(&gz_path, (0..10).map(|i| format!(r#"{{"id":{i}}}"#)));
    build_index(&mut store, &gz_path, "trace", IndexOptions::default()).unwrap();
    let file_id = store.file_id("trace").unwrap().unwrap();
    let first_count = store.iter_chunks(file_id).unwrap()[0].num_events;

    write_gz_lines(&gz_path, (0..20).map(|i| format!(r#"{{"id":{i}}}"#)));
    build_index(&mut store, &gz_path, "trace", IndexOptions::default()).unwrap();
    let second_count = store.iter_chunks(file_id).unwrap()[0].num_events;

    assert_eq!(first_count, 10);
    assert_eq!(second_count, 20);
}
