use std::io::Write;
use std::sync::{Arc, Mutex};

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use flate2::write::GzEncoder;
use flate2::Compression;
use tempfile::tempdir;

use tracebag::gzindex::{build_index, IndexOptions, IndexStore};
use tracebag::reader::Reader;

fn build_bench_trace(dir: &std::path::Path, n: usize) -> (std::path::PathBuf, std::path::PathBuf) {
    let gz_path = dir.join("bench.jsonl.gz");
    let idx_path = dir.join("bench.idx");
    let file = std::fs::File::create(&gz_path).unwrap();
    let mut enc = GzEncoder::new(file, Compression::default());
    let pad = "z".repeat(120);
    for i in 0..n {
        writeln!(enc, r#"{{"id":{i},"pad":"{pad}"}}"#).unwrap();
    }
    enc.finish().unwrap();

    let mut store = IndexStore::open(&idx_path).unwrap();
    let opts = IndexOptions { chunk_target: 256 * 1024, checkpoint_interval: 256 * 1024 };
    build_index(&mut store, &gz_path, "bench", opts).unwrap();
    (gz_path, idx_path)
}

fn bench_read_lines(c: &mut Criterion) {
    let dir = tempdir().unwrap();
    let (gz_path, idx_path) = build_bench_trace(dir.path(), 50_000);
    let store = Arc::new(Mutex::new(IndexStore::open(&idx_path).unwrap()));

    c.bench_function("read_1000_lines_near_start", |b| {
        b.iter(|| {
            let mut reader = Reader::open(&gz_path, Arc::clone(&store), "bench").unwrap();
            let text = reader.read_lines(black_box(1), black_box(1000)).unwrap();
            black_box(text.len())
        })
    });

    c.bench_function("read_1000_lines_near_checkpoint_resume", |b| {
        b.iter(|| {
            let mut reader = Reader::open(&gz_path, Arc::clone(&store), "bench").unwrap();
            let text = reader.read_lines(black_box(40_000), black_box(41_000)).unwrap();
            black_box(text.len())
        })
    });
}

criterion_group!(benches, bench_read_lines);
criterion_main!(benches);
