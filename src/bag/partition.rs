//! C8 — pure partitioning utilities shared by every execution context.
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Split `items` into `n` partitions by position: partition `floor(i /
/// ceil(N/n))`, matching the original sequential context's
/// `execute_repartition_impl`.
pub fn by_count<T>(items: Vec<T>, n: usize) -> Vec<Vec<T>> {
    if n == 0 || items.is_empty() {
        return Vec::new();
    }
    let total = items.len();
    let partition_size = (total + n - 1) / n;
    let mut out: Vec<Vec<T>> = (0..n).map(|_| Vec::new()).collect();
    for (i, item) in items.into_iter().enumerate() {
        let idx = (i / partition_size).min(n - 1);
        out[idx].push(item);
    }
    out
}

/// Same partition assignment as [`by_count`] but by `i mod n`, used by
/// worker-pool contexts that dispatch round-robin rather than by
/// contiguous block.
pub fn by_count_round_robin<T>(items: Vec<T>, n: usize) -> Vec<Vec<T>> {
    if n == 0 || items.is_empty() {
        return Vec::new();
    }
    let mut out: Vec<Vec<T>> = (0..n).map(|_| Vec::new()).collect();
    for (i, item) in items.into_iter().enumerate() {
        out[i % n].push(item);
    }
    out
}

/// Exact byte-bounded partitioning: flush the running partition whenever
/// adding the next element would exceed `target_bytes` (unless it's empty).
pub fn by_bytes_exact<T>(items: Vec<T>, target_bytes: usize, size_of: impl Fn(&T) -> usize) -> Vec<Vec<T>> {
    let mut out = Vec::new();
    let mut current = Vec::new();
    let mut current_bytes = 0usize;
    for item in items {
        let sz = size_of(&item);
        if !current.is_empty() && current_bytes + sz > target_bytes {
            out.push(std::mem::take(&mut current));
            current_bytes = 0;
        }
        current_bytes += sz;
        current.push(item);
    }
    if !current.is_empty() {
        out.push(current);
    }
    out
}

/// Estimated byte-bounded partitioning: sample up to 100 elements to
/// estimate an average size, then partition by count.
pub fn by_bytes_estimated<T>(items: Vec<T>, target_bytes: usize, size_of: impl Fn(&T) -> usize) -> Vec<Vec<T>> {
    if items.is_empty() || target_bytes == 0 {
        return Vec::new();
    }
    let sample_n = items.len().min(100);
    let sample_total: usize = items[..sample_n].iter().map(&size_of).sum();
    let avg = (sample_total / sample_n).max(1);
    let elements_per_partition = (target_bytes / avg).max(1);
    let n = (items.len() + elements_per_partition - 1) / elements_per_partition;
    by_count(items, n.max(1))
}

/// Stable hash used for hash-repartitioning and shuffles. Not portable
/// across processes with different `DefaultHasher` seeds (see
/// DESIGN.md's note on MPI determinism within, not across, a run).
pub fn hash_key<K: Hash>(key: &K) -> u64 {
    let mut h = DefaultHasher::new();
    key.hash(&mut h);
    h.finish()
}

/// Assign `items` to `n` buckets by `hash(key(item)) % n`.
pub fn by_hash<T>(items: Vec<T>, n: usize, key: impl Fn(&T) -> u64) -> Vec<Vec<T>> {
    if n == 0 {
        return Vec::new();
    }
    let mut out: Vec<Vec<T>> = (0..n).map(|_| Vec::new()).collect();
    for item in items {
        let idx = (key(&item) % n as u64) as usize;
        out[idx].push(item);
    }
    out
}
