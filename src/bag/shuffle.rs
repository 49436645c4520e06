//! C9 — local grouping, shared by every execution context's groupby kernels.
use std::collections::HashMap;
use std::hash::Hash;

use crate::bag::partition::hash_key;

/// Group `items` by `key`, preserving first-appearance order of each key
/// (matching the sequential context's single hash map).
pub fn group_local<T, K: Hash + Eq + Clone>(items: Vec<T>, key: impl Fn(&T) -> K) -> Vec<(K, Vec<T>)> {
    let mut order: Vec<K> = Vec::new();
    let mut map: HashMap<K, Vec<T>> = HashMap::new();
    for item in items {
        let k = key(&item);
        map.entry(k.clone()).or_insert_with(|| {
            order.push(k.clone());
            Vec::new()
        });
        map.get_mut(&k).unwrap().push(item);
    }
    order.into_iter().map(|k| { let v = map.remove(&k).unwrap(); (k, v) }).collect()
}

/// Pick the bucket count `distributed_groupby` shuffles into when the
/// caller didn't request a specific one: `max(workers, total/1000)`.
pub fn default_bucket_count(total_items: usize, workers: usize) -> usize {
    workers.max((total_items / 1000).max(1))
}

/// Scatter `items` into `n` buckets by `hash(key(item)) % n`, the shared
/// first phase of every `distributed_groupby` implementation.
pub fn scatter_into_buckets<T, K: Hash>(items: Vec<T>, n: usize, key: impl Fn(&T) -> K) -> Vec<Vec<T>> {
    crate::bag::partition::by_hash(items, n, |t| hash_key(&key(t)))
}

/// Group + aggregate one bucket, producing one row per distinct key.
pub fn group_and_aggregate<T, K: Hash + Eq + Clone, R>(
    bucket: Vec<T>,
    key: impl Fn(&T) -> K,
    agg: impl Fn(K, Vec<T>) -> R,
) -> Vec<R> {
    group_local(bucket, key).into_iter().map(|(k, v)| agg(k, v)).collect()
}
