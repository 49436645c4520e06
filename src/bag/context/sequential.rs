//! Sequential execution context — single-threaded, deterministic.
//!
//! Ported directly from the original C++ `SequentialContext`
//! (`execution_context.h`): left-to-right folds, a default 4-way split for
//! `map_partitions` when the upstream partitioning didn't set one, and
//! `partition_size = ceil(N/n)` for count-based repartitioning.
use std::hash::Hash;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::bag::context::{ContextError, ExecutionContext, Partitions};
use crate::bag::partition;
use crate::bag::shuffle;

const DEFAULT_MAP_PARTITIONS_SPLIT: usize = 4;

#[derive(Debug, Default, Clone, Copy)]
pub struct SequentialContext;

impl ExecutionContext for SequentialContext {
    fn execute_map<T, U, F>(&self, input: Partitions<T>, f: F) -> Result<Partitions<U>, ContextError>
    where
        T: Send + 'static,
        U: Send + 'static,
        F: Fn(T) -> U + Send + Sync + 'static,
    {
        Ok(input.into_iter().map(|p| p.into_iter().map(&f).collect()).collect())
    }

    fn execute_flatmap<T, U, I, F>(&self, input: Partitions<T>, f: F) -> Result<Partitions<U>, ContextError>
    where
        T: Send + 'static,
        U: Send + 'static,
        I: IntoIterator<Item = U> + 'static,
        F: Fn(T) -> I + Send + Sync + 'static,
    {
        Ok(input.into_iter().map(|p| p.into_iter().flat_map(&f).collect()).collect())
    }

    fn execute_map_partitions<T, U, F>(&self, input: Partitions<T>, f: F) -> Result<Partitions<U>, ContextError>
    where
        T: Send + 'static,
        U: Send + 'static,
        F: Fn(Vec<T>) -> Vec<U> + Send + Sync + 'static,
    {
        let input = if input.len() <= 1 {
            let flat: Vec<T> = input.into_iter().flatten().collect();
            partition::by_count(flat, DEFAULT_MAP_PARTITIONS_SPLIT)
        } else {
            input
        };
        Ok(input.into_iter().map(&f).collect())
    }

    fn execute_repartition_count<T>(&self, input: Partitions<T>, n: usize) -> Result<Partitions<T>, ContextError>
    where
        T: Send + Serialize + DeserializeOwned + 'static,
    {
        let flat: Vec<T> = input.into_iter().flatten().collect();
        Ok(partition::by_count(flat, n))
    }

    fn execute_repartition_bytes<T, S>(
        &self,
        input: Partitions<T>,
        target_bytes: usize,
        size_of: S,
    ) -> Result<Partitions<T>, ContextError>
    where
        T: Send + Serialize + DeserializeOwned + 'static,
        S: Fn(&T) -> usize + Send + Sync + 'static,
    {
        let flat: Vec<T> = input.into_iter().flatten().collect();
        Ok(partition::by_bytes_estimated(flat, target_bytes, size_of))
    }

    fn execute_repartition_hash<T, K, H>(&self, input: Partitions<T>, n: usize, key: H) -> Result<Partitions<T>, ContextError>
    where
        T: Send + Serialize + DeserializeOwned + 'static,
        K: Hash,
        H: Fn(&T) -> K + Send + Sync + 'static,
    {
        let flat: Vec<T> = input.into_iter().flatten().collect();
        Ok(partition::by_hash(flat, n, |t| partition::hash_key(&key(t))))
    }

    fn execute_groupby<T, K, F>(&self, input: Partitions<T>, key: F) -> Result<Partitions<(K, Vec<T>)>, ContextError>
    where
        T: Send + Serialize + DeserializeOwned + 'static,
        K: Hash + Eq + Clone + Send + Serialize + DeserializeOwned + 'static,
        F: Fn(&T) -> K + Send + Sync + 'static,
    {
        let flat: Vec<T> = input.into_iter().flatten().collect();
        Ok(vec![shuffle::group_local(flat, key)])
    }

    fn execute_distributed_groupby<T, K, R, KF, A>(
        &self,
        input: Partitions<T>,
        n: usize,
        key: KF,
        agg: A,
    ) -> Result<Partitions<R>, ContextError>
    where
        T: Send + Serialize + DeserializeOwned + 'static,
        K: Hash + Eq + Clone + Send + Serialize + DeserializeOwned + 'static,
        R: Send + Serialize + DeserializeOwned + 'static,
        KF: Fn(&T) -> K + Send + Sync + 'static,
        A: Fn(K, Vec<T>) -> R + Send + Sync + 'static,
    {
        let flat: Vec<T> = input.into_iter().flatten().collect();
        let n = if n == 0 { shuffle::default_bucket_count(flat.len(), 1) } else { n };
        let buckets = shuffle::scatter_into_buckets(flat, n, &key);
        Ok(buckets.into_iter().map(|b| shuffle::group_and_aggregate(b, &key, &agg)).collect())
    }

    fn execute_reduce<T, F>(&self, input: Partitions<T>, op: F) -> Result<Option<T>, ContextError>
    where
        T: Send + Serialize + DeserializeOwned + 'static,
        F: Fn(T, T) -> T + Send + Sync + 'static,
    {
        let mut flat = input.into_iter().flatten();
        let first = match flat.next() {
            Some(v) => v,
            None => return Ok(None),
        };
        Ok(Some(flat.fold(first, &op)))
    }
}
