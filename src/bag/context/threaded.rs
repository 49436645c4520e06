//! Threaded execution context — an N-worker thread pool, one task per chunk.
//!
//! Grounded on `tvlfyi-tvix/castore`'s optional `threadpool` dependency: a
//! submit-a-task-per-unit-of-work, join-at-the-channel model, which
//! matches this crate's "pool of N worker threads... suspension points
//! only at join boundaries between stages" design more directly than
//! `rayon`'s work-stealing iterators (which the teacher used in
//! `perf.rs` for an unrelated, flatter parallel-compression task).
use std::hash::Hash;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};

use threadpool::ThreadPool;
use tracing::debug;

use crate::bag::context::{ContextError, ExecutionContext, Partitions};
use crate::bag::partition;
use crate::bag::shuffle;

#[derive(Debug, Clone, Copy)]
pub struct ThreadedContextConfig {
    pub num_threads: usize,
}

impl Default for ThreadedContextConfig {
    fn default() -> Self {
        Self { num_threads: std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4) }
    }
}

pub struct ThreadedContext {
    pool: ThreadPool,
    num_threads: usize,
}

impl ThreadedContext {
    pub fn new(config: ThreadedContextConfig) -> Self {
        let num_threads = config.num_threads.max(1);
        debug!(num_threads, "starting threaded execution context");
        Self { pool: ThreadPool::new(num_threads), num_threads }
    }

    /// Dispatch one task per element of `units`, each producing a `Vec<O>`,
    /// and concatenate results in dispatch order.
    fn dispatch_collect<U, O, F>(&self, units: Vec<U>, f: Arc<F>) -> Vec<O>
    where
        U: Send + 'static,
        O: Send + 'static,
        F: Fn(U) -> O + Send + Sync + 'static,
    {
        let (tx, rx) = mpsc::channel();
        let total = units.len();
        for (idx, unit) in units.into_iter().enumerate() {
            let tx = tx.clone();
            let f = Arc::clone(&f);
            self.pool.execute(move || {
                let result = f(unit);
                let _ = tx.send((idx, result));
            });
        }
        drop(tx);
        let mut slots: Vec<Option<O>> = (0..total).map(|_| None).collect();
        for (idx, result) in rx.iter().take(total) {
            slots[idx] = Some(result);
        }
        slots.into_iter().map(|s| s.expect("every dispatched task reports back")).collect()
    }
}

impl ExecutionContext for ThreadedContext {
    fn execute_map<T, U, F>(&self, input: Partitions<T>, f: F) -> Result<Partitions<U>, ContextError>
    where
        T: Send + 'static,
        U: Send + 'static,
        F: Fn(T) -> U + Send + Sync + 'static,
    {
        // Per-element kernels re-chunk into `num_threads` equal-count tasks
        // regardless of upstream partitioning, so a single upstream
        // partition still spreads across the whole pool.
        let flat: Vec<T> = input.into_iter().flatten().collect();
        let chunks = partition::by_count(flat, self.num_threads);
        let f = Arc::new(f);
        Ok(self.dispatch_collect(chunks, Arc::new(move |p: Vec<T>| p.into_iter().map(|t| (*f)(t)).collect::<Vec<U>>())))
    }

    fn execute_flatmap<T, U, I, F>(&self, input: Partitions<T>, f: F) -> Result<Partitions<U>, ContextError>
    where
        T: Send + 'static,
        U: Send + 'static,
        I: IntoIterator<Item = U> + 'static,
        F: Fn(T) -> I + Send + Sync + 'static,
    {
        let flat: Vec<T> = input.into_iter().flatten().collect();
        let chunks = partition::by_count(flat, self.num_threads);
        let f = Arc::new(f);
        Ok(self.dispatch_collect(chunks, Arc::new(move |p: Vec<T>| p.into_iter().flat_map(|t| (*f)(t)).collect::<Vec<U>>())))
    }

    fn execute_map_partitions<T, U, F>(&self, input: Partitions<T>, f: F) -> Result<Partitions<U>, ContextError>
    where
        T: Send + 'static,
        U: Send + 'static,
        F: Fn(Vec<T>) -> Vec<U> + Send + Sync + 'static,
    {
        Ok(self.dispatch_collect(input, Arc::new(f)))
    }

    fn execute_repartition_count<T>(&self, input: Partitions<T>, n: usize) -> Result<Partitions<T>, ContextError>
    where
        T: Send + Serialize + DeserializeOwned + 'static,
    {
        let flat: Vec<T> = input.into_iter().flatten().collect();
        Ok(partition::by_count_round_robin(flat, n))
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
        Ok(partition::by_bytes_exact(flat, target_bytes, size_of))
    }

    fn execute_repartition_hash<T, K, H>(&self, input: Partitions<T>, n: usize, key: H) -> Result<Partitions<T>, ContextError>
    where
        T: Send + Serialize + DeserializeOwned + 'static,
        K: Hash,
        H: Fn(&T) -> K + Send + Sync + 'static,
    {
        let n = n.max(1);
        let buckets: Vec<Arc<Mutex<Vec<T>>>> = (0..n).map(|_| Arc::new(Mutex::new(Vec::new()))).collect();
        let key = Arc::new(key);
        let handles: Vec<_> = input
            .into_iter()
            .map(|partition_items| {
                let buckets = buckets.clone();
                let key = Arc::clone(&key);
                let (tx, rx) = mpsc::channel();
                self.pool.execute(move || {
                    let mut local: Vec<Vec<T>> = (0..buckets.len()).map(|_| Vec::new()).collect();
                    for item in partition_items {
                        let idx = (partition::hash_key(&key(&item)) % local.len() as u64) as usize;
                        local[idx].push(item);
                    }
                    for (idx, mut items) in local.into_iter().enumerate() {
                        buckets[idx].lock().unwrap().append(&mut items);
                    }
                    let _ = tx.send(());
                });
                rx
            })
            .collect();
        for rx in handles {
            let _ = rx.recv();
        }
        Ok(buckets.into_iter().map(|b| Arc::try_unwrap(b).map(|m| m.into_inner().unwrap()).unwrap_or_default()).collect())
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
        let n = if n == 0 { shuffle::default_bucket_count(flat.len(), self.num_threads) } else { n };
        let key = Arc::new(key);
        let buckets = partition::by_hash(flat, n, |t| partition::hash_key(&key(t)));
        let agg = Arc::new(agg);
        let key_for_agg = Arc::clone(&key);
        Ok(self.dispatch_collect(
            buckets,
            Arc::new(move |b: Vec<T>| {
                let key = Arc::clone(&key_for_agg);
                let agg = Arc::clone(&agg);
                shuffle::group_and_aggregate(b, move |t| key(t), move |k, v| agg(k, v))
            }),
        ))
    }

    fn execute_reduce<T, F>(&self, input: Partitions<T>, op: F) -> Result<Option<T>, ContextError>
    where
        T: Send + Serialize + DeserializeOwned + 'static,
        F: Fn(T, T) -> T + Send + Sync + 'static,
    {
        let op = Arc::new(op);
        let partials: Vec<Option<T>> = self.dispatch_collect(input, {
            let op = Arc::clone(&op);
            Arc::new(move |p: Vec<T>| {
                let mut it = p.into_iter();
                let first = it.next();
                first.map(|f| it.fold(f, |a, b| op(a, b)))
            })
        });
        let mut it = partials.into_iter().flatten();
        let first = match it.next() {
            Some(v) => v,
            None => return Ok(None),
        };
        Ok(Some(it.fold(first, |a, b| op(a, b))))
    }
}
