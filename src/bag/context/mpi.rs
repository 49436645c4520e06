//! MPI execution context (feature `mpi`) — data-parallel across ranks.
//!
//! Grounded on `original_source/include/dftracer/utils/pipeline/
//! execution_context/mpi.h` and `original_source/src/bin/
//! dft_pipeline_mpi.cpp` for the collective shape (gather/broadcast for
//! count-repartition, all-to-all for hash-repartition and
//! `distributed_groupby`, allgather for `reduce`). Backed by the real
//! `mpi` crate (rsmpi); payloads are serialized with `serde_json` and
//! exchanged as length-prefixed byte buffers, per the spec's
//! "serialization format agreed by both ends, sizes exchanged before
//! payloads" note (DESIGN.md Open Question 3).
use std::hash::Hash;

use mpi::collective::CommunicatorCollectives;
use mpi::point_to_point::{Destination, Source};
use mpi::topology::{Communicator, SystemCommunicator};
use mpi::Count;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::bag::context::{ContextError, ExecutionContext, Partitions};
use crate::bag::partition;
use crate::bag::shuffle;

pub struct MpiContext {
    world: SystemCommunicator,
}

impl MpiContext {
    /// Wrap an already-initialized MPI world communicator (typically
    /// obtained once per process via `mpi::initialize()` at program
    /// start-up, outside this crate's control).
    pub fn new(world: SystemCommunicator) -> Self {
        debug!(rank = world.rank(), size = world.size(), "starting MPI execution context");
        Self { world }
    }

    fn rank(&self) -> usize {
        self.world.rank() as usize
    }

    fn size(&self) -> usize {
        self.world.size() as usize
    }

    fn to_bytes<T: Serialize>(item: &T) -> Result<Vec<u8>, ContextError> {
        serde_json::to_vec(item).map_err(|e| ContextError::DistributedTransport(e.to_string()))
    }

    fn from_bytes<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, ContextError> {
        serde_json::from_slice(bytes).map_err(|e| ContextError::DistributedTransport(e.to_string()))
    }

    /// Exchange a variable number of variable-length byte messages with
    /// every other rank: send `outgoing[r]` to rank `r`, receive
    /// `incoming[r]` from rank `r`. Sizes are exchanged first via
    /// `all_to_all_into`, then payloads via raw point-to-point sends,
    /// matching the original's "sizes before payloads" convention.
    fn all_to_all_bytes(&self, outgoing: Vec<Vec<u8>>) -> Result<Vec<Vec<u8>>, ContextError> {
        let size = self.size();
        let send_counts: Vec<Count> = outgoing.iter().map(|b| b.len() as Count).collect();
        let mut recv_counts = vec![0 as Count; size];
        self.world.all_to_all_into(&send_counts, &mut recv_counts);

        let mut incoming: Vec<Vec<u8>> = recv_counts.iter().map(|&c| vec![0u8; c as usize]).collect();

        for r in 0..size {
            if r == self.rank() {
                incoming[r] = outgoing[r].clone();
                continue;
            }
            let dest = self.world.process_at_rank(r as i32);
            dest.send(&outgoing[r]);
        }
        for r in 0..size {
            if r == self.rank() {
                continue;
            }
            let src = self.world.process_at_rank(r as i32);
            let (buf, _status) = src.receive_vec::<u8>();
            incoming[r] = buf;
        }
        Ok(incoming)
    }

    /// Gather every rank's local partitions to rank 0, apply `f` there,
    /// then broadcast the result back to all ranks.
    fn gather_apply_broadcast<T, U>(
        &self,
        local: Vec<T>,
        f: impl FnOnce(Vec<T>) -> U,
    ) -> Result<U, ContextError>
    where
        T: Serialize + DeserializeOwned,
        U: Serialize + DeserializeOwned,
    {
        let my_bytes = Self::to_bytes(&local)?;
        let outgoing: Vec<Vec<u8>> = (0..self.size())
            .map(|r| if r == 0 { my_bytes.clone() } else { Vec::new() })
            .collect();
        let gathered = self.all_to_all_bytes(outgoing)?;

        let result_bytes = if self.rank() == 0 {
            let mut all_items: Vec<T> = Vec::new();
            for buf in gathered {
                if !buf.is_empty() {
                    all_items.extend(Self::from_bytes::<Vec<T>>(&buf)?);
                }
            }
            Self::to_bytes(&f(all_items))?
        } else {
            Vec::new()
        };

        let broadcast = self.broadcast_bytes(result_bytes)?;
        Self::from_bytes(&broadcast)
    }

    fn broadcast_bytes(&self, root_bytes: Vec<u8>) -> Result<Vec<u8>, ContextError> {
        let mut len = if self.rank() == 0 { root_bytes.len() as Count } else { 0 };
        self.world.process_at_rank(0).broadcast_into(&mut len);
        let mut buf = if self.rank() == 0 { root_bytes } else { vec![0u8; len as usize] };
        self.world.process_at_rank(0).broadcast_into(&mut buf[..]);
        Ok(buf)
    }
}

impl ExecutionContext for MpiContext {
    fn execute_map<T, U, F>(&self, input: Partitions<T>, f: F) -> Result<Partitions<U>, ContextError>
    where
        T: Send + 'static,
        U: Send + 'static,
        F: Fn(T) -> U + Send + Sync + 'static,
    {
        // Rank-local only: no communication (§4.7).
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
        Ok(input.into_iter().map(&f).collect())
    }

    fn execute_repartition_count<T>(&self, input: Partitions<T>, n: usize) -> Result<Partitions<T>, ContextError>
    where
        T: Send + Serialize + DeserializeOwned + 'static,
    {
        let local: Vec<T> = input.into_iter().flatten().collect();
        let all = self.gather_apply_broadcast(local, move |all| partition::by_count(all, n))?;
        Ok(all)
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
        let local: Vec<T> = input.into_iter().flatten().collect();
        let all = self.gather_apply_broadcast(local, move |all| partition::by_bytes_estimated(all, target_bytes, size_of))?;
        Ok(all)
    }

    fn execute_repartition_hash<T, K, H>(&self, input: Partitions<T>, n: usize, key: H) -> Result<Partitions<T>, ContextError>
    where
        T: Send + Serialize + DeserializeOwned + 'static,
        K: Hash,
        H: Fn(&T) -> K + Send + Sync + 'static,
    {
        let n = n.max(self.size());
        let local: Vec<T> = input.into_iter().flatten().collect();
        let buckets = partition::by_hash(local, n, |t| partition::hash_key(&key(t)));
        // Fold the n logical buckets down to `size` rank-targeted messages
        // (bucket b is owned by rank b % size), then all-to-all exchange.
        let size = self.size();
        let mut outgoing: Vec<Vec<T>> = (0..size).map(|_| Vec::new()).collect();
        for (b, mut items) in buckets.into_iter().enumerate() {
            outgoing[b % size].append(&mut items);
        }
        let outgoing_bytes: Vec<Vec<u8>> =
            outgoing.into_iter().map(|v| Self::to_bytes(&v)).collect::<Result<_, _>>()?;
        let incoming_bytes = self.all_to_all_bytes(outgoing_bytes)?;
        let mut received: Vec<T> = Vec::new();
        for buf in incoming_bytes {
            if !buf.is_empty() {
                received.extend(Self::from_bytes::<Vec<T>>(&buf)?);
            }
        }
        Ok(vec![received])
    }

    fn execute_groupby<T, K, F>(&self, input: Partitions<T>, key: F) -> Result<Partitions<(K, Vec<T>)>, ContextError>
    where
        T: Send + Serialize + DeserializeOwned + 'static,
        K: Hash + Eq + Clone + Send + Serialize + DeserializeOwned + 'static,
        F: Fn(&T) -> K + Send + Sync + 'static,
    {
        let local: Vec<T> = input.into_iter().flatten().collect();
        let local_groups = shuffle::group_local(local, &key);
        // All-gather via gather-to-root + broadcast, then merge on every rank.
        let merged = self.gather_apply_broadcast(local_groups, move |all: Vec<Vec<(K, Vec<T>)>>| {
            let flat: Vec<(K, Vec<T>)> = all.into_iter().flatten().collect();
            let mut by_key: Vec<(K, Vec<T>)> = Vec::new();
            'outer: for (k, mut items) in flat {
                for (existing_k, existing_items) in by_key.iter_mut() {
                    if *existing_k == k {
                        existing_items.append(&mut items);
                        continue 'outer;
                    }
                }
                by_key.push((k, items));
            }
            by_key
        })?;
        Ok(vec![merged])
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
        let size = self.size();
        let n = if n == 0 { shuffle::default_bucket_count(usize::MAX, size) } else { n };
        let local: Vec<T> = input.into_iter().flatten().collect();
        let buckets = shuffle::scatter_into_buckets(local, n, &key);

        let mut outgoing: Vec<Vec<T>> = (0..size).map(|_| Vec::new()).collect();
        for (b, mut items) in buckets.into_iter().enumerate() {
            outgoing[b % size].append(&mut items);
        }
        let outgoing_bytes: Vec<Vec<u8>> =
            outgoing.into_iter().map(|v| Self::to_bytes(&v)).collect::<Result<_, _>>()?;
        let incoming_bytes = self.all_to_all_bytes(outgoing_bytes)?;
        let mut received: Vec<T> = Vec::new();
        for buf in incoming_bytes {
            if !buf.is_empty() {
                received.extend(Self::from_bytes::<Vec<T>>(&buf)?);
            }
        }
        let rows = shuffle::group_and_aggregate(received, &key, &agg);
        Ok(vec![rows])
    }

    fn execute_reduce<T, F>(&self, input: Partitions<T>, op: F) -> Result<Option<T>, ContextError>
    where
        T: Send + Serialize + DeserializeOwned + 'static,
        F: Fn(T, T) -> T + Send + Sync + 'static,
    {
        let local: Vec<T> = input.into_iter().flatten().collect();
        let mut it = local.into_iter();
        let local_fold = match it.next() {
            Some(first) => Some(it.fold(first, &op)),
            None => None,
        };
        self.gather_apply_broadcast(
            local_fold.into_iter().collect::<Vec<T>>(),
            move |all: Vec<T>| {
                let mut it = all.into_iter();
                it.next().map(|first| it.fold(first, &op))
            },
        )
    }
}
