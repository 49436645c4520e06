//! C7 — execution contexts: the kernel surface every backend implements.
//!
//! Shaped after `byte271-6cy`'s `Codec` trait (one interface, several
//! interchangeable concrete implementations, a fail-hard contract on
//! unsupported configurations) and the original C++'s CRTP
//! `ExecutionContext<Derived>`, translated to a plain Rust trait with
//! generic methods (no `Derived` parameter needed).

pub mod sequential;
pub mod threaded;

#[cfg(feature = "mpi")]
pub mod mpi;

pub use sequential::SequentialContext;
pub use threaded::{ThreadedContext, ThreadedContextConfig};

#[cfg(feature = "mpi")]
pub use mpi::MpiContext;

use std::hash::Hash;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ContextError {
    #[error("pipeline type error: {0}")]
    PipelineType(String),
    #[error("aggregation error: {0}")]
    Aggregation(String),
    #[error("distributed transport error: {0}")]
    DistributedTransport(String),
}

pub type Partitions<T> = Vec<Vec<T>>;

/// The full kernel surface a bag plan compiles down to. Every combinator
/// in `bag::Bag` calls exactly one of these methods on the context chosen
/// at source-construction time.
pub trait ExecutionContext: Send + Sync {
    fn execute_map<T, U, F>(&self, input: Partitions<T>, f: F) -> Result<Partitions<U>, ContextError>
    where
        T: Send + 'static,
        U: Send + 'static,
        F: Fn(T) -> U + Send + Sync + 'static;

    fn execute_flatmap<T, U, I, F>(&self, input: Partitions<T>, f: F) -> Result<Partitions<U>, ContextError>
    where
        T: Send + 'static,
        U: Send + 'static,
        I: IntoIterator<Item = U> + 'static,
        F: Fn(T) -> I + Send + Sync + 'static;

    fn execute_map_partitions<T, U, F>(&self, input: Partitions<T>, f: F) -> Result<Partitions<U>, ContextError>
    where
        T: Send + 'static,
        U: Send + 'static,
        F: Fn(Vec<T>) -> Vec<U> + Send + Sync + 'static;

    /// May cross ranks under the MPI context (gather-to-root,
    /// repartition, broadcast back out), hence the `Serialize` bound
    /// shared by every kernel below this point.
    fn execute_repartition_count<T>(&self, input: Partitions<T>, n: usize) -> Result<Partitions<T>, ContextError>
    where
        T: Send + Serialize + DeserializeOwned + 'static;

    fn execute_repartition_bytes<T, S>(
        &self,
        input: Partitions<T>,
        target_bytes: usize,
        size_of: S,
    ) -> Result<Partitions<T>, ContextError>
    where
        T: Send + Serialize + DeserializeOwned + 'static,
        S: Fn(&T) -> usize + Send + Sync + 'static;

    fn execute_repartition_hash<T, K, H>(&self, input: Partitions<T>, n: usize, key: H) -> Result<Partitions<T>, ContextError>
    where
        T: Send + Serialize + DeserializeOwned + 'static,
        K: Hash,
        H: Fn(&T) -> K + Send + Sync + 'static;

    fn execute_groupby<T, K, F>(&self, input: Partitions<T>, key: F) -> Result<Partitions<(K, Vec<T>)>, ContextError>
    where
        T: Send + Serialize + DeserializeOwned + 'static,
        K: Hash + Eq + Clone + Send + Serialize + DeserializeOwned + 'static,
        F: Fn(&T) -> K + Send + Sync + 'static;

    #[allow(clippy::too_many_arguments)]
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
        A: Fn(K, Vec<T>) -> R + Send + Sync + 'static;

    fn execute_reduce<T, F>(&self, input: Partitions<T>, op: F) -> Result<Option<T>, ContextError>
    where
        T: Send + Serialize + DeserializeOwned + 'static,
        F: Fn(T, T) -> T + Send + Sync + 'static;
}
