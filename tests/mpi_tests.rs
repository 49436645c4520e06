//! Exercises the MPI execution context. Requires the `mpi` feature and an
//! actual MPI runtime (`mpirun -n 2 --`) to drive multiple ranks, so these
//! are `#[ignore]`d by default — run explicitly with `cargo test --features
//! mpi --test mpi_tests -- --ignored` under `mpirun`.
#![cfg(feature = "mpi")]

use mpi::topology::Communicator;
use tracebag::bag::context::MpiContext;
use tracebag::Bag;

#[test]
#[ignore]
fn repartition_count_gathers_across_ranks() {
    let universe = mpi::initialize().expect("MPI should initialize under mpirun");
    let world = universe.world();
    let ctx = MpiContext::new(world);

    let rank = world.rank();
    let local: Vec<i32> = vec![rank * 10, rank * 10 + 1];
    let bag = Bag::source(vec![local]);
    let out = bag.repartition(2).compute(&ctx).unwrap();

    let total: usize = out.iter().map(|p| p.len()).sum();
    assert_eq!(total as i32, world.size() * 2);
}

#[test]
#[ignore]
fn distributed_groupby_sums_match_across_ranks() {
    let universe = mpi::initialize().expect("MPI should initialize under mpirun");
    let world = universe.world();
    let ctx = MpiContext::new(world);

    let rank = world.rank();
    let local: Vec<i32> = (0..10).map(|i| i + rank * 10).collect();
    let bag = Bag::source(vec![local]);
    let rows = bag
        .distributed_groupby(world.size() as usize, |x: &i32| x % 2, |k, vs: Vec<i32>| (k, vs.iter().sum::<i32>()))
        .compute(&ctx)
        .unwrap();

    // Every rank sees the same globally-aggregated rows after the shuffle.
    let flat: Vec<(i32, i32)> = rows.into_iter().flatten().collect();
    assert!(!flat.is_empty());
}
