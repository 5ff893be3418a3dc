//! Run with
//!
//! cargo mpirun --np 4 --example gather_root
use ndarray::ArrayD;
use pencil_decomp::mpi::initialize;
use pencil_decomp::{
    all_gather, broadcast_scalar, gather_root, CartesianTopology, Pencil, PencilArray,
    Permutation, StorageKind,
};

fn main() {
    let (nx, ny) = (7, 6);
    let universe = initialize().unwrap();
    let world = universe.world();
    let topology = CartesianTopology::new(&world, &[4]).unwrap();
    let pencil = Pencil::new(
        StorageKind::Host,
        &[nx, ny],
        &[0],
        &topology,
        Permutation::identity(2),
    )
    .unwrap();

    let mut global: ArrayD<f64> = ArrayD::zeros(ndarray::IxDyn(&[nx, ny]));
    for (i, v) in global.iter_mut().enumerate() {
        *v = i as f64;
    }

    // every rank slices its own block out of the replicated global array
    let local = PencilArray::from_global(&pencil, &global).unwrap();
    assert_eq!(local.shape()[1], ny);

    let gathered = gather_root(&local).unwrap();
    if topology.rank() == 0 {
        assert_eq!(gathered.expect("root holds the result"), global);
    } else {
        assert!(gathered.is_none());
    }

    assert_eq!(all_gather(&local).unwrap(), global);

    let mut token = if topology.rank() == 0 { 42_i32 } else { 0 };
    broadcast_scalar(&topology, &mut token);
    assert_eq!(token, 42);
}
