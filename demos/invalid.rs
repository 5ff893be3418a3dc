//! Run with
//!
//! cargo mpirun --np 4 --example invalid
//!
//! Exercises the failure paths that must reject bad configurations on
//! every rank before any communication happens.
use ndarray::ArrayD;
use pencil_decomp::mpi::initialize;
use pencil_decomp::{
    transpose, Block, CartesianTopology, Pencil, PencilArray, PencilError, Permutation,
    StorageKind,
};

fn main() {
    let universe = initialize().unwrap();
    let world = universe.world();

    // grid shape must multiply up to the communicator size
    assert!(matches!(
        CartesianTopology::new(&world, &[3, 2]),
        Err(PencilError::GridSizeMismatch { .. })
    ));

    let topology = CartesianTopology::new(&world, &[2, 2]).unwrap();
    let pencil = Pencil::new(
        StorageKind::Host,
        &[20, 10, 12],
        &[1, 2],
        &topology,
        Permutation::identity(3),
    )
    .unwrap();

    // wrapping a block of a foreign container family
    let mem_shape = pencil.local_size_memory();
    let device_block = Block::new(StorageKind::Device, ArrayD::<f64>::zeros(ndarray::IxDyn(&mem_shape)));
    assert!(matches!(
        PencilArray::wrap(&pencil, device_block),
        Err(PencilError::ContainerMismatch { .. })
    ));

    // wrapping a block of the wrong shape
    let bad_block = Block::host(ArrayD::<f64>::zeros(ndarray::IxDyn(&[1, 2, 3])));
    assert!(matches!(
        PencilArray::wrap(&pencil, bad_block),
        Err(PencilError::DimensionMismatch { .. })
    ));

    // pencil construction rejects malformed decompositions
    assert!(matches!(
        pencil.with_decomp(&[1, 1]),
        Err(PencilError::DuplicateDecompAxis { axis: 1 })
    ));
    assert!(matches!(
        pencil.with_decomp(&[1, 5]),
        Err(PencilError::AxisOutOfRange { axis: 5, .. })
    ));
    assert!(matches!(
        pencil.with_permutation(Permutation::identity(2)),
        Err(PencilError::ArityMismatch { .. })
    ));

    // pencils differing in two decomposed-axis positions cannot be
    // transposed into each other
    let two_apart = pencil.with_decomp(&[0, 1]).unwrap();
    let src = PencilArray::<f64>::allocate(&pencil).unwrap();
    let mut dst = PencilArray::<f64>::allocate(&two_apart).unwrap();
    assert!(matches!(
        transpose(&src, &mut dst),
        Err(PencilError::IncompatibleTransposition { .. })
    ));
}
