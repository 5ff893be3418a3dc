//! Run with
//!
//! cargo mpirun --np 4 --example transpose_roundtrip
use pencil_decomp::mpi::initialize;
use pencil_decomp::{
    all_gather, transpose, transpose_with, BufferStrategy, CartesianTopology, Pencil, PencilArray,
    PermuteDims, Permutation, StorageKind, TransposeMethod, TransposeOptions,
};

fn main() {
    let (nx, ny) = (20, 16);
    let universe = initialize().unwrap();
    let world = universe.world();
    let topology = CartesianTopology::new(&world, &[4]).unwrap();

    let row_pencil = Pencil::new(
        StorageKind::Host,
        &[nx, ny],
        &[0],
        &topology,
        Permutation::identity(2),
    )
    .unwrap();
    let col_pencil = row_pencil.with_decomp(&[1]).unwrap();

    let mut original: PencilArray<f64> = PencilArray::allocate(&row_pencil).unwrap();
    original.fill_with(|index| (7 * index[0] + index[1]) as f64);

    // equal pencils reduce to a plain local copy
    let mut copied = original.similar().unwrap();
    transpose(&original, &mut copied).unwrap();
    assert!(copied == original);

    // there and back again with identity permutations
    let mut cols = original.similar_on(&col_pencil).unwrap();
    transpose(&original, &mut cols).unwrap();
    let mut back = original.similar().unwrap();
    transpose(&cols, &mut back).unwrap();
    assert!(back == original);

    // destination stored with swapped axes: the parent block leads with the
    // decomposed column axis while logical indexing is unchanged
    let swapped_pencil = col_pencil
        .with_permutation(Permutation::new(&[1, 0]).unwrap())
        .unwrap();
    let mut swapped = original.similar_on(&swapped_pencil).unwrap();
    transpose(&original, &mut swapped).unwrap();
    assert_eq!(swapped.parent().shape(), &[4, 20]);
    let row_range = swapped_pencil.local_range(0);
    let col_range = swapped_pencil.local_range(1);
    for (li, i) in row_range.enumerate() {
        for (lj, j) in col_range.clone().enumerate() {
            assert_eq!(swapped[&[li, lj][..]], (7 * i + j) as f64);
        }
    }
    // pencils differing only in memory layout gather to the same array
    assert_eq!(all_gather(&cols).unwrap(), all_gather(&swapped).unwrap());

    // the collective schedule, per-call buffers and source-order packing
    // all give the same round-trip
    let options = TransposeOptions {
        method: TransposeMethod::Alltoallv,
        permute_dims: PermuteDims::Never,
        buffer_strategy: BufferStrategy::PerCall,
    };
    let mut back_again = original.similar().unwrap();
    transpose_with(&swapped, &mut back_again, &options).unwrap();
    assert!(back_again == original);
}
