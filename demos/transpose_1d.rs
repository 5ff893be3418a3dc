//! Run with
//!
//! cargo mpirun --np 2 --example transpose_1d
use pencil_decomp::mpi::initialize;
use pencil_decomp::{
    all_gather, transpose, CartesianTopology, Pencil, PencilArray, Permutation, StorageKind,
};

fn main() {
    let (nx, ny) = (8, 10);
    let universe = initialize().unwrap();
    let world = universe.world();
    let topology = CartesianTopology::new(&world, &[2]).unwrap();

    // rows split over the two processes, logical memory order
    let row_pencil = Pencil::new(
        StorageKind::Host,
        &[nx, ny],
        &[0],
        &topology,
        Permutation::identity(2),
    )
    .unwrap();
    // columns split instead, stored column-major
    let col_pencil = row_pencil
        .with_decomp(&[1])
        .unwrap()
        .with_permutation(Permutation::new(&[1, 0]).unwrap())
        .unwrap();

    let mut rows: PencilArray<i64> = PencilArray::allocate(&row_pencil).unwrap();
    rows.fill_with(|index| (100 * index[0] + index[1]) as i64);
    assert_eq!(rows.shape(), vec![4, 10]);

    let mut cols = rows.similar_on(&col_pencil).unwrap();
    transpose(&rows, &mut cols).unwrap();
    assert_eq!(cols.shape(), vec![8, 5]);
    assert_eq!(cols.parent().shape(), &[5, 8]);

    // the global array is invariant under the redistribution
    let gathered = all_gather(&cols).unwrap();
    for i in 0..nx {
        for j in 0..ny {
            assert_eq!(gathered[[i, j]], (100 * i + j) as i64);
        }
    }
    assert_eq!(gathered, all_gather(&rows).unwrap());
}
