//! Run with
//!
//! cargo mpirun --np 4 --example transpose_3d
use pencil_decomp::mpi::initialize;
use pencil_decomp::utils::approx_eq;
use pencil_decomp::{
    all_gather, transpose, transpose_with, CartesianTopology, Pencil, PencilArray, Permutation,
    StorageKind, TransposeMethod, TransposeOptions,
};

fn value(index: &[usize]) -> f64 {
    (index[0] * 1000 + index[1] * 100 + index[2] * 10 + index.get(3).copied().unwrap_or(0)) as f64
}

fn main() {
    let shape = [20, 10, 12];
    let universe = initialize().unwrap();
    let world = universe.world();
    let topology = CartesianTopology::new(&world, &[2, 2]).unwrap();

    // y and z decomposed, logical order in memory
    let x_pencil = Pencil::new(
        StorageKind::Host,
        &shape,
        &[1, 2],
        &topology,
        Permutation::identity(3),
    )
    .unwrap();
    // x and z decomposed, stored as (y, z, x)
    let y_pencil = x_pencil
        .with_decomp(&[0, 2])
        .unwrap()
        .with_permutation(Permutation::new(&[1, 2, 0]).unwrap())
        .unwrap();

    let mut x_arr: PencilArray<f64> = PencilArray::allocate(&x_pencil).unwrap();
    x_arr.fill_with(value);

    let mut y_arr = x_arr.similar_on(&y_pencil).unwrap();
    transpose(&x_arr, &mut y_arr).unwrap();

    // gather invariance: both decompositions hold the same global array
    let from_x = all_gather(&x_arr).unwrap();
    let from_y = all_gather(&y_arr).unwrap();
    approx_eq(&from_x, &from_y);
    for i in 0..shape[0] {
        for j in 0..shape[1] {
            for k in 0..shape[2] {
                assert_eq!(from_y[[i, j, k]], value(&[i, j, k]));
            }
        }
    }

    // round trip through the collective schedule
    let options = TransposeOptions {
        method: TransposeMethod::Alltoallv,
        ..TransposeOptions::default()
    };
    let mut back = x_arr.similar().unwrap();
    transpose_with(&y_arr, &mut back, &options).unwrap();
    assert!(back == x_arr);

    // trailing component dimensions ride along unpermuted
    let mut vec_x = PencilArray::<f64>::allocate_with_extra(&x_pencil, &[3]).unwrap();
    vec_x.fill_with(value);
    let mut vec_y = vec_x.similar_on(&y_pencil).unwrap();
    transpose(&vec_x, &mut vec_y).unwrap();
    let gathered = all_gather(&vec_y).unwrap();
    for i in 0..shape[0] {
        for c in 0..3 {
            assert_eq!(gathered[[i, 0, 0, c]], value(&[i, 0, 0, c]));
        }
    }
}
