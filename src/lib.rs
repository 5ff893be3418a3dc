//! # pencil-decomp
//!
//! Pencil decomposition of n-dimensional arrays over an MPI cartesian
//! process grid.
//!
//! A global array is split across processes along a subset of its axes
//! (a *pencil*); each process holds a dense local block, optionally laid
//! out in a permuted axis order so the next compute stage can run with
//! unit stride. The crate's central operation is the *transposition*: the
//! all-to-all redistribution of an array between two pencils that differ
//! in one decomposed axis.
//!
//! - [`CartesianTopology`] arranges a communicator as a process grid with
//!   one sub-communicator per grid axis.
//! - [`Pencil`] describes a decomposition: global shape, decomposed axes,
//!   memory permutation and per-rank block ranges.
//! - [`PencilArray`] owns the local block and presents logical indexing
//!   over the permuted storage.
//! - [`transpose`] / [`transpose_with`] move data between pencils.
//! - [`all_gather`] / [`gather_root`] assemble the global array for
//!   diagnostics and testing.
//!
//! All construction and communication entry points are collective: every
//! rank of the communicator must call them in the same order with the
//! same arguments.
//!
//! ```no_run
//! use pencil_decomp::{
//!     transpose, CartesianTopology, Pencil, PencilArray, Permutation, StorageKind,
//! };
//!
//! let universe = pencil_decomp::mpi::initialize().unwrap();
//! let world = universe.world();
//! let topology = CartesianTopology::new(&world, &[2, 2]).unwrap();
//!
//! // 3d array, axes 1 and 2 decomposed over the 2x2 grid
//! let x_pencil = Pencil::new(
//!     StorageKind::Host,
//!     &[64, 32, 48],
//!     &[1, 2],
//!     &topology,
//!     Permutation::identity(3),
//! )
//! .unwrap();
//! // same array decomposed over axes 0 and 2 instead
//! let y_pencil = x_pencil.with_decomp(&[0, 2]).unwrap();
//!
//! let mut x = PencilArray::<f64>::allocate(&x_pencil).unwrap();
//! x.fill_with(|index| index[0] as f64);
//! let mut y = PencilArray::<f64>::allocate(&y_pencil).unwrap();
//! transpose(&x, &mut y).unwrap();
//! ```
//!
//! Run MPI programs with `cargo mpirun`, e.g.
//! `cargo mpirun --np 4 --example transpose_3d`.
#![warn(missing_docs)]

pub mod array;
pub mod error;
pub mod functions;
mod layout;
pub mod pencil;
pub mod permutation;
pub mod storage;
pub mod topology;
pub mod transpose;
pub mod utils;

pub use mpi;

pub use crate::array::PencilArray;
pub use crate::error::{PencilError, Result};
pub use crate::functions::{all_gather, broadcast_scalar, gather_root};
pub use crate::pencil::{block_range, Pencil};
pub use crate::permutation::Permutation;
pub use crate::storage::{Block, StorageKind};
pub use crate::topology::CartesianTopology;
pub use crate::transpose::{
    transpose, transpose_with, BufferStrategy, PermuteDims, TransposeMethod, TransposeOptions,
};
