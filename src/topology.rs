//! Cartesian process grids over an MPI communicator
use log::debug;
use mpi::topology::{Color, SimpleCommunicator};
use mpi::traits::Communicator;

use crate::error::{PencilError, Result};

/// An M-dimensional cartesian arrangement of the processes of a
/// communicator, with one sub-communicator per grid axis.
///
/// Ranks map to grid coordinates in row-major order: rank 0 is coordinate
/// `(0, .., 0)`, rank 1 increments the last coordinate first. The `i`-th
/// sub-communicator groups the processes that share every coordinate except
/// the `i`-th, ordered by that coordinate.
///
/// Construction is collective over `comm`; the topology is immutable
/// afterwards.
pub struct CartesianTopology {
    comm: SimpleCommunicator,
    dims: Vec<usize>,
    coords: Vec<usize>,
    subcomms: Vec<SimpleCommunicator>,
}

impl CartesianTopology {
    /// Arrange the processes of `comm` on a grid of shape `dims`.
    ///
    /// The product of `dims` must equal the communicator size.
    pub fn new<C: Communicator>(comm: &C, dims: &[usize]) -> Result<Self> {
        let size = comm.size() as usize;
        let nprocs: usize = dims.iter().product();
        if dims.is_empty() || nprocs != size {
            return Err(PencilError::GridSizeMismatch {
                dims: dims.to_vec(),
                size,
            });
        }

        let comm = comm.duplicate();
        let rank = comm.rank() as usize;
        let coords = coords_of(dims, rank);

        let mut subcomms = Vec::with_capacity(dims.len());
        for axis in 0..dims.len() {
            // All processes with equal coordinates away from `axis` share a
            // color; the key orders sub-ranks by the coordinate on `axis`.
            let mut color = 0;
            for (a, (&d, &c)) in dims.iter().zip(&coords).enumerate() {
                if a != axis {
                    color = color * d + c;
                }
            }
            let sub = comm
                .split_by_color_with_key(Color::with_value(color as i32), coords[axis] as i32)
                .ok_or(PencilError::CommSplit { axis })?;
            debug_assert_eq!(sub.rank() as usize, coords[axis]);
            debug_assert_eq!(sub.size() as usize, dims[axis]);
            subcomms.push(sub);
        }

        debug!(
            "cartesian topology: grid {:?}, rank {} at {:?}",
            dims, rank, coords
        );
        Ok(Self {
            comm,
            dims: dims.to_vec(),
            coords,
            subcomms,
        })
    }

    /// Number of grid axes
    #[must_use]
    pub fn ndims(&self) -> usize {
        self.dims.len()
    }

    /// Grid shape
    #[must_use]
    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    /// Number of processes along one grid axis
    #[must_use]
    pub fn size(&self, axis: usize) -> usize {
        self.dims[axis]
    }

    /// Total number of processes on the grid
    #[must_use]
    pub fn num_processes(&self) -> usize {
        self.dims.iter().product()
    }

    /// Rank of this process in the grid communicator
    #[must_use]
    pub fn rank(&self) -> usize {
        self.comm.rank() as usize
    }

    /// Grid coordinates of this process
    #[must_use]
    pub fn coords(&self) -> &[usize] {
        &self.coords
    }

    /// Rank of the process at the given grid coordinates
    pub fn rank_of(&self, coords: &[usize]) -> Result<usize> {
        if coords.len() != self.dims.len() {
            return Err(PencilError::AxisOutOfRange {
                axis: coords.len(),
                ndim: self.dims.len(),
            });
        }
        let mut rank = 0;
        for (axis, (&d, &c)) in self.dims.iter().zip(coords).enumerate() {
            if c >= d {
                return Err(PencilError::AxisOutOfRange { axis, ndim: d });
            }
            rank = rank * d + c;
        }
        Ok(rank)
    }

    /// Grid coordinates of an arbitrary rank
    #[must_use]
    pub fn coords_of(&self, rank: usize) -> Vec<usize> {
        coords_of(&self.dims, rank)
    }

    /// The grid communicator itself
    #[must_use]
    pub fn comm(&self) -> &SimpleCommunicator {
        &self.comm
    }

    /// Sub-communicator grouping the processes that differ only in the
    /// coordinate on `axis`
    #[must_use]
    pub fn subcomm(&self, axis: usize) -> &SimpleCommunicator {
        &self.subcomms[axis]
    }
}

impl std::fmt::Debug for CartesianTopology {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("CartesianTopology")
            .field("dims", &self.dims)
            .field("coords", &self.coords)
            .finish()
    }
}

/// Row-major coordinates of `rank` on a grid of shape `dims`
fn coords_of(dims: &[usize], rank: usize) -> Vec<usize> {
    let mut coords = vec![0; dims.len()];
    let mut rest = rank;
    for (i, &d) in dims.iter().enumerate().rev() {
        coords[i] = rest % d;
        rest /= d;
    }
    coords
}

#[cfg(test)]
mod test {
    use super::coords_of;

    #[test]
    fn row_major_coords() {
        let dims = [2, 3];
        let expected = [[0, 0], [0, 1], [0, 2], [1, 0], [1, 1], [1, 2]];
        for (rank, want) in expected.iter().enumerate() {
            assert_eq!(coords_of(&dims, rank), want.to_vec());
        }
    }

    #[test]
    fn coords_invert_rank() {
        let dims = [3, 2, 4];
        for rank in 0..24 {
            let c = coords_of(&dims, rank);
            let back = ((c[0] * dims[1]) + c[1]) * dims[2] + c[2];
            assert_eq!(back, rank);
        }
    }
}
