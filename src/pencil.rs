//! Decomposition descriptors: which axes are split over which grid axes
use std::cell::{RefCell, RefMut};
use std::ops::Range;

use log::debug;

use crate::error::{PencilError, Result};
use crate::permutation::Permutation;
use crate::storage::{Scratch, StorageKind};
use crate::topology::CartesianTopology;

/// Contiguous range owned by block `i` of `nblocks` along an axis of
/// length `len`.
///
/// Blocks tile the axis without gaps and differ in size by at most one
/// element; the rule is pure arithmetic and therefore identical on every
/// rank.
#[must_use]
pub fn block_range(len: usize, nblocks: usize, i: usize) -> Range<usize> {
    debug_assert!(i < nblocks);
    (i * len / nblocks)..((i + 1) * len / nblocks)
}

/// Description of how one global array is decomposed over a process grid.
///
/// A pencil holds the global shape, the logical axes split over the grid
/// axes (`decomp_dims[g]` is split over grid axis `g`), the permutation in
/// which local data is laid out in memory, and the container family of its
/// blocks. It also owns the scratch buffers reused by transpositions.
///
/// Pencils are immutable after construction (the scratch is interior state
/// invisible to layout math) and cheap to derive from one another; several
/// pencils typically share one [`CartesianTopology`].
pub struct Pencil<'t> {
    topology: &'t CartesianTopology,
    global_size: Vec<usize>,
    decomp_dims: Vec<usize>,
    permutation: Permutation,
    storage: StorageKind,
    /// Per logical axis, the global range owned by this rank
    local_ranges: Vec<Range<usize>>,
    send_buf: RefCell<Scratch>,
    recv_buf: RefCell<Scratch>,
}

impl<'t> Pencil<'t> {
    /// Construct a pencil over `topology`.
    ///
    /// `global_size` is the logical shape of the full array, `decomp_dims`
    /// lists the axes split over the grid axes in grid-axis order, and
    /// `permutation` (arity N) gives the memory layout of local blocks.
    /// Collective in the sense that every rank must construct it with the
    /// same arguments.
    pub fn new(
        storage: StorageKind,
        global_size: &[usize],
        decomp_dims: &[usize],
        topology: &'t CartesianTopology,
        permutation: Permutation,
    ) -> Result<Self> {
        let ndim = global_size.len();
        if decomp_dims.len() != topology.ndims() || ndim < decomp_dims.len() + 1 {
            return Err(PencilError::IncompatibleTopology {
                topology: topology.ndims(),
                decomp: decomp_dims.len(),
                ndim,
            });
        }
        for (i, &axis) in decomp_dims.iter().enumerate() {
            if axis >= ndim {
                return Err(PencilError::AxisOutOfRange { axis, ndim });
            }
            if decomp_dims[..i].contains(&axis) {
                return Err(PencilError::DuplicateDecompAxis { axis });
            }
        }
        if permutation.len() != ndim {
            return Err(PencilError::ArityMismatch {
                expected: ndim,
                actual: permutation.len(),
            });
        }
        for (axis, &len) in global_size.iter().enumerate() {
            if len == 0 {
                return Err(PencilError::EmptyAxis { axis });
            }
        }

        let coords = topology.coords();
        let local_ranges = (0..ndim)
            .map(|axis| {
                match decomp_dims.iter().position(|&d| d == axis) {
                    Some(g) => block_range(global_size[axis], topology.size(g), coords[g]),
                    None => 0..global_size[axis],
                }
            })
            .collect::<Vec<_>>();

        debug!(
            "pencil: global {:?}, decomp {:?}, permutation {}, local ranges {:?}",
            global_size, decomp_dims, permutation, local_ranges
        );
        Ok(Self {
            topology,
            global_size: global_size.to_vec(),
            decomp_dims: decomp_dims.to_vec(),
            permutation,
            storage,
            local_ranges,
            send_buf: RefCell::new(Scratch::new()),
            recv_buf: RefCell::new(Scratch::new()),
        })
    }

    /// Same topology and global shape, different decomposed axes
    pub fn with_decomp(&self, decomp_dims: &[usize]) -> Result<Self> {
        Self::new(
            self.storage,
            &self.global_size,
            decomp_dims,
            self.topology,
            self.permutation.clone(),
        )
    }

    /// Same decomposition, different memory permutation
    pub fn with_permutation(&self, permutation: Permutation) -> Result<Self> {
        Self::new(
            self.storage,
            &self.global_size,
            &self.decomp_dims,
            self.topology,
            permutation,
        )
    }

    /// Same decomposition, different container family
    pub fn with_storage(&self, storage: StorageKind) -> Result<Self> {
        Self::new(
            storage,
            &self.global_size,
            &self.decomp_dims,
            self.topology,
            self.permutation.clone(),
        )
    }

    /// Logical shape of the full array
    #[must_use]
    pub fn global_size(&self) -> &[usize] {
        &self.global_size
    }

    /// Dimensionality of the global array
    #[must_use]
    pub fn ndim(&self) -> usize {
        self.global_size.len()
    }

    /// Axes split over the grid, in grid-axis order
    #[must_use]
    pub fn decomp_dims(&self) -> &[usize] {
        &self.decomp_dims
    }

    /// Memory layout permutation of local blocks
    #[must_use]
    pub fn permutation(&self) -> &Permutation {
        &self.permutation
    }

    /// The process grid this pencil is decomposed over
    #[must_use]
    pub fn topology(&self) -> &'t CartesianTopology {
        self.topology
    }

    /// Container family of blocks allocated on this pencil
    #[must_use]
    pub fn storage_kind(&self) -> StorageKind {
        self.storage
    }

    /// Grid axis over which `axis` is split, if it is decomposed
    #[must_use]
    pub fn grid_axis_of(&self, axis: usize) -> Option<usize> {
        self.decomp_dims.iter().position(|&d| d == axis)
    }

    /// Global range owned by this rank along `axis`
    #[must_use]
    pub fn local_range(&self, axis: usize) -> Range<usize> {
        self.local_ranges[axis].clone()
    }

    /// Global ranges owned by this rank, one per logical axis
    #[must_use]
    pub fn local_ranges(&self) -> &[Range<usize>] {
        &self.local_ranges
    }

    /// Global range owned along `axis` by the process at grid coordinates
    /// `coords`
    #[must_use]
    pub fn remote_range(&self, axis: usize, coords: &[usize]) -> Range<usize> {
        match self.grid_axis_of(axis) {
            Some(g) => block_range(self.global_size[axis], self.topology.size(g), coords[g]),
            None => 0..self.global_size[axis],
        }
    }

    /// Local shape in logical axis order
    #[must_use]
    pub fn local_size_logical(&self) -> Vec<usize> {
        self.local_ranges.iter().map(Range::len).collect()
    }

    /// Local shape in memory order, i.e. the permuted logical shape
    #[must_use]
    pub fn local_size_memory(&self) -> Vec<usize> {
        let logical = self.local_size_logical();
        (0..logical.len())
            .map(|i| logical[self.permutation.index(i)])
            .collect()
    }

    /// Number of elements in the local block
    #[must_use]
    pub fn local_len(&self) -> usize {
        self.local_ranges.iter().map(Range::len).product()
    }

    /// True when both pencils describe the same decomposition of the same
    /// array on the same topology
    #[must_use]
    pub fn same_config(&self, other: &Self) -> bool {
        std::ptr::eq(self.topology, other.topology)
            && self.global_size == other.global_size
            && self.decomp_dims == other.decomp_dims
            && self.permutation == other.permutation
            && self.storage == other.storage
    }

    /// Scratch buffer used to pack outgoing blocks
    pub(crate) fn send_scratch(&self) -> RefMut<'_, Scratch> {
        self.send_buf.borrow_mut()
    }

    /// Scratch buffer receiving incoming blocks
    pub(crate) fn recv_scratch(&self) -> RefMut<'_, Scratch> {
        self.recv_buf.borrow_mut()
    }
}

impl PartialEq for Pencil<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.same_config(other)
    }
}

impl std::fmt::Debug for Pencil<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Pencil")
            .field("global_size", &self.global_size)
            .field("decomp_dims", &self.decomp_dims)
            .field("permutation", &self.permutation)
            .field("storage", &self.storage)
            .field("local_ranges", &self.local_ranges)
            .finish()
    }
}

#[cfg(test)]
mod test {
    use super::block_range;

    #[test]
    fn blocks_tile_the_axis() {
        for (len, nblocks) in [(10, 3), (16, 4), (7, 2), (5, 5), (4, 7)] {
            let mut covered = 0;
            for i in 0..nblocks {
                let r = block_range(len, nblocks, i);
                assert_eq!(r.start, covered, "gap before block {}", i);
                covered = r.end;
            }
            assert_eq!(covered, len);
        }
    }

    #[test]
    fn blocks_are_balanced() {
        for (len, nblocks) in [(10, 3), (16, 4), (7, 2), (100, 8), (9, 4)] {
            let sizes: Vec<usize> = (0..nblocks).map(|i| block_range(len, nblocks, i).len()).collect();
            let min = sizes.iter().min().unwrap();
            let max = sizes.iter().max().unwrap();
            assert!(max - min <= 1, "unbalanced split of {} into {}: {:?}", len, nblocks, sizes);
        }
    }

    #[test]
    fn degenerate_splits() {
        assert_eq!(block_range(5, 1, 0), 0..5);
        assert_eq!(block_range(3, 7, 2), 0..1);
        assert_eq!(block_range(3, 7, 6), 2..3);
    }
}
