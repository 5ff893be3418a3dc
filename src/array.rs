//! Local dense blocks with logical indexing over permuted storage
use std::ops::Range;

use mpi::topology::SimpleCommunicator;
use ndarray::{ArrayD, IxDyn};
use num_traits::{Float, Zero};

use crate::error::{PencilError, Result};
use crate::layout::{c_strides, copy_blocked, logical_strides};
use crate::pencil::Pencil;
use crate::storage::Block;

/// The local part of a distributed array, allocated on a [`Pencil`].
///
/// The underlying block is stored in the pencil's *memory* order (the
/// permuted logical shape) followed by `E >= 0` extra trailing component
/// dimensions which are neither distributed nor permuted. User-facing
/// Cartesian indexing is logical: the first N indices are permuted into
/// storage order, the trailing E pass through.
pub struct PencilArray<'p, T> {
    pencil: &'p Pencil<'p>,
    /// Dense block, memory-order spatial dims then extra dims
    data: ArrayD<T>,
    extra_dims: Vec<usize>,
}

impl<'p, T> PencilArray<'p, T> {
    /// Allocate a zeroed array on `pencil` without extra dimensions
    pub fn allocate(pencil: &'p Pencil<'p>) -> Result<Self>
    where
        T: Clone + Zero,
    {
        Self::allocate_with_extra(pencil, &[])
    }

    /// Allocate a zeroed array on `pencil` with extra trailing component
    /// dimensions (e.g. vector components)
    pub fn allocate_with_extra(pencil: &'p Pencil<'p>, extra_dims: &[usize]) -> Result<Self>
    where
        T: Clone + Zero,
    {
        let mut shape = pencil.local_size_memory();
        shape.extend_from_slice(extra_dims);
        let block = Block::zeros(pencil.storage_kind(), &shape)?;
        Ok(Self {
            pencil,
            data: block.into_data(),
            extra_dims: extra_dims.to_vec(),
        })
    }

    /// Adopt an existing block as the local part of a distributed array.
    ///
    /// The block's container family must match the pencil's storage kind and
    /// its shape must equal the pencil's memory-order local shape, possibly
    /// extended by extra trailing dimensions. The block must be contiguous
    /// in row-major order.
    pub fn wrap(pencil: &'p Pencil<'p>, block: Block<T>) -> Result<Self> {
        if block.kind() != pencil.storage_kind() {
            return Err(PencilError::ContainerMismatch {
                expected: pencil.storage_kind(),
                actual: block.kind(),
            });
        }
        let mem = pencil.local_size_memory();
        let shape = block.shape().to_vec();
        if shape.len() < mem.len() || shape[..mem.len()] != mem[..] {
            return Err(PencilError::DimensionMismatch {
                expected: mem,
                actual: shape,
            });
        }
        let data = block.into_data();
        if !data.is_standard_layout() {
            return Err(PencilError::DimensionMismatch {
                expected: mem,
                actual: shape,
            });
        }
        let extra_dims = shape[mem.len()..].to_vec();
        Ok(Self {
            pencil,
            data,
            extra_dims,
        })
    }

    /// Extract this rank's block from a replicated global array.
    ///
    /// `global` has the pencil's global shape in logical order, optionally
    /// extended by extra dimensions. No communication takes place.
    pub fn from_global(pencil: &'p Pencil<'p>, global: &ArrayD<T>) -> Result<Self>
    where
        T: Copy + Zero,
    {
        let n = pencil.ndim();
        let gshape = global.shape().to_vec();
        if gshape.len() < n || gshape[..n] != *pencil.global_size() || !global.is_standard_layout()
        {
            return Err(PencilError::DimensionMismatch {
                expected: pencil.global_size().to_vec(),
                actual: gshape,
            });
        }
        let extra_dims = gshape[n..].to_vec();
        let mut out = Self::allocate_with_extra(pencil, &extra_dims)?;

        // iterate the local block in its own memory order so writes are
        // contiguous; reads stride through the global array
        let gstrides_logical = c_strides(&gshape);
        let local = out.local_ranges_ext();
        let order = out.mem_axis_order();
        let src_offset: usize = local
            .iter()
            .zip(&gstrides_logical)
            .map(|(r, s)| r.start * s)
            .sum();
        let dims: Vec<usize> = order.iter().map(|&a| local[a].len()).collect();
        let src_strides: Vec<usize> = order.iter().map(|&a| gstrides_logical[a]).collect();
        let dst_strides = c_strides(&dims);
        let src = global
            .as_slice()
            .expect("standard layout checked above");
        copy_blocked(
            src,
            src_offset,
            &src_strides,
            out.as_slice_mut(),
            0,
            &dst_strides,
            &dims,
        );
        Ok(out)
    }

    /// The pencil this array is distributed on
    #[must_use]
    pub fn pencil(&self) -> &'p Pencil<'p> {
        self.pencil
    }

    /// Extra trailing component dimensions
    #[must_use]
    pub fn extra_dims(&self) -> &[usize] {
        &self.extra_dims
    }

    /// Local shape in logical order, extra dimensions included
    #[must_use]
    pub fn shape(&self) -> Vec<usize> {
        let mut shape = self.pencil.local_size_logical();
        shape.extend_from_slice(&self.extra_dims);
        shape
    }

    /// The raw block in memory order
    #[must_use]
    pub fn parent(&self) -> &ArrayD<T> {
        &self.data
    }

    /// Mutable access to the raw block in memory order
    pub fn parent_mut(&mut self) -> &mut ArrayD<T> {
        &mut self.data
    }

    /// Linear view of the block in its native storage order
    #[must_use]
    pub fn as_slice(&self) -> &[T] {
        self.data
            .as_slice()
            .expect("pencil array blocks are contiguous row-major")
    }

    /// Mutable linear view of the block in its native storage order
    pub fn as_slice_mut(&mut self) -> &mut [T] {
        self.data
            .as_mut_slice()
            .expect("pencil array blocks are contiguous row-major")
    }

    /// Element at a logical index (spatial indices first, then extra)
    #[must_use]
    pub fn get(&self, index: &[usize]) -> &T {
        &self.data[IxDyn(&self.mem_index(index))]
    }

    /// Mutable element at a logical index
    pub fn get_mut(&mut self, index: &[usize]) -> &mut T {
        let mem = self.mem_index(index);
        &mut self.data[IxDyn(&mem)]
    }

    /// Fill the local block from a function of the *global* logical index
    pub fn fill_with<F>(&mut self, f: F)
    where
        T: Copy,
        F: Fn(&[usize]) -> T,
    {
        let local = self.local_ranges_ext();
        let order = self.mem_axis_order();
        let ntot = local.len();
        let mut global_idx: Vec<usize> = local.iter().map(|r| r.start).collect();
        let mut mem_idx = vec![0_usize; ntot];
        let total: usize = local.iter().map(Range::len).product();
        for _ in 0..total {
            for (k, &a) in order.iter().enumerate() {
                mem_idx[k] = global_idx[a] - local[a].start;
            }
            self.data[IxDyn(&mem_idx)] = f(&global_idx);
            // advance the global index, fastest on the last memory axis
            for &a in order.iter().rev() {
                global_idx[a] += 1;
                if global_idx[a] < local[a].end {
                    break;
                }
                global_idx[a] = local[a].start;
            }
        }
    }

    /// New zeroed array on the same pencil with the same extra dimensions
    pub fn similar(&self) -> Result<Self>
    where
        T: Clone + Zero,
    {
        Self::allocate_with_extra(self.pencil, &self.extra_dims)
    }

    /// New zeroed block of the same container family with an arbitrary
    /// shape; plain storage, not a [`PencilArray`]
    pub fn similar_block(&self, shape: &[usize]) -> Result<Block<T>>
    where
        T: Clone + Zero,
    {
        Block::zeros(self.pencil.storage_kind(), shape)
    }

    /// New zeroed array on a different pencil, keeping the extra dimensions
    pub fn similar_on<'q>(&self, pencil: &'q Pencil<'q>) -> Result<PencilArray<'q, T>>
    where
        T: Clone + Zero,
    {
        PencilArray::allocate_with_extra(pencil, &self.extra_dims)
    }

    /// Copy the contents of `src`, which must live on the same pencil
    /// configuration with the same extra dimensions
    pub fn copy_from(&mut self, src: &Self) -> Result<()>
    where
        T: Clone,
    {
        if !self.pencil.same_config(src.pencil) {
            return Err(PencilError::PencilMismatch {
                reason: "arrays live on different pencils".into(),
            });
        }
        if self.extra_dims != src.extra_dims {
            return Err(PencilError::PencilMismatch {
                reason: "arrays have different extra dimensions".into(),
            });
        }
        self.data.assign(&src.data);
        Ok(())
    }

    /// Elementwise closeness of two arrays on the same pencil.
    ///
    /// Process-local, like `==`: every rank compares only its own block.
    #[must_use]
    pub fn approx_eq(&self, other: &Self, tol: T) -> bool
    where
        T: Float,
    {
        self.pencil.same_config(other.pencil)
            && self.extra_dims == other.extra_dims
            && self
                .as_slice()
                .iter()
                .zip(other.as_slice())
                .all(|(a, b)| (*a - *b).abs() <= tol)
    }

    /// Local index ranges in memory order, extra dimensions included.
    ///
    /// This is the hyperslab selection an I/O layer needs to place the
    /// block inside the memory-order global array.
    #[must_use]
    pub fn local_ranges_memory(&self) -> Vec<Range<usize>> {
        let n = self.pencil.ndim();
        let perm = self.pencil.permutation();
        let mut out: Vec<Range<usize>> = (0..n)
            .map(|i| self.pencil.local_range(perm.index(i)))
            .collect();
        out.extend(self.extra_dims.iter().map(|&e| 0..e));
        out
    }

    /// Global dimensions in memory order, extra dimensions included
    #[must_use]
    pub fn global_size_memory(&self) -> Vec<usize> {
        let n = self.pencil.ndim();
        let perm = self.pencil.permutation();
        let global = self.pencil.global_size();
        let mut out: Vec<usize> = (0..n).map(|i| global[perm.index(i)]).collect();
        out.extend_from_slice(&self.extra_dims);
        out
    }

    /// Communicator of the underlying process grid
    #[must_use]
    pub fn communicator(&self) -> &SimpleCommunicator {
        self.pencil.topology().comm()
    }

    /// Release the storage as a tagged block
    #[must_use]
    pub fn into_parent(self) -> Block<T> {
        Block::new(self.pencil.storage_kind(), self.data)
    }

    /// Local ranges over all axes: spatial in logical order, then extras
    pub(crate) fn local_ranges_ext(&self) -> Vec<Range<usize>> {
        let mut out = self.pencil.local_ranges().to_vec();
        out.extend(self.extra_dims.iter().map(|&e| 0..e));
        out
    }

    /// For each memory axis (extras last), the logical axis stored there
    pub(crate) fn mem_axis_order(&self) -> Vec<usize> {
        let n = self.pencil.ndim();
        let perm = self.pencil.permutation();
        let mut out: Vec<usize> = (0..n).map(|i| perm.index(i)).collect();
        out.extend(n..n + self.extra_dims.len());
        out
    }

    /// Strides of each logical axis (extras last) in the local block
    pub(crate) fn strides_ext(&self) -> Vec<usize> {
        let mem_shape = self.data.shape();
        let perm_ext = self.pencil.permutation().append(self.extra_dims.len());
        logical_strides(&perm_ext, mem_shape)
    }

    fn mem_index(&self, index: &[usize]) -> Vec<usize> {
        let n = self.pencil.ndim();
        let e = self.extra_dims.len();
        assert_eq!(index.len(), n + e, "logical index has wrong arity");
        let perm = self.pencil.permutation();
        let mut mem = Vec::with_capacity(n + e);
        mem.extend((0..n).map(|i| index[perm.index(i)]));
        mem.extend_from_slice(&index[n..]);
        mem
    }
}

impl<T: PartialEq> PartialEq for PencilArray<'_, T> {
    /// Process-local equality: each rank compares its own block only
    fn eq(&self, other: &Self) -> bool {
        self.pencil.same_config(other.pencil)
            && self.extra_dims == other.extra_dims
            && self.data == other.data
    }
}

impl<T> std::ops::Index<&[usize]> for PencilArray<'_, T> {
    type Output = T;

    fn index(&self, index: &[usize]) -> &T {
        self.get(index)
    }
}

impl<T> std::ops::IndexMut<&[usize]> for PencilArray<'_, T> {
    fn index_mut(&mut self, index: &[usize]) -> &mut T {
        self.get_mut(index)
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for PencilArray<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("PencilArray")
            .field("pencil", self.pencil)
            .field("extra_dims", &self.extra_dims)
            .field("data", &self.data)
            .finish()
    }
}
