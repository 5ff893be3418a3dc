//! Strided block-copy kernels shared by packing, unpacking and gathering
//!
//! All kernels operate on flat element slices with row-major stride
//! descriptions. The innermost loop degenerates to `copy_from_slice` whenever
//! both sides are unit-stride there, which is what the pack/unpack loop-nest
//! ordering arranges for.
use std::ops::Range;

use crate::permutation::Permutation;

/// Row-major (C order) strides of a dense block of the given shape
#[must_use]
pub(crate) fn c_strides(shape: &[usize]) -> Vec<usize> {
    let mut strides = vec![1; shape.len()];
    for i in (0..shape.len().saturating_sub(1)).rev() {
        strides[i] = strides[i + 1] * shape[i + 1];
    }
    strides
}

/// Element strides of each *logical* axis inside a block stored with the
/// given memory permutation.
///
/// `mem_shape` is the stored shape, i.e. `perm . logical_shape`; the result
/// is indexed by logical axis.
#[must_use]
pub(crate) fn logical_strides(perm: &Permutation, mem_shape: &[usize]) -> Vec<usize> {
    let mem = c_strides(mem_shape);
    let mut out = vec![0; mem_shape.len()];
    for (mem_axis, stride) in mem.into_iter().enumerate() {
        out[perm.index(mem_axis)] = stride;
    }
    out
}

/// Number of elements in a block described by per-axis ranges
#[must_use]
pub(crate) fn block_len(ranges: &[Range<usize>]) -> usize {
    ranges.iter().map(Range::len).product()
}

/// Copy a multidimensional block between two flat buffers.
///
/// `dims` are the iteration extents from slowest to fastest varying;
/// `src_strides`/`dst_strides` give the per-dimension element strides and
/// `src_offset`/`dst_offset` the positions of the block's first element.
/// Runs of unit stride on both sides are copied slice-wise.
pub(crate) fn copy_blocked<T: Copy>(
    src: &[T],
    src_offset: usize,
    src_strides: &[usize],
    dst: &mut [T],
    dst_offset: usize,
    dst_strides: &[usize],
    dims: &[usize],
) {
    debug_assert_eq!(dims.len(), src_strides.len());
    debug_assert_eq!(dims.len(), dst_strides.len());
    if dims.iter().any(|&d| d == 0) {
        return;
    }
    if dims.is_empty() {
        dst[dst_offset] = src[src_offset];
        return;
    }

    let last = dims.len() - 1;
    let n = dims[last];
    let ss = src_strides[last];
    let ds = dst_strides[last];
    let outer: usize = dims[..last].iter().product();

    let mut odometer = vec![0_usize; last];
    for _ in 0..outer {
        let mut so = src_offset;
        let mut do_ = dst_offset;
        for (k, &i) in odometer.iter().enumerate() {
            so += i * src_strides[k];
            do_ += i * dst_strides[k];
        }
        if ss == 1 && ds == 1 {
            dst[do_..do_ + n].copy_from_slice(&src[so..so + n]);
        } else {
            for j in 0..n {
                dst[do_ + j * ds] = src[so + j * ss];
            }
        }
        for k in (0..last).rev() {
            odometer[k] += 1;
            if odometer[k] < dims[k] {
                break;
            }
            odometer[k] = 0;
        }
    }
}

/// Offset of a block's first element inside a local array.
///
/// `block` and `local` are per-logical-axis global ranges; `strides` are the
/// logical-axis strides of the local storage.
#[must_use]
pub(crate) fn block_offset(
    block: &[Range<usize>],
    local: &[Range<usize>],
    strides: &[usize],
) -> usize {
    block
        .iter()
        .zip(local)
        .zip(strides)
        .map(|((b, l), s)| (b.start - l.start) * s)
        .sum()
}

/// Intersection of two half-open ranges (possibly empty)
#[must_use]
pub(crate) fn intersect(a: &Range<usize>, b: &Range<usize>) -> Range<usize> {
    let start = a.start.max(b.start);
    let end = a.end.min(b.end);
    start..end.max(start)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn strides_row_major() {
        assert_eq!(c_strides(&[2, 3, 4]), vec![12, 4, 1]);
        assert_eq!(c_strides(&[5]), vec![1]);
        assert!(c_strides(&[]).is_empty());
    }

    #[test]
    fn logical_strides_under_swap() {
        // logical shape (2, 3) stored swapped as (3, 2)
        let perm = Permutation::new(&[1, 0]).unwrap();
        assert_eq!(logical_strides(&perm, &[3, 2]), vec![1, 2]);
        let id = Permutation::identity(2);
        assert_eq!(logical_strides(&id, &[2, 3]), vec![3, 1]);
    }

    #[test]
    fn contiguous_copy() {
        let src = [1, 2, 3, 4, 5, 6];
        let mut dst = [0; 6];
        copy_blocked(&src, 0, &[3, 1], &mut dst, 0, &[3, 1], &[2, 3]);
        assert_eq!(dst, src);
    }

    #[test]
    fn transposing_copy() {
        // read a 2x3 row-major block, write it column-major (i.e. 3x2)
        let src = [1, 2, 3, 4, 5, 6];
        let mut dst = [0; 6];
        copy_blocked(&src, 0, &[3, 1], &mut dst, 0, &[1, 2], &[2, 3]);
        assert_eq!(dst, [1, 4, 2, 5, 3, 6]);
    }

    #[test]
    fn sub_block_pack_unpack() {
        // pack the interior 2x2 of a 4x4, then scatter it back
        let src: Vec<i32> = (0..16).collect();
        let mut packed = [0; 4];
        let strides = c_strides(&[4, 4]);
        let offset = block_offset(&[1..3, 1..3], &[0..4, 0..4], &strides);
        copy_blocked(&src, offset, &strides, &mut packed, 0, &[2, 1], &[2, 2]);
        assert_eq!(packed, [5, 6, 9, 10]);

        let mut back = vec![0; 16];
        copy_blocked(&packed, 0, &[2, 1], &mut back, offset, &strides, &[2, 2]);
        assert_eq!(back[5], 5);
        assert_eq!(back[10], 10);
        assert_eq!(back[0], 0);
    }

    #[test]
    fn empty_block_is_noop() {
        let src = [1, 2, 3];
        let mut dst = [0; 3];
        copy_blocked(&src, 0, &[1, 1], &mut dst, 0, &[1, 1], &[0, 3]);
        assert_eq!(dst, [0, 0, 0]);
    }

    #[test]
    fn range_intersection() {
        assert_eq!(intersect(&(0..5), &(3..9)), 3..5);
        assert_eq!(intersect(&(0..2), &(4..6)).len(), 0);
        assert_eq!(intersect(&(2..8), &(0..10)), 2..8);
    }
}
