//! Container-family tags, tagged dense blocks and reusable scratch buffers
use mpi::traits::Equivalence;
use ndarray::{ArrayD, IxDyn};
use num_traits::Zero;

use crate::error::{PencilError, Result};

/// Family of containers a pencil allocates from and exchanges through.
///
/// The tag only participates in type-matching of allocations and transfer
/// buffers; layout arithmetic never consults it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum StorageKind {
    /// Host-resident dense storage backed by `ndarray`
    Host,
    /// Accelerator-resident dense storage. Blocks of this family can be
    /// wrapped and type-checked, but this build cannot allocate them.
    Device,
}

impl std::fmt::Display for StorageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match *self {
            StorageKind::Host => write!(f, "Host"),
            StorageKind::Device => write!(f, "Device"),
        }
    }
}

/// A dense block tagged with the container family it belongs to.
///
/// `Block` is the currency of [`PencilArray::wrap`](crate::PencilArray::wrap)
/// and the `similar` family: raw storage travels together with its family so
/// that pencils can reject foreign containers.
#[derive(Debug, Clone)]
pub struct Block<T> {
    kind: StorageKind,
    data: ArrayD<T>,
}

impl<T> Block<T> {
    /// Tag existing storage with a container family.
    ///
    /// The caller asserts that `data` actually lives in that family.
    #[must_use]
    pub fn new(kind: StorageKind, data: ArrayD<T>) -> Self {
        Self { kind, data }
    }

    /// Host-resident block from an `ndarray`
    #[must_use]
    pub fn host(data: ArrayD<T>) -> Self {
        Self::new(StorageKind::Host, data)
    }

    /// Allocate a zeroed block of the given family and shape
    pub fn zeros(kind: StorageKind, shape: &[usize]) -> Result<Self>
    where
        T: Clone + Zero,
    {
        match kind {
            StorageKind::Host => Ok(Self::host(ArrayD::zeros(IxDyn(shape)))),
            other => Err(PencilError::UnsupportedStorage(other)),
        }
    }

    /// Container family of this block
    #[must_use]
    pub fn kind(&self) -> StorageKind {
        self.kind
    }

    /// Shape of the underlying storage
    #[must_use]
    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    /// Borrow the underlying array
    #[must_use]
    pub fn data(&self) -> &ArrayD<T> {
        &self.data
    }

    /// Take the underlying array out of the block
    #[must_use]
    pub fn into_data(self) -> ArrayD<T> {
        self.data
    }
}

/// Reusable untyped scratch, 8-byte aligned, grown on demand.
///
/// Pencils own one scratch buffer for sending and one for receiving; a
/// transposition views the bytes as `[T]` for the duration of the exchange.
#[derive(Debug, Default)]
pub(crate) struct Scratch {
    words: Vec<u64>,
}

impl Scratch {
    pub(crate) fn new() -> Self {
        Self { words: Vec::new() }
    }

    /// View the scratch as a zeroed slice of `len` elements of `T`.
    ///
    /// Returns `None` when `T` requires stronger alignment than the backing
    /// words provide; callers then fall back to a per-call allocation.
    pub(crate) fn typed_mut<T: Equivalence + Copy>(&mut self, len: usize) -> Option<&mut [T]> {
        if std::mem::align_of::<T>() > std::mem::align_of::<u64>() {
            return None;
        }
        let bytes = len * std::mem::size_of::<T>();
        let words = bytes.div_ceil(8);
        if self.words.len() < words {
            self.words.resize(words, 0);
        }
        // Zeroed words are a valid bit pattern for every `Equivalence`
        // element type, so the cast below never exposes invalid values.
        self.words[..words].fill(0);
        // SAFETY: the buffer holds at least `bytes` bytes, the alignment of
        // `T` was checked against the word alignment above, and the region
        // was just zero-initialized.
        Some(unsafe { std::slice::from_raw_parts_mut(self.words.as_mut_ptr().cast::<T>(), len) })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn host_block_allocates() {
        let b: Block<f64> = Block::zeros(StorageKind::Host, &[2, 3]).unwrap();
        assert_eq!(b.kind(), StorageKind::Host);
        assert_eq!(b.shape(), &[2, 3]);
    }

    #[test]
    fn device_block_does_not_allocate() {
        let b: Result<Block<f64>> = Block::zeros(StorageKind::Device, &[2, 3]);
        assert!(matches!(b, Err(PencilError::UnsupportedStorage(StorageKind::Device))));
    }

    #[test]
    fn scratch_reuses_and_grows() {
        let mut s = Scratch::new();
        {
            let v = s.typed_mut::<f64>(4).unwrap();
            assert_eq!(v.len(), 4);
            v[3] = 7.0;
        }
        {
            // a fresh view is zeroed again
            let v = s.typed_mut::<f64>(8).unwrap();
            assert_eq!(v.len(), 8);
            assert_eq!(v[3], 0.0);
        }
        let small = s.typed_mut::<i32>(3).unwrap();
        assert_eq!(small.len(), 3);
    }
}
