//! Error type shared by all decomposition routines
use crate::storage::StorageKind;
use thiserror::Error;

/// Errors raised during construction of topologies, pencils and arrays,
/// or during a transposition.
///
/// All validation is deterministic over the constructor arguments, so a
/// condition that fails on one rank fails identically on every rank.
#[derive(Debug, Error)]
pub enum PencilError {
    /// Permutation tuple is not a bijection on `0..n`
    #[error("indices {indices:?} do not form a permutation of 0..{len}")]
    InvalidPermutation {
        /// Offending index tuple
        indices: Vec<usize>,
        /// Expected arity
        len: usize,
    },

    /// Tuple length does not match the permutation arity
    #[error("arity mismatch: permutation of length {expected}, tuple of length {actual}")]
    ArityMismatch {
        /// Permutation arity
        expected: usize,
        /// Tuple length
        actual: usize,
    },

    /// Process grid shape does not multiply up to the communicator size
    #[error("process grid {dims:?} does not match communicator size {size}")]
    GridSizeMismatch {
        /// Requested grid shape
        dims: Vec<usize>,
        /// Number of processes in the communicator
        size: usize,
    },

    /// Number of decomposed dimensions does not fit the process grid
    #[error(
        "topology with {topology} grid axes cannot decompose {decomp} dimensions of a {ndim}-dimensional array"
    )]
    IncompatibleTopology {
        /// Grid dimensionality
        topology: usize,
        /// Number of decomposed axes requested
        decomp: usize,
        /// Dimensionality of the global array
        ndim: usize,
    },

    /// Axis index exceeds the array dimensionality
    #[error("axis {axis} out of range for {ndim}-dimensional array")]
    AxisOutOfRange {
        /// Offending axis
        axis: usize,
        /// Array dimensionality
        ndim: usize,
    },

    /// Global array has a zero-length axis
    #[error("global axis {axis} has zero length")]
    EmptyAxis {
        /// Offending axis
        axis: usize,
    },

    /// The same axis was requested twice for decomposition
    #[error("decomposed axis {axis} appears more than once")]
    DuplicateDecompAxis {
        /// Repeated axis
        axis: usize,
    },

    /// Container family of a wrapped block differs from the pencil's
    #[error("container family {actual} does not match pencil storage {expected}")]
    ContainerMismatch {
        /// Family expected by the pencil
        expected: StorageKind,
        /// Family of the supplied block
        actual: StorageKind,
    },

    /// Shape or layout of a wrapped block does not match the pencil
    #[error("dimension mismatch: expected shape {expected:?}, got {actual:?}")]
    DimensionMismatch {
        /// Shape required by the pencil (memory order plus extra dims)
        expected: Vec<usize>,
        /// Shape of the supplied block
        actual: Vec<usize>,
    },

    /// Two arrays were expected to share one pencil configuration
    #[error("pencil configurations differ: {reason}")]
    PencilMismatch {
        /// Which attribute differed
        reason: String,
    },

    /// Source and destination pencils cannot be transposed into each other
    #[error("incompatible transposition: {reason}")]
    IncompatibleTransposition {
        /// Which compatibility rule was violated
        reason: String,
    },

    /// An MPI transfer completed with unexpected results
    #[error("transport failure with peer {peer}: {reason}")]
    TransportFailure {
        /// Rank of the peer inside the exchange sub-communicator
        peer: i32,
        /// Underlying condition
        reason: String,
    },

    /// Allocation requested for a storage family this build cannot provide
    #[error("storage family {0} cannot allocate in this build")]
    UnsupportedStorage(StorageKind),

    /// `MPI_Comm_split` returned no communicator for this process
    #[error("communicator split failed on grid axis {axis}")]
    CommSplit {
        /// Grid axis whose sub-communicator was requested
        axis: usize,
    },
}

/// Convenience alias used throughout the crate
pub type Result<T> = std::result::Result<T, PencilError>;
