//! Static index permutations applied to shapes and index tuples
//!
//! A [`Permutation`] describes the order in which the logical axes of an
//! array are laid out in memory. The identity case is a separate variant so
//! that layout arithmetic can skip the indirection entirely when no
//! permutation is in effect.
use crate::error::{PencilError, Result};

/// A bijection on `0..n`, with a dedicated identity representation.
///
/// `apply` moves the value at input position `sigma[i]` to output position
/// `i`, i.e. for a shape tuple it yields the memory shape from the logical
/// shape.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Permutation {
    /// No reordering of `n` positions
    Identity(usize),
    /// Explicit index tuple; `sigma[i]` is the input position written to
    /// output position `i`. Always a true reordering, never `0..n`.
    Explicit(Vec<usize>),
}

impl Permutation {
    /// Identity permutation on `n` positions
    #[must_use]
    pub fn identity(n: usize) -> Self {
        Self::Identity(n)
    }

    /// Build a permutation from an explicit index tuple.
    ///
    /// Tuples equal to `0..n` normalize to [`Permutation::Identity`], so
    /// equality and [`is_identity`](Self::is_identity) are exact.
    pub fn new(indices: &[usize]) -> Result<Self> {
        let n = indices.len();
        let mut seen = vec![false; n];
        for &i in indices {
            if i >= n || seen[i] {
                return Err(PencilError::InvalidPermutation {
                    indices: indices.to_vec(),
                    len: n,
                });
            }
            seen[i] = true;
        }
        if indices.iter().enumerate().all(|(pos, &i)| pos == i) {
            Ok(Self::Identity(n))
        } else {
            Ok(Self::Explicit(indices.to_vec()))
        }
    }

    /// Number of positions this permutation acts on
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Identity(n) => *n,
            Self::Explicit(v) => v.len(),
        }
    }

    /// True for zero-length permutations
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True if applying this permutation leaves every tuple unchanged
    #[must_use]
    pub fn is_identity(&self) -> bool {
        matches!(self, Self::Identity(_))
    }

    /// Input position mapped to output position `i`
    ///
    /// `i` must be below [`len`](Self::len).
    #[must_use]
    pub fn index(&self, i: usize) -> usize {
        debug_assert!(i < self.len());
        match self {
            Self::Identity(_) => i,
            Self::Explicit(v) => v[i],
        }
    }

    /// Reorder `tuple` so that output position `i` holds `tuple[sigma[i]]`
    pub fn apply(&self, tuple: &[usize]) -> Result<Vec<usize>> {
        self.check_arity(tuple)?;
        Ok(match self {
            Self::Identity(_) => tuple.to_vec(),
            Self::Explicit(v) => v.iter().map(|&i| tuple[i]).collect(),
        })
    }

    /// Inverse reordering: `apply(invapply(t)) == t`
    pub fn invapply(&self, tuple: &[usize]) -> Result<Vec<usize>> {
        self.check_arity(tuple)?;
        Ok(match self {
            Self::Identity(_) => tuple.to_vec(),
            Self::Explicit(v) => {
                let mut out = vec![0; v.len()];
                for (pos, &i) in v.iter().enumerate() {
                    out[i] = tuple[pos];
                }
                out
            }
        })
    }

    /// Composition `self . other`, defined as `apply(self, other)`
    pub fn compose(&self, other: &Self) -> Result<Self> {
        match (self, other) {
            (Self::Identity(n), _) => {
                other.check_arity_n(*n)?;
                Ok(other.clone())
            }
            (_, Self::Identity(n)) => {
                self.check_arity_n(*n)?;
                Ok(self.clone())
            }
            (Self::Explicit(_), Self::Explicit(w)) => {
                let composed = self.apply(w)?;
                Self::new(&composed)
            }
        }
    }

    /// The permutation with `apply(inverse(t)) == t` for all tuples
    #[must_use]
    pub fn inverse(&self) -> Self {
        match self {
            Self::Identity(n) => Self::Identity(*n),
            Self::Explicit(v) => {
                let mut inv = vec![0; v.len()];
                for (pos, &i) in v.iter().enumerate() {
                    inv[i] = pos;
                }
                Self::Explicit(inv)
            }
        }
    }

    /// Extend by `k` trailing positions on which the permutation acts as
    /// the identity
    #[must_use]
    pub fn append(&self, k: usize) -> Self {
        match self {
            Self::Identity(n) => Self::Identity(n + k),
            Self::Explicit(v) => {
                let n = v.len();
                let mut out = v.clone();
                out.extend(n..n + k);
                Self::Explicit(out)
            }
        }
    }

    /// Extend by `k` leading positions on which the permutation acts as
    /// the identity
    #[must_use]
    pub fn prepend(&self, k: usize) -> Self {
        match self {
            Self::Identity(n) => Self::Identity(n + k),
            Self::Explicit(v) => {
                let mut out: Vec<usize> = (0..k).collect();
                out.extend(v.iter().map(|&i| i + k));
                Self::Explicit(out)
            }
        }
    }

    fn check_arity(&self, tuple: &[usize]) -> Result<()> {
        if tuple.len() == self.len() {
            Ok(())
        } else {
            Err(PencilError::ArityMismatch {
                expected: self.len(),
                actual: tuple.len(),
            })
        }
    }

    fn check_arity_n(&self, n: usize) -> Result<()> {
        if n == self.len() {
            Ok(())
        } else {
            Err(PencilError::ArityMismatch {
                expected: self.len(),
                actual: n,
            })
        }
    }
}

impl std::fmt::Display for Permutation {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::Identity(n) => write!(f, "Identity({})", n),
            Self::Explicit(v) => write!(f, "{:?}", v),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn identity_normalization() {
        let p = Permutation::new(&[0, 1, 2]).unwrap();
        assert!(p.is_identity());
        assert_eq!(p, Permutation::identity(3));
        let q = Permutation::new(&[1, 0, 2]).unwrap();
        assert!(!q.is_identity());
    }

    #[test]
    fn rejects_non_bijection() {
        assert!(Permutation::new(&[0, 0, 1]).is_err());
        assert!(Permutation::new(&[0, 1, 3]).is_err());
    }

    #[test]
    fn apply_reorders() {
        let p = Permutation::new(&[2, 0, 1]).unwrap();
        assert_eq!(p.apply(&[10, 20, 30]).unwrap(), vec![30, 10, 20]);
    }

    #[test]
    fn apply_invapply_roundtrip() {
        for indices in [vec![0, 1, 2], vec![2, 0, 1], vec![1, 2, 0], vec![2, 1, 0]] {
            let p = Permutation::new(&indices).unwrap();
            let t = vec![4, 7, 9];
            assert_eq!(p.invapply(&p.apply(&t).unwrap()).unwrap(), t);
            assert_eq!(p.apply(&p.invapply(&t).unwrap()).unwrap(), t);
        }
    }

    #[test]
    fn inverse_composes_to_identity() {
        let p = Permutation::new(&[1, 2, 0]).unwrap();
        assert!(p.compose(&p.inverse()).unwrap().is_identity());
        assert!(p.inverse().compose(&p).unwrap().is_identity());
    }

    #[test]
    fn append_and_prepend() {
        let p = Permutation::new(&[1, 0]).unwrap();
        let ap = p.append(2);
        assert_eq!(ap.apply(&[5, 6, 7, 8]).unwrap(), vec![6, 5, 7, 8]);
        let pp = p.prepend(1);
        assert_eq!(pp.apply(&[5, 6, 7]).unwrap(), vec![5, 7, 6]);
        assert!(Permutation::identity(2).append(3).is_identity());
    }

    #[test]
    fn arity_mismatch() {
        let p = Permutation::new(&[1, 0]).unwrap();
        assert!(matches!(
            p.apply(&[1, 2, 3]),
            Err(PencilError::ArityMismatch { expected: 2, actual: 3 })
        ));
    }
}
