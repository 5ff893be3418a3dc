//! # Helper functions for tests and examples
use ndarray::{ArrayBase, Data, Dimension};
use num_traits::Float;

/// Assert that two arrays are elementwise close.
///
/// Panics with the offending pair when any distance exceeds `1e-4`; used
/// by tests and the runnable demos.
pub fn approx_eq<A, S, D>(result: &ArrayBase<S, D>, expected: &ArrayBase<S, D>)
where
    A: Float + std::fmt::Display,
    S: Data<Elem = A>,
    D: Dimension,
{
    let tol = A::from(1e-4).unwrap();
    assert_eq!(
        result.shape(),
        expected.shape(),
        "shapes differ: {:?} vs {:?}",
        result.shape(),
        expected.shape()
    );
    for (x, y) in result.iter().zip(expected.iter()) {
        assert!(
            (*x - *y).abs() < tol,
            "elements differ: {} vs {} (tol {})",
            x,
            y,
            tol
        );
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use ndarray::array;

    #[test]
    fn close_arrays_pass() {
        let a = array![1.0, 2.0, 3.0];
        let b = array![1.0, 2.0 + 1e-6, 3.0];
        approx_eq(&a, &b);
    }

    #[test]
    #[should_panic]
    fn distant_arrays_panic() {
        let a = array![1.0, 2.0];
        let b = array![1.0, 2.5];
        approx_eq(&a, &b);
    }
}
