//! Element-wise helpers for fixed-shape numeric sequences (positions, sizes,
//! scroll offsets). Mismatched lengths are an error, never a silent
//! truncation.

use crate::error::{DataflowError, Result};

/// Combine two sequences element-wise.
pub fn zip_with<A, B, C, F>(xs: &[A], ys: &[B], f: F) -> Result<Vec<C>>
where
    F: Fn(&A, &B) -> C,
{
    if xs.len() != ys.len() {
        return Err(DataflowError::shape(xs.len(), ys.len()));
    }
    Ok(xs.iter().zip(ys).map(|(x, y)| f(x, y)).collect())
}

/// Element-wise sum.
pub fn vector_plus(xs: &[f64], ys: &[f64]) -> Result<Vec<f64>> {
    zip_with(xs, ys, |x, y| x + y)
}

/// Element-wise difference.
pub fn vector_diff(xs: &[f64], ys: &[f64]) -> Result<Vec<f64>> {
    zip_with(xs, ys, |x, y| x - y)
}

/// Multiply every element by `c`.
pub fn vector_scale(xs: &[f64], c: f64) -> Vec<f64> {
    xs.iter().map(|x| x * c).collect()
}
