//! Evaluation metrics for reconstructed batches.

use crate::error::{Result, SemAlignError};
use crate::primitives::RMatrix;

/// Computes the Mean Squared Error over all entries.
///
/// MSE = (1/N) * Σ(y_true - y_pred)²
///
/// # Examples
///
/// ```
/// use semalign::metrics::mse;
/// use semalign::primitives::RMatrix;
///
/// let y_true = RMatrix::from_row_slice(2, 2, &[3.0, -0.5, 2.0, 7.0]);
/// let y_pred = RMatrix::from_row_slice(2, 2, &[2.5, 0.0, 2.0, 8.0]);
/// let error = mse(&y_pred, &y_true).expect("same shape");
/// assert!((error - 0.375).abs() < 1e-12);
/// ```
///
/// # Errors
///
/// Returns an error if the shapes differ or the batch is empty.
pub fn mse(y_pred: &RMatrix, y_true: &RMatrix) -> Result<f64> {
    if y_pred.shape() != y_true.shape() {
        return Err(SemAlignError::DimensionMismatch {
            expected: format!("{}x{}", y_true.nrows(), y_true.ncols()),
            actual: format!("{}x{}", y_pred.nrows(), y_pred.ncols()),
        });
    }
    if y_true.is_empty() {
        return Err(SemAlignError::DimensionMismatch {
            expected: "non-empty batch".to_string(),
            actual: "0 entries".to_string(),
        });
    }

    Ok((y_pred - y_true).norm_squared() / y_true.len() as f64)
}

/// Cosine similarity of two slices.
///
/// Returns 0 if the lengths differ or either slice is zero.
#[must_use]
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f64>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mse_perfect() {
        let y = RMatrix::from_fn(3, 4, |i, j| (i + j) as f64);
        assert_eq!(mse(&y, &y).expect("mse"), 0.0);
    }

    #[test]
    fn test_mse_shape_mismatch() {
        let a = RMatrix::zeros(2, 3);
        let b = RMatrix::zeros(3, 2);
        assert!(matches!(
            mse(&a, &b),
            Err(SemAlignError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_mse_empty() {
        let a = RMatrix::zeros(0, 3);
        assert!(mse(&a, &a).is_err());
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[2.0, 0.0]) - 1.0).abs() < 1e-12);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 3.0]).abs() < 1e-12);
        assert!((cosine_similarity(&[1.0, 1.0], &[-1.0, -1.0]) + 1.0).abs() < 1e-12);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 2.0]), 0.0);
    }

    #[test]
    fn test_cosine_similarity_length_mismatch() {
        assert_eq!(cosine_similarity(&[1.0, 2.0, 3.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[1.0]), 0.0);
    }
}
