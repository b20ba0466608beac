//! Prewhitening of complex symbol batches.
//!
//! Before transmission the packed batch is shifted to zero mean and mapped to
//! identity covariance; the receiver undoes both steps.
//!
//! # Example
//!
//! ```
//! use semalign::preprocessing::Prewhitener;
//! use semalign::primitives::{CMatrix, Complex64};
//!
//! let x = CMatrix::from_fn(2, 50, |i, j| {
//!     Complex64::new(((i + 1) * j) as f64 % 7.0, (j % 3) as f64 - i as f64)
//! });
//!
//! let mut whitener = Prewhitener::new();
//! let white = whitener.fit_transform(&x).expect("fit_transform should succeed");
//! let back = whitener.inverse_transform(&white).expect("inverse should succeed");
//! assert!((back - x).norm() < 1e-8);
//! ```

use nalgebra::DVector;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SemAlignError};
use crate::primitives::{CMatrix, Complex64};

/// Relative floor applied to covariance eigenvalues before taking roots.
const EIGEN_FLOOR: f64 = 1e-10;

/// Zero-mean / identity-covariance transform of a complex batch.
///
/// With covariance `C = V·Λ·Vᴴ` the forward map is `L⁻¹·(x − μ)` and the
/// inverse `L·w + μ`, where `L = V·Λ'^{1/2}·Vᴴ`. `Λ'` floors the spectrum at
/// `1e-10·λ_max`, so batches with fewer observations than features still
/// yield an invertible pair.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Prewhitener {
    /// Mean over observations (computed during fit).
    mean: Option<DVector<Complex64>>,
    /// Covariance square root `L`.
    l: Option<CMatrix>,
    /// Its inverse `L⁻¹`.
    l_inv: Option<CMatrix>,
}

impl Prewhitener {
    /// Creates an unfitted prewhitener.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the prewhitener has been fitted.
    #[must_use]
    pub fn is_fitted(&self) -> bool {
        self.mean.is_some()
    }

    /// Mean over observations.
    #[must_use]
    pub fn mean(&self) -> Option<&DVector<Complex64>> {
        self.mean.as_ref()
    }

    /// Whitening matrix `L` (covariance square root).
    #[must_use]
    pub fn l(&self) -> Option<&CMatrix> {
        self.l.as_ref()
    }

    /// Learns mean and whitening matrix from a `features × observations` batch.
    ///
    /// # Errors
    ///
    /// Returns an error for an empty batch or if the eigendecomposition fails.
    pub fn fit(&mut self, x: &CMatrix) -> Result<()> {
        let (n_features, n_samples) = x.shape();
        if n_samples == 0 || n_features == 0 {
            return Err(SemAlignError::DimensionMismatch {
                expected: "non-empty batch".to_string(),
                actual: format!("{n_features}x{n_samples}"),
            });
        }

        let mean = DVector::from_fn(n_features, |i, _| x.row(i).sum() / n_samples as f64);
        let centered = subtract_column(x, &mean);
        let cov = (&centered * centered.adjoint()).unscale(n_samples as f64);

        let eig = cov
            .try_symmetric_eigen(f64::EPSILON, 0)
            .ok_or_else(|| {
                SemAlignError::Numerical("covariance eigendecomposition failed".to_string())
            })?;

        let lambda_max = eig.eigenvalues.iter().copied().fold(0.0_f64, f64::max);
        let floor = if lambda_max > 0.0 {
            lambda_max * EIGEN_FLOOR
        } else {
            1.0
        };
        let roots = eig.eigenvalues.map(|v| v.max(floor).sqrt());

        let v = &eig.eigenvectors;
        let scale = |f: &dyn Fn(f64) -> f64| -> CMatrix {
            let mut scaled = v.clone();
            for (j, &r) in roots.iter().enumerate() {
                scaled.column_mut(j).scale_mut(f(r));
            }
            scaled * v.adjoint()
        };

        self.l = Some(scale(&|r| r));
        self.l_inv = Some(scale(&|r| 1.0 / r));
        self.mean = Some(mean);

        tracing::debug!(
            features = n_features,
            samples = n_samples,
            lambda_max,
            "fitted prewhitening"
        );
        Ok(())
    }

    /// Applies `L⁻¹·(x − μ)`.
    ///
    /// # Errors
    ///
    /// Returns an error if not fitted or the feature count differs.
    pub fn transform(&self, x: &CMatrix) -> Result<CMatrix> {
        let mean = self.fitted_mean(x)?;
        self.apply_inverse(&subtract_column(x, mean))
    }

    /// Applies `L⁻¹` to an already mean-centred batch.
    ///
    /// # Errors
    ///
    /// Returns an error if not fitted or the feature count differs.
    pub fn apply_inverse(&self, centered: &CMatrix) -> Result<CMatrix> {
        let l_inv = self
            .l_inv
            .as_ref()
            .ok_or(SemAlignError::NotFitted { model: "Prewhitener" })?;
        check_rows(l_inv.ncols(), centered)?;
        Ok(l_inv * centered)
    }

    /// Applies `L·w + μ`, undoing [`Prewhitener::transform`].
    ///
    /// # Errors
    ///
    /// Returns an error if not fitted or the feature count differs.
    pub fn inverse_transform(&self, w: &CMatrix) -> Result<CMatrix> {
        let mean = self.fitted_mean(w)?;
        let l = self
            .l
            .as_ref()
            .ok_or(SemAlignError::NotFitted { model: "Prewhitener" })?;
        let mut out = l * w;
        for mut col in out.column_iter_mut() {
            col += mean;
        }
        Ok(out)
    }

    /// Fits on `x` and returns its whitened version.
    ///
    /// # Errors
    ///
    /// Returns an error if fitting fails.
    pub fn fit_transform(&mut self, x: &CMatrix) -> Result<CMatrix> {
        self.fit(x)?;
        self.transform(x)
    }

    fn fitted_mean(&self, x: &CMatrix) -> Result<&DVector<Complex64>> {
        let mean = self
            .mean
            .as_ref()
            .ok_or(SemAlignError::NotFitted { model: "Prewhitener" })?;
        check_rows(mean.len(), x)?;
        Ok(mean)
    }
}

/// Fits a [`Prewhitener`] and returns the whitened batch with it.
///
/// # Errors
///
/// Returns an error if fitting fails.
pub fn prewhiten(x: &CMatrix) -> Result<(CMatrix, Prewhitener)> {
    let mut whitener = Prewhitener::new();
    let white = whitener.fit_transform(x)?;
    Ok((white, whitener))
}

fn subtract_column(x: &CMatrix, mean: &DVector<Complex64>) -> CMatrix {
    let mut out = x.clone();
    for mut col in out.column_iter_mut() {
        col -= mean;
    }
    out
}

fn check_rows(expected: usize, x: &CMatrix) -> Result<()> {
    if x.nrows() == expected {
        Ok(())
    } else {
        Err(SemAlignError::dimension_mismatch(
            "whitened features",
            expected,
            x.nrows(),
        ))
    }
}

#[cfg(test)]
mod tests;
