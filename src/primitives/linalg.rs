//! Dense decompositions and solves on top of `nalgebra`.

use nalgebra::{ComplexField, DMatrix, DVector};

use super::{CMatrix, RMatrix};
use crate::error::{Result, SemAlignError};

/// Thin singular value decomposition `M = U·diag(S)·Vᴴ` with the singular
/// values sorted in descending order.
#[derive(Debug, Clone)]
pub struct ThinSvd<T: ComplexField<RealField = f64>> {
    /// Left singular vectors, `rows × k`.
    pub u: DMatrix<T>,
    /// Singular values, length `k = min(rows, cols)`, descending.
    pub singular_values: DVector<f64>,
    /// Right singular vectors (conjugate-transposed), `k × cols`.
    pub v_t: DMatrix<T>,
}

impl<T: ComplexField<RealField = f64>> ThinSvd<T> {
    /// Number of singular triplets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.singular_values.len()
    }

    /// Returns true for the decomposition of an empty matrix.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.singular_values.is_empty()
    }
}

/// Computes the thin SVD of `m`, sorted by descending singular value.
///
/// # Errors
///
/// Returns [`SemAlignError::Numerical`] if the iteration fails to converge.
pub fn thin_svd<T>(m: &DMatrix<T>) -> Result<ThinSvd<T>>
where
    T: ComplexField<RealField = f64>,
{
    let svd = m
        .clone()
        .try_svd(true, true, f64::EPSILON, 0)
        .ok_or_else(|| SemAlignError::Numerical("SVD did not converge".to_string()))?;
    let u = svd
        .u
        .ok_or_else(|| SemAlignError::Numerical("SVD returned no U factor".to_string()))?;
    let v_t = svd
        .v_t
        .ok_or_else(|| SemAlignError::Numerical("SVD returned no Vᴴ factor".to_string()))?;
    let s = svd.singular_values;

    let mut order: Vec<usize> = (0..s.len()).collect();
    order.sort_by(|&a, &b| s[b].total_cmp(&s[a]));

    let k = order.len();
    Ok(ThinSvd {
        u: DMatrix::from_fn(u.nrows(), k, |i, j| u[(i, order[j])].clone()),
        singular_values: DVector::from_fn(k, |i, _| s[order[i]]),
        v_t: DMatrix::from_fn(k, v_t.ncols(), |i, j| v_t[(order[i], j)].clone()),
    })
}

/// Minimum-norm least-squares solution of `a·x ≈ b`.
///
/// `a` is `n × d`, `b` is `n × p`, the result is `d × p`. Singular values
/// below `s_max · max(n, d) · ε` are treated as zero, so underdetermined
/// systems (fewer observations than features) are handled.
///
/// # Errors
///
/// Returns an error if the row counts differ or the SVD fails.
pub fn lstsq(a: &RMatrix, b: &RMatrix) -> Result<RMatrix> {
    if a.nrows() != b.nrows() {
        return Err(SemAlignError::dimension_mismatch(
            "lstsq rows",
            a.nrows(),
            b.nrows(),
        ));
    }

    let svd = thin_svd(a)?;
    let s_max = svd.singular_values.iter().copied().fold(0.0_f64, f64::max);
    let tol = s_max * a.nrows().max(a.ncols()) as f64 * f64::EPSILON;

    // x = V · diag(1/s) · Uᵀ · b
    let mut ut_b = svd.u.transpose() * b;
    for (i, &s) in svd.singular_values.iter().enumerate() {
        let scale = if s > tol { 1.0 / s } else { 0.0 };
        ut_b.row_mut(i).scale_mut(scale);
    }
    Ok(svd.v_t.transpose() * ut_b)
}

/// Computes `b · m⁺` for a Hermitian positive-semidefinite `m`.
///
/// Equals `b · m⁻¹` when `m` is invertible. Eigenvalues below
/// `λ_max · dim · ε` are dropped, so a rank-deficient `m` yields the
/// minimum-norm solution instead of blowing up.
///
/// # Errors
///
/// Returns [`SemAlignError::DimensionMismatch`] if `b` and `m` disagree, or
/// [`SemAlignError::Numerical`] naming `context` if the eigendecomposition
/// fails.
pub fn solve_right_hermitian(b: &CMatrix, m: &CMatrix, context: &'static str) -> Result<CMatrix> {
    if b.ncols() != m.nrows() || !m.is_square() {
        return Err(SemAlignError::dimension_mismatch(context, m.nrows(), b.ncols()));
    }
    let eigen = m
        .clone()
        .try_symmetric_eigen(f64::EPSILON, 0)
        .ok_or_else(|| SemAlignError::Numerical(format!("{context}: eigendecomposition failed")))?;

    let lambda_max = eigen.eigenvalues.iter().copied().fold(0.0_f64, f64::max);
    let tol = lambda_max * m.nrows() as f64 * f64::EPSILON;
    let q = &eigen.eigenvectors;

    // b·Q·Λ⁺·Qᴴ
    let mut bq = b * q;
    for (j, &lambda) in eigen.eigenvalues.iter().enumerate() {
        let scale = if lambda > tol { 1.0 / lambda } else { 0.0 };
        bq.column_mut(j).scale_mut(scale);
    }
    Ok(bq * q.adjoint())
}
