//! Sylvester equation solvers.
//!
//! [`solve_sylvester`] is the general Bartels–Stewart solver for
//! `A·X + X·B = C` over complex Schur forms. When both sides are Hermitian
//! the system decouples in their eigenbases: [`HermitianFactor`] holds the
//! right-hand decomposition so a loop that keeps `B` (or `P`) fixed pays
//! for it once. [`solve_hermitian_sylvester`] and
//! [`solve_weighted_sylvester`] then only decompose the left factor.

use nalgebra::linalg::Schur;
use nalgebra::DVector;

use super::CMatrix;
use crate::error::{Result, SemAlignError};

/// QR sweeps allowed per matrix dimension before a decomposition gives up.
const SWEEPS_PER_DIM: usize = 1_000;

fn sweep_limit(dim: usize) -> usize {
    SWEEPS_PER_DIM * dim.max(1)
}

/// Eigendecomposition `P = Q·diag(λ)·Qᴴ` of a Hermitian matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct HermitianFactor {
    eigenvectors: CMatrix,
    eigenvalues: DVector<f64>,
}

impl HermitianFactor {
    /// Decomposes the Hermitian `p`.
    ///
    /// # Errors
    ///
    /// Returns [`SemAlignError::DimensionMismatch`] if `p` is not square, or
    /// [`SemAlignError::Numerical`] if the eigendecomposition does not
    /// converge.
    pub fn new(p: &CMatrix) -> Result<Self> {
        if !p.is_square() {
            return Err(SemAlignError::DimensionMismatch {
                expected: "square Hermitian matrix".to_string(),
                actual: format!("{}x{}", p.nrows(), p.ncols()),
            });
        }
        let eigen = p
            .clone()
            .try_symmetric_eigen(f64::EPSILON, sweep_limit(p.nrows()))
            .ok_or_else(|| SemAlignError::Numerical("Hermitian eigendecomposition failed".into()))?;
        Ok(Self {
            eigenvectors: eigen.eigenvectors,
            eigenvalues: eigen.eigenvalues,
        })
    }

    /// Side length of `P`.
    #[must_use]
    pub fn dim(&self) -> usize {
        self.eigenvalues.len()
    }

    /// Eigenvalues `λ`, unsorted.
    #[must_use]
    pub fn eigenvalues(&self) -> &DVector<f64> {
        &self.eigenvalues
    }

    /// `λ_max / λ_min`, or `+∞` unless `P` is positive definite.
    #[must_use]
    pub fn condition_number(&self) -> f64 {
        let max = self.eigenvalues.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let min = self.eigenvalues.iter().copied().fold(f64::INFINITY, f64::min);
        if min > 0.0 {
            max / min
        } else {
            f64::INFINITY
        }
    }

    /// Factor of `s·P⁻¹`, sharing the eigenvectors of `P`.
    ///
    /// # Errors
    ///
    /// Returns [`SemAlignError::SingularMatrix`] if `P` has a zero eigenvalue.
    pub fn scaled_inverse(&self, s: f64) -> Result<Self> {
        Ok(Self {
            eigenvectors: self.eigenvectors.clone(),
            eigenvalues: self.inverse_eigenvalues()?.scale(s),
        })
    }

    /// `R·P⁻¹`.
    ///
    /// # Errors
    ///
    /// Returns [`SemAlignError::DimensionMismatch`] if `R` has the wrong
    /// column count, or [`SemAlignError::SingularMatrix`] if `P` is singular.
    pub fn solve_right(&self, r: &CMatrix) -> Result<CMatrix> {
        if r.ncols() != self.dim() {
            return Err(SemAlignError::dimension_mismatch("P⁻¹ right solve", self.dim(), r.ncols()));
        }
        let mut rq = r * &self.eigenvectors;
        for (j, inv) in self.inverse_eigenvalues()?.iter().enumerate() {
            rq.column_mut(j).scale_mut(*inv);
        }
        Ok(rq * self.eigenvectors.adjoint())
    }

    fn inverse_eigenvalues(&self) -> Result<DVector<f64>> {
        if self.eigenvalues.iter().any(|l| l.abs() < f64::MIN_POSITIVE) {
            return Err(SemAlignError::SingularMatrix {
                context: "Hermitian inverse",
            });
        }
        Ok(self.eigenvalues.map(f64::recip))
    }
}

/// Solves `A·X + X·B = C` for `X` (Bartels–Stewart).
///
/// `A` is `m × m`, `B` is `k × k`, `C` is `m × k`.
///
/// # Algorithm
///
/// ```text
/// A = Q₁ T₁ Q₁ᴴ,  B = Q₂ T₂ Q₂ᴴ          (complex Schur, Tᵢ upper triangular)
/// T₁ Y + Y T₂ = Q₁ᴴ C Q₂                 (column-by-column back substitution)
/// X = Q₁ Y Q₂ᴴ
/// ```
///
/// # Errors
///
/// Returns [`SemAlignError::DimensionMismatch`] for incompatible shapes,
/// [`SemAlignError::Numerical`] if a Schur decomposition does not converge,
/// and [`SemAlignError::SingularMatrix`] if `A` and `−B` share an eigenvalue.
pub fn solve_sylvester(a: &CMatrix, b: &CMatrix, c: &CMatrix) -> Result<CMatrix> {
    let (m, k) = c.shape();
    if a.shape() != (m, m) {
        return Err(SemAlignError::DimensionMismatch {
            expected: format!("A of shape {m}x{m}"),
            actual: format!("{}x{}", a.nrows(), a.ncols()),
        });
    }
    if b.shape() != (k, k) {
        return Err(SemAlignError::DimensionMismatch {
            expected: format!("B of shape {k}x{k}"),
            actual: format!("{}x{}", b.nrows(), b.ncols()),
        });
    }

    let (q1, t1) = Schur::try_new(a.clone(), f64::EPSILON, sweep_limit(m))
        .ok_or_else(|| SemAlignError::Numerical("Schur decomposition of A failed".to_string()))?
        .unpack();
    let (q2, t2) = Schur::try_new(b.clone(), f64::EPSILON, sweep_limit(k))
        .ok_or_else(|| SemAlignError::Numerical("Schur decomposition of B failed".to_string()))?
        .unpack();

    let f = q1.adjoint() * c * &q2;
    let mut y = CMatrix::zeros(m, k);

    for col in 0..k {
        let mut rhs = f.column(col).into_owned();
        for j in 0..col {
            rhs -= y.column(j) * t2[(j, col)];
        }

        let mut lhs = t1.clone();
        for i in 0..m {
            lhs[(i, i)] += t2[(col, col)];
        }

        let y_col = lhs
            .solve_upper_triangular(&rhs)
            .ok_or(SemAlignError::SingularMatrix { context: "Sylvester solve" })?;
        y.set_column(col, &y_col);
    }

    Ok(q1 * y * q2.adjoint())
}

/// Solves `A·X + X·B = C` for Hermitian `A` (`m × m`) and a decomposed
/// Hermitian `B` (`k × k`).
///
/// With `A = Qa·Da·Qaᴴ` and `B = Qb·Db·Qbᴴ` the system decouples into
/// `X̃ᵢⱼ = C̃ᵢⱼ / (aᵢ + bⱼ)`.
///
/// # Errors
///
/// Returns [`SemAlignError::DimensionMismatch`] for incompatible shapes,
/// [`SemAlignError::Numerical`] if the eigendecomposition of `A` fails, and
/// [`SemAlignError::SingularMatrix`] if some `aᵢ + bⱼ` vanishes.
pub fn solve_hermitian_sylvester(a: &CMatrix, b: &HermitianFactor, c: &CMatrix) -> Result<CMatrix> {
    decoupled_solve(a, b, c, "Hermitian Sylvester solve", |ai, bj| ai + bj)
}

/// Solves `A·X·P + s·X = R` for Hermitian `A` (`m × m`) and a decomposed
/// Hermitian `P` (`k × k`).
///
/// With `A = Qa·Da·Qaᴴ` and `P = Qp·Dp·Qpᴴ` the system decouples into
/// `X̃ᵢⱼ = R̃ᵢⱼ / (aᵢ·pⱼ + s)`. `P` may be singular.
///
/// # Errors
///
/// Returns [`SemAlignError::DimensionMismatch`] for incompatible shapes,
/// [`SemAlignError::Numerical`] if the eigendecomposition of `A` fails, and
/// [`SemAlignError::SingularMatrix`] if some `aᵢ·pⱼ + s` vanishes.
pub fn solve_weighted_sylvester(
    a: &CMatrix,
    p: &HermitianFactor,
    shift: f64,
    r: &CMatrix,
) -> Result<CMatrix> {
    decoupled_solve(a, p, r, "weighted Sylvester solve", |ai, pj| ai * pj + shift)
}

fn decoupled_solve<D>(
    a: &CMatrix,
    right: &HermitianFactor,
    r: &CMatrix,
    context: &'static str,
    denominator: D,
) -> Result<CMatrix>
where
    D: Fn(f64, f64) -> f64,
{
    let (m, k) = r.shape();
    if a.shape() != (m, m) || right.dim() != k {
        return Err(SemAlignError::DimensionMismatch {
            expected: format!("left {m}x{m} and right {k}x{k}"),
            actual: format!(
                "left {}x{} and right {}x{}",
                a.nrows(),
                a.ncols(),
                right.dim(),
                right.dim()
            ),
        });
    }

    let left = HermitianFactor::new(a)?;
    let mut rt = left.eigenvectors.adjoint() * r * &right.eigenvectors;
    for j in 0..k {
        for i in 0..m {
            let denom = denominator(left.eigenvalues[i], right.eigenvalues[j]);
            if denom.abs() < f64::MIN_POSITIVE {
                return Err(SemAlignError::SingularMatrix { context });
            }
            rt[(i, j)] /= denom;
        }
    }

    Ok(&left.eigenvectors * rt * right.eigenvectors.adjoint())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::Complex64;

    fn c(re: f64, im: f64) -> Complex64 {
        Complex64::new(re, im)
    }

    fn real_2x2() -> CMatrix {
        CMatrix::from_row_slice(2, 2, &[c(5.0, 0.0), c(1.0, 0.0), c(1.0, 0.0), c(4.0, 0.0)])
    }

    fn hermitian_2x2() -> CMatrix {
        CMatrix::from_row_slice(2, 2, &[c(2.0, 0.0), c(0.5, 0.5), c(0.5, -0.5), c(1.0, 0.0)])
    }

    #[test]
    fn test_sylvester_recovers_known_solution() {
        let a = CMatrix::from_row_slice(
            2,
            2,
            &[c(3.0, 0.0), c(1.0, 0.5), c(0.2, 0.0), c(2.0, -0.3)],
        );
        let b = CMatrix::from_row_slice(
            3,
            3,
            &[
                c(4.0, 0.0),
                c(0.5, 0.0),
                c(0.0, 0.1),
                c(0.0, 0.0),
                c(1.5, 0.2),
                c(0.3, 0.0),
                c(0.1, 0.0),
                c(0.0, 0.0),
                c(2.5, 0.0),
            ],
        );
        let x = CMatrix::from_fn(2, 3, |i, j| c(i as f64 - j as f64, 0.5 * (i + j) as f64));
        let rhs = &a * &x + &x * &b;

        let solved = solve_sylvester(&a, &b, &rhs).expect("solve");
        assert!((solved - x).norm() < 1e-9);
    }

    #[test]
    fn test_sylvester_shape_check() {
        let a = CMatrix::identity(2, 2);
        let b = CMatrix::identity(3, 3);
        let rhs = CMatrix::zeros(3, 3);
        assert!(matches!(
            solve_sylvester(&a, &b, &rhs),
            Err(SemAlignError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_hermitian_factor_inverse_and_condition() {
        let p = real_2x2();
        let factor = HermitianFactor::new(&p).expect("factor");
        assert_eq!(factor.dim(), 2);

        let r = CMatrix::from_fn(3, 2, |i, j| c(i as f64 + 1.0, j as f64 - 0.5));
        let expected = &r * p.clone().try_inverse().expect("invertible");
        assert!((factor.solve_right(&r).expect("solve") - expected).norm() < 1e-10);

        // Eigenvalues (9 ± √5)/2
        let condition = (9.0 + 5.0_f64.sqrt()) / (9.0 - 5.0_f64.sqrt());
        assert!((factor.condition_number() - condition).abs() < 1e-10);
    }

    #[test]
    fn test_hermitian_factor_singular() {
        let p = CMatrix::from_diagonal(&DVector::from_vec(vec![c(2.0, 0.0), c(0.0, 0.0)]));
        let factor = HermitianFactor::new(&p).expect("factor");
        assert!(factor.condition_number().is_infinite());
        assert!(matches!(
            factor.scaled_inverse(2.0),
            Err(SemAlignError::SingularMatrix { .. })
        ));
        assert!(HermitianFactor::new(&CMatrix::zeros(2, 3)).is_err());
    }

    #[test]
    fn test_hermitian_sylvester_matches_bartels_stewart() {
        let a = hermitian_2x2();
        let b = CMatrix::from_row_slice(
            3,
            3,
            &[
                c(3.0, 0.0),
                c(0.2, -0.1),
                c(0.0, 0.0),
                c(0.2, 0.1),
                c(2.0, 0.0),
                c(0.4, 0.0),
                c(0.0, 0.0),
                c(0.4, 0.0),
                c(1.5, 0.0),
            ],
        );
        let x = CMatrix::from_fn(2, 3, |i, j| c((i + j) as f64, 1.0 - j as f64));
        let rhs = &a * &x + &x * &b;

        let factor = HermitianFactor::new(&b).expect("factor");
        let decoupled = solve_hermitian_sylvester(&a, &factor, &rhs).expect("decoupled");
        let schur = solve_sylvester(&a, &b, &rhs).expect("schur");
        assert!((&decoupled - &x).norm() < 1e-9);
        assert!((decoupled - schur).norm() < 1e-9);
    }

    #[test]
    fn test_hermitian_sylvester_near_scalar_right_factor() {
        // A whitened Gram matrix makes B almost a multiple of the identity
        let mut b = CMatrix::identity(4, 4).scale(25.0);
        b[(0, 1)] = c(1e-12, 0.0);
        b[(1, 0)] = c(1e-12, 0.0);
        let diagonal = DVector::from_fn(4, |i, _| c(1.0 + i as f64, 0.0));
        let a = CMatrix::from_diagonal(&diagonal);
        let x = CMatrix::from_fn(4, 4, |i, j| c(i as f64 - j as f64, 0.25));
        let rhs = &a * &x + &x * &b;

        let factor = HermitianFactor::new(&b).expect("factor");
        let solved = solve_hermitian_sylvester(&a, &factor, &rhs).expect("solve");
        assert!((solved - x).norm() < 1e-9);
    }

    #[test]
    fn test_weighted_sylvester_with_singular_weight() {
        let a = hermitian_2x2();
        // Rank-one Hermitian weight
        let v = CMatrix::from_row_slice(3, 1, &[c(1.0, 0.0), c(0.0, 1.0), c(1.0, 1.0)]);
        let p = &v * v.adjoint();
        let x = CMatrix::from_fn(2, 3, |i, j| c((i + 2 * j) as f64, -(j as f64)));
        let shift = 3.0;
        let r = &a * &x * &p + &x * Complex64::new(shift, 0.0);

        let factor = HermitianFactor::new(&p).expect("factor");
        let solved = solve_weighted_sylvester(&a, &factor, shift, &r).expect("solve");
        assert!((solved - x).norm() < 1e-9);
    }

    #[test]
    fn test_weighted_matches_classic_form_when_invertible() {
        // A·X·P + s·X = R  ⇔  A·X + X·(s·P⁻¹) = R·P⁻¹
        let a = CMatrix::from_row_slice(
            2,
            2,
            &[c(2.0, 0.0), c(0.0, 1.0), c(0.0, -1.0), c(3.0, 0.0)],
        );
        let p = real_2x2();
        let r = CMatrix::from_fn(2, 2, |i, j| c(1.0 + i as f64, j as f64 - 0.5));
        let shift = 7.0;

        let factor = HermitianFactor::new(&p).expect("factor");
        let b = factor.scaled_inverse(shift).expect("invertible");
        let c_rhs = factor.solve_right(&r).expect("right solve");
        let classic = solve_hermitian_sylvester(&a, &b, &c_rhs).expect("classic");
        let weighted = solve_weighted_sylvester(&a, &factor, shift, &r).expect("weighted");

        let p_inv = p.clone().try_inverse().expect("invertible");
        let schur = solve_sylvester(&a, &(&p_inv * Complex64::new(shift, 0.0)), &(&r * &p_inv))
            .expect("schur");

        assert!((&classic - &weighted).norm() < 1e-9);
        assert!((classic - schur).norm() < 1e-9);
    }

    #[test]
    fn test_decoupled_shape_check() {
        let factor = HermitianFactor::new(&CMatrix::identity(3, 3)).expect("factor");
        let a = CMatrix::identity(2, 2);
        assert!(matches!(
            solve_weighted_sylvester(&a, &factor, 1.0, &CMatrix::zeros(2, 2)),
            Err(SemAlignError::DimensionMismatch { .. })
        ));
        assert!(matches!(
            solve_hermitian_sylvester(&a, &factor, &CMatrix::zeros(3, 3)),
            Err(SemAlignError::DimensionMismatch { .. })
        ));
    }
}
