//! Core compute primitives.
//!
//! Real and complex batches are `nalgebra` dynamic matrices in the
//! `features × observations` layout. This module holds the packing between
//! the two, the sorted thin SVD, the minimum-norm least-squares solve and the
//! Sylvester solvers used by the ADMM precoder step.

mod complex;
mod linalg;
mod sylvester;

pub use complex::{complex_pack, complex_unpack, packed_len};
pub use linalg::{lstsq, solve_right_hermitian, thin_svd, ThinSvd};
pub use sylvester::{
    solve_hermitian_sylvester, solve_sylvester, solve_weighted_sylvester, HermitianFactor,
};

use nalgebra::DMatrix;
pub use num_complex::Complex64;

/// Real matrix, `features × observations` unless stated otherwise.
pub type RMatrix = DMatrix<f64>;

/// Complex matrix, `features × observations` unless stated otherwise.
pub type CMatrix = DMatrix<Complex64>;

/// Lifts a real matrix into the complex field.
#[must_use]
pub fn to_complex(m: &RMatrix) -> CMatrix {
    m.map(|v| Complex64::new(v, 0.0))
}
