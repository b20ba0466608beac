//! Packing between real feature batches and complex channel symbols.

use super::{CMatrix, Complex64, RMatrix};

/// Number of complex rows needed to carry `real_rows` real features.
#[must_use]
pub fn packed_len(real_rows: usize) -> usize {
    (real_rows + 1) / 2
}

/// Pairs consecutive real rows `(2i, 2i+1)` into complex row `i`.
///
/// An odd trailing row is carried with a zero imaginary part.
///
/// # Examples
///
/// ```
/// use semalign::primitives::{complex_pack, RMatrix};
///
/// let x = RMatrix::from_row_slice(4, 1, &[1.0, 2.0, 3.0, 4.0]);
/// let z = complex_pack(&x);
/// assert_eq!(z.shape(), (2, 1));
/// assert_eq!(z[(0, 0)].re, 1.0);
/// assert_eq!(z[(0, 0)].im, 2.0);
/// ```
#[must_use]
pub fn complex_pack(x: &RMatrix) -> CMatrix {
    let rows = x.nrows();
    CMatrix::from_fn(packed_len(rows), x.ncols(), |i, j| {
        let re = x[(2 * i, j)];
        let im = if 2 * i + 1 < rows { x[(2 * i + 1, j)] } else { 0.0 };
        Complex64::new(re, im)
    })
}

/// Splits each complex row into its real and imaginary rows.
///
/// Exact inverse of [`complex_pack`] for even row counts; for odd counts
/// the caller drops the trailing padding row.
#[must_use]
pub fn complex_unpack(z: &CMatrix) -> RMatrix {
    RMatrix::from_fn(2 * z.nrows(), z.ncols(), |i, j| {
        let v = z[(i / 2, j)];
        if i % 2 == 0 {
            v.re
        } else {
            v.im
        }
    })
}
