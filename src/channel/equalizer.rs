//! Default zero-shot precoder/decoder pair.

use super::unit_reference_noise_power;
use crate::error::{Result, SemAlignError};
use crate::primitives::{thin_svd, CMatrix, Complex64};

/// Builds the MMSE-SVD pair `(G, F)` for a channel `H` (`Nr × Nt`).
///
/// With `H = U·S·Vᴴ` (sorted, `r = min(Nr, Nt)` triplets):
///
/// ```text
/// F (Nt × Nt):  column i = vᵢ for i < r, zero otherwise
/// G (Nt × Nr):  row i    = sᵢ / (sᵢ² + σ²) · uᵢᴴ for i < r, zero otherwise
/// ```
///
/// `σ²` is the unit-reference noise power for `snr` (0 when unknown), so in
/// the noiseless case `G·H·F` is the identity on the first `r` coordinates.
///
/// # Errors
///
/// Returns an error for an empty channel matrix or if the SVD fails.
pub fn mmse_svd_equalizer(h: &CMatrix, snr: Option<f64>) -> Result<(CMatrix, CMatrix)> {
    let (nr, nt) = h.shape();
    if nr == 0 || nt == 0 {
        return Err(SemAlignError::invalid_config(
            "channel_matrix",
            format!("{nr}x{nt}"),
            "non-empty 2-D matrix",
        ));
    }

    let sigma2 = unit_reference_noise_power(snr, nt);
    let svd = thin_svd(h)?;

    let mut f = CMatrix::zeros(nt, nt);
    let mut g = CMatrix::zeros(nt, nr);
    for (i, &s) in svd.singular_values.iter().enumerate() {
        f.set_column(i, &svd.v_t.row(i).adjoint());

        let denom = s * s + sigma2;
        let gain = if denom > 0.0 { s / denom } else { 0.0 };
        g.set_row(i, &(svd.u.column(i).adjoint() * Complex64::new(gain, 0.0)));
    }

    tracing::debug!(nr, nt, sigma2, "built MMSE-SVD equalizer");
    Ok((g, f))
}
