//! Packetized precode → channel → decode pipeline.
//!
//! A compressed complex batch (`cu·Nt × n`) is whitened with a fitted
//! [`Prewhitener`], split into `cu` packets of `Nt` rows, precoded with `F`,
//! sent through `H` with optional noise, decoded with `G`, concatenated and
//! unwhitened.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::channel::{gaussian_noise, unit_reference_noise_power};
use crate::error::{Result, SemAlignError};
use crate::preprocessing::Prewhitener;
use crate::primitives::CMatrix;

/// A MIMO link with a fixed precoder/decoder pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    /// Channel matrix `H`, `Nr × Nt`.
    channel: CMatrix,
    /// Precoder `F`, `Nt × Nt`.
    precoder: CMatrix,
    /// Decoder `G`, `Nt × Nr`.
    decoder: CMatrix,
    snr: Option<f64>,
    use_channel: bool,
}

impl Link {
    /// Creates a link.
    ///
    /// # Errors
    ///
    /// Returns an error if `H` is empty or `F`, `G` do not match its shape.
    pub fn new(
        channel: CMatrix,
        decoder: CMatrix,
        precoder: CMatrix,
        snr: Option<f64>,
    ) -> Result<Self> {
        let (nr, nt) = channel.shape();
        if nr == 0 || nt == 0 {
            return Err(SemAlignError::invalid_config(
                "channel_matrix",
                format!("{nr}x{nt}"),
                "non-empty 2-D matrix",
            ));
        }
        check_shape("precoder", &precoder, (nt, nt))?;
        check_shape("decoder", &decoder, (nt, nr))?;
        Ok(Self {
            channel,
            precoder,
            decoder,
            snr,
            use_channel: true,
        })
    }

    /// Enables or disables the channel pass (`G` applied directly to the
    /// precoded packets when disabled).
    #[must_use]
    pub fn with_channel(mut self, use_channel: bool) -> Self {
        self.use_channel = use_channel;
        self
    }

    /// Transmit antennas `Nt`.
    #[must_use]
    pub fn antennas_transmitter(&self) -> usize {
        self.channel.ncols()
    }

    /// Receive antennas `Nr`.
    #[must_use]
    pub fn antennas_receiver(&self) -> usize {
        self.channel.nrows()
    }

    /// Channel matrix `H`.
    #[must_use]
    pub fn channel(&self) -> &CMatrix {
        &self.channel
    }

    /// Precoder `F`.
    #[must_use]
    pub fn precoder(&self) -> &CMatrix {
        &self.precoder
    }

    /// Decoder `G`.
    #[must_use]
    pub fn decoder(&self) -> &CMatrix {
        &self.decoder
    }

    /// Noise power per receive antenna at the unit-norm reference.
    #[must_use]
    pub fn noise_power(&self) -> f64 {
        unit_reference_noise_power(self.snr, self.antennas_transmitter())
    }

    /// Sends a compressed batch through the link and returns the estimate.
    ///
    /// # Errors
    ///
    /// Returns an error if the row count is not a multiple of `Nt` or does
    /// not match the whitener.
    pub fn transmit<R: Rng + ?Sized>(
        &self,
        compressed: &CMatrix,
        whitener: &Prewhitener,
        rng: &mut R,
    ) -> Result<CMatrix> {
        let nt = self.antennas_transmitter();
        let (rows, n) = compressed.shape();
        if rows % nt != 0 {
            return Err(SemAlignError::DimensionMismatch {
                expected: format!("a multiple of {nt} symbols"),
                actual: rows.to_string(),
            });
        }

        let white = whitener.transform(compressed)?;
        let noise_power = if self.use_channel { self.noise_power() } else { 0.0 };

        let mut received = CMatrix::zeros(rows, n);
        for start in (0..rows).step_by(nt) {
            let packet = &self.precoder * white.rows(start, nt);
            let packet = if self.use_channel {
                let mut through = &self.channel * packet;
                if self.snr.is_some() {
                    through += gaussian_noise(noise_power, through.nrows(), n, rng)?;
                }
                through
            } else {
                packet
            };
            received.rows_mut(start, nt).copy_from(&(&self.decoder * packet));
        }

        tracing::trace!(packets = rows / nt, noise_power, "transmitted batch");
        whitener.inverse_transform(&received)
    }
}

fn check_shape(name: &str, m: &CMatrix, expected: (usize, usize)) -> Result<()> {
    if m.shape() == expected {
        Ok(())
    } else {
        Err(SemAlignError::DimensionMismatch {
            expected: format!("{name} of shape {}x{}", expected.0, expected.1),
            actual: format!("{}x{}", m.nrows(), m.ncols()),
        })
    }
}
