//! Noisy channel model and channel-side numeric helpers.
//!
//! [`Channel`] corrupts a batch of complex symbols with additive noise at a
//! given SNR, optionally after a coarse two-block fading. The free functions
//! cover what the transmit pipeline needs: SNR conversion, circularly
//! symmetric noise, random channel matrices and the default MMSE-SVD
//! precoder/decoder pair.
//!
//! ## Usage
//!
//! ```rust
//! use rand::SeedableRng;
//! use rand::rngs::StdRng;
//! use semalign::channel::{Channel, Fading, SnrSpec};
//! use semalign::primitives::{CMatrix, Complex64};
//!
//! let channel = Channel::new(Fading::None, SnrSpec::Fixed(10.0)).expect("valid channel");
//! let clean = CMatrix::from_element(4, 8, Complex64::new(1.0, 0.0));
//!
//! let mut rng = StdRng::seed_from_u64(0);
//! let noisy = channel.apply(&clean, &mut rng);
//! assert_eq!(noisy.shape(), clean.shape());
//! ```

mod equalizer;

pub use equalizer::mmse_svd_equalizer;

use std::fmt;
use std::str::FromStr;

use nalgebra::DVector;
use rand::distributions::Uniform;
use rand::Rng;
use rand_distr::{Distribution, Normal, StandardNormal};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SemAlignError};
use crate::primitives::{CMatrix, Complex64};

/// Fading applied before the additive noise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Fading {
    /// Pure additive noise (AWGN).
    #[default]
    None,
    /// Two standard-normal gains, one per half of the feature axis.
    Rayleigh,
}

impl FromStr for Fading {
    type Err = SemAlignError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "AWGN" | "none" => Ok(Self::None),
            "Rayleigh" => Ok(Self::Rayleigh),
            _ => Err(SemAlignError::invalid_config(
                "channel_type",
                s,
                "one of AWGN, none, Rayleigh",
            )),
        }
    }
}

impl fmt::Display for Fading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "AWGN"),
            Self::Rayleigh => write!(f, "Rayleigh"),
        }
    }
}

/// Noise condition of a link.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum SnrSpec {
    /// SNR not known: no noise is injected.
    #[default]
    Unknown,
    /// Fixed SNR in dB.
    Fixed(f64),
    /// SNR drawn uniformly per element from `[lo, hi]` dB.
    Range(f64, f64),
}

impl SnrSpec {
    /// Returns an error unless the values are finite and `lo ≤ hi`.
    ///
    /// # Errors
    ///
    /// Returns [`SemAlignError::InvalidConfiguration`] for a malformed SNR.
    pub fn validate(&self) -> Result<()> {
        match *self {
            Self::Unknown => Ok(()),
            Self::Fixed(db) if db.is_finite() => Ok(()),
            Self::Fixed(db) => Err(SemAlignError::invalid_config("snr", db, "finite dB value")),
            Self::Range(lo, hi) if lo.is_finite() && hi.is_finite() && lo <= hi => Ok(()),
            Self::Range(lo, hi) => Err(SemAlignError::invalid_config(
                "snr",
                format!("({lo}, {hi})"),
                "finite range with lo <= hi",
            )),
        }
    }

    /// The fixed SNR in dB, if any.
    #[must_use]
    pub fn fixed(&self) -> Option<f64> {
        match *self {
            Self::Fixed(db) => Some(db),
            _ => None,
        }
    }
}

impl From<Option<f64>> for SnrSpec {
    fn from(snr: Option<f64>) -> Self {
        snr.map_or(Self::Unknown, Self::Fixed)
    }
}

/// Additive-noise channel with optional two-block fading.
///
/// Samples are the rows of the batch. Signal power is estimated per row as
/// the mean squared magnitude over its symbols, before fading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    fading: Fading,
    snr: SnrSpec,
}

impl Channel {
    /// Creates a channel.
    ///
    /// # Errors
    ///
    /// Returns an error if the SNR is malformed.
    pub fn new(fading: Fading, snr: SnrSpec) -> Result<Self> {
        snr.validate()?;
        Ok(Self { fading, snr })
    }

    /// Creates a channel from a type name (`"AWGN"`, `"none"` or `"Rayleigh"`).
    ///
    /// # Errors
    ///
    /// Returns [`SemAlignError::InvalidConfiguration`] for an unknown type.
    pub fn from_type(channel_type: &str, snr: SnrSpec) -> Result<Self> {
        Self::new(channel_type.parse()?, snr)
    }

    /// Returns `(fading, snr)`.
    #[must_use]
    pub fn config(&self) -> (Fading, SnrSpec) {
        (self.fading, self.snr)
    }

    /// Passes a batch (`samples × symbols`) through the channel.
    ///
    /// Signal power is averaged over each row, and Rayleigh fading splits the
    /// symbol columns into halves `[0, k/2)` and `[k/2, k)`. A multi-axis
    /// sample such as a `(C, H, W)` feature map is sent as one row holding its
    /// `C·H·W` symbols in channel-major order. With an even `C` the two
    /// fading halves are exactly the first and last `C/2` channels. With an
    /// odd `C` and `H·W > 1` the split falls inside the middle channel, so
    /// its leading half shares the first gain.
    ///
    /// ```
    /// use rand::rngs::StdRng;
    /// use rand::SeedableRng;
    /// use semalign::channel::{Channel, Fading, SnrSpec};
    /// use semalign::primitives::{CMatrix, Complex64};
    ///
    /// // (C, H, W) = (3, 2, 2), flattened channel-major into 12 symbols
    /// let (c, h, w) = (3, 2, 2);
    /// let sample: Vec<Complex64> = (0..c * h * w)
    ///     .map(|i| Complex64::new(1.0 + i as f64, 0.5))
    ///     .collect();
    /// let batch = CMatrix::from_row_slice(1, c * h * w, &sample);
    ///
    /// let channel = Channel::new(Fading::Rayleigh, SnrSpec::Unknown).expect("channel");
    /// let out = channel.apply(&batch, &mut StdRng::seed_from_u64(0));
    /// assert_eq!(out.shape(), (1, 12));
    ///
    /// // Columns 4 and 5 belong to channel 1 but fade with channel 0
    /// let gain = out[(0, 0)] / batch[(0, 0)];
    /// assert!((out[(0, 5)] / batch[(0, 5)] - gain).norm() < 1e-12);
    /// ```
    pub fn apply<R: Rng + ?Sized>(&self, z: &CMatrix, rng: &mut R) -> CMatrix {
        let (n, k) = z.shape();
        if n == 0 || k == 0 {
            return z.clone();
        }

        let signal_power: Vec<f64> = z
            .row_iter()
            .map(|row| row.iter().map(Complex64::norm_sqr).sum::<f64>() / k as f64)
            .collect();

        let mut out = z.clone();
        if self.fading == Fading::Rayleigh {
            let first: f64 = StandardNormal.sample(rng);
            let second: f64 = StandardNormal.sample(rng);
            let half = k / 2;
            out.columns_mut(0, half).scale_mut(first);
            out.columns_mut(half, k - half).scale_mut(second);
        }

        match self.snr {
            SnrSpec::Unknown => {}
            SnrSpec::Fixed(db) => {
                for (i, power) in signal_power.iter().enumerate() {
                    let std = (power / db_to_linear(db) / 2.0).sqrt();
                    for j in 0..k {
                        out[(i, j)] += complex_normal(std, rng);
                    }
                }
            }
            SnrSpec::Range(lo, hi) => {
                for (i, power) in signal_power.iter().enumerate() {
                    for j in 0..k {
                        let db = if lo < hi { Uniform::new(lo, hi).sample(rng) } else { lo };
                        let std = (power / db_to_linear(db) / 2.0).sqrt();
                        out[(i, j)] += complex_normal(std, rng);
                    }
                }
            }
        }

        out
    }

    /// Passes a single vector through the channel as a one-sample batch.
    pub fn apply_vector<R: Rng + ?Sized>(
        &self,
        z: &DVector<Complex64>,
        rng: &mut R,
    ) -> DVector<Complex64> {
        let row = CMatrix::from_row_slice(1, z.len(), z.as_slice());
        let out = self.apply(&row, rng);
        DVector::from_iterator(z.len(), out.iter().copied())
    }
}

fn db_to_linear(db: f64) -> f64 {
    10f64.powf(db / 10.0)
}

/// One circularly symmetric sample with per-component standard deviation `std`.
fn complex_normal<R: Rng + ?Sized>(std: f64, rng: &mut R) -> Complex64 {
    if std > 0.0 && std.is_finite() {
        match Normal::new(0.0, std) {
            Ok(dist) => Complex64::new(dist.sample(rng), dist.sample(rng)),
            Err(_) => Complex64::new(0.0, 0.0),
        }
    } else {
        Complex64::new(0.0, 0.0)
    }
}

/// Noise power for a given SNR relative to a reference signal:
/// `mean(|r|²) / 10^(snr/10)`.
#[must_use]
pub fn snr_to_noise_power(snr_db: f64, reference: &[Complex64]) -> f64 {
    if reference.is_empty() {
        return 0.0;
    }
    let power = reference.iter().map(Complex64::norm_sqr).sum::<f64>() / reference.len() as f64;
    power / db_to_linear(snr_db)
}

/// Noise power at the unit-norm per-antenna reference `1/√Nt`.
///
/// This is the convention used on the transmit links: noise is fixed
/// relative to the power budget rather than the realized signal. Returns 0
/// when the SNR is unknown.
#[must_use]
pub fn unit_reference_noise_power(snr_db: Option<f64>, antennas_transmitter: usize) -> f64 {
    match snr_db {
        Some(db) if antennas_transmitter > 0 => {
            let reference = [Complex64::new(1.0 / (antennas_transmitter as f64).sqrt(), 0.0)];
            snr_to_noise_power(db, &reference)
        }
        _ => 0.0,
    }
}

/// Circularly symmetric Gaussian noise of total power `power` per entry.
///
/// # Errors
///
/// Returns an error if `power` is negative or not finite.
pub fn gaussian_noise<R: Rng + ?Sized>(
    power: f64,
    rows: usize,
    cols: usize,
    rng: &mut R,
) -> Result<CMatrix> {
    if !(power >= 0.0 && power.is_finite()) {
        return Err(SemAlignError::invalid_config(
            "noise_power",
            power,
            "finite and non-negative",
        ));
    }
    Ok(CMatrix::from_fn(rows, cols, |_, _| complex_normal((power / 2.0).sqrt(), rng)))
}

/// Random complex matrix with entries of mean `mean` (on both parts) and
/// total standard deviation `std`, split evenly between real and imaginary
/// parts.
///
/// # Errors
///
/// Returns an error if `std` is negative or not finite.
pub fn random_complex_matrix<R: Rng + ?Sized>(
    mean: f64,
    std: f64,
    rows: usize,
    cols: usize,
    rng: &mut R,
) -> Result<CMatrix> {
    let dist = Normal::new(mean, std / 2f64.sqrt())
        .map_err(|_| SemAlignError::invalid_config("std", std, "finite and non-negative"))?;
    Ok(CMatrix::from_fn(rows, cols, |_, _| {
        Complex64::new(dist.sample(rng), dist.sample(rng))
    }))
}
