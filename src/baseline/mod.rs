//! Baseline linear aligner.
//!
//! Combines a least-squares semantic alignment `A` with a reduction
//! [`Strategy`] and the packetized MIMO [`Link`]. The [`Typology`] decides
//! where `A` is applied:
//!
//! ```text
//! pre:   x ─A─► reduce ─► pack ─► link ─► unpack ─► expand ─► ŷ
//! post:  x ──► reduce ─► pack ─► link ─► unpack ─► expand ─A─► ŷ
//! ```
//!
//! Frame strategies align and reduce jointly, so `A` is skipped for them in
//! both typologies.
//!
//! # Example
//!
//! ```
//! use rand::rngs::StdRng;
//! use rand::SeedableRng;
//! use semalign::baseline::{Baseline, BaselineConfig, Typology};
//! use semalign::channel::random_complex_matrix;
//! use semalign::primitives::RMatrix;
//! use semalign::reduction::Strategy;
//!
//! let mut rng = StdRng::seed_from_u64(0);
//! let h = random_complex_matrix(0.0, 1.0, 2, 2, &mut rng).expect("channel");
//! let config = BaselineConfig::new(8, 6)
//!     .with_snr(Some(20.0))
//!     .with_channel_usage(1)
//!     .with_strategy(Strategy::FirstK)
//!     .with_typology(Typology::Post);
//! let mut baseline = Baseline::new(config, h).expect("valid config");
//!
//! let x = RMatrix::from_fn(30, 8, |i, j| ((i * 3 + j * 7) % 5) as f64);
//! let y = RMatrix::from_fn(30, 6, |i, j| ((i + j) % 4) as f64);
//! baseline.fit(&x, &y).expect("fit");
//!
//! let mse = baseline.eval_with_rng(&x, &y, &mut rng).expect("eval");
//! assert!(mse.is_finite() && mse >= 0.0);
//! ```

use std::fmt;
use std::str::FromStr;

use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};

use crate::channel::mmse_svd_equalizer;
use crate::error::{Result, SemAlignError};
use crate::link::Link;
use crate::metrics::mse;
use crate::preprocessing::Prewhitener;
use crate::primitives::{complex_pack, complex_unpack, lstsq, CMatrix, RMatrix};
use crate::reduction::{fit_frames, FrameData, Frames, Reduction, Strategy};
use crate::traits::Aligner;

/// Where the semantic alignment is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Typology {
    /// Align at the sender, then reduce.
    Pre,
    /// Reduce and transmit, then align at the receiver.
    #[default]
    Post,
}

impl FromStr for Typology {
    type Err = SemAlignError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pre" => Ok(Self::Pre),
            "post" => Ok(Self::Post),
            _ => Err(SemAlignError::invalid_config("typology", s, "pre or post")),
        }
    }
}

impl fmt::Display for Typology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pre => write!(f, "pre"),
            Self::Post => write!(f, "post"),
        }
    }
}

/// Configuration for [`Baseline`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineConfig {
    /// Input feature dimension.
    pub input_dim: usize,
    /// Output feature dimension.
    pub output_dim: usize,
    /// Channel SNR in dB, `None` if unknown (no noise).
    pub snr: Option<f64>,
    /// Observations averaged per PPFE prototype.
    pub proto: usize,
    /// Packets per observation; `None` sends `⌈(input_dim/2)/Nt⌉`.
    pub channel_usage: Option<usize>,
    /// Alignment placement.
    pub typology: Typology,
    /// Reduction strategy.
    pub strategy: Strategy,
    /// Pass packets through `H` (disable for debugging).
    pub use_channel: bool,
    /// Seed for PFE subsampling and PPFE clustering.
    pub seed: u64,
}

impl BaselineConfig {
    /// Creates a configuration with default hyperparameters.
    #[must_use]
    pub fn new(input_dim: usize, output_dim: usize) -> Self {
        Self {
            input_dim,
            output_dim,
            snr: None,
            proto: 10,
            channel_usage: None,
            typology: Typology::Post,
            strategy: Strategy::FirstK,
            use_channel: true,
            seed: 42,
        }
    }

    /// Sets the SNR in dB.
    #[must_use]
    pub fn with_snr(mut self, snr: Option<f64>) -> Self {
        self.snr = snr;
        self
    }

    /// Sets the PPFE prototype sample size.
    #[must_use]
    pub fn with_proto(mut self, proto: usize) -> Self {
        self.proto = proto;
        self
    }

    /// Sets the number of channel uses.
    #[must_use]
    pub fn with_channel_usage(mut self, channel_usage: usize) -> Self {
        self.channel_usage = Some(channel_usage);
        self
    }

    /// Sets the typology.
    #[must_use]
    pub fn with_typology(mut self, typology: Typology) -> Self {
        self.typology = typology;
        self
    }

    /// Sets the reduction strategy.
    #[must_use]
    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Enables or disables the channel pass.
    #[must_use]
    pub fn with_use_channel(mut self, use_channel: bool) -> Self {
        self.use_channel = use_channel;
        self
    }

    /// Sets the random seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

impl Default for BaselineConfig {
    fn default() -> Self {
        Self::new(384, 768)
    }
}

/// State learned by [`Baseline::fit`].
#[derive(Debug, Clone, Serialize, Deserialize)]
struct FittedState {
    alignment: RMatrix,
    reduction: Reduction,
    whitener: Prewhitener,
}

/// Least-squares alignment with strategy-based reduction over a MIMO link.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Baseline {
    config: BaselineConfig,
    link: Link,
    channel_usage: usize,
    sent_features: usize,
    state: Option<FittedState>,
}

impl Baseline {
    /// Creates an unfitted baseline for channel `H` (`Nr × Nt`).
    ///
    /// The link starts with the MMSE-SVD precoder/decoder pair.
    ///
    /// # Errors
    ///
    /// Returns [`SemAlignError::InvalidConfiguration`] for an empty channel,
    /// zero dimensions, zero channel uses or prototypes, a non-finite SNR,
    /// or an index strategy whose reduced dimension cannot fill
    /// `sent_features`.
    pub fn new(config: BaselineConfig, channel_matrix: CMatrix) -> Result<Self> {
        if config.input_dim == 0 || config.output_dim == 0 {
            return Err(SemAlignError::invalid_config(
                "input_dim/output_dim",
                format!("{}/{}", config.input_dim, config.output_dim),
                "both at least 1",
            ));
        }
        if config.proto == 0 {
            return Err(SemAlignError::invalid_config("proto", 0, "at least 1"));
        }
        if let Some(snr) = config.snr {
            if !snr.is_finite() {
                return Err(SemAlignError::invalid_config("snr", snr, "finite dB value"));
            }
        }

        let (g, f) = mmse_svd_equalizer(&channel_matrix, config.snr)?;
        let link = Link::new(channel_matrix, g, f, config.snr)?.with_channel(config.use_channel);
        let nt = link.antennas_transmitter();

        let channel_usage = match config.channel_usage {
            Some(0) => {
                return Err(SemAlignError::invalid_config("channel_usage", 0, "at least 1"));
            }
            Some(cu) => cu,
            None => ((config.input_dim / 2).div_ceil(nt)).max(1),
        };
        let sent_features = 2 * channel_usage * nt;

        if !config.strategy.has_frame() {
            let reduced_dim = match config.typology {
                Typology::Pre => config.output_dim,
                Typology::Post => config.input_dim,
            };
            if reduced_dim < sent_features {
                return Err(SemAlignError::invalid_config(
                    "channel_usage",
                    channel_usage,
                    &format!(
                        "{} needs 2·channel_usage·Nt = {sent_features} <= reduced \
                         dimension {reduced_dim}",
                        config.strategy
                    ),
                ));
            }
        }

        tracing::debug!(
            strategy = %config.strategy,
            typology = %config.typology,
            channel_usage,
            sent_features,
            "created baseline"
        );

        Ok(Self {
            config,
            link,
            channel_usage,
            sent_features,
            state: None,
        })
    }

    /// Replaces the precoder/decoder pair of the link.
    ///
    /// # Errors
    ///
    /// Returns an error if `F` is not `Nt × Nt` or `G` is not `Nt × Nr`.
    pub fn with_equalizer(mut self, decoder: CMatrix, precoder: CMatrix) -> Result<Self> {
        self.link = Link::new(self.link.channel().clone(), decoder, precoder, self.config.snr)?
            .with_channel(self.config.use_channel);
        Ok(self)
    }

    /// Configuration.
    #[must_use]
    pub fn config(&self) -> &BaselineConfig {
        &self.config
    }

    /// The transmit link.
    #[must_use]
    pub fn link(&self) -> &Link {
        &self.link
    }

    /// Packets sent per observation.
    #[must_use]
    pub fn channel_usage(&self) -> usize {
        self.channel_usage
    }

    /// Real values sent per observation, `2 · channel_usage · Nt`.
    #[must_use]
    pub fn sent_features(&self) -> usize {
        self.sent_features
    }

    /// Alignment map `A` (`output_dim × input_dim`), once fitted.
    #[must_use]
    pub fn alignment(&self) -> Option<&RMatrix> {
        self.state.as_ref().map(|s| &s.alignment)
    }

    /// Learned reduction frames, for frame strategies once fitted.
    #[must_use]
    pub fn frames(&self) -> Option<&Frames> {
        self.state.as_ref().and_then(|s| s.reduction.frames())
    }

    /// Returns true once `fit` has succeeded.
    #[must_use]
    pub fn is_fitted(&self) -> bool {
        self.state.is_some()
    }

    /// Fits alignment, frames and prewhitening on paired batches
    /// (observations as rows).
    ///
    /// # Errors
    ///
    /// Returns an error on dimension mismatches, when PFE/PPFE get fewer
    /// observations than `sent_features`, or if a numeric step fails.
    pub fn fit(&mut self, input: &RMatrix, output: &RMatrix) -> Result<()> {
        self.check_input(input)?;
        if output.ncols() != self.config.output_dim {
            return Err(SemAlignError::dimension_mismatch(
                "output_dim",
                self.config.output_dim,
                output.ncols(),
            ));
        }
        if output.nrows() != input.nrows() || input.nrows() == 0 {
            return Err(SemAlignError::DimensionMismatch {
                expected: format!("{} paired observations", input.nrows().max(1)),
                actual: output.nrows().to_string(),
            });
        }

        let alignment = lstsq(input, output)?.transpose();
        let strategy = self.config.strategy;
        let data = FrameData {
            input,
            output,
            alignment: &alignment,
            proto: self.config.proto,
            seed: self.config.seed,
        };
        let mut reduction = Reduction::new(strategy, self.sent_features);
        if let Some(frames) = fit_frames(strategy, self.sent_features, &data)? {
            reduction = reduction.with_frames(frames)?;
        }

        let source = self.sender_side(input, &alignment);
        let (compressed, _) = reduction.compress(&source)?;
        let mut whitener = Prewhitener::new();
        whitener.fit(&complex_pack(&compressed))?;

        tracing::info!(
            observations = input.nrows(),
            strategy = %strategy,
            typology = %self.config.typology,
            "fitted baseline"
        );
        self.state = Some(FittedState {
            alignment,
            reduction,
            whitener,
        });
        Ok(())
    }

    /// Sends `input` (`n × input_dim`) across the link and returns the
    /// `n × output_dim` estimate.
    ///
    /// # Errors
    ///
    /// Returns [`SemAlignError::NotFitted`] before `fit`, or an error on a
    /// feature-count mismatch.
    pub fn transform_with_rng<R: Rng + ?Sized>(
        &self,
        input: &RMatrix,
        rng: &mut R,
    ) -> Result<RMatrix> {
        let state = self.fitted()?;
        self.check_input(input)?;

        let source = self.sender_side(input, &state.alignment);
        let (compressed, ctx) = state.reduction.compress(&source)?;
        let received = self
            .link
            .transmit(&complex_pack(&compressed), &state.whitener, rng)?;
        let expanded = state
            .reduction
            .decompress(&complex_unpack(&received), &ctx)?;

        let aligned_after =
            self.config.typology == Typology::Post && !self.config.strategy.has_frame();
        let estimate = if aligned_after {
            &state.alignment * expanded
        } else {
            expanded
        };
        Ok(estimate.transpose())
    }

    /// [`Baseline::transform_with_rng`] with thread-local randomness.
    ///
    /// # Errors
    ///
    /// See [`Baseline::transform_with_rng`].
    pub fn transform(&self, input: &RMatrix) -> Result<RMatrix> {
        self.transform_with_rng(input, &mut rand::thread_rng())
    }

    /// Mean squared error of the transformed `input` against `output`.
    ///
    /// # Errors
    ///
    /// Returns [`SemAlignError::NotFitted`] before `fit`, or an error on a
    /// shape mismatch.
    pub fn eval_with_rng<R: Rng + ?Sized>(
        &self,
        input: &RMatrix,
        output: &RMatrix,
        rng: &mut R,
    ) -> Result<f64> {
        self.fitted()?;
        mse(&self.transform_with_rng(input, rng)?, output)
    }

    /// [`Baseline::eval_with_rng`] with thread-local randomness.
    ///
    /// # Errors
    ///
    /// See [`Baseline::eval_with_rng`].
    pub fn eval(&self, input: &RMatrix, output: &RMatrix) -> Result<f64> {
        self.eval_with_rng(input, output, &mut rand::thread_rng())
    }

    fn fitted(&self) -> Result<&FittedState> {
        self.state
            .as_ref()
            .ok_or(SemAlignError::NotFitted { model: "Baseline" })
    }

    fn check_input(&self, input: &RMatrix) -> Result<()> {
        if input.ncols() == self.config.input_dim {
            Ok(())
        } else {
            Err(SemAlignError::dimension_mismatch(
                "input_dim",
                self.config.input_dim,
                input.ncols(),
            ))
        }
    }

    /// Transposes to `features × n` and applies `A` first for `pre` with an
    /// index strategy.
    fn sender_side(&self, input: &RMatrix, alignment: &RMatrix) -> RMatrix {
        if self.config.typology == Typology::Pre && !self.config.strategy.has_frame() {
            alignment * input.transpose()
        } else {
            input.transpose()
        }
    }
}

impl Aligner for Baseline {
    type FitOutput = ();

    fn fit(&mut self, input: &RMatrix, output: &RMatrix) -> Result<()> {
        Baseline::fit(self, input, output)
    }

    fn transform_with_rng(&self, input: &RMatrix, rng: &mut dyn RngCore) -> Result<RMatrix> {
        Baseline::transform_with_rng(self, input, rng)
    }
}

#[cfg(test)]
mod tests;
