//! Dimensionality reduction to the channel-use budget.
//!
//! A feature batch (`features × observations`) is reduced to
//! `sent_features = 2 · channel_usage · Nt` real rows before packing, and
//! expanded again at the receiver.
//!
//! Index strategies ([`Strategy::FirstK`], [`Strategy::TopK`]) keep a subset
//! of coordinates and scatter them back. Frame strategies
//! ([`Strategy::EigenK`], [`Strategy::Upe`], [`Strategy::Pfe`],
//! [`Strategy::Ppfe`]) learn an encoder `F̃` (`sent × d_in`) and decoder `G̃`
//! (`d_out × sent`) that align and reduce in one step.
//!
//! Per-call state (the feature count and, for Top-K, the chosen indices) is
//! returned by [`Reduction::compress`] as a [`ReductionContext`] and handed
//! back to [`Reduction::decompress`], so a fitted reduction is never mutated
//! by a transform.
//!
//! # Example
//!
//! ```
//! use semalign::primitives::RMatrix;
//! use semalign::reduction::{Reduction, Strategy};
//!
//! let reduction = Reduction::new(Strategy::TopK, 2);
//! let x = RMatrix::from_column_slice(4, 1, &[0.1, -3.0, 2.0, 0.5]);
//!
//! let (kept, ctx) = reduction.compress(&x).expect("compress");
//! assert_eq!(kept.as_slice(), &[-3.0, 2.0]);
//!
//! let back = reduction.decompress(&kept, &ctx).expect("decompress");
//! assert_eq!(back.as_slice(), &[0.0, -3.0, 2.0, 0.0]);
//! ```

mod frames;

pub use frames::{fit_frames, FrameData};

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SemAlignError};
use crate::primitives::RMatrix;

/// Reduction strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Strategy {
    /// Keep the first `sent_features` coordinates.
    #[default]
    #[serde(rename = "First-K")]
    FirstK,
    /// Keep the largest-magnitude coordinates of each observation.
    #[serde(rename = "Top-K")]
    TopK,
    /// Top singular directions of the alignment map, energy split as `√S`.
    #[serde(rename = "Eigen-K")]
    EigenK,
    /// Singular vectors of the output/input cross product.
    #[serde(rename = "UPE")]
    Upe,
    /// Orthonormal frames from a random subset of observation pairs.
    #[serde(rename = "PFE")]
    Pfe,
    /// Orthonormal frames from k-means prototypes of the outputs.
    #[serde(rename = "PPFE")]
    Ppfe,
}

impl Strategy {
    /// All strategies, in declaration order.
    pub const ALL: [Strategy; 6] = [
        Self::FirstK,
        Self::TopK,
        Self::EigenK,
        Self::Upe,
        Self::Pfe,
        Self::Ppfe,
    ];

    /// Returns true if the strategy learns encoder/decoder frames in `fit`.
    #[must_use]
    pub fn has_frame(&self) -> bool {
        !matches!(self, Self::FirstK | Self::TopK)
    }

    /// Canonical name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FirstK => "First-K",
            Self::TopK => "Top-K",
            Self::EigenK => "Eigen-K",
            Self::Upe => "UPE",
            Self::Pfe => "PFE",
            Self::Ppfe => "PPFE",
        }
    }
}

impl FromStr for Strategy {
    type Err = SemAlignError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|strategy| strategy.as_str() == s)
            .ok_or_else(|| {
                SemAlignError::invalid_config(
                    "strategy",
                    s,
                    "one of First-K, Top-K, Eigen-K, UPE, PFE, PPFE",
                )
            })
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Learned encoder/decoder pair of a frame strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frames {
    /// Encoder `F̃`, `sent_features × d_in`.
    pub encoder: RMatrix,
    /// Decoder `G̃`, `d_out × sent_features`.
    pub decoder: RMatrix,
}

/// Per-call state produced by compression and consumed by decompression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReductionContext {
    /// Feature count of the compressed batch.
    pub size: usize,
    /// Top-K indices, one list per observation, in descending magnitude.
    pub indexes: Option<Vec<Vec<usize>>>,
}

/// A strategy bound to its budget and, once fitted, its frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reduction {
    strategy: Strategy,
    sent_features: usize,
    frames: Option<Frames>,
}

impl Reduction {
    /// Creates a reduction without frames.
    #[must_use]
    pub fn new(strategy: Strategy, sent_features: usize) -> Self {
        Self {
            strategy,
            sent_features,
            frames: None,
        }
    }

    /// Attaches learned frames.
    ///
    /// # Errors
    ///
    /// Returns an error if the encoder does not have `sent_features` rows
    /// or the decoder does not have `sent_features` columns.
    pub fn with_frames(mut self, frames: Frames) -> Result<Self> {
        if frames.encoder.nrows() != self.sent_features {
            return Err(SemAlignError::dimension_mismatch(
                "encoder rows",
                self.sent_features,
                frames.encoder.nrows(),
            ));
        }
        if frames.decoder.ncols() != self.sent_features {
            return Err(SemAlignError::dimension_mismatch(
                "decoder columns",
                self.sent_features,
                frames.decoder.ncols(),
            ));
        }
        self.frames = Some(frames);
        Ok(self)
    }

    /// The strategy.
    #[must_use]
    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// Number of real values sent per observation.
    #[must_use]
    pub fn sent_features(&self) -> usize {
        self.sent_features
    }

    /// Learned frames, if any.
    #[must_use]
    pub fn frames(&self) -> Option<&Frames> {
        self.frames.as_ref()
    }

    /// Reduces `x` (`features × n`) to `sent_features × n`.
    ///
    /// # Errors
    ///
    /// Returns [`SemAlignError::NotFitted`] for a frame strategy without
    /// frames and [`SemAlignError::DimensionMismatch`] if `x` has too few
    /// features (index strategies) or the wrong count (frame strategies).
    pub fn compress(&self, x: &RMatrix) -> Result<(RMatrix, ReductionContext)> {
        let (size, n) = x.shape();
        let sent = self.sent_features;
        let mut ctx = ReductionContext { size, indexes: None };

        let reduced = match self.strategy {
            Strategy::FirstK => {
                self.check_budget(size)?;
                x.rows(0, sent).into_owned()
            }
            Strategy::TopK => {
                self.check_budget(size)?;
                let indexes: Vec<Vec<usize>> =
                    (0..n).map(|j| top_k_indices(x, j, sent)).collect();
                let reduced = RMatrix::from_fn(sent, n, |r, j| x[(indexes[j][r], j)]);
                ctx.indexes = Some(indexes);
                reduced
            }
            Strategy::EigenK | Strategy::Upe | Strategy::Pfe | Strategy::Ppfe => {
                let frames = self.fitted_frames()?;
                if size != frames.encoder.ncols() {
                    return Err(SemAlignError::dimension_mismatch(
                        "encoder input features",
                        frames.encoder.ncols(),
                        size,
                    ));
                }
                &frames.encoder * x
            }
        };

        Ok((reduced, ctx))
    }

    /// Expands a received `sent_features × n` batch.
    ///
    /// Index strategies return `ctx.size` rows with zeros outside the kept
    /// coordinates; frame strategies return `G̃·y`.
    ///
    /// # Errors
    ///
    /// Returns [`SemAlignError::DimensionMismatch`] if `y` has the wrong row
    /// count or the context disagrees with it: a size below `sent_features`,
    /// an index list of the wrong length, or an index outside `ctx.size`.
    /// Also errors if the context lacks Top-K indices or frames are missing.
    pub fn decompress(&self, y: &RMatrix, ctx: &ReductionContext) -> Result<RMatrix> {
        let (rows, n) = y.shape();
        if rows != self.sent_features {
            return Err(SemAlignError::dimension_mismatch(
                "received features",
                self.sent_features,
                rows,
            ));
        }

        match self.strategy {
            Strategy::FirstK => {
                self.check_budget(ctx.size)?;
                let mut out = RMatrix::zeros(ctx.size, n);
                out.rows_mut(0, rows).copy_from(y);
                Ok(out)
            }
            Strategy::TopK => {
                let indexes = ctx.indexes.as_ref().ok_or_else(|| {
                    SemAlignError::Numerical("Top-K context carries no indices".to_string())
                })?;
                if indexes.len() != n {
                    return Err(SemAlignError::dimension_mismatch(
                        "Top-K observations",
                        indexes.len(),
                        n,
                    ));
                }
                self.check_budget(ctx.size)?;
                for idx in indexes {
                    if idx.len() != rows {
                        return Err(SemAlignError::dimension_mismatch(
                            "Top-K indices per observation",
                            rows,
                            idx.len(),
                        ));
                    }
                    if let Some(&i) = idx.iter().find(|&&i| i >= ctx.size) {
                        return Err(SemAlignError::DimensionMismatch {
                            expected: format!("Top-K index below {}", ctx.size),
                            actual: i.to_string(),
                        });
                    }
                }
                let mut out = RMatrix::zeros(ctx.size, n);
                for (j, idx) in indexes.iter().enumerate() {
                    for (r, &i) in idx.iter().enumerate() {
                        out[(i, j)] = y[(r, j)];
                    }
                }
                Ok(out)
            }
            Strategy::EigenK | Strategy::Upe | Strategy::Pfe | Strategy::Ppfe => {
                Ok(&self.fitted_frames()?.decoder * y)
            }
        }
    }

    fn fitted_frames(&self) -> Result<&Frames> {
        self.frames
            .as_ref()
            .ok_or(SemAlignError::NotFitted { model: "Reduction" })
    }

    fn check_budget(&self, size: usize) -> Result<()> {
        if size < self.sent_features {
            return Err(SemAlignError::DimensionMismatch {
                expected: format!("at least {} features", self.sent_features),
                actual: size.to_string(),
            });
        }
        Ok(())
    }
}

/// Indices of the `k` largest `|x[(·, col)]|`, largest first. Ties keep
/// ascending index order.
fn top_k_indices(x: &RMatrix, col: usize, k: usize) -> Vec<usize> {
    let column = x.column(col);
    let mut order: Vec<usize> = (0..column.len()).collect();
    order.sort_by(|&a, &b| column[b].abs().total_cmp(&column[a].abs()));
    order.truncate(k);
    order
}
