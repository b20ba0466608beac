//! Convenience re-exports for common usage.
//!
//! # Usage
//!
//! ```
//! use semalign::prelude::*;
//! ```

pub use crate::baseline::{Baseline, BaselineConfig, Typology};
pub use crate::channel::{mmse_svd_equalizer, random_complex_matrix, Channel, Fading, SnrSpec};
pub use crate::error::{Result, SemAlignError};
pub use crate::metrics::{cosine_similarity, mse};
pub use crate::optim::{ConvergenceStatus, FitReport, LinearOptimizer, OptimizerConfig, Stopping};
pub use crate::primitives::{CMatrix, Complex64, RMatrix};
pub use crate::reduction::Strategy;
pub use crate::traits::Aligner;
