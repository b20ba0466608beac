//! Semalign: linear semantic alignment over noisy MIMO links.
//!
//! A sender compresses a feature vector, precodes it into channel uses of a
//! multi-antenna link, and a receiver decodes an estimate aligned to a
//! (possibly different-dimensional) target representation. Two models are
//! provided:
//!
//! - [`Baseline`]: least-squares alignment combined with one of six
//!   reduction [`Strategy`] variants and the MMSE-SVD equalizer.
//! - [`LinearOptimizer`]: joint precoder/decoder design by ADMM under a
//!   transmit-energy budget.
//!
//! # Quick Start
//!
//! ```
//! use rand::rngs::StdRng;
//! use rand::SeedableRng;
//! use semalign::prelude::*;
//!
//! let mut rng = StdRng::seed_from_u64(7);
//! let h = random_complex_matrix(0.0, 1.0, 2, 2, &mut rng).expect("channel");
//!
//! let x = RMatrix::from_fn(40, 8, |i, j| ((i * 7 + j * 3) % 11) as f64 / 11.0);
//! let y = RMatrix::from_fn(40, 6, |i, j| ((i * 5 + j) % 9) as f64 / 9.0);
//!
//! let mut baseline = Baseline::new(
//!     BaselineConfig::new(8, 6).with_snr(Some(20.0)).with_channel_usage(1),
//!     h.clone(),
//! )
//! .expect("valid config");
//! baseline.fit(&x, &y).expect("fit");
//!
//! let mut optimizer = LinearOptimizer::new(OptimizerConfig::new(8, 6).with_snr(Some(20.0)), h)
//!     .expect("valid config");
//! let report = optimizer.fit(&x, &y, Stopping::Iterations(5)).expect("fit");
//!
//! assert!(baseline.eval_with_rng(&x, &y, &mut rng).expect("eval").is_finite());
//! assert_eq!(report.losses.len(), 5);
//! ```
//!
//! # Modules
//!
//! - [`primitives`]: Matrix aliases, complex packing, SVD, least squares, Sylvester solvers
//! - [`preprocessing`]: Prewhitening of packed batches
//! - [`cluster`]: Seeded K-Means
//! - [`channel`]: Channel model, noise generation, default equalizer
//! - [`reduction`]: Dimensionality-reduction strategies
//! - [`link`]: Packetized precode/channel/decode pipeline
//! - [`baseline`]: Baseline aligner
//! - [`optim`]: ADMM precoder/decoder optimizer
//! - [`metrics`]: Evaluation metrics

pub mod baseline;
pub mod channel;
pub mod cluster;
pub mod error;
pub mod link;
pub mod metrics;
pub mod optim;
pub mod prelude;
pub mod preprocessing;
pub mod primitives;
pub mod reduction;
pub mod traits;

pub use baseline::{Baseline, BaselineConfig, Typology};
pub use error::{Result, SemAlignError};
pub use optim::{LinearOptimizer, OptimizerConfig, Stopping};
pub use primitives::{CMatrix, RMatrix};
pub use reduction::Strategy;
pub use traits::Aligner;
