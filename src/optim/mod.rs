//! Joint precoder/decoder design by ADMM.
//!
//! [`LinearOptimizer`] learns a precoder `F` and decoder `G` for a MIMO
//! channel under the transmit-energy constraint `trace(F·Fᴴ) ≤ cost`. Each
//! outer iteration runs four steps:
//!
//! ```text
//! G-step:  G = Y·Auxᴴ·(Aux·Auxᴴ + n·σ²·I)⁻¹,   Aux = H·F·X
//! F-step:  A·F + F·B = C                       (Sylvester)
//! Z-step:  Z = Π_{‖·‖_F ≤ √cost}(F + U)
//! U-step:  U = U + F − Z
//! ```
//!
//! # Example
//!
//! ```
//! use rand::rngs::StdRng;
//! use rand::SeedableRng;
//! use semalign::channel::random_complex_matrix;
//! use semalign::optim::{LinearOptimizer, OptimizerConfig, Stopping};
//! use semalign::primitives::RMatrix;
//!
//! let mut rng = StdRng::seed_from_u64(0);
//! let h = random_complex_matrix(0.0, 1.0, 2, 2, &mut rng).expect("channel");
//! let config = OptimizerConfig::new(6, 4).with_snr(Some(20.0)).with_cost(1.0);
//! let mut optimizer = LinearOptimizer::new(config, h).expect("valid config");
//!
//! let x = RMatrix::from_fn(40, 6, |i, j| ((i * 5 + j * 3) % 7) as f64 - 3.0);
//! let y = RMatrix::from_fn(40, 4, |i, j| ((i + 2 * j) % 5) as f64 - 2.0);
//! let report = optimizer.fit(&x, &y, Stopping::Iterations(5)).expect("fit");
//!
//! assert_eq!(report.losses.len(), 5);
//! assert!(report.final_trace().unwrap_or(0.0) <= 1.0 + 1e-6);
//! ```

mod admm;

pub use admm::{AdmmState, LinearOptimizer};

use serde::{Deserialize, Serialize};

/// Configuration for [`LinearOptimizer`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizerConfig {
    /// Input feature dimension.
    pub input_dim: usize,
    /// Output feature dimension.
    pub output_dim: usize,
    /// Channel SNR in dB, `None` if unknown (no noise).
    pub snr: Option<f64>,
    /// Channel uses per observation.
    pub channel_usage: usize,
    /// Transmit-energy budget for `trace(F·Fᴴ)`.
    pub cost: f64,
    /// ADMM penalty `ρ`.
    pub rho: f64,
    /// Seed for the precoder initialization and training-time noise.
    pub seed: u64,
    /// Loss at which the threshold mode stops.
    pub loss_threshold: f64,
    /// Safety bound on iterations in the threshold mode.
    pub max_iterations: usize,
}

impl OptimizerConfig {
    /// Creates a configuration with default hyperparameters.
    #[must_use]
    pub fn new(input_dim: usize, output_dim: usize) -> Self {
        Self {
            input_dim,
            output_dim,
            snr: None,
            channel_usage: 1,
            cost: 1.0,
            rho: 1e2,
            seed: 42,
            loss_threshold: 0.1,
            max_iterations: 1000,
        }
    }

    /// Sets the SNR in dB.
    #[must_use]
    pub fn with_snr(mut self, snr: Option<f64>) -> Self {
        self.snr = snr;
        self
    }

    /// Sets the number of channel uses.
    #[must_use]
    pub fn with_channel_usage(mut self, channel_usage: usize) -> Self {
        self.channel_usage = channel_usage;
        self
    }

    /// Sets the transmit-energy budget.
    #[must_use]
    pub fn with_cost(mut self, cost: f64) -> Self {
        self.cost = cost;
        self
    }

    /// Sets the ADMM penalty.
    #[must_use]
    pub fn with_rho(mut self, rho: f64) -> Self {
        self.rho = rho;
        self
    }

    /// Sets the random seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Sets the loss threshold of [`Stopping::Threshold`] used by the
    /// [`crate::traits::Aligner`] entry point.
    #[must_use]
    pub fn with_loss_threshold(mut self, loss_threshold: f64) -> Self {
        self.loss_threshold = loss_threshold;
        self
    }

    /// Sets the iteration bound of the threshold mode.
    #[must_use]
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Threshold stopping rule built from this configuration.
    #[must_use]
    pub fn threshold_stopping(&self) -> Stopping {
        Stopping::Threshold {
            loss: self.loss_threshold,
            max_iterations: self.max_iterations,
        }
    }
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self::new(384, 768)
    }
}

/// When the ADMM loop stops.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Stopping {
    /// Run exactly this many iterations.
    Iterations(usize),
    /// Run until the loss drops to `loss` or `max_iterations` is reached.
    Threshold {
        /// Target loss.
        loss: f64,
        /// Safety bound.
        max_iterations: usize,
    },
}

impl Stopping {
    /// Returns true if another iteration should run after `iteration`
    /// completed ones with last loss `loss` (`+∞` before the first).
    #[must_use]
    pub fn should_continue(&self, iteration: usize, loss: f64) -> bool {
        match *self {
            Self::Iterations(n) => iteration < n,
            Self::Threshold {
                loss: target,
                max_iterations,
            } => iteration < max_iterations && loss > target,
        }
    }
}

/// Convergence status of an optimization procedure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConvergenceStatus {
    /// Loss reached the configured threshold
    Converged,
    /// Stopped by the iteration budget
    MaxIterations,
    /// Stopped by a caller predicate before either of the above
    UserTerminated,
}

/// Training trace returned by [`LinearOptimizer::fit`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitReport {
    /// MSE on the training batch after each iteration.
    pub losses: Vec<f64>,
    /// `trace(Fᴴ·F)` after each iteration.
    pub traces: Vec<f64>,
    /// Iterations run.
    pub iterations: usize,
    /// Why the loop stopped.
    pub status: ConvergenceStatus,
}

impl FitReport {
    /// Last recorded loss.
    #[must_use]
    pub fn final_loss(&self) -> Option<f64> {
        self.losses.last().copied()
    }

    /// Last recorded precoder energy.
    #[must_use]
    pub fn final_trace(&self) -> Option<f64> {
        self.traces.last().copied()
    }
}

/// Proximal operators and projections.
pub mod prox {
    use crate::primitives::CMatrix;

    /// Projects onto the Frobenius ball `trace(X·Xᴴ) ≤ cost`.
    ///
    /// # Formula
    ///
    /// ```text
    /// Π(C) = C                    if trace(C·Cᴴ) ≤ cost
    ///      = C / (1 + λ)          otherwise, λ = √(trace(C·Cᴴ)/cost) − 1
    /// ```
    ///
    /// # Example
    ///
    /// ```
    /// use semalign::optim::prox::project_frobenius_ball;
    /// use semalign::primitives::{CMatrix, Complex64};
    ///
    /// let c = CMatrix::from_element(2, 2, Complex64::new(1.0, 1.0)); // trace = 8
    /// let z = project_frobenius_ball(&c, 2.0);
    /// assert!((z.norm_squared() - 2.0).abs() < 1e-12);
    /// ```
    #[must_use]
    pub fn project_frobenius_ball(c: &CMatrix, cost: f64) -> CMatrix {
        let tr = c.norm_squared();
        if tr <= cost {
            c.clone()
        } else {
            let lambda = (tr / cost).sqrt() - 1.0;
            c.unscale(1.0 + lambda)
        }
    }
}
