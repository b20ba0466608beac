//! ADMM precoder/decoder optimizer.

use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use rand_distr::{Distribution, StandardNormal};
use serde::{Deserialize, Serialize};

use super::{prox, ConvergenceStatus, FitReport, OptimizerConfig, Stopping};
use crate::channel::{gaussian_noise, unit_reference_noise_power};
use crate::error::{Result, SemAlignError};
use crate::metrics::mse;
use crate::preprocessing::Prewhitener;
use crate::primitives::{
    complex_pack, complex_unpack, packed_len, solve_hermitian_sylvester, solve_right_hermitian,
    solve_weighted_sylvester, CMatrix, Complex64, HermitianFactor, RMatrix,
};
use crate::traits::Aligner;

/// `X·Xᴴ` above this condition number takes the weighted Sylvester path.
const MAX_GRAM_CONDITION: f64 = 1e10;

/// Auxiliary ADMM variables.
///
/// `z` is the feasible copy of the precoder and `u` the scaled dual. Both
/// are reset at the start of every fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdmmState {
    /// Projected precoder copy, `(Nt·cu) × ⌈d_in/2⌉`.
    pub z: CMatrix,
    /// Scaled dual variable, same shape as `z`.
    pub u: CMatrix,
    /// Penalty `ρ`.
    pub rho: f64,
    /// Energy budget.
    pub cost: f64,
}

impl AdmmState {
    fn zeros(rows: usize, cols: usize, rho: f64, cost: f64) -> Self {
        Self {
            z: CMatrix::zeros(rows, cols),
            u: CMatrix::zeros(rows, cols),
            rho,
            cost,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FittedState {
    precoder: CMatrix,
    decoder: CMatrix,
    whitener: Prewhitener,
}

/// Learns a linear precoder `F` and decoder `G` jointly with the semantic
/// map, under `trace(F·Fᴴ) ≤ cost`.
///
/// The channel is expanded over the channel uses as `kron(I_cu, H)`, so one
/// observation occupies `cu` consecutive packets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearOptimizer {
    config: OptimizerConfig,
    channel: CMatrix,
    expanded: CMatrix,
    noise_power: f64,
    admm: AdmmState,
    state: Option<FittedState>,
}

impl LinearOptimizer {
    /// Creates an unfitted optimizer for channel `H` (`Nr × Nt`).
    ///
    /// # Errors
    ///
    /// Returns [`SemAlignError::InvalidConfiguration`] for an empty channel,
    /// zero dimensions or channel uses, a non-positive cost or `ρ`, or a
    /// non-finite SNR.
    pub fn new(config: OptimizerConfig, channel_matrix: CMatrix) -> Result<Self> {
        if channel_matrix.is_empty() {
            return Err(SemAlignError::invalid_config(
                "channel_matrix",
                format!("{}x{}", channel_matrix.nrows(), channel_matrix.ncols()),
                "non-empty",
            ));
        }
        if config.input_dim == 0 || config.output_dim == 0 {
            return Err(SemAlignError::invalid_config(
                "input_dim/output_dim",
                format!("{}/{}", config.input_dim, config.output_dim),
                "both at least 1",
            ));
        }
        if config.channel_usage == 0 {
            return Err(SemAlignError::invalid_config("channel_usage", 0, "at least 1"));
        }
        if !(config.cost > 0.0 && config.cost.is_finite()) {
            return Err(SemAlignError::invalid_config("cost", config.cost, "finite and > 0"));
        }
        if !(config.rho > 0.0 && config.rho.is_finite()) {
            return Err(SemAlignError::invalid_config("rho", config.rho, "finite and > 0"));
        }
        if config.loss_threshold.is_nan() {
            return Err(SemAlignError::invalid_config(
                "loss_threshold",
                config.loss_threshold,
                "a number",
            ));
        }
        if let Some(snr) = config.snr {
            if !snr.is_finite() {
                return Err(SemAlignError::invalid_config("snr", snr, "finite dB value"));
            }
        }

        let nt = channel_matrix.ncols();
        let uses = config.channel_usage;
        let expanded = CMatrix::identity(uses, uses).kronecker(&channel_matrix);
        let noise_power = unit_reference_noise_power(config.snr, nt);
        let admm = AdmmState::zeros(
            nt * config.channel_usage,
            packed_len(config.input_dim),
            config.rho,
            config.cost,
        );

        tracing::debug!(
            nr = channel_matrix.nrows(),
            nt,
            channel_usage = config.channel_usage,
            noise_power,
            "created linear optimizer"
        );

        Ok(Self {
            config,
            channel: channel_matrix,
            expanded,
            noise_power,
            admm,
            state: None,
        })
    }

    /// Configuration.
    #[must_use]
    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    /// Channel matrix `H`.
    #[must_use]
    pub fn channel(&self) -> &CMatrix {
        &self.channel
    }

    /// Block-diagonal `kron(I_cu, H)`.
    #[must_use]
    pub fn expanded_channel(&self) -> &CMatrix {
        &self.expanded
    }

    /// Noise power `σ²` at the unit reference, 0 without an SNR.
    #[must_use]
    pub fn noise_power(&self) -> f64 {
        self.noise_power
    }

    /// ADMM auxiliary variables.
    #[must_use]
    pub fn admm_state(&self) -> &AdmmState {
        &self.admm
    }

    /// Precoder `F`, once fitted.
    #[must_use]
    pub fn precoder(&self) -> Option<&CMatrix> {
        self.state.as_ref().map(|s| &s.precoder)
    }

    /// Decoder `G`, once fitted.
    #[must_use]
    pub fn decoder(&self) -> Option<&CMatrix> {
        self.state.as_ref().map(|s| &s.decoder)
    }

    /// Returns true once a fit has completed.
    #[must_use]
    pub fn is_fitted(&self) -> bool {
        self.state.is_some()
    }

    /// Runs ADMM until `stopping` says otherwise.
    ///
    /// # Errors
    ///
    /// See [`LinearOptimizer::fit_until`].
    pub fn fit(
        &mut self,
        input: &RMatrix,
        output: &RMatrix,
        stopping: Stopping,
    ) -> Result<FitReport> {
        let mut report = self.fit_until(input, output, |iteration, loss| {
            stopping.should_continue(iteration, loss)
        })?;

        let final_loss = report.final_loss().unwrap_or(f64::INFINITY);
        report.status = match stopping {
            Stopping::Iterations(_) if final_loss <= self.config.loss_threshold => {
                ConvergenceStatus::Converged
            }
            Stopping::Iterations(_) => ConvergenceStatus::MaxIterations,
            Stopping::Threshold { loss, .. } if final_loss <= loss => ConvergenceStatus::Converged,
            Stopping::Threshold { loss, max_iterations } => {
                tracing::warn!(
                    max_iterations,
                    target = loss,
                    final_loss,
                    "loss threshold not reached"
                );
                ConvergenceStatus::MaxIterations
            }
        };
        Ok(report)
    }

    /// Runs ADMM while `should_continue(iterations_done, last_loss)` holds.
    /// `last_loss` is `+∞` before the first iteration.
    ///
    /// The precoder is re-initialized from the configured seed and the
    /// auxiliary variables are zeroed, so repeated fits are reproducible. After
    /// the loop `F` is projected onto the energy ball and `G` is refreshed
    /// for it.
    ///
    /// # Errors
    ///
    /// Returns an error on dimension mismatches, if a linear solve fails, or
    /// if the loss becomes non-finite.
    pub fn fit_until<P>(
        &mut self,
        input: &RMatrix,
        output: &RMatrix,
        mut should_continue: P,
    ) -> Result<FitReport>
    where
        P: FnMut(usize, f64) -> bool,
    {
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

        let n = input.nrows();
        let rho_n = self.config.rho * n as f64;
        let cost = self.config.cost;
        let mut rng = StdRng::seed_from_u64(self.config.seed);

        let mut whitener = Prewhitener::new();
        let x = whitener.fit_transform(&complex_pack(&input.transpose()))?;
        let y = complex_pack(&output.transpose());
        let cross = &y * x.adjoint();

        // X·Xᴴ = Q·diag(g)·Qᴴ once per fit; the classic B is ρn·Q·diag(1/g)·Qᴴ
        let gram = HermitianFactor::new(&(&x * x.adjoint()))?;
        let classic = if gram.condition_number() < MAX_GRAM_CONDITION {
            Some(gram.scaled_inverse(rho_n)?)
        } else {
            None
        };

        let mut f = self.initial_precoder(&mut rng);
        self.admm = AdmmState::zeros(f.nrows(), f.ncols(), self.config.rho, cost);

        let sylvester = if classic.is_some() { "classic" } else { "weighted" };
        tracing::debug!(observations = n, sylvester, "starting ADMM");

        let mut losses = Vec::new();
        let mut traces = Vec::new();
        let mut loss = f64::INFINITY;

        while should_continue(losses.len(), loss) {
            let g = self.decoder_step(&f, &x, &y)?;

            let m = &g * &self.expanded;
            let a = m.adjoint() * &m;
            let rhs = (&self.admm.z - &self.admm.u).scale(rho_n) + m.adjoint() * &cross;
            f = match &classic {
                Some(b) => solve_hermitian_sylvester(&a, b, &gram.solve_right(&rhs)?)?,
                None => solve_weighted_sylvester(&a, &gram, rho_n, &rhs)?,
            };

            self.admm.z = prox::project_frobenius_ball(&(&f + &self.admm.u), cost);
            self.admm.u += &f - &self.admm.z;

            let estimate = self.propagate(&f, &g, &whitener, input, &mut rng)?;
            loss = mse(&estimate, output)?;
            let energy = f.norm_squared();
            if !loss.is_finite() {
                return Err(SemAlignError::Numerical(format!(
                    "ADMM loss diverged at iteration {}",
                    losses.len() + 1
                )));
            }

            tracing::trace!(iteration = losses.len() + 1, loss, trace = energy, "ADMM iteration");
            losses.push(loss);
            traces.push(energy);
        }

        let precoder = prox::project_frobenius_ball(&f, cost);
        let decoder = self.decoder_step(&precoder, &x, &y)?;

        let iterations = losses.len();
        let status = if loss <= self.config.loss_threshold {
            ConvergenceStatus::Converged
        } else {
            ConvergenceStatus::UserTerminated
        };
        tracing::info!(
            iterations,
            final_loss = loss,
            energy = precoder.norm_squared(),
            "fitted linear optimizer"
        );

        self.state = Some(FittedState {
            precoder,
            decoder,
            whitener,
        });
        Ok(FitReport {
            losses,
            traces,
            iterations,
            status,
        })
    }

    /// Sends `input` (`n × input_dim`) across the channel and returns the
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
        self.propagate(&state.precoder, &state.decoder, &state.whitener, input, rng)
    }

    /// [`LinearOptimizer::transform_with_rng`] with thread-local randomness.
    ///
    /// # Errors
    ///
    /// See [`LinearOptimizer::transform_with_rng`].
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
        mse(&self.transform_with_rng(input, rng)?, output)
    }

    /// [`LinearOptimizer::eval_with_rng`] with thread-local randomness.
    ///
    /// # Errors
    ///
    /// See [`LinearOptimizer::eval_with_rng`].
    pub fn eval(&self, input: &RMatrix, output: &RMatrix) -> Result<f64> {
        self.eval_with_rng(input, output, &mut rand::thread_rng())
    }

    fn fitted(&self) -> Result<&FittedState> {
        self.state.as_ref().ok_or(SemAlignError::NotFitted {
            model: "LinearOptimizer",
        })
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

    /// Complex standard normal entries on both parts.
    fn initial_precoder(&self, rng: &mut StdRng) -> CMatrix {
        CMatrix::from_fn(self.admm.z.nrows(), self.admm.z.ncols(), |_, _| {
            Complex64::new(StandardNormal.sample(rng), StandardNormal.sample(rng))
        })
    }

    /// `G = Y·Auxᴴ·(Aux·Auxᴴ + n·σ²·I)⁺` with `Aux = H·F·X`.
    fn decoder_step(&self, f: &CMatrix, x: &CMatrix, y: &CMatrix) -> Result<CMatrix> {
        let aux = &self.expanded * f * x;
        let regularizer = x.ncols() as f64 * self.noise_power;
        let mut gram = &aux * aux.adjoint();
        for i in 0..gram.nrows() {
            gram[(i, i)] += Complex64::new(regularizer, 0.0);
        }
        solve_right_hermitian(&(y * aux.adjoint()), &gram, "G-step")
    }

    /// Pack, whiten, `G·(H·F·x + w)`, unpack and truncate to `output_dim`.
    fn propagate<R: Rng + ?Sized>(
        &self,
        f: &CMatrix,
        g: &CMatrix,
        whitener: &Prewhitener,
        input: &RMatrix,
        rng: &mut R,
    ) -> Result<RMatrix> {
        let x = whitener.transform(&complex_pack(&input.transpose()))?;
        let mut received = &self.expanded * f * x;
        if self.config.snr.is_some() {
            received += gaussian_noise(self.noise_power, received.nrows(), received.ncols(), rng)?;
        }
        let estimate = complex_unpack(&(g * received));
        Ok(estimate.rows(0, self.config.output_dim).transpose())
    }
}

impl Aligner for LinearOptimizer {
    type FitOutput = FitReport;

    /// Fits with the configured loss threshold and iteration bound.
    fn fit(&mut self, input: &RMatrix, output: &RMatrix) -> Result<FitReport> {
        let stopping = self.config.threshold_stopping();
        LinearOptimizer::fit(self, input, output, stopping)
    }

    fn transform_with_rng(&self, input: &RMatrix, rng: &mut dyn RngCore) -> Result<RMatrix> {
        LinearOptimizer::transform_with_rng(self, input, rng)
    }
}
