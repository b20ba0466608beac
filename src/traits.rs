//! Common interface of the alignment models.

use rand::RngCore;

use crate::error::Result;
use crate::metrics::mse;
use crate::primitives::RMatrix;

/// A model that learns to carry inputs across the link and reproduce the
/// paired outputs at the receiver.
///
/// Batches hold observations as rows. `transform` and `eval` only read the
/// fitted state, so they may run concurrently on a shared model.
///
/// # Examples
///
/// ```
/// use semalign::prelude::*;
///
/// fn score<A: Aligner>(model: &mut A, x: &RMatrix, y: &RMatrix) -> Result<f64> {
///     model.fit(x, y)?;
///     model.eval(x, y)
/// }
/// ```
pub trait Aligner {
    /// What `fit` reports back.
    type FitOutput;

    /// Fits the model on paired `input` (`n × d_in`) and `output`
    /// (`n × d_out`) batches.
    ///
    /// # Errors
    ///
    /// Returns an error if fitting fails (dimension mismatch, singular matrix, etc.).
    fn fit(&mut self, input: &RMatrix, output: &RMatrix) -> Result<Self::FitOutput>;

    /// Sends `input` through the link, drawing noise from `rng`.
    ///
    /// # Errors
    ///
    /// Returns an error if the model is not fitted or `input` has the wrong
    /// feature count.
    fn transform_with_rng(&self, input: &RMatrix, rng: &mut dyn RngCore) -> Result<RMatrix>;

    /// Sends `input` through the link with thread-local randomness.
    ///
    /// # Errors
    ///
    /// See [`Aligner::transform_with_rng`].
    fn transform(&self, input: &RMatrix) -> Result<RMatrix> {
        self.transform_with_rng(input, &mut rand::thread_rng())
    }

    /// Mean squared error of the transformed `input` against `output`.
    ///
    /// # Errors
    ///
    /// Returns an error if the model is not fitted or shapes disagree.
    fn eval_with_rng(
        &self,
        input: &RMatrix,
        output: &RMatrix,
        rng: &mut dyn RngCore,
    ) -> Result<f64> {
        mse(&self.transform_with_rng(input, rng)?, output)
    }

    /// [`Aligner::eval_with_rng`] with thread-local randomness.
    ///
    /// # Errors
    ///
    /// See [`Aligner::eval_with_rng`].
    fn eval(&self, input: &RMatrix, output: &RMatrix) -> Result<f64> {
        self.eval_with_rng(input, output, &mut rand::thread_rng())
    }
}
