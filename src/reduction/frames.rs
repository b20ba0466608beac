//! Frame learning for the subspace strategies.

use nalgebra::DVector;
use rand::rngs::StdRng;
use rand::seq::{index, SliceRandom};
use rand::SeedableRng;

use super::{Frames, Strategy};
use crate::cluster::KMeans;
use crate::error::{Result, SemAlignError};
use crate::primitives::{thin_svd, RMatrix};

/// Training data for [`fit_frames`]. Observations are rows.
#[derive(Debug, Clone, Copy)]
pub struct FrameData<'a> {
    /// Inputs, `n × d_in`.
    pub input: &'a RMatrix,
    /// Outputs, `n × d_out`.
    pub output: &'a RMatrix,
    /// Least-squares alignment `A`, `d_out × d_in`.
    pub alignment: &'a RMatrix,
    /// Observations averaged per PPFE prototype.
    pub proto: usize,
    /// Seed for subsampling and clustering.
    pub seed: u64,
}

/// Learns the encoder/decoder frames of `strategy`.
///
/// Returns `None` for the index strategies. Frames with fewer learned
/// directions than `sent` are padded with zero encoder rows and decoder
/// columns.
///
/// # Errors
///
/// Returns [`SemAlignError::DimensionMismatch`] when PFE/PPFE get fewer than
/// `sent` observations, and propagates SVD or clustering failures.
pub fn fit_frames(strategy: Strategy, sent: usize, data: &FrameData<'_>) -> Result<Option<Frames>> {
    let d_in = data.input.ncols();
    let d_out = data.output.ncols();

    let frames = match strategy {
        Strategy::FirstK | Strategy::TopK => return Ok(None),
        Strategy::EigenK => {
            let svd = thin_svd(data.alignment)?;
            let roots = svd.singular_values.map(f64::sqrt);
            let k = svd.len().min(sent);

            let mut encoder = RMatrix::zeros(sent, d_in);
            let mut decoder = RMatrix::zeros(d_out, sent);
            for i in 0..k {
                encoder.set_row(i, &(svd.v_t.row(i) * roots[i]));
                decoder.set_column(i, &(svd.u.column(i) * roots[i]));
            }
            Frames { encoder, decoder }
        }
        Strategy::Upe => {
            let cross = data.output.transpose() * data.input;
            let svd = thin_svd(&cross)?;
            let k = svd.len().min(sent);

            let mut encoder = RMatrix::zeros(sent, d_in);
            let mut decoder = RMatrix::zeros(d_out, sent);
            encoder.rows_mut(0, k).copy_from(&svd.v_t.rows(0, k));
            decoder.columns_mut(0, k).copy_from(&svd.u.columns(0, k));
            Frames { encoder, decoder }
        }
        Strategy::Pfe => {
            let mut rng = StdRng::seed_from_u64(data.seed);
            let n = check_observations(data, sent)?;
            let picked = index::sample(&mut rng, n, sent).into_vec();
            let input = data.input.select_rows(picked.iter());
            let output = data.output.select_rows(picked.iter());
            polar_frames(&input, &output, sent)?
        }
        Strategy::Ppfe => {
            let mut rng = StdRng::seed_from_u64(data.seed);
            check_observations(data, sent)?;
            let (input, output) = prototypes(data, sent, &mut rng)?;
            polar_frames(&input, &output, sent)?
        }
    };

    tracing::debug!(
        strategy = %strategy,
        encoder = ?frames.encoder.shape(),
        decoder = ?frames.decoder.shape(),
        "fitted reduction frames"
    );
    Ok(Some(frames))
}

fn check_observations(data: &FrameData<'_>, sent: usize) -> Result<usize> {
    let n = data.input.nrows();
    if n < sent {
        return Err(SemAlignError::DimensionMismatch {
            expected: format!("at least {sent} observations"),
            actual: n.to_string(),
        });
    }
    Ok(n)
}

/// Encoder `U·Vᵀ` of the sampled inputs and decoder `(U·Vᵀ)ᵀ` of the
/// sampled outputs, padded to `sent`.
fn polar_frames(input: &RMatrix, output: &RMatrix, sent: usize) -> Result<Frames> {
    let rows = input.nrows();
    let enc = polar_factor(input)?;
    let dec = polar_factor(output)?.transpose();

    let mut encoder = RMatrix::zeros(sent, input.ncols());
    let mut decoder = RMatrix::zeros(output.ncols(), sent);
    encoder.rows_mut(0, rows).copy_from(&enc);
    decoder.columns_mut(0, rows).copy_from(&dec);
    Ok(Frames { encoder, decoder })
}

fn polar_factor(m: &RMatrix) -> Result<RMatrix> {
    let svd = thin_svd(m)?;
    Ok(&svd.u * &svd.v_t)
}

/// Clusters the outputs into `sent` groups and averages up to `proto`
/// random members of each non-empty group, in ascending label order, then
/// shuffles the prototype pairs.
fn prototypes(data: &FrameData<'_>, sent: usize, rng: &mut StdRng) -> Result<(RMatrix, RMatrix)> {
    let mut kmeans = KMeans::new(sent).with_random_state(data.seed);
    kmeans.fit(data.output)?;
    let labels = kmeans
        .labels()
        .ok_or(SemAlignError::NotFitted { model: "KMeans" })?;

    let mut members: Vec<Vec<usize>> = vec![Vec::new(); sent];
    for (i, &label) in labels.iter().enumerate() {
        members[label].push(i);
    }

    let mut pairs: Vec<(DVector<f64>, DVector<f64>)> = Vec::with_capacity(sent);
    for group in members.iter_mut().filter(|g| !g.is_empty()) {
        group.shuffle(rng);
        group.truncate(data.proto.max(1));
        pairs.push((row_mean(data.input, group), row_mean(data.output, group)));
    }
    pairs.shuffle(rng);

    if pairs.len() < sent {
        tracing::warn!(
            prototypes = pairs.len(),
            sent,
            "empty clusters, padding frames with zero rows"
        );
    }

    let input = RMatrix::from_fn(pairs.len(), data.input.ncols(), |i, j| pairs[i].0[j]);
    let output = RMatrix::from_fn(pairs.len(), data.output.ncols(), |i, j| pairs[i].1[j]);
    Ok((input, output))
}

fn row_mean(m: &RMatrix, rows: &[usize]) -> DVector<f64> {
    let mut sum = DVector::zeros(m.ncols());
    for &i in rows {
        sum += m.row(i).transpose();
    }
    sum / rows.len() as f64
}
