//! Tests for preprocessing module.

use super::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn random_batch(rows: usize, cols: usize, seed: u64) -> CMatrix {
    let mut rng = StdRng::seed_from_u64(seed);
    CMatrix::from_fn(rows, cols, |i, _| {
        // Uneven per-feature scale and offset
        let scale = 1.0 + i as f64;
        Complex64::new(
            scale * rng.gen_range(-1.0..1.0) + 3.0,
            scale * rng.gen_range(-1.0..1.0) - 1.0,
        )
    })
}

#[test]
fn test_new_is_unfitted() {
    let whitener = Prewhitener::new();
    assert!(!whitener.is_fitted());
    assert!(whitener.mean().is_none());
    assert!(whitener.l().is_none());
}

#[test]
fn test_whitened_batch_has_zero_mean_identity_covariance() {
    let x = random_batch(3, 400, 7);
    let (white, whitener) = prewhiten(&x).expect("prewhiten");
    assert!(whitener.is_fitted());

    let n = white.ncols() as f64;
    for i in 0..white.nrows() {
        let mean = white.row(i).sum() / n;
        assert!(mean.norm() < 1e-10, "row {i} mean = {mean}");
    }

    let cov = (&white * white.adjoint()).unscale(n);
    let identity = CMatrix::identity(3, 3);
    assert!((cov - identity).norm() < 1e-8);
}

#[test]
fn test_inverse_transform_round_trip() {
    let x = random_batch(4, 60, 11);
    let mut whitener = Prewhitener::new();
    whitener.fit(&x).expect("fit");

    let other = random_batch(4, 5, 12);
    let back = whitener
        .inverse_transform(&whitener.transform(&other).expect("transform"))
        .expect("inverse");
    assert!((back - other).norm() < 1e-9);
}

#[test]
fn test_apply_inverse_undone_by_l() {
    let x = random_batch(3, 30, 3);
    let mut whitener = Prewhitener::new();
    whitener.fit(&x).expect("fit");

    let centered = random_batch(3, 4, 4);
    let white = whitener.apply_inverse(&centered).expect("apply_inverse");
    let l = whitener.l().expect("fitted");
    assert!((l * white - centered).norm() < 1e-9);
}

#[test]
fn test_rank_deficient_batch_stays_invertible() {
    // 6 features but only 3 observations
    let x = random_batch(6, 3, 21);
    let mut whitener = Prewhitener::new();
    whitener.fit(&x).expect("fit on rank-deficient batch");

    let white = whitener.transform(&x).expect("transform");
    assert!(white.iter().all(|v| v.re.is_finite() && v.im.is_finite()));
    let back = whitener.inverse_transform(&white).expect("inverse");
    assert!((back - &x).norm() < 1e-6 * x.norm());
}

#[test]
fn test_constant_batch() {
    let x = CMatrix::from_element(2, 10, Complex64::new(1.5, -0.5));
    let (white, whitener) = prewhiten(&x).expect("prewhiten");
    assert!(white.norm() < 1e-12);
    let back = whitener.inverse_transform(&white).expect("inverse");
    assert!((back - x).norm() < 1e-12);
}

#[test]
fn test_empty_batch_error() {
    let x = CMatrix::zeros(3, 0);
    let mut whitener = Prewhitener::new();
    assert!(matches!(
        whitener.fit(&x),
        Err(SemAlignError::DimensionMismatch { .. })
    ));
}

#[test]
fn test_unfitted_transform_error() {
    let whitener = Prewhitener::new();
    let x = random_batch(2, 3, 1);
    assert!(matches!(
        whitener.transform(&x),
        Err(SemAlignError::NotFitted { .. })
    ));
}

#[test]
fn test_feature_mismatch_error() {
    let x = random_batch(3, 20, 5);
    let mut whitener = Prewhitener::new();
    whitener.fit(&x).expect("fit");
    let wrong = random_batch(2, 4, 6);
    assert!(matches!(
        whitener.transform(&wrong),
        Err(SemAlignError::DimensionMismatch { .. })
    ));
}
