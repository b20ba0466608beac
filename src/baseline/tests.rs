//! Tests for the baseline aligner.

use super::*;
use crate::channel::random_complex_matrix;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn random_batch(rows: usize, cols: usize, seed: u64) -> RMatrix {
    let mut rng = StdRng::seed_from_u64(seed);
    RMatrix::from_fn(rows, cols, |_, _| rng.gen_range(-1.0..1.0))
}

fn channel(nr: usize, nt: usize, seed: u64) -> CMatrix {
    let mut rng = StdRng::seed_from_u64(seed);
    random_complex_matrix(0.0, 1.0, nr, nt, &mut rng).expect("channel")
}

/// Noiseless, channel-disabled baseline with identity precoder/decoder.
fn identity_baseline(config: BaselineConfig, nt: usize) -> Baseline {
    let config = config.with_snr(None).with_use_channel(false);
    Baseline::new(config, channel(nt, nt, 1))
        .expect("baseline")
        .with_equalizer(CMatrix::identity(nt, nt), CMatrix::identity(nt, nt))
        .expect("identity pair")
}

#[test]
fn test_typology_parse_and_serde() {
    assert_eq!("pre".parse::<Typology>().expect("pre"), Typology::Pre);
    assert_eq!("post".parse::<Typology>().expect("post"), Typology::Post);
    assert!(matches!(
        "Post".parse::<Typology>(),
        Err(SemAlignError::InvalidConfiguration { .. })
    ));
    assert_eq!(serde_json::to_string(&Typology::Pre).expect("json"), "\"pre\"");
    assert_eq!(Typology::default(), Typology::Post);
}

#[test]
fn test_config_builders() {
    let config = BaselineConfig::new(10, 12)
        .with_snr(Some(5.0))
        .with_proto(3)
        .with_channel_usage(2)
        .with_typology(Typology::Pre)
        .with_strategy(Strategy::Upe)
        .with_use_channel(false)
        .with_seed(7);
    assert_eq!(config.snr, Some(5.0));
    assert_eq!(config.proto, 3);
    assert_eq!(config.channel_usage, Some(2));
    assert_eq!(config.typology, Typology::Pre);
    assert_eq!(config.strategy, Strategy::Upe);
    assert!(!config.use_channel);
    assert_eq!(config.seed, 7);

    let json = serde_json::to_string(&config).expect("serialize");
    let back: BaselineConfig = serde_json::from_str(&json).expect("deserialize");
    assert_eq!(back, config);
}

#[test]
fn test_default_channel_usage() {
    let baseline =
        Baseline::new(BaselineConfig::new(384, 768), channel(4, 4, 2)).expect("baseline");
    // ⌈(384/2)/4⌉ = 48 packets of 4 symbols
    assert_eq!(baseline.channel_usage(), 48);
    assert_eq!(baseline.sent_features(), 384);
    assert!(!baseline.is_fitted());
}

#[test]
fn test_rejects_invalid_configuration() {
    let h = channel(4, 4, 3);
    let zero_dim = BaselineConfig::new(0, 8);
    assert!(Baseline::new(zero_dim, h.clone()).is_err());

    let zero_usage = BaselineConfig::new(16, 16).with_channel_usage(0);
    assert!(Baseline::new(zero_usage, h.clone()).is_err());

    let zero_proto = BaselineConfig::new(16, 16).with_proto(0);
    assert!(Baseline::new(zero_proto, h.clone()).is_err());

    let nan_snr = BaselineConfig::new(16, 16).with_snr(Some(f64::NAN));
    assert!(Baseline::new(nan_snr, h.clone()).is_err());

    let empty = BaselineConfig::new(16, 16);
    assert!(matches!(
        Baseline::new(empty, CMatrix::zeros(0, 0)),
        Err(SemAlignError::InvalidConfiguration { .. })
    ));

    // Post First-K reduces the 6 input features, but needs 8
    let too_small = BaselineConfig::new(6, 16).with_channel_usage(1);
    assert!(matches!(
        Baseline::new(too_small, h.clone()),
        Err(SemAlignError::InvalidConfiguration { .. })
    ));
    // Pre reduces the 16 output features instead
    let pre = BaselineConfig::new(6, 16)
        .with_channel_usage(1)
        .with_typology(Typology::Pre);
    assert!(Baseline::new(pre, h.clone()).is_ok());
    // Frame strategies are not bound by the feature count
    let upe = BaselineConfig::new(6, 16)
        .with_channel_usage(1)
        .with_strategy(Strategy::Upe);
    assert!(Baseline::new(upe, h).is_ok());
}

#[test]
fn test_with_equalizer_checks_shapes() {
    let config = BaselineConfig::new(16, 16).with_channel_usage(1);
    let baseline = Baseline::new(config, channel(4, 4, 4)).expect("baseline");
    assert!(matches!(
        baseline.with_equalizer(CMatrix::identity(3, 3), CMatrix::identity(4, 4)),
        Err(SemAlignError::DimensionMismatch { .. })
    ));
}

#[test]
fn test_unfitted_transform_and_eval() {
    let config = BaselineConfig::new(16, 16).with_channel_usage(1);
    let baseline = Baseline::new(config, channel(4, 4, 5)).expect("baseline");
    let x = random_batch(5, 16, 1);
    assert!(matches!(
        baseline.transform(&x),
        Err(SemAlignError::NotFitted { .. })
    ));
    assert!(matches!(
        baseline.eval(&x, &x),
        Err(SemAlignError::NotFitted { .. })
    ));
    assert!(baseline.alignment().is_none());
}

#[test]
fn test_fit_dimension_checks() {
    let config = BaselineConfig::new(16, 12).with_channel_usage(1);
    let mut baseline = Baseline::new(config, channel(4, 4, 6)).expect("baseline");
    let x = random_batch(20, 16, 1);
    assert!(baseline.fit(&x, &random_batch(20, 11, 2)).is_err());
    assert!(baseline.fit(&x, &random_batch(19, 12, 2)).is_err());
    assert!(baseline.fit(&random_batch(20, 15, 3), &random_batch(20, 12, 2)).is_err());
    assert!(!baseline.is_fitted());
}

#[test]
fn test_first_k_post_identity_path() {
    let nt = 2;
    let config = BaselineConfig::new(10, 6).with_channel_usage(1);
    let mut baseline = identity_baseline(config, nt);
    let x = random_batch(40, 10, 7);
    let y = random_batch(40, 6, 8);
    baseline.fit(&x, &y).expect("fit");

    let a = baseline.alignment().expect("alignment").clone();
    assert_eq!(a.shape(), (6, 10));

    // Only the first 2·1·2 = 4 input features survive
    let mut kept = x.transpose();
    kept.rows_mut(4, 6).fill(0.0);
    let expected = (&a * kept).transpose();

    let out = baseline.transform_with_rng(&x, &mut StdRng::seed_from_u64(0)).expect("transform");
    assert_eq!(out.shape(), (40, 6));
    assert!((out - expected).norm() < 1e-8);
}

#[test]
fn test_first_k_pre_identity_path() {
    let nt = 2;
    let config = BaselineConfig::new(10, 6)
        .with_channel_usage(1)
        .with_typology(Typology::Pre);
    let mut baseline = identity_baseline(config, nt);
    let x = random_batch(40, 10, 9);
    let y = random_batch(40, 6, 10);
    baseline.fit(&x, &y).expect("fit");

    let a = baseline.alignment().expect("alignment");
    let mut expected = a * x.transpose();
    expected.rows_mut(4, 2).fill(0.0);

    let out = baseline.transform(&x).expect("transform");
    assert!((out - expected.transpose()).norm() < 1e-8);
}

#[test]
fn test_top_k_identity_path_scatters_largest() {
    let nt = 2;
    let config = BaselineConfig::new(8, 8)
        .with_channel_usage(1)
        .with_strategy(Strategy::TopK)
        .with_typology(Typology::Pre);
    let mut baseline = identity_baseline(config, nt);
    let x = random_batch(30, 8, 11);
    // Output equal to input: A ≈ I
    baseline.fit(&x, &x).expect("fit");

    let out = baseline.transform(&x).expect("transform");
    for i in 0..x.nrows() {
        let nonzero = out.row(i).iter().filter(|v| v.abs() > 1e-9).count();
        assert!(nonzero <= 4);
        let kept: f64 = out.row(i).iter().map(|v| v * v).sum();
        let mut squares: Vec<f64> = x.row(i).iter().map(|v| v * v).collect();
        squares.sort_by(|a, b| b.total_cmp(a));
        let top: f64 = squares.iter().take(4).sum();
        assert!((kept - top).abs() < 1e-6);
    }
}

#[test]
fn test_eigen_k_noiseless_matches_frames() {
    let nt = 2;
    let config = BaselineConfig::new(12, 9)
        .with_channel_usage(1)
        .with_strategy(Strategy::EigenK);
    let mut baseline = identity_baseline(config, nt);
    let x = random_batch(50, 12, 12);
    let y = random_batch(50, 9, 13);
    baseline.fit(&x, &y).expect("fit");

    let frames = baseline.frames().expect("frames");
    assert_eq!(frames.encoder.shape(), (4, 12));
    let expected = (&frames.decoder * &frames.encoder * x.transpose()).transpose();
    let out = baseline.transform(&x).expect("transform");
    assert!((out - expected).norm() < 1e-8);
}

#[test]
fn test_frame_strategies_fit_and_eval() {
    let h = channel(2, 2, 14);
    let x = random_batch(40, 12, 15);
    let y = random_batch(40, 10, 16);
    for strategy in [Strategy::EigenK, Strategy::Upe, Strategy::Pfe, Strategy::Ppfe] {
        for typology in [Typology::Pre, Typology::Post] {
            let config = BaselineConfig::new(12, 10)
                .with_snr(Some(20.0))
                .with_channel_usage(2)
                .with_strategy(strategy)
                .with_typology(typology)
                .with_proto(3);
            let mut baseline = Baseline::new(config, h.clone()).expect("baseline");
            baseline.fit(&x, &y).expect("fit");
            assert!(baseline.frames().is_some());

            let loss = baseline
                .eval_with_rng(&x, &y, &mut StdRng::seed_from_u64(1))
                .expect("eval");
            assert!(loss.is_finite() && loss >= 0.0, "{strategy} {typology}: {loss}");
        }
    }
}

#[test]
fn test_pfe_needs_sent_observations() {
    let config = BaselineConfig::new(12, 10)
        .with_channel_usage(2)
        .with_strategy(Strategy::Pfe);
    let mut baseline = Baseline::new(config, channel(2, 2, 17)).expect("baseline");
    // sent_features = 8 > 5 observations
    assert!(matches!(
        baseline.fit(&random_batch(5, 12, 1), &random_batch(5, 10, 2)),
        Err(SemAlignError::DimensionMismatch { .. })
    ));
}

#[test]
fn test_seeded_transform_is_reproducible() {
    let config = BaselineConfig::new(16, 8)
        .with_snr(Some(10.0))
        .with_channel_usage(2);
    let mut baseline = Baseline::new(config, channel(4, 4, 18)).expect("baseline");
    let x = random_batch(30, 16, 19);
    let y = random_batch(30, 8, 20);
    baseline.fit(&x, &y).expect("fit");

    let a = baseline.transform_with_rng(&x, &mut StdRng::seed_from_u64(3)).expect("a");
    let b = baseline.transform_with_rng(&x, &mut StdRng::seed_from_u64(3)).expect("b");
    assert_eq!(a, b);
}

#[test]
fn test_usable_through_aligner_trait() {
    fn run<A: Aligner>(model: &mut A, x: &RMatrix, y: &RMatrix) -> f64 {
        model.fit(x, y).expect("fit");
        model
            .eval_with_rng(x, y, &mut StdRng::seed_from_u64(4))
            .expect("eval")
    }

    let config = BaselineConfig::new(8, 8).with_snr(Some(30.0)).with_channel_usage(1);
    let mut baseline = Baseline::new(config, channel(2, 2, 21)).expect("baseline");
    let x = random_batch(25, 8, 22);
    let loss = run(&mut baseline, &x, &x);
    assert!(loss.is_finite());
}
