use std::num::NonZeroUsize;

use ndarray::Array2;
use rand::{SeedableRng, rngs::StdRng};
use rand_distr::{Distribution, StandardNormal};

use sparse_autoencoder::{
    MlErr,
    annotations::AnnotationMask,
    arch::{Autoencoder, CompositeLinearDecoder, FeedForwardEncoder, TermKind},
    configs::{OptimizerConfig, TrainConfig},
    dataset::InMemoryDataset,
    optimization::GradientDescent,
    prox::{ProxRegistry, RegularizationCoeffs},
    training::{ProxTrainer, Recorder, TrainEvent},
};

fn random_matrix(shape: (usize, usize), seed: u64) -> Array2<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    Array2::from_shape_simple_fn(shape, || StandardNormal.sample(&mut rng))
}

fn train_config(coeffs: RegularizationCoeffs) -> TrainConfig {
    let mut config = TrainConfig::new(NonZeroUsize::new(8).unwrap(), 1);
    config.lambda1 = coeffs.lambda1;
    config.lambda2 = coeffs.lambda2;
    config.lambda3 = coeffs.lambda3;
    config.optimizer = OptimizerConfig::default();
    config
}

#[test]
fn fully_annotated_block_is_left_to_the_gradient() {
    let (n_vars, n_ann) = (10, 3);
    let mask = AnnotationMask::new(Array2::from_elem((n_vars, n_ann), true));
    let coeffs = RegularizationCoeffs {
        lambda1: Some(0.1),
        lambda2: None,
        lambda3: None,
    };

    let mut rng = StdRng::seed_from_u64(0);
    let decoder = CompositeLinearDecoder::new(n_vars, Some(n_ann), None, None, &mut rng).unwrap();
    let encoder = FeedForwardEncoder::feed_forward(n_vars, n_ann, 16, 0.2, &mut rng).unwrap();
    let model = Autoencoder::new(encoder, decoder).unwrap();
    let before = model.annotated_weights().unwrap().to_owned();

    let registry = ProxRegistry::new(&mask, coeffs).unwrap();
    let config = train_config(coeffs);
    let optimizer = config.optimizer;
    let mut trainer =
        ProxTrainer::new(model, registry, config, |len| optimizer.build(len)).unwrap();

    let mut data = InMemoryDataset::from_matrix(random_matrix((64, n_vars), 1), mask, 2).unwrap();
    let summaries = trainer.train(&mut data, None, &mut Recorder::new()).unwrap();

    let after = trainer.model().annotated_weights().unwrap().to_owned();
    assert_ne!(before, after, "gradient steps should move the annotated block");

    // Every entry is exempt, so the proximal step is the identity on this block.
    let mut projected = trainer.model().decoder().clone();
    trainer.registry().apply(&mut projected).unwrap();
    assert_eq!(projected.block(TermKind::Annotated).unwrap().weights(), after);

    assert_eq!(summaries[0].inactive_terms, 0);
    assert_eq!(summaries[0].deactivated_share, None);
}

#[test]
fn l1_prunes_a_column_before_the_group_step() {
    let n_vars = 5;
    let mask = AnnotationMask::new(Array2::from_elem((n_vars, 0), false));
    let coeffs = RegularizationCoeffs {
        lambda1: None,
        lambda2: Some(1.0),
        lambda3: Some(1.0),
    };
    let registry = ProxRegistry::new(&mask, coeffs).unwrap();

    let mut sparse = Array2::from_elem((n_vars, 2), 3.0);
    sparse.column_mut(0).fill(0.5);
    let mut decoder =
        CompositeLinearDecoder::from_weights(n_vars, [None, Some(sparse), None]).unwrap();
    registry.validate(&decoder).unwrap();

    registry.apply(&mut decoder).unwrap();

    let weights = decoder.block(TermKind::Sparse).unwrap().weights().to_owned();
    assert!(weights.column(0).iter().all(|&w| w == 0.));

    // The second column goes through L1 (3 → 2) then shrinks along its norm of 2·√5.
    let norm = 2. * (n_vars as f32).sqrt();
    let expected = 2. * (1. - 1. / norm);
    assert!(weights.column(1).iter().all(|&w| (w - expected).abs() < 1e-5));
    assert_eq!(decoder.n_inactive_terms(), 1);
}

#[test]
fn missing_regularization_is_raised_before_any_batch() {
    let n_vars = 6;
    let mask = AnnotationMask::new(Array2::from_elem((n_vars, 2), false));
    let coeffs = RegularizationCoeffs {
        lambda1: None,
        lambda2: None,
        lambda3: Some(0.5),
    };

    let mut rng = StdRng::seed_from_u64(3);
    let decoder = CompositeLinearDecoder::new(n_vars, Some(2), None, Some(1), &mut rng).unwrap();
    let encoder = FeedForwardEncoder::feed_forward(n_vars, 3, 4, 0.0, &mut rng).unwrap();
    let model = Autoencoder::new(encoder, decoder).unwrap();
    let registry = ProxRegistry::new(&mask, coeffs).unwrap();

    let mut made = 0;
    let res = ProxTrainer::new(model, registry, train_config(coeffs), |_| {
        made += 1;
        GradientDescent::new(0.1)
    });

    assert!(matches!(
        res.err(),
        Some(MlErr::MissingRegularization { term: "annotated" })
    ));
    assert_eq!(made, 0);
}

#[test]
fn decoder_forward_is_linear_with_the_expected_shape() {
    let mut rng = StdRng::seed_from_u64(9);
    let decoder = CompositeLinearDecoder::new(7, Some(2), Some(3), Some(1), &mut rng).unwrap();
    let x = random_matrix((4, 6), 10);

    let once = decoder.forward(x.view()).unwrap();
    let twice = decoder.forward((&x * 2.).view()).unwrap();

    assert_eq!(once.dim(), (4, 7));
    assert!((twice - &once * 2.).iter().all(|d| d.abs() < 1e-5));
    assert_eq!(decoder.concatenated().dim(), (7, 6));
}

#[test]
fn sparsity_statistics_are_reported_every_epoch() {
    let n_vars = 8;
    let mask = AnnotationMask::new(Array2::from_shape_fn((n_vars, 2), |(g, t)| g % 2 == t));
    let coeffs = RegularizationCoeffs {
        lambda1: Some(0.5),
        lambda2: Some(0.5),
        lambda3: Some(0.1),
    };

    let mut rng = StdRng::seed_from_u64(4);
    let decoder =
        CompositeLinearDecoder::new(n_vars, Some(2), Some(2), Some(1), &mut rng).unwrap();
    let encoder = FeedForwardEncoder::feed_forward(n_vars, 5, 8, 0.1, &mut rng).unwrap();
    let model = Autoencoder::new(encoder, decoder).unwrap();
    let registry = ProxRegistry::new(&mask, coeffs).unwrap();

    let mut config = train_config(coeffs);
    config.epochs = 3;
    let optimizer = config.optimizer;
    let mut trainer =
        ProxTrainer::new(model, registry, config, |len| optimizer.build(len)).unwrap();

    let mut data = InMemoryDataset::from_matrix(random_matrix((32, n_vars), 5), mask, 6).unwrap();
    let test = random_matrix((5, n_vars), 7);
    let mut recorder = Recorder::new();
    let summaries = trainer.train(&mut data, Some(test.view()), &mut recorder).unwrap();

    assert_eq!(summaries.len(), 3);
    for summary in &summaries {
        let share = summary.deactivated_share.unwrap();
        assert!(share.is_finite() && share >= 0.);
    }

    let deactivated = recorder
        .events
        .iter()
        .filter(|e| matches!(e, TrainEvent::DeactivatedGenes { .. }))
        .count();
    assert_eq!(deactivated, 3);

    // Most unannotated weights start below 0.5 in magnitude.
    let annotated = trainer.model().annotated_weights().unwrap();
    assert!(annotated.iter().any(|&w| w == 0.));
}
