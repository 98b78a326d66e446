//! Integration tests for the skyride/skygrid likelihood pipeline.
//!
//! Scope
//! -----
//! End-to-end checks through the public API: genealogies → intervals →
//! sufficient statistics → weight matrix → cached likelihood → gradients →
//! field-mode fit. Sufficient statistics are compared against an
//! independent O(n²) lineage count on random serially sampled trees.
use approx::{assert_abs_diff_eq, assert_relative_eq};
use ndarray::{Array1, Array2, array};
use rand::{Rng, SeedableRng, rngs::StdRng};
use rust_skygrid::{
    coalescent::prelude::*,
    optimization::loglik_optimizer::{LineSearcher, MLEOptions, Tolerances},
};

// ---- Helpers ----------------------------------------------------------------

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Random serially sampled binary genealogy with `n` tips. Coalescences only
/// happen once at least two lineages exist, so heights are always
/// consistent.
fn random_tree(rng: &mut StdRng, n: usize) -> (Vec<f64>, Vec<f64>) {
    let mut tips: Vec<f64> = (0..n).map(|i| if i == 0 { 0.0 } else { rng.gen_range(0.0..1.5) }).collect();
    let mut sorted = tips.clone();
    sorted.sort_by(f64::total_cmp);
    let mut internal = Vec::with_capacity(n - 1);
    let mut t = 0.0_f64;
    for k in 0..n - 1 {
        t = t.max(sorted[k + 1]) + rng.gen_range(0.05..0.5);
        internal.push(t);
    }
    tips.rotate_left(n / 2);
    (tips, internal)
}

/// Integrated pairwise weight `Σ_l C(k_l(t), 2) / ploidy_l` over `[a, b]`,
/// counting lineages at subinterval midpoints.
fn brute_weight(loci: &[(Vec<f64>, Vec<f64>)], ploidy: &[f64], a: f64, b: f64) -> f64 {
    let mut cuts = vec![a, b];
    for (tips, internal) in loci {
        cuts.extend(tips.iter().chain(internal.iter()).copied().filter(|&h| h > a && h < b));
    }
    cuts.sort_by(f64::total_cmp);
    let mut total = 0.0;
    for w in cuts.windows(2) {
        let mid = 0.5 * (w[0] + w[1]);
        for ((tips, internal), p) in loci.iter().zip(ploidy) {
            let k = tips.iter().filter(|&&h| h <= mid).count() as f64
                - internal.iter().filter(|&&h| h <= mid).count() as f64;
            total += (w[1] - w[0]) * 0.5 * k * (k - 1.0) / p;
        }
    }
    total
}

/// Expected skyride `stats`: one cell per coalescence across all loci.
fn brute_skyride_stats(loci: &[(Vec<f64>, Vec<f64>)], ploidy: &[f64]) -> Vec<f64> {
    let mut ends: Vec<f64> = loci.iter().flat_map(|(_, internal)| internal.iter().copied()).collect();
    ends.sort_by(f64::total_cmp);
    let mut start = loci
        .iter()
        .flat_map(|(tips, _)| tips.iter().copied())
        .fold(f64::INFINITY, f64::min);
    ends.iter()
        .map(|&end| {
            let w = brute_weight(loci, ploidy, start, end);
            start = end;
            w
        })
        .collect()
}

fn build(
    loci: &[(Vec<f64>, Vec<f64>)], gamma: Array1<f64>, options: SkyOptions,
) -> SkyLikelihood<NodeHeights> {
    let trees = loci.iter().map(|(t, i)| NodeHeights::new(t.clone(), i.clone()).unwrap()).collect();
    let params = FieldParams::new(gamma, 1.7, 0.9).unwrap();
    SkyLikelihood::new(trees, params, options).unwrap()
}

fn random_gamma(rng: &mut StdRng, n: usize) -> Array1<f64> {
    Array1::from_shape_fn(n, |_| rng.gen_range(-0.8..0.8))
}

// ---- Tests ------------------------------------------------------------------

#[test]
// Purpose
// -------
// Skyride statistics agree with a direct lineage count on random serially
// sampled trees.
//
// Given
// -----
// - 25 seeded random trees with 3 to 8 tips.
//
// Expect
// ------
// - `stats` match the brute-force weights; one coalescence per cell; cell
//   lengths sum to the root height; cell end times are the internal heights.
fn skyride_statistics_match_brute_force() {
    let mut rng = StdRng::seed_from_u64(20_240_611);
    for _ in 0..25 {
        // Arrange
        let n = rng.gen_range(3..=8);
        let tree = random_tree(&mut rng, n);
        let loci = vec![tree.clone()];
        let mut lik = build(&loci, Array1::zeros(n - 1), SkyOptions::default());

        // Act
        let stats = lik.sufficient_statistics().unwrap().clone();

        // Assert
        let expected = brute_skyride_stats(&loci, &[1.0]);
        for (got, want) in stats.stats.iter().zip(&expected) {
            assert_relative_eq!(*got, *want, max_relative = 1e-10, epsilon = 1e-12);
        }
        assert!(stats.num_coal_events.iter().all(|&k| k == 1.0));
        let root = tree.1.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        assert_relative_eq!(stats.interval_lengths.sum(), root, max_relative = 1e-12);
        assert_eq!(stats.cell_end_times.to_vec(), tree.1);
    }
}

#[test]
// Purpose
// -------
// Multiple loci share one field; every locus's coalescences close cells and
// weights add across loci with their ploidy.
//
// Given
// -----
// - Two random loci (5 and 4 tips), ploidy [1.0, 0.5].
//
// Expect
// ------
// - Field length 7; stats match the brute-force multi-locus weights;
//   `ploidy_sums` total `3·ln 2` (three coalescences of the ploidy-½ locus).
fn multi_locus_statistics_match_brute_force() {
    // Arrange
    init_tracing();
    let mut rng = StdRng::seed_from_u64(7);
    let loci = vec![random_tree(&mut rng, 5), random_tree(&mut rng, 4)];
    let ploidy = vec![1.0, 0.5];
    let options = SkyOptions::default().with_ploidy(ploidy.clone());
    let mut lik = build(&loci, Array1::zeros(7), options);

    // Act
    let stats = lik.sufficient_statistics().unwrap().clone();

    // Assert
    assert_eq!(lik.field_length(), 7);
    let expected = brute_skyride_stats(&loci, &ploidy);
    for (got, want) in stats.stats.iter().zip(&expected) {
        assert_relative_eq!(*got, *want, max_relative = 1e-10, epsilon = 1e-12);
    }
    assert_relative_eq!(stats.ploidy_sums.sum(), 3.0 * 2.0_f64.ln(), max_relative = 1e-12);
    assert_eq!(stats.total_coalescent_events(), 7.0);
}

#[test]
// Purpose
// -------
// Skygrid cells conserve total weight and coalescent counts.
//
// Given
// -----
// - A random 8-tip tree and a 5-point uniform grid ending below the root.
//
// Expect
// ------
// - 6 cells; Σ stats equals the brute-force total weight; Σ events = 7.
fn skygrid_conserves_weight_and_events() {
    // Arrange
    let mut rng = StdRng::seed_from_u64(99);
    let tree = random_tree(&mut rng, 8);
    let root = tree.1.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let grid = GridPoints::uniform(0.8 * root, 5).unwrap();
    let loci = vec![tree];
    let mut lik = build(&loci, Array1::zeros(6), SkyOptions::skygrid(grid));

    // Act
    let stats = lik.sufficient_statistics().unwrap().clone();

    // Assert
    assert_eq!(stats.len(), 6);
    let total = brute_weight(&loci, &[1.0], 0.0, root);
    assert_relative_eq!(stats.stats.sum(), total, max_relative = 1e-10);
    assert_eq!(stats.total_coalescent_events(), 7.0);
}

#[test]
// Purpose
// -------
// The 3-tip reference case through the public API.
//
// Given
// -----
// - Isochronous tips, internal heights [1.0, 2.5], γ = 0.
//
// Expect
// ------
// - stats = [3.0, 1.5]; coalescent term −4.5.
fn three_tip_reference_values() {
    // Arrange
    let tree = NodeHeights::isochronous(3, vec![1.0, 2.5]).unwrap();
    let params = FieldParams::new(array![0.0, 0.0], 1.0, 1.0).unwrap();
    let mut lik = SkyLikelihood::new(vec![tree], params, SkyOptions::default()).unwrap();

    // Act
    let terms = lik.term_values().unwrap();

    // Assert
    assert_eq!(lik.sufficient_statistics().unwrap().stats, array![3.0, 1.5]);
    assert_relative_eq!(terms.coalescent, -4.5);
    assert_relative_eq!(terms.total, terms.coalescent + terms.field);
}

#[test]
// Purpose
// -------
// Time-aware and time-unaware base matrices are positive semi-definite and
// diagonally dominant on random trees.
//
// Given
// -----
// - 10 random trees, each under both smoothing modes.
//
// Expect
// ------
// - Smallest eigenvalue ≥ −1e-10; the constant vector is in the null space.
fn weight_matrices_are_psd_and_diagonally_dominant() {
    let mut rng = StdRng::seed_from_u64(3);
    for _ in 0..10 {
        for smoothing in [Smoothing::TimeAware, Smoothing::TimeUnaware] {
            // Arrange
            let n = rng.gen_range(3..=8);
            let loci = vec![random_tree(&mut rng, n)];
            let options = SkyOptions::default().with_smoothing(smoothing);
            let mut lik = build(&loci, Array1::zeros(n - 1), options);

            // Act
            let q = lik.weight_matrix().unwrap().clone();

            // Assert
            assert!(q.is_diagonally_dominant());
            assert!(q.eigenvalues()[0] >= -1e-10);
            let ones = Array1::<f64>::ones(n - 1);
            for v in q.mul_vec(ones.view()).iter() {
                assert_abs_diff_eq!(*v, 0.0, epsilon = 1e-10);
            }
        }
    }
}

#[test]
// Purpose
// -------
// Parameter moves reuse the extracted intervals; genealogy moves do not.
//
// Given
// -----
// - A random 6-tip tree; precision, lambda and γ updates, then a root move.
//
// Expect
// ------
// - One extraction through all parameter updates, a second after the root
//   height changes.
fn parameter_moves_do_not_reextract() {
    // Arrange
    let mut rng = StdRng::seed_from_u64(11);
    let loci = vec![random_tree(&mut rng, 6)];
    let mut lik = build(&loci, random_gamma(&mut rng, 5), SkyOptions::default());
    lik.log_likelihood().unwrap();

    // Act
    lik.set_precision(0.4).unwrap();
    lik.log_likelihood().unwrap();
    lik.set_lambda(0.3).unwrap();
    lik.log_likelihood().unwrap();
    lik.set_log_pop_sizes(random_gamma(&mut rng, 5).view()).unwrap();
    lik.log_likelihood().unwrap();
    let after_params = lik.extraction_count();
    let root = loci[0].1[4];
    lik.genealogy_mut(0).unwrap().set_internal_height(4, root + 0.2).unwrap();
    lik.log_likelihood().unwrap();

    // Assert
    assert_eq!(after_params, 1);
    assert_eq!(lik.extraction_count(), 2);
    assert_eq!(lik.cache_state(), CacheState::Clean);
}

#[test]
// Purpose
// -------
// A rejected proposal returns the exact pre-proposal state, whichever
// likelihood-owned parameter the proposal touched.
//
// Given
// -----
// - A random 7-tip tree with a sampling term and a regression whose second
//   column has missing values at both ends.
// - store, then change γ, τ, λ, β, one design value, the missing-value
//   precisions, the sampling coefficients and a node height; evaluate;
//   roll the height back (the caller's job) and restore.
//
// Expect
// ------
// - Restored log-likelihood, statistics, γ, regression and sampling terms
//   are bit-identical.
// - The base and scaled weight matrices are bit-identical.
fn store_mutate_restore_round_trip() {
    // Arrange
    let mut rng = StdRng::seed_from_u64(5);
    let loci = vec![random_tree(&mut rng, 7)];
    let design = Array2::from_shape_fn((6, 2), |(i, j)| if j == 0 { 1.0 } else { 0.3 * i as f64 });
    let regression = RegressionTerm::new(design, array![0.1, -0.2])
        .unwrap()
        .with_missing_block(MissingCovariateBlock {
            column: 1,
            first_observed: 1,
            last_observed: 4,
            precision_recent: 2.0,
            precision_distant: 0.5,
        })
        .unwrap();
    let mut lik = build(&loci, random_gamma(&mut rng, 6), SkyOptions::default())
        .with_regression(regression)
        .unwrap()
        .with_sampling(SamplingTerm::new(0.1, -0.5).unwrap());
    let before = lik.log_likelihood().unwrap();
    let stats_before = lik.sufficient_statistics().unwrap().clone();
    let weights_before = lik.weight_matrix().unwrap().clone();
    let scaled_before = lik.scaled_weight_matrix(1.7, 0.9).unwrap();
    let gamma_before = lik.params().log_pop_sizes.clone();
    let regression_before = lik.regression().cloned();
    let sampling_before = lik.sampling().copied();
    let root = loci[0].1[5];

    // Act
    lik.store_state();
    lik.set_log_pop_sizes(random_gamma(&mut rng, 6).view()).unwrap();
    lik.set_precision(5.0).unwrap();
    lik.set_lambda(0.3).unwrap();
    lik.set_beta(array![0.7, 0.4].view()).unwrap();
    lik.set_design_value(0, 1, 2.5).unwrap();
    lik.set_missing_precisions(1, 9.0, 3.0).unwrap();
    lik.set_sampling(-0.4, 1.2).unwrap();
    lik.genealogy_mut(0).unwrap().set_internal_height(5, root + 0.7).unwrap();
    let proposed = lik.log_likelihood().unwrap();
    lik.genealogy_mut(0).unwrap().set_internal_height(5, root).unwrap();
    lik.restore_state().unwrap();
    let after = lik.log_likelihood().unwrap();

    // Assert
    assert_ne!(proposed.to_bits(), before.to_bits());
    assert_eq!(after.to_bits(), before.to_bits());
    assert_eq!(lik.sufficient_statistics().unwrap(), &stats_before);
    assert_eq!(lik.params().log_pop_sizes, gamma_before);
    assert_eq!(lik.params().precision, 1.7);
    assert_eq!(lik.params().lambda, 0.9);
    assert_eq!(lik.regression().cloned(), regression_before);
    assert_eq!(lik.sampling().copied(), sampling_before);
    assert_bits_eq(lik.weight_matrix().unwrap(), &weights_before);
    assert_bits_eq(&lik.scaled_weight_matrix(1.7, 0.9).unwrap(), &scaled_before);
}

fn assert_bits_eq(got: &SymTridiagonal, want: &SymTridiagonal) {
    let bits = |m: &SymTridiagonal| -> Vec<u64> {
        m.diag().iter().chain(m.off_diag().iter()).map(|v| v.to_bits()).collect()
    };
    assert_eq!(bits(got), bits(want));
}

#[test]
// Purpose
// -------
// Analytic gradients agree with central differences on random states.
//
// Given
// -----
// - 5 random 6-tip trees with random γ, λ = 0.9, with a sampling term.
//
// Expect
// ------
// - Relative error ≤ 1e-4 for γ and precision.
fn analytic_gradients_match_finite_differences() {
    let mut rng = StdRng::seed_from_u64(17);
    for _ in 0..5 {
        // Arrange
        let loci = vec![random_tree(&mut rng, 6)];
        let mut lik = build(&loci, random_gamma(&mut rng, 5), SkyOptions::default())
            .with_sampling(SamplingTerm::new(-0.3, 0.8).unwrap());

        // Act
        let gamma_check = lik.check_gradient(GradientTarget::LogPopulationSizes).unwrap();
        let precision_check = lik.check_gradient(GradientTarget::Precision).unwrap();

        // Assert
        assert!(gamma_check.passes(1e-4), "γ: {gamma_check:?}");
        assert!(precision_check.passes(1e-4), "τ: {precision_check:?}");
    }
}

#[test]
// Purpose
// -------
// The piecewise-constant demographic built from γ reproduces the coalescent
// term through the generic parametric path.
//
// Given
// -----
// - A random 6-tip tree and random γ.
//
// Expect
// ------
// - `parametric_log_likelihood(population_size_function())` equals the
//   coalescent term.
fn piecewise_demographic_reproduces_coalescent_term() {
    // Arrange
    let mut rng = StdRng::seed_from_u64(23);
    let loci = vec![random_tree(&mut rng, 6)];
    let mut lik = build(&loci, random_gamma(&mut rng, 5), SkyOptions::default());

    // Act
    let demographic = lik.population_size_function().unwrap();
    let parametric = lik.parametric_log_likelihood(&demographic).unwrap();
    let terms = lik.term_values().unwrap();

    // Assert
    assert_relative_eq!(parametric, terms.coalescent, max_relative = 1e-10);
}

#[test]
// Purpose
// -------
// Fitting the field mode on a random tree increases the likelihood and
// lands on a stationary point with finite standard errors.
//
// Given
// -----
// - A random 8-tip tree, γ started at zero, tight tolerances.
//
// Expect
// ------
// - Gradient at the stored mode ≈ 0; log-likelihood did not decrease;
//   positive standard errors.
fn field_mode_fit_on_random_tree() {
    // Arrange
    init_tracing();
    let mut rng = StdRng::seed_from_u64(31);
    let loci = vec![random_tree(&mut rng, 8)];
    let mut lik = build(&loci, Array1::zeros(7), SkyOptions::default());
    let before = lik.log_likelihood().unwrap();
    let tols = Tolerances::new(Some(1e-8), None, Some(500)).unwrap();
    let opts = MLEOptions::new(tols, LineSearcher::MoreThuente, false, None).unwrap();

    // Act
    let mode = lik.fit_field_mode(&opts).unwrap();

    // Assert
    assert!(lik.log_likelihood().unwrap() >= before);
    let grad = lik.gradient_log_density(GradientTarget::LogPopulationSizes).unwrap();
    for g in grad.iter() {
        assert_abs_diff_eq!(*g, 0.0, epsilon = 1e-5);
    }
    assert!(mode.standard_errors.iter().all(|s| s.is_finite() && *s > 0.0));
}
