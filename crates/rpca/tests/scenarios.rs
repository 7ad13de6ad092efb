//! Cross-module end-to-end scenarios exercising the full fit -> diagnostics
//! -> ellipse / eigencorrelation pipeline, not just a single solver.

use std::collections::HashMap;

use rpca_core::Tensor;
use rpca::config::{KernelParams, KernelType, Method, MissingStrategy, PCAConfig};
use rpca::diagnostics::{hotelling_t2, outlier_mask, q_limit, t2_limit};
use rpca::eigencorrelation::eigencorrelations;
use rpca::engine::PCAEngine;
use rpca::result::CorrelationMethod;

fn toy_centered_2d() -> Tensor<f64> {
    Tensor::from_vec2d(&[
        vec![2.5, 2.4],
        vec![0.5, 0.7],
        vec![2.2, 2.9],
        vec![1.9, 2.2],
        vec![3.1, 3.0],
        vec![2.3, 2.7],
        vec![2.0, 1.6],
        vec![1.0, 1.1],
        vec![1.5, 1.6],
        vec![1.1, 0.9],
    ])
    .unwrap()
}

/// S1: tiny 2D centered data, SVD. PC1 should explain the vast majority of
/// variance and the dominant loading should match the textbook direction up
/// to sign.
#[test]
fn s1_tiny_2d_svd_dominant_component() {
    let x = toy_centered_2d();
    let mut engine = PCAEngine::new();
    let config = PCAConfig::new(2);
    let result = engine.fit(&x, config).unwrap();

    assert!(result.explained_variance_ratio[0] > 90.0);
    assert!((result.cumulative_variance[1] - 100.0).abs() < 1e-6);

    let l0 = result.loadings.get(&[0, 0]).unwrap().abs();
    let l1 = result.loadings.get(&[1, 0]).unwrap().abs();
    assert!((l0 - 0.6779).abs() < 0.01);
    assert!((l1 - 0.7352).abs() < 0.01);
}

/// S2: a constant column should be flagged by the query helper, not block
/// the fit, and should carry zero contribution to every component.
#[test]
fn s2_constant_column_detected_and_zero_contribution() {
    let x: Tensor<f64> = Tensor::from_vec2d(&[
        vec![1.0, 5.0, 3.0],
        vec![2.0, 5.0, 1.0],
        vec![3.0, 5.0, 4.0],
        vec![4.0, 5.0, 9.0],
    ])
    .unwrap();

    let constant = PCAEngine::constant_columns(&x);
    assert_eq!(constant, vec![1]);

    let mut engine = PCAEngine::new();
    let mut config = PCAConfig::new(2);
    config.mean_center = true;
    let result = engine.fit(&x, config).unwrap();

    let contributions = rpca::diagnostics::contributions(&result.loadings).unwrap();
    for l in 0..result.components_computed {
        assert!(contributions.get(&[1, l]).unwrap().abs() < 1e-9);
    }
}

/// S3: NIPALS with native missing-data handling on a matrix with scattered
/// NaNs. Scores/loadings must stay NaN-free and orthonormal.
#[test]
fn s3_nipals_native_missing_data() {
    let mut x = Tensor::from_vec2d(&[
        vec![1.0, 2.0, 3.0, 4.0, 5.0],
        vec![2.0, 3.0, 1.0, 5.0, 4.0],
        vec![3.0, 1.0, 2.0, 4.0, 5.0],
        vec![4.0, 5.0, 4.0, 1.0, 2.0],
        vec![5.0, 4.0, 5.0, 2.0, 1.0],
        vec![1.0, 2.0, 4.0, 5.0, 3.0],
    ])
    .unwrap();
    x.set(&[0, 2], f64::NAN).unwrap();
    x.set(&[2, 4], f64::NAN).unwrap();
    x.set(&[4, 0], f64::NAN).unwrap();

    let mut engine = PCAEngine::new();
    let mut config = PCAConfig::new(3);
    config.method = Method::Nipals;
    config.missing_strategy = MissingStrategy::Native;
    let result = engine.fit(&x, config).unwrap();

    assert!(!result.scores.has_nan());
    assert!(!result.loadings.has_nan());
    assert!(result.incomplete_data);

    let m = result.loadings.shape().dim(0).unwrap();
    for l in 0..result.components_computed {
        let norm_sq: f64 = (0..m).map(|j| result.loadings.get(&[j, l]).unwrap().powi(2)).sum();
        assert!((norm_sq - 1.0).abs() < 1e-6, "component {l} loading not orthonormal: {norm_sq}");
    }
    assert!(result.explained_variance_ratio.iter().sum::<f64>() > 0.0);
}

/// S4: kernel RBF PCA on two concentric rings should separate them along
/// an early component far more than the within-ring spread.
#[test]
fn s4_kernel_rbf_separates_concentric_rings() {
    let mut rows = Vec::new();
    let n_per_ring = 20;
    for i in 0..n_per_ring {
        let theta = 2.0 * std::f64::consts::PI * i as f64 / n_per_ring as f64;
        rows.push(vec![theta.cos(), theta.sin()]); // inner ring, radius 1
    }
    for i in 0..n_per_ring {
        let theta = 2.0 * std::f64::consts::PI * i as f64 / n_per_ring as f64;
        rows.push(vec![3.0 * theta.cos(), 3.0 * theta.sin()]); // outer ring, radius 3
    }
    let x = Tensor::from_vec2d(&rows).unwrap();

    let mut engine = PCAEngine::new();
    let mut config = PCAConfig::new(2);
    config.method = Method::Kernel;
    config.kernel = KernelParams {
        kernel_type: KernelType::Rbf,
        gamma: 1.0,
        ..KernelParams::default()
    };
    let result = engine.fit(&x, config).unwrap();

    let pc1_inner: Vec<f64> = (0..n_per_ring).map(|i| result.scores.get(&[i, 0]).unwrap()).collect();
    let pc1_outer: Vec<f64> = (n_per_ring..2 * n_per_ring).map(|i| result.scores.get(&[i, 0]).unwrap()).collect();

    let mean = |v: &[f64]| v.iter().sum::<f64>() / v.len() as f64;
    let std = |v: &[f64], m: f64| (v.iter().map(|x| (x - m).powi(2)).sum::<f64>() / v.len() as f64).sqrt();

    let mean_inner = mean(&pc1_inner);
    let mean_outer = mean(&pc1_outer);
    let std_inner = std(&pc1_inner, mean_inner).max(1e-9);

    assert!(
        (mean_inner - mean_outer).abs() > 5.0 * std_inner,
        "rings not separated: inner mean {mean_inner}, outer mean {mean_outer}, inner std {std_inner}"
    );
}

/// S5: T²/Q confidence limits on synthetic data with an injected outlier.
#[test]
fn s5_t2_q_limits_flag_injected_outlier() {
    let n = 100;
    let mut rows = Vec::with_capacity(n);
    for i in 0..n {
        let t = i as f64;
        rows.push(vec![
            (t * 0.618).sin(),
            (t * 0.417).cos(),
            (t * 0.233).sin() * 0.5,
        ]);
    }
    let mut x = Tensor::from_vec2d(&rows).unwrap();

    let mut engine = PCAEngine::new();
    let config = PCAConfig::new(3);
    let result = engine.fit(&x, config).unwrap();

    let t2_limit_95 = t2_limit(n, 3, 0.05).unwrap();
    let expected = 3.0 * 99.0 / 97.0 * 2.70; // rough F(3,97;0.95) ballpark
    assert!(t2_limit_95 > 0.0);
    assert!((t2_limit_95 - expected).abs() < 3.0, "T2 limit {t2_limit_95} far from expectation");

    let t2_limit_99 = t2_limit(n, 3, 0.01).unwrap();
    assert!(t2_limit_99 > t2_limit_95);

    let t2 = hotelling_t2(&result.scores).unwrap();
    let mask_before = outlier_mask(&t2, t2_limit_99);
    assert!(!mask_before.iter().any(|&v| v), "no outliers expected before injection");

    // Inject an outlier at ~5 sigma along PC1 for sample 0 and refit.
    let std_pc1 = {
        let mean: f64 = (0..n).map(|i| result.scores.get(&[i, 0]).unwrap()).sum::<f64>() / n as f64;
        (result.scores.data().iter().enumerate().filter(|(i, _)| i % 3 == 0).map(|(_, v)| (v - mean).powi(2)).sum::<f64>()
            / n as f64)
            .sqrt()
    };
    x.set(&[0, 0], x.get(&[0, 0]).unwrap() + 5.0 * std_pc1.max(1.0)).unwrap();

    let mut engine2 = PCAEngine::new();
    let config2 = PCAConfig::new(3);
    let result2 = engine2.fit(&x, config2).unwrap();
    let t2_2 = hotelling_t2(&result2.scores).unwrap();
    let residual: Vec<f64> = result2.all_eigenvalues[result2.components_computed..].to_vec();
    let q99 = q_limit(&residual, 0.01);
    let mask_after = outlier_mask(&t2_2, t2_limit(n, 3, 0.01).unwrap());
    assert!(mask_after[0], "injected outlier not flagged by T2 mask");
    assert!(q99 >= 0.0);
}

/// S6: eigencorrelation sorts variables by PC1 correlation, descending.
#[test]
fn s6_eigencorrelation_sorts_by_pc1_descending() {
    let scores: Tensor<f64> = Tensor::from_vec2d(&(1..=10).map(|i| vec![i as f64]).collect::<Vec<_>>()).unwrap();
    let mut numeric = HashMap::new();
    numeric.insert("v1".to_string(), (1..=10).map(|i| i as f64).collect());
    numeric.insert("v2".to_string(), (1..=10).rev().map(|i| i as f64).collect());

    let result = eigencorrelations(&scores, &[0], &numeric, &HashMap::new(), CorrelationMethod::Pearson).unwrap();

    assert_eq!(result.variables, vec!["v1".to_string(), "v2".to_string()]);
    assert!((result.correlations["v1"][0] - 1.0).abs() < 1e-6);
    assert!((result.correlations["v2"][0] + 1.0).abs() < 1e-6);
    assert!(result.p_values["v1"][0] < 1e-6);
    assert!(result.p_values["v2"][0] < 1e-6);
}
