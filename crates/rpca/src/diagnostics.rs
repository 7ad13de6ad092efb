//! Hotelling's T², Q-residual (SPE), their confidence limits, the outlier
//! mask, and per-variable contributions (spec §4.5).

use rpca_core::Tensor;
use rpca_linalg::solve;

use crate::config::MetricsConfig;
use crate::error::{PcaError, PcaResult};
use crate::result::{PCAMetrics, PCAResult};
use crate::stats::{f_quantile, normal_quantile};

/// Per-sample Hotelling's T² against the score covariance. Degenerates to a
/// squared standardized score when `k == 1`; no special-casing needed since
/// the general k x k solve reduces to scalar division there.
pub fn hotelling_t2(scores: &Tensor<f64>) -> PcaResult<Vec<f64>> {
    let n = scores.shape().dim(0)?;
    let k = scores.shape().dim(1)?;

    let mean: Vec<f64> = (0..k)
        .map(|j| (0..n).map(|i| scores.get(&[i, j]).unwrap()).sum::<f64>() / n as f64)
        .collect();

    let mut cov = vec![0.0; k * k];
    for i in 0..n {
        for a in 0..k {
            let da = scores.get(&[i, a])? - mean[a];
            for b in 0..k {
                let db = scores.get(&[i, b])? - mean[b];
                cov[a * k + b] += da * db;
            }
        }
    }
    for v in cov.iter_mut() {
        *v /= n as f64 - 1.0;
    }
    for a in 0..k {
        if cov[a * k + a] < 1e-12 {
            return Err(PcaError::DegenerateVariance(format!(
                "component {} has ~zero score variance, T2 is undefined",
                a + 1
            )));
        }
    }
    let cov_tensor = Tensor::new(cov, vec![k, k])?;

    let mut t2 = vec![0.0; n];
    for i in 0..n {
        let diff: Vec<f64> = (0..k).map(|j| scores.get(&[i, j]).unwrap() - mean[j]).collect();
        let diff_tensor = Tensor::from_slice(&diff);
        let x = solve(&cov_tensor, &diff_tensor).map_err(|e| PcaError::NumericalFailure(e.to_string()))?;
        t2[i] = diff.iter().zip(x.data().iter()).map(|(a, b)| a * b).sum();
    }
    Ok(t2)
}

/// Per-sample squared reconstruction error against the retained components.
pub fn q_residual(x_preprocessed: &Tensor<f64>, scores: &Tensor<f64>, loadings: &Tensor<f64>) -> PcaResult<Vec<f64>> {
    let n = x_preprocessed.shape().dim(0)?;
    let m = x_preprocessed.shape().dim(1)?;
    let loadings_m = loadings.shape().dim(0)?;
    if loadings_m != m {
        return Err(PcaError::DimensionMismatch(format!(
            "data has {m} columns but loadings were fit on {loadings_m}"
        )));
    }
    let k = scores.shape().dim(1)?;

    let mut q = vec![0.0; n];
    for i in 0..n {
        let mut sse = 0.0;
        for j in 0..m {
            let mut recon = 0.0;
            for l in 0..k {
                recon += scores.get(&[i, l])? * loadings.get(&[j, l])?;
            }
            let diff = x_preprocessed.get(&[i, j])? - recon;
            sse += diff * diff;
        }
        q[i] = sse;
    }
    Ok(q)
}

/// Hotelling's T² confidence limit at `1 - alpha`, F-distribution based.
pub fn t2_limit(n: usize, k: usize, alpha: f64) -> PcaResult<f64> {
    if n <= k + 1 {
        return Ok(0.0);
    }
    let f = f_quantile(k as f64, (n - k) as f64, 1.0 - alpha)?;
    Ok((k as f64) * (n as f64 - 1.0) / (n as f64 - k as f64) * f)
}

/// Jackson-Mudholkar Q-residual confidence limit at `1 - alpha`, driven by
/// the eigenvalues of the components *not* retained.
pub fn q_limit(residual_eigenvalues: &[f64], alpha: f64) -> f64 {
    let theta1: f64 = residual_eigenvalues.iter().sum();
    if theta1.abs() < 1e-300 {
        return 0.0;
    }
    let theta2: f64 = residual_eigenvalues.iter().map(|v| v * v).sum();
    let theta3: f64 = residual_eigenvalues.iter().map(|v| v * v * v).sum();
    let h0 = 1.0 - (2.0 * theta1 * theta3) / (3.0 * theta2 * theta2);
    let z = normal_quantile(1.0 - alpha);
    let term = (z * (2.0 * theta2 * h0 * h0).sqrt()) / theta1 + 1.0 + (theta2 * h0 * (h0 - 1.0)) / (theta1 * theta1);
    theta1 * term.powf(1.0 / h0)
}

pub fn outlier_mask(t2: &[f64], t2_limit_99: f64) -> Vec<bool> {
    t2.iter().map(|&v| v > t2_limit_99).collect()
}

/// Per-variable contribution to each component: `P_jl^2 / sum_j' P_j'l^2`.
/// Empty (0x0) for kernel PCA, which has no loadings to attribute to.
pub fn contributions(loadings: &Tensor<f64>) -> PcaResult<Tensor<f64>> {
    if loadings.numel() == 0 {
        return Ok(Tensor::zeros(vec![0, 0]));
    }
    let m = loadings.shape().dim(0)?;
    let k = loadings.shape().dim(1)?;
    let mut out = vec![0.0; m * k];
    for l in 0..k {
        let sum: f64 = (0..m).map(|j| loadings.get(&[j, l]).unwrap().powi(2)).sum();
        for j in 0..m {
            let p = loadings.get(&[j, l])?;
            out[j * k + l] = if sum > 0.0 { p * p / sum } else { 0.0 };
        }
    }
    Tensor::new(out, vec![m, k]).map_err(Into::into)
}

/// Primary diagnostics entry point (spec §6): assembles T²/Q, their
/// confidence limits at the standard 95%/99% pair, the outlier mask at
/// `config.significance_level`, and per-variable contributions from a
/// fitted result plus the preprocessed data it was fit on.
pub fn diagnostics(result: &PCAResult, x_preprocessed: &Tensor<f64>, config: &MetricsConfig) -> PcaResult<PCAMetrics> {
    let n = result.scores.shape().dim(0)?;
    let k = result.components_computed;

    let t2 = hotelling_t2(&result.scores)?;
    let q = q_residual(x_preprocessed, &result.scores, &result.loadings)?;

    let mut warnings = Vec::new();
    if n <= k + 1 {
        warnings.push(format!(
            "sample count {n} is too small relative to the {k} retained components; T2 limit defined as 0.0"
        ));
    }

    let t2_limit_95 = t2_limit(n, k, 0.05)?;
    let t2_limit_99 = t2_limit(n, k, 0.01)?;

    let residual_eigenvalues: &[f64] =
        if result.all_eigenvalues.len() > k { &result.all_eigenvalues[k..] } else { &[] };
    let q_limit_95 = q_limit(residual_eigenvalues, 0.05);
    let q_limit_99 = q_limit(residual_eigenvalues, 0.01);

    let outlier_threshold = t2_limit(n, k, config.significance_level)?;
    let mask = outlier_mask(&t2, outlier_threshold);

    let contributions = contributions(&result.loadings)?;

    Ok(PCAMetrics {
        t2,
        q,
        outlier_mask: mask,
        t2_limit_95,
        t2_limit_99,
        q_limit_95,
        q_limit_99,
        contributions,
        warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn t2_is_nonnegative_and_zero_at_mean() {
        let scores: Tensor<f64> = Tensor::from_vec2d(&[
            vec![1.0, 0.5],
            vec![-1.0, -0.5],
            vec![2.0, 1.0],
            vec![-2.0, -1.0],
        ])
        .unwrap();
        let t2 = hotelling_t2(&scores).unwrap();
        assert!(t2.iter().all(|&v| v >= 0.0));
    }

    #[test]
    fn q_residual_zero_with_full_rank_reconstruction() {
        let x: Tensor<f64> = Tensor::from_vec2d(&[vec![1.0, 2.0], vec![3.0, 1.0], vec![2.0, 4.0]]).unwrap();
        let fit = crate::solver::svd::fit(&x, 2).unwrap();
        let q = q_residual(&x, &fit.scores, &fit.loadings).unwrap();
        for v in q {
            assert_relative_eq!(v, 0.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn q_limit_zero_when_no_residual_eigenvalues() {
        assert_eq!(q_limit(&[], 0.05), 0.0);
    }

    #[test]
    fn diagnostics_assembles_metrics_and_flags_small_sample_warning() {
        use crate::config::PCAConfig;
        use crate::engine::PCAEngine;

        let x: Tensor<f64> = Tensor::from_vec2d(&[vec![1.0, 2.0], vec![3.0, 1.0], vec![2.0, 4.0]]).unwrap();
        let mut engine = PCAEngine::new();
        let mut config = PCAConfig::new(2);
        config.mean_center = false;
        let result = engine.fit(&x, config).unwrap();

        let metrics = diagnostics(&result, &x, &MetricsConfig::default()).unwrap();
        assert_eq!(metrics.t2.len(), 3);
        assert_eq!(metrics.q.len(), 3);
        assert_eq!(metrics.outlier_mask.len(), 3);
        // n=3, k=2: n <= k+1, so the T2 limits are the spec's zero sentinel
        // and a warning must be emitted.
        assert_eq!(metrics.t2_limit_95, 0.0);
        assert_eq!(metrics.t2_limit_99, 0.0);
        assert!(!metrics.warnings.is_empty());
    }

    /// spec property: raising the significance level (more lenient test)
    /// never shrinks the flagged-outlier set, since the T2 limit it drives
    /// only gets smaller.
    #[test]
    fn outlier_mask_is_monotonic_in_significance_level() {
        let n = 100;
        let mut rows = Vec::with_capacity(n);
        for i in 0..n {
            let t = i as f64;
            rows.push(vec![(t * 0.618).sin(), (t * 0.417).cos(), (t * 0.233).sin() * 0.5]);
        }
        let x = Tensor::from_vec2d(&rows).unwrap();
        let fit = crate::solver::svd::fit(&x, 3).unwrap();
        let t2 = hotelling_t2(&fit.scores).unwrap();

        let strict_limit = t2_limit(n, 3, 0.01).unwrap();
        let lenient_limit = t2_limit(n, 3, 0.10).unwrap();
        assert!(lenient_limit <= strict_limit);

        let strict_mask = outlier_mask(&t2, strict_limit);
        let lenient_mask = outlier_mask(&t2, lenient_limit);
        for i in 0..n {
            assert!(
                !strict_mask[i] || lenient_mask[i],
                "sample {i} flagged at alpha=0.01 but not at the more lenient alpha=0.10"
            );
        }
    }

    #[test]
    fn contributions_are_empty_for_kernel_loadings() {
        let empty = Tensor::zeros(vec![0, 0]);
        let c = contributions(&empty).unwrap();
        assert_eq!(c.numel(), 0);
    }

    #[test]
    fn contributions_sum_to_one_per_component() {
        let loadings: Tensor<f64> = Tensor::from_vec2d(&[vec![0.6, 0.0], vec![0.8, 1.0]]).unwrap();
        let c = contributions(&loadings).unwrap();
        for l in 0..2 {
            let sum: f64 = (0..2).map(|j| c.get(&[j, l]).unwrap()).sum();
            assert_relative_eq!(sum, 1.0, epsilon = 1e-9);
        }
    }
}
