//! NIPALS with native missing-data support (spec §4.3.3): NaN entries stay
//! in the working matrix and are excluded pairwise from every inner product
//! instead of being imputed upfront. Operates directly on raw input; the
//! caller's preprocessing pipeline is bypassed (it cannot run through
//! NaN-bearing columns), so optional mean-centering is handled inline here.

use rpca_core::Tensor;

use crate::error::{PcaError, PcaResult};
use crate::solver::LinearFit;

const EPS: f64 = 1e-8;
const MAX_ITER: usize = 1000;
const DENOM_FLOOR: f64 = 1e-300;

fn valid_column_variance(work: &[f64], n: usize, m: usize, j: usize) -> Option<f64> {
    let vals: Vec<f64> = (0..n).map(|i| work[i * m + j]).filter(|v| !v.is_nan()).collect();
    if vals.is_empty() {
        return None;
    }
    let mean = vals.iter().sum::<f64>() / vals.len() as f64;
    Some(vals.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / vals.len() as f64)
}

fn column_mean(work: &[f64], n: usize, m: usize, j: usize) -> f64 {
    let vals: Vec<f64> = (0..n).map(|i| work[i * m + j]).filter(|v| !v.is_nan()).collect();
    if vals.is_empty() {
        0.0
    } else {
        vals.iter().sum::<f64>() / vals.len() as f64
    }
}

/// `mean_center`: whether to subtract each column's mean (computed over its
/// non-NaN entries) before extracting components.
pub fn fit(x_raw: &Tensor<f64>, k_requested: usize, mean_center: bool) -> PcaResult<LinearFit> {
    let n = x_raw.shape().dim(0)?;
    let m = x_raw.shape().dim(1)?;
    let mut work = x_raw.data().to_vec();

    if mean_center {
        for j in 0..m {
            let mean = column_mean(&work, n, m, j);
            for i in 0..n {
                let idx = i * m + j;
                if !work[idx].is_nan() {
                    work[idx] -= mean;
                }
            }
        }
    }

    let mut scores_cols: Vec<Vec<f64>> = Vec::new();
    let mut loadings_cols: Vec<Vec<f64>> = Vec::new();
    let mut eigenvalues = Vec::new();

    for comp in 0..k_requested {
        let mut best_col = 0;
        let mut best_var = -1.0;
        for j in 0..m {
            if let Some(var) = valid_column_variance(&work, n, m, j) {
                if var > best_var {
                    best_var = var;
                    best_col = j;
                }
            }
        }
        if best_var < EPS {
            break;
        }

        let seed_mean = column_mean(&work, n, m, best_col);
        let mut t: Vec<f64> = (0..n)
            .map(|i| {
                let v = work[i * m + best_col];
                if v.is_nan() {
                    seed_mean
                } else {
                    v
                }
            })
            .collect();
        let mut p = vec![0.0; m];
        let mut converged = false;

        for _ in 0..MAX_ITER {
            let t_prev = t.clone();

            for j in 0..m {
                let mut num = 0.0;
                let mut den = 0.0;
                for i in 0..n {
                    let v = work[i * m + j];
                    if !v.is_nan() {
                        num += v * t[i];
                        den += t[i] * t[i];
                    }
                }
                p[j] = if den.abs() > DENOM_FLOOR { num / den } else { 0.0 };
            }
            let p_norm = p.iter().map(|v| v * v).sum::<f64>().sqrt();
            if p_norm < EPS {
                return Err(PcaError::DegenerateVariance(format!(
                    "loading vector collapsed to zero norm at component {}",
                    comp + 1
                )));
            }
            for v in p.iter_mut() {
                *v /= p_norm;
            }

            for i in 0..n {
                let mut num = 0.0;
                let mut den = 0.0;
                for j in 0..m {
                    let v = work[i * m + j];
                    if !v.is_nan() {
                        num += v * p[j];
                        den += p[j] * p[j];
                    }
                }
                if den.abs() > DENOM_FLOOR {
                    t[i] = num / den;
                }
            }

            let diff = t
                .iter()
                .zip(t_prev.iter())
                .map(|(a, b)| (a - b).powi(2))
                .sum::<f64>()
                .sqrt();
            if diff < EPS {
                converged = true;
                break;
            }
        }
        if !converged {
            return Err(PcaError::ConvergenceFailure {
                component: comp + 1,
                max_iter: MAX_ITER,
            });
        }

        for i in 0..n {
            for j in 0..m {
                let idx = i * m + j;
                if !work[idx].is_nan() {
                    work[idx] -= t[i] * p[j];
                }
            }
        }
        let lambda = t.iter().map(|v| v * v).sum::<f64>() / (n as f64 - 1.0);
        eigenvalues.push(lambda);
        scores_cols.push(t);
        loadings_cols.push(p);
    }

    let k = scores_cols.len();

    let mut t_data = vec![0.0; n * k];
    for (j, col) in scores_cols.iter().enumerate() {
        for i in 0..n {
            t_data[i * k + j] = col[i];
        }
    }
    let scores = Tensor::new(t_data, vec![n, k])?;

    let mut p_data = vec![0.0; m * k];
    for (j, col) in loadings_cols.iter().enumerate() {
        for i in 0..m {
            p_data[i * k + j] = col[i];
        }
    }
    let loadings = Tensor::new(p_data, vec![m, k])?;

    Ok(LinearFit {
        scores,
        loadings,
        eigenvalues: eigenvalues.clone(),
        // Total variance is undefined with missing data (spec §4.3.3); the
        // "full spectrum" is just the retained eigenvalues.
        all_eigenvalues: eigenvalues,
        components_computed: k,
        incomplete_data: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toy_with_missing() -> Tensor<f64> {
        let mut x = Tensor::from_vec2d(&[
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
        .unwrap();
        x.set(&[1, 0], f64::NAN).unwrap();
        x.set(&[7, 1], f64::NAN).unwrap();
        x
    }

    #[test]
    fn fits_with_missing_entries_and_no_nan_contamination() {
        let x = toy_with_missing();
        let result = fit(&x, 2, true).unwrap();
        assert_eq!(result.components_computed, 2);
        assert!(!result.scores.has_nan());
        assert!(!result.loadings.has_nan());
        assert!(result.incomplete_data);
    }

    #[test]
    fn loadings_are_orthonormal() {
        let x = toy_with_missing();
        let result = fit(&x, 2, true).unwrap();
        let m = result.loadings.shape().dim(0).unwrap();
        for a in 0..result.components_computed {
            let norm_sq: f64 = (0..m).map(|j| result.loadings.get(&[j, a]).unwrap().powi(2)).sum();
            assert!((norm_sq - 1.0).abs() < 1e-6, "loading {a} not unit norm: {norm_sq}");
        }
    }
}
