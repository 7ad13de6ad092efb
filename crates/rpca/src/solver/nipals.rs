//! NIPALS power-iteration PCA on complete (NaN-free) data (spec §4.3.2).

use rpca_core::Tensor;

use crate::error::{PcaError, PcaResult};
use crate::solver::LinearFit;

const EPS: f64 = 1e-8;
const MAX_ITER: usize = 1000;

fn column_variance(work: &[f64], n: usize, m: usize, j: usize) -> f64 {
    let mean: f64 = (0..n).map(|i| work[i * m + j]).sum::<f64>() / n as f64;
    (0..n).map(|i| (work[i * m + j] - mean).powi(2)).sum::<f64>() / n as f64
}

pub fn fit(x: &Tensor<f64>, k_requested: usize) -> PcaResult<LinearFit> {
    let n = x.shape().dim(0)?;
    let m = x.shape().dim(1)?;
    let mut work = x.data().to_vec();

    let mut scores_cols: Vec<Vec<f64>> = Vec::new();
    let mut loadings_cols: Vec<Vec<f64>> = Vec::new();
    let mut eigenvalues = Vec::new();

    for comp in 0..k_requested {
        let mut best_col = 0;
        let mut best_var = -1.0;
        for j in 0..m {
            let var = column_variance(&work, n, m, j);
            if var > best_var {
                best_var = var;
                best_col = j;
            }
        }
        if best_var < EPS {
            break;
        }

        let mut t: Vec<f64> = (0..n).map(|i| work[i * m + best_col]).collect();
        let mut p = vec![0.0; m];
        let mut converged = false;

        for _ in 0..MAX_ITER {
            let t_prev = t.clone();
            let tt: f64 = t.iter().map(|v| v * v).sum();
            if tt < EPS {
                return Err(PcaError::DegenerateVariance(format!(
                    "score vector collapsed to zero variance at component {}",
                    comp + 1
                )));
            }
            for j in 0..m {
                let mut s = 0.0;
                for i in 0..n {
                    s += work[i * m + j] * t[i];
                }
                p[j] = s / tt;
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
            let pp: f64 = p.iter().map(|v| v * v).sum();
            for i in 0..n {
                let mut s = 0.0;
                for j in 0..m {
                    s += work[i * m + j] * p[j];
                }
                t[i] = s / pp;
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
                work[i * m + j] -= t[i] * p[j];
            }
        }
        let lambda = t.iter().map(|v| v * v).sum::<f64>() / (n as f64 - 1.0);
        eigenvalues.push(lambda);
        scores_cols.push(t);
        loadings_cols.push(p);
    }

    let k = scores_cols.len();
    let mut all_eigenvalues = eigenvalues.clone();
    if k < m {
        let residual_frob_sq: f64 = work.iter().map(|v| v * v).sum();
        let pool = residual_frob_sq / ((n as f64 - 1.0) * (m - k) as f64);
        for _ in k..m {
            all_eigenvalues.push(pool);
        }
    }

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
        eigenvalues,
        all_eigenvalues,
        components_computed: k,
        incomplete_data: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn toy() -> Tensor<f64> {
        // Centered version of the spec's toy dataset.
        Tensor::from_vec2d(&[
            vec![0.69, 0.49],
            vec![-1.31, -1.21],
            vec![0.39, 0.99],
            vec![0.09, 0.29],
            vec![1.29, 1.09],
            vec![0.49, 0.79],
            vec![0.19, -0.31],
            vec![-0.81, -0.81],
            vec![-0.31, -0.31],
            vec![-0.71, -1.01],
        ])
        .unwrap()
    }

    #[test]
    fn matches_svd_eigenvalues_on_complete_data() {
        let x = toy();
        let nipals_fit = fit(&x, 2).unwrap();
        let svd_fit = crate::solver::svd::fit(&x, 2).unwrap();
        for (a, b) in nipals_fit.eigenvalues.iter().zip(svd_fit.eigenvalues.iter()) {
            assert_relative_eq!(a, b, epsilon = 1e-6);
        }
    }

    #[test]
    fn loadings_are_orthonormal() {
        let x = toy();
        let result = fit(&x, 2).unwrap();
        let m = result.loadings.shape().dim(0).unwrap();
        let k = result.components_computed;
        for a in 0..k {
            let norm_sq: f64 = (0..m).map(|j| result.loadings.get(&[j, a]).unwrap().powi(2)).sum();
            assert_relative_eq!(norm_sq, 1.0, epsilon = 1e-6);
        }
    }
}
