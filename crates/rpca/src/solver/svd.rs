//! Classical linear PCA via SVD (spec §4.3.1): `X = U S V^T`, scores `T = U
//! S`, loadings `= V`. Operates on already-preprocessed data.

use rpca_core::Tensor;
use rpca_linalg::svd;

use crate::error::PcaResult;
use crate::solver::LinearFit;

const SINGULAR_VALUE_TOL: f64 = 1e-10;

pub fn fit(x: &Tensor<f64>, k_requested: usize) -> PcaResult<LinearFit> {
    let n = x.shape().dim(0)?;
    let m = x.shape().dim(1)?;

    let (u, sigma, v) = svd(x)?;
    let full_k = sigma.numel();

    let available = sigma.data().iter().filter(|s| **s > SINGULAR_VALUE_TOL).count();
    let k = k_requested.min(available);

    let denom = (n as f64 - 1.0).max(1.0);
    let all_eigenvalues: Vec<f64> = sigma.data().iter().map(|s| (s * s) / denom).collect();
    let eigenvalues = all_eigenvalues[..k].to_vec();

    let mut t_data = vec![0.0; n * k];
    for i in 0..n {
        for j in 0..k {
            t_data[i * k + j] = u.data()[i * full_k + j] * sigma.data()[j];
        }
    }
    let scores = Tensor::new(t_data, vec![n, k])?;

    let mut p_data = vec![0.0; m * k];
    for i in 0..m {
        for j in 0..k {
            p_data[i * k + j] = v.data()[i * full_k + j];
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

    #[test]
    fn scores_orthogonal_and_loadings_orthonormal() {
        let x: Tensor<f64> = Tensor::from_vec2d(&[
            vec![1.0, 2.0, 3.0],
            vec![4.0, 1.0, 0.0],
            vec![2.0, 5.0, 1.0],
            vec![0.0, 3.0, 4.0],
        ])
        .unwrap();
        let fit = fit(&x, 2).unwrap();
        assert_eq!(fit.components_computed, 2);

        let n = x.shape().dim(0).unwrap();
        let k = fit.components_computed;
        for a in 0..k {
            for b in (a + 1)..k {
                let dot: f64 = (0..n).map(|i| fit.scores.get(&[i, a]).unwrap() * fit.scores.get(&[i, b]).unwrap()).sum();
                assert!(dot.abs() < 1e-6, "scores not orthogonal: {dot}");
            }
        }
        let m = x.shape().dim(1).unwrap();
        for a in 0..k {
            let norm_sq: f64 = (0..m).map(|j| fit.loadings.get(&[j, a]).unwrap().powi(2)).sum();
            assert!((norm_sq - 1.0).abs() < 1e-6, "loading not unit norm: {norm_sq}");
        }
    }

    #[test]
    fn truncates_k_to_rank() {
        // Rank-1 matrix: requesting 2 components should yield only 1.
        let x: Tensor<f64> = Tensor::from_vec2d(&[vec![1.0, 2.0], vec![2.0, 4.0], vec![3.0, 6.0]]).unwrap();
        let fit = fit(&x, 2).unwrap();
        assert_eq!(fit.components_computed, 1);
    }
}
