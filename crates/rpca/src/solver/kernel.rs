//! Kernel PCA (spec §4.4): eigendecompose the centered Gram matrix instead
//! of the data matrix itself, so nonlinear structure captured by the kernel
//! shows up as linear structure in feature space.

use rpca_core::Tensor;
use rpca_linalg::eigen::eigh;

use crate::config::{KernelParams, KernelType};
use crate::error::{PcaError, PcaResult};

const EIGENVALUE_FLOOR: f64 = 1e-10;

/// Training-time state a kernel fit needs to keep around to project new
/// samples later (`transform`).
pub struct KernelFit {
    pub scores: Tensor<f64>,
    pub eigenvalues: Vec<f64>,
    pub all_eigenvalues: Vec<f64>,
    pub components_computed: usize,
    train_x: Tensor<f64>,
    eigenvectors: Tensor<f64>,
    col_means: Vec<f64>,
    grand_mean: f64,
    kernel: KernelParams,
}

fn resolve_gamma(kernel: &KernelParams, m: usize) -> f64 {
    if kernel.gamma > 0.0 {
        kernel.gamma
    } else {
        1.0 / m as f64
    }
}

fn kernel_value(kernel: &KernelParams, gamma: f64, x: &[f64], y: &[f64]) -> f64 {
    match kernel.kernel_type {
        KernelType::Linear => x.iter().zip(y).map(|(a, b)| a * b).sum(),
        KernelType::Rbf => {
            let sq_dist: f64 = x.iter().zip(y).map(|(a, b)| (a - b).powi(2)).sum();
            (-gamma * sq_dist).exp()
        }
        KernelType::Poly => {
            let dot: f64 = x.iter().zip(y).map(|(a, b)| a * b).sum();
            (gamma * dot + kernel.coef0).powi(kernel.degree)
        }
    }
}

fn gram_matrix(kernel: &KernelParams, gamma: f64, a: &Tensor<f64>, b: &Tensor<f64>) -> PcaResult<Vec<f64>> {
    let na = a.shape().dim(0)?;
    let nb = b.shape().dim(0)?;
    let a_data = a.data();
    let b_data = b.data();
    let m = a.shape().dim(1)?;
    let mut out = vec![0.0; na * nb];
    for i in 0..na {
        let ai = &a_data[i * m..(i + 1) * m];
        for j in 0..nb {
            let bj = &b_data[j * m..(j + 1) * m];
            out[i * nb + j] = kernel_value(kernel, gamma, ai, bj);
        }
    }
    Ok(out)
}

pub fn fit(x: &Tensor<f64>, k_requested: usize, kernel: &KernelParams) -> PcaResult<KernelFit> {
    let n = x.shape().dim(0)?;
    let m = x.shape().dim(1)?;
    if n > kernel.max_samples {
        return Err(PcaError::KernelMemoryLimit {
            n,
            cap: kernel.max_samples,
        });
    }
    if kernel.kernel_type == KernelType::Poly && kernel.degree < 1 {
        return Err(PcaError::KernelConfig(format!(
            "polynomial degree must be >= 1, got {}",
            kernel.degree
        )));
    }

    let gamma = resolve_gamma(kernel, m);
    let gram = gram_matrix(kernel, gamma, x, x)?;

    let col_means: Vec<f64> = (0..n).map(|j| (0..n).map(|i| gram[i * n + j]).sum::<f64>() / n as f64).collect();
    let grand_mean = col_means.iter().sum::<f64>() / n as f64;

    let mut gram_c = vec![0.0; n * n];
    for i in 0..n {
        for j in 0..n {
            gram_c[i * n + j] = gram[i * n + j] - col_means[i] - col_means[j] + grand_mean;
        }
    }
    let gram_c_tensor = Tensor::new(gram_c, vec![n, n])?;

    let (raw_eigenvalues, eigenvectors) = eigh(&gram_c_tensor)?;
    let floored: Vec<f64> = raw_eigenvalues.iter().map(|v| v.max(EIGENVALUE_FLOOR)).collect();

    let k = k_requested.min(n);
    let eigenvalues = floored[..k].to_vec();

    let mut t_data = vec![0.0; n * k];
    for i in 0..n {
        for l in 0..k {
            t_data[i * k + l] = eigenvectors.get(&[i, l])? / eigenvalues[l].sqrt();
        }
    }
    let scores = Tensor::new(t_data, vec![n, k])?;

    Ok(KernelFit {
        scores,
        eigenvalues,
        all_eigenvalues: floored,
        components_computed: k,
        train_x: x.clone(),
        eigenvectors,
        col_means,
        grand_mean,
        kernel: *kernel,
    })
}

/// Project new samples into the components of an existing kernel fit
/// (spec §4.4, transform-time centering).
pub fn transform(fit: &KernelFit, x_test: &Tensor<f64>) -> PcaResult<Tensor<f64>> {
    let n_train = fit.train_x.shape().dim(0)?;
    let n_test = x_test.shape().dim(0)?;
    let m_fit = fit.train_x.shape().dim(1)?;
    let m_test = x_test.shape().dim(1)?;
    if m_fit != m_test {
        return Err(PcaError::DimensionMismatch(format!(
            "kernel PCA was fit on {m_fit} features, got {m_test}"
        )));
    }

    let gamma = resolve_gamma(&fit.kernel, m_fit);
    let k_test = gram_matrix(&fit.kernel, gamma, x_test, &fit.train_x)?;

    let k = fit.components_computed;
    let mut t_data = vec![0.0; n_test * k];
    for i in 0..n_test {
        let row_mean: f64 = (0..n_train).map(|j| k_test[i * n_train + j]).sum::<f64>() / n_train as f64;
        for l in 0..k {
            let mut proj = 0.0;
            for j in 0..n_train {
                let centered = k_test[i * n_train + j] - row_mean - fit.col_means[j] + fit.grand_mean;
                proj += centered * fit.eigenvectors.get(&[j, l])?;
            }
            t_data[i * k + l] = proj / fit.eigenvalues[l].sqrt();
        }
    }
    Tensor::new(t_data, vec![n_test, k]).map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn toy() -> Tensor<f64> {
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
    fn linear_kernel_has_no_nan_and_right_shape() {
        let x = toy();
        let kernel = KernelParams {
            kernel_type: KernelType::Linear,
            ..KernelParams::default()
        };
        let result = fit(&x, 2, &kernel).unwrap();
        assert_eq!(result.components_computed, 2);
        assert!(!result.scores.has_nan());
    }

    #[test]
    fn rejects_above_sample_cap() {
        let x = toy();
        let kernel = KernelParams {
            max_samples: 3,
            ..KernelParams::default()
        };
        assert!(matches!(fit(&x, 2, &kernel), Err(PcaError::KernelMemoryLimit { .. })));
    }

    #[test]
    fn rbf_kernel_eigenvalues_descending() {
        let x = toy();
        let kernel = KernelParams {
            kernel_type: KernelType::Rbf,
            gamma: 0.5,
            ..KernelParams::default()
        };
        let result = fit(&x, 3, &kernel).unwrap();
        for w in result.eigenvalues.windows(2) {
            assert!(w[0] >= w[1] - 1e-9);
        }
    }

    #[test]
    fn transform_reproduces_training_scores_for_training_points() {
        let x = toy();
        let kernel = KernelParams {
            kernel_type: KernelType::Linear,
            ..KernelParams::default()
        };
        let result = fit(&x, 2, &kernel).unwrap();
        let projected = transform(&result, &x).unwrap();
        for i in 0..x.shape().dim(0).unwrap() {
            for l in 0..2 {
                assert_relative_eq!(
                    result.scores.get(&[i, l]).unwrap(),
                    projected.get(&[i, l]).unwrap(),
                    epsilon = 1e-6
                );
            }
        }
    }
}
