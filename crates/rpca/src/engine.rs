//! Orchestrator (spec §4.7): dispatches `fit`/`transform` to the solver
//! named by `PCAConfig::method`, and models "has this been fit yet" as a sum
//! type rather than a scattered `fitted: bool` flag plus optional fields.

use rpca_core::Tensor;
use rpca_preprocessing::{check_constant_columns, FittedPreprocessor};

use crate::config::{Method, MissingStrategy, PCAConfig};
use crate::error::{PcaError, PcaResult};
use crate::result::{component_labels, PCAResult};
use crate::solver::{kernel, nipals, nipals_missing, svd, LinearFit};
use crate::validator::validate;

/// A preprocessor only exists when the fit path actually ran one; NIPALS
/// with native missing-data handling centers internally and kernel PCA
/// centers via the Gram matrix, so neither attaches a `FittedPreprocessor`.
enum Preprocessing {
    None,
    Linear(FittedPreprocessor),
}

struct FittedState {
    config: PCAConfig,
    preprocessing: Preprocessing,
    result: PCAResult,
    kernel_fit: Option<kernel::KernelFit>,
}

enum EngineState {
    Unfit,
    Fitted(FittedState),
}

pub struct PCAEngine {
    state: EngineState,
}

impl Default for PCAEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl PCAEngine {
    pub fn new() -> Self {
        PCAEngine { state: EngineState::Unfit }
    }

    pub fn is_fitted(&self) -> bool {
        matches!(self.state, EngineState::Fitted(_))
    }

    /// Columns with near-zero variance in the raw input; surfaced as a
    /// query rather than blocking the fit (spec §4.1).
    pub fn constant_columns(x: &Tensor<f64>) -> Vec<usize> {
        check_constant_columns(x)
    }

    pub fn fit(&mut self, x: &Tensor<f64>, config: PCAConfig) -> PcaResult<PCAResult> {
        // Reset to Unfit up front so any `?` below (including a refit of an
        // already-Fitted engine) leaves the engine Unfit rather than stale.
        self.state = EngineState::Unfit;

        validate(x, &config)?;

        let (result, preprocessing, kernel_fit) = match config.method {
            Method::Svd => {
                let (preprocessed, preprocessor) = preprocess_linear(x, &config)?;
                let fit = svd::fit(&preprocessed, config.components)?;
                let result = assemble_linear_result(&fit, &config, Some(&preprocessor));
                (result, Preprocessing::Linear(preprocessor), None)
            }
            Method::Nipals if config.missing_strategy == MissingStrategy::Native && x.has_nan() => {
                let fit = nipals_missing::fit(x, config.components, config.mean_center)?;
                let result = assemble_linear_result(&fit, &config, None);
                (result, Preprocessing::None, None)
            }
            Method::Nipals => {
                let (preprocessed, preprocessor) = preprocess_linear(x, &config)?;
                let fit = nipals::fit(&preprocessed, config.components)?;
                let result = assemble_linear_result(&fit, &config, Some(&preprocessor));
                (result, Preprocessing::Linear(preprocessor), None)
            }
            Method::Kernel => {
                let (preprocessed, preprocessor) = preprocess_kernel(x, &config)?;
                let fit = kernel::fit(&preprocessed, config.components, &config.kernel)?;
                let result = assemble_kernel_result(&fit, &config, &preprocessor);
                (result, Preprocessing::Linear(preprocessor), Some(fit))
            }
        };

        self.state = EngineState::Fitted(FittedState {
            config,
            preprocessing,
            result: result.clone(),
            kernel_fit,
        });
        Ok(result)
    }

    pub fn fit_transform(&mut self, x: &Tensor<f64>, config: PCAConfig) -> PcaResult<Tensor<f64>> {
        Ok(self.fit(x, config)?.scores)
    }

    pub fn transform(&self, x: &Tensor<f64>) -> PcaResult<Tensor<f64>> {
        let fitted = match &self.state {
            EngineState::Unfit => return Err(PcaError::NotFitted),
            EngineState::Fitted(fs) => fs,
        };

        match fitted.config.method {
            Method::Svd | Method::Nipals => match &fitted.preprocessing {
                Preprocessing::Linear(preprocessor) => {
                    let preprocessed = preprocessor.transform(x)?;
                    project_onto_loadings(&preprocessed, &fitted.result.loadings)
                }
                Preprocessing::None => Err(PcaError::NotFitted),
            },
            Method::Kernel => {
                let preprocessor = match &fitted.preprocessing {
                    Preprocessing::Linear(p) => p,
                    Preprocessing::None => return Err(PcaError::NotFitted),
                };
                let preprocessed = preprocessor.transform(x)?;
                let kernel_fit = fitted.kernel_fit.as_ref().ok_or(PcaError::NotFitted)?;
                kernel::transform(kernel_fit, &preprocessed)
            }
        }
    }

    pub fn result(&self) -> PcaResult<&PCAResult> {
        match &self.state {
            EngineState::Unfit => Err(PcaError::NotFitted),
            EngineState::Fitted(fs) => Ok(&fs.result),
        }
    }
}

fn preprocess_linear(x: &Tensor<f64>, config: &PCAConfig) -> PcaResult<(Tensor<f64>, FittedPreprocessor)> {
    let (preprocessor, preprocessed) =
        FittedPreprocessor::fit_transform(x, config.column_policy(), config.row_normalization())?;
    Ok((preprocessed, preprocessor))
}

/// Kernel PCA centers via the Gram matrix, so only scale-only/row-wise
/// preprocessing is meaningful here; mean-center/standard/robust flags are
/// ignored rather than double-centering the data.
fn preprocess_kernel(x: &Tensor<f64>, config: &PCAConfig) -> PcaResult<(Tensor<f64>, FittedPreprocessor)> {
    use rpca_preprocessing::ColumnPolicy;
    let column = if config.scale_only { ColumnPolicy::ScaleOnly } else { ColumnPolicy::None };
    let (preprocessor, preprocessed) = FittedPreprocessor::fit_transform(x, column, config.row_normalization())?;
    Ok((preprocessed, preprocessor))
}

fn project_onto_loadings(x: &Tensor<f64>, loadings: &Tensor<f64>) -> PcaResult<Tensor<f64>> {
    let n = x.shape().dim(0)?;
    let m = x.shape().dim(1)?;
    let loadings_m = loadings.shape().dim(0)?;
    if loadings_m != m {
        return Err(PcaError::DimensionMismatch(format!(
            "fitted on {loadings_m} features, got {m}"
        )));
    }
    let k = loadings.shape().dim(1)?;
    let mut out = vec![0.0; n * k];
    for i in 0..n {
        for l in 0..k {
            let mut acc = 0.0;
            for j in 0..m {
                acc += x.get(&[i, j])? * loadings.get(&[j, l])?;
            }
            out[i * k + l] = acc;
        }
    }
    Tensor::new(out, vec![n, k]).map_err(Into::into)
}

fn variance_ratios(eigenvalues: &[f64], total: f64) -> (Vec<f64>, Vec<f64>) {
    let ratios: Vec<f64> = if total > 0.0 {
        eigenvalues.iter().map(|v| v / total * 100.0).collect()
    } else {
        vec![0.0; eigenvalues.len()]
    };
    let mut cumulative = Vec::with_capacity(ratios.len());
    let mut running = 0.0;
    for r in &ratios {
        running += r;
        cumulative.push(running);
    }
    (ratios, cumulative)
}

fn assemble_linear_result(fit: &LinearFit, config: &PCAConfig, preprocessor: Option<&FittedPreprocessor>) -> PCAResult {
    let total: f64 = fit.all_eigenvalues.iter().sum();
    let (ratio, cumulative) = variance_ratios(&fit.eigenvalues, total);
    let (means, std_devs) = match preprocessor {
        Some(p) => (p.means().to_vec(), p.stds().to_vec()),
        None => (Vec::new(), Vec::new()),
    };
    PCAResult {
        scores: fit.scores.clone(),
        loadings: fit.loadings.clone(),
        explained_variance: fit.eigenvalues.clone(),
        explained_variance_ratio: ratio,
        cumulative_variance: cumulative,
        component_labels: component_labels(fit.components_computed),
        components_computed: fit.components_computed,
        method: config.method,
        preprocessing_applied: preprocessor.is_some() && (config.column_policy() != rpca_preprocessing::ColumnPolicy::None || config.row_normalization() != rpca_preprocessing::RowNormalization::None),
        means,
        std_devs,
        all_eigenvalues: fit.all_eigenvalues.clone(),
        incomplete_data: fit.incomplete_data,
        warnings: Vec::new(),
    }
}

fn assemble_kernel_result(fit: &kernel::KernelFit, config: &PCAConfig, preprocessor: &FittedPreprocessor) -> PCAResult {
    let total: f64 = fit.all_eigenvalues.iter().sum();
    let (ratio, cumulative) = variance_ratios(&fit.eigenvalues, total);
    PCAResult {
        scores: fit.scores.clone(),
        loadings: Tensor::zeros(vec![0, 0]),
        explained_variance: fit.eigenvalues.clone(),
        explained_variance_ratio: ratio,
        cumulative_variance: cumulative,
        component_labels: component_labels(fit.components_computed),
        components_computed: fit.components_computed,
        method: config.method,
        preprocessing_applied: preprocessor.column_policy() != rpca_preprocessing::ColumnPolicy::None
            || preprocessor.row_normalization() != rpca_preprocessing::RowNormalization::None,
        means: preprocessor.means().to_vec(),
        std_devs: preprocessor.stds().to_vec(),
        all_eigenvalues: fit.all_eigenvalues.clone(),
        incomplete_data: false,
        warnings: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toy() -> Tensor<f64> {
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

    #[test]
    fn transform_before_fit_fails() {
        let engine = PCAEngine::new();
        let x = toy();
        assert!(matches!(engine.transform(&x), Err(PcaError::NotFitted)));
    }

    #[test]
    fn fit_then_transform_reproduces_scores() {
        let mut engine = PCAEngine::new();
        let x = toy();
        let config = PCAConfig::new(2);
        let result = engine.fit(&x, config).unwrap();
        let reprojected = engine.transform(&x).unwrap();
        for (a, b) in result.scores.data().iter().zip(reprojected.data().iter()) {
            assert!((a - b).abs() < 1e-8);
        }
    }

    #[test]
    fn failed_fit_leaves_engine_unfit() {
        let mut engine = PCAEngine::new();
        let x = Tensor::new(vec![1.0], vec![1, 1]).unwrap();
        let config = PCAConfig::new(1);
        assert!(engine.fit(&x, config).is_err());
        assert!(!engine.is_fitted());
    }

    #[test]
    fn failed_refit_resets_an_already_fitted_engine_to_unfit() {
        let mut engine = PCAEngine::new();
        let x = toy();
        engine.fit(&x, PCAConfig::new(2)).unwrap();
        assert!(engine.is_fitted());

        let bad_x = Tensor::new(vec![1.0], vec![1, 1]).unwrap();
        assert!(engine.fit(&bad_x, PCAConfig::new(1)).is_err());
        assert!(!engine.is_fitted());
    }

    #[test]
    fn kernel_method_produces_empty_loadings() {
        let mut engine = PCAEngine::new();
        let x = toy();
        let mut config = PCAConfig::new(2);
        config.method = Method::Kernel;
        let result = engine.fit(&x, config).unwrap();
        assert_eq!(result.loadings.numel(), 0);
    }
}
