use rpca_core::TensorError;
use rpca_preprocessing::PreprocessError;
use thiserror::Error;

/// Error kinds the engine raises (spec §7). The engine's fitted state never
/// changes on any of these — a failed `fit` leaves it `Unfit`.
#[derive(Debug, Error, Clone)]
pub enum PcaError {
    #[error("invalid shape: {0}")]
    InvalidShape(String),

    #[error("invalid component count: {0}")]
    InvalidComponents(String),

    #[error("NaN present but the active configuration has no missing-value handling")]
    NaNNotAllowed,

    #[error("NIPALS failed to converge within {max_iter} iterations at component {component}")]
    ConvergenceFailure { component: usize, max_iter: usize },

    #[error("degenerate variance: {0}")]
    DegenerateVariance(String),

    #[error("engine is not fitted")]
    NotFitted,

    #[error("invalid kernel configuration: {0}")]
    KernelConfig(String),

    #[error("kernel memory limit exceeded: {n} samples exceeds the configured cap of {cap}")]
    KernelMemoryLimit { n: usize, cap: usize },

    #[error("dimension mismatch: {0}")]
    DimensionMismatch(String),

    #[error("numerical failure: {0}")]
    NumericalFailure(String),

    #[error(transparent)]
    Tensor(#[from] TensorError),
}

impl From<PreprocessError> for PcaError {
    fn from(e: PreprocessError) -> Self {
        match e {
            PreprocessError::NotFitted => PcaError::NotFitted,
            PreprocessError::FeatureCountMismatch { expected, got } => {
                PcaError::DimensionMismatch(format!("fitted on {expected} features, got {got}"))
            }
            PreprocessError::EmptyMatrix => PcaError::InvalidShape("empty matrix".to_string()),
        }
    }
}

pub type PcaResult<T> = Result<T, PcaError>;
