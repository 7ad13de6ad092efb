use rpca_preprocessing::{ColumnPolicy, RowNormalization};
use serde::{Deserialize, Serialize};

/// Which family of solver `PCAEngine::fit` dispatches to (spec §4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Method {
    Svd,
    Nipals,
    Kernel,
}

impl Default for Method {
    fn default() -> Self {
        Method::Svd
    }
}

/// How NIPALS treats NaN entries in the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MissingStrategy {
    /// Drop any row containing a NaN before fitting (handled by the caller's
    /// validator / preprocessing, not the solver).
    Drop,
    Mean,
    Median,
    /// Run the native NIPALS missing-data variant (spec §4.3.3): NaNs stay
    /// in the working matrix and are excluded pairwise from every inner
    /// product.
    Native,
}

impl Default for MissingStrategy {
    fn default() -> Self {
        MissingStrategy::Drop
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KernelType {
    Linear,
    Rbf,
    Poly,
}

/// Kernel parameters (spec §4.4). `gamma <= 0.0` is a sentinel meaning "use
/// 1/n_features", resolved at fit time once the feature count is known.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct KernelParams {
    pub kernel_type: KernelType,
    pub gamma: f64,
    pub degree: i32,
    pub coef0: f64,
    /// Refuse to build a Gram matrix larger than this many samples.
    pub max_samples: usize,
}

pub const DEFAULT_KERNEL_SAMPLE_CAP: usize = 10_000;

impl Default for KernelParams {
    fn default() -> Self {
        KernelParams {
            kernel_type: KernelType::Linear,
            gamma: 0.0,
            degree: 3,
            coef0: 1.0,
            max_samples: DEFAULT_KERNEL_SAMPLE_CAP,
        }
    }
}

/// Full configuration for a single `PCAEngine::fit` call.
///
/// Preprocessing flags are intentionally booleans at this layer (they mirror
/// a host application's config file / CLI flags); `column_policy` collapses
/// them into the single [`ColumnPolicy`] the preprocessor actually consumes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PCAConfig {
    pub components: usize,
    pub method: Method,
    pub missing_strategy: MissingStrategy,

    pub mean_center: bool,
    pub standard_scale: bool,
    pub robust_scale: bool,
    pub scale_only: bool,
    pub snv: bool,
    pub vector_norm: bool,

    pub kernel: KernelParams,
}

impl PCAConfig {
    pub fn new(components: usize) -> Self {
        PCAConfig {
            components,
            method: Method::Svd,
            missing_strategy: MissingStrategy::Drop,
            mean_center: true,
            standard_scale: false,
            robust_scale: false,
            scale_only: false,
            snv: false,
            vector_norm: false,
            kernel: KernelParams::default(),
        }
    }

    pub fn column_policy(&self) -> ColumnPolicy {
        ColumnPolicy::from_flags(self.mean_center, self.standard_scale, self.robust_scale, self.scale_only)
    }

    /// SNV takes precedence over vector-norm when both are set, mirroring
    /// the column policy's explicit-precedence pattern rather than leaving
    /// the choice implicit.
    pub fn row_normalization(&self) -> RowNormalization {
        if self.snv {
            RowNormalization::Snv
        } else if self.vector_norm {
            RowNormalization::VectorNorm
        } else {
            RowNormalization::None
        }
    }
}

/// Parameters for post-fit diagnostics (spec §4.5), kept separate from
/// `PCAConfig` since they apply to an already-fitted model.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Significance level used for the outlier mask (T² > T²-limit(1-alpha)).
    pub significance_level: f64,
    /// Confidence level for 2D score ellipses; must be one of 0.90/0.95/0.99.
    pub ellipse_confidence: f64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        MetricsConfig {
            significance_level: 0.01,
            ellipse_confidence: 0.95,
        }
    }
}
