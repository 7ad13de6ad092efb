use std::collections::HashMap;

use rpca_core::Tensor;
use serde::{Deserialize, Serialize};

use crate::config::Method;

pub fn component_labels(k: usize) -> Vec<String> {
    (1..=k).map(|i| format!("PC{i}")).collect()
}

/// Everything a fit produces (spec §3/§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PCAResult {
    /// n x k
    pub scores: Tensor<f64>,
    /// m x k, empty (0x0) for kernel PCA.
    pub loadings: Tensor<f64>,
    /// Eigenvalues of the k retained components.
    pub explained_variance: Vec<f64>,
    /// Percent of total variance per retained component.
    pub explained_variance_ratio: Vec<f64>,
    /// Running sum of `explained_variance_ratio`.
    pub cumulative_variance: Vec<f64>,
    pub component_labels: Vec<String>,
    pub components_computed: usize,
    pub method: Method,
    pub preprocessing_applied: bool,
    /// Per-feature mean used by preprocessing; empty when not applicable.
    pub means: Vec<f64>,
    /// Per-feature std used by preprocessing; empty when not applicable.
    pub std_devs: Vec<f64>,
    /// Full eigenvalue spectrum when one is well-defined (SVD/NIPALS over
    /// complete data extend this past `components_computed` with a residual
    /// pool so Diagnostics can compute Q-limits). For NIPALS over missing
    /// data, total variance has no fixed denominator, so this holds only the
    /// retained eigenvalues (same length as `explained_variance`), not an
    /// extended spectrum.
    pub all_eigenvalues: Vec<f64>,
    pub incomplete_data: bool,
    pub warnings: Vec<String>,
}

/// T²/Q diagnostics for a fitted model (spec §4.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PCAMetrics {
    pub t2: Vec<f64>,
    pub q: Vec<f64>,
    pub outlier_mask: Vec<bool>,
    pub t2_limit_95: f64,
    pub t2_limit_99: f64,
    pub q_limit_95: f64,
    pub q_limit_99: f64,
    /// m x k, empty for kernel PCA (no loadings to attribute to).
    pub contributions: Tensor<f64>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EllipseParams {
    pub center: (f64, f64),
    pub major_axis: f64,
    pub minor_axis: f64,
    /// Radians, in (-pi, pi].
    pub rotation: f64,
    pub confidence: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CorrelationMethod {
    Pearson,
    Spearman,
}

/// Eigencorrelation between PC scores and metadata variables (spec §4.6).
///
/// `variables` gives the canonical display order (sorted by PC1 correlation
/// descending, NaN last); `correlations`/`p_values` are keyed by variable
/// name so callers that don't care about display order can look up directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EigencorrelationResult {
    pub variables: Vec<String>,
    pub component_labels: Vec<String>,
    pub correlations: HashMap<String, Vec<f64>>,
    pub p_values: HashMap<String, Vec<f64>>,
    pub method: CorrelationMethod,
}
