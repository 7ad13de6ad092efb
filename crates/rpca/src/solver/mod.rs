pub mod kernel;
pub mod nipals;
pub mod nipals_missing;
pub mod svd;

/// Common output of a linear (non-kernel) solver: retained scores/loadings
/// plus enough of the eigenvalue spectrum to compute variance ratios.
pub struct LinearFit {
    pub scores: rpca_core::Tensor<f64>,
    pub loadings: rpca_core::Tensor<f64>,
    pub eigenvalues: Vec<f64>,
    pub all_eigenvalues: Vec<f64>,
    pub components_computed: usize,
    pub incomplete_data: bool,
}
