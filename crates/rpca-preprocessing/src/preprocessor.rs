//! Row-then-column preprocessing pipeline (spec §4.2): an optional row-wise
//! normalization (SNV or L2 vector-norm) followed by exactly one column-wise
//! policy (robust / standard / scale-only / mean-center-only / none).

use rpca_core::Tensor;
use thiserror::Error;

const FLOOR_EPS: f64 = 1e-8;
const MAD_SCALE: f64 = 1.4826;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PreprocessError {
    #[error("preprocessor not fitted")]
    NotFitted,
    #[error("feature count mismatch: fitted on {expected} columns, got {got}")]
    FeatureCountMismatch { expected: usize, got: usize },
    #[error("empty matrix")]
    EmptyMatrix,
}

pub type PreprocessResult<T> = Result<T, PreprocessError>;

/// Mutually exclusive column-wise strategies, chosen by explicit precedence
/// (robust > scale-only > standard > mean-center-only > none) rather than the
/// scattered boolean conditionals a naive port would carry forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnPolicy {
    None,
    MeanCenterOnly,
    ScaleOnly,
    Standard,
    Robust,
}

impl ColumnPolicy {
    /// Resolve the spec's boolean flags into a single policy. Ordering of the
    /// `if`s below *is* the precedence rule; that's the whole point of
    /// collapsing it into one function instead of leaving it implicit at
    /// every call site.
    pub fn from_flags(mean_center: bool, standard_scale: bool, robust_scale: bool, scale_only: bool) -> Self {
        if robust_scale {
            ColumnPolicy::Robust
        } else if scale_only {
            ColumnPolicy::ScaleOnly
        } else if standard_scale {
            ColumnPolicy::Standard
        } else if mean_center {
            ColumnPolicy::MeanCenterOnly
        } else {
            ColumnPolicy::None
        }
    }
}

/// Row-wise normalization applied before the column stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowNormalization {
    None,
    Snv,
    VectorNorm,
}

fn row_normalize(x: &Tensor<f64>, mode: RowNormalization) -> Tensor<f64> {
    if mode == RowNormalization::None {
        return x.clone();
    }
    let rows = x.shape().dim(0).unwrap_or(0);
    let cols = x.shape().dim(1).unwrap_or(0);
    let mut out = x.data().to_vec();
    for i in 0..rows {
        let row = &out[i * cols..(i + 1) * cols];
        match mode {
            RowNormalization::Snv => {
                let mean = row.iter().sum::<f64>() / cols as f64;
                let var = row.iter().map(|&v| (v - mean) * (v - mean)).sum::<f64>() / cols as f64;
                let std = var.sqrt();
                if std < FLOOR_EPS {
                    for v in out[i * cols..(i + 1) * cols].iter_mut() {
                        *v -= mean;
                    }
                } else {
                    for v in out[i * cols..(i + 1) * cols].iter_mut() {
                        *v = (*v - mean) / std;
                    }
                }
            }
            RowNormalization::VectorNorm => {
                let norm = row.iter().map(|&v| v * v).sum::<f64>().sqrt();
                if norm >= FLOOR_EPS {
                    for v in out[i * cols..(i + 1) * cols].iter_mut() {
                        *v /= norm;
                    }
                }
            }
            RowNormalization::None => unreachable!(),
        }
    }
    Tensor::new(out, vec![rows, cols]).expect("row-normalized data keeps input shape")
}

fn column_mean_std(x: &Tensor<f64>) -> (Vec<f64>, Vec<f64>) {
    let rows = x.shape().dim(0).unwrap_or(0);
    let cols = x.shape().dim(1).unwrap_or(0);
    let data = x.data();
    let mut mean = vec![0.0; cols];
    for i in 0..rows {
        for j in 0..cols {
            mean[j] += data[i * cols + j];
        }
    }
    for m in mean.iter_mut() {
        *m /= rows as f64;
    }
    let mut var = vec![0.0; cols];
    for i in 0..rows {
        for j in 0..cols {
            let d = data[i * cols + j] - mean[j];
            var[j] += d * d;
        }
    }
    let std: Vec<f64> = var.iter().map(|&v| (v / rows as f64).sqrt()).collect();
    (mean, std)
}

fn median_of(values: &mut [f64]) -> f64 {
    values.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let n = values.len();
    if n == 0 {
        0.0
    } else if n % 2 == 1 {
        values[n / 2]
    } else {
        0.5 * (values[n / 2 - 1] + values[n / 2])
    }
}

fn column_median_mad(x: &Tensor<f64>) -> (Vec<f64>, Vec<f64>) {
    let rows = x.shape().dim(0).unwrap_or(0);
    let cols = x.shape().dim(1).unwrap_or(0);
    let data = x.data();
    let mut median = vec![0.0; cols];
    let mut mad = vec![0.0; cols];
    for j in 0..cols {
        let mut col: Vec<f64> = (0..rows).map(|i| data[i * cols + j]).collect();
        let med = median_of(&mut col);
        median[j] = med;
        let mut abs_dev: Vec<f64> = col.iter().map(|&v| (v - med).abs()).collect();
        mad[j] = median_of(&mut abs_dev);
    }
    (median, mad)
}

/// Fit-time statistics plus the policy used to derive them. Immutable once
/// fitted; `transform` applies the same statistics to new rows of matching
/// feature count.
#[derive(Debug, Clone)]
pub struct FittedPreprocessor {
    n_features: usize,
    column: ColumnPolicy,
    row: RowNormalization,
    mean: Vec<f64>,
    std: Vec<f64>,
    median: Vec<f64>,
    mad: Vec<f64>,
}

impl FittedPreprocessor {
    pub fn fit(x: &Tensor<f64>, column: ColumnPolicy, row: RowNormalization) -> PreprocessResult<Self> {
        if x.numel() == 0 {
            return Err(PreprocessError::EmptyMatrix);
        }
        let cols = x.shape().dim(1).map_err(|_| PreprocessError::EmptyMatrix)?;
        let row_normalized = row_normalize(x, row);
        let (mean, std) = column_mean_std(&row_normalized);
        let (median, mad) = column_median_mad(&row_normalized);
        Ok(FittedPreprocessor {
            n_features: cols,
            column,
            row,
            mean,
            std,
            median,
            mad,
        })
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn column_policy(&self) -> ColumnPolicy {
        self.column
    }

    pub fn row_normalization(&self) -> RowNormalization {
        self.row
    }

    /// Per-column mean (computed on row-normalized data, pre-scale).
    pub fn means(&self) -> &[f64] {
        &self.mean
    }

    /// Per-column std, original (pre-scale, un-floored).
    pub fn stds(&self) -> &[f64] {
        &self.std
    }

    fn check_cols(&self, x: &Tensor<f64>) -> PreprocessResult<usize> {
        let cols = x.shape().dim(1).map_err(|_| PreprocessError::EmptyMatrix)?;
        if cols != self.n_features {
            return Err(PreprocessError::FeatureCountMismatch {
                expected: self.n_features,
                got: cols,
            });
        }
        Ok(cols)
    }

    pub fn transform(&self, x: &Tensor<f64>) -> PreprocessResult<Tensor<f64>> {
        let cols = self.check_cols(x)?;
        let rows = x.shape().dim(0).map_err(|_| PreprocessError::EmptyMatrix)?;
        let row_normalized = row_normalize(x, self.row);
        let mut out = row_normalized.data().to_vec();

        for j in 0..cols {
            match self.column {
                ColumnPolicy::None => {}
                ColumnPolicy::MeanCenterOnly => {
                    for i in 0..rows {
                        out[i * cols + j] -= self.mean[j];
                    }
                }
                ColumnPolicy::ScaleOnly => {
                    let std = if self.std[j] < FLOOR_EPS { 1.0 } else { self.std[j] };
                    for i in 0..rows {
                        out[i * cols + j] /= std;
                    }
                }
                ColumnPolicy::Standard => {
                    let std = if self.std[j] < FLOOR_EPS { 1.0 } else { self.std[j] };
                    for i in 0..rows {
                        out[i * cols + j] = (out[i * cols + j] - self.mean[j]) / std;
                    }
                }
                ColumnPolicy::Robust => {
                    let mad = if self.mad[j] < FLOOR_EPS { 1.0 } else { self.mad[j] };
                    for i in 0..rows {
                        out[i * cols + j] = (out[i * cols + j] - self.median[j]) / (mad * MAD_SCALE);
                    }
                }
            }
        }

        Tensor::new(out, vec![rows, cols]).map_err(|_| PreprocessError::EmptyMatrix)
    }

    pub fn fit_transform(x: &Tensor<f64>, column: ColumnPolicy, row: RowNormalization) -> PreprocessResult<(Self, Tensor<f64>)> {
        let fitted = Self::fit(x, column, row)?;
        let transformed = fitted.transform(x)?;
        Ok((fitted, transformed))
    }

    /// Reverses only the column stage, per spec: row-wise normalization is
    /// not invertible in general (SNV/L2-norm discard scale information).
    pub fn inverse_transform(&self, z: &Tensor<f64>) -> PreprocessResult<Tensor<f64>> {
        let cols = self.check_cols(z)?;
        let rows = z.shape().dim(0).map_err(|_| PreprocessError::EmptyMatrix)?;
        let mut out = z.data().to_vec();

        for j in 0..cols {
            match self.column {
                ColumnPolicy::None => {}
                ColumnPolicy::MeanCenterOnly => {
                    for i in 0..rows {
                        out[i * cols + j] += self.mean[j];
                    }
                }
                ColumnPolicy::ScaleOnly => {
                    let std = if self.std[j] < FLOOR_EPS { 1.0 } else { self.std[j] };
                    for i in 0..rows {
                        out[i * cols + j] *= std;
                    }
                }
                ColumnPolicy::Standard => {
                    let std = if self.std[j] < FLOOR_EPS { 1.0 } else { self.std[j] };
                    for i in 0..rows {
                        out[i * cols + j] = out[i * cols + j] * std + self.mean[j];
                    }
                }
                ColumnPolicy::Robust => {
                    let mad = if self.mad[j] < FLOOR_EPS { 1.0 } else { self.mad[j] };
                    for i in 0..rows {
                        out[i * cols + j] = out[i * cols + j] * (mad * MAD_SCALE) + self.median[j];
                    }
                }
            }
        }

        Tensor::new(out, vec![rows, cols]).map_err(|_| PreprocessError::EmptyMatrix)
    }
}

/// Variance < 1e-12 columns, reported as a query rather than a validation
/// failure (spec §4.1 — the solver may still run, the caller decides).
pub fn check_constant_columns(x: &Tensor<f64>) -> Vec<usize> {
    let rows = match x.shape().dim(0) {
        Ok(r) => r,
        Err(_) => return vec![],
    };
    let cols = x.shape().dim(1).unwrap_or(0);
    if rows == 0 || cols == 0 {
        return vec![];
    }
    let data = x.data();
    let mut out = Vec::new();
    for j in 0..cols {
        let mean: f64 = (0..rows).map(|i| data[i * cols + j]).sum::<f64>() / rows as f64;
        let var: f64 = (0..rows).map(|i| (data[i * cols + j] - mean).powi(2)).sum::<f64>() / rows as f64;
        if var < 1e-12 {
            out.push(j);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

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
    fn precedence_resolves_robust_first() {
        assert_eq!(ColumnPolicy::from_flags(true, true, true, true), ColumnPolicy::Robust);
        assert_eq!(ColumnPolicy::from_flags(true, true, false, true), ColumnPolicy::ScaleOnly);
        assert_eq!(ColumnPolicy::from_flags(true, true, false, false), ColumnPolicy::Standard);
        assert_eq!(ColumnPolicy::from_flags(true, false, false, false), ColumnPolicy::MeanCenterOnly);
        assert_eq!(ColumnPolicy::from_flags(false, false, false, false), ColumnPolicy::None);
    }

    #[test]
    fn mean_center_round_trips() {
        let x = toy();
        let (fitted, z) = FittedPreprocessor::fit_transform(&x, ColumnPolicy::MeanCenterOnly, RowNormalization::None).unwrap();
        let back = fitted.inverse_transform(&z).unwrap();
        for (a, b) in x.data().iter().zip(back.data().iter()) {
            assert_relative_eq!(a, b, epsilon = 1e-10);
        }
    }

    #[test]
    fn standard_scale_zero_mean_unit_var() {
        let x = toy();
        let (_, z) = FittedPreprocessor::fit_transform(&x, ColumnPolicy::Standard, RowNormalization::None).unwrap();
        let rows = z.shape().dim(0).unwrap();
        let cols = z.shape().dim(1).unwrap();
        for j in 0..cols {
            let mean: f64 = (0..rows).map(|i| z.get(&[i, j]).unwrap()).sum::<f64>() / rows as f64;
            assert_relative_eq!(mean, 0.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn feature_count_mismatch_is_reported() {
        let x = toy();
        let fitted = FittedPreprocessor::fit(&x, ColumnPolicy::Standard, RowNormalization::None).unwrap();
        let bad = Tensor::from_vec2d(&[vec![1.0, 2.0, 3.0]]).unwrap();
        assert!(matches!(
            fitted.transform(&bad),
            Err(PreprocessError::FeatureCountMismatch { expected: 2, got: 3 })
        ));
    }

    #[test]
    fn constant_column_detected() {
        let x = Tensor::from_vec2d(&[
            vec![5.0, 1.0, 2.0],
            vec![5.0, 2.0, 4.0],
            vec![5.0, 3.0, 1.0],
            vec![5.0, 4.0, 9.0],
        ])
        .unwrap();
        assert_eq!(check_constant_columns(&x), vec![0]);
    }
}
