//! Correlation between PC scores and external (metadata) variables (spec
//! §4.6): numeric variables are correlated directly, categorical variables
//! are one-hot expanded first. Missing values are pairwise-deleted rather
//! than imputed, since correlation is already a pairwise statistic.

use std::collections::{BTreeSet, HashMap};

use rpca_core::Tensor;

use crate::error::PcaResult;
use crate::result::{CorrelationMethod, EigencorrelationResult};
use crate::stats::student_t_two_sided_p;

const MIN_VALID_PAIRS: usize = 3;

fn pearson(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len() as f64;
    let mx = x.iter().sum::<f64>() / n;
    let my = y.iter().sum::<f64>() / n;
    let mut sxy = 0.0;
    let mut sxx = 0.0;
    let mut syy = 0.0;
    for i in 0..x.len() {
        let dx = x[i] - mx;
        let dy = y[i] - my;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    if sxx <= 0.0 || syy <= 0.0 {
        return f64::NAN;
    }
    sxy / (sxx.sqrt() * syy.sqrt())
}

fn average_ranks(values: &[f64]) -> Vec<f64> {
    let n = values.len();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| values[a].partial_cmp(&values[b]).unwrap());
    let mut ranks = vec![0.0; n];
    let mut i = 0;
    while i < n {
        let mut j = i;
        while j + 1 < n && values[order[j + 1]] == values[order[i]] {
            j += 1;
        }
        let avg_rank = ((i + 1) + (j + 1)) as f64 / 2.0;
        for p in i..=j {
            ranks[order[p]] = avg_rank;
        }
        i = j + 1;
    }
    ranks
}

/// Correlation + two-sided p-value between two full-length (NaN-bearing)
/// vectors, with pairwise deletion and a `< MIN_VALID_PAIRS` NaN sentinel.
fn correlate_pair(x_full: &[f64], y_full: &[f64], method: CorrelationMethod) -> (f64, f64) {
    let mut xs = Vec::new();
    let mut ys = Vec::new();
    for (&a, &b) in x_full.iter().zip(y_full.iter()) {
        if a.is_finite() && b.is_finite() {
            xs.push(a);
            ys.push(b);
        }
    }
    if xs.len() < MIN_VALID_PAIRS {
        return (f64::NAN, f64::NAN);
    }

    let mut r = match method {
        CorrelationMethod::Pearson => pearson(&xs, &ys),
        CorrelationMethod::Spearman => pearson(&average_ranks(&xs), &average_ranks(&ys)),
    };
    if r.is_nan() {
        return (f64::NAN, f64::NAN);
    }
    r = r.clamp(-1.0, 1.0);

    let df = xs.len() as f64 - 2.0;
    if df <= 0.0 {
        return (r, f64::NAN);
    }
    let denom = (1.0 - r * r).max(1e-300);
    let t = r * (df / denom).sqrt();
    (r, student_t_two_sided_p(t, df))
}

/// Expand a categorical column into sorted-by-level one-hot indicator
/// vectors named `"{name}_{level}"`. Empty-string entries are treated as
/// missing and mapped to NaN in every level column (so they're excluded
/// pairwise, the same as a NaN in a numeric variable).
fn expand_categorical(name: &str, values: &[String]) -> Vec<(String, Vec<f64>)> {
    let levels: BTreeSet<&String> = values.iter().filter(|v| !v.is_empty()).collect();
    levels
        .into_iter()
        .map(|level| {
            let col: Vec<f64> = values
                .iter()
                .map(|v| if v.is_empty() { f64::NAN } else if v == level { 1.0 } else { 0.0 })
                .collect();
            (format!("{name}_{level}"), col)
        })
        .collect()
}

/// Correlate each selected PC against each metadata variable.
///
/// `component_indices` are 0-based column indices into `scores`; variables
/// are built from `numeric` (as-is) plus `categorical` (one-hot expanded),
/// in a deterministic base order (numeric alphabetical, then categorical
/// alphabetical with levels sorted within each variable). The returned
/// `variables` list is then re-sorted for display by correlation with the
/// first selected component, descending, NaN last.
pub fn eigencorrelations(
    scores: &Tensor<f64>,
    component_indices: &[usize],
    numeric: &HashMap<String, Vec<f64>>,
    categorical: &HashMap<String, Vec<String>>,
    method: CorrelationMethod,
) -> PcaResult<EigencorrelationResult> {
    let mut numeric_names: Vec<&String> = numeric.keys().collect();
    numeric_names.sort();
    let mut categorical_names: Vec<&String> = categorical.keys().collect();
    categorical_names.sort();

    let mut base_variables: Vec<(String, Vec<f64>)> = Vec::new();
    for name in numeric_names {
        base_variables.push((name.clone(), numeric[name].clone()));
    }
    for name in categorical_names {
        base_variables.extend(expand_categorical(name, &categorical[name]));
    }

    let labels = component_indices.iter().map(|&idx| format!("PC{}", idx + 1)).collect::<Vec<_>>();

    let mut correlations: HashMap<String, Vec<f64>> = HashMap::new();
    let mut p_values: HashMap<String, Vec<f64>> = HashMap::new();

    for (name, values) in &base_variables {
        let mut r_row = Vec::with_capacity(component_indices.len());
        let mut p_row = Vec::with_capacity(component_indices.len());
        for &pc in component_indices {
            let n = scores.shape().dim(0)?;
            let pc_values: Vec<f64> = (0..n).map(|i| scores.get(&[i, pc]).unwrap()).collect();
            let (r, p) = correlate_pair(values, &pc_values, method);
            r_row.push(r);
            p_row.push(p);
        }
        correlations.insert(name.clone(), r_row);
        p_values.insert(name.clone(), p_row);
    }

    let mut variables: Vec<String> = base_variables.into_iter().map(|(name, _)| name).collect();
    variables.sort_by(|a, b| {
        let ra = correlations[a].first().copied().unwrap_or(f64::NAN);
        let rb = correlations[b].first().copied().unwrap_or(f64::NAN);
        match (ra.is_nan(), rb.is_nan()) {
            (true, true) => std::cmp::Ordering::Equal,
            (true, false) => std::cmp::Ordering::Greater,
            (false, true) => std::cmp::Ordering::Less,
            (false, false) => rb.partial_cmp(&ra).unwrap(),
        }
    });

    Ok(EigencorrelationResult {
        variables,
        component_labels: labels,
        correlations,
        p_values,
        method,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perfect_positive_and_negative_correlation_sort_by_pc1() {
        let scores: Tensor<f64> = Tensor::from_vec2d(&[
            vec![1.0],
            vec![2.0],
            vec![3.0],
            vec![4.0],
            vec![5.0],
        ])
        .unwrap();
        let mut numeric = HashMap::new();
        numeric.insert("v1".to_string(), vec![1.0, 2.0, 3.0, 4.0, 5.0]);
        numeric.insert("v2".to_string(), vec![5.0, 4.0, 3.0, 2.0, 1.0]);

        let result = eigencorrelations(&scores, &[0], &numeric, &HashMap::new(), CorrelationMethod::Pearson).unwrap();
        assert_eq!(result.variables, vec!["v1".to_string(), "v2".to_string()]);
        assert!((result.correlations["v1"][0] - 1.0).abs() < 1e-9);
        assert!((result.correlations["v2"][0] + 1.0).abs() < 1e-9);
        assert!(result.p_values["v1"][0] < 1e-6);
    }

    #[test]
    fn fewer_than_three_valid_pairs_is_nan() {
        let scores: Tensor<f64> = Tensor::from_vec2d(&[vec![1.0], vec![2.0], vec![3.0]]).unwrap();
        let mut numeric = HashMap::new();
        numeric.insert("v".to_string(), vec![1.0, f64::NAN, f64::NAN]);
        let result = eigencorrelations(&scores, &[0], &numeric, &HashMap::new(), CorrelationMethod::Pearson).unwrap();
        assert!(result.correlations["v"][0].is_nan());
        assert!(result.p_values["v"][0].is_nan());
    }

    #[test]
    fn categorical_expands_to_sorted_one_hot_levels() {
        let scores: Tensor<f64> = Tensor::from_vec2d(&[vec![1.0], vec![2.0], vec![3.0], vec![4.0]]).unwrap();
        let mut categorical = HashMap::new();
        categorical.insert(
            "batch".to_string(),
            vec!["b".to_string(), "a".to_string(), "b".to_string(), "a".to_string()],
        );
        let result = eigencorrelations(&scores, &[0], &HashMap::new(), &categorical, CorrelationMethod::Pearson).unwrap();
        assert!(result.correlations.contains_key("batch_a"));
        assert!(result.correlations.contains_key("batch_b"));
    }
}
