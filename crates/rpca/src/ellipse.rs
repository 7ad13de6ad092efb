//! 2D confidence ellipses over a pair of score components (spec §4.5).
//! Chi-square quantiles for 2 degrees of freedom are fixed by the spec to
//! the three supported confidence levels rather than computed on the fly.

use std::collections::HashMap;

use rpca_core::Tensor;
use rpca_linalg::eigen::eigh_2x2;

use crate::error::{PcaError, PcaResult};
use crate::result::EllipseParams;

fn chi2_quantile_2dof(confidence: f64) -> PcaResult<f64> {
    if (confidence - 0.90).abs() < 1e-9 {
        Ok(4.605)
    } else if (confidence - 0.95).abs() < 1e-9 {
        Ok(5.991)
    } else if (confidence - 0.99).abs() < 1e-9 {
        Ok(9.210)
    } else {
        Err(PcaError::NumericalFailure(format!(
            "unsupported ellipse confidence level {confidence}; expected one of 0.90, 0.95, 0.99"
        )))
    }
}

fn ellipse_for_rows(xs: &[f64], ys: &[f64], confidence: f64) -> PcaResult<EllipseParams> {
    let n = xs.len();
    if n < 2 {
        return Err(PcaError::InvalidShape("need at least 2 samples for a confidence ellipse".to_string()));
    }
    let mean_x = xs.iter().sum::<f64>() / n as f64;
    let mean_y = ys.iter().sum::<f64>() / n as f64;

    let mut sxx = 0.0;
    let mut syy = 0.0;
    let mut sxy = 0.0;
    for i in 0..n {
        let dx = xs[i] - mean_x;
        let dy = ys[i] - mean_y;
        sxx += dx * dx;
        syy += dy * dy;
        sxy += dx * dy;
    }
    let denom = n as f64 - 1.0;
    sxx /= denom;
    syy /= denom;
    sxy /= denom;

    let chi2 = chi2_quantile_2dof(confidence)?;
    let ([l1, l2], [v1, _v2]) = eigh_2x2(sxx, sxy, syy);
    let major_axis = (chi2 * l1.max(0.0)).sqrt();
    let minor_axis = (chi2 * l2.max(0.0)).sqrt();
    let rotation = v1[1].atan2(v1[0]);

    Ok(EllipseParams {
        center: (mean_x, mean_y),
        major_axis,
        minor_axis,
        rotation,
        confidence,
    })
}

/// Confidence ellipse over all samples, projected onto `(pc_x, pc_y)`.
pub fn confidence_ellipse(scores: &Tensor<f64>, pc_x: usize, pc_y: usize, confidence: f64) -> PcaResult<EllipseParams> {
    let n = scores.shape().dim(0)?;
    let xs: Vec<f64> = (0..n).map(|i| scores.get(&[i, pc_x]).unwrap()).collect();
    let ys: Vec<f64> = (0..n).map(|i| scores.get(&[i, pc_y]).unwrap()).collect();
    ellipse_for_rows(&xs, &ys, confidence)
}

/// One confidence ellipse per distinct group label. `groups.len()` must
/// equal the number of samples in `scores`.
pub fn confidence_ellipses(
    scores: &Tensor<f64>,
    groups: &[String],
    pc_x: usize,
    pc_y: usize,
    confidence: f64,
) -> PcaResult<HashMap<String, EllipseParams>> {
    let n = scores.shape().dim(0)?;
    if groups.len() != n {
        return Err(PcaError::DimensionMismatch(format!(
            "{n} samples but {} group labels",
            groups.len()
        )));
    }
    let mut by_group: HashMap<String, (Vec<f64>, Vec<f64>)> = HashMap::new();
    for i in 0..n {
        let entry = by_group.entry(groups[i].clone()).or_default();
        entry.0.push(scores.get(&[i, pc_x])?);
        entry.1.push(scores.get(&[i, pc_y])?);
    }
    let mut out = HashMap::new();
    for (group, (xs, ys)) in by_group {
        out.insert(group, ellipse_for_rows(&xs, &ys, confidence)?);
    }
    Ok(out)
}
