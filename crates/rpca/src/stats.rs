//! Thin wrapper around `statrs` distributions used by diagnostics and
//! eigencorrelation. Kept in one place so neither module has to know the
//! underlying crate's constructor quirks.

use statrs::distribution::{ContinuousCDF, FisherSnedecor, Normal, StudentsT};

use crate::error::{PcaError, PcaResult};

/// Inverse CDF of the standard normal at `p`.
pub fn normal_quantile(p: f64) -> f64 {
    Normal::new(0.0, 1.0)
        .expect("standard normal parameters are always valid")
        .inverse_cdf(p)
}

/// Inverse CDF of an F(d1, d2) distribution at `p`, used for the
/// Hotelling's T² confidence limit.
pub fn f_quantile(d1: f64, d2: f64, p: f64) -> PcaResult<f64> {
    let dist = FisherSnedecor::new(d1, d2).map_err(|e| PcaError::NumericalFailure(e.to_string()))?;
    Ok(dist.inverse_cdf(p))
}

/// Two-sided p-value for a correlation t-statistic with `df` degrees of
/// freedom. Falls back to the normal approximation above df=30, where the
/// Student-t and normal tails are close enough that the simpler tail formula
/// is what most implementations reach for.
pub fn student_t_two_sided_p(t: f64, df: f64) -> f64 {
    let tail = if df > 30.0 {
        let normal = Normal::new(0.0, 1.0).expect("standard normal parameters are always valid");
        1.0 - normal.cdf(t.abs())
    } else {
        let dist = StudentsT::new(0.0, 1.0, df).expect("t-distribution df is always positive here");
        1.0 - dist.cdf(t.abs())
    };
    2.0 * tail
}
