//! Input validation (spec §4.1): shape, component bounds, and NaN policy.
//! Constant-column detection is a separate query surfaced to callers via
//! `rpca_preprocessing::check_constant_columns`, not a hard failure here.

use rpca_core::Tensor;

use crate::config::{Method, MissingStrategy, PCAConfig};
use crate::error::{PcaError, PcaResult};

pub fn validate(x: &Tensor<f64>, config: &PCAConfig) -> PcaResult<()> {
    if x.ndim() != 2 {
        return Err(PcaError::InvalidShape(format!(
            "expected a 2D matrix, got {} dimensions",
            x.ndim()
        )));
    }
    let n = x.shape().dim(0)?;
    let m = x.shape().dim(1)?;
    if n < 2 {
        return Err(PcaError::InvalidShape(format!("need at least 2 samples, got {n}")));
    }
    if m < 1 {
        return Err(PcaError::InvalidShape("need at least 1 feature".to_string()));
    }

    let max_components = n.min(m);
    if config.components == 0 || config.components > max_components {
        return Err(PcaError::InvalidComponents(format!(
            "components must be between 1 and {max_components}, got {}",
            config.components
        )));
    }

    let allows_nan = config.method == Method::Nipals && config.missing_strategy == MissingStrategy::Native;
    if x.has_nan() && !allows_nan {
        return Err(PcaError::NaNNotAllowed);
    }

    Ok(())
}
