//! Forward finite differences for residual Jacobians.

use crate::error::{ComposeError, Result};
use ndarray::{Array1, Array2};

/// Default relative step size.
pub const DEFAULT_EPSILON: f64 = 1e-8;

/// Compute the Jacobian of `residuals` at `params` with forward differences.
///
/// `J[i, j] = ∂residual[i] / ∂param[j]`. The step for parameter `j` is
/// `|params[j]| * epsilon`, or `epsilon` when the parameter is smaller than
/// that.
///
/// # Arguments
///
/// * `residuals` - Residual function of the parameters
/// * `params` - Point at which to evaluate the Jacobian
/// * `base` - Residuals at `params`, when the caller already has them
/// * `epsilon` - Relative step size (optional)
pub fn jacobian<F>(
    residuals: F,
    params: &Array1<f64>,
    base: Option<&Array1<f64>>,
    epsilon: Option<f64>,
) -> Result<Array2<f64>>
where
    F: Fn(&Array1<f64>) -> Result<Array1<f64>>,
{
    let eps = epsilon.unwrap_or(DEFAULT_EPSILON);

    let computed;
    let base = match base {
        Some(base) => base,
        None => {
            computed = residuals(params)?;
            &computed
        }
    };

    let mut jac = Array2::zeros((base.len(), params.len()));

    for j in 0..params.len() {
        let param_j = params[j];
        let eps_j = if param_j.abs() > eps {
            param_j.abs() * eps
        } else {
            eps
        };

        let mut perturbed = params.clone();
        perturbed[j] += eps_j;
        let shifted = residuals(&perturbed)?;

        if shifted.len() != base.len() {
            return Err(ComposeError::DimensionMismatch(format!(
                "expected {} residuals, got {}",
                base.len(),
                shifted.len()
            )));
        }

        for i in 0..base.len() {
            jac[[i, j]] = (shifted[i] - base[i]) / eps_j;
        }
    }

    Ok(jac)
}
