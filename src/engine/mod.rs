//! Fit engines.
//!
//! A [`FitEngine`] minimizes the weighted residuals `(model(x) - y) * weights`
//! over the varying parameters of a composite and reports the fitted
//! parameters with fit statistics. [`LevenbergMarquardtEngine`] is the bundled
//! engine, enabled by the `lm` feature.

pub mod finite_difference;

#[cfg(feature = "lm")]
mod lm;

#[cfg(feature = "lm")]
pub use lm::LevenbergMarquardtEngine;

use crate::data::ArtistData;
use crate::error::{ComposeError, Result};
use crate::model::CompositeModel;
use crate::parameters::Parameters;
use ndarray::Array1;

/// Anything that can fit a composite model to data.
pub trait FitEngine {
    /// Fit `model` to `data` starting from `params`.
    fn fit(&self, model: &CompositeModel, params: &Parameters, data: &ArtistData) -> Result<FitOutcome>;
}

/// What an engine reports after a fit.
#[derive(Debug, Clone, PartialEq)]
pub struct FitOutcome {
    /// Fitted parameters, with standard errors where they could be estimated
    pub params: Parameters,

    /// Whether the engine converged
    pub success: bool,

    /// Engine's termination message
    pub message: String,

    /// Number of residual evaluations
    pub nfev: usize,

    /// Number of data points
    pub ndata: usize,

    /// Number of varying parameters
    pub nvarys: usize,

    /// Sum of squared weighted residuals
    pub chisqr: f64,

    /// chisqr / (ndata - nvarys)
    pub redchi: f64,

    /// Akaike information criterion
    pub aic: f64,

    /// Bayesian information criterion
    pub bic: f64,
}

impl FitOutcome {
    /// Build an outcome from the final residuals, computing the statistics.
    pub fn from_residuals(
        params: Parameters,
        residuals: &Array1<f64>,
        nvarys: usize,
        success: bool,
        message: impl Into<String>,
        nfev: usize,
    ) -> Self {
        let ndata = residuals.len();
        let chisqr = residuals.iter().map(|r| r * r).sum::<f64>();
        let nfree = ndata.saturating_sub(nvarys).max(1);
        let redchi = chisqr / nfree as f64;

        let n = ndata.max(1) as f64;
        // Guard against log(0) for a perfect fit
        let neg2_log_likelihood = n * (chisqr.max(f64::MIN_POSITIVE) / n).ln();
        let aic = neg2_log_likelihood + 2.0 * nvarys as f64;
        let bic = neg2_log_likelihood + n.ln() * nvarys as f64;

        Self {
            params,
            success,
            message: message.into(),
            nfev,
            ndata,
            nvarys,
            chisqr,
            redchi,
            aic,
            bic,
        }
    }
}

/// Weighted residuals `(model(x) - y) * weights` with constraint expressions
/// resolved.
pub fn weighted_residuals(
    model: &CompositeModel,
    params: &Parameters,
    data: &ArtistData,
) -> Result<Array1<f64>> {
    let predicted = model.evaluate(&data.x, params)?;
    Ok((predicted - &data.y) * &data.weights)
}

/// Checks shared by every engine before a fit starts.
pub(crate) fn check_fit_input(
    model: &CompositeModel,
    params: &Parameters,
    data: &ArtistData,
) -> Result<()> {
    if model.is_empty() {
        return Err(ComposeError::InvalidInput(
            "cannot fit a model without components".to_string(),
        ));
    }
    data.validate()?;

    let nvarys = params.varying().len();
    if data.len() < nvarys {
        return Err(ComposeError::FitFailure(format!(
            "{} data points cannot determine {} varying parameters",
            data.len(),
            nvarys
        )));
    }
    Ok(())
}
