//! Levenberg-Marquardt engine backed by the `levenberg-marquardt` crate.
//!
//! Only varying parameters are handed to the solver, and in the bounded
//! internal space of [`BoundsTransform`](crate::parameters::BoundsTransform),
//! so the solver itself never sees bounds. Constrained parameters are
//! recomputed from their expressions at every evaluation.

use super::finite_difference;
use super::{check_fit_input, weighted_residuals, FitEngine, FitOutcome};
use crate::config::FitConfig;
use crate::data::ArtistData;
use crate::error::{ComposeError, Result};
use crate::model::CompositeModel;
use crate::parameters::Parameters;
use levenberg_marquardt::{LeastSquaresProblem, LevenbergMarquardt};
use log::{debug, info, warn};
use nalgebra::storage::Owned;
use nalgebra::{DMatrix, DVector, Dyn};
use ndarray::{Array1, Array2};

/// Fits composites with the Levenberg-Marquardt algorithm.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LevenbergMarquardtEngine {
    config: FitConfig,
}

impl LevenbergMarquardtEngine {
    /// Create an engine with a validated configuration.
    pub fn new(config: FitConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &FitConfig {
        &self.config
    }

    fn solver(&self) -> LevenbergMarquardt<f64> {
        LevenbergMarquardt::new()
            .with_ftol(self.config.ftol)
            .with_xtol(self.config.xtol)
            .with_gtol(self.config.gtol)
            .with_stepbound(self.config.stepbound)
            .with_patience(self.config.patience)
            .with_scale_diag(self.config.scale_diag)
    }
}

impl FitEngine for LevenbergMarquardtEngine {
    fn fit(&self, model: &CompositeModel, params: &Parameters, data: &ArtistData) -> Result<FitOutcome> {
        check_fit_input(model, params, data)?;

        let mut start = params.clone();
        for name in start.names() {
            if let Some(param) = start.get_mut(&name) {
                param.set_stderr(None);
            }
        }
        start.update_expressions()?;
        let nvarys = start.varying().len();

        if nvarys == 0 {
            info!("no varying parameters in {}, evaluating only", model);
            let residuals = weighted_residuals(model, &start, data)?;
            return Ok(FitOutcome::from_residuals(
                start,
                &residuals,
                0,
                true,
                "no varying parameters",
                1,
            ));
        }

        info!(
            "fitting {} to {} points with {} varying parameters",
            model,
            data.len(),
            nvarys
        );

        let problem = CompositeProblem::new(model, data, start, self.config.diff_epsilon)?;
        let (problem, report) = self.solver().minimize(problem);

        let success = report.termination.was_successful();
        let message = format!("{:?}", report.termination);
        if success {
            info!("fit converged after {} evaluations: {}", report.number_of_evaluations, message);
        } else {
            warn!("fit did not converge after {} evaluations: {}", report.number_of_evaluations, message);
        }

        let internal = problem.internal_array();
        let mut fitted = problem.params_at(&internal)?;
        let residuals = weighted_residuals(model, &fitted, data)?;

        let mut outcome = FitOutcome::from_residuals(
            fitted.clone(),
            &residuals,
            nvarys,
            success,
            message,
            report.number_of_evaluations,
        );

        let jac = problem.jacobian_at(&internal, &residuals)?;
        match standard_errors(&jac, &internal, &fitted, outcome.redchi) {
            Some(errors) => {
                for (name, stderr) in errors {
                    fitted.require_mut(&name)?.set_stderr(Some(stderr));
                }
                outcome.params = fitted;
            }
            None => warn!("covariance matrix is singular, standard errors not estimated"),
        }

        Ok(outcome)
    }
}

/// The least-squares problem over the internal values of the varying
/// parameters.
struct CompositeProblem<'a> {
    model: &'a CompositeModel,
    data: &'a ArtistData,
    template: Parameters,
    internal: DVector<f64>,
    epsilon: f64,
}

impl<'a> CompositeProblem<'a> {
    fn new(
        model: &'a CompositeModel,
        data: &'a ArtistData,
        template: Parameters,
        epsilon: f64,
    ) -> Result<Self> {
        let internal = DVector::from_vec(template.varying_internal_values()?);
        Ok(Self {
            model,
            data,
            template,
            internal,
            epsilon,
        })
    }

    fn internal_array(&self) -> Array1<f64> {
        self.internal.iter().copied().collect()
    }

    fn params_at(&self, internal: &Array1<f64>) -> Result<Parameters> {
        let mut params = self.template.clone();
        let values = internal.to_vec();
        params.update_from_internal(&values)?;
        Ok(params)
    }

    fn residuals_at(&self, internal: &Array1<f64>) -> Result<Array1<f64>> {
        let params = self.params_at(internal)?;
        let residuals = weighted_residuals(self.model, &params, self.data)?;
        if residuals.iter().any(|r| !r.is_finite()) {
            return Err(ComposeError::FitFailure(
                "model produced non-finite residuals".to_string(),
            ));
        }
        Ok(residuals)
    }

    fn jacobian_at(&self, internal: &Array1<f64>, base: &Array1<f64>) -> Result<Array2<f64>> {
        finite_difference::jacobian(
            |x| self.residuals_at(x),
            internal,
            Some(base),
            Some(self.epsilon),
        )
    }
}

impl LeastSquaresProblem<f64, Dyn, Dyn> for CompositeProblem<'_> {
    type ResidualStorage = Owned<f64, Dyn>;
    type JacobianStorage = Owned<f64, Dyn, Dyn>;
    type ParameterStorage = Owned<f64, Dyn>;

    fn set_params(&mut self, x: &DVector<f64>) {
        self.internal.copy_from(x);
    }

    fn params(&self) -> DVector<f64> {
        self.internal.clone()
    }

    fn residuals(&self) -> Option<DVector<f64>> {
        match self.residuals_at(&self.internal_array()) {
            Ok(r) => Some(DVector::from_vec(r.to_vec())),
            Err(err) => {
                debug!("residual evaluation failed: {}", err);
                None
            }
        }
    }

    fn jacobian(&self) -> Option<DMatrix<f64>> {
        let internal = self.internal_array();
        let jac = self
            .residuals_at(&internal)
            .and_then(|base| self.jacobian_at(&internal, &base));

        match jac {
            Ok(jac) => Some(DMatrix::from_fn(jac.nrows(), jac.ncols(), |i, j| jac[[i, j]])),
            Err(err) => {
                debug!("jacobian evaluation failed: {}", err);
                None
            }
        }
    }
}

/// Standard errors of the varying parameters in external units:
/// `sqrt(diag((JᵀJ)⁻¹ · redchi))` scaled by the slope of the bounds
/// transform. `None` when `JᵀJ` is singular.
fn standard_errors(
    jac: &Array2<f64>,
    internal: &Array1<f64>,
    params: &Parameters,
    redchi: f64,
) -> Option<Vec<(String, f64)>> {
    let j = DMatrix::from_fn(jac.nrows(), jac.ncols(), |r, c| jac[[r, c]]);
    let covariance = (j.transpose() * &j).try_inverse()? * redchi;

    params
        .varying()
        .iter()
        .enumerate()
        .map(|(k, param)| {
            let variance = covariance[(k, k)];
            if !(variance >= 0.0) {
                return None;
            }
            let slope = param.bounds_transform().derivative(internal[k]).abs();
            Some((param.name().to_string(), variance.sqrt() * slope))
        })
        .collect()
}
