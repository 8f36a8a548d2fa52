//! Stored fit results.

use crate::engine::FitOutcome;
use crate::error::Result;
use crate::model::CompositeModel;
use crate::parameters::Parameters;
use ndarray::Array1;
use std::collections::BTreeMap;
use std::fmt::{self, Write};

/// A finished fit: a snapshot of the model, the fitted parameters and the
/// fit statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct FitResult {
    pub name: String,
    pub model: CompositeModel,
    pub params: Parameters,
    /// Parameter values the fit started from
    pub init_values: BTreeMap<String, f64>,
    pub success: bool,
    pub message: String,
    pub nfev: usize,
    pub ndata: usize,
    pub nvarys: usize,
    pub chisqr: f64,
    pub redchi: f64,
    pub aic: f64,
    pub bic: f64,
}

impl FitResult {
    /// Combine an engine outcome with the model and starting values it was
    /// produced from.
    pub fn from_outcome(
        name: &str,
        model: &CompositeModel,
        init_params: &Parameters,
        outcome: FitOutcome,
    ) -> Self {
        Self {
            name: name.to_string(),
            model: model.clone(),
            params: outcome.params,
            init_values: init_params.values(),
            success: outcome.success,
            message: outcome.message,
            nfev: outcome.nfev,
            ndata: outcome.ndata,
            nvarys: outcome.nvarys,
            chisqr: outcome.chisqr,
            redchi: outcome.redchi,
            aic: outcome.aic,
            bic: outcome.bic,
        }
    }

    /// The fitted model at `x`.
    pub fn eval(&self, x: &Array1<f64>) -> Result<Array1<f64>> {
        self.model.evaluate(x, &self.params)
    }

    /// Each fitted component at `x`, keyed by prefix or kind name.
    pub fn eval_components(&self, x: &Array1<f64>) -> Result<BTreeMap<String, Array1<f64>>> {
        self.model.eval_components(x, &self.params)
    }

    pub fn ncomponents(&self) -> usize {
        self.model.len()
    }

    /// A plain-text report of the fit.
    ///
    /// ```text
    /// [[Model]]
    ///     Model(gaussian) + Model(linear)
    /// [[Fit Statistics]]
    ///     # function evals   = 31
    ///     ...
    /// [[Variables]]
    ///     amplitude:  8.88021830 +/- 0.11359643 (1.28%) (init = 5)
    ///     fwhm:       2.72220720 +/- 0.02675692 (0.98%) == '2.35482 * sigma'
    /// ```
    pub fn fit_report(&self) -> String {
        let mut report = String::new();
        // Writing to a String cannot fail
        let _ = self.write_report(&mut report);
        report
    }

    fn write_report<W: Write>(&self, out: &mut W) -> fmt::Result {
        writeln!(out, "[[Model]]")?;
        writeln!(out, "    {}", self.model)?;

        writeln!(out, "[[Fit Statistics]]")?;
        writeln!(out, "    # fitting method   = leastsq")?;
        writeln!(out, "    # function evals   = {}", self.nfev)?;
        writeln!(out, "    # data points      = {}", self.ndata)?;
        writeln!(out, "    # variables        = {}", self.nvarys)?;
        writeln!(out, "    chi-square         = {:.8}", self.chisqr)?;
        writeln!(out, "    reduced chi-square = {:.8}", self.redchi)?;
        writeln!(out, "    Akaike info crit   = {:.8}", self.aic)?;
        writeln!(out, "    Bayesian info crit = {:.8}", self.bic)?;
        if !self.success {
            writeln!(out, "##  Warning: fit did not converge ({})", self.message)?;
        }

        writeln!(out, "[[Variables]]")?;
        let width = self.params.names().iter().map(|n| n.len()).max().unwrap_or(0) + 1;
        for (name, param) in self.params.iter() {
            let label = format!("{}:", name);
            write!(out, "    {:<width$} {:.8}", label, param.value(), width = width)?;

            if let Some(stderr) = param.stderr() {
                write!(out, " +/- {:.8}", stderr)?;
                if param.value() != 0.0 {
                    write!(out, " ({:.2}%)", (stderr / param.value()).abs() * 100.0)?;
                }
            }

            match param.expr() {
                Some(expr) => write!(out, " == '{}'", expr)?,
                None if !param.vary() => write!(out, " (fixed)")?,
                None => {
                    if let Some(init) = self.init_values.get(name) {
                        write!(out, " (init = {})", init)?;
                    }
                }
            }
            writeln!(out)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Component, ComponentKind};
    use approx::assert_relative_eq;

    fn line_result() -> FitResult {
        let model = CompositeModel::from_components(vec![Component::new(ComponentKind::Linear)]).unwrap();
        let init = model.make_default_parameters().unwrap();

        let mut fitted = init.clone();
        fitted.get_mut("slope").unwrap().set_value(2.0).unwrap();
        fitted.get_mut("slope").unwrap().set_stderr(Some(0.1));
        fitted.get_mut("intercept").unwrap().set_fixed(true).unwrap();

        let outcome = FitOutcome::from_residuals(fitted, &Array1::from_vec(vec![0.5, -0.5]), 1, true, "Converged", 12);
        FitResult::from_outcome("fit_0", &model, &init, outcome)
    }

    #[test]
    fn test_eval_uses_fitted_values() {
        let result = line_result();
        let x = Array1::from_vec(vec![0.0, 1.0]);
        let y = result.eval(&x).unwrap();
        assert_relative_eq!(y[1], 2.0);
        assert_eq!(result.ncomponents(), 1);
        assert!(result.eval_components(&x).unwrap().contains_key("linear"));
    }

    #[test]
    fn test_fit_report_sections() {
        let report = line_result().fit_report();
        assert!(report.starts_with("[[Model]]\n    Model(linear)\n"));
        assert!(report.contains("[[Fit Statistics]]"));
        assert!(report.contains("# function evals   = 12"));
        assert!(report.contains("chi-square         = 0.50000000"));
        assert!(report.contains("slope:     2.00000000 +/- 0.10000000 (5.00%) (init = 0)"));
        assert!(report.contains("intercept: 0.00000000 (fixed)"));
        assert!(!report.contains("Warning"));
    }

    #[test]
    fn test_fit_report_warns_when_not_converged() {
        let mut result = line_result();
        result.success = false;
        result.message = "ran out of evaluations".to_string();

        let report = result.fit_report();
        assert!(report.contains("##  Warning: fit did not converge (ran out of evaluations)\n[[Variables]]"));
        assert!(report.ends_with("(init = 0)\n"));
    }
}
