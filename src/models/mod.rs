//! The catalogue of component kinds.
//!
//! Every kind knows its root parameter names, the hints used to create default
//! parameters (starting value, bounds, derived expressions), how to evaluate
//! itself and how to guess starting values from data. Parameter names follow
//! lmfit's built-in models so that prefixes such as `g0_` produce familiar
//! names like `g0_amplitude`.

use crate::error::{ComposeError, Result};
use nalgebra::{DMatrix, DVector};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub mod component;
pub mod exponential;
pub mod peak;
pub mod polynomial;

pub use component::Component;

/// Construction arguments of a component, e.g. `{"degree": 3.0}`.
pub type ComponentArgs = BTreeMap<String, f64>;

/// Guessed starting values keyed by parameter name.
pub type Guess = BTreeMap<String, f64>;

/// Smallest width used in denominators, as in lmfit.
pub(crate) const TINY: f64 = 1.0e-15;

/// Highest supported polynomial degree.
pub const MAX_POLYNOMIAL_DEGREE: u8 = 7;

/// Names accepted by [`ComponentKind::from_name`], in catalogue order.
pub const CATALOGUE: [&str; 10] = [
    "Gaussian",
    "Lorentzian",
    "PseudoVoigt",
    "Poisson",
    "Exponential",
    "PowerLaw",
    "Constant",
    "Linear",
    "Quadratic",
    "Polynomial",
];

/// The function family of a component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ComponentKind {
    Gaussian,
    Lorentzian,
    PseudoVoigt,
    Poisson,
    Exponential,
    PowerLaw,
    Constant,
    Linear,
    Quadratic,
    Polynomial { degree: u8 },
}

/// Starting value, bounds and constraint of one parameter of a component.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamHint {
    /// Starting value; `None` leaves the value to the expression or to 0
    pub value: Option<f64>,
    pub min: f64,
    pub max: f64,
    pub vary: bool,
    /// Constraint expression in terms of effective parameter names
    pub expr: Option<String>,
}

impl Default for ParamHint {
    fn default() -> Self {
        Self {
            value: None,
            min: f64::NEG_INFINITY,
            max: f64::INFINITY,
            vary: true,
            expr: None,
        }
    }
}

impl ParamHint {
    pub fn value(value: f64) -> Self {
        Self {
            value: Some(value),
            ..Self::default()
        }
    }

    pub fn bounded(value: f64, min: f64, max: f64) -> Self {
        Self {
            value: Some(value),
            min,
            max,
            ..Self::default()
        }
    }

    pub fn expr(expr: &str) -> Self {
        Self {
            vary: false,
            expr: Some(expr.to_string()),
            ..Self::default()
        }
    }
}

impl ComponentKind {
    /// Resolve a catalogue name and its construction arguments.
    ///
    /// Names are matched case-insensitively and may carry lmfit's `Model`
    /// suffix, so `"GaussianModel"` and `"gaussian"` are the same kind.
    ///
    /// # Examples
    ///
    /// ```
    /// use lmcompose_rs::models::{ComponentArgs, ComponentKind};
    ///
    /// let args = ComponentArgs::from([("degree".to_string(), 2.0)]);
    /// let kind = ComponentKind::from_name("PolynomialModel", &args).unwrap();
    /// assert_eq!(kind, ComponentKind::Polynomial { degree: 2 });
    ///
    /// assert!(ComponentKind::from_name("Polynomial", &ComponentArgs::new()).is_err());
    /// ```
    pub fn from_name(name: &str, args: &ComponentArgs) -> Result<Self> {
        let lowered = name.trim().to_ascii_lowercase();
        let base = lowered.strip_suffix("model").unwrap_or(lowered.as_str());

        let kind = match base {
            "gaussian" => ComponentKind::Gaussian,
            "lorentzian" => ComponentKind::Lorentzian,
            "pseudovoigt" | "pvoigt" => ComponentKind::PseudoVoigt,
            "poisson" => ComponentKind::Poisson,
            "exponential" => ComponentKind::Exponential,
            "powerlaw" => ComponentKind::PowerLaw,
            "constant" => ComponentKind::Constant,
            "linear" => ComponentKind::Linear,
            "quadratic" | "parabolic" => ComponentKind::Quadratic,
            "polynomial" => {
                let degree = polynomial_degree(name, args)?;
                return Ok(ComponentKind::Polynomial { degree });
            }
            _ => {
                return Err(ComposeError::InvalidComponentArguments {
                    kind: name.to_string(),
                    missing: Vec::new(),
                    message: format!("unknown component kind; expected one of {:?}", CATALOGUE),
                })
            }
        };

        if let Some(unknown) = args.keys().next() {
            return Err(ComposeError::InvalidComponentArguments {
                kind: name.to_string(),
                missing: Vec::new(),
                message: format!("unexpected argument '{}'", unknown),
            });
        }

        Ok(kind)
    }

    /// Function name of the kind, as lmfit prints it in `Model(<name>)`.
    pub fn name(&self) -> &'static str {
        match self {
            ComponentKind::Gaussian => "gaussian",
            ComponentKind::Lorentzian => "lorentzian",
            ComponentKind::PseudoVoigt => "pvoigt",
            ComponentKind::Poisson => "poisson",
            ComponentKind::Exponential => "exponential",
            ComponentKind::PowerLaw => "powerlaw",
            ComponentKind::Constant => "constant",
            ComponentKind::Linear => "linear",
            ComponentKind::Quadratic => "quadratic",
            ComponentKind::Polynomial { .. } => "polynomial",
        }
    }

    /// Letter that starts every generated prefix of this kind.
    pub fn prefix_letter(&self) -> char {
        self.name().chars().next().unwrap_or('m')
    }

    /// Names of the arguments of the model function, in call order.
    pub fn function_params(&self) -> Vec<String> {
        let names: &[&str] = match self {
            ComponentKind::Gaussian | ComponentKind::Lorentzian => &["amplitude", "center", "sigma"],
            ComponentKind::PseudoVoigt => &["amplitude", "center", "sigma", "fraction"],
            ComponentKind::Poisson => &["amp", "mu"],
            ComponentKind::Exponential => &["amplitude", "decay"],
            ComponentKind::PowerLaw => &["amplitude", "exponent"],
            ComponentKind::Constant => &["c"],
            ComponentKind::Linear => &["slope", "intercept"],
            ComponentKind::Quadratic => &["a", "b", "c"],
            ComponentKind::Polynomial { degree } => {
                return (0..=*degree).map(|i| format!("c{}", i)).collect();
            }
        };
        names.iter().map(|s| s.to_string()).collect()
    }

    /// Hints for every root parameter, including derived ones such as `fwhm`.
    pub fn default_hints(&self) -> BTreeMap<String, ParamHint> {
        let mut hints: BTreeMap<String, ParamHint> = self
            .function_params()
            .into_iter()
            .map(|name| (name, ParamHint::value(self.default_value())))
            .collect();

        if matches!(
            self,
            ComponentKind::Gaussian | ComponentKind::Lorentzian | ComponentKind::PseudoVoigt
        ) {
            peak::peak_hints(*self, &mut hints);
        }

        hints
    }

    /// Starting value of the function parameters before any guess.
    fn default_value(&self) -> f64 {
        match self {
            ComponentKind::Constant
            | ComponentKind::Linear
            | ComponentKind::Quadratic
            | ComponentKind::Polynomial { .. } => 0.0,
            _ => 1.0,
        }
    }

    /// Evaluate the model function; `values` follow [`ComponentKind::function_params`].
    pub fn evaluate(&self, x: &Array1<f64>, values: &[f64]) -> Result<Array1<f64>> {
        let expected = self.function_params().len();
        if values.len() != expected {
            return Err(ComposeError::DimensionMismatch(format!(
                "{} takes {} parameters, got {}",
                self.name(),
                expected,
                values.len()
            )));
        }

        Ok(match *self {
            ComponentKind::Gaussian => peak::gaussian(x, values[0], values[1], values[2]),
            ComponentKind::Lorentzian => peak::lorentzian(x, values[0], values[1], values[2]),
            ComponentKind::PseudoVoigt => {
                peak::pvoigt(x, values[0], values[1], values[2], values[3])
            }
            ComponentKind::Poisson => peak::poisson(x, values[0], values[1]),
            ComponentKind::Exponential => exponential::exponential(x, values[0], values[1]),
            ComponentKind::PowerLaw => exponential::powerlaw(x, values[0], values[1]),
            ComponentKind::Constant => x.mapv(|_| values[0]),
            ComponentKind::Linear => x.mapv(|xi| values[0] * xi + values[1]),
            ComponentKind::Quadratic => x.mapv(|xi| values[0] * xi * xi + values[1] * xi + values[2]),
            ComponentKind::Polynomial { .. } => polynomial::horner(x, values),
        })
    }

    /// Guess starting values of the function parameters from data.
    pub fn guess(&self, x: &Array1<f64>, y: &Array1<f64>) -> Result<Guess> {
        check_xy(x, y)?;

        match *self {
            ComponentKind::Gaussian | ComponentKind::Lorentzian | ComponentKind::PseudoVoigt => {
                Ok(peak::guess_peak(*self, x, y))
            }
            ComponentKind::Poisson => Ok(peak::guess_poisson(x, y)),
            ComponentKind::Exponential => exponential::guess_exponential(x, y),
            ComponentKind::PowerLaw => exponential::guess_powerlaw(x, y),
            ComponentKind::Constant => Ok(polynomial::guess_constant(y)),
            ComponentKind::Linear => polynomial::guess_linear(x, y),
            ComponentKind::Quadratic => polynomial::guess_quadratic(x, y),
            ComponentKind::Polynomial { degree } => polynomial::guess_polynomial(x, y, degree),
        }
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

fn polynomial_degree(name: &str, args: &ComponentArgs) -> Result<u8> {
    let invalid = |missing: Vec<String>, message: String| ComposeError::InvalidComponentArguments {
        kind: name.to_string(),
        missing,
        message,
    };

    if let Some(unknown) = args.keys().find(|k| k.as_str() != "degree") {
        return Err(invalid(Vec::new(), format!("unexpected argument '{}'", unknown)));
    }

    let degree = args.get("degree").copied().ok_or_else(|| {
        invalid(
            vec!["degree".to_string()],
            "missing required argument(s): degree".to_string(),
        )
    })?;

    if degree.fract() != 0.0 || !(0.0..=f64::from(MAX_POLYNOMIAL_DEGREE)).contains(&degree) {
        return Err(invalid(
            Vec::new(),
            format!(
                "degree must be an integer between 0 and {}, got {}",
                MAX_POLYNOMIAL_DEGREE, degree
            ),
        ));
    }

    Ok(degree as u8)
}

/// Reject data a guess cannot work with.
pub(crate) fn check_xy(x: &Array1<f64>, y: &Array1<f64>) -> Result<()> {
    if x.len() != y.len() {
        return Err(ComposeError::DimensionMismatch(format!(
            "x has {} points but y has {}",
            x.len(),
            y.len()
        )));
    }
    if x.is_empty() {
        return Err(ComposeError::InvalidInput("no data points".to_string()));
    }
    Ok(())
}

/// Index of the largest value; NaN never wins.
pub(crate) fn argmax(y: &Array1<f64>) -> usize {
    y.iter()
        .enumerate()
        .filter(|(_, v)| !v.is_nan())
        .max_by(|(_, a), (_, b)| a.total_cmp(b))
        .map(|(i, _)| i)
        .unwrap_or(0)
}

/// Keep the magnitude away from zero, preserving the sign.
pub(crate) fn not_zero(value: f64) -> f64 {
    if value.abs() < TINY {
        TINY.copysign(value)
    } else {
        value
    }
}

/// Least-squares polynomial coefficients, lowest order first.
pub(crate) fn polyfit(x: &Array1<f64>, y: &Array1<f64>, degree: usize) -> Result<Vec<f64>> {
    let rows = x.len();
    if rows <= degree {
        return Err(ComposeError::InvalidInput(format!(
            "a degree {} fit needs more than {} points",
            degree, rows
        )));
    }

    let design = DMatrix::from_fn(rows, degree + 1, |i, j| x[i].powi(j as i32));
    let rhs = DVector::from_iterator(rows, y.iter().copied());

    design
        .svd(true, true)
        .solve(&rhs, 1e-12)
        .map(|solution| solution.iter().copied().collect())
        .map_err(|e| ComposeError::FitFailure(format!("least squares guess failed: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_from_name_variants() {
        let none = ComponentArgs::new();
        assert_eq!(
            ComponentKind::from_name("GaussianModel", &none).unwrap(),
            ComponentKind::Gaussian
        );
        assert_eq!(
            ComponentKind::from_name("pvoigt", &none).unwrap(),
            ComponentKind::PseudoVoigt
        );
        assert!(ComponentKind::from_name("Sine", &none).is_err());

        let extra = ComponentArgs::from([("degree".to_string(), 2.0)]);
        assert!(ComponentKind::from_name("Gaussian", &extra).is_err());
    }

    #[test]
    fn test_polynomial_degree_validation() {
        match ComponentKind::from_name("Polynomial", &ComponentArgs::new()) {
            Err(ComposeError::InvalidComponentArguments { missing, .. }) => {
                assert_eq!(missing, vec!["degree".to_string()])
            }
            other => panic!("unexpected {:?}", other),
        }

        for bad in [-1.0, 2.5, 8.0] {
            let args = ComponentArgs::from([("degree".to_string(), bad)]);
            assert!(ComponentKind::from_name("Polynomial", &args).is_err());
        }

        let args = ComponentArgs::from([("degree".to_string(), 3.0)]);
        let kind = ComponentKind::from_name("polynomial", &args).unwrap();
        assert_eq!(kind.function_params(), vec!["c0", "c1", "c2", "c3"]);
    }

    #[test]
    fn test_prefix_letters() {
        assert_eq!(ComponentKind::Gaussian.prefix_letter(), 'g');
        assert_eq!(ComponentKind::Poisson.prefix_letter(), 'p');
        assert_eq!(ComponentKind::Polynomial { degree: 1 }.prefix_letter(), 'p');
        assert_eq!(ComponentKind::Quadratic.prefix_letter(), 'q');
    }

    #[test]
    fn test_hints_include_derived_parameters() {
        let hints = ComponentKind::Gaussian.default_hints();
        let names: Vec<&str> = hints.keys().map(|k| k.as_str()).collect();
        assert_eq!(names, vec!["amplitude", "center", "fwhm", "height", "sigma"]);
        assert_eq!(hints["sigma"].min, 0.0);
        assert!(hints["fwhm"].expr.is_some());
        assert!(!hints["fwhm"].vary);

        let hints = ComponentKind::Poisson.default_hints();
        assert_eq!(hints.len(), 2);
    }

    #[test]
    fn test_evaluate_checks_arity() {
        let x = Array1::linspace(0.0, 1.0, 3);
        assert!(ComponentKind::Linear.evaluate(&x, &[1.0]).is_err());

        let y = ComponentKind::Linear.evaluate(&x, &[2.0, 1.0]).unwrap();
        assert_relative_eq!(y[2], 3.0);
    }

    #[test]
    fn test_polyfit_recovers_coefficients() {
        let x = Array1::linspace(-2.0, 2.0, 9);
        let y = x.mapv(|v| 1.0 - 2.0 * v + 0.5 * v * v);
        let coeffs = polyfit(&x, &y, 2).unwrap();
        assert_relative_eq!(coeffs[0], 1.0, epsilon = 1e-10);
        assert_relative_eq!(coeffs[1], -2.0, epsilon = 1e-10);
        assert_relative_eq!(coeffs[2], 0.5, epsilon = 1e-10);

        let few = x.slice(ndarray::s![..2]).to_owned();
        assert!(polyfit(&few, &few, 2).is_err());
    }
}
