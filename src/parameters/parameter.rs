//! Parameter definition and implementation
//!
//! A [`Parameter`] carries a value, bounds, a fixed flag and an optional
//! constraint expression. Parameters with an expression are never varied by a
//! fit engine; their value is recomputed from the expression.

use crate::parameters::bounds::{Bounds, BoundsError, BoundsTransform};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur when working with parameters
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParameterError {
    #[error("Parameter '{name}' cannot have both an expression and be varied")]
    ExpressionAndVary { name: String },

    #[error("Bounds error: {0}")]
    BoundsError(#[from] BoundsError),

    #[error("Cannot evaluate expression for parameter '{name}': {message}")]
    ExpressionEvaluation { name: String, message: String },

    #[error("Parameter '{name}' not found")]
    ParameterNotFound { name: String },

    #[error("Parameter '{name}' already exists")]
    DuplicateParameter { name: String },

    #[error("Circular dependency in expression for parameter '{name}'")]
    CircularDependency { name: String },
}

/// A named fit parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    name: String,
    value: f64,

    /// Whether a fit engine may vary this parameter
    vary: bool,

    bounds: Bounds,

    /// Constraint expression in terms of other effective parameter names
    expr: Option<String>,

    /// Standard error, set after a fit
    stderr: Option<f64>,
}

impl Parameter {
    /// Create an unbounded, varying parameter.
    ///
    /// # Examples
    ///
    /// ```
    /// use lmcompose_rs::parameters::Parameter;
    ///
    /// let param = Parameter::new("amplitude", 10.0);
    /// assert_eq!(param.name(), "amplitude");
    /// assert!(!param.fixed());
    /// ```
    pub fn new(name: &str, value: f64) -> Self {
        Self {
            name: name.to_string(),
            value,
            vary: true,
            bounds: Bounds::default(),
            expr: None,
            stderr: None,
        }
    }

    /// Create a varying parameter with bounds; the value is clamped into them.
    pub fn with_bounds(name: &str, value: f64, min: f64, max: f64) -> Result<Self, ParameterError> {
        let bounds = Bounds::new(min, max)?;
        let value = bounds.clamp(value);

        Ok(Self {
            bounds,
            ..Self::new(name, value)
        })
    }

    /// Create a constrained parameter whose value follows `expr`.
    pub fn with_expr(name: &str, value: f64, expr: &str) -> Self {
        Self {
            vary: false,
            expr: Some(expr.to_string()),
            ..Self::new(name, value)
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    /// Set the value, rejecting values outside the bounds.
    pub fn set_value(&mut self, value: f64) -> Result<(), ParameterError> {
        if !self.bounds.is_within_bounds(value) {
            return Err(ParameterError::BoundsError(BoundsError::ValueOutsideBounds {
                value,
                min: self.bounds.min,
                max: self.bounds.max,
            }));
        }

        self.value = value;
        Ok(())
    }

    /// Set the value, clamping it into the bounds.
    pub fn set_value_clamped(&mut self, value: f64) {
        self.value = self.bounds.clamp(value);
    }

    pub fn vary(&self) -> bool {
        self.vary
    }

    /// Whether the value must not be varied by a fit engine.
    pub fn fixed(&self) -> bool {
        !self.vary
    }

    /// Set whether the parameter is varied; constrained parameters cannot vary.
    pub fn set_vary(&mut self, vary: bool) -> Result<(), ParameterError> {
        if vary && self.expr.is_some() {
            return Err(ParameterError::ExpressionAndVary {
                name: self.name.clone(),
            });
        }

        self.vary = vary;
        Ok(())
    }

    pub fn set_fixed(&mut self, fixed: bool) -> Result<(), ParameterError> {
        self.set_vary(!fixed)
    }

    pub fn min(&self) -> f64 {
        self.bounds.min
    }

    pub fn max(&self) -> f64 {
        self.bounds.max
    }

    pub fn bounds(&self) -> &Bounds {
        &self.bounds
    }

    /// Set both bounds; the current value is clamped into them.
    pub fn set_bounds(&mut self, min: f64, max: f64) -> Result<(), ParameterError> {
        let bounds = Bounds::new(min, max)?;
        self.bounds = bounds;
        self.value = bounds.clamp(self.value);
        Ok(())
    }

    pub fn expr(&self) -> Option<&str> {
        self.expr.as_deref()
    }

    /// Set or clear the constraint expression. Setting one fixes the parameter;
    /// clearing it leaves the fixed flag to the caller.
    pub fn set_expr(&mut self, expr: Option<&str>) {
        match expr {
            Some(expr) => {
                self.expr = Some(expr.to_string());
                self.vary = false;
            }
            None => self.expr = None,
        }
    }

    pub fn stderr(&self) -> Option<f64> {
        self.stderr
    }

    pub fn set_stderr(&mut self, stderr: Option<f64>) {
        self.stderr = stderr;
    }

    pub fn bounds_transform(&self) -> BoundsTransform {
        BoundsTransform::new(self.bounds)
    }

    /// The current value in the optimizer's unbounded space.
    pub fn to_internal(&self) -> Result<f64, ParameterError> {
        Ok(self.bounds_transform().to_internal(self.value)?)
    }

    /// The external value corresponding to an optimizer value.
    pub fn from_internal(&self, internal: f64) -> f64 {
        self.bounds_transform().to_external(internal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parameter_creation() {
        let param = Parameter::new("amplitude", 10.0);
        assert_eq!(param.value(), 10.0);
        assert!(param.vary());
        assert_eq!(param.min(), f64::NEG_INFINITY);
        assert!(param.expr().is_none());

        // Value is clamped into the bounds at construction
        let param = Parameter::with_bounds("sigma", -1.0, 0.0, f64::INFINITY).unwrap();
        assert_eq!(param.value(), 0.0);

        let param = Parameter::with_expr("fwhm", 2.35, "2.35482 * sigma");
        assert!(param.fixed());
        assert_eq!(param.expr(), Some("2.35482 * sigma"));
    }

    #[test]
    fn test_set_value_respects_bounds() {
        let mut param = Parameter::with_bounds("fraction", 0.5, 0.0, 1.0).unwrap();
        param.set_value(0.75).unwrap();
        assert_eq!(param.value(), 0.75);

        assert!(param.set_value(1.5).is_err());
        assert_eq!(param.value(), 0.75);

        param.set_value_clamped(1.5);
        assert_eq!(param.value(), 1.0);
    }

    #[test]
    fn test_fixed_and_expression() {
        let mut param = Parameter::new("center", 0.0);
        param.set_fixed(true).unwrap();
        assert!(param.fixed());
        param.set_fixed(false).unwrap();
        assert!(!param.fixed());

        param.set_expr(Some("2 * other"));
        assert!(param.fixed());
        assert!(param.set_fixed(false).is_err());

        param.set_expr(None);
        assert!(param.fixed());
        param.set_fixed(false).unwrap();
    }

    #[test]
    fn test_bounds_update_clamps_value() {
        let mut param = Parameter::new("amp", 10.0);
        param.set_bounds(0.0, 5.0).unwrap();
        assert_eq!(param.value(), 5.0);
        assert!(param.set_bounds(3.0, 1.0).is_err());
        assert_eq!(param.max(), 5.0);
        assert_eq!(param.value(), 5.0);
    }

    #[test]
    fn test_internal_round_trip() {
        let param = Parameter::with_bounds("amp", 4.0, 0.0, 10.0).unwrap();
        let internal = param.to_internal().unwrap();
        assert!((param.from_internal(internal) - 4.0).abs() < 1e-12);
    }
}
