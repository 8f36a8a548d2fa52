//! Named parameter collection with constraint resolution.

use crate::parameters::expression::{EvaluationContext, Expression, ExpressionError};
use crate::parameters::parameter::{Parameter, ParameterError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// A collection of parameters keyed by effective name.
///
/// Iteration is in name order, which is also the order of the vectors handed
/// to and from a fit engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Parameters {
    params: BTreeMap<String, Parameter>,
}

impl Parameters {
    /// Create an empty collection.
    ///
    /// # Examples
    ///
    /// ```
    /// use lmcompose_rs::parameters::Parameters;
    ///
    /// let mut params = Parameters::new();
    /// params.add_param_with_bounds("sigma", 1.0, 0.0, f64::INFINITY).unwrap();
    /// params.add_param_with_expr("fwhm", 0.0, "2.3548200*sigma").unwrap();
    /// params.update_expressions().unwrap();
    ///
    /// assert!((params.get("fwhm").unwrap().value() - 2.35482).abs() < 1e-12);
    /// ```
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parameter; a parameter of the same name must not exist.
    pub fn add(&mut self, param: Parameter) -> Result<(), ParameterError> {
        if self.params.contains_key(param.name()) {
            return Err(ParameterError::DuplicateParameter {
                name: param.name().to_string(),
            });
        }

        self.params.insert(param.name().to_string(), param);
        Ok(())
    }

    pub fn add_param(&mut self, name: &str, value: f64) -> Result<(), ParameterError> {
        self.add(Parameter::new(name, value))
    }

    pub fn add_param_with_bounds(
        &mut self,
        name: &str,
        value: f64,
        min: f64,
        max: f64,
    ) -> Result<(), ParameterError> {
        self.add(Parameter::with_bounds(name, value, min, max)?)
    }

    pub fn add_param_with_expr(
        &mut self,
        name: &str,
        value: f64,
        expr: &str,
    ) -> Result<(), ParameterError> {
        self.add(Parameter::with_expr(name, value, expr))
    }

    pub fn get(&self, name: &str) -> Option<&Parameter> {
        self.params.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Parameter> {
        self.params.get_mut(name)
    }

    /// Like [`Parameters::get_mut`], but reports a missing name as an error.
    pub fn require_mut(&mut self, name: &str) -> Result<&mut Parameter, ParameterError> {
        self.params
            .get_mut(name)
            .ok_or_else(|| ParameterError::ParameterNotFound {
                name: name.to_string(),
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.params.contains_key(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Parameter> {
        self.params.remove(name)
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Parameter names in iteration order.
    pub fn names(&self) -> Vec<String> {
        self.params.keys().cloned().collect()
    }

    pub fn name_set(&self) -> BTreeSet<String> {
        self.params.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Parameter)> {
        self.params.iter()
    }

    /// Parameters the fit engine may vary, in name order.
    pub fn varying(&self) -> Vec<&Parameter> {
        self.params.values().filter(|p| p.vary()).collect()
    }

    pub fn varying_names(&self) -> Vec<String> {
        self.varying().iter().map(|p| p.name().to_string()).collect()
    }

    /// Values of the varying parameters in the optimizer's unbounded space.
    pub fn varying_internal_values(&self) -> Result<Vec<f64>, ParameterError> {
        self.varying().iter().map(|p| p.to_internal()).collect()
    }

    /// Set the varying parameters from optimizer values, then recompute the
    /// constrained ones.
    pub fn update_from_internal(&mut self, values: &[f64]) -> Result<(), ParameterError> {
        let names = self.varying_names();
        if names.len() != values.len() {
            return Err(ParameterError::ExpressionEvaluation {
                name: String::from("<internal>"),
                message: format!(
                    "expected {} internal values, got {}",
                    names.len(),
                    values.len()
                ),
            });
        }

        for (name, &internal) in names.iter().zip(values) {
            let param = self.require_mut(name)?;
            let external = param.from_internal(internal);
            param.set_value_clamped(external);
        }

        self.update_expressions()
    }

    /// Names of the constrained parameters, each after every constrained
    /// parameter its expression depends on.
    pub fn evaluation_order(&self) -> Result<Vec<String>, ParameterError> {
        let mut deps: BTreeMap<&str, Vec<String>> = BTreeMap::new();
        for (name, param) in &self.params {
            if let Some(expr) = param.expr() {
                let parsed = parse_for(name, expr)?;
                let constrained = parsed
                    .variables()
                    .into_iter()
                    .filter(|var| self.params.get(var).is_some_and(|p| p.expr().is_some()))
                    .collect();
                deps.insert(name.as_str(), constrained);
            }
        }

        fn visit<'a>(
            name: &'a str,
            deps: &'a BTreeMap<&str, Vec<String>>,
            done: &mut BTreeSet<&'a str>,
            active: &mut BTreeSet<&'a str>,
            order: &mut Vec<String>,
        ) -> Result<(), ParameterError> {
            if done.contains(name) {
                return Ok(());
            }
            if !active.insert(name) {
                return Err(ParameterError::CircularDependency {
                    name: name.to_string(),
                });
            }

            for dep in deps.get(name).into_iter().flatten() {
                visit(dep, deps, done, active, order)?;
            }

            active.remove(name);
            done.insert(name);
            order.push(name.to_string());
            Ok(())
        }

        let mut order = Vec::with_capacity(deps.len());
        let mut done = BTreeSet::new();
        let mut active = BTreeSet::new();
        for name in deps.keys() {
            visit(name, &deps, &mut done, &mut active, &mut order)?;
        }

        Ok(order)
    }

    /// Recompute every constrained parameter from its expression.
    ///
    /// Values are clamped into the parameter's bounds.
    pub fn update_expressions(&mut self) -> Result<(), ParameterError> {
        for name in self.evaluation_order()? {
            let expr = match self.params.get(&name).and_then(|p| p.expr()) {
                Some(expr) => parse_for(&name, expr)?,
                None => continue,
            };

            let value = expr
                .evaluate(&*self)
                .map_err(|e| ParameterError::ExpressionEvaluation {
                    name: name.clone(),
                    message: e.to_string(),
                })?;

            self.require_mut(&name)?.set_value_clamped(value);
        }

        Ok(())
    }

    /// Current values keyed by name.
    pub fn values(&self) -> BTreeMap<String, f64> {
        self.params
            .iter()
            .map(|(name, p)| (name.clone(), p.value()))
            .collect()
    }
}

fn parse_for(name: &str, expr: &str) -> Result<Expression, ParameterError> {
    Expression::parse(expr).map_err(|e| ParameterError::ExpressionEvaluation {
        name: name.to_string(),
        message: e.to_string(),
    })
}

impl EvaluationContext for Parameters {
    fn get_variable(&self, name: &str) -> Result<f64, ExpressionError> {
        self.params
            .get(name)
            .map(|p| p.value())
            .ok_or_else(|| ExpressionError::UndefinedVariable {
                name: name.to_string(),
            })
    }
}

impl FromIterator<Parameter> for Parameters {
    /// Later parameters replace earlier ones of the same name.
    fn from_iter<I: IntoIterator<Item = Parameter>>(iter: I) -> Self {
        Self {
            params: iter
                .into_iter()
                .map(|p| (p.name().to_string(), p))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_duplicates_are_rejected() {
        let mut params = Parameters::new();
        params.add_param("amp", 1.0).unwrap();
        assert_eq!(
            params.add_param("amp", 2.0),
            Err(ParameterError::DuplicateParameter {
                name: "amp".to_string()
            })
        );
        assert_eq!(params.get("amp").unwrap().value(), 1.0);
    }

    #[test]
    fn test_chained_expressions_resolve_in_order() {
        let mut params = Parameters::new();
        params.add_param("sigma", 2.0).unwrap();
        // a_double sorts first by name but depends on z_width
        params.add_param_with_expr("z_width", 0.0, "2 * sigma").unwrap();
        params.add_param_with_expr("a_double", 0.0, "z_width * 2").unwrap();

        assert_eq!(params.evaluation_order().unwrap(), vec!["z_width", "a_double"]);
        params.update_expressions().unwrap();
        assert_eq!(params.get("a_double").unwrap().value(), 8.0);
    }

    #[test]
    fn test_circular_dependency_detected() {
        let mut params = Parameters::new();
        params.add_param_with_expr("a", 0.0, "b + 1").unwrap();
        params.add_param_with_expr("b", 0.0, "a + 1").unwrap();

        assert!(matches!(
            params.update_expressions(),
            Err(ParameterError::CircularDependency { .. })
        ));
    }

    #[test]
    fn test_unknown_reference_is_an_error() {
        let mut params = Parameters::new();
        params.add_param_with_expr("fwhm", 0.0, "2 * sigma").unwrap();
        assert!(matches!(
            params.update_expressions(),
            Err(ParameterError::ExpressionEvaluation { .. })
        ));
    }

    #[test]
    fn test_internal_values_only_cover_varying_parameters() {
        let mut params = Parameters::new();
        params.add_param_with_bounds("amp", 5.0, 0.0, 10.0).unwrap();
        params.add_param("center", 1.0).unwrap();
        params.add_param("offset", 0.5).unwrap();
        params.get_mut("offset").unwrap().set_fixed(true).unwrap();
        params.add_param_with_expr("twice", 0.0, "2 * center").unwrap();

        assert_eq!(params.varying_names(), vec!["amp", "center"]);

        let internal = params.varying_internal_values().unwrap();
        assert_eq!(internal.len(), 2);

        params.update_from_internal(&[internal[0], 3.0]).unwrap();
        assert_relative_eq!(params.get("amp").unwrap().value(), 5.0, epsilon = 1e-12);
        assert_eq!(params.get("center").unwrap().value(), 3.0);
        assert_eq!(params.get("twice").unwrap().value(), 6.0);
        assert_eq!(params.get("offset").unwrap().value(), 0.5);

        assert!(params.update_from_internal(&[1.0]).is_err());
    }
}
