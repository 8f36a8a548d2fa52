//! A single prefixed component of a composite model.

use super::{ComponentArgs, ComponentKind, Guess, ParamHint};
use crate::error::{ComposeError, Result};
use crate::parameters::expression::rewrite_references as rewrite_expr;
use crate::parameters::{Parameter, ParameterError, Parameters};
use ndarray::Array1;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// An immutable component: a kind, a prefix and the hints of its parameters.
///
/// Effective parameter names are `prefix + root name`. Constraint expressions
/// in the hints are written in effective names, so changing the prefix
/// rewrites them; see [`Component::with_prefix`].
#[derive(Debug, Clone, PartialEq)]
pub struct Component {
    kind: ComponentKind,
    prefix: String,
    hints: BTreeMap<String, ParamHint>,
}

impl Component {
    /// An unprefixed component with the kind's default hints.
    pub fn new(kind: ComponentKind) -> Self {
        Self {
            kind,
            prefix: String::new(),
            hints: kind.default_hints(),
        }
    }

    /// Build a component from a catalogue name and construction arguments.
    ///
    /// # Examples
    ///
    /// ```
    /// use lmcompose_rs::models::{Component, ComponentArgs};
    ///
    /// let args = ComponentArgs::from([("degree".to_string(), 1.0)]);
    /// let component = Component::from_args("Polynomial", &args).unwrap();
    /// assert_eq!(component.root_names(), vec!["c0", "c1"]);
    /// ```
    pub fn from_args(name: &str, args: &ComponentArgs) -> Result<Self> {
        Ok(Self::new(ComponentKind::from_name(name, args)?))
    }

    pub fn kind(&self) -> ComponentKind {
        self.kind
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn hints(&self) -> &BTreeMap<String, ParamHint> {
        &self.hints
    }

    /// Parameter names with an empty prefix, derived ones included.
    pub fn root_names(&self) -> Vec<String> {
        self.hints.keys().cloned().collect()
    }

    pub fn root_name_set(&self) -> BTreeSet<String> {
        self.hints.keys().cloned().collect()
    }

    pub fn effective_name(&self, root: &str) -> String {
        format!("{}{}", self.prefix, root)
    }

    pub fn effective_names(&self) -> BTreeSet<String> {
        self.hints.keys().map(|root| self.effective_name(root)).collect()
    }

    /// A copy under a new prefix, with its own constraint expressions rewritten
    /// to the new effective names.
    pub fn with_prefix(&self, prefix: &str) -> Result<Component> {
        let renames = self.renames_to(prefix);
        let mut renamed = self.rewrite_references(&renames)?;
        renamed.prefix = prefix.to_string();
        Ok(renamed)
    }

    /// Old effective name to new effective name for every parameter whose
    /// name would change under `prefix`.
    pub fn renames_to(&self, prefix: &str) -> BTreeMap<String, String> {
        if self.prefix == prefix {
            return BTreeMap::new();
        }

        self.hints
            .keys()
            .map(|root| (self.effective_name(root), format!("{}{}", prefix, root)))
            .collect()
    }

    /// A copy whose constraint expressions reference the renamed parameters.
    pub fn rewrite_references(&self, renames: &BTreeMap<String, String>) -> Result<Component> {
        let mut rewritten = self.clone();
        if renames.is_empty() {
            return Ok(rewritten);
        }

        for (root, hint) in rewritten.hints.iter_mut() {
            if let Some(expr) = hint.expr.as_mut() {
                let updated = rewrite_expr(expr, renames)?;
                if updated != *expr {
                    log::debug!(
                        "rewrote constraint of {}{}: '{}' -> '{}'",
                        self.prefix,
                        root,
                        expr,
                        updated
                    );
                    *expr = updated;
                }
            }
        }

        Ok(rewritten)
    }

    /// Add this component's default parameters to `params`.
    pub fn make_parameters(&self, params: &mut Parameters) -> Result<()> {
        for (root, hint) in &self.hints {
            let name = self.effective_name(root);
            let value = hint.value.unwrap_or(0.0);

            let mut param = Parameter::with_bounds(&name, value, hint.min, hint.max)?;
            match &hint.expr {
                Some(expr) => param.set_expr(Some(expr)),
                None => param.set_vary(hint.vary)?,
            }
            params.add(param)?;
        }
        Ok(())
    }

    /// Evaluate the component with values looked up by effective name.
    pub fn eval(&self, x: &Array1<f64>, params: &Parameters) -> Result<Array1<f64>> {
        let values = self
            .kind
            .function_params()
            .iter()
            .map(|root| {
                let name = self.effective_name(root);
                match params.get(&name) {
                    Some(param) => Ok(param.value()),
                    None => Err(ComposeError::from(ParameterError::ParameterNotFound { name })),
                }
            })
            .collect::<Result<Vec<f64>>>()?;

        self.kind.evaluate(x, &values)
    }

    /// Guessed starting values keyed by effective name.
    pub fn guess(&self, x: &Array1<f64>, y: &Array1<f64>) -> Result<Guess> {
        Ok(self
            .kind
            .guess(x, y)?
            .into_iter()
            .map(|(root, value)| (self.effective_name(&root), value))
            .collect())
    }

    /// Label used for per-component output: the prefix, or the kind name when
    /// the component is unprefixed.
    pub fn label(&self) -> String {
        if self.prefix.is_empty() {
            self.kind.name().to_string()
        } else {
            self.prefix.clone()
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.prefix.is_empty() {
            write!(f, "Model({})", self.kind.name())
        } else {
            write!(f, "Model({}, prefix='{}')", self.kind.name(), self.prefix)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_new_component_is_unprefixed() {
        let g = Component::new(ComponentKind::Gaussian);
        assert_eq!(g.prefix(), "");
        assert!(g.effective_names().contains("sigma"));
        assert_eq!(g.to_string(), "Model(gaussian)");
    }

    #[test]
    fn test_with_prefix_rewrites_own_expressions() {
        let g = Component::new(ComponentKind::Gaussian).with_prefix("g0_").unwrap();
        assert_eq!(g.prefix(), "g0_");
        assert_eq!(g.hints()["fwhm"].expr.as_deref(), Some("2.35482 * g0_sigma"));
        assert_eq!(
            g.hints()["height"].expr.as_deref(),
            Some("0.3989423 * g0_amplitude / max(0.000000000000001, g0_sigma)")
        );
        assert_eq!(g.to_string(), "Model(gaussian, prefix='g0_')");

        // Re-prefixing goes through the effective names, not the roots
        let g = g.with_prefix("g1_").unwrap();
        assert_eq!(g.hints()["fwhm"].expr.as_deref(), Some("2.35482 * g1_sigma"));
    }

    #[test]
    fn test_same_prefix_is_a_no_op() {
        let g = Component::new(ComponentKind::Gaussian);
        assert!(g.renames_to("").is_empty());
        assert_eq!(g.with_prefix("").unwrap(), g);
    }

    #[test]
    fn test_make_parameters_and_eval() {
        let g = Component::new(ComponentKind::Gaussian).with_prefix("g0_").unwrap();
        let mut params = Parameters::new();
        g.make_parameters(&mut params).unwrap();
        params.update_expressions().unwrap();

        assert_eq!(params.len(), 5);
        assert!(params.get("g0_fwhm").unwrap().fixed());
        assert_relative_eq!(params.get("g0_fwhm").unwrap().value(), 2.35482);
        assert_eq!(params.get("g0_sigma").unwrap().min(), 0.0);

        let x = Array1::from_vec(vec![0.0]);
        let y = g.eval(&x, &params).unwrap();
        assert_relative_eq!(y[0], 0.3989422804014327, epsilon = 1e-12);

        assert!(g.eval(&x, &Parameters::new()).is_err());
    }

    #[test]
    fn test_guess_uses_effective_names() {
        let line = Component::new(ComponentKind::Linear).with_prefix("l0_").unwrap();
        let x = Array1::linspace(0.0, 1.0, 5);
        let guess = line.guess(&x, &x.mapv(|v| 2.0 * v)).unwrap();
        assert_relative_eq!(guess["l0_slope"], 2.0, epsilon = 1e-10);
        assert!(guess.contains_key("l0_intercept"));
    }
}
