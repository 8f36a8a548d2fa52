//! Composite models: ordered sums of components.
//!
//! A [`CompositeModel`] never holds two components that share an effective
//! parameter name. Values are immutable; the
//! [`CompositeModelRegistry`](crate::registry::CompositeModelRegistry) builds
//! new composites instead of editing existing ones.

use crate::error::{ComposeError, Result};
use crate::models::{Component, Guess};
use crate::parameters::Parameters;
use ndarray::Array1;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// An ordered collection of components evaluated as their sum.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompositeModel {
    components: Vec<Component>,
}

impl CompositeModel {
    /// An empty composite.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a composite from components whose effective names are already
    /// disjoint.
    pub fn from_components(components: Vec<Component>) -> Result<Self> {
        let mut seen = BTreeSet::new();
        for component in &components {
            for name in component.effective_names() {
                if !seen.insert(name.clone()) {
                    return Err(ComposeError::InvalidInput(format!(
                        "parameter name '{}' is used by more than one component",
                        name
                    )));
                }
            }
        }
        Ok(Self { components })
    }

    /// Append without checking names; callers guarantee disjointness.
    pub(crate) fn push_unchecked(&mut self, component: Component) {
        self.components.push(component);
    }

    pub fn components(&self) -> &[Component] {
        &self.components
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Index of the first component equal to `component`.
    pub fn position(&self, component: &Component) -> Option<usize> {
        self.components.iter().position(|c| c == component)
    }

    pub fn contains(&self, component: &Component) -> bool {
        self.position(component).is_some()
    }

    /// Effective parameter names of all components.
    pub fn effective_names(&self) -> BTreeSet<String> {
        self.components
            .iter()
            .flat_map(|c| c.effective_names())
            .collect()
    }

    /// Prefixes currently in use, the empty prefix excluded.
    pub fn used_prefixes(&self) -> BTreeSet<String> {
        self.components
            .iter()
            .map(|c| c.prefix().to_string())
            .filter(|p| !p.is_empty())
            .collect()
    }

    /// Sorted effective parameter names.
    pub fn parameter_names(&self) -> Vec<String> {
        self.effective_names().into_iter().collect()
    }

    /// Default parameters of every component, constraints resolved.
    ///
    /// # Examples
    ///
    /// ```
    /// use lmcompose_rs::model::CompositeModel;
    /// use lmcompose_rs::models::{Component, ComponentKind};
    ///
    /// let model = CompositeModel::from_components(vec![Component::new(ComponentKind::Linear)]).unwrap();
    /// let params = model.make_default_parameters().unwrap();
    /// assert_eq!(params.names(), vec!["intercept", "slope"]);
    /// ```
    pub fn make_default_parameters(&self) -> Result<Parameters> {
        let mut params = Parameters::new();
        for component in &self.components {
            component.make_parameters(&mut params)?;
        }
        params.update_expressions()?;
        Ok(params)
    }

    /// Sum of all components at `x`. Constraint expressions are resolved on
    /// a copy of `params` first.
    pub fn evaluate(&self, x: &Array1<f64>, params: &Parameters) -> Result<Array1<f64>> {
        let resolved = resolved(params)?;
        let mut total = Array1::<f64>::zeros(x.len());
        for component in &self.components {
            total += &component.eval(x, &resolved)?;
        }
        Ok(total)
    }

    /// Each component evaluated on its own, keyed by [`Component::label`].
    pub fn eval_components(
        &self,
        x: &Array1<f64>,
        params: &Parameters,
    ) -> Result<BTreeMap<String, Array1<f64>>> {
        let resolved = resolved(params)?;
        let mut parts = BTreeMap::new();
        for component in &self.components {
            parts.insert(component.label(), component.eval(x, &resolved)?);
        }
        Ok(parts)
    }

    /// Union of the component guesses, keyed by effective name.
    pub fn guess(&self, x: &Array1<f64>, y: &Array1<f64>) -> Result<Guess> {
        let mut guess = Guess::new();
        for component in &self.components {
            guess.extend(component.guess(x, y)?);
        }
        Ok(guess)
    }
}

fn resolved(params: &Parameters) -> Result<Parameters> {
    let mut resolved = params.clone();
    resolved.update_expressions()?;
    Ok(resolved)
}

impl fmt::Display for CompositeModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.components.is_empty() {
            return write!(f, "(empty)");
        }
        for (i, component) in self.components.iter().enumerate() {
            if i > 0 {
                write!(f, " + ")?;
            }
            write!(f, "{}", component)?;
        }
        Ok(())
    }
}
