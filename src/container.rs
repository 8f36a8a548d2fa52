//! A named composite model with its parameters and fit results.
//!
//! [`ModelContainer`] is what a fitting front end holds on to: it forwards
//! structural edits to the [`CompositeModelRegistry`], keeps a parameter set
//! in sync with the composite's effective names, and stores fit results by
//! name.

use crate::data::{ArtistData, DataRange};
use crate::engine::FitEngine;
use crate::error::{ComposeError, Result};
use crate::model::CompositeModel;
use crate::models::{Component, ComponentArgs, Guess};
use crate::parameters::Parameters;
use crate::registry::CompositeModelRegistry;
use crate::result::FitResult;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One row of a parameter grid: value, bounds and fixed flag.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParameterValues {
    pub value: f64,
    pub lower: f64,
    pub upper: f64,
    pub fixed: bool,
}

impl ParameterValues {
    pub fn new(value: f64, lower: f64, upper: f64, fixed: bool) -> Self {
        Self {
            value,
            lower,
            upper,
            fixed,
        }
    }

    /// A free, unbounded parameter.
    pub fn free(value: f64) -> Self {
        Self::new(value, f64::NEG_INFINITY, f64::INFINITY, false)
    }
}

/// A composite model together with its name, parameters and results.
#[derive(Debug, Clone)]
pub struct ModelContainer {
    name: String,
    registry: CompositeModelRegistry,
    model: CompositeModel,
    parameters: Parameters,
    results: BTreeMap<String, FitResult>,
}

impl ModelContainer {
    /// An empty container using the default registry configuration.
    pub fn new(name: &str) -> Self {
        Self::with_registry(name, CompositeModelRegistry::default())
    }

    pub fn with_registry(name: &str, registry: CompositeModelRegistry) -> Self {
        Self {
            name: name.to_string(),
            registry,
            model: CompositeModel::new(),
            parameters: Parameters::new(),
            results: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }

    pub fn model(&self) -> &CompositeModel {
        &self.model
    }

    pub fn components(&self) -> &[Component] {
        self.model.components()
    }

    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    /// Add a component from its catalogue name and construction arguments.
    ///
    /// # Examples
    ///
    /// ```
    /// use lmcompose_rs::{ComponentArgs, ModelContainer};
    ///
    /// let mut container = ModelContainer::new("peaks");
    /// container.add_component("Gaussian", &ComponentArgs::new()).unwrap();
    /// container.add_component("Gaussian", &ComponentArgs::new()).unwrap();
    ///
    /// assert!(container.parameters().contains("g0_sigma"));
    /// assert!(container.add_component("Polynomial", &ComponentArgs::new()).is_err());
    /// ```
    pub fn add_component(&mut self, name: &str, args: &ComponentArgs) -> Result<()> {
        let component = Component::from_args(name, args)?;
        self.add(component)
    }

    /// Add an already constructed component.
    pub fn add(&mut self, component: Component) -> Result<()> {
        let model = self.registry.add(&self.model, component)?;
        let origins: Vec<usize> = (0..self.model.len()).collect();
        self.replace_model(model, &origins)
    }

    /// Remove the component at `index`.
    pub fn remove_component(&mut self, index: usize) -> Result<()> {
        let model = self.registry.remove_at(&self.model, index)?;
        let origins: Vec<usize> = if model.len() == self.model.len() {
            (0..model.len()).collect()
        } else {
            (0..self.model.len()).filter(|&i| i != index).collect()
        };
        self.replace_model(model, &origins)
    }

    /// Effective name in `model` to the name the same parameter has in the
    /// current composite. `origins[i]` is the current position of the `i`-th
    /// component of `model`; components past the end of `origins` are new.
    fn previous_names(&self, model: &CompositeModel, origins: &[usize]) -> BTreeMap<String, String> {
        let mut names = BTreeMap::new();
        for (component, &origin) in model.components().iter().zip(origins) {
            let Some(before) = self.model.components().get(origin) else {
                continue;
            };
            for root in component.root_names() {
                names.insert(component.effective_name(&root), before.effective_name(&root));
            }
        }
        names
    }

    /// Swap in a new composite, carrying over the value, bounds and fixed
    /// flag of every free parameter of a surviving component, following any
    /// prefix the registry gave it.
    fn replace_model(&mut self, model: CompositeModel, origins: &[usize]) -> Result<()> {
        let mut params = model.make_default_parameters()?;

        for (name, previous) in self.previous_names(&model, origins) {
            let old = match self.parameters.get(&previous) {
                Some(old) => old,
                None => continue,
            };
            let param = match params.get_mut(&name) {
                Some(param) if param.expr().is_none() => param,
                _ => continue,
            };
            if name != previous {
                debug!("carrying {} over to {}", previous, name);
            }
            param.set_bounds(old.min(), old.max())?;
            param.set_value_clamped(old.value());
            param.set_fixed(old.fixed())?;
        }
        params.update_expressions()?;

        debug!("{} is now {}", self.name, model);
        self.model = model;
        self.parameters = params;
        Ok(())
    }

    /// Re-derive the default parameters, dropping every edit.
    fn reset_parameters(&mut self) -> Result<()> {
        self.parameters = self.model.make_default_parameters()?;
        Ok(())
    }

    fn mismatch(&mut self, found: Vec<String>) -> Result<()> {
        let expected = self.model.parameter_names();
        warn!(
            "parameters of {} do not match its components, re-deriving defaults",
            self.name
        );
        self.reset_parameters()?;
        Err(ComposeError::ParameterSetMismatch { expected, found })
    }

    /// Replace the parameter set.
    ///
    /// The names must be exactly the composite's effective names. Otherwise the
    /// default parameters are re-derived and
    /// [`ComposeError::ParameterSetMismatch`] is returned.
    pub fn set_parameters(&mut self, mut params: Parameters) -> Result<()> {
        if params.name_set() != self.model.effective_names() {
            return self.mismatch(params.names());
        }

        params.update_expressions()?;
        self.parameters = params;
        Ok(())
    }

    /// Apply edited grid rows to the named parameters.
    ///
    /// Rows for constrained parameters only update the bounds; their value
    /// follows the expression. Unknown names are handled like
    /// [`ModelContainer::set_parameters`] handles a mismatching set.
    pub fn update_parameters(&mut self, values: &BTreeMap<String, ParameterValues>) -> Result<()> {
        let unknown: Vec<String> = values
            .keys()
            .filter(|name| !self.parameters.contains(name))
            .cloned()
            .collect();
        if !unknown.is_empty() {
            return self.mismatch(unknown);
        }

        let mut params = self.parameters.clone();
        for (name, row) in values {
            let param = params.require_mut(name)?;
            param.set_bounds(row.lower, row.upper)?;
            if param.expr().is_none() {
                param.set_value_clamped(row.value);
                param.set_fixed(row.fixed)?;
            }
        }
        params.update_expressions()?;

        self.parameters = params;
        Ok(())
    }

    /// Guess starting values for every component from the data in `range`.
    pub fn guess(&mut self, data: &ArtistData, range: Option<&DataRange>) -> Result<()> {
        let selected = data.select(range);
        selected.validate()?;
        let guess = self.model.guess(&selected.x, &selected.y)?;
        self.apply_guess(guess)
    }

    /// Guess starting values for the component at `index` only.
    pub fn guess_component(
        &mut self,
        index: usize,
        data: &ArtistData,
        range: Option<&DataRange>,
    ) -> Result<()> {
        let component = self
            .model
            .components()
            .get(index)
            .ok_or(ComposeError::ComponentNotFound {
                index,
                len: self.model.len(),
            })?;

        let selected = data.select(range);
        selected.validate()?;
        let guess = component.guess(&selected.x, &selected.y)?;
        self.apply_guess(guess)
    }

    /// Guessed values are clamped into the current bounds. Fixed and
    /// constrained parameters keep their values.
    fn apply_guess(&mut self, guess: Guess) -> Result<()> {
        let mut params = self.parameters.clone();
        for (name, value) in guess {
            let param = params.require_mut(&name)?;
            if param.vary() {
                param.set_value_clamped(value);
            }
        }
        params.update_expressions()?;

        self.parameters = params;
        Ok(())
    }

    /// Fit the composite to the data in `range`, store the result under
    /// [`ModelContainer::next_result_name`] and take over the fitted values.
    pub fn fit<E>(&mut self, engine: &E, data: &ArtistData, range: Option<&DataRange>) -> Result<&FitResult>
    where
        E: FitEngine + ?Sized,
    {
        let selected = data.select(range);
        info!("fitting {} on {} of {} points", self.name, selected.len(), data.len());

        let outcome = engine.fit(&self.model, &self.parameters, &selected)?;
        if !outcome.success {
            warn!("fit of {} did not converge: {}", self.name, outcome.message);
        }

        let name = self.next_result_name();
        let result = FitResult::from_outcome(&name, &self.model, &self.parameters, outcome);
        self.parameters = result.params.clone();
        self.add_result(result);

        Ok(&self.results[&name])
    }

    /// Store a result under its name, returning any result it replaces.
    pub fn add_result(&mut self, result: FitResult) -> Option<FitResult> {
        info!("storing fit result {}", result.name);
        self.results.insert(result.name.clone(), result)
    }

    pub fn remove_result(&mut self, name: &str) -> Option<FitResult> {
        self.results.remove(name)
    }

    pub fn results(&self) -> &BTreeMap<String, FitResult> {
        &self.results
    }

    pub fn result(&self, name: &str) -> Option<&FitResult> {
        self.results.get(name)
    }

    /// `<name>_<i>` for the first `i` from 0 not taken by a stored result.
    pub fn next_result_name(&self) -> String {
        let mut i = 0usize;
        loop {
            let candidate = format!("{}_{}", self.name, i);
            if !self.results.contains_key(&candidate) {
                return candidate;
            }
            i += 1;
        }
    }
}
