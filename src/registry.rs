//! Assembly and disassembly of composite models.
//!
//! The registry is the only place that assigns prefixes. Adding a component
//! gives it (and, under [`PrefixPolicy::Symmetric`], the existing components it
//! clashes with) a prefix such as `g0_` so that every effective parameter name
//! in the composite stays unique. Removing a component rebuilds the composite
//! from the survivors by replaying [`CompositeModelRegistry::add`].

use crate::config::{LastComponentPolicy, PrefixPolicy, RegistryConfig};
use crate::error::{ComposeError, Result};
use crate::model::CompositeModel;
use crate::models::Component;
use log::debug;
use std::collections::{BTreeMap, BTreeSet};

/// Builds composite models while keeping their parameter names disjoint.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompositeModelRegistry {
    config: RegistryConfig,
}

impl CompositeModelRegistry {
    /// Create a registry with a validated configuration.
    pub fn new(config: RegistryConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// The first prefix `<letter><i><separator>` not in `used`, counting `i`
    /// up from 0. The letter is the first character of the kind's function
    /// name.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::collections::BTreeSet;
    /// use lmcompose_rs::models::{Component, ComponentKind};
    /// use lmcompose_rs::registry::CompositeModelRegistry;
    ///
    /// let registry = CompositeModelRegistry::default();
    /// let gaussian = Component::new(ComponentKind::Gaussian);
    /// let used = BTreeSet::from(["g0_".to_string()]);
    /// assert_eq!(registry.generate_prefix(&gaussian, &used).unwrap(), "g1_");
    /// ```
    pub fn generate_prefix(&self, component: &Component, used: &BTreeSet<String>) -> Result<String> {
        let letter = component.kind().prefix_letter();

        for i in 0..=u32::MAX {
            let candidate = format!("{}{}{}", letter, i, self.config.separator);
            if !used.contains(&candidate) {
                return Ok(candidate);
            }
        }

        Err(ComposeError::PrefixExhausted(component.kind().name().to_string()))
    }

    /// A new composite holding the components of `composite` followed by
    /// `component`, with prefixes assigned so that no effective parameter
    /// name is shared.
    ///
    /// Constraint expressions of renamed existing components, and references
    /// to them from other existing components, are rewritten. The incoming
    /// component's expressions refer to its own parameters and only follow
    /// its own prefix.
    pub fn add(&self, composite: &CompositeModel, component: Component) -> Result<CompositeModel> {
        if composite.is_empty() {
            let mut single = CompositeModel::new();
            single.push_unchecked(component);
            return Ok(single);
        }

        let mut used = composite.used_prefixes();
        if !component.prefix().is_empty() {
            used.insert(component.prefix().to_string());
        }

        let mut existing = composite.components().to_vec();
        let mut incoming = component;

        match self.config.prefix_policy {
            PrefixPolicy::Minimal => {
                if !incoming.effective_names().is_disjoint(&composite.effective_names()) {
                    incoming = self.assign_prefix(&incoming, &mut used)?;
                }
            }
            PrefixPolicy::Symmetric => {
                let (clash, renames) = self.prefix_clashing(&mut existing, &incoming, &mut used)?;

                if !renames.is_empty() {
                    for other in existing.iter_mut() {
                        *other = other.rewrite_references(&renames)?;
                    }
                }

                if clash {
                    let keep = !incoming.prefix().is_empty()
                        && incoming.effective_names().is_disjoint(&names_of(&existing));
                    if !keep {
                        incoming = self.assign_prefix(&incoming, &mut used)?;
                    }
                }
            }
        }

        // Kinds whose root names only clash after prefixing are resolved here
        let taken = names_of(&existing);
        while !incoming.effective_names().is_disjoint(&taken) {
            incoming = self.assign_prefix(&incoming, &mut used)?;
        }

        existing.push(incoming);
        CompositeModel::from_components(existing)
    }

    /// A new composite without `target`.
    ///
    /// A `target` that is not a member leaves the composite unchanged. When
    /// `target` is the only component the configured
    /// [`LastComponentPolicy`] decides. Otherwise the survivors are added one
    /// by one to an empty composite; prefixes they already carry are kept.
    pub fn remove(&self, composite: &CompositeModel, target: &Component) -> Result<CompositeModel> {
        match composite.position(target) {
            Some(index) => self.remove_at(composite, index),
            None => {
                debug!("{} is not part of {}, nothing removed", target, composite);
                Ok(composite.clone())
            }
        }
    }

    /// Like [`CompositeModelRegistry::remove`], selecting the component by
    /// position.
    pub fn remove_at(&self, composite: &CompositeModel, index: usize) -> Result<CompositeModel> {
        if index >= composite.len() {
            return Err(ComposeError::ComponentNotFound {
                index,
                len: composite.len(),
            });
        }

        if composite.len() == 1 {
            return Ok(match self.config.last_component {
                LastComponentPolicy::Clear => CompositeModel::new(),
                LastComponentPolicy::Keep => composite.clone(),
            });
        }

        let mut rebuilt = CompositeModel::new();
        for (i, component) in composite.components().iter().enumerate() {
            if i != index {
                rebuilt = self.add(&rebuilt, component.clone())?;
            }
        }
        Ok(rebuilt)
    }

    /// Give every unprefixed existing component whose root names intersect
    /// the incoming ones a fresh prefix. Returns whether any root clash was
    /// found and the renames applied.
    fn prefix_clashing(
        &self,
        existing: &mut [Component],
        incoming: &Component,
        used: &mut BTreeSet<String>,
    ) -> Result<(bool, BTreeMap<String, String>)> {
        let incoming_roots = incoming.root_name_set();
        let mut clash = false;
        let mut renames = BTreeMap::new();

        for component in existing.iter_mut() {
            if component.root_name_set().is_disjoint(&incoming_roots) {
                continue;
            }
            clash = true;

            if component.prefix().is_empty() {
                let prefix = self.generate_prefix(component, used)?;
                used.insert(prefix.clone());
                renames.extend(component.renames_to(&prefix));
                debug!("assigning prefix '{}' to existing {}", prefix, component);
                *component = component.with_prefix(&prefix)?;
            }
        }

        Ok((clash, renames))
    }

    fn assign_prefix(&self, component: &Component, used: &mut BTreeSet<String>) -> Result<Component> {
        let prefix = self.generate_prefix(component, used)?;
        used.insert(prefix.clone());
        debug!("assigning prefix '{}' to incoming {}", prefix, component);
        component.with_prefix(&prefix)
    }
}

fn names_of(components: &[Component]) -> BTreeSet<String> {
    components.iter().flat_map(|c| c.effective_names()).collect()
}
