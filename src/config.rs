//! Configuration for composite assembly and fitting.
//!
//! Both configuration structs deserialize from JSON with every field optional,
//! falling back to the defaults documented on each field.

use crate::error::{ComposeError, Result};
use serde::{Deserialize, Serialize};

/// How the registry resolves a parameter-name clash when a component is added.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PrefixPolicy {
    /// Only the incoming component receives a prefix, and only when its
    /// effective names collide with the composite. Existing components keep
    /// their prefixes, so `G + G` yields `""` and `"g0_"`.
    #[default]
    Minimal,

    /// Every existing unprefixed component whose root names clash with the
    /// incoming component receives a prefix, then the incoming component
    /// receives one too. `G + G` yields `"g0_"` and `"g1_"`.
    Symmetric,
}

/// What removing the sole remaining component of a composite does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LastComponentPolicy {
    /// The composite becomes empty.
    #[default]
    Clear,

    /// The composite is returned unchanged.
    Keep,
}

/// Configuration for the [`CompositeModelRegistry`](crate::registry::CompositeModelRegistry).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Clash resolution policy. Default: Minimal
    pub prefix_policy: PrefixPolicy,

    /// Removal of the last component. Default: Clear
    pub last_component: LastComponentPolicy,

    /// Character closing every generated prefix. Default: '_'
    pub separator: char,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            prefix_policy: PrefixPolicy::default(),
            last_component: LastComponentPolicy::default(),
            separator: '_',
        }
    }
}

impl RegistryConfig {
    /// Parse a registry configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Set the clash resolution policy.
    pub fn with_prefix_policy(mut self, policy: PrefixPolicy) -> Self {
        self.prefix_policy = policy;
        self
    }

    /// Set the last-component removal policy.
    pub fn with_last_component(mut self, policy: LastComponentPolicy) -> Self {
        self.last_component = policy;
        self
    }

    /// Set the prefix separator.
    pub fn with_separator(mut self, separator: char) -> Self {
        self.separator = separator;
        self
    }

    /// Check that generated prefixes can form valid identifiers.
    pub fn validate(&self) -> Result<()> {
        if !(self.separator == '_' || self.separator.is_ascii_alphanumeric()) {
            return Err(ComposeError::InvalidConfig(format!(
                "separator '{}' cannot appear in a parameter name",
                self.separator
            )));
        }
        Ok(())
    }
}

/// Configuration options for the Levenberg-Marquardt fit engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitConfig {
    /// Relative tolerance on the reduction of the sum of squares. Default: 1e-10
    pub ftol: f64,

    /// Relative tolerance on the change of the parameters. Default: 1e-10
    pub xtol: f64,

    /// Tolerance on the orthogonality of residuals and Jacobian columns. Default: 0.0
    pub gtol: f64,

    /// Factor for the initial step bound. Default: 100.0
    pub stepbound: f64,

    /// Evaluation budget as a multiple of (number of varying parameters + 1). Default: 100
    pub patience: usize,

    /// Whether to rescale the parameters internally. Default: true
    pub scale_diag: bool,

    /// Relative step for the finite-difference Jacobian. Default: 1e-8
    pub diff_epsilon: f64,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            ftol: 1e-10,
            xtol: 1e-10,
            gtol: 0.0,
            stepbound: 100.0,
            patience: 100,
            scale_diag: true,
            diff_epsilon: 1e-8,
        }
    }
}

impl FitConfig {
    /// Parse a fit configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_ftol(mut self, ftol: f64) -> Self {
        self.ftol = ftol;
        self
    }

    pub fn with_xtol(mut self, xtol: f64) -> Self {
        self.xtol = xtol;
        self
    }

    pub fn with_gtol(mut self, gtol: f64) -> Self {
        self.gtol = gtol;
        self
    }

    pub fn with_stepbound(mut self, stepbound: f64) -> Self {
        self.stepbound = stepbound;
        self
    }

    pub fn with_patience(mut self, patience: usize) -> Self {
        self.patience = patience;
        self
    }

    pub fn with_scale_diag(mut self, scale_diag: bool) -> Self {
        self.scale_diag = scale_diag;
        self
    }

    /// Relative finite-difference step.
    pub fn with_diff_epsilon(mut self, diff_epsilon: f64) -> Self {
        self.diff_epsilon = diff_epsilon;
        self
    }

    /// Check the values the solver would otherwise reject with a panic.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [("ftol", self.ftol), ("xtol", self.xtol), ("gtol", self.gtol)] {
            if !(value >= 0.0) {
                return Err(ComposeError::InvalidConfig(format!(
                    "{} must be non-negative, got {}",
                    name, value
                )));
            }
        }
        if !(self.stepbound > 0.0) {
            return Err(ComposeError::InvalidConfig(format!(
                "stepbound must be positive, got {}",
                self.stepbound
            )));
        }
        if self.patience == 0 {
            return Err(ComposeError::InvalidConfig(
                "patience must be positive".to_string(),
            ));
        }
        if !(self.diff_epsilon > 0.0) {
            return Err(ComposeError::InvalidConfig(format!(
                "diff_epsilon must be positive, got {}",
                self.diff_epsilon
            )));
        }
        Ok(())
    }
}
