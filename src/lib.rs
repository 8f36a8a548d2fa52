//! # lmcompose-rs
//!
//! `lmcompose-rs` builds composite fit models out of predefined components
//! (Gaussian, Lorentzian, Poisson, polynomial backgrounds, ...) and keeps their
//! parameter names unique by assigning prefixes such as `g0_` automatically.
//!
//! The library provides:
//! - A catalogue of component kinds with parameter hints and starting-value guesses
//! - The [`CompositeModelRegistry`], which adds and removes components while
//!   keeping effective parameter names disjoint
//! - A parameter system with bounds, fixed flags and constraint expressions
//! - A [`ModelContainer`] holding a named model, its parameters and its fit results
//! - A [`FitEngine`] seam, with a Levenberg-Marquardt engine backed by the
//!   `levenberg-marquardt` crate
//!
//! ## Basic Usage
//!
//! ```
//! use lmcompose_rs::models::{Component, ComponentKind};
//! use lmcompose_rs::registry::CompositeModelRegistry;
//! use lmcompose_rs::model::CompositeModel;
//!
//! let registry = CompositeModelRegistry::default();
//! let model = registry.add(&CompositeModel::new(), Component::new(ComponentKind::Gaussian)).unwrap();
//! let model = registry.add(&model, Component::new(ComponentKind::Gaussian)).unwrap();
//!
//! assert_eq!(model.components()[0].prefix(), "");
//! assert_eq!(model.components()[1].prefix(), "g0_");
//! ```

// Public modules
pub mod config;
pub mod error;

// Parameter system
pub mod parameters;

// Components and composites
pub mod model;
pub mod models;
pub mod registry;

// Data, fitting and results
pub mod container;
pub mod data;
pub mod engine;
pub mod result;

// Re-exports for convenience
pub use config::{FitConfig, LastComponentPolicy, PrefixPolicy, RegistryConfig};
pub use container::{ModelContainer, ParameterValues};
pub use data::{ArtistData, DataRange, DataSource};
pub use engine::{FitEngine, FitOutcome};
pub use error::{ComposeError, Result};
pub use model::CompositeModel;
pub use models::{Component, ComponentArgs, ComponentKind};
pub use registry::CompositeModelRegistry;
pub use result::FitResult;

#[cfg(feature = "lm")]
pub use engine::LevenbergMarquardtEngine;

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
