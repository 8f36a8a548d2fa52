//! # Parameter System
//!
//! Named fit parameters with bounds, a fixed flag and optional constraint
//! expressions, in the manner of lmfit-py.
//!
//! - [`Parameter`]: value, bounds, fixed flag, expression, standard error
//! - [`Parameters`]: collection keyed by effective name, resolving
//!   constraint expressions in dependency order
//! - [`Bounds`] and [`BoundsTransform`]: the bounded/unbounded mapping used
//!   by the fit engine
//! - [`Expression`]: parser, evaluator and structural variable renaming
//!
//! ```rust
//! use lmcompose_rs::parameters::Parameters;
//!
//! let mut params = Parameters::new();
//! params.add_param_with_bounds("g0_sigma", 0.5, 0.0, f64::INFINITY).unwrap();
//! params.add_param_with_expr("g0_fwhm", 0.0, "2.3548200*g0_sigma").unwrap();
//! params.update_expressions().unwrap();
//!
//! assert_eq!(params.varying_names(), vec!["g0_sigma"]);
//! ```

pub mod bounds;
pub mod expression;
pub mod parameter;
pub mod parameters;

pub use bounds::{Bounds, BoundsError, BoundsTransform};
pub use expression::{EvaluationContext, Expression, ExpressionError, SimpleContext};
pub use parameter::{Parameter, ParameterError};
pub use parameters::Parameters;
