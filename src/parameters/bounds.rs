//! Parameter bounds and the bounded/unbounded value transform.
//!
//! The fit engine works on unbounded internal values. [`BoundsTransform`]
//! maps them to external values that always lie inside the bounds, using the
//! same sine and square-root mappings as MINUIT and lmfit.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur when working with parameter bounds
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BoundsError {
    #[error("Invalid bounds: min ({min}) must not exceed max ({max})")]
    InvalidBounds { min: f64, max: f64 },

    #[error("Parameter value {value} is outside bounds: [{min}, {max}]")]
    ValueOutsideBounds { value: f64, min: f64, max: f64 },

    #[error("Invalid bounds: min and max are both {value}, fix the parameter instead")]
    EmptyInterval { value: f64 },

    #[error("Infinite parameter value is not allowed")]
    InfiniteValue,
}

/// Lower and upper bound of a parameter; infinite means unbounded on that side.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min: f64,
    pub max: f64,
}

// JSON has no infinity, so open sides are written as null.
impl Serialize for Bounds {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;

        let mut state = serializer.serialize_struct("Bounds", 2)?;
        state.serialize_field("min", &self.min.is_finite().then_some(self.min))?;
        state.serialize_field("max", &self.max.is_finite().then_some(self.max))?;
        state.end()
    }
}

impl<'de> Deserialize<'de> for Bounds {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct BoundsHelper {
            #[serde(default)]
            min: Option<f64>,

            #[serde(default)]
            max: Option<f64>,
        }

        let helper = BoundsHelper::deserialize(deserializer)?;
        Bounds::new(
            helper.min.unwrap_or(f64::NEG_INFINITY),
            helper.max.unwrap_or(f64::INFINITY),
        )
        .map_err(serde::de::Error::custom)
    }
}

impl Default for Bounds {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl Bounds {
    /// Create bounds, rejecting `min >= max` and NaN.
    ///
    /// # Examples
    ///
    /// ```
    /// use lmcompose_rs::parameters::Bounds;
    ///
    /// let bounds = Bounds::new(0.0, 10.0).unwrap();
    /// assert!(bounds.is_within_bounds(5.0));
    /// assert!(Bounds::new(1.0, 0.0).is_err());
    /// assert!(Bounds::new(2.0, 2.0).is_err());
    /// ```
    pub fn new(min: f64, max: f64) -> Result<Self, BoundsError> {
        if min.is_nan() || max.is_nan() || min > max {
            return Err(BoundsError::InvalidBounds { min, max });
        }
        // The sine transform divides by the width of the interval
        if min == max {
            return Err(BoundsError::EmptyInterval { value: min });
        }

        Ok(Self { min, max })
    }

    /// Bounds from negative to positive infinity.
    pub fn unbounded() -> Self {
        Self {
            min: f64::NEG_INFINITY,
            max: f64::INFINITY,
        }
    }

    /// Bounds with only a lower limit.
    pub fn min_only(min: f64) -> Self {
        Self {
            min,
            max: f64::INFINITY,
        }
    }

    pub fn is_within_bounds(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    pub fn has_lower_bound(&self) -> bool {
        self.min.is_finite()
    }

    pub fn has_upper_bound(&self) -> bool {
        self.max.is_finite()
    }

    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.min, self.max)
    }
}

/// Maps between bounded external values and unbounded internal values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundsTransform {
    bounds: Bounds,
}

impl BoundsTransform {
    pub fn new(bounds: Bounds) -> Self {
        Self { bounds }
    }

    /// Internal (optimizer) value to external value. The result lies within the bounds.
    pub fn to_external(&self, internal: f64) -> f64 {
        let b = self.bounds;
        let external = match (b.has_lower_bound(), b.has_upper_bound()) {
            (false, false) => internal,
            (true, false) => b.min - 1.0 + (internal * internal + 1.0).sqrt(),
            (false, true) => b.max + 1.0 - (internal * internal + 1.0).sqrt(),
            (true, true) => b.min + (internal.sin() + 1.0) * (b.max - b.min) / 2.0,
        };
        b.clamp(external)
    }

    /// External value to internal (optimizer) value.
    pub fn to_internal(&self, external: f64) -> Result<f64, BoundsError> {
        let b = self.bounds;
        if !external.is_finite() {
            return Err(BoundsError::InfiniteValue);
        }
        if !b.is_within_bounds(external) {
            return Err(BoundsError::ValueOutsideBounds {
                value: external,
                min: b.min,
                max: b.max,
            });
        }

        Ok(match (b.has_lower_bound(), b.has_upper_bound()) {
            (false, false) => external,
            (true, false) => ((external - b.min + 1.0).powi(2) - 1.0).sqrt(),
            (false, true) => ((b.max - external + 1.0).powi(2) - 1.0).sqrt(),
            (true, true) => {
                let scaled = 2.0 * (external - b.min) / (b.max - b.min) - 1.0;
                scaled.clamp(-1.0, 1.0).asin()
            }
        })
    }

    /// Derivative d(external)/d(internal) at the given internal value.
    ///
    /// Used to carry standard errors from the internal space back to the
    /// parameter's own units.
    pub fn derivative(&self, internal: f64) -> f64 {
        let b = self.bounds;
        match (b.has_lower_bound(), b.has_upper_bound()) {
            (false, false) => 1.0,
            (true, false) => internal / (internal * internal + 1.0).sqrt(),
            (false, true) => -internal / (internal * internal + 1.0).sqrt(),
            (true, true) => internal.cos() * (b.max - b.min) / 2.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_bounds_creation() {
        let bounds = Bounds::new(0.0, 10.0).unwrap();
        assert_eq!(bounds.min, 0.0);
        assert_eq!(bounds.max, 10.0);

        assert!(Bounds::new(10.0, 0.0).is_err());
        assert!(Bounds::new(f64::NAN, 0.0).is_err());
        assert_eq!(
            Bounds::new(2.0, 2.0),
            Err(BoundsError::EmptyInterval { value: 2.0 })
        );

        let bounds = Bounds::min_only(5.0);
        assert!(bounds.has_lower_bound());
        assert!(!bounds.has_upper_bound());
        assert_eq!(bounds.clamp(-3.0), 5.0);
    }

    #[test]
    fn test_transform_inverts() {
        let cases = [
            (Bounds::unbounded(), 3.5),
            (Bounds::min_only(0.0), 2.0),
            (Bounds::new(f64::NEG_INFINITY, 1.0).unwrap(), -4.0),
            (Bounds::new(-1.0, 1.0).unwrap(), 0.25),
        ];

        for (bounds, external) in cases {
            let transform = BoundsTransform::new(bounds);
            let internal = transform.to_internal(external).unwrap();
            assert_relative_eq!(transform.to_external(internal), external, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_external_stays_inside_bounds() {
        let transform = BoundsTransform::new(Bounds::new(0.0, 1.0).unwrap());
        for internal in [-100.0, -1.0, 0.0, 1.5707963, 42.0] {
            let external = transform.to_external(internal);
            assert!((0.0..=1.0).contains(&external));
        }

        assert!(transform.to_internal(2.0).is_err());
        assert_eq!(transform.to_internal(f64::INFINITY), Err(BoundsError::InfiniteValue));
    }

    #[test]
    fn test_derivative_matches_finite_difference() {
        let transform = BoundsTransform::new(Bounds::new(-2.0, 5.0).unwrap());
        let internal = 0.3;
        let h = 1e-7;
        let numeric = (transform.to_external(internal + h) - transform.to_external(internal)) / h;
        assert_relative_eq!(transform.derivative(internal), numeric, epsilon = 1e-5);
    }

    #[test]
    fn test_bounds_json_uses_null_for_open_sides() {
        let json = serde_json::to_string(&Bounds::min_only(0.0)).unwrap();
        assert_eq!(json, r#"{"min":0.0,"max":null}"#);

        let bounds: Bounds = serde_json::from_str(r#"{"min":null,"max":3.0}"#).unwrap();
        assert_eq!(bounds.min, f64::NEG_INFINITY);
        assert_eq!(bounds.max, 3.0);
    }
}
