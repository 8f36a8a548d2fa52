//! Data to fit: `(x, y, weights)` arrays and x-range selection.
//!
//! Plotted artists come in a few shapes. Each has a constructor on
//! [`ArtistData`] that derives the fit weights the way the shape implies: a
//! line is unweighted, histogram bars and steps use Poisson weights
//! `1/sqrt(y)`, and error bars use the inverse of the upper error.

use crate::error::{ComposeError, Result};
use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// Anything that can hand out data to fit.
pub trait DataSource {
    fn artist_data(&self) -> Result<ArtistData>;
}

/// An open x interval; only points with `xmin < x < xmax` are selected.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DataRange {
    pub xmin: f64,
    pub xmax: f64,
}

impl DataRange {
    /// Create a range; the bounds may be given in either order.
    pub fn new(a: f64, b: f64) -> Result<Self> {
        if a.is_nan() || b.is_nan() {
            return Err(ComposeError::InvalidInput("range bound is NaN".to_string()));
        }
        Ok(Self {
            xmin: a.min(b),
            xmax: a.max(b),
        })
    }

    pub fn contains(&self, x: f64) -> bool {
        x > self.xmin && x < self.xmax
    }
}

/// Data extracted from a plotted artist.
#[derive(Debug, Clone, PartialEq)]
pub struct ArtistData {
    pub x: Array1<f64>,
    pub y: Array1<f64>,
    pub weights: Array1<f64>,
}

impl ArtistData {
    /// Arrays of equal length; non-finite weights become 0.
    pub fn new(x: Array1<f64>, y: Array1<f64>, weights: Array1<f64>) -> Result<Self> {
        if x.len() != y.len() || x.len() != weights.len() {
            return Err(ComposeError::DimensionMismatch(format!(
                "x, y and weights have lengths {}, {} and {}",
                x.len(),
                y.len(),
                weights.len()
            )));
        }

        let weights = weights.mapv(|w| if w.is_finite() { w } else { 0.0 });
        Ok(Self { x, y, weights })
    }

    /// A plotted line; every point has weight 1.
    pub fn from_line(x: Array1<f64>, y: Array1<f64>) -> Result<Self> {
        let weights = Array1::ones(x.len());
        Self::new(x, y, weights)
    }

    /// A bar histogram; x is taken at the bar centres.
    pub fn from_bars(lefts: &[f64], widths: &[f64], heights: &[f64]) -> Result<Self> {
        if lefts.len() != widths.len() {
            return Err(ComposeError::DimensionMismatch(format!(
                "{} bar positions but {} widths",
                lefts.len(),
                widths.len()
            )));
        }

        let x: Array1<f64> = lefts.iter().zip(widths).map(|(l, w)| l + w / 2.0).collect();
        let y = Array1::from_vec(heights.to_vec());
        let weights = y.mapv(poisson_weight);
        Self::new(x, y, weights)
    }

    /// A step histogram outline.
    pub fn from_step(x: Array1<f64>, y: Array1<f64>) -> Result<Self> {
        let weights = y.mapv(poisson_weight);
        Self::new(x, y, weights)
    }

    /// Points with error bars; `upper` is the top of each bar. Errors are
    /// assumed symmetric, so only the upper half is used. Without error bars
    /// every point has weight 1.
    pub fn from_errorbar(x: Array1<f64>, y: Array1<f64>, upper: Option<Array1<f64>>) -> Result<Self> {
        let weights = match upper {
            Some(upper) => {
                if upper.len() != y.len() {
                    return Err(ComposeError::DimensionMismatch(format!(
                        "{} error bars for {} points",
                        upper.len(),
                        y.len()
                    )));
                }
                (&upper - &y).mapv(|err| 1.0 / err)
            }
            None => Array1::ones(x.len()),
        };
        Self::new(x, y, weights)
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// The points inside `range`, or a copy of everything without a range.
    pub fn select(&self, range: Option<&DataRange>) -> ArtistData {
        let range = match range {
            Some(range) => range,
            None => return self.clone(),
        };

        let keep: Vec<usize> = (0..self.len()).filter(|&i| range.contains(self.x[i])).collect();
        let pick = |a: &Array1<f64>| keep.iter().map(|&i| a[i]).collect::<Array1<f64>>();

        ArtistData {
            x: pick(&self.x),
            y: pick(&self.y),
            weights: pick(&self.weights),
        }
    }

    /// Check that there is something to fit.
    pub fn validate(&self) -> Result<()> {
        if self.is_empty() {
            return Err(ComposeError::InvalidInput(
                "no data points in the selected range".to_string(),
            ));
        }
        if self.x.iter().chain(self.y.iter()).any(|v| !v.is_finite()) {
            return Err(ComposeError::InvalidInput(
                "data contains NaN or infinite values".to_string(),
            ));
        }
        Ok(())
    }
}

impl DataSource for ArtistData {
    fn artist_data(&self) -> Result<ArtistData> {
        Ok(self.clone())
    }
}

fn poisson_weight(count: f64) -> f64 {
    1.0 / count.sqrt()
}
