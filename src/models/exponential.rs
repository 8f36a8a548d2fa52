//! Exponential decay and power-law components.

use super::{not_zero, polyfit, Guess, TINY};
use crate::error::Result;
use ndarray::Array1;

/// `amplitude * exp(-x / decay)`
pub fn exponential(x: &Array1<f64>, amplitude: f64, decay: f64) -> Array1<f64> {
    let decay = not_zero(decay);
    x.mapv(|xi| amplitude * (-xi / decay).exp())
}

/// `amplitude * x^exponent`
pub fn powerlaw(x: &Array1<f64>, amplitude: f64, exponent: f64) -> Array1<f64> {
    x.mapv(|xi| amplitude * xi.powf(exponent))
}

/// Straight-line fit of `ln|y|` against `x`.
pub(super) fn guess_exponential(x: &Array1<f64>, y: &Array1<f64>) -> Result<Guess> {
    let log_y = y.mapv(|v| (v.abs() + TINY).ln());
    let coeffs = polyfit(x, &log_y, 1)?;

    Ok(Guess::from([
        ("amplitude".to_string(), coeffs[0].exp()),
        ("decay".to_string(), -1.0 / not_zero(coeffs[1])),
    ]))
}

/// Straight-line fit of `ln|y|` against `ln|x|`.
pub(super) fn guess_powerlaw(x: &Array1<f64>, y: &Array1<f64>) -> Result<Guess> {
    let log_x = x.mapv(|v| (v.abs() + TINY).ln());
    let log_y = y.mapv(|v| (v.abs() + TINY).ln());
    let coeffs = polyfit(&log_x, &log_y, 1)?;

    Ok(Guess::from([
        ("amplitude".to_string(), coeffs[0].exp()),
        ("exponent".to_string(), coeffs[1]),
    ]))
}
