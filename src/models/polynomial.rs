//! Background components: constant, linear, quadratic and polynomial.

use super::{polyfit, Guess};
use crate::error::Result;
use ndarray::Array1;

/// `c0 + c1 x + ... + cn x^n`, coefficients lowest order first.
pub fn horner(x: &Array1<f64>, coeffs: &[f64]) -> Array1<f64> {
    x.mapv(|xi| coeffs.iter().rev().fold(0.0, |acc, &c| acc * xi + c))
}

pub(super) fn guess_constant(y: &Array1<f64>) -> Guess {
    Guess::from([("c".to_string(), y.mean().unwrap_or(0.0))])
}

pub(super) fn guess_linear(x: &Array1<f64>, y: &Array1<f64>) -> Result<Guess> {
    let coeffs = polyfit(x, y, 1)?;
    Ok(Guess::from([
        ("intercept".to_string(), coeffs[0]),
        ("slope".to_string(), coeffs[1]),
    ]))
}

pub(super) fn guess_quadratic(x: &Array1<f64>, y: &Array1<f64>) -> Result<Guess> {
    let coeffs = polyfit(x, y, 2)?;
    Ok(Guess::from([
        ("c".to_string(), coeffs[0]),
        ("b".to_string(), coeffs[1]),
        ("a".to_string(), coeffs[2]),
    ]))
}

pub(super) fn guess_polynomial(x: &Array1<f64>, y: &Array1<f64>, degree: u8) -> Result<Guess> {
    let coeffs = polyfit(x, y, usize::from(degree))?;
    Ok(coeffs
        .into_iter()
        .enumerate()
        .map(|(i, c)| (format!("c{}", i), c))
        .collect())
}
