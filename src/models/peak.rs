//! Peak-shaped components: Gaussian, Lorentzian, pseudo-Voigt and Poisson.
//!
//! The line shapes are area-normalized as in lmfit, so `amplitude` is the
//! integral of the peak and the derived `height` hint reports its maximum.

use super::{argmax, ComponentKind, Guess, ParamHint, TINY};
use libm::lgamma;
use ndarray::Array1;
use std::collections::BTreeMap;
use std::f64::consts::{LN_2, PI};

const S2PI: f64 = 2.506_628_274_631_000_7;

/// `amplitude / (sqrt(2 pi) sigma) * exp(-(x - center)^2 / (2 sigma^2))`
pub fn gaussian(x: &Array1<f64>, amplitude: f64, center: f64, sigma: f64) -> Array1<f64> {
    let sigma = sigma.max(TINY);
    x.mapv(|xi| {
        let arg = (xi - center) / sigma;
        amplitude / (S2PI * sigma) * (-0.5 * arg * arg).exp()
    })
}

/// `amplitude / (pi sigma) / (1 + ((x - center) / sigma)^2)`
pub fn lorentzian(x: &Array1<f64>, amplitude: f64, center: f64, sigma: f64) -> Array1<f64> {
    let width = (PI * sigma).max(TINY);
    x.mapv(|xi| {
        let arg = (xi - center) / sigma.max(TINY);
        amplitude / (1.0 + arg * arg) / width
    })
}

/// Weighted sum of a Gaussian and a Lorentzian of equal FWHM.
pub fn pvoigt(
    x: &Array1<f64>,
    amplitude: f64,
    center: f64,
    sigma: f64,
    fraction: f64,
) -> Array1<f64> {
    let sigma_g = sigma / (2.0 * LN_2).sqrt();
    gaussian(x, amplitude, center, sigma_g) * (1.0 - fraction)
        + lorentzian(x, amplitude, center, sigma) * fraction
}

/// `amp * exp(-mu) * mu^x / x!`, with `x!` continued by the gamma function.
///
/// Negative `x` has no probability mass and evaluates to 0.
pub fn poisson(x: &Array1<f64>, amp: f64, mu: f64) -> Array1<f64> {
    x.mapv(|xi| {
        if xi < 0.0 {
            0.0
        } else if mu > 0.0 {
            amp * (xi * mu.ln() - mu - lgamma(xi + 1.0)).exp()
        } else {
            amp * (-mu).exp() * mu.powf(xi) * (-lgamma(xi + 1.0)).exp()
        }
    })
}

pub(super) fn peak_hints(kind: ComponentKind, hints: &mut BTreeMap<String, ParamHint>) {
    hints.insert("center".to_string(), ParamHint::value(0.0));
    hints.insert("sigma".to_string(), ParamHint::bounded(1.0, 0.0, f64::INFINITY));

    match kind {
        ComponentKind::Gaussian => {
            hints.insert("fwhm".to_string(), ParamHint::expr("2.3548200*sigma"));
            hints.insert(
                "height".to_string(),
                ParamHint::expr("0.3989423*amplitude/max(1e-15, sigma)"),
            );
        }
        ComponentKind::Lorentzian => {
            hints.insert("fwhm".to_string(), ParamHint::expr("2.0000000*sigma"));
            hints.insert(
                "height".to_string(),
                ParamHint::expr("0.3183099*amplitude/max(1e-15, sigma)"),
            );
        }
        _ => {
            hints.insert("fraction".to_string(), ParamHint::bounded(0.5, 0.0, 1.0));
            hints.insert("fwhm".to_string(), ParamHint::expr("2.0000000*sigma"));
        }
    }
}

/// Estimate amplitude, center and sigma from the half-maximum region of the
/// largest peak.
pub(super) fn guess_peak(kind: ComponentKind, x: &Array1<f64>, y: &Array1<f64>) -> Guess {
    let (miny, maxy) = y.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
        (lo.min(v), hi.max(v))
    });
    let (minx, maxx) = x.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
        (lo.min(v), hi.max(v))
    });

    let mut center = x[argmax(y)];
    let mut sigma = (maxx - minx) / 6.0;
    let height = (maxy - miny) * 3.0;

    let half_max = (maxy + miny) / 2.0;
    let above: Vec<f64> = x
        .iter()
        .zip(y.iter())
        .filter(|&(_, &yi)| yi > half_max)
        .map(|(&xi, _)| xi)
        .collect();
    if above.len() > 2 {
        sigma = (above[above.len() - 1] - above[0]) / 2.0;
        center = above.iter().sum::<f64>() / above.len() as f64;
    }

    let ampscale = match kind {
        ComponentKind::Gaussian => 1.0,
        _ => 1.25,
    };

    let mut guess = Guess::new();
    guess.insert("amplitude".to_string(), height * sigma * ampscale);
    guess.insert("center".to_string(), center);
    guess.insert("sigma".to_string(), sigma);
    if kind == ComponentKind::PseudoVoigt {
        guess.insert("fraction".to_string(), 0.5);
    }
    guess
}

/// `mu` at the maximum, `amp` twice the data range.
pub(super) fn guess_poisson(x: &Array1<f64>, y: &Array1<f64>) -> Guess {
    let (miny, maxy) = y.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
        (lo.min(v), hi.max(v))
    });

    Guess::from([
        ("amp".to_string(), (maxy - miny) * 2.0),
        ("mu".to_string(), x[argmax(y)]),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_gaussian_shape() {
        let x = Array1::from_vec(vec![-1.0, 0.0, 1.0]);
        let y = gaussian(&x, 2.0, 0.0, 1.0);

        assert_relative_eq!(y[1], 2.0 / S2PI, epsilon = 1e-12);
        assert_relative_eq!(y[0], y[2], epsilon = 1e-15);
        assert_relative_eq!(y[0] / y[1], (-0.5f64).exp(), epsilon = 1e-12);
    }

    #[test]
    fn test_gaussian_area_is_amplitude() {
        let x = Array1::linspace(-20.0, 20.0, 4001);
        let y = gaussian(&x, 3.0, 1.0, 1.5);
        let area: f64 = y.sum() * 0.01;
        assert_relative_eq!(area, 3.0, epsilon = 1e-6);
    }

    #[test]
    fn test_lorentzian_peak_height() {
        let x = Array1::from_vec(vec![2.0, 2.5]);
        let y = lorentzian(&x, 1.0, 2.0, 0.5);
        assert_relative_eq!(y[0], 1.0 / (PI * 0.5), epsilon = 1e-12);
        assert_relative_eq!(y[1], y[0] / 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_pvoigt_limits() {
        let x = Array1::linspace(-3.0, 3.0, 7);
        let sigma_g = 1.0 / (2.0 * LN_2).sqrt();
        let pure_gauss = pvoigt(&x, 1.0, 0.0, 1.0, 0.0);
        let pure_lorentz = pvoigt(&x, 1.0, 0.0, 1.0, 1.0);

        for i in 0..x.len() {
            assert_relative_eq!(pure_gauss[i], gaussian(&x, 1.0, 0.0, sigma_g)[i], epsilon = 1e-14);
            assert_relative_eq!(pure_lorentz[i], lorentzian(&x, 1.0, 0.0, 1.0)[i], epsilon = 1e-14);
        }
    }

    #[test]
    fn test_poisson_probabilities() {
        let x = Array1::from_vec(vec![-1.0, 0.0, 2.0]);
        let y = poisson(&x, 1.0, 3.0);
        assert_eq!(y[0], 0.0);
        assert_relative_eq!(y[1], (-3.0f64).exp(), epsilon = 1e-12);
        assert_relative_eq!(y[2], (-3.0f64).exp() * 9.0 / 2.0, epsilon = 1e-12);

        let y = poisson(&x, 5.0, 0.0);
        assert_relative_eq!(y[1], 5.0, epsilon = 1e-12);
        assert_eq!(y[2], 0.0);

        // Between integers x! is continued by gamma(x + 1), gamma(1.5) = sqrt(pi) / 2
        let y = poisson(&Array1::from_vec(vec![0.5]), 1.0, 1.0);
        assert_relative_eq!(y[0], (-1.0f64).exp() * 2.0 / PI.sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn test_guess_peak_recovers_gaussian() {
        let x = Array1::linspace(-10.0, 10.0, 201);
        let y = gaussian(&x, 5.0, 1.0, 1.2);
        let guess = guess_peak(ComponentKind::Gaussian, &x, &y);

        assert_relative_eq!(guess["center"], 1.0, epsilon = 0.05);
        // Half of the half-maximum width, a rough estimate of sigma
        assert!((guess["sigma"] - 1.2).abs() < 0.5);
        assert!(guess["amplitude"] > 0.0);
        assert!(!guess.contains_key("fraction"));

        let guess = guess_peak(ComponentKind::PseudoVoigt, &x, &y);
        assert_eq!(guess["fraction"], 0.5);
    }

    #[test]
    fn test_guess_poisson() {
        let x = Array1::from_vec(vec![0.0, 1.0, 2.0, 3.0]);
        let y = Array1::from_vec(vec![1.0, 4.0, 3.0, 2.0]);
        let guess = guess_poisson(&x, &y);
        assert_eq!(guess["mu"], 1.0);
        assert_eq!(guess["amp"], 6.0);
    }
}
