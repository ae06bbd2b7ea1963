//! Courant-Snyder parameters of one phase plane

use std::f64::consts::TAU;

use nalgebra::Matrix2;
use serde::{Deserialize, Serialize};

/// Twiss parameters `(alpha, beta, emittance)` describing a beam ellipse
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Twiss {
    /// Correlation parameter
    pub alpha: f64,
    /// Envelope function \[m\]
    pub beta: f64,
    /// Emittance \[m rad\]
    pub emittance: f64,
}

/// Quantities that can be read from a [Twiss]
#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TwissProperty {
    /// Correlation parameter
    Alpha,
    /// Envelope function
    Beta,
    /// `(1 + alpha^2) / beta`
    Gamma,
    /// Emittance
    Emittance,
    /// RMS beam size `sqrt(beta * emittance)`
    Envelope,
}

impl Twiss {
    /// Construct from the three parameters
    pub fn new(alpha: f64, beta: f64, emittance: f64) -> Twiss {
        Twiss {
            alpha,
            beta,
            emittance,
        }
    }

    /// The dependent Twiss parameter `(1 + alpha^2) / beta`
    pub fn gamma(&self) -> f64 {
        (1.0 + self.alpha * self.alpha) / self.beta
    }

    /// Value of a property by name
    pub fn get(&self, property: TwissProperty) -> f64 {
        match property {
            TwissProperty::Alpha => self.alpha,
            TwissProperty::Beta => self.beta,
            TwissProperty::Gamma => self.gamma(),
            TwissProperty::Emittance => self.emittance,
            TwissProperty::Envelope => (self.beta * self.emittance).sqrt(),
        }
    }

    /// Second moments `emittance * [[beta, -alpha], [-alpha, gamma]]`
    pub fn covariance(&self) -> Matrix2<f64> {
        self.emittance * Matrix2::new(self.beta, -self.alpha, -self.alpha, self.gamma())
    }

    /// Twiss parameters of a second-moment block. `None` when the block does not describe an
    /// ellipse of nonzero area.
    pub fn from_moments(sigma: &Matrix2<f64>) -> Option<Twiss> {
        let det = sigma[(0, 0)] * sigma[(1, 1)] - sigma[(0, 1)] * sigma[(1, 0)];
        if !(det > 0.0) {
            return None;
        }
        let emittance = det.sqrt();

        Some(Twiss {
            alpha: -sigma[(0, 1)] / emittance,
            beta: sigma[(0, 0)] / emittance,
            emittance,
        })
    }

    /// Parameters after the 2x2 transfer block `r`.
    ///
    /// The emittance scales with `|det r|`, which accounts for adiabatic damping in accelerating
    /// elements.
    pub fn transform(&self, r: &Matrix2<f64>) -> Twiss {
        let (r11, r12, r21, r22) = (r[(0, 0)], r[(0, 1)], r[(1, 0)], r[(1, 1)]);
        let (alpha, beta, gamma) = (self.alpha, self.beta, self.gamma());
        let det = r.determinant().abs();

        let beta1 = r11 * r11 * beta - 2.0 * r11 * r12 * alpha + r12 * r12 * gamma;
        let alpha1 = -r11 * r21 * beta + (r11 * r22 + r12 * r21) * alpha - r12 * r22 * gamma;

        Twiss {
            alpha: alpha1 / det,
            beta: beta1 / det,
            emittance: self.emittance * det,
        }
    }

    /// Betatron phase advance in `[0, 2 pi)` from `self` to `after` through the block `r`
    pub fn phase_advance(&self, after: &Twiss, r: &Matrix2<f64>) -> f64 {
        let sin = (r[(0, 1)] / (self.beta * after.beta).sqrt()).clamp(-1.0, 1.0);
        let cos = r[(0, 0)] * (self.beta / after.beta).sqrt() - self.alpha * sin;

        sin.atan2(cos).rem_euclid(TAU)
    }
}

#[cfg(test)]
mod tests {
    use std::f64::consts::FRAC_PI_2;

    use nalgebra::Matrix2;

    use super::{Twiss, TwissProperty};
    use crate::optics::{drift, Exact, LensKernel as _};

    #[test]
    fn covariance_round_trip() {
        let twiss = Twiss::new(-0.1763, 0.2442, 0.2098e-6);
        let back = Twiss::from_moments(&twiss.covariance()).unwrap();

        assert!((back.alpha - twiss.alpha).abs() < 1e-12);
        assert!((back.beta - twiss.beta).abs() < 1e-12);
        assert!((back.emittance - twiss.emittance).abs() < 1e-18);
        assert!(Twiss::from_moments(&Matrix2::zeros()).is_none());
    }

    #[test]
    fn transform_matches_moment_propagation() {
        let twiss = Twiss::new(-0.3247, 0.3974, 0.2091e-6);
        let r = (Exact {}).focusing(3.0, 0.2) * drift(0.3);

        let direct = twiss.transform(&r);
        let moments = Twiss::from_moments(&(r * twiss.covariance() * r.transpose())).unwrap();

        assert!((direct.alpha - moments.alpha).abs() < 1e-9);
        assert!((direct.beta - moments.beta).abs() < 1e-9);
        assert!((direct.emittance - moments.emittance).abs() < 1e-15);
    }

    #[test]
    fn damping_scales_emittance() {
        let twiss = Twiss::new(0.0, 1.0, 1e-6);
        let r = Matrix2::new(1.0, 0.0, 0.0, 0.5);

        assert!((twiss.transform(&r).emittance - 0.5e-6).abs() < 1e-18);
    }

    #[test]
    fn quarter_cell_phase_advance() {
        // Matched to a rotation: alpha 0, beta 1/k
        let k = 2.0;
        let twiss = Twiss::new(0.0, 1.0 / k, 1e-6);
        let r = (Exact {}).focusing(k, FRAC_PI_2 / k);
        let after = twiss.transform(&r);

        assert!((after.beta - twiss.beta).abs() < 1e-12);
        assert!((twiss.phase_advance(&after, &r) - FRAC_PI_2).abs() < 1e-12);
        assert!(twiss.phase_advance(&twiss, &Matrix2::identity()).abs() < 1e-15);
    }

    #[test]
    fn properties() {
        let twiss = Twiss::new(1.0, 2.0, 4.0);
        assert_eq!(twiss.get(TwissProperty::Gamma), 1.0);
        assert_eq!(twiss.get(TwissProperty::Envelope), 8.0f64.sqrt());
        assert_eq!(twiss.get(TwissProperty::Alpha), 1.0);
    }
}
