//! Special functions and 2x2 per-plane transfer kernels
//!
//! The quadrupole kernels come in several fidelities. [Exact] is the reference; the others are
//! cheaper approximations that only agree with it in the small-angle limit.

use nalgebra::Matrix2;
use serde::{Deserialize, Serialize};

/// Below this argument the first-order functions switch to their Taylor series
const SMALL_ARG: f64 = 1e-4;
/// Below this argument the cubic functions switch to their Taylor series
const CUBIC_SMALL_ARG: f64 = 0.1;

/// `sin(x)/x`, continuous at 0
pub fn sinc(x: f64) -> f64 {
    if x.abs() < SMALL_ARG {
        let x2 = x * x;
        1.0 - x2 / 6.0 * (1.0 - x2 / 20.0)
    } else {
        x.sin() / x
    }
}

/// `sinh(x)/x`, continuous at 0
pub fn sinch(x: f64) -> f64 {
    if x.abs() < SMALL_ARG {
        let x2 = x * x;
        1.0 + x2 / 6.0 * (1.0 + x2 / 20.0)
    } else {
        x.sinh() / x
    }
}

/// `(1 - cos(x))/x^2`, continuous at 0 with value 1/2
pub fn sincm(x: f64) -> f64 {
    let s = sinc(0.5 * x);
    0.5 * s * s
}

/// `(cosh(x) - 1)/x^2`, continuous at 0 with value 1/2
pub fn sinchm(x: f64) -> f64 {
    let s = sinch(0.5 * x);
    0.5 * s * s
}

/// `(x - sin(x))/x^3`, continuous at 0 with value 1/6
pub fn sinc3(x: f64) -> f64 {
    if x.abs() < CUBIC_SMALL_ARG {
        let x2 = x * x;
        1.0 / 6.0 - x2 / 120.0 + x2 * x2 / 5040.0 - x2 * x2 * x2 / 362_880.0
    } else {
        (x - x.sin()) / (x * x * x)
    }
}

/// `(sinh(x) - x)/x^3`, continuous at 0 with value 1/6
pub fn sinch3(x: f64) -> f64 {
    if x.abs() < CUBIC_SMALL_ARG {
        let x2 = x * x;
        1.0 / 6.0 + x2 / 120.0 + x2 * x2 / 5040.0 + x2 * x2 * x2 / 362_880.0
    } else {
        (x.sinh() - x) / (x * x * x)
    }
}

/// Field-free propagation over `l`
pub fn drift(l: f64) -> Matrix2<f64> {
    Matrix2::new(1.0, l, 0.0, 1.0)
}

/// Thin kick with integrated strength `kick`. Positive values focus.
pub fn thin_kick(kick: f64) -> Matrix2<f64> {
    Matrix2::new(1.0, 0.0, -kick, 1.0)
}

/// Transfer kernel of a quadrupole-like plane of strength `k` \[1/m\] and length `l` \[m\]
pub trait LensKernel {
    /// Focusing plane
    fn focusing(&self, k: f64, l: f64) -> Matrix2<f64>;
    /// Defocusing plane
    fn defocusing(&self, k: f64, l: f64) -> Matrix2<f64>;
}

/// Exact kernel, continuous through `k = 0` via [sinc]-type functions
pub struct Exact {}

impl LensKernel for Exact {
    fn focusing(&self, k: f64, l: f64) -> Matrix2<f64> {
        let phi = k * l;
        let cos = 1.0 - phi * phi * sincm(phi);

        Matrix2::new(cos, l * sinc(phi), -k * phi.sin(), cos)
    }

    fn defocusing(&self, k: f64, l: f64) -> Matrix2<f64> {
        let phi = k * l;
        let cosh = 1.0 + phi * phi * sinchm(phi);

        Matrix2::new(cosh, l * sinch(phi), k * phi.sinh(), cosh)
    }
}

/// Exact kernel that special-cases a vanishing angle instead of relying on continuity
pub struct Branching {}

impl LensKernel for Branching {
    fn focusing(&self, k: f64, l: f64) -> Matrix2<f64> {
        let phi = k * l;
        if phi == 0.0 {
            return drift(l);
        }

        Matrix2::new(phi.cos(), phi.sin() / k, -k * phi.sin(), phi.cos())
    }

    fn defocusing(&self, k: f64, l: f64) -> Matrix2<f64> {
        let phi = k * l;
        if phi == 0.0 {
            return drift(l);
        }

        Matrix2::new(phi.cosh(), phi.sinh() / k, k * phi.sinh(), phi.cosh())
    }
}

/// Second-order Taylor truncation of [Exact] in the angle `k l`
pub struct Taylor {}

impl LensKernel for Taylor {
    fn focusing(&self, k: f64, l: f64) -> Matrix2<f64> {
        let phi2 = (k * l).powi(2);

        Matrix2::new(
            1.0 - phi2 / 2.0,
            l * (1.0 - phi2 / 6.0),
            -k * k * l,
            1.0 - phi2 / 2.0,
        )
    }

    fn defocusing(&self, k: f64, l: f64) -> Matrix2<f64> {
        let phi2 = (k * l).powi(2);

        Matrix2::new(
            1.0 + phi2 / 2.0,
            l * (1.0 + phi2 / 6.0),
            k * k * l,
            1.0 + phi2 / 2.0,
        )
    }
}

/// Half drift, thin kick, half drift
pub struct Sandwich {}

impl LensKernel for Sandwich {
    fn focusing(&self, k: f64, l: f64) -> Matrix2<f64> {
        drift(0.5 * l) * thin_kick(k * k * l) * drift(0.5 * l)
    }

    fn defocusing(&self, k: f64, l: f64) -> Matrix2<f64> {
        drift(0.5 * l) * thin_kick(-k * k * l) * drift(0.5 * l)
    }
}

/// Drift with the integrated kick added, not symplectic
pub struct ThinLens {}

impl LensKernel for ThinLens {
    fn focusing(&self, k: f64, l: f64) -> Matrix2<f64> {
        Matrix2::new(1.0, l, -k * k * l, 1.0)
    }

    fn defocusing(&self, k: f64, l: f64) -> Matrix2<f64> {
        Matrix2::new(1.0, l, k * k * l, 1.0)
    }
}

/// Supported quadrupole kernels
#[derive(clap::ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QuadKernel {
    /// Exact trigonometric/hyperbolic kernel
    #[default]
    Exact,
    /// Exact kernel with an explicit zero-strength branch
    Branching,
    /// Second-order Taylor truncation
    Taylor,
    /// Drift-kick-drift approximation
    Sandwich,
    /// Thin-lens approximation
    ThinLens,
}

impl QuadKernel {
    fn kernel(self) -> &'static dyn LensKernel {
        match self {
            QuadKernel::Exact => &Exact {},
            QuadKernel::Branching => &Branching {},
            QuadKernel::Taylor => &Taylor {},
            QuadKernel::Sandwich => &Sandwich {},
            QuadKernel::ThinLens => &ThinLens {},
        }
    }

    /// Focusing plane block
    pub fn focusing(self, k: f64, l: f64) -> Matrix2<f64> {
        self.kernel().focusing(k, l)
    }

    /// Defocusing plane block
    pub fn defocusing(self, k: f64, l: f64) -> Matrix2<f64> {
        self.kernel().defocusing(k, l)
    }
}
