//! Species data and relativistic kinematics

use serde::{Deserialize, Serialize};

/// Speed of light in vacuum \[m/s\]
pub const LIGHT_SPEED: f64 = 299_792_458.0;

/// Particle species
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Species {
    /// Rest energy \[eV\]
    pub rest_energy: f64,
    /// Charge in units of the elementary charge
    pub charge: f64,
}

impl Species {
    /// Proton
    pub const PROTON: Species = Species {
        rest_energy: 938.272_088_16e6,
        charge: 1.0,
    };
    /// Negative hydrogen ion
    pub const H_MINUS: Species = Species {
        rest_energy: 939.294_308e6,
        charge: -1.0,
    };
    /// Electron
    pub const ELECTRON: Species = Species {
        rest_energy: 0.510_998_950e6,
        charge: -1.0,
    };
}

/// Kinematic state of the design particle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Kinematics {
    /// Particle species
    pub species: Species,
    /// Kinetic energy \[eV\]
    pub kinetic_energy: f64,
}

impl Kinematics {
    /// Construct from species and kinetic energy
    pub fn new(species: Species, kinetic_energy: f64) -> Kinematics {
        Kinematics {
            species,
            kinetic_energy,
        }
    }

    /// Lorentz factor
    pub fn gamma(&self) -> f64 {
        1.0 + self.kinetic_energy / self.species.rest_energy
    }

    /// Velocity as a fraction of the speed of light
    pub fn beta(&self) -> f64 {
        let gamma = self.gamma();
        (1.0 - 1.0 / (gamma * gamma)).sqrt()
    }

    /// Product of beta and gamma
    pub fn beta_gamma(&self) -> f64 {
        let gamma = self.gamma();
        (gamma * gamma - 1.0).sqrt()
    }

    /// Momentum \[eV/c\]
    pub fn momentum(&self) -> f64 {
        let w = self.kinetic_energy;
        (w * (w + 2.0 * self.species.rest_energy)).sqrt()
    }

    /// Magnetic rigidity \[T m\]
    pub fn rigidity(&self) -> f64 {
        self.momentum() / (LIGHT_SPEED * self.species.charge.abs())
    }

    /// Same species with a different kinetic energy
    pub fn with_energy(&self, kinetic_energy: f64) -> Kinematics {
        Kinematics {
            kinetic_energy,
            ..*self
        }
    }

    /// Time needed to travel `length` meters \[s\]
    pub fn drift_time(&self, length: f64) -> f64 {
        length / (self.beta() * LIGHT_SPEED)
    }
}
