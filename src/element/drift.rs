use serde::{Deserialize, Serialize};

use super::{ElementKernel, KernelContext, Slice};
use crate::error::ModelError;
use crate::kinematics::Kinematics;
use crate::optics::drift;
use crate::phase::{PhaseMap, PhaseMatrix};

/// Field-free region
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Drift {
    /// Element identifier
    pub id: String,
    /// Length \[m\]
    pub length: f64,
}

impl Drift {
    /// Construct a drift of `length` meters
    pub fn new(id: impl Into<String>, length: f64) -> Drift {
        Drift {
            id: id.into(),
            length,
        }
    }
}

/// Transfer matrix of a drift of `length` for a particle with Lorentz factor `gamma`.
///
/// The longitudinal plane drifts over `length / gamma^2`.
pub fn drift_matrix(length: f64, gamma: f64) -> PhaseMatrix {
    PhaseMatrix::from_blocks(
        &drift(length),
        &drift(length),
        &drift(length / (gamma * gamma)),
    )
}

impl ElementKernel for Drift {
    fn transfer_map(
        &self,
        kin: &Kinematics,
        slice: &Slice,
        _ctx: &KernelContext<'_>,
    ) -> Result<PhaseMap, ModelError> {
        Ok(PhaseMap::new(drift_matrix(slice.length, kin.gamma())))
    }
}

#[cfg(test)]
mod tests {
    use nalgebra::Matrix2;

    use super::drift_matrix;
    use crate::kinematics::{Kinematics, Species};
    use crate::phase::Plane;

    #[test]
    fn drift_blocks_are_exact() {
        for w in [1.0e5, 3.0e6, 2.5e9] {
            let gamma = Kinematics::new(Species::PROTON, w).gamma();
            for length in [0.0, 0.095, 1.0, 12.5] {
                let mat = drift_matrix(length, gamma);

                assert_eq!(mat.block(Plane::Horizontal), Matrix2::new(1.0, length, 0.0, 1.0));
                assert_eq!(mat.block(Plane::Vertical), Matrix2::new(1.0, length, 0.0, 1.0));
                assert_eq!(
                    mat.block(Plane::Longitudinal),
                    Matrix2::new(1.0, length / (gamma * gamma), 0.0, 1.0)
                );
                assert!(mat.is_affine());
            }
        }
    }
}
