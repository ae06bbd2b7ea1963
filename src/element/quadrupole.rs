use serde::{Deserialize, Serialize};

use super::{ElementKernel, KernelContext, Slice};
use crate::error::ModelError;
use crate::field::{FieldSource as _, MagnetRef};
use crate::kinematics::{Kinematics, LIGHT_SPEED};
use crate::optics::drift;
use crate::phase::{PhaseMap, PhaseMatrix};

/// Magnetic quadrupole.
///
/// A positive `charge * gradient` focuses in the horizontal plane.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Quadrupole {
    /// Element identifier
    pub id: String,
    /// Length \[m\]
    pub length: f64,
    /// Design field gradient \[T/m\]
    pub gradient: f64,
}

impl Quadrupole {
    /// Construct a quadrupole with a design gradient
    pub fn new(id: impl Into<String>, length: f64, gradient: f64) -> Quadrupole {
        Quadrupole {
            id: id.into(),
            length,
            gradient,
        }
    }

    /// Square of the focusing strength \[1/m^2\] for `gradient` \[T/m\]
    pub fn focusing_constant(kin: &Kinematics, gradient: f64) -> f64 {
        kin.species.charge.abs() * LIGHT_SPEED * gradient.abs() / kin.momentum()
    }

    fn magnet(&self) -> MagnetRef<'_> {
        MagnetRef {
            id: &self.id,
            design_field: self.gradient,
        }
    }
}

impl ElementKernel for Quadrupole {
    fn transfer_map(
        &self,
        kin: &Kinematics,
        slice: &Slice,
        ctx: &KernelContext<'_>,
    ) -> Result<PhaseMap, ModelError> {
        let gradient = ctx.fields.require(self.magnet())?;
        let k = Self::focusing_constant(kin, gradient).sqrt();
        let l = slice.length;

        let foc = ctx.quad_kernel.focusing(k, l);
        let defoc = ctx.quad_kernel.defocusing(k, l);
        let (x, y) = if kin.species.charge * gradient >= 0.0 {
            (foc, defoc)
        } else {
            (defoc, foc)
        };

        let gamma = kin.gamma();
        let z = drift(l / (gamma * gamma));

        Ok(PhaseMap::new(PhaseMatrix::from_blocks(&x, &y, &z)))
    }
}

#[cfg(test)]
mod tests {
    use super::Quadrupole;
    use crate::element::{drift_matrix, ElementKernel, KernelContext, Slice};
    use crate::error::ModelError;
    use crate::field::{DesignFields, FieldSnapshot};
    use crate::kinematics::{Kinematics, Species};
    use crate::optics::QuadKernel;
    use crate::phase::{PhaseMatrix, Plane};

    fn ctx(kernel: QuadKernel) -> KernelContext<'static> {
        KernelContext {
            fields: &DesignFields,
            quad_kernel: kernel,
        }
    }

    fn matrix(
        quad: &Quadrupole,
        kin: &Kinematics,
        slice: &Slice,
        ctx: &KernelContext,
    ) -> PhaseMatrix {
        *quad.transfer_map(kin, slice, ctx).unwrap().first_order()
    }

    #[test]
    fn focusing_constant_matches_rigidity() {
        let kin = Kinematics::new(Species::PROTON, 3.0e6);
        let k2 = Quadrupole::focusing_constant(&kin, 10.0);

        assert!((k2 - 10.0 / kin.rigidity()).abs() < 1e-12 * k2);
    }

    #[test]
    fn polarity_selects_focusing_plane() {
        let kin = Kinematics::new(Species::PROTON, 3.0e6);
        let slice = Slice::whole(0.1);
        let quad = Quadrupole::new("QH1", 0.1, 10.0);

        let mat = matrix(&quad, &kin, &slice, &ctx(QuadKernel::Exact));
        assert!(mat.block(Plane::Horizontal)[(1, 0)] < 0.0);
        assert!(mat.block(Plane::Vertical)[(1, 0)] > 0.0);

        let minus = Kinematics::new(Species::H_MINUS, 3.0e6);
        let mat = matrix(&quad, &minus, &slice, &ctx(QuadKernel::Exact));
        assert!(mat.block(Plane::Horizontal)[(1, 0)] > 0.0);
        assert!(mat.block(Plane::Vertical)[(1, 0)] < 0.0);

        let gamma = kin.gamma();
        assert!((mat.get_elem(4, 5) - 0.1 / (gamma * gamma)).abs() < 1e-15);
    }

    #[test]
    fn weak_quadrupole_is_drift() {
        let kin = Kinematics::new(Species::PROTON, 3.0e6);
        let slice = Slice::whole(0.5);
        let drift = drift_matrix(0.5, kin.gamma());

        for gradient in [0.0, 1e-12, -1e-12] {
            let quad = Quadrupole::new("Q", 0.5, gradient);
            for kernel in [QuadKernel::Exact, QuadKernel::Branching, QuadKernel::Sandwich] {
                let mat = matrix(&quad, &kin, &slice, &ctx(kernel));
                assert!(mat.max_abs_diff(&drift) < 1e-6);
            }
        }
    }

    #[test]
    fn field_comes_from_source() {
        let kin = Kinematics::new(Species::PROTON, 3.0e6);
        let slice = Slice::whole(0.1);
        let quad = Quadrupole::new("QH1", 0.1, 10.0);

        let snapshot: FieldSnapshot = [("QH1", -10.0)].into_iter().collect();
        let live = KernelContext {
            fields: &snapshot,
            quad_kernel: QuadKernel::Exact,
        };
        let design = matrix(&quad, &kin, &slice, &ctx(QuadKernel::Exact));
        let flipped = matrix(&quad, &kin, &slice, &live);
        assert_eq!(design.block(Plane::Horizontal), flipped.block(Plane::Vertical));

        let empty = FieldSnapshot::new();
        let missing = KernelContext {
            fields: &empty,
            quad_kernel: QuadKernel::Exact,
        };
        assert!(matches!(
            quad.transfer_map(&kin, &slice, &missing),
            Err(ModelError::MissingParameter { .. })
        ));
    }
}
