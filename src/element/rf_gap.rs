use std::f64::consts::PI;

use nalgebra::Matrix2;
use serde::{Deserialize, Serialize};

use super::{ElementKernel, KernelContext, Slice};
use crate::error::ModelError;
use crate::kinematics::{Kinematics, LIGHT_SPEED};
use crate::phase::{PhaseMap, PhaseMatrix};

/// Thin accelerating gap
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RfGap {
    /// Element identifier
    pub id: String,
    /// Effective gap voltage `E0 T L` \[V\]
    pub etl: f64,
    /// Synchronous phase \[rad\], 0 on crest
    pub phase: f64,
    /// RF frequency \[Hz\]
    pub frequency: f64,
}

impl RfGap {
    /// Construct a gap
    pub fn new(id: impl Into<String>, etl: f64, phase: f64, frequency: f64) -> RfGap {
        RfGap {
            id: id.into(),
            etl,
            phase,
            frequency,
        }
    }

    pub(super) fn validate(&self) -> Result<(), ModelError> {
        if !(self.frequency > 0.0) {
            return Err(ModelError::InvalidParameter {
                id: self.id.clone(),
                parameter: "frequency",
                reason: format!("{} Hz is not a positive frequency", self.frequency),
            });
        }
        Ok(())
    }

    /// Energy gained by the synchronous particle \[eV\]
    pub fn gain(&self, kin: &Kinematics) -> f64 {
        kin.species.charge.abs() * self.etl * self.phase.cos()
    }
}

impl ElementKernel for RfGap {
    fn transfer_map(
        &self,
        kin: &Kinematics,
        _slice: &Slice,
        _ctx: &KernelContext<'_>,
    ) -> Result<PhaseMap, ModelError> {
        let gain = self.gain(kin);
        let exit = kin.with_energy(kin.kinetic_energy + gain);
        if !(exit.kinetic_energy > 0.0) {
            return Err(ModelError::InvalidParameter {
                id: self.id.clone(),
                parameter: "etl",
                reason: format!("gap decelerates the probe to {} eV", exit.kinetic_energy),
            });
        }
        let mid = kin.with_energy(kin.kinetic_energy + 0.5 * gain);

        let bg_in = kin.beta_gamma();
        let bg_out = exit.beta_gamma();
        let bg_mid = mid.beta_gamma();
        let gamma_mid = mid.gamma();

        let kt = PI * kin.species.charge.abs() * self.etl * self.frequency * (-self.phase).sin()
            / (LIGHT_SPEED * kin.species.rest_energy * bg_mid * bg_mid);
        let kz = -2.0 * kt * gamma_mid * gamma_mid;

        let damping = bg_in / bg_out;
        let transverse = Matrix2::new(1.0, 0.0, kt / bg_out, damping);
        let longitudinal = Matrix2::new(1.0, 0.0, kz / bg_out, damping);

        Ok(PhaseMap::new(PhaseMatrix::from_blocks(
            &transverse,
            &transverse,
            &longitudinal,
        )))
    }

    fn energy_gain(&self, kin: &Kinematics, _slice: &Slice) -> f64 {
        self.gain(kin)
    }

    fn elapsed_time(&self, _kin: &Kinematics, _slice: &Slice) -> f64 {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use std::f64::consts::FRAC_PI_2;

    use super::RfGap;
    use crate::element::{ElementKernel, KernelContext, Slice};
    use crate::error::ModelError;
    use crate::field::DesignFields;
    use crate::kinematics::{Kinematics, Species};
    use crate::optics::QuadKernel;
    use crate::phase::Plane;

    const CTX: KernelContext<'static> = KernelContext {
        fields: &DesignFields,
        quad_kernel: QuadKernel::Exact,
    };

    #[test]
    fn on_crest_gap() {
        let kin = Kinematics::new(Species::PROTON, 3.0e6);
        let gap = RfGap::new("RG1", 1.0e5, 0.0, 352.2e6);
        let slice = Slice::whole(0.0);

        assert_eq!(gap.energy_gain(&kin, &slice), 1.0e5);
        assert_eq!(gap.elapsed_time(&kin, &slice), 0.0);

        let mat = *gap.transfer_map(&kin, &slice, &CTX).unwrap().first_order();
        let damping = kin.beta_gamma() / kin.with_energy(3.1e6).beta_gamma();
        // No transverse kick on crest, only adiabatic damping
        assert_eq!(mat.block(Plane::Horizontal)[(1, 0)], 0.0);
        assert!((mat.get_elem(1, 1) - damping).abs() < 1e-15);
        assert!((mat.get_elem(5, 5) - damping).abs() < 1e-15);
        assert!(damping < 1.0);
    }

    #[test]
    fn bunching_phase_focuses_longitudinally() {
        let kin = Kinematics::new(Species::PROTON, 3.0e6);
        let gap = RfGap::new("RG1", 1.0e5, -FRAC_PI_2 / 3.0, 352.2e6);
        let mat = *gap.transfer_map(&kin, &Slice::whole(0.0), &CTX).unwrap().first_order();

        // Transverse defocusing and longitudinal focusing below crest
        assert!(mat.get_elem(1, 0) > 0.0);
        assert!(mat.get_elem(5, 4) < 0.0);
        assert_eq!(mat.get_elem(1, 0), mat.get_elem(3, 2));
    }

    #[test]
    fn deceleration_below_zero_fails() {
        let kin = Kinematics::new(Species::PROTON, 1.0e4);
        let gap = RfGap::new("RG1", 1.0e5, std::f64::consts::PI, 352.2e6);

        assert!(matches!(
            gap.transfer_map(&kin, &Slice::whole(0.0), &CTX),
            Err(ModelError::InvalidParameter { parameter: "etl", .. })
        ));
    }
}
