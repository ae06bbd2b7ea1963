use serde::{Deserialize, Serialize};

use super::{drift_matrix, ElementKernel, KernelContext, Slice};
use crate::error::ModelError;
use crate::field::{FieldSource as _, MagnetRef};
use crate::kinematics::{Kinematics, LIGHT_SPEED};
use crate::optics::{sinc, sinc3, sincm, sinch, sinch3, sinchm, Exact, LensKernel as _};
use crate::phase::{PhaseIndex, PhaseMap, PhaseMatrix, Plane};

/// Plane in which a dipole bends the design orbit
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BendPlane {
    /// Bends in x
    #[default]
    Horizontal,
    /// Bends in y
    Vertical,
}

impl BendPlane {
    /// The bending plane and the other transverse plane
    fn planes(self) -> (Plane, Plane) {
        match self {
            BendPlane::Horizontal => (Plane::Horizontal, Plane::Vertical),
            BendPlane::Vertical => (Plane::Vertical, Plane::Horizontal),
        }
    }
}

/// Sector dipole.
///
/// The geometry (`length`, `angle`) fixes the design curvature; the field actually used is read
/// from the [crate::field::FieldSource]. Pole-face rotations are applied on the first and last
/// slice only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SectorBend {
    /// Element identifier
    pub id: String,
    /// Path length of the design orbit \[m\]
    pub length: f64,
    /// Design bending angle \[rad\]
    pub angle: f64,
    /// Design field \[T\]
    pub field: f64,
    /// Bending plane
    #[serde(default)]
    pub plane: BendPlane,
    /// Field index `-(R0/B0) dB/dR`
    #[serde(default)]
    pub field_index: f64,
    /// Entrance pole-face rotation \[rad\]
    #[serde(default)]
    pub entrance_angle: f64,
    /// Exit pole-face rotation \[rad\]
    #[serde(default)]
    pub exit_angle: f64,
    /// Full gap height \[m\]
    #[serde(default)]
    pub gap: f64,
    /// Fringe-field integral
    #[serde(default)]
    pub fringe_integral: f64,
}

impl SectorBend {
    /// Horizontal sector bend without pole-face rotations
    pub fn new(id: impl Into<String>, length: f64, angle: f64, field: f64) -> SectorBend {
        SectorBend {
            id: id.into(),
            length,
            angle,
            field,
            plane: BendPlane::Horizontal,
            field_index: 0.0,
            entrance_angle: 0.0,
            exit_angle: 0.0,
            gap: 0.0,
            fringe_integral: 0.0,
        }
    }

    /// Set the pole-face rotations
    pub fn with_pole_faces(mut self, entrance: f64, exit: f64) -> SectorBend {
        self.entrance_angle = entrance;
        self.exit_angle = exit;
        self
    }

    /// Set the gap height and fringe-field integral
    pub fn with_fringe(mut self, gap: f64, fringe_integral: f64) -> SectorBend {
        self.gap = gap;
        self.fringe_integral = fringe_integral;
        self
    }

    /// Field which bends a probe with kinematics `kin` along the design orbit \[T\]
    pub fn matched_field(kin: &Kinematics, length: f64, angle: f64) -> f64 {
        let h0 = angle / length;
        h0 * kin.beta_gamma() * kin.species.rest_energy / (kin.species.charge * LIGHT_SPEED)
    }

    /// Curvature of the design orbit \[1/m\]
    pub fn design_curvature(&self) -> f64 {
        self.angle / self.length
    }

    /// Curvature of a probe's orbit in `field` \[1/m\]
    pub fn curvature(kin: &Kinematics, field: f64) -> f64 {
        kin.species.charge * LIGHT_SPEED * field / (kin.beta_gamma() * kin.species.rest_energy)
    }

    pub(super) fn validate(&self) -> Result<(), ModelError> {
        let invalid = |parameter, reason: &str| ModelError::InvalidParameter {
            id: self.id.clone(),
            parameter,
            reason: reason.to_owned(),
        };

        if self.length <= 0.0 {
            return Err(invalid("length", "a bend needs a positive path length"));
        }
        if self.angle != 0.0 && self.field == 0.0 {
            return Err(invalid("field", "design field vanishes for a nonzero bending angle"));
        }
        let faces = [
            ("entrance_angle", self.entrance_angle),
            ("exit_angle", self.exit_angle),
        ];
        for (parameter, angle) in faces {
            if angle.cos().abs() < 1e-12 {
                return Err(invalid(parameter, "pole face is parallel to the orbit"));
            }
        }

        Ok(())
    }

    /// Pole-face matrix for a face rotated by `angle` in a field of curvature `h`
    fn pole_face(&self, h: f64, angle: f64) -> PhaseMatrix {
        let (bend, other) = self.plane.planes();
        let (b, o) = (bend.offset(), other.offset());

        let sin = angle.sin();
        let psi = self.gap * h * (1.0 + sin * sin) / angle.cos() * self.fringe_integral;

        let mut face = PhaseMatrix::identity();
        face.set_elem(b + 1, b, h * angle.tan());
        face.set_elem(o + 1, o, -h * (angle - psi).tan());
        face
    }

    fn magnet(&self) -> MagnetRef<'_> {
        MagnetRef {
            id: &self.id,
            design_field: self.field,
        }
    }
}

impl ElementKernel for SectorBend {
    fn transfer_map(
        &self,
        kin: &Kinematics,
        slice: &Slice,
        ctx: &KernelContext<'_>,
    ) -> Result<PhaseMap, ModelError> {
        let field = ctx.fields.require(self.magnet())?;
        let l = slice.length;
        let gamma = kin.gamma();
        let gamma2 = gamma * gamma;

        if field == 0.0 || self.angle == 0.0 {
            return Ok(PhaseMap::new(drift_matrix(l, gamma)));
        }

        let h0 = self.design_curvature();
        let h = Self::curvature(kin, field);
        // Probe orbit radius relative to the design radius
        let scale = h0 / h;
        let offset = 1.0 - h / h0;

        let k_quad = -h * h * self.field_index;
        let k_bend = h * h + k_quad;
        let kx = k_bend.abs().sqrt();
        let ky = k_quad.abs().sqrt();
        let phi = kx * l;

        let (bend_block, m05, m15, m40, m41, dispersive) = if k_bend >= 0.0 {
            (
                (Exact {}).focusing(kx, l),
                h0 * l * l * sincm(phi),
                h0 * l * sinc(phi),
                -h0 * l * sinc(phi),
                -h0 * l * l * sincm(phi),
                h0 * h0 * l * l * l * sinc3(phi),
            )
        } else {
            (
                (Exact {}).defocusing(kx, l),
                h0 * l * l * sinchm(phi),
                h0 * l * sinch(phi),
                -h0 * l * sinch(phi),
                -h0 * l * l * sinchm(phi),
                -h0 * h0 * l * l * l * sinch3(phi),
            )
        };
        let other_block = if k_quad <= 0.0 {
            (Exact {}).focusing(ky, l)
        } else {
            (Exact {}).defocusing(ky, l)
        };

        let m05 = m05 * scale;
        let m15 = m15 * scale;
        let m45 = l / gamma2 - dispersive * scale;

        let (bend, other) = self.plane.planes();
        let b = bend.offset();
        let z = PhaseIndex::Z as usize;
        let zp = PhaseIndex::Zp as usize;
        let hom = PhaseIndex::Hom as usize;

        let mut body = PhaseMatrix::identity();
        body.set_block(bend, &bend_block);
        body.set_block(other, &other_block);
        body.set_elem(b, zp, m05);
        body.set_elem(b + 1, zp, m15);
        body.set_elem(z, b, m40);
        body.set_elem(z, b + 1, m41);
        body.set_elem(z, zp, m45);
        body.set_elem(b, hom, m05 * offset);
        body.set_elem(b + 1, hom, m15 * offset);
        body.set_elem(z, hom, m45 * offset);

        let ratio = field / self.field;
        if slice.is_first() {
            body = body.times(&self.pole_face(h, self.entrance_angle * ratio));
        }
        if slice.is_last() {
            body = self.pole_face(h, self.exit_angle * ratio).times(&body);
        }

        Ok(PhaseMap::new(body))
    }
}
