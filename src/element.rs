//! Beamline elements and their transfer kernels
//!
//! [Element] is a closed set of element kinds. Every kind implements [ElementKernel], which maps
//! the probe kinematics and a slice of the element onto a [PhaseMap].

use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::field::FieldSource;
use crate::kinematics::Kinematics;
use crate::optics::QuadKernel;
use crate::phase::{PhaseMap, PhaseMatrix};

mod bend;
mod drift;
mod quadrupole;
mod rf_gap;

pub use bend::{BendPlane, SectorBend};
pub use drift::{drift_matrix, Drift};
pub use quadrupole::Quadrupole;
pub use rf_gap::RfGap;

/// Part of an element traversed in one propagation step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Slice {
    /// Index of this slice, starting at 0
    pub index: usize,
    /// Number of slices the element is divided in
    pub count: usize,
    /// Length of the slice \[m\]
    pub length: f64,
}

impl Slice {
    /// The complete element as a single slice
    pub fn whole(length: f64) -> Slice {
        Slice {
            index: 0,
            count: 1,
            length,
        }
    }

    /// Whether this slice contains the entrance of the element
    pub fn is_first(&self) -> bool {
        self.index == 0
    }

    /// Whether this slice contains the exit of the element
    pub fn is_last(&self) -> bool {
        self.index + 1 == self.count
    }
}

/// Everything a kernel needs besides the probe kinematics
#[derive(Clone, Copy)]
pub struct KernelContext<'a> {
    /// Source of magnet fields
    pub fields: &'a dyn FieldSource,
    /// Kernel used for quadrupole planes
    pub quad_kernel: QuadKernel,
}

/// Transfer behaviour of an element kind
pub trait ElementKernel {
    /// Transfer map of `slice` for a probe with kinematics `kin` at the slice entrance
    fn transfer_map(
        &self,
        kin: &Kinematics,
        slice: &Slice,
        ctx: &KernelContext<'_>,
    ) -> Result<PhaseMap, ModelError>;

    /// Kinetic energy gained over `slice` \[eV\]
    fn energy_gain(&self, _kin: &Kinematics, _slice: &Slice) -> f64 {
        0.0
    }

    /// Time needed to traverse `slice` \[s\]
    fn elapsed_time(&self, kin: &Kinematics, slice: &Slice) -> f64 {
        kin.drift_time(slice.length)
    }
}

/// Zero-length element that does nothing but mark a position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Marker {
    /// Element identifier
    pub id: String,
}

impl ElementKernel for Marker {
    fn transfer_map(
        &self,
        _kin: &Kinematics,
        _slice: &Slice,
        _ctx: &KernelContext<'_>,
    ) -> Result<PhaseMap, ModelError> {
        Ok(PhaseMap::new(PhaseMatrix::identity()))
    }

    fn elapsed_time(&self, _kin: &Kinematics, _slice: &Slice) -> f64 {
        0.0
    }
}

/// Beamline element
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Element {
    /// Field-free region
    Drift(Drift),
    /// Magnetic quadrupole
    Quadrupole(Quadrupole),
    /// Sector dipole with pole-face rotations
    SectorBend(SectorBend),
    /// Thin accelerating gap
    RfGap(RfGap),
    /// Position marker
    Marker(Marker),
}

impl Element {
    /// Instance identifier
    pub fn id(&self) -> &str {
        match self {
            Element::Drift(elem) => &elem.id,
            Element::Quadrupole(elem) => &elem.id,
            Element::SectorBend(elem) => &elem.id,
            Element::RfGap(elem) => &elem.id,
            Element::Marker(elem) => &elem.id,
        }
    }

    /// Type tag of the element kind
    pub fn type_tag(&self) -> &'static str {
        match self {
            Element::Drift(_) => "Drift",
            Element::Quadrupole(_) => "Quadrupole",
            Element::SectorBend(_) => "SectorBend",
            Element::RfGap(_) => "RfGap",
            Element::Marker(_) => "Marker",
        }
    }

    /// Length along the design orbit \[m\]; zero for thin elements
    pub fn length(&self) -> f64 {
        match self {
            Element::Drift(elem) => elem.length,
            Element::Quadrupole(elem) => elem.length,
            Element::SectorBend(elem) => elem.length,
            Element::RfGap(_) | Element::Marker(_) => 0.0,
        }
    }

    /// Whether the element acts instantaneously
    pub fn is_thin(&self) -> bool {
        self.length() == 0.0
    }

    fn kernel(&self) -> &dyn ElementKernel {
        match self {
            Element::Drift(elem) => elem,
            Element::Quadrupole(elem) => elem,
            Element::SectorBend(elem) => elem,
            Element::RfGap(elem) => elem,
            Element::Marker(elem) => elem,
        }
    }

    /// Check parameters that do not depend on the probe
    pub fn validate(&self) -> Result<(), ModelError> {
        let length = self.length();
        if !length.is_finite() || length < 0.0 {
            return Err(ModelError::InvalidParameter {
                id: self.id().to_owned(),
                parameter: "length",
                reason: format!("{length} is not a finite non-negative length"),
            });
        }

        match self {
            Element::SectorBend(bend) => bend.validate(),
            Element::RfGap(gap) => gap.validate(),
            _ => Ok(()),
        }
    }
}

impl ElementKernel for Element {
    fn transfer_map(
        &self,
        kin: &Kinematics,
        slice: &Slice,
        ctx: &KernelContext<'_>,
    ) -> Result<PhaseMap, ModelError> {
        self.kernel().transfer_map(kin, slice, ctx)
    }

    fn energy_gain(&self, kin: &Kinematics, slice: &Slice) -> f64 {
        self.kernel().energy_gain(kin, slice)
    }

    fn elapsed_time(&self, kin: &Kinematics, slice: &Slice) -> f64 {
        self.kernel().elapsed_time(kin, slice)
    }
}

impl From<Drift> for Element {
    fn from(elem: Drift) -> Element {
        Element::Drift(elem)
    }
}

impl From<Quadrupole> for Element {
    fn from(elem: Quadrupole) -> Element {
        Element::Quadrupole(elem)
    }
}

impl From<SectorBend> for Element {
    fn from(elem: SectorBend) -> Element {
        Element::SectorBend(elem)
    }
}

impl From<RfGap> for Element {
    fn from(elem: RfGap) -> Element {
        Element::RfGap(elem)
    }
}

impl From<Marker> for Element {
    fn from(elem: Marker) -> Element {
        Element::Marker(elem)
    }
}

#[cfg(test)]
mod tests {
    use super::{Drift, Element, ElementKernel, KernelContext, Marker, Slice};
    use crate::field::DesignFields;
    use crate::kinematics::{Kinematics, Species};
    use crate::optics::QuadKernel;
    use crate::phase::PhaseMatrix;

    #[test]
    fn slices() {
        let first = Slice {
            index: 0,
            count: 3,
            length: 0.1,
        };
        let last = Slice { index: 2, ..first };
        assert!(first.is_first() && !first.is_last());
        assert!(last.is_last() && !last.is_first());
        assert!(Slice::whole(1.0).is_first() && Slice::whole(1.0).is_last());
    }

    #[test]
    fn dispatch() {
        let kin = Kinematics::new(Species::PROTON, 3.0e6);
        let ctx = KernelContext {
            fields: &DesignFields,
            quad_kernel: QuadKernel::Exact,
        };

        let marker: Element = Marker { id: "M".into() }.into();
        assert!(marker.is_thin());
        assert_eq!(marker.type_tag(), "Marker");
        assert_eq!(
            *marker
                .transfer_map(&kin, &Slice::whole(0.0), &ctx)
                .unwrap()
                .first_order(),
            PhaseMatrix::identity()
        );

        let drift: Element = Drift::new("DR1", 0.5).into();
        assert_eq!(drift.id(), "DR1");
        assert_eq!(drift.energy_gain(&kin, &Slice::whole(0.5)), 0.0);
        let time = drift.elapsed_time(&kin, &Slice::whole(0.5));
        assert!((time - kin.drift_time(0.5)).abs() < 1e-20);
    }

    #[test]
    fn negative_length_is_rejected() {
        assert!(Element::from(Drift::new("DR1", -1.0)).validate().is_err());
        assert!(Element::from(Drift::new("DR1", 1.0)).validate().is_ok());
    }

    #[test]
    fn deserialize() {
        let json = r#"{"type": "Quadrupole", "id": "QH1", "length": 0.1, "gradient": 12.0}"#;
        let elem: Element = serde_json::from_str(json).unwrap();
        assert_eq!(elem.type_tag(), "Quadrupole");
        assert_eq!(elem.length(), 0.1);

        let json = r#"{"type": "SectorBend", "id": "B1", "length": 1.0, "angle": 0.1,
            "field": 0.3, "entrence_angle": 0.05}"#;
        assert!(serde_json::from_str::<Element>(json).is_err());
    }
}
