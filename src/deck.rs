//! Complete propagation setup, as read by the command-line front ends

use itertools::Itertools as _;
use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::field::{DesignFields, FieldSnapshot, FieldSource};
use crate::lattice::Sequence;
use crate::phase::{PhaseIndex, Plane};
use crate::probe::{Probe, ProbeKind, ProbeSpec, ProbeState, StateData};
use crate::tracker::{Tracker, TrackerConfig};
use crate::trajectory::Trajectory;

/// Lattice, initial probe and tracker settings of one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deck {
    /// Lattice to propagate through
    pub lattice: Sequence,
    /// Initial conditions
    pub probe: ProbeSpec,
    /// Tracker settings
    #[serde(default)]
    pub tracker: TrackerConfig,
    /// Live magnet fields; design fields are used if absent
    #[serde(default)]
    pub fields: Option<FieldSnapshot>,
}

impl Deck {
    /// Field source of this deck
    pub fn field_source(&self) -> &dyn FieldSource {
        match &self.fields {
            Some(snapshot) => snapshot as &dyn FieldSource,
            None => &DesignFields,
        }
    }

    /// Propagate the probe through the lattice.
    ///
    /// On failure the partial trajectory is returned alongside the error.
    pub fn track(&self) -> Result<Trajectory, (ModelError, Trajectory)> {
        let mut probe = Probe::new(&self.probe).map_err(|err| (err, Trajectory::new("")))?;
        let mut tracker = Tracker::new(self.tracker.clone());

        match tracker.propagate(&mut probe, &self.lattice, self.field_source()) {
            Ok(()) => Ok(probe.take_trajectory()),
            Err(err) => Err((err, probe.take_trajectory())),
        }
    }
}

/// CSV header for states of probe kind `kind`
pub fn csv_header(kind: ProbeKind) -> String {
    let columns: Vec<String> = match kind {
        ProbeKind::Particle => ["x", "xp", "y", "yp", "z", "zp"]
            .into_iter()
            .map(str::to_owned)
            .collect(),
        ProbeKind::Envelope => Plane::ALL
            .iter()
            .flat_map(|plane| {
                let name = plane_name(*plane);
                ["alpha", "beta", "emittance", "mu"].map(|col| format!("{col}_{name}"))
            })
            .collect(),
        ProbeKind::Response => Plane::ALL
            .iter()
            .flat_map(|plane| {
                let name = plane_name(*plane);
                ["r11", "r12", "r21", "r22"].map(|col| format!("{col}_{name}"))
            })
            .collect(),
    };

    ["position", "element", "kinetic_energy"]
        .into_iter()
        .map(str::to_owned)
        .chain(columns)
        .join(",")
}

/// CSV row of `state`, matching [csv_header]
pub fn csv_row(state: &ProbeState) -> String {
    let values: Vec<f64> = match &state.data {
        StateData::Particle { coordinates } => [
            PhaseIndex::X,
            PhaseIndex::Xp,
            PhaseIndex::Y,
            PhaseIndex::Yp,
            PhaseIndex::Z,
            PhaseIndex::Zp,
        ]
        .map(|index| coordinates[index])
        .to_vec(),
        StateData::Envelope { .. } => Plane::ALL
            .iter()
            .flat_map(|&plane| {
                let mu = state.phase_advance(plane).unwrap_or(f64::NAN);
                match state.twiss(plane) {
                    Some(twiss) => [twiss.alpha, twiss.beta, twiss.emittance, mu],
                    None => [f64::NAN, f64::NAN, f64::NAN, mu],
                }
            })
            .collect(),
        StateData::Response { response } => Plane::ALL
            .iter()
            .flat_map(|&plane| {
                let block = response.block(plane);
                [block[(0, 0)], block[(0, 1)], block[(1, 0)], block[(1, 1)]]
            })
            .collect(),
    };

    format!(
        "{},{},{},{}",
        state.position,
        state.element_id,
        state.kinetic_energy,
        values.iter().join(",")
    )
}

fn plane_name(plane: Plane) -> &'static str {
    match plane {
        Plane::Horizontal => "x",
        Plane::Vertical => "y",
        Plane::Longitudinal => "z",
    }
}
