//! Probes: the beam or particle state propagated through a lattice
//!
//! A [Probe] owns its kinematics, the transfer matrix accumulated since the start of propagation,
//! a kind-specific state ([StateData]) and the [Trajectory] it records. The rule used to advance
//! the kind-specific state depends on the probe kind:
//!
//! * particle: `z' = M z`
//! * envelope: `sigma' = M sigma M^T`
//! * response: `R' = M R`

use serde::{Deserialize, Serialize};

use crate::element::Element;
use crate::error::ModelError;
use crate::kinematics::{Kinematics, Species};
use crate::phase::{PhaseMap, PhaseMatrix, PhaseVector, Plane};
use crate::trajectory::Trajectory;

mod state;
pub mod twiss;

pub use state::{central_moments, ProbeState, StateData};
pub use twiss::{Twiss, TwissProperty};

/// Supported probe kinds
#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeKind {
    /// Single particle
    Particle,
    /// Beam envelope
    Envelope,
    /// First-order response matrix
    Response,
}

impl ProbeKind {
    /// Lowercase name
    pub fn name(self) -> &'static str {
        match self {
            ProbeKind::Particle => "particle",
            ProbeKind::Envelope => "envelope",
            ProbeKind::Response => "response",
        }
    }
}

/// Kind-specific initial conditions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum InitialData {
    /// Particle probe starting at the given coordinates
    Particle {
        /// Phase-space coordinates `(x, x', y, y', z, z')`
        coordinates: [f64; 6],
    },
    /// Envelope probe starting from uncoupled Twiss parameters
    Envelope {
        /// Twiss parameters of the horizontal, vertical and longitudinal plane
        twiss: [Twiss; 3],
        /// Beam centroid `(x, x', y, y', z, z')`
        #[serde(default)]
        centroid: [f64; 6],
    },
    /// Response probe starting from the identity
    Response,
}

/// Initial conditions of a propagation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeSpec {
    /// Particle species
    #[serde(default = "default_species")]
    pub species: Species,
    /// Kinetic energy \[eV\]
    pub kinetic_energy: f64,
    /// Initial position \[m\]
    #[serde(default)]
    pub position: f64,
    /// Initial time \[s\]
    #[serde(default)]
    pub time: f64,
    /// Kind-specific data
    #[serde(flatten)]
    pub data: InitialData,
}

fn default_species() -> Species {
    Species::PROTON
}

/// Homogeneous covariance `<z z^T>` of uncoupled planes around `centroid`.
///
/// The last row and column hold the centroid, so affine maps move it along with the moments.
fn covariance(twiss: &[Twiss; 3], centroid: &[f64; 6]) -> PhaseMatrix {
    let mut cov = PhaseMatrix::from_blocks(
        &twiss[0].covariance(),
        &twiss[1].covariance(),
        &twiss[2].covariance(),
    );
    for i in 0..6 {
        for j in 0..6 {
            cov.set_elem(i, j, cov.get_elem(i, j) + centroid[i] * centroid[j]);
        }
        cov.set_elem(i, 6, centroid[i]);
        cov.set_elem(6, i, centroid[i]);
    }
    cov
}

/// Evolving beam or particle state
#[derive(Debug, Clone)]
pub struct Probe {
    kinematics: Kinematics,
    position: f64,
    time: f64,
    element_id: String,
    element_type: &'static str,
    transfer: PhaseMatrix,
    data: StateData,
    initial: ProbeState,
    trajectory: Trajectory,
    tracking: bool,
}

impl Probe {
    /// Create a probe from its initial conditions
    pub fn new(spec: &ProbeSpec) -> Result<Probe, ModelError> {
        let invalid = |parameter, reason: String| ModelError::InvalidParameter {
            id: "probe".to_owned(),
            parameter,
            reason,
        };

        if !(spec.species.rest_energy > 0.0) {
            return Err(invalid(
                "rest_energy",
                format!("{} eV is not a positive rest energy", spec.species.rest_energy),
            ));
        }
        if !(spec.kinetic_energy > 0.0) || !spec.kinetic_energy.is_finite() {
            return Err(invalid(
                "kinetic_energy",
                format!("{} eV is not a positive kinetic energy", spec.kinetic_energy),
            ));
        }
        if !spec.position.is_finite() {
            return Err(invalid(
                "position",
                format!("{} m is not a finite position", spec.position),
            ));
        }
        if !spec.time.is_finite() {
            return Err(invalid("time", format!("{} s is not a finite time", spec.time)));
        }

        let data = match &spec.data {
            InitialData::Particle { coordinates } => StateData::Particle {
                coordinates: PhaseVector::new(*coordinates),
            },
            InitialData::Envelope { twiss, centroid } => {
                if let Some(bad) = twiss
                    .iter()
                    .find(|t| !(t.beta > 0.0) || !(t.emittance >= 0.0))
                {
                    return Err(invalid(
                        "twiss",
                        format!(
                            "beta {} and emittance {} are not physical",
                            bad.beta, bad.emittance
                        ),
                    ));
                }
                if !centroid.iter().all(|c| c.is_finite()) {
                    return Err(invalid("centroid", format!("{centroid:?} is not finite")));
                }
                StateData::Envelope {
                    covariance: covariance(twiss, centroid),
                    phase_advance: [0.0; 3],
                }
            }
            InitialData::Response => StateData::Response {
                response: PhaseMatrix::identity(),
            },
        };

        let mut probe = Probe {
            kinematics: Kinematics::new(spec.species, spec.kinetic_energy),
            position: spec.position,
            time: spec.time,
            element_id: String::new(),
            element_type: "",
            transfer: PhaseMatrix::identity(),
            data,
            initial: ProbeState {
                element_id: String::new(),
                element_type: "",
                position: 0.0,
                time: 0.0,
                kinetic_energy: 0.0,
                species: spec.species,
                transfer: PhaseMatrix::identity(),
                data: StateData::Response {
                    response: PhaseMatrix::identity(),
                },
            },
            trajectory: Trajectory::new(format!("{} probe", spec.data.kind().name())),
            tracking: true,
        };
        probe.initialize();

        Ok(probe)
    }

    /// Probe kind
    pub fn kind(&self) -> ProbeKind {
        self.data.kind()
    }

    /// Current kinematics
    pub fn kinematics(&self) -> Kinematics {
        self.kinematics
    }

    /// Current position \[m\]
    pub fn position(&self) -> f64 {
        self.position
    }

    /// Current time \[s\]
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Current kinetic energy \[eV\]
    pub fn kinetic_energy(&self) -> f64 {
        self.kinematics.kinetic_energy
    }

    /// Id of the element the probe is in
    pub fn element_id(&self) -> &str {
        &self.element_id
    }

    /// Transfer matrix accumulated since the last reset
    pub fn transfer(&self) -> &PhaseMatrix {
        &self.transfer
    }

    /// Kind-specific state
    pub fn data(&self) -> &StateData {
        &self.data
    }

    /// Recorded trajectory
    pub fn trajectory(&self) -> &Trajectory {
        &self.trajectory
    }

    /// Take the recorded trajectory, leaving an empty one behind
    pub fn take_trajectory(&mut self) -> Trajectory {
        let description = self.trajectory.description().to_owned();
        std::mem::replace(&mut self.trajectory, Trajectory::new(description))
    }

    /// Enable or disable recording on [Probe::update]
    pub fn set_tracking(&mut self, tracking: bool) {
        self.tracking = tracking;
    }

    /// Record that the probe entered `element`
    pub fn set_current_element(&mut self, element: &Element) {
        element.id().clone_into(&mut self.element_id);
        self.element_type = element.type_tag();
    }

    /// Advance over one element slice with transfer map `map`, taking `length` meters and `time`
    /// seconds and gaining `energy_gain` eV
    pub fn advance(&mut self, map: &PhaseMap, length: f64, time: f64, energy_gain: f64) {
        let mat = map.first_order();

        match &mut self.data {
            StateData::Particle { coordinates } => *coordinates = mat.apply(coordinates),
            StateData::Envelope {
                covariance,
                phase_advance,
            } => {
                let next = covariance.conjugate_trans(mat);
                let (before, after) = (central_moments(covariance), central_moments(&next));
                for plane in Plane::ALL {
                    let before = Twiss::from_moments(&before.block(plane));
                    let after = Twiss::from_moments(&after.block(plane));
                    if let (Some(before), Some(after)) = (before, after) {
                        phase_advance[plane as usize] +=
                            before.phase_advance(&after, &mat.block(plane));
                    }
                }
                *covariance = next;
            }
            StateData::Response { response } => *response = mat.times(response),
        }

        self.transfer = mat.times(&self.transfer);
        self.position += length;
        self.time += time;
        self.kinematics.kinetic_energy += energy_gain;
    }

    /// Snapshot of the current state
    pub fn create_probe_state(&self) -> ProbeState {
        ProbeState {
            element_id: self.element_id.clone(),
            element_type: self.element_type,
            position: self.position,
            time: self.time,
            kinetic_energy: self.kinematics.kinetic_energy,
            species: self.kinematics.species,
            transfer: self.transfer,
            data: self.data.clone(),
        }
    }

    /// Record the current state in the trajectory, if tracking is enabled
    pub fn update(&mut self) -> Result<(), ModelError> {
        if self.tracking {
            self.trajectory.push(self.create_probe_state())?;
        }
        Ok(())
    }

    /// Make the current state the one [Probe::reset] returns to
    pub fn initialize(&mut self) {
        self.initial = self.create_probe_state();
    }

    /// Return to the initial state and clear the trajectory
    pub fn reset(&mut self) {
        let initial = &self.initial;
        self.kinematics = initial.kinematics();
        self.position = initial.position;
        self.time = initial.time;
        self.element_id.clone_from(&initial.element_id);
        self.element_type = initial.element_type;
        self.transfer = initial.transfer;
        self.data = initial.data.clone();
        self.trajectory.clear();
    }
}

impl InitialData {
    /// Probe kind created from this data
    pub fn kind(&self) -> ProbeKind {
        match self {
            InitialData::Particle { .. } => ProbeKind::Particle,
            InitialData::Envelope { .. } => ProbeKind::Envelope,
            InitialData::Response => ProbeKind::Response,
        }
    }
}
