use crate::kinematics::{Kinematics, Species};
use crate::phase::{Matrix7, PhaseMatrix, PhaseVector, Plane};

use super::twiss::{Twiss, TwissProperty};
use super::ProbeKind;

/// Central second moments `<(z - m)(z - m)^T>` of a homogeneous covariance `<z z^T>`.
///
/// The centroid `m` is read from the homogeneous column. The homogeneous row and column of the
/// result are zero.
pub fn central_moments(covariance: &PhaseMatrix) -> PhaseMatrix {
    let mut central = PhaseMatrix::from_matrix(Matrix7::zeros());
    for i in 0..6 {
        for j in 0..6 {
            let mean = covariance.get_elem(i, 6) * covariance.get_elem(j, 6);
            central.set_elem(i, j, covariance.get_elem(i, j) - mean);
        }
    }
    central
}

/// Kind-specific part of a probe state
#[derive(Debug, Clone, PartialEq)]
pub enum StateData {
    /// Single particle coordinates
    Particle {
        /// Phase-space coordinates
        coordinates: PhaseVector,
    },
    /// Beam envelope as a covariance matrix
    Envelope {
        /// Homogeneous second moments `<z z^T>`, whose last column is the centroid
        covariance: PhaseMatrix,
        /// Accumulated betatron phase advance per plane \[rad\]
        phase_advance: [f64; 3],
    },
    /// First-order response to initial perturbations
    Response {
        /// Accumulated response matrix
        response: PhaseMatrix,
    },
}

impl StateData {
    /// Probe kind this data belongs to
    pub fn kind(&self) -> ProbeKind {
        match self {
            StateData::Particle { .. } => ProbeKind::Particle,
            StateData::Envelope { .. } => ProbeKind::Envelope,
            StateData::Response { .. } => ProbeKind::Response,
        }
    }
}

/// Immutable snapshot of a probe at one point of the lattice
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeState {
    /// Id of the element in which the state was captured; empty before the first element
    pub element_id: String,
    /// Type tag of that element; empty before the first element
    pub element_type: &'static str,
    /// Position along the beamline \[m\]
    pub position: f64,
    /// Elapsed time \[s\]
    pub time: f64,
    /// Kinetic energy \[eV\]
    pub kinetic_energy: f64,
    /// Particle species
    pub species: Species,
    /// Transfer matrix accumulated from the start of propagation
    pub transfer: PhaseMatrix,
    /// Kind-specific state
    pub data: StateData,
}

impl ProbeState {
    /// Kinematics at this state
    pub fn kinematics(&self) -> Kinematics {
        Kinematics::new(self.species, self.kinetic_energy)
    }

    /// Kind of the probe that captured this state
    pub fn kind(&self) -> ProbeKind {
        self.data.kind()
    }

    /// Particle coordinates, for particle probes
    pub fn coordinates(&self) -> Option<&PhaseVector> {
        match &self.data {
            StateData::Particle { coordinates } => Some(coordinates),
            _ => None,
        }
    }

    /// Covariance matrix, for envelope probes
    pub fn covariance(&self) -> Option<&PhaseMatrix> {
        match &self.data {
            StateData::Envelope { covariance, .. } => Some(covariance),
            _ => None,
        }
    }

    /// Beam centroid, for envelope probes
    pub fn mean(&self) -> Option<PhaseVector> {
        self.covariance().map(|cov| {
            PhaseVector::new([
                cov.get_elem(0, 6),
                cov.get_elem(1, 6),
                cov.get_elem(2, 6),
                cov.get_elem(3, 6),
                cov.get_elem(4, 6),
                cov.get_elem(5, 6),
            ])
        })
    }

    /// Second moments around the centroid, for envelope probes
    pub fn central_covariance(&self) -> Option<PhaseMatrix> {
        self.covariance().map(central_moments)
    }

    /// Response matrix, for response probes
    pub fn response(&self) -> Option<&PhaseMatrix> {
        match &self.data {
            StateData::Response { response } => Some(response),
            _ => None,
        }
    }

    /// Twiss parameters of `plane`, for envelope probes
    pub fn twiss(&self, plane: Plane) -> Option<Twiss> {
        self.central_covariance()
            .and_then(|cov| Twiss::from_moments(&cov.block(plane)))
    }

    /// Accumulated betatron phase advance of `plane`, for envelope probes
    pub fn phase_advance(&self, plane: Plane) -> Option<f64> {
        match &self.data {
            StateData::Envelope { phase_advance, .. } => Some(phase_advance[plane as usize]),
            _ => None,
        }
    }

    /// Twiss property of `plane`, for envelope probes
    pub fn twiss_property(&self, plane: Plane, property: TwissProperty) -> Option<f64> {
        self.twiss(plane).map(|twiss| twiss.get(property))
    }
}
