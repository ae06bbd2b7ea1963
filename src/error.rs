//! Errors raised while building or propagating a beamline model

use thiserror::Error;

/// Errors that can be returned by element kernels, the tracker, and trajectory queries
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ModelError {
    /// The probe kind cannot be advanced through the element or by the algorithm.
    ///
    /// The first parameter is the probe kind, the second parameter the element type tag.
    #[error("Probe kind `{0}` is not supported by `{1}`")]
    UnsupportedProbe(&'static str, &'static str),
    /// A parameter required by a kernel is absent, e.g. a magnet missing from a field snapshot.
    #[error("Missing parameter `{parameter}` for `{id}`")]
    MissingParameter {
        /// Identifier of the element or magnet
        id: String,
        /// Name of the missing parameter
        parameter: &'static str,
    },
    /// A parameter has a value the kernel cannot handle.
    #[error("Invalid parameter `{parameter}` for `{id}`: {reason}")]
    InvalidParameter {
        /// Identifier of the element, probe or tracker setting
        id: String,
        /// Name of the parameter
        parameter: &'static str,
        /// Human readable cause
        reason: String,
    },
    /// An element id referenced by the configuration does not exist in the lattice.
    #[error("No element `{0}` in lattice")]
    UnknownElement(String),
    /// The phase-space block of a matrix could not be inverted.
    #[error("Phase matrix is singular")]
    SingularMatrix,
    /// Positional access outside `[0, len)`.
    ///
    /// The first parameter is the requested index, the second the number of states.
    #[error("Index {0} out of range for trajectory with {1} states")]
    IndexOutOfRange(usize, usize),
    /// A position range query whose bounds are not ordered or not finite.
    #[error("Malformed position range [{0}, {1}]")]
    InvalidRange(f64, f64),
    /// A state would break the ordering of positions in a trajectory.
    ///
    /// The first parameter is the position of the last recorded state, the second the rejected
    /// position.
    #[error("State at {1} m recorded after state at {0} m")]
    NonMonotonicPosition(f64, f64),
    /// Propagation aborted inside an element.
    #[error("Propagation failed in element `{element}`")]
    Propagation {
        /// Identifier of the element being propagated
        element: String,
        /// Underlying kernel or probe error
        #[source]
        source: Box<ModelError>,
    },
}

impl ModelError {
    /// Attach the id of the element in which the error occurred
    pub fn in_element(self, element: &str) -> ModelError {
        match self {
            err @ ModelError::Propagation { .. } => err,
            err => ModelError::Propagation {
                element: element.to_owned(),
                source: Box::new(err),
            },
        }
    }

    /// Id of the element that caused a propagation failure, if known
    pub fn element(&self) -> Option<&str> {
        match self {
            ModelError::Propagation { element, .. } => Some(element),
            _ => None,
        }
    }

    /// Classification of the error, following the configuration/numerical/bounds taxonomy
    pub fn kind(&self) -> ErrorKind {
        match self {
            ModelError::UnsupportedProbe(..)
            | ModelError::MissingParameter { .. }
            | ModelError::InvalidParameter { .. }
            | ModelError::UnknownElement(_) => ErrorKind::Configuration,
            ModelError::SingularMatrix => ErrorKind::Numerical,
            ModelError::IndexOutOfRange(..)
            | ModelError::InvalidRange(..)
            | ModelError::NonMonotonicPosition(..) => ErrorKind::Bounds,
            ModelError::Propagation { source, .. } => source.kind(),
        }
    }
}

/// Broad category of a [ModelError]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Unsupported element/probe combination or missing configuration
    Configuration,
    /// Unexpected singularity inside a kernel
    Numerical,
    /// Out of range trajectory access
    Bounds,
}

#[cfg(test)]
mod tests {
    use super::{ErrorKind, ModelError};

    #[test]
    fn element_context_is_attached_once() {
        let err = ModelError::SingularMatrix.in_element("QH1").in_element("SEQ");

        assert_eq!(err.element(), Some("QH1"));
        assert_eq!(err.kind(), ErrorKind::Numerical);
        assert_eq!(err.to_string(), "Propagation failed in element `QH1`");
    }

    #[test]
    fn kinds() {
        assert_eq!(ModelError::IndexOutOfRange(4, 2).kind(), ErrorKind::Bounds);
        assert_eq!(
            ModelError::UnsupportedProbe("response", "Quadrupole").kind(),
            ErrorKind::Configuration
        );
    }
}
