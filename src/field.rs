//! Sources for magnet field values
//!
//! Magnets only know their design field. The value actually used during propagation is looked up
//! through a [FieldSource], which may return the design value, a live readback or a logged
//! snapshot.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// Magnet whose field is requested
#[derive(Debug, Clone, Copy)]
pub struct MagnetRef<'a> {
    /// Magnet identifier
    pub id: &'a str,
    /// Design field \[T\] for dipoles or \[T/m\] for quadrupoles
    pub design_field: f64,
}

/// Provides the field of a magnet
pub trait FieldSource {
    /// Field of `magnet`, or `None` when the source has no value for it
    fn field(&self, magnet: MagnetRef<'_>) -> Option<f64>;

    /// Field of `magnet`, failing with [ModelError::MissingParameter] when it is unavailable
    fn require(&self, magnet: MagnetRef<'_>) -> Result<f64, ModelError> {
        self.field(magnet).ok_or_else(|| ModelError::MissingParameter {
            id: magnet.id.to_owned(),
            parameter: "field",
        })
    }
}

/// Uses the design field of every magnet
#[derive(Debug, Clone, Copy, Default)]
pub struct DesignFields;

impl FieldSource for DesignFields {
    fn field(&self, magnet: MagnetRef<'_>) -> Option<f64> {
        Some(magnet.design_field)
    }
}

/// Field values keyed by magnet id, e.g. a set of readbacks
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldSnapshot {
    fields: HashMap<String, f64>,
}

impl FieldSnapshot {
    /// Empty snapshot
    pub fn new() -> FieldSnapshot {
        FieldSnapshot::default()
    }

    /// Record the field of a magnet, replacing any previous value
    pub fn insert(&mut self, id: impl Into<String>, field: f64) {
        self.fields.insert(id.into(), field);
    }

    /// Number of magnets in the snapshot
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the snapshot is empty
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, f64)> for FieldSnapshot {
    fn from_iter<T: IntoIterator<Item = (S, f64)>>(iter: T) -> FieldSnapshot {
        FieldSnapshot {
            fields: iter.into_iter().map(|(id, f)| (id.into(), f)).collect(),
        }
    }
}

impl FieldSource for FieldSnapshot {
    fn field(&self, magnet: MagnetRef<'_>) -> Option<f64> {
        self.fields.get(magnet.id).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::{DesignFields, FieldSnapshot, FieldSource, MagnetRef};
    use crate::error::ModelError;

    #[test]
    fn sources() {
        let magnet = MagnetRef {
            id: "QH1",
            design_field: 2.0,
        };
        assert_eq!(DesignFields.field(magnet), Some(2.0));

        let snapshot: FieldSnapshot = [("QH1", 1.5)].into_iter().collect();
        assert_eq!(snapshot.require(magnet).unwrap(), 1.5);

        let missing = MagnetRef {
            id: "QV2",
            design_field: -2.0,
        };
        assert!(matches!(
            snapshot.require(missing),
            Err(ModelError::MissingParameter { id, parameter: "field" }) if id == "QV2"
        ));
    }
}
