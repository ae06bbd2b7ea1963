use super::{PhaseMatrix, PhaseVector};

/// Transformation imparted by an element or a section of it.
///
/// Only the first-order (affine) term is carried.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhaseMap {
    first_order: PhaseMatrix,
}

impl PhaseMap {
    /// Map with the given first-order matrix
    pub fn new(first_order: PhaseMatrix) -> PhaseMap {
        PhaseMap { first_order }
    }

    /// Map leaving phase space unchanged
    pub fn identity() -> PhaseMap {
        PhaseMap::new(PhaseMatrix::identity())
    }

    /// First-order transfer matrix
    pub fn first_order(&self) -> &PhaseMatrix {
        &self.first_order
    }

    /// Map of `self` followed by `next`
    pub fn compose(&self, next: &PhaseMap) -> PhaseMap {
        PhaseMap::new(next.first_order.times(&self.first_order))
    }

    /// Image of a phase vector
    pub fn apply(&self, vec: &PhaseVector) -> PhaseVector {
        self.first_order.apply(vec)
    }
}

impl From<PhaseMatrix> for PhaseMap {
    fn from(first_order: PhaseMatrix) -> PhaseMap {
        PhaseMap::new(first_order)
    }
}

#[cfg(test)]
mod tests {
    use super::PhaseMap;
    use crate::phase::{PhaseIndex, PhaseMatrix, PhaseVector};

    #[test]
    fn compose_applies_self_first() {
        let mut drift = PhaseMatrix::identity();
        drift.set_elem(0, 1, 2.0);
        let mut kick = PhaseMatrix::identity();
        kick.set_elem(1, 0, -0.5);

        let drift = PhaseMap::new(drift);
        let kick = PhaseMap::new(kick);
        let start = PhaseVector::new([1.0, 0.0, 0.0, 0.0, 0.0, 0.0]);

        // kick first: x' = -0.5, then drift: x = 1 - 1 = 0
        let res = kick.compose(&drift).apply(&start);
        assert_eq!(res[PhaseIndex::X], 0.0);
        assert_eq!(res[PhaseIndex::Xp], -0.5);

        // drift first leaves x unchanged, then kick
        let res = drift.compose(&kick).apply(&start);
        assert_eq!(res[PhaseIndex::X], 1.0);
        assert_eq!(res[PhaseIndex::Xp], -0.5);

        assert_eq!(PhaseMap::identity().compose(&drift), drift);
    }
}
