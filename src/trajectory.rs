//! Ordered record of probe states captured during propagation

use std::time::SystemTime;

use itertools::Itertools as _;
use ndarray::{Array1, Array3};

use crate::error::ModelError;
use crate::phase::{PhaseMatrix, Plane, DIM};
use crate::probe::{ProbeState, TwissProperty};

/// Tolerance used to decide two positions coincide \[m\]
const POSITION_TOLERANCE: f64 = 1e-12;

/// Append-only sequence of [ProbeState]s ordered by non-decreasing position
#[derive(Debug, Clone)]
pub struct Trajectory {
    description: String,
    timestamp: SystemTime,
    states: Vec<ProbeState>,
}

impl Trajectory {
    /// Empty trajectory
    pub fn new(description: impl Into<String>) -> Trajectory {
        Trajectory {
            description: description.into(),
            timestamp: SystemTime::now(),
            states: Vec::new(),
        }
    }

    /// Build from a list of states, which must be ordered by position
    pub fn from_states(
        description: impl Into<String>,
        states: Vec<ProbeState>,
    ) -> Result<Trajectory, ModelError> {
        if let Some((a, b)) = states
            .iter()
            .tuple_windows()
            .find(|(a, b)| b.position < a.position)
        {
            return Err(ModelError::NonMonotonicPosition(a.position, b.position));
        }

        Ok(Trajectory {
            states,
            ..Trajectory::new(description)
        })
    }

    /// Free-form description
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Creation time
    pub fn timestamp(&self) -> SystemTime {
        self.timestamp
    }

    /// Append a state. Fails if it lies before the last recorded state.
    pub fn push(&mut self, state: ProbeState) -> Result<(), ModelError> {
        if let Some(last) = self.states.last() {
            if state.position < last.position {
                return Err(ModelError::NonMonotonicPosition(last.position, state.position));
            }
        }
        self.states.push(state);
        Ok(())
    }

    /// Remove and return the last state
    pub fn pop_last_state(&mut self) -> Option<ProbeState> {
        self.states.pop()
    }

    pub(crate) fn clear(&mut self) {
        self.states.clear();
    }

    /// Number of states
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Whether no state was recorded
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Iterate over the states in order
    pub fn iter(&self) -> std::slice::Iter<'_, ProbeState> {
        self.states.iter()
    }

    /// All states as a slice
    pub fn states(&self) -> &[ProbeState] {
        &self.states
    }

    /// First recorded state
    pub fn initial_state(&self) -> Option<&ProbeState> {
        self.states.first()
    }

    /// Last recorded state
    pub fn final_state(&self) -> Option<&ProbeState> {
        self.states.last()
    }

    /// State at index `index`
    pub fn state_with_index(&self, index: usize) -> Result<&ProbeState, ModelError> {
        self.states
            .get(index)
            .ok_or(ModelError::IndexOutOfRange(index, self.states.len()))
    }

    /// All states captured in element `id`, in trajectory order
    pub fn states_for_element(&self, id: &str) -> Vec<&ProbeState> {
        self.iter().filter(|state| state.element_id == id).collect()
    }

    /// Indices of all states captured in element `id`
    pub fn indices_for_element(&self, id: &str) -> Vec<usize> {
        self.iter().positions(|state| state.element_id == id).collect()
    }

    /// All states captured in elements of type `tag`
    pub fn states_for_element_type(&self, tag: &str) -> Vec<&ProbeState> {
        self.iter().filter(|state| state.element_type == tag).collect()
    }

    /// The contiguous run of states with position in `[low, high]`; empty if there are none
    pub fn states_in_position_range(
        &self,
        low: f64,
        high: f64,
    ) -> Result<&[ProbeState], ModelError> {
        if !(low <= high) {
            return Err(ModelError::InvalidRange(low, high));
        }
        let start = self.states.partition_point(|state| state.position < low);
        let end = self.states.partition_point(|state| state.position <= high);

        Ok(&self.states[start..end.max(start)])
    }

    /// State whose position is closest to `position`; the first one on ties
    pub fn state_nearest_position(&self, position: f64) -> Option<&ProbeState> {
        let index = self.states.partition_point(|state| state.position < position);
        let after = self.states.get(index);
        let before = index.checked_sub(1).and_then(|i| self.states.get(i));

        match (before, after) {
            (Some(b), Some(a)) => {
                if position - b.position <= a.position - position {
                    // First state sharing the position of `b`
                    let first = self.states.partition_point(|s| s.position < b.position);
                    self.states.get(first)
                } else {
                    Some(a)
                }
            }
            (Some(b), None) => {
                let first = self.states.partition_point(|s| s.position < b.position);
                self.states.get(first)
            }
            (None, a) => a,
        }
    }

    /// First state recorded exactly at `position`
    pub fn state_at_position(&self, position: f64) -> Option<&ProbeState> {
        self.state_nearest_position(position)
            .filter(|state| (state.position - position).abs() <= POSITION_TOLERANCE)
    }

    /// States from the first state of element `start` up to element `stop`.
    ///
    /// With `inclusive` the states of `stop` are included, otherwise the run ends before the first
    /// state of `stop`.
    pub fn sub_trajectory(
        &self,
        start: &str,
        stop: &str,
        inclusive: bool,
    ) -> Result<Trajectory, ModelError> {
        let first = self
            .iter()
            .position(|state| state.element_id == start)
            .ok_or_else(|| ModelError::UnknownElement(start.to_owned()))?;
        let stop_indices = self
            .iter()
            .enumerate()
            .skip(first)
            .filter(|(_, state)| state.element_id == stop)
            .map(|(i, _)| i);

        let end = if inclusive {
            stop_indices.last().map(|i| i + 1)
        } else {
            stop_indices.min()
        }
        .ok_or_else(|| ModelError::UnknownElement(stop.to_owned()))?;

        Ok(Trajectory {
            description: format!("{} [{start}, {stop}]", self.description),
            timestamp: self.timestamp,
            states: self.states[first..end].to_vec(),
        })
    }

    /// Transfer matrix from state `from` to state `to`, computed as `M_to * M_from^-1`
    pub fn transfer_between(&self, from: usize, to: usize) -> Result<PhaseMatrix, ModelError> {
        let from = self.state_with_index(from)?;
        let to = self.state_with_index(to)?;

        PhaseMatrix::between(&to.transfer, &from.transfer)
    }

    /// Positions of all states
    pub fn positions(&self) -> Array1<f64> {
        self.iter().map(|state| state.position).collect()
    }

    /// History of a Twiss property of `plane`. States without an envelope yield NaN.
    pub fn history(&self, plane: Plane, property: TwissProperty) -> Array1<f64> {
        self.iter()
            .map(|state| state.twiss_property(plane, property).unwrap_or(f64::NAN))
            .collect()
    }

    /// Accumulated transfer matrices stacked into an `N x 7 x 7` array
    pub fn matrix_history(&self) -> Array3<f64> {
        Array3::from_shape_fn((self.len(), DIM, DIM), |(i, row, col)| {
            self.states[i].transfer.get_elem(row, col)
        })
    }
}

impl<'a> IntoIterator for &'a Trajectory {
    type Item = &'a ProbeState;
    type IntoIter = std::slice::Iter<'a, ProbeState>;

    fn into_iter(self) -> Self::IntoIter {
        self.states.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::Trajectory;
    use crate::error::ModelError;
    use crate::kinematics::Species;
    use crate::phase::{PhaseMatrix, Plane};
    use crate::probe::{ProbeState, StateData, TwissProperty};

    fn state(id: &str, position: f64) -> ProbeState {
        let mut transfer = PhaseMatrix::identity();
        transfer.set_elem(0, 1, position);
        ProbeState {
            element_id: id.to_owned(),
            element_type: if id.starts_with("DR") { "Drift" } else { "Quadrupole" },
            position,
            time: 0.0,
            kinetic_energy: 3.0e6,
            species: Species::PROTON,
            transfer,
            data: StateData::Response {
                response: transfer,
            },
        }
    }

    /// One state per element boundary: positions 0, 1, .., n
    fn unit_trajectory(n: usize) -> Trajectory {
        let states = (0..=n)
            .map(|i| state(&format!("E{i}"), i as f64))
            .collect();
        Trajectory::from_states("unit", states).unwrap()
    }

    #[test]
    fn position_range() {
        let traj = unit_trajectory(5);

        let range = traj.states_in_position_range(0.5, 2.5).unwrap();
        let positions: Vec<_> = range.iter().map(|s| s.position).collect();
        assert_eq!(positions, [1.0, 2.0]);

        assert_eq!(traj.states_in_position_range(1.0, 3.0).unwrap().len(), 3);
        assert!(traj.states_in_position_range(2.2, 2.8).unwrap().is_empty());
        assert!(traj.states_in_position_range(7.0, 9.0).unwrap().is_empty());
        assert!(matches!(
            traj.states_in_position_range(3.0, 1.0),
            Err(ModelError::InvalidRange(..))
        ));
        assert!(traj.states_in_position_range(f64::NAN, 1.0).is_err());
    }

    #[test]
    fn element_lookup() {
        let states = vec![
            state("QH1", 0.0),
            state("QH1", 0.08),
            state("DR1", 0.16),
            state("DR1", 0.167),
            state("DR1", 0.174),
            state("QV1", 0.25),
        ];
        let traj = Trajectory::from_states("lookup", states).unwrap();

        let dr1: Vec<_> = traj.states_for_element("DR1").iter().map(|s| s.position).collect();
        assert_eq!(dr1, [0.16, 0.167, 0.174]);
        assert_eq!(traj.indices_for_element("DR1"), [2, 3, 4]);
        assert!(traj.states_for_element("DR2").is_empty());
        assert_eq!(traj.states_for_element_type("Quadrupole").len(), 3);
    }

    #[test]
    fn index_access() {
        let traj = unit_trajectory(2);

        assert_eq!(traj.state_with_index(2).unwrap().position, 2.0);
        assert!(matches!(traj.state_with_index(3), Err(ModelError::IndexOutOfRange(3, 3))));
        assert_eq!(traj.initial_state().map(|s| s.position), Some(0.0));
        assert_eq!(traj.final_state().map(|s| s.position), Some(2.0));
        assert_eq!((&traj).into_iter().count(), 3);
    }

    #[test]
    fn monotonic_positions() {
        let mut traj = unit_trajectory(2);

        assert!(matches!(
            traj.push(state("X", 1.5)),
            Err(ModelError::NonMonotonicPosition(..))
        ));
        traj.push(state("X", 2.0)).unwrap();
        assert_eq!(traj.len(), 4);
        assert_eq!(traj.pop_last_state().map(|s| s.element_id), Some("X".to_owned()));

        assert!(Trajectory::from_states("bad", vec![state("A", 1.0), state("B", 0.0)]).is_err());
    }

    #[test]
    fn nearest_position() {
        let states = vec![state("A", 0.0), state("B", 1.0), state("C", 1.0), state("D", 3.0)];
        let traj = Trajectory::from_states("near", states).unwrap();

        assert_eq!(traj.state_nearest_position(-1.0).unwrap().element_id, "A");
        assert_eq!(traj.state_nearest_position(1.4).unwrap().element_id, "B");
        assert_eq!(traj.state_nearest_position(2.5).unwrap().element_id, "D");
        assert_eq!(traj.state_nearest_position(5.0).unwrap().element_id, "D");
        assert_eq!(traj.state_at_position(1.0).unwrap().element_id, "B");
        assert!(traj.state_at_position(2.0).is_none());
        assert!(Trajectory::new("empty").state_nearest_position(0.0).is_none());
    }

    #[test]
    fn sub_trajectories() {
        let traj = unit_trajectory(5);

        let exclusive = traj.sub_trajectory("E1", "E3", false).unwrap();
        assert_eq!(exclusive.indices_for_element("E3"), Vec::<usize>::new());
        assert_eq!(exclusive.len(), 2);

        let inclusive = traj.sub_trajectory("E1", "E3", true).unwrap();
        assert_eq!(inclusive.len(), 3);
        assert_eq!(inclusive.final_state().unwrap().element_id, "E3");

        assert!(matches!(
            traj.sub_trajectory("E3", "E1", true),
            Err(ModelError::UnknownElement(id)) if id == "E1"
        ));
    }

    #[test]
    fn transfer_between_states() {
        let traj = unit_trajectory(3);
        let mat = traj.transfer_between(1, 3).unwrap();

        assert!((mat.get_elem(0, 1) - 2.0).abs() < 1e-14);
        assert!(traj.transfer_between(0, 4).is_err());
    }

    #[test]
    fn column_export() {
        let traj = unit_trajectory(3);

        assert_eq!(traj.positions().to_vec(), [0.0, 1.0, 2.0, 3.0]);
        assert_eq!(traj.matrix_history().shape(), &[4, 7, 7]);
        assert_eq!(traj.matrix_history()[[2, 0, 1]], 2.0);
        assert!(traj.history(Plane::Horizontal, TwissProperty::Beta).iter().all(|x| x.is_nan()));
    }
}
