//! Propagation of a probe through a lattice
//!
//! The tracker walks the flattened lattice, divides every element into slices, and advances the
//! probe slice by slice. Trajectory states are captured according to the [UpdatePolicy].

use serde::{Deserialize, Serialize};
use tracing::{debug, info_span, trace, warn};

use crate::element::{Element, ElementKernel as _, KernelContext, Slice};
use crate::error::ModelError;
use crate::field::FieldSource;
use crate::lattice::Sequence;
use crate::optics::QuadKernel;
use crate::probe::{Probe, ProbeKind};

/// When the probe records its state
#[derive(clap::ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UpdatePolicy {
    /// After every slice
    #[default]
    Always,
    /// After the last slice of each element
    Exit,
    /// Before the first slice of each element
    Entrance,
    /// Before the first and after the last slice of each element
    EntranceAndExit,
}

impl UpdatePolicy {
    fn at_entrance(self) -> bool {
        matches!(self, UpdatePolicy::Entrance | UpdatePolicy::EntranceAndExit)
    }

    fn at_exit(self) -> bool {
        matches!(self, UpdatePolicy::Exit | UpdatePolicy::EntranceAndExit)
    }
}

/// Tracker settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Maximum slice length when sub-stepping \[m\]
    pub step_size: f64,
    /// Divide thick elements into slices of at most `step_size`
    pub sub_stepping: bool,
    /// When states are recorded
    pub update_policy: UpdatePolicy,
    /// Kernel for quadrupole planes
    pub quad_kernel: QuadKernel,
    /// First element to propagate; the lattice start if unset
    pub start_element: Option<String>,
    /// Last element to propagate; the lattice end if unset
    pub stop_element: Option<String>,
    /// Whether `stop_element` itself is propagated
    pub include_stop: bool,
    /// Only accept probes of this kind
    pub probe_kind: Option<ProbeKind>,
}

impl Default for TrackerConfig {
    fn default() -> TrackerConfig {
        TrackerConfig {
            step_size: 0.004,
            sub_stepping: true,
            update_policy: UpdatePolicy::Always,
            quad_kernel: QuadKernel::Exact,
            start_element: None,
            stop_element: None,
            include_stop: true,
            probe_kind: None,
        }
    }
}

/// Progress of a propagation run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerStatus {
    /// No run started since construction or reset
    NotStarted,
    /// A run is in progress
    Propagating,
    /// The last run reached the end of the lattice
    Completed,
    /// The last run was aborted by an error
    Failed,
}

/// Drives a probe through a lattice
#[derive(Debug, Clone)]
pub struct Tracker {
    config: TrackerConfig,
    status: TrackerStatus,
}

impl Tracker {
    /// Construct from settings
    pub fn new(config: TrackerConfig) -> Tracker {
        Tracker {
            config,
            status: TrackerStatus::NotStarted,
        }
    }

    /// Settings
    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Status of the last run
    pub fn status(&self) -> TrackerStatus {
        self.status
    }

    /// Return to [TrackerStatus::NotStarted]
    pub fn reset(&mut self) {
        self.status = TrackerStatus::NotStarted;
    }

    /// Number of slices used for `element`
    pub fn step_count(&self, probe: &Probe, element: &Element) -> usize {
        let length = element.length();
        if !self.config.sub_stepping || probe.kind() == ProbeKind::Response || length == 0.0 {
            return 1;
        }

        ((length / self.config.step_size).ceil() as usize).max(1)
    }

    /// Propagate `probe` through `lattice`, reading magnet fields from `fields`.
    ///
    /// The initial state is recorded before the first element. On failure the returned error
    /// carries the id of the failing element, and the states recorded up to that point remain
    /// in the probe's trajectory.
    pub fn propagate(
        &mut self,
        probe: &mut Probe,
        lattice: &Sequence,
        fields: &dyn FieldSource,
    ) -> Result<(), ModelError> {
        let span = info_span!("propagate", lattice = %lattice.id, probe = probe.kind().name());
        let _enter = span.enter();

        if let Err(err) = self.check(probe) {
            self.status = TrackerStatus::Failed;
            warn!(%err, "invalid propagation setup");
            return Err(err);
        }

        let elements: Vec<&Element> = lattice.leaves().collect();
        let range = match self.element_range(&elements) {
            Ok(range) => range,
            Err(err) => {
                self.status = TrackerStatus::Failed;
                warn!(%err, "invalid propagation range");
                return Err(err);
            }
        };

        let ctx = KernelContext {
            fields,
            quad_kernel: self.config.quad_kernel,
        };

        self.status = TrackerStatus::Propagating;
        probe.update()?;

        for element in &elements[range] {
            if let Err(err) = self.propagate_element(probe, element, &ctx) {
                self.status = TrackerStatus::Failed;
                warn!(element = element.id(), %err, "propagation failed");
                return Err(err.in_element(element.id()));
            }
        }

        self.status = TrackerStatus::Completed;
        debug!(
            position = probe.position(),
            states = probe.trajectory().len(),
            "propagation completed"
        );

        Ok(())
    }

    fn check(&self, probe: &Probe) -> Result<(), ModelError> {
        let step = self.config.step_size;
        if self.config.sub_stepping && !(step > 0.0 && step.is_finite()) {
            return Err(ModelError::InvalidParameter {
                id: "tracker".to_owned(),
                parameter: "step_size",
                reason: format!("{step} m is not a positive step size"),
            });
        }

        match self.config.probe_kind {
            Some(kind) if kind != probe.kind() => {
                Err(ModelError::UnsupportedProbe(probe.kind().name(), "tracker"))
            }
            _ => Ok(()),
        }
    }

    /// Indices of the elements selected by the start and stop settings
    fn element_range(&self, elements: &[&Element]) -> Result<std::ops::Range<usize>, ModelError> {
        let find_from = |id: &str, from: usize| {
            elements[from..]
                .iter()
                .position(|elem| elem.id() == id)
                .map(|i| i + from)
                .ok_or_else(|| ModelError::UnknownElement(id.to_owned()))
        };

        let start = match &self.config.start_element {
            Some(id) => find_from(id, 0)?,
            None => 0,
        };
        let end = match &self.config.stop_element {
            Some(id) => {
                let stop = find_from(id, start)?;
                if self.config.include_stop {
                    stop + 1
                } else {
                    stop
                }
            }
            None => elements.len(),
        };

        Ok(start..end)
    }

    fn propagate_element(
        &self,
        probe: &mut Probe,
        element: &Element,
        ctx: &KernelContext<'_>,
    ) -> Result<(), ModelError> {
        element.validate()?;
        probe.set_current_element(element);

        let count = self.step_count(probe, element);
        let length = element.length() / count as f64;
        let entrance = probe.position();
        debug!(
            element = element.id(),
            kind = element.type_tag(),
            steps = count,
            position = probe.position(),
            "entering element"
        );

        if self.config.update_policy.at_entrance() {
            probe.update()?;
        }

        for index in 0..count {
            let slice = Slice {
                index,
                count,
                length,
            };
            let kin = probe.kinematics();

            let map = element.transfer_map(&kin, &slice, ctx)?;
            let energy_gain = element.energy_gain(&kin, &slice);
            let time = element.elapsed_time(&kin, &slice);
            // Slice ends are measured from the entrance so the exit lands on the element boundary
            let end = if slice.is_last() {
                entrance + element.length()
            } else {
                entrance + (index + 1) as f64 * length
            };
            probe.advance(&map, end - probe.position(), time, energy_gain);
            trace!(step = index, position = probe.position(), "advanced probe");

            if self.config.update_policy == UpdatePolicy::Always {
                probe.update()?;
            }
        }

        if self.config.update_policy.at_exit() {
            probe.update()?;
        }

        Ok(())
    }
}
