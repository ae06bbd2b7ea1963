//! Linear transfer-map model of accelerator beamlines
//!
//! A [lattice::Sequence] of elements is walked by a [tracker::Tracker], which advances a
//! [probe::Probe] slice by slice and records its states in a [trajectory::Trajectory].
#![allow(clippy::needless_range_loop)] // Makes matrix code less readable
#![warn(missing_docs)]

pub mod deck;
pub mod element;
pub mod error;
pub mod field;
pub mod kinematics;
pub mod lattice;
pub mod optics;
pub mod phase;
pub mod probe;
pub mod tracker;
pub mod trajectory;
