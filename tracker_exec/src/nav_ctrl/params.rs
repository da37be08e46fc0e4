//! Navigation control parameters

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use comms_if::eqpt::rc::RcDir;
use serde::Deserialize;

// Internal
use crate::actuator::ActuatorFailurePolicy;
use super::MoveDir;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for navigation control.
///
/// All tick limits are counted in executive cycles, not in seconds.
#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Params {
    /// Angular tolerance either side of 0 and 180 degrees within which the target is considered
    /// to be aligned with the destination.
    ///
    /// Units: degrees
    pub align_tolerance_deg: f64,

    /// Number of ticks the first pivot is held before switching to the correction pivot.
    pub turn_limit_ticks: u32,

    /// Number of ticks the correction pivot is held before trying the first pivot again.
    pub correct_limit_ticks: u32,

    /// Number of ticks the probe move is held before the distance is sampled.
    pub move_probe_ticks: u32,

    /// Distance to the destination below which braking begins.
    ///
    /// Units: pixels
    pub brake_distance_px: f64,

    /// Number of ticks the brake command is held.
    pub brake_ticks: u32,

    /// Direction sent for the first pivot.
    pub pivot_cmd: RcDir,

    /// Direction sent for the correction pivot.
    pub correct_cmd: RcDir,

    /// Direction of the first probe move after a new destination.
    pub initial_move_dir: MoveDir,

    /// Maximum number of failed turn/correct cycles before moving anyway. `None` retries forever.
    pub max_pivot_attempts: Option<u32>,

    /// What to do when the actuator cannot send or stop a command.
    pub actuator_failure_policy: ActuatorFailurePolicy,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for Params {
    fn default() -> Self {
        Self {
            align_tolerance_deg: 10.0,
            turn_limit_ticks: 10,
            correct_limit_ticks: 14,
            move_probe_ticks: 8,
            brake_distance_px: 200.0,
            brake_ticks: 6,
            pivot_cmd: RcDir::UpLeft,
            correct_cmd: RcDir::DownRight,
            initial_move_dir: MoveDir::Forward,
            max_pivot_attempts: None,
            actuator_failure_policy: ActuatorFailurePolicy::Continue,
        }
    }
}
