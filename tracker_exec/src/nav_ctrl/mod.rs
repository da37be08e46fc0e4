//! # Navigation control module
//!
//! Navigation control drives the tracked vehicle towards the operator's destination using only
//! coarse, pulsed commands. Each cycle it is given the angle between the target's orientation
//! axis and the bearing to the destination, along with the target's centre, and it advances a
//! small state machine:
//!
//! 1. Pivot in place until the target is lined up with the destination. The first pivot is held
//!    for a fixed number of cycles, after which a correction pivot in the other direction is
//!    tried, and so on until alignment is seen.
//! 2. Probe by moving for a fixed number of cycles. If the distance to the destination did not
//!    decrease the vehicle is facing away, so the move direction is flipped.
//! 3. Move until the distance drops below the braking distance.
//! 4. Brake by driving the opposite direction for a fixed number of cycles.
//!
//! Waiting is counted in cycles, never by sleeping, so the executive keeps running. At most one
//! command is active at any time and it is stopped before leaving the phase that sent it.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod geometry;
mod params;
mod state;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use comms_if::eqpt::rc::RcDir;
use serde::{Deserialize, Serialize};
use std::fmt::Display;

// Internal
use crate::actuator::ActuatorError;
use util::{archive::ArchiveError, params::LoadError};

pub use params::Params;
pub use state::*;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Phases of the navigation state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NavPhase {
    Idle,
    CommandTurn,
    Turning,
    CommandCorrect,
    Correcting,
    DetermineMoving,
    DetermineMovingWaiting,
    CommandMove,
    Moving,
    CommandBrake,
    Braking,
    Done,
}

/// Direction of the last pivot command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PivotDir {
    Left,
    Right,
}

/// Direction the vehicle is moved in once aligned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MoveDir {
    Forward,
    Backward,
}

/// Possible errors that can occur during NavCtrl operation.
#[derive(Debug, thiserror::Error)]
pub enum NavCtrlError {
    #[error("Could not load NavCtrl parameters: {0}")]
    ParamLoadError(LoadError),

    #[error("Could not create the NavCtrl archive: {0}")]
    ArchiveError(ArchiveError),

    #[error("NavCtrl has no actuator, it must be initialised first")]
    NoActuator,

    #[error("Actuator failure: {0}")]
    ActuatorError(ActuatorError),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl NavPhase {
    /// Acting phases are those in which a command is held active.
    pub fn is_acting(&self) -> bool {
        matches!(
            self,
            NavPhase::Turning
            | NavPhase::Correcting
            | NavPhase::DetermineMovingWaiting
            | NavPhase::Moving
            | NavPhase::Braking
        )
    }
}

impl Default for NavPhase {
    fn default() -> Self {
        NavPhase::Idle
    }
}

impl Display for NavPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            NavPhase::Idle => "Idle",
            NavPhase::CommandTurn => "Command Turn",
            NavPhase::Turning => "Turning",
            NavPhase::CommandCorrect => "Command Correct",
            NavPhase::Correcting => "Correcting",
            NavPhase::DetermineMoving => "Determine Moving",
            NavPhase::DetermineMovingWaiting => "Determine Moving: Waiting",
            NavPhase::CommandMove => "Command Move",
            NavPhase::Moving => "Moving",
            NavPhase::CommandBrake => "Command Brake",
            NavPhase::Braking => "Braking",
            NavPhase::Done => "Done",
        };
        write!(f, "{}", name)
    }
}

impl Default for PivotDir {
    fn default() -> Self {
        PivotDir::Left
    }
}

impl MoveDir {
    /// The other move direction.
    pub fn flip(&self) -> Self {
        match self {
            MoveDir::Forward => MoveDir::Backward,
            MoveDir::Backward => MoveDir::Forward,
        }
    }
}

impl Default for MoveDir {
    fn default() -> Self {
        MoveDir::Forward
    }
}

impl From<MoveDir> for RcDir {
    fn from(dir: MoveDir) -> Self {
        match dir {
            MoveDir::Forward => RcDir::Forward,
            MoveDir::Backward => RcDir::Backward,
        }
    }
}
