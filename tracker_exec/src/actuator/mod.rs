//! # Actuator interface
//!
//! Commands to the vehicle are pulses: [`Actuator::send`] switches a direction on and returns a
//! [`CmdHandle`] which keeps it on until [`CmdHandle::stop`] is called. Whoever holds the handle
//! decides how long the pulse lasts.
//!
//! Handles stop themselves when dropped, so a command can never outlive its owner.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

mod dry_run;
mod rc_client;

#[cfg(test)]
pub(crate) mod mock;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::eqpt::rc::RcDir;
use serde::Deserialize;

pub use dry_run::DryRun;
pub use rc_client::{RcClient, RcClientError, RcClientParams, RcCmdHandle};

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// Something which can drive the vehicle in a given direction.
pub trait Actuator {
    /// Start driving in the given direction.
    ///
    /// The direction stays active until the returned handle is stopped or dropped.
    fn send(&mut self, dir: RcDir) -> Result<Box<dyn CmdHandle>, ActuatorError>;
}

/// An active command session returned by [`Actuator::send`].
pub trait CmdHandle {
    /// The direction this handle is driving.
    fn dir(&self) -> RcDir;

    /// Stop the command. Stopping an already stopped handle does nothing.
    fn stop(&mut self) -> Result<(), ActuatorError>;
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Errors raised by an actuator while sending or stopping a command.
#[derive(Debug, thiserror::Error)]
pub enum ActuatorError {
    #[error("RcClient error: {0}")]
    RcClientError(RcClientError),

    #[error("The transport is not available")]
    Unavailable,
}

/// What navigation control does when the actuator fails to send or stop a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum ActuatorFailurePolicy {
    /// Log the failure and carry on as if the command had been sent or stopped, so that a dead
    /// transport cannot stall the state machine.
    Continue,

    /// Treat the failure as fatal for the session.
    Abort,
}

/// Which actuator implementation the executable should use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum ActuatorKind {
    /// Send demands to the RC transmitter server
    RcClient,

    /// Log commands without sending them anywhere
    DryRun,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Default for ActuatorFailurePolicy {
    fn default() -> Self {
        ActuatorFailurePolicy::Continue
    }
}

impl From<RcClientError> for ActuatorError {
    fn from(e: RcClientError) -> Self {
        ActuatorError::RcClientError(e)
    }
}
