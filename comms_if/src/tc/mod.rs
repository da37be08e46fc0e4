//! # Telecommand module
//!
//! Operator telecommands. These carry the operator's UI actions (dragging a selection rectangle
//! over the target, clicking a destination, quitting) to the tracker executable, either from a
//! script or from a remote client.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::{Deserialize, Serialize};
use serde_json;
use thiserror::Error;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// A telecommand, i.e. an instruction sent to the tracker by the operator.
///
/// Serialised as `{"type": "<variant>", "payload": {...}}`. Pixel coordinates are in the camera
/// frame, origin top left, y downwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload")]
pub enum Tc {
    /// The operator pressed the mouse to start a new selection. Any current tracking is dropped.
    SelectionStart {
        x: i32,
        y: i32
    },

    /// The selection rectangle is being dragged. Used for display only.
    SelectionDrag {
        x0: i32,
        y0: i32,
        x1: i32,
        y1: i32
    },

    /// The selection was released, tracking begins on the enclosed region.
    SelectionCommit {
        x0: i32,
        y0: i32,
        x1: i32,
        y1: i32
    },

    /// Set or replace the destination the vehicle is driven to.
    Destination {
        x: f64,
        y: f64
    },

    /// End the session.
    Quit
}

/// Response to a telecommand.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum TcResponse {
    /// The telecommand was accepted
    Ok,

    /// The telecommand could not be parsed
    Invalid,

    /// The telecommand is valid but cannot be executed now
    CannotExecute
}

/// Possible parsing errors.
#[derive(Debug, Error)]
pub enum TcParseError {
    #[error("TC contains invalid JSON: {0}")]
    InvalidJson(serde_json::Error),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Tc {
    /// Parse a new TC from a JSON packet
    pub fn from_json(json_str: &str) -> Result<Self, TcParseError> {
        serde_json::from_str(json_str).map_err(TcParseError::InvalidJson)
    }
}
