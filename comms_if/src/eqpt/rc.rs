//! # RC Transmitter Equipment Commands
//!
//! The vehicle is driven through a hobby RC transmitter. Each demand switches on a single
//! direction channel; the vehicle keeps moving for as long as demands for that direction keep
//! arriving, and stops on a [`RcDir::Stop`] demand.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use chrono::{serde::ts_milliseconds, DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Display;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Demands that are sent from the RcClient to the RC transmitter server
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct RcDems {
    /// The direction channel to switch on
    pub dir: RcDir,

    /// UTC time at which the demand was issued
    #[serde(with = "ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// The closed vocabulary of direction tokens understood by the transmitter.
#[derive(Serialize, Deserialize, Debug, Hash, Eq, PartialEq, Copy, Clone)]
pub enum RcDir {
    /// Drive forwards
    Forward,

    /// Drive backwards
    Backward,

    /// Steer left
    Left,

    /// Steer right
    Right,

    /// Pivot in place, forward channel with left steering
    UpLeft,

    /// Pivot in place the other way, backward channel with right steering
    DownRight,

    /// Release all channels
    Stop,
}

/// Response from the transmitter server based on the demands sent by the client.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub enum RcDemsResponse {
    /// Demands were valid and will be executed
    DemsOk,

    /// Demands were invalid and have been rejected
    DemsInvalid,

    /// Equipment is invalid so demands cannot be actuated
    EqptInvalid
}

// -----------------------------------------------------------------------------------------------
// IMPLS
// -----------------------------------------------------------------------------------------------

impl RcDems {
    /// Create a new demand for the given direction, timestamped now.
    pub fn new(dir: RcDir) -> Self {
        Self {
            dir,
            timestamp: Utc::now()
        }
    }
}

impl RcDir {
    /// The direction which counteracts this one, used for counter-thrust braking.
    pub fn opposite(&self) -> Self {
        match self {
            RcDir::Forward => RcDir::Backward,
            RcDir::Backward => RcDir::Forward,
            RcDir::Left => RcDir::Right,
            RcDir::Right => RcDir::Left,
            RcDir::UpLeft => RcDir::DownRight,
            RcDir::DownRight => RcDir::UpLeft,
            RcDir::Stop => RcDir::Stop,
        }
    }

    /// The token the transmitter firmware uses for this direction.
    pub fn token(&self) -> &'static str {
        match self {
            RcDir::Forward => "up",
            RcDir::Backward => "down",
            RcDir::Left => "left",
            RcDir::Right => "right",
            RcDir::UpLeft => "upleft",
            RcDir::DownRight => "downright",
            RcDir::Stop => "stop",
        }
    }
}

impl Display for RcDir {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.token())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_opposite() {
        assert_eq!(RcDir::Forward.opposite(), RcDir::Backward);
        assert_eq!(RcDir::Backward.opposite(), RcDir::Forward);
        assert_eq!(RcDir::UpLeft.opposite(), RcDir::DownRight);
        assert_eq!(RcDir::Stop.opposite(), RcDir::Stop);
    }

    #[test]
    fn test_dems_json() {
        let dems = RcDems::new(RcDir::UpLeft);
        let json = serde_json::to_string(&dems).unwrap();
        assert!(json.contains("\"dir\":\"UpLeft\""));

        let parsed: RcDems = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.dir, RcDir::UpLeft);
        assert_eq!(parsed.timestamp.timestamp_millis(), dems.timestamp.timestamp_millis());
    }
}
