//! # Tracker Executable Parameters
//!
//! Parameters for the tracker executable, loaded from `tracker_exec.toml`.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::net::NetParams;
use serde::Deserialize;

use crate::{
    actuator::{ActuatorKind, RcClientParams},
    cam::CamParams,
    target_est,
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct TrackerExecParams {
    /// Target period of one cycle.
    ///
    /// Units: seconds
    pub cycle_period_s: f64,

    /// Overlays are saved every this many cycles, 0 disables saving.
    pub overlay_save_period_cycles: u64,

    /// Number of consecutive cycle overruns after which the session is ended, `None` to never
    /// end the session because of overruns.
    pub max_consec_cycle_overruns: Option<u64>,

    /// Which actuator to drive the vehicle with
    pub actuator_kind: ActuatorKind,

    /// Network endpoints
    pub net: NetParams,

    /// Frame source
    pub cam: CamParams,

    /// Target estimation
    #[serde(default)]
    pub target_est: target_est::Params,

    /// RC transmitter client, only needed for the `RcClient` actuator
    pub rc_client: RcClientParams,
}
