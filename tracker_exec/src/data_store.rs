//! # Data Store

use image::RgbImage;

use crate::{
    nav_ctrl::{self, NavCtrl},
    target_est::{Rect, TargetEstimate, TargetEstimator},
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Global data store for the executable.
#[derive(Default)]
pub struct DataStore {
    // Cycle management
    /// Number of cycles already executed
    pub num_cycles: u64,

    /// Set when the operator asks to end the session
    pub quit_requested: bool,

    // Camera
    /// Frame acquired this cycle
    pub frame: Option<RgbImage>,

    // Operator selection
    /// Rectangle currently being dragged, for display only
    pub selection_preview: Option<Rect>,

    /// Committed selection waiting to be turned into a histogram on this cycle
    pub pending_selection: Option<Rect>,

    // Target estimation
    pub target_est: TargetEstimator,
    pub target: Option<TargetEstimate>,

    /// Angle between the target's axis and the bearing to the destination
    pub angle_diff_deg: Option<f64>,

    // NavCtrl
    pub nav_ctrl: NavCtrl,
    pub nav_ctrl_input: nav_ctrl::InputData,
    pub nav_ctrl_output: nav_ctrl::OutputData,
    pub nav_status_rpt: nav_ctrl::StatusReport,

    // Monitoring Counters
    /// Number of consecutive cycle overruns
    pub num_consec_cycle_overruns: u64,
}

// ---------------------------------------------------------------------------
// IMPLS
// ---------------------------------------------------------------------------

impl DataStore {
    /// Perform actions required at the start of a cycle.
    ///
    /// Clears those items which are only valid for a single cycle.
    pub fn cycle_start(&mut self) {
        self.frame = None;
        self.target = None;
        self.angle_diff_deg = None;

        self.nav_ctrl_input = nav_ctrl::InputData::default();
        self.nav_ctrl_output = nav_ctrl::OutputData::default();
        self.nav_status_rpt = nav_ctrl::StatusReport::default();
    }
}
