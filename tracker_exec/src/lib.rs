//! # Tracker library.
//!
//! This library contains the modules of the tracker executable, which drives an RC vehicle to an
//! operator-chosen destination using colour tracking from a camera feed.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Actuator interface - sends timed direction commands to the vehicle
pub mod actuator;

/// Camera module - provides frames from a camera or a recorded sequence
pub mod cam;

/// Global data store for the executable
pub mod data_store;

/// Navigation control module - turns target estimates into actuator commands
pub mod nav_ctrl;

/// Overlay rendering onto camera frames
pub mod overlay;

/// Executable parameters
pub mod params;

/// Target estimation - tracks the selected colour target in each frame
pub mod target_est;

/// Telecommand client - recieves operator telecommands from a remote client
pub mod tc_client;
