//! Host platform utility functions

use std::env;
use std::path::PathBuf;

/// Name of the environment variable pointing at the root of the software checkout.
pub const SW_ROOT_ENV_VAR: &str = "RC_TRACKER_SW_ROOT";

/// Get the root directory of the software, as given by the `RC_TRACKER_SW_ROOT` environment
/// variable.
///
/// Parameter files are loaded from `<root>/params` and sessions are created in
/// `<root>/sessions`.
pub fn get_sw_root() -> Result<PathBuf, env::VarError> {
    env::var(SW_ROOT_ENV_VAR).map(PathBuf::from)
}

/// Short description of the host the software is running on, used in the startup log.
pub fn get_host_info() -> String {
    format!("{} ({})", env::consts::OS, env::consts::ARCH)
}
