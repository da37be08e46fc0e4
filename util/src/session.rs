//! Sessions
//!
//! Each run of an executable gets a session directory holding its log file, CSV archives and
//! saved overlays. The time the first session is created is the epoch all log timestamps and
//! script times are measured from.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use chrono::{DateTime, Utc};
use conquer_once::OnceCell;
use std::{fs, path::PathBuf};
use thiserror::Error;

use crate::time;

// ---------------------------------------------------------------------------
// STATICS
// ---------------------------------------------------------------------------

static SESSION_EPOCH: OnceCell<DateTime<Utc>> = OnceCell::uninit();

/// Suffix format of session directory names, e.g. `tracker_exec_20210314_093000`.
const DIR_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Paths belonging to the running session.
#[derive(Clone, Debug)]
pub struct Session {
    pub session_root: PathBuf,

    /// Root of the CSV archives, `<session_root>/arch`
    pub arch_root: PathBuf,

    /// `<session_root>/<exec_name>.log`
    pub log_file_path: PathBuf,
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("RC_TRACKER_SW_ROOT is not set, cannot locate the sessions directory")]
    SwRootNotSet,

    #[error("Cannot create the session directory: {0}")]
    CannotCreateDir(std::io::Error),

    #[error("A session has already been started in this process ({0})")]
    CannotInitEpoch(conquer_once::TryInitError),

    #[error("The session epoch is not set")]
    CannotGetEpoch,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Session {
    /// Start the session in `$RC_TRACKER_SW_ROOT/<sessions_dir>`.
    pub fn new(exec_name: &str, sessions_dir: &str) -> Result<Self, SessionError> {
        let sw_root = crate::host::get_sw_root().map_err(|_| SessionError::SwRootNotSet)?;

        Self::new_in(exec_name, sw_root.join(sessions_dir))
    }

    /// Start the session in `parent`, creating `<parent>/<exec_name>_<timestamp>/arch`.
    ///
    /// Only one session may be started per process since it fixes the epoch.
    pub fn new_in<P: Into<PathBuf>>(exec_name: &str, parent: P) -> Result<Self, SessionError> {
        SESSION_EPOCH
            .try_init_once(Utc::now)
            .map_err(SessionError::CannotInitEpoch)?;
        let epoch = get_epoch().ok_or(SessionError::CannotGetEpoch)?;

        let session_root = parent
            .into()
            .join(format!("{}_{}", exec_name, epoch.format(DIR_TIMESTAMP_FORMAT)));
        let arch_root = session_root.join("arch");
        fs::create_dir_all(&arch_root).map_err(SessionError::CannotCreateDir)?;

        Ok(Session {
            log_file_path: session_root.join(format!("{}.log", exec_name)),
            session_root,
            arch_root,
        })
    }

    /// Path of a directory inside the session root, created if missing.
    pub fn subdir(&self, name: &str) -> Result<PathBuf, SessionError> {
        let path = self.session_root.join(name);
        fs::create_dir_all(&path).map_err(SessionError::CannotCreateDir)?;
        Ok(path)
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Seconds since the session epoch, 0 before any session has started.
pub fn get_elapsed_seconds() -> f64 {
    get_epoch()
        .and_then(|e| time::duration_to_seconds(Utc::now() - *e))
        .unwrap_or(0.0)
}

/// The session epoch, if a session has been started.
pub fn get_epoch() -> Option<&'static DateTime<Utc>> {
    SESSION_EPOCH.get()
}
