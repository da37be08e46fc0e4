//! TOML parameter files
//!
//! Every executable and module reads its parameters from `$RC_TRACKER_SW_ROOT/params`.

use serde::de::DeserializeOwned;
use std::{fs, path::Path};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("RC_TRACKER_SW_ROOT is not set, cannot locate the params directory")]
    SwRootNotSet,

    #[error("Cannot read the parameter file: {0}")]
    FileLoadError(std::io::Error),

    #[error("Invalid parameter file: {0}")]
    DeserialiseError(toml::de::Error)
}

/// Load `<sw_root>/params/<file_name>`.
pub fn load<P: DeserializeOwned>(file_name: &str) -> Result<P, LoadError> {
    let params_dir = crate::host::get_sw_root()
        .map_err(|_| LoadError::SwRootNotSet)?
        .join("params");

    load_from_path(params_dir.join(file_name))
}

/// Load a parameter file from anywhere on disk.
pub fn load_from_path<P: DeserializeOwned, F: AsRef<Path>>(path: F) -> Result<P, LoadError> {
    let text = fs::read_to_string(path).map_err(LoadError::FileLoadError)?;

    toml::from_str(&text).map_err(LoadError::DeserialiseError)
}
