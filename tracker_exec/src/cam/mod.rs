//! # Camera module
//!
//! Frames are acquired through the [`FrameSource`] trait. On Linux a V4L camera can be used
//! directly, otherwise (or for replaying a recorded session) frames are read from a directory of
//! images.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

mod sequence;
#[cfg(target_os = "linux")]
mod v4l;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use image::RgbImage;
use serde::Deserialize;
use std::path::PathBuf;

pub use sequence::ImageSequence;
#[cfg(target_os = "linux")]
pub use v4l::V4lCamera;

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// Something which produces frames.
pub trait FrameSource {
    /// Acquire the next frame.
    fn capture(&mut self) -> Result<RgbImage, CamError>;
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Which frame source to use and how to configure it.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind")]
pub enum CamParams {
    /// A V4L video device
    V4l {
        device: String,
        width: u32,
        height: u32,
        fps: u32,
    },

    /// A directory of recorded frames, replayed in file name order
    ImageSequence {
        dir: PathBuf,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum CamError {
    #[error("Could not open the camera: {0}")]
    OpenError(std::io::Error),

    #[error("Could not start the camera stream: {0}")]
    StartError(String),

    #[error("Could not capture a frame: {0}")]
    CaptureError(std::io::Error),

    #[error("Could not decode the frame: {0}")]
    DecodeError(image::ImageError),

    #[error("Could not read the image directory {0:?}: {1}")]
    DirError(PathBuf, std::io::Error),

    #[error("No images found in {0:?}")]
    NoImages(PathBuf),

    #[error("The image sequence has ended")]
    EndOfSequence,

    #[error("V4L cameras are only supported on Linux")]
    Unsupported,
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Open the frame source described by the parameters.
pub fn open(params: &CamParams) -> Result<Box<dyn FrameSource>, CamError> {
    match params {
        #[cfg(target_os = "linux")]
        CamParams::V4l { device, width, height, fps } => {
            Ok(Box::new(V4lCamera::new(device, (*width, *height), *fps)?))
        },
        #[cfg(not(target_os = "linux"))]
        CamParams::V4l { .. } => Err(CamError::Unsupported),
        CamParams::ImageSequence { dir } => Ok(Box::new(ImageSequence::new(dir)?)),
    }
}
