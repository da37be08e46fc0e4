//! Replay of recorded frames from a directory

use image::RgbImage;
use log::debug;
use std::path::{Path, PathBuf};

use super::{CamError, FrameSource};

/// Frames read from the `png`/`jpg` files of a directory, in file name order.
pub struct ImageSequence {
    frames: Vec<PathBuf>,
    next: usize,
}

impl ImageSequence {
    pub fn new<P: AsRef<Path>>(dir: P) -> Result<Self, CamError> {
        let dir = dir.as_ref();

        let mut frames = std::fs::read_dir(dir)
            .map_err(|e| CamError::DirError(dir.to_path_buf(), e))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| is_image(p))
            .collect::<Vec<_>>();

        if frames.is_empty() {
            return Err(CamError::NoImages(dir.to_path_buf()));
        }

        frames.sort();

        debug!("Replaying {} frames from {:?}", frames.len(), dir);

        Ok(Self { frames, next: 0 })
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }
}

impl FrameSource for ImageSequence {
    fn capture(&mut self) -> Result<RgbImage, CamError> {
        let path = self.frames.get(self.next).ok_or(CamError::EndOfSequence)?;
        self.next += 1;

        Ok(image::open(path).map_err(CamError::DecodeError)?.to_rgb8())
    }
}

fn is_image(path: &Path) -> bool {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => matches!(ext.to_lowercase().as_str(), "png" | "jpg" | "jpeg"),
        None => false
    }
}
