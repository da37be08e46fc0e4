//! V4L camera frame source

use image::{ImageFormat, RgbImage};
use log::debug;
use rscam::{Camera, Config};

use super::{CamError, FrameSource};

pub struct V4lCamera {
    camera: Camera,
}

impl V4lCamera {
    /// Open the device and start an MJPG stream at the given resolution.
    pub fn new(device: &str, resolution: (u32, u32), fps: u32) -> Result<Self, CamError> {
        let mut camera = Camera::new(device).map_err(CamError::OpenError)?;

        camera.start(&Config {
            interval: (1, fps),
            resolution,
            format: b"MJPG",
            ..Default::default()
        }).map_err(|e| CamError::StartError(e.to_string()))?;

        debug!("Camera {} started at {}x{} {} fps", device, resolution.0, resolution.1, fps);

        Ok(Self { camera })
    }
}

impl FrameSource for V4lCamera {
    fn capture(&mut self) -> Result<RgbImage, CamError> {
        let raw_frame = self.camera.capture().map_err(CamError::CaptureError)?;

        let image = image::load_from_memory_with_format(&raw_frame, ImageFormat::Jpeg)
            .map_err(CamError::DecodeError)?;

        Ok(image.to_rgb8())
    }
}
