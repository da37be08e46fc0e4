//! # Target estimation module
//!
//! Target estimation follows a coloured marker on the vehicle from frame to frame. When the
//! operator commits a selection the hue histogram of the selected region is recorded and the
//! selection becomes the first search window. On every following frame the tracking oracle
//! updates the window and fits an oriented box, which is normalised here into a
//! [`TargetEstimate`].
//!
//! Fits which cannot give a usable orientation (no mass in the window, a collapsed axis, or a
//! non-finite centre) are not errors. The configured fallback orientation is substituted, the
//! estimate is flagged as degenerate and tracking carries on.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod cam_shift;
pub mod hist;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use image::RgbImage;
use log::{info, warn};
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

// Internal
pub use cam_shift::CamShift;
use hist::HueHistogram;

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// A visual tracking primitive.
///
/// Given a frame, the target's histogram and the previous search window, returns an updated
/// window with an oriented box fitted to the target.
pub trait TrackingOracle {
    fn track(&mut self, frame: &RgbImage, hist: &HueHistogram, window: Rect) -> TrackBox;
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Target estimation parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Params {
    /// Number of hue histogram bins over [0, 180)
    pub hist_bins: usize,

    /// Minimum saturation for a pixel to be counted
    pub sat_min: u8,

    /// Minimum brightness for a pixel to be counted
    pub val_min: u8,

    /// Maximum number of mean-shift iterations per frame
    pub max_iterations: u32,

    /// Mean-shift stops once the window moves less than this.
    ///
    /// Units: pixels
    pub epsilon_px: f64,

    /// Fits with an axis shorter than this are degenerate.
    ///
    /// Units: pixels
    pub min_axis_px: f64,

    /// Orientation used when the fit is degenerate. 0 points the axis straight down the image.
    ///
    /// Units: degrees
    pub fallback_orientation_deg: f64,
}

/// An axis aligned rectangle in image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

/// Oriented box produced by a tracking oracle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackBox {
    /// Box centre in pixels
    pub center: Point2<f64>,

    /// Minor axis length in pixels
    pub width: f64,

    /// Major axis length in pixels
    pub height: f64,

    /// Orientation of the major axis in [0, 180), 0 being vertical in the image.
    ///
    /// Units: degrees
    pub angle_deg: f64,

    /// Total likelihood inside the fitted window
    pub mass: f64,

    /// Search window for the next frame
    pub window: Rect,
}

/// The target as estimated on one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetEstimate {
    /// Target centre in pixels
    pub center: Point2<f64>,

    /// Orientation of the target's axis in [0, 180).
    ///
    /// Units: degrees
    pub orientation_deg: f64,

    /// Search window for the next frame
    pub search_window: Rect,

    /// Fitted box size as (minor, major) axis lengths in pixels
    pub size: (f64, f64),

    /// True if the fallback orientation was substituted
    pub degenerate: bool,
}

/// Follows the selected target between frames.
pub struct TargetEstimator {
    params: Params,

    oracle: Box<dyn TrackingOracle>,

    hist: Option<HueHistogram>,

    window: Option<Rect>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum TargetEstError {
    #[error("The selection {0:?} does not overlap the frame")]
    EmptySelection(Rect),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for Params {
    fn default() -> Self {
        Self {
            hist_bins: 16,
            sat_min: 60,
            val_min: 32,
            max_iterations: 10,
            epsilon_px: 1.0,
            min_axis_px: 1.0,
            fallback_orientation_deg: 0.0,
        }
    }
}

impl Rect {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self { x, y, width, height }
    }

    /// Build a rectangle from two opposite corners given in any order.
    ///
    /// Sizes too large for an `i32` saturate.
    pub fn from_corners(x0: i32, y0: i32, x1: i32, y1: i32) -> Self {
        Self {
            x: x0.min(x1),
            y: y0.min(y1),
            width: span(x0, x1),
            height: span(y0, y1),
        }
    }

    pub fn area(&self) -> i64 {
        self.width.max(0) as i64 * self.height.max(0) as i64
    }

    /// The part of this rectangle inside an image of the given size.
    ///
    /// Rectangles entirely outside the image clip to an empty rectangle.
    pub fn clip(&self, cols: i32, rows: i32) -> Self {
        let x0 = self.x.max(0);
        let y0 = self.y.max(0);
        let x1 = (self.x as i64 + self.width as i64).min(cols as i64);
        let y1 = (self.y as i64 + self.height as i64).min(rows as i64);

        if x1 <= x0 as i64 || y1 <= y0 as i64 {
            return Self::default();
        }

        // Both ends now lie within the image so the sizes fit
        Self::new(x0, y0, (x1 - x0 as i64) as i32, (y1 - y0 as i64) as i32)
    }

    pub fn center(&self) -> Point2<f64> {
        Point2::new(
            self.x as f64 + self.width as f64 * 0.5,
            self.y as f64 + self.height as f64 * 0.5
        )
    }
}

/// Distance between two coordinates, saturating at `i32::MAX`.
fn span(a: i32, b: i32) -> i32 {
    (b as i64 - a as i64).abs().min(i32::MAX as i64) as i32
}

impl Default for TargetEstimator {
    fn default() -> Self {
        let params = Params::default();
        let oracle = Box::new(CamShift::new(&params));
        Self::new(params, oracle)
    }
}

impl TargetEstimator {
    pub fn new(params: Params, oracle: Box<dyn TrackingOracle>) -> Self {
        Self {
            params,
            oracle,
            hist: None,
            window: None,
        }
    }

    /// Estimator using the CamShift oracle.
    pub fn with_cam_shift(params: Params) -> Self {
        let oracle = Box::new(CamShift::new(&params));
        Self::new(params, oracle)
    }

    /// Record the histogram of `selection` and use it as the first search window.
    ///
    /// The selection is clipped to the frame first.
    pub fn start_tracking(&mut self, frame: &RgbImage, selection: Rect)
        -> Result<(), TargetEstError>
    {
        let roi = selection.clip(frame.width() as i32, frame.height() as i32);
        if roi.area() == 0 {
            return Err(TargetEstError::EmptySelection(selection));
        }

        self.hist = Some(HueHistogram::from_region(frame, &roi, &self.params));
        self.window = Some(roi);

        info!("Tracking started on {:?}", roi);

        Ok(())
    }

    pub fn stop_tracking(&mut self) {
        if self.is_tracking() {
            info!("Tracking stopped");
        }
        self.hist = None;
        self.window = None;
    }

    pub fn is_tracking(&self) -> bool {
        self.hist.is_some() && self.window.is_some()
    }

    /// The current histogram, if tracking.
    pub fn histogram(&self) -> Option<&HueHistogram> {
        self.hist.as_ref()
    }

    /// Estimate the target on a new frame. Returns `None` if not tracking.
    pub fn estimate(&mut self, frame: &RgbImage) -> Option<TargetEstimate> {
        let (hist, window) = match (&self.hist, self.window) {
            (Some(h), Some(w)) => (h, w),
            _ => return None
        };

        let tb = self.oracle.track(frame, hist, window);

        let mass_ok = tb.mass.is_finite() && tb.mass > 0.0;
        let center_ok = tb.center.x.is_finite() && tb.center.y.is_finite();
        let axes_ok = tb.width >= self.params.min_axis_px && tb.height >= self.params.min_axis_px;
        let angle_ok = tb.angle_deg.is_finite();

        // Keep the previous window if the oracle lost it entirely
        let search_window = if tb.window.area() > 0 { tb.window } else { window };
        self.window = Some(search_window);

        let center = if mass_ok && center_ok {
            tb.center
        }
        else {
            search_window.center()
        };

        let degenerate = !(mass_ok && center_ok && axes_ok && angle_ok);
        let orientation_deg = if degenerate {
            warn!(
                "Degenerate target fit (mass {:.1}, axes {:.1}x{:.1}), using fallback orientation {} deg",
                tb.mass, tb.width, tb.height, self.params.fallback_orientation_deg
            );
            self.params.fallback_orientation_deg
        }
        else {
            tb.angle_deg
        };

        Some(TargetEstimate {
            center,
            orientation_deg,
            search_window,
            size: (tb.width, tb.height),
            degenerate,
        })
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
