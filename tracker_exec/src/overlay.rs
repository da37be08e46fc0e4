//! # Overlay rendering
//!
//! Draws the tracker's view of the world onto a copy of the frame: the target, its orientation
//! axis and fitted ellipse, the destination, and the selection being dragged. Rendered frames
//! are saved periodically into the session so a run can be reviewed afterwards.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use image::{Rgb, RgbImage};
use log::trace;
use nalgebra::Point2;
use std::path::PathBuf;

use crate::target_est::{Rect, TargetEstimate};
use util::session::{Session, SessionError};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

const GREEN: Rgb<u8> = Rgb([0, 255, 0]);
const RED: Rgb<u8> = Rgb([255, 0, 0]);
const BLUE: Rgb<u8> = Rgb([0, 0, 255]);

/// Radius of the target and destination markers.
const MARKER_RADIUS_PX: i32 = 8;

/// Length of the drawn orientation axis.
const AXIS_LENGTH_PX: f64 = 100.0;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Everything drawn onto a frame.
#[derive(Debug, Clone, Copy, Default)]
pub struct OverlayData {
    pub target: Option<TargetEstimate>,
    pub destination: Option<Point2<f64>>,
    pub selection_preview: Option<Rect>,
}

/// Periodic writer of rendered overlays.
pub struct OverlaySaver {
    dir: PathBuf,
    period_cycles: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum OverlayError {
    #[error("Could not create the overlay directory: {0}")]
    SessionError(SessionError),

    #[error("Could not save the overlay image: {0}")]
    SaveError(image::ImageError),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl OverlaySaver {
    /// Create a saver writing into the session's `overlay` directory. A period of 0 disables
    /// saving.
    pub fn new(session: &Session, period_cycles: u64) -> Result<Self, OverlayError> {
        let dir = session.subdir("overlay").map_err(OverlayError::SessionError)?;

        Ok(Self { dir, period_cycles })
    }

    /// Save the image if the cycle falls on the save period. Returns true if it was saved.
    pub fn save_if_due(&self, cycle: u64, image: &RgbImage) -> Result<bool, OverlayError> {
        if self.period_cycles == 0 || cycle % self.period_cycles != 0 {
            return Ok(false);
        }

        let path = self.dir.join(format!("frame_{:06}.png", cycle));
        image.save(&path).map_err(OverlayError::SaveError)?;

        trace!("Overlay saved to {:?}", path);

        Ok(true)
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Render the overlay onto a copy of the frame.
pub fn render(frame: &RgbImage, data: &OverlayData) -> RgbImage {
    let mut img = frame.clone();

    if let Some(te) = data.target {
        if let Some(dest) = data.destination {
            draw_line(&mut img, &te.center, &dest, BLUE);
        }

        let a = te.orientation_deg.to_radians();
        let axis_end = Point2::new(
            te.center.x + AXIS_LENGTH_PX * (-a).sin(),
            te.center.y + AXIS_LENGTH_PX * (-a).cos()
        );
        draw_line(&mut img, &te.center, &axis_end, GREEN);

        draw_ellipse(&mut img, &te.center, te.size.0 / 2.0, te.size.1 / 2.0, te.orientation_deg, GREEN);
        fill_circle(&mut img, &te.center, MARKER_RADIUS_PX, GREEN);
    }

    if let Some(dest) = data.destination {
        fill_circle(&mut img, &dest, MARKER_RADIUS_PX, RED);
    }

    if let Some(sel) = data.selection_preview {
        invert_rect(&mut img, &sel);
    }

    img
}

fn put(img: &mut RgbImage, x: i32, y: i32, colour: Rgb<u8>) {
    if x >= 0 && y >= 0 && (x as u32) < img.width() && (y as u32) < img.height() {
        img.put_pixel(x as u32, y as u32, colour);
    }
}

fn fill_circle(img: &mut RgbImage, center: &Point2<f64>, radius: i32, colour: Rgb<u8>) {
    // Markers wholly off the frame are skipped before converting to pixel coordinates
    let reach = radius as f64;
    if !(center.x > -reach
        && center.y > -reach
        && center.x < img.width() as f64 + reach
        && center.y < img.height() as f64 + reach)
    {
        return;
    }

    let (cx, cy) = (center.x.round() as i32, center.y.round() as i32);

    for dy in -radius..=radius {
        for dx in -radius..=radius {
            if dx * dx + dy * dy <= radius * radius {
                put(img, cx + dx, cy + dy, colour);
            }
        }
    }
}

/// Clip the segment `a`-`b` to the pixel area of the image (Liang-Barsky).
///
/// Returns `None` if no part of the segment is on the image.
fn clip_segment(
    img: &RgbImage,
    a: &Point2<f64>,
    b: &Point2<f64>
) -> Option<(Point2<f64>, Point2<f64>)> {
    let (x_max, y_max) = (img.width() as f64 - 1.0, img.height() as f64 - 1.0);
    if x_max < 0.0 || y_max < 0.0 {
        return None;
    }

    let (dx, dy) = (b.x - a.x, b.y - a.y);
    let mut t0 = 0f64;
    let mut t1 = 1f64;

    for &(p, q) in &[(-dx, a.x), (dx, x_max - a.x), (-dy, a.y), (dy, y_max - a.y)] {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
            continue;
        }

        let r = q / p;
        if p < 0.0 {
            t0 = t0.max(r);
        }
        else {
            t1 = t1.min(r);
        }
    }

    if t0 > t1 {
        return None;
    }

    Some((
        Point2::new(a.x + t0 * dx, a.y + t0 * dy),
        Point2::new(a.x + t1 * dx, a.y + t1 * dy)
    ))
}

/// Bresenham line between two points, drawn only where it crosses the image.
fn draw_line(img: &mut RgbImage, a: &Point2<f64>, b: &Point2<f64>, colour: Rgb<u8>) {
    if !(a.x.is_finite() && a.y.is_finite() && b.x.is_finite() && b.y.is_finite()) {
        return;
    }

    let (a, b) = match clip_segment(img, a, b) {
        Some(seg) => seg,
        None => return
    };

    let (mut x0, mut y0) = (a.x.round() as i32, a.y.round() as i32);
    let (x1, y1) = (b.x.round() as i32, b.y.round() as i32);

    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        put(img, x0, y0, colour);
        if x0 == x1 && y0 == y1 {
            break;
        }

        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

/// Outline of an ellipse whose major (`semi_major`) axis is rotated by `angle_deg` from the
/// image vertical.
fn draw_ellipse(
    img: &mut RgbImage,
    center: &Point2<f64>,
    semi_minor: f64,
    semi_major: f64,
    angle_deg: f64,
    colour: Rgb<u8>
) {
    if semi_major <= 0.0 || !semi_major.is_finite() || !semi_minor.is_finite() {
        return;
    }

    let a = angle_deg.to_radians();
    let (sn, cs) = (a.sin(), a.cos());
    let steps = ((semi_major * 8.0).ceil() as usize).max(16);

    for i in 0..steps {
        let t = 2.0 * std::f64::consts::PI * i as f64 / steps as f64;
        let (u, v) = (semi_minor * t.cos(), semi_major * t.sin());

        // Rotate so that the v axis follows the orientation axis
        let x = center.x + u * cs - v * sn;
        let y = center.y + u * sn + v * cs;

        put(img, x.round() as i32, y.round() as i32, colour);
    }
}

fn invert_rect(img: &mut RgbImage, rect: &Rect) {
    let r = rect.clip(img.width() as i32, img.height() as i32);

    for y in r.y..(r.y + r.height) {
        for x in r.x..(r.x + r.width) {
            let px = img.get_pixel_mut(x as u32, y as u32);
            px.0 = [255 - px.0[0], 255 - px.0[1], 255 - px.0[2]];
        }
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
