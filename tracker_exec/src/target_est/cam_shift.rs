//! Continuously adaptive mean-shift tracker
//!
//! The target's histogram is back-projected onto the frame to give a per-pixel likelihood. The
//! search window is shifted onto the likelihood's local centre of mass (mean-shift), then an
//! oriented box is fitted to the second-order moments of the window.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use image::{GrayImage, RgbImage};
use log::trace;
use nalgebra::Point2;
use std::f64::consts::FRAC_PI_2;

// Internal
use super::{hist::HueHistogram, Params, Rect, TrackBox, TrackingOracle};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Number of pixels the window is grown by on each side before the box is fitted.
const TOLERANCE: i32 = 10;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// CamShift tracking oracle.
#[derive(Debug, Clone)]
pub struct CamShift {
    max_iterations: u32,
    epsilon_px: f64,
}

/// Raw and central image moments of a window.
#[derive(Debug, Clone, Copy, Default)]
struct Moments {
    m00: f64,
    m10: f64,
    m01: f64,
    mu20: f64,
    mu11: f64,
    mu02: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl CamShift {
    pub fn new(params: &Params) -> Self {
        Self {
            max_iterations: params.max_iterations,
            epsilon_px: params.epsilon_px,
        }
    }

    /// Shift the window onto the centre of mass of the likelihood.
    pub fn mean_shift(&self, prob: &GrayImage, window: Rect) -> Rect {
        let (cols, rows) = (prob.width() as i32, prob.height() as i32);
        let eps = (self.epsilon_px * self.epsilon_px).round() as i32;

        let mut cur = window;

        for i in 0..self.max_iterations {
            cur = cur.clip(cols, rows);
            if cur.area() == 0 {
                cur.x = cols / 2;
                cur.y = rows / 2;
            }
            cur.width = cur.width.max(1);
            cur.height = cur.height.max(1);

            let m = Moments::of(prob, &cur);
            if m.m00.abs() < f64::EPSILON {
                break;
            }

            let dx = (m.m10 / m.m00 - cur.width as f64 * 0.5).round() as i32;
            let dy = (m.m01 / m.m00 - cur.height as f64 * 0.5).round() as i32;

            let nx = (cur.x + dx).max(0).min(cols - cur.width);
            let ny = (cur.y + dy).max(0).min(rows - cur.height);

            let (dx, dy) = (nx - cur.x, ny - cur.y);
            cur.x = nx;
            cur.y = ny;

            if dx * dx + dy * dy < eps {
                trace!("Mean-shift converged after {} iterations", i + 1);
                break;
            }
        }

        cur
    }

    /// Run mean-shift then fit an oriented box to the window.
    pub fn cam_shift(&self, prob: &GrayImage, window: Rect) -> TrackBox {
        let (cols, rows) = (prob.width() as i32, prob.height() as i32);

        let shifted = self.mean_shift(prob, window);

        let grown = Rect::new(
            shifted.x - TOLERANCE,
            shifted.y - TOLERANCE,
            shifted.width + 2 * TOLERANCE,
            shifted.height + 2 * TOLERANCE
        ).clip(cols, rows);

        let m = Moments::of(prob, &grown);
        if m.m00.abs() < f64::EPSILON {
            return TrackBox {
                center: Point2::new(0.0, 0.0),
                width: 0.0,
                height: 0.0,
                angle_deg: 0.0,
                mass: 0.0,
                window: shifted,
            };
        }

        let inv_m00 = 1.0 / m.m00;
        let xc = (m.m10 * inv_m00 + grown.x as f64).round() as i32;
        let yc = (m.m01 * inv_m00 + grown.y as f64).round() as i32;

        let a = m.mu20 * inv_m00;
        let b = m.mu11 * inv_m00;
        let c = m.mu02 * inv_m00;

        let square = (4.0 * b * b + (a - c) * (a - c)).sqrt();
        let mut theta = (2.0 * b).atan2(a - c + square);

        let mut cs = theta.cos();
        let mut sn = theta.sin();

        let rotate_a = (cs * cs * m.mu20 + 2.0 * cs * sn * m.mu11 + sn * sn * m.mu02).max(0.0);
        let rotate_c = (sn * sn * m.mu20 - 2.0 * cs * sn * m.mu11 + cs * cs * m.mu02).max(0.0);

        let mut length = (rotate_a * inv_m00).sqrt() * 4.0;
        let mut width = (rotate_c * inv_m00).sqrt() * 4.0;

        // Length is always the major axis
        if length < width {
            std::mem::swap(&mut length, &mut width);
            std::mem::swap(&mut cs, &mut sn);
            theta = FRAC_PI_2 - theta;
        }

        let t0 = (length * cs).abs().round() as i32;
        let t1 = (width * sn).abs().round() as i32;
        let comp_width = (t0.max(t1) + 2).min((cols - xc) * 2);

        let t0 = (length * sn).abs().round() as i32;
        let t1 = (width * cs).abs().round() as i32;
        let comp_height = (t0.max(t1) + 2).min((rows - yc) * 2);

        let comp_x = (xc - comp_width / 2).max(0);
        let comp_y = (yc - comp_height / 2).max(0);
        let comp = Rect::new(
            comp_x,
            comp_y,
            comp_width.min(cols - comp_x),
            comp_height.min(rows - comp_y)
        );

        let mut angle_deg = (FRAC_PI_2 + theta).to_degrees();
        while angle_deg < 0.0 {
            angle_deg += 360.0;
        }
        while angle_deg >= 360.0 {
            angle_deg -= 360.0;
        }
        if angle_deg >= 180.0 {
            angle_deg -= 180.0;
        }

        TrackBox {
            center: comp.center(),
            width,
            height: length,
            angle_deg,
            mass: m.m00,
            window: comp,
        }
    }
}

impl TrackingOracle for CamShift {
    fn track(&mut self, frame: &RgbImage, hist: &HueHistogram, window: Rect) -> TrackBox {
        let prob = hist.back_project(frame);
        self.cam_shift(&prob, window)
    }
}

impl Moments {
    /// Moments of the pixels of `img` within `roi`, in the window's own coordinates.
    ///
    /// `roi` must lie inside the image.
    fn of(img: &GrayImage, roi: &Rect) -> Self {
        let mut m00 = 0f64;
        let mut m10 = 0f64;
        let mut m01 = 0f64;
        let mut m20 = 0f64;
        let mut m11 = 0f64;
        let mut m02 = 0f64;

        for y in 0..roi.height {
            for x in 0..roi.width {
                let val = img.get_pixel((roi.x + x) as u32, (roi.y + y) as u32).0[0] as f64;
                if val == 0.0 {
                    continue;
                }

                let (xf, yf) = (x as f64, y as f64);
                m00 += val;
                m10 += xf * val;
                m01 += yf * val;
                m20 += xf * xf * val;
                m11 += xf * yf * val;
                m02 += yf * yf * val;
            }
        }

        if m00 == 0.0 {
            return Self::default();
        }

        let x_bar = m10 / m00;
        let y_bar = m01 / m00;

        Self {
            m00,
            m10,
            m01,
            mu20: m20 - x_bar * m10,
            mu11: m11 - x_bar * m01,
            mu02: m02 - y_bar * m01,
        }
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use image::Luma;

    /// Likelihood image with a filled rectangle of full probability.
    fn blob(x: u32, y: u32, w: u32, h: u32) -> GrayImage {
        let mut img = GrayImage::new(200, 200);
        for yy in y..(y + h) {
            for xx in x..(x + w) {
                img.put_pixel(xx, yy, Luma([255]));
            }
        }
        img
    }

    fn tracker() -> CamShift {
        CamShift::new(&Params::default())
    }

    #[test]
    fn test_mean_shift_moves_onto_blob() {
        let prob = blob(60, 60, 20, 20);

        let window = tracker().mean_shift(&prob, Rect::new(50, 50, 20, 20));

        assert!((window.x - 60).abs() <= 1);
        assert!((window.y - 60).abs() <= 1);
        assert_eq!((window.width, window.height), (20, 20));
    }

    #[test]
    fn test_mean_shift_empty_window_stays() {
        let prob = blob(150, 150, 20, 20);

        let window = tracker().mean_shift(&prob, Rect::new(10, 10, 20, 20));

        assert_eq!(window, Rect::new(10, 10, 20, 20));
    }

    #[test]
    fn test_vertical_bar() {
        let prob = blob(95, 60, 10, 80);

        let tb = tracker().cam_shift(&prob, Rect::new(90, 50, 19, 99));

        assert!(tb.angle_deg.abs() < 1e-6 || (tb.angle_deg - 180.0).abs() < 1e-6);
        assert!(tb.height > tb.width);
        assert!((tb.center.x - 100.0).abs() <= 1.0);
        assert!((tb.center.y - 100.0).abs() <= 1.0);
    }

    #[test]
    fn test_horizontal_bar() {
        let prob = blob(60, 95, 80, 10);

        let tb = tracker().cam_shift(&prob, Rect::new(50, 90, 99, 19));

        assert!((tb.angle_deg - 90.0).abs() < 1e-6);
        assert!(tb.height > tb.width);
    }

    #[test]
    fn test_diagonal_bar() {
        let mut prob = GrayImage::new(200, 200);
        for i in 0..80 {
            for t in 0..6 {
                prob.put_pixel(60 + i + t, 60 + i, Luma([255]));
            }
        }

        let tb = tracker().cam_shift(&prob, Rect::new(60, 60, 80, 80));

        // Running down and to the right in image coordinates
        assert!((tb.angle_deg - 135.0).abs() < 3.0);
    }

    #[test]
    fn test_zero_mass() {
        let prob = GrayImage::new(100, 100);

        let tb = tracker().cam_shift(&prob, Rect::new(10, 10, 20, 20));

        assert_eq!(tb.mass, 0.0);
        assert_eq!(tb.window, Rect::new(10, 10, 20, 20));
    }
}
