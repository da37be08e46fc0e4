//! Hue histogram of the tracked target and its back-projection
//!
//! Colours are converted to 8-bit HSV with hue in [0, 180), which halves the usual 360 degree
//! circle so it fits into a byte.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use image::{GrayImage, Luma, Rgb, RgbImage};

// Internal
use super::{Params, Rect};
use util::maths::lin_map;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Exclusive upper bound on the 8-bit hue.
pub const HUE_RANGE: u32 = 180;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A single pixel in 8-bit HSV.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hsv {
    pub h: u8,
    pub s: u8,
    pub v: u8,
}

/// Normalised hue histogram of a selected region.
///
/// Bin values are scaled so the fullest bin is 255 and the emptiest is 0.
#[derive(Debug, Clone, PartialEq)]
pub struct HueHistogram {
    bins: Vec<f64>,

    sat_min: u8,
    val_min: u8,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Hsv {
    /// Convert an RGB pixel into HSV.
    pub fn from_rgb(px: &Rgb<u8>) -> Self {
        let [r, g, b] = px.0;
        let (rf, gf, bf) = (r as f64, g as f64, b as f64);

        let v = r.max(g).max(b);
        let min = r.min(g).min(b);
        let diff = (v - min) as f64;

        let s = match v {
            0 => 0.0,
            _ => 255.0 * diff / v as f64
        };

        let h = if diff == 0.0 {
            0.0
        }
        else if v == r {
            60.0 * (gf - bf) / diff
        }
        else if v == g {
            120.0 + 60.0 * (bf - rf) / diff
        }
        else {
            240.0 + 60.0 * (rf - gf) / diff
        };
        let h = if h < 0.0 { h + 360.0 } else { h };

        Self {
            h: ((h / 2.0).round() as u32 % HUE_RANGE) as u8,
            s: s.round() as u8,
            v,
        }
    }

    /// True if the pixel is saturated and bright enough for its hue to be meaningful.
    pub fn in_mask(&self, sat_min: u8, val_min: u8) -> bool {
        self.s >= sat_min && self.v >= val_min
    }
}

impl HueHistogram {
    /// Build the histogram of the masked pixels within `roi`.
    ///
    /// `roi` must already lie inside the frame.
    pub fn from_region(frame: &RgbImage, roi: &Rect, params: &Params) -> Self {
        let num_bins = params.hist_bins.max(1);
        let mut counts = vec![0f64; num_bins];

        for y in roi.y..(roi.y + roi.height) {
            for x in roi.x..(roi.x + roi.width) {
                let hsv = Hsv::from_rgb(frame.get_pixel(x as u32, y as u32));
                if hsv.in_mask(params.sat_min, params.val_min) {
                    counts[bin_index(hsv.h, num_bins)] += 1.0;
                }
            }
        }

        let min = counts.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = counts.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

        let bins = if max > min {
            counts.iter().map(|c| lin_map((min, max), (0.0, 255.0), *c)).collect()
        }
        else {
            vec![0.0; num_bins]
        };

        Self {
            bins,
            sat_min: params.sat_min,
            val_min: params.val_min,
        }
    }

    /// The normalised bin values.
    pub fn bins(&self) -> &[f64] {
        &self.bins
    }

    /// Back-project the histogram onto a frame.
    ///
    /// Each output pixel is the histogram value of the input pixel's hue, or zero if the pixel
    /// is outside the saturation/brightness mask.
    pub fn back_project(&self, frame: &RgbImage) -> GrayImage {
        let mut prob = GrayImage::new(frame.width(), frame.height());

        for (x, y, px) in frame.enumerate_pixels() {
            let hsv = Hsv::from_rgb(px);
            let val = if hsv.in_mask(self.sat_min, self.val_min) {
                self.bins[bin_index(hsv.h, self.bins.len())].round().min(255.0) as u8
            }
            else {
                0
            };
            prob.put_pixel(x, y, Luma([val]));
        }

        prob
    }
}

/// Histogram bin for an 8-bit hue.
fn bin_index(hue: u8, num_bins: usize) -> usize {
    ((hue as usize * num_bins) / HUE_RANGE as usize).min(num_bins - 1)
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_hsv_primaries() {
        assert_eq!(Hsv::from_rgb(&Rgb([255, 0, 0])), Hsv { h: 0, s: 255, v: 255 });
        assert_eq!(Hsv::from_rgb(&Rgb([0, 255, 0])), Hsv { h: 60, s: 255, v: 255 });
        assert_eq!(Hsv::from_rgb(&Rgb([0, 0, 255])), Hsv { h: 120, s: 255, v: 255 });
        assert_eq!(Hsv::from_rgb(&Rgb([0, 0, 0])), Hsv { h: 0, s: 0, v: 0 });
        assert_eq!(Hsv::from_rgb(&Rgb([128, 128, 128])), Hsv { h: 0, s: 0, v: 128 });
    }

    #[test]
    fn test_mask() {
        let params = Params::default();

        // Grey and dark pixels carry no useful hue
        assert!(!Hsv::from_rgb(&Rgb([200, 200, 200])).in_mask(params.sat_min, params.val_min));
        assert!(!Hsv::from_rgb(&Rgb([20, 0, 0])).in_mask(params.sat_min, params.val_min));
        assert!(Hsv::from_rgb(&Rgb([0, 0, 200])).in_mask(params.sat_min, params.val_min));
    }

    #[test]
    fn test_histogram_normalised() {
        let params = Params::default();
        let mut frame = RgbImage::from_pixel(20, 20, Rgb([0, 0, 255]));
        for x in 0..5 {
            frame.put_pixel(x, 0, Rgb([0, 255, 0]));
        }

        let hist = HueHistogram::from_region(&frame, &Rect::new(0, 0, 20, 20), &params);

        assert_eq!(hist.bins().len(), 16);
        // Blue hue 120 lands in bin 10, green hue 60 in bin 5
        assert_eq!(hist.bins()[10], 255.0);
        assert!(hist.bins()[5] > 0.0 && hist.bins()[5] < 10.0);
        assert_eq!(hist.bins()[0], 0.0);
    }

    #[test]
    fn test_histogram_uniform_is_zero() {
        // A grey region is entirely masked out, every bin is empty
        let params = Params::default();
        let frame = RgbImage::from_pixel(10, 10, Rgb([100, 100, 100]));

        let hist = HueHistogram::from_region(&frame, &Rect::new(0, 0, 10, 10), &params);

        assert!(hist.bins().iter().all(|b| *b == 0.0));
    }

    #[test]
    fn test_back_project() {
        let params = Params::default();
        let mut frame = RgbImage::from_pixel(10, 10, Rgb([90, 90, 90]));
        frame.put_pixel(2, 3, Rgb([0, 0, 255]));
        frame.put_pixel(4, 4, Rgb([255, 0, 0]));

        let hist = HueHistogram::from_region(&frame, &Rect::new(0, 0, 4, 4), &params);
        let prob = hist.back_project(&frame);

        assert_eq!(prob.get_pixel(2, 3).0[0], 255);
        assert_eq!(prob.get_pixel(4, 4).0[0], 0);
        assert_eq!(prob.get_pixel(0, 0).0[0], 0);
    }
}
