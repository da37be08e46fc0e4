//! Angle and distance calculations feeding navigation control
//!
//! All angles are in degrees and all positions in image pixels (origin top left, y downwards).

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use nalgebra::Point2;

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Euclidean distance between two points.
pub fn distance(a: &Point2<f64>, b: &Point2<f64>) -> f64 {
    nalgebra::distance(a, b)
}

/// Signed difference between the target's orientation axis and the bearing from the target to
/// the destination.
///
/// `orientation_deg` is the tracker's box angle in [0, 180). The orientation is first measured
/// from the horizontal (`90 - orientation`), the direction to the destination is measured in the
/// same convention, and values above 180 are folded back with `180 - diff`.
///
/// The axis is undirected, so results near 0 and near +/-180 both mean the target is lined up
/// with the destination.
pub fn angle_difference(
    orientation_deg: f64,
    center: &Point2<f64>,
    destination: &Point2<f64>
) -> f64 {
    let corrected_orientation_deg = 90.0 - orientation_deg;

    let dir_dx = center.x - destination.x;
    let dir_dy = center.y - destination.y;
    let dir_bearing_deg = 180.0 - dir_dy.atan2(dir_dx).to_degrees();

    let diff = dir_bearing_deg - corrected_orientation_deg;

    // The downstream thresholds are tuned against this fold, it is not a mod 360
    if diff > 180.0 {
        180.0 - diff
    }
    else {
        diff
    }
}

/// Determine if an angle difference means the target is aligned with its destination.
///
/// Aligned means within `tolerance_deg` of either end of the undirected axis.
pub fn is_aligned(angle_diff_deg: f64, tolerance_deg: f64) -> bool {
    let magn = angle_diff_deg.abs();
    magn < tolerance_deg || magn > 180.0 - tolerance_deg
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
