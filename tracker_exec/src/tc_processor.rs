//! # Telecommand processor module
//!
//! The telecommand processor handles operator TCs coming from any source.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, info, warn};
use nalgebra::Point2;

// Internal
use comms_if::tc::{Tc, TcResponse};
use tracker_lib::{data_store::DataStore, nav_ctrl::NavCtrlError, target_est::Rect};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// How far outside the frame a destination may lie.
const DESTINATION_MARGIN_PX: f64 = 200.0;

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Execute a telecommand.
///
/// Mutates the datastore to pass the operator's actions on to the modules. A TC which is valid
/// but cannot be acted on right now gives `TcResponse::CannotExecute`.
pub(crate) fn exec(ds: &mut DataStore, tc: &Tc) -> Result<TcResponse, NavCtrlError> {
    match *tc {
        Tc::SelectionStart { x, y } => {
            debug!("Selection started at ({}, {})", x, y);

            // A new selection means a new target, so anything in progress is dropped
            ds.target_est.stop_tracking();
            ds.nav_ctrl.clear()?;
            ds.pending_selection = None;
            ds.selection_preview = Some(Rect::new(x, y, 0, 0));
        },
        Tc::SelectionDrag { x0, y0, x1, y1 } => {
            ds.selection_preview = Some(selection_rect(ds, x0, y0, x1, y1));
        },
        Tc::SelectionCommit { x0, y0, x1, y1 } => {
            ds.selection_preview = None;

            let selection = selection_rect(ds, x0, y0, x1, y1);

            if selection.area() == 0 {
                warn!("Empty selection ({}, {}) to ({}, {}) ignored", x0, y0, x1, y1);
                return Ok(TcResponse::CannotExecute);
            }

            info!("Selection committed: {:?}", selection);
            ds.pending_selection = Some(selection);
        },
        Tc::Destination { x, y } => {
            if !ds.target_est.is_tracking() && ds.pending_selection.is_none() {
                warn!("Destination ({:.0}, {:.0}) ignored, no target is being tracked", x, y);
                return Ok(TcResponse::CannotExecute);
            }

            if !destination_in_bounds(ds, x, y) {
                warn!("Destination ({}, {}) ignored, too far outside the frame", x, y);
                return Ok(TcResponse::CannotExecute);
            }

            ds.nav_ctrl.set_destination(Point2::new(x, y))?;
        },
        Tc::Quit => {
            info!("Quit requested");
            ds.quit_requested = true;
        }
    }

    Ok(TcResponse::Ok)
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Rectangle between two selection corners, clamped to the frame if there is one.
fn selection_rect(ds: &DataStore, x0: i32, y0: i32, x1: i32, y1: i32) -> Rect {
    match ds.frame {
        Some(ref frame) => {
            let (w, h) = (frame.width() as i32, frame.height() as i32);
            Rect::from_corners(
                x0.max(0).min(w),
                y0.max(0).min(h),
                x1.max(0).min(w),
                y1.max(0).min(h)
            )
        },
        None => Rect::from_corners(x0, y0, x1, y1)
    }
}

/// A destination must be finite and within the margin around the frame.
fn destination_in_bounds(ds: &DataStore, x: f64, y: f64) -> bool {
    if !(x.is_finite() && y.is_finite()) {
        return false;
    }

    match ds.frame {
        Some(ref frame) => {
            x >= -DESTINATION_MARGIN_PX
                && y >= -DESTINATION_MARGIN_PX
                && x <= frame.width() as f64 + DESTINATION_MARGIN_PX
                && y <= frame.height() as f64 + DESTINATION_MARGIN_PX
        },
        None => true
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use image::{Rgb, RgbImage};
    use tracker_lib::nav_ctrl::NavPhase;

    fn ds_with_frame() -> DataStore {
        let mut frame = RgbImage::from_pixel(100, 80, Rgb([90, 90, 90]));
        for y in 20..40 {
            for x in 30..50 {
                frame.put_pixel(x, y, Rgb([0, 0, 255]));
            }
        }

        DataStore {
            frame: Some(frame),
            ..Default::default()
        }
    }

    #[test]
    fn test_selection_flow() {
        let mut ds = ds_with_frame();

        let r = exec(&mut ds, &Tc::SelectionStart { x: 30, y: 20 }).unwrap();
        assert_eq!(r, TcResponse::Ok);

        exec(&mut ds, &Tc::SelectionDrag { x0: 30, y0: 20, x1: 40, y1: 30 }).unwrap();
        assert_eq!(ds.selection_preview, Some(Rect::new(30, 20, 10, 10)));

        // Committed outside the frame on the right, clamped to it
        exec(&mut ds, &Tc::SelectionCommit { x0: 30, y0: 20, x1: 150, y1: 40 }).unwrap();
        assert_eq!(ds.selection_preview, None);
        assert_eq!(ds.pending_selection, Some(Rect::new(30, 20, 70, 20)));
    }

    #[test]
    fn test_empty_selection_ignored() {
        let mut ds = ds_with_frame();

        let r = exec(&mut ds, &Tc::SelectionCommit { x0: 30, y0: 20, x1: 30, y1: 60 }).unwrap();
        assert_eq!(r, TcResponse::CannotExecute);

        let r = exec(&mut ds, &Tc::SelectionCommit { x0: 200, y0: 200, x1: 220, y1: 220 }).unwrap();
        assert_eq!(r, TcResponse::CannotExecute);
        assert_eq!(ds.pending_selection, None);
    }

    #[test]
    fn test_destination_needs_target() {
        let mut ds = ds_with_frame();

        let r = exec(&mut ds, &Tc::Destination { x: 10.0, y: 10.0 }).unwrap();
        assert_eq!(r, TcResponse::CannotExecute);
        assert_eq!(ds.nav_ctrl.destination(), None);

        let frame = ds.frame.clone().unwrap();
        ds.target_est.start_tracking(&frame, Rect::new(30, 20, 20, 20)).unwrap();

        let r = exec(&mut ds, &Tc::Destination { x: 10.0, y: 10.0 }).unwrap();
        assert_eq!(r, TcResponse::Ok);
        assert_eq!(ds.nav_ctrl.destination(), Some(Point2::new(10.0, 10.0)));
        assert_eq!(ds.nav_ctrl.state().phase, NavPhase::CommandTurn);
    }

    #[test]
    fn test_extreme_coordinates() {
        let mut ds = ds_with_frame();
        let frame = ds.frame.clone().unwrap();
        ds.target_est.start_tracking(&frame, Rect::new(30, 20, 20, 20)).unwrap();

        for &(x, y) in &[(3.0e9, 10.0), (10.0, -1.0e12), (f64::NAN, 10.0), (10.0, f64::INFINITY)] {
            let r = exec(&mut ds, &Tc::Destination { x, y }).unwrap();
            assert_eq!(r, TcResponse::CannotExecute);
        }
        assert_eq!(ds.nav_ctrl.destination(), None);

        // Just off the frame is still a valid place to drive to
        let r = exec(&mut ds, &Tc::Destination { x: 150.0, y: -20.0 }).unwrap();
        assert_eq!(r, TcResponse::Ok);

        exec(&mut ds, &Tc::SelectionDrag {
            x0: i32::MIN, y0: i32::MIN, x1: i32::MAX, y1: i32::MAX
        }).unwrap();
        assert_eq!(ds.selection_preview, Some(Rect::new(0, 0, 100, 80)));

        let r = exec(&mut ds, &Tc::SelectionCommit {
            x0: i32::MAX, y0: i32::MIN, x1: i32::MIN, y1: i32::MAX
        }).unwrap();
        assert_eq!(r, TcResponse::Ok);
        assert_eq!(ds.pending_selection, Some(Rect::new(0, 0, 100, 80)));
    }

    #[test]
    fn test_selection_start_resets() {
        let mut ds = ds_with_frame();
        let frame = ds.frame.clone().unwrap();
        ds.target_est.start_tracking(&frame, Rect::new(30, 20, 20, 20)).unwrap();
        exec(&mut ds, &Tc::Destination { x: 10.0, y: 10.0 }).unwrap();

        exec(&mut ds, &Tc::SelectionStart { x: 5, y: 5 }).unwrap();

        assert!(!ds.target_est.is_tracking());
        assert_eq!(ds.nav_ctrl.destination(), None);
        assert_eq!(ds.nav_ctrl.state().phase, NavPhase::Idle);
    }

    #[test]
    fn test_quit() {
        let mut ds = DataStore::default();

        exec(&mut ds, &Tc::Quit).unwrap();

        assert!(ds.quit_requested);
    }
}
