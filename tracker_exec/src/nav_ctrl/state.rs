//! Implementations for the NavCtrl state structure

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use comms_if::eqpt::rc::RcDir;
use log::{debug, info, warn};
use nalgebra::Point2;
use serde::Serialize;

// Internal
use super::{
    geometry::{distance, is_aligned},
    MoveDir, NavCtrlError, NavPhase, Params, PivotDir,
};
use crate::actuator::{Actuator, ActuatorError, ActuatorFailurePolicy, CmdHandle};
use util::{
    archive::{ArchiveError, Archived, Archiver},
    module::State,
    params,
    session::Session,
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Navigation control module state
#[derive(Default)]
pub struct NavCtrl {
    pub(crate) params: Params,

    actuator: Option<Box<dyn Actuator>>,

    pub(crate) state: NavState,

    active_cmd: Option<ActiveCmd>,

    destination: Option<Point2<f64>>,

    output: OutputData,

    pub(crate) report: StatusReport,
    arch_report: Archiver,
}

/// Persistent navigation state, carried between cycles.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NavState {
    /// Current phase of the state machine
    pub phase: NavPhase,

    /// Number of cycles spent in the current phase. Reset on every phase change.
    pub counter: u32,

    /// Direction of the last pivot command
    pub pivot_dir: PivotDir,

    /// Direction used for the next move or probe
    pub move_dir: MoveDir,

    /// Distance to the destination recorded when the probe move was started.
    ///
    /// Units: pixels
    pub prev_dist_px: Option<f64>,

    /// Angle difference seen on the previous cycle.
    ///
    /// Units: degrees
    pub prev_angle_deg: Option<f64>,

    /// Number of turn/correct cycles which ended without alignment since the destination was set.
    pub pivot_attempts: u32,
}

/// A command which has been sent and not yet stopped.
///
/// The handle is `None` when sending failed and the failure policy says to carry on.
struct ActiveCmd {
    dir: RcDir,
    handle: Option<Box<dyn CmdHandle>>,
}

/// Data needed to initialise NavCtrl.
pub struct InitData {
    /// Parameter file name, relative to the params directory
    pub params_file: &'static str,

    /// The actuator commands are sent through
    pub actuator: Box<dyn Actuator>,
}

/// The target as seen on this cycle.
#[derive(Debug, Clone, Copy)]
pub struct NavTarget {
    /// Difference between the target's orientation and the bearing to the destination.
    ///
    /// Units: degrees
    pub angle_diff_deg: f64,

    /// Target centre in image coordinates.
    ///
    /// Units: pixels
    pub center: Point2<f64>,
}

/// Input data to navigation control.
#[derive(Debug, Clone, Copy, Default)]
pub struct InputData {
    /// The current target, or `None` if it is not being tracked or there is no destination.
    pub target: Option<NavTarget>,
}

/// Commands issued by navigation control during one cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct OutputData {
    /// Direction sent this cycle
    pub sent: Option<RcDir>,

    /// Direction stopped this cycle
    pub stopped: Option<RcDir>,
}

/// Status report for NavCtrl processing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct StatusReport {
    pub phase: NavPhase,
    pub counter: u32,
    pub pivot_dir: PivotDir,
    pub move_dir: MoveDir,
    pub prev_dist_px: Option<f64>,
    pub prev_angle_deg: Option<f64>,
    pub dist_px: Option<f64>,
    pub angle_diff_deg: Option<f64>,
    pub cmd_active: bool,
    pub cmd_dir: Option<RcDir>,
    pub pivot_attempts: u32,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for NavState {
    fn default() -> Self {
        Self::new(MoveDir::default())
    }
}

impl NavState {
    fn new(move_dir: MoveDir) -> Self {
        Self {
            phase: NavPhase::Idle,
            counter: 0,
            pivot_dir: PivotDir::default(),
            move_dir,
            prev_dist_px: None,
            prev_angle_deg: None,
            pivot_attempts: 0,
        }
    }
}

impl State for NavCtrl {
    type InitData = InitData;
    type InitError = NavCtrlError;

    type InputData = InputData;
    type OutputData = OutputData;
    type StatusReport = StatusReport;
    type ProcError = NavCtrlError;

    /// Initialise the NavCtrl module.
    fn init(&mut self, init_data: Self::InitData, session: &Session)
        -> Result<(), Self::InitError>
    {
        self.params = params::load(init_data.params_file)
            .map_err(NavCtrlError::ParamLoadError)?;

        self.arch_report = Archiver::from_path(session, "nav_ctrl/status_report.csv")
            .map_err(NavCtrlError::ArchiveError)?;

        self.actuator = Some(init_data.actuator);
        self.state = NavState::new(self.params.initial_move_dir);

        Ok(())
    }

    /// Advance the state machine by one cycle.
    ///
    /// Does nothing while there is no destination or no target.
    fn proc(&mut self, input_data: &Self::InputData)
        -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError>
    {
        self.output = OutputData::default();
        self.report = StatusReport::default();

        match (self.destination, input_data.target) {
            (Some(dest), Some(target)) => {
                let dist_px = distance(&target.center, &dest);
                self.step(&target, dist_px)?;

                self.state.prev_angle_deg = Some(target.angle_diff_deg);
                self.report.dist_px = Some(dist_px);
                self.report.angle_diff_deg = Some(target.angle_diff_deg);
            },
            _ => ()
        }

        self.fill_report();

        Ok((self.output, self.report))
    }
}

impl Archived for NavCtrl {
    fn write(&mut self) -> Result<(), ArchiveError> {
        self.arch_report.serialise(self.report)
    }
}

impl NavCtrl {
    /// Create a navigation controller directly from parameters and an actuator, without loading
    /// anything from disk or archiving.
    pub fn with_actuator(params: Params, actuator: Box<dyn Actuator>) -> Self {
        let state = NavState::new(params.initial_move_dir);

        Self {
            params,
            actuator: Some(actuator),
            state,
            ..Default::default()
        }
    }

    /// The current destination, if any.
    pub fn destination(&self) -> Option<Point2<f64>> {
        self.destination
    }

    /// The current navigation state.
    pub fn state(&self) -> &NavState {
        &self.state
    }

    /// True if a command is currently active.
    pub fn cmd_active(&self) -> bool {
        self.active_cmd.is_some()
    }

    /// Set a new destination, restarting navigation from the first pivot.
    ///
    /// Any active command is stopped and all navigation state is reset.
    pub fn set_destination(&mut self, destination: Point2<f64>) -> Result<(), NavCtrlError> {
        self.release()?;

        self.state = NavState::new(self.params.initial_move_dir);
        self.destination = Some(destination);

        info!("New destination ({:.0}, {:.0})", destination.x, destination.y);

        self.transition(NavPhase::CommandTurn)
    }

    /// Forget the destination and go back to idle, stopping any active command.
    pub fn clear(&mut self) -> Result<(), NavCtrlError> {
        self.release()?;

        self.destination = None;
        self.state = NavState::new(self.params.initial_move_dir);

        Ok(())
    }

    /// Release everything on the way out of a session. Failures are only logged.
    pub fn shutdown(&mut self) {
        if let Some(mut cmd) = self.active_cmd.take() {
            if let Some(mut handle) = cmd.handle.take() {
                if let Err(e) = handle.stop() {
                    warn!("Could not stop {} during shutdown: {}", cmd.dir, e);
                }
            }
        }

        self.destination = None;
        self.state.phase = NavPhase::Idle;
        self.state.counter = 0;
    }

    /// Perform the behaviour of the current phase.
    fn step(&mut self, target: &NavTarget, dist_px: f64) -> Result<(), NavCtrlError> {
        let aligned = is_aligned(target.angle_diff_deg, self.params.align_tolerance_deg);

        match self.state.phase {
            NavPhase::Idle | NavPhase::Done => (),

            NavPhase::CommandTurn => {
                if aligned {
                    debug!("Aligned at {:.1} deg, no pivot needed", target.angle_diff_deg);
                    self.transition(NavPhase::DetermineMoving)?;
                }
                else if self.pivot_attempts_exhausted() {
                    warn!(
                        "Not aligned after {} pivot attempts, moving anyway",
                        self.state.pivot_attempts
                    );
                    self.transition(NavPhase::DetermineMoving)?;
                }
                else {
                    self.state.pivot_dir = PivotDir::Left;
                    self.send(self.params.pivot_cmd)?;
                    self.transition(NavPhase::Turning)?;
                }
            },

            NavPhase::Turning => {
                self.state.counter += 1;

                if aligned {
                    self.transition(NavPhase::DetermineMoving)?;
                }
                else if self.state.counter >= self.params.turn_limit_ticks {
                    self.transition(NavPhase::CommandCorrect)?;
                }
            },

            NavPhase::CommandCorrect => {
                self.state.pivot_dir = PivotDir::Right;
                self.send(self.params.correct_cmd)?;
                self.transition(NavPhase::Correcting)?;
            },

            NavPhase::Correcting => {
                self.state.counter += 1;

                if aligned {
                    self.transition(NavPhase::DetermineMoving)?;
                }
                else if self.state.counter >= self.params.correct_limit_ticks {
                    self.state.pivot_attempts += 1;
                    self.transition(NavPhase::CommandTurn)?;
                }
            },

            NavPhase::DetermineMoving => {
                self.state.prev_dist_px = Some(dist_px);
                self.send(self.state.move_dir.into())?;
                self.transition(NavPhase::DetermineMovingWaiting)?;
            },

            NavPhase::DetermineMovingWaiting => {
                self.state.counter += 1;

                if self.state.counter >= self.params.move_probe_ticks {
                    // No progress means the vehicle is facing away from the destination
                    match self.state.prev_dist_px {
                        Some(prev) if dist_px >= prev => {
                            self.state.move_dir = self.state.move_dir.flip();
                            info!(
                                "Distance {:.1} px not below {:.1} px, move direction flipped to {:?}",
                                dist_px, prev, self.state.move_dir
                            );
                        },
                        _ => ()
                    }
                    self.transition(NavPhase::CommandMove)?;
                }
            },

            NavPhase::CommandMove => {
                self.send(self.state.move_dir.into())?;
                self.transition(NavPhase::Moving)?;
            },

            NavPhase::Moving => {
                if dist_px < self.params.brake_distance_px {
                    self.transition(NavPhase::CommandBrake)?;
                }
            },

            NavPhase::CommandBrake => {
                let dir: RcDir = self.state.move_dir.into();
                self.send(dir.opposite())?;
                self.transition(NavPhase::Braking)?;
            },

            NavPhase::Braking => {
                self.state.counter += 1;

                if self.state.counter >= self.params.brake_ticks {
                    self.transition(NavPhase::Done)?;
                    info!("Destination reached");
                }
            },
        }

        Ok(())
    }

    fn pivot_attempts_exhausted(&self) -> bool {
        match self.params.max_pivot_attempts {
            Some(max) => self.state.pivot_attempts >= max,
            None => false
        }
    }

    /// Move to the next phase, stopping the active command unless the next phase holds it.
    fn transition(&mut self, next: NavPhase) -> Result<(), NavCtrlError> {
        if !next.is_acting() {
            self.release()?;
        }

        info!("NavCtrl phase change: {} -> {}", self.state.phase, next);

        self.state.phase = next;
        self.state.counter = 0;

        Ok(())
    }

    /// Send a new command, stopping any command which is already active.
    fn send(&mut self, dir: RcDir) -> Result<(), NavCtrlError> {
        self.release()?;

        let policy = self.params.actuator_failure_policy;
        let actuator = self.actuator.as_mut().ok_or(NavCtrlError::NoActuator)?;

        let handle = match actuator.send(dir) {
            Ok(h) => Some(h),
            Err(e) => {
                handle_failure(policy, "send", dir, e)?;
                None
            }
        };

        debug!("NavCtrl sent {}", dir);

        self.output.sent = Some(dir);
        self.active_cmd = Some(ActiveCmd { dir, handle });

        Ok(())
    }

    /// Stop the active command, if there is one.
    fn release(&mut self) -> Result<(), NavCtrlError> {
        let mut cmd = match self.active_cmd.take() {
            Some(c) => c,
            None => return Ok(())
        };

        self.output.stopped = Some(cmd.dir);

        if let Some(mut handle) = cmd.handle.take() {
            if let Err(e) = handle.stop() {
                handle_failure(self.params.actuator_failure_policy, "stop", cmd.dir, e)?;
            }
        }

        debug!("NavCtrl stopped {}", cmd.dir);

        Ok(())
    }

    fn fill_report(&mut self) {
        self.report.phase = self.state.phase;
        self.report.counter = self.state.counter;
        self.report.pivot_dir = self.state.pivot_dir;
        self.report.move_dir = self.state.move_dir;
        self.report.prev_dist_px = self.state.prev_dist_px;
        self.report.prev_angle_deg = self.state.prev_angle_deg;
        self.report.pivot_attempts = self.state.pivot_attempts;
        self.report.cmd_active = self.active_cmd.is_some();
        self.report.cmd_dir = self.active_cmd.as_ref().map(|c| c.dir);
    }
}

/// Apply the failure policy to an actuator error.
fn handle_failure(
    policy: ActuatorFailurePolicy,
    action: &str,
    dir: RcDir,
    error: ActuatorError
) -> Result<(), NavCtrlError> {
    match policy {
        ActuatorFailurePolicy::Continue => {
            warn!("Could not {} {}, continuing: {}", action, dir, error);
            Ok(())
        },
        ActuatorFailurePolicy::Abort => Err(NavCtrlError::ActuatorError(error))
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::actuator::mock::{MockActuator, MockLog};
    use std::{cell::RefCell, rc::Rc};

    const ALIGNED: f64 = 2.0;
    const MISALIGNED: f64 = 60.0;

    fn nav_with(params: Params) -> (NavCtrl, Rc<RefCell<MockLog>>) {
        let (act, log) = MockActuator::new();
        (NavCtrl::with_actuator(params, Box::new(act)), log)
    }

    fn nav() -> (NavCtrl, Rc<RefCell<MockLog>>) {
        nav_with(Params::default())
    }

    fn input(angle_diff_deg: f64, x: f64, y: f64) -> InputData {
        InputData {
            target: Some(NavTarget {
                angle_diff_deg,
                center: Point2::new(x, y)
            })
        }
    }

    /// Run the controller with the same input for `n` cycles.
    fn run(nav: &mut NavCtrl, inp: &InputData, n: usize) {
        for _ in 0..n {
            nav.proc(inp).unwrap();
        }
    }

    /// Bring a controller with the destination at (100, 1000) into the Moving phase.
    fn into_moving(nav: &mut NavCtrl) {
        nav.set_destination(Point2::new(100.0, 1000.0)).unwrap();
        nav.proc(&input(ALIGNED, 100.0, 100.0)).unwrap();
        nav.proc(&input(ALIGNED, 100.0, 100.0)).unwrap();
        run(nav, &input(ALIGNED, 100.0, 150.0), 8);
        nav.proc(&input(ALIGNED, 100.0, 150.0)).unwrap();
        assert_eq!(nav.state().phase, NavPhase::Moving);
    }

    #[test]
    fn test_no_destination_is_noop() {
        let (mut nav, log) = nav();

        let (out, rpt) = nav.proc(&input(MISALIGNED, 10.0, 10.0)).unwrap();

        assert_eq!(out, OutputData::default());
        assert_eq!(rpt.phase, NavPhase::Idle);
        assert!(log.borrow().sent.is_empty());
    }

    #[test]
    fn test_no_target_is_noop() {
        let (mut nav, log) = nav();
        nav.set_destination(Point2::new(100.0, 300.0)).unwrap();

        for _ in 0..5 {
            nav.proc(&InputData::default()).unwrap();
        }

        assert_eq!(nav.state().phase, NavPhase::CommandTurn);
        assert_eq!(nav.state().counter, 0);
        assert!(log.borrow().sent.is_empty());
    }

    #[test]
    fn test_aligned_skips_pivot() {
        // Target at (100, 100) with its axis vertical, destination straight below
        let (mut nav, log) = nav();
        let dest = Point2::new(100.0, 300.0);
        let center = Point2::new(100.0, 100.0);
        nav.set_destination(dest).unwrap();

        let diff = super::super::geometry::angle_difference(0.0, &center, &dest);
        let (out, _) = nav.proc(&input(diff, center.x, center.y)).unwrap();

        assert_eq!(nav.state().phase, NavPhase::DetermineMoving);
        assert_eq!(out.sent, None);
        assert!(log.borrow().sent.is_empty());
    }

    #[test]
    fn test_near_180_is_aligned() {
        let (mut nav, log) = nav();
        nav.set_destination(Point2::new(0.0, 0.0)).unwrap();

        nav.proc(&input(-175.0, 100.0, 100.0)).unwrap();

        assert_eq!(nav.state().phase, NavPhase::DetermineMoving);
        assert!(log.borrow().sent.is_empty());
    }

    #[test]
    fn test_turning_limit() {
        let (mut nav, log) = nav();
        nav.set_destination(Point2::new(0.0, 0.0)).unwrap();
        let inp = input(MISALIGNED, 100.0, 100.0);

        let (out, _) = nav.proc(&inp).unwrap();
        assert_eq!(out.sent, Some(RcDir::UpLeft));
        assert_eq!(nav.state().phase, NavPhase::Turning);
        assert_eq!(nav.state().pivot_dir, PivotDir::Left);

        run(&mut nav, &inp, 9);
        assert_eq!(nav.state().phase, NavPhase::Turning);
        assert_eq!(nav.state().counter, 9);
        assert!(nav.cmd_active());

        let (out, _) = nav.proc(&inp).unwrap();
        assert_eq!(nav.state().phase, NavPhase::CommandCorrect);
        assert_eq!(out.stopped, Some(RcDir::UpLeft));
        assert!(!nav.cmd_active());
        assert_eq!(log.borrow().open, 0);
    }

    #[test]
    fn test_correcting_limit() {
        let (mut nav, log) = nav();
        nav.set_destination(Point2::new(0.0, 0.0)).unwrap();
        let inp = input(MISALIGNED, 100.0, 100.0);

        // Command Turn, ten turning ticks, then Command Correct
        run(&mut nav, &inp, 11);
        let (out, _) = nav.proc(&inp).unwrap();
        assert_eq!(out.sent, Some(RcDir::DownRight));
        assert_eq!(nav.state().phase, NavPhase::Correcting);
        assert_eq!(nav.state().pivot_dir, PivotDir::Right);

        run(&mut nav, &inp, 13);
        assert_eq!(nav.state().phase, NavPhase::Correcting);

        nav.proc(&inp).unwrap();
        assert_eq!(nav.state().phase, NavPhase::CommandTurn);
        assert_eq!(nav.state().pivot_attempts, 1);
        assert!(!nav.cmd_active());

        // The loop carries on with the first pivot again
        nav.proc(&inp).unwrap();
        assert_eq!(nav.state().phase, NavPhase::Turning);
        assert_eq!(
            log.borrow().sent,
            vec![RcDir::UpLeft, RcDir::DownRight, RcDir::UpLeft]
        );
    }

    #[test]
    fn test_alignment_while_pivoting() {
        let (mut nav, log) = nav();
        nav.set_destination(Point2::new(0.0, 0.0)).unwrap();

        run(&mut nav, &input(MISALIGNED, 100.0, 100.0), 4);
        let (out, _) = nav.proc(&input(ALIGNED, 100.0, 100.0)).unwrap();

        assert_eq!(nav.state().phase, NavPhase::DetermineMoving);
        assert_eq!(out.stopped, Some(RcDir::UpLeft));
        assert_eq!(log.borrow().stopped, vec![RcDir::UpLeft]);
        assert_eq!(log.borrow().open, 0);
    }

    #[test]
    fn test_max_pivot_attempts() {
        let params = Params {
            max_pivot_attempts: Some(1),
            ..Default::default()
        };
        let (mut nav, log) = nav_with(params);
        nav.set_destination(Point2::new(0.0, 0.0)).unwrap();
        let inp = input(MISALIGNED, 100.0, 100.0);

        // One full turn and correct cycle
        run(&mut nav, &inp, 1 + 10 + 1 + 14);
        assert_eq!(nav.state().phase, NavPhase::CommandTurn);

        nav.proc(&inp).unwrap();
        assert_eq!(nav.state().phase, NavPhase::DetermineMoving);
        assert_eq!(log.borrow().sent.len(), 2);
    }

    #[test]
    fn test_probe_keeps_direction_when_closer() {
        let (mut nav, log) = nav();
        nav.set_destination(Point2::new(100.0, 1000.0)).unwrap();

        nav.proc(&input(ALIGNED, 100.0, 100.0)).unwrap();
        let (out, rpt) = nav.proc(&input(ALIGNED, 100.0, 100.0)).unwrap();
        assert_eq!(out.sent, Some(RcDir::Forward));
        assert_eq!(rpt.phase, NavPhase::DetermineMovingWaiting);
        assert_eq!(rpt.prev_dist_px, Some(900.0));

        run(&mut nav, &input(ALIGNED, 100.0, 120.0), 7);
        assert_eq!(nav.state().phase, NavPhase::DetermineMovingWaiting);

        let (out, _) = nav.proc(&input(ALIGNED, 100.0, 120.0)).unwrap();
        assert_eq!(nav.state().phase, NavPhase::CommandMove);
        assert_eq!(nav.state().move_dir, MoveDir::Forward);
        assert_eq!(out.stopped, Some(RcDir::Forward));
        assert_eq!(log.borrow().open, 0);
    }

    #[test]
    fn test_probe_flips_when_not_closer() {
        let (mut nav, log) = nav();
        nav.set_destination(Point2::new(100.0, 1000.0)).unwrap();

        nav.proc(&input(ALIGNED, 100.0, 100.0)).unwrap();
        nav.proc(&input(ALIGNED, 100.0, 100.0)).unwrap();

        // Equal distance counts as no progress
        run(&mut nav, &input(ALIGNED, 100.0, 100.0), 8);
        assert_eq!(nav.state().phase, NavPhase::CommandMove);
        assert_eq!(nav.state().move_dir, MoveDir::Backward);

        let (out, _) = nav.proc(&input(ALIGNED, 100.0, 100.0)).unwrap();
        assert_eq!(out.sent, Some(RcDir::Backward));
        assert_eq!(nav.state().phase, NavPhase::Moving);
        assert_eq!(log.borrow().sent, vec![RcDir::Forward, RcDir::Backward]);
    }

    #[test]
    fn test_moving_brake_distance() {
        let (mut nav, _log) = nav();
        into_moving(&mut nav);

        // Destination at (100, 1000), 201 px away
        run(&mut nav, &input(ALIGNED, 100.0, 799.0), 3);
        assert_eq!(nav.state().phase, NavPhase::Moving);
        assert!(nav.cmd_active());

        // 200 px is not below the braking distance
        nav.proc(&input(ALIGNED, 100.0, 800.0)).unwrap();
        assert_eq!(nav.state().phase, NavPhase::Moving);

        let (out, _) = nav.proc(&input(ALIGNED, 100.0, 801.0)).unwrap();
        assert_eq!(nav.state().phase, NavPhase::CommandBrake);
        assert_eq!(out.stopped, Some(RcDir::Forward));
        assert!(!nav.cmd_active());
    }

    #[test]
    fn test_moving_ignores_alignment() {
        let (mut nav, _log) = nav();
        into_moving(&mut nav);

        run(&mut nav, &input(MISALIGNED, 100.0, 300.0), 20);
        assert_eq!(nav.state().phase, NavPhase::Moving);
    }

    #[test]
    fn test_braking_and_done() {
        let (mut nav, log) = nav();
        into_moving(&mut nav);
        let near = input(ALIGNED, 100.0, 850.0);

        nav.proc(&near).unwrap();
        let (out, _) = nav.proc(&near).unwrap();
        assert_eq!(out.sent, Some(RcDir::Backward));
        assert_eq!(nav.state().phase, NavPhase::Braking);

        run(&mut nav, &near, 5);
        assert_eq!(nav.state().phase, NavPhase::Braking);

        let (out, _) = nav.proc(&near).unwrap();
        assert_eq!(nav.state().phase, NavPhase::Done);
        assert_eq!(out.stopped, Some(RcDir::Backward));

        // Done stays quiet
        run(&mut nav, &near, 10);
        assert_eq!(nav.state().phase, NavPhase::Done);
        assert_eq!(
            log.borrow().sent,
            vec![RcDir::Forward, RcDir::Forward, RcDir::Backward]
        );
        assert_eq!(log.borrow().open, 0);
    }

    #[test]
    fn test_single_handle_and_stop_before_exit() {
        let (mut nav, log) = nav();
        nav.set_destination(Point2::new(100.0, 1000.0)).unwrap();

        // Pivot around a few times before lining up, then move all the way in
        let mut ticks = 0;
        let mut y = 100.0;
        while nav.state().phase != NavPhase::Done && ticks < 500 {
            let diff = if ticks < 40 { MISALIGNED } else { ALIGNED };
            if ticks >= 40 {
                y += 10.0;
            }

            let before = nav.state().phase;
            nav.proc(&input(diff, 100.0, y)).unwrap();
            let after = nav.state().phase;

            // Leaving an acting phase always leaves nothing open
            if before.is_acting() && before != after {
                assert!(!nav.cmd_active());
                assert_eq!(log.borrow().open, 0);
            }
            assert_eq!(nav.cmd_active(), after.is_acting());

            ticks += 1;
        }

        assert_eq!(nav.state().phase, NavPhase::Done);
        assert_eq!(log.borrow().max_open, 1);
        assert_eq!(log.borrow().sent.len(), log.borrow().stopped.len());
    }

    #[test]
    fn test_new_destination_resets() {
        let (mut nav, log) = nav();
        nav.set_destination(Point2::new(100.0, 1000.0)).unwrap();
        nav.proc(&input(ALIGNED, 100.0, 100.0)).unwrap();
        nav.proc(&input(ALIGNED, 100.0, 100.0)).unwrap();
        run(&mut nav, &input(ALIGNED, 100.0, 100.0), 8);
        nav.proc(&input(ALIGNED, 100.0, 100.0)).unwrap();
        assert_eq!(nav.state().move_dir, MoveDir::Backward);
        assert!(nav.cmd_active());

        nav.set_destination(Point2::new(500.0, 500.0)).unwrap();

        assert!(!nav.cmd_active());
        assert_eq!(log.borrow().open, 0);
        assert_eq!(nav.state().phase, NavPhase::CommandTurn);
        assert_eq!(nav.state().counter, 0);
        assert_eq!(nav.state().move_dir, MoveDir::Forward);
        assert_eq!(nav.state().prev_dist_px, None);
        assert_eq!(nav.destination(), Some(Point2::new(500.0, 500.0)));
    }

    #[test]
    fn test_clear_and_shutdown_release() {
        let (mut nav, log) = nav();
        nav.set_destination(Point2::new(0.0, 0.0)).unwrap();
        nav.proc(&input(MISALIGNED, 100.0, 100.0)).unwrap();
        assert_eq!(log.borrow().open, 1);

        nav.clear().unwrap();
        assert_eq!(log.borrow().open, 0);
        assert_eq!(nav.state().phase, NavPhase::Idle);
        assert_eq!(nav.destination(), None);

        nav.set_destination(Point2::new(0.0, 0.0)).unwrap();
        nav.proc(&input(MISALIGNED, 100.0, 100.0)).unwrap();
        assert_eq!(log.borrow().open, 1);

        nav.shutdown();
        assert_eq!(log.borrow().open, 0);
        assert_eq!(nav.state().phase, NavPhase::Idle);
    }

    #[test]
    fn test_drop_releases_handle() {
        let (mut nav, log) = nav();
        nav.set_destination(Point2::new(0.0, 0.0)).unwrap();
        nav.proc(&input(MISALIGNED, 100.0, 100.0)).unwrap();
        assert_eq!(log.borrow().open, 1);

        drop(nav);
        assert_eq!(log.borrow().open, 0);
    }

    #[test]
    fn test_send_failure_continue() {
        let (mut nav, log) = nav();
        log.borrow_mut().fail_send = true;
        nav.set_destination(Point2::new(0.0, 0.0)).unwrap();
        let inp = input(MISALIGNED, 100.0, 100.0);

        let (out, rpt) = nav.proc(&inp).unwrap();
        assert_eq!(nav.state().phase, NavPhase::Turning);
        assert_eq!(out.sent, Some(RcDir::UpLeft));
        assert!(rpt.cmd_active);

        // Timing carries on as if the pivot was running
        run(&mut nav, &inp, 10);
        assert_eq!(nav.state().phase, NavPhase::CommandCorrect);
        assert!(!nav.cmd_active());
    }

    #[test]
    fn test_send_failure_abort() {
        let params = Params {
            actuator_failure_policy: ActuatorFailurePolicy::Abort,
            ..Default::default()
        };
        let (mut nav, log) = nav_with(params);
        log.borrow_mut().fail_send = true;
        nav.set_destination(Point2::new(0.0, 0.0)).unwrap();

        let result = nav.proc(&input(MISALIGNED, 100.0, 100.0));

        assert!(matches!(result, Err(NavCtrlError::ActuatorError(_))));
        assert_eq!(nav.state().phase, NavPhase::CommandTurn);
        assert!(!nav.cmd_active());
    }

    #[test]
    fn test_stop_failure_abort() {
        let params = Params {
            actuator_failure_policy: ActuatorFailurePolicy::Abort,
            ..Default::default()
        };
        let (mut nav, log) = nav_with(params);
        nav.set_destination(Point2::new(0.0, 0.0)).unwrap();
        nav.proc(&input(MISALIGNED, 100.0, 100.0)).unwrap();

        log.borrow_mut().fail_stop = true;
        let result = nav.proc(&input(ALIGNED, 100.0, 100.0));

        assert!(matches!(result, Err(NavCtrlError::ActuatorError(_))));
        // The handle is released even though stopping it failed
        assert!(!nav.cmd_active());
        assert_eq!(log.borrow().open, 0);
    }

    #[test]
    fn test_stop_failure_continue() {
        let (mut nav, log) = nav();
        nav.set_destination(Point2::new(0.0, 0.0)).unwrap();
        nav.proc(&input(MISALIGNED, 100.0, 100.0)).unwrap();

        log.borrow_mut().fail_stop = true;
        nav.proc(&input(ALIGNED, 100.0, 100.0)).unwrap();

        assert_eq!(nav.state().phase, NavPhase::DetermineMoving);
        assert!(!nav.cmd_active());
    }

    #[test]
    fn test_no_actuator() {
        let mut nav = NavCtrl::default();
        nav.set_destination(Point2::new(0.0, 0.0)).unwrap();

        let result = nav.proc(&input(MISALIGNED, 100.0, 100.0));

        assert!(matches!(result, Err(NavCtrlError::NoActuator)));
    }

    #[test]
    fn test_report_tracks_state() {
        let (mut nav, _log) = nav();
        nav.set_destination(Point2::new(100.0, 300.0)).unwrap();

        let (_, rpt) = nav.proc(&input(MISALIGNED, 100.0, 100.0)).unwrap();

        assert_eq!(rpt.phase, NavPhase::Turning);
        assert_eq!(rpt.dist_px, Some(200.0));
        assert_eq!(rpt.angle_diff_deg, Some(MISALIGNED));
        assert_eq!(rpt.prev_angle_deg, Some(MISALIGNED));
        assert!(rpt.cmd_active);
        assert_eq!(rpt.cmd_dir, Some(RcDir::UpLeft));
    }
}
