//! RC tracker executable
//!
//! Each cycle grabs a frame, applies the operator's telecommands, tracks the selected marker,
//! steps navigation towards the destination, then archives and renders the overlay. Cyclic
//! modules such as `nav_ctrl` implement `util::module::State`.

// ---------------------------------------------------------------------------
// USE MODULES FROM LIBRARY
// ---------------------------------------------------------------------------

use comms_if::net::zmq;
use tracker_lib::{
    actuator::{Actuator, ActuatorKind, DryRun, RcClient},
    cam::{self, CamError, FrameSource},
    data_store::DataStore,
    nav_ctrl::{self, geometry, NavTarget},
    overlay::{self, OverlayData, OverlaySaver},
    params::TrackerExecParams,
    tc_client::{TcClient, TcClientError},
};

mod tc_processor;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{eyre::{eyre, WrapErr}, Report};
use log::{debug, error, info, warn};
use std::{
    path::PathBuf,
    thread,
    time::{Duration, Instant},
};
use structopt::StructOpt;

// Internal
use util::{
    archive::Archived,
    host,
    logger::{logger_init, LevelFilter},
    module::State,
    script_interpreter::{PendingTcs, ScriptInterpreter},
    session::Session,
};

// ---------------------------------------------------------------------------
// STRUCTS
// ---------------------------------------------------------------------------

/// Track a coloured marker on an RC vehicle and drive it to an operator chosen point.
#[derive(Debug, StructOpt)]
#[structopt(name = "tracker_exec")]
struct Opts {
    /// Telecommand script to run. If not given telecommands are received from the remote
    /// TcClient.
    #[structopt(parse(from_os_str))]
    script: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Where operator telecommands come from.
enum TcSource {
    Remote(TcClient),
    Script(ScriptInterpreter)
}

/// Reason the main loop ended without an error.
#[derive(Debug)]
enum LoopExit {
    Quit,
    EndOfScript,
    EndOfFrames,
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

fn main() -> Result<(), Report> {

    // ---- EARLY INITIALISATION ----

    color_eyre::install()?;

    let opts = Opts::from_args();

    let session = Session::new(
        "tracker_exec",
        "sessions"
    ).wrap_err("Failed to create the session")?;

    logger_init(LevelFilter::Debug, &session)
        .wrap_err("Failed to initialise logging")?;

    info!("RC tracker exec starting\n");
    info!("Running on: {}", host::get_host_info());
    info!("Session directory: {:?}\n", session.session_root);

    // ---- LOAD PARAMETERS ----

    let params: TrackerExecParams = util::params::load("tracker_exec.toml")
        .wrap_err("Could not load tracker_exec params")?;

    info!("Exec parameters loaded");

    // ---- INITIALISE NETWORK ----

    let zmq_ctx = zmq::Context::new();

    // ---- INITIALISE TC SOURCE ----

    let mut tc_source = match opts.script {
        Some(ref path) => {
            info!("Loading script from {:?}", path);

            let si = ScriptInterpreter::new(path)
                .wrap_err("Failed to load script")?;

            info!(
                "Loaded script lasts {:.02} s and contains {} TCs\n",
                si.get_duration(),
                si.get_num_tcs()
            );

            TcSource::Script(si)
        },
        None => {
            info!("No script given, waiting for operator TCs on {}\n", params.net.tc_endpoint);

            TcSource::Remote(
                TcClient::new(&zmq_ctx, &params.net)
                    .wrap_err("Failed to initialise the TcClient")?
            )
        }
    };

    // ---- INITIALISE EQUIPMENT ----

    let mut frame_source = cam::open(&params.cam)
        .wrap_err("Failed to open the frame source")?;
    info!("Frame source initialised");

    let actuator: Box<dyn Actuator> = match params.actuator_kind {
        ActuatorKind::RcClient => Box::new(
            RcClient::new(&zmq_ctx, &params.net, &params.rc_client)
                .wrap_err("Failed to initialise the RcClient")?
        ),
        ActuatorKind::DryRun => {
            warn!("DryRun actuator in use, commands will not reach the vehicle");
            Box::new(DryRun::default())
        }
    };
    info!("Actuator initialised: {:?}", params.actuator_kind);

    // ---- INITIALISE MODULES ----

    info!("Initialising modules...");

    let mut ds = DataStore::default();

    ds.target_est = tracker_lib::target_est::TargetEstimator::with_cam_shift(
        params.target_est.clone()
    );

    ds.nav_ctrl.init(
        nav_ctrl::InitData {
            params_file: "nav_ctrl.toml",
            actuator,
        },
        &session
    ).wrap_err("Failed to initialise NavCtrl")?;
    info!("NavCtrl init complete");

    let overlay_saver = OverlaySaver::new(&session, params.overlay_save_period_cycles)
        .wrap_err("Failed to initialise the overlay saver")?;

    info!("Module initialisation complete\n");

    // ---- MAIN LOOP ----

    info!("Entering main loop\n");

    let result = run(
        &params,
        &mut ds,
        &mut tc_source,
        frame_source.as_mut(),
        &overlay_saver
    );

    // ---- SHUTDOWN ----

    // Whatever ended the loop, no command may be left running
    ds.nav_ctrl.shutdown();

    match result {
        Ok(exit) => {
            info!("Main loop ended: {:?}", exit);
            info!("End of execution");
            Ok(())
        },
        Err(e) => {
            error!("Main loop failed: {:#}", e);
            Err(e)
        }
    }
}

/// Run the cyclic executive until the session ends.
fn run(
    params: &TrackerExecParams,
    ds: &mut DataStore,
    tc_source: &mut TcSource,
    frame_source: &mut dyn FrameSource,
    overlay_saver: &OverlaySaver
) -> Result<LoopExit, Report> {
    let cycle_period = Duration::from_secs_f64(params.cycle_period_s);

    loop {

        let cycle_start_instant = Instant::now();

        // Clear items that need wiping at the start of the cycle
        ds.cycle_start();

        // ---- DATA INPUT ----

        let frame = match frame_source.capture() {
            Ok(f) => f,
            Err(CamError::EndOfSequence) => return Ok(LoopExit::EndOfFrames),
            Err(e) => return Err(e).wrap_err("Frame capture failed")
        };
        ds.frame = Some(frame);

        // ---- TELECOMMAND PROCESSING ----

        match tc_source {
            TcSource::Remote(client) => loop {
                match client.recv_tc() {
                    Ok(Some(tc)) => {
                        let response = tc_processor::exec(ds, &tc)
                            .wrap_err("Failed to execute TC")?;

                        if let Err(e) = client.send_response(response) {
                            warn!("Could not respond to TC: {}", e);
                        }
                    },
                    Ok(None) => break,
                    Err(TcClientError::NotConnected) => break,
                    Err(e @ TcClientError::TcParseError(_))
                    | Err(e @ TcClientError::NonUtf8Tc) => {
                        warn!("{}", e);
                        break;
                    },
                    Err(e) => return Err(e)
                        .wrap_err("An error occured while receiving TCs from the server")
                }
            },

            TcSource::Script(si) => match si.get_pending_tcs() {
                PendingTcs::None => (),
                PendingTcs::Some(tc_vec) => {
                    for tc in &tc_vec {
                        let response = tc_processor::exec(ds, tc)
                            .wrap_err("Failed to execute TC")?;
                        debug!("Scripted TC {:?}: {:?}", tc, response);
                    }
                },
                PendingTcs::EndOfScript => {
                    info!("Script finished");
                    return Ok(LoopExit::EndOfScript);
                }
            }
        };

        if ds.quit_requested {
            return Ok(LoopExit::Quit);
        }

        // ---- TARGET ESTIMATION ----

        let frame = ds.frame.as_ref()
            .ok_or_else(|| eyre!("No frame in the data store"))?;

        if let Some(selection) = ds.pending_selection.take() {
            match ds.target_est.start_tracking(frame, selection) {
                Ok(()) => (),
                Err(e) => warn!("Could not start tracking: {}", e)
            }
        }

        ds.target = ds.target_est.estimate(frame);

        // ---- NAVIGATION ----

        if let (Some(te), Some(dest)) = (ds.target, ds.nav_ctrl.destination()) {
            let angle_diff_deg = geometry::angle_difference(te.orientation_deg, &te.center, &dest);

            ds.angle_diff_deg = Some(angle_diff_deg);
            ds.nav_ctrl_input.target = Some(NavTarget {
                angle_diff_deg,
                center: te.center,
            });
        }

        let (output, report) = ds.nav_ctrl.proc(&ds.nav_ctrl_input)
            .wrap_err("NavCtrl processing failed")?;
        ds.nav_ctrl_output = output;
        ds.nav_status_rpt = report;

        // ---- WRITE ARCHIVES ----

        if let Err(e) = ds.nav_ctrl.write() {
            warn!("Could not archive NavCtrl: {}", e);
        }

        // ---- OVERLAY ----

        if let Some(ref frame) = ds.frame {
            let rendered = overlay::render(frame, &OverlayData {
                target: ds.target,
                destination: ds.nav_ctrl.destination(),
                selection_preview: ds.selection_preview,
            });

            if let Err(e) = overlay_saver.save_if_due(ds.num_cycles, &rendered) {
                warn!("Could not save overlay: {}", e);
            }
        }

        // ---- CYCLE MANAGEMENT ----

        let cycle_dur = cycle_start_instant.elapsed();

        match cycle_period.checked_sub(cycle_dur) {
            Some(d) => {
                ds.num_consec_cycle_overruns = 0;
                thread::sleep(d);
            },
            None => {
                warn!(
                    "Cycle overran by {:.06} s",
                    cycle_dur.as_secs_f64() - cycle_period.as_secs_f64()
                );
                ds.num_consec_cycle_overruns += 1;

                if let Some(max) = params.max_consec_cycle_overruns {
                    if ds.num_consec_cycle_overruns > max {
                        return Err(eyre!("More than {} consecutive cycle overruns", max));
                    }
                }
            }
        }

        ds.num_cycles += 1;
    }
}

