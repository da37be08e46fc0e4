//! # RC transmitter client
//!
//! Sends direction demands to the RC transmitter server. A command is kept alive by a background
//! thread which repeats the demand every pulse period until its handle is stopped, at which point
//! a `Stop` demand releases the channels.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{
    sync::{
        mpsc::{channel, RecvTimeoutError, Sender},
        Arc, Mutex,
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use comms_if::{
    eqpt::rc::{RcDems, RcDemsResponse, RcDir},
    net::{zmq, MonitoredSocket, MonitoredSocketError, NetParams, SocketOptions},
};
use log::{debug, trace, warn};
use serde::Deserialize;

use super::{Actuator, ActuatorError, CmdHandle};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Parameters for the [`RcClient`].
#[derive(Debug, Clone, Deserialize)]
pub struct RcClientParams {
    /// Period at which an active demand is repeated to the server.
    pub pulse_period_ms: u64,

    /// Maximum time to wait for the server to acknowledge a demand.
    pub response_timeout_ms: i32,
}

pub struct RcClient {
    dems_socket: Arc<Mutex<MonitoredSocket>>,

    pulse_period: Duration,
}

/// A command currently being pulsed by the [`RcClient`].
pub struct RcCmdHandle {
    dir: RcDir,

    dems_socket: Arc<Mutex<MonitoredSocket>>,

    stop_sender: Option<Sender<()>>,

    pulse_thread: Option<JoinHandle<()>>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(thiserror::Error, Debug)]
pub enum RcClientError {
    #[error("Socket error: {0}")]
    SocketError(MonitoredSocketError),

    #[error("The client is not connected to the server")]
    NotConnected,

    #[error("Could not send demands to the server: {0}")]
    SendError(zmq::Error),

    #[error("Could not recieve a message from the server: {0}")]
    RecvError(zmq::Error),

    #[error("Could not serialize the data: {0}")]
    SerializationError(serde_json::Error),

    #[error("Could not deserialize the response from the server: {0}")]
    DeserializeError(serde_json::Error),

    #[error("The server rejected the demands: {0:?}")]
    DemsRejected(RcDemsResponse),

    #[error("The socket lock was poisoned by a panicking pulse thread")]
    LockPoisoned,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl RcClient {
    /// Create a new instance of the RC client.
    pub fn new(
        ctx: &zmq::Context,
        net_params: &NetParams,
        params: &RcClientParams
    ) -> Result<Self, RcClientError> {
        let dems_socket_options = SocketOptions {
            connect_timeout_ms: 1000,
            heartbeat_interval_ms: 500,
            heartbeat_ttl_ms: 1000,
            heartbeat_timeout_ms: 1000,
            linger_ms: 1,
            recv_timeout_ms: params.response_timeout_ms,
            send_timeout_ms: params.response_timeout_ms,
            req_correlate: true,
            req_relaxed: true,
            ..Default::default()
        };

        let dems_socket = MonitoredSocket::new(
            ctx,
            zmq::REQ,
            dems_socket_options,
            &net_params.rc_dems_endpoint
        ).map_err(RcClientError::SocketError)?;

        Ok(Self {
            dems_socket: Arc::new(Mutex::new(dems_socket)),
            pulse_period: Duration::from_millis(params.pulse_period_ms),
        })
    }
}

impl Actuator for RcClient {
    fn send(&mut self, dir: RcDir) -> Result<Box<dyn CmdHandle>, ActuatorError> {
        // The first demand is sent synchronously so that failures are reported to the caller
        {
            let socket = self.dems_socket.lock().map_err(|_| RcClientError::LockPoisoned)?;
            send_demands(&socket, &RcDems::new(dir))?;
        }

        let (stop_sender, stop_receiver) = channel::<()>();
        let socket = self.dems_socket.clone();
        let period = self.pulse_period;

        let pulse_thread = thread::spawn(move || {
            loop {
                match stop_receiver.recv_timeout(period) {
                    Err(RecvTimeoutError::Timeout) => (),
                    // Stop requested or the handle was dropped
                    _ => break,
                }

                let result = match socket.lock() {
                    Ok(s) => send_demands(&s, &RcDems::new(dir)),
                    Err(_) => Err(RcClientError::LockPoisoned),
                };

                if let Err(e) = result {
                    warn!("Could not repeat the {} demand: {}", dir, e);
                }
            }
            trace!("Pulse thread for {} exited", dir);
        });

        debug!("RcClient started {}", dir);

        Ok(Box::new(RcCmdHandle {
            dir,
            dems_socket: self.dems_socket.clone(),
            stop_sender: Some(stop_sender),
            pulse_thread: Some(pulse_thread),
        }))
    }
}

impl CmdHandle for RcCmdHandle {
    fn dir(&self) -> RcDir {
        self.dir
    }

    fn stop(&mut self) -> Result<(), ActuatorError> {
        let stop_sender = match self.stop_sender.take() {
            Some(s) => s,
            None => return Ok(()),
        };

        // Wake the pulse thread and wait for it so no repeat can land after the stop demand
        stop_sender.send(()).ok();
        if let Some(jh) = self.pulse_thread.take() {
            jh.join().ok();
        }

        let socket = self.dems_socket.lock().map_err(|_| RcClientError::LockPoisoned)?;
        send_demands(&socket, &RcDems::new(RcDir::Stop))?;

        debug!("RcClient stopped {}", self.dir);

        Ok(())
    }
}

impl Drop for RcCmdHandle {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            warn!("Could not stop {} while dropping its handle: {}", self.dir, e);
        }
    }
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Send demands to the server and wait for its acknowledgement.
fn send_demands(socket: &MonitoredSocket, demands: &RcDems) -> Result<(), RcClientError> {
    if !socket.connected() {
        return Err(RcClientError::NotConnected)
    }

    let dems_str = serde_json::to_string(demands)
        .map_err(RcClientError::SerializationError)?;

    socket.send(&dems_str, 0)
        .map_err(RcClientError::SendError)?;

    let msg = socket.recv_msg(0)
        .map_err(RcClientError::RecvError)?;

    let response: RcDemsResponse = serde_json::from_str(msg.as_str().unwrap_or(""))
        .map_err(RcClientError::DeserializeError)?;

    match response {
        RcDemsResponse::DemsOk => Ok(()),
        r => Err(RcClientError::DemsRejected(r)),
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    const PARAMS: RcClientParams = RcClientParams {
        pulse_period_ms: 20,
        response_timeout_ms: 1000,
    };

    /// Transmitter server answering every demand with a fixed response and recording it.
    struct TestServer {
        endpoint: String,
        received: Arc<Mutex<Vec<RcDir>>>,
        done: Arc<AtomicBool>,
        thread: Option<JoinHandle<()>>,
    }

    impl TestServer {
        fn spawn(ctx: &zmq::Context, response: RcDemsResponse) -> Self {
            let socket = ctx.socket(zmq::REP).unwrap();
            socket.set_rcvtimeo(20).unwrap();
            socket.set_linger(0).unwrap();
            socket.bind("tcp://127.0.0.1:*").unwrap();
            let endpoint = socket.get_last_endpoint().unwrap().unwrap();

            let received = Arc::new(Mutex::new(Vec::new()));
            let done = Arc::new(AtomicBool::new(false));

            let thread_received = received.clone();
            let thread_done = done.clone();
            let thread = thread::spawn(move || {
                while !thread_done.load(Ordering::Relaxed) {
                    let msg = match socket.recv_msg(0) {
                        Ok(m) => m,
                        Err(zmq::Error::EAGAIN) => continue,
                        Err(e) => panic!("Test server recv failed: {}", e),
                    };

                    let dems: RcDems = serde_json::from_slice(&msg).unwrap();
                    thread_received.lock().unwrap().push(dems.dir);

                    socket.send(serde_json::to_string(&response).unwrap().as_str(), 0).unwrap();
                }
            });

            Self {
                endpoint,
                received,
                done,
                thread: Some(thread),
            }
        }

        fn received(&self) -> Vec<RcDir> {
            self.received.lock().unwrap().clone()
        }

        fn finish(mut self) -> Vec<RcDir> {
            self.done.store(true, Ordering::Relaxed);
            if let Some(t) = self.thread.take() {
                t.join().unwrap();
            }
            self.received()
        }
    }

    fn client(ctx: &zmq::Context, server: &TestServer) -> RcClient {
        let net = NetParams {
            rc_dems_endpoint: server.endpoint.clone(),
            tc_endpoint: String::new(),
        };

        RcClient::new(ctx, &net, &PARAMS).unwrap()
    }

    #[test]
    fn test_stop_ends_pulses() {
        let ctx = zmq::Context::new();
        let server = TestServer::spawn(&ctx, RcDemsResponse::DemsOk);
        let mut rc = client(&ctx, &server);

        let mut handle = rc.send(RcDir::Forward).unwrap();
        assert_eq!(handle.dir(), RcDir::Forward);
        thread::sleep(Duration::from_millis(100));
        handle.stop().unwrap();

        let at_stop = server.received();
        assert_eq!(at_stop.last(), Some(&RcDir::Stop));
        // The first demand plus at least one repeat
        assert!(at_stop.iter().filter(|d| **d == RcDir::Forward).count() >= 2);

        // Nothing is repeated after the stop, and stopping again sends nothing
        handle.stop().unwrap();
        thread::sleep(Duration::from_millis(60));
        assert_eq!(server.finish(), at_stop);
    }

    #[test]
    fn test_drop_stops() {
        let ctx = zmq::Context::new();
        let server = TestServer::spawn(&ctx, RcDemsResponse::DemsOk);
        let mut rc = client(&ctx, &server);

        let handle = rc.send(RcDir::UpLeft).unwrap();
        drop(handle);

        let received = server.finish();
        assert_eq!(received.first(), Some(&RcDir::UpLeft));
        assert_eq!(received.last(), Some(&RcDir::Stop));
        assert_eq!(received.iter().filter(|d| **d == RcDir::Stop).count(), 1);
    }

    #[test]
    fn test_rejected_send() {
        let ctx = zmq::Context::new();
        let server = TestServer::spawn(&ctx, RcDemsResponse::EqptInvalid);
        let mut rc = client(&ctx, &server);

        match rc.send(RcDir::Backward) {
            Err(ActuatorError::RcClientError(RcClientError::DemsRejected(r))) => {
                assert_eq!(r, RcDemsResponse::EqptInvalid)
            },
            Err(e) => panic!("Expected a rejection, got {}", e),
            Ok(_) => panic!("Expected a rejection, got a handle"),
        }

        // No pulse thread was started
        thread::sleep(Duration::from_millis(60));
        assert_eq!(server.finish(), vec![RcDir::Backward]);
    }
}
