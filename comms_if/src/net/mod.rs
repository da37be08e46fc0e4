//! # Network Module
//!
//! ZMQ sockets used by the tracker to talk to the RC transmitter server and to the operator
//! station. Every socket is paired with a monitor so the link state can be queried without
//! attempting a send.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::{debug, trace, warn};
use serde::{Deserialize, Serialize};
use std::{
    ops::{Deref, DerefMut},
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
    thread,
};
use zmq::{Context, Socket, SocketEvent, SocketType};

pub use zmq;

// ------------------------------------------------------------------------------------------------
// STATICS
// ------------------------------------------------------------------------------------------------

/// Counter giving each monitor its own inproc endpoint.
static MONITOR_ID: AtomicUsize = AtomicUsize::new(0);

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Network endpoints used by the tracker executable, loaded from its parameter file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetParams {
    /// Endpoint of the RC transmitter server the actuator demands are sent to
    pub rc_dems_endpoint: String,

    /// Endpoint operator telecommands are received on
    pub tc_endpoint: String,
}

/// A zmq socket with a live view of its link state.
///
/// Derefs to the underlying [`Socket`] so it can be used for sending and receiving directly.
pub struct MonitoredSocket {
    socket: Socket,
    link: Arc<LinkFlags>,
}

/// Options applied to a [`MonitoredSocket`] before it connects.
///
/// Times are in milliseconds. Values follow the meaning of the matching `zmq_setsockopt` option,
/// with `-1` meaning infinite and `0` meaning immediate where zmq allows it.
#[derive(Debug, Clone)]
pub struct SocketOptions {
    /// Bind to the endpoint instead of connecting to it.
    pub bind: bool,

    /// Block in [`MonitoredSocket::new`] until the first connection is made.
    pub block_on_first_connect: bool,

    /// Only accept replies matching the last request (REQ sockets only).
    pub req_correlate: bool,

    /// Allow a new request before the previous reply arrived (REQ sockets only).
    pub req_relaxed: bool,

    pub linger_ms: i32,
    pub reconnect_interval_ms: i32,
    pub connect_timeout_ms: i32,
    pub recv_timeout_ms: i32,
    pub send_timeout_ms: i32,

    /// Heartbeat period, 0 disables heartbeats.
    pub heartbeat_interval_ms: i32,
    pub heartbeat_timeout_ms: i32,
    pub heartbeat_ttl_ms: i32,
}

/// Flags shared between a socket and its monitor thread.
#[derive(Debug, Default)]
struct LinkFlags {
    connected: AtomicBool,
    closing: AtomicBool,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(thiserror::Error, Debug)]
pub enum MonitoredSocketError {
    #[error("Error creating the socket: {0}")]
    CreateSocketError(zmq::Error),

    #[error("Error enabling monitoring for the socket: {0}")]
    MonitoringEnableError(zmq::Error),

    #[error("Could not connect the socket: {0:?}")]
    CouldNotConnect(Option<zmq::Error>),

    #[error("Could not read event from monitor socket: {0}")]
    EventReadError(zmq::Error),

    #[error("Could not set the {0} socket option: {1}")]
    SocketOptionError(&'static str, zmq::Error)
}

/// What a monitor event means for the link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LinkChange {
    Up,
    Down,
    MonitorEnded,
    Unchanged,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl MonitoredSocket {
    /// Create the socket, apply the options and connect (or bind) it to `endpoint`.
    ///
    /// If `block_on_first_connect` is set this only returns once the peer is reached, or with
    /// [`MonitoredSocketError::CouldNotConnect`] if the connection attempt fails.
    pub fn new(
        ctx: &Context,
        socket_type: SocketType,
        options: SocketOptions,
        endpoint: &str
    ) -> Result<Self, MonitoredSocketError> {
        let socket = ctx.socket(socket_type)
            .map_err(MonitoredSocketError::CreateSocketError)?;

        let monitor_endpoint = format!(
            "inproc://link_monitor_{}",
            MONITOR_ID.fetch_add(1, Ordering::Relaxed)
        );
        socket.monitor(&monitor_endpoint, SocketEvent::ALL as i32)
            .map_err(MonitoredSocketError::MonitoringEnableError)?;
        let monitor = ctx.socket(zmq::PAIR)
            .map_err(MonitoredSocketError::CreateSocketError)?;
        monitor.connect(&monitor_endpoint)
            .map_err(|e| MonitoredSocketError::CouldNotConnect(Some(e)))?;

        options.apply(&socket)?;

        let attached = if options.bind {
            socket.bind(endpoint)
        }
        else {
            socket.connect(endpoint)
        };
        attached.map_err(|e| MonitoredSocketError::CouldNotConnect(Some(e)))?;

        let link = Arc::new(LinkFlags::default());

        if options.block_on_first_connect {
            wait_for_first_connection(&monitor)?;
            link.connected.store(true, Ordering::Relaxed);
        }

        let thread_link = link.clone();
        thread::spawn(move || watch_link(monitor, monitor_endpoint, thread_link));

        Ok(Self { socket, link })
    }

    /// True while the socket has a live peer.
    pub fn connected(&self) -> bool {
        self.link.connected.load(Ordering::Relaxed)
    }
}

impl Drop for MonitoredSocket {
    fn drop(&mut self) {
        // The monitor thread notices on its next event, closing the socket produces one
        self.link.closing.store(true, Ordering::Relaxed);
    }
}

impl Deref for MonitoredSocket {
    type Target = Socket;

    fn deref(&self) -> &Socket {
        &self.socket
    }
}

impl DerefMut for MonitoredSocket {
    fn deref_mut(&mut self) -> &mut Socket {
        &mut self.socket
    }
}

impl SocketOptions {
    /// Apply the options to a socket.
    pub fn apply(&self, socket: &Socket) -> Result<(), MonitoredSocketError> {
        fn check(name: &'static str, r: zmq::Result<()>) -> Result<(), MonitoredSocketError> {
            r.map_err(|e| MonitoredSocketError::SocketOptionError(name, e))
        }

        check("linger", socket.set_linger(self.linger_ms))?;
        check("reconnect_ivl", socket.set_reconnect_ivl(self.reconnect_interval_ms))?;
        check("connect_timeout", socket.set_connect_timeout(self.connect_timeout_ms))?;
        check("rcvtimeo", socket.set_rcvtimeo(self.recv_timeout_ms))?;
        check("sndtimeo", socket.set_sndtimeo(self.send_timeout_ms))?;
        check("heartbeat_ivl", socket.set_heartbeat_ivl(self.heartbeat_interval_ms))?;
        check("heartbeat_timeout", socket.set_heartbeat_timeout(self.heartbeat_timeout_ms))?;
        check("heartbeat_ttl", socket.set_heartbeat_ttl(self.heartbeat_ttl_ms))?;

        // The REQ options are rejected by every other socket type
        if let Ok(SocketType::REQ) = socket.get_socket_type() {
            check("req_correlate", socket.set_req_correlate(self.req_correlate))?;
            check("req_relaxed", socket.set_req_relaxed(self.req_relaxed))?;
        }

        Ok(())
    }
}

impl Default for SocketOptions {
    /// zmq's own defaults, connecting and blocking until the peer is reached.
    fn default() -> Self {
        Self {
            bind: false,
            block_on_first_connect: true,
            req_correlate: false,
            req_relaxed: false,
            linger_ms: 30_000,
            reconnect_interval_ms: 100,
            connect_timeout_ms: 0,
            recv_timeout_ms: -1,
            send_timeout_ms: -1,
            heartbeat_interval_ms: 0,
            heartbeat_timeout_ms: 0,
            heartbeat_ttl_ms: 0,
        }
    }
}

impl From<SocketEvent> for LinkChange {
    fn from(event: SocketEvent) -> Self {
        match event {
            SocketEvent::CONNECTED | SocketEvent::ACCEPTED => LinkChange::Up,
            SocketEvent::DISCONNECTED => LinkChange::Down,
            SocketEvent::MONITOR_STOPPED => LinkChange::MonitorEnded,
            _ => LinkChange::Unchanged,
        }
    }
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Read one event off a monitor socket.
///
/// The first frame holds the event id (native endian u16) and value, an optional second frame
/// holds the peer address which is discarded.
fn read_event(monitor: &Socket) -> Result<SocketEvent, zmq::Error> {
    let msg = monitor.recv_msg(0)?;

    if msg.len() < 2 {
        return Err(zmq::Error::EPROTO);
    }
    let id = u16::from_ne_bytes([msg[0], msg[1]]);

    while monitor.get_rcvmore()? {
        monitor.recv_msg(0)?;
    }

    Ok(SocketEvent::from_raw(id))
}

fn wait_for_first_connection(monitor: &Socket) -> Result<(), MonitoredSocketError> {
    loop {
        let event = read_event(monitor).map_err(MonitoredSocketError::EventReadError)?;

        match event {
            SocketEvent::CONNECTED => return Ok(()),
            SocketEvent::CONNECT_DELAYED => trace!("Connection delayed, waiting"),
            _ => return Err(MonitoredSocketError::CouldNotConnect(None))
        }
    }
}

/// Body of the monitor thread, runs until the socket is dropped or the monitor fails.
fn watch_link(monitor: Socket, endpoint: String, link: Arc<LinkFlags>) {
    while !link.closing.load(Ordering::Relaxed) {
        let event = match read_event(&monitor) {
            Ok(e) => e,
            Err(e) => {
                warn!("Link monitor {} failed: {}", endpoint, e);
                break;
            }
        };

        match LinkChange::from(event) {
            LinkChange::Up => link.connected.store(true, Ordering::Relaxed),
            LinkChange::Down => link.connected.store(false, Ordering::Relaxed),
            LinkChange::MonitorEnded => break,
            LinkChange::Unchanged => ()
        }
    }

    debug!("Link monitor {} stopped", endpoint);
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
