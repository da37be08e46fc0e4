//! # Telecommand Client
//!
//! Receives operator telecommands from a remote UI over a REP socket. Each received TC must be
//! answered with a [`TcResponse`] before the next one can be received.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::{
    net::{zmq, MonitoredSocket, MonitoredSocketError, NetParams, SocketOptions},
    tc::{Tc, TcParseError, TcResponse},
};
use log::warn;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Operator telecommand endpoint.
pub struct TcClient {
    socket: MonitoredSocket
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum TcClientError {
    #[error("Socket error: {0}")]
    SocketError(MonitoredSocketError),

    #[error("No operator station is connected")]
    NotConnected,

    #[error("Could not send the TC response: {0}")]
    SendError(zmq::Error),

    #[error("Could not receive a TC: {0}")]
    RecvError(zmq::Error),

    #[error("Could not serialize the TC response: {0}")]
    SerializationError(serde_json::Error),

    #[error("Received an invalid TC: {0}")]
    TcParseError(TcParseError),

    #[error("Received a TC which is not valid UTF-8")]
    NonUtf8Tc
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl TcClient {
    /// Bind the TC endpoint. Does not wait for an operator station to connect.
    pub fn new(ctx: &zmq::Context, params: &NetParams) -> Result<Self, TcClientError> {
        let options = SocketOptions {
            bind: true,
            block_on_first_connect: false,
            heartbeat_interval_ms: 500,
            heartbeat_ttl_ms: 1000,
            heartbeat_timeout_ms: 1000,
            linger_ms: 1,
            // Short timeouts so an idle link never stalls the cycle
            recv_timeout_ms: 10,
            send_timeout_ms: 10,
            ..Default::default()
        };

        let socket = MonitoredSocket::new(ctx, zmq::REP, options, &params.tc_endpoint)
            .map_err(TcClientError::SocketError)?;

        Ok(Self { socket })
    }

    pub fn is_connected(&self) -> bool {
        self.socket.connected()
    }

    /// Take the next waiting TC, `Ok(None)` once none are waiting.
    ///
    /// Every TC returned must be answered with [`TcClient::send_response`] before the next call.
    /// Unreadable TCs are answered with `Invalid` here and reported as an error.
    pub fn recv_tc(&self) -> Result<Option<Tc>, TcClientError> {
        if !self.is_connected() {
            return Err(TcClientError::NotConnected);
        }

        let raw = match self.socket.recv_string(0) {
            Ok(raw) => raw,
            Err(zmq::Error::EAGAIN) => return Ok(None),
            Err(e) => return Err(TcClientError::RecvError(e))
        };

        let parsed = match raw {
            Ok(json) => Tc::from_json(&json).map_err(TcClientError::TcParseError),
            Err(_) => Err(TcClientError::NonUtf8Tc)
        };

        if parsed.is_err() {
            if let Err(e) = self.send_response(TcResponse::Invalid) {
                warn!("Could not reject the invalid TC: {}", e);
            }
        }

        parsed.map(Some)
    }

    /// Answer the last received TC.
    pub fn send_response(&self, response: TcResponse) -> Result<(), TcClientError> {
        let json = serde_json::to_string(&response)
            .map_err(TcClientError::SerializationError)?;

        self.socket.send(json.as_str(), 0).map_err(TcClientError::SendError)
    }
}
