//! # Setpoint Client
//!
//! Receives speed setpoint commands from a remote client.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::net::{open_socket, zmq, NetError, NetParams, SocketOptions};

use crate::app::SetpointSource;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Speed setpoint client
pub struct SetpointClient {
    socket: zmq::Socket
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum SetpointClientError {
    #[error("Socket error: {0}")]
    SocketError(NetError),

    #[error("Could not receive a message from the server: {0}")]
    RecvError(zmq::Error),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl SetpointClient {
    /// Create a new instance of the setpoint client.
    ///
    /// This function will not block until the server connects.
    pub fn new(ctx: &zmq::Context, params: &NetParams) -> Result<Self, SetpointClientError> {
        let socket_options = SocketOptions {
            linger: 1,
            recv_timeout: 0,
            ..Default::default()
        };

        let socket = open_socket(
            ctx,
            zmq::SUB,
            &socket_options,
            &params.setpoint_endpoint
        ).map_err(SetpointClientError::SocketError)?;

        Ok(Self {
            socket
        })
    }

    /// Receive the payload of a single pending setpoint message.
    ///
    /// Returns `Ok(None)` if no message is pending. The payload isn't checked here, that's up to
    /// the caller.
    pub fn receive(&mut self) -> Result<Option<Vec<u8>>, SetpointClientError> {
        match self.socket.recv_bytes(zmq::DONTWAIT) {
            Ok(b) => Ok(Some(b)),
            Err(zmq::Error::EAGAIN) => Ok(None),
            Err(e) => Err(SetpointClientError::RecvError(e))
        }
    }
}

impl SetpointSource for SetpointClient {
    fn recv_setpoint(&mut self) -> Result<Option<Vec<u8>>, SetpointClientError> {
        self.receive()
    }
}
