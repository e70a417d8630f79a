//! # TM Server
//!
//! Publishes the vehicle data telemetry to any number of subscribers.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::{
    net::{open_socket, zmq, NetError, NetParams, SocketOptions},
    tm::VehicleData,
};

use crate::app::VehicleDataSink;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Telemetry server
pub struct TmServer {
    socket: zmq::Socket
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum TmServerError {
    #[error("Socket error: {0}")]
    SocketError(NetError),

    #[error("Could not send telemetry: {0}")]
    SendError(zmq::Error),

    #[error("Could not serialize the telemetry: {0}")]
    SerializationError(serde_json::Error),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl TmServer {
    /// Create a new instance of the TM Server.
    ///
    /// This function will not block until a client connects.
    pub fn new(ctx: &zmq::Context, params: &NetParams) -> Result<Self, TmServerError> {
        let socket_options = SocketOptions {
            bind: true,
            linger: 1,
            send_timeout: 0,
            ..Default::default()
        };

        let socket = open_socket(
            ctx,
            zmq::PUB,
            &socket_options,
            &params.tm_endpoint
        ).map_err(TmServerError::SocketError)?;

        Ok(Self {
            socket
        })
    }

    /// Send the vehicle data to all subscribers.
    pub fn send(&mut self, data: &VehicleData) -> Result<(), TmServerError> {
        let packet_string = serde_json::to_string(data)
            .map_err(TmServerError::SerializationError)?;

        self.socket.send(packet_string.as_str(), zmq::DONTWAIT)
            .map_err(TmServerError::SendError)
    }
}

impl VehicleDataSink for TmServer {
    fn send_vehicle_data(&mut self, data: &VehicleData) -> Result<(), TmServerError> {
        self.send(data)
    }
}
