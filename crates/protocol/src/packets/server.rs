//! Server -> Client messages.

use serde::{Deserialize, Serialize};

use super::ServerOp;
use crate::ProtocolError;

/// Another user's position as reported to a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Peer {
    pub id: String,
    pub lat: f64,
    pub lng: f64,
}

/// A message sent from the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op")]
pub enum ServerMessage {
    /// Users around the requester, the requester excluded.
    #[serde(rename = "sNearby")]
    Nearby { nearby: Vec<Peer> },
    /// A user moved to a position within range of the receiver.
    #[serde(rename = "sMoved")]
    Moved { id: String, lat: f64, lng: f64 },
    /// A user that was within range has moved out of it.
    #[serde(rename = "sDeparted")]
    Departed { id: String },
    /// Protocol error; the server closes the connection after sending it.
    #[serde(rename = "sError")]
    Error { reason: String },
}

impl ServerMessage {
    /// The operation this message carries.
    pub fn op(&self) -> ServerOp {
        match self {
            ServerMessage::Nearby { .. } => ServerOp::Nearby,
            ServerMessage::Moved { .. } => ServerOp::Moved,
            ServerMessage::Departed { .. } => ServerOp::Departed,
            ServerMessage::Error { .. } => ServerOp::Error,
        }
    }

    /// Encode as a JSON text frame.
    pub fn to_json(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode a server frame, as a client would.
    pub fn from_json(text: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(text)?)
    }
}
