//! Message definitions for the location protocol.
//!
//! Every frame is a JSON text object tagged by its `op` field. This module
//! contains both client->server and server->client message types.

mod client;
mod server;

pub use client::*;
pub use server::*;

use std::fmt;

/// Operations a client may send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientOp {
    /// Register a user id.
    Add,
    /// Initial location, must follow registration.
    InitLoc,
    /// Location update.
    Move,
    /// Request the list of nearby users.
    Nearby,
}

impl ClientOp {
    /// Tag used on the wire.
    pub const fn as_str(self) -> &'static str {
        match self {
            ClientOp::Add => "cAdd",
            ClientOp::InitLoc => "cInitLoc",
            ClientOp::Move => "cMove",
            ClientOp::Nearby => "cNearby",
        }
    }
}

impl fmt::Display for ClientOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operations the server may send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerOp {
    /// Result of a nearby request.
    Nearby,
    /// Another user moved within range.
    Moved,
    /// Another user moved out of range.
    Departed,
    /// Protocol error, the connection is closed afterwards.
    Error,
}

impl ServerOp {
    /// Tag used on the wire.
    pub const fn as_str(self) -> &'static str {
        match self {
            ServerOp::Nearby => "sNearby",
            ServerOp::Moved => "sMoved",
            ServerOp::Departed => "sDeparted",
            ServerOp::Error => "sError",
        }
    }
}

impl fmt::Display for ServerOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
