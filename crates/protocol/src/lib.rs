//! Shared protocol crate for the location server.
//!
//! This crate contains:
//! - Client -> server message parsing and validation
//! - Server -> client message definitions
//! - Coordinate limits shared by both sides

mod error;
pub mod packets;

pub use error::ProtocolError;
pub use packets::{ClientMessage, ClientOp, Peer, ServerMessage, ServerOp};

/// Largest valid latitude magnitude, in degrees.
pub const MAX_LAT: f64 = 90.0;

/// Largest valid longitude magnitude, in degrees.
pub const MAX_LNG: f64 = 180.0;

/// Longest user id accepted at registration.
pub const MAX_ID_LEN: usize = 64;
