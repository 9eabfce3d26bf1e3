//! Protocol error types.

use thiserror::Error;

/// Errors that can occur while decoding or validating a message.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Malformed message: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Empty user id")]
    EmptyId,

    #[error("User id is {0} characters long, limit is {max}", max = crate::MAX_ID_LEN)]
    IdTooLong(usize),

    #[error("Latitude {0} outside [-90, 90]")]
    LatitudeOutOfRange(f64),

    #[error("Longitude {0} outside [-180, 180]")]
    LongitudeOutOfRange(f64),
}
