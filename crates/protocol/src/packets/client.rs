//! Client -> Server message parsing.

use serde::{Deserialize, Serialize};

use super::ClientOp;
use crate::{MAX_ID_LEN, MAX_LAT, MAX_LNG, ProtocolError};

/// Parsed client message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op")]
pub enum ClientMessage {
    /// Registration with a user id.
    #[serde(rename = "cAdd")]
    Add { id: String },
    /// First location after registration.
    #[serde(rename = "cInitLoc")]
    InitLoc { lat: f64, lng: f64 },
    /// New location.
    #[serde(rename = "cMove")]
    Move { lat: f64, lng: f64 },
    /// Nearby request, answered with the users around the sender.
    #[serde(rename = "cNearby")]
    Nearby,
}

impl ClientMessage {
    /// Parse and validate a client message from a JSON text frame.
    ///
    /// Unknown `op` tags and missing fields are reported as
    /// [`ProtocolError::Malformed`].
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let msg: ClientMessage = serde_json::from_str(text)?;
        msg.validate()?;
        Ok(msg)
    }

    /// The operation this message carries.
    pub fn op(&self) -> ClientOp {
        match self {
            ClientMessage::Add { .. } => ClientOp::Add,
            ClientMessage::InitLoc { .. } => ClientOp::InitLoc,
            ClientMessage::Move { .. } => ClientOp::Move,
            ClientMessage::Nearby => ClientOp::Nearby,
        }
    }

    /// Check ids and coordinates.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        match self {
            ClientMessage::Add { id } => {
                if id.trim().is_empty() {
                    return Err(ProtocolError::EmptyId);
                }
                let len = id.chars().count();
                if len > MAX_ID_LEN {
                    return Err(ProtocolError::IdTooLong(len));
                }
                Ok(())
            }
            ClientMessage::InitLoc { lat, lng } | ClientMessage::Move { lat, lng } => {
                validate_coords(*lat, *lng)
            }
            ClientMessage::Nearby => Ok(()),
        }
    }
}

/// Reject non-finite or out of range coordinates.
pub fn validate_coords(lat: f64, lng: f64) -> Result<(), ProtocolError> {
    // NaN fails both comparisons, so it lands in the error branches.
    if !(lat >= -MAX_LAT && lat <= MAX_LAT) {
        return Err(ProtocolError::LatitudeOutOfRange(lat));
    }
    if !(lng >= -MAX_LNG && lng <= MAX_LNG) {
        return Err(ProtocolError::LongitudeOutOfRange(lng));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_registration() {
        let msg = ClientMessage::parse(r#"{"op":"cAdd","id":"alice"}"#).unwrap();
        assert_eq!(msg, ClientMessage::Add { id: "alice".into() });
        assert_eq!(msg.op(), ClientOp::Add);
    }

    #[test]
    fn test_parse_locations() {
        let init = ClientMessage::parse(r#"{"op":"cInitLoc","lat":51.5,"lng":-0.12}"#).unwrap();
        assert_eq!(init, ClientMessage::InitLoc { lat: 51.5, lng: -0.12 });

        let mv = ClientMessage::parse(r#"{"op":"cMove","lat":-33.9,"lng":151.2}"#).unwrap();
        assert_eq!(mv.op(), ClientOp::Move);

        let nearby = ClientMessage::parse(r#"{"op":"cNearby"}"#).unwrap();
        assert_eq!(nearby, ClientMessage::Nearby);
    }

    #[test]
    fn test_unknown_op_is_malformed() {
        let err = ClientMessage::parse(r#"{"op":"cTeleport","lat":1,"lng":1}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::Malformed(_)));

        let err = ClientMessage::parse(r#"{"lat":1,"lng":1}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::Malformed(_)));
    }

    #[test]
    fn test_missing_coordinates() {
        let err = ClientMessage::parse(r#"{"op":"cMove","lat":1}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::Malformed(_)));
    }

    #[test]
    fn test_coordinate_ranges() {
        assert!(ClientMessage::parse(r#"{"op":"cMove","lat":90,"lng":-180}"#).is_ok());

        let err = ClientMessage::parse(r#"{"op":"cMove","lat":90.5,"lng":0}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::LatitudeOutOfRange(_)));

        let err = ClientMessage::parse(r#"{"op":"cInitLoc","lat":0,"lng":181}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::LongitudeOutOfRange(_)));

        assert!(validate_coords(f64::NAN, 0.0).is_err());
        assert!(validate_coords(0.0, f64::INFINITY).is_err());
    }

    #[test]
    fn test_id_validation() {
        let err = ClientMessage::parse(r#"{"op":"cAdd","id":"  "}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::EmptyId));

        let long = "x".repeat(MAX_ID_LEN + 1);
        let err = ClientMessage::Add { id: long }.validate().unwrap_err();
        assert!(matches!(err, ProtocolError::IdTooLong(65)));
    }
}
