//! Tasks sent from connection handlers to the tree manager.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// User id, shared cheaply between tasks and tree entries.
pub type ClientId = Arc<str>;

/// Operation a task asks the tree manager to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOp {
    /// First placement of a user.
    InitialPosition,
    /// Relocate from the old position to the new one.
    Move,
    /// Report the users around the current position.
    Nearby,
    /// Drop the user from the tree.
    Remove,
}

impl fmt::Display for TaskOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TaskOp::InitialPosition => "initial-position",
            TaskOp::Move => "move",
            TaskOp::Nearby => "nearby",
            TaskOp::Remove => "remove",
        };
        f.write_str(name)
    }
}

/// A user's current and previous location.
///
/// Owned by the user's connection handler and copied into every task, so
/// later updates never reach a task that is already queued.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Position {
    pub lat: f64,
    pub lng: f64,
    pub old_lat: f64,
    pub old_lng: f64,
}

impl Position {
    /// A first location; the previous one is the same point.
    pub fn initial(lat: f64, lng: f64) -> Self {
        Self { lat, lng, old_lat: lat, old_lng: lng }
    }

    /// Step to a new location, remembering the current one.
    pub fn moved_to(self, lat: f64, lng: f64) -> Self {
        Self { lat, lng, old_lat: self.lat, old_lng: self.lng }
    }

    /// Mark the current location as the one stored in the tree.
    ///
    /// Removal deletes at the old coordinates, so a handler settles its
    /// position before building the final task.
    pub fn settled(self) -> Self {
        Self::initial(self.lat, self.lng)
    }
}

/// One queued user operation.
#[derive(Debug, Clone)]
pub struct Task<S> {
    /// Per-connection sequence number.
    pub transaction_id: u64,
    pub op: TaskOp,
    pub client_id: ClientId,
    pub lat: f64,
    pub old_lat: f64,
    pub lng: f64,
    pub old_lng: f64,
    /// Delivery handle of the user that sent the task.
    pub sink: S,
    pub enqueued_at: Instant,
}

impl<S> Task<S> {
    pub fn new(transaction_id: u64, op: TaskOp, client_id: ClientId, position: Position, sink: S) -> Self {
        Self {
            transaction_id,
            op,
            client_id,
            lat: position.lat,
            old_lat: position.old_lat,
            lng: position.lng,
            old_lng: position.old_lng,
            sink,
            enqueued_at: Instant::now(),
        }
    }
}
