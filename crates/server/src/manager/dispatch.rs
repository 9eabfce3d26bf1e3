//! Per-user result delivery.

use protocol::ServerMessage;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};

/// Delivery handle bound to one connected user.
///
/// The tree manager stores a clone next to every user in the tree and calls
/// it while processing tasks, so delivery must never block.
pub trait Dispatch: Clone + Send + 'static {
    /// Queue `message` for the user.
    fn deliver(&self, message: ServerMessage);

    /// Send `reason` as an error and close the user's connection.
    fn deliver_error_and_close(&self, reason: &str);
}

/// Frames queued for a connection's writer.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Message(ServerMessage),
    ErrorAndClose(String),
}

/// [`Dispatch`] over a bounded channel drained by the connection writer.
///
/// Pushing never waits: when a client stops reading and its buffer fills,
/// further frames for it are dropped.
#[derive(Debug, Clone)]
pub struct Outbox {
    tx: mpsc::Sender<Outbound>,
}

impl Outbox {
    /// Create an outbox holding up to `capacity` frames and the receiver its
    /// writer drains.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Outbound>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    fn push(&self, out: Outbound) {
        match self.tx.try_send(out) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => warn!("Outbox full, dropping frame for slow client"),
            // The writer is gone once the connection closes; late results are dropped.
            Err(TrySendError::Closed(_)) => debug!("Outbox closed, dropping frame"),
        }
    }
}

impl Dispatch for Outbox {
    fn deliver(&self, message: ServerMessage) {
        self.push(Outbound::Message(message));
    }

    fn deliver_error_and_close(&self, reason: &str) {
        self.push(Outbound::ErrorAndClose(reason.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outbox_delivers_in_order() {
        let (outbox, mut rx) = Outbox::channel(8);
        outbox.deliver(ServerMessage::Departed { id: "a".into() });
        outbox.clone().deliver_error_and_close("bye");

        assert_eq!(
            rx.try_recv().unwrap(),
            Outbound::Message(ServerMessage::Departed { id: "a".into() })
        );
        assert_eq!(rx.try_recv().unwrap(), Outbound::ErrorAndClose("bye".into()));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_outbox_survives_closed_writer() {
        let (outbox, rx) = Outbox::channel(8);
        drop(rx);
        outbox.deliver(ServerMessage::Nearby { nearby: Vec::new() });
    }

    #[test]
    fn test_outbox_drops_when_full() {
        let (outbox, mut rx) = Outbox::channel(2);
        for i in 0..5 {
            outbox.deliver(ServerMessage::Departed { id: i.to_string() });
        }
        assert_eq!(
            rx.try_recv().unwrap(),
            Outbound::Message(ServerMessage::Departed { id: "0".into() })
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            Outbound::Message(ServerMessage::Departed { id: "1".into() })
        );
        assert!(rx.try_recv().is_err());

        // Room again once the writer has caught up.
        outbox.deliver(ServerMessage::Departed { id: "5".into() });
        assert_eq!(
            rx.try_recv().unwrap(),
            Outbound::Message(ServerMessage::Departed { id: "5".into() })
        );
    }
}
