//! Per-connection protocol handling.
//!
//! A connection registers an id with `cAdd`, places itself with `cInitLoc`
//! and then sends any number of `cMove` and `cNearby` messages. Each of those
//! becomes a [`Task`] on the tree manager's queue; replies come back through
//! the connection's [`Outbox`] and are written by a separate writer task.

use std::net::SocketAddr;
use std::time::Instant;

use futures_util::{Sink, SinkExt, Stream, StreamExt};
use protocol::{ClientMessage, ClientOp, ProtocolError, ServerMessage};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::{self, Message};
use tracing::{debug, info, trace, warn};

use super::registry::IdRegistry;
use crate::manager::{ClientId, Dispatch, Outbound, Outbox, Position, Task, TaskOp};
use crate::spatial::View;

/// Why a session ended.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("Illegal message op {found}, expected {expected}")]
    IllegalOp { expected: &'static str, found: ClientOp },

    #[error("Only text frames are accepted")]
    NotText,

    #[error("User id {0} is already connected")]
    DuplicateId(String),

    #[error("Location ({lat}, {lng}) is outside the served area")]
    OutsideExtent { lat: f64, lng: f64 },

    #[error("Server is shutting down")]
    QueueClosed,

    #[error("Connection closed")]
    Closed,

    #[error("WebSocket error: {0}")]
    Transport(#[from] tungstenite::Error),
}

impl SessionError {
    fn illegal(expected: &'static str, found: &ClientMessage) -> Self {
        SessionError::IllegalOp {
            expected,
            found: found.op(),
        }
    }

    /// Whether the peer is still there to be told about it.
    fn is_reportable(&self) -> bool {
        !matches!(self, SessionError::Closed | SessionError::Transport(_))
    }
}

/// Shared handles every connection needs.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub tasks: mpsc::Sender<Task<Outbox>>,
    pub ids: IdRegistry,
    /// Area covered by the tree; locations outside it are refused.
    pub extent: View,
    /// Frames buffered for each connection's writer.
    pub outbox_capacity: usize,
}

/// Serve one WebSocket connection until it closes or breaks the protocol.
pub async fn handle_connection<S>(stream: S, addr: SocketAddr, ctx: SessionContext) -> anyhow::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let ws_stream = accept_async(stream).await?;
    info!("New connection from {}", addr);

    let (write, mut read) = ws_stream.split();
    let (outbox, frames) = Outbox::channel(ctx.outbox_capacity);
    let writer = tokio::spawn(write_frames(write, frames, addr));

    match serve(&mut read, &outbox, &ctx, addr).await {
        Ok(()) => {}
        Err(e) if e.is_reportable() => {
            warn!("Closing {}: {}", addr, e);
            outbox.deliver_error_and_close(&e.to_string());
        }
        Err(e) => info!("Client {} disconnected: {}", addr, e),
    }
    drop(outbox);

    // The writer finishes once the tree manager has dropped this user's sinks.
    match writer.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => debug!("Writer for {} stopped: {}", addr, e),
        Err(e) => warn!("Writer for {} panicked: {}", addr, e),
    }
    Ok(())
}

async fn serve<R>(read: &mut R, outbox: &Outbox, ctx: &SessionContext, addr: SocketAddr) -> Result<(), SessionError>
where
    R: Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
{
    let id = match next_message(read).await? {
        ClientMessage::Add { id } => ClientId::from(id),
        other => return Err(SessionError::illegal(ClientOp::Add.as_str(), &other)),
    };
    if !ctx.ids.admit(&id).await {
        return Err(SessionError::DuplicateId(id.to_string()));
    }
    info!(client = %id, "Registered from {}", addr);

    let mut session = Session {
        id: id.clone(),
        ctx,
        sink: outbox.clone(),
        position: Position::default(),
        tid: 0,
        placed: false,
    };
    let result = session.run(read).await;
    session.finish().await;
    ctx.ids.release(&id).await;
    info!(client = %id, tasks = session.tid, "Deregistered");
    result
}

/// State of a registered user.
struct Session<'a> {
    id: ClientId,
    ctx: &'a SessionContext,
    sink: Outbox,
    position: Position,
    tid: u64,
    /// Set once the initial position has been queued.
    placed: bool,
}

impl Session<'_> {
    async fn run<R>(&mut self, read: &mut R) -> Result<(), SessionError>
    where
        R: Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
    {
        match next_message(read).await? {
            ClientMessage::InitLoc { lat, lng } => {
                self.check_extent(lat, lng)?;
                self.position = Position::initial(lat, lng);
                self.forward(TaskOp::InitialPosition).await?;
                self.placed = true;
            }
            other => return Err(SessionError::illegal(ClientOp::InitLoc.as_str(), &other)),
        }

        loop {
            match next_message(read).await? {
                ClientMessage::Move { lat, lng } => {
                    self.check_extent(lat, lng)?;
                    self.position = self.position.moved_to(lat, lng);
                    self.forward(TaskOp::Move).await?;
                }
                ClientMessage::Nearby => self.forward(TaskOp::Nearby).await?,
                other => return Err(SessionError::illegal("cMove or cNearby", &other)),
            }
        }
    }

    /// Queue removal of a placed user.
    async fn finish(&mut self) {
        if !self.placed {
            return;
        }
        self.position = self.position.settled();
        if self.forward(TaskOp::Remove).await.is_err() {
            debug!(client = %self.id, "Queue closed before removal");
        }
    }

    fn check_extent(&self, lat: f64, lng: f64) -> Result<(), SessionError> {
        if self.ctx.extent.contains(lat, lng) {
            Ok(())
        } else {
            Err(SessionError::OutsideExtent { lat, lng })
        }
    }

    async fn forward(&mut self, op: TaskOp) -> Result<(), SessionError> {
        self.tid += 1;
        let task = Task::new(self.tid, op, self.id.clone(), self.position, self.sink.clone());
        self.ctx.tasks.send(task).await.map_err(|_| SessionError::QueueClosed)
    }
}

/// Next protocol message, skipping control frames.
async fn next_message<R>(read: &mut R) -> Result<ClientMessage, SessionError>
where
    R: Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
{
    loop {
        match read.next().await {
            Some(Ok(Message::Text(text))) => return Ok(ClientMessage::parse(text.as_str())?),
            Some(Ok(Message::Binary(_))) => return Err(SessionError::NotText),
            Some(Ok(Message::Close(_))) | None => return Err(SessionError::Closed),
            Some(Ok(_)) => continue,
            Some(Err(e)) => return Err(e.into()),
        }
    }
}

/// Drain `frames` onto the socket until every sender is gone or a close is requested.
async fn write_frames<W>(
    mut write: W,
    mut frames: mpsc::Receiver<Outbound>,
    addr: SocketAddr,
) -> Result<(), tungstenite::Error>
where
    W: Sink<Message, Error = tungstenite::Error> + Unpin,
{
    while let Some(frame) = frames.recv().await {
        let (message, close) = match frame {
            Outbound::Message(message) => (message, false),
            Outbound::ErrorAndClose(reason) => (ServerMessage::Error { reason }, true),
        };
        match message.to_json() {
            Ok(text) => {
                let started = Instant::now();
                write.send(Message::text(text)).await?;
                trace!(
                    peer = %addr,
                    op = %message.op(),
                    send_ms = started.elapsed().as_secs_f64() * 1000.0,
                    "Frame sent"
                );
            }
            Err(e) => warn!("Dropping unencodable {} frame: {}", message.op(), e),
        }
        if close {
            break;
        }
    }
    write.close().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::manager::TreeManager;
    use tokio::io::DuplexStream;
    use tokio::task::JoinHandle;
    use tokio_tungstenite::{WebSocketStream, client_async};

    type Client = WebSocketStream<DuplexStream>;

    fn start_manager() -> SessionContext {
        let config = Config::default();
        let (manager, tasks) = TreeManager::<Outbox>::from_config(&config).unwrap();
        let ctx = SessionContext {
            tasks,
            ids: IdRegistry::new(),
            extent: manager.view(),
            outbox_capacity: config.server.outbox_capacity,
        };
        tokio::spawn(manager.run());
        ctx
    }

    async fn connect(ctx: &SessionContext) -> (Client, JoinHandle<anyhow::Result<()>>) {
        let (client_io, server_io) = tokio::io::duplex(64 * 1024);
        let addr: SocketAddr = "127.0.0.1:40000".parse().unwrap();
        let handle = tokio::spawn(handle_connection(server_io, addr, ctx.clone()));
        let (ws, _) = client_async("ws://localhost/", client_io).await.unwrap();
        (ws, handle)
    }

    async fn send(ws: &mut Client, json: &str) {
        ws.send(Message::text(json.to_string())).await.unwrap();
    }

    /// Next server message, or `None` once the server has closed.
    async fn recv(ws: &mut Client) -> Option<ServerMessage> {
        while let Some(frame) = ws.next().await {
            match frame {
                Ok(Message::Text(text)) => return Some(ServerMessage::from_json(text.as_str()).unwrap()),
                Ok(Message::Close(_)) | Err(_) => return None,
                Ok(_) => continue,
            }
        }
        None
    }

    async fn nearby(ws: &mut Client) -> Vec<String> {
        send(ws, r#"{"op":"cNearby"}"#).await;
        match recv(ws).await {
            Some(ServerMessage::Nearby { nearby }) => {
                let mut ids: Vec<String> = nearby.into_iter().map(|p| p.id).collect();
                ids.sort();
                ids
            }
            other => panic!("expected sNearby, got {other:?}"),
        }
    }

    async fn join(ctx: &SessionContext, id: &str, lat: f64, lng: f64) -> (Client, JoinHandle<anyhow::Result<()>>) {
        let (mut ws, handle) = connect(ctx).await;
        send(&mut ws, &format!(r#"{{"op":"cAdd","id":"{id}"}}"#)).await;
        send(&mut ws, &format!(r#"{{"op":"cInitLoc","lat":{lat},"lng":{lng}}}"#)).await;
        // A reply proves the placement went through the queue.
        nearby(&mut ws).await;
        (ws, handle)
    }

    async fn expect_error(ws: &mut Client) -> String {
        match recv(ws).await {
            Some(ServerMessage::Error { reason }) => {
                assert!(recv(ws).await.is_none());
                reason
            }
            other => panic!("expected sError, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_nearby_between_sessions() {
        let ctx = start_manager();
        let (mut alice, _a) = join(&ctx, "alice", 10.0, 10.0).await;
        let (mut bob, _b) = join(&ctx, "bob", 10.001, 10.001).await;
        let (mut carol, _c) = join(&ctx, "carol", -40.0, 100.0).await;

        assert_eq!(nearby(&mut bob).await, vec!["alice".to_string()]);
        assert_eq!(nearby(&mut alice).await, vec!["bob".to_string()]);
        assert!(nearby(&mut carol).await.is_empty());

        send(&mut carol, r#"{"op":"cMove","lat":10.002,"lng":10.0}"#).await;
        assert_eq!(nearby(&mut carol).await, vec!["alice".to_string(), "bob".to_string()]);
    }

    #[tokio::test]
    async fn test_wrong_first_message_closes() {
        let ctx = start_manager();
        let (mut ws, handle) = connect(&ctx).await;
        send(&mut ws, r#"{"op":"cMove","lat":1.0,"lng":1.0}"#).await;
        let reason = expect_error(&mut ws).await;
        assert!(reason.contains("cMove"), "{reason}");
        handle.await.unwrap().unwrap();
        assert_eq!(ctx.ids.len().await, 0);
    }

    #[tokio::test]
    async fn test_add_after_init_is_rejected() {
        let ctx = start_manager();
        let (mut ws, handle) = join(&ctx, "dave", 0.0, 0.0).await;
        send(&mut ws, r#"{"op":"cAdd","id":"dave"}"#).await;
        expect_error(&mut ws).await;
        handle.await.unwrap().unwrap();
        assert_eq!(ctx.ids.len().await, 0);
    }

    #[tokio::test]
    async fn test_malformed_json_closes() {
        let ctx = start_manager();
        let (mut ws, _handle) = connect(&ctx).await;
        send(&mut ws, "{not json").await;
        expect_error(&mut ws).await;
    }

    #[tokio::test]
    async fn test_duplicate_id_rejected() {
        let ctx = start_manager();
        let (_first, _h) = join(&ctx, "erin", 1.0, 1.0).await;
        let (mut second, _h2) = connect(&ctx).await;
        send(&mut second, r#"{"op":"cAdd","id":"erin"}"#).await;
        let reason = expect_error(&mut second).await;
        assert!(reason.contains("erin"), "{reason}");
        assert_eq!(ctx.ids.len().await, 1);
    }

    #[tokio::test]
    async fn test_disconnect_removes_user() {
        let ctx = start_manager();
        let (mut frank, handle) = join(&ctx, "frank", 5.0, 5.0).await;
        send(&mut frank, r#"{"op":"cMove","lat":5.0005,"lng":5.0}"#).await;
        let (mut gina, _g) = join(&ctx, "gina", 5.0, 5.0).await;
        assert_eq!(nearby(&mut gina).await, vec!["frank".to_string()]);

        frank.close(None).await.unwrap();
        while recv(&mut frank).await.is_some() {}
        // Returns once the removal has been applied and the sinks dropped.
        handle.await.unwrap().unwrap();

        assert!(nearby(&mut gina).await.is_empty());
        assert_eq!(ctx.ids.len().await, 1);

        // The id is free again.
        let (mut again, _h) = join(&ctx, "frank", 5.0, 5.0).await;
        assert_eq!(nearby(&mut again).await, vec!["gina".to_string()]);
    }

    #[tokio::test]
    async fn test_location_outside_extent() {
        let mut config = Config::default();
        config.tree.min_lat = 0.0;
        config.tree.max_lat = 10.0;
        config.tree.min_lng = 0.0;
        config.tree.max_lng = 10.0;
        let (manager, tasks) = TreeManager::<Outbox>::from_config(&config).unwrap();
        let ctx = SessionContext {
            tasks,
            ids: IdRegistry::new(),
            extent: manager.view(),
            outbox_capacity: config.server.outbox_capacity,
        };
        tokio::spawn(manager.run());

        let (mut ws, _h) = connect(&ctx).await;
        send(&mut ws, r#"{"op":"cAdd","id":"hank"}"#).await;
        send(&mut ws, r#"{"op":"cInitLoc","lat":20.0,"lng":5.0}"#).await;
        let reason = expect_error(&mut ws).await;
        assert!(reason.contains("outside"), "{reason}");
    }
}
