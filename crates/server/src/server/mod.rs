//! WebSocket front end.

use crate::config::Config;
use crate::manager::{Outbox, TreeManager};
use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

pub mod registry;
mod session;

pub use registry::IdRegistry;
pub use session::{SessionContext, SessionError, handle_connection};

/// Open sockets per peer address, capped in total and per address.
#[derive(Debug)]
struct ConnectionLimits {
    per_ip: HashMap<IpAddr, usize>,
    open: usize,
    max_open: usize,
    max_per_ip: usize,
}

impl ConnectionLimits {
    fn new(max_open: usize, max_per_ip: usize) -> Self {
        Self {
            per_ip: HashMap::new(),
            open: 0,
            max_open,
            max_per_ip,
        }
    }

    /// Count a new socket from `ip`, or refuse it when a cap is reached.
    fn admit(&mut self, ip: IpAddr) -> bool {
        let from_ip = self.per_ip.get(&ip).copied().unwrap_or(0);
        if self.open >= self.max_open || from_ip >= self.max_per_ip {
            return false;
        }
        self.per_ip.insert(ip, from_ip + 1);
        self.open += 1;
        true
    }

    fn release(&mut self, ip: IpAddr) {
        let Some(from_ip) = self.per_ip.get_mut(&ip) else {
            return;
        };
        *from_ip -= 1;
        self.open -= 1;
        if *from_ip == 0 {
            self.per_ip.remove(&ip);
        }
    }
}

/// Run the location server.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.port).parse()?;
    let listener = TcpListener::bind(&addr).await?;
    info!("Listening on ws://{}", addr);
    serve(listener, config).await
}

/// Accept connections on `listener` until ctrl-c.
pub async fn serve(listener: TcpListener, config: Config) -> anyhow::Result<()> {
    let (manager, tasks) = TreeManager::<Outbox>::from_config(&config)?;
    let ctx = SessionContext {
        tasks,
        ids: IdRegistry::new(),
        extent: manager.view(),
        outbox_capacity: config.server.outbox_capacity,
    };
    tokio::spawn(manager.run());

    let limits = Arc::new(Mutex::new(ConnectionLimits::new(
        config.server.max_connections,
        config.server.ip_limit,
    )));

    loop {
        let (stream, addr) = tokio::select! {
            accepted = listener.accept() => accepted?,
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown requested, no longer accepting connections");
                break;
            }
        };

        if !limits.lock().await.admit(addr.ip()) {
            warn!("Connection rejected (limit reached): {}", addr);
            continue;
        }

        let ctx = ctx.clone();
        let limits = Arc::clone(&limits);
        tokio::spawn(async move {
            let result = handle_connection(stream, addr, ctx).await;
            limits.lock().await.release(addr.ip());
            if let Err(e) = result {
                error!("Connection error from {}: {}", addr, e);
            }
        });
    }
    Ok(())
}
