//! The tree manager: sole owner of the spatial index.
//!
//! Connection handlers never touch the tree. They push [`Task`] snapshots
//! onto one queue and the manager applies them strictly in arrival order,
//! each to completion before the next, which is what keeps the index
//! consistent without a lock.

mod dispatch;
mod task;

pub use dispatch::{Dispatch, Outbound, Outbox};
pub use task::{ClientId, Position, Task, TaskOp};

use protocol::{Peer, ServerMessage};
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use crate::config::{Config, ConfigError, NearbyConfig};
use crate::geo;
use crate::spatial::{QuadTree, View};

/// A user stored in the tree.
#[derive(Debug, Clone)]
pub struct Member<S> {
    pub id: ClientId,
    pub sink: S,
}

/// Settings the manager reads while processing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ManagerSettings {
    /// Half-width, in metres, of nearby and movement queries.
    pub nearby_radius_m: f64,
    /// Notify users around a mover of every move.
    pub track_movement: bool,
}

impl From<&NearbyConfig> for ManagerSettings {
    fn from(config: &NearbyConfig) -> Self {
        Self {
            nearby_radius_m: config.radius_m,
            track_movement: config.track_movement,
        }
    }
}

/// Serialized processor for the task queue.
pub struct TreeManager<S> {
    tree: QuadTree<Member<S>>,
    settings: ManagerSettings,
    tasks: mpsc::Receiver<Task<S>>,
    processed: u64,
}

impl<S: Dispatch> TreeManager<S> {
    /// Take ownership of `tree` and the receiving end of the task queue.
    pub fn new(tree: QuadTree<Member<S>>, settings: ManagerSettings, tasks: mpsc::Receiver<Task<S>>) -> Self {
        Self {
            tree,
            settings,
            tasks,
            processed: 0,
        }
    }

    /// Build an empty tree from `config` and pair it with a fresh queue.
    ///
    /// Returns the manager and the sender handed to connection handlers.
    pub fn from_config(config: &Config) -> Result<(Self, mpsc::Sender<Task<S>>), ConfigError> {
        let tree = config.tree.build()?;
        let (tx, rx) = mpsc::channel(config.server.queue_capacity.max(1));
        Ok((Self::new(tree, ManagerSettings::from(&config.nearby), rx), tx))
    }

    /// The tree's bounding view.
    pub fn view(&self) -> View {
        self.tree.view()
    }

    /// Read-only access to the index.
    pub fn tree(&self) -> &QuadTree<Member<S>> {
        &self.tree
    }

    /// Apply tasks until every sender has been dropped.
    pub async fn run(mut self) {
        info!("Tree manager started over {}", self.tree.view());
        while let Some(task) = self.tasks.recv().await {
            self.process(task);
        }
        info!(
            processed = self.processed,
            remaining = self.tree.len(),
            "Task queue closed, tree manager stopping"
        );
    }

    /// Apply a single task to completion.
    pub fn process(&mut self, task: Task<S>) {
        let started = std::time::Instant::now();
        match task.op {
            TaskOp::InitialPosition => self.place(&task),
            TaskOp::Move => self.relocate(&task),
            TaskOp::Nearby => self.nearby(&task),
            TaskOp::Remove => self.remove(&task),
        }
        self.processed += 1;
        trace!(
            client = %task.client_id,
            tid = task.transaction_id,
            op = %task.op,
            wait_ms = started.duration_since(task.enqueued_at).as_secs_f64() * 1000.0,
            proc_ms = started.elapsed().as_secs_f64() * 1000.0,
            "Task processed"
        );
    }

    fn place(&mut self, task: &Task<S>) {
        let member = Member {
            id: task.client_id.clone(),
            sink: task.sink.clone(),
        };
        if let Err(e) = self.tree.insert(task.lat, task.lng, member) {
            warn!(client = %task.client_id, tid = task.transaction_id, "Dropping placement: {}", e);
        }
    }

    fn relocate(&mut self, task: &Task<S>) {
        if self.take_out(&task.client_id, task.old_lat, task.old_lng) == 0 {
            // Late move for a user that is no longer in the tree.
            debug!(client = %task.client_id, tid = task.transaction_id, "Move for absent user ignored");
            return;
        }
        self.place(task);
        if self.settings.track_movement {
            self.broadcast_movement(task);
        }
    }

    fn nearby(&self, task: &Task<S>) {
        let area = self.neighborhood(task.lat, task.lng);
        let mut nearby = Vec::new();
        self.tree.survey(&area, |lat, lng, member| {
            if member.id != task.client_id {
                nearby.push(Peer {
                    id: member.id.to_string(),
                    lat,
                    lng,
                });
            }
        });
        debug!(client = %task.client_id, tid = task.transaction_id, found = nearby.len(), "Nearby");
        task.sink.deliver(ServerMessage::Nearby { nearby });
    }

    fn remove(&mut self, task: &Task<S>) {
        let removed = self.take_out(&task.client_id, task.old_lat, task.old_lng);
        debug!(client = %task.client_id, tid = task.transaction_id, removed, "Removed from tree");
    }

    /// Delete `id`'s entry at exactly `(lat, lng)`.
    fn take_out(&mut self, id: &ClientId, lat: f64, lng: f64) -> usize {
        self.tree.delete(&View::point(lat, lng), |_, _, member| member.id == *id)
    }

    /// Tell users around the new position about the move, and users who
    /// could see the old position but not the new one that the mover left.
    fn broadcast_movement(&self, task: &Task<S>) {
        let id = &task.client_id;
        let new_area = self.neighborhood(task.lat, task.lng);
        let moved = ServerMessage::Moved {
            id: id.to_string(),
            lat: task.lat,
            lng: task.lng,
        };
        self.tree.survey(&new_area, |_, _, member| {
            if member.id != *id {
                member.sink.deliver(moved.clone());
            }
        });

        let left_behind: Vec<View> = self
            .neighborhood(task.old_lat, task.old_lng)
            .iter()
            .flat_map(|v| v.subtract_all(&new_area))
            .collect();
        if left_behind.is_empty() {
            return;
        }
        let departed = ServerMessage::Departed { id: id.to_string() };
        self.tree.survey(&left_behind, |lat, lng, member| {
            // Strips share their edges with the new area; those users were told above.
            let still_near = new_area.iter().any(|v| v.contains(lat, lng));
            if member.id != *id && !still_near {
                member.sink.deliver(departed.clone());
            }
        });
    }

    fn neighborhood(&self, lat: f64, lng: f64) -> Vec<View> {
        geo::neighborhood(&self.tree.view(), lat, lng, self.settings.nearby_radius_m)
    }
}
