//! Process-wide set of registered user ids.

use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::manager::ClientId;

/// Ids of the users currently connected. Cheap to clone.
#[derive(Debug, Clone, Default)]
pub struct IdRegistry {
    ids: Arc<RwLock<HashSet<ClientId>>>,
}

impl IdRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `id`, returning false if another connection holds it.
    pub async fn admit(&self, id: &ClientId) -> bool {
        self.ids.write().await.insert(id.clone())
    }

    /// Give `id` up for reuse.
    pub async fn release(&self, id: &ClientId) {
        self.ids.write().await.remove(id);
    }

    pub async fn len(&self) -> usize {
        self.ids.read().await.len()
    }
}
