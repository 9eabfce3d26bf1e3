//! Server configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use crate::spatial::{DEFAULT_LEAF_CAPACITY, DEFAULT_MAX_DEPTH, QuadTree, SpatialError, View};

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub tree: TreeConfig,
    #[serde(default)]
    pub nearby: NearbyConfig,
}

impl Config {
    /// Load configuration from `path`, writing the defaults there if the
    /// file does not exist yet.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let config = if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            toml::from_str(&contents)?
        } else {
            info!("No {} found, creating default config", path.display());
            let default_config = Self::default();
            std::fs::write(path, toml::to_string_pretty(&default_config)?)?;
            default_config
        };
        Ok(config.validated()?)
    }

    /// Reject settings the tree manager cannot work with.
    pub fn validated(self) -> Result<Self, ConfigError> {
        self.tree.extent()?;
        if self.tree.leaf_split_threshold == 0 {
            return Err(ConfigError::ZeroThreshold);
        }
        let radius = self.nearby.radius_m;
        if !radius.is_finite() || radius < 0.0 {
            return Err(ConfigError::BadRadius(radius));
        }
        if self.server.queue_capacity == 0 {
            return Err(ConfigError::ZeroQueue);
        }
        if self.server.outbox_capacity == 0 {
            return Err(ConfigError::ZeroOutbox);
        }
        Ok(self)
    }
}

/// Invalid configuration values.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid tree extent: {0}")]
    Extent(#[from] SpatialError),
    #[error("leaf_split_threshold must be at least 1")]
    ZeroThreshold,
    #[error("Nearby radius must be a non-negative number of metres, got {0}")]
    BadRadius(f64),
    #[error("queue_capacity must be at least 1")]
    ZeroQueue,
    #[error("outbox_capacity must be at least 1")]
    ZeroOutbox,
}

/// Server networking settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Bind address.
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Maximum connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    /// Connections per IP limit.
    #[serde(default = "default_ip_limit")]
    pub ip_limit: usize,
    /// Tasks the tree manager queue holds before senders wait.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Replies buffered per connection; further replies to a client that
    /// is not reading are dropped.
    #[serde(default = "default_outbox_capacity")]
    pub outbox_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind: default_bind(),
            max_connections: default_max_connections(),
            ip_limit: default_ip_limit(),
            queue_capacity: default_queue_capacity(),
            outbox_capacity: default_outbox_capacity(),
        }
    }
}

fn default_port() -> u16 {
    8002
}
fn default_bind() -> String {
    "0.0.0.0".to_string()
}
fn default_max_connections() -> usize {
    10_000
}
fn default_ip_limit() -> usize {
    100
}
fn default_queue_capacity() -> usize {
    4096
}
fn default_outbox_capacity() -> usize {
    256
}

/// Quadtree extent and shape.
///
/// Latitude runs along the tree's x axis, longitude along its y axis.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TreeConfig {
    #[serde(default = "default_min_lat")]
    pub min_lat: f64,
    #[serde(default = "default_max_lat")]
    pub max_lat: f64,
    #[serde(default = "default_min_lng")]
    pub min_lng: f64,
    #[serde(default = "default_max_lng")]
    pub max_lng: f64,
    /// Entries a leaf holds before it is split into quarters.
    #[serde(default = "default_leaf_split_threshold")]
    pub leaf_split_threshold: usize,
    /// Depth past which leaves grow instead of splitting.
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,
}

impl TreeConfig {
    /// The tree's fixed bounding view.
    pub fn extent(&self) -> Result<View, SpatialError> {
        View::try_new(self.min_lat, self.max_lat, self.min_lng, self.max_lng)
    }

    /// Build an empty tree with these settings.
    pub fn build<T>(&self) -> Result<QuadTree<T>, SpatialError> {
        Ok(QuadTree::with_limits(
            self.extent()?,
            self.leaf_split_threshold,
            self.max_depth,
        ))
    }
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            min_lat: default_min_lat(),
            max_lat: default_max_lat(),
            min_lng: default_min_lng(),
            max_lng: default_max_lng(),
            leaf_split_threshold: default_leaf_split_threshold(),
            max_depth: default_max_depth(),
        }
    }
}

fn default_min_lat() -> f64 {
    -protocol::MAX_LAT
}
fn default_max_lat() -> f64 {
    protocol::MAX_LAT
}
fn default_min_lng() -> f64 {
    -protocol::MAX_LNG
}
fn default_max_lng() -> f64 {
    protocol::MAX_LNG
}
fn default_leaf_split_threshold() -> usize {
    DEFAULT_LEAF_CAPACITY
}
fn default_max_depth() -> u32 {
    DEFAULT_MAX_DEPTH
}

/// Nearby queries and movement broadcast.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NearbyConfig {
    /// Half-width, in metres, of the square searched around a user.
    #[serde(default = "default_radius")]
    pub radius_m: f64,
    /// Broadcast every move to the users around the mover.
    #[serde(default)]
    pub track_movement: bool,
}

impl Default for NearbyConfig {
    fn default() -> Self {
        Self {
            radius_m: default_radius(),
            track_movement: false,
        }
    }
}

fn default_radius() -> f64 {
    1000.0
}
