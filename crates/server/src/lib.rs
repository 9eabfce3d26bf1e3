//! Real-time location server library.
//!
//! Users connect over WebSocket, report their positions, and ask who is
//! around them. Positions live in a [`spatial::QuadTree`] owned by a single
//! [`manager::TreeManager`] that applies queued tasks one at a time.

pub mod config;
pub mod geo;
pub mod manager;
pub mod server;
pub mod spatial;

// Re-export commonly used types
pub use config::Config;
pub use server::run;
