//! Spatial indexing utilities.
//!
//! A point quadtree over axis-aligned [`View`] rectangles. Points may repeat;
//! element identity is left entirely to the caller's predicates.

mod error;
mod quadtree;
mod view;

pub use error::SpatialError;
pub use quadtree::{DEFAULT_LEAF_CAPACITY, DEFAULT_MAX_DEPTH, QuadTree};
pub use view::View;
