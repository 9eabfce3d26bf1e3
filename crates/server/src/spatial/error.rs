//! Spatial index errors.

use thiserror::Error;

use super::View;

/// Errors raised by view construction and tree insertion.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SpatialError {
    #[error("Cannot create view with inverted corners: lx {lx:.3} rx {rx:.3} ty {ty:.3} by {by:.3}")]
    InvertedBounds { lx: f64, rx: f64, ty: f64, by: f64 },

    #[error("Point ({x}, {y}) lies outside the tree view {view}")]
    OutOfBounds { x: f64, y: f64, view: View },
}
