//! Error types for the `talus-costmap` crate.

use talus_gridmap::GridError;
use thiserror::Error;

/// Errors that can occur in costmap construction and layer updates.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CostmapError {
    /// A map resolution was provided that is not positive.
    #[error("invalid map resolution: {0}")]
    InvalidResolution(&'static str),
    /// Map width or height is zero or overflows the backing storage.
    #[error("invalid map dimensions: {0}")]
    InvalidDimensions(&'static str),
    /// A cell outside the valid range was accessed.
    #[error("map access out of bounds: {0}")]
    OutOfBounds(&'static str),
    /// The two grids of a compositing operation do not align.
    #[error("grid mismatch: {0}")]
    GridMismatch(&'static str),
    /// An underlying height-grid operation failed.
    #[error(transparent)]
    Grid(#[from] GridError),
}
