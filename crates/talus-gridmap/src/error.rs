//! Error types for the `talus-gridmap` crate.

use thiserror::Error;

/// Errors that can occur when constructing or accessing a height grid.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GridError {
    /// A grid resolution was provided that is not positive.
    #[error("invalid grid resolution: {0}")]
    InvalidResolution(&'static str),
    /// A grid dimension was zero or would overflow the backing storage.
    #[error("invalid grid dimensions: {0}")]
    InvalidDimensions(&'static str),
    /// A cell index outside the grid was requested.
    #[error("grid access out of bounds: {0}")]
    OutOfBounds(&'static str),
    /// A layer was requested that does not exist in the grid.
    #[error("unknown layer `{0}`")]
    UnknownLayer(String),
    /// A layer payload does not match the grid dimensions.
    #[error("layer `{name}` holds {actual} values, grid expects {expected}")]
    LayerSize {
        /// Name of the offending layer.
        name: String,
        /// Cell count implied by the grid dimensions.
        expected: usize,
        /// Cell count actually supplied.
        actual: usize,
    },
}

/// Errors produced by the grid filter pipeline.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FilterError {
    /// A filter needs a layer the input grid does not carry.
    #[error("filter `{filter}` requires missing layer `{layer}`")]
    MissingLayer {
        /// Name of the filter that failed.
        filter: String,
        /// Name of the layer it required.
        layer: String,
    },
    /// A filter cannot operate on a grid with no cells.
    #[error("filter `{0}` received an empty grid")]
    EmptyGrid(String),
    /// No filter is registered under the requested name.
    #[error("no filter registered under `{0}`")]
    UnknownFilter(String),
}
