//! Layered 2D costmap with an elevation-map layer.
//!
//! The crate splits the elevation layer the way its two execution contexts
//! do: a background [`elevation::MapIngestor`] commits filtered height grids
//! into a lock-guarded shared cell, while the synchronous
//! [`elevation::ElevationLayer`] (driven through the [`layer::Layer`] trait
//! by a [`layer::LayeredCostmap`] host) classifies the committed grid into
//! free / lethal / unknown cells and composites them into the master buffer.

#![warn(missing_docs)]

pub mod elevation;
pub mod error;
pub mod footprint;
pub mod layer;
pub mod map;
pub mod throttle;

pub use elevation::{
    CombinationMethod, ElevationLayer, ElevationLayerConfig, MapIngestor, run_map_ingest,
};
pub use error::CostmapError;
pub use footprint::Footprint;
pub use layer::{Layer, LayeredCostmap};
pub use map::{Bounds, CellCost, CellRegion, Costmap2D, GridPoint, Pose2, WorldPoint};
pub use throttle::Throttle;
