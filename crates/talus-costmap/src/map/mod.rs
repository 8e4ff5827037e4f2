//! Map-related functionality for the layered costmap.
//!
//! This module provides the 2D cost buffer, its point/region types and the
//! world-space bounds used for dirty-region tracking.

pub mod costmap;
pub mod point_types;

pub use costmap::{CellCost, Costmap2D};
pub use point_types::{Bounds, CellRegion, GridPoint, Pose2, WorldPoint};
