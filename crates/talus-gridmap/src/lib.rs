//! Dense multi-layer height grids and the filter pipeline that derives
//! secondary layers (e.g. edge sharpness) from raw elevation data.
//!
//! The [`HeightGrid`] is the unit of exchange between a map producer and the
//! costmap layer that consumes it: a fixed-resolution 2D window of named
//! float layers with a world-frame origin. Producers publish the wire form
//! [`GridMessage`]; consumers validate it with
//! [`HeightGrid::try_from_message`] and normalize the circular-buffer start
//! index before use.

#![warn(missing_docs)]

pub mod error;
pub mod filter;
pub mod grid;

pub use error::{FilterError, GridError};
pub use filter::{FilterChain, GridFilter, MeanSmoothFilter, SharpnessFilter};
pub use grid::{GridMessage, HeightGrid};
