//! Point, pose, bounds and region types shared across the map modules.

/// Represents a point in grid coordinates (cell indices).
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GridPoint {
    /// The x-coordinate (column index) in the grid.
    pub x: usize,
    /// The y-coordinate (row index) in the grid.
    pub y: usize,
}

impl GridPoint {
    /// Creates a new `GridPoint`.
    #[must_use]
    pub const fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }
}

/// Represents a point in world coordinates (meters).
#[derive(Debug, Default, Clone, Copy, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WorldPoint {
    /// The x-coordinate in meters.
    pub x: f32,
    /// The y-coordinate in meters.
    pub y: f32,
}

impl WorldPoint {
    /// Creates a new `WorldPoint`.
    #[must_use]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// A planar robot pose `(x, y, θ)` in meters and radians.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Pose2 {
    /// World-frame x position (m).
    pub x: f32,
    /// World-frame y position (m).
    pub y: f32,
    /// Heading (rad), counter-clockwise from the world x-axis.
    pub theta: f32,
}

impl Pose2 {
    /// Creates a new pose.
    #[must_use]
    pub const fn new(x: f32, y: f32, theta: f32) -> Self {
        Self { x, y, theta }
    }
}

/// World-space axis-aligned bounds accumulated over an update cycle.
///
/// Starts inverted ("empty") and grows by commutative min/max folds, so the
/// iteration order of whatever touches it never matters. Callers only ever
/// expand the bounds; there is no shrink operation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    /// Minimum x in meters.
    pub min_x: f32,
    /// Minimum y in meters.
    pub min_y: f32,
    /// Maximum x in meters.
    pub max_x: f32,
    /// Maximum y in meters.
    pub max_y: f32,
}

impl Bounds {
    /// An empty bounds that any `touch` will replace.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            min_x: f32::INFINITY,
            min_y: f32::INFINITY,
            max_x: f32::NEG_INFINITY,
            max_y: f32::NEG_INFINITY,
        }
    }

    /// True until the first point has been folded in.
    pub fn is_empty(&self) -> bool {
        self.min_x > self.max_x || self.min_y > self.max_y
    }

    /// Expands the bounds to include the world point `(x, y)`.
    pub fn touch(&mut self, x: f32, y: f32) {
        self.min_x = self.min_x.min(x);
        self.min_y = self.min_y.min(y);
        self.max_x = self.max_x.max(x);
        self.max_y = self.max_y.max(y);
    }

    /// Expands the bounds to include all of `other`.
    pub fn union(&mut self, other: &Bounds) {
        if other.is_empty() {
            return;
        }
        self.touch(other.min_x, other.min_y);
        self.touch(other.max_x, other.max_y);
    }
}

impl Default for Bounds {
    fn default() -> Self {
        Self::empty()
    }
}

/// A half-open rectangle of cells `[min, max)` in a cost buffer.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CellRegion {
    /// Inclusive minimum x cell index.
    pub min_x: usize,
    /// Inclusive minimum y cell index.
    pub min_y: usize,
    /// Exclusive maximum x cell index.
    pub max_x: usize,
    /// Exclusive maximum y cell index.
    pub max_y: usize,
}

impl CellRegion {
    /// Creates a region from its corners.
    #[must_use]
    pub const fn new(min_x: usize, min_y: usize, max_x: usize, max_y: usize) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// True when the region covers no cells.
    pub fn is_empty(&self) -> bool {
        self.min_x >= self.max_x || self.min_y >= self.max_y
    }

    /// Iterates over every cell in the region in row order.
    pub fn cells(&self) -> impl Iterator<Item = GridPoint> + use<> {
        let (min_x, max_x) = (self.min_x, self.max_x);
        (self.min_y..self.max_y)
            .flat_map(move |y| (min_x..max_x).map(move |x| GridPoint::new(x, y)))
    }
}
