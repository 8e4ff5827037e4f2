//! 2D cost buffer for occupancy classification and cost aggregation.
//!
//! [`Costmap2D`] is used both as a layer's local paint buffer and as the
//! master buffer layers composite into. It supports a rolling window via
//! [`Costmap2D::update_origin`] and the overwrite/max compositing primitives
//! the layered update cycle relies on.

// NOTES / TODO:
// - Does not support non-square cells (is this needed?)

use crate::error::CostmapError;
use crate::map::point_types::{Bounds, CellRegion, GridPoint, WorldPoint};

/// Classification of a costmap cell.
#[repr(u8)]
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CellCost {
    /// Free cell, no cost to traverse
    Free = 0,
    /// Cell that contains an obstacle the robot cannot traverse
    Lethal = 254,
    /// Unknown cell - no information available about this cell
    Unknown = 255,
}

impl CellCost {
    /// Converts the CellCost to its u8 representation
    pub fn as_u8(&self) -> u8 {
        match self {
            CellCost::Free => 0,
            CellCost::Lethal => 254,
            CellCost::Unknown => 255,
        }
    }

    /// Creates a CellCost from a u8 value. Values that do not name a lethal
    /// or unknown cell are treated as free.
    pub fn from_u8(value: u8) -> Self {
        match value {
            254 => CellCost::Lethal,
            255 => CellCost::Unknown,
            _ => CellCost::Free,
        }
    }

    /// Rank used by max-compositing: `Free < Unknown < Lethal`.
    ///
    /// This differs from the raw `u8` encoding, where the unknown marker
    /// (255) would incorrectly dominate lethal (254).
    pub fn rank(&self) -> u8 {
        match self {
            CellCost::Free => 0,
            CellCost::Unknown => 1,
            CellCost::Lethal => 2,
        }
    }
}

impl std::fmt::Display for CellCost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CellCost::Free => write!(f, "Free"),
            CellCost::Lethal => write!(f, "Lethal"),
            CellCost::Unknown => write!(f, "Unknown"),
        }
    }
}

/// A 2D costmap representing the environment with a cost for each cell.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone)]
pub struct Costmap2D {
    /// Width of the costmap in cells
    width: usize,
    /// Height of the costmap in cells
    height: usize,
    /// Resolution of the costmap in meters per cell
    resolution: f32,
    /// X coordinate of the origin in world coordinates (meters)
    origin_x: f32,
    /// Y coordinate of the origin in world coordinates (meters)
    origin_y: f32,
    /// Value new or revealed cells are initialized to
    default_value: CellCost,
    /// Vector storing the cost values for each cell
    data: Vec<CellCost>,
}

impl Costmap2D {
    /// Creates a new Costmap2D with the specified dimensions and resolution.
    ///
    /// # Arguments
    /// * `width` - Width of the costmap in cells
    /// * `height` - Height of the costmap in cells
    /// * `resolution` - Resolution of the costmap in meters per cell
    /// * `origin` - World coordinates (meters) of cell (0,0), bottom-left corner
    /// * `default_value` - Cost that unpainted cells start out with
    pub fn new(
        width: usize,
        height: usize,
        resolution: f32,
        origin: WorldPoint,
        default_value: CellCost,
    ) -> Result<Self, CostmapError> {
        if resolution <= 0.0 {
            return Err(CostmapError::InvalidResolution(
                "resolution must be positive",
            ));
        }
        if width == 0 || height == 0 {
            return Err(CostmapError::InvalidDimensions(
                "width and height must be non-zero",
            ));
        }
        if width.checked_mul(height).is_none() {
            return Err(CostmapError::InvalidDimensions(
                "map dimensions too large, would cause overflow",
            ));
        }

        Ok(Costmap2D {
            width,
            height,
            resolution,
            origin_x: origin.x,
            origin_y: origin.y,
            default_value,
            data: vec![default_value; width * height],
        })
    }

    /// Calculates the index in the data vector for a given grid point
    fn get_index(&self, p: GridPoint) -> usize {
        p.y * self.width + p.x
    }

    /// Width of the costmap in cells.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Height of the costmap in cells.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Resolution in meters per cell.
    pub fn resolution(&self) -> f32 {
        self.resolution
    }

    /// World coordinates of cell (0,0).
    pub fn origin(&self) -> WorldPoint {
        WorldPoint::new(self.origin_x, self.origin_y)
    }

    /// Cost that unpainted cells start out with.
    pub fn default_value(&self) -> CellCost {
        self.default_value
    }

    /// Physical width of the map in meters.
    pub fn size_in_meters_x(&self) -> f32 {
        self.width as f32 * self.resolution
    }

    /// Physical height of the map in meters.
    pub fn size_in_meters_y(&self) -> f32 {
        self.height as f32 * self.resolution
    }

    /// Converts world coordinates (meters) to grid coordinates (cells).
    /// Returns None if the world coordinates are outside the map bounds.
    pub fn world_to_grid(&self, world_p: WorldPoint) -> Option<GridPoint> {
        let grid_x_f = (world_p.x - self.origin_x) / self.resolution;
        let grid_y_f = (world_p.y - self.origin_y) / self.resolution;

        // A point exactly on the max boundary is considered outside.
        if grid_x_f < 0.0
            || grid_y_f < 0.0
            || grid_x_f >= self.width as f32
            || grid_y_f >= self.height as f32
        {
            return None;
        }

        Some(GridPoint::new(
            grid_x_f.floor() as usize,
            grid_y_f.floor() as usize,
        ))
    }

    /// Converts grid coordinates to world coordinates (center of the cell).
    pub fn grid_to_world(&self, grid_p: GridPoint) -> Option<WorldPoint> {
        if grid_p.x >= self.width || grid_p.y >= self.height {
            return None;
        }
        Some(WorldPoint::new(
            self.origin_x + (grid_p.x as f32 + 0.5) * self.resolution,
            self.origin_y + (grid_p.y as f32 + 0.5) * self.resolution,
        ))
    }

    /// Gets the cost at grid coordinates.
    pub fn get_cost(&self, p: GridPoint) -> Result<CellCost, CostmapError> {
        if p.x >= self.width || p.y >= self.height {
            return Err(CostmapError::OutOfBounds(
                "grid coordinates out of bounds",
            ));
        }
        Ok(self.data[self.get_index(p)])
    }

    /// Sets the cost at grid coordinates.
    pub fn set_cost(&mut self, p: GridPoint, cost: CellCost) -> Result<(), CostmapError> {
        if p.x >= self.width || p.y >= self.height {
            return Err(CostmapError::OutOfBounds(
                "grid coordinates out of bounds",
            ));
        }
        let index = self.get_index(p);
        self.data[index] = cost;
        Ok(())
    }

    /// Gets a reference to the underlying cost data.
    pub fn data(&self) -> &[CellCost] {
        &self.data
    }

    /// Repaints every cell with the default value.
    pub fn reset_to_default(&mut self) {
        self.data.fill(self.default_value);
    }

    /// Moves the map window so its origin lands on `new_origin`, keeping the
    /// content of cells that remain inside the window.
    ///
    /// The shift is snapped to whole cells so surviving cost values stay put
    /// in world space. Cells that scroll into view are initialized with the
    /// default value.
    pub fn update_origin(&mut self, new_origin: WorldPoint) {
        let shift_x = ((new_origin.x - self.origin_x) / self.resolution).floor() as isize;
        let shift_y = ((new_origin.y - self.origin_y) / self.resolution).floor() as isize;
        if shift_x == 0 && shift_y == 0 {
            return;
        }

        let mut shifted = vec![self.default_value; self.width * self.height];
        for y in 0..self.height {
            for x in 0..self.width {
                let src_x = x as isize + shift_x;
                let src_y = y as isize + shift_y;
                if src_x >= 0
                    && src_y >= 0
                    && (src_x as usize) < self.width
                    && (src_y as usize) < self.height
                {
                    shifted[y * self.width + x] =
                        self.data[src_y as usize * self.width + src_x as usize];
                }
            }
        }
        self.data = shifted;
        self.origin_x += shift_x as f32 * self.resolution;
        self.origin_y += shift_y as f32 * self.resolution;
    }

    /// Converts world-space bounds into the clamped cell region they cover.
    ///
    /// An empty bounds yields an empty region. Touched points exactly on a
    /// cell edge include that cell.
    pub fn region_from_bounds(&self, bounds: &Bounds) -> CellRegion {
        if bounds.is_empty() {
            return CellRegion::default();
        }
        let to_cell = |world: f32, origin: f32| ((world - origin) / self.resolution).floor();
        let clamp = |cell: f32, max: usize| (cell.max(0.0) as usize).min(max);

        let min_x = clamp(to_cell(bounds.min_x, self.origin_x), self.width);
        let min_y = clamp(to_cell(bounds.min_y, self.origin_y), self.height);
        let max_x = clamp(to_cell(bounds.max_x, self.origin_x) + 1.0, self.width);
        let max_y = clamp(to_cell(bounds.max_y, self.origin_y) + 1.0, self.height);
        CellRegion::new(min_x, min_y, max_x, max_y)
    }

    /// Paints every cell whose center lies inside the convex polygon.
    ///
    /// Vertices are world coordinates in either winding order. Cells outside
    /// the map are skipped.
    pub fn set_convex_polygon_cost(&mut self, polygon: &[WorldPoint], cost: CellCost) {
        if polygon.len() < 3 {
            return;
        }

        let mut bounds = Bounds::empty();
        for vertex in polygon {
            bounds.touch(vertex.x, vertex.y);
        }
        let region = self.region_from_bounds(&bounds);
        for cell in region.cells() {
            let center = self
                .grid_to_world(cell)
                .expect("region cells stay inside the map");
            if point_in_convex_polygon(center, polygon) {
                let index = self.get_index(cell);
                self.data[index] = cost;
            }
        }
    }

    /// Composites `source` into `self` over `region`, overwriting
    /// unconditionally (unknown source cells are copied too).
    ///
    /// The two maps must share dimensions and resolution; they are indexed by
    /// the same cell coordinates.
    pub fn update_with_overwrite(
        &mut self,
        source: &Costmap2D,
        region: CellRegion,
    ) -> Result<(), CostmapError> {
        self.check_aligned(source)?;
        for cell in self.clamped(region).cells() {
            let index = self.get_index(cell);
            self.data[index] = source.data[index];
        }
        Ok(())
    }

    /// Composites `source` into `self` over `region`, keeping whichever cell
    /// ranks higher in the `Free < Unknown < Lethal` order.
    pub fn update_with_max(
        &mut self,
        source: &Costmap2D,
        region: CellRegion,
    ) -> Result<(), CostmapError> {
        self.check_aligned(source)?;
        for cell in self.clamped(region).cells() {
            let index = self.get_index(cell);
            if source.data[index].rank() > self.data[index].rank() {
                self.data[index] = source.data[index];
            }
        }
        Ok(())
    }

    fn check_aligned(&self, other: &Costmap2D) -> Result<(), CostmapError> {
        if self.width != other.width
            || self.height != other.height
            || self.resolution != other.resolution
        {
            return Err(CostmapError::GridMismatch(
                "compositing requires identically sized maps",
            ));
        }
        Ok(())
    }

    fn clamped(&self, region: CellRegion) -> CellRegion {
        CellRegion::new(
            region.min_x.min(self.width),
            region.min_y.min(self.height),
            region.max_x.min(self.width),
            region.max_y.min(self.height),
        )
    }
}

/// Point-in-convex-polygon test tolerant of both winding orders.
fn point_in_convex_polygon(p: WorldPoint, polygon: &[WorldPoint]) -> bool {
    let mut sign = 0.0f32;
    for i in 0..polygon.len() {
        let a = polygon[i];
        let b = polygon[(i + 1) % polygon.len()];
        let cross = (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x);
        if cross.abs() < f32::EPSILON {
            continue; // on an edge counts as inside
        }
        if sign == 0.0 {
            sign = cross.signum();
        } else if cross.signum() != sign {
            return false;
        }
    }
    true
}

impl std::fmt::Display for Costmap2D {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "Costmap2D ({}x{}, resolution: {:.3}m, origin: ({:.3}, {:.3}))",
            self.width, self.height, self.resolution, self.origin_x, self.origin_y
        )?;
        writeln!(f, "Legend: . = Free, X = Lethal, ? = Unknown")?;
        for y in (0..self.height).rev() {
            for x in 0..self.width {
                let symbol = match self.data[y * self.width + x] {
                    CellCost::Free => '.',
                    CellCost::Lethal => 'X',
                    CellCost::Unknown => '?',
                };
                write!(f, "{} ", symbol)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
