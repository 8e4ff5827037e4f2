//! Dense multi-layer height grid.
//!
//! A [`HeightGrid`] is a fixed-resolution 2D sampling of the terrain around
//! the robot. Each named layer (elevation, edge sharpness, ...) is a dense
//! float matrix sharing the grid's dimensions, resolution and origin. Cells
//! with no sample hold `NaN`.

use std::collections::HashMap;

use nalgebra::{DMatrix, Vector2};

use crate::error::GridError;

/// Transport-agnostic inbound grid message.
///
/// Producers publish the raw map in this form; [`HeightGrid::try_from_message`]
/// validates it into a usable grid. The layer payloads are row-major, one
/// `f32` per cell. `start_index` carries the circular-buffer offset some
/// producers use to avoid reallocating while the map window moves.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GridMessage {
    /// Reference frame the grid is expressed in.
    pub frame_id: String,
    /// Cell edge length in meters.
    pub resolution: f32,
    /// World coordinates of the corner of cell (0, 0), in meters.
    pub origin: [f32; 2],
    /// Number of cells along x.
    pub width: usize,
    /// Number of cells along y.
    pub height: usize,
    /// Circular-buffer start offset (x, y) of the logical (0, 0) cell.
    pub start_index: (usize, usize),
    /// Named row-major layer payloads of `width * height` values each.
    pub layers: Vec<(String, Vec<f32>)>,
}

/// A dense 2D height field with named scalar layers.
///
/// All layers share the grid geometry; that invariant is enforced on every
/// insertion. Logical cell `(x, y)` accessors see through the circular-buffer
/// start index, so callers never need to care how the storage is rotated.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HeightGrid {
    frame_id: String,
    resolution: f32,
    origin: Vector2<f32>,
    width: usize,
    height: usize,
    start_index: (usize, usize),
    layers: HashMap<String, DMatrix<f32>>,
}

impl HeightGrid {
    /// Creates an empty grid with the given geometry and no layers.
    ///
    /// # Arguments
    /// * `frame_id` - Reference frame identifier
    /// * `width` - Number of cells along x
    /// * `height` - Number of cells along y
    /// * `resolution` - Cell edge length in meters
    /// * `origin` - World coordinates of the corner of cell (0, 0)
    pub fn new(
        frame_id: impl Into<String>,
        width: usize,
        height: usize,
        resolution: f32,
        origin: Vector2<f32>,
    ) -> Result<Self, GridError> {
        if resolution <= 0.0 {
            return Err(GridError::InvalidResolution("resolution must be positive"));
        }
        if width == 0 || height == 0 {
            return Err(GridError::InvalidDimensions(
                "width and height must be non-zero",
            ));
        }
        if width.checked_mul(height).is_none() {
            return Err(GridError::InvalidDimensions(
                "grid dimensions too large, would cause overflow",
            ));
        }

        Ok(HeightGrid {
            frame_id: frame_id.into(),
            resolution,
            origin,
            width,
            height,
            start_index: (0, 0),
            layers: HashMap::new(),
        })
    }

    /// Validates a [`GridMessage`] into a grid.
    ///
    /// Fails when the geometry is invalid or any layer payload disagrees with
    /// the advertised dimensions. The start index is carried over as-is; call
    /// [`HeightGrid::to_default_start_index`] before interop with consumers
    /// that assume canonical storage.
    pub fn try_from_message(msg: &GridMessage) -> Result<Self, GridError> {
        let mut grid = HeightGrid::new(
            msg.frame_id.clone(),
            msg.width,
            msg.height,
            msg.resolution,
            Vector2::new(msg.origin[0], msg.origin[1]),
        )?;
        grid.start_index = (
            msg.start_index.0 % msg.width,
            msg.start_index.1 % msg.height,
        );
        for (name, values) in &msg.layers {
            let expected = msg.width * msg.height;
            if values.len() != expected {
                return Err(GridError::LayerSize {
                    name: name.clone(),
                    expected,
                    actual: values.len(),
                });
            }
            grid.layers.insert(
                name.clone(),
                DMatrix::from_row_slice(msg.height, msg.width, values),
            );
        }
        Ok(grid)
    }

    /// Reference frame the grid is expressed in.
    pub fn frame_id(&self) -> &str {
        &self.frame_id
    }

    /// Cell edge length in meters.
    pub fn resolution(&self) -> f32 {
        self.resolution
    }

    /// World coordinates of the corner of cell (0, 0).
    pub fn origin(&self) -> Vector2<f32> {
        self.origin
    }

    /// Number of cells along x.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Number of cells along y.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Physical size of the grid in meters along (x, y).
    pub fn size_in_meters(&self) -> Vector2<f32> {
        Vector2::new(
            self.width as f32 * self.resolution,
            self.height as f32 * self.resolution,
        )
    }

    /// Returns true if any layer is present under `name`.
    pub fn has_layer(&self, name: &str) -> bool {
        self.layers.contains_key(name)
    }

    /// Names of all layers, in arbitrary order.
    pub fn layer_names(&self) -> impl Iterator<Item = &str> {
        self.layers.keys().map(String::as_str)
    }

    /// Adds a layer filled with a constant value, replacing any previous
    /// layer of the same name.
    pub fn add_layer(&mut self, name: impl Into<String>, fill: f32) {
        self.layers.insert(
            name.into(),
            DMatrix::from_element(self.height, self.width, fill),
        );
    }

    /// Adds a layer from row-major values, replacing any previous layer of
    /// the same name. Fails when the value count does not match the grid.
    pub fn add_layer_from(
        &mut self,
        name: impl Into<String>,
        values: &[f32],
    ) -> Result<(), GridError> {
        let name = name.into();
        let expected = self.width * self.height;
        if values.len() != expected {
            return Err(GridError::LayerSize {
                name,
                expected,
                actual: values.len(),
            });
        }
        self.layers
            .insert(name, DMatrix::from_row_slice(self.height, self.width, values));
        Ok(())
    }

    /// Storage coordinates of logical cell (x, y), accounting for the
    /// circular-buffer start index.
    fn storage_index(&self, x: usize, y: usize) -> (usize, usize) {
        (
            (y + self.start_index.1) % self.height,
            (x + self.start_index.0) % self.width,
        )
    }

    /// Value of `layer` at logical cell (x, y).
    pub fn get(&self, layer: &str, x: usize, y: usize) -> Result<f32, GridError> {
        if x >= self.width || y >= self.height {
            return Err(GridError::OutOfBounds("cell index outside the grid"));
        }
        let matrix = self
            .layers
            .get(layer)
            .ok_or_else(|| GridError::UnknownLayer(layer.to_string()))?;
        let (row, col) = self.storage_index(x, y);
        Ok(matrix[(row, col)])
    }

    /// Sets `layer` at logical cell (x, y).
    pub fn set(&mut self, layer: &str, x: usize, y: usize, value: f32) -> Result<(), GridError> {
        if x >= self.width || y >= self.height {
            return Err(GridError::OutOfBounds("cell index outside the grid"));
        }
        let (row, col) = self.storage_index(x, y);
        let matrix = self
            .layers
            .get_mut(layer)
            .ok_or_else(|| GridError::UnknownLayer(layer.to_string()))?;
        matrix[(row, col)] = value;
        Ok(())
    }

    /// World coordinates of the center of logical cell (x, y).
    ///
    /// Out-of-range indices return `None` rather than extrapolating.
    pub fn cell_position(&self, x: usize, y: usize) -> Option<Vector2<f32>> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(Vector2::new(
            self.origin.x + (x as f32 + 0.5) * self.resolution,
            self.origin.y + (y as f32 + 0.5) * self.resolution,
        ))
    }

    /// Logical cell containing the world position, or `None` outside the grid.
    pub fn index_at(&self, position: Vector2<f32>) -> Option<(usize, usize)> {
        let gx = (position.x - self.origin.x) / self.resolution;
        let gy = (position.y - self.origin.y) / self.resolution;
        if gx < 0.0 || gy < 0.0 || gx >= self.width as f32 || gy >= self.height as f32 {
            return None;
        }
        Some((gx.floor() as usize, gy.floor() as usize))
    }

    /// Iterates over all logical cell indices in row order.
    pub fn indices(&self) -> impl Iterator<Item = (usize, usize)> + use<> {
        let width = self.width;
        (0..self.height).flat_map(move |y| (0..width).map(move |x| (x, y)))
    }

    /// Rewrites the storage so the start index becomes (0, 0).
    ///
    /// Logical cell values are unchanged; only the backing matrices are
    /// rotated. A no-op when the start index is already canonical.
    pub fn to_default_start_index(&mut self) {
        if self.start_index == (0, 0) {
            return;
        }
        let (sx, sy) = self.start_index;
        let (width, height) = (self.width, self.height);
        for matrix in self.layers.values_mut() {
            let rotated = DMatrix::from_fn(height, width, |row, col| {
                matrix[((row + sy) % height, (col + sx) % width)]
            });
            *matrix = rotated;
        }
        self.start_index = (0, 0);
    }
}
