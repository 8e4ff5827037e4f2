//! Filter pipeline applied to incoming grids before they are trusted.
//!
//! Consumers treat the pipeline as a black box: a [`FilterChain`] takes a
//! [`HeightGrid`] and produces a derived one or fails. Two stock filters are
//! provided, matching the usual elevation deployment: window-mean smoothing
//! of the height layer and an edge-sharpness layer derived from its gradient.

use nalgebra::DMatrix;

use crate::error::FilterError;
use crate::grid::HeightGrid;

/// A single transform in the grid filter pipeline.
pub trait GridFilter: Send + Sync {
    /// Stable name the filter is registered under.
    fn name(&self) -> &str;

    /// Produces a derived grid from `input`, or fails without side effects.
    fn apply(&self, input: &HeightGrid) -> Result<HeightGrid, FilterError>;
}

/// An ordered pipeline of [`GridFilter`]s.
///
/// `apply` threads the grid through every filter in registration order; the
/// first failure aborts the chain. An empty chain is the identity.
#[derive(Default)]
pub struct FilterChain {
    filters: Vec<Box<dyn GridFilter>>,
}

impl FilterChain {
    /// Creates an empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a chain from registered filter names.
    ///
    /// Known names: `mean_smooth`, `edge_sharpness`. An unknown name fails
    /// the whole configuration, which callers treat as "pipeline not
    /// configured" rather than a hard error.
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Result<Self, FilterError> {
        let mut chain = FilterChain::new();
        for name in names {
            match name.as_ref() {
                "mean_smooth" => chain.push(Box::new(MeanSmoothFilter::default())),
                "edge_sharpness" => chain.push(Box::new(SharpnessFilter::default())),
                other => return Err(FilterError::UnknownFilter(other.to_string())),
            }
        }
        Ok(chain)
    }

    /// Appends a filter to the end of the chain.
    pub fn push(&mut self, filter: Box<dyn GridFilter>) {
        self.filters.push(filter);
    }

    /// Number of filters in the chain.
    pub fn len(&self) -> usize {
        self.filters.len()
    }

    /// True when no filters are registered.
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Runs the whole chain over `input`.
    pub fn apply(&self, input: &HeightGrid) -> Result<HeightGrid, FilterError> {
        let mut grid = input.clone();
        for filter in &self.filters {
            grid = filter.apply(&grid)?;
        }
        Ok(grid)
    }
}

/// Replaces a layer with its window mean, ignoring `NaN` samples.
pub struct MeanSmoothFilter {
    layer: String,
    /// Half-width of the averaging window in cells.
    radius: usize,
}

impl MeanSmoothFilter {
    /// Creates a smoothing filter over `layer` with the given window radius.
    pub fn new(layer: impl Into<String>, radius: usize) -> Self {
        Self {
            layer: layer.into(),
            radius,
        }
    }
}

impl Default for MeanSmoothFilter {
    fn default() -> Self {
        Self::new("elevation", 1)
    }
}

impl GridFilter for MeanSmoothFilter {
    fn name(&self) -> &str {
        "mean_smooth"
    }

    fn apply(&self, input: &HeightGrid) -> Result<HeightGrid, FilterError> {
        if !input.has_layer(&self.layer) {
            return Err(FilterError::MissingLayer {
                filter: self.name().to_string(),
                layer: self.layer.clone(),
            });
        }
        let width = input.width();
        let height = input.height();
        if width == 0 || height == 0 {
            return Err(FilterError::EmptyGrid(self.name().to_string()));
        }

        let mut output = input.clone();
        let mut smoothed = DMatrix::from_element(height, width, f32::NAN);
        for (x, y) in input.indices() {
            let x_lo = x.saturating_sub(self.radius);
            let x_hi = (x + self.radius).min(width - 1);
            let y_lo = y.saturating_sub(self.radius);
            let y_hi = (y + self.radius).min(height - 1);

            let mut sum = 0.0;
            let mut count = 0u32;
            for wy in y_lo..=y_hi {
                for wx in x_lo..=x_hi {
                    let v = input
                        .get(&self.layer, wx, wy)
                        .expect("window index stays inside the grid");
                    if v.is_finite() {
                        sum += v;
                        count += 1;
                    }
                }
            }
            if count > 0 {
                smoothed[(y, x)] = sum / count as f32;
            }
        }
        for (x, y) in input.indices() {
            output
                .set(&self.layer, x, y, smoothed[(y, x)])
                .expect("layer exists and index is in bounds");
        }
        Ok(output)
    }
}

/// Derives an edge-sharpness layer from the height layer's gradient.
///
/// Sharpness is the central-difference gradient magnitude in m/m; a smooth
/// ramp scores low, a step obstacle scores high. Cells whose neighborhood
/// contains no finite sample stay `NaN`.
pub struct SharpnessFilter {
    input_layer: String,
    output_layer: String,
}

impl SharpnessFilter {
    /// Creates a sharpness filter reading `input_layer` and writing
    /// `output_layer`.
    pub fn new(input_layer: impl Into<String>, output_layer: impl Into<String>) -> Self {
        Self {
            input_layer: input_layer.into(),
            output_layer: output_layer.into(),
        }
    }
}

impl Default for SharpnessFilter {
    fn default() -> Self {
        Self::new("elevation", "edges")
    }
}

impl GridFilter for SharpnessFilter {
    fn name(&self) -> &str {
        "edge_sharpness"
    }

    fn apply(&self, input: &HeightGrid) -> Result<HeightGrid, FilterError> {
        if !input.has_layer(&self.input_layer) {
            return Err(FilterError::MissingLayer {
                filter: self.name().to_string(),
                layer: self.input_layer.clone(),
            });
        }
        let width = input.width();
        let height = input.height();
        if width == 0 || height == 0 {
            return Err(FilterError::EmptyGrid(self.name().to_string()));
        }

        let step = 2.0 * input.resolution();
        let mut output = input.clone();
        output.add_layer(&self.output_layer, f32::NAN);
        for (x, y) in input.indices() {
            let sample = |sx: usize, sy: usize| {
                input
                    .get(&self.input_layer, sx, sy)
                    .expect("clamped index stays inside the grid")
            };
            let dx = (sample((x + 1).min(width - 1), y) - sample(x.saturating_sub(1), y)) / step;
            let dy = (sample(x, (y + 1).min(height - 1)) - sample(x, y.saturating_sub(1))) / step;
            let magnitude = (dx * dx + dy * dy).sqrt();
            if magnitude.is_finite() {
                output
                    .set(&self.output_layer, x, y, magnitude)
                    .expect("output layer was just added");
            }
        }
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector2;

    fn flat_grid(fill: f32) -> HeightGrid {
        let mut grid = HeightGrid::new("map", 5, 5, 0.1, Vector2::zeros()).unwrap();
        grid.add_layer("elevation", fill);
        grid
    }

    #[test]
    fn test_chain_from_names() {
        let chain = FilterChain::from_names(&["mean_smooth", "edge_sharpness"]).unwrap();
        assert_eq!(chain.len(), 2);
        assert!(matches!(
            FilterChain::from_names(&["mean_smooth", "bogus"]),
            Err(FilterError::UnknownFilter(_))
        ));
    }

    #[test]
    fn test_empty_chain_is_identity() {
        let grid = flat_grid(0.3);
        let out = FilterChain::new().apply(&grid).unwrap();
        assert_eq!(out.get("elevation", 2, 2).unwrap(), 0.3);
    }

    #[test]
    fn test_mean_smooth_flattens_spike() {
        let mut grid = flat_grid(0.0);
        grid.set("elevation", 2, 2, 0.9).unwrap();
        let out = MeanSmoothFilter::default().apply(&grid).unwrap();
        let center = out.get("elevation", 2, 2).unwrap();
        assert!((center - 0.1).abs() < 1e-6); // 0.9 spread over a 3x3 window
        assert_eq!(out.get("elevation", 0, 0).unwrap(), 0.0);
    }

    #[test]
    fn test_mean_smooth_skips_nan() {
        let mut grid = flat_grid(0.2);
        grid.set("elevation", 1, 1, f32::NAN).unwrap();
        let out = MeanSmoothFilter::default().apply(&grid).unwrap();
        // The NaN sample is excluded from its neighbors' means, and its own
        // cell still averages over the valid neighborhood.
        assert!((out.get("elevation", 1, 1).unwrap() - 0.2).abs() < 1e-6);
        assert!((out.get("elevation", 0, 0).unwrap() - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_sharpness_on_step_and_flat() {
        let mut grid = flat_grid(0.0);
        // Vertical step between x=1 and x=2.
        for y in 0..5 {
            for x in 2..5 {
                grid.set("elevation", x, y, 0.5).unwrap();
            }
        }
        let out = SharpnessFilter::default().apply(&grid).unwrap();
        assert!(out.has_layer("edges"));
        // At the step the central difference spans the full 0.5 m rise.
        assert!(out.get("edges", 2, 2).unwrap() > 1.0);
        // Far from the step the terrain is flat.
        assert!(out.get("edges", 4, 4).unwrap() < 1e-6);
    }

    #[test]
    fn test_missing_layer_fails_chain() {
        let mut grid = HeightGrid::new("map", 3, 3, 0.1, Vector2::zeros()).unwrap();
        grid.add_layer("height", 0.0);
        let chain = FilterChain::from_names(&["edge_sharpness"]).unwrap();
        assert!(matches!(
            chain.apply(&grid),
            Err(FilterError::MissingLayer { .. })
        ));
    }
}
