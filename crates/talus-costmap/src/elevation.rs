//! Elevation-map costmap layer.
//!
//! Fuses an asynchronously arriving height grid with an edge-sharpness
//! signal into a free / lethal / unknown occupancy layer. The background
//! ingest path ([`MapIngestor`]) and the synchronous update cycle
//! ([`ElevationLayer`] driving bounds and cost passes) share one guarded
//! state cell; each cycle works on a single grid generation so a concurrent
//! map swap can never produce a half-old, half-new paint.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{info, warn};

use talus_gridmap::{FilterChain, GridMessage, HeightGrid};

use crate::error::CostmapError;
use crate::footprint::Footprint;
use crate::layer::Layer;
use crate::map::{Bounds, CellCost, CellRegion, Costmap2D, Pose2, WorldPoint};
use crate::throttle::Throttle;

/// Minimum spacing between repeats of the same recoverable warning.
const WARN_PERIOD: Duration = Duration::from_millis(200);

/// How a layer's local buffer is merged into the master buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CombinationMethod {
    /// Master cell := local cell, unconditionally.
    Overwrite,
    /// Master cell := the higher rank of the two (`Free < Unknown < Lethal`).
    Max,
    /// The layer paints its local buffer but contributes nothing.
    Nothing,
}

impl CombinationMethod {
    /// Maps the configuration integer: 0 = overwrite, 1 = max, else none.
    pub fn from_value(value: i64) -> Self {
        match value {
            0 => CombinationMethod::Overwrite,
            1 => CombinationMethod::Max,
            _ => CombinationMethod::Nothing,
        }
    }
}

/// Parameters of the elevation layer, immutable after initialization except
/// for the dynamic `enabled` gate.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ElevationLayerConfig {
    /// Dynamic gate; a disabled layer reports no bounds and paints nothing.
    pub enabled: bool,
    /// Source selector for the inbound grid stream (opaque to the layer).
    pub elevation_topic: String,
    /// Heights strictly above this classify as obstacle candidates (m).
    pub height_threshold: f32,
    /// Sharpness strictly below this downgrades a candidate to free.
    pub edges_sharpness_threshold: f32,
    /// Filter names applied to each incoming grid, in order. An empty list
    /// or an unknown name leaves the layer in raw-passthrough mode.
    pub filter_chain: Vec<String>,
    /// Name of the height layer in the incoming grid.
    pub elevation_layer_name: String,
    /// Name of the sharpness layer in the incoming grid.
    pub edges_layer_name: String,
    /// Force cells under the robot footprint to free after each paint.
    pub footprint_clearing_enabled: bool,
    /// Compositing selector: 0 = overwrite, 1 = max, else none.
    pub combination_method: i64,
    /// Unpainted cells default to unknown instead of free.
    pub track_unknown_space: bool,
    /// Frame incoming grids are expected in; a mismatch warns but proceeds.
    pub global_frame: String,
}

impl Default for ElevationLayerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            elevation_topic: "elevation_map".to_string(),
            height_threshold: 0.15,
            edges_sharpness_threshold: 1.0,
            filter_chain: vec!["mean_smooth".to_string(), "edge_sharpness".to_string()],
            elevation_layer_name: "elevation".to_string(),
            edges_layer_name: "edges".to_string(),
            footprint_clearing_enabled: true,
            combination_method: 1,
            track_unknown_space: true,
            global_frame: "odom".to_string(),
        }
    }
}

/// State shared between the ingest path and the synchronous cycle.
///
/// One lock covers the whole triple so a reader can never observe a new grid
/// paired with a stale threshold or vice versa.
#[derive(Debug)]
struct SharedElevationState {
    grid: Option<Arc<HeightGrid>>,
    received: bool,
    height_threshold: f32,
}

/// Grid generation pinned for the remainder of one update cycle.
struct CycleSnapshot {
    grid: Arc<HeightGrid>,
    height_threshold: f32,
}

/// Background half of the elevation layer: consumes raw grid messages,
/// filters them and commits the result into the shared state.
pub struct MapIngestor {
    shared: Arc<Mutex<SharedElevationState>>,
    active: Arc<AtomicBool>,
    filter_chain: Option<FilterChain>,
    global_frame: String,
    conversion_warn: Throttle,
    frame_warn: Throttle,
    filter_warn: Throttle,
}

impl MapIngestor {
    /// True when the configured filter chain loaded at initialization.
    pub fn is_filter_configured(&self) -> bool {
        self.filter_chain.is_some()
    }

    /// Handles one incoming grid message.
    ///
    /// Never fails: a malformed message keeps the previous grid, a filter
    /// failure stores the raw grid instead. Messages arriving while the
    /// layer is deactivated are dropped.
    pub fn on_message(&self, msg: &GridMessage) {
        if !self.active.load(Ordering::SeqCst) {
            return;
        }

        let mut grid = match HeightGrid::try_from_message(msg) {
            Ok(grid) => grid,
            Err(error) => {
                if self.conversion_warn.ready() {
                    warn!(%error, "Grid message conversion failed; keeping the previous map");
                }
                return;
            }
        };
        grid.to_default_start_index();

        if grid.frame_id() != self.global_frame && self.frame_warn.ready() {
            warn!(
                expected = %self.global_frame,
                actual = %grid.frame_id(),
                "Incoming elevation map frame differs from the configured global frame"
            );
        }

        let filtered = self.filter_chain.as_ref().map(|chain| chain.apply(&grid));
        let mut state = self.shared.lock();
        match filtered {
            Some(Ok(filtered)) => {
                state.grid = Some(Arc::new(filtered));
                // Sharpness peaks at mid-height of an obstacle, so every
                // filtered map halves the height cutoff.
                state.height_threshold /= 2.0;
            }
            Some(Err(error)) => {
                if self.filter_warn.ready() {
                    warn!(%error, "Could not use the filter chain; storing the raw map");
                }
                state.grid = Some(Arc::new(grid));
            }
            None => {
                state.grid = Some(Arc::new(grid));
            }
        }
        if !state.received {
            state.received = true;
        }
    }
}

/// Async ingest loop feeding a [`MapIngestor`] from a broadcast topic.
///
/// Lagging behind the publisher only skips stale maps; a closed topic ends
/// the task normally.
pub async fn run_map_ingest(
    ingestor: MapIngestor,
    rx: &mut broadcast::Receiver<Arc<GridMessage>>,
) -> anyhow::Result<()> {
    info!("Map ingest task started.");
    loop {
        match rx.recv().await {
            Ok(msg) => ingestor.on_message(&msg),
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!("Map ingest receiver lagged by {} messages.", n);
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => {
                info!("Elevation topic closed. Map ingest task finishing.");
                return Ok(());
            }
        }
    }
}

/// Synchronous half of the elevation layer.
///
/// Owns the local cost buffer and implements the [`Layer`] cycle: the bounds
/// pass pins the current grid generation and dirties every cell it covers,
/// the cost pass classifies each cell by height threshold with the optional
/// edge-sharpness refinement and composites the result into the master.
pub struct ElevationLayer {
    cfg: ElevationLayerConfig,
    combination_method: CombinationMethod,
    enabled: bool,
    shared: Arc<Mutex<SharedElevationState>>,
    active: Arc<AtomicBool>,
    local: Costmap2D,
    rolling_window: bool,
    footprint: Footprint,
    transformed_footprint: Vec<WorldPoint>,
    cycle: Option<CycleSnapshot>,
    edges_warn: Throttle,
    elevation_warn: Throttle,
}

impl ElevationLayer {
    /// Creates the layer and its background ingestor.
    ///
    /// The local buffer is sized to match `master` so compositing is a
    /// cell-for-cell operation, with its default value chosen by
    /// `track_unknown_space`. A filter chain that fails to configure leaves
    /// the ingestor in raw-passthrough mode with a warning; that is not an
    /// error.
    pub fn new(
        cfg: ElevationLayerConfig,
        footprint: Footprint,
        master: &Costmap2D,
        rolling_window: bool,
    ) -> Result<(Self, MapIngestor), CostmapError> {
        let filter_chain = if cfg.filter_chain.is_empty() {
            None
        } else {
            match FilterChain::from_names(&cfg.filter_chain) {
                Ok(chain) => Some(chain),
                Err(error) => {
                    warn!(%error, "Could not configure the filter chain!");
                    None
                }
            }
        };

        let default_value = if cfg.track_unknown_space {
            CellCost::Unknown
        } else {
            CellCost::Free
        };
        let local = Costmap2D::new(
            master.width(),
            master.height(),
            master.resolution(),
            master.origin(),
            default_value,
        )?;

        let shared = Arc::new(Mutex::new(SharedElevationState {
            grid: None,
            received: false,
            height_threshold: cfg.height_threshold,
        }));
        let active = Arc::new(AtomicBool::new(true));

        let ingestor = MapIngestor {
            shared: Arc::clone(&shared),
            active: Arc::clone(&active),
            filter_chain,
            global_frame: cfg.global_frame.clone(),
            conversion_warn: Throttle::new(WARN_PERIOD),
            frame_warn: Throttle::new(WARN_PERIOD),
            filter_warn: Throttle::new(WARN_PERIOD),
        };
        let layer = ElevationLayer {
            enabled: cfg.enabled,
            combination_method: CombinationMethod::from_value(cfg.combination_method),
            cfg,
            shared,
            active,
            local,
            rolling_window,
            footprint,
            transformed_footprint: Vec::new(),
            cycle: None,
            edges_warn: Throttle::new(WARN_PERIOD),
            elevation_warn: Throttle::new(WARN_PERIOD),
        };
        Ok((layer, ingestor))
    }

    /// Height threshold currently in effect (drifts down on filtered commits).
    pub fn current_height_threshold(&self) -> f32 {
        self.shared.lock().height_threshold
    }

    /// True once at least one grid has been committed.
    pub fn has_received(&self) -> bool {
        self.shared.lock().received
    }

    /// The layer's local cost buffer.
    pub fn local(&self) -> &Costmap2D {
        &self.local
    }

    fn update_footprint(&mut self, pose: Pose2, bounds: &mut Bounds) {
        if !self.cfg.footprint_clearing_enabled {
            return;
        }
        self.transformed_footprint = self.footprint.transform(pose);
        for vertex in &self.transformed_footprint {
            bounds.touch(vertex.x, vertex.y);
        }
    }
}

impl Layer for ElevationLayer {
    fn name(&self) -> &str {
        "elevation"
    }

    fn update_bounds(&mut self, pose: Pose2, bounds: &mut Bounds) {
        if self.rolling_window {
            self.local.update_origin(WorldPoint::new(
                pose.x - self.local.size_in_meters_x() / 2.0,
                pose.y - self.local.size_in_meters_y() / 2.0,
            ));
        }

        let state = self.shared.lock();
        if !(self.enabled && state.received) {
            self.cycle = None;
            return;
        }
        let Some(grid) = state.grid.as_ref().map(Arc::clone) else {
            self.cycle = None;
            return;
        };
        // Pin this cycle's grid generation and threshold together; the
        // ingestor may swap both at any point after the lock drops.
        let snapshot = CycleSnapshot {
            grid,
            height_threshold: state.height_threshold,
        };
        drop(state);

        for (x, y) in snapshot.grid.indices() {
            if let Some(pos) = snapshot.grid.cell_position(x, y) {
                bounds.touch(pos.x, pos.y);
            }
        }
        self.update_footprint(pose, bounds);
        self.cycle = Some(snapshot);
    }

    fn update_costs(
        &mut self,
        master: &mut Costmap2D,
        region: CellRegion,
    ) -> Result<(), CostmapError> {
        if !self.enabled {
            return Ok(());
        }
        let Some(snapshot) = &self.cycle else {
            return Ok(());
        };
        let grid = &snapshot.grid;
        let threshold = snapshot.height_threshold;

        if !grid.has_layer(&self.cfg.elevation_layer_name) {
            if self.elevation_warn.ready() {
                warn!(
                    layer = %self.cfg.elevation_layer_name,
                    "Elevation layer missing from the current map; nothing to classify"
                );
            }
            return Ok(());
        }
        let has_edges = grid.has_layer(&self.cfg.edges_layer_name);
        if !has_edges && self.edges_warn.ready() {
            warn!(
                layer = %self.cfg.edges_layer_name,
                "No edges layer found, classifying on height alone"
            );
        }

        for (x, y) in grid.indices() {
            let Some(pos) = grid.cell_position(x, y) else {
                continue;
            };
            // Outside the local window is not an error, just invisible.
            let Some(cell) = self.local.world_to_grid(WorldPoint::new(pos.x, pos.y)) else {
                continue;
            };
            let elevation = grid.get(&self.cfg.elevation_layer_name, x, y)?;
            let mut cost = if elevation > threshold {
                CellCost::Lethal
            } else {
                CellCost::Free
            };
            if cost == CellCost::Lethal && has_edges {
                let sharpness = grid.get(&self.cfg.edges_layer_name, x, y)?;
                // Tall but not sharp reads as a traversable ramp.
                if sharpness < self.cfg.edges_sharpness_threshold {
                    cost = CellCost::Free;
                }
            }
            self.local.set_cost(cell, cost)?;
        }

        if self.cfg.footprint_clearing_enabled {
            self.local
                .set_convex_polygon_cost(&self.transformed_footprint, CellCost::Free);
        }

        match self.combination_method {
            CombinationMethod::Overwrite => master.update_with_overwrite(&self.local, region)?,
            CombinationMethod::Max => master.update_with_max(&self.local, region)?,
            CombinationMethod::Nothing => {}
        }
        Ok(())
    }

    fn activate(&mut self) {
        self.active.store(true, Ordering::SeqCst);
    }

    fn deactivate(&mut self) {
        self.active.store(false, Ordering::SeqCst);
    }

    fn reset(&mut self) {
        self.deactivate();
        {
            let mut state = self.shared.lock();
            state.grid = None;
            state.received = false;
            state.height_threshold = self.cfg.height_threshold;
        }
        self.cycle = None;
        self.transformed_footprint.clear();
        self.local.reset_to_default();
        self.activate();
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::GridPoint;

    fn raw_config() -> ElevationLayerConfig {
        ElevationLayerConfig {
            height_threshold: 0.1,
            edges_sharpness_threshold: 0.05,
            filter_chain: Vec::new(),
            footprint_clearing_enabled: false,
            combination_method: 0,
            track_unknown_space: false,
            global_frame: "map".to_string(),
            ..ElevationLayerConfig::default()
        }
    }

    fn master_3x3() -> Costmap2D {
        Costmap2D::new(3, 3, 1.0, WorldPoint::new(0.0, 0.0), CellCost::Free).unwrap()
    }

    fn layer_with(cfg: ElevationLayerConfig) -> (ElevationLayer, MapIngestor, Costmap2D) {
        let master = master_3x3();
        let (layer, ingestor) =
            ElevationLayer::new(cfg, Footprint::rectangle(1.0, 1.0), &master, false).unwrap();
        (layer, ingestor, master)
    }

    fn message(elevation: &[f32]) -> GridMessage {
        GridMessage {
            frame_id: "map".to_string(),
            resolution: 1.0,
            origin: [0.0, 0.0],
            width: 3,
            height: 3,
            start_index: (0, 0),
            layers: vec![("elevation".to_string(), elevation.to_vec())],
        }
    }

    fn message_with_edges(elevation: &[f32], edges: &[f32]) -> GridMessage {
        let mut msg = message(elevation);
        msg.layers.push(("edges".to_string(), edges.to_vec()));
        msg
    }

    fn run_cycle(layer: &mut ElevationLayer, master: &mut Costmap2D, pose: Pose2) -> CellRegion {
        let mut bounds = Bounds::empty();
        layer.update_bounds(pose, &mut bounds);
        let region = master.region_from_bounds(&bounds);
        layer.update_costs(master, region).unwrap();
        region
    }

    #[test]
    fn test_noop_before_first_grid() {
        let (mut layer, _ingestor, mut master) = layer_with(raw_config());
        let region = run_cycle(&mut layer, &mut master, Pose2::default());
        assert!(region.is_empty());
        assert!(master.data().iter().all(|&c| c == CellCost::Free));
        assert!(!layer.has_received());
    }

    #[test]
    fn test_all_zero_grid_paints_free() {
        let (mut layer, ingestor, mut master) = layer_with(raw_config());
        ingestor.on_message(&message(&[0.0; 9]));
        assert!(layer.has_received());

        let region = run_cycle(&mut layer, &mut master, Pose2::default());
        assert!(!region.is_empty());
        assert!(master.data().iter().all(|&c| c == CellCost::Free));
    }

    #[test]
    fn test_tall_center_paints_lethal() {
        let (mut layer, ingestor, mut master) = layer_with(raw_config());
        let mut elevation = [0.0; 9];
        elevation[4] = 0.5; // cell (1, 1)
        ingestor.on_message(&message(&elevation));

        run_cycle(&mut layer, &mut master, Pose2::default());
        assert_eq!(
            master.get_cost(GridPoint::new(1, 1)).unwrap(),
            CellCost::Lethal
        );
        assert_eq!(master.get_cost(GridPoint::new(0, 0)).unwrap(), CellCost::Free);
        assert_eq!(master.get_cost(GridPoint::new(2, 2)).unwrap(), CellCost::Free);
    }

    #[test]
    fn test_unsharp_edge_overrides_to_free() {
        let (mut layer, ingestor, mut master) = layer_with(raw_config());
        let mut elevation = [0.0; 9];
        elevation[4] = 0.5;
        let mut edges = [1.0; 9];
        edges[4] = 0.01; // below the 0.05 sharpness threshold
        ingestor.on_message(&message_with_edges(&elevation, &edges));

        run_cycle(&mut layer, &mut master, Pose2::default());
        assert_eq!(master.get_cost(GridPoint::new(1, 1)).unwrap(), CellCost::Free);
    }

    #[test]
    fn test_boundary_values_classify_non_obstacle() {
        let (mut layer, ingestor, mut master) = layer_with(raw_config());
        // Elevation exactly at the threshold stays free (strict >).
        ingestor.on_message(&message(&[0.1; 9]));
        run_cycle(&mut layer, &mut master, Pose2::default());
        assert!(master.data().iter().all(|&c| c == CellCost::Free));

        // Sharpness exactly at the threshold does not trigger the override.
        let mut elevation = [0.0; 9];
        elevation[4] = 0.5;
        let mut edges = [1.0; 9];
        edges[4] = 0.05;
        ingestor.on_message(&message_with_edges(&elevation, &edges));
        run_cycle(&mut layer, &mut master, Pose2::default());
        assert_eq!(
            master.get_cost(GridPoint::new(1, 1)).unwrap(),
            CellCost::Lethal
        );
    }

    #[test]
    fn test_nan_elevation_classifies_free() {
        let (mut layer, ingestor, mut master) = layer_with(raw_config());
        let mut elevation = [0.5; 9];
        elevation[0] = f32::NAN;
        ingestor.on_message(&message(&elevation));
        run_cycle(&mut layer, &mut master, Pose2::default());
        assert_eq!(master.get_cost(GridPoint::new(0, 0)).unwrap(), CellCost::Free);
        assert_eq!(
            master.get_cost(GridPoint::new(1, 1)).unwrap(),
            CellCost::Lethal
        );
    }

    #[test]
    fn test_threshold_halves_per_filtered_commit() {
        let mut cfg = raw_config();
        cfg.filter_chain = vec!["mean_smooth".to_string()];
        let (layer, ingestor, _master) = layer_with(cfg);
        assert!(ingestor.is_filter_configured());
        assert_eq!(layer.current_height_threshold(), 0.1);

        // Smoothing a uniform grid is a no-op, so only the drift is visible.
        for _ in 0..3 {
            ingestor.on_message(&message(&[0.0; 9]));
        }
        assert!((layer.current_height_threshold() - 0.1 / 8.0).abs() < 1e-9);
    }

    #[test]
    fn test_filter_failure_stores_raw_and_keeps_threshold() {
        let mut cfg = raw_config();
        cfg.filter_chain = vec!["mean_smooth".to_string()];
        let (layer, ingestor, _master) = layer_with(cfg);

        // The smoothing filter wants an "elevation" layer this message lacks.
        let mut msg = message(&[0.5; 9]);
        msg.layers[0].0 = "height".to_string();
        ingestor.on_message(&msg);

        assert!(layer.has_received());
        assert_eq!(layer.current_height_threshold(), 0.1);
    }

    #[test]
    fn test_unknown_filter_means_raw_passthrough() {
        let mut cfg = raw_config();
        cfg.filter_chain = vec!["bogus".to_string()];
        let (layer, ingestor, _master) = layer_with(cfg);
        assert!(!ingestor.is_filter_configured());

        ingestor.on_message(&message(&[0.0; 9]));
        assert!(layer.has_received());
        assert_eq!(layer.current_height_threshold(), 0.1);
    }

    #[test]
    fn test_malformed_message_keeps_previous_grid() {
        let (mut layer, ingestor, mut master) = layer_with(raw_config());
        ingestor.on_message(&message(&[0.5; 9]));

        // Payload shorter than the advertised dimensions.
        let mut bad = message(&[0.0; 9]);
        bad.layers[0].1.pop();
        ingestor.on_message(&bad);

        run_cycle(&mut layer, &mut master, Pose2::default());
        // Still classifying from the first (tall) grid.
        assert!(master.data().iter().all(|&c| c == CellCost::Lethal));
    }

    #[test]
    fn test_footprint_clearing_takes_precedence() {
        let mut cfg = raw_config();
        cfg.footprint_clearing_enabled = true;
        let (mut layer, ingestor, mut master) = layer_with(cfg);
        ingestor.on_message(&message(&[0.5; 9]));

        run_cycle(&mut layer, &mut master, Pose2::new(1.5, 1.5, 0.0));
        // The 1x1 m footprint covers only the center cell.
        assert_eq!(master.get_cost(GridPoint::new(1, 1)).unwrap(), CellCost::Free);
        assert_eq!(
            master.get_cost(GridPoint::new(0, 0)).unwrap(),
            CellCost::Lethal
        );
    }

    #[test]
    fn test_repeated_rasterize_is_idempotent() {
        let (mut layer, ingestor, mut master) = layer_with(raw_config());
        let mut elevation = [0.0; 9];
        elevation[4] = 0.5;
        ingestor.on_message(&message(&elevation));

        let region = run_cycle(&mut layer, &mut master, Pose2::default());
        let first: Vec<CellCost> = master.data().to_vec();
        layer.update_costs(&mut master, region).unwrap();
        assert_eq!(master.data(), first.as_slice());
    }

    #[test]
    fn test_cycle_uses_one_grid_generation() {
        let (mut layer, ingestor, mut master) = layer_with(raw_config());
        ingestor.on_message(&message(&[0.0; 9]));

        let mut bounds = Bounds::empty();
        layer.update_bounds(Pose2::default(), &mut bounds);
        // A new, all-obstacle grid lands between the two passes.
        ingestor.on_message(&message(&[5.0; 9]));
        let region = master.region_from_bounds(&bounds);
        layer.update_costs(&mut master, region).unwrap();

        // The paint reflects the generation pinned at bounds time.
        assert!(master.data().iter().all(|&c| c == CellCost::Free));

        // The next cycle picks up the swap.
        run_cycle(&mut layer, &mut master, Pose2::default());
        assert!(master.data().iter().all(|&c| c == CellCost::Lethal));
    }

    #[test]
    fn test_disabled_layer_is_inert() {
        let (mut layer, ingestor, mut master) = layer_with(raw_config());
        ingestor.on_message(&message(&[5.0; 9]));
        layer.set_enabled(false);

        let region = run_cycle(&mut layer, &mut master, Pose2::default());
        assert!(region.is_empty());
        assert!(master.data().iter().all(|&c| c == CellCost::Free));
    }

    #[test]
    fn test_deactivate_drops_messages() {
        let (mut layer, ingestor, _master) = layer_with(raw_config());
        layer.deactivate();
        ingestor.on_message(&message(&[0.0; 9]));
        assert!(!layer.has_received());

        layer.activate();
        ingestor.on_message(&message(&[0.0; 9]));
        assert!(layer.has_received());
    }

    #[test]
    fn test_reset_restores_initial_state() {
        let mut cfg = raw_config();
        cfg.filter_chain = vec!["mean_smooth".to_string()];
        cfg.track_unknown_space = true;
        let (mut layer, ingestor, mut master) = layer_with(cfg);
        ingestor.on_message(&message(&[5.0; 9]));
        run_cycle(&mut layer, &mut master, Pose2::default());
        assert!(layer.current_height_threshold() < 0.1);

        layer.reset();
        assert!(!layer.has_received());
        assert_eq!(layer.current_height_threshold(), 0.1);
        assert!(layer.local().data().iter().all(|&c| c == CellCost::Unknown));

        // Reset re-activates the subscription.
        ingestor.on_message(&message(&[0.0; 9]));
        assert!(layer.has_received());
    }

    #[test]
    fn test_combination_none_paints_nothing() {
        let mut cfg = raw_config();
        cfg.combination_method = 2;
        let (mut layer, ingestor, mut master) = layer_with(cfg);
        ingestor.on_message(&message(&[5.0; 9]));

        run_cycle(&mut layer, &mut master, Pose2::default());
        assert!(master.data().iter().all(|&c| c == CellCost::Free));
    }

    #[test]
    fn test_combination_max_keeps_master_obstacles() {
        let mut cfg = raw_config();
        cfg.combination_method = 1;
        let (mut layer, ingestor, mut master) = layer_with(cfg);
        master
            .set_cost(GridPoint::new(0, 0), CellCost::Lethal)
            .unwrap();
        ingestor.on_message(&message(&[0.0; 9]));

        run_cycle(&mut layer, &mut master, Pose2::default());
        // The layer paints free, but max compositing keeps the obstacle.
        assert_eq!(
            master.get_cost(GridPoint::new(0, 0)).unwrap(),
            CellCost::Lethal
        );
    }

    #[test]
    fn test_concurrent_ingest_never_tears_a_cycle() {
        let (mut layer, ingestor, mut master) = layer_with(raw_config());
        ingestor.on_message(&message(&[0.0; 9]));

        let writer = std::thread::spawn(move || {
            for i in 0..200 {
                let fill = if i % 2 == 0 { 0.0 } else { 5.0 };
                ingestor.on_message(&message(&[fill; 9]));
            }
        });

        for _ in 0..200 {
            let region = run_cycle(&mut layer, &mut master, Pose2::default());
            if region.is_empty() {
                continue;
            }
            // Both source grids are uniform, so any mixed paint would mean
            // two generations leaked into one cycle.
            let first = master.data()[0];
            assert!(master.data().iter().all(|&c| c == first));
        }
        writer.join().unwrap();
    }

    #[tokio::test]
    async fn test_ingest_task_consumes_topic() {
        let (layer, ingestor, _master) = layer_with(raw_config());
        let (tx, mut rx) = broadcast::channel(4);

        let task = tokio::spawn(async move { run_map_ingest(ingestor, &mut rx).await });
        tx.send(Arc::new(message(&[0.0; 9]))).unwrap();
        drop(tx);

        task.await.unwrap().unwrap();
        assert!(layer.has_received());
    }
}
