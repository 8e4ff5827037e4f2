//! The layer capability interface and the host that drives it.
//!
//! Layers are concrete components registered explicitly with a
//! [`LayeredCostmap`]; the host drives the synchronous update cycle
//! (bounds pass, then cost pass) at whatever rate the application chooses.

use tracing::debug;

use crate::error::CostmapError;
use crate::map::{Bounds, CellRegion, Costmap2D, Pose2, WorldPoint};

/// A costmap layer driven by the synchronous update cycle.
///
/// One cycle is `update_bounds` on every layer (folding the dirty region),
/// then `update_costs` on every layer over that region. Lifecycle methods
/// let the host pause, resume or fully reset a layer between cycles.
pub trait Layer: Send {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Expands `bounds` to cover everything this layer must repaint for the
    /// given robot pose. Must never shrink the bounds it is handed.
    fn update_bounds(&mut self, pose: Pose2, bounds: &mut Bounds);

    /// Paints this layer's contribution into `master` over `region`.
    fn update_costs(
        &mut self,
        master: &mut Costmap2D,
        region: CellRegion,
    ) -> Result<(), CostmapError>;

    /// Resumes consuming input after a `deactivate`.
    fn activate(&mut self) {}

    /// Stops consuming new input; in-flight updates still complete.
    fn deactivate(&mut self) {}

    /// Drops all held state back to its initial configuration.
    fn reset(&mut self);

    /// Dynamic enable gate; a disabled layer contributes nothing.
    fn set_enabled(&mut self, enabled: bool);
}

/// Host that owns the master cost buffer and the registered layers.
pub struct LayeredCostmap {
    master: Costmap2D,
    rolling_window: bool,
    layers: Vec<Box<dyn Layer>>,
}

impl LayeredCostmap {
    /// Creates a host around a master buffer.
    ///
    /// # Arguments
    /// * `master` - The aggregation buffer layers composite into
    /// * `rolling_window` - Keep the buffer centered on the robot
    pub fn new(master: Costmap2D, rolling_window: bool) -> Self {
        Self {
            master,
            rolling_window,
            layers: Vec::new(),
        }
    }

    /// Registers a layer at the end of the compositing order.
    pub fn add_layer(&mut self, layer: Box<dyn Layer>) {
        self.layers.push(layer);
    }

    /// The master cost buffer.
    pub fn master(&self) -> &Costmap2D {
        &self.master
    }

    /// Whether the master window follows the robot.
    pub fn is_rolling(&self) -> bool {
        self.rolling_window
    }

    /// Runs one full update cycle and returns the repainted region.
    ///
    /// Repositions the master window first when rolling, so the dirty region
    /// is computed against the final coordinate mapping.
    pub fn update_map(&mut self, pose: Pose2) -> Result<CellRegion, CostmapError> {
        if self.rolling_window {
            let new_origin = WorldPoint::new(
                pose.x - self.master.size_in_meters_x() / 2.0,
                pose.y - self.master.size_in_meters_y() / 2.0,
            );
            self.master.update_origin(new_origin);
        }

        let mut bounds = Bounds::empty();
        for layer in &mut self.layers {
            layer.update_bounds(pose, &mut bounds);
        }
        let region = self.master.region_from_bounds(&bounds);
        debug!(?region, "Update cycle bounds resolved");

        for layer in &mut self.layers {
            layer.update_costs(&mut self.master, region)?;
        }
        Ok(region)
    }

    /// Activates every registered layer.
    pub fn activate(&mut self) {
        for layer in &mut self.layers {
            layer.activate();
        }
    }

    /// Deactivates every registered layer.
    pub fn deactivate(&mut self) {
        for layer in &mut self.layers {
            layer.deactivate();
        }
    }

    /// Resets every layer and repaints the master buffer to its default.
    pub fn reset(&mut self) {
        for layer in &mut self.layers {
            layer.reset();
        }
        self.master.reset_to_default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::{CellCost, GridPoint};

    /// Minimal layer that stamps one lethal cell at the robot position.
    struct StampLayer {
        enabled: bool,
    }

    impl Layer for StampLayer {
        fn name(&self) -> &str {
            "stamp"
        }

        fn update_bounds(&mut self, pose: Pose2, bounds: &mut Bounds) {
            if self.enabled {
                bounds.touch(pose.x, pose.y);
            }
        }

        fn update_costs(
            &mut self,
            master: &mut Costmap2D,
            region: CellRegion,
        ) -> Result<(), CostmapError> {
            if !self.enabled {
                return Ok(());
            }
            for cell in region.cells() {
                master.set_cost(cell, CellCost::Lethal)?;
            }
            Ok(())
        }

        fn reset(&mut self) {}

        fn set_enabled(&mut self, enabled: bool) {
            self.enabled = enabled;
        }
    }

    fn host(rolling: bool) -> LayeredCostmap {
        let master = Costmap2D::new(
            10,
            10,
            0.1,
            WorldPoint::new(0.0, 0.0),
            CellCost::Free,
        )
        .unwrap();
        let mut host = LayeredCostmap::new(master, rolling);
        host.add_layer(Box::new(StampLayer { enabled: true }));
        host
    }

    #[test]
    fn test_cycle_paints_dirty_region() {
        let mut host = host(false);
        let region = host.update_map(Pose2::new(0.55, 0.55, 0.0)).unwrap();
        assert!(!region.is_empty());
        assert_eq!(
            host.master().get_cost(GridPoint::new(5, 5)).unwrap(),
            CellCost::Lethal
        );
    }

    #[test]
    fn test_disabled_layer_contributes_nothing() {
        let mut host = host(false);
        for layer in &mut host.layers {
            layer.set_enabled(false);
        }
        let region = host.update_map(Pose2::new(0.55, 0.55, 0.0)).unwrap();
        assert!(region.is_empty());
        assert!(host
            .master()
            .data()
            .iter()
            .all(|&c| c == CellCost::Free));
    }

    #[test]
    fn test_rolling_window_recenters_master() {
        let mut host = host(true);
        host.update_map(Pose2::new(2.0, 2.0, 0.0)).unwrap();
        // 10 cells at 0.1 m => the window is 1 m; origin = robot - half size.
        assert!((host.master().origin().x - 1.5).abs() < 1e-6);
        assert!((host.master().origin().y - 1.5).abs() < 1e-6);
    }
}
