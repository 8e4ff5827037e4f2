//! Robot footprint polygon and its pose transform.

use crate::map::{Pose2, WorldPoint};

/// The robot's outline as a convex polygon in the base frame.
///
/// Vertices are expressed relative to the robot center, in meters. An
/// instance with fewer than three vertices is considered invalid and clears
/// nothing.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Footprint {
    vertices: Vec<WorldPoint>,
}

impl Footprint {
    /// Creates a footprint from base-frame vertices.
    pub fn new(vertices: Vec<WorldPoint>) -> Self {
        Self { vertices }
    }

    /// Creates an axis-aligned rectangular footprint centered on the robot.
    ///
    /// # Arguments
    /// * `length` - Extent along the robot's x-axis in meters
    /// * `width` - Extent along the robot's y-axis in meters
    pub fn rectangle(length: f32, width: f32) -> Self {
        let half_l = length / 2.0;
        let half_w = width / 2.0;
        Self::new(vec![
            WorldPoint::new(-half_l, -half_w),
            WorldPoint::new(half_l, -half_w),
            WorldPoint::new(half_l, half_w),
            WorldPoint::new(-half_l, half_w),
        ])
    }

    /// True when the polygon has enough vertices to enclose area.
    pub fn is_valid(&self) -> bool {
        self.vertices.len() >= 3
    }

    /// Base-frame vertices.
    pub fn vertices(&self) -> &[WorldPoint] {
        &self.vertices
    }

    /// Transforms the footprint to world coordinates at the given pose.
    pub fn transform(&self, pose: Pose2) -> Vec<WorldPoint> {
        let (sin, cos) = pose.theta.sin_cos();
        self.vertices
            .iter()
            .map(|v| {
                WorldPoint::new(
                    pose.x + v.x * cos - v.y * sin,
                    pose.y + v.x * sin + v.y * cos,
                )
            })
            .collect()
    }
}
