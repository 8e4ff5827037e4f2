use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::broadcast;
use tokio::time;
use tracing::{debug, info, warn};

use talus_gridmap::GridMessage;

use crate::config::TerrainConfig;

// World-space features of the synthetic terrain, relative to the map window.
// A step obstacle sits in the upper-right quadrant; a ramp of the same crest
// height rises along the left edge so the sharpness refinement has something
// to wave through.
const STEP_MIN: [f32; 2] = [0.5, 0.5];
const STEP_MAX: [f32; 2] = [0.9, 0.9];
const RAMP_X_START: f32 = -1.3;
const RAMP_X_END: f32 = -0.3;
const RAMP_Y_MIN: f32 = -0.4;
const RAMP_Y_MAX: f32 = 0.4;

/// Builds one synthetic elevation frame: noisy flat ground, a sheer step
/// obstacle and a gentle ramp.
pub fn synth_frame(terrain: &TerrainConfig, frame_id: &str) -> GridMessage {
    let mut rng = rand::rng();
    let mut elevation = vec![0.0f32; terrain.width * terrain.height];
    for y in 0..terrain.height {
        for x in 0..terrain.width {
            let wx = terrain.origin[0] + (x as f32 + 0.5) * terrain.resolution;
            let wy = terrain.origin[1] + (y as f32 + 0.5) * terrain.resolution;

            let mut z = if terrain.ground_noise > 0.0 {
                rng.random_range(-terrain.ground_noise..terrain.ground_noise)
            } else {
                0.0
            };
            if wx >= STEP_MIN[0] && wx <= STEP_MAX[0] && wy >= STEP_MIN[1] && wy <= STEP_MAX[1] {
                z = terrain.step_height;
            } else if wx >= RAMP_X_START
                && wx <= RAMP_X_END
                && wy >= RAMP_Y_MIN
                && wy <= RAMP_Y_MAX
            {
                let ascent = (wx - RAMP_X_START) / (RAMP_X_END - RAMP_X_START);
                z = terrain.step_height * ascent;
            }
            elevation[y * terrain.width + x] = z;
        }
    }

    GridMessage {
        frame_id: frame_id.to_string(),
        resolution: terrain.resolution,
        origin: terrain.origin,
        width: terrain.width,
        height: terrain.height,
        start_index: (0, 0),
        layers: vec![("elevation".to_string(), elevation)],
    }
}

/// Publishes `frames` synthetic elevation frames at a fixed period, then
/// drops the sender so downstream consumers see the topic close.
pub async fn run_terrain_source(
    tx: broadcast::Sender<Arc<GridMessage>>,
    terrain: TerrainConfig,
    frame_id: String,
    frames: u32,
    period: Duration,
) -> anyhow::Result<()> {
    info!("Terrain source task started.");
    let mut ticker = time::interval(period);
    for frame in 0..frames {
        ticker.tick().await;
        let msg = synth_frame(&terrain, &frame_id);
        if tx.receiver_count() > 0 {
            if let Err(e) = tx.send(Arc::new(msg)) {
                warn!("Failed to publish elevation frame: {}", e);
            }
        }
        debug!(frame, "Published elevation frame");
    }
    info!("Terrain source finished after {} frames.", frames);
    Ok(())
}
