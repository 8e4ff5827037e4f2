mod config;
mod terrain;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time;
use tracing::{debug, info, warn};
use tracing_subscriber::{self, EnvFilter};

use talus_costmap::{
    CellCost, Costmap2D, ElevationLayer, Footprint, LayeredCostmap, Pose2, WorldPoint,
    run_map_ingest,
};
use talus_gridmap::GridMessage;

use crate::config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    info!("Talus costmap demo started. Loading configuration...");
    let app: AppConfig = match config::load_config() {
        Ok(app) => app,
        Err(e) => {
            warn!("Falling back to built-in defaults: {}", e);
            AppConfig::default()
        }
    };

    run(app).await
}

async fn run(app: AppConfig) -> anyhow::Result<()> {
    let default_value = if app.elevation.track_unknown_space {
        CellCost::Unknown
    } else {
        CellCost::Free
    };
    let master = Costmap2D::new(
        app.costmap.width,
        app.costmap.height,
        app.costmap.resolution,
        WorldPoint::new(app.costmap.origin_x, app.costmap.origin_y),
        default_value,
    )?;
    let mut layered = LayeredCostmap::new(master, app.costmap.rolling_window);

    let footprint = Footprint::rectangle(app.robot.footprint_length, app.robot.footprint_width);
    let (layer, ingestor) = ElevationLayer::new(
        app.elevation.clone(),
        footprint,
        layered.master(),
        app.costmap.rolling_window,
    )?;
    layered.add_layer(Box::new(layer));

    // One bounded topic carries elevation frames from the source to the
    // ingest task; the layer sees them through its shared state.
    let (grid_tx, mut grid_rx) = broadcast::channel::<Arc<GridMessage>>(4);

    info!("Spawning terrain source and map ingest tasks...");
    let source = tokio::spawn(terrain::run_terrain_source(
        grid_tx,
        app.terrain.clone(),
        app.elevation.global_frame.clone(),
        app.sim.frames,
        Duration::from_millis(app.sim.publish_period_ms),
    ));
    let ingest = tokio::spawn(async move { run_map_ingest(ingestor, &mut grid_rx).await });

    // The synchronous update cycle: the robot idles through a slow circle
    // while the layer repaints whatever region the current map dirties.
    let mut ticker = time::interval(Duration::from_millis(app.sim.cycle_period_ms));
    for tick in 0..app.sim.cycles {
        ticker.tick().await;
        let angle = tick as f32 * 0.1;
        let pose = Pose2::new(0.4 * angle.cos(), 0.4 * angle.sin(), angle);
        let region = layered.update_map(pose)?;
        debug!(tick, ?region, "Update cycle completed");
    }

    source.await??;
    ingest.await??;

    info!("Simulation finished; master costmap follows.");
    println!("{}", layered.master());
    Ok(())
}
