use config::{Config, ConfigError, File, FileFormat};
use serde::Deserialize;
use tracing::{error, info};

use talus_costmap::ElevationLayerConfig;

const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Geometry of the master cost buffer.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CostmapConfig {
    pub width: usize,
    pub height: usize,
    pub resolution: f32,
    pub origin_x: f32,
    pub origin_y: f32,
    pub rolling_window: bool,
}

impl Default for CostmapConfig {
    fn default() -> Self {
        Self {
            width: 40,
            height: 40,
            resolution: 0.1,
            origin_x: -2.0,
            origin_y: -2.0,
            rolling_window: false,
        }
    }
}

/// Robot geometry used for footprint clearing.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RobotConfig {
    pub footprint_length: f32,
    pub footprint_width: f32,
}

impl Default for RobotConfig {
    fn default() -> Self {
        Self {
            footprint_length: 0.6,
            footprint_width: 0.4,
        }
    }
}

/// Geometry and content of the synthetic elevation source.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TerrainConfig {
    pub width: usize,
    pub height: usize,
    pub resolution: f32,
    pub origin: [f32; 2],
    /// Uniform ground noise amplitude in meters (0 disables it).
    pub ground_noise: f32,
    /// Height of the step obstacle and the ramp crest, in meters.
    pub step_height: f32,
}

impl Default for TerrainConfig {
    fn default() -> Self {
        Self {
            width: 30,
            height: 30,
            resolution: 0.1,
            origin: [-1.5, -1.5],
            ground_noise: 0.005,
            step_height: 0.5,
        }
    }
}

/// Pacing of the demo simulation.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Synchronous update cycles to run before printing the result.
    pub cycles: u32,
    pub cycle_period_ms: u64,
    /// Elevation frames to publish.
    pub frames: u32,
    pub publish_period_ms: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            cycles: 30,
            cycle_period_ms: 100,
            frames: 4,
            publish_period_ms: 250,
        }
    }
}

/// Everything the application reads from `config/default.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub costmap: CostmapConfig,
    pub robot: RobotConfig,
    pub terrain: TerrainConfig,
    pub elevation: ElevationLayerConfig,
    pub sim: SimConfig,
}

pub fn load_config() -> Result<AppConfig, ConfigError> {
    info!("Attempting to load configuration from {}", DEFAULT_CONFIG_PATH);

    let settings = Config::builder()
        .add_source(File::new(DEFAULT_CONFIG_PATH, FileFormat::Toml).required(true))
        .build();

    match settings {
        Ok(config) => {
            let app = config.try_deserialize::<AppConfig>()?;
            info!("Successfully loaded configuration: {:?}", app);
            Ok(app)
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            Err(e)
        }
    }
}
