//! User configuration: `<config_dir>/gyro3d/config.toml`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

pub const DEFAULT_ENDPOINT: &str = "http://localhost:8080";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Telemetry device base URL, e.g. `http://192.168.1.40`.
    pub endpoint_url: String,
    /// Render ticks per second.
    pub frame_rate: u32,
    /// Radians added per rotate key press.
    pub rotate_step: f32,
    /// Scale change per scale key press.
    pub scale_step: f32,
    /// Log file. `None` means `<config_dir>/gyro3d/gyro3d.log`.
    pub log_file: Option<PathBuf>,
    /// Open the telemetry stream at startup.
    pub connect_on_start: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            endpoint_url: DEFAULT_ENDPOINT.to_string(),
            frame_rate: 30,
            rotate_step: std::f32::consts::FRAC_PI_2,
            scale_step: 0.1,
            log_file: None,
            connect_on_start: true,
        }
    }
}

impl AppConfig {
    /// Frame rate clamped to something the terminal can sustain
    pub fn effective_frame_rate(&self) -> u32 {
        self.frame_rate.clamp(1, 120)
    }
}

/// Returns the config directory: `<config_dir>/gyro3d/`
pub fn config_dir() -> Result<PathBuf> {
    let dir = dirs::config_dir()
        .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?
        .join("gyro3d");
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

pub fn config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

/// Default log location next to the config file
pub fn default_log_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("gyro3d.log"))
}

/// Load config from `path`, or the default location when `None`.
///
/// A missing file yields the defaults; a file that exists but does not
/// parse is an error.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => config_path()?,
    };
    if !path.exists() {
        info!(?path, "No config found, using defaults");
        return Ok(AppConfig::default());
    }
    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("reading {}", path.display()))?;
    let config = parse_config(&contents).with_context(|| format!("parsing {}", path.display()))?;
    info!(?path, "Loaded config");
    Ok(config)
}

fn parse_config(contents: &str) -> Result<AppConfig> {
    Ok(toml::from_str(contents)?)
}
