//! gyro3d - live orientation viewer for a remote IMU device
//!
//! Streams orientation samples from `{endpoint}/events` and renders the
//! current model as ASCII art. Logs go to a file because the terminal holds
//! the frame.

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::Parser;
use gyro3d_terminal::config::{self, AppConfig};
use gyro3d_terminal::TerminalApp;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "gyro3d")]
#[command(about = "Render a remote device's orientation in the terminal", long_about = None)]
struct Args {
    /// Device base URL (overrides the config file)
    #[arg(short, long)]
    endpoint: Option<String>,

    /// Config file to use instead of the default location
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Frames per second
    #[arg(long)]
    fps: Option<u32>,

    /// Start without opening the telemetry stream
    #[arg(long)]
    no_connect: bool,

    /// Log file (defaults to gyro3d.log next to the config)
    #[arg(long)]
    log_file: Option<PathBuf>,
}

impl Args {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(endpoint) = &self.endpoint {
            config.endpoint_url = endpoint.clone();
        }
        if let Some(fps) = self.fps {
            config.frame_rate = fps;
        }
        if self.no_connect {
            config.connect_on_start = false;
        }
        if let Some(log_file) = &self.log_file {
            config.log_file = Some(log_file.clone());
        }
    }
}

fn init_logging(config: &AppConfig) -> Result<PathBuf> {
    let path = match &config.log_file {
        Some(path) => path.clone(),
        None => config::default_log_path()?,
    };
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("opening log file {}", path.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gyro3d_terminal=info,gyro3d_core=info,gyro3d=info".into()),
        )
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(path)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Runs before logging exists, so a bad config file is reported on stderr
    let mut config = config::load_config(args.config.as_deref())?;
    args.apply(&mut config);

    let log_path = init_logging(&config)?;
    info!(
        endpoint = %config.endpoint_url,
        fps = config.effective_frame_rate(),
        log = %log_path.display(),
        "gyro3d starting"
    );

    let mut app = TerminalApp::new(config);
    app.run().await?;

    info!("gyro3d stopped");
    Ok(())
}
