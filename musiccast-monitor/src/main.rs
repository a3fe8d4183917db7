use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

use musiccast_engine::logging::{init_logging_with_level, LoggingMode};
use musiccast_engine::{DeviceFile, DeviceId, DeviceRegistry, EngineConfig, TrackInfo};

/// MusicCast Monitor
///
/// Mirrors the state of the configured MusicCast devices and logs every
/// change until interrupted.
#[derive(Parser, Debug)]
#[command(name = "musiccast-monitor")]
#[command(about = "Mirror Yamaha MusicCast devices and log their state changes")]
#[command(version)]
pub struct Args {
    /// Device file (JSON map of device id to name/address/port/enabled/zone)
    #[arg(short, long, default_value = "devices.json")]
    pub config: PathBuf,

    /// Timing preset (default, responsive, conservative)
    #[arg(short, long, default_value = "default")]
    pub preset: String,

    /// Override the poll interval in seconds
    #[arg(long)]
    pub poll_interval_secs: Option<u64>,

    /// Seconds to wait for every device's first contact
    #[arg(long, default_value = "30")]
    pub ready_timeout_secs: u64,

    /// Print one summary after first contact and exit
    #[arg(long)]
    pub once: bool,

    /// Log level (error, warn, info, debug, trace) or a full filter directive
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

impl Args {
    /// Validate command line arguments
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_secs == Some(0) {
            return Err(anyhow::anyhow!("Poll interval must be positive"));
        }

        if self.ready_timeout_secs == 0 {
            return Err(anyhow::anyhow!("Ready timeout must be positive"));
        }

        self.engine_config()?;
        Ok(())
    }

    /// Engine configuration for the chosen preset and overrides
    pub fn engine_config(&self) -> Result<EngineConfig> {
        let config = match self.preset.to_lowercase().as_str() {
            "default" => EngineConfig::default(),
            "responsive" => EngineConfig::responsive(),
            "conservative" => EngineConfig::conservative(),
            other => {
                return Err(anyhow::anyhow!(
                    "Invalid preset '{}'. Valid presets: default, responsive, conservative",
                    other
                ));
            }
        };

        let config = match self.poll_interval_secs {
            Some(secs) => config.with_poll_interval(Duration::from_secs(secs)),
            None => config,
        };
        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides
    fn apply_env(&mut self) -> Result<()> {
        if let Ok(path) = std::env::var("MUSICCAST_DEVICES_FILE") {
            self.config = PathBuf::from(path);
        }

        if let Ok(secs) = std::env::var("MUSICCAST_POLL_INTERVAL") {
            self.poll_interval_secs = Some(
                secs.parse()
                    .context("Invalid MUSICCAST_POLL_INTERVAL environment variable")?,
            );
        }

        Ok(())
    }
}

/// "Artist - Title" for the log line, or whichever half is known
fn now_playing(track: &TrackInfo) -> String {
    match (track.artist.as_deref(), track.title.as_deref()) {
        (Some(artist), Some(title)) => format!("{} - {}", artist, title),
        (None, Some(only)) | (Some(only), None) => only.to_string(),
        (None, None) => String::new(),
    }
}

fn log_device(registry: &DeviceRegistry, id: &DeviceId) {
    let Some(view) = registry.view(id) else {
        return;
    };

    match &view.snapshot {
        Some(snapshot) => info!(
            device = %view.identity,
            state = %view.connection,
            stale = view.stale,
            power = ?snapshot.power,
            playback = ?snapshot.playback,
            input = %snapshot.input_name(),
            sound_program = snapshot.sound_program_name().as_deref().unwrap_or("-"),
            volume = snapshot.volume_percent(),
            mute = snapshot.mute,
            track = %now_playing(&snapshot.track),
            "Device"
        ),
        None => warn!(
            device = %view.identity,
            state = %view.connection,
            last_error = ?view.failures.last_error,
            "Device has not answered yet"
        ),
    }
}

async fn run(args: Args) -> Result<()> {
    let engine_config = args.engine_config()?;
    let shutdown_timeout = engine_config.shutdown_timeout;

    let devices = DeviceFile::load(&args.config)
        .with_context(|| format!("Failed to load device file {}", args.config.display()))?
        .device_configs();
    if devices.is_empty() {
        return Err(anyhow::anyhow!(
            "No enabled devices in {}",
            args.config.display()
        ));
    }

    let registry = DeviceRegistry::with_http(engine_config)?;
    let ready = registry.start(devices).context("Failed to start devices")?;

    if !ready
        .wait_timeout(Duration::from_secs(args.ready_timeout_secs))
        .await
    {
        warn!("Not every device was contacted within {}s", args.ready_timeout_secs);
    }

    for id in registry.device_ids() {
        log_device(&registry, &id);
    }

    if !args.once {
        info!("Watching for changes; press Ctrl+C to stop");
        let mut changes = registry.changes();
        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("Interrupted");
                    break;
                }
                event = changes.recv() => {
                    let Some(event) = event else { break };
                    info!(device_id = %event.entity_id, fields = ?event.changed_fields, version = event.version, "Changed");
                    log_device(&registry, &event.entity_id);
                }
            }
        }
    }

    let report = registry.shutdown(shutdown_timeout).await;
    report.into_result()?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut args = Args::parse();
    args.apply_env()?;
    args.validate()?;

    init_logging_with_level(LoggingMode::Development, &args.log_level)?;

    run(args).await
}
