use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use color_eyre::eyre::{Result, WrapErr};
use serde::Deserialize;
use tracing::info;

use crate::error::{OverbarError, OverbarResult};
use crate::overlay::{CueSources, OverlaySettings, Timing, TICK_INTERVAL};

// ─── Embedded Default ────────────────────────────────────────────────────
/// Baked into the binary at compile time. The app can never crash due to a
/// missing config file — this is always available as the base layer.
const DEFAULT_CONFIG_TOML: &str = include_str!("../default_config.toml");

// ─── CLI Arguments (override layer) ─────────────────────────────────────
/// overbar — hotkey-driven progress bar overlay controller
#[derive(Parser, Debug, Clone)]
#[command(name = "overbar", version, about, long_about = None)]
pub struct CliArgs {
    /// Overlay source name (overrides config file)
    #[arg(short, long)]
    pub source: Option<String>,

    /// Log level filter (overrides config file)
    #[arg(short, long)]
    pub log_level: Option<String>,

    /// Path to a custom config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Animation sampling rate (overrides config file)
    #[arg(long)]
    pub fps: Option<u16>,

    /// Simulated overlay source width in pixels (overrides config file)
    #[arg(long)]
    pub width: Option<u32>,

    /// Print the default config to stdout and exit
    #[arg(long)]
    pub print_default_config: bool,

    /// List the host's source names and exit
    #[arg(long)]
    pub list_sources: bool,
}

// ─── TOML Structs ───────────────────────────────────────────────────────

/// Root configuration — parsed from TOML, then overridden by CLI flags.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub overlay: OverlayConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub cues: CuesConfig,
    #[serde(default)]
    pub keys: KeysConfig,
    #[serde(default)]
    pub simulator: SimulatorConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub log_level: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    /// Name of the host source carrying the bar image.
    pub source: String,
    /// Optional frame source sharing the bar's opacity (empty = none).
    pub container_source: String,
    pub max_levels: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub resize_duration_secs: f64,
    pub fade_duration_secs: f64,
    pub fps: u16,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CuesConfig {
    pub increase: String,
    pub decrease: String,
    pub reset: String,
    pub full: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct KeysConfig {
    pub increase: String,
    pub decrease: String,
    pub sustain: String,
    pub reset: String,
    pub quit: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    pub source_width: u32,
}

// ─── Defaults ───────────────────────────────────────────────────────────

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
        }
    }
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            source: "progress-bar".into(),
            container_source: String::new(),
            max_levels: 10,
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            resize_duration_secs: 1.0,
            fade_duration_secs: 3.0,
            fps: 60,
        }
    }
}

impl Default for KeysConfig {
    fn default() -> Self {
        Self {
            increase: "1".into(),
            decrease: "2".into(),
            sustain: "3".into(),
            reset: "4".into(),
            quit: "q".into(),
        }
    }
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self { source_width: 500 }
    }
}

// ─── Path Resolution & Accessors ────────────────────────────────────────

impl Config {
    /// Standard config file path: ~/.config/overbar/config.toml
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("overbar")
            .join("config.toml")
    }

    /// Log directory: ~/.local/share/overbar/
    pub fn log_dir() -> PathBuf {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("overbar");
        std::fs::create_dir_all(&data_dir).ok();
        data_dir
    }

    /// Animation tick interval from the configured sampling rate.
    pub fn tick_interval(&self) -> Duration {
        if self.timing.fps == 0 {
            return TICK_INTERVAL;
        }
        Duration::from_secs_f64(1.0 / self.timing.fps as f64)
    }

    /// Driver timing parameters.
    pub fn driver_timing(&self) -> Timing {
        Timing {
            max_levels: self.overlay.max_levels,
            resize_duration: self.timing.resize_duration_secs,
            fade_duration: self.timing.fade_duration_secs,
            tick: self.tick_interval(),
        }
    }

    /// Reject configs the controller cannot run with.
    pub fn validate(&self) -> OverbarResult<()> {
        if self.overlay.max_levels == 0 {
            return Err(OverbarError::Config(
                "overlay.max_levels must be at least 1".into(),
            ));
        }
        if self.timing.resize_duration_secs < 0.0 || self.timing.fade_duration_secs < 0.0 {
            return Err(OverbarError::Config(
                "timing durations must not be negative".into(),
            ));
        }
        for (name, key) in [
            ("increase", &self.keys.increase),
            ("decrease", &self.keys.decrease),
            ("sustain", &self.keys.sustain),
            ("reset", &self.keys.reset),
            ("quit", &self.keys.quit),
        ] {
            if key.is_empty() {
                return Err(OverbarError::Config(format!("keys.{name} must be set")));
            }
        }
        Ok(())
    }

    /// Everything the controller re-reads on configure.
    pub fn overlay_settings(&self) -> OverlaySettings {
        OverlaySettings {
            source: self.overlay.source.clone(),
            container: self.overlay.container_source.clone(),
            cues: CueSources {
                increase: none_if_empty(&self.cues.increase),
                decrease: none_if_empty(&self.cues.decrease),
                reset: none_if_empty(&self.cues.reset),
                full: none_if_empty(&self.cues.full),
            },
        }
    }
}

fn none_if_empty(s: &str) -> Option<String> {
    let s = s.trim();
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

// ─── Bootloader ─────────────────────────────────────────────────────────

/// The single entry point for configuration. Called exactly once at startup.
///
/// 1. Resolve config file path (CLI override or default)
/// 2. If the file doesn't exist, create directory tree + write defaults
/// 3. Parse TOML from disk into Config
/// 4. Apply CLI overrides on top
pub fn load(cli: &CliArgs) -> Result<Config> {
    let config_path = cli.config.clone().unwrap_or_else(Config::config_path);

    if !config_path.exists() {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).wrap_err_with(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }
        std::fs::write(&config_path, DEFAULT_CONFIG_TOML).wrap_err_with(|| {
            format!(
                "Failed to write default config to {}",
                config_path.display()
            )
        })?;
        info!("Created default config at {}", config_path.display());
    }

    let toml_str = std::fs::read_to_string(&config_path)
        .wrap_err_with(|| format!("Failed to read config from {}", config_path.display()))?;

    let mut config: Config = toml::from_str(&toml_str).wrap_err_with(|| {
        format!(
            "Failed to parse config at {}.\n\
             Delete the file to regenerate defaults, or run:\n  \
             overbar --print-default-config > {:?}",
            config_path.display(),
            config_path
        )
    })?;

    // ── CLI overrides ───────────────────────────────────────────────
    if let Some(ref source) = cli.source {
        config.overlay.source = source.clone();
    }
    if let Some(ref level) = cli.log_level {
        config.general.log_level = level.clone();
    }
    if let Some(fps) = cli.fps {
        config.timing.fps = fps;
    }
    if let Some(width) = cli.width {
        config.simulator.source_width = width;
    }

    config.validate()?;
    Ok(config)
}

/// Returns the embedded default config TOML string.
pub fn default_config_toml() -> &'static str {
    DEFAULT_CONFIG_TOML
}
