//! Host configuration.
//!
//! Provides frame-loop, logging, override and experience settings.
//! Configuration can be loaded from and saved to a file.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Read, Write};
use std::path::Path;
use tracing::{info, warn};

use glam::Vec3;
use verdant_common::{ConfigError, WorldPlacement};
use verdant_kernel::{BloomConfig, DebugOverrides, EffectConfig, EmissiveConfig, FluidConfig};

/// Configuration file name.
pub const CONFIG_FILE: &str = "verdant.toml";

/// Default tracing directives when neither `RUST_LOG` nor the file set one.
pub const DEFAULT_LOG_FILTER: &str = "verdant_engine=info,verdant_kernel=info";

/// One anchored experience.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperienceConfig {
    /// Display name, used in logs
    pub name: String,
    /// Where the effect sits, as resolved by the anchoring system
    pub placement: WorldPlacement,
    /// Vertices per procedural stage (bloom only)
    pub stage_points: usize,
    /// Seed for procedural stage generation (bloom only)
    pub stage_seed: u64,
    /// Stage indices whose source is treated as missing (bloom only)
    pub missing_stages: Vec<usize>,
    /// Effect family and settings
    pub effect: EffectConfig,
}

impl Default for ExperienceConfig {
    fn default() -> Self {
        Self {
            name: "experience".to_string(),
            placement: WorldPlacement::IDENTITY,
            stage_points: 4000,
            stage_seed: 7,
            missing_stages: Vec::new(),
            effect: EffectConfig::default(),
        }
    }
}

impl ExperienceConfig {
    /// Creates an experience with default extras.
    #[must_use]
    pub fn new(name: impl Into<String>, placement: WorldPlacement, effect: EffectConfig) -> Self {
        Self {
            name: name.into(),
            placement,
            effect,
            ..Self::default()
        }
    }
}

/// Overrides that take effect once simulated time reaches `at`.
///
/// Lets a headless run script the same changes a debug UI would make.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OverrideStep {
    /// Simulated seconds since the loop started
    pub at: f32,
    /// Overrides in force from then on
    #[serde(default)]
    pub overrides: DebugOverrides,
}

impl OverrideStep {
    /// Creates a step.
    #[must_use]
    pub const fn new(at: f32, overrides: DebugOverrides) -> Self {
        Self { at, overrides }
    }
}

/// Host configuration parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    // === Frame Loop ===
    /// Target frames per second
    pub target_fps: u32,
    /// Seconds to run before exiting
    pub run_seconds: f32,
    /// Pace frames against the wall clock (false = run as fast as possible)
    pub realtime: bool,

    // === Diagnostics ===
    /// Tracing directives, overridden by `RUST_LOG`
    pub log_filter: String,
    /// Seconds between per-experience stats lines (0 = disabled)
    pub stats_interval: f32,
    /// Initial debug overrides
    pub overrides: DebugOverrides,
    /// Override changes applied during the run, in time order
    pub override_schedule: Vec<OverrideStep>,

    // === Content ===
    /// Experiences to build
    pub experiences: Vec<ExperienceConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            target_fps: 60,
            run_seconds: 10.0,
            realtime: true,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            stats_interval: 2.0,
            overrides: DebugOverrides::default(),
            override_schedule: Vec::new(),
            experiences: default_experiences(),
        }
    }
}

fn default_experiences() -> Vec<ExperienceConfig> {
    vec![
        ExperienceConfig::new(
            "harbor-smoke",
            WorldPlacement::at(Vec3::new(0.0, 0.0, -3.0)),
            EffectConfig::Emissive(EmissiveConfig::smoke()),
        ),
        ExperienceConfig::new(
            "tidal-pool",
            WorldPlacement::at(Vec3::new(2.0, -0.5, -4.0)).with_uniform_scale(0.5),
            EffectConfig::Fluid(FluidConfig::default()),
        ),
        ExperienceConfig::new(
            "garden-bloom",
            WorldPlacement::at(Vec3::new(-2.0, 0.0, -4.0)).with_uniform_scale(0.1),
            EffectConfig::Bloom(BloomConfig::default()),
        ),
    ]
}

impl AppConfig {
    /// Load configuration from the default file location.
    /// Returns default config if file doesn't exist.
    pub fn load() -> Self {
        Self::load_from(CONFIG_FILE)
    }

    /// Load configuration from a specific path.
    /// Returns default config if file doesn't exist or is invalid.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();

        if !path.exists() {
            info!("Config file not found, using defaults");
            return Self::default();
        }

        match fs::File::open(path) {
            Ok(mut file) => {
                let mut contents = String::new();
                if let Err(e) = file.read_to_string(&mut contents) {
                    warn!("Failed to read config file: {e}");
                    return Self::default();
                }

                match toml::from_str(&contents) {
                    Ok(config) => {
                        info!("Loaded config from {}", path.display());
                        config
                    },
                    Err(e) => {
                        warn!("Failed to parse config file: {e}");
                        Self::default()
                    },
                }
            },
            Err(e) => {
                warn!("Failed to open config file: {e}");
                Self::default()
            },
        }
    }

    /// Save configuration to a specific path.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let path = path.as_ref();

        // Create parent directories if needed
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        let mut file = fs::File::create(path)?;
        file.write_all(contents.as_bytes())?;

        info!("Saved config to {}", path.display());
        Ok(())
    }

    /// Clamp frame-loop values to sensible ranges.
    pub fn clamp(&mut self) {
        self.target_fps = self.target_fps.clamp(1, 240);
        self.run_seconds = if self.run_seconds.is_finite() {
            self.run_seconds.clamp(0.0, 86_400.0)
        } else {
            0.0
        };
        self.stats_interval = if self.stats_interval.is_finite() {
            self.stats_interval.clamp(0.0, 3600.0)
        } else {
            0.0
        };
        self.overrides.forced_progress = self.overrides.forced_progress_clamped();

        let before = self.override_schedule.len();
        self.override_schedule.retain(|step| step.at.is_finite());
        if self.override_schedule.len() != before {
            warn!(
                "Dropped {} override steps with a non-finite time",
                before - self.override_schedule.len()
            );
        }
        for step in &mut self.override_schedule {
            step.at = step.at.max(0.0);
            step.overrides.forced_progress = step.overrides.forced_progress_clamped();
        }
        // Stable, so steps sharing a time keep their file order
        self.override_schedule.sort_by(|a, b| a.at.total_cmp(&b.at));
    }

    /// Reject degenerate effect configuration and overrides.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.overrides.validate()?;
        for step in &self.override_schedule {
            step.overrides.validate()?;
        }
        for experience in &self.experiences {
            experience.effect.validate()?;
        }
        Ok(())
    }

    /// Seconds per frame.
    #[must_use]
    pub fn frame_dt(&self) -> f32 {
        1.0 / self.target_fps.max(1) as f32
    }
}

/// Reads only the log filter from a config file, without logging.
///
/// Used before tracing is installed.
#[must_use]
pub fn read_log_filter<P: AsRef<Path>>(path: P) -> Option<String> {
    #[derive(Deserialize)]
    struct LogOnly {
        log_filter: Option<String>,
    }

    let contents = fs::read_to_string(path).ok()?;
    toml::from_str::<LogOnly>(&contents).ok()?.log_filter
}
