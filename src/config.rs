//! Emulator configuration.
//!
//! Everything the consumer can dial before or during a session: advertised
//! name, which services are enabled, which data fields each service carries,
//! rider physics, and the simulation knobs. Persists as TOML in the
//! platform config directory.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::sim::RiderParams;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("config serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("no platform config directory available")]
    NoConfigDir,
}

/// How cadence is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CadenceMode {
    /// The cadence model chooses.
    #[default]
    Auto,
    /// The consumer supplies a fixed cadence.
    Manual,
}

impl std::fmt::Display for CadenceMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CadenceMode::Auto => write!(f, "auto"),
            CadenceMode::Manual => write!(f, "manual"),
        }
    }
}

/// Which GATT services the peripheral advertises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct ServiceToggles {
    pub ftms: bool,
    pub cps: bool,
    pub rsc: bool,
}

impl Default for ServiceToggles {
    fn default() -> Self {
        Self {
            ftms: true,
            cps: true,
            rsc: true,
        }
    }
}

/// Which data fields the measurement characteristics include.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct FieldToggles {
    pub power: bool,
    pub cadence: bool,
    pub speed: bool,
}

impl Default for FieldToggles {
    fn default() -> Self {
        Self {
            power: true,
            cadence: true,
            speed: true,
        }
    }
}

/// Top-level emulator configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmulatorConfig {
    /// Advertised local name.
    pub local_name: String,
    /// Enabled services.
    pub services: ServiceToggles,
    /// Enabled measurement fields.
    pub fields: FieldToggles,
    /// Rider physics for the speed solver and fatigue model.
    pub rider: RiderParams,
    /// Noise dial, 0–100.
    pub randomness: i32,
    /// UI step size for target-power adjustments, 1–100 W.
    pub increment_w: i32,
    /// Cadence source.
    pub cadence_mode: CadenceMode,
    /// Cadence used when `cadence_mode` is manual, rpm.
    pub manual_cadence_rpm: i32,
}

impl Default for EmulatorConfig {
    fn default() -> Self {
        Self {
            local_name: "Trainer".to_string(),
            services: ServiceToggles::default(),
            fields: FieldToggles::default(),
            rider: RiderParams::default(),
            randomness: 50,
            increment_w: 10,
            cadence_mode: CadenceMode::Auto,
            manual_cadence_rpm: 90,
        }
    }
}

impl EmulatorConfig {
    /// Platform config file path (`<config_dir>/velotrain/config.toml`).
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let dirs = directories::ProjectDirs::from("com", "providenceit", "velotrain")
            .ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Load from a TOML file, falling back to defaults if it is absent.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&text)?;
        config.sanitize();
        Ok(config)
    }

    /// Write to a TOML file, creating parent directories as needed.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let text = toml::to_string_pretty(self)?;
        std::fs::write(path, text)?;
        Ok(())
    }

    /// Clamp dials that may arrive out of range from a hand-edited file.
    pub fn sanitize(&mut self) {
        self.randomness = self.randomness.clamp(0, 100);
        self.increment_w = self.increment_w.clamp(1, 100);
        self.manual_cadence_rpm = self.manual_cadence_rpm.clamp(0, 180);
        if self.local_name.trim().is_empty() {
            self.local_name = "Trainer".to_string();
        }
    }
}
