//! Persisted application configuration.

use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::controller::VisibilityPolicy;
use crate::effects::{EffectRecord, EffectsSnapshot, Preset};

/// Current on-disk format version.
pub const CONFIG_VERSION: u32 = 1;

/// Frame rate used when the configuration does not name one.
pub const DEFAULT_TARGET_FPS: u32 = 60;

/// Errors raised while loading or saving configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("No configuration directory available")]
    NoConfigDir,
    #[error("Configuration I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Malformed configuration: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Unsupported configuration version {0}")]
    UnsupportedVersion(u32),
}

fn default_config_version() -> u32 {
    CONFIG_VERSION
}

fn default_target_fps() -> u32 {
    DEFAULT_TARGET_FPS
}

/// Everything persisted between runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_config_version")]
    pub config_version: u32,
    #[serde(flatten)]
    pub effects: EffectsSnapshot,
    #[serde(default = "default_target_fps")]
    pub target_fps: u32,
    #[serde(default)]
    pub visibility: VisibilityPolicy,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            config_version: CONFIG_VERSION,
            effects: EffectsSnapshot::default(),
            target_fps: DEFAULT_TARGET_FPS,
            visibility: VisibilityPolicy::default(),
        }
    }
}

impl AppConfig {
    /// Default configuration with the presets seeded.
    pub fn with_presets() -> Self {
        let mut config = Self::default();
        config.seed_presets();
        config
    }

    /// Add the built-in presets if there are no effects at all.
    ///
    /// Returns `true` if anything was added.
    pub fn seed_presets(&mut self) -> bool {
        if !self.effects.effects.is_empty() {
            return false;
        }
        self.effects.effects = Preset::all()
            .iter()
            .map(|preset| EffectRecord {
                name: preset.name().to_string(),
                source: preset.source().to_string(),
                active: false,
            })
            .collect();
        true
    }

    /// Target frame rate clamped to something the render loop can honour.
    pub fn frame_rate(&self) -> u32 {
        self.target_fps.clamp(1, 240)
    }
}

/// Where configuration is loaded from and saved to.
pub trait ConfigStore {
    fn load(&self) -> Result<AppConfig, ConfigError>;
    fn save(&self, config: &AppConfig) -> Result<(), ConfigError>;
}

impl<T: ConfigStore + ?Sized> ConfigStore for std::sync::Arc<T> {
    fn load(&self) -> Result<AppConfig, ConfigError> {
        (**self).load()
    }

    fn save(&self, config: &AppConfig) -> Result<(), ConfigError> {
        (**self).save(config)
    }
}

/// Pretty-printed JSON file.
#[derive(Debug, Clone)]
pub struct JsonConfigStore {
    path: PathBuf,
}

impl JsonConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<config dir>/ScreenShader/config.json`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|mut p| {
            p.push("ScreenShader");
            p.push("config.json");
            p
        })
    }

    pub fn at_default_location() -> Result<Self, ConfigError> {
        Self::default_path()
            .map(Self::new)
            .ok_or(ConfigError::NoConfigDir)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigStore for JsonConfigStore {
    /// Missing file yields the seeded defaults. A malformed file is an error.
    fn load(&self) -> Result<AppConfig, ConfigError> {
        if !self.path.exists() {
            log::info!("No configuration at {}, using defaults", self.path.display());
            return Ok(AppConfig::with_presets());
        }

        let contents = fs::read_to_string(&self.path)?;
        let mut config: AppConfig = serde_json::from_str(&contents)?;
        if config.config_version > CONFIG_VERSION {
            return Err(ConfigError::UnsupportedVersion(config.config_version));
        }
        config.config_version = CONFIG_VERSION;
        if config.seed_presets() {
            log::info!("Configuration had no effects, seeded presets");
        }
        log::debug!(
            "Loaded {} effects from {}",
            config.effects.effects.len(),
            self.path.display()
        );
        Ok(config)
    }

    fn save(&self, config: &AppConfig) -> Result<(), ConfigError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(config)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        log::debug!("Saved configuration to {}", self.path.display());
        Ok(())
    }
}

/// In-memory store for headless runs.
#[derive(Debug, Default)]
pub struct MemoryConfigStore {
    config: Mutex<Option<AppConfig>>,
}

impl MemoryConfigStore {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config: Mutex::new(Some(config)),
        }
    }

    /// The last saved configuration.
    pub fn saved(&self) -> Option<AppConfig> {
        self.config.lock().clone()
    }
}

impl ConfigStore for MemoryConfigStore {
    fn load(&self) -> Result<AppConfig, ConfigError> {
        Ok(self.config.lock().clone().unwrap_or_else(AppConfig::with_presets))
    }

    fn save(&self, config: &AppConfig) -> Result<(), ConfigError> {
        *self.config.lock() = Some(config.clone());
        Ok(())
    }
}
