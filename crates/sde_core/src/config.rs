//! Runtime configuration loaded from JSON.
//!
//! Every field has a default so a partial (or missing) file still yields a
//! usable config. Script-visible paths starting with `/rd/` are resolved under
//! `romdisk_root`, which lets scripts written against the console romdisk run
//! unchanged from a plain directory.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::frame_state::DEFAULT_DEBUG_LINE_CAPACITY;
use crate::input::DEFAULT_DEADZONE;
use crate::time::DEFAULT_MAX_FRAME_DT;

pub const CONFIG_VERSION: &str = "0.1";
const ROMDISK_PREFIX: &str = "/rd/";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("config validation failed: {0}")]
    Invalid(String),
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct ScreenSize {
    #[serde(default = "default_screen_width")]
    pub width: u32,
    #[serde(default = "default_screen_height")]
    pub height: u32,
}

impl Default for ScreenSize {
    fn default() -> Self {
        Self {
            width: default_screen_width(),
            height: default_screen_height(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RuntimeConfig {
    #[serde(default = "default_version")]
    pub version: String,
    /// Entry script, in script path syntax (may use `/rd/`).
    #[serde(default = "default_script")]
    pub script: String,
    #[serde(default = "default_romdisk_root")]
    pub romdisk_root: PathBuf,
    /// Paths reported as FOUND/MISSING at boot.
    #[serde(default = "default_required_assets")]
    pub required_assets: Vec<String>,
    #[serde(default = "default_sprite_capacity")]
    pub sprite_capacity: usize,
    #[serde(default = "default_texture_memory_bytes")]
    pub texture_memory_bytes: usize,
    #[serde(default = "default_deadzone")]
    pub deadzone: f32,
    #[serde(default = "default_max_frame_dt")]
    pub max_frame_dt: f32,
    #[serde(default)]
    pub boot_delay_ms: u64,
    #[serde(default = "default_debug_line_capacity")]
    pub debug_line_capacity: usize,
    #[serde(default)]
    pub screen: ScreenSize,
    #[serde(default = "default_window_title")]
    pub window_title: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            script: default_script(),
            romdisk_root: default_romdisk_root(),
            required_assets: default_required_assets(),
            sprite_capacity: default_sprite_capacity(),
            texture_memory_bytes: default_texture_memory_bytes(),
            deadzone: default_deadzone(),
            max_frame_dt: default_max_frame_dt(),
            boot_delay_ms: 0,
            debug_line_capacity: default_debug_line_capacity(),
            screen: ScreenSize::default(),
            window_title: default_window_title(),
        }
    }
}

impl RuntimeConfig {
    /// Map a script-visible path to a filesystem path.
    pub fn resolve_asset(&self, path: &str) -> PathBuf {
        match path.strip_prefix(ROMDISK_PREFIX) {
            Some(rest) => self.romdisk_root.join(rest),
            None => PathBuf::from(path),
        }
    }

    pub fn script_path(&self) -> PathBuf {
        self.resolve_asset(&self.script)
    }
}

pub fn load_config_from_path(path: &Path) -> Result<RuntimeConfig, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let config: RuntimeConfig = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    validate_config(&config)?;
    Ok(config)
}

/// Load `path` if it exists, otherwise fall back to defaults.
pub fn load_config_or_default(path: &Path) -> Result<RuntimeConfig, ConfigError> {
    if !path.exists() {
        log::warn!(
            "Runtime config '{}' not found. Using defaults.",
            path.display()
        );
        return Ok(RuntimeConfig::default());
    }
    load_config_from_path(path)
}

pub fn validate_config(config: &RuntimeConfig) -> Result<(), ConfigError> {
    if config.version != CONFIG_VERSION {
        return Err(ConfigError::Invalid(format!(
            "unsupported version '{}'",
            config.version
        )));
    }
    if config.script.is_empty() {
        return Err(ConfigError::Invalid("script path is empty".to_string()));
    }
    if config.sprite_capacity == 0 {
        return Err(ConfigError::Invalid(
            "sprite_capacity must be > 0".to_string(),
        ));
    }
    if !(0.0..1.0).contains(&config.deadzone) {
        return Err(ConfigError::Invalid(format!(
            "deadzone {} outside [0, 1)",
            config.deadzone
        )));
    }
    if config.max_frame_dt <= 0.0 || !config.max_frame_dt.is_finite() {
        return Err(ConfigError::Invalid(
            "max_frame_dt must be a positive number".to_string(),
        ));
    }
    if config.screen.width == 0 || config.screen.height == 0 {
        return Err(ConfigError::Invalid(
            "screen dimensions must be non-zero".to_string(),
        ));
    }
    Ok(())
}

fn default_version() -> String {
    CONFIG_VERSION.to_string()
}

fn default_script() -> String {
    "/rd/main.lua".to_string()
}

fn default_romdisk_root() -> PathBuf {
    PathBuf::from("assets")
}

fn default_required_assets() -> Vec<String> {
    vec![
        "/rd/main.lua".to_string(),
        "/rd/es_sprite_64.png".to_string(),
    ]
}

fn default_window_title() -> String {
    "Space Demo".to_string()
}

const fn default_sprite_capacity() -> usize {
    16
}

const fn default_texture_memory_bytes() -> usize {
    8 * 1024 * 1024
}

const fn default_deadzone() -> f32 {
    DEFAULT_DEADZONE
}

const fn default_max_frame_dt() -> f32 {
    DEFAULT_MAX_FRAME_DT
}

const fn default_debug_line_capacity() -> usize {
    DEFAULT_DEBUG_LINE_CAPACITY
}

const fn default_screen_width() -> u32 {
    640
}

const fn default_screen_height() -> u32 {
    480
}
