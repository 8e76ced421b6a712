//! Configuration module for the Haajar kiosk
//!
//! This module handles:
//! - Kiosk configuration (`kiosk.toml`): camera, scanning windows, store, UI
//! - Application state persistence (`app_state.json`): last opened session
//!
//! # App Data Location
//!
//! Application data is stored in the platform-appropriate location:
//! - **Linux**: `~/.local/share/dev.haajar.kiosk/`
//! - **macOS**: `~/Library/Application Support/dev.haajar.kiosk/`
//! - **Windows**: `%APPDATA%\dev.haajar.kiosk\`
//!
//! The config file path can be overridden with the `HAAJAR_KIOSK_CONFIG`
//! environment variable.
//!
//! # Example
//!
//! ```ignore
//! use haajar_kiosk::config::{AppState, KioskConfig};
//!
//! let config = KioskConfig::load_or_default();
//! let mut state = AppState::load_or_default();
//! state.last_session_id = Some(42);
//! state.save()?;
//! ```

use crate::error::{KioskError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application identifier for data directories
pub const APP_ID: &str = "dev.haajar.kiosk";

/// Config filename
pub const CONFIG_FILE: &str = "kiosk.toml";

/// App state filename
pub const APP_STATE_FILE: &str = "app_state.json";

/// Operational log file prefix (rolled daily)
pub const LOG_FILE: &str = "haajar_kiosk.log";

/// Environment variable overriding the config path
pub const CONFIG_ENV: &str = "HAAJAR_KIOSK_CONFIG";

/// Default suppression window for repeated scans of one payload
pub const DEFAULT_DEBOUNCE_MS: u64 = 1500;

/// Default grace period after the scheduled start
pub const DEFAULT_GRACE_MINUTES: i64 = 15;

/// Default mode recompute interval
pub const DEFAULT_MODE_TICK_MS: u64 = 1000;

/// Default overlay time-to-live
pub const DEFAULT_OVERLAY_TTL_MS: u64 = 1500;

// ==================== App Data Directory ====================

/// Get the application data directory path
pub fn app_data_dir() -> Option<PathBuf> {
    dirs_next::data_dir().map(|p| p.join(APP_ID))
}

/// Ensure the app data directory exists
pub fn ensure_app_data_dir() -> Result<PathBuf> {
    let dir = app_data_dir().ok_or_else(|| {
        KioskError::Config("Could not determine app data directory".to_string())
    })?;

    if !dir.exists() {
        std::fs::create_dir_all(&dir).map_err(|e| {
            KioskError::Config(format!("Failed to create app data directory: {}", e))
        })?;
    }

    Ok(dir)
}

/// Resolve the config file path (env override first)
pub fn config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_ENV) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }
    app_data_dir().map(|p| p.join(CONFIG_FILE))
}

/// Get the path to the app state file
pub fn app_state_path() -> Option<PathBuf> {
    app_data_dir().map(|p| p.join(APP_STATE_FILE))
}

// ==================== Kiosk Config ====================

/// Complete kiosk configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct KioskConfig {
    #[serde(default)]
    pub camera: CameraConfig,

    #[serde(default)]
    pub scanning: ScanConfig,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub ui: UiConfig,
}

impl KioskConfig {
    /// Load from the resolved config path; a missing file yields defaults
    pub fn load() -> Result<Self> {
        let path = config_path().ok_or_else(|| {
            KioskError::Config("Could not determine config path".to_string())
        })?;
        Self::load_from(path)
    }

    /// Load from an explicit path; a missing file yields defaults
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!("No config at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            KioskError::Config(format!("Failed to read config {:?}: {}", path, e))
        })?;

        toml::from_str(&content)
            .map_err(|e| KioskError::Config(format!("Failed to parse config {:?}: {}", path, e)))
    }

    /// Load config, returning defaults on any error
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_else(|e| {
            tracing::warn!("Failed to load kiosk config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Save as pretty TOML
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                KioskError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| KioskError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content).map_err(|e| {
            KioskError::Config(format!("Failed to write config {:?}: {}", path, e))
        })
    }
}

// ==================== Camera Config ====================

/// Where frames come from
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceConfig {
    /// Replay image files dropped into a directory
    Directory {
        path: PathBuf,
        #[serde(default)]
        loop_frames: bool,
    },
    /// Blank frames only (demo / headless runs)
    Mock,
}

impl Default for SourceConfig {
    fn default() -> Self {
        SourceConfig::Directory {
            path: app_data_dir()
                .map(|p| p.join("frames"))
                .unwrap_or_else(|| PathBuf::from("frames")),
            loop_frames: false,
        }
    }
}

/// Capture configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CameraConfig {
    #[serde(default)]
    pub source: SourceConfig,

    /// Pause after a failed frame read before retrying
    #[serde(default = "default_read_backoff_ms")]
    pub read_backoff_ms: u64,

    /// Minimum time between loop iterations
    #[serde(default = "default_frame_interval_ms")]
    pub frame_interval_ms: u64,

    /// Longest side of the preview texture in pixels
    #[serde(default = "default_display_max_side")]
    pub display_max_side: u32,
}

fn default_read_backoff_ms() -> u64 {
    100
}

fn default_frame_interval_ms() -> u64 {
    20
}

fn default_display_max_side() -> u32 {
    640
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            source: SourceConfig::default(),
            read_backoff_ms: default_read_backoff_ms(),
            frame_interval_ms: default_frame_interval_ms(),
            display_max_side: default_display_max_side(),
        }
    }
}

impl CameraConfig {
    pub fn read_backoff(&self) -> Duration {
        Duration::from_millis(self.read_backoff_ms)
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }
}

// ==================== Scan Config ====================

/// Scanning windows and payload handling
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScanConfig {
    #[serde(default = "default_debounce_ms")]
    pub debounce_window_ms: u64,

    #[serde(default = "default_grace_minutes")]
    pub grace_period_minutes: i64,

    #[serde(default = "default_mode_tick_ms")]
    pub mode_tick_ms: u64,

    #[serde(default = "default_overlay_ttl_ms")]
    pub overlay_ttl_ms: u64,

    /// Truncate payloads to this many characters before lookup
    #[serde(default)]
    pub payload_prefix_len: Option<usize>,
}

fn default_debounce_ms() -> u64 {
    DEFAULT_DEBOUNCE_MS
}

fn default_grace_minutes() -> i64 {
    DEFAULT_GRACE_MINUTES
}

fn default_mode_tick_ms() -> u64 {
    DEFAULT_MODE_TICK_MS
}

fn default_overlay_ttl_ms() -> u64 {
    DEFAULT_OVERLAY_TTL_MS
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            debounce_window_ms: DEFAULT_DEBOUNCE_MS,
            grace_period_minutes: DEFAULT_GRACE_MINUTES,
            mode_tick_ms: DEFAULT_MODE_TICK_MS,
            overlay_ttl_ms: DEFAULT_OVERLAY_TTL_MS,
            payload_prefix_len: None,
        }
    }
}

impl ScanConfig {
    pub fn debounce_window(&self) -> Duration {
        Duration::from_millis(self.debounce_window_ms)
    }

    pub fn grace_period(&self) -> chrono::TimeDelta {
        chrono::TimeDelta::minutes(self.grace_period_minutes.max(0))
    }

    pub fn mode_tick(&self) -> Duration {
        Duration::from_millis(self.mode_tick_ms.max(1))
    }

    pub fn overlay_ttl(&self) -> Duration {
        Duration::from_millis(self.overlay_ttl_ms)
    }

    /// Apply the configured prefix rule to a raw payload
    pub fn normalize_payload(&self, raw: &str) -> String {
        let trimmed = raw.trim();
        match self.payload_prefix_len {
            Some(len) => trimmed.chars().take(len).collect(),
            None => trimmed.to_string(),
        }
    }
}

// ==================== Store Config ====================

/// Durable store connection settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoreConfig {
    /// sea-orm connection URL
    #[serde(default = "default_database_url")]
    pub database_url: String,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_database_url() -> String {
    match app_data_dir() {
        Some(dir) => format!("sqlite://{}?mode=rwc", dir.join("haajar.db").display()),
        None => "sqlite://haajar.db?mode=rwc".to_string(),
    }
}

fn default_max_connections() -> u32 {
    4
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
            max_connections: default_max_connections(),
        }
    }
}

impl StoreConfig {
    /// In-memory store, used by tests and demos
    pub fn in_memory() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            max_connections: 1,
        }
    }
}

// ==================== UI Config ====================

/// Display preferences
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UiConfig {
    #[serde(default = "default_true")]
    pub dark_mode: bool,

    #[serde(default = "default_true")]
    pub sound_enabled: bool,

    #[serde(default = "default_kiosk_title")]
    pub kiosk_title: String,
}

fn default_true() -> bool {
    true
}

fn default_kiosk_title() -> String {
    "Haajar Lab Registry".to_string()
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            dark_mode: true,
            sound_enabled: true,
            kiosk_title: default_kiosk_title(),
        }
    }
}

// ==================== App State ====================

/// Persistent kiosk state between runs
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct AppState {
    /// Version for future migration support
    #[serde(default = "default_app_state_version")]
    pub version: u32,

    /// Session that was open when the kiosk last ran
    #[serde(default)]
    pub last_session_id: Option<i64>,
}

fn default_app_state_version() -> u32 {
    1
}

impl AppState {
    /// Load app state from the default location
    pub fn load() -> Result<Self> {
        let path = app_state_path().ok_or_else(|| {
            KioskError::Config("Could not determine app state path".to_string())
        })?;
        Self::load_from(path)
    }

    /// Load app state from an explicit path; a missing file yields defaults
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self {
                version: 1,
                ..Default::default()
            });
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| KioskError::Config(format!("Failed to read app state: {}", e)))?;

        serde_json::from_str(&content)
            .map_err(|e| KioskError::Config(format!("Failed to parse app state: {}", e)))
    }

    /// Load app state, returning defaults on any error
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_else(|e| {
            tracing::warn!("Failed to load app state, using defaults: {}", e);
            Self {
                version: 1,
                ..Default::default()
            }
        })
    }

    /// Save app state to the default location
    pub fn save(&self) -> Result<()> {
        let dir = ensure_app_data_dir()?;
        self.save_to(dir.join(APP_STATE_FILE))
    }

    /// Save app state to an explicit path
    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| KioskError::Config(format!("Failed to serialize app state: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| KioskError::Config(format!("Failed to write app state: {}", e)))
    }
}

// ==================== Tests ====================
