//! Runtime configuration.
//!
//! Every section is plain data with `#[serde(default)]`, so a TOML file only
//! needs the keys it overrides. Components receive their section by value at
//! construction; changing settings means building a new snapshot and handing
//! it over (see `AggregationEngine::set_config`).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub capture: CaptureConfig,
    pub reassembly: ReassemblyConfig,
    pub engine: EngineConfig,
    pub schedule: ScheduleConfig,
    pub archive: ArchiveConfig,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }
}

/// Live capture settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Interface name; the system default device when absent.
    pub interface: Option<String>,
    pub filter: String,
    pub promiscuous: bool,
    pub snaplen: i32,
    pub read_timeout_ms: i32,
    /// Frames buffered between capture and processing before drops start.
    pub queue_capacity: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            interface: None,
            filter: "ip and tcp".to_string(),
            promiscuous: true,
            snaplen: 65535,
            read_timeout_ms: 100,
            queue_capacity: 65536,
        }
    }
}

/// Flow reassembly limits and timeouts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReassemblyConfig {
    /// Idle time after which an incomplete IP fragment group is dropped.
    pub fragment_timeout_ms: u64,
    /// Time without application bytes before the locked flow is released.
    pub flow_idle_timeout_ms: u64,
    /// Largest plausible application frame, length prefix included.
    pub max_frame_len: u32,
}

impl Default for ReassemblyConfig {
    fn default() -> Self {
        Self {
            fragment_timeout_ms: 30_000,
            flow_idle_timeout_ms: 30_000,
            max_frame_len: 0x000F_FFFF,
        }
    }
}

/// Recording policy for the aggregation engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub auto_clear_on_server_change: bool,
    pub auto_clear_on_timeout: bool,
    pub idle_timeout_ms: u64,
    /// Only record damage dealt to `practice_target_id`.
    pub only_record_practice_target: bool,
    pub practice_target_id: u64,
    /// Keep a timestamped fight log per encounter, archived as `fight.log`.
    pub fight_log: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            auto_clear_on_server_change: true,
            auto_clear_on_timeout: false,
            idle_timeout_ms: 15_000,
            only_record_practice_target: false,
            practice_target_id: 75,
            fight_log: false,
        }
    }
}

/// Periods of the housekeeping tasks driven by the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub realtime_refresh_ms: u64,
    pub cleanup_interval_ms: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            realtime_refresh_ms: 100,
            cleanup_interval_ms: 10_000,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    /// Directory receiving archived encounters; archiving is off when absent.
    pub dir: Option<PathBuf>,
    /// JSON file remembering player identities across runs.
    pub identity_cache: Option<PathBuf>,
}
