//! Coordinator configuration: loading, defaults, persistence.
//!
//! Retry counts and cooldown windows are deliberately configuration, not
//! constants baked into call sites.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {reason}")]
    Read { path: String, reason: String },
    #[error("failed to parse {path}: {reason}")]
    Parse { path: String, reason: String },
    #[error("failed to write {path}: {reason}")]
    Write { path: String, reason: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    pub retry: RetryConfig,
    pub debounce: DebounceConfig,
    pub ledger: LedgerConfig,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            debounce: DebounceConfig::default(),
            ledger: LedgerConfig::default(),
        }
    }
}

/// Backoff shape for transient failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub backoff_base_ms: u64,
    pub backoff_factor: u32,
    pub backoff_max_ms: u64,
    pub max_attempts: u32,
    /// One retry total for unclassifiable failures.
    pub unknown_max_attempts: u32,
    /// ±10% jitter on computed delays. Off in deterministic tests.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            backoff_base_ms: 400,
            backoff_factor: 2,
            backoff_max_ms: 10_000,
            max_attempts: 3,
            unknown_max_attempts: 1,
            jitter: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DebounceConfig {
    pub default_cooldown_ms: u64,
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self {
            default_cooldown_ms: 2_000,
        }
    }
}

impl DebounceConfig {
    pub fn default_cooldown(&self) -> Duration {
        Duration::from_millis(self.default_cooldown_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// How long terminal entries stay queryable for late-push dedup.
    pub retention_ms: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self { retention_ms: 30_000 }
    }
}

impl LedgerConfig {
    pub fn retention(&self) -> Duration {
        Duration::from_millis(self.retention_ms)
    }
}

pub fn load(path: &Path) -> Result<CoordinatorConfig, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|e| ConfigError::Read {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    toml::from_str(&contents).map_err(|e| ConfigError::Parse {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}

/// Load the config, falling back to defaults (and writing them out) when the
/// file is missing or unreadable.
pub fn load_or_init(path: &Path) -> CoordinatorConfig {
    if path.exists() {
        match load(path) {
            Ok(cfg) => return cfg,
            Err(e) => {
                tracing::warn!("config load failed, using defaults: {e}");
                return CoordinatorConfig::default();
            }
        }
    }

    let cfg = CoordinatorConfig::default();
    if let Err(e) = write_config(path, &cfg) {
        tracing::warn!("failed to write default config: {e}");
    }
    cfg
}

pub fn write_config(path: &Path, cfg: &CoordinatorConfig) -> Result<(), ConfigError> {
    let write_err = |reason: String| ConfigError::Write {
        path: path.display().to_string(),
        reason,
    };

    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).map_err(|e| write_err(e.to_string()))?;
    }
    let contents =
        toml::to_string_pretty(cfg).map_err(|e| write_err(format!("render failed: {e}")))?;

    let dir = path
        .parent()
        .ok_or_else(|| write_err("missing parent directory".to_string()))?;
    let temp = tempfile::NamedTempFile::new_in(dir).map_err(|e| write_err(e.to_string()))?;
    fs::write(temp.path(), contents.as_bytes()).map_err(|e| write_err(e.to_string()))?;
    temp.persist(path)
        .map_err(|e| write_err(e.to_string()))?;
    Ok(())
}
