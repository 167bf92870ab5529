//! Configuration loading.
//!
//! Configuration is loaded from TOML with the following resolution order:
//! 1. An explicit path (e.g. `--config <path>`)
//! 2. `~/.huginn/config.toml` (user)
//! 3. `/etc/huginn/config.toml` (system)
//!
//! Every section and field is optional; anything omitted keeps its default.
//! With no file at all, [`HuginnConfig::load`] returns the defaults.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cache::CacheConfig;
use crate::effort::EffortConfig;
use crate::signature::SignatureConfig;
use crate::store::bounded::DEFAULT_STORE_TIMEOUT;
use crate::usage::UsageLimits;
use crate::{HuginnError, Result};

/// Complete huginn configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HuginnConfig {
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub limits: UsageLimits,
    #[serde(default)]
    pub effort: EffortConfig,
    #[serde(default)]
    pub signature: SignatureConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub backend: BackendConfig,
}

/// Shared store settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Ceiling on any single store operation (default: 250).
    #[serde(default = "default_operation_timeout_ms")]
    pub operation_timeout_ms: u64,
    /// Redis URL for the shared L2 cache and counters. In-process
    /// storage is used when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redis_url: Option<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            operation_timeout_ms: default_operation_timeout_ms(),
            redis_url: None,
        }
    }
}

impl StoreConfig {
    pub fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms)
    }
}

fn default_operation_timeout_ms() -> u64 {
    DEFAULT_STORE_TIMEOUT.as_millis() as u64
}

/// Backend call settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Ceiling on one backend call in milliseconds (default: 120000).
    #[serde(default = "default_backend_timeout")]
    pub timeout_ms: u64,
    /// Cost estimate used for admission when the request carries none
    /// (default: 0.01).
    #[serde(default = "default_estimated_cost")]
    pub default_estimated_cost_usd: f64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_backend_timeout(),
            default_estimated_cost_usd: default_estimated_cost(),
        }
    }
}

impl BackendConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

fn default_backend_timeout() -> u64 {
    120_000
}

fn default_estimated_cost() -> f64 {
    0.01
}

impl HuginnConfig {
    /// Load configuration from the standard locations.
    ///
    /// An explicit path that does not exist is an error. Without one, the
    /// first existing standard location wins, falling back to defaults.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        match Self::resolve_config_path(explicit_path)? {
            Some(path) => Self::load_from_file(&path),
            None => {
                debug!("no config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| HuginnError::Configuration(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Render as TOML.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| HuginnError::Configuration(format!("Failed to render config: {e}")))
    }

    fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            HuginnError::Configuration(format!("Failed to read config file {path:?}: {e}"))
        })?;
        debug!(?path, "loading config");
        Self::from_toml_str(&content).map_err(|e| match e {
            HuginnError::Configuration(msg) => {
                HuginnError::Configuration(format!("{msg} (in {path:?})"))
            }
            other => other,
        })
    }

    fn resolve_config_path(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
        if let Some(path) = explicit {
            if path.exists() {
                return Ok(Some(path.to_path_buf()));
            }
            return Err(HuginnError::Configuration(format!(
                "Config file not found: {path:?}"
            )));
        }

        // User config
        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".huginn").join("config.toml");
            if user_config.exists() {
                return Ok(Some(user_config));
            }
        }

        // System config
        let system_config = PathBuf::from("/etc/huginn/config.toml");
        if system_config.exists() {
            return Ok(Some(system_config));
        }

        Ok(None)
    }

    /// Reject values no component can work with.
    pub fn validate(&self) -> Result<()> {
        let limits = &self.limits;
        for (name, usd) in [
            ("limits.per_analysis_usd", limits.per_analysis_usd),
            ("limits.daily_budget_usd", limits.daily_budget_usd),
            ("limits.monthly_budget_usd", limits.monthly_budget_usd),
            (
                "backend.default_estimated_cost_usd",
                self.backend.default_estimated_cost_usd,
            ),
        ] {
            if !usd.is_finite() || usd < 0.0 {
                return Err(HuginnError::Configuration(format!(
                    "{name} must be a non-negative amount, got {usd}"
                )));
            }
        }
        if !(0.0..=1.0).contains(&self.effort.learning_rate) {
            return Err(HuginnError::Configuration(format!(
                "effort.learning_rate must be within [0, 1], got {}",
                self.effort.learning_rate
            )));
        }
        if self.signature.resize_dim == 0 {
            return Err(HuginnError::Configuration(
                "signature.resize_dim must be at least 1".to_string(),
            ));
        }
        if self.store.operation_timeout_ms == 0 || self.backend.timeout_ms == 0 {
            return Err(HuginnError::Configuration(
                "store and backend timeouts must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}
