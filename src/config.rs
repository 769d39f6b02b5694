/*!
 * Configuration support for the practice analytics library
 *
 * Provides runtime configuration options for customizing library behavior.
 */

use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};

/// Global configuration for the practice analytics library
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PracticeConfig {
    /// Directory holding the practice CSV resources
    #[serde(default)]
    pub data_dir: Option<PathBuf>,

    /// Whether to show a spinner while resources load
    #[serde(default = "default_enable_progress_bar")]
    pub enable_progress_bar: bool,

    /// Whether to load resources concurrently
    #[serde(default = "default_parallel_loads")]
    pub parallel_loads: bool,

    /// How strictly rows are checked when typed records are built
    #[serde(default)]
    pub validation_level: ValidationLevel,

    /// Trailing window used when a view is not given explicit dates
    #[serde(default = "default_window_days")]
    pub default_window_days: u32,

    /// Number of rows in the recent patients view
    #[serde(default = "default_recent_patients_limit")]
    pub recent_patients_limit: usize,

    /// Number of rows in the outstanding claims list
    #[serde(default = "default_outstanding_claims_limit")]
    pub outstanding_claims_limit: usize,
}

/// Validation level for typed record conversion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ValidationLevel {
    /// Only the identity column of each resource is required
    Lenient,
    /// Rows missing required fields are quarantined (recommended)
    #[default]
    Standard,
    /// Any invalid row fails the whole resource
    Strict,
}

impl ValidationLevel {
    /// Parse a level name, case-insensitively
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "lenient" => Some(ValidationLevel::Lenient),
            "standard" => Some(ValidationLevel::Standard),
            "strict" => Some(ValidationLevel::Strict),
            _ => None,
        }
    }
}

impl Default for PracticeConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            enable_progress_bar: default_enable_progress_bar(),
            parallel_loads: default_parallel_loads(),
            validation_level: ValidationLevel::Standard,
            default_window_days: default_window_days(),
            recent_patients_limit: default_recent_patients_limit(),
            outstanding_claims_limit: default_outstanding_claims_limit(),
        }
    }
}

// Default value functions for serde
fn default_enable_progress_bar() -> bool {
    true
}

fn default_parallel_loads() -> bool {
    true
}

fn default_window_days() -> u32 {
    crate::constants::DEFAULT_WINDOW_DAYS
}

fn default_recent_patients_limit() -> usize {
    crate::constants::DEFAULT_RECENT_LIMIT
}

fn default_outstanding_claims_limit() -> usize {
    crate::constants::DEFAULT_OUTSTANDING_LIMIT
}

impl PracticeConfig {
    /// Create a new configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from environment variables
    ///
    /// Supported environment variables:
    /// - `PRACTICE_DATA_DIR`: directory path
    /// - `PRACTICE_PROGRESS_BAR`: "true" or "false"
    /// - `PRACTICE_PARALLEL_LOADS`: "true" or "false"
    /// - `PRACTICE_VALIDATION_LEVEL`: "lenient", "standard", or "strict"
    /// - `PRACTICE_WINDOW_DAYS`: number of days
    /// - `PRACTICE_RECENT_LIMIT`: number
    /// - `PRACTICE_OUTSTANDING_LIMIT`: number
    pub fn from_env() -> Self {
        Self::default().merge_env(|key| std::env::var(key).ok())
    }

    /// Apply variables from a lookup function on top of this configuration
    fn merge_env<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(val) = lookup("PRACTICE_DATA_DIR") {
            self.data_dir = Some(PathBuf::from(val));
        }

        if let Some(val) = lookup("PRACTICE_PROGRESS_BAR") {
            self.enable_progress_bar = val.to_lowercase() == "true";
        }

        if let Some(val) = lookup("PRACTICE_PARALLEL_LOADS") {
            self.parallel_loads = val.to_lowercase() == "true";
        }

        if let Some(val) = lookup("PRACTICE_VALIDATION_LEVEL") {
            self.validation_level = ValidationLevel::from_name(&val).unwrap_or_default();
        }

        if let Some(val) = lookup("PRACTICE_WINDOW_DAYS") {
            if let Ok(days) = val.parse() {
                self.default_window_days = days;
            }
        }

        if let Some(val) = lookup("PRACTICE_RECENT_LIMIT") {
            if let Ok(limit) = val.parse() {
                self.recent_patients_limit = limit;
            }
        }

        if let Some(val) = lookup("PRACTICE_OUTSTANDING_LIMIT") {
            if let Ok(limit) = val.parse() {
                self.outstanding_claims_limit = limit;
            }
        }

        self
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        let config: Self = toml::from_str(&contents)
            .map_err(|e| crate::PracticeError::Configuration {
                message: format!("Failed to parse config file: {}", e),
                suggestion: Some("Check that the file is valid TOML format".to_string()),
            })?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> crate::Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| crate::PracticeError::Configuration {
                message: format!("Failed to serialize config: {}", e),
                suggestion: None,
            })?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Get the default configuration file path
    ///
    /// Returns `~/.config/practice-analytics/config.toml` on Unix-like systems
    /// or `%APPDATA%\practice-analytics\config.toml` on Windows
    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "practice-analytics")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Load configuration from the default location, environment, or defaults
    ///
    /// Priority order:
    /// 1. Default config file (if exists), with environment overrides on top
    /// 2. Environment variables
    /// 3. Built-in defaults
    pub fn load() -> Self {
        if let Some(config_path) = Self::default_config_path() {
            if config_path.exists() {
                match Self::from_file(&config_path) {
                    Ok(config) => return config.merge_env(|key| std::env::var(key).ok()),
                    Err(e) => log::warn!("Ignoring config file {}: {}", config_path.display(), e),
                }
            }
        }

        Self::from_env()
    }
}

// Global configuration support
use std::sync::RwLock;

lazy_static::lazy_static! {
    static ref GLOBAL_CONFIG: RwLock<Option<PracticeConfig>> = RwLock::new(None);
}

/// Set the global configuration
pub fn set_global_config(config: PracticeConfig) {
    match GLOBAL_CONFIG.write() {
        Ok(mut slot) => *slot = Some(config),
        Err(poisoned) => *poisoned.into_inner() = Some(config),
    }
}

/// Get the global configuration (or the loaded default if not set)
pub fn global_config() -> PracticeConfig {
    let current = match GLOBAL_CONFIG.read() {
        Ok(slot) => slot.clone(),
        Err(poisoned) => poisoned.into_inner().clone(),
    };
    current.unwrap_or_else(PracticeConfig::load)
}

/// Clear the global configuration
pub fn clear_global_config() {
    match GLOBAL_CONFIG.write() {
        Ok(mut slot) => *slot = None,
        Err(poisoned) => *poisoned.into_inner() = None,
    }
}

/// Builder for customizing configuration
#[derive(Default)]
pub struct ConfigBuilder {
    config: PracticeConfig,
}

impl ConfigBuilder {
    /// Start building a new configuration
    pub fn new() -> Self {
        Self {
            config: PracticeConfig::default(),
        }
    }

    /// Set the data directory
    pub fn data_dir<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.config.data_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Set progress bar enabled
    pub fn progress_bar(mut self, enabled: bool) -> Self {
        self.config.enable_progress_bar = enabled;
        self
    }

    /// Set concurrent resource loading
    pub fn parallel_loads(mut self, enabled: bool) -> Self {
        self.config.parallel_loads = enabled;
        self
    }

    /// Set validation level
    pub fn validation_level(mut self, level: ValidationLevel) -> Self {
        self.config.validation_level = level;
        self
    }

    /// Set the default trailing window
    pub fn default_window_days(mut self, days: u32) -> Self {
        self.config.default_window_days = days;
        self
    }

    /// Set the recent patients limit
    pub fn recent_patients_limit(mut self, limit: usize) -> Self {
        self.config.recent_patients_limit = limit;
        self
    }

    /// Set the outstanding claims limit
    pub fn outstanding_claims_limit(mut self, limit: usize) -> Self {
        self.config.outstanding_claims_limit = limit;
        self
    }

    /// Build the configuration
    pub fn build(self) -> PracticeConfig {
        self.config
    }
}
