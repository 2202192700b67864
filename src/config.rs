use std::path::PathBuf;

use anyhow::Result;
use chrono::Duration;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::dedupe::DEFAULT_DUPLICATE_RADIUS_M;
use crate::escalation::DEFAULT_SLA_WINDOW_HOURS;
use crate::geo::Grid;

/// Application configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub engine: EngineConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
    pub workers: WorkersConfig,
}

/// Tunables of the lifecycle engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Reports closer than this (meters) to an active complaint are merged
    pub duplicate_radius_m: f64,
    /// Only merge into complaints younger than this many hours; unset means any age
    pub duplicate_max_age_hours: Option<u32>,
    /// PENDING/ASSIGNED complaints untouched for this long are escalated
    pub sla_window_hours: u32,
    /// Size of the spatial index cells, in degrees
    pub grid_cell_degrees: f64,
    /// Number of neighbourhood lock stripes
    pub lock_stripes: usize,
    /// Optional cap on urgency; urgency saturates instead of decreasing
    pub max_urgency: Option<u32>,
    /// Reports one user may file at one spot per window; 0 disables the guard
    pub spam_limit: u32,
    /// Spam guard window, in seconds
    pub spam_window_secs: u64,
    /// Re-scans allowed when a primary changes under a merge
    pub merge_attempts: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_dir: String,
    pub blob_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub file_path: Option<String>,
    pub format: String, // "json" or "text"
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkersConfig {
    pub roster_path: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            duplicate_radius_m: DEFAULT_DUPLICATE_RADIUS_M,
            duplicate_max_age_hours: None,
            sla_window_hours: DEFAULT_SLA_WINDOW_HOURS,
            grid_cell_degrees: 0.01,
            lock_stripes: 64,
            max_urgency: None,
            spam_limit: 5,
            spam_window_secs: 3600,
            merge_attempts: 3,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            storage: StorageConfig {
                data_dir: "data/complaints".to_string(),
                blob_dir: "data/photos".to_string(),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                file_path: None,
                format: "text".to_string(),
            },
            workers: WorkersConfig {
                roster_path: "config/workers.yaml".to_string(),
            },
        }
    }
}

impl EngineConfig {
    /// Validate engine tunables
    pub fn validate(&self) -> Result<()> {
        if !(self.duplicate_radius_m.is_finite() && self.duplicate_radius_m > 0.0) {
            return Err(anyhow::anyhow!("duplicate_radius_m must be a positive number"));
        }
        if self.sla_window_hours == 0 {
            return Err(anyhow::anyhow!("sla_window_hours must be greater than 0"));
        }
        if !(self.grid_cell_degrees > 0.0 && self.grid_cell_degrees <= 1.0) {
            return Err(anyhow::anyhow!("grid_cell_degrees must be in (0, 1]"));
        }
        // The 3x3 neighbourhood only covers the radius if a cell is wider than it.
        let min_width = self.grid().min_cell_width_m();
        if self.duplicate_radius_m >= min_width {
            return Err(anyhow::anyhow!(
                "duplicate_radius_m ({}) must be smaller than the narrowest grid cell ({min_width:.1} m)",
                self.duplicate_radius_m
            ));
        }
        if self.lock_stripes == 0 {
            return Err(anyhow::anyhow!("lock_stripes must be greater than 0"));
        }
        if self.max_urgency == Some(0) {
            return Err(anyhow::anyhow!("max_urgency must be at least 1"));
        }
        if self.spam_limit > 0 && self.spam_window_secs == 0 {
            return Err(anyhow::anyhow!("spam_window_secs must be greater than 0"));
        }
        if self.merge_attempts == 0 {
            return Err(anyhow::anyhow!("merge_attempts must be greater than 0"));
        }
        Ok(())
    }

    /// Grid described by `grid_cell_degrees`.
    #[must_use]
    pub const fn grid(&self) -> Grid {
        Grid::new(self.grid_cell_degrees)
    }

    /// SLA window as a duration.
    #[must_use]
    pub fn sla_window(&self) -> Duration {
        Duration::hours(i64::from(self.sla_window_hours))
    }

    /// Duplicate age limit as a duration.
    #[must_use]
    pub fn duplicate_max_age(&self) -> Option<Duration> {
        self.duplicate_max_age_hours
            .map(|hours| Duration::hours(i64::from(hours)))
    }

    /// Spam guard window as a duration.
    #[must_use]
    pub fn spam_window(&self) -> Duration {
        Duration::seconds(i64::try_from(self.spam_window_secs).unwrap_or(i64::MAX))
    }
}

impl AppConfig {
    /// Load configuration from multiple sources with precedence
    pub fn load() -> Result<Self> {
        let defaults = Config::try_from(&AppConfig::default())
            .map_err(|e| anyhow::anyhow!("Failed to build default configuration: {}", e))?;

        let config = Config::builder()
            // Start with default values
            .add_source(defaults)
            // Add config file if it exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(File::with_name("citycare").required(false))
            // Add environment variables with prefix, e.g. CITYCARE_ENGINE__SLA_WINDOW_HOURS
            .add_source(
                Environment::with_prefix("CITYCARE")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;

        let app_config: AppConfig = config
            .try_deserialize()
            .map_err(|e| anyhow::anyhow!("Failed to deserialize configuration: {}", e))?;

        // Validate configuration
        app_config.validate()?;

        Ok(app_config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        self.engine.validate()?;

        if self.storage.data_dir.trim().is_empty() {
            return Err(anyhow::anyhow!("storage.data_dir cannot be empty"));
        }
        if self.storage.blob_dir.trim().is_empty() {
            return Err(anyhow::anyhow!("storage.blob_dir cannot be empty"));
        }

        // Validate logging config
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(anyhow::anyhow!(
                "Invalid log level: {}. Must be one of: {:?}",
                self.logging.level,
                valid_levels
            ));
        }

        let valid_formats = ["text", "json"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            return Err(anyhow::anyhow!(
                "Invalid log format: {}. Must be one of: {:?}",
                self.logging.format,
                valid_formats
            ));
        }

        Ok(())
    }

    /// Get log level from environment or config
    pub fn get_log_level(&self) -> String {
        std::env::var("RUST_LOG").unwrap_or_else(|_| self.logging.level.clone())
    }

    /// Log file path, if file logging is enabled
    pub fn log_file(&self) -> Option<PathBuf> {
        self.logging.file_path.as_ref().map(PathBuf::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.engine.duplicate_radius_m, 50.0);
        assert_eq!(config.engine.sla_window_hours, 16);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_config_validation() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_config() {
        let mut config = AppConfig::default();
        config.engine.lock_stripes = 0;
        assert!(config.validate().is_err());
    }
}
