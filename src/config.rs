//! Ambient run configuration.
//!
//! Provides hierarchical configuration loading from:
//! - acaca.toml (default configuration)
//! - acaca.local.toml (git-ignored local overrides)
//! - Environment variables (`ACACA_*` prefix)
//!
//! This is the "how the program runs" layer — logging, output verbosity,
//! resource limits. The *algorithmic* configuration for a single clustering
//! run (method, loop list, scheme, ...) comes from the control file parsed
//! by [`crate::control`] into a [`crate::control::ClusterConfig`], not from
//! here.
//!
//! ## Example
//!
//! ```toml
//! # acaca.toml
//! [logging]
//! level = "info"
//! format = "text"
//!
//! [limits]
//! max_loops = 5000
//! ```
//!
//! Environment variable overrides:
//! ```bash
//! ACACA_LOGGING__LEVEL=debug
//! ACACA_LIMITS__MAX_LOOPS=10000
//! ```

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// Ambient run configuration, independent of any one clustering job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub limits: Limits,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (text, json).
    #[serde(default = "default_log_format")]
    pub format: String,
}

/// Resource/safety limits not otherwise expressed in the control file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Limits {
    /// Refuse to cluster more than this many loops in one run (0 = unbounded).
    #[serde(default)]
    pub max_loops: usize,
}

fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "text".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Default for Limits {
    fn default() -> Self {
        Limits { max_loops: 0 }
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            logging: LoggingConfig::default(),
            limits: Limits::default(),
        }
    }
}

impl RunConfig {
    /// Load configuration from the default locations.
    ///
    /// Merges in order:
    /// 1. `acaca.toml` (base configuration)
    /// 2. `acaca.local.toml` (local overrides, git-ignored)
    /// 3. Environment variables (`ACACA_*` prefix)
    pub fn load() -> Result<Self, figment::Error> {
        Figment::from(figment::providers::Serialized::defaults(
            RunConfig::default(),
        ))
        .merge(Toml::file("acaca.toml"))
        .merge(Toml::file("acaca.local.toml"))
        .merge(Env::prefixed("ACACA_").split("__"))
        .extract()
    }

    /// Load configuration from a specific file path.
    pub fn from_file(path: &str) -> Result<Self, figment::Error> {
        Figment::from(figment::providers::Serialized::defaults(
            RunConfig::default(),
        ))
        .merge(Toml::file(path))
        .merge(Env::prefixed("ACACA_").split("__"))
        .extract()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_info_level_text_format() {
        let config = RunConfig::default();
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, "text");
        assert_eq!(config.limits.max_loops, 0);
    }

    #[test]
    fn from_file_falls_back_to_defaults_when_file_absent() {
        let config = RunConfig::from_file("does-not-exist.toml").unwrap();
        assert_eq!(config.logging.level, "info");
    }
}
