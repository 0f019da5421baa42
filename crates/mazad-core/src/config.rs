// Configuration loading and parsing (mazad.toml).

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

use crate::clock::PhaseTimezone;
use crate::listing::{BidRules, BidRulesError};
use crate::phase::Locale;
use crate::schedule::PhaseSchedule;

/// File name looked up in each config location.
pub const CONFIG_FILE: &str = "mazad.toml";

/// Filter used when neither `RUST_LOG` nor `[logging] filter` is set.
pub const DEFAULT_LOG_FILTER: &str = "mazad=info,warn";

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },
}

// ---------------------------------------------------------------------------
// Config structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub schedule: PhaseSchedule,
    pub clock: ClockConfig,
    pub bidding: BidRules,
    pub display: DisplayConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClockConfig {
    /// `"local"` or a fixed UTC offset such as `"+03:00"`.
    pub timezone: PhaseTimezone,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DisplayConfig {
    pub locale: Locale,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: DEFAULT_LOG_FILTER.into(),
        }
    }
}

/// Where a loaded config came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    File(PathBuf),
    BuiltIn,
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Parse and validate a config file that must exist.
pub fn load_config_file(path: &Path) -> Result<Config, ConfigError> {
    let text = read_file(path)?;
    let config: Config = toml::from_str(&text).map_err(|e| ConfigError::ParseError {
        path: path.to_path_buf(),
        source: e,
    })?;
    validate(&config)?;
    Ok(config)
}

/// Load `config/mazad.toml` under `base_dir`, or the built-in defaults when
/// that file does not exist.
pub fn load_config_from(base_dir: &Path) -> Result<(Config, ConfigSource), ConfigError> {
    let path = base_dir.join("config").join(CONFIG_FILE);
    if path.exists() {
        let config = load_config_file(&path)?;
        return Ok((config, ConfigSource::File(path)));
    }
    Ok((Config::default(), ConfigSource::BuiltIn))
}

/// The per-user config file, e.g. `~/.config/mazad/mazad.toml` on Linux.
pub fn user_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "mazad").map(|dirs| dirs.config_dir().join(CONFIG_FILE))
}

/// Resolve the config in lookup order: an explicit path (which must exist),
/// `./config/mazad.toml`, the per-user config file, then built-in defaults.
pub fn load_config(explicit: Option<&Path>) -> Result<(Config, ConfigSource), ConfigError> {
    if let Some(path) = explicit {
        let config = load_config_file(path)?;
        return Ok((config, ConfigSource::File(path.to_path_buf())));
    }

    let cwd = match std::env::current_dir() {
        Ok(dir) => Some(dir),
        Err(e) => {
            warn!("Cannot read working directory, skipping ./config: {e}");
            None
        }
    };
    resolve_config(cwd.as_deref(), user_config_path())
}

/// Lookup after the explicit path: `cwd` (when known), then `user_path`.
fn resolve_config(
    cwd: Option<&Path>,
    user_path: Option<PathBuf>,
) -> Result<(Config, ConfigSource), ConfigError> {
    if let Some(dir) = cwd {
        let (config, source) = load_config_from(dir)?;
        if source != ConfigSource::BuiltIn {
            return Ok((config, source));
        }
    }

    match user_path {
        Some(path) if path.exists() => {
            let config = load_config_file(&path)?;
            Ok((config, ConfigSource::File(path)))
        }
        _ => Ok((Config::default(), ConfigSource::BuiltIn)),
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate(config: &Config) -> Result<(), ConfigError> {
    config
        .schedule
        .validate()
        .map_err(|e| ConfigError::ValidationError {
            field: "schedule".into(),
            message: e.to_string(),
        })?;

    let bidding = &config.bidding;
    if let Err(e) = bidding.validate() {
        let field = if matches!(e, BidRulesError::MinFraction(_)) {
            "bidding.min_fraction"
        } else {
            "bidding.max_fraction"
        };
        return Err(ConfigError::ValidationError {
            field: field.into(),
            message: e.to_string(),
        });
    }

    if config.logging.filter.trim().is_empty() {
        return Err(ConfigError::ValidationError {
            field: "logging.filter".into(),
            message: "must not be empty".into(),
        });
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
