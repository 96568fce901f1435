//! Runtime settings for the router.
//!
//! Layered with figment, lowest precedence first:
//! - built-in defaults
//! - TOML file (`--config`, or `dicom-router.toml` in the working directory)
//! - environment variables
//! - CLI flags (applied by the binary after loading)
//!
//! # Environment Variables
//!
//! Environment variables must be prefixed with `DICOM_ROUTER_` and use double
//! underscores to separate nested levels:
//! - `DICOM_ROUTER_RETENTION__MAX_AGE_DAYS=30` sets `retention.max_age_days`
//! - `DICOM_ROUTER_PIPELINE__DRAIN_INTERVAL_SECS=1.5` sets `pipeline.drain_interval_secs`
//! - `DICOM_ROUTER_ROUTES_FILE=/etc/router.json` sets `routes_file`
//!
//! Routing rules live in their own JSON file (`routes_file`), see
//! [`crate::routing`].

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ConfigError, ConfigResult};

const DEFAULT_CONFIG_FILE: &str = "dicom-router.toml";
const ENV_PREFIX: &str = "DICOM_ROUTER_";

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Settings {
    /// JSON file holding the routing rules
    #[serde(default = "default_routes_file")]
    pub routes_file: PathBuf,

    /// Directory for per-process log files
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,

    /// Extension of the image files to route and expire (case-insensitive)
    #[serde(default = "default_extension")]
    pub extension: String,

    #[serde(default)]
    pub stability: StabilityConfig,

    #[serde(default)]
    pub pipeline: PipelineConfig,

    #[serde(default)]
    pub retention: RetentionConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct StabilityConfig {
    /// Seconds between size samples of pending files
    #[serde(default = "default_stability_check_interval")]
    pub check_interval_secs: f64,

    /// Seconds a file size must hold before the write counts as complete
    #[serde(default = "default_stable_duration")]
    pub stable_duration_secs: f64,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Seconds between drains of stable files
    #[serde(default = "default_drain_interval")]
    pub drain_interval_secs: f64,

    /// Upper bound for a single upload
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: f64,

    /// Metadata keyword compared against the rules
    #[serde(default = "default_classification_field")]
    pub classification_field: String,

    /// Multipart field name carrying the file
    #[serde(default = "default_form_field")]
    pub form_field: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct RetentionConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Files older than this many days are deleted
    #[serde(default = "default_max_age_days")]
    pub max_age_days: u64,

    /// Seconds between sweeps
    #[serde(default = "default_retention_check_interval")]
    pub check_interval_secs: f64,

    /// Remove a directory as soon as its last image is deleted externally
    #[serde(default)]
    pub prune_on_delete: bool,
}

/// Log levels: `default` applies everywhere, `modules` overrides per target.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub default: String,

    #[serde(default)]
    pub modules: HashMap<String, String>,
}

// Default value functions
fn default_routes_file() -> PathBuf {
    PathBuf::from("custom/settings.json")
}
fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}
fn default_extension() -> String {
    "dcm".to_string()
}
fn default_stability_check_interval() -> f64 {
    0.2
}
fn default_stable_duration() -> f64 {
    0.6
}
fn default_drain_interval() -> f64 {
    3.0
}
fn default_request_timeout() -> f64 {
    30.0
}
fn default_classification_field() -> String {
    "StudyDescription".to_string()
}
fn default_form_field() -> String {
    "image".to_string()
}
fn default_true() -> bool {
    true
}
fn default_max_age_days() -> u64 {
    14
}
fn default_retention_check_interval() -> f64 {
    86_400.0
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            routes_file: default_routes_file(),
            log_dir: default_log_dir(),
            extension: default_extension(),
            stability: StabilityConfig::default(),
            pipeline: PipelineConfig::default(),
            retention: RetentionConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for StabilityConfig {
    fn default() -> Self {
        Self {
            check_interval_secs: default_stability_check_interval(),
            stable_duration_secs: default_stable_duration(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            drain_interval_secs: default_drain_interval(),
            request_timeout_secs: default_request_timeout(),
            classification_field: default_classification_field(),
            form_field: default_form_field(),
        }
    }
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_age_days: default_max_age_days(),
            check_interval_secs: default_retention_check_interval(),
            prune_on_delete: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default: default_log_level(),
            modules: HashMap::new(),
        }
    }
}

impl StabilityConfig {
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs_f64(self.check_interval_secs)
    }

    pub fn stable_duration(&self) -> Duration {
        Duration::from_secs_f64(self.stable_duration_secs)
    }
}

impl PipelineConfig {
    pub fn drain_interval(&self) -> Duration {
        Duration::from_secs_f64(self.drain_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.request_timeout_secs)
    }
}

impl RetentionConfig {
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs_f64(self.check_interval_secs)
    }
}

impl Settings {
    /// Load settings from defaults, the TOML file and the environment.
    ///
    /// With `config_path` set, that file is used; otherwise
    /// `dicom-router.toml` in the working directory is read if it exists.
    pub fn load(config_path: Option<&Path>) -> ConfigResult<Self> {
        Self::load_with_prefix(config_path, ENV_PREFIX)
    }

    fn load_with_prefix(config_path: Option<&Path>, env_prefix: &str) -> ConfigResult<Self> {
        let path = config_path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

        if config_path.is_some() && !path.exists() {
            return Err(ConfigError::InvalidSetting {
                key: "config".to_string(),
                reason: format!("file '{}' not found", path.display()),
            });
        }

        Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(env_prefix).split("__"))
            .extract()
            .map_err(|e| ConfigError::Settings(Box::new(e)))
    }

    /// Check that intervals are usable and names are non-empty.
    pub fn validate(&self) -> ConfigResult<()> {
        check_positive("stability.check_interval_secs", self.stability.check_interval_secs)?;
        check_positive("stability.stable_duration_secs", self.stability.stable_duration_secs)?;
        check_positive("pipeline.drain_interval_secs", self.pipeline.drain_interval_secs)?;
        check_positive("pipeline.request_timeout_secs", self.pipeline.request_timeout_secs)?;
        check_positive("retention.check_interval_secs", self.retention.check_interval_secs)?;

        if self.extension.trim_start_matches('.').trim().is_empty() {
            return Err(invalid("extension", "must not be empty"));
        }
        if self.pipeline.form_field.trim().is_empty() {
            return Err(invalid("pipeline.form_field", "must not be empty"));
        }
        if self.pipeline.classification_field.trim().is_empty() {
            return Err(invalid("pipeline.classification_field", "must not be empty"));
        }
        Ok(())
    }

    /// Render as TOML for display.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

fn invalid(key: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidSetting {
        key: key.to_string(),
        reason: reason.into(),
    }
}

fn check_positive(key: &str, value: f64) -> ConfigResult<()> {
    // Intervals must survive Duration conversion and stay non-zero for tokio.
    let representable = Duration::try_from_secs_f64(value)
        .ok()
        .filter(|d| !d.is_zero());
    if representable.is_none() {
        return Err(invalid(
            key,
            format!("must be a positive number of seconds, got {value}"),
        ));
    }
    Ok(())
}
