//! Startup error types.
//!
//! Steady-state failures have their own types next to the stage that
//! produces them (`MetadataError`, `DeliveryError`, `WatchError`). Only the
//! errors here stop the process.

use std::path::PathBuf;
use thiserror::Error;

/// Fatal configuration errors raised before any loop starts.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Routing rules file '{path}' not found")]
    RulesNotFound { path: PathBuf },

    #[error("Cannot read routing rules file '{path}': {source}")]
    RulesUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Error decoding JSON from routing rules file '{path}': {source}")]
    RulesMalformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("No valid routing rules found in '{path}'")]
    NoRules { path: PathBuf },

    #[error("Invalid setting {key}: {reason}")]
    InvalidSetting { key: String, reason: String },

    #[error("Failed to load settings: {0}")]
    Settings(#[from] Box<figment::Error>),
}

pub type ConfigResult<T> = Result<T, ConfigError>;
