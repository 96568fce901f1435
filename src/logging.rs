//! Logging setup: stderr plus a per-process log file.
//!
//! Supports the `RUST_LOG` environment variable for runtime overrides.
//!
//! # Configuration
//!
//! ```toml
//! [logging]
//! default = "info"
//!
//! [logging.modules]
//! dicom_router::pipeline = "debug"
//! ```
//!
//! # Environment Variable
//!
//! `RUST_LOG` takes precedence over config:
//! ```bash
//! RUST_LOG=debug dicom-router
//! RUST_LOG=info,dicom_router::watcher=trace dicom-router
//! ```

use std::path::{Path, PathBuf};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::config::LoggingConfig;

/// Timestamp format: `YYYY-MM-DD HH:MM:SS.mmm` in local time.
struct LocalTime;

impl FormatTime for LocalTime {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"))
    }
}

/// Keeps the file writer flushing until dropped. Hold it for the life of
/// the process.
#[must_use = "dropping the guard stops file logging"]
pub struct LogGuard {
    _file: Option<WorkerGuard>,
    path: Option<PathBuf>,
}

impl LogGuard {
    /// Path of the log file, if file logging is active.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

/// Name of this process's log file.
pub fn log_file_name() -> String {
    format!("dicom_router_pid_{}.log", std::process::id())
}

/// `default,module=level,...` directives from the config.
fn config_directives(config: &LoggingConfig) -> String {
    let mut filter_str = config.default.clone();
    for (module, level) in &config.modules {
        filter_str.push_str(&format!(",{module}={level}"));
    }
    filter_str
}

fn build_filter(config: &LoggingConfig) -> EnvFilter {
    // RUST_LOG env var takes precedence over config
    if std::env::var("RUST_LOG").is_ok() {
        return EnvFilter::from_default_env();
    }
    EnvFilter::new(config_directives(config))
}

/// Initialize logging with configuration.
///
/// With `log_dir` set, the directory is created if needed and every line is
/// also written to [`log_file_name`] inside it. Only the first call in a
/// process installs a subscriber; later calls return an inert guard.
///
/// Log levels control visibility:
/// - `error` - failed uploads, unreadable files, filesystem errors
/// - `warn` - skipped roots and rules
/// - `info` - deliveries, deletions and loop lifecycle (default)
/// - `debug` - stability and matching decisions
/// - `trace` - everything
pub fn init_with_config(
    config: &LoggingConfig,
    log_dir: Option<&Path>,
) -> std::io::Result<LogGuard> {
    let (file_layer, file_guard, path) = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let name = log_file_name();
            let appender = tracing_appender::rolling::never(dir, &name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(false)
                .with_timer(LocalTime)
                .with_filter(build_filter(config));
            (Some(layer), Some(guard), Some(dir.join(name)))
        }
        None => (None, None, None),
    };

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_timer(LocalTime)
        .with_level(true)
        .with_filter(build_filter(config));

    let installed = tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .is_ok();

    if !installed {
        return Ok(LogGuard {
            _file: None,
            path: None,
        });
    }
    Ok(LogGuard {
        _file: file_guard,
        path,
    })
}

/// Initialize stderr-only logging with default configuration.
///
/// Used by the one-shot commands. Use `RUST_LOG=debug` for verbose output.
pub fn init() -> LogGuard {
    // Without a log directory there is no I/O that can fail.
    init_with_config(&LoggingConfig::default(), None).unwrap_or(LogGuard {
        _file: None,
        path: None,
    })
}

/// Log an event with component context.
///
/// # Examples
/// ```ignore
/// log_event!("watcher", "watching", "{}", root.display());
/// log_event!("retention", "stopped");
/// ```
#[macro_export]
macro_rules! log_event {
    ($component:expr, $event:expr) => {
        tracing::info!("[{}] {}", $component, $event)
    };
    ($component:expr, $event:expr, $($arg:tt)*) => {
        tracing::info!("[{}] {}: {}", $component, $event, format!($($arg)*))
    };
}

/// Debug-only event logging.
///
/// # Examples
/// ```ignore
/// debug_event!("stability", "stable", "{}", path.display());
/// ```
#[macro_export]
macro_rules! debug_event {
    ($component:expr, $event:expr) => {
        tracing::debug!("[{}] {}", $component, $event)
    };
    ($component:expr, $event:expr, $($arg:tt)*) => {
        tracing::debug!("[{}] {}: {}", $component, $event, format!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_file_name_has_pid() {
        let name = log_file_name();
        assert!(name.starts_with("dicom_router_pid_"));
        assert!(name.ends_with(".log"));
        assert!(name.contains(&std::process::id().to_string()));
    }

    #[test]
    fn test_filter_from_config() {
        let mut config = LoggingConfig::default();
        config
            .modules
            .insert("dicom_router::pipeline".to_string(), "debug".to_string());
        let directives = config_directives(&config);
        assert!(directives.starts_with(&config.default));
        assert!(directives.contains(",dicom_router::pipeline=debug"));

        let filter = EnvFilter::new(&directives);
        assert!(filter.to_string().contains("dicom_router::pipeline=debug"));
    }
}
