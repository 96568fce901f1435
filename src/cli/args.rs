//! CLI argument parsing using clap.
//!
//! Global options keep the long names operators already use
//! (`--settings`, `--maxage`, `--filecheckinterval`, ...). Each one, when
//! given, overrides the value loaded from the TOML file and environment.

use clap::{
    Parser, Subcommand,
    builder::styling::{AnsiColor, Effects, Styles},
};
use std::path::PathBuf;

use crate::config::Settings;

fn clap_cargo_style() -> Styles {
    Styles::styled()
        .header(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::Green.on_default())
}

/// DICOM watcher, router and retention sweeper
#[derive(Parser, Debug)]
#[command(
    name = "dicom-router",
    version = env!("CARGO_PKG_VERSION"),
    about = "Route completed DICOM files to HTTP endpoints by study description",
    long_about = "Watch the directories named in the routing rules, upload each completed .dcm file to every endpoint whose rule matches its StudyDescription, and delete files older than the retention age.",
    next_line_help = true,
    styles = clap_cargo_style(),
    after_help = "Examples:\n  dicom-router --settings custom/settings.json --logdir logs\n  dicom-router check\n  dicom-router inspect incoming/1.dcm\n  dicom-router sweep --dry-run --maxage 30"
)]
pub struct Cli {
    /// Path to a settings TOML file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Path to the routing rules JSON file
    #[arg(long, global = true, value_name = "FILE")]
    pub settings: Option<PathBuf>,

    /// Directory for log files
    #[arg(long, global = true, value_name = "DIR")]
    pub logdir: Option<PathBuf>,

    /// Maximum file age in days before deletion
    #[arg(long, global = true, value_name = "DAYS")]
    pub maxage: Option<u64>,

    /// Seconds between retention sweeps
    #[arg(long, global = true, value_name = "SECS")]
    pub checkinterval: Option<f64>,

    /// Seconds between file size checks
    #[arg(long, global = true, value_name = "SECS")]
    pub filecheckinterval: Option<f64>,

    /// Seconds a file size must stay unchanged to count as complete
    #[arg(long, global = true, value_name = "SECS")]
    pub filestableduration: Option<f64>,

    /// Seconds between upload cycles
    #[arg(long, global = true, value_name = "SECS")]
    pub apicheckinterval: Option<f64>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Commands {
    /// Start watching, routing and sweeping (default)
    #[command(about = "Start the monitor and run until interrupted")]
    Run,

    /// Validate settings and routing rules
    #[command(about = "Load settings and rules, print the effective configuration")]
    Check,

    /// Show how files would be routed
    #[command(
        about = "Read metadata from files and show where they would be sent",
        after_help = "Nothing is uploaded."
    )]
    Inspect {
        /// DICOM files to inspect
        #[arg(value_name = "FILE", required = true)]
        files: Vec<PathBuf>,
    },

    /// Run one retention sweep now
    #[command(about = "Delete expired files once and print the report")]
    Sweep {
        /// Report what would be deleted without deleting
        #[arg(long)]
        dry_run: bool,
    },
}

impl Cli {
    /// Command to run, `run` when none was given.
    pub fn subcommand(&self) -> Commands {
        self.command.clone().unwrap_or(Commands::Run)
    }

    /// Apply the flags that were given on top of `settings`.
    pub fn apply_overrides(&self, settings: &mut Settings) {
        if let Some(path) = &self.settings {
            settings.routes_file = path.clone();
        }
        if let Some(dir) = &self.logdir {
            settings.log_dir = dir.clone();
        }
        if let Some(days) = self.maxage {
            settings.retention.max_age_days = days;
        }
        if let Some(secs) = self.checkinterval {
            settings.retention.check_interval_secs = secs;
        }
        if let Some(secs) = self.filecheckinterval {
            settings.stability.check_interval_secs = secs;
        }
        if let Some(secs) = self.filestableduration {
            settings.stability.stable_duration_secs = secs;
        }
        if let Some(secs) = self.apicheckinterval {
            settings.pipeline.drain_interval_secs = secs;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_defaults_to_run() {
        let cli = Cli::parse_from(["dicom-router"]);
        assert_eq!(cli.subcommand(), Commands::Run);
    }

    #[test]
    fn test_flags_override_settings() {
        let cli = Cli::parse_from([
            "dicom-router",
            "--settings",
            "/etc/rules.json",
            "--logdir",
            "/var/log/router",
            "--maxage",
            "30",
            "--checkinterval",
            "3600",
            "--filecheckinterval",
            "0.5",
            "--filestableduration",
            "2",
            "--apicheckinterval",
            "10",
        ]);

        let mut settings = Settings::default();
        cli.apply_overrides(&mut settings);

        assert_eq!(settings.routes_file, PathBuf::from("/etc/rules.json"));
        assert_eq!(settings.log_dir, PathBuf::from("/var/log/router"));
        assert_eq!(settings.retention.max_age_days, 30);
        assert_eq!(settings.retention.check_interval_secs, 3600.0);
        assert_eq!(settings.stability.check_interval_secs, 0.5);
        assert_eq!(settings.stability.stable_duration_secs, 2.0);
        assert_eq!(settings.pipeline.drain_interval_secs, 10.0);
    }

    #[test]
    fn test_absent_flags_keep_settings() {
        let cli = Cli::parse_from(["dicom-router", "check"]);
        let mut settings = Settings::default();
        cli.apply_overrides(&mut settings);
        assert_eq!(settings, Settings::default());
        assert_eq!(cli.subcommand(), Commands::Check);
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["dicom-router", "sweep", "--dry-run", "--maxage", "7"]);
        assert_eq!(cli.subcommand(), Commands::Sweep { dry_run: true });
        assert_eq!(cli.maxage, Some(7));
    }

    #[test]
    fn test_sub_nanosecond_interval_rejected() {
        let cli = Cli::parse_from(["dicom-router", "--apicheckinterval", "1e-10", "check"]);
        let mut settings = Settings::default();
        cli.apply_overrides(&mut settings);
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_inspect_requires_files() {
        assert!(Cli::try_parse_from(["dicom-router", "inspect"]).is_err());
    }
}
