use std::process::ExitCode;

use clap::Parser;
use dicom_router::cli::commands;
use dicom_router::cli::{Cli, Commands};
use dicom_router::logging;
use dicom_router::{DicomExtractor, RoutingTable, Settings};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut settings = match Settings::load(cli.config.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };
    cli.apply_overrides(&mut settings);
    if let Err(e) = settings.validate() {
        eprintln!("Error: {e}");
        return ExitCode::FAILURE;
    }

    let command = cli.subcommand();

    // Only the long-running monitor writes a log file.
    let log_dir = matches!(command, Commands::Run).then_some(settings.log_dir.as_path());
    let _log_guard = match logging::init_with_config(&settings.logging, log_dir) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!(
                "Error: cannot create log directory {}: {e}",
                settings.log_dir.display()
            );
            return ExitCode::FAILURE;
        }
    };

    let table = match RoutingTable::load(&settings.routes_file) {
        Ok(table) => table,
        Err(e) => {
            tracing::error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let result = match command {
        Commands::Run => commands::run::run(&settings, table).await,
        Commands::Check => commands::check::run(&settings, &table),
        Commands::Inspect { files } => commands::inspect::run(
            &files,
            &DicomExtractor::new().with_keyword(&settings.pipeline.classification_field),
            &table,
            &settings.pipeline.classification_field,
        ),
        Commands::Sweep { dry_run } => commands::sweep::run(&settings, &table, dry_run),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}
