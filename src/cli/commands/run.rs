//! Run command: start the monitor and block until interrupted.

use std::sync::Arc;

use anyhow::Context;

use crate::config::Settings;
use crate::delivery::HttpDelivery;
use crate::metadata::DicomExtractor;
use crate::monitor::Monitor;
use crate::routing::RoutingTable;

/// Run the monitor until Ctrl-C or SIGTERM, then stop and join every loop.
pub async fn run(settings: &Settings, table: RoutingTable) -> anyhow::Result<()> {
    crate::log_event!(
        "monitor",
        "settings",
        "rules: {}, logs: {}, max age: {} days, sweep every {}s, size check every {}s, stable after {}s, upload every {}s",
        settings.routes_file.display(),
        settings.log_dir.display(),
        settings.retention.max_age_days,
        settings.retention.check_interval_secs,
        settings.stability.check_interval_secs,
        settings.stability.stable_duration_secs,
        settings.pipeline.drain_interval_secs
    );
    for rule in table.rules() {
        crate::log_event!(
            "routing",
            "rule",
            "{} {:?} -> {}",
            rule.watch_dir.display(),
            rule.description,
            rule.endpoint
        );
    }

    let delivery = HttpDelivery::new(
        settings.pipeline.request_timeout(),
        settings.pipeline.form_field.clone(),
    )?;

    let extractor = DicomExtractor::new().with_keyword(&settings.pipeline.classification_field);
    let handle = Monitor::start(
        settings,
        Arc::new(table),
        Arc::new(extractor),
        Arc::new(delivery),
    )
    .context("Failed to start file watching")?;

    shutdown_signal().await;
    crate::log_event!("monitor", "shutting down");
    handle.shutdown().await;
    Ok(())
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("[monitor] failed to listen for ctrl+c: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("[monitor] failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
