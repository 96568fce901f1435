//! Lifecycle owner for the three background loops.
//!
//! [`Monitor::start`] builds the watcher, the ingestion pipeline and the
//! retention sweeper from [`Settings`], spawns each on the current tokio
//! runtime and hands back a [`MonitorHandle`]. Dropping the handle does not
//! stop anything; call [`MonitorHandle::shutdown`].

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::Settings;
use crate::delivery::Delivery;
use crate::metadata::MetadataExtractor;
use crate::pipeline::IngestionPipeline;
use crate::retention::{RetentionPolicy, RetentionSweeper};
use crate::routing::RoutingTable;
use crate::watcher::{ExtensionFilter, IngestWatcher, StabilizedPaths, WatchError};

pub struct Monitor;

impl Monitor {
    /// Start all loops. Must be called from within a tokio runtime.
    ///
    /// Fails only if the filesystem watcher cannot be created or none of
    /// the routing roots can be watched.
    pub fn start(
        settings: &Settings,
        table: Arc<RoutingTable>,
        extractor: Arc<dyn MetadataExtractor>,
        delivery: Arc<dyn Delivery>,
    ) -> Result<MonitorHandle, WatchError> {
        let token = CancellationToken::new();
        let stabilized = StabilizedPaths::new();
        let filter = ExtensionFilter::new(&settings.extension);
        let roots: Vec<PathBuf> = table.watch_dirs().into_iter().collect();

        let prune_on_delete = settings.retention.enabled && settings.retention.prune_on_delete;
        let (deletion_tx, deletion_rx) = if prune_on_delete {
            let (tx, rx) = mpsc::unbounded_channel();
            (Some(tx), Some(rx))
        } else {
            (None, None)
        };

        let mut builder = IngestWatcher::builder()
            .roots(roots.clone())
            .filter(filter.clone())
            .check_interval(settings.stability.check_interval())
            .stable_duration(settings.stability.stable_duration())
            .output(stabilized.clone());
        if let Some(tx) = deletion_tx {
            builder = builder.deletion_sink(tx);
        }
        let watcher = builder.build()?;

        let pipeline = IngestionPipeline::new(Arc::clone(&table), extractor, delivery, stabilized)
            .classification_field(settings.pipeline.classification_field.clone())
            .drain_interval(settings.pipeline.drain_interval());

        let mut tasks = Vec::with_capacity(3);
        tasks.push(tokio::spawn(watcher.run(token.child_token())));
        tasks.push(tokio::spawn(pipeline.run(token.child_token())));

        if settings.retention.enabled {
            let policy = RetentionPolicy::new(roots, filter, settings.retention.max_age_days);
            let mut sweeper = RetentionSweeper::new(policy, settings.retention.check_interval());
            if let Some(rx) = deletion_rx {
                sweeper = sweeper.with_deletions(rx);
            }
            tasks.push(tokio::spawn(sweeper.run(token.child_token())));
        } else {
            crate::log_event!("retention", "disabled");
        }

        crate::log_event!("monitor", "started", "{} tasks", tasks.len());

        Ok(MonitorHandle { token, tasks })
    }
}

/// Running loops. Call [`shutdown`](Self::shutdown) to stop and join them.
pub struct MonitorHandle {
    token: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl MonitorHandle {
    /// Token shared by every loop; cancelling it has the same effect as
    /// [`shutdown`](Self::shutdown) minus the join.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Signal every loop to stop and wait for each to finish its current
    /// iteration.
    pub async fn shutdown(self) {
        self.token.cancel();
        for task in self.tasks {
            if let Err(e) = task.await {
                tracing::error!("[monitor] task failed: {e}");
            }
        }
        crate::log_event!("monitor", "stopped");
    }
}
