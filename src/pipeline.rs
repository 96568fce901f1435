//! Drain cycle: stable paths to endpoint uploads.
//!
//! Every `drain_interval` the pipeline takes the whole [`StabilizedPaths`]
//! set and, for each path, reads its metadata, normalizes the
//! classification field and uploads the file to every rule with the same
//! key. Per-file and per-dispatch failures are logged and never stop the
//! cycle.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::time::{Duration, MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;

use crate::delivery::{Delivery, DeliveryOutcome};
use crate::metadata::{FieldMap, MetadataExtractor};
use crate::normalize::normalize;
use crate::routing::{RoutingRule, RoutingTable};
use crate::watcher::StabilizedPaths;

/// Counters for one drain cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Paths taken from the stabilized set.
    pub files: usize,
    /// Paths whose metadata could not be read.
    pub skipped: usize,
    /// Paths that matched no rule.
    pub unmatched: usize,
    pub delivered: usize,
    pub failed: usize,
}

impl fmt::Display for CycleReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} files, {} delivered, {} failed, {} unmatched, {} unreadable",
            self.files, self.delivered, self.failed, self.unmatched, self.skipped
        )
    }
}

pub struct IngestionPipeline {
    table: Arc<RoutingTable>,
    extractor: Arc<dyn MetadataExtractor>,
    delivery: Arc<dyn Delivery>,
    pending: StabilizedPaths,
    classification_field: String,
    drain_interval: Duration,
}

impl IngestionPipeline {
    pub fn new(
        table: Arc<RoutingTable>,
        extractor: Arc<dyn MetadataExtractor>,
        delivery: Arc<dyn Delivery>,
        pending: StabilizedPaths,
    ) -> Self {
        Self {
            table,
            extractor,
            delivery,
            pending,
            classification_field: "StudyDescription".to_string(),
            drain_interval: Duration::from_secs(3),
        }
    }

    /// Metadata keyword compared against the rules.
    pub fn classification_field(mut self, keyword: impl Into<String>) -> Self {
        self.classification_field = keyword.into();
        self
    }

    pub fn drain_interval(mut self, interval: Duration) -> Self {
        self.drain_interval = interval;
        self
    }

    /// Run drain cycles until `token` is cancelled.
    ///
    /// A cycle in progress when the token fires runs to completion.
    pub async fn run(self, token: CancellationToken) {
        let mut ticker = interval(self.drain_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        crate::log_event!(
            "pipeline",
            "started",
            "draining every {:?}, {} rules",
            self.drain_interval,
            self.table.len()
        );

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => {
                    let report = self.drain_once().await;
                    if report.files > 0 {
                        crate::log_event!("pipeline", "cycle", "{report}");
                    }
                }
            }
        }

        let left = self.pending.len();
        crate::log_event!("pipeline", "stopped", "{left} stable files not processed");
    }

    /// Take every stable path and process it.
    pub async fn drain_once(&self) -> CycleReport {
        let mut paths: Vec<PathBuf> = self.pending.take().into_iter().collect();
        paths.sort();

        let mut report = CycleReport {
            files: paths.len(),
            ..CycleReport::default()
        };

        for path in &paths {
            self.process(path, &mut report).await;
        }

        report
    }

    async fn process(&self, path: &Path, report: &mut CycleReport) {
        let fields = match self.extract(path).await {
            Ok(fields) => fields,
            Err(reason) => {
                tracing::error!("[pipeline] Failed to process {}: {reason}", path.display());
                report.skipped += 1;
                return;
            }
        };

        let description = fields.get(&self.classification_field).unwrap_or_default();
        let key = normalize(description);

        let rules: Vec<&RoutingRule> = self.table.matching(&key).collect();
        if rules.is_empty() {
            crate::debug_event!(
                "pipeline",
                "no route",
                "{} ({}={description:?})",
                path.display(),
                self.classification_field
            );
            report.unmatched += 1;
            return;
        }

        for rule in rules {
            let outcome = self.dispatch(path, rule).await;
            if outcome.succeeded() {
                report.delivered += 1;
            } else {
                report.failed += 1;
            }
            log_outcome(&outcome);
        }
    }

    async fn extract(&self, path: &Path) -> Result<FieldMap, String> {
        let extractor = Arc::clone(&self.extractor);
        let owned = path.to_path_buf();
        match tokio::task::spawn_blocking(move || extractor.extract(&owned)).await {
            Ok(result) => result.map_err(|e| e.to_string()),
            Err(e) => Err(format!("metadata worker failed: {e}")),
        }
    }

    async fn dispatch(&self, path: &Path, rule: &RoutingRule) -> DeliveryOutcome {
        let error = self.delivery.deliver(path, &rule.endpoint).await.err();
        DeliveryOutcome {
            path: path.to_path_buf(),
            endpoint: rule.endpoint.clone(),
            error,
        }
    }
}

fn log_outcome(outcome: &DeliveryOutcome) {
    match &outcome.error {
        None => tracing::info!(
            "[pipeline] Successfully sent {} to API at {}",
            outcome.path.display(),
            outcome.endpoint
        ),
        Some(e) => tracing::error!(
            "[pipeline] Failed to send {} to API at {}: {e}",
            outcome.path.display(),
            outcome.endpoint
        ),
    }
}
