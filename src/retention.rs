//! Storage reclamation for the watched trees.
//!
//! A sweep walks every root, deletes matching files whose modification time
//! is older than `max_age`, and removes the immediate parent directory of a
//! deleted file if that leaves it empty. Pruning goes exactly one level up;
//! a grandparent left empty stays. The watch root itself is a parent like
//! any other and is removed when its last file expires.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tokio::sync::mpsc;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use walkdir::WalkDir;

use crate::watcher::ExtensionFilter;

const SECS_PER_DAY: u64 = 24 * 60 * 60;

/// What one sweep did (or, in dry-run mode, would do).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Matching files examined.
    pub scanned: usize,
    /// Files deleted, or selected for deletion in dry-run mode.
    pub expired: Vec<PathBuf>,
    /// Directories removed after becoming empty.
    pub pruned: Vec<PathBuf>,
    /// Filesystem errors encountered and skipped.
    pub errors: usize,
}

/// Which files expire and where to look for them.
#[derive(Debug, Clone)]
pub struct RetentionPolicy {
    roots: Vec<PathBuf>,
    filter: ExtensionFilter,
    max_age: Duration,
}

impl RetentionPolicy {
    pub fn new(
        roots: impl IntoIterator<Item = PathBuf>,
        filter: ExtensionFilter,
        max_age_days: u64,
    ) -> Self {
        Self {
            roots: roots.into_iter().collect(),
            filter,
            max_age: Duration::from_secs(max_age_days.saturating_mul(SECS_PER_DAY)),
        }
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    /// Run one sweep against `now`.
    pub fn sweep(&self, now: SystemTime, dry_run: bool) -> SweepReport {
        let mut report = SweepReport::default();

        let mut candidates = Vec::new();
        for root in &self.roots {
            if !root.is_dir() {
                tracing::warn!("[retention] watch directory {} does not exist", root.display());
                continue;
            }
            self.collect_expired(root, now, &mut candidates, &mut report);
        }

        for path in candidates {
            if dry_run {
                report.expired.push(path);
            } else {
                delete_file(&path, &mut report);
            }
        }

        report
    }

    fn collect_expired(
        &self,
        root: &Path,
        now: SystemTime,
        candidates: &mut Vec<PathBuf>,
        report: &mut SweepReport,
    ) {
        for entry in WalkDir::new(root) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::error!("[retention] Failed to walk {}: {e}", root.display());
                    report.errors += 1;
                    continue;
                }
            };
            if !entry.file_type().is_file() || !self.filter.matches(entry.path()) {
                continue;
            }
            report.scanned += 1;

            let modified = match entry.metadata().map(|m| m.modified()) {
                Ok(Ok(modified)) => modified,
                Ok(Err(e)) => {
                    tracing::error!(
                        "[retention] No modification time for {}: {e}",
                        entry.path().display()
                    );
                    report.errors += 1;
                    continue;
                }
                Err(e) => {
                    tracing::error!("[retention] Cannot stat {}: {e}", entry.path().display());
                    report.errors += 1;
                    continue;
                }
            };

            // Timestamps in the future count as brand new.
            let age = now.duration_since(modified).unwrap_or(Duration::ZERO);
            if age > self.max_age {
                candidates.push(entry.into_path());
            }
        }
    }

    /// Parent cleanup after a matching file was deleted by someone else.
    ///
    /// Returns the directory removed, if any.
    pub fn prune_after_delete(&self, path: &Path) -> Option<PathBuf> {
        if !self.filter.matches(path) {
            return None;
        }
        let mut report = SweepReport::default();
        prune_parent(path, &mut report);
        report.pruned.pop()
    }
}

fn delete_file(path: &Path, report: &mut SweepReport) {
    match fs::remove_file(path) {
        Ok(()) => {
            tracing::info!("[retention] Deleted DICOM file: {}", path.display());
            report.expired.push(path.to_path_buf());
            prune_parent(path, report);
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {
            crate::debug_event!("retention", "already gone", "{}", path.display());
        }
        Err(e) => {
            tracing::error!("[retention] Failed to delete DICOM file {}: {e}", path.display());
            report.errors += 1;
        }
    }
}

/// Remove `path`'s parent directory if it is empty.
fn prune_parent(path: &Path, report: &mut SweepReport) {
    let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) else {
        return;
    };

    let is_empty = match fs::read_dir(parent) {
        Ok(mut entries) => entries.next().is_none(),
        Err(e) if e.kind() == ErrorKind::NotFound => return,
        Err(e) => {
            tracing::error!("[retention] Cannot list {}: {e}", parent.display());
            report.errors += 1;
            return;
        }
    };
    if !is_empty {
        return;
    }

    match fs::remove_dir(parent) {
        Ok(()) => {
            tracing::info!("[retention] Removed empty directory: {}", parent.display());
            report.pruned.push(parent.to_path_buf());
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => {
            tracing::error!("[retention] Failed to remove directory {}: {e}", parent.display());
            report.errors += 1;
        }
    }
}

/// Periodic sweep loop.
///
/// Sweeps once at startup and then every `check_interval`. With a deletion
/// receiver attached it also prunes parents of externally deleted files as
/// the events arrive.
pub struct RetentionSweeper {
    policy: Arc<RetentionPolicy>,
    check_interval: Duration,
    deletions: Option<mpsc::UnboundedReceiver<PathBuf>>,
}

impl RetentionSweeper {
    pub fn new(policy: RetentionPolicy, check_interval: Duration) -> Self {
        Self {
            policy: Arc::new(policy),
            check_interval,
            deletions: None,
        }
    }

    /// Prune parents of deletions reported on `rx`.
    pub fn with_deletions(mut self, rx: mpsc::UnboundedReceiver<PathBuf>) -> Self {
        self.deletions = Some(rx);
        self
    }

    pub fn policy(&self) -> &RetentionPolicy {
        &self.policy
    }

    /// Run until `token` is cancelled. A sweep in progress finishes first.
    pub async fn run(mut self, token: CancellationToken) {
        let mut ticker = interval(self.check_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut deletions = self.deletions.take();

        crate::log_event!(
            "retention",
            "started",
            "max age {} days, sweeping every {:?}",
            self.policy.max_age.as_secs() / SECS_PER_DAY,
            self.check_interval
        );

        loop {
            tokio::select! {
                _ = token.cancelled() => break,

                _ = ticker.tick() => self.sweep().await,

                Some(path) = next_deletion(&mut deletions) => {
                    let policy = Arc::clone(&self.policy);
                    on_worker("prune", move || policy.prune_after_delete(&path)).await;
                }
            }
        }

        crate::log_event!("retention", "stopped");
    }

    async fn sweep(&self) {
        let policy = Arc::clone(&self.policy);
        let work = move || policy.sweep(SystemTime::now(), false);
        if let Some(report) = on_worker("sweep", work).await {
            crate::log_event!(
                "retention",
                "sweep",
                "{} scanned, {} deleted, {} directories removed, {} errors",
                report.scanned,
                report.expired.len(),
                report.pruned.len(),
                report.errors
            );
        }
    }
}

/// Run filesystem work on the blocking pool. A panicked or cancelled worker
/// is logged and yields `None`.
async fn on_worker<T, F>(what: &str, work: F) -> Option<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(work).await {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::error!("[retention] {what} worker failed: {e}");
            None
        }
    }
}

async fn next_deletion(rx: &mut Option<mpsc::UnboundedReceiver<PathBuf>>) -> Option<PathBuf> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
