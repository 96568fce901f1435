//! Write-completion detection for incoming files.
//!
//! Scanners and PACS nodes write images in chunks, and every chunk raises a
//! modify event. A file is considered complete once its size has not
//! changed for `stable_duration`. Sizes are sampled by [`StabilityDetector::tick`],
//! which the watcher drives from a single timer for all pending files.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::stabilized::StabilizedPaths;

/// A file that has seen write activity and is not yet stable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingFile {
    /// Size at the previous tick; `None` until the first sample.
    pub last_observed_size: Option<u64>,
    /// Accumulated time without a size change.
    pub unchanged_duration: Duration,
}

impl PendingFile {
    fn new() -> Self {
        Self {
            last_observed_size: None,
            unchanged_duration: Duration::ZERO,
        }
    }
}

/// Tracks pending files and hands stable ones to [`StabilizedPaths`].
#[derive(Debug)]
pub struct StabilityDetector {
    pending: HashMap<PathBuf, PendingFile>,
    check_interval: Duration,
    stable_duration: Duration,
    output: StabilizedPaths,
}

impl StabilityDetector {
    pub fn new(
        check_interval: Duration,
        stable_duration: Duration,
        output: StabilizedPaths,
    ) -> Self {
        Self {
            pending: HashMap::new(),
            check_interval,
            stable_duration,
            output,
        }
    }

    pub fn check_interval(&self) -> Duration {
        self.check_interval
    }

    /// Record write activity on `path`.
    ///
    /// Starts a new episode, or restarts the quiet period of a running one.
    pub fn observe(&mut self, path: PathBuf) {
        self.pending
            .entry(path)
            .and_modify(|p| p.unchanged_duration = Duration::ZERO)
            .or_insert_with(PendingFile::new);
    }

    /// Drop a path that was removed or renamed away.
    pub fn forget(&mut self, path: &Path) -> bool {
        self.pending.remove(path).is_some()
    }

    /// Sample every pending file once.
    ///
    /// Returns the paths that became stable on this tick; they have already
    /// been inserted into the output set and are no longer pending.
    pub fn tick(&mut self) -> Vec<PathBuf> {
        let mut ready = Vec::new();
        let check_interval = self.check_interval;
        let stable_duration = self.stable_duration;

        self.pending.retain(|path, pending| {
            let size = match std::fs::metadata(path) {
                Ok(meta) if meta.is_file() => meta.len(),
                Ok(_) => {
                    crate::debug_event!("stability", "not a regular file", "{}", path.display());
                    return false;
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    crate::debug_event!("stability", "vanished", "{}", path.display());
                    return false;
                }
                Err(e) => {
                    tracing::warn!("[stability] cannot stat {}: {e}", path.display());
                    return false;
                }
            };

            if pending.last_observed_size != Some(size) {
                pending.last_observed_size = Some(size);
                pending.unchanged_duration = Duration::ZERO;
            } else {
                pending.unchanged_duration += check_interval;
            }

            if pending.unchanged_duration >= stable_duration {
                ready.push(path.clone());
                false
            } else {
                true
            }
        });

        for path in &ready {
            if self.output.insert(path.clone()) {
                crate::debug_event!("stability", "stable", "{}", path.display());
            }
        }

        ready
    }

    pub fn pending(&self, path: &Path) -> Option<&PendingFile> {
        self.pending.get(path)
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}
