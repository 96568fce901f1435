//! Filesystem watcher feeding the stability detector.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::time::{Duration, MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;

use super::error::WatchError;
use super::filter::ExtensionFilter;
use super::stability::StabilityDetector;
use super::stabilized::StabilizedPaths;

/// Watches the routing roots recursively and drives the stability detector.
///
/// One task owns both the notify event stream and the sampling timer, so
/// the detector needs no locking. Stable paths leave through the shared
/// [`StabilizedPaths`] set.
pub struct IngestWatcher {
    /// Roots that are actually being watched.
    roots: Vec<PathBuf>,
    filter: ExtensionFilter,
    detector: StabilityDetector,
    /// Receives external deletions when directory pruning on delete is on.
    deletion_sink: Option<mpsc::UnboundedSender<PathBuf>>,
    event_rx: mpsc::Receiver<notify::Result<Event>>,
    /// The underlying file watcher, kept alive for the lifetime of the loop.
    _watcher: notify::RecommendedWatcher,
}

impl IngestWatcher {
    pub fn builder() -> IngestWatcherBuilder {
        IngestWatcherBuilder::new()
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    pub fn detector(&self) -> &StabilityDetector {
        &self.detector
    }

    /// Run until `token` is cancelled.
    pub async fn run(mut self, token: CancellationToken) {
        let mut ticker = interval(self.detector.check_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        crate::log_event!("watcher", "started", "{} roots", self.roots.len());

        loop {
            tokio::select! {
                _ = token.cancelled() => break,

                Some(res) = self.event_rx.recv() => {
                    match res {
                        Ok(event) => self.handle_event(event),
                        Err(e) => tracing::error!("[watcher] file watch error: {e}"),
                    }
                }

                _ = ticker.tick() => {
                    if self.detector.has_pending() {
                        self.detector.tick();
                    }
                }
            }
        }

        crate::log_event!(
            "watcher",
            "stopped",
            "{} files still pending",
            self.detector.pending_count()
        );
    }

    /// Route one notify event to the detector.
    pub fn handle_event(&mut self, event: Event) {
        match event.kind {
            EventKind::Create(_) => {
                for path in event.paths {
                    self.observe(path);
                }
            }
            EventKind::Modify(ModifyKind::Name(mode)) => self.handle_rename(mode, event.paths),
            EventKind::Modify(ModifyKind::Metadata(_)) => {}
            EventKind::Modify(_) => {
                for path in event.paths {
                    self.observe(path);
                }
            }
            EventKind::Remove(_) => {
                for path in event.paths {
                    self.removed(path);
                }
            }
            _ => {}
        }
    }

    fn handle_rename(&mut self, mode: RenameMode, paths: Vec<PathBuf>) {
        match mode {
            RenameMode::From => {
                for path in &paths {
                    self.forget(path);
                }
            }
            RenameMode::To => {
                for path in paths {
                    self.observe(path);
                }
            }
            RenameMode::Both => {
                let mut paths = paths.into_iter();
                if let Some(from) = paths.next() {
                    self.forget(&from);
                }
                if let Some(to) = paths.next() {
                    self.observe(to);
                }
            }
            _ => {
                for path in paths {
                    if path.exists() {
                        self.observe(path);
                    } else {
                        self.forget(&path);
                    }
                }
            }
        }
    }

    fn observe(&mut self, path: PathBuf) {
        if !self.filter.matches(&path) {
            return;
        }
        self.detector.observe(path);
    }

    fn forget(&mut self, path: &Path) {
        if self.filter.matches(path) && self.detector.forget(path) {
            crate::debug_event!("watcher", "forgot", "{}", path.display());
        }
    }

    fn removed(&mut self, path: PathBuf) {
        if !self.filter.matches(&path) {
            return;
        }
        self.detector.forget(&path);
        if let Some(sink) = &self.deletion_sink {
            let _ = sink.send(path);
        }
    }
}

/// Builder for constructing an [`IngestWatcher`].
pub struct IngestWatcherBuilder {
    roots: BTreeSet<PathBuf>,
    filter: ExtensionFilter,
    check_interval: Duration,
    stable_duration: Duration,
    output: Option<StabilizedPaths>,
    deletion_sink: Option<mpsc::UnboundedSender<PathBuf>>,
}

impl IngestWatcherBuilder {
    /// Create a new builder with defaults.
    pub fn new() -> Self {
        Self {
            roots: BTreeSet::new(),
            filter: ExtensionFilter::default(),
            check_interval: Duration::from_millis(200),
            stable_duration: Duration::from_millis(600),
            output: None,
            deletion_sink: None,
        }
    }

    /// Add directories to watch recursively.
    pub fn roots(mut self, roots: impl IntoIterator<Item = PathBuf>) -> Self {
        self.roots.extend(roots);
        self
    }

    pub fn filter(mut self, filter: ExtensionFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Set the size sampling interval.
    pub fn check_interval(mut self, interval: Duration) -> Self {
        self.check_interval = interval;
        self
    }

    /// Set how long a size must hold before a file counts as complete.
    pub fn stable_duration(mut self, duration: Duration) -> Self {
        self.stable_duration = duration;
        self
    }

    /// Set the set stable paths are handed to.
    pub fn output(mut self, output: StabilizedPaths) -> Self {
        self.output = Some(output);
        self
    }

    /// Forward deletions of matching files to `sink`.
    pub fn deletion_sink(mut self, sink: mpsc::UnboundedSender<PathBuf>) -> Self {
        self.deletion_sink = Some(sink);
        self
    }

    /// Create the notify watcher and register every root.
    ///
    /// A root that cannot be watched is logged and skipped; failing on all of
    /// them is an error.
    pub fn build(self) -> Result<IngestWatcher, WatchError> {
        let output = self.output.ok_or_else(|| WatchError::InitFailed {
            reason: "Output set is required".to_string(),
        })?;

        let (tx, rx) = mpsc::channel(1024);
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let _ = tx.blocking_send(res);
        })?;

        let mut roots = Vec::new();
        for root in self.roots {
            match watcher.watch(&root, RecursiveMode::Recursive) {
                Ok(()) => {
                    crate::log_event!("watcher", "watching", "{}", root.display());
                    roots.push(root);
                }
                Err(e) => {
                    let err = WatchError::PathWatchFailed {
                        path: root,
                        reason: e.to_string(),
                    };
                    tracing::error!("[watcher] {err}");
                }
            }
        }

        if roots.is_empty() {
            return Err(WatchError::NothingWatched);
        }

        Ok(IngestWatcher {
            roots,
            filter: self.filter,
            detector: StabilityDetector::new(self.check_interval, self.stable_duration, output),
            deletion_sink: self.deletion_sink,
            event_rx: rx,
            _watcher: watcher,
        })
    }
}

impl Default for IngestWatcherBuilder {
    fn default() -> Self {
        Self::new()
    }
}
