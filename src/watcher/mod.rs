//! Ingest side of the router: filesystem events to stable paths.
//!
//! # Architecture
//!
//! ```text
//! notify::RecommendedWatcher (recursive, one per process)
//!         |
//!   IngestWatcher task
//!     - ExtensionFilter
//!     - StabilityDetector (sampled every check_interval)
//!         |
//!   StabilizedPaths (shared, swapped on drain)
//!         |
//!   IngestionPipeline
//! ```

mod error;
mod filter;
mod ingest;
mod stability;
mod stabilized;

pub use error::WatchError;
pub use filter::ExtensionFilter;
pub use ingest::{IngestWatcher, IngestWatcherBuilder};
pub use stability::{PendingFile, StabilityDetector};
pub use stabilized::StabilizedPaths;
