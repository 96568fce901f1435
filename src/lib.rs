//! Watches directory trees for DICOM files, routes each completed file to
//! the HTTP endpoints whose rule matches its study description, and expires
//! old files.

pub mod logging;

pub mod cli;
pub mod config;
pub mod delivery;
pub mod error;
pub mod metadata;
pub mod monitor;
pub mod normalize;
pub mod pipeline;
pub mod retention;
pub mod routing;
pub mod watcher;

pub use config::Settings;
pub use delivery::{Delivery, DeliveryError, DeliveryOutcome, HttpDelivery};
pub use error::{ConfigError, ConfigResult};
pub use metadata::{DicomExtractor, FieldMap, MetadataError, MetadataExtractor};
pub use monitor::{Monitor, MonitorHandle};
pub use normalize::normalize;
pub use pipeline::{CycleReport, IngestionPipeline};
pub use retention::{RetentionPolicy, RetentionSweeper, SweepReport};
pub use routing::{RoutingRule, RoutingTable};
pub use watcher::{ExtensionFilter, StabilizedPaths, WatchError};
