pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use crate::config::CliConfig;

pub use crate::adapters::{EarthEngineClient, LocalStorage, RecordingSink};
pub use crate::config::ExportConfig;
pub use crate::core::{exporter::YearlyExporter, summary::ExportSummary, watcher::JobWatcher};
pub use crate::domain::geometry::Geometry;
pub use crate::domain::model::{ProductConfig, YearRange};
pub use crate::utils::error::{GeoExportError, Result};
