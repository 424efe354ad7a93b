pub mod exporter;
pub mod summary;
pub mod trend;
pub mod watcher;

pub use crate::domain::job::{ExportRequest, JobHandle, JobStatus};
pub use crate::domain::ports::{ExportSink, Storage};
pub use crate::utils::error::Result;
