//! 執行摘要與工作清單 CSV

use serde::Serialize;
use std::time::Duration;

use crate::domain::job::{ExportRequest, JobHandle, JobStatus};
use crate::utils::error::Result;

/// 一個計畫中的匯出及其結果
#[derive(Debug, Clone)]
pub struct JobRecord {
    pub product: String,
    pub year: i32,
    pub description: String,
    pub handle: Option<JobHandle>,
    pub status: Option<JobStatus>,
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
struct ManifestRow<'a> {
    product: &'a str,
    year: i32,
    description: &'a str,
    operation: &'a str,
    state: String,
}

#[derive(Debug, Clone, Default)]
pub struct ExportSummary {
    pub planned: usize,
    pub submitted: usize,
    pub failed_submissions: usize,
    pub jobs: Vec<JobRecord>,
    pub duration: Duration,
}

impl ExportSummary {
    pub fn new(planned: usize) -> Self {
        Self {
            planned,
            ..Self::default()
        }
    }

    /// 未提交計畫的摘要（dry run），每個工作狀態為 `PLANNED`
    pub fn from_plan(requests: &[ExportRequest]) -> Self {
        let mut summary = Self::new(requests.len());
        summary.jobs = requests
            .iter()
            .map(|request| JobRecord {
                product: request.product.clone(),
                year: request.year,
                description: request.description.clone(),
                handle: None,
                status: None,
                error: None,
            })
            .collect();
        summary
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    pub fn record_submitted(&mut self, product: &str, year: i32, handle: JobHandle) {
        self.submitted += 1;
        self.jobs.push(JobRecord {
            product: product.to_string(),
            year,
            description: handle.description.clone(),
            handle: Some(handle),
            status: None,
            error: None,
        });
    }

    pub fn record_failure(&mut self, product: &str, year: i32, description: &str, error: String) {
        self.failed_submissions += 1;
        self.jobs.push(JobRecord {
            product: product.to_string(),
            year,
            description: description.to_string(),
            handle: None,
            status: None,
            error: Some(error),
        });
    }

    pub fn handles(&self) -> Vec<JobHandle> {
        self.jobs.iter().filter_map(|job| job.handle.clone()).collect()
    }

    pub fn set_status(&mut self, operation: &str, status: JobStatus) {
        for job in self.jobs.iter_mut().filter(|job| {
            job.handle
                .as_ref()
                .map(|h| h.operation == operation)
                .unwrap_or(false)
        }) {
            job.status = Some(status.clone());
        }
    }

    pub fn failed_jobs(&self) -> usize {
        self.jobs
            .iter()
            .filter(|job| matches!(job.status, Some(JobStatus::Failed(_))))
            .count()
    }

    pub fn is_successful(&self) -> bool {
        self.failed_submissions == 0 && self.failed_jobs() == 0
    }

    pub fn log_summary(&self) {
        tracing::info!(
            planned = self.planned,
            submitted = self.submitted,
            failed_submissions = self.failed_submissions,
            failed_jobs = self.failed_jobs(),
            duration_ms = self.duration.as_millis() as u64,
            "Export run completed"
        );

        for job in self.jobs.iter().filter(|job| job.error.is_some()) {
            tracing::warn!(
                description = %job.description,
                error = job.error.as_deref().unwrap_or_default(),
                "Export was not queued"
            );
        }
    }

    /// `product,year,description,operation,state`；state 為最後監看到的狀態，
    /// 或 `SUBMITTED`、`NOT_SUBMITTED`、`PLANNED`
    pub fn write_manifest_csv<W: std::io::Write>(&self, writer: W) -> Result<()> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        for job in &self.jobs {
            let state = match (&job.status, &job.handle, &job.error) {
                (Some(status), _, _) => status.to_string(),
                (None, Some(_), _) => "SUBMITTED".to_string(),
                (None, None, Some(_)) => "NOT_SUBMITTED".to_string(),
                (None, None, None) => "PLANNED".to_string(),
            };
            csv_writer.serialize(ManifestRow {
                product: &job.product,
                year: job.year,
                description: &job.description,
                operation: job.handle.as_ref().map(|h| h.operation.as_str()).unwrap_or(""),
                state,
            })?;
        }
        csv_writer.flush()?;
        Ok(())
    }

    pub fn manifest_csv(&self) -> Result<String> {
        let mut buffer = Vec::new();
        self.write_manifest_csv(&mut buffer)?;
        String::from_utf8(buffer).map_err(|e| crate::utils::error::GeoExportError::ProcessingError {
            message: format!("manifest is not valid UTF-8: {}", e),
        })
    }
}
