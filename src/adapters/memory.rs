use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::domain::job::{ExportRequest, JobHandle, JobStatus};
use crate::domain::ports::ExportSink;
use crate::utils::error::{GeoExportError, Result};

/// 記憶體內的 sink，保留所有提交的請求；每次查詢狀態就往
/// PENDING -> RUNNING -> SUCCEEDED 前進一步
#[derive(Clone, Default)]
pub struct RecordingSink {
    requests: Arc<Mutex<Vec<ExportRequest>>>,
    polls: Arc<Mutex<HashMap<String, usize>>>,
    rejected: HashSet<String>,
    failing: HashSet<String>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// 拒絕此描述的提交
    pub fn reject(mut self, description: &str) -> Self {
        self.rejected.insert(description.to_string());
        self
    }

    /// 此描述的工作最後為 FAILED
    pub fn fail_job(mut self, description: &str) -> Self {
        self.failing.insert(description.to_string());
        self
    }

    pub async fn requests(&self) -> Vec<ExportRequest> {
        self.requests.lock().await.clone()
    }
}

#[async_trait]
impl ExportSink for RecordingSink {
    async fn submit(&self, request: &ExportRequest) -> Result<JobHandle> {
        if self.rejected.contains(&request.description) {
            return Err(GeoExportError::ApiError {
                status: 400,
                message: format!("export '{}' rejected", request.description),
            });
        }

        let mut requests = self.requests.lock().await;
        requests.push(request.clone());
        Ok(JobHandle {
            description: request.description.clone(),
            operation: format!("operations/LOCAL{:04}", requests.len()),
        })
    }

    async fn status(&self, handle: &JobHandle) -> Result<JobStatus> {
        let mut polls = self.polls.lock().await;
        let count = polls.entry(handle.operation.clone()).or_insert(0);
        *count += 1;

        Ok(match *count {
            1 => JobStatus::Pending,
            2 => JobStatus::Running,
            _ if self.failing.contains(&handle.description) => {
                JobStatus::Failed("simulated failure".to_string())
            }
            _ => JobStatus::Succeeded,
        })
    }
}
