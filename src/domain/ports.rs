use crate::domain::job::{ExportRequest, JobHandle, JobStatus};
use crate::utils::error::Result;
use async_trait::async_trait;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// 匯出工作的去處：提交後取得 handle，可用 handle 查詢狀態
#[async_trait]
pub trait ExportSink: Send + Sync {
    async fn submit(&self, request: &ExportRequest) -> Result<JobHandle>;
    async fn status(&self, handle: &JobHandle) -> Result<JobStatus>;
}
