use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::core::summary::ExportSummary;
use crate::domain::job::{JobHandle, JobStatus};
use crate::domain::ports::ExportSink;
use crate::utils::error::Result;

/// 輪詢已排入的工作直到全部結束或超過期限；失敗的工作只回報、不重送
pub struct JobWatcher<'a, S: ExportSink> {
    sink: &'a S,
    interval: Duration,
    timeout: Duration,
}

impl<'a, S: ExportSink> JobWatcher<'a, S> {
    pub fn new(sink: &'a S, interval: Duration, timeout: Duration) -> Self {
        Self {
            sink,
            interval,
            timeout,
        }
    }

    /// 每個 operation 最後觀察到的狀態
    pub async fn wait_all(&self, handles: &[JobHandle]) -> Result<HashMap<String, JobStatus>> {
        // 逾時過大時視為沒有期限
        let deadline = Instant::now().checked_add(self.timeout);
        let mut latest: HashMap<String, JobStatus> = HashMap::new();

        loop {
            for handle in handles {
                if latest.get(&handle.operation).map(JobStatus::is_terminal).unwrap_or(false) {
                    continue;
                }

                let status = match self.sink.status(handle).await {
                    Ok(status) => status,
                    Err(e) => {
                        // 查詢失敗不代表工作失敗，下一輪再查
                        tracing::warn!("Status lookup for {} failed: {}", handle.description, e);
                        continue;
                    }
                };

                if status.is_terminal() {
                    match &status {
                        JobStatus::Failed(message) => {
                            tracing::error!("❌ {} failed: {}", handle.description, message)
                        }
                        other => tracing::info!("🏁 {} finished: {}", handle.description, other),
                    }
                }
                latest.insert(handle.operation.clone(), status);
            }

            let pending = handles
                .iter()
                .filter(|h| !latest.get(&h.operation).map(JobStatus::is_terminal).unwrap_or(false))
                .count();

            if pending == 0 {
                break;
            }
            let next_poll = Instant::now().checked_add(self.interval);
            let past_deadline = match (next_poll, deadline) {
                (Some(next), Some(deadline)) => next > deadline,
                (None, _) => true,
                (Some(_), None) => false,
            };
            if past_deadline {
                tracing::warn!("⏱️ Stopped watching with {} jobs still running", pending);
                break;
            }

            tracing::debug!("{} jobs still running, next poll in {:?}", pending, self.interval);
            tokio::time::sleep(self.interval).await;
        }

        Ok(latest)
    }

    /// 監看 `summary` 中所有已提交的工作並寫回結果
    pub async fn watch_summary(&self, summary: &mut ExportSummary) -> Result<()> {
        let statuses = self.wait_all(&summary.handles()).await?;
        for (operation, status) in statuses {
            summary.set_status(&operation, status);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::RecordingSink;

    fn handle(description: &str, operation: &str) -> JobHandle {
        JobHandle {
            description: description.to_string(),
            operation: operation.to_string(),
        }
    }

    #[tokio::test]
    async fn test_wait_until_terminal() {
        let sink = RecordingSink::new().fail_job("Pre2001");
        let watcher = JobWatcher::new(&sink, Duration::from_millis(1), Duration::from_secs(5));

        let handles = vec![handle("Pre2000", "operations/1"), handle("Pre2001", "operations/2")];
        let statuses = watcher.wait_all(&handles).await.unwrap();

        assert_eq!(statuses["operations/1"], JobStatus::Succeeded);
        assert_eq!(
            statuses["operations/2"],
            JobStatus::Failed("simulated failure".to_string())
        );
    }

    #[tokio::test]
    async fn test_deadline_stops_polling() {
        let sink = RecordingSink::new();
        let watcher = JobWatcher::new(&sink, Duration::from_millis(50), Duration::from_millis(10));

        let statuses = watcher
            .wait_all(&[handle("Tem2000", "operations/1")])
            .await
            .unwrap();
        assert_eq!(statuses["operations/1"], JobStatus::Pending);
    }

    #[tokio::test]
    async fn test_watch_summary_records_status() {
        let sink = RecordingSink::new();
        let watcher = JobWatcher::new(&sink, Duration::from_millis(1), Duration::from_secs(5));

        let mut summary = ExportSummary::new(1);
        summary.record_submitted("burned_area", 2000, handle("BurnedArea_2000", "operations/9"));
        watcher.watch_summary(&mut summary).await.unwrap();

        assert_eq!(summary.jobs[0].status, Some(JobStatus::Succeeded));
        assert!(summary.is_successful());
    }

    #[tokio::test]
    async fn test_unbounded_timeout_does_not_overflow() {
        let sink = RecordingSink::new();
        let watcher = JobWatcher::new(&sink, Duration::from_millis(1), Duration::MAX);

        let statuses = watcher
            .wait_all(&[handle("Pre2000", "operations/1")])
            .await
            .unwrap();
        assert_eq!(statuses["operations/1"], JobStatus::Succeeded);
    }
}
