//! Earth Engine 影像匯出 REST 客戶端
//!
//! 只用到兩個呼叫：`projects/{project}/image:export` 排入工作，
//! `GET {operation}` 讀回狀態。

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::Deserialize;
use std::time::Duration;

use crate::domain::job::{ExportRequest, JobHandle, JobStatus};
use crate::domain::ports::ExportSink;
use crate::utils::error::{GeoExportError, Result};

pub const DEFAULT_ENDPOINT: &str = "https://earthengine.googleapis.com";

#[derive(Debug, Deserialize)]
struct Operation {
    name: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    metadata: Option<OperationMetadata>,
    #[serde(default)]
    error: Option<ApiStatus>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OperationMetadata {
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiStatus {
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ApiStatus,
}

impl Operation {
    fn status(&self) -> JobStatus {
        let error = self.error.as_ref().and_then(|e| e.message.clone());
        match self.metadata.as_ref().and_then(|m| m.state.as_deref()) {
            Some(state) => JobStatus::from_api_state(state, error),
            None if self.done => match error {
                Some(message) => JobStatus::Failed(message),
                None => JobStatus::Succeeded,
            },
            None => JobStatus::Pending,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EarthEngineClient {
    client: Client,
    endpoint: String,
    project: String,
    access_token: Option<String>,
}

impl EarthEngineClient {
    pub fn new(
        endpoint: &str,
        project: &str,
        access_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            project: project.to_string(),
            access_token,
        })
    }

    pub fn export_url(&self) -> String {
        format!("{}/v1/projects/{}/image:export", self.endpoint, self.project)
    }

    pub fn operation_url(&self, operation: &str) -> String {
        format!("{}/v1/{}", self.endpoint, operation.trim_start_matches('/'))
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.access_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn read_operation(response: Response) -> Result<Operation> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json::<Operation>().await?);
        }

        let body = response.text().await.unwrap_or_default();
        // API 錯誤格式: {"error": {"code": .., "message": ..}}
        let message = serde_json::from_str::<ErrorEnvelope>(&body)
            .ok()
            .and_then(|envelope| envelope.error.message)
            .unwrap_or(body);

        Err(GeoExportError::ApiError {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl ExportSink for EarthEngineClient {
    async fn submit(&self, request: &ExportRequest) -> Result<JobHandle> {
        let url = self.export_url();
        tracing::debug!("Submitting export '{}' to {}", request.description, url);

        let response = self
            .authorize(self.client.post(&url))
            .json(&request.to_api_body())
            .send()
            .await?;

        let operation = Self::read_operation(response).await?;
        let state = operation.status();
        tracing::debug!(
            "Export '{}' queued as {} ({})",
            request.description,
            operation.name,
            state
        );

        Ok(JobHandle {
            description: request.description.clone(),
            operation: operation.name,
        })
    }

    async fn status(&self, handle: &JobHandle) -> Result<JobStatus> {
        let response = self
            .authorize(self.client.get(self.operation_url(&handle.operation)))
            .send()
            .await?;

        let operation = Self::read_operation(response).await?;
        if let Some(description) = operation.metadata.as_ref().and_then(|m| m.description.as_ref()) {
            if description != &handle.description {
                tracing::warn!(
                    "Operation {} reports description '{}', expected '{}'",
                    handle.operation,
                    description,
                    handle.description
                );
            }
        }
        Ok(operation.status())
    }
}
