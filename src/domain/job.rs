use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::domain::expression::ImageRecipe;
use crate::domain::geometry::Geometry;
use crate::domain::model::FileFormat;

/// 平台把一張影像輸出成檔案所需的全部資訊
#[derive(Debug, Clone, PartialEq)]
pub struct ExportRequest {
    pub product: String,
    pub year: i32,
    pub recipe: ImageRecipe,
    pub description: String,
    pub scale: f64,
    pub region: Geometry,
    pub file_format: FileFormat,
    pub drive_folder: Option<String>,
}

impl ExportRequest {
    /// `projects/{project}/image:export` 的 REST 請求內容
    pub fn to_api_body(&self) -> serde_json::Value {
        let mut drive_destination = serde_json::json!({
            "filenamePrefix": self.description,
        });
        if let Some(folder) = &self.drive_folder {
            drive_destination["folder"] = serde_json::Value::String(folder.clone());
        }

        let mut body = serde_json::json!({
            "expression": self.recipe.to_export_expression(&self.region, self.scale),
            "description": self.description,
            "fileExportOptions": {
                "fileFormat": self.file_format.as_api_str(),
                "driveDestination": drive_destination,
            },
        });
        let request_id = Self::request_id_for(&self.product, self.year, &self.description, &body);
        body["requestId"] = serde_json::Value::String(request_id);
        body
    }

    /// 相同的請求內容得到相同的 id，重送時平台不會重複排入工作
    pub fn request_id(&self) -> String {
        self.to_api_body()["requestId"]
            .as_str()
            .unwrap_or_default()
            .to_string()
    }

    fn request_id_for(product: &str, year: i32, description: &str, body: &serde_json::Value) -> String {
        let mut hasher = Sha256::new();
        hasher.update(product.as_bytes());
        hasher.update(year.to_be_bytes());
        hasher.update(description.as_bytes());
        // serde_json 的 Map 依鍵排序，序列化結果固定
        hasher.update(body.to_string().as_bytes());
        let digest = format!("{:x}", hasher.finalize());
        format!("{}-{}-{}", product, year, &digest[..16])
    }
}

/// 已排入的匯出工作；`operation` 為平台上的資源名稱
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobHandle {
    pub description: String,
    pub operation: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Pending,
    Running,
    Succeeded,
    Failed(String),
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Succeeded | JobStatus::Failed(_) | JobStatus::Cancelled
        )
    }

    /// 對應 REST API operation 的 `metadata.state`
    pub fn from_api_state(state: &str, error: Option<String>) -> Self {
        match state {
            "PENDING" | "STATE_UNSPECIFIED" => JobStatus::Pending,
            "RUNNING" | "CANCELLING" => JobStatus::Running,
            "SUCCEEDED" => JobStatus::Succeeded,
            "CANCELLED" => JobStatus::Cancelled,
            "FAILED" => JobStatus::Failed(error.unwrap_or_else(|| "unknown error".to_string())),
            other => JobStatus::Failed(format!("unrecognised state {}", other)),
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Pending => write!(f, "PENDING"),
            JobStatus::Running => write!(f, "RUNNING"),
            JobStatus::Succeeded => write!(f, "SUCCEEDED"),
            JobStatus::Failed(_) => write!(f, "FAILED"),
            JobStatus::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{DatasetRef, DateRange, Reducer};

    fn request(year: i32) -> ExportRequest {
        let roi = Geometry::Polygon {
            coordinates: vec![vec![
                vec![0.0, 0.0],
                vec![1.0, 0.0],
                vec![1.0, 1.0],
                vec![0.0, 0.0],
            ]],
        };
        ExportRequest {
            product: "precipitation".to_string(),
            year,
            recipe: ImageRecipe {
                dataset: DatasetRef::new("UCSB-CHG/CHIRPS/PENTAD", "precipitation"),
                range: DateRange::for_year(year).unwrap(),
                reducer: Reducer::Sum,
                transform: None,
                clip_to: roi.clone(),
            },
            description: format!("Pre{}", year),
            scale: 5000.0,
            region: roi,
            file_format: FileFormat::GeoTiff,
            drive_folder: None,
        }
    }

    #[test]
    fn test_request_id_is_stable_per_request() {
        let first = request(2003);
        let id = first.request_id();

        assert!(id.starts_with("precipitation-2003-"));
        assert_eq!(id.len(), "precipitation-2003-".len() + 16);
        assert_eq!(request(2003).request_id(), id);
        assert_ne!(request(2004).request_id(), id);

        let mut moved = request(2003);
        moved.drive_folder = Some("elsewhere".to_string());
        assert_ne!(moved.request_id(), id);
    }

    #[test]
    fn test_api_body_keys() {
        let body = request(2003).to_api_body();
        let mut keys: Vec<&str> = body
            .as_object()
            .unwrap()
            .keys()
            .map(String::as_str)
            .collect();
        keys.sort();
        assert_eq!(
            keys,
            vec!["description", "expression", "fileExportOptions", "requestId"]
        );
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(JobStatus::from_api_state("PENDING", None), JobStatus::Pending);
        assert_eq!(JobStatus::from_api_state("RUNNING", None), JobStatus::Running);
        assert_eq!(
            JobStatus::from_api_state("FAILED", Some("quota".to_string())),
            JobStatus::Failed("quota".to_string())
        );
        assert!(JobStatus::from_api_state("SUCCEEDED", None).is_terminal());
        assert!(JobStatus::from_api_state("CANCELLED", None).is_terminal());
        assert!(!JobStatus::from_api_state("CANCELLING", None).is_terminal());
        assert!(JobStatus::from_api_state("BOGUS", None).is_terminal());
    }
}
