use thiserror::Error;

#[derive(Error, Debug)]
pub enum GeoExportError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Earth Engine API returned {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error in '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Invalid geometry: {message}")]
    GeometryError { message: String },

    #[error("Duplicate export description: {description}")]
    DuplicateDescriptionError { description: String },

    #[error("Data processing error: {message}")]
    ProcessingError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Api,
    Configuration,
    Input,
    Processing,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl GeoExportError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            GeoExportError::HttpError(_) => ErrorCategory::Network,
            GeoExportError::ApiError { .. } => ErrorCategory::Api,
            GeoExportError::ConfigValidationError { .. }
            | GeoExportError::MissingConfigError { .. }
            | GeoExportError::InvalidConfigValueError { .. }
            | GeoExportError::DuplicateDescriptionError { .. } => ErrorCategory::Configuration,
            GeoExportError::GeometryError { .. } | GeoExportError::CsvError(_) => {
                ErrorCategory::Input
            }
            GeoExportError::SerializationError(_) | GeoExportError::ProcessingError { .. } => {
                ErrorCategory::Processing
            }
            GeoExportError::IoError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            GeoExportError::HttpError(_) => ErrorSeverity::Medium,
            // 429 / 5xx 可稍後重跑
            GeoExportError::ApiError { status, .. } if *status == 429 || *status >= 500 => {
                ErrorSeverity::Medium
            }
            GeoExportError::ApiError { .. } => ErrorSeverity::High,
            GeoExportError::IoError(_) => ErrorSeverity::Critical,
            _ => ErrorSeverity::High,
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            GeoExportError::HttpError(_) => {
                "Could not reach the Earth Engine API".to_string()
            }
            GeoExportError::ApiError { status: 401, .. }
            | GeoExportError::ApiError { status: 403, .. } => {
                "Earth Engine rejected the credentials".to_string()
            }
            GeoExportError::ApiError { status, message } => {
                format!("Earth Engine request failed ({}): {}", status, message)
            }
            GeoExportError::MissingConfigError { field } => {
                format!("Configuration is missing '{}'", field)
            }
            GeoExportError::GeometryError { message } => {
                format!("The region of interest is not usable: {}", message)
            }
            other => other.to_string(),
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Network => "Check network connectivity and the api endpoint",
            ErrorCategory::Api => {
                "Check the access token, the cloud project and its Earth Engine quota"
            }
            ErrorCategory::Configuration => "Fix the configuration file and run again",
            ErrorCategory::Input => "Check the input file (GeoJSON or CSV) for errors",
            ErrorCategory::Processing => "Run with --verbose and inspect the logs",
            ErrorCategory::System => "Check file permissions and free disk space",
        }
    }
}

pub type Result<T> = std::result::Result<T, GeoExportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_severity() {
        let throttled = GeoExportError::ApiError {
            status: 429,
            message: "quota".to_string(),
        };
        assert_eq!(throttled.severity(), ErrorSeverity::Medium);
        assert_eq!(throttled.category(), ErrorCategory::Api);

        let denied = GeoExportError::ApiError {
            status: 403,
            message: "denied".to_string(),
        };
        assert_eq!(denied.severity(), ErrorSeverity::High);
        assert!(denied.user_friendly_message().contains("credentials"));
    }

    #[test]
    fn test_duplicate_description_is_configuration() {
        let err = GeoExportError::DuplicateDescriptionError {
            description: "Tem2000".to_string(),
        };
        assert_eq!(err.category(), ErrorCategory::Configuration);
        assert!(err.to_string().contains("Tem2000"));
    }
}
