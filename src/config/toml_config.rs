use crate::domain::geometry::Geometry;
use crate::domain::model::{ProductConfig, YearRange};
use crate::domain::ports::Storage;
use crate::utils::error::{GeoExportError, Result};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// 監看逾時上限（分鐘），一週
pub const MAX_WATCH_TIMEOUT_MINUTES: u64 = 7 * 24 * 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    pub earth_engine: EarthEngineConfig,
    pub roi: RoiConfig,
    pub years: Option<YearsConfig>,
    pub export: Option<OutputConfig>,
    pub watch: Option<WatchConfig>,
    /// 未設定時使用內建的三個產品
    pub products: Option<Vec<ProductConfig>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EarthEngineConfig {
    pub endpoint: Option<String>,
    pub project: String,
    pub access_token: Option<String>,
    pub timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoiConfig {
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YearsConfig {
    pub start: i32,
    pub end: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    pub drive_folder: Option<String>,
    pub manifest_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    pub enabled: bool,
    pub interval_seconds: Option<u64>,
    pub timeout_minutes: Option<u64>,
}

impl ExportConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(GeoExportError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| GeoExportError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${EE_ACCESS_TOKEN})
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| GeoExportError::ProcessingError {
            message: format!("invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn endpoint(&self) -> &str {
        self.earth_engine
            .endpoint
            .as_deref()
            .unwrap_or(crate::adapters::earth_engine::DEFAULT_ENDPOINT)
    }

    /// 取得替換後的 token；未解析的 `${VAR}` 視為未設定
    pub fn access_token(&self) -> Option<&str> {
        self.earth_engine
            .access_token
            .as_deref()
            .filter(|token| !token.trim().is_empty() && !token.contains("${"))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.earth_engine.timeout_seconds.unwrap_or(30))
    }

    pub fn year_range(&self) -> Result<YearRange> {
        match &self.years {
            Some(years) => YearRange::new(years.start, years.end),
            None => Ok(YearRange::default()),
        }
    }

    pub fn products(&self) -> Vec<ProductConfig> {
        self.products.clone().unwrap_or_else(ProductConfig::defaults)
    }

    pub fn drive_folder(&self) -> Option<String> {
        self.export.as_ref().and_then(|e| e.drive_folder.clone())
    }

    pub fn manifest_path(&self) -> Option<&str> {
        self.export.as_ref().and_then(|e| e.manifest_path.as_deref())
    }

    pub fn watch_enabled(&self) -> bool {
        self.watch.as_ref().map(|w| w.enabled).unwrap_or(false)
    }

    pub fn watch_interval(&self) -> Duration {
        Duration::from_secs(
            self.watch
                .as_ref()
                .and_then(|w| w.interval_seconds)
                .unwrap_or(30),
        )
    }

    pub fn watch_timeout(&self) -> Duration {
        let minutes = self
            .watch
            .as_ref()
            .and_then(|w| w.timeout_minutes)
            .unwrap_or(120);
        Duration::from_secs(minutes.saturating_mul(60))
    }

    /// 設定檔所在目錄；設定檔內的相對路徑都以此為基準
    pub fn base_dir<P: AsRef<Path>>(config_path: P) -> PathBuf {
        match config_path.as_ref().parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    /// 相對路徑接在設定檔目錄之後，絕對路徑原樣保留
    pub fn resolve_path<P: AsRef<Path>>(config_path: P, path: &str) -> PathBuf {
        Self::base_dir(config_path).join(path)
    }

    /// 透過 storage 讀取 ROI；storage 的根目錄應為 [`Self::base_dir`]
    pub async fn load_roi<S: Storage>(&self, storage: &S) -> Result<Geometry> {
        let data = storage.read_file(&self.roi.path).await?;
        let content = String::from_utf8(data).map_err(|e| GeoExportError::GeometryError {
            message: format!("ROI file {} is not UTF-8: {}", self.roi.path, e),
        })?;
        Geometry::from_geojson_str(&content)
    }

    /// 依 `--product` 篩選產品，保留設定中的順序；空清單代表全部
    pub fn select_products(&self, wanted: &[String]) -> Result<Vec<ProductConfig>> {
        let products = self.products();
        if wanted.is_empty() {
            return Ok(products);
        }
        if let Some(unknown) = wanted
            .iter()
            .find(|name| !products.iter().any(|p| &p.name == *name))
        {
            return Err(GeoExportError::InvalidConfigValueError {
                field: "--product".to_string(),
                value: unknown.clone(),
                reason: format!(
                    "Unknown product. Available: {}",
                    products
                        .iter()
                        .map(|p| p.name.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
            });
        }
        Ok(products
            .into_iter()
            .filter(|p| wanted.contains(&p.name))
            .collect())
    }

    /// 驗證配置的合理性
    pub fn validate_config(&self) -> Result<()> {
        validation::validate_url("earth_engine.endpoint", self.endpoint())?;
        validation::validate_non_empty_string("earth_engine.project", &self.earth_engine.project)?;
        validation::validate_path("roi.path", &self.roi.path, &["geojson", "json"])?;
        if let Some(manifest) = self.manifest_path() {
            validation::validate_path("export.manifest_path", manifest, &["csv"])?;
        }

        let years = self.year_range()?;
        validation::validate_range("years.start", years.start, 1970, 2100)?;
        validation::validate_range("years.end", years.end, 1970, 2100)?;

        let products = self.products();
        if products.is_empty() {
            return Err(GeoExportError::MissingConfigError {
                field: "products".to_string(),
            });
        }
        for product in &products {
            validation::validate_non_empty_string("products.name", &product.name)?;
            validation::validate_asset_id("products.dataset.collection", &product.dataset.collection)?;
            validation::validate_non_empty_string("products.dataset.band", &product.dataset.band)?;
            validation::validate_non_empty_string(
                "products.description_prefix",
                &product.description_prefix,
            )?;
            if !(product.scale.is_finite() && product.scale > 0.0) {
                return Err(GeoExportError::InvalidConfigValueError {
                    field: "products.scale".to_string(),
                    value: product.scale.to_string(),
                    reason: "Scale must be a positive number of metres".to_string(),
                });
            }
        }
        validation::validate_unique("products.name", products.iter().map(|p| p.name.as_str()))?;
        validation::validate_unique(
            "products.description_prefix",
            products.iter().map(|p| p.description_prefix.as_str()),
        )?;

        if let Some(interval) = self.watch.as_ref().and_then(|w| w.interval_seconds) {
            validation::validate_range("watch.interval_seconds", interval, 1, 3600)?;
        }
        if let Some(timeout) = self.watch.as_ref().and_then(|w| w.timeout_minutes) {
            validation::validate_range(
                "watch.timeout_minutes",
                timeout,
                1,
                MAX_WATCH_TIMEOUT_MINUTES,
            )?;
        }

        Ok(())
    }
}

impl Validate for ExportConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::storage::LocalStorage;
    use crate::domain::model::{Reducer, Transform};
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    const BASIC: &str = r#"
[earth_engine]
project = "fire-trends"

[roi]
path = "roi.geojson"
"#;

    #[test]
    fn test_parse_basic_config_uses_defaults() {
        let config = ExportConfig::from_toml_str(BASIC).unwrap();

        assert_eq!(config.endpoint(), "https://earthengine.googleapis.com");
        assert_eq!(config.year_range().unwrap(), YearRange::new(2000, 2024).unwrap());
        assert_eq!(config.products().len(), 3);
        assert!(config.access_token().is_none());
        assert!(!config.watch_enabled());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("TEST_EE_TOKEN", "ya29.token");

        let toml_content = r#"
[earth_engine]
project = "fire-trends"
access_token = "${TEST_EE_TOKEN}"

[roi]
path = "roi.geojson"
"#;

        let config = ExportConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(config.access_token(), Some("ya29.token"));

        std::env::remove_var("TEST_EE_TOKEN");
    }

    #[test]
    fn test_unresolved_token_is_absent() {
        let toml_content = r#"
[earth_engine]
project = "fire-trends"
access_token = "${SURELY_UNSET_EE_TOKEN_VAR}"

[roi]
path = "roi.geojson"
"#;
        let config = ExportConfig::from_toml_str(toml_content).unwrap();
        assert!(config.access_token().is_none());
    }

    #[test]
    fn test_custom_products() {
        let toml_content = r#"
[earth_engine]
project = "fire-trends"

[roi]
path = "roi.geojson"

[years]
start = 2010
end = 2012

[[products]]
name = "lst"
description_prefix = "LST"
reducer = "mean"
scale = 1000.0
transform = { kind = "offset", value = -273.15 }

[products.dataset]
collection = "MODIS/061/MOD11A2"
band = "LST_Day_1km"
"#;
        let config = ExportConfig::from_toml_str(toml_content).unwrap();
        let products = config.products();
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].reducer, Reducer::Mean);
        assert_eq!(products[0].transform, Some(Transform::KELVIN_TO_CELSIUS));
        assert_eq!(config.year_range().unwrap().len(), 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let toml_content = r#"
[earth_engine]
endpoint = "invalid-url"
project = "fire-trends"

[roi]
path = "roi.geojson"
"#;
        let config = ExportConfig::from_toml_str(toml_content).unwrap();
        assert!(config.validate().is_err());

        let reversed = format!("{}\n[years]\nstart = 2024\nend = 2000\n", BASIC);
        let config = ExportConfig::from_toml_str(&reversed).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(BASIC.as_bytes()).unwrap();

        let config = ExportConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.earth_engine.project, "fire-trends");
    }

    #[test]
    fn test_watch_timeout_is_bounded() {
        let huge = format!(
            "{}\n[watch]\nenabled = true\ntimeout_minutes = {}\n",
            BASIC,
            u64::MAX
        );
        let config = ExportConfig::from_toml_str(&huge).unwrap();
        assert!(matches!(
            config.validate(),
            Err(GeoExportError::InvalidConfigValueError { ref field, .. }) if field == "watch.timeout_minutes"
        ));
        // 即使跳過驗證也不會溢位
        assert_eq!(config.watch_timeout(), Duration::from_secs(u64::MAX));

        let day = format!("{}\n[watch]\nenabled = true\ntimeout_minutes = 1440\n", BASIC);
        let config = ExportConfig::from_toml_str(&day).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.watch_timeout(), Duration::from_secs(86_400));
    }

    #[test]
    fn test_paths_resolve_against_config_dir() {
        assert_eq!(
            ExportConfig::resolve_path("conf/export-config.toml", "roi.geojson"),
            PathBuf::from("conf/roi.geojson")
        );
        assert_eq!(
            ExportConfig::resolve_path("conf/export-config.toml", "/data/roi.geojson"),
            PathBuf::from("/data/roi.geojson")
        );
        // 只有檔名時 parent 為空字串
        assert_eq!(ExportConfig::base_dir("export-config.toml"), PathBuf::from("."));
        assert_eq!(
            ExportConfig::resolve_path("export-config.toml", "out/manifest.csv"),
            PathBuf::from("./out/manifest.csv")
        );
    }

    #[tokio::test]
    async fn test_load_roi_relative_to_config() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("shapes")).unwrap();
        std::fs::write(
            dir.path().join("shapes/roi.geojson"),
            r#"{"type":"Polygon","coordinates":[[[0.0,0.0],[2.0,0.0],[2.0,1.0],[0.0,0.0]]]}"#,
        )
        .unwrap();
        let config_path = dir.path().join("export-config.toml");

        let content = BASIC.replace("roi.geojson", "shapes/roi.geojson");
        let config = ExportConfig::from_toml_str(&content).unwrap();
        let storage = LocalStorage::new(ExportConfig::base_dir(&config_path));

        let roi = config.load_roi(&storage).await.unwrap();
        let bounds = roi.bounds().unwrap();
        assert_eq!(bounds.max_lon, 2.0);
        assert_eq!(bounds.max_lat, 1.0);
    }

    #[test]
    fn test_select_products_keeps_configured_order() {
        let config = ExportConfig::from_toml_str(BASIC).unwrap();

        let all = config.select_products(&[]).unwrap();
        assert_eq!(all.len(), 3);

        let wanted = vec!["precipitation".to_string(), "burned_area".to_string()];
        let names: Vec<String> = config
            .select_products(&wanted)
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["burned_area", "precipitation"]);
    }

    #[test]
    fn test_select_unknown_product() {
        let config = ExportConfig::from_toml_str(BASIC).unwrap();
        let err = config
            .select_products(&["temperature".to_string(), "ndvi".to_string()])
            .unwrap_err();
        match err {
            GeoExportError::InvalidConfigValueError { field, value, reason } => {
                assert_eq!(field, "--product");
                assert_eq!(value, "ndvi");
                assert!(reason.contains("burned_area, temperature, precipitation"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
