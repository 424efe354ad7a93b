use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::utils::error::{GeoExportError, Result};

pub const DEFAULT_START_YEAR: i32 = 2000;
pub const DEFAULT_END_YEAR: i32 = 2024;

/// 遠端影像集合名稱及要取用的單一波段
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetRef {
    pub collection: String,
    pub band: String,
}

impl DatasetRef {
    pub fn new(collection: impl Into<String>, band: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            band: band.into(),
        }
    }
}

/// 半開區間 `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// `[當年 1/1, 次年 1/1)`
    pub fn for_year(year: i32) -> Result<Self> {
        let start = NaiveDate::from_ymd_opt(year, 1, 1).ok_or_else(|| {
            GeoExportError::InvalidConfigValueError {
                field: "year".to_string(),
                value: year.to_string(),
                reason: "Year is outside the supported calendar range".to_string(),
            }
        })?;
        let end = NaiveDate::from_ymd_opt(year + 1, 1, 1).ok_or_else(|| {
            GeoExportError::InvalidConfigValueError {
                field: "year".to_string(),
                value: year.to_string(),
                reason: "Year is outside the supported calendar range".to_string(),
            }
        })?;
        Ok(Self { start, end })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date < self.end
    }

    pub fn year(&self) -> i32 {
        self.start.year()
    }

    /// 兩端的 epoch 毫秒，平台日期函式使用的單位
    pub fn as_millis(&self) -> (i64, i64) {
        (date_millis(self.start), date_millis(self.end))
    }
}

fn date_millis(date: NaiveDate) -> i64 {
    date.and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc().timestamp_millis())
        .unwrap_or_default()
}

/// 要匯出的年份（含頭尾）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearRange {
    pub start: i32,
    pub end: i32,
}

impl YearRange {
    pub fn new(start: i32, end: i32) -> Result<Self> {
        if start > end {
            return Err(GeoExportError::InvalidConfigValueError {
                field: "years".to_string(),
                value: format!("{}..={}", start, end),
                reason: "Start year must not be after end year".to_string(),
            });
        }
        Ok(Self { start, end })
    }

    pub fn iter(&self) -> impl Iterator<Item = i32> {
        self.start..=self.end
    }

    pub fn len(&self) -> usize {
        (self.end - self.start + 1).max(0) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for YearRange {
    fn default() -> Self {
        Self {
            start: DEFAULT_START_YEAR,
            end: DEFAULT_END_YEAR,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reducer {
    Mean,
    Sum,
}

impl Reducer {
    /// 對單一像素時間序列做本地聚合；空序列回傳 `None`（平台上為遮罩像素）
    pub fn apply(&self, values: &[f64]) -> Option<f64> {
        if values.is_empty() {
            return None;
        }
        let total: f64 = values.iter().sum();
        match self {
            Reducer::Sum => Some(total),
            Reducer::Mean => Some(total / values.len() as f64),
        }
    }

    pub fn function_name(&self) -> &'static str {
        match self {
            Reducer::Mean => "reduce.mean",
            Reducer::Sum => "reduce.sum",
        }
    }
}

/// 聚合後的像素轉換
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Transform {
    Offset { value: f64 },
}

impl Transform {
    pub const KELVIN_TO_CELSIUS: Transform = Transform::Offset { value: -273.15 };

    pub fn apply(&self, value: f64) -> f64 {
        match self {
            Transform::Offset { value: offset } => value + offset,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FileFormat {
    #[default]
    #[serde(rename = "GEO_TIFF")]
    GeoTiff,
}

impl FileFormat {
    pub fn as_api_str(&self) -> &'static str {
        match self {
            FileFormat::GeoTiff => "GEO_TIFF",
        }
    }
}

/// 一個匯出產品：聚合什麼、輸出如何命名
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductConfig {
    pub name: String,
    pub dataset: DatasetRef,
    pub reducer: Reducer,
    #[serde(default)]
    pub transform: Option<Transform>,
    pub description_prefix: String,
    /// 輸出解析度（公尺）
    pub scale: f64,
}

impl ProductConfig {
    pub fn burned_area() -> Self {
        // 平均 BurnDate（年內第幾天）不等於燒毀面積，刻意保留 mean
        Self {
            name: "burned_area".to_string(),
            dataset: DatasetRef::new("MODIS/061/MCD64A1", "BurnDate"),
            reducer: Reducer::Mean,
            transform: None,
            description_prefix: "BurnedArea_".to_string(),
            scale: 500.0,
        }
    }

    pub fn temperature() -> Self {
        Self {
            name: "temperature".to_string(),
            dataset: DatasetRef::new("ECMWF/ERA5_LAND/HOURLY", "temperature_2m"),
            reducer: Reducer::Mean,
            transform: Some(Transform::KELVIN_TO_CELSIUS),
            description_prefix: "Tem".to_string(),
            scale: 5000.0,
        }
    }

    pub fn precipitation() -> Self {
        Self {
            name: "precipitation".to_string(),
            dataset: DatasetRef::new("UCSB-CHG/CHIRPS/PENTAD", "precipitation"),
            reducer: Reducer::Sum,
            transform: None,
            description_prefix: "Pre".to_string(),
            scale: 5000.0,
        }
    }

    /// 燒毀面積、溫度、降水，依提交順序
    pub fn defaults() -> Vec<Self> {
        vec![Self::burned_area(), Self::temperature(), Self::precipitation()]
    }

    pub fn description_for(&self, year: i32) -> String {
        format!("{}{}", self.description_prefix, year)
    }
}
