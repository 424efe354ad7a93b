//! 影像配方與對應的 Earth Engine 運算式圖
//!
//! 配方描述每個（產品, 年份）要匯出的影像。柵格運算在平台上執行；
//! 本地端只會把配方轉成 REST 運算式圖，或對單一像素的時間序列求值（供 dry run 與測試）。

use chrono::NaiveDate;
use serde_json::{json, Map, Value};

use crate::domain::geometry::{BoundingBox, Geometry};
use crate::domain::model::{DatasetRef, DateRange, Reducer, Transform};

const TIME_START_PROPERTY: &str = "system:time_start";
/// 逐張影像選波段的函式本體在 `values` 表中的鍵
const SELECT_BAND_VALUE: &str = "1";
const MAPPING_VAR: &str = "_MAPPING_VAR_0_0";

#[derive(Debug, Clone, PartialEq)]
pub struct ImageRecipe {
    pub dataset: DatasetRef,
    pub range: DateRange,
    pub reducer: Reducer,
    pub transform: Option<Transform>,
    /// 輸出前一律裁切到這個幾何的外框
    pub clip_to: Geometry,
}

impl ImageRecipe {
    pub fn clip_bounds(&self) -> Option<BoundingBox> {
        self.clip_to.bounds()
    }

    /// 篩選日期、聚合、轉換、裁切；區間內無觀測值或像素在外框之外時為 `None`
    pub fn evaluate_pixel(&self, lon: f64, lat: f64, series: &[(NaiveDate, f64)]) -> Option<f64> {
        let bounds = self.clip_bounds()?;
        if !bounds.contains(lon, lat) {
            return None;
        }

        let values: Vec<f64> = series
            .iter()
            .filter(|(date, _)| self.range.contains(*date))
            .map(|(_, value)| *value)
            .collect();

        let reduced = self.reducer.apply(&values)?;
        Some(match self.transform {
            Some(transform) => transform.apply(reduced),
            None => reduced,
        })
    }

    /// 逐張影像選波段的函式本體；[`Self::to_value_node`] 中的 `Collection.map`
    /// 透過 `values` 表的鍵引用它
    pub fn select_band_body(&self) -> Value {
        invoke(
            "Image.select",
            [
                ("input", json!({ "argumentReference": MAPPING_VAR })),
                ("bandSelectors", constant(json!([self.dataset.band]))),
            ],
        )
    }

    /// 裁切後影像的節點
    pub fn to_value_node(&self) -> Value {
        let (start, end) = self.range.as_millis();

        let collection = invoke(
            "ImageCollection.load",
            [("id", constant(json!(self.dataset.collection)))],
        );

        let date_filter = invoke(
            "Filter.dateRangeContains",
            [
                (
                    "leftValue",
                    invoke(
                        "DateRange",
                        [("start", constant(json!(start))), ("end", constant(json!(end)))],
                    ),
                ),
                ("rightField", constant(json!(TIME_START_PROPERTY))),
            ],
        );

        let filtered = invoke(
            "Collection.filter",
            [("collection", collection), ("filter", date_filter)],
        );

        // 每張影像先選波段再聚合
        let selected = invoke(
            "Collection.map",
            [
                ("collection", filtered),
                (
                    "baseAlgorithm",
                    json!({
                        "functionDefinitionValue": {
                            "argumentNames": [MAPPING_VAR],
                            "body": SELECT_BAND_VALUE,
                        }
                    }),
                ),
            ],
        );

        let mut image = invoke(self.reducer.function_name(), [("collection", selected)]);

        if let Some(Transform::Offset { value }) = self.transform {
            let (function, operand) = if value < 0.0 {
                ("Image.subtract", -value)
            } else {
                ("Image.add", value)
            };
            image = invoke(
                function,
                [
                    ("image1", image),
                    (
                        "image2",
                        invoke("Image.constant", [("value", constant(json!(operand)))]),
                    ),
                ],
            );
        }

        invoke(
            "Image.clip",
            [
                ("input", image),
                (
                    "geometry",
                    invoke("Geometry.bounds", [("geometry", geometry_node(&self.clip_to))]),
                ),
            ],
        )
    }

    /// 完整匯出運算式：裁切後影像依 `scale` 重採樣並限制在 `region`
    pub fn to_export_expression(&self, region: &Geometry, scale: f64) -> Value {
        let node = invoke(
            "Image.clipToBoundsAndScale",
            [
                ("input", self.to_value_node()),
                ("geometry", geometry_node(region)),
                ("scale", constant(json!(scale))),
            ],
        );
        json!({
            "result": "0",
            "values": {
                "0": node,
                SELECT_BAND_VALUE: self.select_band_body(),
            },
        })
    }
}

fn constant(value: Value) -> Value {
    json!({ "constantValue": value })
}

fn invoke<const N: usize>(function_name: &str, arguments: [(&str, Value); N]) -> Value {
    let arguments: Map<String, Value> = arguments
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect();
    json!({
        "functionInvocationValue": {
            "functionName": function_name,
            "arguments": arguments,
        }
    })
}

pub fn geometry_node(geometry: &Geometry) -> Value {
    invoke(
        &format!("GeometryConstructors.{}", geometry.type_name()),
        [("coordinates", constant(geometry.coordinates_json()))],
    )
}

/// 節點中所有呼叫的函式名稱（深度優先）
pub fn invoked_functions(node: &Value) -> Vec<String> {
    let mut names = Vec::new();
    collect_functions(node, &mut names);
    names
}

fn collect_functions(node: &Value, names: &mut Vec<String>) {
    match node {
        Value::Object(map) => {
            if let Some(invocation) = map.get("functionInvocationValue") {
                if let Some(name) = invocation.get("functionName").and_then(Value::as_str) {
                    names.push(name.to_string());
                }
            }
            for value in map.values() {
                collect_functions(value, names);
            }
        }
        Value::Array(items) => items.iter().for_each(|item| collect_functions(item, names)),
        _ => {}
    }
}
