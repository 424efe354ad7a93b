//! 研究區域（ROI）幾何
//!
//! ROI 以 GeoJSON 提供，可為單一幾何、`Feature` 或由多邊形組成的
//! `FeatureCollection`，一律整理成單一 [`Geometry`]，明確傳給每個匯出工作。

use serde::{Deserialize, Serialize};

use crate::utils::error::{GeoExportError, Result};

/// `[lon, lat]`，可帶高度但會被忽略
pub type Position = Vec<f64>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Geometry {
    Point { coordinates: Position },
    MultiPoint { coordinates: Vec<Position> },
    LineString { coordinates: Vec<Position> },
    MultiLineString { coordinates: Vec<Vec<Position>> },
    Polygon { coordinates: Vec<Vec<Position>> },
    MultiPolygon { coordinates: Vec<Vec<Vec<Position>>> },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl BoundingBox {
    fn from_positions<'a, I>(positions: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a Position>,
    {
        let mut bbox: Option<BoundingBox> = None;
        for pos in positions {
            if pos.len() < 2 {
                continue;
            }
            let (lon, lat) = (pos[0], pos[1]);
            bbox = Some(match bbox {
                None => BoundingBox {
                    min_lon: lon,
                    min_lat: lat,
                    max_lon: lon,
                    max_lat: lat,
                },
                Some(b) => BoundingBox {
                    min_lon: b.min_lon.min(lon),
                    min_lat: b.min_lat.min(lat),
                    max_lon: b.max_lon.max(lon),
                    max_lat: b.max_lat.max(lat),
                },
            });
        }
        bbox
    }

    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        lon >= self.min_lon && lon <= self.max_lon && lat >= self.min_lat && lat <= self.max_lat
    }

    /// 逆時針的封閉矩形環
    pub fn to_polygon(&self) -> Geometry {
        Geometry::Polygon {
            coordinates: vec![vec![
                vec![self.min_lon, self.min_lat],
                vec![self.max_lon, self.min_lat],
                vec![self.max_lon, self.max_lat],
                vec![self.min_lon, self.max_lat],
                vec![self.min_lon, self.min_lat],
            ]],
        }
    }
}

impl Geometry {
    pub fn type_name(&self) -> &'static str {
        match self {
            Geometry::Point { .. } => "Point",
            Geometry::MultiPoint { .. } => "MultiPoint",
            Geometry::LineString { .. } => "LineString",
            Geometry::MultiLineString { .. } => "MultiLineString",
            Geometry::Polygon { .. } => "Polygon",
            Geometry::MultiPolygon { .. } => "MultiPolygon",
        }
    }

    fn positions(&self) -> Box<dyn Iterator<Item = &Position> + '_> {
        match self {
            Geometry::Point { coordinates } => Box::new(std::iter::once(coordinates)),
            Geometry::MultiPoint { coordinates } | Geometry::LineString { coordinates } => {
                Box::new(coordinates.iter())
            }
            Geometry::MultiLineString { coordinates } | Geometry::Polygon { coordinates } => {
                Box::new(coordinates.iter().flatten())
            }
            Geometry::MultiPolygon { coordinates } => {
                Box::new(coordinates.iter().flatten().flatten())
            }
        }
    }

    /// 經緯度外框；沒有任何座標時為 `None`
    pub fn bounds(&self) -> Option<BoundingBox> {
        BoundingBox::from_positions(self.positions())
    }

    /// 座標的 JSON 形式，作為平台幾何建構函式的參數
    pub fn coordinates_json(&self) -> serde_json::Value {
        let value = serde_json::to_value(self).unwrap_or_default();
        value
            .get("coordinates")
            .cloned()
            .unwrap_or(serde_json::Value::Null)
    }

    pub fn validate(&self) -> Result<()> {
        let mut count = 0usize;
        for pos in self.positions() {
            if pos.len() < 2 {
                return Err(GeoExportError::GeometryError {
                    message: format!("position {:?} needs at least lon and lat", pos),
                });
            }
            let (lon, lat) = (pos[0], pos[1]);
            if !lon.is_finite() || !(-180.0..=180.0).contains(&lon) {
                return Err(GeoExportError::GeometryError {
                    message: format!("longitude {} out of range", lon),
                });
            }
            if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
                return Err(GeoExportError::GeometryError {
                    message: format!("latitude {} out of range", lat),
                });
            }
            count += 1;
        }

        if count == 0 {
            return Err(GeoExportError::GeometryError {
                message: format!("{} has no coordinates", self.type_name()),
            });
        }

        if let Geometry::Polygon { coordinates } = self {
            validate_rings(coordinates)?;
        }
        if let Geometry::MultiPolygon { coordinates } = self {
            for polygon in coordinates {
                validate_rings(polygon)?;
            }
        }
        Ok(())
    }

    pub fn from_geojson_str(content: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(content)?;
        let geometry = Self::from_geojson_value(value)?;
        geometry.validate()?;
        Ok(geometry)
    }

    fn from_geojson_value(value: serde_json::Value) -> Result<Self> {
        let kind = value
            .get("type")
            .and_then(|t| t.as_str())
            .ok_or_else(|| GeoExportError::GeometryError {
                message: "GeoJSON object has no 'type'".to_string(),
            })?
            .to_string();

        match kind.as_str() {
            "Feature" => {
                let geometry = value.get("geometry").cloned().unwrap_or_default();
                if geometry.is_null() {
                    return Err(GeoExportError::GeometryError {
                        message: "Feature has a null geometry".to_string(),
                    });
                }
                Ok(serde_json::from_value(geometry)?)
            }
            "FeatureCollection" => {
                let features = value
                    .get("features")
                    .and_then(|f| f.as_array())
                    .cloned()
                    .unwrap_or_default();
                let geometries = features
                    .into_iter()
                    .map(Self::from_geojson_value)
                    .collect::<Result<Vec<_>>>()?;
                Self::merge(geometries)
            }
            _ => Ok(serde_json::from_value(value)?),
        }
    }

    /// 多個 feature 合併成單一幾何；只支援多邊形
    fn merge(mut geometries: Vec<Geometry>) -> Result<Self> {
        if geometries.len() == 1 {
            return Ok(geometries.remove(0));
        }
        if geometries.is_empty() {
            return Err(GeoExportError::GeometryError {
                message: "FeatureCollection has no features".to_string(),
            });
        }

        let mut polygons = Vec::new();
        for geometry in geometries {
            match geometry {
                Geometry::Polygon { coordinates } => polygons.push(coordinates),
                Geometry::MultiPolygon { coordinates } => polygons.extend(coordinates),
                other => {
                    return Err(GeoExportError::GeometryError {
                        message: format!(
                            "cannot merge {} into a multi-feature region",
                            other.type_name()
                        ),
                    })
                }
            }
        }
        Ok(Geometry::MultiPolygon {
            coordinates: polygons,
        })
    }
}

fn validate_rings(rings: &[Vec<Position>]) -> Result<()> {
    for ring in rings {
        if ring.len() < 4 {
            return Err(GeoExportError::GeometryError {
                message: "polygon ring needs at least 4 positions".to_string(),
            });
        }
        if ring.first() != ring.last() {
            return Err(GeoExportError::GeometryError {
                message: "polygon ring is not closed".to_string(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SQUARE: &str = r#"{
        "type": "Polygon",
        "coordinates": [[[100.0, 10.0], [101.0, 10.0], [101.0, 11.5], [100.0, 11.5], [100.0, 10.0]]]
    }"#;

    #[test]
    fn test_polygon_bounds() {
        let geometry = Geometry::from_geojson_str(SQUARE).unwrap();
        let bounds = geometry.bounds().unwrap();
        assert_eq!(bounds.min_lon, 100.0);
        assert_eq!(bounds.max_lon, 101.0);
        assert_eq!(bounds.min_lat, 10.0);
        assert_eq!(bounds.max_lat, 11.5);
        assert!(bounds.contains(100.5, 11.0));
        assert!(!bounds.contains(102.0, 11.0));
    }

    #[test]
    fn test_feature_is_unwrapped() {
        let feature = format!(r#"{{"type":"Feature","properties":{{}},"geometry":{}}}"#, SQUARE);
        let geometry = Geometry::from_geojson_str(&feature).unwrap();
        assert_eq!(geometry.type_name(), "Polygon");
    }

    #[test]
    fn test_feature_collection_merges_polygons() {
        let collection = format!(
            r#"{{"type":"FeatureCollection","features":[
                {{"type":"Feature","properties":{{}},"geometry":{}}},
                {{"type":"Feature","properties":{{}},"geometry":{{"type":"Polygon","coordinates":[[[102.0,12.0],[103.0,12.0],[103.0,13.0],[102.0,12.0]]]}}}}
            ]}}"#,
            SQUARE
        );
        let geometry = Geometry::from_geojson_str(&collection).unwrap();
        assert_eq!(geometry.type_name(), "MultiPolygon");
        let bounds = geometry.bounds().unwrap();
        assert_eq!(bounds.max_lon, 103.0);
        assert_eq!(bounds.max_lat, 13.0);
    }

    #[test]
    fn test_invalid_geometries() {
        let unclosed = r#"{"type":"Polygon","coordinates":[[[0,0],[1,0],[1,1],[0,1]]]}"#;
        assert!(Geometry::from_geojson_str(unclosed).is_err());

        let empty = r#"{"type":"MultiPolygon","coordinates":[]}"#;
        assert!(Geometry::from_geojson_str(empty).is_err());

        let out_of_range = r#"{"type":"Point","coordinates":[200.0, 0.0]}"#;
        assert!(Geometry::from_geojson_str(out_of_range).is_err());

        let null_feature = r#"{"type":"Feature","properties":{},"geometry":null}"#;
        assert!(Geometry::from_geojson_str(null_feature).is_err());
    }

    #[test]
    fn test_bounds_polygon_is_closed_rectangle() {
        let geometry = Geometry::from_geojson_str(SQUARE).unwrap();
        let rect = geometry.bounds().unwrap().to_polygon();
        assert!(rect.validate().is_ok());
        assert_eq!(rect.bounds(), geometry.bounds());
    }

    #[test]
    fn test_coordinates_json() {
        let point = Geometry::Point {
            coordinates: vec![1.0, 2.0],
        };
        assert_eq!(point.coordinates_json(), serde_json::json!([1.0, 2.0]));
    }
}
