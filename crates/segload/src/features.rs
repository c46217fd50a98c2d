//! Scalar feature extraction and the column contracts of the table formats.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::FeatureMap;

/// Parse a raw field as a finite number.
pub fn parse_number(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Inserts parsed values into a feature map. A value that does not parse is
/// omitted on its own; the rest of the record is unaffected.
#[derive(Debug, Default)]
pub struct FeatureMapper {
    features: FeatureMap,
}

impl FeatureMapper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the parsed value when it was inserted.
    pub fn insert_raw(&mut self, name: &str, raw: &str) -> Option<f64> {
        match parse_number(raw) {
            Some(value) => {
                self.features.insert(name.to_string(), value);
                Some(value)
            }
            None => {
                debug!(feature = name, raw, "skipping non-numeric feature value");
                None
            }
        }
    }

    /// Like [`insert_raw`](Self::insert_raw), scaling the value first.
    pub fn insert_scaled(&mut self, name: &str, raw: &str, factor: f64) -> Option<f64> {
        let value = parse_number(raw)? * factor;
        self.features.insert(name.to_string(), value);
        Some(value)
    }

    pub fn insert(&mut self, name: &str, value: f64) {
        if value.is_finite() {
            self.features.insert(name.to_string(), value);
        }
    }

    pub fn finish(self) -> FeatureMap {
        self.features
    }
}

/// Column contract of the comma-separated feature tables written by the
/// upstream ITK feature extractor. Indices are zero based.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CsvLayout {
    pub version: u32,
    /// Named shape features, in column order
    pub features: &'static [(usize, &'static str)],
    /// Column reported in physical units after multiplying by `mpp_x * mpp_y`
    pub physical_size: (usize, &'static str),
    /// Column surfaced as the document's area
    pub area: usize,
    /// First column of the interleaved `x,y,x,y,...` boundary
    pub points_start: usize,
}

impl CsvLayout {
    /// Columns 0-3 hold the bounding box corners, 18-20 the polygon number
    /// and centroid.
    pub const V1: CsvLayout = CsvLayout {
        version: 1,
        features: &[
            (4, "NumberOfPixels"),
            (6, "NumberOfPixelsOnBorder"),
            (7, "FeretDiameter"),
            (8, "PrincipalMoments0"),
            (9, "PrincipalMoments1"),
            (10, "Elongation"),
            (11, "Perimeter"),
            (12, "Roundness"),
            (13, "EquivalentSphericalRadius"),
            (14, "EquivalentSphericalPerimeter"),
            (15, "EquivalentEllipsoidDiameter0"),
            (16, "EquivalentEllipsoidDiameter1"),
            (17, "Flatness"),
        ],
        physical_size: (5, "PhysicalSize"),
        area: 21,
        points_start: 22,
    };

    /// Map one row's feature columns. Returns the features and the area.
    pub fn map_features(&self, fields: &[&str], mpp: Option<(f64, f64)>) -> (FeatureMap, Option<f64>) {
        let mut mapper = FeatureMapper::new();
        for &(column, name) in self.features {
            if let Some(raw) = fields.get(column) {
                mapper.insert_raw(name, raw);
            }
        }

        let (column, name) = self.physical_size;
        if let (Some(raw), Some((mpp_x, mpp_y))) = (fields.get(column), mpp) {
            mapper.insert_scaled(name, raw, mpp_x * mpp_y);
        }

        let area = fields.get(self.area).and_then(|raw| mapper.insert_raw("Area", raw));
        (mapper.finish(), area)
    }
}

impl Default for CsvLayout {
    fn default() -> Self {
        Self::V1
    }
}

/// Column contract of the tab-separated tables: a header row names the
/// columns, the leading identifier columns are skipped, the last column holds
/// the `x,y;x,y;...` boundary and everything between is a feature.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct TsvLayout {
    pub first_feature_column: usize,
}

impl Default for TsvLayout {
    fn default() -> Self {
        Self { first_feature_column: 2 }
    }
}

impl TsvLayout {
    /// Returns the features and the value of any column named `area`.
    pub fn map_features(&self, headers: &[&str], values: &[&str]) -> (FeatureMap, Option<f64>) {
        let mut mapper = FeatureMapper::new();
        let mut area = None;
        let last = headers.len().saturating_sub(1);

        for column in self.first_feature_column..last {
            let (Some(name), Some(raw)) = (headers.get(column), values.get(column)) else {
                continue;
            };
            if let Some(value) = mapper.insert_raw(name, raw) {
                if name.eq_ignore_ascii_case("area") {
                    area = Some(value);
                }
            }
        }
        (mapper.finish(), area)
    }
}

/// Shape descriptors computed for vectorized mask polygons.
pub fn mask_features(polygon: &mask::MaskPolygon) -> FeatureMap {
    let mut mapper = FeatureMapper::new();
    mapper.insert("Area", polygon.area());
    mapper.insert("Perimeter", polygon.perimeter());
    mapper.finish()
}
