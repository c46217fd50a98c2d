use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{LoaderError, Result};

/// An (x, y) coordinate pair
pub type Point = [f64; 2];

/// Ordered outline of one polygon; never reordered once parsed
pub type PointSequence = Vec<Point>;

/// Scalar features keyed by feature name
pub type FeatureMap = BTreeMap<String, f64>;

/// One polygon as produced by a format parser, in source pixel space.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PolygonRecord {
    pub points: PointSequence,
    pub features: FeatureMap,
    /// Area surfaced on the output document in addition to the feature map
    pub area: Option<f64>,
}

impl PolygonRecord {
    pub fn new(points: PointSequence) -> Self {
        Self { points, ..Default::default() }
    }

    /// Area used by the size filter: the reported area when the format
    /// carries one, otherwise the enclosed area of the outline.
    pub fn filter_area(&self) -> f64 {
        self.area
            .unwrap_or_else(|| crate::geometry::polygon_area(&self.points))
    }
}

/// Image the polygons belong to, resolved once per file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageMetadata {
    pub case_id: String,
    pub subject_id: String,
    /// Image identifier; usually the case id
    pub identifier: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mpp_x: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mpp_y: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub objective: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancer_type: Option<String>,
}

impl ImageMetadata {
    pub fn new(case_id: impl Into<String>, subject_id: impl Into<String>) -> Self {
        let case_id = case_id.into();
        Self {
            identifier: case_id.clone(),
            case_id,
            subject_id: subject_id.into(),
            ..Default::default()
        }
    }

    pub fn with_dimensions(mut self, width: f64, height: f64) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    /// Width and height, provided both are known and positive.
    pub fn dimensions(&self) -> Result<(f64, f64)> {
        match (self.width, self.height) {
            (Some(w), Some(h)) if w > 0.0 && h > 0.0 => Ok((w, h)),
            (Some(w), Some(h)) => Err(LoaderError::lookup(
                &self.case_id,
                format!("image dimensions are wrong: ({w}x{h})"),
            )),
            _ => Err(LoaderError::lookup(&self.case_id, "image dimensions are unknown")),
        }
    }

    /// Merge what the store knows about this image.
    pub fn apply_record(&mut self, record: &ImageRecord) {
        self.width = Some(record.width);
        self.height = Some(record.height);
        self.mpp_x = record.mpp_x;
        self.mpp_y = record.mpp_y;
        self.objective = record.objective;
        self.cancer_type = record.cancer_type.clone();
        if let Some(subject) = &record.subject_id {
            self.subject_id = subject.clone();
        }
    }
}

/// Image document as stored in the results store's `images` collection.
/// Numeric fields are accepted either as numbers or numeric strings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageRecord {
    #[serde(deserialize_with = "lenient_f64")]
    pub width: f64,
    #[serde(deserialize_with = "lenient_f64")]
    pub height: f64,
    #[serde(default, deserialize_with = "lenient_opt_f64", skip_serializing_if = "Option::is_none")]
    pub mpp_x: Option<f64>,
    #[serde(default, deserialize_with = "lenient_opt_f64", skip_serializing_if = "Option::is_none")]
    pub mpp_y: Option<f64>,
    #[serde(default, deserialize_with = "lenient_opt_f64", skip_serializing_if = "Option::is_none")]
    pub objective: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancer_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrText {
    Number(f64),
    Text(String),
}

impl NumberOrText {
    fn value(self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(n),
            Self::Text(s) => s.trim().parse().ok(),
        }
    }
}

fn lenient_f64<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<f64, D::Error> {
    NumberOrText::deserialize(deserializer)?
        .value()
        .ok_or_else(|| serde::de::Error::custom("expected a number"))
}

fn lenient_opt_f64<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<f64>, D::Error> {
    Ok(Option::<NumberOrText>::deserialize(deserializer)?.and_then(NumberOrText::value))
}

/// Provenance of the analysis run; created once and shared read-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionMetadata {
    pub execution_id: String,
    pub title: String,
    pub analysis_type: String,
    pub computation: String,
    pub study_id: Option<String>,
    pub batch_id: String,
    pub tag_id: String,
}
