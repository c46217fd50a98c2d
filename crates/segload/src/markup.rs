//! The canonical per-polygon output document.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::geometry::bounding_box;
use crate::types::{ExecutionMetadata, FeatureMap, ImageMetadata, PointSequence, PolygonRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GeometryType {
    Polygon,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Geometry {
    #[serde(rename = "type")]
    pub kind: GeometryType,
    pub normalized: bool,
    /// `[min_x, min_y, max_x, max_y]`
    pub bounding_box: [f64; 4],
    pub points: PointSequence,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Provenance {
    pub execution_id: String,
    #[serde(rename = "type")]
    pub analysis_type: String,
    pub title: String,
    pub color: String,
    pub computation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub study_id: Option<String>,
    pub batch_id: String,
    pub tag_id: String,
    pub image: ImageMetadata,
}

/// One detected region with its features and provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkupDocument {
    /// Absent when the record had no points
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geometry: Option<Geometry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area: Option<f64>,
    /// Feature maps keyed by namespace
    pub features: BTreeMap<String, FeatureMap>,
    pub provenance: Provenance,
}

/// Builds the documents of one file. Everything except the record itself is
/// fixed for the file, so the provenance block is prepared once.
#[derive(Debug, Clone)]
pub struct MarkupBuilder {
    provenance: Provenance,
    namespace: String,
    normalized: bool,
}

impl MarkupBuilder {
    pub fn new(
        execution: &Arc<ExecutionMetadata>,
        image: ImageMetadata,
        color: impl Into<String>,
        namespace: impl Into<String>,
        normalized: bool,
    ) -> Self {
        let provenance = Provenance {
            execution_id: execution.execution_id.clone(),
            analysis_type: execution.analysis_type.clone(),
            title: execution.title.clone(),
            color: color.into(),
            computation: execution.computation.clone(),
            study_id: execution.study_id.clone(),
            batch_id: execution.batch_id.clone(),
            tag_id: execution.tag_id.clone(),
            image,
        };
        Self { provenance, namespace: namespace.into(), normalized }
    }

    /// `record` must already be in output space.
    pub fn build(&self, record: PolygonRecord) -> MarkupDocument {
        let geometry = bounding_box(&record.points).map(|bounds| Geometry {
            kind: GeometryType::Polygon,
            normalized: self.normalized,
            bounding_box: bounds.to_array(),
            points: record.points,
        });

        let features = BTreeMap::from([(self.namespace.clone(), record.features)]);

        MarkupDocument {
            geometry,
            area: record.area,
            features,
            provenance: self.provenance.clone(),
        }
    }
}
