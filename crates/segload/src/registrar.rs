//! Case/execution mapping documents and the gate that writes them once.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::SinkError;
use crate::sink::ResultsSink;
use crate::types::{ExecutionMetadata, ImageMetadata};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingImage {
    pub caseid: String,
    pub subjectid: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingProvenance {
    pub analysis_execution_id: String,
    #[serde(rename = "type")]
    pub analysis_type: String,
}

/// Associates one case with one analysis execution. Stored in the
/// `metadata` collection; the `(caseid, analysis_execution_id)` pair is the
/// dedup key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingDocument {
    pub color: String,
    pub title: String,
    pub image: MappingImage,
    pub provenance: MappingProvenance,
}

impl MappingDocument {
    pub fn new(execution: &ExecutionMetadata, image: &ImageMetadata, color: &str) -> Self {
        Self {
            color: color.to_string(),
            title: execution.title.clone(),
            image: MappingImage {
                caseid: image.case_id.clone(),
                subjectid: image.subject_id.clone(),
            },
            provenance: MappingProvenance {
                analysis_execution_id: execution.execution_id.clone(),
                analysis_type: execution.analysis_type.clone(),
            },
        }
    }

    pub fn key(&self) -> (&str, &str) {
        (&self.image.caseid, &self.provenance.analysis_execution_id)
    }
}

/// Submit the mapping for `(image.case_id, execution.execution_id)` unless
/// the sink already has one. Returns whether a document was written.
///
/// The existence check and the insert are separate calls, so two workers
/// handling the same case can both insert; consumers key on the pair and
/// tolerate the duplicate.
pub async fn ensure_registered<S: ResultsSink>(
    sink: &mut S,
    execution: &ExecutionMetadata,
    image: &ImageMetadata,
    color: &str,
) -> Result<bool, SinkError> {
    let mapping = MappingDocument::new(execution, image, color);
    let (case_id, execution_id) = mapping.key();

    if sink.mapping_exists(case_id, execution_id).await? {
        debug!(case_id, execution_id, "mapping already registered");
        return Ok(false);
    }

    sink.submit_mapping(&mapping).await?;
    info!(case_id, execution_id, "registered case/execution mapping");
    Ok(true)
}
