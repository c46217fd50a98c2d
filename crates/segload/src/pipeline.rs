//! The per-file pipeline: identify, resolve the image, decode, filter,
//! transform, register and submit.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::{ImageSource, LoaderConfig};
use crate::error::{LoaderError, Result};
use crate::geometry::CoordinateTransform;
use crate::markup::MarkupBuilder;
use crate::parsers::{Decoded, FormatParser};
use crate::registrar::ensure_registered;
use crate::sink::ResultsSink;
use crate::types::{ExecutionMetadata, ImageMetadata};

/// Outcome of one successfully processed file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileReport {
    pub case_id: String,
    /// Polygons decoded from the file
    pub polygons: usize,
    /// Polygons outside the area filter
    pub filtered: usize,
    /// Markup documents handed to the sink
    pub submitted: usize,
    /// Markup documents the sink refused; the rest of the file still loads
    pub dropped: usize,
    /// Whether this file wrote the case/execution mapping
    pub registered: bool,
}

/// Everything that is fixed for a run. Shared by all worker slots.
#[derive(Debug)]
pub struct FilePipeline {
    config: Arc<LoaderConfig>,
    parser: FormatParser,
    execution: Arc<ExecutionMetadata>,
}

impl FilePipeline {
    pub fn new(config: Arc<LoaderConfig>) -> Self {
        let parser = FormatParser::from_config(&config);
        let execution = Arc::new(config.execution());
        Self { config, parser, execution }
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    pub fn execution(&self) -> &ExecutionMetadata {
        &self.execution
    }

    async fn resolve_image<S: ResultsSink>(&self, sink: &mut S, image: &mut ImageMetadata) -> Result<()> {
        match self.config.image.source {
            ImageSource::Explicit { width, height } => {
                image.width = Some(width);
                image.height = Some(height);
            }
            ImageSource::Sink => {
                let record = sink
                    .find_image_by_case(&image.case_id)
                    .await?
                    .ok_or_else(|| LoaderError::lookup(&image.case_id, "no image record in the store"))?;
                image.apply_record(&record);
                image.dimensions()?;
            }
            ImageSource::Raster | ImageSource::None => {}
        }
        Ok(())
    }

    /// Run one file through to the sink.
    pub async fn process<S: ResultsSink>(self: &Arc<Self>, path: &Path, sink: &mut S) -> Result<FileReport> {
        let identity = self.parser.identify(path, &self.config)?;
        let mut image = ImageMetadata::new(&identity.case_id, &identity.subject_id);
        image.identifier = identity.identifier;
        self.resolve_image(sink, &mut image).await?;

        let decoded = {
            let pipeline = Arc::clone(self);
            let path = path.to_path_buf();
            let image = image.clone();
            tokio::task::spawn_blocking(move || pipeline.parser.decode(&path, &image)).await??
        };

        if self.config.image.source == ImageSource::Raster {
            let (width, height) = decoded
                .raster
                .ok_or_else(|| LoaderError::parse(path, "input carries no raster dimensions"))?;
            image.width = Some(width as f64);
            image.height = Some(height as f64);
        }

        let (shift_x, shift_y) = identity.shift;
        let transform = if self.config.image.normalize {
            let (width, height) = image.dimensions()?;
            CoordinateTransform::normalizing(shift_x, shift_y, width, height)
        } else {
            CoordinateTransform::shift_only(shift_x, shift_y)
        };

        sink.begin_input(path).await?;
        let submitted = self.submit(sink, image, transform, decoded).await;
        let finished = sink.finish_input().await;
        let report = submitted?;
        finished?;

        info!(
            case_id = %report.case_id,
            polygons = report.polygons,
            filtered = report.filtered,
            submitted = report.submitted,
            dropped = report.dropped,
            "loaded file"
        );
        Ok(report)
    }

    async fn submit<S: ResultsSink>(
        &self,
        sink: &mut S,
        image: ImageMetadata,
        transform: CoordinateTransform,
        decoded: Decoded,
    ) -> Result<FileReport> {
        let provenance = &self.config.provenance;
        let registered = ensure_registered(sink, &self.execution, &image, &provenance.color).await?;

        let mut report = FileReport {
            case_id: image.case_id.clone(),
            polygons: decoded.records.len(),
            registered,
            ..Default::default()
        };
        let builder = MarkupBuilder::new(
            &self.execution,
            image,
            provenance.color.clone(),
            provenance.namespace.clone(),
            transform.is_normalizing(),
        );

        for mut record in decoded.records {
            let area = record.filter_area();
            if !self.config.filter.area.accepts(area) {
                debug!(area, "polygon outside area filter");
                report.filtered += 1;
                continue;
            }
            transform.apply(&mut record.points);
            match sink.submit_markup(&builder.build(record)).await {
                Ok(()) => report.submitted += 1,
                Err(e) => {
                    warn!(error = %e, "dropping markup document");
                    report.dropped += 1;
                }
            }
        }
        Ok(report)
    }
}
