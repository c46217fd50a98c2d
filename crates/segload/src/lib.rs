//! # segload
//!
//! Loads segmentation results into a results store. Supported inputs are
//! mask rasters (whole images or grid tiles), comma- and tab-separated
//! feature tables and Aperio XML annotations. Every polygon becomes one
//! markup document; every `(case, execution)` pair gets one mapping document.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use segload::{LoaderConfig, run};
//!
//! # async fn example() -> segload::Result<()> {
//! let config = LoaderConfig::from_file("load.toml")?;
//! let (_cancel_tx, cancel) = tokio::sync::watch::channel(false);
//! let summary = run(config, cancel).await?;
//! println!("{} documents from {} files", summary.documents, summary.succeeded);
//! # Ok(())
//! # }
//! ```
//!
//! ## Custom sinks
//!
//! Anything implementing [`ResultsSink`] can receive the documents; see
//! [`load_with`].

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod features;
pub mod geometry;
pub mod input;
pub mod markup;
pub mod parsers;
pub mod pipeline;
pub mod registrar;
pub mod sink;
pub mod types;

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;

pub use config::{Destination, ImageSource, InputFormat, LoaderConfig};
pub use dispatcher::{Dispatcher, RunSummary};
pub use error::{LoaderError, Result, SinkError};
pub use geometry::{bounding_box, normalize, BoundingBox, CoordinateTransform};
pub use input::InputSource;
pub use markup::{MarkupBuilder, MarkupDocument};
pub use pipeline::{FilePipeline, FileReport};
pub use registrar::{ensure_registered, MappingDocument};
pub use sink::{MemorySink, OutputSink, ResilientSink, ResultsSink};
pub use types::{ExecutionMetadata, ImageMetadata, ImageRecord, PolygonRecord};

/// Validate `config`, connect one sink per worker slot and load every input.
/// `cancel` flipping to `true` stops new files from starting.
pub async fn run(config: LoaderConfig, cancel: watch::Receiver<bool>) -> Result<RunSummary> {
    config.validate()?;
    let config = Arc::new(config);

    let workers = config.worker_count();
    info!(
        format = %config.input.format,
        source = %config.input.source.location().display(),
        workers,
        "starting load"
    );

    let sinks = OutputSink::connect_pool(&config, workers)
        .await?
        .into_iter()
        .map(|sink| ResilientSink::new(sink, config.sink))
        .collect();
    let inputs = config.input.source.paths()?;
    let pipeline = Arc::new(FilePipeline::new(config));

    Ok(load_with(pipeline, inputs, sinks, cancel).await)
}

/// Load `inputs` through `pipeline`, one slot per sink.
pub async fn load_with<S, I>(
    pipeline: Arc<FilePipeline>,
    inputs: I,
    sinks: Vec<S>,
    cancel: watch::Receiver<bool>,
) -> RunSummary
where
    S: ResultsSink + 'static,
    I: IntoIterator<Item = Result<PathBuf>>,
{
    Dispatcher::new(sinks)
        .run(inputs, cancel, move |_, path, mut sink| {
            let pipeline = Arc::clone(&pipeline);
            async move {
                let result = pipeline.process(&path, &mut sink).await;
                (sink, result)
            }
        })
        .await
}
