//! Destinations for mapping and markup documents.
//!
//! Every worker slot owns one sink; nothing here is shared between slots
//! except the [`OutputIndex`] of the file sinks, which stands in for the store's
//! `metadata` collection.

mod file;
mod http;
mod memory;
mod mongo;
mod retry;

use std::future::Future;
use std::path::Path;

use crate::config::{Destination, LoaderConfig};
use crate::error::SinkError;
use crate::markup::MarkupDocument;
use crate::registrar::MappingDocument;
use crate::types::ImageRecord;

pub use self::file::{FileSink, OutputIndex};
pub use self::http::HttpSink;
pub use self::memory::MemorySink;
pub use self::mongo::MongoSink;
pub use self::retry::{ResilientSink, RetryPolicy};

pub const IMAGES_COLLECTION: &str = "images";
pub const METADATA_COLLECTION: &str = "metadata";
pub const OBJECTS_COLLECTION: &str = "objects";

/// Read and write access to a results store.
pub trait ResultsSink: Send {
    /// Image record for a case id, if the store knows the case.
    fn find_image_by_case(
        &mut self,
        case_id: &str,
    ) -> impl Future<Output = Result<Option<ImageRecord>, SinkError>> + Send;

    fn mapping_exists(
        &mut self,
        case_id: &str,
        execution_id: &str,
    ) -> impl Future<Output = Result<bool, SinkError>> + Send;

    fn submit_mapping(
        &mut self,
        mapping: &MappingDocument,
    ) -> impl Future<Output = Result<(), SinkError>> + Send;

    fn submit_markup(
        &mut self,
        markup: &MarkupDocument,
    ) -> impl Future<Output = Result<(), SinkError>> + Send;

    /// Called before the first document of an input file.
    fn begin_input(&mut self, _input: &Path) -> impl Future<Output = Result<(), SinkError>> + Send {
        async { Ok(()) }
    }

    /// Called once the file's documents have all been submitted.
    fn finish_input(&mut self) -> impl Future<Output = Result<(), SinkError>> + Send {
        async { Ok(()) }
    }
}

/// The configured destination.
#[derive(Debug)]
pub enum OutputSink {
    File(FileSink),
    Http(HttpSink),
    Mongo(MongoSink),
    Memory(MemorySink),
}

impl OutputSink {
    /// One independent sink per worker slot.
    pub async fn connect_pool(config: &LoaderConfig, slots: usize) -> Result<Vec<Self>, SinkError> {
        let timeout = config.sink.timeout();
        let mut sinks = Vec::with_capacity(slots);
        match &config.destination {
            Destination::File { out_folder } => {
                tokio::fs::create_dir_all(out_folder).await?;
                let index = OutputIndex::load(&out_folder.join(file::METADATA_FILE)).await?;
                for _ in 0..slots {
                    sinks.push(Self::File(FileSink::new(out_folder, index.clone())));
                }
            }
            Destination::Http { base_url, database, username, password } => {
                for _ in 0..slots {
                    let sink = HttpSink::new(base_url, database, timeout)?
                        .with_credentials(username.clone(), password.clone());
                    sinks.push(Self::Http(sink));
                }
            }
            Destination::Mongo { uri, database } => {
                for _ in 0..slots {
                    sinks.push(Self::Mongo(MongoSink::connect(uri, database).await?));
                }
            }
        }
        Ok(sinks)
    }
}

impl ResultsSink for OutputSink {
    async fn find_image_by_case(&mut self, case_id: &str) -> Result<Option<ImageRecord>, SinkError> {
        match self {
            Self::File(sink) => sink.find_image_by_case(case_id).await,
            Self::Http(sink) => sink.find_image_by_case(case_id).await,
            Self::Mongo(sink) => sink.find_image_by_case(case_id).await,
            Self::Memory(sink) => sink.find_image_by_case(case_id).await,
        }
    }

    async fn mapping_exists(&mut self, case_id: &str, execution_id: &str) -> Result<bool, SinkError> {
        match self {
            Self::File(sink) => sink.mapping_exists(case_id, execution_id).await,
            Self::Http(sink) => sink.mapping_exists(case_id, execution_id).await,
            Self::Mongo(sink) => sink.mapping_exists(case_id, execution_id).await,
            Self::Memory(sink) => sink.mapping_exists(case_id, execution_id).await,
        }
    }

    async fn submit_mapping(&mut self, mapping: &MappingDocument) -> Result<(), SinkError> {
        match self {
            Self::File(sink) => sink.submit_mapping(mapping).await,
            Self::Http(sink) => sink.submit_mapping(mapping).await,
            Self::Mongo(sink) => sink.submit_mapping(mapping).await,
            Self::Memory(sink) => sink.submit_mapping(mapping).await,
        }
    }

    async fn submit_markup(&mut self, markup: &MarkupDocument) -> Result<(), SinkError> {
        match self {
            Self::File(sink) => sink.submit_markup(markup).await,
            Self::Http(sink) => sink.submit_markup(markup).await,
            Self::Mongo(sink) => sink.submit_markup(markup).await,
            Self::Memory(sink) => sink.submit_markup(markup).await,
        }
    }

    async fn begin_input(&mut self, input: &Path) -> Result<(), SinkError> {
        match self {
            Self::File(sink) => sink.begin_input(input).await,
            Self::Memory(sink) => sink.begin_input(input).await,
            Self::Http(_) | Self::Mongo(_) => Ok(()),
        }
    }

    async fn finish_input(&mut self) -> Result<(), SinkError> {
        match self {
            Self::File(sink) => sink.finish_input().await,
            Self::Memory(sink) => sink.finish_input().await,
            Self::Http(_) | Self::Mongo(_) => Ok(()),
        }
    }
}
