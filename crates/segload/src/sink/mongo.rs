use mongodb::bson::doc;
use mongodb::{Client, Collection, Database};
use tracing::debug;

use super::{ResultsSink, IMAGES_COLLECTION, METADATA_COLLECTION, OBJECTS_COLLECTION};
use crate::error::SinkError;
use crate::markup::MarkupDocument;
use crate::registrar::MappingDocument;
use crate::types::ImageRecord;

/// Direct connection to the results database.
#[derive(Debug, Clone)]
pub struct MongoSink {
    images: Collection<ImageRecord>,
    metadata: Collection<MappingDocument>,
    objects: Collection<MarkupDocument>,
}

impl MongoSink {
    pub async fn connect(uri: &str, database: &str) -> Result<Self, SinkError> {
        let client = Client::with_uri_str(uri).await?;
        debug!(database, "connected to results database");
        Ok(Self::from_database(&client.database(database)))
    }

    pub fn from_database(db: &Database) -> Self {
        Self {
            images: db.collection(IMAGES_COLLECTION),
            metadata: db.collection(METADATA_COLLECTION),
            objects: db.collection(OBJECTS_COLLECTION),
        }
    }
}

impl ResultsSink for MongoSink {
    async fn find_image_by_case(&mut self, case_id: &str) -> Result<Option<ImageRecord>, SinkError> {
        Ok(self.images.find_one(doc! { "case_id": case_id }).await?)
    }

    async fn mapping_exists(&mut self, case_id: &str, execution_id: &str) -> Result<bool, SinkError> {
        let filter = doc! {
            "image.caseid": case_id,
            "provenance.analysis_execution_id": execution_id,
        };
        let count = self.metadata.count_documents(filter).limit(1).await?;
        Ok(count > 0)
    }

    async fn submit_mapping(&mut self, mapping: &MappingDocument) -> Result<(), SinkError> {
        self.metadata.insert_one(mapping).await?;
        Ok(())
    }

    async fn submit_markup(&mut self, markup: &MarkupDocument) -> Result<(), SinkError> {
        self.objects.insert_one(markup).await?;
        Ok(())
    }
}
