use std::time::Duration;

use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Serialize;
use tracing::debug;

use super::{ResultsSink, IMAGES_COLLECTION, METADATA_COLLECTION, OBJECTS_COLLECTION};
use crate::error::SinkError;
use crate::markup::MarkupDocument;
use crate::registrar::MappingDocument;
use crate::types::ImageRecord;

/// Results store behind its REST proxy
/// (`/api/v1/database/<db>/<collection>`).
#[derive(Debug, Clone)]
pub struct HttpSink {
    http: Client,
    base_url: String,
    database: String,
    username: Option<String>,
    password: Option<String>,
}

/// Map a response status onto the sink error classes.
fn check_status(status: StatusCode, body: &str) -> Result<(), SinkError> {
    if status.is_success() {
        Ok(())
    } else if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        Err(SinkError::Transient(format!("store answered {status}: {body}")))
    } else {
        Err(SinkError::Permanent(format!("store answered {status}: {body}")))
    }
}

/// The proxy answers lookups with `null`, an empty body or `[]` when
/// nothing matches.
fn is_empty_answer(body: &str) -> bool {
    matches!(body.trim(), "" | "null" | "[]" | "{}")
}

impl HttpSink {
    pub fn new(base_url: &str, database: &str, timeout: Duration) -> Result<Self, SinkError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            database: database.to_string(),
            username: None,
            password: None,
        })
    }

    pub fn with_credentials(mut self, username: Option<String>, password: Option<String>) -> Self {
        self.username = username;
        self.password = password;
        self
    }

    pub fn collection_url(&self, collection: &str) -> String {
        format!("{}/api/v1/database/{}/{}", self.base_url, self.database, collection)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.username {
            Some(user) => request.basic_auth(user, self.password.as_ref()),
            None => request,
        }
    }

    async fn query(&self, url: String, filter: &[(&str, &str)]) -> Result<String, SinkError> {
        let response = self.authorized(self.http.get(url).query(filter)).send().await?;
        let status = response.status();
        let body = response.text().await?;
        if status == StatusCode::NOT_FOUND {
            return Ok(String::new());
        }
        check_status(status, &body)?;
        Ok(body)
    }

    async fn post<T: Serialize + Sync>(&self, collection: &str, document: &T) -> Result<(), SinkError> {
        let url = self.collection_url(collection);
        let response = self.authorized(self.http.post(url).json(document)).send().await?;
        let status = response.status();
        let body = response.text().await?;
        check_status(status, &body)
    }
}

impl ResultsSink for HttpSink {
    async fn find_image_by_case(&mut self, case_id: &str) -> Result<Option<ImageRecord>, SinkError> {
        let url = format!("{}/findOne", self.collection_url(IMAGES_COLLECTION));
        let body = self.query(url, &[("filter[where][caseid]", case_id)]).await?;
        if is_empty_answer(&body) {
            debug!(case_id, "store has no image for case");
            return Ok(None);
        }
        let record = serde_json::from_str(&body)?;
        Ok(Some(record))
    }

    async fn mapping_exists(&mut self, case_id: &str, execution_id: &str) -> Result<bool, SinkError> {
        let url = self.collection_url(METADATA_COLLECTION);
        let filter = [
            ("filter[where][image.caseid]", case_id),
            ("filter[where][provenance.analysis_execution_id]", execution_id),
        ];
        let body = self.query(url, &filter).await?;
        Ok(!is_empty_answer(&body))
    }

    async fn submit_mapping(&mut self, mapping: &MappingDocument) -> Result<(), SinkError> {
        self.post(METADATA_COLLECTION, mapping).await
    }

    async fn submit_markup(&mut self, markup: &MarkupDocument) -> Result<(), SinkError> {
        self.post(OBJECTS_COLLECTION, markup).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collection_url_layout() {
        let sink = HttpSink::new("http://localhost:3000/", "quip", Duration::from_secs(5)).unwrap();
        assert_eq!(
            sink.collection_url(METADATA_COLLECTION),
            "http://localhost:3000/api/v1/database/quip/metadata"
        );
    }

    #[test]
    fn test_status_classification() {
        assert!(check_status(StatusCode::CREATED, "").is_ok());
        assert!(check_status(StatusCode::BAD_GATEWAY, "").unwrap_err().is_transient());
        assert!(check_status(StatusCode::TOO_MANY_REQUESTS, "").unwrap_err().is_transient());
        assert!(!check_status(StatusCode::UNPROCESSABLE_ENTITY, "bad").unwrap_err().is_transient());
    }

    #[test]
    fn test_empty_answers() {
        assert!(is_empty_answer(" null\n"));
        assert!(is_empty_answer("[]"));
        assert!(!is_empty_answer(r#"[{"color":"yellow"}]"#));
    }
}
