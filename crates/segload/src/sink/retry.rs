use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::ResultsSink;
use crate::error::SinkError;
use crate::markup::MarkupDocument;
use crate::registrar::MappingDocument;
use crate::types::ImageRecord;

/// Per-call timeout and bounded exponential backoff for sink calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(default)]
pub struct RetryPolicy {
    pub timeout_ms: u64,
    /// Total attempts per call, the first one included
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            max_attempts: 4,
            initial_backoff_ms: 250,
            max_backoff_ms: 8_000,
        }
    }
}

impl RetryPolicy {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Delay before attempt `attempt + 1`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u64 << attempt.saturating_sub(1).min(16);
        Duration::from_millis(self.initial_backoff_ms.saturating_mul(factor).min(self.max_backoff_ms))
    }
}

/// Wraps a sink so that every call is bounded by the policy's timeout and
/// transient failures are retried. Permanent failures surface immediately.
#[derive(Debug)]
pub struct ResilientSink<S> {
    inner: S,
    policy: RetryPolicy,
}

impl<S: ResultsSink> ResilientSink<S> {
    pub fn new(inner: S, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

macro_rules! with_retry {
    ($self:ident, $operation:literal, $call:expr) => {{
        let limit = $self.policy.timeout();
        let mut attempt = 1;
        loop {
            let outcome = match tokio::time::timeout(limit, $call).await {
                Ok(result) => result,
                Err(_) => Err(SinkError::Timeout(limit)),
            };
            match outcome {
                Err(err) if err.is_transient() && attempt < $self.policy.max_attempts => {
                    let delay = $self.policy.backoff(attempt);
                    warn!(operation = $operation, attempt, error = %err, ?delay, "retrying sink call");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                outcome => break outcome,
            }
        }
    }};
}

impl<S: ResultsSink> ResultsSink for ResilientSink<S> {
    async fn find_image_by_case(&mut self, case_id: &str) -> Result<Option<ImageRecord>, SinkError> {
        with_retry!(self, "find_image_by_case", self.inner.find_image_by_case(case_id))
    }

    async fn mapping_exists(&mut self, case_id: &str, execution_id: &str) -> Result<bool, SinkError> {
        with_retry!(self, "mapping_exists", self.inner.mapping_exists(case_id, execution_id))
    }

    async fn submit_mapping(&mut self, mapping: &MappingDocument) -> Result<(), SinkError> {
        with_retry!(self, "submit_mapping", self.inner.submit_mapping(mapping))
    }

    async fn submit_markup(&mut self, markup: &MarkupDocument) -> Result<(), SinkError> {
        with_retry!(self, "submit_markup", self.inner.submit_markup(markup))
    }

    async fn begin_input(&mut self, input: &Path) -> Result<(), SinkError> {
        with_retry!(self, "begin_input", self.inner.begin_input(input))
    }

    async fn finish_input(&mut self) -> Result<(), SinkError> {
        with_retry!(self, "finish_input", self.inner.finish_input())
    }
}
