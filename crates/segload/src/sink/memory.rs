use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use super::ResultsSink;
use crate::error::SinkError;
use crate::markup::MarkupDocument;
use crate::registrar::MappingDocument;
use crate::types::ImageRecord;

#[derive(Debug, Default)]
struct MemoryState {
    images: HashMap<String, ImageRecord>,
    mappings: Vec<MappingDocument>,
    markups: Vec<(PathBuf, MarkupDocument)>,
    inputs: Vec<PathBuf>,
    /// Transient failures still to inject into `submit_markup`
    failures: u32,
}

/// In-process store for tests and dry runs. Clones share the same state, so
/// one handle can be given to every worker slot and inspected afterwards.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    state: Arc<Mutex<MemoryState>>,
    current: Option<PathBuf>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        // a panicking test thread must not hide the recorded documents
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn with_image(self, case_id: &str, record: ImageRecord) -> Self {
        self.state().images.insert(case_id.to_string(), record);
        self
    }

    /// Make the next `count` markup submissions fail transiently.
    pub fn fail_next_markups(&self, count: u32) {
        self.state().failures = count;
    }

    pub fn mappings(&self) -> Vec<MappingDocument> {
        self.state().mappings.clone()
    }

    pub fn markups(&self) -> Vec<MarkupDocument> {
        self.state().markups.iter().map(|(_, doc)| doc.clone()).collect()
    }

    /// Documents submitted while `input` was being processed.
    pub fn markups_for(&self, input: &Path) -> Vec<MarkupDocument> {
        self.state()
            .markups
            .iter()
            .filter(|(path, _)| path == input)
            .map(|(_, doc)| doc.clone())
            .collect()
    }

    /// Inputs in the order their processing reached the sink.
    pub fn inputs(&self) -> Vec<PathBuf> {
        self.state().inputs.clone()
    }
}

impl ResultsSink for MemorySink {
    async fn find_image_by_case(&mut self, case_id: &str) -> Result<Option<ImageRecord>, SinkError> {
        Ok(self.state().images.get(case_id).cloned())
    }

    async fn mapping_exists(&mut self, case_id: &str, execution_id: &str) -> Result<bool, SinkError> {
        Ok(self
            .state()
            .mappings
            .iter()
            .any(|m| m.key() == (case_id, execution_id)))
    }

    async fn submit_mapping(&mut self, mapping: &MappingDocument) -> Result<(), SinkError> {
        self.state().mappings.push(mapping.clone());
        Ok(())
    }

    async fn submit_markup(&mut self, markup: &MarkupDocument) -> Result<(), SinkError> {
        let input = self.current.clone().unwrap_or_default();
        let mut state = self.state();
        if state.failures > 0 {
            state.failures -= 1;
            return Err(SinkError::Transient("injected failure".into()));
        }
        state.markups.push((input, markup.clone()));
        Ok(())
    }

    async fn begin_input(&mut self, input: &Path) -> Result<(), SinkError> {
        self.state().inputs.push(input.to_path_buf());
        self.current = Some(input.to_path_buf());
        Ok(())
    }

    async fn finish_input(&mut self) -> Result<(), SinkError> {
        self.current = None;
        Ok(())
    }
}
