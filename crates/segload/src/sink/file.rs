use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::ResultsSink;
use crate::error::SinkError;
use crate::markup::MarkupDocument;
use crate::registrar::MappingDocument;
use crate::types::ImageRecord;

pub(crate) const METADATA_FILE: &str = "metadata.json";

/// Run-wide state shared by every file sink: the `(case id, execution id)`
/// pairs already in `metadata.json` and the output files claimed so far.
#[derive(Debug, Clone, Default)]
pub struct OutputIndex {
    mappings: Arc<Mutex<HashSet<(String, String)>>>,
    outputs: Arc<Mutex<HashSet<PathBuf>>>,
}

impl OutputIndex {
    /// Seed the mapping keys from an existing `metadata.json`, so re-running
    /// into the same folder does not duplicate mappings.
    pub async fn load(path: &Path) -> Result<Self, SinkError> {
        let text = match tokio::fs::read_to_string(path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(e.into()),
        };

        let mut seen = HashSet::new();
        for line in text.lines().filter(|l| !l.trim().is_empty()) {
            match serde_json::from_str::<MappingDocument>(line) {
                Ok(mapping) => {
                    let (case_id, execution_id) = mapping.key();
                    seen.insert((case_id.to_string(), execution_id.to_string()));
                }
                Err(e) => warn!(path = %path.display(), error = %e, "ignoring unreadable mapping line"),
            }
        }
        debug!(mappings = seen.len(), "loaded existing mappings");
        Ok(Self { mappings: Arc::new(Mutex::new(seen)), ..Self::default() })
    }
}

/// Writes JSON lines under an output folder: one `<folder>.<input>.json` per
/// input file and a shared `metadata.json` for mappings.
#[derive(Debug)]
pub struct FileSink {
    out_folder: PathBuf,
    index: OutputIndex,
    current: Option<BufWriter<File>>,
}

impl FileSink {
    pub fn new(out_folder: impl Into<PathBuf>, index: OutputIndex) -> Self {
        Self { out_folder: out_folder.into(), index, current: None }
    }

    /// Inputs are usually grouped in one folder per image, so the folder
    /// name is kept to tell `A.svs/tile.csv` from `B.svs/tile.csv`.
    pub fn output_path(&self, input: &Path) -> PathBuf {
        let name = input.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
        match input.parent().and_then(Path::file_name) {
            Some(folder) => self.out_folder.join(format!("{}.{name}.json", folder.to_string_lossy())),
            None => self.out_folder.join(format!("{name}.json")),
        }
    }
}

async fn write_line<W, T>(out: &mut W, value: &T) -> Result<(), SinkError>
where
    W: AsyncWrite + Unpin,
    T: serde::Serialize,
{
    let mut line = serde_json::to_vec(value)?;
    line.push(b'\n');
    out.write_all(&line).await?;
    Ok(())
}

impl ResultsSink for FileSink {
    async fn find_image_by_case(&mut self, _case_id: &str) -> Result<Option<ImageRecord>, SinkError> {
        Ok(None)
    }

    async fn mapping_exists(&mut self, case_id: &str, execution_id: &str) -> Result<bool, SinkError> {
        let seen = self.index.mappings.lock().await;
        Ok(seen.contains(&(case_id.to_string(), execution_id.to_string())))
    }

    async fn submit_mapping(&mut self, mapping: &MappingDocument) -> Result<(), SinkError> {
        let (case_id, execution_id) = mapping.key();
        let key = (case_id.to_string(), execution_id.to_string());
        // held across the append so a failed write leaves the key unrecorded
        let mut seen = self.index.mappings.lock().await;
        if seen.contains(&key) {
            return Ok(());
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.out_folder.join(METADATA_FILE))
            .await?;
        write_line(&mut file, mapping).await?;
        file.flush().await?;
        seen.insert(key);
        Ok(())
    }

    async fn submit_markup(&mut self, markup: &MarkupDocument) -> Result<(), SinkError> {
        let out = self
            .current
            .as_mut()
            .ok_or_else(|| SinkError::Permanent("no output file is open".into()))?;
        write_line(out, markup).await
    }

    async fn begin_input(&mut self, input: &Path) -> Result<(), SinkError> {
        let path = self.output_path(input);
        let mut claimed = self.index.outputs.lock().await;
        if claimed.contains(&path) {
            return Err(SinkError::Permanent(format!(
                "{} was already written by another input of this run",
                path.display()
            )));
        }

        debug!(output = %path.display(), "opening output file");
        self.current = Some(BufWriter::new(File::create(&path).await?));
        claimed.insert(path);
        Ok(())
    }

    async fn finish_input(&mut self) -> Result<(), SinkError> {
        if let Some(mut out) = self.current.take() {
            out.flush().await?;
        }
        Ok(())
    }
}
