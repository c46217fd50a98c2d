//! The immutable run configuration.
//!
//! Built once (from command-line flags or a TOML/JSON file), validated
//! before any input is touched, then shared read-only by every component.

use std::fs;
use std::path::{Path, PathBuf};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

use crate::error::{LoaderError, Result};
use crate::features::TsvLayout;
use crate::geometry::AreaFilter;
use crate::input::InputSource;
use crate::parsers::TileNameLayout;
use crate::sink::RetryPolicy;
use crate::types::ExecutionMetadata;

pub const DEFAULT_TILE_SIZE: f64 = 4096.0;
pub const DEFAULT_LIST_WORKERS: usize = 6;
pub const DEFAULT_NAMESPACE: &str = "http://u24.bmi.stonybrook.edu/v1";

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum InputFormat {
    /// One mask raster covering a whole image
    MaskFile,
    /// Mask tiles named with their grid position
    MaskTile,
    Csv,
    Tsv,
    /// Aperio ImageScope XML annotations
    Aperio,
}

impl InputFormat {
    /// Formats that name their case in the file path rather than taking it
    /// from the configuration.
    pub fn case_from_path(&self) -> bool {
        matches!(self, Self::MaskTile | Self::Csv | Self::Tsv)
    }

    pub fn default_computation(&self) -> &'static str {
        match self {
            Self::Aperio => "markup",
            _ => "segmentation",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct InputConfig {
    pub source: InputSource,
    pub format: InputFormat,
    /// Concurrent files; defaults to 6 for lists and directories
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workers: Option<usize>,
    #[serde(default)]
    pub tsv_layout: TsvLayout,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Destination {
    /// JSON lines under a local folder
    File { out_folder: PathBuf },
    Mongo { uri: String, database: String },
    /// The store's REST proxy
    Http {
        base_url: String,
        database: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        username: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        password: Option<String>,
    },
}

/// Where image width and height come from.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum ImageSource {
    /// Dimensions unknown; only valid without normalization
    #[default]
    None,
    Explicit { width: f64, height: f64 },
    /// Looked up in the store by case id
    Sink,
    /// Measured from the mask raster after decoding
    Raster,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ImageConfig {
    pub case_id: Option<String>,
    pub subject_id: Option<String>,
    pub source: ImageSource,
    pub normalize: bool,
    /// Added to every coordinate, `[x, y]`
    pub shift: Option<[f64; 2]>,
    pub tile_size: f64,
    pub tile_layout: TileNameLayout,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            case_id: None,
            subject_id: None,
            source: ImageSource::None,
            normalize: false,
            shift: None,
            tile_size: DEFAULT_TILE_SIZE,
            tile_layout: TileNameLayout::default(),
        }
    }
}

fn default_analysis_type() -> String {
    "computer".to_string()
}

fn default_color() -> String {
    "yellow".to_string()
}

fn default_batch() -> String {
    "b0".to_string()
}

fn default_tag() -> String {
    "t0".to_string()
}

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ProvenanceConfig {
    pub execution_id: String,
    #[serde(default = "default_analysis_type")]
    pub analysis_type: String,
    /// Defaults to `Algorithm: <execution id>`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default = "default_color")]
    pub color: String,
    /// Defaults to `markup` for Aperio input, `segmentation` otherwise
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub computation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub study_id: Option<String>,
    #[serde(default = "default_batch")]
    pub batch_id: String,
    #[serde(default = "default_tag")]
    pub tag_id: String,
    #[serde(default = "default_namespace")]
    pub namespace: String,
}

impl ProvenanceConfig {
    pub fn new(execution_id: impl Into<String>) -> Self {
        Self {
            execution_id: execution_id.into(),
            analysis_type: default_analysis_type(),
            title: None,
            color: default_color(),
            computation: None,
            study_id: None,
            batch_id: default_batch(),
            tag_id: default_tag(),
            namespace: default_namespace(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct FilterConfig {
    /// Douglas-Peucker tolerance in pixels
    pub simplify: Option<f64>,
    pub area: AreaFilter,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct LoaderConfig {
    pub input: InputConfig,
    pub destination: Destination,
    pub provenance: ProvenanceConfig,
    #[serde(default)]
    pub image: ImageConfig,
    #[serde(default)]
    pub filter: FilterConfig,
    #[serde(default)]
    pub sink: RetryPolicy,
}

impl LoaderConfig {
    pub fn new(input: InputConfig, destination: Destination, execution_id: impl Into<String>) -> Self {
        Self {
            input,
            destination,
            provenance: ProvenanceConfig::new(execution_id),
            image: ImageConfig::default(),
            filter: FilterConfig::default(),
            sink: RetryPolicy::default(),
        }
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Load a `.toml` or `.json` file, chosen by extension.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Self::from_toml(&content),
            Some("json") => Self::from_json(&content),
            _ => Err(LoaderError::Configuration(format!(
                "unsupported config format {}; use .toml or .json",
                path.display()
            ))),
        }
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Worker slots for this run: one for a single file, otherwise the
    /// configured count or 6.
    pub fn worker_count(&self) -> usize {
        if self.input.source.is_single() {
            1
        } else {
            self.input.workers.unwrap_or(DEFAULT_LIST_WORKERS)
        }
    }

    pub fn execution(&self) -> ExecutionMetadata {
        let p = &self.provenance;
        ExecutionMetadata {
            execution_id: p.execution_id.clone(),
            title: p
                .title
                .clone()
                .unwrap_or_else(|| format!("Algorithm: {}", p.execution_id)),
            analysis_type: p.analysis_type.clone(),
            computation: p
                .computation
                .clone()
                .unwrap_or_else(|| self.input.format.default_computation().to_string()),
            study_id: p.study_id.clone(),
            batch_id: p.batch_id.clone(),
            tag_id: p.tag_id.clone(),
        }
    }

    /// Reject contradictory or incomplete settings before any input is read.
    pub fn validate(&self) -> Result<()> {
        let fail = |reason: &str| Err(LoaderError::Configuration(reason.to_string()));

        if self.provenance.execution_id.trim().is_empty() {
            return fail("an execution id is required");
        }
        if self.input.workers == Some(0) {
            return fail("worker count must be at least 1");
        }
        if self.image.case_id.is_some() && !self.input.source.is_single() && !self.input.format.case_from_path() {
            return fail("a fixed case id only applies to a single input file");
        }

        match &self.destination {
            Destination::File { out_folder } if out_folder.as_os_str().is_empty() => {
                return fail("file destination needs an output folder");
            }
            Destination::Mongo { uri, database } if uri.is_empty() || database.is_empty() => {
                return fail("database destination needs a connection URI and database name");
            }
            Destination::Http { base_url, database, .. } if base_url.is_empty() || database.is_empty() => {
                return fail("HTTP destination needs a base URL and database name");
            }
            _ => {}
        }

        match self.image.source {
            ImageSource::Sink if matches!(self.destination, Destination::File { .. }) => {
                return fail("image lookups need a database destination");
            }
            ImageSource::Explicit { width, height } if width <= 0.0 || height <= 0.0 => {
                return fail("image width and height must be positive");
            }
            ImageSource::Raster if !matches!(self.input.format, InputFormat::MaskFile | InputFormat::MaskTile) => {
                return fail("raster dimensions are only available for mask input");
            }
            ImageSource::None if self.image.normalize => {
                return fail("normalization needs image dimensions (explicit, sink lookup or raster)");
            }
            _ => {}
        }

        if self.image.tile_size <= 0.0 {
            return fail("tile size must be positive");
        }
        if self.filter.simplify.is_some_and(|t| !(t > 0.0)) {
            return fail("simplification tolerance must be positive");
        }
        if self.filter.area.min > self.filter.area.max {
            return fail("area filter minimum exceeds its maximum");
        }
        if self.sink.max_attempts == 0 {
            return fail("sink retry policy needs at least one attempt");
        }
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn for_test(format: InputFormat) -> Self {
        Self::new(
            InputConfig {
                source: InputSource::File(PathBuf::from("input")),
                format,
                workers: None,
                tsv_layout: TsvLayout::default(),
            },
            Destination::File { out_folder: PathBuf::from("out") },
            "exec",
        )
    }
}
