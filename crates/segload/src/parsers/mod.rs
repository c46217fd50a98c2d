//! Format-specific decoding of result files into [`PolygonRecord`]s.
//!
//! The variant is picked once from the run configuration; per file the
//! pipeline asks it to [`identify`](FormatParser::identify) the file (case,
//! subject, tile shift) and then to [`decode`](FormatParser::decode) it.
//! Decoding is synchronous and is run on the blocking pool.

pub mod aperio;
pub mod csv;
pub mod mask;
pub mod tsv;

use std::path::Path;

use crate::config::{InputFormat, LoaderConfig};
use crate::error::{LoaderError, Result};
use crate::types::{ImageMetadata, PolygonRecord};

pub use self::aperio::AperioParser;
pub use self::csv::CsvParser;
pub use self::mask::{MaskParser, TileNameLayout};
pub use self::tsv::TsvParser;

/// What a file's name (or the run configuration) says about it.
#[derive(Debug, Clone, PartialEq)]
pub struct FileIdentity {
    pub case_id: String,
    pub subject_id: String,
    /// Image identifier written on the documents
    pub identifier: String,
    /// Offset added to every coordinate before normalization
    pub shift: (f64, f64),
}

/// Result of decoding one file.
#[derive(Debug, Default)]
pub struct Decoded {
    pub records: Vec<PolygonRecord>,
    /// Raster size, for formats that carry one
    pub raster: Option<(u32, u32)>,
}

#[derive(Debug)]
pub enum FormatParser {
    MaskFile(MaskParser),
    MaskTile(MaskParser),
    Csv(CsvParser),
    Tsv(TsvParser),
    Aperio(AperioParser),
}

impl FormatParser {
    pub fn from_config(config: &LoaderConfig) -> Self {
        let simplify = config.filter.simplify;
        match config.input.format {
            InputFormat::MaskFile => Self::MaskFile(MaskParser::single(simplify)),
            InputFormat::MaskTile => Self::MaskTile(MaskParser::tiled(
                simplify,
                config.image.tile_layout,
                config.image.tile_size,
            )),
            InputFormat::Csv => Self::Csv(CsvParser::new(Default::default(), simplify)),
            InputFormat::Tsv => Self::Tsv(TsvParser::new(config.input.tsv_layout, simplify)),
            InputFormat::Aperio => Self::Aperio(AperioParser::new(simplify)),
        }
    }

    pub fn format(&self) -> InputFormat {
        match self {
            Self::MaskFile(_) => InputFormat::MaskFile,
            Self::MaskTile(_) => InputFormat::MaskTile,
            Self::Csv(_) => InputFormat::Csv,
            Self::Tsv(_) => InputFormat::Tsv,
            Self::Aperio(_) => InputFormat::Aperio,
        }
    }

    /// Resolve case, subject and shift for a file. Formats without an
    /// identifier in the file name take the configured ones.
    pub fn identify(&self, path: &Path, config: &LoaderConfig) -> Result<FileIdentity> {
        let configured_shift = config.image.shift.map_or((0.0, 0.0), |[x, y]| (x, y));
        let (case_id, shift, identifier) = match self {
            Self::MaskTile(parser) => {
                let tile = parser.tile_identity(path)?;
                (tile.case_id, tile.shift, None)
            }
            Self::Csv(_) => (csv::case_from_parent(path)?, configured_shift, None),
            Self::Tsv(_) => {
                let (case_id, identifier) = tsv::identity_from_name(path)?;
                (case_id, configured_shift, Some(identifier))
            }
            Self::MaskFile(_) | Self::Aperio(_) => {
                let case_id = match &config.image.case_id {
                    Some(case_id) => case_id.clone(),
                    None => case_from_file_name(path)?,
                };
                (case_id, configured_shift, None)
            }
        };

        let subject_id = match &config.image.subject_id {
            Some(subject_id) => subject_id.clone(),
            None if self.format().case_from_path() => derive_subject_id(&case_id),
            None => case_id.clone(),
        };
        Ok(FileIdentity {
            identifier: identifier.unwrap_or_else(|| case_id.clone()),
            case_id,
            subject_id,
            shift,
        })
    }

    /// Decode every polygon of a file, in source pixel space.
    pub fn decode(&self, path: &Path, image: &ImageMetadata) -> Result<Decoded> {
        match self {
            Self::MaskFile(parser) | Self::MaskTile(parser) => parser.decode(path),
            Self::Csv(parser) => parser.decode(path, image),
            Self::Tsv(parser) => parser.decode(path),
            Self::Aperio(parser) => parser.decode(path),
        }
    }
}

pub(crate) fn file_name(path: &Path) -> Result<&str> {
    path.file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| LoaderError::parse(path, "file name is not valid UTF-8"))
}

/// Case id as the part of the file name before the first `.` or `_`.
pub fn case_from_file_name(path: &Path) -> Result<String> {
    let name = file_name(path)?;
    match name.split(['.', '_']).next() {
        Some(case_id) if !case_id.is_empty() => Ok(case_id.to_string()),
        _ => Err(LoaderError::parse(path, "cannot derive a case id from the file name")),
    }
}

/// Subject id for tables and tiles: the first three `-` separated tokens of
/// the case id, or the whole case id when it has fewer.
pub fn derive_subject_id(case_id: &str) -> String {
    let tokens: Vec<&str> = case_id.split('-').collect();
    if tokens.len() >= 3 {
        tokens[..3].join("-")
    } else {
        case_id.to_string()
    }
}
