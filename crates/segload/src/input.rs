//! Where input files come from.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::error::{LoaderError, Result};

/// A single file, a list file naming one input per line, or a directory
/// tree whose regular files are all inputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(tag = "kind", content = "path", rename_all = "lowercase")]
pub enum InputSource {
    File(PathBuf),
    List(PathBuf),
    Directory(PathBuf),
}

/// Lazily produced input paths, in a stable order.
pub type InputPaths = Box<dyn Iterator<Item = Result<PathBuf>> + Send>;

impl InputSource {
    pub fn is_single(&self) -> bool {
        matches!(self, Self::File(_))
    }

    pub fn location(&self) -> &Path {
        match self {
            Self::File(path) | Self::List(path) | Self::Directory(path) => path,
        }
    }

    /// Start reading paths. Only opening the list file or directory can fail
    /// here; later failures are yielded as items.
    pub fn paths(&self) -> Result<InputPaths> {
        match self {
            Self::File(path) => Ok(Box::new(std::iter::once(Ok(path.clone())))),
            Self::List(path) => {
                let reader = BufReader::new(File::open(path)?);
                Ok(Box::new(reader.lines().filter_map(|line| match line {
                    Ok(line) => {
                        let line = line.trim();
                        (!line.is_empty()).then(|| Ok(PathBuf::from(line)))
                    }
                    Err(e) => Some(Err(LoaderError::from(e))),
                })))
            }
            Self::Directory(path) => {
                if !path.is_dir() {
                    return Err(LoaderError::Configuration(format!(
                        "input directory {} does not exist",
                        path.display()
                    )));
                }
                let walker = WalkDir::new(path)
                    .follow_links(true)
                    .sort_by_file_name()
                    .into_iter()
                    .filter_map(|entry| match entry {
                        Ok(entry) if entry.file_type().is_file() => Some(Ok(entry.into_path())),
                        Ok(_) => None,
                        Err(e) => Some(Err(LoaderError::Io(e.into()))),
                    });
                Ok(Box::new(walker))
            }
        }
    }
}
