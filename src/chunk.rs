//! Splitting a dataset into JSON chunks and keeping them on disk.
//!
//! A chunk file is named after the dataset, its 1-based position and the total
//! number of chunks (`iris_001_of_020.json`). Files are written once per
//! `(name, index, total)` and never rewritten while the full set exists.

use crate::dataset::Dataset;
use crate::error::{Error, Result};
use log::{debug, info};
use std::fs;
use std::io::{ErrorKind, Write};
use std::ops::Range;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Name used for chunk files when the caller has no better one.
pub const DEFAULT_DATASET_NAME: &str = "chunk";

/// File name of chunk `index` (0-based) out of `total`.
///
/// ```
/// use predictables::chunk::chunk_filename;
///
/// assert_eq!(chunk_filename("iris", 0, 20), "iris_001_of_020.json");
/// assert_eq!(chunk_filename("iris", 19, 20), "iris_020_of_020.json");
/// ```
pub fn chunk_filename(dataset_name: &str, index: usize, total: usize) -> String {
    format!("{dataset_name}_{:03}_of_{total:03}.json", index + 1)
}

/// Reject names that are empty or would escape the chunk directory.
pub fn validate_dataset_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::invalid("dataset name is empty"));
    }
    if name.contains(['/', '\\']) || name.contains("..") {
        return Err(Error::invalid(format!(
            "dataset name `{name}` must not contain path separators"
        )));
    }
    Ok(())
}

/// The chunk count actually used for `row_count` rows: never more chunks than rows.
pub fn effective_chunk_count(row_count: usize, requested: usize) -> Result<usize> {
    if requested == 0 {
        return Err(Error::invalid("chunk count must be at least 1"));
    }
    if row_count == 0 {
        return Err(Error::invalid("dataset has no rows to chunk"));
    }
    Ok(requested.min(row_count))
}

/// Row ranges of each chunk.
///
/// Rows are cut every `row_count / chunk_count` rows; whatever is left over
/// after the first `chunk_count - 1` cuts belongs to the last chunk, so there
/// are exactly `min(chunk_count, row_count)` non-empty ranges covering every
/// row once, in order.
pub fn partition(row_count: usize, chunk_count: usize) -> Result<Vec<Range<usize>>> {
    let total = effective_chunk_count(row_count, chunk_count)?;
    let base = row_count / total;

    Ok((0..total)
        .map(|i| {
            let start = i * base;
            let end = if i + 1 == total { row_count } else { start + base };
            start..end
        })
        .collect())
}

/// Partition and serialize without touching the filesystem.
pub fn serialize_chunks(dataset: &Dataset, chunk_count: usize) -> Result<Vec<String>> {
    partition(dataset.len(), chunk_count)?
        .into_iter()
        .map(|range| dataset.records(range).to_json_string())
        .collect()
}

/// Result of [`ChunkStore::write_chunks`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    /// Chunks were computed; they are in index order.
    Written { chunks: Vec<String> },
    /// Every chunk file already existed, nothing was computed or written.
    Skipped { files: Vec<PathBuf> },
}

impl WriteOutcome {
    pub fn is_skipped(&self) -> bool {
        matches!(self, WriteOutcome::Skipped { .. })
    }

    pub fn chunk_count(&self) -> usize {
        match self {
            WriteOutcome::Written { chunks } => chunks.len(),
            WriteOutcome::Skipped { files } => files.len(),
        }
    }
}

/// Chunk files under one base directory.
#[derive(Debug, Clone)]
pub struct ChunkStore {
    root: PathBuf,
}

impl ChunkStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        ChunkStore { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn chunk_path(&self, dataset_name: &str, index: usize, total: usize) -> PathBuf {
        self.root.join(chunk_filename(dataset_name, index, total))
    }

    pub fn chunk_paths(&self, dataset_name: &str, total: usize) -> Vec<PathBuf> {
        (0..total)
            .map(|i| self.chunk_path(dataset_name, i, total))
            .collect()
    }

    /// True when every chunk file of the set exists.
    pub fn all_present(&self, dataset_name: &str, total: usize) -> bool {
        self.chunk_paths(dataset_name, total)
            .iter()
            .all(|path| path.is_file())
    }

    /// Split `dataset` into `chunk_count` JSON chunks and, if `persist`, store them.
    ///
    /// The count is clamped to the number of rows. If the complete set of chunk
    /// files for that count already exists the call does nothing and reports
    /// [`WriteOutcome::Skipped`]; file contents are not checked.
    pub fn write_chunks(
        &self,
        dataset: &Dataset,
        chunk_count: usize,
        dataset_name: &str,
        persist: bool,
    ) -> Result<WriteOutcome> {
        validate_dataset_name(dataset_name)?;
        let total = effective_chunk_count(dataset.len(), chunk_count)?;

        if self.all_present(dataset_name, total) {
            info!(
                "JSON chunks for dataset `{}` already exist in {}, skipping",
                dataset_name,
                self.root.display()
            );
            return Ok(WriteOutcome::Skipped {
                files: self.chunk_paths(dataset_name, total),
            });
        }

        let chunks = serialize_chunks(dataset, total)?;

        if persist {
            fs::create_dir_all(&self.root).map_err(|e| Error::io(&self.root, e))?;
            for (i, chunk) in chunks.iter().enumerate() {
                let path = self.chunk_path(dataset_name, i, total);
                self.write_file(&path, chunk)?;
                debug!("wrote {} ({} bytes)", path.display(), chunk.len());
            }
            info!(
                "wrote {} chunks for dataset `{}` ({} rows)",
                total,
                dataset_name,
                dataset.len()
            );
        }

        Ok(WriteOutcome::Written { chunks })
    }

    // Write next to the target and rename into place so readers never see a
    // partial chunk.
    fn write_file(&self, path: &Path, contents: &str) -> Result<()> {
        let mut file = NamedTempFile::new_in(&self.root).map_err(|e| Error::io(&self.root, e))?;
        file.write_all(contents.as_bytes())
            .map_err(|e| Error::io(path, e))?;
        file.persist(path).map_err(|e| Error::io(path, e.error))?;
        Ok(())
    }

    /// Contents of a stored chunk.
    pub fn read_chunk(&self, dataset_name: &str, index: usize, total: usize) -> Result<String> {
        validate_dataset_name(dataset_name)?;
        if index >= total {
            return Err(Error::invalid(format!(
                "chunk {} is out of range for {} chunks",
                index + 1,
                total
            )));
        }

        let path = self.chunk_path(dataset_name, index, total);
        fs::read_to_string(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => {
                Error::NotFound(format!("chunk file {}", chunk_filename(dataset_name, index, total)))
            }
            _ => Error::io(&path, e),
        })
    }

    /// Contents of every stored chunk of a set, in index order.
    pub fn read_chunks(&self, dataset_name: &str, total: usize) -> Result<Vec<String>> {
        (0..total)
            .map(|i| self.read_chunk(dataset_name, i, total))
            .collect()
    }
}
