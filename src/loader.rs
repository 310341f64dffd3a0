use crate::dataset::{Dataset, Scalar};
use crate::error::{Error, Result};
use log::{debug, info};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// File extensions a dataset can be loaded from.
pub const ALLOWED_EXTENSIONS: &[&str] = &["csv", "json"];

/// Parse CSV text into a dataset
///
/// The first line is the header. Fields are comma separated; a field may be
/// wrapped in double quotes, inside which `""` stands for one quote. Each value
/// is typed with [`Scalar::infer`].
///
/// # Examples
/// ```
/// use predictables::loader::parse_csv;
/// use predictables::dataset::Scalar;
///
/// let ds = parse_csv("name,petals\n\"setosa, wild\",4\n").unwrap();
/// assert_eq!(ds.columns(), &["name".to_string(), "petals".to_string()]);
/// assert_eq!(ds.rows()[0][0], Scalar::Text("setosa, wild".to_string()));
/// assert_eq!(ds.rows()[0][1], Scalar::Int(4));
/// ```
pub fn parse_csv(text: &str) -> Result<Dataset> {
    let mut lines = text
        .lines()
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .filter(|line| !line.is_empty());

    let header = lines
        .next()
        .ok_or_else(|| Error::invalid("CSV input is empty"))?;
    let columns = parse_csv_row(header);

    let mut rows: Vec<Vec<Scalar>> = Vec::new();
    for (r, line) in lines.enumerate() {
        let fields = parse_csv_row(line);
        if fields.len() != columns.len() {
            return Err(Error::invalid(format!(
                "CSV row {} has {} fields, header has {}",
                r + 1,
                fields.len(),
                columns.len()
            )));
        }
        rows.push(fields.iter().map(|field| Scalar::infer(field)).collect());
    }

    Dataset::new(columns, rows)
}

/// Parse a JSON array of records into a dataset.
pub fn parse_json_records(text: &str) -> Result<Dataset> {
    let value: serde_json::Value = serde_json::from_str(text)?;
    Dataset::from_json_value(value)
}

/// Parse dataset text according to a file extension (`csv` or `json`).
pub fn parse_dataset(text: &str, extension: &str) -> Result<Dataset> {
    match extension.to_lowercase().as_str() {
        "csv" => parse_csv(text),
        "json" => parse_json_records(text),
        other => Err(Error::invalid(format!(
            "unsupported dataset format `{other}`"
        ))),
    }
}

/// Detect file type and load the appropriate format
///
/// # Examples
/// ```no_run
/// use predictables::loader::load_dataset;
///
/// match load_dataset("data/iris.csv") {
///     Ok(ds) => println!("Loaded {} rows", ds.len()),
///     Err(e) => eprintln!("Error loading file: {}", e),
/// }
/// ```
pub fn load_dataset(path: impl AsRef<Path>) -> Result<Dataset> {
    let path = path.as_ref();
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .ok_or_else(|| Error::invalid(format!("{} has no file extension", path.display())))?;

    let text = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    let dataset = parse_dataset(&text, extension)?;
    debug!(
        "loaded {} rows x {} columns from {}",
        dataset.len(),
        dataset.columns().len(),
        path.display()
    );
    Ok(dataset)
}

// Parse a CSV row into a vector of strings
fn parse_csv_row(line: &str) -> Vec<String> {
    let mut result = Vec::new();
    let mut current_field = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' => {
                if in_quotes && chars.peek() == Some(&'"') {
                    // Doubled quote inside a quoted field
                    current_field.push('"');
                    chars.next();
                } else {
                    in_quotes = !in_quotes;
                }
            }
            ',' if !in_quotes => {
                result.push(std::mem::take(&mut current_field));
            }
            _ => current_field.push(c),
        }
    }

    result.push(current_field);
    result
}

/// True when `filename` has one of the [`ALLOWED_EXTENSIONS`].
pub fn allowed_file(filename: &str) -> bool {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| ALLOWED_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Reduce a client-supplied file name to something safe to store.
///
/// Keeps ASCII letters, digits, `.`, `_` and `-`, maps spaces to `_`, drops
/// everything else and strips leading dots. Returns `None` if nothing is left.
pub fn secure_filename(filename: &str) -> Option<String> {
    // Only the last path component counts
    let base = filename
        .rsplit(|c| c == '/' || c == '\\')
        .next()
        .unwrap_or(filename);
    let cleaned: String = base
        .chars()
        .filter_map(|c| match c {
            ' ' => Some('_'),
            c if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') => Some(c),
            _ => None,
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');

    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned.to_string())
    }
}

/// Named datasets stored as files in one directory.
///
/// A name such as `breast-cancer` refers to `breast_cancer.json` or, failing
/// that, `breast_cancer.csv`.
#[derive(Debug, Clone)]
pub struct SampleStore {
    root: PathBuf,
}

impl SampleStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        SampleStore { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Canonical form of a dataset name: hyphens become underscores.
    pub fn normalize_name(name: &str) -> Result<String> {
        crate::chunk::validate_dataset_name(name)?;
        Ok(name.replace('-', "_"))
    }

    /// Path of the file backing `name`.
    pub fn resolve(&self, name: &str) -> Result<PathBuf> {
        let name = Self::normalize_name(name)?;
        ALLOWED_EXTENSIONS
            .iter()
            .map(|ext| self.root.join(format!("{name}.{ext}")))
            .find(|path| path.is_file())
            .ok_or_else(|| Error::NotFound(format!("dataset `{name}`")))
    }

    pub fn load(&self, name: &str) -> Result<Dataset> {
        load_dataset(self.resolve(name)?)
    }

    /// Names of all datasets in the directory, sorted.
    pub fn list(&self) -> Result<Vec<String>> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::io(&self.root, e)),
        };

        let mut names: Vec<String> = entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .filter_map(|path| {
                let ext = path.extension()?.to_str()?.to_lowercase();
                if !ALLOWED_EXTENSIONS.contains(&ext.as_str()) {
                    return None;
                }
                path.file_stem()?.to_str().map(str::to_string)
            })
            .collect();
        names.sort();
        names.dedup();
        Ok(names)
    }

    /// Validate and store an uploaded dataset, returning its name.
    ///
    /// The payload is parsed first, so nothing malformed ever lands in the
    /// directory. An existing dataset of the same name is replaced, including
    /// one stored in the other format.
    pub fn store_upload(&self, filename: &str, bytes: &[u8]) -> Result<String> {
        if !allowed_file(filename) {
            return Err(Error::invalid(format!(
                "file type of `{filename}` is not allowed (expected one of {})",
                ALLOWED_EXTENSIONS.join(", ")
            )));
        }
        let safe = secure_filename(filename)
            .ok_or_else(|| Error::invalid(format!("`{filename}` is not a usable file name")))?;
        let (stem, ext) = safe
            .rsplit_once('.')
            .ok_or_else(|| Error::invalid(format!("`{filename}` has no file extension")))?;
        if stem.is_empty() {
            return Err(Error::invalid(format!("`{filename}` has an empty name")));
        }

        let name = Self::normalize_name(stem)?;
        let ext = ext.to_lowercase();

        let text = std::str::from_utf8(bytes)
            .map_err(|e| Error::invalid(format!("upload is not UTF-8 text: {e}")))?;
        let dataset = parse_dataset(text, &ext)?;

        fs::create_dir_all(&self.root).map_err(|e| Error::io(&self.root, e))?;
        let path = self.root.join(format!("{name}.{ext}"));
        let mut file = NamedTempFile::new_in(&self.root).map_err(|e| Error::io(&self.root, e))?;
        file.write_all(bytes).map_err(|e| Error::io(&path, e))?;
        file.persist(&path).map_err(|e| Error::io(&path, e.error))?;

        // The new upload replaces the dataset, whatever format it had before
        for other in ALLOWED_EXTENSIONS.iter().filter(|other| **other != ext) {
            let stale = self.root.join(format!("{name}.{other}"));
            match fs::remove_file(&stale) {
                Ok(()) => info!("replaced {} with {}", stale.display(), path.display()),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(Error::io(&stale, e)),
            }
        }
        debug!("stored upload {} ({} rows)", path.display(), dataset.len());

        Ok(name)
    }
}
