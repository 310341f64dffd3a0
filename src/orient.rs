use crate::dataset::Dataset;
use crate::error::{Error, Result};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// JSON layouts a dataset can be exported in
///
/// These follow the pandas `to_json(orient=...)` layouts so existing
/// front-end code can consume them unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Orient {
    /// `[{column: value, ...}, ...]`
    Records,
    /// `{"columns": [...], "index": [...], "data": [[...], ...]}`
    #[default]
    Split,
    /// `{column: {row: value, ...}, ...}`
    Columns,
    /// `{row: {column: value, ...}, ...}`
    Index,
    /// `[[...], ...]`
    Values,
}

impl FromStr for Orient {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "records" => Ok(Orient::Records),
            "split" => Ok(Orient::Split),
            "columns" => Ok(Orient::Columns),
            "index" => Ok(Orient::Index),
            "values" => Ok(Orient::Values),
            other => Err(Error::invalid(format!(
                "unknown orient `{other}` (expected records, split, columns, index or values)"
            ))),
        }
    }
}

impl fmt::Display for Orient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Orient::Records => "records",
            Orient::Split => "split",
            Orient::Columns => "columns",
            Orient::Index => "index",
            Orient::Values => "values",
        };
        f.write_str(name)
    }
}

/// Convert a dataset to JSON in the given layout
///
/// # Arguments
/// * `dataset` - The dataset to convert
/// * `orient` - Layout of the resulting document
///
/// # Returns
/// * `Result<Value>` - The JSON document, or a serialization error if a value
///   (a non-finite float) has no JSON representation
///
/// # Examples
/// ```
/// use predictables::loader::parse_csv;
/// use predictables::orient::{to_json, Orient};
///
/// let ds = parse_csv("a,b\n1,x\n2,y\n").unwrap();
/// let doc = to_json(&ds, Orient::Values).unwrap();
/// assert_eq!(doc, serde_json::json!([[1, "x"], [2, "y"]]));
/// ```
pub fn to_json(dataset: &Dataset, orient: Orient) -> Result<Value> {
    let columns = dataset.columns();
    let rows = dataset.rows();

    let doc = match orient {
        Orient::Records => {
            let mut records = Vec::with_capacity(rows.len());
            for row in rows {
                let mut record = Map::new();
                for (column, value) in columns.iter().zip(row) {
                    record.insert(column.clone(), value.to_json()?);
                }
                records.push(Value::Object(record));
            }
            Value::Array(records)
        }
        Orient::Split => {
            let mut doc = Map::new();
            doc.insert("columns".to_string(), Value::from(columns.to_vec()));
            doc.insert("index".to_string(), Value::from((0..rows.len()).collect::<Vec<_>>()));
            doc.insert("data".to_string(), values(dataset)?);
            Value::Object(doc)
        }
        Orient::Columns => {
            let mut doc = Map::new();
            for (c, column) in columns.iter().enumerate() {
                let mut by_row = Map::new();
                for (r, row) in rows.iter().enumerate() {
                    by_row.insert(r.to_string(), row[c].to_json()?);
                }
                doc.insert(column.clone(), Value::Object(by_row));
            }
            Value::Object(doc)
        }
        Orient::Index => {
            let mut doc = Map::new();
            for (r, row) in rows.iter().enumerate() {
                let mut record = Map::new();
                for (column, value) in columns.iter().zip(row) {
                    record.insert(column.clone(), value.to_json()?);
                }
                doc.insert(r.to_string(), Value::Object(record));
            }
            Value::Object(doc)
        }
        Orient::Values => values(dataset)?,
    };

    Ok(doc)
}

// Rows as arrays, in column order
fn values(dataset: &Dataset) -> Result<Value> {
    let mut data = Vec::with_capacity(dataset.len());
    for row in dataset.rows() {
        let row = row.iter().map(|v| v.to_json()).collect::<Result<Vec<_>>>()?;
        data.push(Value::Array(row));
    }
    Ok(Value::Array(data))
}
