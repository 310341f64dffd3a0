use crate::error::{Error, Result};
use serde::ser::{Error as _, SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::ops::Range;

/// A single cell of a dataset.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Null,
    Bool(bool),
    Int(i64),
    /// Integers above `i64::MAX`.
    UInt(u64),
    Float(f64),
    Text(String),
}

impl Scalar {
    /// Infer a typed value from a raw text field (CSV cells, form values).
    ///
    /// Empty text is a missing value; `true`/`false` are booleans; anything that
    /// parses as an integer or a float becomes a number; the rest stays text.
    /// Integers that do not fit in 64 bits stay text so no digit is lost.
    ///
    /// ```
    /// use predictables::dataset::Scalar;
    ///
    /// assert_eq!(Scalar::infer(""), Scalar::Null);
    /// assert_eq!(Scalar::infer("42"), Scalar::Int(42));
    /// assert_eq!(Scalar::infer("18446744073709551615"), Scalar::UInt(u64::MAX));
    /// assert_eq!(Scalar::infer("4.5"), Scalar::Float(4.5));
    /// assert_eq!(Scalar::infer("setosa"), Scalar::Text("setosa".to_string()));
    /// ```
    pub fn infer(raw: &str) -> Self {
        if raw.is_empty() {
            return Scalar::Null;
        }
        match raw {
            "true" => return Scalar::Bool(true),
            "false" => return Scalar::Bool(false),
            _ => {}
        }
        if let Ok(i) = raw.parse::<i64>() {
            return Scalar::Int(i);
        }
        if let Ok(u) = raw.parse::<u64>() {
            return Scalar::UInt(u);
        }
        if is_integer_literal(raw) {
            return Scalar::Text(raw.to_string());
        }
        // "inf"/"nan" parse as floats but have no JSON encoding
        match raw.parse::<f64>() {
            Ok(f) if f.is_finite() => Scalar::Float(f),
            _ => Scalar::Text(raw.to_string()),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Scalar::Null)
    }

    /// Convert to a JSON value, refusing values JSON cannot carry.
    pub fn to_json(&self) -> Result<Value> {
        Ok(match self {
            Scalar::Null => Value::Null,
            Scalar::Bool(b) => Value::Bool(*b),
            Scalar::Int(i) => Value::from(*i),
            Scalar::UInt(u) => Value::from(*u),
            Scalar::Float(f) => serde_json::Number::from_f64(*f)
                .map(Value::Number)
                .ok_or_else(|| {
                    Error::Serialization(format!("non-finite float {f} has no JSON encoding"))
                })?,
            Scalar::Text(t) => Value::String(t.clone()),
        })
    }
}

// Optional sign followed by digits only
fn is_integer_literal(raw: &str) -> bool {
    let digits = raw.strip_prefix(['-', '+']).unwrap_or(raw);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

impl Serialize for Scalar {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Scalar::Null => serializer.serialize_unit(),
            Scalar::Bool(b) => serializer.serialize_bool(*b),
            Scalar::Int(i) => serializer.serialize_i64(*i),
            Scalar::UInt(u) => serializer.serialize_u64(*u),
            Scalar::Float(f) if f.is_finite() => serializer.serialize_f64(*f),
            Scalar::Float(f) => Err(S::Error::custom(format!(
                "non-finite float {f} has no JSON encoding"
            ))),
            Scalar::Text(t) => serializer.serialize_str(t),
        }
    }
}

impl TryFrom<Value> for Scalar {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::Null => Ok(Scalar::Null),
            Value::Bool(b) => Ok(Scalar::Bool(b)),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(Scalar::Int(i))
                } else if let Some(u) = n.as_u64() {
                    Ok(Scalar::UInt(u))
                } else {
                    n.as_f64()
                        .filter(|f| f.is_finite())
                        .map(Scalar::Float)
                        .ok_or_else(|| Error::invalid(format!("number {n} is out of range")))
                }
            }
            Value::String(s) => Ok(Scalar::Text(s)),
            other => Err(Error::invalid(format!(
                "expected a scalar value, found {other}"
            ))),
        }
    }
}

/// An ordered, row-oriented table.
///
/// Columns are unique and every row carries exactly one value per column, so a
/// row always reads back as a record in the dataset's column order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Dataset {
    columns: Vec<String>,
    rows: Vec<Vec<Scalar>>,
}

impl Dataset {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Scalar>>) -> Result<Self> {
        let mut seen = HashSet::new();
        for column in &columns {
            if !seen.insert(column.as_str()) {
                return Err(Error::invalid(format!("duplicate column `{column}`")));
            }
        }

        if let Some((i, row)) = rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != columns.len())
        {
            return Err(Error::invalid(format!(
                "row {i} has {} values but the dataset has {} columns",
                row.len(),
                columns.len()
            )));
        }

        Ok(Dataset { columns, rows })
    }

    /// Build a dataset from JSON records.
    ///
    /// Columns are the union of all keys in first-seen order; a key missing from
    /// a record reads as null.
    pub fn from_records(records: Vec<Map<String, Value>>) -> Result<Self> {
        let mut columns: Vec<String> = Vec::new();
        let mut position: HashMap<String, usize> = HashMap::new();
        for record in &records {
            for key in record.keys() {
                if !position.contains_key(key) {
                    position.insert(key.clone(), columns.len());
                    columns.push(key.clone());
                }
            }
        }

        let mut rows = Vec::with_capacity(records.len());
        for record in records {
            let mut row = vec![Scalar::Null; columns.len()];
            for (key, value) in record {
                row[position[&key]] = Scalar::try_from(value)?;
            }
            rows.push(row);
        }

        Dataset::new(columns, rows)
    }

    /// Build a dataset from a parsed JSON document holding an array of objects.
    pub fn from_json_value(value: Value) -> Result<Self> {
        let Value::Array(items) = value else {
            return Err(Error::invalid("expected a JSON array of records"));
        };

        let mut records = Vec::with_capacity(items.len());
        for (i, item) in items.into_iter().enumerate() {
            match item {
                Value::Object(map) => records.push(map),
                other => {
                    return Err(Error::invalid(format!(
                        "record {i} is not an object: {other}"
                    )));
                }
            }
        }
        Dataset::from_records(records)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Scalar>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// A serializable view over a contiguous run of rows.
    ///
    /// Panics if `range` is out of bounds, like slice indexing.
    pub fn records(&self, range: Range<usize>) -> Records<'_> {
        Records {
            columns: &self.columns,
            rows: &self.rows[range],
        }
    }

    /// The whole dataset as a compact JSON array of records.
    pub fn to_records_json(&self) -> Result<String> {
        self.records(0..self.len()).to_json_string()
    }
}

/// Rows borrowed from a [`Dataset`], serialized as a JSON array of records.
#[derive(Debug, Clone, Copy)]
pub struct Records<'a> {
    columns: &'a [String],
    rows: &'a [Vec<Scalar>],
}

impl Records<'_> {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

impl Serialize for Records<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.rows.len()))?;
        for row in self.rows {
            seq.serialize_element(&Record {
                columns: self.columns,
                values: row,
            })?;
        }
        seq.end()
    }
}

struct Record<'a> {
    columns: &'a [String],
    values: &'a [Scalar],
}

impl Serialize for Record<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (column, value) in self.columns.iter().zip(self.values) {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}
