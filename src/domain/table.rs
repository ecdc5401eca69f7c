//! Minimal in-memory table: an ordered list of records keyed by field name.
//!
//! This is the exchange format between ingestion (CSV in the CLI, or anything
//! a caller builds by hand) and the analysis code. Values are either numbers
//! or text; analysis code asks for a column in the shape it needs and gets an
//! `InvalidInput` error if the column is missing or has the wrong kind.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// A single cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Num(f64),
    Text(String),
}

impl Value {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Num(v) => Some(*v),
            Value::Text(_) => None,
        }
    }

    /// Parse a raw text cell: numbers become `Num`, everything else `Text`.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().parse::<f64>() {
            Ok(v) => Value::Num(v),
            Err(_) => Value::Text(raw.to_string()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Num(v) => write!(f, "{v}"),
            Value::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Num(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

pub type Record = BTreeMap<String, Value>;

/// Ordered records plus the column order used for display and export.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    columns: Vec<String>,
    records: Vec<Record>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            records: Vec::new(),
        }
    }

    /// Build a table from records; columns are taken in first-seen order.
    pub fn from_records(records: Vec<Record>) -> Self {
        let mut columns: Vec<String> = Vec::new();
        for r in &records {
            for k in r.keys() {
                if !columns.contains(k) {
                    columns.push(k.clone());
                }
            }
        }
        Self { columns, records }
    }

    /// Append a record. Fields not yet known become new columns.
    pub fn push(&mut self, record: Record) {
        for k in record.keys() {
            if !self.columns.contains(k) {
                self.columns.push(k.clone());
            }
        }
        self.records.push(record);
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    fn require_column(&self, name: &str) -> Result<(), AppError> {
        if self.has_column(name) {
            Ok(())
        } else {
            Err(AppError::invalid(format!("table has no column '{name}'")))
        }
    }

    /// Extract a numeric column. Every row must hold a number.
    pub fn numeric_column(&self, name: &str) -> Result<Vec<f64>, AppError> {
        self.require_column(name)?;
        self.records
            .iter()
            .enumerate()
            .map(|(i, r)| {
                r.get(name).and_then(Value::as_f64).ok_or_else(|| {
                    AppError::invalid(format!("row {i}: column '{name}' is not numeric"))
                })
            })
            .collect()
    }

    /// Extract a column as category labels (numbers are rendered as text).
    pub fn category_column(&self, name: &str) -> Result<Vec<String>, AppError> {
        self.require_column(name)?;
        self.records
            .iter()
            .enumerate()
            .map(|(i, r)| {
                r.get(name)
                    .map(|v| v.to_string())
                    .ok_or_else(|| AppError::invalid(format!("row {i}: column '{name}' is empty")))
            })
            .collect()
    }

    /// Copy of the table without the rows that have no value in `name`.
    pub fn drop_missing(&self, name: &str) -> Table {
        Table {
            columns: self.columns.clone(),
            records: self
                .records
                .iter()
                .filter(|r| r.contains_key(name))
                .cloned()
                .collect(),
        }
    }

    /// Return a copy of the table with `name` set to `values` row by row.
    pub fn with_column(&self, name: &str, values: Vec<Option<Value>>) -> Result<Table, AppError> {
        if values.len() != self.records.len() {
            return Err(AppError::invalid(format!(
                "column '{name}' has {} values for {} rows",
                values.len(),
                self.records.len()
            )));
        }
        let mut out = self.clone();
        if !out.has_column(name) {
            out.columns.push(name.to_string());
        }
        for (record, value) in out.records.iter_mut().zip(values) {
            match value {
                Some(v) => {
                    record.insert(name.to_string(), v);
                }
                None => {
                    record.remove(name);
                }
            }
        }
        Ok(out)
    }
}

/// Convenience for building records in code and tests.
pub fn record<const N: usize>(fields: [(&str, Value); N]) -> Record {
    fields
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}
