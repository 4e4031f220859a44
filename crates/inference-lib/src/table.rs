//! In-memory tabular batches and CSV I/O
//!
//! A [`Table`] is a header plus positionally ordered rows of scalar JSON
//! values. Row order is never changed by any operation in this module.

use crate::error::TableError;
use serde_json::{Map, Number, Value};
use std::collections::HashSet;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// One logical input: field name to scalar value, insertion ordered
pub type Record = Map<String, Value>;

/// Ordered batch of rows sharing one column set
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    /// Create an empty table with the given header
    pub fn new(columns: Vec<String>) -> Result<Self, TableError> {
        let mut seen = HashSet::with_capacity(columns.len());
        for column in &columns {
            if !seen.insert(column.as_str()) {
                return Err(TableError::DuplicateColumn(column.clone()));
            }
        }
        Ok(Self {
            columns,
            rows: Vec::new(),
        })
    }

    /// Assemble a table whose rows are known to match the header width
    pub(crate) fn with_rows(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        debug_assert!(rows.iter().all(|row| row.len() == columns.len()));
        Self { columns, rows }
    }

    /// Build a table from records; the header is the union of keys in
    /// first-seen order and absent fields become `null`
    pub fn from_records(records: &[Record]) -> Self {
        let mut columns: Vec<String> = Vec::new();
        let mut seen: HashSet<&str> = HashSet::new();
        for record in records {
            for key in record.keys() {
                if seen.insert(key.as_str()) {
                    columns.push(key.clone());
                }
            }
        }

        let rows = records
            .iter()
            .map(|record| {
                columns
                    .iter()
                    .map(|column| record.get(column).cloned().unwrap_or(Value::Null))
                    .collect()
            })
            .collect();

        Self { columns, rows }
    }

    /// Append a row, rejecting rows whose width differs from the header
    pub fn push_row(&mut self, row: Vec<Value>) -> Result<(), TableError> {
        if row.len() != self.columns.len() {
            return Err(TableError::RaggedRow {
                row: self.rows.len(),
                expected: self.columns.len(),
                actual: row.len(),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Values of one column, top to bottom
    pub fn column(&self, name: &str) -> Option<Vec<&Value>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(|row| &row[idx]).collect())
    }

    /// Row `idx` as a record
    pub fn record(&self, idx: usize) -> Option<Record> {
        let row = self.rows.get(idx)?;
        Some(
            self.columns
                .iter()
                .cloned()
                .zip(row.iter().cloned())
                .collect(),
        )
    }

    /// All rows as records, in order
    pub fn records(&self) -> impl Iterator<Item = Record> + '_ {
        (0..self.rows.len()).filter_map(move |idx| self.record(idx))
    }

    /// Remove every listed column that exists; returns the names removed
    pub fn drop_columns<S: AsRef<str>>(&mut self, names: &[S]) -> Vec<String> {
        let doomed: HashSet<&str> = names.iter().map(AsRef::as_ref).collect();
        let keep: Vec<bool> = self
            .columns
            .iter()
            .map(|c| !doomed.contains(c.as_str()))
            .collect();

        if keep.iter().all(|k| *k) {
            return Vec::new();
        }

        let mut removed = Vec::new();
        let mut columns = Vec::with_capacity(self.columns.len());
        for (column, kept) in self.columns.drain(..).zip(&keep) {
            if *kept {
                columns.push(column);
            } else {
                removed.push(column);
            }
        }
        self.columns = columns;

        for row in &mut self.rows {
            let mut flags = keep.iter();
            row.retain(|_| *flags.next().unwrap_or(&true));
        }

        removed
    }

    /// Rename the column at `idx`
    pub fn rename_column(&mut self, idx: usize, name: impl Into<String>) -> Result<(), TableError> {
        let name = name.into();
        if self
            .columns
            .iter()
            .enumerate()
            .any(|(i, c)| i != idx && *c == name)
        {
            return Err(TableError::DuplicateColumn(name));
        }
        if let Some(column) = self.columns.get_mut(idx) {
            *column = name;
        }
        Ok(())
    }

    /// Parse CSV with a header row; cells are typed by [`parse_cell`]
    pub fn read_csv<R: Read>(reader: R) -> Result<Self, TableError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let headers = csv_reader
            .headers()?
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').to_string())
            .collect();
        let mut table = Self::new(headers)?;

        for record in csv_reader.records() {
            let record = record?;
            table.push_row(record.iter().map(parse_cell).collect())?;
        }

        Ok(table)
    }

    pub fn read_csv_path(path: impl AsRef<Path>) -> Result<Self, TableError> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|source| TableError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::read_csv(std::io::BufReader::new(file))
    }

    /// Serialize as CSV with a header row
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), TableError> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        csv_writer.write_record(&self.columns)?;
        for row in &self.rows {
            csv_writer.write_record(row.iter().map(format_cell))?;
        }
        csv_writer.flush().map_err(csv::Error::from)?;
        Ok(())
    }

    /// Write CSV to `path`, creating parent directories as needed. The file is
    /// replaced only once the whole table has been written.
    pub fn write_csv_path(&self, path: impl AsRef<Path>) -> Result<(), TableError> {
        write_atomic(path.as_ref(), |file| self.write_csv(std::io::BufWriter::new(file)))
    }
}

/// Stage output in a sibling temp file and rename it over `path`; on any
/// error the temp file is removed and `path` is left untouched
pub(crate) fn write_atomic<F>(path: &Path, write: F) -> Result<(), TableError>
where
    F: FnOnce(&mut File) -> Result<(), TableError>,
{
    let io_err = |source| TableError::Io {
        path: path.to_path_buf(),
        source,
    };

    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent).map_err(io_err)?;

    let mut staged = NamedTempFile::new_in(parent).map_err(io_err)?;
    write(staged.as_file_mut())?;
    staged.as_file().sync_all().map_err(io_err)?;
    staged.persist(path).map_err(|e| io_err(e.error))?;
    Ok(())
}

/// Type a raw CSV cell: empty and NaN become null, integers and floats
/// become numbers, True/False become booleans, anything else stays text
pub fn parse_cell(raw: &str) -> Value {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Value::Null;
    }

    if let Ok(int) = trimmed.parse::<i64>() {
        return Value::Number(int.into());
    }

    if let Ok(float) = trimmed.parse::<f64>() {
        return Number::from_f64(float).map_or(Value::Null, Value::Number);
    }

    match trimmed {
        "true" | "True" | "TRUE" => Value::Bool(true),
        "false" | "False" | "FALSE" => Value::Bool(false),
        _ => Value::String(raw.to_string()),
    }
}

fn format_cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
