use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use csv::{ReaderBuilder, StringRecord, Trim, WriterBuilder};
use serde::Serialize;
use tracing::debug;

use crate::error::{Error, Result};
use crate::schema::ColumnMapping;

/// A record type that can be read from a header-checked table.
pub trait TableRecord: Sized {
    /// Table name used in error messages
    const TABLE: &'static str;

    /// Resolve the physical position of every field this record needs,
    /// in the order [`TableRecord::from_row`] reads them.
    fn resolve(headers: &[String], columns: &ColumnMapping) -> Result<Vec<usize>>;

    /// Build a record from one data row.
    fn from_row(row: &Row<'_>) -> Result<Self>;
}

/// One data row, viewed through the resolved field positions.
pub struct Row<'a> {
    table: &'static str,
    /// 1-based data row number (header excluded)
    line: usize,
    record: &'a StringRecord,
    positions: &'a [usize],
    headers: &'a [String],
}

impl Row<'_> {
    fn raw(&self, field: usize) -> (&str, usize) {
        let col = self.positions[field];
        (self.record.get(col).unwrap_or(""), col)
    }

    fn parse_error(&self, col: usize, value: &str) -> Error {
        Error::Parse {
            table: self.table,
            row: self.line,
            column: self.headers.get(col).cloned().unwrap_or_default(),
            value: value.to_string(),
        }
    }

    /// Read field `field` as a float.
    pub fn f64(&self, field: usize) -> Result<f64> {
        let (value, col) = self.raw(field);
        value.parse::<f64>().map_err(|_| self.parse_error(col, value))
    }

    /// Read field `field` as an integer. Integral floats (`"3.0"`) are accepted.
    pub fn i64(&self, field: usize) -> Result<i64> {
        let (value, col) = self.raw(field);
        if let Ok(v) = value.parse::<i64>() {
            return Ok(v);
        }
        match value.parse::<f64>() {
            Ok(v) if v.fract() == 0.0 && v.is_finite() => Ok(v as i64),
            _ => Err(self.parse_error(col, value)),
        }
    }
}

/// Read every row of a CSV table from any reader.
pub fn read_table<T, R>(reader: R, columns: &ColumnMapping) -> Result<Vec<T>>
where
    T: TableRecord,
    R: Read,
{
    let mut csv_reader = ReaderBuilder::new().trim(Trim::All).from_reader(reader);
    let headers: Vec<String> = csv_reader.headers()?.iter().map(str::to_string).collect();
    let positions = T::resolve(&headers, columns)?;

    let mut out = Vec::new();
    for (i, record) in csv_reader.records().enumerate() {
        let record = record?;
        let row = Row {
            table: T::TABLE,
            line: i + 1,
            record: &record,
            positions: &positions,
            headers: &headers,
        };
        out.push(T::from_row(&row)?);
    }

    debug!(table = T::TABLE, rows = out.len(), "table read");
    Ok(out)
}

/// Read every row of a CSV table from a file.
pub fn read_table_file<T, P>(path: P, columns: &ColumnMapping) -> Result<Vec<T>>
where
    T: TableRecord,
    P: AsRef<Path>,
{
    let file = File::open(path.as_ref())?;
    read_table(file, columns)
}

/// Serialize rows as CSV with a header line.
pub fn write_table<T, W>(writer: W, rows: &[T]) -> Result<()>
where
    T: Serialize,
    W: Write,
{
    let mut csv_writer = WriterBuilder::new().from_writer(writer);
    for row in rows {
        csv_writer.serialize(row)?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Serialize rows as CSV into a file.
pub fn write_table_file<T, P>(path: P, rows: &[T]) -> Result<()>
where
    T: Serialize,
    P: AsRef<Path>,
{
    let file = File::create(path.as_ref())?;
    write_table(file, rows)
}
