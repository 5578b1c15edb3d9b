//! Schema-checked CSV ingestion and result output
//!
//! Tables are resolved once against a [`ColumnMapping`](crate::schema::ColumnMapping):
//! missing columns and unparsable cells are rejected here, before any
//! record reaches the estimation core.

mod table;
mod records;

pub use table::{read_table, read_table_file, write_table, write_table_file, Row, TableRecord};
