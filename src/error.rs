//! Error taxonomy.
//!
//! Leaf errors are typed so callers and tests can match on them; the pipeline wraps
//! them in [`anyhow::Error`] with the name of the stage that failed.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Problems with the run's configuration, detected before any output exists.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("table name must not be empty")]
    EmptyTableName,
    #[error("unknown database dialect `{0}` (expected postgres, mysql, mssql, or oracle)")]
    UnknownDialect(String),
    #[error("unknown reference table mode `{0}` (expected auto, required, or off)")]
    UnknownRefTablesMode(String),
    #[error("unknown output layout `{0}` (expected auto, file, or dir)")]
    UnknownLayout(String),
    #[error("schema has no fields")]
    EmptySchema,
    #[error("field `{field}` has an invalid span [{start}, {end}]")]
    InvalidSpan { field: String, start: usize, end: usize },
}

/// Problems rendering DDL from the schema.
#[derive(Debug, Error)]
pub enum DdlError {
    #[error("field `{field}` has unrecognized interval `{tag}`")]
    UnrecognizedInterval { field: String, tag: String },
    #[error("reference tables were requested but the schema has no discrete fields")]
    NoDiscreteFields,
    #[error("cannot index `{0}`: no such field in the schema")]
    UnknownIndexColumn(String),
}

/// Work-unit sizing that cannot be satisfied for the given file.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlanError {
    #[error("row width must be positive")]
    ZeroRowWidth,
    #[error("max bytes per unit ({unit}) cannot be less than the row width ({row})")]
    UnitSmallerThanRow { unit: u64, row: u64 },
    #[error("max bytes per unit ({unit}) cannot be greater than the file size ({total})")]
    UnitLargerThanFile { unit: u64, total: u64 },
    #[error("row width ({row}) cannot be greater than the file size ({total})")]
    RowLargerThanFile { row: u64, total: u64 },
}

/// A row whose bytes cannot be sliced the way the schema says.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("row {row}: field `{field}` span [{start}, {end}] is outside the row (length {row_len})")]
    SpanOutOfRow {
        field: String,
        start: usize,
        end: usize,
        row: u64,
        row_len: usize,
    },
}

/// Failure carried by a result block in place of its payload.
#[derive(Debug, Error)]
pub enum BlockError {
    #[error("open {}: {source}", path.display())]
    Open { path: PathBuf, source: io::Error },
    #[error("read rows {start_row}..{end_row} of {}: {source}", path.display())]
    Read {
        path: PathBuf,
        start_row: u64,
        end_row: u64,
        source: io::Error,
    },
    #[error(transparent)]
    Decode(#[from] DecodeError),
}
