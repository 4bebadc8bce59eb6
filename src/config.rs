//! Run configuration.
//!
//! Two layers:
//! - [`PipelineConfig`] holds the tunables that bound memory and output size. It is
//!   built once at startup and passed by reference into the planner and the sink.
//! - [`Job`] describes one conversion: which schema, which data file, where to write,
//!   and how the DDL should look.

use crate::dialect::Dialect;
use crate::error::ConfigError;
use crate::schema::Schema;
use std::fmt::{Display, Formatter, Result as FormatResult};
use std::path::PathBuf;
use std::str::FromStr;

const MIB: u64 = 1 << 20;
const GIB: u64 = 1 << 30;

/// Immutable resource tunables for a run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Upper bound on raw input bytes resident at once across every parser and writer.
    pub max_in_flight_bytes: u64,
    /// Upper bound on raw input bytes routed to one shard file.
    pub max_bytes_per_shard: u64,
    /// Fewest parser workers a run will spawn.
    pub min_parsers: usize,
    /// Most parser workers a run will spawn.
    pub max_parsers: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_in_flight_bytes: 100 * MIB,
            max_bytes_per_shard: 10 * GIB,
            min_parsers: 2,
            max_parsers: 5,
        }
    }
}

/// Shape of the output on disk.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputLayout {
    /// A directory when the input needs more than one shard, else a single file.
    #[default]
    Auto,
    /// One `.sql` file holding the DDL followed by every insert block.
    SingleFile,
    /// A directory holding `ddl.sql` and `inserts_{i}.sql` shards.
    Directory,
}

/// Whether lookup tables for discrete fields are generated.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RefTables {
    /// Generate one per discrete field; nothing if the schema has none.
    #[default]
    Auto,
    /// Generate one per discrete field; fail if the schema has none.
    Required,
    /// Never generate.
    Off,
}

impl FromStr for OutputLayout {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "file" | "single" => Ok(Self::SingleFile),
            "dir" | "directory" => Ok(Self::Directory),
            _ => Err(ConfigError::UnknownLayout(s.to_string())),
        }
    }
}

impl FromStr for RefTables {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "required" | "on" => Ok(Self::Required),
            "off" | "none" => Ok(Self::Off),
            _ => Err(ConfigError::UnknownRefTablesMode(s.to_string())),
        }
    }
}

impl Display for RefTables {
    fn fmt(&self, f: &mut Formatter<'_>) -> FormatResult {
        f.write_str(match self {
            Self::Auto => "auto",
            Self::Required => "required",
            Self::Off => "off",
        })
    }
}

/// One conversion request.
#[derive(Clone, Debug)]
pub struct Job {
    pub schema: Schema,
    /// Fixed-width data file. `None` writes the DDL only.
    pub data: Option<PathBuf>,
    /// Output file (single-file layout) or directory (directory layout).
    pub output: PathBuf,
    pub layout: OutputLayout,
    pub table: String,
    pub dialect: Dialect,
    /// Columns to index, matched case-insensitively against the schema.
    pub indexes: Vec<String>,
    pub ref_tables: RefTables,
}

impl Job {
    /// A job with default layout, dialect, and table name.
    pub fn new(schema: Schema, data: Option<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            schema,
            data,
            output: output.into(),
            layout: OutputLayout::default(),
            table: "ipums_tab".to_string(),
            dialect: Dialect::default(),
            indexes: Vec::new(),
            ref_tables: RefTables::default(),
        }
    }

    /// Check everything that can be checked without touching the filesystem.
    ///
    /// Index names are checked later, when the DDL is rendered, since that is where
    /// they are resolved against the schema.
    ///
    /// # Errors
    /// Returns a [`ConfigError`] for an empty table name or an unusable schema.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.table.trim().is_empty() {
            return Err(ConfigError::EmptyTableName);
        }
        self.schema.validate()
    }
}
