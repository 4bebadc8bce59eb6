//! # ipums2db
//!
//! Converts an IPUMS fixed-width extract into a SQL load script: one `CREATE TABLE`
//! built from the data dictionary, optional lookup tables and indexes, and multi-row
//! `INSERT` statements for every record.
//!
//! ## Key Features
//!
//! - **Four dialects** - PostgreSQL, MySQL, SQL Server, and Oracle type names and quoting
//! - **Bounded memory** - input is cut into work units sized so that every worker
//!   together holds at most [`PipelineConfig::max_in_flight_bytes`] of raw rows
//! - **Parallel parsing** - positional reads from a pool of parser workers
//! - **Sharded output** - large inputs spread over several `inserts_{i}.sql` files
//! - **All-or-nothing** - any failure removes every file the run created
//!
//! ## Quick Start
//!
//! ```ignore
//! use ipums2db::*;
//! # use anyhow::Result;
//!
//! # fn main() -> Result<()> {
//! let schema = load_schema("usa_00001.xml")?;
//! let mut job = Job::new(schema, Some("usa_00001.dat".into()), "usa_dump");
//! job.dialect = Dialect::MySql;
//! job.indexes = vec!["YEAR".to_string(), "STATEFIP".to_string()];
//!
//! let summary = run(&job, &PipelineConfig::default())?;
//! println!("{summary}");
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! 1. The [`ddi`] loader builds a [`Schema`] from the dictionary
//! 2. [`ddl`] renders the schema statements for the chosen [`Dialect`]
//! 3. The [`planner`] sizes the worker pool and partitions the file into work units
//! 4. The [`parser`] pool reads and encodes units with the [`encoder`]
//! 5. The [`sink`] writes the DDL first, then shard writers append insert blocks
//!
//! [`pipeline`] wires these together and owns cleanup on failure.
//!
//! ## Feature Flags
//!
//! - `ddi-xml` (default) - read DDI XML codebooks; without it only JSON schemas load

pub mod config;
pub mod ddi;
pub mod ddl;
pub mod dialect;
pub mod encoder;
pub mod error;
pub mod parser;
pub mod pipeline;
pub mod planner;
pub mod schema;
pub mod sink;
pub mod summary;

pub use config::{Job, OutputLayout, PipelineConfig, RefTables};
pub use ddi::{load_schema, parse_ddi, parse_schema_json};
pub use ddl::render_ddl;
pub use dialect::{Dialect, SqlType};
pub use encoder::{RowEncoder, encode_rows};
pub use error::{BlockError, ConfigError, DdlError, DecodeError, PlanError};
pub use parser::{ParserPool, ResultBlock};
pub use pipeline::{AbortSignal, run, run_with};
pub use planner::{RunPlan, WorkUnit, WorkUnits, partition};
pub use schema::{Category, Field, Interval, ScalarKind, Schema};
pub use sink::{BufferedShards, DumpSink, ShardOpener, ShardStats, ShardWriter};
pub use summary::RunSummary;
