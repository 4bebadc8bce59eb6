//! Command-line front end: `ipums2db [OPTIONS] <DDI> [DAT]`.
//!
//! With only a dictionary, writes the schema statements. With a data file as well,
//! writes the full dump and prints a short summary. Any failure exits with status 1
//! and leaves no output behind.
//!
//! ## Usage
//!
//! ```sh
//! ipums2db usa_00001.xml usa_00001.dat -d mysql -i YEAR,STATEFIP -o usa
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use ipums2db::{Dialect, Job, OutputLayout, PipelineConfig, RefTables, load_schema, run};
use tracing::error;
use tracing_subscriber::EnvFilter;

const MIB: u64 = 1 << 20;

#[derive(Parser, Debug)]
#[command(version, about = "Convert an IPUMS fixed-width extract into a SQL load script")]
struct Args {
    /// Data dictionary: a DDI `.xml` codebook or a `.json` schema.
    ddi: PathBuf,

    /// Fixed-width data file. Without it only the schema statements are written.
    dat: Option<PathBuf>,

    /// Target database: postgres, mysql, mssql, or oracle.
    #[arg(short, long, default_value = "postgres")]
    dialect: Dialect,

    /// Name of the main table.
    #[arg(short, long, default_value = "ipums_tab")]
    table: String,

    /// Comma-separated columns to index.
    #[arg(short, long, value_delimiter = ',')]
    index: Vec<String>,

    /// Output file or directory; `.sql` is added or removed as the layout needs.
    #[arg(short, long, default_value = "ipums_dump")]
    output: PathBuf,

    /// Output layout: auto, file, or dir.
    #[arg(long, default_value = "auto")]
    layout: OutputLayout,

    /// Shorthand for `--layout dir`.
    #[arg(long, conflicts_with = "layout")]
    dir: bool,

    /// Lookup tables for discrete fields: auto, required, or off.
    #[arg(long, default_value = "auto")]
    ref_tables: RefTables,

    /// Most raw input, in MiB, routed to one shard file.
    #[arg(long)]
    max_shard_mib: Option<u64>,

    /// Most raw input, in MiB, held in memory at once.
    #[arg(long)]
    memory_mib: Option<u64>,

    /// Also write the run summary as JSON to this path.
    #[arg(long)]
    summary_json: Option<PathBuf>,

    /// Only report errors.
    #[arg(short, long)]
    silent: bool,
}

impl Args {
    fn pipeline_config(&self) -> PipelineConfig {
        let mut cfg = PipelineConfig::default();
        if let Some(mib) = self.max_shard_mib {
            cfg.max_bytes_per_shard = mib.max(1) * MIB;
        }
        if let Some(mib) = self.memory_mib {
            cfg.max_in_flight_bytes = mib.max(1) * MIB;
        }
        cfg
    }

    fn job(&self) -> Result<Job> {
        let schema = load_schema(&self.ddi)?;
        let mut job = Job::new(schema, self.dat.clone(), &self.output);
        job.layout = if self.dir { OutputLayout::Directory } else { self.layout };
        job.table = self.table.clone();
        job.dialect = self.dialect;
        job.indexes = self
            .index
            .iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        job.ref_tables = self.ref_tables;
        Ok(job)
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    let default_level = if args.silent { "warn" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match convert(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn convert(args: &Args) -> Result<()> {
    let job = args.job()?;
    let summary = run(&job, &args.pipeline_config())?;
    if let Some(path) = &args.summary_json {
        summary
            .save_to_file(path)
            .with_context(|| format!("write summary {}", path.display()))?;
    }
    if !args.silent {
        println!("{summary}");
    }
    Ok(())
}
