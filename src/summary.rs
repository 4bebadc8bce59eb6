//! What a successful run produced.
//!
//! A [`RunSummary`] prints as a short human-readable report and can be saved as JSON
//! for scripts that drive the converter.

use crate::planner::RunPlan;
use crate::sink::ShardStats;
use anyhow::{Context, Result};
use serde::Serialize;
use std::fmt::{Display, Formatter, Result as FormatResult};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

const MIB: f64 = (1 << 20) as f64;

#[derive(Clone, Debug, Default, Serialize)]
pub struct RunSummary {
    /// The dump: a single `.sql` file or the shard directory.
    pub output: PathBuf,
    pub elapsed_ms: u64,
    pub input_bytes: u64,
    pub rows: u64,
    pub units: usize,
    /// `None` for schema-only runs.
    pub plan: Option<RunPlan>,
    pub shards: Vec<ShardStats>,
    /// Every file written, schema file first.
    pub artifacts: Vec<PathBuf>,
}

impl RunSummary {
    /// Input throughput in MiB per second.
    #[must_use]
    pub fn mib_per_sec(&self) -> f64 {
        if self.elapsed_ms == 0 {
            return 0.0;
        }
        self.input_bytes as f64 / MIB / (self.elapsed_ms as f64 / 1000.0)
    }

    /// Bytes of SQL written across all shards, excluding the DDL.
    #[must_use]
    pub fn output_bytes(&self) -> u64 {
        self.shards.iter().map(|s| s.bytes).sum()
    }

    /// Save as pretty-printed JSON.
    ///
    /// # Errors
    /// If the file cannot be created or written.
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self).context("serialize run summary")?;
        let mut file = File::create(path).with_context(|| format!("create {}", path.display()))?;
        file.write_all(json.as_bytes())
            .with_context(|| format!("write {}", path.display()))?;
        Ok(())
    }
}

impl Display for RunSummary {
    fn fmt(&self, f: &mut Formatter<'_>) -> FormatResult {
        writeln!(
            f,
            "Time elapsed: {:.3}s ({:.2} MiB/s)",
            self.elapsed_ms as f64 / 1000.0,
            self.mib_per_sec()
        )?;
        if self.plan.is_some() {
            writeln!(
                f,
                "Rows: {} in {} units across {} shard(s)",
                self.rows,
                self.units,
                self.shards.len()
            )?;
        }
        write!(f, "Dump written to: {}", self.output.display())
    }
}
