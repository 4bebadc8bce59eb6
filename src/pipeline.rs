//! Pipeline orchestration: planner → parser pool → dump sink.
//!
//! ```text
//!  producer ──units (rendezvous)──▶ N parsers ──blocks (bounded N)──▶ M shard writers
//! ```
//!
//! Everything that can fail without touching the filesystem (configuration, DDL,
//! sizing) is checked first. Then the sink creates its files and writes the DDL,
//! and only then do the workers start. The two channels are the only shared state
//! and the only backpressure: a producer blocks until a parser is free, and parsers
//! block once `N` finished blocks are waiting for a writer.
//!
//! Blocks are not written in row order. Each is a complete insert statement, so any
//! shard can take any block.
//!
//! A writer that sees an error block or fails a write raises the [`AbortSignal`];
//! the other tasks stop at their next step, every channel end is dropped by its
//! owner, and once the pool has joined the sink deletes everything it created.

use crate::config::{Job, PipelineConfig};
use crate::ddl::render_ddl;
use crate::encoder::RowEncoder;
use crate::parser::{ParserPool, ResultBlock};
use crate::planner::{RunPlan, WorkUnit, WorkUnits};
use crate::sink::{BufferedShards, DumpSink, ShardOpener, ShardStats, ShardWriter, planned_shards};
use crate::summary::RunSummary;
use anyhow::{Context, Result, bail};
use crossbeam_channel::bounded;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use tracing::{error, info};

/// Shared flag that tells every task to stop.
#[derive(Clone, Debug, Default)]
pub struct AbortSignal(Arc<AtomicBool>);

impl AbortSignal {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.0.store(true, Ordering::Release);
    }

    #[must_use]
    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Run a job with buffered shard files.
///
/// # Errors
/// Any configuration, planning, I/O, or decode failure. No output remains on disk
/// after an error.
pub fn run(job: &Job, cfg: &PipelineConfig) -> Result<RunSummary> {
    run_with(job, cfg, &BufferedShards)
}

/// Run a job, wrapping each shard file with `opener`.
///
/// # Errors
/// See [`run`].
pub fn run_with<O: ShardOpener>(job: &Job, cfg: &PipelineConfig, opener: &O) -> Result<RunSummary> {
    let started = Instant::now();
    job.validate().context("configuration")?;
    let ddl = render_ddl(
        &job.schema,
        &job.table,
        job.dialect,
        &job.indexes,
        job.ref_tables,
    )
    .context("schema statements")?;

    let Some(data) = job.data.as_deref() else {
        return write_ddl_only(job, &ddl, started);
    };

    let total_bytes = fs::metadata(data)
        .with_context(|| format!("stat {}", data.display()))?
        .len();
    let row_width = job.schema.row_width() as u64;
    let plan = RunPlan::for_host(
        total_bytes,
        planned_shards(job.layout, total_bytes, cfg),
        cfg,
    );
    let units = plan.partition(row_width, total_bytes).context("planner")?;
    info!(
        table = %job.table,
        dialect = %job.dialect,
        data = %data.display(),
        bytes = total_bytes,
        rows = units.total_rows(),
        units = units.len(),
        "{plan}"
    );

    let mut sink = DumpSink::create(&job.output, job.layout, total_bytes, cfg)
        .context("dump writer setup")?;
    let total_rows = units.total_rows();
    let unit_count = units.len();
    match fill(&mut sink, job, data, &ddl, &plan, units, opener) {
        Ok(shards) => {
            let output = sink.root().to_path_buf();
            let artifacts = sink.finish();
            let summary = RunSummary {
                output,
                elapsed_ms: elapsed_ms(started),
                input_bytes: total_bytes,
                rows: total_rows,
                units: unit_count,
                plan: Some(plan),
                shards,
                artifacts,
            };
            info!(rows = summary.rows, ms = summary.elapsed_ms, "dump complete");
            Ok(summary)
        }
        Err(e) => {
            error!(error = %format!("{e:#}"), "aborting; removing partial output");
            sink.cleanup();
            Err(e)
        }
    }
}

fn write_ddl_only(job: &Job, ddl: &str, started: Instant) -> Result<RunSummary> {
    let mut sink = DumpSink::create_ddl_only(&job.output).context("schema writer")?;
    if let Err(e) = sink.write_ddl(ddl) {
        sink.cleanup();
        return Err(e.context("schema writer"));
    }
    let output = sink.root().to_path_buf();
    info!(path = %output.display(), "wrote schema only");
    Ok(RunSummary {
        output,
        elapsed_ms: elapsed_ms(started),
        artifacts: sink.finish(),
        ..RunSummary::default()
    })
}

/// Schema phase, then the concurrent row phase. The caller cleans up on error.
fn fill<O: ShardOpener>(
    sink: &mut DumpSink,
    job: &Job,
    data: &Path,
    ddl: &str,
    plan: &RunPlan,
    units: WorkUnits,
    opener: &O,
) -> Result<Vec<ShardStats>> {
    sink.write_ddl(ddl).context("schema writer")?;
    let writers = sink.take_writers(opener).context("dump writer")?;
    let encoder = RowEncoder::new(Arc::new(job.schema.clone()), &job.table, job.dialect);
    let parsers = ParserPool::new(data, encoder, plan.parser_count);
    let total_rows = units.total_rows();

    let shards = execute(plan, units, &parsers, writers)?;
    let written: u64 = shards.iter().map(|s| s.rows).sum();
    if written != total_rows {
        bail!("dump writer: wrote {written} of {total_rows} rows");
    }
    Ok(shards)
}

/// Run the producer, parsers, and writers on a dedicated pool and join them.
///
/// # Errors
/// The first error any writer returned.
pub fn execute<W: Write + Send>(
    plan: &RunPlan,
    units: WorkUnits,
    parsers: &ParserPool,
    writers: Vec<ShardWriter<W>>,
) -> Result<Vec<ShardStats>> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(plan.thread_count())
        .thread_name(|i| format!("ipums2db-{i}"))
        .build()
        .context("build worker pool")?;

    let abort = AbortSignal::new();
    let (unit_tx, unit_rx) = bounded::<WorkUnit>(0);
    let (block_tx, block_rx) = bounded::<ResultBlock>(plan.result_channel_capacity);
    let outcomes: Mutex<Vec<Result<ShardStats>>> = Mutex::new(Vec::with_capacity(writers.len()));

    pool.scope(|s| {
        for writer in writers {
            let blocks = block_rx.clone();
            let abort = abort.clone();
            let outcomes = &outcomes;
            s.spawn(move |_| {
                let outcome = writer.drain(&blocks, &abort);
                outcomes
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(outcome);
            });
        }
        parsers.spawn(s, &unit_rx, &block_tx, &abort);
        // Workers hold their own ends; ours must go so hang-ups propagate.
        drop(unit_rx);
        drop(block_rx);
        drop(block_tx);

        for unit in units {
            if abort.is_raised() || unit_tx.send(unit).is_err() {
                break;
            }
        }
        drop(unit_tx);
    });

    let mut shards = Vec::new();
    let mut first_error = None;
    for outcome in outcomes.into_inner().unwrap_or_else(PoisonError::into_inner) {
        match outcome {
            Ok(stats) => shards.push(stats),
            Err(e) if first_error.is_none() => first_error = Some(e),
            Err(_) => {}
        }
    }
    if let Some(e) = first_error {
        return Err(e.context("dump writer"));
    }
    if abort.is_raised() {
        bail!("run aborted");
    }
    shards.sort_by_key(|s| s.index);
    Ok(shards)
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
