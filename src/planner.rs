//! Job planning: how many workers, how big a work unit, and which rows go where.
//!
//! The planner runs once, before any output exists:
//!
//! 1. **Parser count** -- leave room for the writers on the host's cores, bounded by
//!    [`PipelineConfig::min_parsers`] and [`PipelineConfig::max_parsers`].
//! 2. **Unit size** -- split [`PipelineConfig::max_in_flight_bytes`] evenly over every
//!    parser and writer, since each may hold one unit's worth of input at a time.
//! 3. **Partition** -- cut `[0, total_rows)` into contiguous, disjoint [`WorkUnit`]s of
//!    at most that many bytes, in increasing row order.
//!
//! Sizing is validated up front; a [`PlanError`] means nothing was read or written.

use crate::config::PipelineConfig;
use crate::error::PlanError;
use serde::Serialize;
use std::fmt::{Display, Formatter, Result as FormatResult};

/// A contiguous range of rows handed to exactly one parser.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct WorkUnit {
    pub start_row: u64,
    pub row_count: u64,
}

impl WorkUnit {
    /// One past the last row of the unit.
    #[must_use]
    pub fn end_row(&self) -> u64 {
        self.start_row + self.row_count
    }

    /// File offset of the unit's first byte.
    #[must_use]
    pub fn byte_offset(&self, row_width: u64) -> u64 {
        self.start_row * row_width
    }

    /// Bytes covered by the unit.
    #[must_use]
    pub fn byte_len(&self, row_width: u64) -> u64 {
        self.row_count * row_width
    }
}

/// Worker counts and unit sizing for one run. Immutable once built.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct RunPlan {
    pub parser_count: usize,
    pub writer_count: usize,
    /// Largest raw input, in bytes, that one unit may cover.
    pub max_bytes_per_unit: u64,
    /// Bound on finished blocks waiting for a writer.
    pub result_channel_capacity: usize,
}

impl RunPlan {
    /// Plan a run over `total_bytes` of input.
    ///
    /// `cpus` is the host's available parallelism, if known. The unit size is capped
    /// at the file size so a small file plans to a single unit.
    #[must_use]
    pub fn new(
        total_bytes: u64,
        writer_count: usize,
        cfg: &PipelineConfig,
        cpus: Option<usize>,
    ) -> Self {
        let writer_count = writer_count.max(1);
        let parser_count = parser_count(cpus, writer_count, cfg);
        let workers = (parser_count + writer_count) as u64;
        let max_bytes_per_unit = (cfg.max_in_flight_bytes / workers).min(total_bytes);
        Self {
            parser_count,
            writer_count,
            max_bytes_per_unit,
            result_channel_capacity: parser_count,
        }
    }

    /// [`RunPlan::new`] with the parallelism of the current host.
    #[must_use]
    pub fn for_host(total_bytes: u64, writer_count: usize, cfg: &PipelineConfig) -> Self {
        Self::new(total_bytes, writer_count, cfg, Some(num_cpus::get()))
    }

    /// Threads needed to run every task at once, plus one for the unit producer.
    #[must_use]
    pub fn thread_count(&self) -> usize {
        self.parser_count + self.writer_count + 1
    }

    /// Partition a file with this plan's unit size.
    ///
    /// # Errors
    /// See [`partition`].
    pub fn partition(&self, row_width: u64, total_bytes: u64) -> Result<WorkUnits, PlanError> {
        partition(row_width, total_bytes, self.max_bytes_per_unit)
    }
}

impl Display for RunPlan {
    fn fmt(&self, f: &mut Formatter<'_>) -> FormatResult {
        write!(
            f,
            "{} parsers, {} writers, {} bytes per unit, {} result slots",
            self.parser_count, self.writer_count, self.max_bytes_per_unit, self.result_channel_capacity
        )
    }
}

/// Parsers to spawn given `cpus` cores and `writer_count` writers.
///
/// Writes are the bottleneck, so parsers get what is left after the writers and the
/// producer, clamped to the configured bounds. Unknown or single-core hosts get the
/// minimum.
#[must_use]
pub fn parser_count(cpus: Option<usize>, writer_count: usize, cfg: &PipelineConfig) -> usize {
    let min = cfg.min_parsers.max(1);
    let max = cfg.max_parsers.max(min);
    match cpus {
        Some(n) if n > 1 => n.saturating_sub(writer_count + 1).clamp(min, max),
        _ => min,
    }
}

/// Cut the file's rows into units of at most `max_bytes_per_unit` bytes.
///
/// A trailing record one byte short of `row_width` still counts as a row; any other
/// partial trailing record is ignored.
///
/// # Errors
/// A [`PlanError`] if the row width is zero or larger than the file, or if the unit
/// size is smaller than one row or larger than the file.
pub fn partition(
    row_width: u64,
    total_bytes: u64,
    max_bytes_per_unit: u64,
) -> Result<WorkUnits, PlanError> {
    if row_width == 0 {
        return Err(PlanError::ZeroRowWidth);
    }
    if row_width > total_bytes {
        return Err(PlanError::RowLargerThanFile {
            row: row_width,
            total: total_bytes,
        });
    }
    if max_bytes_per_unit < row_width {
        return Err(PlanError::UnitSmallerThanRow {
            unit: max_bytes_per_unit,
            row: row_width,
        });
    }
    if max_bytes_per_unit > total_bytes {
        return Err(PlanError::UnitLargerThanFile {
            unit: max_bytes_per_unit,
            total: total_bytes,
        });
    }
    // the final record may be missing its line terminator
    let total_rows = if row_width > 1 {
        (total_bytes + 1) / row_width
    } else {
        total_bytes
    };
    Ok(WorkUnits {
        next_row: 0,
        total_rows,
        rows_per_unit: max_bytes_per_unit / row_width,
    })
}

/// Lazily yields the units of a partition, in increasing row order.
#[derive(Clone, Debug)]
pub struct WorkUnits {
    next_row: u64,
    total_rows: u64,
    rows_per_unit: u64,
}

impl WorkUnits {
    #[must_use]
    pub fn total_rows(&self) -> u64 {
        self.total_rows
    }

    #[must_use]
    pub fn rows_per_unit(&self) -> u64 {
        self.rows_per_unit
    }
}

impl Iterator for WorkUnits {
    type Item = WorkUnit;

    fn next(&mut self) -> Option<WorkUnit> {
        let remaining = self.total_rows - self.next_row;
        if remaining == 0 {
            return None;
        }
        let unit = WorkUnit {
            start_row: self.next_row,
            row_count: self.rows_per_unit.min(remaining),
        };
        self.next_row = unit.end_row();
        Some(unit)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = (self.total_rows - self.next_row).div_ceil(self.rows_per_unit) as usize;
        (n, Some(n))
    }
}

impl ExactSizeIterator for WorkUnits {}
