//! Parser pool: workers that turn work units into encoded result blocks.
//!
//! Every worker opens its own handle on the data file and reads with positional
//! reads, so there is no shared cursor and no locking; unit byte ranges are disjoint
//! by construction. Each consumed unit yields exactly one [`ResultBlock`].
//!
//! Failures are values, not panics: an open, read, or decode failure travels to the
//! writers inside the block, and the writer that receives it aborts the run.

use crate::encoder::RowEncoder;
use crate::error::BlockError;
use crate::pipeline::AbortSignal;
use crate::planner::WorkUnit;
use crossbeam_channel::{Receiver, Sender};
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[cfg(unix)]
use std::os::unix::fs::FileExt;
#[cfg(windows)]
use std::os::windows::fs::FileExt;

/// Encoded SQL for one work unit, or the reason there is none.
#[derive(Debug)]
pub struct ResultBlock {
    /// The unit this block came from; `None` when the worker never got to one.
    pub unit: Option<WorkUnit>,
    pub payload: Result<Vec<u8>, BlockError>,
}

/// A fixed number of parser workers over one data file.
#[derive(Clone, Debug)]
pub struct ParserPool {
    data_path: PathBuf,
    encoder: RowEncoder,
    workers: usize,
}

impl ParserPool {
    #[must_use]
    pub fn new(data_path: impl Into<PathBuf>, encoder: RowEncoder, workers: usize) -> Self {
        Self {
            data_path: data_path.into(),
            encoder,
            workers: workers.max(1),
        }
    }

    #[must_use]
    pub fn workers(&self) -> usize {
        self.workers
    }

    #[must_use]
    pub fn data_path(&self) -> &Path {
        &self.data_path
    }

    /// Spawn every worker onto `scope`. Each gets its own channel handles, so the
    /// caller's copies can be dropped as soon as this returns.
    pub fn spawn<'scope>(
        &'scope self,
        scope: &rayon::Scope<'scope>,
        units: &Receiver<WorkUnit>,
        results: &Sender<ResultBlock>,
        abort: &AbortSignal,
    ) {
        for id in 0..self.workers {
            let units = units.clone();
            let results = results.clone();
            let abort = abort.clone();
            scope.spawn(move |_| self.run_worker(id, &units, &results, &abort));
        }
    }

    /// Body of one worker: consume units until the stream closes or the run aborts.
    pub fn run_worker(
        &self,
        id: usize,
        units: &Receiver<WorkUnit>,
        results: &Sender<ResultBlock>,
        abort: &AbortSignal,
    ) {
        let file = match File::open(&self.data_path) {
            Ok(f) => f,
            Err(source) => {
                warn!(worker = id, path = %self.data_path.display(), "parser cannot open data file");
                let _ = results.send(ResultBlock {
                    unit: None,
                    payload: Err(BlockError::Open {
                        path: self.data_path.clone(),
                        source,
                    }),
                });
                return;
            }
        };

        let mut buf = Vec::new();
        let mut parsed = 0usize;
        for unit in units.iter() {
            if abort.is_raised() {
                break;
            }
            let payload = self.parse_unit(&file, unit, &mut buf);
            debug!(
                worker = id,
                start_row = unit.start_row,
                rows = unit.row_count,
                ok = payload.is_ok(),
                "parsed unit"
            );
            if results
                .send(ResultBlock {
                    unit: Some(unit),
                    payload,
                })
                .is_err()
            {
                // every writer is gone
                break;
            }
            parsed += 1;
        }
        debug!(worker = id, units = parsed, "parser finished");
    }

    /// Read and encode one unit, reusing `buf` for the raw bytes.
    ///
    /// # Errors
    /// [`BlockError::Read`] or [`BlockError::Decode`].
    pub fn parse_unit(
        &self,
        file: &File,
        unit: WorkUnit,
        buf: &mut Vec<u8>,
    ) -> Result<Vec<u8>, BlockError> {
        let row_width = self.encoder.row_width() as u64;
        buf.resize(unit.byte_len(row_width) as usize, 0);
        let n = read_full_at(file, buf, unit.byte_offset(row_width)).map_err(|source| {
            BlockError::Read {
                path: self.data_path.clone(),
                start_row: unit.start_row,
                end_row: unit.end_row(),
                source,
            }
        })?;
        Ok(self.encoder.encode_rows(&buf[..n], unit.start_row)?)
    }
}

/// Fill `buf` from `offset`, stopping early only at end of file.
///
/// Returns the number of bytes read.
pub fn read_full_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match pread(file, &mut buf[filled..], offset + filled as u64) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

#[cfg(unix)]
fn pread(file: &File, buf: &mut [u8], offset: u64) -> io::Result<usize> {
    file.read_at(buf, offset)
}

#[cfg(windows)]
fn pread(file: &File, buf: &mut [u8], offset: u64) -> io::Result<usize> {
    file.seek_read(buf, offset)
}
