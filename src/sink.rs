//! Dump sink: output files, the schema-writing phase, and the shard writers.
//!
//! Layouts:
//! - **single file** -- `<output>.sql` holds the DDL followed by every insert block
//! - **directory** -- `<output>/ddl.sql` plus `<output>/inserts_{i}.sql` shards
//!
//! The sink remembers everything it created. [`DumpSink::cleanup`] removes all of it,
//! so a failed run leaves nothing behind; it never touches anything it did not create
//! (output paths must not already exist).

use crate::config::{OutputLayout, PipelineConfig};
use crate::parser::ResultBlock;
use crate::pipeline::AbortSignal;
use anyhow::{Context, Result, anyhow, bail};
use crossbeam_channel::Receiver;
use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Name of the schema file in the directory layout.
pub const SCHEMA_FILE_NAME: &str = "ddl.sql";

const SHARD_BUFFER_BYTES: usize = 1 << 20;

/// Shards needed so none receives more than `max_bytes_per_shard` of input.
#[must_use]
pub fn shard_count(total_bytes: u64, max_bytes_per_shard: u64) -> usize {
    total_bytes.div_ceil(max_bytes_per_shard.max(1)).max(1) as usize
}

/// Shard files a run will write under `layout`.
///
/// [`OutputLayout::Auto`] uses the directory layout only when more than one shard is
/// needed; the single-file layout always has exactly one shard.
#[must_use]
pub fn planned_shards(layout: OutputLayout, total_bytes: u64, cfg: &PipelineConfig) -> usize {
    match layout {
        OutputLayout::SingleFile => 1,
        OutputLayout::Directory | OutputLayout::Auto => {
            shard_count(total_bytes, cfg.max_bytes_per_shard)
        }
    }
}

/// Opens the byte sink that a shard writer appends to.
///
/// The pipeline uses [`BufferedShards`]; other implementations can wrap the file to
/// add compression, accounting, or fault injection.
pub trait ShardOpener: Sync {
    type Writer: Write + Send;

    /// Wrap shard `index`'s freshly created file.
    ///
    /// # Errors
    /// Any I/O error; the run is aborted and cleaned up.
    fn open(&self, index: usize, file: File) -> io::Result<Self::Writer>;
}

/// Plain buffered files.
#[derive(Clone, Copy, Debug, Default)]
pub struct BufferedShards;

impl ShardOpener for BufferedShards {
    type Writer = BufWriter<File>;

    fn open(&self, _index: usize, file: File) -> io::Result<Self::Writer> {
        Ok(BufWriter::with_capacity(SHARD_BUFFER_BYTES, file))
    }
}

/// What one shard writer committed.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ShardStats {
    pub index: usize,
    pub path: PathBuf,
    pub blocks: usize,
    pub rows: u64,
    pub bytes: u64,
}

/// The set of output artifacts for one run.
#[derive(Debug)]
pub struct DumpSink {
    layout: OutputLayout,
    dir: Option<PathBuf>,
    schema_path: PathBuf,
    /// Separate schema file (directory layout, DDL-only runs); closed after the DDL.
    schema_file: Option<File>,
    shards: Vec<(PathBuf, Option<File>)>,
    /// Every file created, in creation order.
    created: Vec<PathBuf>,
}

impl DumpSink {
    /// Create the output artifacts for `total_bytes` of input, as [`planned_shards`]
    /// describes.
    ///
    /// # Errors
    /// Fails if any path already exists or cannot be created; whatever was created
    /// before the failure is removed.
    pub fn create(
        output: &Path,
        layout: OutputLayout,
        total_bytes: u64,
        cfg: &PipelineConfig,
    ) -> Result<Self> {
        let shards = planned_shards(layout, total_bytes, cfg);
        let use_dir = match layout {
            OutputLayout::Directory => true,
            OutputLayout::SingleFile => false,
            OutputLayout::Auto => shards > 1,
        };
        if use_dir {
            Self::create_dir(&without_sql_suffix(output), shards)
        } else {
            Self::create_single(&with_sql_suffix(output))
        }
    }

    /// A sink holding only a schema file, for runs without a data file.
    ///
    /// # Errors
    /// Fails if the file exists or cannot be created.
    pub fn create_ddl_only(output: &Path) -> Result<Self> {
        let path = with_sql_suffix(output);
        let file = create_new(&path)?;
        Ok(Self {
            layout: OutputLayout::SingleFile,
            dir: None,
            schema_path: path.clone(),
            schema_file: Some(file),
            shards: Vec::new(),
            created: vec![path],
        })
    }

    fn create_single(path: &Path) -> Result<Self> {
        let file = create_new(path)?;
        Ok(Self {
            layout: OutputLayout::SingleFile,
            dir: None,
            schema_path: path.to_path_buf(),
            schema_file: None,
            shards: vec![(path.to_path_buf(), Some(file))],
            created: vec![path.to_path_buf()],
        })
    }

    fn create_dir(dir: &Path, shards: usize) -> Result<Self> {
        fs::create_dir(dir).with_context(|| format!("create directory {}", dir.display()))?;
        let mut sink = Self {
            layout: OutputLayout::Directory,
            dir: Some(dir.to_path_buf()),
            schema_path: dir.join(SCHEMA_FILE_NAME),
            schema_file: None,
            shards: Vec::with_capacity(shards),
            created: Vec::with_capacity(shards + 1),
        };
        match sink.create_dir_files(shards) {
            Ok(()) => Ok(sink),
            Err(e) => {
                sink.cleanup();
                Err(e)
            }
        }
    }

    fn create_dir_files(&mut self, shards: usize) -> Result<()> {
        let schema = create_new(&self.schema_path)?;
        self.created.push(self.schema_path.clone());
        self.schema_file = Some(schema);
        let Some(dir) = self.dir.clone() else {
            bail!("directory layout without a directory");
        };
        for i in 0..shards {
            let path = dir.join(format!("inserts_{i}.sql"));
            let file = create_new(&path)?;
            self.created.push(path.clone());
            self.shards.push((path, Some(file)));
        }
        Ok(())
    }

    /// The layout actually chosen.
    #[must_use]
    pub fn layout(&self) -> OutputLayout {
        self.layout
    }

    #[must_use]
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    #[must_use]
    pub fn schema_path(&self) -> &Path {
        &self.schema_path
    }

    /// Every file this sink created.
    #[must_use]
    pub fn created(&self) -> &[PathBuf] {
        &self.created
    }

    /// Where the run's output lives: the directory, or the single file.
    #[must_use]
    pub fn root(&self) -> &Path {
        self.dir.as_deref().unwrap_or(&self.schema_path)
    }

    /// Write the schema statements. Must complete before any shard writer starts.
    ///
    /// In the directory layout the schema file is closed afterwards; in the
    /// single-file layout the inserts follow in the same file.
    ///
    /// # Errors
    /// Any write failure. The caller is expected to [`cleanup`](Self::cleanup).
    pub fn write_ddl(&mut self, ddl: &str) -> Result<()> {
        let path = self.schema_path.clone();
        let file = match (&mut self.schema_file, self.shards.first_mut()) {
            (Some(f), _) => f,
            (None, Some((_, Some(f)))) => f,
            _ => bail!("no open file for the schema statements"),
        };
        file.write_all(ddl.as_bytes())
            .and_then(|()| file.flush())
            .with_context(|| format!("write DDL to {}", path.display()))?;
        self.schema_file = None;
        debug!(path = %path.display(), bytes = ddl.len(), "wrote DDL");
        Ok(())
    }

    /// Hand out one writer per shard, each owning its file.
    ///
    /// # Errors
    /// If writers were already taken or `opener` fails.
    pub fn take_writers<O: ShardOpener>(
        &mut self,
        opener: &O,
    ) -> Result<Vec<ShardWriter<O::Writer>>> {
        let mut writers = Vec::with_capacity(self.shards.len());
        for (index, (path, file)) in self.shards.iter_mut().enumerate() {
            let file = file
                .take()
                .ok_or_else(|| anyhow!("writer for {} already taken", path.display()))?;
            let out = opener
                .open(index, file)
                .with_context(|| format!("open shard {}", path.display()))?;
            writers.push(ShardWriter {
                index,
                path: path.clone(),
                out,
            });
        }
        Ok(writers)
    }

    /// Remove every file and the directory this sink created.
    ///
    /// Call only once all writers have returned.
    pub fn cleanup(mut self) {
        self.schema_file = None;
        self.shards.clear();
        for path in self.created.iter().rev() {
            if let Err(e) = fs::remove_file(path)
                && e.kind() != io::ErrorKind::NotFound
            {
                warn!(path = %path.display(), error = %e, "could not remove output file");
            }
        }
        if let Some(dir) = &self.dir
            && let Err(e) = fs::remove_dir(dir)
            && e.kind() != io::ErrorKind::NotFound
        {
            warn!(path = %dir.display(), error = %e, "could not remove output directory");
        }
        debug!(files = self.created.len(), "removed partial output");
    }

    /// Close everything and return the artifact paths.
    #[must_use]
    pub fn finish(self) -> Vec<PathBuf> {
        self.created
    }
}

/// Appends result blocks to one shard.
#[derive(Debug)]
pub struct ShardWriter<W> {
    index: usize,
    path: PathBuf,
    out: W,
}

impl<W: Write> ShardWriter<W> {
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append payloads from `blocks` until the stream closes.
    ///
    /// Stops early, without error, once another writer has raised `abort`. An error
    /// block or a failed write raises `abort` and is returned.
    ///
    /// # Errors
    /// The block's error, or the I/O error, with the shard and rows as context.
    pub fn drain(mut self, blocks: &Receiver<ResultBlock>, abort: &AbortSignal) -> Result<ShardStats> {
        let mut stats = ShardStats {
            index: self.index,
            path: self.path.clone(),
            ..ShardStats::default()
        };
        for block in blocks.iter() {
            if abort.is_raised() {
                return Ok(stats);
            }
            let rows = block.unit.map_or_else(
                || "before any rows".to_string(),
                |u| format!("rows {}..{}", u.start_row, u.end_row()),
            );
            let payload = match block.payload {
                Ok(p) => p,
                Err(e) => {
                    abort.raise();
                    return Err(anyhow::Error::new(e).context(format!("parse {rows}")));
                }
            };
            if let Err(e) = self.out.write_all(&payload) {
                abort.raise();
                return Err(anyhow::Error::new(e)
                    .context(format!("write {rows} to {}", self.path.display())));
            }
            stats.blocks += 1;
            stats.rows += block.unit.map_or(0, |u| u.row_count);
            stats.bytes += payload.len() as u64;
        }
        if let Err(e) = self.out.flush() {
            abort.raise();
            return Err(anyhow::Error::new(e).context(format!("flush {}", self.path.display())));
        }
        debug!(shard = self.index, blocks = stats.blocks, bytes = stats.bytes, "shard complete");
        Ok(stats)
    }
}

fn create_new(path: &Path) -> Result<File> {
    OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .with_context(|| format!("create {}", path.display()))
}

fn with_sql_suffix(output: &Path) -> PathBuf {
    if output.extension().is_some_and(|e| e == "sql") {
        output.to_path_buf()
    } else {
        let mut s = output.as_os_str().to_owned();
        s.push(".sql");
        PathBuf::from(s)
    }
}

fn without_sql_suffix(output: &Path) -> PathBuf {
    if output.extension().is_some_and(|e| e == "sql") {
        output.with_extension("")
    } else {
        output.to_path_buf()
    }
}
