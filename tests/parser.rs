mod common;

use anyhow::Result;
use common::{age_sex, write_file};
use crossbeam_channel::bounded;
use ipums2db::parser::read_full_at;
use ipums2db::{AbortSignal, BlockError, Dialect, ParserPool, RowEncoder, WorkUnit};
use std::fs::File;
use std::sync::Arc;
use tempfile::tempdir;

fn pool(path: &std::path::Path, workers: usize) -> ParserPool {
    let encoder = RowEncoder::new(Arc::new(age_sex()), "t", Dialect::Postgres);
    ParserPool::new(path, encoder, workers)
}

#[test]
fn parse_unit_reads_only_its_rows() -> Result<()> {
    let tmp = tempdir()?;
    let dat = write_file(tmp.path(), "x.dat", b"011\n022\n033\n044\n")?;
    let parsers = pool(&dat, 1);
    let file = File::open(&dat)?;
    let mut buf = Vec::new();

    let sql = parsers.parse_unit(&file, WorkUnit { start_row: 1, row_count: 2 }, &mut buf)?;
    assert_eq!(String::from_utf8(sql)?, "INSERT INTO \"t\" VALUES\n(2, 2),\n(3, 3);\n");
    Ok(())
}

#[test]
fn read_full_at_stops_at_end_of_file() -> Result<()> {
    let tmp = tempdir()?;
    let dat = write_file(tmp.path(), "x.dat", b"0123456789")?;
    let file = File::open(&dat)?;
    let mut buf = [0u8; 8];
    assert_eq!(read_full_at(&file, &mut buf, 6)?, 4);
    assert_eq!(&buf[..4], b"6789");
    Ok(())
}

#[test]
fn worker_emits_one_block_per_unit() -> Result<()> {
    let tmp = tempdir()?;
    let dat = write_file(tmp.path(), "x.dat", b"011\n022\n033\n")?;
    let parsers = pool(&dat, 1);
    let (unit_tx, unit_rx) = bounded(3);
    let (block_tx, block_rx) = bounded(3);
    for start_row in 0..3 {
        unit_tx.send(WorkUnit { start_row, row_count: 1 })?;
    }
    drop(unit_tx);

    parsers.run_worker(0, &unit_rx, &block_tx, &AbortSignal::new());
    drop(block_tx);

    let blocks: Vec<_> = block_rx.iter().collect();
    assert_eq!(blocks.len(), 3);
    for (i, block) in blocks.iter().enumerate() {
        assert_eq!(block.unit.map(|u| u.start_row), Some(i as u64));
        assert!(block.payload.is_ok());
    }
    Ok(())
}

#[test]
fn missing_data_file_yields_an_open_error_block() {
    let tmp = tempdir().unwrap();
    let parsers = pool(&tmp.path().join("gone.dat"), 1);
    let (_unit_tx, unit_rx) = bounded::<WorkUnit>(0);
    let (block_tx, block_rx) = bounded(1);

    parsers.run_worker(0, &unit_rx, &block_tx, &AbortSignal::new());
    let block = block_rx.try_recv().unwrap();
    assert!(block.unit.is_none());
    assert!(matches!(block.payload, Err(BlockError::Open { .. })));
}

#[test]
fn raised_abort_stops_the_worker() -> Result<()> {
    let tmp = tempdir()?;
    let dat = write_file(tmp.path(), "x.dat", b"011\n")?;
    let parsers = pool(&dat, 1);
    let (unit_tx, unit_rx) = bounded(1);
    let (block_tx, block_rx) = bounded(1);
    unit_tx.send(WorkUnit { start_row: 0, row_count: 1 })?;
    drop(unit_tx);

    let abort = AbortSignal::new();
    abort.raise();
    parsers.run_worker(0, &unit_rx, &block_tx, &abort);
    assert!(block_rx.try_recv().is_err());
    Ok(())
}
