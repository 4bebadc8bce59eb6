mod common;

use anyhow::Result;
use common::{age_sex, discrete, first_column, numeric, write_file};
use ipums2db::{
    Job, OutputLayout, PipelineConfig, RefTables, Schema, ShardOpener, render_ddl, run, run_with,
};
use std::fs::{self, File};
use std::io::{self, Write};
use tempfile::tempdir;

/// Accepts the file, then fails every write.
struct FullDisk;

struct FullDiskWriter;

impl Write for FullDiskWriter {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(io::Error::other("no space left on device"))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl ShardOpener for FullDisk {
    type Writer = FullDiskWriter;

    fn open(&self, _index: usize, _file: File) -> io::Result<FullDiskWriter> {
        Ok(FullDiskWriter)
    }
}

/// Four-digit ID per row, five bytes per row with the newline.
fn ids(n: usize) -> Vec<u8> {
    (1..=n).flat_map(|i| format!("{i:04}\n").into_bytes()).collect()
}

#[test]
fn age_sex_end_to_end() -> Result<()> {
    let tmp = tempdir()?;
    let dat = write_file(tmp.path(), "extract.dat", b"019\n01 \n")?;
    let job = Job::new(age_sex(), Some(dat), tmp.path().join("dump"));

    let summary = run(&job, &PipelineConfig::default())?;

    let out = tmp.path().join("dump.sql");
    assert_eq!(summary.output, out);
    assert_eq!(summary.rows, 2);
    assert_eq!(summary.input_bytes, 8);
    assert_eq!(summary.units, 1);

    let ddl = render_ddl(&job.schema, &job.table, job.dialect, &job.indexes, job.ref_tables)?;
    let expected = format!("{ddl}INSERT INTO \"ipums_tab\" VALUES\n(1, 9),\n(1, null);\n");
    assert_eq!(fs::read_to_string(&out)?, expected);
    assert!(summary.to_string().contains("Dump written to:"));
    Ok(())
}

#[test]
fn missing_final_newline_keeps_the_last_row() -> Result<()> {
    let tmp = tempdir()?;
    let dat = write_file(tmp.path(), "extract.dat", b"019\n01 ")?;
    let job = Job::new(age_sex(), Some(dat), tmp.path().join("dump"));

    let summary = run(&job, &PipelineConfig::default())?;
    assert_eq!(summary.rows, 2);
    let sql = fs::read_to_string(tmp.path().join("dump.sql"))?;
    assert!(sql.contains("(1, 9)"));
    assert!(sql.contains("(1, null)"));
    Ok(())
}

#[test]
fn sharded_directory_holds_every_row_once() -> Result<()> {
    let tmp = tempdir()?;
    let dat = write_file(tmp.path(), "ids.dat", &ids(5))?;
    let mut job = Job::new(
        Schema::new(vec![numeric("ID", 1, 4)]),
        Some(dat),
        tmp.path().join("dump.sql"),
    );
    job.layout = OutputLayout::Directory;
    let cfg = PipelineConfig {
        max_in_flight_bytes: 50,
        max_bytes_per_shard: 10,
        ..PipelineConfig::default()
    };

    let summary = run(&job, &cfg)?;

    let dir = tmp.path().join("dump");
    assert_eq!(summary.output, dir);
    assert_eq!(summary.shards.len(), 3);
    assert_eq!(summary.artifacts.len(), 4);
    assert!(summary.units > 1);
    let ddl = fs::read_to_string(dir.join("ddl.sql"))?;
    assert!(ddl.starts_with("CREATE TABLE \"ipums_tab\""));

    let mut seen = Vec::new();
    for i in 0..3 {
        let sql = fs::read_to_string(dir.join(format!("inserts_{i}.sql")))?;
        assert!(!sql.contains("CREATE TABLE"));
        seen.extend(first_column(&sql));
    }
    seen.sort_by_key(|v| v.parse::<u32>().unwrap_or(u32::MAX));
    assert_eq!(seen, vec!["1", "2", "3", "4", "5"]);
    assert_eq!(summary.shards.iter().map(|s| s.rows).sum::<u64>(), 5);
    Ok(())
}

#[test]
fn many_units_keep_every_row() -> Result<()> {
    let tmp = tempdir()?;
    let dat = write_file(tmp.path(), "ids.dat", &ids(2000))?;
    let job = Job::new(
        Schema::new(vec![numeric("ID", 1, 4)]),
        Some(dat),
        tmp.path().join("big"),
    );
    let cfg = PipelineConfig {
        max_in_flight_bytes: 700,
        ..PipelineConfig::default()
    };

    let summary = run(&job, &cfg)?;
    assert_eq!(summary.rows, 2000);

    let sql = fs::read_to_string(tmp.path().join("big.sql"))?;
    let mut values: Vec<u32> = first_column(&sql)
        .iter()
        .map(|v| v.parse::<u32>())
        .collect::<Result<_, _>>()?;
    values.sort_unstable();
    assert_eq!(values, (1..=2000).collect::<Vec<u32>>());
    assert_eq!(sql.matches("INSERT INTO").count(), summary.units);
    Ok(())
}

#[test]
fn write_failure_removes_all_output() -> Result<()> {
    let tmp = tempdir()?;
    let dat = write_file(tmp.path(), "ids.dat", &ids(5))?;
    let mut job = Job::new(
        Schema::new(vec![numeric("ID", 1, 4)]),
        Some(dat),
        tmp.path().join("dump"),
    );
    job.layout = OutputLayout::Directory;
    let cfg = PipelineConfig {
        max_bytes_per_shard: 10,
        ..PipelineConfig::default()
    };

    let err = run_with(&job, &cfg, &FullDisk).unwrap_err();
    assert!(format!("{err:#}").contains("no space left on device"));
    assert!(!tmp.path().join("dump").exists());
    Ok(())
}

#[test]
fn unknown_index_fails_before_any_output() -> Result<()> {
    let tmp = tempdir()?;
    let dat = write_file(tmp.path(), "extract.dat", b"019\n")?;
    let mut job = Job::new(age_sex(), Some(dat), tmp.path().join("dump"));
    job.indexes = vec!["INCOME".to_string()];

    let err = run(&job, &PipelineConfig::default()).unwrap_err();
    assert!(format!("{err:#}").contains("INCOME"));
    assert!(!tmp.path().join("dump.sql").exists());
    assert!(!tmp.path().join("dump").exists());
    Ok(())
}

#[test]
fn required_ref_tables_without_discrete_fields_fail() -> Result<()> {
    let tmp = tempdir()?;
    let dat = write_file(tmp.path(), "extract.dat", b"019\n")?;
    let mut job = Job::new(age_sex(), Some(dat), tmp.path().join("dump"));
    job.ref_tables = RefTables::Required;

    assert!(run(&job, &PipelineConfig::default()).is_err());
    assert!(!tmp.path().join("dump.sql").exists());
    Ok(())
}

#[test]
fn row_wider_than_file_fails_before_any_output() -> Result<()> {
    let tmp = tempdir()?;
    let dat = write_file(tmp.path(), "extract.dat", b"01")?;
    let job = Job::new(age_sex(), Some(dat), tmp.path().join("dump"));

    let err = run(&job, &PipelineConfig::default()).unwrap_err();
    assert!(format!("{err:#}").contains("planner"));
    assert!(!tmp.path().join("dump.sql").exists());
    Ok(())
}

#[test]
fn empty_table_name_is_a_configuration_error() -> Result<()> {
    let tmp = tempdir()?;
    let mut job = Job::new(age_sex(), None, tmp.path().join("dump"));
    job.table = "  ".to_string();
    let err = run(&job, &PipelineConfig::default()).unwrap_err();
    assert!(format!("{err:#}").contains("configuration"));
    Ok(())
}

#[test]
fn existing_output_survives_a_refused_run() -> Result<()> {
    let tmp = tempdir()?;
    let dat = write_file(tmp.path(), "extract.dat", b"019\n")?;
    let out = write_file(tmp.path(), "dump.sql", b"previous dump")?;
    let job = Job::new(age_sex(), Some(dat), &out);

    assert!(run(&job, &PipelineConfig::default()).is_err());
    assert_eq!(fs::read_to_string(out)?, "previous dump");
    Ok(())
}

#[test]
fn schema_only_without_data_file() -> Result<()> {
    let tmp = tempdir()?;
    let sex = discrete(numeric("SEX", 3, 3), &[("1", "Male"), ("2", "Female")]);
    let mut job = Job::new(
        Schema::new(vec![numeric("AGE", 1, 2), sex]),
        None,
        tmp.path().join("schema"),
    );
    job.indexes = vec!["sex".to_string()];

    let summary = run(&job, &PipelineConfig::default())?;
    assert!(summary.plan.is_none());
    assert_eq!(summary.rows, 0);

    let sql = fs::read_to_string(tmp.path().join("schema.sql"))?;
    let ddl = render_ddl(&job.schema, &job.table, job.dialect, &job.indexes, job.ref_tables)?;
    assert_eq!(sql, ddl);
    assert!(sql.contains("CREATE TABLE \"ref_SEX\""));
    assert!(sql.contains("CREATE INDEX \"idx_ipums_tab_SEX\""));
    assert!(!sql.contains("INSERT INTO \"ipums_tab\""));
    Ok(())
}

#[test]
fn summary_saves_as_json() -> Result<()> {
    let tmp = tempdir()?;
    let dat = write_file(tmp.path(), "extract.dat", b"019\n01 \n")?;
    let job = Job::new(age_sex(), Some(dat), tmp.path().join("dump"));
    let summary = run(&job, &PipelineConfig::default())?;

    let path = tmp.path().join("summary.json");
    summary.save_to_file(&path)?;
    let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(path)?)?;
    assert_eq!(json["rows"], 2);
    assert_eq!(json["plan"]["writer_count"], 1);
    assert_eq!(json["shards"][0]["rows"], 2);
    Ok(())
}
