#![allow(dead_code)]

use anyhow::Result;
use ipums2db::{Category, Field, Interval, ScalarKind, Schema};
use std::fs;
use std::path::{Path, PathBuf};

pub fn field(name: &str, kind: ScalarKind, start: usize, end: usize) -> Field {
    Field {
        name: name.to_string(),
        label: format!("{name} label"),
        kind,
        decimals: 0,
        interval: Interval::Continuous,
        start,
        end,
        categories: Vec::new(),
    }
}

pub fn numeric(name: &str, start: usize, end: usize) -> Field {
    field(name, ScalarKind::Numeric, start, end)
}

pub fn character(name: &str, start: usize, end: usize) -> Field {
    field(name, ScalarKind::Character, start, end)
}

pub fn discrete(mut f: Field, categories: &[(&str, &str)]) -> Field {
    f.interval = Interval::Discrete;
    f.categories = categories
        .iter()
        .map(|(value, label)| Category {
            value: (*value).to_string(),
            label: (*label).to_string(),
        })
        .collect();
    f
}

/// AGE in bytes 1-2, SEX in byte 3; four bytes per row with the newline.
pub fn age_sex() -> Schema {
    Schema::new(vec![numeric("AGE", 1, 2), numeric("SEX", 3, 3)])
}

pub fn write_file(dir: &Path, name: &str, contents: &[u8]) -> Result<PathBuf> {
    let path = dir.join(name);
    fs::write(&path, contents)?;
    Ok(path)
}

/// Values of the first column in every insert tuple of `sql`.
pub fn first_column(sql: &str) -> Vec<String> {
    sql.lines()
        .filter_map(|l| l.strip_prefix('('))
        .map(|l| l.split([',', ')']).next().unwrap_or_default().to_string())
        .collect()
}
