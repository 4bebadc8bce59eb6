//! Schema statements: the main table, lookup tables for coded fields, and indexes.
//!
//! Everything here is rendered to a `String` before any output file exists, so a bad
//! interval tag or index name never leaves an artifact behind.

use crate::config::RefTables;
use crate::dialect::{Dialect, SqlType};
use crate::encoder::encode_value;
use crate::error::DdlError;
use crate::schema::{Field, Interval, ScalarKind, Schema};
use std::collections::HashSet;
use std::fmt::Write as _;

/// The abstract column type of a field.
#[must_use]
pub fn sql_type(field: &Field) -> SqlType {
    let width = field.width();
    if field.decimals > 0 {
        return SqlType::Decimal {
            precision: width.max(field.decimals),
            scale: field.decimals,
        };
    }
    match field.kind {
        ScalarKind::Character => SqlType::Text { width },
        ScalarKind::Numeric => SqlType::Integer { digits: width },
    }
}

/// Render every schema statement for a run, in load order.
///
/// # Errors
/// Any [`DdlError`] from the three parts.
pub fn render_ddl(
    schema: &Schema,
    table: &str,
    dialect: Dialect,
    indexes: &[String],
    ref_tables: RefTables,
) -> Result<String, DdlError> {
    let mut out = create_table(schema, table, dialect)?;
    out.push_str(&create_ref_tables(schema, dialect, ref_tables)?);
    out.push_str(&create_indexes(schema, table, dialect, indexes)?);
    Ok(out)
}

/// `CREATE TABLE` with one column per field, each annotated with its label.
///
/// # Errors
/// [`DdlError::UnrecognizedInterval`] if any field has an unknown interval tag.
pub fn create_table(schema: &Schema, table: &str, dialect: Dialect) -> Result<String, DdlError> {
    let mut out = String::new();
    let _ = writeln!(out, "CREATE TABLE {} (", dialect.quote_ident(table));
    let last = schema.fields.len().saturating_sub(1);
    for (i, field) in schema.fields.iter().enumerate() {
        if let Interval::Unrecognized(tag) = &field.interval {
            return Err(DdlError::UnrecognizedInterval {
                field: field.name.clone(),
                tag: tag.clone(),
            });
        }
        let sep = if i == last { "" } else { "," };
        let _ = writeln!(
            out,
            "    {} {}{sep} -- {}",
            dialect.quote_ident(&field.name),
            dialect.type_name(sql_type(field)),
            flatten(&field.label)
        );
    }
    out.push_str(");\n\n");
    Ok(out)
}

/// A `ref_<field>` table of `(val, label)` plus its seed insert, per discrete field.
///
/// # Errors
/// [`DdlError::NoDiscreteFields`] when `mode` is [`RefTables::Required`] and the schema
/// has no discrete fields.
pub fn create_ref_tables(
    schema: &Schema,
    dialect: Dialect,
    mode: RefTables,
) -> Result<String, DdlError> {
    if mode == RefTables::Off {
        return Ok(String::new());
    }
    let discrete: Vec<&Field> = schema.discrete_fields().collect();
    if discrete.is_empty() {
        return match mode {
            RefTables::Required => Err(DdlError::NoDiscreteFields),
            _ => Ok(String::new()),
        };
    }

    let mut out = String::new();
    for field in discrete {
        let ref_table = dialect.quote_ident(&format!("ref_{}", field.name));
        let label_width = field
            .categories
            .iter()
            .map(|c| c.label.len())
            .max()
            .unwrap_or(0)
            .max(1);
        let _ = writeln!(out, "CREATE TABLE {ref_table} (");
        let _ = writeln!(
            out,
            "    {} {},",
            dialect.quote_ident("val"),
            dialect.type_name(sql_type(field))
        );
        let _ = writeln!(
            out,
            "    {} {}",
            dialect.quote_ident("label"),
            dialect.type_name(SqlType::Text { width: label_width })
        );
        out.push_str(");\n");

        if !field.categories.is_empty() {
            let _ = writeln!(out, "INSERT INTO {ref_table} VALUES");
            let tuples: Vec<String> = field
                .categories
                .iter()
                .map(|c| {
                    format!(
                        "({}, {})",
                        category_literal(field, &c.value),
                        quote_text(&c.label)
                    )
                })
                .collect();
            out.push_str(&tuples.join(",\n"));
            out.push_str(";\n");
        }
        out.push('\n');
    }
    Ok(out)
}

/// One single-column `CREATE INDEX` per requested field, skipping repeats.
///
/// # Errors
/// [`DdlError::UnknownIndexColumn`] for a name not in the schema (case-insensitive).
pub fn create_indexes(
    schema: &Schema,
    table: &str,
    dialect: Dialect,
    names: &[String],
) -> Result<String, DdlError> {
    let mut seen = HashSet::new();
    let mut out = String::new();
    for name in names {
        let field = schema
            .field(name)
            .ok_or_else(|| DdlError::UnknownIndexColumn(name.clone()))?;
        if !seen.insert(field.name.as_str()) {
            continue;
        }
        let _ = writeln!(
            out,
            "CREATE INDEX {} ON {} ({});",
            dialect.quote_ident(&format!("idx_{table}_{}", field.name)),
            dialect.quote_ident(table),
            dialect.quote_ident(&field.name)
        );
    }
    if !out.is_empty() {
        out.push('\n');
    }
    Ok(out)
}

/// A single-quoted string literal with embedded quotes doubled.
#[must_use]
pub fn quote_text(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

/// A category's coded value, rendered the way the encoder renders the column.
fn category_literal(field: &Field, value: &str) -> String {
    let value = value.trim();
    if field.kind == ScalarKind::Numeric && value.contains('.') {
        return value.to_string();
    }
    let mut out = Vec::with_capacity(value.len() + 2);
    encode_value(field, value.as_bytes(), &mut out);
    String::from_utf8_lossy(&out).into_owned()
}

/// Labels go into `--` comments, which end at a newline.
fn flatten(label: &str) -> String {
    label.split_whitespace().collect::<Vec<_>>().join(" ")
}
