//! Fixed-width rows to SQL insert statements.
//!
//! A block of rows becomes one multi-row statement:
//!
//! ```text
//! INSERT INTO "tab" VALUES
//! (1, 9),
//! (1, null);
//! ```
//!
//! Value rules, applied to each field's byte slice in order:
//! 1. any space byte → `null` (blank-as-null, regardless of type)
//! 2. implied decimals `d > 0` → a `.` inserted `d` characters from the right
//! 3. character fields → single-quoted, with embedded quotes doubled
//! 4. integers → leading zeros stripped, `0` if nothing is left
//!
//! Every block is self-contained, so blocks can land in any shard in any order.

use crate::dialect::Dialect;
use crate::error::DecodeError;
use crate::schema::{Field, ScalarKind, Schema};
use std::sync::Arc;

/// Encodes blocks of rows for one table.
///
/// Cheap to clone; every parser worker holds its own.
#[derive(Clone, Debug)]
pub struct RowEncoder {
    schema: Arc<Schema>,
    statement_prefix: Vec<u8>,
    row_width: usize,
}

impl RowEncoder {
    #[must_use]
    pub fn new(schema: Arc<Schema>, table: &str, dialect: Dialect) -> Self {
        let statement_prefix =
            format!("INSERT INTO {} VALUES\n", dialect.quote_ident(table)).into_bytes();
        let row_width = schema.row_width();
        Self {
            schema,
            statement_prefix,
            row_width,
        }
    }

    #[must_use]
    pub fn row_width(&self) -> usize {
        self.row_width
    }

    /// Encode consecutive rows into one insert statement.
    ///
    /// `raw` is split every `row_width` bytes; a shorter final chunk is decoded as a
    /// row of its own length. `first_row` only numbers rows in error messages.
    /// Empty input produces an empty payload.
    ///
    /// # Errors
    /// [`DecodeError::SpanOutOfRow`] for the first row too short for some field.
    pub fn encode_rows(&self, raw: &[u8], first_row: u64) -> Result<Vec<u8>, DecodeError> {
        if raw.is_empty() {
            return Ok(Vec::new());
        }
        let mut out = Vec::with_capacity(self.statement_prefix.len() + raw.len() * 2);
        out.extend_from_slice(&self.statement_prefix);
        for (i, row) in raw.chunks(self.row_width).enumerate() {
            if i > 0 {
                out.extend_from_slice(b",\n");
            }
            encode_row(&self.schema, row, first_row + i as u64, &mut out)?;
        }
        out.extend_from_slice(b";\n");
        Ok(out)
    }
}

/// Encode `raw` as one statement with a throwaway [`RowEncoder`].
///
/// # Errors
/// See [`RowEncoder::encode_rows`].
pub fn encode_rows(
    schema: &Schema,
    table: &str,
    dialect: Dialect,
    raw: &[u8],
) -> Result<Vec<u8>, DecodeError> {
    RowEncoder::new(Arc::new(schema.clone()), table, dialect).encode_rows(raw, 0)
}

/// Append one `(v1, v2, ...)` tuple for `row` to `out`.
///
/// # Errors
/// [`DecodeError::SpanOutOfRow`] if a field's span does not fit inside `row`.
pub fn encode_row(
    schema: &Schema,
    row: &[u8],
    row_index: u64,
    out: &mut Vec<u8>,
) -> Result<(), DecodeError> {
    out.push(b'(');
    for (i, field) in schema.fields.iter().enumerate() {
        if i > 0 {
            out.extend_from_slice(b", ");
        }
        let slice = field_slice(field, row, row_index)?;
        encode_value(field, slice, out);
    }
    out.push(b')');
    Ok(())
}

/// The bytes of `field` within `row`, i.e. `row[start-1 .. end]`.
///
/// # Errors
/// [`DecodeError::SpanOutOfRow`] if the span falls outside the row.
pub fn field_slice<'r>(
    field: &Field,
    row: &'r [u8],
    row_index: u64,
) -> Result<&'r [u8], DecodeError> {
    if field.start == 0 || field.end < field.start || field.end > row.len() {
        return Err(DecodeError::SpanOutOfRow {
            field: field.name.clone(),
            start: field.start,
            end: field.end,
            row: row_index,
            row_len: row.len(),
        });
    }
    Ok(&row[field.start - 1..field.end])
}

/// Append the SQL literal for one field's raw bytes.
pub fn encode_value(field: &Field, raw: &[u8], out: &mut Vec<u8>) {
    if raw.contains(&b' ') {
        out.extend_from_slice(b"null");
        return;
    }
    if field.decimals > 0 {
        push_decimal(raw, field.decimals, out);
        return;
    }
    match field.kind {
        ScalarKind::Character => push_quoted(raw, out),
        ScalarKind::Numeric => push_integer(raw, out),
    }
}

fn push_decimal(raw: &[u8], decimals: usize, out: &mut Vec<u8>) {
    if raw.len() > decimals {
        let split = raw.len() - decimals;
        out.extend_from_slice(&raw[..split]);
        out.push(b'.');
        out.extend_from_slice(&raw[split..]);
    } else {
        out.extend_from_slice(b"0.");
        out.resize(out.len() + decimals - raw.len(), b'0');
        out.extend_from_slice(raw);
    }
}

fn push_quoted(raw: &[u8], out: &mut Vec<u8>) {
    out.push(b'\'');
    for &b in raw {
        if b == b'\'' {
            out.push(b'\'');
        }
        out.push(b);
    }
    out.push(b'\'');
}

fn push_integer(raw: &[u8], out: &mut Vec<u8>) {
    let (sign, digits) = match raw.split_first() {
        Some((b'-', rest)) => (&raw[..1], rest),
        _ => (&raw[..0], raw),
    };
    let first_significant = digits.iter().position(|&b| b != b'0');
    match first_significant {
        Some(i) => {
            out.extend_from_slice(sign);
            out.extend_from_slice(&digits[i..]);
        }
        None => out.push(b'0'),
    }
}
