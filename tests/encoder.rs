mod common;

use common::{age_sex, character, numeric};
use ipums2db::encoder::{encode_value, field_slice};
use ipums2db::{DecodeError, Dialect, RowEncoder, Schema, encode_rows};
use std::sync::Arc;

fn value(field: &ipums2db::Field, raw: &str) -> String {
    let mut out = Vec::new();
    encode_value(field, raw.as_bytes(), &mut out);
    String::from_utf8(out).unwrap()
}

#[test]
fn age_sex_block_renders_blank_as_null() {
    let sql = encode_rows(&age_sex(), "ipums_tab", Dialect::Postgres, b"019\n01 \n").unwrap();
    assert_eq!(
        String::from_utf8(sql).unwrap(),
        "INSERT INTO \"ipums_tab\" VALUES\n(1, 9),\n(1, null);\n"
    );
}

#[test]
fn field_slice_length_matches_width() {
    let schema = Schema::new(vec![numeric("A", 1, 3), character("B", 4, 8), numeric("C", 9, 9)]);
    let row = b"123abcde9\n";
    for f in &schema.fields {
        let slice = field_slice(f, row, 0).unwrap();
        assert_eq!(slice.len(), f.width(), "field {}", f.name);
    }
    assert_eq!(field_slice(&schema.fields[1], row, 0).unwrap(), b"abcde");
}

#[test]
fn any_space_is_null_for_every_kind() {
    let mut money = numeric("INCWAGE", 1, 6);
    money.decimals = 2;
    for f in [numeric("N", 1, 3), character("S", 1, 3), money] {
        assert_eq!(value(&f, " 12"), "null");
        assert_eq!(value(&f, "1 2"), "null");
        assert_eq!(value(&f, "   "), "null");
    }
}

#[test]
fn implied_decimals_insert_a_point() {
    let mut f = numeric("HHWT", 1, 6);
    f.decimals = 2;
    assert_eq!(value(&f, "012345"), "0123.45");
    f.decimals = 6;
    assert_eq!(value(&f, "123456"), "0.123456");
}

#[test]
fn integers_lose_leading_zeros() {
    let f = numeric("N", 1, 3);
    assert_eq!(value(&f, "000"), "0");
    assert_eq!(value(&f, "007"), "7");
    assert_eq!(value(&f, "100"), "100");
}

#[test]
fn character_values_are_quoted_and_escaped() {
    let f = character("NAME", 1, 7);
    assert_eq!(value(&f, "O'Brien"), "'O''Brien'");
    assert_eq!(value(&f, "0042"), "'0042'");
}

#[test]
fn dialect_quotes_the_table_name() {
    let schema = Schema::new(vec![numeric("A", 1, 1)]);
    let sql = encode_rows(&schema, "tab", Dialect::MySql, b"5\n").unwrap();
    assert!(String::from_utf8(sql).unwrap().starts_with("INSERT INTO `tab` VALUES\n(5);"));
    let sql = encode_rows(&schema, "tab", Dialect::MsSql, b"5\n").unwrap();
    assert!(String::from_utf8(sql).unwrap().starts_with("INSERT INTO [tab] VALUES"));
}

#[test]
fn empty_input_is_an_empty_payload() {
    let encoder = RowEncoder::new(Arc::new(age_sex()), "t", Dialect::Postgres);
    assert!(encoder.encode_rows(b"", 0).unwrap().is_empty());
}

#[test]
fn short_row_is_a_decode_error() {
    let encoder = RowEncoder::new(Arc::new(age_sex()), "t", Dialect::Postgres);
    assert_eq!(encoder.row_width(), 4);
    let err = encoder.encode_rows(b"019\n01", 40).unwrap_err();
    assert_eq!(
        err,
        DecodeError::SpanOutOfRow {
            field: "SEX".to_string(),
            start: 3,
            end: 3,
            row: 41,
            row_len: 2,
        }
    );
}
