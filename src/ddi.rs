//! Data dictionary loading.
//!
//! Two formats produce the same [`Schema`]:
//! - **DDI XML** (feature `ddi-xml`) -- the codebook IPUMS ships with every extract;
//!   only `codeBook > dataDscr > var` is read
//! - **JSON** -- the serde rendering of [`Schema`], handy for hand-written schemas
//!
//! [`load_schema`] picks the format from the file extension.

use crate::schema::Schema;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Load a schema from a `.json` file or a DDI `.xml` codebook.
///
/// # Errors
/// If the file cannot be read or parsed, or if XML support was compiled out.
pub fn load_schema(path: impl AsRef<Path>) -> Result<Schema> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let is_json = path
        .extension()
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));
    let schema = if is_json {
        parse_schema_json(&text)
    } else {
        parse_ddi(&text)
    };
    schema.with_context(|| format!("load data dictionary {}", path.display()))
}

/// Parse the JSON rendering of a [`Schema`].
///
/// # Errors
/// If the text is not a valid schema document.
pub fn parse_schema_json(text: &str) -> Result<Schema> {
    serde_json::from_str(text).context("parse schema JSON")
}

#[cfg(not(feature = "ddi-xml"))]
pub fn parse_ddi(_text: &str) -> Result<Schema> {
    anyhow::bail!("DDI XML support is disabled; rebuild with the `ddi-xml` feature")
}

#[cfg(feature = "ddi-xml")]
pub use xml::parse_ddi;

#[cfg(feature = "ddi-xml")]
mod xml {
    use crate::schema::{Category, Field, Interval, ScalarKind, Schema};
    use anyhow::{Context, Result, bail};
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct CodeBook {
        #[serde(rename = "dataDscr")]
        data_dscr: DataDscr,
    }

    #[derive(Deserialize)]
    struct DataDscr {
        #[serde(rename = "var", default)]
        vars: Vec<Var>,
    }

    #[derive(Deserialize)]
    struct Var {
        #[serde(rename = "@name")]
        name: String,
        #[serde(rename = "@dcml", default)]
        dcml: Option<String>,
        #[serde(rename = "@intrvl", default)]
        intrvl: Option<String>,
        location: Location,
        #[serde(default)]
        labl: Option<Text>,
        #[serde(rename = "catgry", default)]
        categories: Vec<Catgry>,
        #[serde(rename = "varFormat", default)]
        var_format: Option<VarFormat>,
    }

    #[derive(Deserialize)]
    struct Location {
        #[serde(rename = "@StartPos")]
        start: usize,
        #[serde(rename = "@EndPos")]
        end: usize,
    }

    #[derive(Deserialize)]
    struct Catgry {
        #[serde(rename = "catValu", default)]
        value: Option<Text>,
        #[serde(default)]
        labl: Option<Text>,
    }

    #[derive(Deserialize)]
    struct VarFormat {
        #[serde(rename = "@type", default)]
        kind: Option<String>,
    }

    #[derive(Deserialize, Default)]
    struct Text {
        #[serde(rename = "$text", default)]
        text: String,
    }

    fn text(t: Option<Text>) -> String {
        t.map(|t| t.text.trim().to_string()).unwrap_or_default()
    }

    /// Parse an IPUMS DDI codebook.
    ///
    /// # Errors
    /// If the XML is malformed or a variable has an unusable decimal count or format.
    pub fn parse_ddi(xml: &str) -> Result<Schema> {
        let book: CodeBook = quick_xml::de::from_str(xml).context("parse DDI XML")?;
        let fields = book
            .data_dscr
            .vars
            .into_iter()
            .map(into_field)
            .collect::<Result<Vec<_>>>()?;
        Ok(Schema::new(fields))
    }

    fn into_field(var: Var) -> Result<Field> {
        let decimals = match var.dcml.as_deref().map(str::trim) {
            None | Some("") => 0,
            Some(d) => d
                .parse()
                .with_context(|| format!("variable {}: bad dcml `{d}`", var.name))?,
        };
        let kind = match var
            .var_format
            .and_then(|f| f.kind)
            .map(|k| k.trim().to_ascii_lowercase())
            .as_deref()
        {
            None | Some("numeric") => ScalarKind::Numeric,
            Some("character") => ScalarKind::Character,
            Some(other) => bail!("variable {}: unknown varFormat type `{other}`", var.name),
        };
        let categories = var
            .categories
            .into_iter()
            .map(|c| Category {
                value: text(c.value),
                label: text(c.labl),
            })
            .collect();
        Ok(Field {
            name: var.name,
            label: text(var.labl),
            kind,
            decimals,
            interval: Interval::from(var.intrvl.unwrap_or_default()),
            start: var.location.start,
            end: var.location.end,
            categories,
        })
    }
}
