//! In-memory schema model: the ordered fields of a fixed-width extract.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FormatResult};

/// Storage kind of a field's raw bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalarKind {
    Character,
    Numeric,
}

/// Whether a field is coded (discrete) or a measured quantity (continuous).
///
/// Dictionaries are not always clean, so an unknown tag is kept as-is and rejected
/// only when DDL is rendered.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Interval {
    Discrete,
    Continuous,
    Unrecognized(String),
}

impl From<String> for Interval {
    fn from(tag: String) -> Self {
        match tag.trim().to_ascii_lowercase().as_str() {
            "discrete" => Self::Discrete,
            "contin" | "continuous" => Self::Continuous,
            _ => Self::Unrecognized(tag),
        }
    }
}

impl From<Interval> for String {
    fn from(interval: Interval) -> Self {
        match interval {
            Interval::Discrete => "discrete".to_string(),
            Interval::Continuous => "continuous".to_string(),
            Interval::Unrecognized(tag) => tag,
        }
    }
}

/// A coded value and its label.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub value: String,
    pub label: String,
}

/// One column of the extract.
///
/// `start` and `end` are 1-indexed and inclusive, as they appear in the dictionary.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    #[serde(default)]
    pub label: String,
    pub kind: ScalarKind,
    /// Implied decimal places; 0 means integer.
    #[serde(default)]
    pub decimals: usize,
    pub interval: Interval,
    pub start: usize,
    pub end: usize,
    #[serde(default)]
    pub categories: Vec<Category>,
}

impl Field {
    /// Byte width of the field.
    #[must_use]
    pub fn width(&self) -> usize {
        self.end + 1 - self.start
    }

    #[must_use]
    pub fn is_discrete(&self) -> bool {
        self.interval == Interval::Discrete
    }
}

/// Ordered fields; order is output column order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    pub fields: Vec<Field>,
}

impl Schema {
    #[must_use]
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    /// Bytes per record: the last field's end plus the line terminator.
    #[must_use]
    pub fn row_width(&self) -> usize {
        1 + self.fields.iter().map(|f| f.end).max().unwrap_or(0)
    }

    /// Case-insensitive lookup by name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields
            .iter()
            .find(|f| f.name.eq_ignore_ascii_case(name.trim()))
    }

    pub fn discrete_fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter().filter(|f| f.is_discrete())
    }

    /// Reject schemas the encoder cannot slice. Overlaps and gaps are not checked.
    ///
    /// # Errors
    /// [`ConfigError::EmptySchema`] or [`ConfigError::InvalidSpan`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fields.is_empty() {
            return Err(ConfigError::EmptySchema);
        }
        for f in &self.fields {
            if f.start == 0 || f.end < f.start {
                return Err(ConfigError::InvalidSpan {
                    field: f.name.clone(),
                    start: f.start,
                    end: f.end,
                });
            }
        }
        Ok(())
    }
}

impl Display for Schema {
    fn fmt(&self, f: &mut Formatter<'_>) -> FormatResult {
        write!(
            f,
            "{} fields ({} discrete), {} bytes per row",
            self.fields.len(),
            self.discrete_fields().count(),
            self.row_width()
        )
    }
}
