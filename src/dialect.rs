//! Target SQL engines: column type keywords and identifier quoting.

use crate::error::ConfigError;
use std::fmt::{Display, Formatter, Result as FormatResult};
use std::str::FromStr;

/// Integer fields wider than this many digits may overflow a 32-bit column.
const MAX_INT32_DIGITS: usize = 9;

/// Supported database engines.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Dialect {
    #[default]
    Postgres,
    MySql,
    MsSql,
    Oracle,
}

/// Abstract column type, before a dialect spells it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SqlType {
    Integer { digits: usize },
    Decimal { precision: usize, scale: usize },
    Text { width: usize },
}

impl Dialect {
    pub const ALL: [Dialect; 4] = [Self::Postgres, Self::MySql, Self::MsSql, Self::Oracle];

    /// The identifier used on the command line.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Postgres => "postgres",
            Self::MySql => "mysql",
            Self::MsSql => "mssql",
            Self::Oracle => "oracle",
        }
    }

    /// Spell `ty` as a column type keyword.
    #[must_use]
    pub fn type_name(self, ty: SqlType) -> String {
        match (self, ty) {
            (Self::Oracle, SqlType::Integer { digits }) => format!("NUMBER({digits})"),
            (Self::Postgres, SqlType::Integer { digits }) if digits <= MAX_INT32_DIGITS => {
                "INTEGER".to_string()
            }
            (_, SqlType::Integer { digits }) if digits <= MAX_INT32_DIGITS => "INT".to_string(),
            (_, SqlType::Integer { .. }) => "BIGINT".to_string(),
            (Self::Postgres, SqlType::Decimal { precision, scale }) => {
                format!("NUMERIC({precision},{scale})")
            }
            (Self::Oracle, SqlType::Decimal { precision, scale }) => {
                format!("NUMBER({precision},{scale})")
            }
            (_, SqlType::Decimal { precision, scale }) => format!("DECIMAL({precision},{scale})"),
            (Self::Postgres, SqlType::Text { .. }) => "TEXT".to_string(),
            (Self::Oracle, SqlType::Text { width }) => format!("VARCHAR2({width})"),
            (_, SqlType::Text { width }) => format!("VARCHAR({width})"),
        }
    }

    /// Opening and closing identifier quote characters.
    #[must_use]
    pub fn quotes(self) -> (char, char) {
        match self {
            Self::Postgres | Self::Oracle => ('"', '"'),
            Self::MySql => ('`', '`'),
            Self::MsSql => ('[', ']'),
        }
    }

    /// Quote an identifier, doubling any embedded closing quote.
    #[must_use]
    pub fn quote_ident(self, ident: &str) -> String {
        let (open, close) = self.quotes();
        let mut out = String::with_capacity(ident.len() + 2);
        out.push(open);
        for c in ident.chars() {
            if c == close {
                out.push(close);
            }
            out.push(c);
        }
        out.push(close);
        out
    }
}

impl FromStr for Dialect {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Ok(Self::Postgres),
            "mysql" => Ok(Self::MySql),
            "mssql" | "sqlserver" => Ok(Self::MsSql),
            "oracle" => Ok(Self::Oracle),
            _ => Err(ConfigError::UnknownDialect(s.to_string())),
        }
    }
}

impl Display for Dialect {
    fn fmt(&self, f: &mut Formatter<'_>) -> FormatResult {
        f.write_str(self.name())
    }
}
