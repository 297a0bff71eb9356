use chrono::{Datelike, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Pattern used whenever a date has to be rendered without an explicit format.
pub const DEFAULT_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A typed field value produced by coercion or derivation.
///
/// `Empty` is the "no value" sentinel: it is distinct from a blank string
/// and from zero, so validation can tell a missing amount from a zero amount.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    #[default]
    Empty,
    Text(String),
    Integer(i64),
    Decimal(Decimal),
    Date(NaiveDateTime),
}

impl FieldValue {
    pub fn text(s: impl Into<String>) -> Self {
        FieldValue::Text(s.into())
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, FieldValue::Empty)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDateTime> {
        match self {
            FieldValue::Date(d) => Some(*d),
            _ => None,
        }
    }

    /// Numeric view of the value. Text is not parsed here; coercion owns that.
    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            FieldValue::Decimal(d) => Some(*d),
            FieldValue::Integer(i) => Some(Decimal::from(*i)),
            _ => None,
        }
    }

    pub fn year(&self) -> Option<i32> {
        self.as_date().map(|d| d.year())
    }

    /// Render a date with `format`; every other variant renders as `Display`.
    pub fn format_with(&self, format: &str) -> String {
        match self {
            FieldValue::Date(d) => d.format(format).to_string(),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Empty => Ok(()),
            FieldValue::Text(s) => write!(f, "{s}"),
            FieldValue::Integer(i) => write!(f, "{i}"),
            FieldValue::Decimal(d) => write!(f, "{}", d.normalize()),
            FieldValue::Date(d) => write!(f, "{}", d.format(DEFAULT_TIMESTAMP_FORMAT)),
        }
    }
}

impl From<Decimal> for FieldValue {
    fn from(d: Decimal) -> Self {
        FieldValue::Decimal(d)
    }
}

impl From<NaiveDateTime> for FieldValue {
    fn from(d: NaiveDateTime) -> Self {
        FieldValue::Date(d)
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}
