use chrono::{NaiveDate, NaiveDateTime};
use custodia_core::FieldValue;
use indexmap::IndexMap;
use rust_decimal::Decimal;
use std::str::FromStr;

use crate::schema::{FieldSpec, SourceSchema, ValueType};
use crate::util::normalize_header;
use crate::validate::RowIssue;

/// Tried after the declared format, in order.
const FALLBACK_DATE_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d"];

static EMPTY: FieldValue = FieldValue::Empty;

/// One untyped input row. Column names are normalized on insert so lookups
/// ignore case and spacing differences in extract headers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRow {
    cells: IndexMap<String, Option<String>>,
}

impl RawRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, column: &str, value: Option<String>) {
        self.cells.insert(normalize_header(column), value);
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.cells.contains_key(&normalize_header(column))
    }

    /// Cell text; `None` when the column is absent or the cell is missing.
    pub fn get(&self, column: &str) -> Option<&str> {
        self.cells
            .get(&normalize_header(column))
            .and_then(|v| v.as_deref())
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, Option<V>)> for RawRow {
    fn from_iter<I: IntoIterator<Item = (K, Option<V>)>>(iter: I) -> Self {
        let mut row = RawRow::new();
        for (column, value) in iter {
            row.insert(column.as_ref(), value.map(Into::into));
        }
        row
    }
}

/// Internal field name → typed value. Every declared field is present.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypedRow {
    values: IndexMap<String, FieldValue>,
}

impl TypedRow {
    pub fn insert(&mut self, field: impl Into<String>, value: FieldValue) {
        self.values.insert(field.into(), value);
    }

    /// Value of `field`, or `Empty` if the row has no such field.
    pub fn value(&self, field: &str) -> &FieldValue {
        self.values.get(field).unwrap_or(&EMPTY)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.values.contains_key(field)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Coerce every declared column of `raw` into its typed internal field.
///
/// A required column that is absent, or that coerces to `Empty`, makes the
/// row invalid. Unparsable values are never errors; they become `Empty`.
pub fn coerce_row(raw: &RawRow, schema: &SourceSchema) -> Result<TypedRow, RowIssue> {
    let mut typed = TypedRow::default();
    for spec in &schema.fields {
        if spec.required && !raw.has_column(&spec.raw_name) {
            return Err(RowIssue::MissingColumn(spec.raw_name.clone()));
        }
        let value = raw
            .get(&spec.raw_name)
            .map(|text| coerce_value(text, spec))
            .unwrap_or_default();
        if spec.required && value.is_empty() {
            return Err(RowIssue::RequiredEmpty(spec.name.clone()));
        }
        typed.insert(spec.name.clone(), value);
    }
    Ok(typed)
}

/// Apply replacements in order, then parse according to the field's type.
pub fn coerce_value(text: &str, spec: &FieldSpec) -> FieldValue {
    let replaced = spec
        .replace
        .iter()
        .fold(text.to_string(), |acc, (from, to)| {
            if from.is_empty() {
                acc
            } else {
                acc.replace(from.as_str(), to)
            }
        });
    let trimmed = replaced.trim();
    if trimmed.is_empty() {
        return FieldValue::Empty;
    }

    match spec.value_type {
        ValueType::String => FieldValue::text(trimmed),
        ValueType::Date => parse_date(trimmed, spec.format.as_deref())
            .map(FieldValue::Date)
            .unwrap_or_default(),
        ValueType::Decimal => parse_decimal(trimmed)
            .map(FieldValue::Decimal)
            .unwrap_or_default(),
    }
}

/// Parse with `format` first, then with the ISO fallbacks. Date-only
/// patterns yield midnight.
pub fn parse_date(s: &str, format: Option<&str>) -> Option<NaiveDateTime> {
    format
        .into_iter()
        .chain(FALLBACK_DATE_FORMATS.iter().copied())
        .find_map(|fmt| parse_with(s, fmt))
}

fn parse_with(s: &str, fmt: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, fmt).ok().or_else(|| {
        NaiveDate::parse_from_str(s, fmt)
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
    })
}

/// Accounting parentheses mean negative. Scientific notation is accepted
/// because spreadsheet cells sometimes render that way.
pub fn parse_decimal(s: &str) -> Option<Decimal> {
    let s = s.trim();
    let (negative, s) = match s.strip_prefix('(').and_then(|r| r.strip_suffix(')')) {
        Some(inner) => (true, inner.trim()),
        None => (false, s),
    };
    let value = Decimal::from_str(s)
        .or_else(|_| Decimal::from_scientific(s))
        .ok()?;
    Some(if negative { -value } else { value })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{SharedTables, SourceConfig};
    use serde_json::json;
    use std::sync::Arc;

    fn spec(value_type: ValueType, format: Option<&str>, replace: &[(&str, &str)]) -> FieldSpec {
        FieldSpec {
            raw_name: "col".to_string(),
            name: "field".to_string(),
            value_type,
            format: format.map(str::to_string),
            replace: replace
                .iter()
                .map(|(a, b)| (a.to_string(), b.to_string()))
                .collect(),
            required: false,
        }
    }

    fn schema() -> SourceSchema {
        let config: SourceConfig = serde_json::from_value(json!({
            "columns": {
                "Data Movimento": { "name": "data", "type": "date", "format": "%d/%m/%Y", "required": true },
                "Histórico": { "name": "historico" },
                "Valor": { "name": "valor", "type": "decimal", "replace": [[".", ""], [",", "."]] }
            },
            "output_mapping": { "data": { "source": "data" } }
        }))
        .unwrap();
        SourceSchema::compile("Daycoval", config, Arc::new(SharedTables::default())).unwrap()
    }

    // ── values ────────────────────────────────────────────────────────────────

    #[test]
    fn brazilian_amount_with_replacements() {
        let s = spec(ValueType::Decimal, None, &[(".", ""), (",", ".")]);
        assert_eq!(coerce_value("1.234,56", &s), FieldValue::Decimal(Decimal::new(123456, 2)));
        assert_eq!(coerce_value("-150,00", &s), FieldValue::Decimal(Decimal::new(-15000, 2)));
    }

    #[test]
    fn replacements_apply_in_declaration_order() {
        let ordered = spec(ValueType::String, None, &[("a", "b"), ("b", "c")]);
        assert_eq!(coerce_value("a", &ordered), FieldValue::text("c"));
        let reversed = spec(ValueType::String, None, &[("b", "c"), ("a", "b")]);
        assert_eq!(coerce_value("a", &reversed), FieldValue::text("b"));
    }

    #[test]
    fn accounting_parentheses_are_negative() {
        assert_eq!(parse_decimal("(75.25)"), Some(Decimal::new(-7525, 2)));
        assert_eq!(parse_decimal("1.5E3"), Some(Decimal::new(1500, 0)));
    }

    #[test]
    fn unparsable_values_become_empty() {
        let decimal = spec(ValueType::Decimal, None, &[]);
        assert_eq!(coerce_value("n/a", &decimal), FieldValue::Empty);
        let date = spec(ValueType::Date, Some("%d/%m/%Y"), &[]);
        assert_eq!(coerce_value("31/02/2024", &date), FieldValue::Empty);
    }

    #[test]
    fn blank_string_is_empty_not_blank_text() {
        let s = spec(ValueType::String, None, &[]);
        assert_eq!(coerce_value("   ", &s), FieldValue::Empty);
        assert_eq!(coerce_value("  Taxa  ", &s), FieldValue::text("Taxa"));
    }

    #[test]
    fn date_uses_declared_format_then_iso() {
        let s = spec(ValueType::Date, Some("%d/%m/%Y"), &[]);
        let expected = NaiveDate::from_ymd_opt(2024, 5, 7).unwrap().and_hms_opt(0, 0, 0).unwrap();
        assert_eq!(coerce_value("07/05/2024", &s), FieldValue::Date(expected));
        assert_eq!(coerce_value("2024-05-07 00:00:00", &s), FieldValue::Date(expected));
    }

    // ── rows ──────────────────────────────────────────────────────────────────

    #[test]
    fn headers_match_ignoring_case_and_spacing() {
        let raw: RawRow = [
            ("DATA  MOVIMENTO", Some("07/05/2024")),
            ("histórico", Some("Taxa CETIP")),
            ("Valor", Some("10,00")),
        ]
        .into_iter()
        .collect();
        let typed = coerce_row(&raw, &schema()).unwrap();
        assert_eq!(typed.len(), 3);
        assert_eq!(typed.value("historico"), &FieldValue::text("Taxa CETIP"));
        assert_eq!(typed.value("valor"), &FieldValue::Decimal(Decimal::new(1000, 2)));
    }

    #[test]
    fn absent_required_column_is_reported() {
        let raw: RawRow = [("Histórico", Some("Taxa"))].into_iter().collect();
        assert_eq!(
            coerce_row(&raw, &schema()),
            Err(RowIssue::MissingColumn("Data Movimento".to_string()))
        );
    }

    #[test]
    fn blank_required_value_is_reported() {
        let raw: RawRow = [("Data Movimento", Some("")), ("Histórico", Some("Taxa"))]
            .into_iter()
            .collect();
        assert_eq!(
            coerce_row(&raw, &schema()),
            Err(RowIssue::RequiredEmpty("data".to_string()))
        );
    }

    #[test]
    fn optional_absent_columns_are_present_as_empty() {
        let raw: RawRow = [("Data Movimento", Some("07/05/2024"))].into_iter().collect();
        let typed = coerce_row(&raw, &schema()).unwrap();
        assert!(typed.contains("valor"));
        assert!(typed.value("valor").is_empty());
        assert!(typed.value("undeclared").is_empty());
    }
}
