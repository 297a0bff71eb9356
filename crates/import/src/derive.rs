use custodia_core::{CanonicalRecord, FieldValue};
use rust_decimal::Decimal;

use crate::coerce::{parse_date, parse_decimal, TypedRow};
use crate::rules::DEFAULT_TABLE;
use crate::schema::{DerivationRule, Extract, SourceRef, SourceSchema};
use crate::util::{collapse_whitespace, strip_suffixes};

/// Build the canonical record for one validated row.
///
/// Output fields are derived in declaration order. Canonical fields the
/// source does not map keep their empty value.
pub fn derive_record(row: &TypedRow, schema: &SourceSchema) -> CanonicalRecord {
    let mut record = CanonicalRecord::default();
    for (field, rule) in &schema.output {
        let value = derive_value(row, schema, rule);
        record.set(*field, &value);
    }
    record
}

/// `force_default` always wins. Otherwise the default replaces the input
/// when every source is `Empty` or undeclared; the operator is not applied
/// to a default.
pub fn derive_value(row: &TypedRow, schema: &SourceSchema, rule: &DerivationRule) -> FieldValue {
    let default = rule.default.as_ref().map(|d| d.to_value());
    if rule.force_default {
        return default.unwrap_or_default();
    }

    let inputs: Vec<FieldValue> = match &rule.source {
        Some(source) => resolve(row, schema, source),
        None => Vec::new(),
    };
    if inputs.iter().all(FieldValue::is_empty) {
        if let Some(default) = default {
            return default;
        }
    }

    match rule.extract {
        Extract::MaxAbs => max_abs(&inputs),
        op => {
            let input = inputs.into_iter().next().unwrap_or_default();
            apply(op, input, schema, rule)
        }
    }
}

fn resolve(row: &TypedRow, schema: &SourceSchema, source: &SourceRef) -> Vec<FieldValue> {
    source
        .names()
        .into_iter()
        .map(|name| {
            if schema.declares(name) {
                row.value(name).clone()
            } else {
                FieldValue::Empty
            }
        })
        .collect()
}

fn apply(op: Extract, input: FieldValue, schema: &SourceSchema, rule: &DerivationRule) -> FieldValue {
    match op {
        Extract::Identity => match (&input, rule.format.as_deref()) {
            (FieldValue::Date(_), Some(format)) => FieldValue::Text(input.format_with(format)),
            _ => input,
        },
        Extract::Year => year(&input),
        Extract::MonthNamePt => month_name(&input, schema),
        Extract::CleanName => clean_name(&input, &schema.clean_name_noise),
        Extract::Categorize => {
            let table_name = rule.table.as_deref().unwrap_or(DEFAULT_TABLE);
            match schema.table(table_name) {
                Some(table) => FieldValue::text(table.categorize(&input.to_string())),
                None => input,
            }
        }
        Extract::Abs => FieldValue::Decimal(numeric(&input).abs()),
        Extract::MaxAbs => max_abs(&[input]),
        Extract::FundType => {
            FieldValue::text(schema.shared.fund_types.classify(&input.to_string()))
        }
        Extract::FundAlias => {
            let name = input.to_string();
            match schema.shared.fund_aliases.resolve(&name) {
                Some(alias) => FieldValue::text(alias),
                None => input,
            }
        }
    }
}

fn year(input: &FieldValue) -> FieldValue {
    match input {
        FieldValue::Date(d) => FieldValue::Integer(i64::from(chrono::Datelike::year(d))),
        FieldValue::Integer(_) => input.clone(),
        FieldValue::Text(s) => parse_date(s, None)
            .map(|d| FieldValue::Integer(i64::from(chrono::Datelike::year(&d))))
            .or_else(|| s.trim().parse().ok().map(FieldValue::Integer))
            .unwrap_or_default(),
        _ => FieldValue::Empty,
    }
}

/// Dates go through the month table by index; text is taken to be an
/// English month name.
fn month_name(input: &FieldValue, schema: &SourceSchema) -> FieldValue {
    let months = &schema.shared.months;
    match input {
        FieldValue::Date(d) => FieldValue::text(months.translate(*d)),
        FieldValue::Text(s) => months
            .translate_english(s.trim())
            .map(FieldValue::text)
            .unwrap_or_default(),
        _ => FieldValue::Empty,
    }
}

fn clean_name(input: &FieldValue, noise: &[String]) -> FieldValue {
    let cleaned = strip_suffixes(&collapse_whitespace(&input.to_string()), noise);
    if cleaned.is_empty() {
        FieldValue::Empty
    } else {
        FieldValue::Text(cleaned)
    }
}

/// `Empty` and non-numeric values count as zero.
fn numeric(value: &FieldValue) -> Decimal {
    match value {
        FieldValue::Text(s) => parse_decimal(s).unwrap_or(Decimal::ZERO),
        other => other.as_decimal().unwrap_or(Decimal::ZERO),
    }
}

/// Greatest magnitude wins; on a tie the earlier source is kept.
fn max_abs(inputs: &[FieldValue]) -> FieldValue {
    let best = inputs
        .iter()
        .map(numeric)
        .fold(None::<Decimal>, |best, v| match best {
            Some(b) if b.abs() >= v.abs() => Some(b),
            _ => Some(v),
        })
        .unwrap_or(Decimal::ZERO);
    FieldValue::Decimal(best)
}
