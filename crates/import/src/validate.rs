use std::fmt;

use crate::coerce::TypedRow;
use crate::schema::SourceSchema;

/// Why a row was dropped. Rows are never fatal: issues are counted and
/// logged by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowIssue {
    /// A required column is not present in the extract at all.
    MissingColumn(String),
    /// A required field coerced to `Empty`.
    RequiredEmpty(String),
    /// A `drop_if_empty` field is `Empty`.
    EmptyField(String),
    /// A `filter_rows_by_value` field holds a value outside its allowed set.
    ValueNotAllowed { field: String, value: String },
    /// The lançamento text contains an excluded literal.
    ExcludedLancamento(String),
}

impl RowIssue {
    /// Stable key used to aggregate drop counts.
    pub fn reason(&self) -> &'static str {
        match self {
            RowIssue::MissingColumn(_) => "missing_column",
            RowIssue::RequiredEmpty(_) => "required_empty",
            RowIssue::EmptyField(_) => "empty_field",
            RowIssue::ValueNotAllowed { .. } => "value_not_allowed",
            RowIssue::ExcludedLancamento(_) => "excluded_lancamento",
        }
    }
}

impl fmt::Display for RowIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowIssue::MissingColumn(c) => write!(f, "required column '{c}' is missing"),
            RowIssue::RequiredEmpty(n) => write!(f, "required field '{n}' is empty"),
            RowIssue::EmptyField(n) => write!(f, "field '{n}' is empty"),
            RowIssue::ValueNotAllowed { field, value } => {
                write!(f, "field '{field}' has disallowed value '{value}'")
            }
            RowIssue::ExcludedLancamento(l) => write!(f, "lançamento matches excluded '{l}'"),
        }
    }
}

/// Apply the source's validation rules in order: `drop_if_empty`, then
/// `filter_rows_by_value`, then `filter_out_lancamentos`.
pub fn validate_row(row: &TypedRow, schema: &SourceSchema) -> Result<(), RowIssue> {
    let spec = &schema.validation;

    if let Some(field) = spec.drop_if_empty.iter().find(|f| row.value(f).is_empty()) {
        return Err(RowIssue::EmptyField(field.clone()));
    }

    for (field, allowed) in &spec.filter_rows_by_value {
        let value = row.value(field);
        let text = value.to_string();
        if value.is_empty() || !allowed.iter().any(|a| a.trim() == text.trim()) {
            return Err(RowIssue::ValueNotAllowed {
                field: field.clone(),
                value: text,
            });
        }
    }

    if !spec.filter_out_lancamentos.is_empty() {
        let lancamento = row.value(schema.lancamento_field()).to_string().to_lowercase();
        if let Some(excluded) = spec
            .filter_out_lancamentos
            .iter()
            .find(|e| !e.is_empty() && lancamento.contains(&e.to_lowercase()))
        {
            return Err(RowIssue::ExcludedLancamento(excluded.clone()));
        }
    }

    Ok(())
}
