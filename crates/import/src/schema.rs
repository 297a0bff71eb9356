use custodia_core::{CanonicalField, FieldValue, MonthTable};
use indexmap::IndexMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;

use crate::fund::{FundAliasTable, FundTypeTable};
use crate::rules::{CategorizationTable, DEFAULT_TABLE};

// ── Configuration document ───────────────────────────────────────────────────

/// Top level of a configuration file. Each custodian entry is kept as a raw
/// value so one malformed source does not take down the others.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigDocument {
    #[serde(default)]
    pub month_translation: Option<IndexMap<String, String>>,
    #[serde(default)]
    pub fund_types: Option<IndexMap<String, String>>,
    #[serde(default)]
    pub fund_type_overrides: Option<IndexMap<String, String>>,
    #[serde(default)]
    pub fund_aliases: IndexMap<String, String>,
    pub custodiantes: IndexMap<String, serde_json::Value>,
}

/// One custodian entry as written in configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceConfig {
    #[serde(default = "default_encoding")]
    pub encoding: String,
    #[serde(default = "default_separator")]
    pub separator: String,
    #[serde(default)]
    pub skip_rows: usize,
    #[serde(default)]
    pub file_patterns: Vec<String>,
    pub columns: IndexMap<String, FieldSpec>,
    #[serde(default)]
    pub validations: ValidationSpec,
    pub output_mapping: IndexMap<String, DerivationRule>,
    #[serde(default)]
    pub categorization_rules: IndexMap<String, IndexMap<String, String>>,
    #[serde(default)]
    pub clean_name_noise: Vec<String>,
}

fn default_encoding() -> String {
    "utf-8".to_string()
}

fn default_separator() -> String {
    ";".to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    #[default]
    #[serde(alias = "str", alias = "text")]
    String,
    #[serde(alias = "datetime")]
    Date,
    #[serde(alias = "float", alias = "number")]
    Decimal,
}

/// How one raw column becomes one typed internal field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldSpec {
    /// Header as declared; filled from the `columns` key.
    #[serde(skip)]
    pub raw_name: String,
    pub name: String,
    #[serde(rename = "type", default)]
    pub value_type: ValueType,
    #[serde(default)]
    pub format: Option<String>,
    /// `(from, to)` substring replacements, applied in order before parsing.
    #[serde(default)]
    pub replace: Vec<(String, String)>,
    #[serde(default)]
    pub required: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ValidationSpec {
    #[serde(default)]
    pub drop_if_empty: Vec<String>,
    #[serde(default)]
    pub filter_rows_by_value: IndexMap<String, Vec<String>>,
    #[serde(default)]
    pub filter_out_lancamentos: Vec<String>,
    /// Internal field holding the description text checked by
    /// `filter_out_lancamentos`. Resolved at load time when omitted.
    #[serde(default)]
    pub lancamento_field: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SourceRef {
    One(String),
    Many(Vec<String>),
}

impl SourceRef {
    pub fn names(&self) -> Vec<&str> {
        match self {
            SourceRef::One(name) => vec![name.as_str()],
            SourceRef::Many(names) => names.iter().map(String::as_str).collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Extract {
    #[default]
    #[serde(alias = "none")]
    Identity,
    Year,
    MonthNamePt,
    CleanName,
    Categorize,
    Abs,
    MaxAbs,
    FundType,
    FundAlias,
}

/// A default value as written in configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Literal {
    Integer(i64),
    Text(String),
    Float(f64),
}

impl Literal {
    pub fn to_value(&self) -> FieldValue {
        match self {
            Literal::Integer(i) => FieldValue::Integer(*i),
            Literal::Text(s) => FieldValue::Text(s.clone()),
            Literal::Float(f) => Decimal::try_from(*f)
                .map(FieldValue::Decimal)
                .unwrap_or(FieldValue::Empty),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DerivationRule {
    #[serde(default)]
    pub source: Option<SourceRef>,
    #[serde(default, alias = "operator")]
    pub extract: Extract,
    #[serde(default)]
    pub default: Option<Literal>,
    #[serde(default)]
    pub force_default: bool,
    #[serde(default)]
    pub format: Option<String>,
    /// Categorization table used by `categorize`.
    #[serde(default)]
    pub table: Option<String>,
}

// ── Compiled schema ──────────────────────────────────────────────────────────

/// Physical-format hints consumed by the reader adapter, not by the core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReaderHints {
    pub encoding: String,
    pub separator: u8,
    pub skip_rows: usize,
}

/// Tables shared by every source in one configuration document.
#[derive(Debug, Clone, Default)]
pub struct SharedTables {
    pub months: MonthTable,
    pub fund_types: FundTypeTable,
    pub fund_aliases: FundAliasTable,
}

/// Immutable, validated description of one custodian's extract.
#[derive(Debug, Clone)]
pub struct SourceSchema {
    pub id: String,
    pub reader: ReaderHints,
    pub file_patterns: Vec<String>,
    pub fields: Vec<FieldSpec>,
    pub validation: ValidationSpec,
    pub output: Vec<(CanonicalField, DerivationRule)>,
    pub tables: IndexMap<String, CategorizationTable>,
    pub clean_name_noise: Vec<String>,
    pub shared: Arc<SharedTables>,
}

impl SourceSchema {
    /// Validate a source entry and resolve everything rows will need.
    /// The error string names the offending part of the entry.
    pub fn compile(
        id: &str,
        config: SourceConfig,
        shared: Arc<SharedTables>,
    ) -> Result<Self, String> {
        let separator = match config.separator.as_bytes() {
            [b] => *b,
            _ if config.separator == "\\t" => b'\t',
            _ => {
                return Err(format!(
                    "separator must be a single byte, got '{}'",
                    config.separator
                ))
            }
        };

        let fields: Vec<FieldSpec> = config
            .columns
            .into_iter()
            .map(|(raw_name, mut spec)| {
                spec.raw_name = raw_name;
                spec
            })
            .collect();
        if fields.is_empty() {
            return Err("columns must declare at least one field".to_string());
        }
        for spec in &fields {
            if spec.name.trim().is_empty() {
                return Err(format!("column '{}' has an empty field name", spec.raw_name));
            }
        }

        let mut tables = IndexMap::with_capacity(config.categorization_rules.len());
        for (name, entries) in &config.categorization_rules {
            let table = CategorizationTable::from_config(entries)
                .map_err(|e| format!("categorization table '{name}': {e}"))?;
            tables.insert(name.clone(), table);
        }

        let mut output = Vec::with_capacity(config.output_mapping.len());
        for (key, rule) in config.output_mapping {
            let field = CanonicalField::from_str(&key)?;
            check_rule(field, &rule, &tables)?;
            output.push((field, rule));
        }

        let mut validation = config.validations;
        if validation.lancamento_field.is_none() {
            validation.lancamento_field = Some(resolve_lancamento_field(&output));
        }

        let schema = SourceSchema {
            id: id.to_string(),
            reader: ReaderHints {
                encoding: config.encoding,
                separator,
                skip_rows: config.skip_rows,
            },
            file_patterns: config
                .file_patterns
                .iter()
                .map(|p| p.to_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
            fields,
            validation,
            output,
            tables,
            clean_name_noise: config.clean_name_noise,
            shared,
        };
        schema.warn_on_undeclared_fields();
        Ok(schema)
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn declares(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    pub fn table(&self, name: &str) -> Option<&CategorizationTable> {
        self.tables.get(name)
    }

    pub fn lancamento_field(&self) -> &str {
        self.validation
            .lancamento_field
            .as_deref()
            .unwrap_or("lancamento")
    }

    /// Whether `file_name` looks like one of this source's extracts.
    pub fn matches_file(&self, file_name: &str) -> bool {
        let lower = file_name.to_lowercase();
        self.file_patterns.iter().any(|p| lower.contains(p.as_str()))
    }

    fn warn_on_undeclared_fields(&self) {
        let referenced = self
            .validation
            .drop_if_empty
            .iter()
            .chain(self.validation.filter_rows_by_value.keys())
            .map(String::as_str)
            .chain(
                self.output
                    .iter()
                    .filter_map(|(_, rule)| rule.source.as_ref())
                    .flat_map(SourceRef::names),
            );
        for name in referenced {
            if !self.declares(name) {
                tracing::warn!(
                    source = %self.id,
                    field = name,
                    "field is referenced but not declared in columns; it will always be empty"
                );
            }
        }
    }
}

fn check_rule(
    field: CanonicalField,
    rule: &DerivationRule,
    tables: &IndexMap<String, CategorizationTable>,
) -> Result<(), String> {
    if rule.force_default && rule.default.is_none() {
        return Err(format!("{field}: force_default requires a default value"));
    }
    match (&rule.source, rule.extract) {
        (Some(SourceRef::Many(names)), Extract::MaxAbs) if names.is_empty() => {
            Err(format!("{field}: max_abs needs at least one source field"))
        }
        (Some(SourceRef::Many(_)), Extract::MaxAbs) | (Some(SourceRef::One(_)), Extract::MaxAbs) => {
            Ok(())
        }
        (Some(SourceRef::Many(_)), other) => Err(format!(
            "{field}: a list of sources is only valid with max_abs, not {other:?}"
        )),
        (_, Extract::Categorize) => {
            let table = rule.table.as_deref().unwrap_or(DEFAULT_TABLE);
            if tables.contains_key(table) {
                Ok(())
            } else {
                Err(format!("{field}: categorize refers to missing table '{table}'"))
            }
        }
        _ => Ok(()),
    }
}

fn resolve_lancamento_field(output: &[(CanonicalField, DerivationRule)]) -> String {
    output
        .iter()
        .find(|(field, _)| *field == CanonicalField::Lancamento)
        .and_then(|(_, rule)| match &rule.source {
            Some(SourceRef::One(name)) => Some(name.clone()),
            Some(SourceRef::Many(names)) => names.first().cloned(),
            None => None,
        })
        .unwrap_or_else(|| "lancamento".to_string())
}
