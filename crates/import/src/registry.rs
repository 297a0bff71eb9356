use custodia_core::{MonthTable, MonthTableError};
use indexmap::IndexMap;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

use crate::fund::{FundAliasTable, FundTypeTable};
use crate::schema::{ConfigDocument, SharedTables, SourceConfig, SourceSchema};

#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid JSON configuration: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid TOML configuration: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Invalid month translation: {0}")]
    MonthTable(#[from] MonthTableError),
    #[error("Unsupported configuration format: {0}")]
    UnsupportedFormat(String),
    #[error("No schema configured for source '{0}'")]
    NotFound(String),
    #[error("Schema for source '{source_id}' is malformed: {reason}")]
    Malformed { source_id: String, reason: String },
}

/// Every source schema of one configuration document, keyed by source id.
///
/// Built once and never mutated, so a shared reference can be handed to any
/// number of threads.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    schemas: IndexMap<String, SourceSchema>,
    rejected: IndexMap<String, Rejected>,
}

/// A source that failed to compile. Its file patterns are kept, when they
/// could be read, so its files can still be attributed to it.
#[derive(Debug)]
struct Rejected {
    reason: String,
    file_patterns: Vec<String>,
}

/// Result of matching a file name against every configured source.
#[derive(Debug, Clone, Copy)]
pub enum Detection<'a> {
    Found(&'a SourceSchema),
    Rejected { source_id: &'a str, reason: &'a str },
    Unmatched,
}

impl SchemaRegistry {
    /// Load from a `.json` or `.toml` file.
    pub fn load(path: &Path) -> Result<Self, SchemaError> {
        let content = std::fs::read_to_string(path)?;
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_lowercase();
        match ext.as_str() {
            "json" => Self::from_json(&content),
            "toml" => Self::from_toml(&content),
            other => Err(SchemaError::UnsupportedFormat(other.to_string())),
        }
    }

    pub fn from_json(content: &str) -> Result<Self, SchemaError> {
        let document: ConfigDocument = serde_json::from_str(content)?;
        Self::from_document(document)
    }

    pub fn from_toml(content: &str) -> Result<Self, SchemaError> {
        let document: ConfigDocument = toml::from_str(content)?;
        Self::from_document(document)
    }

    /// Compile every source. Document-level problems (bad month table) fail
    /// the whole load; a malformed source is recorded and only fails lookups
    /// of that source.
    pub fn from_document(document: ConfigDocument) -> Result<Self, SchemaError> {
        let months = match &document.month_translation {
            Some(pairs) => {
                MonthTable::from_pairs(pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())))?
            }
            None => MonthTable::portuguese(),
        };
        let mut fund_types = document
            .fund_types
            .as_ref()
            .map(FundTypeTable::from_config)
            .unwrap_or_default();
        if let Some(overrides) = &document.fund_type_overrides {
            fund_types = fund_types.with_overrides(overrides);
        }
        let shared = Arc::new(SharedTables {
            months,
            fund_types,
            fund_aliases: FundAliasTable::from_config(&document.fund_aliases),
        });

        let mut registry = SchemaRegistry::default();
        for (id, raw) in document.custodiantes {
            let raw_patterns = raw.get("file_patterns").cloned();
            let compiled = serde_json::from_value::<SourceConfig>(raw)
                .map_err(|e| e.to_string())
                .and_then(|config| SourceSchema::compile(&id, config, Arc::clone(&shared)));
            match compiled {
                Ok(schema) => {
                    tracing::debug!(
                        source = %id,
                        fields = schema.fields.len(),
                        outputs = schema.output.len(),
                        "schema loaded"
                    );
                    registry.schemas.insert(id, schema);
                }
                Err(reason) => {
                    tracing::warn!(source = %id, %reason, "schema rejected");
                    let file_patterns = raw_file_patterns(raw_patterns.as_ref());
                    registry.rejected.insert(id, Rejected { reason, file_patterns });
                }
            }
        }
        Ok(registry)
    }

    /// Exact id first, then a case-insensitive match.
    pub fn get(&self, source_id: &str) -> Result<&SourceSchema, SchemaError> {
        let key = self.resolve_key(source_id);
        if let Some(schema) = key.and_then(|k| self.schemas.get(k)) {
            return Ok(schema);
        }
        if let Some((id, rejected)) = key.and_then(|k| self.rejected.get_key_value(k)) {
            return Err(SchemaError::Malformed {
                source_id: id.clone(),
                reason: rejected.reason.clone(),
            });
        }
        Err(SchemaError::NotFound(source_id.to_string()))
    }

    /// First source, in configuration order, whose file patterns match.
    pub fn detect(&self, file_name: &str) -> Option<&SourceSchema> {
        self.schemas.values().find(|s| s.matches_file(file_name))
    }

    /// Like `detect`, but a file that only matches a rejected source is
    /// reported with that source's rejection reason.
    pub fn detect_with_rejected(&self, file_name: &str) -> Detection<'_> {
        if let Some(schema) = self.detect(file_name) {
            return Detection::Found(schema);
        }
        let lower = file_name.to_lowercase();
        self.rejected
            .iter()
            .find(|(_, r)| r.file_patterns.iter().any(|p| lower.contains(p.as_str())))
            .map_or(Detection::Unmatched, |(id, r)| Detection::Rejected {
                source_id: id,
                reason: &r.reason,
            })
    }

    pub fn sources(&self) -> impl Iterator<Item = &SourceSchema> {
        self.schemas.values()
    }

    pub fn rejected(&self) -> impl Iterator<Item = (&str, &str)> {
        self.rejected
            .iter()
            .map(|(id, r)| (id.as_str(), r.reason.as_str()))
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    fn resolve_key<'a>(&'a self, source_id: &'a str) -> Option<&'a str> {
        let known = self.schemas.keys().chain(self.rejected.keys());
        if self.schemas.contains_key(source_id) || self.rejected.contains_key(source_id) {
            return Some(source_id);
        }
        known
            .map(String::as_str)
            .find(|k| k.eq_ignore_ascii_case(source_id.trim()))
    }
}

/// Lowercased patterns from a raw source entry, ignoring anything that is
/// not a list of strings.
fn raw_file_patterns(value: Option<&serde_json::Value>) -> Vec<String> {
    value
        .and_then(serde_json::Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(serde_json::Value::as_str)
                .map(str::to_lowercase)
                .filter(|p| !p.is_empty())
                .collect()
        })
        .unwrap_or_default()
}
