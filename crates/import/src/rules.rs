use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Key inside a configured rule table that holds the fallback label.
pub const FALLBACK_KEY: &str = "default";

/// Name of the table `categorize` uses when a rule does not name one.
pub const DEFAULT_TABLE: &str = "numero_para_categoria";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRule {
    pub pattern: String,
    pub label: String,
}

/// Ordered substring rules with an explicit fallback label.
///
/// Matching is case-sensitive and literal: tables deliberately carry
/// differently-encoded spellings of the same description as separate keys,
/// so nothing is lowercased or re-encoded. Declaration order is the only
/// precedence; there is no longest-match preference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorizationTable {
    rules: Vec<CategoryRule>,
    fallback: String,
}

impl CategorizationTable {
    pub fn new(rules: Vec<CategoryRule>, fallback: impl Into<String>) -> Self {
        Self {
            rules,
            fallback: fallback.into(),
        }
    }

    /// Build a table from its configuration form: every entry except
    /// `default` is a `pattern → label` rule, kept in document order.
    pub fn from_config(entries: &IndexMap<String, String>) -> Result<Self, String> {
        let fallback = entries
            .get(FALLBACK_KEY)
            .ok_or_else(|| format!("missing '{FALLBACK_KEY}' fallback label"))?;

        let mut rules = Vec::with_capacity(entries.len().saturating_sub(1));
        for (pattern, label) in entries {
            if pattern == FALLBACK_KEY {
                continue;
            }
            if pattern.is_empty() {
                return Err("empty pattern".to_string());
            }
            rules.push(CategoryRule {
                pattern: pattern.clone(),
                label: label.clone(),
            });
        }
        Ok(Self::new(rules, fallback.clone()))
    }

    pub fn find_matching_rule(&self, description: &str) -> Option<&CategoryRule> {
        self.rules
            .iter()
            .find(|rule| description.contains(rule.pattern.as_str()))
    }

    /// Category label for `description`; never fails.
    pub fn categorize(&self, description: &str) -> &str {
        self.find_matching_rule(description)
            .map(|rule| rule.label.as_str())
            .unwrap_or(&self.fallback)
    }

    pub fn fallback(&self) -> &str {
        &self.fallback
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }
}
