use indexmap::IndexMap;

use crate::rules::FALLBACK_KEY;
use crate::util::{collapse_whitespace, strip_suffixes};

pub const UNKNOWN_FUND_TYPE: &str = "Outro";

/// Most specific patterns first: "FIC FIM CP" must be seen before "FIM".
const BUILTIN_FUND_TYPES: &[(&str, &str)] = &[
    ("FICFIM CP", "FICFIM CP"),
    ("FIC FIM CP", "FICFIM CP"),
    ("FIC DE FIM CP", "FICFIM CP"),
    ("FICFIDC", "FICFIDC"),
    ("FIC FIDC", "FICFIDC"),
    ("FUNDO DE INVESTIMENTO EM COTAS DE FUNDOS DE INVESTIMENTO EM DIREITOS", "FICFIDC"),
    ("FICFIA", "FICFIA"),
    ("FIC FIA", "FICFIA"),
    ("FUNDO DE INVESTIMENTO EM COTAS DE FUNDO DE AÇÕES", "FICFIA"),
    ("FICFIM", "FICFIM"),
    ("FIC FIM", "FICFIM"),
    ("FC FIM", "FICFIM"),
    ("FIC DE FIM", "FICFIM"),
    ("FUNDO DE INVESTIMENTO EM COTAS DE FUNDO MULTIMERCADO", "FICFIM"),
    ("FIDC", "FIDC"),
    ("FUNDO DE INVESTIMENTO EM DIREITOS", "FIDC"),
    ("FUNDO DE INVEST. EM DIREITOS", "FIDC"),
    ("EM DIREITOS C", "FIDC"),
    (" EM DC", "FIDC"),
    ("FIM CP", "FIM CP"),
    ("FIM", "FIM"),
    ("MULTIMERCADO", "FIM"),
    ("FIA", "FIA"),
    ("FUNDO DE INVESTIMENTO EM AÇÕES", "FIA"),
    ("FIC", "FIC"),
    ("FUNDO DE INVESTIMENTO EM COTAS", "FIC"),
];

/// Names that no pattern recognizes, keyed by a fragment of the fund name.
/// Only consulted when the patterns fall through to the fallback type.
const BUILTIN_FUND_TYPE_OVERRIDES: &[(&str, &str)] = &[
    ("GRUPO PRIME AGRO FIC", "FICFIM"),
    ("BASÃ", "FIDC"),
    ("VISHNU FUNDO", "FIDC"),
    ("BELL FUNDO", "FIDC"),
    ("VERGINIA FUNDO", "FIDC"),
    ("NR11 FUNDO", "FIDC"),
    ("SMT AGRO HOLDING", "FICFIM"),
    ("SMT AGRO FUNDO", "FIDC"),
    ("TERTON FUNDO", "FIDC"),
    ("ARTANIS FUNDO DE INVESTIMENTO MULTIMERCA", "FIM"),
    ("GOLIATH FUNDO DE INVESTIMENTO MULTIMERCA", "FIM"),
    ("AGROCETE FUNDO DE INVESTIMENTO EM DIREIT", "FIDC"),
    ("CREDILOG II - FUNDO DE INVESTIMENTO EM D", "FIDC"),
    ("CREDILOG - FUNDO DE INVESTIMENTO EM DIRE", "FIDC"),
    ("CAPITALIZA FUNDO DE INVESTIMENTO EM DIRE", "FIDC"),
    ("FUTURO CAPITAL FUNDO DE INVESTIMENTO EM", "FIDC"),
    ("VELSO - FUNDO DE INVESTIMENTO EM DIREITO", "FIDC"),
    ("ANVERES FUNDO DE INVESTIMENTO EM DIREITO", "FIDC"),
];

/// Liability and subordination suffixes that say nothing about the fund type.
const FUND_NAME_NOISE: &[&str] = &[
    "RL",
    "RESP LIMITADA",
    "RESPONSABILIDAD LIMITADA",
    "RESPONSABILIDADE LIMTADA",
    "RESPONSABILIDADE LIMITADA",
    "NP",
    "SUBORDINADA",
];

/// Infers a fund's regulatory type from its name.
///
/// Patterns are tried against the name with its noise suffixes removed.
/// Overrides are a second pass over the full name for names the patterns
/// leave at the fallback type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FundTypeTable {
    patterns: Vec<(String, String)>,
    overrides: Vec<(String, String)>,
    noise: Vec<String>,
    fallback: String,
}

impl Default for FundTypeTable {
    fn default() -> Self {
        Self {
            patterns: owned_pairs(BUILTIN_FUND_TYPES),
            overrides: owned_pairs(BUILTIN_FUND_TYPE_OVERRIDES),
            noise: FUND_NAME_NOISE.iter().map(|s| s.to_string()).collect(),
            fallback: UNKNOWN_FUND_TYPE.to_string(),
        }
    }
}

fn owned_pairs(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

impl FundTypeTable {
    /// Patterns are matched against the uppercased name, so they are
    /// uppercased once here. A `default` entry overrides the fallback type.
    pub fn from_config(entries: &IndexMap<String, String>) -> Self {
        let fallback = entries
            .get(FALLBACK_KEY)
            .cloned()
            .unwrap_or_else(|| UNKNOWN_FUND_TYPE.to_string());
        let patterns = entries
            .iter()
            .filter(|(pattern, _)| pattern.as_str() != FALLBACK_KEY && !pattern.is_empty())
            .map(|(pattern, fund_type)| (pattern.to_uppercase(), fund_type.clone()))
            .collect();
        Self {
            patterns,
            fallback,
            ..Self::default()
        }
    }

    /// Replace the override table. Keys are normalized like fund names.
    pub fn with_overrides(mut self, entries: &IndexMap<String, String>) -> Self {
        self.overrides = entries
            .iter()
            .map(|(name, fund_type)| (normalize_fund_name(name), fund_type.clone()))
            .filter(|(name, _)| !name.is_empty())
            .collect();
        self
    }

    pub fn classify(&self, fund_name: &str) -> &str {
        let name = normalize_fund_name(fund_name);
        if name.is_empty() {
            return &self.fallback;
        }
        let key = strip_suffixes(&name, &self.noise);
        self.patterns
            .iter()
            .find(|(pattern, _)| key.contains(pattern.as_str()))
            .or_else(|| {
                self.overrides
                    .iter()
                    .find(|(fragment, _)| name.contains(fragment.as_str()))
            })
            .map(|(_, fund_type)| fund_type.as_str())
            .unwrap_or(&self.fallback)
    }
}

/// Maps feeder funds (FICs) to the FIDC they consolidate under.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FundAliasTable {
    aliases: Vec<(String, String)>,
}

impl FundAliasTable {
    pub fn from_config(entries: &IndexMap<String, String>) -> Self {
        Self {
            aliases: entries
                .iter()
                .filter(|(fic, _)| !fic.trim().is_empty())
                .map(|(fic, fidc)| (normalize_fund_name(fic), fidc.clone()))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }

    /// Exact normalized match first, then the first alias contained in the name.
    pub fn resolve(&self, fund_name: &str) -> Option<&str> {
        let name = normalize_fund_name(fund_name);
        if name.is_empty() {
            return None;
        }
        self.aliases
            .iter()
            .find(|(fic, _)| *fic == name)
            .or_else(|| self.aliases.iter().find(|(fic, _)| name.contains(fic.as_str())))
            .map(|(_, fidc)| fidc.as_str())
    }
}

fn normalize_fund_name(s: &str) -> String {
    collapse_whitespace(s).to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_table_prefers_specific_types() {
        let table = FundTypeTable::default();
        assert_eq!(table.classify("AROEIRA FIC FIM CP"), "FICFIM CP");
        assert_eq!(table.classify("Nine Capital FIC FIDC"), "FICFIDC");
        assert_eq!(table.classify("ALBAREDO FIDC"), "FIDC");
        assert_eq!(table.classify("SC FUNDO DE INVESTIMENTO EM DC"), "FIDC");
        assert_eq!(table.classify("GOLIATH MULTIMERCADO"), "FIM");
        assert_eq!(table.classify("BELLIN FIC"), "FIC");
    }

    #[test]
    fn unknown_or_blank_names_fall_back() {
        let table = FundTypeTable::default();
        assert_eq!(table.classify("VISHNU"), UNKNOWN_FUND_TYPE);
        assert_eq!(table.classify("   "), UNKNOWN_FUND_TYPE);
    }

    #[test]
    fn overrides_rescue_names_the_patterns_miss() {
        let table = FundTypeTable::default();
        assert_eq!(table.classify("VISHNU FUNDO"), "FIDC");
        assert_eq!(table.classify("Bell  Fundo"), "FIDC");
        assert_eq!(table.classify("NR11 FUNDO - RL"), "FIDC");
        assert_eq!(table.classify("SMT AGRO HOLDING"), "FICFIM");
        assert_eq!(table.classify("GOLIATH FUNDO DE INVESTIMENTO MULTIMERCA"), "FIM");
    }

    #[test]
    fn patterns_win_over_overrides() {
        // "GRUPO PRIME AGRO FIC" is an override, but "FIC" already matches.
        let table = FundTypeTable::default();
        assert_eq!(table.classify("GRUPO PRIME AGRO FIC"), "FIC");
    }

    #[test]
    fn noise_suffixes_are_ignored_by_patterns() {
        let mut entries = IndexMap::new();
        entries.insert("FIDC NP".to_string(), "FIDC NP".to_string());
        entries.insert("FIDC".to_string(), "FIDC".to_string());
        let table = FundTypeTable::from_config(&entries);
        assert_eq!(table.classify("PINPAG FIDC NP"), "FIDC");
        assert_eq!(table.classify("PINPAG FIDC NP - SUBORDINADA"), "FIDC");
    }

    #[test]
    fn configured_table_replaces_builtin() {
        let mut entries = IndexMap::new();
        entries.insert("vishnu".to_string(), "FIDC".to_string());
        entries.insert("default".to_string(), "Desconhecido".to_string());
        let table = FundTypeTable::from_config(&entries);
        assert_eq!(table.classify("Vishnu Fundo"), "FIDC");
        assert_eq!(table.classify("ALFA FIDC"), "Desconhecido");
    }

    #[test]
    fn configured_overrides_replace_builtin_overrides() {
        let mut overrides = IndexMap::new();
        overrides.insert("terra  nova".to_string(), "FIP".to_string());
        let table = FundTypeTable::default().with_overrides(&overrides);
        assert_eq!(table.classify("TERRA NOVA CAPITAL"), "FIP");
        assert_eq!(table.classify("VISHNU FUNDO"), UNKNOWN_FUND_TYPE);
    }

    #[test]
    fn alias_resolves_exact_then_contained() {
        let mut entries = IndexMap::new();
        entries.insert("aroeira fic fim".to_string(), "IPE FIDC".to_string());
        entries.insert("ATICO".to_string(), "BRAVOS FIDC".to_string());
        let table = FundAliasTable::from_config(&entries);
        assert_eq!(table.len(), 2);
        assert_eq!(table.resolve("AROEIRA  FIC FIM"), Some("IPE FIDC"));
        assert_eq!(table.resolve("ATICO FC FIM CP"), Some("BRAVOS FIDC"));
        assert_eq!(table.resolve("LION FC FIDC"), None);
        assert_eq!(table.resolve(""), None);
    }
}
