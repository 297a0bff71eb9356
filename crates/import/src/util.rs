/// Header key used for column lookup: trimmed, lowercased, inner whitespace
/// collapsed to single spaces.
pub fn normalize_header(s: &str) -> String {
    collapse_whitespace(s).to_lowercase()
}

/// Trim and collapse every run of whitespace to a single space.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Strip any of `suffixes` from the end of `s`, case-insensitively, until
/// none applies. A suffix only matches as a whole trailing token, and the
/// whitespace or dashes left in front of it are removed as well.
pub fn strip_suffixes(s: &str, suffixes: &[String]) -> String {
    let mut current = s.trim().to_string();
    while let Some(cut) = suffixes
        .iter()
        .find_map(|suffix| trailing_token_start(&current, suffix.trim()))
    {
        current = current[..cut]
            .trim_end_matches(|c: char| c.is_whitespace() || c == '-')
            .to_string();
    }
    current
}

/// Byte offset where `suffix` starts if `s` ends with it as a separate token.
fn trailing_token_start(s: &str, suffix: &str) -> Option<usize> {
    if suffix.is_empty() || s.len() <= suffix.len() {
        return None;
    }
    let cut = s.len() - suffix.len();
    if !s.is_char_boundary(cut) || s[cut..].to_uppercase() != suffix.to_uppercase() {
        return None;
    }
    let preceded_by_separator = s[..cut]
        .chars()
        .next_back()
        .is_some_and(|c| c.is_whitespace() || c == '-');
    preceded_by_separator.then_some(cut)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_header_ignores_case_and_spacing() {
        assert_eq!(normalize_header("  Nome da   Classe "), "nome da classe");
        assert_eq!(normalize_header("Financeiro (R$)"), "financeiro (r$)");
    }

    #[test]
    fn collapse_whitespace_trims_and_joins() {
        assert_eq!(collapse_whitespace("  ALFA \t  FIDC\n"), "ALFA FIDC");
        assert_eq!(collapse_whitespace("   "), "");
    }

    #[test]
    fn strip_suffixes_removes_repeated_noise() {
        let noise = vec!["RL".to_string(), "NP".to_string()];
        assert_eq!(strip_suffixes("PINPAG FIDC - NP - RL", &noise), "PINPAG FIDC");
        assert_eq!(strip_suffixes("pinpag fidc - rl", &noise), "pinpag fidc");
    }

    #[test]
    fn strip_suffixes_only_matches_whole_tokens() {
        let noise = vec!["RL".to_string()];
        assert_eq!(strip_suffixes("CARL", &noise), "CARL");
        assert_eq!(strip_suffixes("RL", &noise), "RL");
        assert_eq!(strip_suffixes("ALFA", &[]), "ALFA");
    }
}
