// src/utils/text.rs

//! Text normalization and similarity utilities.

use std::collections::HashSet;
use std::hash::Hash;
use std::sync::LazyLock;

use regex::Regex;
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

static NON_WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\w\s]").unwrap());
static PARENTHESIZED: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\(([^)]*)\)").unwrap());
static AMOUNT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d[\d\s\u{a0}\u{202f}.,']*").unwrap());

/// Remove diacritics by decomposing and dropping combining marks.
pub fn strip_accents(s: &str) -> String {
    s.nfd().filter(|c| !is_combining_mark(*c)).collect()
}

/// Lowercase, strip accents, turn punctuation into spaces and collapse whitespace.
///
/// # Examples
/// ```
/// use tender_feed::utils::text::normalize_text;
///
/// assert_eq!(
///     normalize_text("Mission de Géomètre-Expert — bornage"),
///     "mission de geometre expert bornage"
/// );
/// ```
pub fn normalize_text(s: &str) -> String {
    let lowered = strip_accents(&s.to_lowercase());
    let spaced = NON_WORD.replace_all(&lowered, " ");
    spaced.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Same as [`normalize_text`] for optional fields; `None` becomes empty.
pub fn normalize_opt(s: Option<&str>) -> String {
    s.map(normalize_text).unwrap_or_default()
}

/// Set of normalized words in a text.
pub fn word_set(s: &str) -> HashSet<String> {
    normalize_text(s)
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// Jaccard index of two sets. Empty sets have no similarity.
pub fn jaccard<T: Eq + Hash>(a: &HashSet<T>, b: &HashSet<T>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.union(b).count();
    intersection as f64 / union as f64
}

/// Token-set Jaccard similarity of two texts.
pub fn token_jaccard(a: &str, b: &str) -> f64 {
    jaccard(&word_set(a), &word_set(b))
}

/// Digits of the first parenthesized group, at most three.
///
/// `"(92) Hauts-de-Seine"` gives `Some("92")`.
pub fn parenthesized_code(s: &str) -> Option<String> {
    let inside = PARENTHESIZED.captures(s)?.get(1)?.as_str();
    let code: String = inside.chars().filter(char::is_ascii_digit).take(3).collect();
    (!code.is_empty()).then_some(code)
}

/// Parse an amount printed in French conventions (`"300 000,00 €"`).
pub fn parse_amount(raw: &str) -> Option<f64> {
    let found = AMOUNT.find(raw)?.as_str();
    let compact: String = found
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '\'')
        .collect();
    let compact = compact.trim_end_matches(['.', ',']);

    let number = if compact.contains(',') {
        compact.replace('.', "").replace(',', ".")
    } else if compact.matches('.').count() > 1 {
        compact.replace('.', "")
    } else if let Some((_, decimals)) = compact.split_once('.') {
        // "1.250" reads as a thousands separator
        if decimals.len() == 3 {
            compact.replace('.', "")
        } else {
            compact.to_string()
        }
    } else {
        compact.to_string()
    };

    number.parse::<f64>().ok()
}

/// Trimmed copy of an optional string; blank becomes `None`.
pub fn clean(s: Option<&str>) -> Option<String> {
    s.map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_accents() {
        assert_eq!(strip_accents("géomètre état"), "geometre etat");
        assert_eq!(strip_accents("ÉDD"), "EDD");
    }

    #[test]
    fn test_normalize_text_collapses_punctuation() {
        assert_eq!(normalize_text("  AO   GEOMETRE, 2022!  "), "ao geometre 2022");
        assert_eq!(normalize_text("l'état descriptif"), "l etat descriptif");
        assert_eq!(normalize_text("—"), "");
    }

    #[test]
    fn test_normalize_opt() {
        assert_eq!(normalize_opt(None), "");
        assert_eq!(normalize_opt(Some("Ville de Paris")), "ville de paris");
    }

    #[test]
    fn test_jaccard() {
        assert_eq!(token_jaccard("a b c", "a b c"), 1.0);
        assert_eq!(token_jaccard("a b", "c d"), 0.0);
        assert_eq!(token_jaccard("", "a"), 0.0);
        assert!((token_jaccard("a b c", "a b d") - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_jaccard_ignores_case_and_accents() {
        assert_eq!(token_jaccard("Bornage Géomètre", "geometre BORNAGE"), 1.0);
    }

    #[test]
    fn test_parenthesized_code() {
        assert_eq!(parenthesized_code("(92) Hauts-de-Seine"), Some("92".to_string()));
        assert_eq!(parenthesized_code("( 78 ) Yvelines"), Some("78".to_string()));
        assert_eq!(parenthesized_code("Hauts-de-Seine"), None);
        assert_eq!(parenthesized_code("(IDF) Région"), None);
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("300 000,00 €"), Some(300000.0));
        assert_eq!(parse_amount("300000"), Some(300000.0));
        assert_eq!(parse_amount("1.250.000 € HT"), Some(1250000.0));
        assert_eq!(parse_amount("45.5 k€"), Some(45.5));
        assert_eq!(parse_amount("12.500 €"), Some(12500.0));
        assert_eq!(parse_amount("non communiqué"), None);
    }

    #[test]
    fn test_clean() {
        assert_eq!(clean(Some("  x ")), Some("x".to_string()));
        assert_eq!(clean(Some("   ")), None);
        assert_eq!(clean(None), None);
    }
}
