//! Locale value parsing for Chilean peso amounts and RUT identifiers.
//!
//! Everything here is pure and never fails loudly: unparseable input is
//! reported as `None` so the caller can store an explicit null.

use std::sync::LazyLock;

use regex::Regex;

/// Textual placeholders the portal uses for "no value".
const PLACEHOLDERS: &[&str] = &[
    "",
    "-",
    "--",
    "no informa",
    "no aplica",
    "n/a",
    "s/i",
    "sin información",
    "sin informacion",
];

static RUT_STRICT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*\d{1,2}\.?\d{3}\.?\d{3}-?[\dkK]\s*$").expect("valid RUT regex")
});

static RUT_LOOSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d{7,8}-?[\dkK]").expect("valid loose RUT regex"));

static THOUSANDS_GROUPED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*-?\s*\d{1,3}(\.\d{3})+\s*$").expect("valid grouping regex")
});

/// Replace non-breaking and other unicode spaces with plain spaces.
fn clean_spaces(text: &str) -> String {
    text.chars()
        .map(|c| if c.is_whitespace() { ' ' } else { c })
        .collect()
}

/// Returns true if the text is one of the portal's "no value" markers.
pub fn is_placeholder(text: &str) -> bool {
    let lower = clean_spaces(text).trim().to_lowercase();
    PLACEHOLDERS.contains(&lower.as_str())
}

/// Parse a Chilean peso amount.
///
/// `"$ 1.234.567"` is 1234567, `"1.234,56"` is 1234.56 and `"($ 500.000)"`
/// is -500000. Placeholders and garbage both yield `None`, never zero.
pub fn parse_money(text: &str) -> Option<f64> {
    let spaced = clean_spaces(text);
    let mut cleaned = spaced.trim();
    if is_placeholder(cleaned) {
        return None;
    }

    let mut negative = false;
    if cleaned.starts_with('(') && cleaned.ends_with(')') && cleaned.len() >= 2 {
        negative = true;
        cleaned = &cleaned[1..cleaned.len() - 1];
    }

    let mut digits: String = cleaned
        .chars()
        .filter(|c| *c != '$' && !c.is_whitespace())
        .collect();
    if digits.is_empty() {
        return None;
    }

    if digits.contains(',') {
        digits = digits.replace('.', "").replace(',', ".");
    } else {
        let dots = digits.matches('.').count();
        if dots > 1 {
            digits = digits.replace('.', "");
        } else if dots == 1 {
            let fraction = digits.rsplit('.').next().unwrap_or_default();
            if fraction.len() == 3 {
                digits = digits.replace('.', "");
            }
        }
    }

    let value: f64 = digits.parse().ok()?;
    if !value.is_finite() {
        return None;
    }
    Some(if negative { -value } else { value })
}

/// Heuristic: does this cell look like a money amount rather than an identifier?
pub fn looks_like_money(text: &str) -> bool {
    let t = text.trim();
    if t.is_empty() {
        return false;
    }
    t.contains('$') || THOUSANDS_GROUPED.is_match(t)
}

/// Strict RUT validation used for primary fields.
pub fn is_identifier(text: &str) -> bool {
    let t = text.trim();
    !t.is_empty() && RUT_STRICT.is_match(t)
}

/// Loose RUT scan, for recovery only. Returns just the matched RUT, never
/// the surrounding text.
pub fn find_identifier(text: &str) -> Option<&str> {
    RUT_LOOSE.find(text).map(|m| m.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_money_thousands() {
        assert_eq!(parse_money("$ 1.234.567"), Some(1_234_567.0));
        assert_eq!(parse_money("$ 458.832"), Some(458_832.0));
        assert_eq!(parse_money("458.832"), Some(458_832.0));
    }

    #[test]
    fn test_parse_money_decimal_comma() {
        assert_eq!(parse_money("1.234,56"), Some(1234.56));
        assert_eq!(parse_money("12,5"), Some(12.5));
    }

    #[test]
    fn test_parse_money_single_dot_decimal() {
        assert_eq!(parse_money("458.83"), Some(458.83));
        assert_eq!(parse_money("1.5"), Some(1.5));
    }

    #[test]
    fn test_parse_money_negative_parentheses() {
        assert_eq!(parse_money("($ 500.000)"), Some(-500_000.0));
    }

    #[test]
    fn test_parse_money_non_breaking_space() {
        assert_eq!(parse_money("$\u{a0}1.000"), Some(1000.0));
    }

    #[test]
    fn test_parse_money_placeholders_are_null() {
        for text in ["", "-", "--", "no informa", "No Aplica", "N/A", "s/i", "Sin Información"] {
            assert_eq!(parse_money(text), None, "{text:?}");
        }
    }

    #[test]
    fn test_parse_money_garbage_is_null() {
        assert_eq!(parse_money("abc"), None);
        assert_eq!(parse_money("$"), None);
        assert_eq!(parse_money("()"), None);
    }

    #[test]
    fn test_identifier_accepts() {
        assert!(is_identifier("12.345.678-9"));
        assert!(is_identifier("12345678-9"));
        assert!(is_identifier("12.345.678-K"));
        assert!(is_identifier("9.876.543-k"));
    }

    #[test]
    fn test_identifier_rejects() {
        assert!(!is_identifier("$ 458.832"));
        assert!(!is_identifier("1.234.567"));
        assert!(!is_identifier(""));
    }

    #[test]
    fn test_loose_identifier() {
        assert_eq!(find_identifier("RUT 15999888-7 (titular)"), Some("15999888-7"));
        assert!(is_identifier(find_identifier("rut:12345678k").unwrap()));
        assert_eq!(find_identifier("458.832"), None);
    }

    #[test]
    fn test_looks_like_money() {
        assert!(looks_like_money("$ 458.832"));
        assert!(looks_like_money("1.234.567"));
        assert!(!looks_like_money("15.999.888-7"));
        assert!(!looks_like_money("Enfermera"));
    }
}
