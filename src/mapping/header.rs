//! Header text normalization, header indexes and colspan expansion.

use std::collections::HashMap;

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Normalize header text for fuzzy matching.
///
/// Decomposes and drops combining marks, lowercases, turns dots and
/// underscores into spaces and collapses whitespace. Idempotent.
pub fn normalize_header(text: &str) -> String {
    let stripped: String = text
        .nfkd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase()
        .replace(['.', '_'], " ");
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalized header text to column ordinal. First occurrence wins.
#[derive(Debug, Clone, Default)]
pub struct HeaderIndex {
    order: Vec<(String, usize)>,
    lookup: HashMap<String, usize>,
}

impl HeaderIndex {
    pub fn build<'a>(headers: impl IntoIterator<Item = &'a str>) -> Self {
        let mut index = Self::default();
        for (position, raw) in headers.into_iter().enumerate() {
            let key = normalize_header(raw);
            if key.is_empty() || index.lookup.contains_key(&key) {
                continue;
            }
            index.lookup.insert(key.clone(), position);
            index.order.push((key, position));
        }
        index
    }

    /// Column whose normalized header equals `alias`.
    pub fn exact(&self, alias: &str) -> Option<usize> {
        self.lookup.get(alias).copied()
    }

    /// First column (in header order) whose normalized header contains `alias`.
    pub fn containing(&self, alias: &str) -> Option<usize> {
        self.order
            .iter()
            .find(|(key, _)| key.contains(alias))
            .map(|(_, position)| *position)
    }

    /// First column whose normalized header (longer than 2 chars) is inside `alias`.
    pub fn contained_in(&self, alias: &str) -> Option<usize> {
        self.order
            .iter()
            .find(|(key, _)| key.chars().count() > 2 && alias.contains(key.as_str()))
            .map(|(_, position)| *position)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Expand header cells by colspan so header count equals data column count.
///
/// A cell spanning N columns emits its text, then `"{text} (2)"` .. `"{text} (N)"`.
pub fn expand_colspan<'a>(cells: impl IntoIterator<Item = (&'a str, usize)>) -> Vec<String> {
    let mut headers = Vec::new();
    for (text, span) in cells {
        let text = text.trim();
        headers.push(text.to_string());
        for i in 2..=span.max(1) {
            headers.push(format!("{} ({})", text, i));
        }
    }
    headers
}

/// Parse a colspan attribute, defaulting to 1 on absence or garbage.
pub fn parse_colspan(value: Option<&str>) -> usize {
    value
        .and_then(|v| v.trim().parse::<usize>().ok())
        .filter(|n| *n >= 1)
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_accent_and_case() {
        assert_eq!(normalize_header("Remuneración Bruta"), "remuneracion bruta");
        assert_eq!(normalize_header("REMUNERACION BRUTA"), "remuneracion bruta");
        assert_eq!(normalize_header("  Grado  E.U.S. "), "grado e u s");
        assert_eq!(normalize_header("fecha_de_término"), "fecha de termino");
    }

    #[test]
    fn test_normalize_idempotent() {
        for s in ["Remuneración Bruta", "N° de R.U.T.", "Año", "  mixed\t_ws__.x "] {
            let once = normalize_header(s);
            assert_eq!(normalize_header(&once), once);
        }
    }

    #[test]
    fn test_header_index_first_occurrence_wins() {
        let index = HeaderIndex::build(["RUT", "Nombre", "rut"]);
        assert_eq!(index.exact("rut"), Some(0));
        assert_eq!(index.exact("nombre"), Some(1));
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn test_header_index_substring_lookups() {
        let index = HeaderIndex::build(["Nombre completo", "Grado", "Hr"]);
        assert_eq!(index.containing("nombre"), Some(0));
        assert_eq!(index.contained_in("grado eus"), Some(1));
        assert_eq!(index.contained_in("hrs semanales"), None);
    }

    #[test]
    fn test_colspan_expansion() {
        let headers = expand_colspan([
            ("Nombre", 1),
            ("Remuneración", 2),
            ("RUT", 1),
            ("Cargo", 1),
        ]);
        assert_eq!(
            headers,
            vec!["Nombre", "Remuneración", "Remuneración (2)", "RUT", "Cargo"]
        );
    }

    #[test]
    fn test_parse_colspan() {
        assert_eq!(parse_colspan(Some("3")), 3);
        assert_eq!(parse_colspan(Some("0")), 1);
        assert_eq!(parse_colspan(Some("x")), 1);
        assert_eq!(parse_colspan(None), 1);
    }
}
