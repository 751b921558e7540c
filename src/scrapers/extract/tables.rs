//! HTML table discovery, scoring and row extraction.

use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use super::ParsedTable;
use crate::mapping::{expand_colspan, parse_colspan};
use crate::models::RecordKind;
use crate::scrapers::portal::table_keywords;

static TABLE: LazyLock<Selector> = LazyLock::new(|| sel("table"));
static TR: LazyLock<Selector> = LazyLock::new(|| sel("tr"));
static THEAD_TH: LazyLock<Selector> = LazyLock::new(|| sel("thead th"));
static THEAD_TD: LazyLock<Selector> = LazyLock::new(|| sel("thead td"));
static TH: LazyLock<Selector> = LazyLock::new(|| sel("th"));
static TD: LazyLock<Selector> = LazyLock::new(|| sel("td"));
static CELL: LazyLock<Selector> = LazyLock::new(|| sel("td, th"));

fn sel(css: &str) -> Selector {
    Selector::parse(css).expect("static selector")
}

/// Collapsed visible text of an element.
pub fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Where a table's headers came from. First-row headers are not data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HeaderSource {
    Thead,
    FirstRow,
    None,
}

fn expand(cells: Vec<ElementRef<'_>>) -> Vec<String> {
    let texts: Vec<(String, usize)> = cells
        .into_iter()
        .map(|c| (element_text(c), parse_colspan(c.value().attr("colspan"))))
        .collect();
    expand_colspan(texts.iter().map(|(t, n)| (t.as_str(), *n)))
}

fn looks_numeric(text: &str) -> bool {
    let digits = text.replace(['.', ','], "");
    !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())
}

/// Direct rows of a table, skipping `thead` and nested tables.
fn body_rows(table: ElementRef<'_>) -> Vec<ElementRef<'_>> {
    let mut rows = Vec::new();
    for child in table.children().filter_map(ElementRef::wrap) {
        match child.value().name() {
            "tr" => rows.push(child),
            "tbody" | "tfoot" => rows.extend(
                child
                    .children()
                    .filter_map(ElementRef::wrap)
                    .filter(|e| e.value().name() == "tr"),
            ),
            _ => {}
        }
    }
    rows
}

fn headers_with_source(table: ElementRef<'_>) -> (Vec<String>, HeaderSource) {
    for selector in [&*THEAD_TH, &*THEAD_TD] {
        let cells: Vec<_> = table.select(selector).collect();
        if !cells.is_empty() {
            return (expand(cells), HeaderSource::Thead);
        }
    }

    if let Some(first) = body_rows(table).into_iter().next() {
        let ths: Vec<_> = first.select(&TH).collect();
        if !ths.is_empty() {
            return (expand(ths), HeaderSource::FirstRow);
        }
        let tds: Vec<_> = first.select(&TD).collect();
        if !tds.is_empty() {
            let candidate = expand(tds);
            if candidate
                .iter()
                .any(|c| !c.is_empty() && !looks_numeric(c))
            {
                return (candidate, HeaderSource::FirstRow);
            }
        }
    }

    (Vec::new(), HeaderSource::None)
}

/// Column headers of a table with colspan expansion.
///
/// Tries `thead th`, `thead td`, first-row `th`, then first-row `td` when at
/// least one cell is not a bare number.
pub fn table_headers(table: ElementRef<'_>) -> Vec<String> {
    headers_with_source(table).0
}

fn row_count(table: ElementRef<'_>) -> usize {
    table.select(&TR).count()
}

/// Pick the table most likely to hold the kind's data.
///
/// Scores each table by how many kind keywords appear in its joined headers,
/// ignoring tables with one row or less. Falls back to the largest table
/// with at least three headers.
pub fn best_table<'a>(document: &'a Html, kind: RecordKind) -> Option<ElementRef<'a>> {
    let keywords = table_keywords(kind);
    let mut best: Option<(usize, ElementRef<'a>)> = None;

    for table in document.select(&TABLE) {
        let headers = table_headers(table);
        if headers.is_empty() {
            continue;
        }
        let joined = headers.join(" ").to_lowercase();
        let score = keywords.iter().filter(|kw| joined.contains(*kw)).count();
        let best_score = best.map(|(s, _)| s).unwrap_or(0);
        if score > best_score && row_count(table) > 1 {
            best = Some((score, table));
        }
    }

    best.map(|(_, t)| t).or_else(|| {
        document
            .select(&TABLE)
            .filter(|t| table_headers(*t).len() >= 3)
            .map(|t| (row_count(t), t))
            .filter(|(rows, _)| *rows > 1)
            .fold(None, |largest: Option<(usize, ElementRef<'a>)>, (rows, t)| match largest {
                Some((most, _)) if most >= rows => largest,
                _ => Some((rows, t)),
            })
            .map(|(_, t)| t)
    })
}

/// Headers plus non-blank data rows of one table.
pub fn parse_table(table: ElementRef<'_>) -> Option<ParsedTable> {
    let (headers, source) = headers_with_source(table);
    if headers.is_empty() {
        return None;
    }

    let skip = usize::from(source == HeaderSource::FirstRow);
    let rows: Vec<Vec<String>> = body_rows(table)
        .into_iter()
        .skip(skip)
        .map(|tr| tr.select(&CELL).map(element_text).collect::<Vec<_>>())
        .filter(|cells| !cells.is_empty())
        .filter(|cells| cells.iter().take(headers.len()).any(|c| !c.is_empty()))
        .collect();

    debug!(
        "Parsed table: {} columns, {} rows",
        headers.len(),
        rows.len()
    );
    Some(ParsedTable { headers, rows })
}

/// Parse the best-scoring table in an HTML document.
pub fn parse_best_table(html: &str, kind: RecordKind) -> Option<ParsedTable> {
    let document = Html::parse_document(html);
    best_table(&document, kind)
        .and_then(parse_table)
        .filter(|t| !t.rows.is_empty())
}

/// Like [`parse_best_table`], but tables matched by the preferred CSS
/// selectors are tried first, in order.
pub fn parse_preferred_table(
    html: &str,
    kind: RecordKind,
    preferred: &[String],
) -> Option<ParsedTable> {
    let document = Html::parse_document(html);
    let from_bank = preferred
        .iter()
        .filter_map(|css| Selector::parse(css).ok())
        .find_map(|selector| {
            document
                .select(&selector)
                .filter(|e| e.value().name() == "table")
                .filter_map(parse_table)
                .find(|t| !t.rows.is_empty())
        });
    from_bank.or_else(|| {
        best_table(&document, kind)
            .and_then(parse_table)
            .filter(|t| !t.rows.is_empty())
    })
}

/// Number of `tr` elements in the largest table on the page.
pub fn max_table_rows(document: &Html) -> usize {
    document.select(&TABLE).map(row_count).max().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html><body>
        <table id="menu"><tr><td>Inicio</td><td>Contacto</td></tr></table>
        <table id="data">
          <thead><tr><th>Nombre</th><th>RUT</th><th colspan="2">Remuneración</th></tr></thead>
          <tbody>
            <tr><td>ANA</td><td>12.345.678-9</td><td>$ 500.000</td><td>$ 420.000</td></tr>
            <tr><td></td><td> </td><td></td><td></td></tr>
            <tr><td>LUIS</td><td>9.876.543-2</td><td>$ 600.000</td><td>$ 510.000</td></tr>
          </tbody>
        </table>
        </body></html>"#;

    #[test]
    fn test_best_table_by_keywords() {
        let table = parse_best_table(PAGE, RecordKind::Honorarium).unwrap();
        assert_eq!(
            table.headers,
            vec!["Nombre", "RUT", "Remuneración", "Remuneración (2)"]
        );
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[1][0], "LUIS");
    }

    #[test]
    fn test_first_row_headers_are_not_data() {
        let html = r#"<table>
            <tr><td>Nombre</td><td>Grado</td><td>Cargo</td></tr>
            <tr><td>ANA</td><td>10</td><td>Administrativo</td></tr>
            <tr><td>LUIS</td><td>12</td><td>Auxiliar</td></tr>
        </table>"#;
        let table = parse_best_table(html, RecordKind::Staff).unwrap();
        assert_eq!(table.headers, vec!["Nombre", "Grado", "Cargo"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0][0], "ANA");
    }

    #[test]
    fn test_numeric_first_row_is_not_a_header() {
        let html = r#"<table><tr><td>1</td><td>2.000</td></tr><tr><td>3</td><td>4</td></tr></table>"#;
        let document = Html::parse_document(html);
        let table = document.select(&TABLE).next().unwrap();
        assert!(table_headers(table).is_empty());
        assert!(parse_best_table(html, RecordKind::Honorarium).is_none());
    }

    #[test]
    fn test_fallback_to_wide_table() {
        let html = r#"<table>
            <tr><th>A</th><th>B</th><th>C</th></tr>
            <tr><td>1</td><td>2</td><td>3</td></tr>
            <tr><td>4</td><td>5</td><td>6</td></tr>
        </table>"#;
        let table = parse_best_table(html, RecordKind::Contract).unwrap();
        assert_eq!(table.rows.len(), 2);
    }

    #[test]
    fn test_preferred_selector_wins() {
        let html = r#"
            <table class="tabla-datos"><tr><th>X</th><th>Y</th></tr><tr><td>a</td><td>b</td></tr></table>
            <table><tr><th>Nombre</th><th>RUT</th></tr><tr><td>c</td><td>d</td></tr><tr><td>e</td><td>f</td></tr></table>"#;
        let preferred = vec!["table.tabla-datos".to_string()];
        let table = parse_preferred_table(html, RecordKind::Honorarium, &preferred).unwrap();
        assert_eq!(table.headers, vec!["X", "Y"]);
    }
}
