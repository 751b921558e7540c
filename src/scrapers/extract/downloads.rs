//! Bulk export link discovery.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};

use super::resolve_link;
use super::tables::element_text;

static ANCHOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("static selector"));

static DOWNLOAD_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [r"\.csv", r"\.xlsx?", r"export", r"descargar", r"download"]
        .iter()
        .map(|p| Regex::new(p).expect("valid download regex"))
        .collect()
});

/// A link that looks like it serves a file export.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DownloadLink {
    pub url: String,
    pub text: String,
}

fn is_download(href: &str, text: &str) -> bool {
    DOWNLOAD_PATTERNS
        .iter()
        .any(|p| p.is_match(href) || p.is_match(text))
}

/// Anchors whose href or text matches a download pattern, in page order.
pub fn download_links(html: &str, page_url: &str) -> Vec<DownloadLink> {
    let document = Html::parse_document(html);
    let mut links: Vec<DownloadLink> = Vec::new();
    for anchor in document.select(&ANCHOR) {
        let href = anchor.value().attr("href").unwrap_or_default();
        let text = element_text(anchor).to_lowercase();
        if !is_download(&href.to_lowercase(), &text) {
            continue;
        }
        if let Some(url) = resolve_link(page_url, href) {
            if !links.iter().any(|l| l.url == url) {
                links.push(DownloadLink { url, text });
            }
        }
    }
    links
}

/// Whether a fetched export should be read as a spreadsheet.
pub fn is_spreadsheet(content_type: &str, url: &str) -> bool {
    let content_type = content_type.to_ascii_lowercase();
    let path = url
        .split(['?', '#'])
        .next()
        .unwrap_or(url)
        .to_ascii_lowercase();
    content_type.contains("excel")
        || content_type.contains("spreadsheet")
        || path.ends_with(".xlsx")
        || path.ends_with(".xls")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_download_links() {
        let html = r#"
            <a href="/docs/honorarios.csv">Archivo</a>
            <a href="/ver?id=3">Descargar planilla</a>
            <a href="/inicio">Inicio</a>
            <a href="/docs/honorarios.csv">otra vez</a>
            <a href="javascript:exportar()">Export</a>"#;
        let links = download_links(html, "https://portal.cl/seccion/");
        let urls: Vec<_> = links.iter().map(|l| l.url.as_str()).collect();
        assert_eq!(
            urls,
            vec!["https://portal.cl/docs/honorarios.csv", "https://portal.cl/ver?id=3"]
        );
    }

    #[test]
    fn test_is_spreadsheet() {
        assert!(is_spreadsheet("application/vnd.ms-excel", "https://x/f"));
        assert!(is_spreadsheet("application/octet-stream", "https://x/f.XLSX?t=1"));
        assert!(!is_spreadsheet("text/csv", "https://x/f.csv"));
    }
}
