//! Next-page link discovery for paginated tables.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};

use super::{dedupe, resolve_link};
use crate::scrapers::extract::tables::element_text;

static ANCHOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("static selector"));

static PAGE_PARAM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)[?&](page|p|cur|pag|pagina)=(\d+)").expect("valid page param regex")
});

static NEXT_CLASS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)paginator.*next|next.*page").expect("valid next class regex")
});

const NEXT_TEXTS: [&str; 5] = ["siguiente", ">>", "›", "next", ">"];

/// Page number carried in a URL's page query parameter.
fn page_number(url: &str) -> Option<u32> {
    PAGE_PARAM.captures(url).and_then(|c| c[2].parse().ok())
}

/// Candidate next-page URLs, absolute and deduplicated in discovery order.
///
/// Looks for "next" anchor texts first, then numbered page links past the
/// current page in ascending order, then paginator "next" classes. A page
/// without a page parameter counts as page 1.
pub fn next_page_links(html: &str, page_url: &str) -> Vec<String> {
    let current = page_number(page_url).unwrap_or(1);
    let document = Html::parse_document(html);
    let anchors: Vec<_> = document.select(&ANCHOR).collect();
    let href = |a: &scraper::ElementRef<'_>| a.value().attr("href").unwrap_or_default().trim().to_string();

    let by_text = anchors.iter().filter(|a| {
        let text = element_text(**a).to_lowercase();
        NEXT_TEXTS.contains(&text.as_str()) && !href(a).starts_with("javascript:void")
    });
    let mut by_param: Vec<_> = anchors
        .iter()
        .filter_map(|a| page_number(&href(a)).filter(|n| *n > current).map(|n| (n, a)))
        .collect();
    by_param.sort_by_key(|(n, _)| *n);
    let by_class = anchors.iter().filter(|a| {
        a.value()
            .attr("class")
            .map(|c| NEXT_CLASS.is_match(c))
            .unwrap_or(false)
    });

    let links = by_text
        .chain(by_param.into_iter().map(|(_, a)| a))
        .chain(by_class)
        .filter_map(|a| resolve_link(page_url, &href(a)));
    dedupe(links)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_links_in_priority_order() {
        let html = r#"
            <a href="?page=1">1</a>
            <a href="?page=2">2</a>
            <a href="/lista?page=2">Siguiente</a>
            <a href="javascript:void(0)">&gt;</a>
            <a class="ui-paginator-next" href="/lista?page=2">x</a>"#;
        let links = next_page_links(html, "https://portal.cl/lista?page=1");
        assert_eq!(links, vec!["https://portal.cl/lista?page=2".to_string()]);
    }

    #[test]
    fn test_numbered_links_skip_current_and_earlier_pages() {
        let html = r#"
            <a href="?page=4">4</a>
            <a href="?page=1">1</a>
            <a href="?page=3">3</a>
            <a href="?page=2">2</a>"#;
        let links = next_page_links(html, "https://portal.cl/lista?page=2");
        assert_eq!(
            links,
            vec![
                "https://portal.cl/lista?page=3".to_string(),
                "https://portal.cl/lista?page=4".to_string(),
            ]
        );

        let from_first = next_page_links(html, "https://portal.cl/lista");
        assert_eq!(from_first[0], "https://portal.cl/lista?page=2");
        assert!(!from_first.contains(&"https://portal.cl/lista?page=1".to_string()));
    }

    #[test]
    fn test_no_links() {
        assert!(next_page_links("<p>nada</p>", "https://portal.cl/").is_empty());
    }
}
