//! Page-level heuristics: "does this page have data" and "does it need a
//! real browser to render".

use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};

use super::tables::{element_text, max_table_rows};

static ANCHOR: LazyLock<Selector> = LazyLock::new(|| sel("a[href]"));
static NOSCRIPT: LazyLock<Selector> = LazyLock::new(|| sel("noscript"));
static CLASSED: LazyLock<Selector> = LazyLock::new(|| sel("[class]"));
static FORM_ID: LazyLock<Selector> = LazyLock::new(|| sel("form[id]"));
static BODY: LazyLock<Selector> = LazyLock::new(|| sel("body"));

static FRAMEWORK_CLASS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)portlet|liferay").expect("valid class regex"));
static FACES_FORM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)j_id|javax\.faces").expect("valid form regex"));

fn sel(css: &str) -> Selector {
    Selector::parse(css).expect("static selector")
}

/// Minimum body size for a direct-access page to be considered at all.
pub const MIN_PAGE_BYTES: usize = 500;

/// Body text shorter than this suggests a client-rendered shell.
const MIN_BODY_TEXT: usize = 200;

const FILE_EXTENSIONS: [&str; 3] = [".csv", ".xlsx", ".xls"];

/// A page has data when a table has more than two rows or an anchor links
/// to a spreadsheet or CSV file.
pub fn page_has_data(html: &str) -> bool {
    let document = Html::parse_document(html);
    if max_table_rows(&document) > 2 {
        return true;
    }
    document.select(&ANCHOR).any(|a| {
        let href = a.value().attr("href").unwrap_or_default().to_lowercase();
        FILE_EXTENSIONS.iter().any(|ext| href.contains(ext))
    })
}

/// Whether the page looks like it needs script execution to show its data.
///
/// Script-framework markers (noscript, portlet/Liferay classes, JSF form
/// ids) count unless some table already has more than three rows. Without
/// markers, a near-empty body counts.
pub fn requires_script(html: &str) -> bool {
    let document = Html::parse_document(html);

    let has_markers = document.select(&NOSCRIPT).next().is_some()
        || document.select(&CLASSED).any(|e| {
            e.value()
                .attr("class")
                .map(|c| FRAMEWORK_CLASS.is_match(c))
                .unwrap_or(false)
        })
        || document.select(&FORM_ID).any(|f| {
            f.value()
                .attr("id")
                .map(|id| FACES_FORM.is_match(id))
                .unwrap_or(false)
        });
    if has_markers {
        return max_table_rows(&document) <= 3;
    }

    document
        .select(&BODY)
        .next()
        .map(|body| element_text(body).chars().count() < MIN_BODY_TEXT)
        .unwrap_or(false)
}
