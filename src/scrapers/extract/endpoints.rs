//! Internal data endpoint discovery and JSON response shapes.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};
use serde_json::Value;

use super::{dedupe, resolve_link, ParsedTable};

static SCRIPT_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)["']((https?://[^"']+|/[^"']*(?:api|data|export|csv|json|servlet|resource)[^"']*))["']"#,
    )
    .expect("valid endpoint regex")
});

static SCRIPT: LazyLock<Selector> = LazyLock::new(|| sel("script"));
static FORM: LazyLock<Selector> = LazyLock::new(|| sel("form[action]"));
static IFRAME: LazyLock<Selector> = LazyLock::new(|| sel("iframe[src]"));
static DATA_ATTRS: LazyLock<Selector> =
    LazyLock::new(|| sel("[data-url], [data-source], [data-ajax-url]"));

fn sel(css: &str) -> Selector {
    Selector::parse(css).expect("static selector")
}

/// Keys that commonly wrap a list of row objects.
const ROW_KEYS: [&str; 6] = ["data", "rows", "records", "items", "results", "content"];

/// URLs that may serve the page's data, in discovery order.
///
/// Sources: quoted URLs in inline scripts, form actions, `data-url`,
/// `data-source`, `data-ajax-url` attributes and iframe sources.
pub fn discover_endpoints(html: &str, page_url: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let mut found: Vec<String> = Vec::new();

    for script in document.select(&SCRIPT) {
        let body: String = script.text().collect();
        for caps in SCRIPT_URL.captures_iter(&body) {
            if let Some(url) = caps.get(1).and_then(|m| resolve_link(page_url, m.as_str())) {
                found.push(url);
            }
        }
    }

    let attr_links = document
        .select(&FORM)
        .filter_map(|f| f.value().attr("action"))
        .chain(document.select(&DATA_ATTRS).flat_map(|e| {
            ["data-url", "data-source", "data-ajax-url"]
                .into_iter()
                .filter_map(move |a| e.value().attr(a))
        }))
        .chain(document.select(&IFRAME).filter_map(|f| f.value().attr("src")));
    found.extend(attr_links.filter_map(|href| resolve_link(page_url, href)));

    dedupe(found)
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
    }
}

fn objects_to_table(items: &[Value]) -> Option<ParsedTable> {
    let objects: Vec<_> = items.iter().filter_map(Value::as_object).collect();
    if objects.is_empty() || objects.len() != items.len() {
        return None;
    }

    let mut headers: Vec<String> = Vec::new();
    for object in &objects {
        for key in object.keys() {
            if !headers.contains(key) {
                headers.push(key.clone());
            }
        }
    }
    let rows = objects
        .iter()
        .map(|o| {
            headers
                .iter()
                .map(|h| o.get(h).map(cell_text).unwrap_or_default())
                .collect()
        })
        .collect();
    Some(ParsedTable { headers, rows })
}

/// Rows from a JSON payload.
///
/// Accepts a bare array of objects, an object wrapping such an array under a
/// common key, or a `columns` list alongside a `data` list of arrays.
pub fn parse_json_rows(value: &Value) -> Option<ParsedTable> {
    match value {
        Value::Array(items) => objects_to_table(items),
        Value::Object(map) => {
            let wrapped = ROW_KEYS
                .iter()
                .filter_map(|k| map.get(*k).and_then(Value::as_array))
                .find_map(|items| objects_to_table(items));
            if wrapped.is_some() {
                return wrapped;
            }

            let columns = map.get("columns")?.as_array()?;
            let data = map.get("data")?.as_array()?;
            let headers: Vec<String> = columns
                .iter()
                .map(|c| match c {
                    Value::Object(o) => o
                        .get("title")
                        .or_else(|| o.get("name"))
                        .or_else(|| o.get("data"))
                        .map(cell_text)
                        .unwrap_or_default(),
                    other => cell_text(other),
                })
                .collect();
            let rows: Vec<Vec<String>> = data
                .iter()
                .filter_map(Value::as_array)
                .map(|row| row.iter().map(cell_text).collect())
                .collect();
            (!headers.is_empty() && !rows.is_empty()).then_some(ParsedTable { headers, rows })
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_discover_endpoints() {
        let html = r#"<html><body>
            <script>var u = "/PortalPdT/api/honorarios?mes=1"; var x = '/static/app.js';</script>
            <form action="/buscar"></form>
            <form action="javascript:void(0)"></form>
            <div data-ajax-url="/data/tabla.json"></div>
            <iframe src="https://otro.cl/visor"></iframe>
            <script>load("/PortalPdT/api/honorarios?mes=1")</script>
        </body></html>"#;
        let found = discover_endpoints(html, "https://portal.cl/PortalPdT/pdtta");
        assert_eq!(
            found,
            vec![
                "https://portal.cl/PortalPdT/api/honorarios?mes=1",
                "https://portal.cl/buscar",
                "https://portal.cl/data/tabla.json",
                "https://otro.cl/visor",
            ]
        );
    }

    #[test]
    fn test_json_shapes() {
        let bare = json!([{"Nombre": "ANA", "Rut": "1-9"}, {"Nombre": "LUIS", "Rut": null}]);
        let table = parse_json_rows(&bare).unwrap();
        assert_eq!(table.rows.len(), 2);
        let rut = table.headers.iter().position(|h| h == "Rut").unwrap();
        assert_eq!(table.rows[1][rut], "");

        let wrapped = json!({"total": 1, "rows": [{"Nombre": "ANA", "Monto": 1500}]});
        let table = parse_json_rows(&wrapped).unwrap();
        let monto = table.headers.iter().position(|h| h == "Monto").unwrap();
        assert_eq!(table.rows[0][monto], "1500");

        let columnar = json!({"columns": ["Nombre", "Grado"], "data": [["ANA", "10"], ["LUIS", "12"]]});
        let table = parse_json_rows(&columnar).unwrap();
        assert_eq!(table.headers, vec!["Nombre", "Grado"]);
        assert_eq!(table.rows[1], vec!["LUIS", "12"]);

        assert!(parse_json_rows(&json!({"status": "ok"})).is_none());
        assert!(parse_json_rows(&json!([1, 2, 3])).is_none());
    }
}
