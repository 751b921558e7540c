//! HTTP engine pagination against a fake portal.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use munidata::config::Config;
use munidata::mapping::normalize_rows;
use munidata::models::RecordKind;
use munidata::scrapers::{HttpEngine, SectionExtractor};
use wiremock::matchers::{method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SECTION: &str = "/PortalPdT/pdtta/-/ta/MU280/2024/A/Salud/4.1.3/Enero";

const HEADER: &str = "<tr><th>Nombre</th><th>RUT</th><th>Función</th><th>Monto Bruto</th><th>Monto Total</th></tr>";

fn row(name: &str, rut: &str, amount: &str) -> String {
    format!(
        "<tr><td>{}</td><td>{}</td><td>Apoyo Salud</td><td>{}</td><td>{}</td></tr>",
        name, rut, amount, amount
    )
}

fn page(rows: &[String], next: Option<&str>) -> ResponseTemplate {
    let next = next
        .map(|href| format!(r#"<a href="{}">Siguiente</a>"#, href))
        .unwrap_or_default();
    let body = format!(
        "<html><body><h1>Personas naturales contratadas a honorarios</h1><table>{}{}</table>{}<p>{}</p></body></html>",
        HEADER,
        rows.concat(),
        next,
        "Transparencia activa. ".repeat(20)
    );
    ResponseTemplate::new(200)
        .insert_header("content-type", "text/html; charset=utf-8")
        .set_body_string(body)
}

fn numbered_page(rows: &[String], pages: &[u32]) -> ResponseTemplate {
    let links: String = pages
        .iter()
        .map(|n| format!(r#"<a href="?page={}">{}</a>"#, n, n))
        .collect();
    let body = format!(
        "<html><body><h1>Personas naturales contratadas a honorarios</h1><table>{}{}</table><div>{}</div><p>{}</p></body></html>",
        HEADER,
        rows.concat(),
        links,
        "Transparencia activa. ".repeat(20)
    );
    ResponseTemplate::new(200)
        .insert_header("content-type", "text/html; charset=utf-8")
        .set_body_string(body)
}

fn config_for(server: &MockServer) -> Arc<Config> {
    let mut config = Config::default();
    config.portal.base_url = format!("{}/PortalPdT/pdtta", server.uri());
    config.timeouts.request_secs = 1;
    config.retry.request_delay_ms = 0;
    config.retry.request_backoff_ms = 10;
    config.retry.request_retries = 1;
    config.diagnostics.enabled = false;
    Arc::new(config)
}

#[tokio::test]
async fn test_two_pages_with_retried_timeout_yield_distinct_records() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(SECTION))
        .and(query_param_is_missing("page"))
        .respond_with(page(
            &[
                row("ANA PEREZ", "12.345.678-9", "$ 500.000"),
                row("LUIS SOTO", "9.876.543-2", "$ 650.000"),
            ],
            Some("?page=2"),
        ))
        .expect(1)
        .mount(&server)
        .await;

    // First request for page 2 hangs past the request timeout.
    Mock::given(method("GET"))
        .and(path(SECTION))
        .and(query_param("page", "2"))
        .respond_with(
            page(&[row("ANA PEREZ", "12.345.678-9", "$ 500.000")], None)
                .set_delay(Duration::from_secs(3)),
        )
        .up_to_n_times(1)
        .with_priority(1)
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(SECTION))
        .and(query_param("page", "2"))
        .respond_with(page(
            &[
                row("LUIS SOTO", "9.876.543-2", "$ 650.000"),
                row("MARIA ROJAS", "15.999.888-7", "$ 458.832"),
            ],
            None,
        ))
        .with_priority(2)
        .expect(1)
        .mount(&server)
        .await;

    let mut engine = HttpEngine::new(config_for(&server), "MU280").unwrap();
    let rows = engine
        .extract_section(RecordKind::Honorarium, "Salud", 2024, 1)
        .await
        .unwrap();
    engine.close().await;

    let batch = normalize_rows(RecordKind::Honorarium, &rows);
    assert_eq!(batch.records.len(), 3);
    let identifiers: HashSet<_> = batch.records.iter().filter_map(|r| r.identifier()).collect();
    assert_eq!(
        identifiers,
        HashSet::from(["12.345.678-9", "9.876.543-2", "15.999.888-7"])
    );
}

#[tokio::test]
async fn test_pagination_stops_when_page_repeats() {
    let server = MockServer::start().await;
    let rows = [
        row("ANA PEREZ", "12.345.678-9", "$ 500.000"),
        row("LUIS SOTO", "9.876.543-2", "$ 650.000"),
    ];

    Mock::given(method("GET"))
        .and(path(SECTION))
        .and(query_param_is_missing("page"))
        .respond_with(page(&rows, Some("?page=2")))
        .mount(&server)
        .await;
    // Page 2 repeats page 1 and links onward; nothing new means stop.
    Mock::given(method("GET"))
        .and(path(SECTION))
        .and(query_param("page", "2"))
        .respond_with(page(&rows, Some("?page=3")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(SECTION))
        .and(query_param("page", "3"))
        .respond_with(page(&rows, None))
        .expect(0)
        .mount(&server)
        .await;

    let mut engine = HttpEngine::new(config_for(&server), "MU280").unwrap();
    let rows = engine
        .extract_section(RecordKind::Honorarium, "Salud", 2024, 1)
        .await
        .unwrap();
    assert_eq!(rows.len(), 2);
}

#[tokio::test]
async fn test_numbered_paginator_follows_pages_past_the_first() {
    let server = MockServer::start().await;

    // Page 1 is served without a page parameter but links to itself as ?page=1.
    Mock::given(method("GET"))
        .and(path(SECTION))
        .and(query_param_is_missing("page"))
        .respond_with(numbered_page(
            &[
                row("ANA PEREZ", "12.345.678-9", "$ 500.000"),
                row("LUIS SOTO", "9.876.543-2", "$ 650.000"),
            ],
            &[1, 2],
        ))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(SECTION))
        .and(query_param("page", "1"))
        .respond_with(numbered_page(&[], &[1, 2]))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(SECTION))
        .and(query_param("page", "2"))
        .respond_with(numbered_page(
            &[row("MARIA ROJAS", "15.999.888-7", "$ 458.832")],
            &[1, 2],
        ))
        .expect(1)
        .mount(&server)
        .await;

    let mut engine = HttpEngine::new(config_for(&server), "MU280").unwrap();
    let rows = engine
        .extract_section(RecordKind::Honorarium, "Salud", 2024, 1)
        .await
        .unwrap();
    engine.close().await;

    assert_eq!(rows.len(), 3);
}
