//! Plain HTTP extraction engine.
//!
//! Runs the four-level ladder against server-rendered pages:
//! 0. direct section URLs (falling back to the organization landing page)
//! 1. bulk export links
//! 2. the best-scoring HTML table, following pagination
//! 3. data endpoints discovered in scripts, forms and `data-*` attributes

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::diagnostics::Diagnostics;
use super::extract::downloads::DownloadLink;
use super::extract::heuristics::MIN_PAGE_BYTES;
use super::extract::{self, ParsedTable, RowSet};
use super::http_client::HttpClient;
use super::portal::SectionTarget;
use super::SectionExtractor;
use crate::candidates::CandidateList;
use crate::config::Config;
use crate::error::ExtractError;
use crate::models::{EngineKind, RawRow, RecordKind};

/// Minimum length of an HTML endpoint response worth parsing.
const MIN_FRAGMENT_CHARS: usize = 200;

/// A fetched HTML page and the URL it was served from.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub url: String,
    pub html: String,
}

pub struct HttpEngine {
    config: Arc<Config>,
    client: HttpClient,
    org_code: String,
    diagnostics: Diagnostics,
    closed: bool,
}

impl HttpEngine {
    pub fn new(config: Arc<Config>, org_code: &str) -> Result<Self, ExtractError> {
        let client = HttpClient::new(&config)?;
        let diagnostics = Diagnostics::new(&config, org_code, EngineKind::Http);
        Ok(Self {
            config,
            client,
            org_code: org_code.to_string(),
            diagnostics,
            closed: false,
        })
    }

    /// Use a client carrying browser session cookies.
    pub fn with_client(mut self, client: HttpClient) -> Self {
        self.client = client;
        self
    }

    pub fn with_diagnostics(mut self, diagnostics: Diagnostics) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    fn base_url(&self) -> &str {
        &self.config.portal.base_url
    }

    /// GET an HTML page. Non-success statuses are errors.
    pub async fn fetch_page(&self, url: &str) -> Result<FetchedPage, ExtractError> {
        let response = self.client.get(url).await?;
        if !response.is_success() {
            return Err(ExtractError::Http(format!(
                "HTTP {} for {}",
                response.status.as_u16(),
                url
            )));
        }
        Ok(FetchedPage {
            html: response.text(),
            url: response.url,
        })
    }

    /// Level 0: the first direct URL whose page shows data.
    async fn direct_access(&self, target: &SectionTarget) -> Option<FetchedPage> {
        let urls = target.direct_urls(self.base_url());
        CandidateList::new("direct url", &urls)
            .first_async(|url| async move {
                info!("Trying direct URL: {}", url);
                let page = match self.fetch_page(url).await {
                    Ok(page) => page,
                    Err(e) => {
                        debug!("Direct URL {} failed: {}", url, e);
                        return None;
                    }
                };
                if page.html.len() <= MIN_PAGE_BYTES {
                    debug!("Direct URL {} returned a near-empty page", url);
                    return None;
                }
                self.diagnostics.html("direct", Some(target), &page.html).await;
                if extract::page_has_data(&page.html) {
                    info!("Direct URL success: {}", url);
                    Some(page)
                } else {
                    debug!("Direct URL {} has no data tables or file links", url);
                    None
                }
            })
            .await
    }

    /// Level 0 with the organization landing page as fallback.
    async fn entry_page(&self, target: &SectionTarget) -> Result<FetchedPage, ExtractError> {
        if let Some(page) = self.direct_access(target).await {
            return Ok(page);
        }
        let landing = target.landing_url(self.base_url());
        info!("{}: no direct URL had data, trying landing page {}", target.label(), landing);
        let page = self.fetch_page(&landing).await?;
        self.diagnostics.html("org_landing", Some(target), &page.html).await;
        Ok(page)
    }

    /// Fetch and parse one export link.
    async fn fetch_export(
        &self,
        target: &SectionTarget,
        link: &DownloadLink,
    ) -> Result<ParsedTable, ExtractError> {
        info!("Trying download: {} ({})", link.url, truncate(&link.text, 50));
        let response = self.client.get(&link.url).await?;
        if !response.is_success() {
            return Err(ExtractError::Http(format!(
                "HTTP {} for {}",
                response.status.as_u16(),
                link.url
            )));
        }
        let content_type = response.content_type_lower();
        let ext = response
            .content_disposition_filename()
            .and_then(|name| name.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase()))
            .filter(|ext| matches!(ext.as_str(), "csv" | "txt" | "xlsx" | "xls"))
            .unwrap_or_else(|| {
                if extract::downloads::is_spreadsheet(&content_type, &link.url) {
                    "xlsx".to_string()
                } else {
                    "csv".to_string()
                }
            });
        let table = extract::parse_export(target.kind, &response.body, &content_type, &link.url)?;
        self.diagnostics
            .export("download", target, &ext, &response.body)
            .await;
        Ok(table)
    }

    /// Level 1: the first export link that parses into a table.
    pub(crate) async fn bulk_download(
        &self,
        target: &SectionTarget,
        page: &FetchedPage,
    ) -> Option<ParsedTable> {
        let links = extract::download_links(&page.html, &page.url);
        if links.is_empty() {
            debug!("No download links found on page");
            return None;
        }
        CandidateList::new("download link", &links)
            .first_ok(|link| self.fetch_export(target, link))
            .await
            .map_err(|errors| {
                for e in errors {
                    debug!("Download candidate failed: {}", e);
                }
            })
            .ok()
    }

    /// Level 2: the best table on this page and every following page.
    ///
    /// Stops at the page cap, when no unvisited next link exists, when a
    /// page fails to load, or when a page adds no new rows.
    async fn paginated_table(&self, target: &SectionTarget, first: &FetchedPage) -> Vec<RawRow> {
        let Some(table) = extract::parse_best_table(&first.html, target.kind) else {
            return Vec::new();
        };

        let mut rows = RowSet::new();
        rows.absorb(table);
        info!("{}: page 1 yielded {} rows", target.label(), rows.len());

        let mut visited: HashSet<String> = HashSet::from([first.url.clone()]);
        let mut current = first.clone();
        for page_number in 2..=self.config.retry.max_pages {
            let Some(next_url) = extract::next_page_links(&current.html, &current.url)
                .into_iter()
                .find(|u| !visited.contains(u))
            else {
                break;
            };
            visited.insert(next_url.clone());

            let page = match self.fetch_page(&next_url).await {
                Ok(page) => page,
                Err(e) => {
                    warn!("{}: page {} failed, keeping {} rows: {}", target.label(), page_number, rows.len(), e);
                    break;
                }
            };
            let added = extract::parse_best_table(&page.html, target.kind)
                .map(|t| rows.absorb(t))
                .unwrap_or(0);
            if added == 0 {
                debug!("{}: page {} added no new rows", target.label(), page_number);
                break;
            }
            info!(
                "{}: page {} yielded {} new rows (total: {})",
                target.label(),
                page_number,
                added,
                rows.len()
            );
            visited.insert(page.url.clone());
            current = page;
        }
        rows.into_rows()
    }

    /// Parse one endpoint response by its content type.
    async fn probe_endpoint(
        &self,
        target: &SectionTarget,
        url: &str,
    ) -> Result<ParsedTable, ExtractError> {
        debug!("Trying data endpoint: {}", url);
        let response = self.client.get_with_retries(url, 1).await?;
        if !response.is_success() {
            return Err(ExtractError::Http(format!(
                "HTTP {} for {}",
                response.status.as_u16(),
                url
            )));
        }
        let content_type = response.content_type_lower();

        let parsed = if content_type.contains("json") {
            serde_json::from_slice::<serde_json::Value>(&response.body)
                .ok()
                .and_then(|v| extract::parse_json_rows(&v))
        } else if content_type.contains("html") {
            let text = response.text();
            (text.chars().count() > MIN_FRAGMENT_CHARS)
                .then(|| extract::parse_best_table(&text, target.kind))
                .flatten()
        } else if ["csv", "text/plain", "octet-stream"]
            .iter()
            .any(|ct| content_type.contains(ct))
        {
            extract::parse_delimited(&response.body)
        } else {
            None
        };

        parsed
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ExtractError::Structural(format!("No rows from endpoint {}", url)))
    }

    /// Level 3: probe a bounded number of discovered endpoints.
    pub(crate) async fn endpoint_discovery(
        &self,
        target: &SectionTarget,
        page: &FetchedPage,
    ) -> Option<ParsedTable> {
        let mut endpoints = extract::discover_endpoints(&page.html, &page.url);
        if endpoints.is_empty() {
            return None;
        }
        info!("Discovered {} potential data endpoints", endpoints.len());
        endpoints.truncate(self.config.retry.max_endpoint_candidates);

        CandidateList::new("data endpoint", &endpoints)
            .first_ok(|url| self.probe_endpoint(target, url))
            .await
            .ok()
    }

    /// The full ladder for one section.
    pub async fn run_ladder(&self, target: &SectionTarget) -> Result<Vec<RawRow>, ExtractError> {
        let label = target.label();
        let page = self.entry_page(target).await?;

        if let Some(table) = self.bulk_download(target, &page).await {
            let rows = table.into_raw_rows();
            info!("{}: got {} rows via export download", label, rows.len());
            return Ok(rows);
        }

        let rows = self.paginated_table(target, &page).await;
        if !rows.is_empty() {
            info!("{}: got {} rows from HTML table", label, rows.len());
            return Ok(rows);
        }

        if let Some(table) = self.endpoint_discovery(target, &page).await {
            let rows = table.into_raw_rows();
            info!("{}: got {} rows via data endpoint", label, rows.len());
            return Ok(rows);
        }

        if extract::requires_script(&page.html) {
            warn!("{}: page appears to require script rendering", label);
            self.diagnostics.html("js_required", Some(target), &page.html).await;
            return Err(ExtractError::RequiresScript(format!(
                "{} at {}",
                label, page.url
            )));
        }

        self.diagnostics.html("no_data", Some(target), &page.html).await;
        Err(ExtractError::NoData(format!("{} at {}", label, page.url)))
    }
}

fn truncate(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

#[async_trait]
impl SectionExtractor for HttpEngine {
    fn engine(&self) -> EngineKind {
        EngineKind::Http
    }

    async fn extract_section(
        &mut self,
        kind: RecordKind,
        area: &str,
        year: i32,
        month: u32,
    ) -> Result<Vec<RawRow>, ExtractError> {
        if self.closed {
            return Err(ExtractError::Http("HTTP engine already closed".into()));
        }
        let target = SectionTarget::new(&self.org_code, kind, area, year, month);
        info!("Extracting {} via HTTP", target.label());
        self.run_ladder(&target).await
    }

    async fn close(&mut self) {
        // The client's connection pool is dropped with the engine.
        self.closed = true;
    }
}
