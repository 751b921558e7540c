//! The extraction ladder over a rendered, navigated page.

use std::sync::Arc;
use std::time::Duration;

use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
use chromiumoxide::cdp::browser_protocol::page::{
    SetDownloadBehaviorBehavior, SetDownloadBehaviorParams,
};
use chromiumoxide::Page;
use tracing::{debug, info, warn};

use super::capture::wait_for_download;
use super::filters::section_filters;
use super::locator::{Action, Locator, Outcome};
use super::navigate::{self, browser_error, checkpoint};
use super::BrowserEngine;
use crate::candidates::CandidateList;
use crate::error::ExtractError;
use crate::models::RawRow;
use crate::scrapers::extract::{self, RowSet};
use crate::scrapers::http_client::{resolve_user_agent, HttpClient};
use crate::scrapers::http_engine::{FetchedPage, HttpEngine};
use crate::scrapers::portal::SectionTarget;

/// How long a clicked download control gets to produce a file.
const DOWNLOAD_WAIT: Duration = Duration::from_secs(30);

impl BrowserEngine {
    /// Open a page, run the section on it and close the page on every path.
    pub(super) async fn run_section(&self, target: &SectionTarget) -> Result<Vec<RawRow>, ExtractError> {
        let browser = self
            .browser
            .clone()
            .ok_or_else(|| ExtractError::Browser("browser not initialized".into()))?;
        let page = {
            let browser = browser.lock().await;
            browser
                .new_page("about:blank")
                .await
                .map_err(|e| browser_error("Failed to open page", e))?
        };

        let result = self.section_inner(&page, target).await;
        if let Err(e) = &result {
            let stage = match e {
                ExtractError::Transient(_) => "timeout",
                ExtractError::NoData(_) => "no_data",
                _ => "error",
            };
            warn!("{}: browser attempt failed: {}", target.label(), e);
            checkpoint(&page, &self.diagnostics, stage, Some(target), true).await;
        }
        if let Err(e) = page.close().await {
            debug!("Failed to close page: {}", e);
        }
        result
    }

    async fn section_inner(&self, page: &Page, target: &SectionTarget) -> Result<Vec<RawRow>, ExtractError> {
        let label = target.label();
        self.prepare_page(page).await?;
        self.open_section(page, target).await?;

        let landing = target.landing_url(&self.config.portal.base_url);
        let rendered = FetchedPage {
            url: navigate::current_url(page, &landing).await,
            html: navigate::content(page).await?,
        };
        let session = self.session_engine(page, &rendered.url).await?;

        if let Some(table) = session.bulk_download(target, &rendered).await {
            let rows = table.into_raw_rows();
            info!("{}: got {} rows via direct download", label, rows.len());
            return Ok(rows);
        }

        if let Some(rows) = self.intercept_download(page, target).await {
            info!("{}: got {} rows via intercepted download", label, rows.len());
            return Ok(rows);
        }

        let rows = self.paginated_table(page, target, &rendered.html).await?;
        if !rows.is_empty() {
            info!("{}: got {} rows from rendered table", label, rows.len());
            return Ok(rows);
        }

        if let Some(table) = session.endpoint_discovery(target, &rendered).await {
            let rows = table.into_raw_rows();
            info!("{}: got {} rows via data endpoint", label, rows.len());
            return Ok(rows);
        }

        Err(ExtractError::NoData(format!("{} at {}", label, rendered.url)))
    }

    async fn prepare_page(&self, page: &Page) -> Result<(), ExtractError> {
        let mut params = SetUserAgentOverrideParams::new(resolve_user_agent(
            self.config.portal.user_agent.as_deref(),
        ));
        params.accept_language = Some(self.config.portal.accept_language.clone());
        page.execute(params)
            .await
            .map_err(|e| browser_error("Failed to set user agent", e))?;
        Ok(())
    }

    /// Organization page, personnel section, kind subsection, then filters.
    ///
    /// Only the initial navigation is fatal; a control that cannot be found
    /// is logged and the ladder runs on whatever the page shows.
    async fn open_section(&self, page: &Page, target: &SectionTarget) -> Result<(), ExtractError> {
        let timeouts = &self.config.timeouts;
        let selectors = &self.config.selectors;
        let diag = &self.diagnostics;

        navigate::goto(page, &target.landing_url(&self.config.portal.base_url), timeouts).await?;
        checkpoint(page, diag, "01_org_home", Some(target), true).await;

        let clicked = navigate::click_first(
            page,
            &selectors.personnel_section,
            Action::Click,
            "Personal y remuneraciones",
            timeouts,
        )
        .await;
        checkpoint(page, diag, "02_personal_section", Some(target), false).await;
        if !clicked {
            warn!("{}: personnel section not found", target.label());
            self.save_html(page, "02_personal_section_FAIL", target).await;
        }

        let stage = format!("03_{}", target.kind.slug());
        let clicked = navigate::click_first(
            page,
            selectors.subsection(target.kind),
            Action::Click,
            target.kind.as_str(),
            timeouts,
        )
        .await;
        checkpoint(page, diag, &stage, Some(target), false).await;
        if !clicked {
            warn!("{}: {} subsection not found", target.label(), target.kind);
            self.save_html(page, &format!("{}_FAIL", stage), target).await;
        }

        for step in section_filters(target) {
            navigate::apply_filter(page, &step, timeouts).await;
            checkpoint(page, diag, &step.stage, Some(target), false).await;
        }

        checkpoint(page, diag, "07_ready", Some(target), true).await;
        Ok(())
    }

    async fn save_html(&self, page: &Page, stage: &str, target: &SectionTarget) {
        if let Ok(html) = page.content().await {
            self.diagnostics.html(stage, Some(target), &html).await;
        }
    }

    /// An HTTP engine that shares the browser session's cookies.
    async fn session_engine(&self, page: &Page, url: &str) -> Result<HttpEngine, ExtractError> {
        let cookies = navigate::cookies(page, url).await;
        let client = HttpClient::with_cookies(&self.config, &cookies, url)?;
        Ok(HttpEngine::new(Arc::clone(&self.config), &self.org_code)?
            .with_client(client)
            .with_diagnostics(self.diagnostics.clone()))
    }

    /// Click download controls and parse whatever file the browser saves.
    async fn intercept_download(&self, page: &Page, target: &SectionTarget) -> Option<Vec<RawRow>> {
        let scratch = match tempfile::tempdir() {
            Ok(dir) => dir,
            Err(e) => {
                warn!("Could not create download directory: {}", e);
                return None;
            }
        };
        let params = SetDownloadBehaviorParams::builder()
            .behavior(SetDownloadBehaviorBehavior::Allow)
            .download_path(scratch.path().display().to_string())
            .build()
            .ok()?;
        if let Err(e) = page.execute(params).await {
            debug!("Download interception unavailable: {}", e);
            return None;
        }

        let locators = Locator::parse_bank(&self.config.selectors.download);
        let dir = scratch.path();
        CandidateList::new("download control", &locators)
            .first_async(|locator| async move {
                if navigate::run_locator(page, locator, Action::Click).await != Outcome::Clicked {
                    return None;
                }
                info!("Trying download via selector: {}", locator.source());
                let Some(file) = wait_for_download(dir, DOWNLOAD_WAIT).await else {
                    debug!("Download via '{}' produced no file", locator.source());
                    return None;
                };
                self.diagnostics
                    .export("download_click", target, &file.extension(), &file.bytes)
                    .await;
                match extract::parse_export(target.kind, &file.bytes, "", &file.file_name) {
                    Ok(table) if !table.is_empty() => Some(table.into_raw_rows()),
                    Ok(_) => None,
                    Err(e) => {
                        debug!("Downloaded {} did not parse: {}", file.file_name, e);
                        None
                    }
                }
            })
            .await
    }

    /// Parse the rendered table and click through next-page controls.
    ///
    /// Stops at the page cap, when no enabled next control exists, or when
    /// a page adds no new rows.
    async fn paginated_table(
        &self,
        page: &Page,
        target: &SectionTarget,
        first_html: &str,
    ) -> Result<Vec<RawRow>, ExtractError> {
        let selectors = &self.config.selectors;
        let max_pages = self.config.retry.browser_max_pages;
        let mut rows = RowSet::new();
        let mut html = first_html.to_string();

        for page_number in 1..=max_pages {
            let Some(table) = extract::parse_preferred_table(&html, target.kind, &selectors.table) else {
                if page_number == 1 {
                    warn!("{}: no data table found on page", target.label());
                    checkpoint(page, &self.diagnostics, "no_table_found", Some(target), true).await;
                }
                break;
            };
            let added = rows.absorb(table);
            if added == 0 {
                debug!("{}: page {} added no new rows", target.label(), page_number);
                break;
            }
            info!(
                "{}: page {} extracted {} rows (total: {})",
                target.label(),
                page_number,
                added,
                rows.len()
            );

            if page_number == max_pages
                || !navigate::click_first(
                    page,
                    &selectors.next_page,
                    Action::ClickEnabled,
                    "next page",
                    &self.config.timeouts,
                )
                .await
            {
                break;
            }
            html = navigate::content(page).await?;
        }
        Ok(rows.into_rows())
    }
}
