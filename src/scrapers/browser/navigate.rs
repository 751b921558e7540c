//! Page-level browser actions: navigation, settling, clicking through
//! selector banks, filters, cookies and diagnostic checkpoints.

use std::time::Duration;

use chromiumoxide::cdp::browser_protocol::network::GetCookiesParams;
use chromiumoxide::cdp::browser_protocol::page::NavigateParams;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Page;
use tracing::{debug, info, warn};

use super::filters::{FilterStep, FilterWidget};
use super::locator::{Action, Locator, Outcome};
use super::types::BrowserCookie;
use crate::candidates::CandidateList;
use crate::config::TimeoutConfig;
use crate::error::ExtractError;
use crate::scrapers::diagnostics::Diagnostics;
use crate::scrapers::portal::SectionTarget;

/// Resolves once the document is complete and no jQuery or PrimeFaces
/// request is in flight.
const WAIT_FOR_IDLE_SCRIPT: &str = r#"
    new Promise((resolve) => {
        const idle = () => {
            if (document.readyState !== 'complete') return false;
            if (window.jQuery && window.jQuery.active > 0) return false;
            const pf = window.PrimeFaces;
            if (pf && pf.ajax && pf.ajax.Queue && !pf.ajax.Queue.isEmpty()) return false;
            return true;
        };
        const tick = () => (idle() ? resolve('idle') : setTimeout(tick, 250));
        tick();
    })
"#;

/// Pause between scrolling an element into view and the next action.
const SCROLL_PAUSE: Duration = Duration::from_millis(500);

pub(super) fn browser_error(context: &str, e: impl std::fmt::Display) -> ExtractError {
    ExtractError::Browser(format!("{}: {}", context, e))
}

/// Navigate with the navigation timeout. A timeout is transient.
pub(super) async fn goto(page: &Page, url: &str, timeouts: &TimeoutConfig) -> Result<(), ExtractError> {
    info!("Navigating to {}", url);
    let params = NavigateParams::builder()
        .url(url)
        .build()
        .map_err(|e| browser_error("Invalid URL", e))?;

    tokio::time::timeout(timeouts.navigation(), page.execute(params))
        .await
        .map_err(|_| {
            ExtractError::Transient(format!(
                "Navigation timed out after {}s for {}",
                timeouts.navigation_secs, url
            ))
        })?
        .map_err(|e| browser_error(&format!("Navigation failed for {}", url), e))?;

    settle(page, timeouts).await;
    Ok(())
}

/// Wait for script-driven requests to settle, then the fixed click delay.
///
/// Hitting the settle timeout is not an error; the page is used as-is.
pub(super) async fn settle(page: &Page, timeouts: &TimeoutConfig) {
    match tokio::time::timeout(
        timeouts.render_settle(),
        page.evaluate(WAIT_FOR_IDLE_SCRIPT.to_string()),
    )
    .await
    {
        Ok(Ok(_)) => debug!("Page settled"),
        Ok(Err(e)) => debug!("Could not check page state: {}", e),
        Err(_) => debug!("Settle timed out, continuing anyway"),
    }
    tokio::time::sleep(timeouts.click_settle()).await;
}

async fn run_script<T: serde::de::DeserializeOwned>(page: &Page, script: String) -> Option<T> {
    match page.evaluate(script).await {
        Ok(result) => result.into_value().ok(),
        Err(e) => {
            debug!("Page script failed: {}", e);
            None
        }
    }
}

/// Run one locator and report what happened.
pub(super) async fn run_locator(page: &Page, locator: &Locator, action: Action) -> Outcome {
    run_script::<String>(page, locator.script(action))
        .await
        .and_then(|s| s.parse().ok())
        .unwrap_or(Outcome::Missing)
}

/// Click the first visible match from a selector bank and let the page settle.
pub(super) async fn click_first(
    page: &Page,
    bank: &[String],
    action: Action,
    description: &str,
    timeouts: &TimeoutConfig,
) -> bool {
    let locators = Locator::parse_bank(bank);
    let hit = CandidateList::new(description, &locators)
        .first_async(|locator| async move {
            match run_locator(page, locator, action).await {
                Outcome::Clicked => Some(locator.source().to_string()),
                Outcome::Invalid => {
                    debug!("Selector '{}' for '{}' is not valid CSS", locator.source(), description);
                    None
                }
                _ => None,
            }
        })
        .await;

    match hit {
        Some(source) => {
            info!("Clicked '{}' via selector: {}", description, source);
            tokio::time::sleep(SCROLL_PAUSE).await;
            settle(page, timeouts).await;
            true
        }
        None => {
            debug!("No selector matched for '{}'", description);
            false
        }
    }
}

/// Apply one filter with the first widget family that accepts the value.
pub(super) async fn apply_filter(page: &Page, step: &FilterStep, timeouts: &TimeoutConfig) -> bool {
    let applied = CandidateList::new("filter widget", &FilterWidget::ORDER)
        .first_async(|widget| async move {
            run_script::<bool>(page, widget.script(step.labels, &step.value))
                .await
                .unwrap_or(false)
                .then_some(*widget)
        })
        .await;

    match applied {
        Some(widget) => {
            info!("Selected '{}' for {:?} via {}", step.value, step.labels, widget.as_str());
            settle(page, timeouts).await;
            true
        }
        None => {
            warn!("Could not select '{}' for filter {:?}", step.value, step.labels);
            false
        }
    }
}

pub(super) async fn content(page: &Page) -> Result<String, ExtractError> {
    page.content()
        .await
        .map_err(|e| browser_error("Failed to read page content", e))
}

pub(super) async fn current_url(page: &Page, fallback: &str) -> String {
    page.url()
        .await
        .ok()
        .flatten()
        .map(|u| u.to_string())
        .unwrap_or_else(|| fallback.to_string())
}

/// Cookies of the session for `url`, for replaying downloads over HTTP.
pub(super) async fn cookies(page: &Page, url: &str) -> Vec<BrowserCookie> {
    let params = GetCookiesParams::builder().urls(vec![url.to_string()]).build();

    let cookies = match page.execute(params).await {
        Ok(result) => result.result.cookies.clone(),
        Err(e) => {
            warn!("Failed to get cookies via CDP: {}, trying page.get_cookies()", e);
            page.get_cookies().await.unwrap_or_default()
        }
    };

    debug!("Got {} cookies from browser", cookies.len());
    cookies
        .iter()
        .map(|c| BrowserCookie {
            name: c.name.clone(),
            value: c.value.clone(),
            domain: c.domain.clone(),
            path: c.path.clone(),
            secure: c.secure,
            http_only: c.http_only,
        })
        .collect()
}

/// Screenshot and, when asked, an HTML snapshot of the current page.
pub(super) async fn checkpoint(
    page: &Page,
    diagnostics: &Diagnostics,
    stage: &str,
    target: Option<&SectionTarget>,
    with_html: bool,
) {
    if !diagnostics.is_enabled() {
        return;
    }
    match page
        .screenshot(ScreenshotParams::builder().full_page(true).build())
        .await
    {
        Ok(png) => diagnostics.screenshot(stage, target, &png).await,
        Err(e) => warn!("Screenshot failed at {}: {}", stage, e),
    }
    if with_html {
        match page.content().await {
            Ok(html) => diagnostics.html(stage, target, &html).await,
            Err(e) => warn!("HTML save failed at {}: {}", stage, e),
        }
    }
}
