//! Browser extraction engine for script-rendered portal pages.
//!
//! Uses chromiumoxide (CDP) to drive a real Chrome: open the organization
//! page, click through to the personnel subsection, apply filters, then run
//! the same ladder as the HTTP engine against the rendered DOM, with
//! click-driven pagination and download interception on top.

mod capture;
mod filters;
mod locator;
#[cfg(feature = "browser")]
mod ladder;
#[cfg(feature = "browser")]
mod navigate;
mod types;

pub use filters::{section_filters, FilterStep, FilterWidget};
pub use locator::{Action, Locator, Outcome};
pub use capture::{wait_for_download, CapturedDownload};
pub use types::BrowserCookie;

use std::sync::Arc;

use async_trait::async_trait;
#[cfg(feature = "browser")]
use tracing::{info, warn};

use super::SectionExtractor;
use crate::config::Config;
use crate::error::ExtractError;
use crate::models::{EngineKind, RawRow, RecordKind};

#[cfg(feature = "browser")]
use anyhow::Context;
#[cfg(feature = "browser")]
use chromiumoxide::{Browser, BrowserConfig};
#[cfg(feature = "browser")]
use futures::StreamExt;
#[cfg(feature = "browser")]
use tokio::sync::Mutex;
#[cfg(feature = "browser")]
use tokio::task::JoinHandle;

#[cfg(feature = "browser")]
use super::diagnostics::Diagnostics;
#[cfg(feature = "browser")]
use super::portal::SectionTarget;

/// Browser engine bound to one organization for the length of one phase.
#[cfg(feature = "browser")]
pub struct BrowserEngine {
    config: Arc<Config>,
    org_code: String,
    diagnostics: Diagnostics,
    browser: Option<Arc<Mutex<Browser>>>,
    handler: Option<JoinHandle<()>>,
    /// Connected over DevTools rather than launched; closing only disconnects.
    remote: bool,
    /// First launch failure; later sections fail fast with it.
    launch_error: Option<String>,
}

#[cfg(feature = "browser")]
impl BrowserEngine {
    /// Common Chrome executable paths to check.
    const CHROME_PATHS: &'static [&'static str] = &[
        // Linux
        "/usr/bin/google-chrome",
        "/usr/bin/google-chrome-stable",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
        "/snap/bin/chromium",
        // macOS
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        "/Applications/Chromium.app/Contents/MacOS/Chromium",
        "/opt/google/chrome/google-chrome",
    ];

    /// Create the engine. The browser itself starts on first use.
    pub fn new(config: Arc<Config>, org_code: &str) -> Result<Self, ExtractError> {
        let diagnostics = Diagnostics::new(&config, org_code, EngineKind::Browser);
        Ok(Self {
            config,
            org_code: org_code.to_string(),
            diagnostics,
            browser: None,
            handler: None,
            remote: false,
            launch_error: None,
        })
    }

    /// Find a Chrome executable: configured path, known locations, then PATH.
    fn find_chrome(&self) -> anyhow::Result<std::path::PathBuf> {
        if let Some(configured) = &self.config.browser.chrome_path {
            let p = std::path::PathBuf::from(configured);
            if p.exists() {
                return Ok(p);
            }
            warn!("Configured Chrome path {} does not exist", configured);
        }

        for path in Self::CHROME_PATHS {
            let p = std::path::Path::new(path);
            if p.exists() {
                info!("Found Chrome at: {}", path);
                return Ok(p.to_path_buf());
            }
        }

        for cmd in &[
            "google-chrome",
            "google-chrome-stable",
            "chromium",
            "chromium-browser",
        ] {
            if let Ok(output) = std::process::Command::new("which").arg(cmd).output() {
                if output.status.success() {
                    let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
                    if !path.is_empty() {
                        info!("Found Chrome in PATH: {}", path);
                        return Ok(std::path::PathBuf::from(path));
                    }
                }
            }
        }

        Err(anyhow::anyhow!(
            "Chrome/Chromium not found. Install it or set browser.chrome_path, \
             or point BROWSER_URL at a running DevTools endpoint"
        ))
    }

    /// Launch or connect to the browser if not already running.
    pub async fn ensure_browser(&mut self) -> anyhow::Result<()> {
        if self.browser.is_some() {
            return Ok(());
        }

        if let Some(remote_url) = self.config.browser.remote_url.clone() {
            return self.connect_remote(&remote_url).await;
        }

        let settings = &self.config.browser;
        info!("Launching browser (headless={})", settings.headless);

        let chrome_path = self.find_chrome()?;
        let mut builder = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .window_size(settings.viewport_width, settings.viewport_height)
            .viewport(None)
            .request_timeout(self.config.timeouts.navigation());

        // with_head means NOT headless
        if !settings.headless {
            builder = builder.with_head();
        }

        builder = builder
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-infobars")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-setuid-sandbox")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--disable-background-networking")
            .arg("--disable-sync")
            .arg("--disable-translate")
            .arg("--no-sandbox")
            .arg("--disable-gpu");

        for arg in &settings.chrome_args {
            builder = builder.arg(arg);
        }

        let browser_config = builder
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build browser config: {}", e))?;

        let (browser, handler) = Browser::launch(browser_config)
            .await
            .context("Failed to launch browser")?;

        self.attach(browser, handler, false);
        Ok(())
    }

    /// Connect to a remote Chrome instance.
    async fn connect_remote(&mut self, url: &str) -> anyhow::Result<()> {
        info!("Connecting to remote browser at {}", url);

        let http_url = url
            .replace("ws://", "http://")
            .replace("wss://", "https://");
        let version_url = format!("{}/json/version", http_url.trim_end_matches('/'));

        let resp: serde_json::Value = reqwest::Client::new()
            .get(&version_url)
            .timeout(self.config.timeouts.connect())
            .send()
            .await
            .context("Failed to connect to remote browser")?
            .json()
            .await
            .context("Failed to parse browser version info")?;

        let ws_url = resp
            .get("webSocketDebuggerUrl")
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow::anyhow!("No webSocketDebuggerUrl in response"))?;

        info!("Connecting to WebSocket: {}", ws_url);

        let handler_config = chromiumoxide::handler::HandlerConfig {
            request_timeout: self.config.timeouts.navigation(),
            ..Default::default()
        };

        let (browser, handler) = Browser::connect_with_config(ws_url, handler_config)
            .await
            .context("Failed to connect to remote browser")?;

        self.attach(browser, handler, true);
        Ok(())
    }

    fn attach(&mut self, browser: Browser, mut handler: chromiumoxide::Handler, remote: bool) {
        let task = tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
        });
        self.browser = Some(Arc::new(Mutex::new(browser)));
        self.handler = Some(task);
        self.remote = remote;
    }

    fn target(&self, kind: RecordKind, area: &str, year: i32, month: u32) -> SectionTarget {
        SectionTarget::new(&self.org_code, kind, area, year, month)
    }
}

#[cfg(feature = "browser")]
#[async_trait]
impl SectionExtractor for BrowserEngine {
    fn engine(&self) -> EngineKind {
        EngineKind::Browser
    }

    async fn extract_section(
        &mut self,
        kind: RecordKind,
        area: &str,
        year: i32,
        month: u32,
    ) -> Result<Vec<RawRow>, ExtractError> {
        let target = self.target(kind, area, year, month);
        if let Some(e) = &self.launch_error {
            return Err(ExtractError::Unavailable(e.clone()));
        }
        info!("Extracting {} via browser", target.label());
        if let Err(e) = self.ensure_browser().await {
            let message = format!("{:#}", e);
            warn!("Browser could not start: {}", message);
            self.launch_error = Some(message.clone());
            return Err(ExtractError::Unavailable(message));
        }
        self.run_section(&target).await
    }

    async fn close(&mut self) {
        let Some(browser) = self.browser.take() else {
            return;
        };
        if !self.remote {
            let mut browser = browser.lock().await;
            if let Err(e) = browser.close().await {
                warn!("Failed to close browser cleanly: {}", e);
            }
            let _ = browser.wait().await;
        }
        if let Some(task) = self.handler.take() {
            task.abort();
        }
        info!("Browser engine closed");
    }
}

// Stub for when browser feature is disabled
#[cfg(not(feature = "browser"))]
pub struct BrowserEngine;

#[cfg(not(feature = "browser"))]
impl BrowserEngine {
    pub fn new(_config: Arc<Config>, _org_code: &str) -> Result<Self, ExtractError> {
        Ok(Self)
    }
}

#[cfg(not(feature = "browser"))]
#[async_trait]
impl SectionExtractor for BrowserEngine {
    fn engine(&self) -> EngineKind {
        EngineKind::Browser
    }

    async fn extract_section(
        &mut self,
        _kind: RecordKind,
        _area: &str,
        _year: i32,
        _month: u32,
    ) -> Result<Vec<RawRow>, ExtractError> {
        Err(ExtractError::Unavailable(
            "Browser support not compiled. Rebuild with: cargo build --features browser".into(),
        ))
    }

    async fn close(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(feature = "browser")]
    #[tokio::test]
    async fn test_failed_launch_is_unavailable_for_every_section() {
        let mut config = Config::default();
        config.browser.remote_url = Some("http://127.0.0.1:1".into());
        config.diagnostics.enabled = false;
        let mut engine = BrowserEngine::new(Arc::new(config), "MU280").unwrap();

        let first = engine.extract_section(RecordKind::Honorarium, "Salud", 2024, 1).await;
        assert!(matches!(first, Err(ExtractError::Unavailable(_))));
        assert!(engine.launch_error.is_some());

        let second = engine.extract_section(RecordKind::Honorarium, "Salud", 2024, 2).await;
        let Err(e) = second else {
            panic!("expected launch failure");
        };
        assert!(!e.is_retryable());
        engine.close().await;
    }

    #[cfg(not(feature = "browser"))]
    #[tokio::test]
    async fn test_stub_engine_is_unavailable() {
        let mut engine = BrowserEngine::new(Arc::new(Config::default()), "MU280").unwrap();
        let result = engine.extract_section(RecordKind::Staff, "Salud", 2024, 1).await;
        assert!(matches!(result, Err(ExtractError::Unavailable(_))));
    }
}
