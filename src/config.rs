//! Configuration management for munidata using the prefer crate.
//!
//! Loaded once at startup and handed to engines and the orchestrator as an
//! `Arc<Config>`. Nothing mutates it afterwards.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::models::RecordKind;

/// Default Transparencia Activa entry point.
pub const DEFAULT_PORTAL_BASE: &str = "https://www.portaltransparencia.cl/PortalPdT/pdtta";

/// Default database filename inside the data directory.
const DEFAULT_DATABASE_FILENAME: &str = "munidata.db";

/// Portal endpoint and request identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortalConfig {
    pub base_url: String,
    /// `None` uses the built-in desktop browser UA, `"impersonate"` picks a random one.
    pub user_agent: Option<String>,
    pub accept_language: String,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_PORTAL_BASE.to_string(),
            user_agent: None,
            accept_language: "es-CL,es;q=0.9,en;q=0.5".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub request_secs: u64,
    pub connect_secs: u64,
    pub navigation_secs: u64,
    pub render_settle_secs: u64,
    pub click_settle_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_secs: 30,
            connect_secs: 15,
            navigation_secs: 60,
            render_settle_secs: 45,
            click_settle_ms: 2000,
        }
    }
}

impl TimeoutConfig {
    pub fn request(&self) -> Duration {
        Duration::from_secs(self.request_secs)
    }

    pub fn connect(&self) -> Duration {
        Duration::from_secs(self.connect_secs)
    }

    pub fn navigation(&self) -> Duration {
        Duration::from_secs(self.navigation_secs)
    }

    pub fn render_settle(&self) -> Duration {
        Duration::from_secs(self.render_settle_secs)
    }

    pub fn click_settle(&self) -> Duration {
        Duration::from_millis(self.click_settle_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Attempts per kind and month.
    pub attempts: u32,
    /// Linear backoff between attempts: `n * attempt_backoff_ms`.
    pub attempt_backoff_ms: u64,
    /// Retries per request on timeouts and 429/503.
    pub request_retries: u32,
    /// Exponential backoff between request retries: `base * 2^n`.
    pub request_backoff_ms: u64,
    /// Fixed delay after every page fetch.
    pub request_delay_ms: u64,
    pub max_pages: usize,
    pub browser_max_pages: usize,
    pub max_endpoint_candidates: usize,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: 3,
            attempt_backoff_ms: 5000,
            request_retries: 3,
            request_backoff_ms: 1000,
            request_delay_ms: 1500,
            max_pages: 50,
            browser_max_pages: 100,
            max_endpoint_candidates: 10,
        }
    }
}

impl RetryConfig {
    pub fn attempt_backoff(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.attempt_backoff_ms.saturating_mul(attempt as u64))
    }

    pub fn request_backoff(&self, retry: u32) -> Duration {
        let factor = 1u64.checked_shl(retry).unwrap_or(u64::MAX);
        Duration::from_millis(self.request_backoff_ms.saturating_mul(factor))
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }
}

/// Browser engine launch settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserSettings {
    pub headless: bool,
    /// Remote DevTools endpoint (e.g. `ws://localhost:9222`); launches locally when unset.
    pub remote_url: Option<String>,
    pub chrome_path: Option<String>,
    pub chrome_args: Vec<String>,
    pub viewport_width: u32,
    pub viewport_height: u32,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            headless: true,
            remote_url: None,
            chrome_path: None,
            chrome_args: Vec::new(),
            viewport_width: 1920,
            viewport_height: 1080,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosticsConfig {
    pub enabled: bool,
    /// Defaults to `{data_dir}/raw`.
    pub dir: Option<String>,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Defaults to `sqlite:{data_dir}/munidata.db`.
    pub url: Option<String>,
}

/// Ordered UI selector banks for the browser engine. First visible match wins.
///
/// Selectors use a small locator syntax: `text=...` matches visible text,
/// `css:has-text('...')` filters a CSS match by text, `a >> b` searches `b`
/// inside the first visible `a`, anything else is plain CSS.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorBanks {
    pub personnel_section: Vec<String>,
    pub honorarium: Vec<String>,
    pub contract: Vec<String>,
    pub staff: Vec<String>,
    pub next_page: Vec<String>,
    pub table: Vec<String>,
    pub download: Vec<String>,
}

fn owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for SelectorBanks {
    fn default() -> Self {
        Self {
            personnel_section: owned(&[
                "text=04. Personal y remuneraciones",
                "text=Personal y remuneraciones",
                "li:has-text('Personal y remuneraciones') >> a",
                "a:has-text('Personal y remuneraciones')",
                "span:has-text('Personal y remuneraciones')",
                "text=04.",
                "[class*='personal']",
                "a[title*='Personal']",
            ]),
            honorarium: owned(&[
                "text=Personas naturales contratadas a honorarios",
                "a:has-text('Personas naturales contratadas a honorarios')",
                "text=honorarios",
                "a:has-text('Honorarios')",
                "li:has-text('honorarios') >> a",
                "text=Dotación a Honorarios",
            ]),
            contract: owned(&[
                "text=Personal a Contrata",
                "a:has-text('Personal a Contrata')",
                "text=contrata",
                "a:has-text('Contrata')",
                "li:has-text('contrata') >> a",
                "text=Dotación a contrata",
            ]),
            staff: owned(&[
                "text=Personal de Planta",
                "a:has-text('Personal de Planta')",
                "text=planta",
                "a:has-text('Planta')",
                "li:has-text('planta') >> a",
                "text=Dotación de planta",
            ]),
            next_page: owned(&[
                "a:has-text('Siguiente')",
                ".paginate_button.next:not(.disabled)",
                "a:has-text('>>')",
                "li.next:not(.disabled) a",
                "button:has-text('Siguiente')",
                "a.ui-paginator-next:not(.ui-state-disabled)",
                ".ui-paginator-next:not(.ui-state-disabled)",
                "span.ui-paginator-next:not(.ui-state-disabled)",
            ]),
            table: owned(&[
                "table.tabla-datos",
                "table.dataTable",
                "table[id*='tabla']",
                "table.table",
                "table[role='grid']",
                "div.ui-datatable table",
                ".ui-datatable-tablewrapper table",
            ]),
            download: owned(&[
                "a:has-text('Descargar')",
                "a:has-text('Descargar CSV')",
                "a:has-text('Descargar Excel')",
                "button:has-text('Descargar')",
                "button:has-text('CSV')",
                "a:has-text('CSV')",
                "a[href*='.csv']",
                "a:has-text('Exportar')",
                "button:has-text('Exportar')",
                "a[class*='ui-export']",
                "button[class*='export']",
                "a[class*='export']",
                ".ui-datatable-export a",
                "a[href*='export']",
                "a[title*='Descargar']",
                "a[title*='CSV']",
                "a[title*='Excel']",
                "a[title*='Exportar']",
                "button[title*='Descargar']",
                "a[href*='.xlsx']",
                "a[href*='.xls']",
                "a[download]",
            ]),
        }
    }
}

impl SelectorBanks {
    /// Subsection bank for a record kind.
    pub fn subsection(&self, kind: RecordKind) -> &[String] {
        match kind {
            RecordKind::Honorarium => &self.honorarium,
            RecordKind::Contract => &self.contract,
            RecordKind::Staff => &self.staff,
        }
    }
}

/// Configuration file structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Data directory path. Defaults to `~/Documents/munidata`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<String>,
    pub portal: PortalConfig,
    pub timeouts: TimeoutConfig,
    pub retry: RetryConfig,
    pub browser: BrowserSettings,
    pub diagnostics: DiagnosticsConfig,
    pub database: DatabaseConfig,
    pub selectors: SelectorBanks,
    /// Path to the config file this was loaded from (not serialized).
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.trim().is_empty())
}

fn env_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl Config {
    /// Load configuration using prefer for discovery.
    /// Falls back to defaults when no `munidata` config file is found.
    pub async fn load() -> Self {
        match prefer::load("munidata").await {
            Ok(pref_config) => {
                if let Some(path) = pref_config.source_path() {
                    match Self::load_from_path(path).await {
                        Ok(config) => config,
                        Err(e) => {
                            tracing::warn!("{}; using defaults", e);
                            Self::default_with_env()
                        }
                    }
                } else {
                    Self::default_with_env()
                }
            }
            Err(_) => Self::default_with_env(),
        }
    }

    /// Explicit path if given, otherwise discovery.
    pub async fn load_with_path(path: Option<&Path>) -> Result<Self, String> {
        match path {
            Some(path) => Self::load_from_path(path).await,
            None => Ok(Self::load().await),
        }
    }

    /// Defaults with environment variable overrides applied.
    pub fn default_with_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Load configuration from a specific file path.
    /// Supports JSON, TOML and YAML based on file extension.
    pub async fn load_from_path(path: &Path) -> Result<Self, String> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| format!("Failed to read config file: {}", e))?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

        let mut config: Config = match ext {
            "toml" => toml::from_str(&contents)
                .map_err(|e| format!("Failed to parse TOML config: {}", e))?,
            "yaml" | "yml" => serde_yaml::from_str(&contents)
                .map_err(|e| format!("Failed to parse YAML config: {}", e))?,
            _ => serde_json::from_str(&contents)
                .map_err(|e| format!("Failed to parse JSON config: {}", e))?,
        };

        config.source_path = Some(path.to_path_buf());
        Ok(config.with_env_overrides())
    }

    /// Apply `PORTAL_BASE_URL`, `DATA_DIR`, `DATABASE_URL`, `BROWSER_URL` and
    /// `MUNIDATA_HEADLESS`.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(base) = env_value("PORTAL_BASE_URL") {
            tracing::debug!("Using PORTAL_BASE_URL from environment: {}", base);
            self.portal.base_url = base;
        }
        if let Some(dir) = env_value("DATA_DIR") {
            self.data_dir = Some(dir);
        }
        if let Some(url) = env_value("DATABASE_URL") {
            tracing::debug!("Using DATABASE_URL from environment: {}", url);
            self.database.url = Some(url);
        }
        if let Some(url) = env_value("BROWSER_URL") {
            self.browser.remote_url = Some(url);
        }
        if let Some(headless) = env_value("MUNIDATA_HEADLESS").as_deref().and_then(env_flag) {
            self.browser.headless = headless;
        }
        self
    }

    /// Get the base directory for resolving relative paths.
    pub fn base_dir(&self) -> Option<PathBuf> {
        self.source_path
            .as_ref()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
    }

    /// Resolve a path that may be relative to the config file.
    /// - Absolute paths are returned as-is
    /// - Paths starting with ~ are expanded
    /// - Relative paths are resolved relative to `base_dir`
    pub fn resolve_path(&self, path_str: &str, base_dir: &Path) -> PathBuf {
        let expanded = shellexpand::tilde(path_str);
        let path = Path::new(expanded.as_ref());

        if path.is_absolute() {
            path.to_path_buf()
        } else {
            base_dir.join(path)
        }
    }

    fn resolve_base(&self) -> PathBuf {
        self.base_dir()
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
    }

    /// Data directory: configured value, else `~/Documents/munidata`.
    pub fn data_dir(&self) -> PathBuf {
        match self.data_dir {
            Some(ref dir) => self.resolve_path(dir, &self.resolve_base()),
            None => dirs::document_dir()
                .or_else(dirs::home_dir)
                .unwrap_or_else(|| PathBuf::from("."))
                .join("munidata"),
        }
    }

    /// Diagnostics directory, or `None` when diagnostics are disabled.
    pub fn diagnostics_dir(&self) -> Option<PathBuf> {
        if !self.diagnostics.enabled {
            return None;
        }
        Some(match self.diagnostics.dir {
            Some(ref dir) => self.resolve_path(dir, &self.resolve_base()),
            None => self.data_dir().join("raw"),
        })
    }

    /// Database URL, constructing a SQLite path from the data dir if not set.
    pub fn database_url(&self) -> String {
        match self.database.url {
            Some(ref url) => url.clone(),
            None => format!(
                "sqlite:{}",
                self.data_dir().join(DEFAULT_DATABASE_FILENAME).display()
            ),
        }
    }

    /// Ensure data and diagnostics directories exist.
    pub fn ensure_directories(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(self.data_dir())?;
        if let Some(dir) = self.diagnostics_dir() {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.portal.base_url, DEFAULT_PORTAL_BASE);
        assert_eq!(config.timeouts.request(), Duration::from_secs(30));
        assert_eq!(config.retry.attempts, 3);
        assert_eq!(config.retry.max_pages, 50);
        assert_eq!(config.retry.browser_max_pages, 100);
        assert!(!config.selectors.personnel_section.is_empty());
    }

    #[test]
    fn test_backoff_schedules() {
        let retry = RetryConfig::default();
        assert_eq!(retry.attempt_backoff(1), Duration::from_secs(5));
        assert_eq!(retry.attempt_backoff(2), Duration::from_secs(10));
        assert_eq!(retry.request_backoff(0), Duration::from_secs(1));
        assert_eq!(retry.request_backoff(2), Duration::from_secs(4));
    }

    #[tokio::test]
    async fn test_load_partial_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("munidata.toml");
        std::fs::write(
            &path,
            "data_dir = \"data\"\n[retry]\nattempts = 5\n[diagnostics]\nenabled = false\n",
        )
        .unwrap();

        let config = Config::load_from_path(&path).await.unwrap();
        assert_eq!(config.retry.attempts, 5);
        assert_eq!(config.retry.max_pages, 50);
        assert_eq!(config.diagnostics_dir(), None);
        assert_eq!(config.base_dir().as_deref(), Some(dir.path()));
    }

    #[tokio::test]
    async fn test_load_yaml_selectors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("munidata.yaml");
        std::fs::write(&path, "selectors:\n  table:\n    - table.custom\n").unwrap();

        let config = Config::load_from_path(&path).await.unwrap();
        assert_eq!(config.selectors.table, vec!["table.custom".to_string()]);
        assert!(!config.selectors.next_page.is_empty());
    }

    #[test]
    fn test_resolve_path_relative() {
        let config = Config::default();
        let resolved = config.resolve_path("raw", Path::new("/srv/munidata"));
        assert_eq!(resolved, PathBuf::from("/srv/munidata/raw"));
    }

    #[test]
    fn test_subsection_bank() {
        let banks = SelectorBanks::default();
        assert!(banks.subsection(RecordKind::Staff)[0].contains("Planta"));
    }
}
