//! Engine construction for the orchestrator.

use std::sync::Arc;

use crate::config::Config;
use crate::error::ExtractError;
use crate::models::EngineKind;
use crate::scrapers::{BrowserEngine, HttpEngine, SectionExtractor};

/// Opens an extraction engine for one organization and phase.
pub trait EngineProvider: Send + Sync {
    fn open(&self, engine: EngineKind, org_code: &str) -> Result<Box<dyn SectionExtractor>, ExtractError>;
}

/// The real portal engines built from shared configuration.
#[derive(Debug, Clone)]
pub struct PortalEngines {
    config: Arc<Config>,
}

impl PortalEngines {
    pub fn new(config: Arc<Config>) -> Self {
        Self { config }
    }
}

impl EngineProvider for PortalEngines {
    fn open(&self, engine: EngineKind, org_code: &str) -> Result<Box<dyn SectionExtractor>, ExtractError> {
        Ok(match engine {
            EngineKind::Http => Box::new(HttpEngine::new(Arc::clone(&self.config), org_code)?),
            EngineKind::Browser => Box::new(BrowserEngine::new(Arc::clone(&self.config), org_code)?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opens_requested_engine() {
        let engines = PortalEngines::new(Arc::new(Config::default()));
        let http = engines.open(EngineKind::Http, "MU280").unwrap();
        assert_eq!(http.engine(), EngineKind::Http);
        let browser = engines.open(EngineKind::Browser, "MU280").unwrap();
        assert_eq!(browser.engine(), EngineKind::Browser);
    }
}
