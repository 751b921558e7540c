//! Diagnostic artifacts for troubleshooting portal drift.
//!
//! HTML snapshots, screenshots and raw exports are written under
//! `{dir}/{org_code}/`. Failures to write are logged and otherwise ignored.

use std::path::PathBuf;

use tracing::{debug, warn};

use crate::config::Config;
use crate::models::EngineKind;
use crate::scrapers::portal::SectionTarget;

#[derive(Debug, Clone)]
pub struct Diagnostics {
    dir: Option<PathBuf>,
    engine: EngineKind,
}

impl Diagnostics {
    pub fn new(config: &Config, org_code: &str, engine: EngineKind) -> Self {
        Self {
            dir: config.diagnostics_dir().map(|d| d.join(org_code)),
            engine,
        }
    }

    /// A sink that writes nothing.
    pub fn disabled(engine: EngineKind) -> Self {
        Self { dir: None, engine }
    }

    pub fn is_enabled(&self) -> bool {
        self.dir.is_some()
    }

    /// File name for an artifact: `{engine}_{stage}_{kind}_{year}_{month}.{ext}`.
    pub fn file_name(&self, stage: &str, target: Option<&SectionTarget>, ext: &str) -> String {
        match target {
            Some(t) => format!("{}_{}_{}.{}", self.engine, stage, t.label(), ext),
            None => format!("{}_{}.{}", self.engine, stage, ext),
        }
    }

    /// Write an HTML snapshot.
    pub async fn html(&self, stage: &str, target: Option<&SectionTarget>, html: &str) {
        self.write(self.file_name(stage, target, "html"), html.as_bytes())
            .await;
    }

    /// Write a PNG screenshot.
    pub async fn screenshot(&self, stage: &str, target: Option<&SectionTarget>, png: &[u8]) {
        self.write(self.file_name(stage, target, "png"), png).await;
    }

    /// Write a downloaded export as-is.
    pub async fn export(&self, stage: &str, target: &SectionTarget, ext: &str, bytes: &[u8]) {
        self.write(self.file_name(stage, Some(target), ext), bytes)
            .await;
    }

    async fn write(&self, name: String, bytes: &[u8]) {
        let Some(dir) = &self.dir else {
            return;
        };
        if let Err(e) = tokio::fs::create_dir_all(dir).await {
            warn!("Failed to create diagnostics dir {:?}: {}", dir, e);
            return;
        }
        let path = dir.join(name);
        match tokio::fs::write(&path, bytes).await {
            Ok(()) => debug!("Diagnostic saved: {:?} ({} bytes)", path, bytes.len()),
            Err(e) => warn!("Failed to save diagnostic {:?}: {}", path, e),
        }
    }
}
