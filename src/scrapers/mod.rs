//! Extraction engines for Portal Transparencia personnel sections.

pub mod browser;
pub mod diagnostics;
pub mod encoding;
pub mod extract;
mod http_client;
pub mod http_engine;
pub mod portal;

pub use browser::BrowserEngine;
pub use diagnostics::Diagnostics;
pub use http_client::{HttpClient, HttpResponse};
pub use http_engine::HttpEngine;
pub use portal::SectionTarget;

use async_trait::async_trait;

use crate::error::ExtractError;
use crate::models::{EngineKind, RawRow, RecordKind};

/// Capability shared by both engines: pull the raw rows of one kind and
/// month for the organization the engine was opened for.
///
/// Engines own network or browser resources; `close` releases them and is
/// called on every exit path by the orchestrator.
#[async_trait]
pub trait SectionExtractor: Send {
    fn engine(&self) -> EngineKind;

    /// Run the extraction ladder for one kind and month.
    async fn extract_section(
        &mut self,
        kind: RecordKind,
        area: &str,
        year: i32,
        month: u32,
    ) -> Result<Vec<RawRow>, ExtractError>;

    /// Release engine resources. Safe to call more than once.
    async fn close(&mut self);
}
