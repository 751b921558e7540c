//! Run pipeline: drives one Run through the HTTP engine, falls back to the
//! browser engine when HTTP yields nothing, and persists the outcome.

mod orchestrator;
mod provider;
mod retry;

pub use orchestrator::Orchestrator;
pub use provider::{EngineProvider, PortalEngines};
pub use retry::extract_with_retry;

use std::collections::BTreeMap;

use serde::Serialize;

use crate::models::{EngineKind, RecordKind, Run, RunStatus};

/// What a finished Run produced.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: i64,
    pub status: RunStatus,
    pub engine_used: Option<EngineKind>,
    /// Records submitted to persistence, per kind.
    pub per_kind: BTreeMap<RecordKind, u64>,
    /// Rows whose identifier was recovered after a column shift.
    pub recoveries: usize,
    pub warnings: usize,
    pub errors: Vec<String>,
}

impl RunSummary {
    fn new(run: &Run) -> Self {
        Self {
            run_id: run.id,
            status: run.status,
            engine_used: None,
            per_kind: run.kinds.iter().map(|k| (*k, 0)).collect(),
            recoveries: 0,
            warnings: 0,
            errors: Vec::new(),
        }
    }

    pub fn total(&self) -> u64 {
        self.per_kind.values().sum()
    }

    pub fn count(&self, kind: RecordKind) -> u64 {
        self.per_kind.get(&kind).copied().unwrap_or(0)
    }
}
