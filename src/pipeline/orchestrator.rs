//! Strategy orchestrator.
//!
//! Phase A runs every requested kind and month through the HTTP engine. Only
//! when that phase persists nothing does phase B repeat the loop on the
//! browser engine. Extraction failures are collected, never raised; only a
//! missing run or an unreachable store aborts.

use std::sync::Arc;

use tracing::{error, info, warn};

use super::provider::EngineProvider;
use super::retry::extract_with_retry;
use super::RunSummary;
use crate::config::Config;
use crate::error::{PipelineError, StoreError};
use crate::mapping::normalize_rows;
use crate::models::{EngineKind, Run, RunStatus};
use crate::repository::RunStore;
use crate::scrapers::SectionExtractor;

/// Records and errors from one engine phase.
#[derive(Debug, Default)]
struct PhaseOutcome {
    loaded: u64,
    errors: Vec<String>,
}

/// Drives runs from Pending to a terminal state.
pub struct Orchestrator {
    store: Arc<dyn RunStore>,
    engines: Arc<dyn EngineProvider>,
    config: Arc<Config>,
}

impl Orchestrator {
    pub fn new(store: Arc<dyn RunStore>, engines: Arc<dyn EngineProvider>, config: Arc<Config>) -> Self {
        Self {
            store,
            engines,
            config,
        }
    }

    /// Execute a pending run to completion.
    ///
    /// A run that is not Pending is rejected untouched. Any store failure
    /// after the run started marks it Failed (best effort) and is returned.
    pub async fn execute(&self, run_id: i64) -> Result<RunSummary, PipelineError> {
        let mut run = match self.store.load_run(run_id).await {
            Ok(run) => run,
            Err(StoreError::NotFound(id)) => return Err(PipelineError::RunNotFound(id)),
            Err(e) => return Err(e.into()),
        };
        if run.status != RunStatus::Pending {
            return Err(PipelineError::NotPending {
                id: run.id,
                status: run.status.to_string(),
            });
        }

        info!(
            "Run {}: {} {} {} months {:?} kinds {:?}",
            run.id,
            run.org_code(),
            run.area,
            run.year,
            run.months,
            run.kinds
        );

        match self.drive(&mut run).await {
            Ok(summary) => Ok(summary),
            Err(e) => {
                error!("Run {} failed: {}", run.id, e);
                match run.fail(&e.to_string()) {
                    Ok(()) => {
                        if let Err(update) = self.store.update_run(&run).await {
                            error!("Run {}: could not record failure: {}", run.id, update);
                        }
                    }
                    Err(refused) => warn!("Run {}: {}", run.id, refused),
                }
                Err(e)
            }
        }
    }

    async fn drive(&self, run: &mut Run) -> Result<RunSummary, PipelineError> {
        run.set_running()?;
        self.store.update_run(run).await?;

        let mut summary = RunSummary::new(run);
        let http = self.run_phase(run, EngineKind::Http, &mut summary).await?;
        let mut engine = EngineKind::Http;
        let mut errors = http.errors;

        if http.loaded == 0 {
            info!("Run {}: HTTP engine produced no records, falling back to browser", run.id);
            let browser = self.run_phase(run, EngineKind::Browser, &mut summary).await?;
            engine = EngineKind::Browser;
            if browser.loaded == 0 {
                errors.extend(browser.errors);
            } else {
                errors = browser.errors;
            }
        }

        let total = summary.total();
        let status = if total > 0 || errors.is_empty() {
            RunStatus::Completed
        } else {
            RunStatus::Failed
        };
        let mut finished = run.clone();
        finished.engine_used = Some(engine);
        finished.records_loaded = total;
        finished.finish(status, &errors)?;
        self.store.update_run(&finished).await?;
        *run = finished;

        info!(
            "Run {} {}: {} records via {} ({} recovered, {} warnings, {} errors)",
            run.id,
            status,
            total,
            engine,
            summary.recoveries,
            summary.warnings,
            errors.len()
        );

        summary.status = status;
        summary.engine_used = Some(engine);
        summary.errors = errors;
        Ok(summary)
    }

    /// Open one engine, run every kind and month through it and close it on
    /// every path.
    async fn run_phase(
        &self,
        run: &Run,
        kind: EngineKind,
        summary: &mut RunSummary,
    ) -> Result<PhaseOutcome, PipelineError> {
        let mut outcome = PhaseOutcome::default();
        let mut engine = match self.engines.open(kind, &run.org_code()) {
            Ok(engine) => engine,
            Err(e) => {
                warn!("Run {}: {} engine unavailable: {}", run.id, kind, e);
                outcome.errors.push(format!("{} engine unavailable: {}", kind, e));
                return Ok(outcome);
            }
        };

        let result = self.extract_all(run, engine.as_mut(), &mut outcome, summary).await;
        engine.close().await;
        result?;
        Ok(outcome)
    }

    async fn extract_all(
        &self,
        run: &Run,
        engine: &mut dyn SectionExtractor,
        outcome: &mut PhaseOutcome,
        summary: &mut RunSummary,
    ) -> Result<(), StoreError> {
        let engine_kind = engine.engine();
        for &kind in &run.kinds {
            for &month in &run.months {
                let rows =
                    match extract_with_retry(engine, &self.config.retry, kind, &run.area, run.year, month)
                        .await
                    {
                        Ok(rows) => rows,
                        Err(e) => {
                            warn!("Run {}: {} {}-{:02} via {} failed: {}", run.id, kind, run.year, month, engine_kind, e);
                            outcome
                                .errors
                                .push(format!("{} {}-{:02} ({}): {}", kind, run.year, month, engine_kind, e));
                            continue;
                        }
                    };

                let batch = normalize_rows(kind, &rows);
                for warning in &batch.warnings {
                    warn!("Run {}: {} {}-{:02}: {}", run.id, kind, run.year, month, warning);
                }
                summary.recoveries += batch.recoveries;
                summary.warnings += batch.warnings.len();

                if batch.records.is_empty() {
                    continue;
                }
                let saved = self.store.save_records(run, kind, month, &batch.records).await? as u64;
                info!("Run {}: saved {} {} records for {}-{:02}", run.id, saved, kind, run.year, month);
                outcome.loaded += saved;
                *summary.per_kind.entry(kind).or_insert(0) += saved;
            }
        }
        Ok(())
    }
}
