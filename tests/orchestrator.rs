//! Orchestrator behaviour with scripted engines and an in-memory store.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use munidata::config::Config;
use munidata::error::{ExtractError, PipelineError};
use munidata::models::{EngineKind, NewRun, RawRow, RecordKind, RunStatus};
use munidata::pipeline::{EngineProvider, Orchestrator};
use munidata::repository::{MemoryRunStore, RunStore};
use munidata::scrapers::SectionExtractor;

/// What a scripted engine returns for every section.
#[derive(Clone)]
enum Script {
    Rows(Vec<RawRow>),
    Fail(fn() -> ExtractError),
}

#[derive(Default)]
struct Log {
    opened: Vec<EngineKind>,
    calls: Vec<(EngineKind, RecordKind, u32)>,
    closed: Vec<EngineKind>,
}

struct ScriptedEngine {
    kind: EngineKind,
    script: Script,
    log: Arc<Mutex<Log>>,
}

#[async_trait]
impl SectionExtractor for ScriptedEngine {
    fn engine(&self) -> EngineKind {
        self.kind
    }

    async fn extract_section(
        &mut self,
        kind: RecordKind,
        _area: &str,
        _year: i32,
        month: u32,
    ) -> Result<Vec<RawRow>, ExtractError> {
        self.log.lock().unwrap().calls.push((self.kind, kind, month));
        match &self.script {
            Script::Rows(rows) => Ok(rows.clone()),
            Script::Fail(make) => Err(make()),
        }
    }

    async fn close(&mut self) {
        self.log.lock().unwrap().closed.push(self.kind);
    }
}

struct ScriptedEngines {
    scripts: HashMap<EngineKind, Script>,
    log: Arc<Mutex<Log>>,
}

impl ScriptedEngines {
    fn new(http: Script, browser: Script) -> Self {
        Self {
            scripts: HashMap::from([(EngineKind::Http, http), (EngineKind::Browser, browser)]),
            log: Arc::new(Mutex::new(Log::default())),
        }
    }
}

impl EngineProvider for ScriptedEngines {
    fn open(&self, engine: EngineKind, _org_code: &str) -> Result<Box<dyn SectionExtractor>, ExtractError> {
        self.log.lock().unwrap().opened.push(engine);
        Ok(Box::new(ScriptedEngine {
            kind: engine,
            script: self.scripts[&engine].clone(),
            log: Arc::clone(&self.log),
        }))
    }
}

fn rows() -> Script {
    Script::Rows(vec![
        [("Nombre", "ANA PEREZ"), ("RUT", "12.345.678-9"), ("Monto Total", "$ 500.000")]
            .into_iter()
            .collect(),
        [("Nombre", "LUIS SOTO"), ("RUT", "$ 458.832"), ("Otro", "15.999.888-7")]
            .into_iter()
            .collect(),
    ])
}

fn no_data() -> Script {
    Script::Fail(|| ExtractError::NoData("empty section".into()))
}

fn config() -> Arc<Config> {
    let mut config = Config::default();
    config.retry.attempt_backoff_ms = 0;
    config.diagnostics.enabled = false;
    Arc::new(config)
}

async fn setup(engines: ScriptedEngines) -> (Arc<MemoryRunStore>, Arc<ScriptedEngines>, Orchestrator) {
    let store = Arc::new(MemoryRunStore::new());
    let engines = Arc::new(engines);
    let orchestrator = Orchestrator::new(store.clone(), engines.clone(), config());
    (store, engines, orchestrator)
}

#[tokio::test]
async fn test_http_success_skips_browser() {
    let (store, engines, orchestrator) = setup(ScriptedEngines::new(rows(), rows())).await;
    let run = store
        .create_run(
            NewRun::new("280", "Salud", 2024)
                .months([1, 2])
                .kinds([RecordKind::Honorarium]),
        )
        .await
        .unwrap();

    let summary = orchestrator.execute(run.id).await.unwrap();
    assert_eq!(summary.status, RunStatus::Completed);
    assert_eq!(summary.engine_used, Some(EngineKind::Http));
    assert_eq!(summary.count(RecordKind::Honorarium), 4);
    assert_eq!(summary.recoveries, 2);

    let log = engines.log.lock().unwrap();
    assert_eq!(log.opened, vec![EngineKind::Http]);
    assert_eq!(log.closed, vec![EngineKind::Http]);

    let stored = store.load_run(run.id).await.unwrap();
    assert_eq!(stored.status, RunStatus::Completed);
    assert_eq!(stored.records_loaded, 4);
    assert_eq!(stored.engine_used, Some(EngineKind::Http));
    assert!(stored.completed_at.is_some());
    assert_eq!(store.record_count(run.id).await, 4);
}

#[tokio::test]
async fn test_browser_runs_when_http_yields_nothing() {
    let (store, engines, orchestrator) = setup(ScriptedEngines::new(no_data(), rows())).await;
    let run = store
        .create_run(NewRun::new("280", "Salud", 2024).months([3]).kinds([RecordKind::Contract]))
        .await
        .unwrap();

    let summary = orchestrator.execute(run.id).await.unwrap();
    assert_eq!(summary.status, RunStatus::Completed);
    assert_eq!(summary.engine_used, Some(EngineKind::Browser));
    assert_eq!(summary.total(), 2);
    // Phase A errors are dropped once the browser produced data.
    assert!(summary.errors.is_empty());

    let log = engines.log.lock().unwrap();
    assert_eq!(log.opened, vec![EngineKind::Http, EngineKind::Browser]);
    assert_eq!(log.closed, vec![EngineKind::Http, EngineKind::Browser]);
    // Three attempts on HTTP, one successful browser call.
    let http_calls = log.calls.iter().filter(|c| c.0 == EngineKind::Http).count();
    assert_eq!(http_calls, 3);

    let stored = store.load_run(run.id).await.unwrap();
    assert_eq!(stored.engine_used, Some(EngineKind::Browser));
    assert!(stored.error_message.is_none());
}

#[tokio::test]
async fn test_both_engines_empty_fails_with_combined_errors() {
    let (store, _engines, orchestrator) = setup(ScriptedEngines::new(
        Script::Fail(|| ExtractError::RequiresScript("noscript".into())),
        no_data(),
    ))
    .await;
    let run = store
        .create_run(NewRun::new("280", "Salud", 2024).months([1]).kinds([RecordKind::Staff]))
        .await
        .unwrap();

    let summary = orchestrator.execute(run.id).await.unwrap();
    assert_eq!(summary.status, RunStatus::Failed);
    assert_eq!(summary.errors.len(), 2);
    assert!(summary.errors[0].contains("(http)"));
    assert!(summary.errors[1].contains("(browser)"));

    let stored = store.load_run(run.id).await.unwrap();
    assert_eq!(stored.status, RunStatus::Failed);
    let message = stored.error_message.unwrap();
    assert!(message.contains("; "));
    assert!(message.contains("script rendering"));
}

#[tokio::test]
async fn test_empty_sections_without_errors_complete() {
    let (store, _engines, orchestrator) =
        setup(ScriptedEngines::new(Script::Rows(Vec::new()), Script::Rows(Vec::new()))).await;
    let run = store
        .create_run(NewRun::new("280", "", 2024).months([1]))
        .await
        .unwrap();

    let summary = orchestrator.execute(run.id).await.unwrap();
    assert_eq!(summary.status, RunStatus::Completed);
    assert_eq!(summary.total(), 0);
}

#[tokio::test]
async fn test_store_failure_is_fatal() {
    let (store, engines, orchestrator) = setup(ScriptedEngines::new(rows(), rows())).await;
    let run = store
        .create_run(NewRun::new("280", "Salud", 2024).months([1]))
        .await
        .unwrap();
    store.reject_saves(true);

    let err = orchestrator.execute(run.id).await.unwrap_err();
    assert!(matches!(err, PipelineError::Store(_)));

    let log = engines.log.lock().unwrap();
    assert_eq!(log.opened, vec![EngineKind::Http]);
    assert_eq!(log.closed, vec![EngineKind::Http]);

    let stored = store.load_run(run.id).await.unwrap();
    assert_eq!(stored.status, RunStatus::Failed);
    assert!(stored.error_message.unwrap().contains("rejecting writes"));
}

#[tokio::test]
async fn test_missing_and_finished_runs_are_rejected() {
    let (store, engines, orchestrator) = setup(ScriptedEngines::new(rows(), rows())).await;
    assert!(matches!(
        orchestrator.execute(42).await,
        Err(PipelineError::RunNotFound(42))
    ));

    let run = store
        .create_run(NewRun::new("280", "Salud", 2024).months([1]))
        .await
        .unwrap();
    orchestrator.execute(run.id).await.unwrap();
    let finished = store.load_run(run.id).await.unwrap();

    let err = orchestrator.execute(run.id).await.unwrap_err();
    assert!(matches!(err, PipelineError::NotPending { .. }));
    let after = store.load_run(run.id).await.unwrap();
    assert_eq!(after.completed_at, finished.completed_at);
    assert_eq!(engines.log.lock().unwrap().opened.len(), 1);
}
