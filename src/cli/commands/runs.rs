//! Run lifecycle commands: create, execute, inspect.

use std::sync::Arc;

use console::style;

use crate::cli::helpers::{open_store, print_run};
use crate::config::Config;
use crate::models::{NewRun, RecordKind, RunStatus};
use crate::pipeline::{Orchestrator, PortalEngines};
use crate::repository::RunStore;

/// Insert a pending run.
pub async fn cmd_create_run(
    config: &Config,
    municipality: &str,
    area: &str,
    year: i32,
    months: Vec<u32>,
    kinds: Vec<RecordKind>,
) -> anyhow::Result<()> {
    let store = open_store(config).await?;
    let run = store
        .create_run(NewRun::new(municipality, area, year).months(months).kinds(kinds))
        .await?;
    eprintln!(
        "{} Created run {} for {} ({})",
        style("✓").green(),
        style(run.id).bold(),
        run.municipality_code,
        run.org_code()
    );
    println!("{}", run.id);
    Ok(())
}

/// Execute a pending run through the pipeline.
pub async fn cmd_run(config: Config, run_id: i64, json: bool) -> anyhow::Result<()> {
    let store = Arc::new(open_store(&config).await?);
    let config = Arc::new(config);
    let engines = Arc::new(PortalEngines::new(Arc::clone(&config)));
    let orchestrator = Orchestrator::new(store, engines, config);

    let summary = orchestrator.execute(run_id).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    let marker = match summary.status {
        RunStatus::Completed => style("✓").green(),
        _ => style("✗").red(),
    };
    println!(
        "{} Run {} {} with {} records",
        marker,
        summary.run_id,
        summary.status,
        summary.total()
    );
    if let Some(engine) = summary.engine_used {
        println!("  Engine: {}", engine);
    }
    for (kind, count) in &summary.per_kind {
        println!("  {:<12} {}", kind.as_str(), count);
    }
    if summary.recoveries > 0 || summary.warnings > 0 {
        println!(
            "  {} {} column shifts recovered, {} data warnings",
            style("!").yellow(),
            summary.recoveries,
            summary.warnings
        );
    }
    for error in &summary.errors {
        println!("  {} {}", style("✗").red(), error);
    }
    Ok(())
}

/// Show a run's lifecycle fields.
pub async fn cmd_status(config: &Config, run_id: i64, json: bool) -> anyhow::Result<()> {
    let store = open_store(config).await?;
    let run = store.load_run(run_id).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&run)?);
    } else {
        print_run(&run);
    }
    Ok(())
}
