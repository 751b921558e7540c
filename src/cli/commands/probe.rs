//! One-off extraction without persistence.

use std::sync::Arc;

use console::style;

use crate::config::Config;
use crate::mapping::normalize_rows;
use crate::models::{org_code, EngineKind, RecordKind};
use crate::pipeline::{extract_with_retry, EngineProvider, PortalEngines};

/// Run one engine for one kind and month and print canonical records as JSON.
pub async fn cmd_probe(
    config: Config,
    municipality: &str,
    kind: RecordKind,
    area: &str,
    year: i32,
    month: u32,
    engine: EngineKind,
) -> anyhow::Result<()> {
    let config = Arc::new(config);
    let org = org_code(municipality);
    eprintln!(
        "{} Probing {} {} {}-{:02} via {}",
        style("→").cyan(),
        org,
        kind,
        year,
        month,
        engine
    );

    let mut extractor = PortalEngines::new(Arc::clone(&config)).open(engine, &org)?;
    let result = extract_with_retry(extractor.as_mut(), &config.retry, kind, area, year, month).await;
    extractor.close().await;
    let rows = result?;

    let batch = normalize_rows(kind, &rows);
    for warning in &batch.warnings {
        eprintln!("  {} {}", style("!").yellow(), warning);
    }
    println!("{}", serde_json::to_string_pretty(&batch.records)?);
    eprintln!(
        "{} {} raw rows, {} records, {} recovered",
        style("✓").green(),
        rows.len(),
        batch.records.len(),
        batch.recoveries
    );
    Ok(())
}
