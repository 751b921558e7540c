//! Shared helpers for CLI commands.

use console::style;

use crate::config::Config;
use crate::models::{RecordKind, Run};
use crate::repository::SqliteRunStore;

/// Parse a record kind argument. Pay scales are published but are not records.
pub fn parse_kind(s: &str) -> Result<RecordKind, String> {
    if let Some(kind) = RecordKind::from_str(s) {
        return Ok(kind);
    }
    match s.trim().to_lowercase().as_str() {
        "escalas" | "pay-scale" | "pay_scale" => {
            Err("pay scales are not a record kind and cannot be extracted".to_string())
        }
        other => Err(format!(
            "unknown kind '{}' (expected honorarium, contract or staff)",
            other
        )),
    }
}

/// Parse a month number, 1 through 12.
pub fn parse_month(s: &str) -> Result<u32, String> {
    match s.trim().parse::<u32>() {
        Ok(m) if (1..=12).contains(&m) => Ok(m),
        _ => Err(format!("invalid month '{}' (expected 1-12)", s.trim())),
    }
}

/// Open the configured SQLite store, creating directories and schema.
pub async fn open_store(config: &Config) -> anyhow::Result<SqliteRunStore> {
    config.ensure_directories()?;
    let store = SqliteRunStore::from_url(&config.database_url());
    store.init_schema().await?;
    Ok(store)
}

/// Print a run's lifecycle fields.
pub fn print_run(run: &Run) {
    let status = match run.status {
        crate::models::RunStatus::Completed => style(run.status.as_str()).green(),
        crate::models::RunStatus::Failed => style(run.status.as_str()).red(),
        _ => style(run.status.as_str()).yellow(),
    };
    println!("{} Run {}", style("→").cyan(), style(run.id).bold());
    println!("  Municipality: {} ({})", run.municipality_code, run.org_code());
    println!("  Area:         {}", if run.area.is_empty() { "-" } else { run.area.as_str() });
    println!("  Year:         {}", run.year);
    println!("  Months:       {:?}", run.months);
    println!(
        "  Kinds:        {}",
        run.kinds
            .iter()
            .map(|k| k.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );
    println!("  Status:       {}", status);
    if let Some(engine) = run.engine_used {
        println!("  Engine:       {}", engine);
    }
    println!("  Records:      {}", run.records_loaded);
    println!("  Created:      {}", run.created_at.to_rfc3339());
    if let Some(t) = run.started_at {
        println!("  Started:      {}", t.to_rfc3339());
    }
    if let Some(t) = run.completed_at {
        println!("  Completed:    {}", t.to_rfc3339());
    }
    if let Some(ref error) = run.error_message {
        println!("  Errors:       {}", style(error).red());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_kind() {
        assert_eq!(parse_kind("Honorarios"), Ok(RecordKind::Honorarium));
        assert_eq!(parse_kind("staff"), Ok(RecordKind::Staff));
        assert!(parse_kind("escalas").unwrap_err().contains("pay scales"));
        assert!(parse_kind("interns").is_err());
    }

    #[test]
    fn test_parse_month() {
        assert_eq!(parse_month(" 3"), Ok(3));
        assert!(parse_month("0").is_err());
        assert!(parse_month("13").is_err());
        assert!(parse_month("marzo").is_err());
    }
}
