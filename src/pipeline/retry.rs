//! Per-attempt retry around one kind and month.

use tracing::warn;

use crate::config::RetryConfig;
use crate::error::ExtractError;
use crate::models::{RawRow, RecordKind};
use crate::scrapers::SectionExtractor;

/// Run one section extraction, retrying failed attempts with linear backoff.
///
/// Errors that another attempt cannot fix are returned immediately.
pub async fn extract_with_retry(
    engine: &mut dyn SectionExtractor,
    retry: &RetryConfig,
    kind: RecordKind,
    area: &str,
    year: i32,
    month: u32,
) -> Result<Vec<RawRow>, ExtractError> {
    let attempts = retry.attempts.max(1);
    let mut attempt = 1;
    loop {
        match engine.extract_section(kind, area, year, month).await {
            Ok(rows) => return Ok(rows),
            Err(e) if attempt >= attempts || !e.is_retryable() => return Err(e),
            Err(e) => {
                let delay = retry.attempt_backoff(attempt);
                warn!(
                    "{} {}-{:02} via {}: attempt {}/{} failed: {}. Retrying in {:?}",
                    kind,
                    year,
                    month,
                    engine.engine(),
                    attempt,
                    attempts,
                    e,
                    delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use crate::models::EngineKind;

    struct Flaky {
        failures: Vec<ExtractError>,
        calls: u32,
    }

    #[async_trait]
    impl SectionExtractor for Flaky {
        fn engine(&self) -> EngineKind {
            EngineKind::Http
        }

        async fn extract_section(
            &mut self,
            _kind: RecordKind,
            _area: &str,
            _year: i32,
            _month: u32,
        ) -> Result<Vec<RawRow>, ExtractError> {
            self.calls += 1;
            if self.failures.is_empty() {
                Ok(vec![[("Nombre", "Ana")].into_iter().collect()])
            } else {
                Err(self.failures.remove(0))
            }
        }

        async fn close(&mut self) {}
    }

    fn fast_retry() -> RetryConfig {
        RetryConfig {
            attempt_backoff_ms: 0,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_recovers_after_failures() {
        let mut engine = Flaky {
            failures: vec![
                ExtractError::Transient("timeout".into()),
                ExtractError::NoData("empty".into()),
            ],
            calls: 0,
        };
        let rows = extract_with_retry(&mut engine, &fast_retry(), RecordKind::Honorarium, "", 2024, 1)
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(engine.calls, 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_attempts() {
        let mut engine = Flaky {
            failures: (0..5).map(|_| ExtractError::Http("500".into())).collect(),
            calls: 0,
        };
        let result =
            extract_with_retry(&mut engine, &fast_retry(), RecordKind::Staff, "", 2024, 1).await;
        assert!(matches!(result, Err(ExtractError::Http(_))));
        assert_eq!(engine.calls, 3);
    }

    #[tokio::test]
    async fn test_requires_script_is_not_retried() {
        let mut engine = Flaky {
            failures: vec![ExtractError::RequiresScript("noscript".into())],
            calls: 0,
        };
        let result =
            extract_with_retry(&mut engine, &fast_retry(), RecordKind::Contract, "", 2024, 1).await;
        assert!(matches!(result, Err(ExtractError::RequiresScript(_))));
        assert_eq!(engine.calls, 1);
    }

    #[tokio::test]
    async fn test_unavailable_engine_is_not_retried() {
        let mut engine = Flaky {
            failures: vec![ExtractError::Unavailable("Chrome/Chromium not found".into())],
            calls: 0,
        };
        let result =
            extract_with_retry(&mut engine, &fast_retry(), RecordKind::Honorarium, "", 2024, 1).await;
        assert!(matches!(result, Err(ExtractError::Unavailable(_))));
        assert_eq!(engine.calls, 1);
    }
}
