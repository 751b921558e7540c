//! Files captured by download interception.
//!
//! The browser is told to save downloads into a scratch directory; the
//! engine clicks a download control and polls that directory until Chrome
//! finishes writing (the `.crdownload` partial is renamed on completion).

use std::path::Path;
use std::time::{Duration, Instant};

use tracing::debug;

const PARTIAL_SUFFIX: &str = ".crdownload";
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// A completed download, removed from the scratch directory once read.
#[derive(Debug, Clone)]
pub struct CapturedDownload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl CapturedDownload {
    /// Lower-cased extension of the suggested file name, `csv` if none.
    pub fn extension(&self) -> String {
        self.file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_lowercase())
            .filter(|ext| !ext.is_empty())
            .unwrap_or_else(|| "csv".to_string())
    }
}

/// Wait up to `timeout` for a finished, non-empty file to appear in `dir`.
pub async fn wait_for_download(dir: &Path, timeout: Duration) -> Option<CapturedDownload> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(found) = take_finished(dir).await {
            debug!("Captured download {} ({} bytes)", found.file_name, found.bytes.len());
            return Some(found);
        }
        if Instant::now() >= deadline {
            return None;
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

async fn take_finished(dir: &Path) -> Option<CapturedDownload> {
    let mut entries = tokio::fs::read_dir(dir).await.ok()?;
    while let Ok(Some(entry)) = entries.next_entry().await {
        let file_name = entry.file_name().to_string_lossy().to_string();
        if file_name.ends_with(PARTIAL_SUFFIX) || file_name.starts_with('.') {
            continue;
        }
        let Ok(bytes) = tokio::fs::read(entry.path()).await else {
            continue;
        };
        if bytes.is_empty() {
            continue;
        }
        let _ = tokio::fs::remove_file(entry.path()).await;
        return Some(CapturedDownload { file_name, bytes });
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_download_extension() {
        let file = |name: &str| CapturedDownload {
            file_name: name.to_string(),
            bytes: Vec::new(),
        };
        assert_eq!(file("Honorarios_2024.XLSX").extension(), "xlsx");
        assert_eq!(file("export").extension(), "csv");
        assert_eq!(file("datos.").extension(), "csv");
    }

    #[tokio::test]
    async fn test_partial_download_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("planilla.csv.crdownload"), b"Nombre;RUT").unwrap();
        assert!(wait_for_download(dir.path(), Duration::from_millis(300)).await.is_none());
    }

    #[tokio::test]
    async fn test_finished_download_is_taken() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().to_path_buf();
        let writer = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            tokio::fs::write(path.join("planilla.csv"), b"Nombre;RUT\nANA;1-9\n").await.unwrap();
        });
        let found = wait_for_download(dir.path(), Duration::from_secs(5)).await.unwrap();
        writer.await.unwrap();
        assert_eq!(found.file_name, "planilla.csv");
        assert_eq!(found.extension(), "csv");
        assert!(!dir.path().join("planilla.csv").exists());
    }
}
