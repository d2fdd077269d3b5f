//! Local filesystem storage implementation.
//!
//! YAML records land in the directory the configured `PathScheme` maps them
//! to; CSV files and the run summary are keyed relative to the root.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::models::{EpdRecord, PathScheme, PersistMode, RunSummary};
use crate::storage::yaml::{self, write_atomic};
use crate::storage::{CsvPayload, EpdStorage};

/// Local filesystem storage backend.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root_dir: PathBuf,
    scheme: PathScheme,
}

impl LocalStorage {
    /// Create a new LocalStorage rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>, scheme: PathScheme) -> Self {
        Self {
            root_dir: root_dir.into(),
            scheme,
        }
    }

    /// Get the full path for a relative key.
    pub fn path(&self, key: &str) -> PathBuf {
        self.root_dir.join(key)
    }

    /// Ensure parent directory exists.
    async fn ensure_dir(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Append bytes to a file, creating it if needed.
    async fn append_bytes(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        self.ensure_dir(path).await?;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        Ok(())
    }
}

#[async_trait]
impl EpdStorage for LocalStorage {
    async fn persist_record(&self, region: &str, record: &EpdRecord) -> Result<PathBuf> {
        let dir = self.scheme.record_dir(&self.root_dir, region, record);
        yaml::persist(record, &dir)
            .await
            .map_err(|e| match e {
                AppError::Persistence { .. } => e,
                other => AppError::persistence(&dir, other),
            })
    }

    async fn persist_if_absent(&self, key: &str, value: &Value) -> Result<bool> {
        let path = self.path(key);
        if tokio::fs::try_exists(&path).await? {
            return Ok(false);
        }
        let text = yaml::to_yaml(value)?;
        write_atomic(&path, text.as_bytes())
            .await
            .map_err(|e| AppError::persistence(&path, e))?;
        Ok(true)
    }

    async fn write_csv(&self, key: &str, payload: &CsvPayload, mode: PersistMode) -> Result<PathBuf> {
        let path = self.path(key);
        let result = match mode {
            PersistMode::Replace => {
                let mut bytes = payload.header.clone();
                bytes.extend_from_slice(&payload.body);
                write_atomic(&path, &bytes).await
            }
            PersistMode::Append => {
                let exists = tokio::fs::try_exists(&path).await?;
                if exists {
                    self.append_bytes(&path, &payload.body).await
                } else {
                    let mut bytes = payload.header.clone();
                    bytes.extend_from_slice(&payload.body);
                    self.append_bytes(&path, &bytes).await
                }
            }
        };
        result.map_err(|e| AppError::persistence(&path, e))?;
        Ok(path)
    }

    async fn ensure_csv(&self, key: &str, payload: &CsvPayload) -> Result<()> {
        let path = self.path(key);
        if tokio::fs::try_exists(&path).await? {
            return Ok(());
        }
        write_atomic(&path, &payload.header)
            .await
            .map_err(|e| AppError::persistence(&path, e))
    }

    async fn write_summary(&self, summary: &RunSummary) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(summary)?;
        write_atomic(&self.path("run_summary.json"), &bytes).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RegionStats;
    use serde_json::json;
    use tempfile::TempDir;

    fn payload(rows: &str) -> CsvPayload {
        CsvPayload {
            header: b"Name,ID\n".to_vec(),
            body: rows.as_bytes().to_vec(),
            rows: rows.lines().count(),
        }
    }

    #[tokio::test]
    async fn test_persist_record_uses_scheme() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path(), PathScheme::Flat);
        let record = EpdRecord::new(json!({
            "material_id": "m1",
            "category": {"display_name": "Fiber Cement Board"},
        }));

        let path = storage.persist_record("US-ME", &record).await.unwrap();

        assert_eq!(path, tmp.path().join("US/Fiber_Cement_Board/m1.yaml"));
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_append_writes_header_once() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path(), PathScheme::Flat);

        storage
            .write_csv("US-ME/Cement.csv", &payload("a,1\n"), PersistMode::Append)
            .await
            .unwrap();
        storage
            .write_csv("US-ME/Cement.csv", &payload("a,1\n"), PersistMode::Append)
            .await
            .unwrap();

        let text = std::fs::read_to_string(storage.path("US-ME/Cement.csv")).unwrap();
        assert_eq!(text, "Name,ID\na,1\na,1\n");
    }

    #[tokio::test]
    async fn test_replace_truncates() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path(), PathScheme::Flat);

        storage
            .write_csv("GB.csv", &payload("a,1\nb,2\n"), PersistMode::Replace)
            .await
            .unwrap();
        storage
            .write_csv("GB.csv", &payload("c,3\n"), PersistMode::Replace)
            .await
            .unwrap();

        let text = std::fs::read_to_string(storage.path("GB.csv")).unwrap();
        assert_eq!(text, "Name,ID\nc,3\n");
    }

    #[tokio::test]
    async fn test_ensure_csv_keeps_existing_file() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path(), PathScheme::Flat);

        storage
            .write_csv("IN/products.csv", &payload("x,9\n"), PersistMode::Replace)
            .await
            .unwrap();
        storage
            .ensure_csv("IN/products.csv", &payload(""))
            .await
            .unwrap();
        storage.ensure_csv("NEW/products.csv", &payload("")).await.unwrap();

        let kept = std::fs::read_to_string(storage.path("IN/products.csv")).unwrap();
        assert_eq!(kept, "Name,ID\nx,9\n");
        let fresh = std::fs::read_to_string(storage.path("NEW/products.csv")).unwrap();
        assert_eq!(fresh, "Name,ID\n");
    }

    #[tokio::test]
    async fn test_persist_if_absent_does_not_overwrite() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path(), PathScheme::Flat);

        let wrote = storage
            .persist_if_absent("mirror/m1.yaml", &json!({"Name": "first"}))
            .await
            .unwrap();
        let again = storage
            .persist_if_absent("mirror/m1.yaml", &json!({"Name": "second"}))
            .await
            .unwrap();

        assert!(wrote);
        assert!(!again);
        let text = std::fs::read_to_string(storage.path("mirror/m1.yaml")).unwrap();
        assert!(text.contains("first"));
    }

    #[tokio::test]
    async fn test_write_summary() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path(), PathScheme::Flat);
        let now = chrono::Utc::now();
        let summary = RunSummary {
            start_time: now,
            end_time: now,
            regions: vec![RegionStats {
                region: "US-ME".into(),
                records: 3,
                ..RegionStats::default()
            }],
        };

        storage.write_summary(&summary).await.unwrap();

        let text = std::fs::read_to_string(storage.path("run_summary.json")).unwrap();
        let loaded: RunSummary = serde_json::from_str(&text).unwrap();
        assert_eq!(loaded.record_count(), 3);
    }
}
