//! YAML persistence of individual records.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::models::EpdRecord;

/// Serialize a value as block-style YAML with plain string keys.
pub fn to_yaml<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    Ok(serde_yaml::to_string(value)?)
}

/// Read a record from a YAML file. JSON files parse as well.
pub fn load(path: &Path) -> Result<EpdRecord> {
    let text = std::fs::read_to_string(path)?;
    Ok(serde_yaml::from_str(&text)?)
}

/// File name for a material id, rejecting ids that would escape the directory.
pub fn yaml_file_name(material_id: &str) -> Option<String> {
    let id = material_id.trim();
    if id.is_empty() || id.contains(['/', '\\']) || id == "." || id == ".." {
        return None;
    }
    Some(format!("{id}.yaml"))
}

/// Write `record` to `<dir>/<material_id>.yaml`, creating `dir` as needed.
///
/// Repeat runs overwrite the file. The write goes through a temporary file
/// and a rename so a killed run never leaves a truncated record.
pub async fn persist(record: &EpdRecord, dir: &Path) -> Result<PathBuf> {
    let file_name = record
        .material_id()
        .and_then(yaml_file_name)
        .ok_or_else(|| AppError::persistence(dir, "record has no usable material_id"))?;
    let path = dir.join(file_name);
    let yaml = to_yaml(record)?;
    write_atomic(&path, yaml.as_bytes()).await?;
    Ok(path)
}

/// Write bytes via a sibling temp file, then rename over `path`.
pub(crate) async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let tmp = path.with_extension("tmp");
    let mut file = tokio::fs::File::create(&tmp).await?;
    file.write_all(bytes).await?;
    file.flush().await?;
    drop(file);

    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_yaml_is_block_style() {
        let record = EpdRecord::new(json!({
            "material_id": "m1",
            "category": {"display_name": "Brick"},
            "impacts": {"odp": 1.5},
        }));
        let yaml = to_yaml(&record).unwrap();
        assert!(yaml.contains("category:\n  display_name: Brick"));
        assert!(!yaml.contains('{'));
    }

    #[test]
    fn test_yaml_file_name() {
        assert_eq!(yaml_file_name("abc123").as_deref(), Some("abc123.yaml"));
        assert!(yaml_file_name("").is_none());
        assert!(yaml_file_name("../etc").is_none());
    }

    #[tokio::test]
    async fn test_persist_creates_dirs_and_overwrites() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("US").join("Brick");

        let first = EpdRecord::new(json!({"material_id": "m1", "name": "old"}));
        let path = persist(&first, &dir).await.unwrap();
        assert_eq!(path, dir.join("m1.yaml"));

        let second = EpdRecord::new(json!({"material_id": "m1", "name": "new"}));
        persist(&second, &dir).await.unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("name: new"));
        assert!(!text.contains("old"));
        assert!(!dir.join("m1.tmp").exists());
    }

    #[tokio::test]
    async fn test_load_reads_back_persisted_record() {
        let tmp = TempDir::new().unwrap();
        let record = EpdRecord::new(json!({"material_id": "m2", "impacts": {"gwp": 4.5}}));
        let path = persist(&record, tmp.path()).await.unwrap();

        assert_eq!(load(&path).unwrap(), record);
    }

    #[test]
    fn test_load_accepts_json() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("r.json");
        std::fs::write(&path, r#"{"id": "x", "impacts": {}}"#).unwrap();
        assert_eq!(load(&path).unwrap().id(), Some("x"));
    }

    #[tokio::test]
    async fn test_persist_rejects_missing_material_id() {
        let tmp = TempDir::new().unwrap();
        let record = EpdRecord::new(json!({"name": "anonymous"}));
        assert!(matches!(
            persist(&record, tmp.path()).await,
            Err(AppError::Persistence { .. })
        ));
    }
}
