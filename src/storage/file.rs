//! JSON file storage
//!
//! Keeps every key in one JSON object on disk, mirroring the layout of
//! extension local storage.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::fs;

use super::KeyValueStore;
use crate::error::{PermissionError, PermissionResult};

/// Default file for permission storage
const STORE_FILE: &str = "permissions.json";

/// File-backed key-value store
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    /// Create a store backed by `permissions.json` in the working directory
    pub fn new() -> Self {
        Self {
            path: PathBuf::from(STORE_FILE),
        }
    }

    /// Create a store backed by a custom file
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Get the backing file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> PermissionResult<Map<String, Value>> {
        if !fs::try_exists(&self.path).await? {
            return Ok(Map::new());
        }

        let content = fs::read_to_string(&self.path).await?;
        if content.trim().is_empty() {
            return Ok(Map::new());
        }

        match serde_json::from_str(&content)? {
            Value::Object(map) => Ok(map),
            _ => Err(PermissionError::Storage(format!(
                "{} does not contain a JSON object",
                self.path.display()
            ))),
        }
    }

    async fn save(&self, map: Map<String, Value>) -> PermissionResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let content = serde_json::to_string_pretty(&Value::Object(map))?;

        // Write beside the target and rename so readers never see a partial file
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, content).await?;
        fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

impl Default for JsonFileStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyValueStore for JsonFileStore {
    async fn get(&self, key: &str) -> PermissionResult<Option<Value>> {
        Ok(self.load().await?.remove(key))
    }

    async fn set(&self, key: &str, value: Value) -> PermissionResult<()> {
        let mut map = self.load().await?;
        map.insert(key.to_string(), value);
        self.save(map).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn create_test_store() -> (JsonFileStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = JsonFileStore::with_path(temp_dir.path().join("nested").join("store.json"));
        (store, temp_dir)
    }

    #[tokio::test]
    async fn test_missing_file_reads_empty() {
        let (store, _temp) = create_test_store();
        assert!(store.get("rules").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_set_then_get() {
        let (store, _temp) = create_test_store();

        store.set("rules", json!([{"a": 1}])).await.unwrap();
        store.set("other", json!("x")).await.unwrap();

        assert_eq!(store.get("rules").await.unwrap(), Some(json!([{"a": 1}])));
        assert_eq!(store.get("other").await.unwrap(), Some(json!("x")));
        assert!(store.path().exists());
    }

    #[tokio::test]
    async fn test_values_survive_reopen() {
        let (store, _temp) = create_test_store();
        store.set("rules", json!(["kept"])).await.unwrap();

        let reopened = JsonFileStore::with_path(store.path());
        assert_eq!(reopened.get("rules").await.unwrap(), Some(json!(["kept"])));
    }

    #[tokio::test]
    async fn test_non_object_file_is_an_error() {
        let (store, _temp) = create_test_store();
        std::fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        std::fs::write(store.path(), "[1, 2]").unwrap();

        let err = store.get("rules").await.unwrap_err();
        assert!(matches!(err, PermissionError::Storage(_)));
    }
}
