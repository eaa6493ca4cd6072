//! File-backed persistence backends
//!
//! Directory structure:
//! ```text
//! <data_dir>/
//! ├── contexts/
//! │   └── {encoded-context}/
//! │       └── {encoded-locator}.json   # One persistence record
//! └── slots/
//!     └── {encoded-key}.json           # One key-value slot
//! ```
//!
//! Context ids and locators are arbitrary strings (document paths,
//! user-chosen span ids), so every path component is percent-encoded.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use async_trait::async_trait;

use super::backend::{KeyValueStore, PersistenceRecord, PrimaryStore, Result, StoreError};
use crate::review::ContextId;

fn encode(component: &str) -> String {
    urlencoding::encode(component).into_owned()
}

/// Primary store keeping one JSON file per (context, locator)
pub struct FileReviewStore {
    data_dir: PathBuf,
}

impl FileReviewStore {
    pub fn new(data_dir: PathBuf) -> Self {
        Self { data_dir }
    }

    pub fn default_data_dir() -> Result<PathBuf> {
        dirs::data_local_dir()
            .map(|p| p.join("mneme"))
            .ok_or_else(|| StoreError::Unavailable("no local data directory".to_string()))
    }

    fn context_dir(&self, context: &ContextId) -> PathBuf {
        self.data_dir
            .join("contexts")
            .join(encode(context.as_str()))
    }

    fn record_path(&self, context: &ContextId, locator: &str) -> PathBuf {
        self.context_dir(context)
            .join(format!("{}.json", encode(locator)))
    }
}

#[async_trait]
impl PrimaryStore for FileReviewStore {
    async fn get_by_context(
        &self,
        context: &ContextId,
    ) -> Result<HashMap<String, PersistenceRecord>> {
        let dir = self.context_dir(context);
        if !dir.exists() {
            return Ok(HashMap::new());
        }

        let mut records = HashMap::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().map_or(false, |ext| ext == "json") {
                let stem = match path.file_stem().and_then(|s| s.to_str()) {
                    Some(stem) => stem,
                    None => continue,
                };
                let locator = urlencoding::decode(stem)
                    .map(|s| s.into_owned())
                    .unwrap_or_else(|_| stem.to_string());
                let content = fs::read_to_string(&path)?;
                let record: PersistenceRecord = serde_json::from_str(&content)?;
                records.insert(locator, record);
            }
        }

        Ok(records)
    }

    async fn upsert(
        &self,
        context: &ContextId,
        locator: &str,
        record: &PersistenceRecord,
    ) -> Result<()> {
        let dir = self.context_dir(context);
        fs::create_dir_all(&dir)?;
        let path = self.record_path(context, locator);
        fs::write(&path, serde_json::to_string_pretty(record)?)?;
        Ok(())
    }
}

/// Fallback key-value store keeping one JSON file per slot
pub struct FileKeyValueStore {
    data_dir: PathBuf,
}

impl FileKeyValueStore {
    pub fn new(data_dir: PathBuf) -> Self {
        Self { data_dir }
    }

    fn slot_path(&self, key: &str) -> PathBuf {
        self.data_dir
            .join("slots")
            .join(format!("{}.json", encode(key)))
    }
}

#[async_trait]
impl KeyValueStore for FileKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>> {
        let path = self.slot_path(key);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    async fn set(&self, key: &str, value: serde_json::Value) -> Result<()> {
        let path = self.slot_path(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, serde_json::to_string_pretty(&value)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn record(review_count: i32) -> PersistenceRecord {
        PersistenceRecord {
            due_at: 1_700_000_600_000,
            last_reviewed_at: 1_700_000_000_000,
            interval: 10.0 / 1440.0,
            ease: 2.5,
            review_count,
            last_grade: Some(3),
        }
    }

    #[tokio::test]
    async fn unknown_context_reads_empty() {
        let dir = TempDir::new().unwrap();
        let store = FileReviewStore::new(dir.path().to_path_buf());
        let records = store
            .get_by_context(&ContextId::new("notes/unknown.md"))
            .await
            .unwrap();
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn upsert_then_get_by_context() {
        let dir = TempDir::new().unwrap();
        let store = FileReviewStore::new(dir.path().to_path_buf());
        let ctx = ContextId::new("notes/biology.md");

        store.upsert(&ctx, "auto-0", &record(1)).await.unwrap();
        store.upsert(&ctx, "custom", &record(2)).await.unwrap();
        // Re-upsert replaces in place
        store.upsert(&ctx, "auto-0", &record(3)).await.unwrap();

        let records = store.get_by_context(&ctx).await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records["auto-0"].review_count, 3);
        assert_eq!(records["custom"].review_count, 2);
    }

    #[tokio::test]
    async fn contexts_are_isolated() {
        let dir = TempDir::new().unwrap();
        let store = FileReviewStore::new(dir.path().to_path_buf());

        store
            .upsert(&ContextId::new("a.md"), "auto-0", &record(1))
            .await
            .unwrap();
        let other = store
            .get_by_context(&ContextId::new("b.md"))
            .await
            .unwrap();
        assert!(other.is_empty());
    }

    #[tokio::test]
    async fn awkward_keys_survive_encoding() {
        let dir = TempDir::new().unwrap();
        let store = FileReviewStore::new(dir.path().to_path_buf());
        let ctx = ContextId::new("folder/sub folder/noté.md");

        store.upsert(&ctx, "span one/two", &record(1)).await.unwrap();

        let records = store.get_by_context(&ctx).await.unwrap();
        assert_eq!(records.len(), 1);
        assert!(records.contains_key("span one/two"));
    }

    #[tokio::test]
    async fn kv_get_absent_is_none() {
        let dir = TempDir::new().unwrap();
        let store = FileKeyValueStore::new(dir.path().to_path_buf());
        assert_eq!(store.get("cloze-review/x").await.unwrap(), None);
    }

    #[tokio::test]
    async fn kv_set_then_get_round_trips() {
        let dir = TempDir::new().unwrap();
        let store = FileKeyValueStore::new(dir.path().to_path_buf());
        let value = json!({"auto-0": {"dueAt": 1, "lastReviewedAt": 0, "interval": 1.0, "ease": 2.5, "reviewCount": 1}});

        store.set("cloze-review/a.md", value.clone()).await.unwrap();
        assert_eq!(store.get("cloze-review/a.md").await.unwrap(), Some(value));
    }
}
