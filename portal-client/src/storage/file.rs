//! JSON-file key/value store.

use std::collections::BTreeMap;
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use log::*;
use tokio::sync::Mutex;

use super::KeyValueStore;
use crate::error::Error;

/// Store that keeps every entry in a single JSON object on disk.
///
/// The whole map is held in memory and rewritten after each mutation. The file
/// is replaced through a sibling temp file so a crash never leaves a torn write.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl FileStore {
    /// Open the store at `path`, loading any entries a previous process left behind.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();

        let entries = match tokio::fs::read_to_string(&path).await {
            Ok(contents) if contents.trim().is_empty() => BTreeMap::new(),
            Ok(contents) => serde_json::from_str(&contents)?,
            Err(e) if e.kind() == IoErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };

        debug!("Opened key/value store {} with {} entries", path.display(), entries.len());

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn flush(&self, entries: &BTreeMap<String, String>) -> Result<(), Error> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let contents = serde_json::to_string_pretty(entries)?;
        let tmp_path = self.path.with_extension("tmp");
        tokio::fs::write(&tmp_path, contents).await?;
        tokio::fs::rename(&tmp_path, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>, Error> {
        let entries = self.entries.lock().await;
        Ok(entries.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<(), Error> {
        let mut entries = self.entries.lock().await;
        entries.insert(key.to_string(), value);
        self.flush(&entries).await
    }

    async fn remove(&self, key: &str) -> Result<(), Error> {
        let mut entries = self.entries.lock().await;
        if entries.remove(key).is_some() {
            self.flush(&entries).await?;
        }
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>, Error> {
        let entries = self.entries.lock().await;
        Ok(entries.keys().cloned().collect())
    }

    async fn remove_many(&self, keys: &[String]) -> Result<(), Error> {
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        for key in keys {
            entries.remove(key);
        }
        if entries.len() != before {
            self.flush(&entries).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_entries_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("portal").join("storage.json");

        let store = FileStore::open(&path).await.unwrap();
        store.set("accessToken", "abc".to_string()).await.unwrap();
        store
            .set("loanDocuments:u1", r#"{"payload":[]}"#.to_string())
            .await
            .unwrap();
        drop(store);

        let reopened = FileStore::open(&path).await.unwrap();
        assert_eq!(reopened.get("accessToken").await.unwrap().as_deref(), Some("abc"));
        assert_eq!(reopened.keys().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_remove_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage.json");

        let store = FileStore::open(&path).await.unwrap();
        store.set("a", "1".to_string()).await.unwrap();
        store.set("b", "2".to_string()).await.unwrap();
        store.remove_many(&["a".to_string()]).await.unwrap();
        drop(store);

        let reopened = FileStore::open(&path).await.unwrap();
        assert!(reopened.get("a").await.unwrap().is_none());
        assert_eq!(reopened.get("b").await.unwrap().as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn test_open_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path().join("nothing.json")).await.unwrap();
        assert!(store.keys().await.unwrap().is_empty());
    }
}
