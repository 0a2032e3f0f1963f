/// Local filesystem document store.
///
/// Every document is one JSON file: `users/o/boards/b` lives at
/// `{root}/users/o/boards/b.json`, and a collection is the directory holding
/// those files. Provides:
/// - Atomic writes (write to .tmp, fsync, rename)
/// - Per-document write locks so read-modify-write updates do not interleave
use std::collections::HashMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::paths;
use super::{DocumentSnapshot, DocumentStore, StorageError};

const DOCUMENT_EXTENSION: &str = "json";
const TMP_EXTENSION: &str = "boxboard.tmp";

pub struct LocalStore {
    root: PathBuf,
    /// document path -> write mutex
    write_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            write_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn document_file(&self, path: &str) -> Result<PathBuf, StorageError> {
        let segments = paths::segments(path)
            .filter(|s| s.len() % 2 == 0)
            .ok_or_else(|| StorageError::InvalidPath(path.to_string()))?;
        let (last, parents) = segments
            .split_last()
            .ok_or_else(|| StorageError::InvalidPath(path.to_string()))?;
        let mut file = self.root.clone();
        for segment in parents {
            file.push(segment);
        }
        file.push(format!("{}.{}", last, DOCUMENT_EXTENSION));
        Ok(file)
    }

    fn collection_dir(&self, path: &str) -> Result<PathBuf, StorageError> {
        let segments = paths::segments(path)
            .filter(|s| s.len() % 2 == 1)
            .ok_or_else(|| StorageError::InvalidPath(path.to_string()))?;
        let mut dir = self.root.clone();
        for segment in segments {
            dir.push(segment);
        }
        Ok(dir)
    }

    /// Get a write lock for a specific document.
    fn get_write_lock(&self, path: &str) -> Result<Arc<tokio::sync::Mutex<()>>, StorageError> {
        let mut locks = self
            .write_locks
            .lock()
            .map_err(|_| StorageError::Unavailable("write lock table poisoned".to_string()))?;
        Ok(locks
            .entry(path.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone())
    }

    /// Atomic write with fsync: write to .tmp, fsync, rename, fsync directory.
    fn atomic_write(path: &Path, content: &str) -> Result<(), std::io::Error> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }

        let tmp_path = path.with_extension(TMP_EXTENSION);
        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(content.as_bytes())?;
        file.sync_all()?;
        fs::rename(&tmp_path, path)?;

        // fsync directory for rename durability
        if let Some(dir) = path.parent() {
            if let Ok(d) = fs::File::open(dir) {
                let _ = d.sync_all();
            }
        }
        Ok(())
    }

    async fn write_json(file: PathBuf, data: &Value) -> Result<(), StorageError> {
        let content = serde_json::to_string_pretty(data)?;
        tokio::task::spawn_blocking(move || Self::atomic_write(&file, &content))
            .await
            .map_err(|e| StorageError::Io(std::io::Error::other(e)))??;
        Ok(())
    }

    async fn read_json(file: &Path) -> Result<Option<Value>, StorageError> {
        match tokio::fs::read_to_string(file).await {
            Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl DocumentStore for LocalStore {
    async fn read_document(&self, path: &str) -> Result<Option<Value>, StorageError> {
        let file = self.document_file(path)?;
        Self::read_json(&file).await
    }

    async fn read_collection(&self, path: &str) -> Result<Vec<DocumentSnapshot>, StorageError> {
        let dir = self.collection_dir(path)?;
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut snapshots = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let file = entry.path();
            if file.extension().and_then(|e| e.to_str()) != Some(DOCUMENT_EXTENSION) {
                continue;
            }
            let Some(id) = file.file_stem().and_then(|s| s.to_str()).map(str::to_string) else {
                continue;
            };
            match Self::read_json(&file).await {
                Ok(Some(data)) => snapshots.push(DocumentSnapshot { id, data }),
                Ok(None) => {}
                Err(StorageError::Serialization(e)) => {
                    log::warn!(
                        "[boxboard.storage.local] Skipping unreadable document {}: {}",
                        file.display(),
                        e
                    );
                }
                Err(e) => return Err(e),
            }
        }
        snapshots.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(snapshots)
    }

    async fn create_document(&self, collection_path: &str, data: Value) -> Result<String, StorageError> {
        self.collection_dir(collection_path)?;
        let id = uuid::Uuid::new_v4().simple().to_string();
        let path = format!("{}/{}", collection_path, id);
        self.set_document(&path, data).await?;
        Ok(id)
    }

    async fn set_document(&self, path: &str, data: Value) -> Result<(), StorageError> {
        let file = self.document_file(path)?;
        let lock = self.get_write_lock(path)?;
        let _guard = lock.lock().await;
        Self::write_json(file, &data).await
    }

    async fn update_document(&self, path: &str, partial: Map<String, Value>) -> Result<(), StorageError> {
        let file = self.document_file(path)?;
        let lock = self.get_write_lock(path)?;
        let _guard = lock.lock().await;

        let mut doc = Self::read_json(&file)
            .await?
            .ok_or_else(|| StorageError::NotFound(path.to_string()))?;
        match &mut doc {
            Value::Object(fields) => fields.extend(partial),
            other => *other = Value::Object(partial),
        }
        Self::write_json(file, &doc).await
    }

    async fn delete_document(&self, path: &str) -> Result<(), StorageError> {
        let file = self.document_file(path)?;
        let lock = self.get_write_lock(path)?;
        let _guard = lock.lock().await;
        match tokio::fs::remove_file(&file).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
