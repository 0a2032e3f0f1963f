/// In-process document store.
///
/// Keeps every document in a path-keyed map, records a journal of writes,
/// counts reads, and can reject writes (all of them or those under chosen
/// path prefixes) to simulate an unreachable backend.
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, RwLock};

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::paths;
use super::{DocumentSnapshot, DocumentStore, StorageError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteKind {
    Create,
    Set,
    Update,
    Delete,
}

/// One accepted write, in the order the store applied it.
#[derive(Debug, Clone, PartialEq)]
pub struct JournalEntry {
    pub kind: WriteKind,
    pub path: String,
}

#[derive(Default)]
pub struct MemoryStore {
    documents: RwLock<BTreeMap<String, Value>>,
    journal: Mutex<Vec<JournalEntry>>,
    fail_writes: AtomicBool,
    failing_prefixes: Mutex<Vec<String>>,
    reads: AtomicUsize,
}

fn poisoned() -> StorageError {
    StorageError::Unavailable("memory store lock poisoned".to_string())
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a document without touching the journal.
    pub fn insert(&self, path: &str, data: Value) {
        if let Ok(mut docs) = self.documents.write() {
            docs.insert(path.to_string(), data);
        }
    }

    /// Snapshot of a document, outside the async trait.
    pub fn get(&self, path: &str) -> Option<Value> {
        self.documents.read().ok()?.get(path).cloned()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    pub fn len(&self) -> usize {
        self.documents.read().map(|d| d.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Writes applied so far.
    pub fn journal(&self) -> Vec<JournalEntry> {
        self.journal.lock().map(|j| j.clone()).unwrap_or_default()
    }

    pub fn clear_journal(&self) {
        if let Ok(mut journal) = self.journal.lock() {
            journal.clear();
        }
    }

    /// When enabled every write fails with `Unavailable`; reads keep working.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Reject writes to `prefix` and every path below it.
    pub fn fail_path_prefix(&self, prefix: &str) {
        if let Ok(mut prefixes) = self.failing_prefixes.lock() {
            prefixes.push(prefix.to_string());
        }
    }

    /// Document and collection reads served so far.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    fn check_writable(&self, path: &str) -> Result<(), StorageError> {
        let rejected = self.fail_writes.load(Ordering::SeqCst)
            || self
                .failing_prefixes
                .lock()
                .map(|prefixes| {
                    prefixes
                        .iter()
                        .any(|prefix| path == prefix || path.starts_with(&format!("{}/", prefix)))
                })
                .unwrap_or(false);
        if rejected {
            return Err(StorageError::Unavailable(format!("write rejected: {}", path)));
        }
        Ok(())
    }

    fn record(&self, kind: WriteKind, path: &str) {
        if let Ok(mut journal) = self.journal.lock() {
            journal.push(JournalEntry {
                kind,
                path: path.to_string(),
            });
        }
    }
}

fn require_document(path: &str) -> Result<(), StorageError> {
    if paths::is_document_path(path) {
        Ok(())
    } else {
        Err(StorageError::InvalidPath(path.to_string()))
    }
}

fn require_collection(path: &str) -> Result<(), StorageError> {
    if paths::is_collection_path(path) {
        Ok(())
    } else {
        Err(StorageError::InvalidPath(path.to_string()))
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn read_document(&self, path: &str) -> Result<Option<Value>, StorageError> {
        require_document(path)?;
        self.reads.fetch_add(1, Ordering::SeqCst);
        let docs = self.documents.read().map_err(|_| poisoned())?;
        Ok(docs.get(path).cloned())
    }

    async fn read_collection(&self, path: &str) -> Result<Vec<DocumentSnapshot>, StorageError> {
        require_collection(path)?;
        self.reads.fetch_add(1, Ordering::SeqCst);
        let prefix = format!("{}/", path);
        let docs = self.documents.read().map_err(|_| poisoned())?;
        let snapshots = docs
            .range(prefix.clone()..)
            .take_while(|(key, _)| key.starts_with(&prefix))
            .filter_map(|(key, data)| {
                let id = &key[prefix.len()..];
                if id.contains('/') {
                    None
                } else {
                    Some(DocumentSnapshot {
                        id: id.to_string(),
                        data: data.clone(),
                    })
                }
            })
            .collect();
        Ok(snapshots)
    }

    async fn create_document(&self, collection_path: &str, data: Value) -> Result<String, StorageError> {
        require_collection(collection_path)?;
        self.check_writable(collection_path)?;
        let id = uuid::Uuid::new_v4().simple().to_string();
        let path = format!("{}/{}", collection_path, id);
        self.documents
            .write()
            .map_err(|_| poisoned())?
            .insert(path.clone(), data);
        self.record(WriteKind::Create, &path);
        Ok(id)
    }

    async fn set_document(&self, path: &str, data: Value) -> Result<(), StorageError> {
        require_document(path)?;
        self.check_writable(path)?;
        self.documents
            .write()
            .map_err(|_| poisoned())?
            .insert(path.to_string(), data);
        self.record(WriteKind::Set, path);
        Ok(())
    }

    async fn update_document(&self, path: &str, partial: Map<String, Value>) -> Result<(), StorageError> {
        require_document(path)?;
        self.check_writable(path)?;
        {
            let mut docs = self.documents.write().map_err(|_| poisoned())?;
            let doc = docs
                .get_mut(path)
                .ok_or_else(|| StorageError::NotFound(path.to_string()))?;
            match doc {
                Value::Object(fields) => fields.extend(partial),
                other => *other = Value::Object(partial),
            }
        }
        self.record(WriteKind::Update, path);
        Ok(())
    }

    async fn delete_document(&self, path: &str) -> Result<(), StorageError> {
        require_document(path)?;
        self.check_writable(path)?;
        self.documents.write().map_err(|_| poisoned())?.remove(path);
        self.record(WriteKind::Delete, path);
        Ok(())
    }
}
