use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::time::Duration;

use fs2::FileExt;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::core::errors::{AccessDeskError, Result};
use crate::core::models::collection::{Collection, Snapshot, StoreNotification, limit_to_last};
use crate::core::traits::record_store::{RecordStore, Subscription};

/// Record store kept in a single JSON document on disk.
///
/// The document mirrors the remote database layout, so an export of the
/// remote store can be used as-is:
/// ```text
/// {
///   "autorizados": { "04A3B2C1": { "nome": "Ana", "ra": "R1", "autorizado": true } },
///   "registros":   { "20240101_080000": { "uid": "04A3B2C1", "status": "autorizado" } }
/// }
/// ```
///
/// Writes replace the file atomically. Subscriptions poll the file, so
/// changes written by other processes (e.g. the badge reader bridge) are
/// picked up too.
///
/// Lock contract: next to `store.json` lives `store.json.lock`. Readers hold
/// a shared advisory lock on it while reading; writers hold an exclusive
/// lock across read, modify and replace. External writers must do the same,
/// or their changes can be overwritten by a concurrent write.
pub struct FileStore {
    path: PathBuf,
    poll_interval: Duration,
}

/// On-disk document. Unknown top-level keys are preserved across writes.
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreDocument {
    #[serde(default)]
    autorizados: Snapshot,
    #[serde(default)]
    registros: Snapshot,
    #[serde(flatten)]
    other: Map<String, Value>,
}

impl StoreDocument {
    fn collection_mut(&mut self, collection: Collection) -> &mut Snapshot {
        match collection {
            Collection::Authorized => &mut self.autorizados,
            Collection::Events => &mut self.registros,
        }
    }
}

impl FileStore {
    /// Create a store backed by the given file path.
    pub fn new(path: PathBuf, poll_interval: Duration) -> Self {
        Self {
            path,
            poll_interval,
        }
    }

    /// Write an empty document if none exists yet.
    pub fn create_empty(path: &Path) -> Result<()> {
        if !path.exists() {
            write_document(path, &StoreDocument::default())?;
        }
        Ok(())
    }

    fn modify(&self, collection: Collection, change: impl FnOnce(&mut Snapshot)) -> Result<()> {
        let lock = open_lock_file(&self.path)?;
        FileExt::lock_exclusive(&lock)
            .map_err(|e| AccessDeskError::store("write", format!("cannot lock store: {e}")))?;

        // Held until `lock` drops at the end of this call.
        let mut doc = read_unlocked(&self.path)?;
        change(doc.collection_mut(collection));
        write_unlocked(&self.path, &doc)
    }
}

/// Sidecar file the advisory locks are taken on. The document itself is
/// replaced on every write, so it cannot carry the lock.
fn lock_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "store".into());
    name.push(".lock");
    path.with_file_name(name)
}

fn open_lock_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    let lock_path = lock_path(path);
    OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(&lock_path)
        .map_err(|e| {
            AccessDeskError::store("lock", format!("cannot open {}: {e}", lock_path.display()))
        })
}

fn read_document(path: &Path) -> Result<StoreDocument> {
    if !path.exists() {
        return Ok(StoreDocument::default());
    }
    let lock = open_lock_file(path)?;
    FileExt::lock_shared(&lock)
        .map_err(|e| AccessDeskError::store("read", format!("cannot lock store: {e}")))?;
    read_unlocked(path)
}

fn write_document(path: &Path, doc: &StoreDocument) -> Result<()> {
    let lock = open_lock_file(path)?;
    FileExt::lock_exclusive(&lock)
        .map_err(|e| AccessDeskError::store("write", format!("cannot lock store: {e}")))?;
    write_unlocked(path, doc)
}

/// Caller holds the lock.
fn read_unlocked(path: &Path) -> Result<StoreDocument> {
    if !path.exists() {
        return Ok(StoreDocument::default());
    }
    let content = std::fs::read_to_string(path).map_err(|e| {
        AccessDeskError::store("read", format!("cannot read {}: {e}", path.display()))
    })?;
    if content.trim().is_empty() {
        return Ok(StoreDocument::default());
    }
    serde_json::from_str(&content).map_err(|e| {
        AccessDeskError::store("read", format!("{} is not a valid store document: {e}", path.display()))
    })
}

/// Caller holds the exclusive lock.
fn write_unlocked(path: &Path, doc: &StoreDocument) -> Result<()> {
    let json = serde_json::to_string_pretty(doc)
        .map_err(|e| AccessDeskError::store("write", format!("cannot serialize store: {e}")))?;

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir)?;

    let mut tmp = tempfile::NamedTempFile::new_in(&dir)
        .map_err(|e| AccessDeskError::store("write", format!("cannot create temp file: {e}")))?;
    writeln!(tmp, "{json}")
        .map_err(|e| AccessDeskError::store("write", format!("cannot write temp file: {e}")))?;
    tmp.persist(path).map_err(|e| {
        AccessDeskError::store("write", format!("cannot replace {}: {e}", path.display()))
    })?;
    Ok(())
}

impl RecordStore for FileStore {
    fn get_all(&self, collection: Collection) -> Result<Snapshot> {
        let mut doc = read_document(&self.path)?;
        Ok(std::mem::take(doc.collection_mut(collection)))
    }

    fn set(&self, collection: Collection, key: &str, value: Value) -> Result<()> {
        tracing::debug!(%collection, key, "set");
        self.modify(collection, |snap| {
            snap.insert(key.to_string(), value);
        })
    }

    fn update_fields(
        &self,
        collection: Collection,
        key: &str,
        fields: Map<String, Value>,
    ) -> Result<()> {
        tracing::debug!(%collection, key, fields = fields.len(), "update");
        self.modify(collection, |snap| {
            let entry = snap
                .entry(key.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !entry.is_object() {
                *entry = Value::Object(Map::new());
            }
            if let Value::Object(existing) = entry {
                existing.extend(fields);
            }
        })
    }

    fn delete(&self, collection: Collection, key: &str) -> Result<()> {
        tracing::debug!(%collection, key, "delete");
        self.modify(collection, |snap| {
            snap.remove(key);
        })
    }

    fn subscribe(
        &self,
        collection: Collection,
        limit: Option<usize>,
        sink: Sender<StoreNotification>,
    ) -> Result<Subscription> {
        let initial = limit_to_last(self.get_all(collection)?, limit);
        let _ = sink.send(StoreNotification::Snapshot {
            collection,
            entries: initial.clone(),
        });

        let cancelled = Arc::new(AtomicBool::new(false));
        let poller = FilePoller {
            path: self.path.clone(),
            collection,
            limit,
            interval: self.poll_interval,
            last: initial,
            cancelled: Arc::clone(&cancelled),
            sink,
        };
        std::thread::Builder::new()
            .name(format!("poll-{collection}"))
            .spawn(move || poller.run())?;

        Ok(Subscription::new(collection, move || {
            cancelled.store(true, Ordering::Relaxed);
        }))
    }

    fn name(&self) -> &str {
        "file"
    }
}

/// Background watcher that re-reads the document and forwards changes.
struct FilePoller {
    path: PathBuf,
    collection: Collection,
    limit: Option<usize>,
    interval: Duration,
    last: Snapshot,
    cancelled: Arc<AtomicBool>,
    sink: Sender<StoreNotification>,
}

impl FilePoller {
    /// Poll until cancelled or the consumer goes away.
    ///
    /// A failed read is reported once and polling continues; the next good
    /// read is sent even if unchanged, so the consumer can clear the failure.
    fn run(mut self) {
        let mut failing = false;
        loop {
            std::thread::sleep(self.interval);
            if self.cancelled.load(Ordering::Relaxed) {
                return;
            }

            let notification = match read_document(&self.path) {
                Ok(mut doc) => {
                    let current = limit_to_last(
                        std::mem::take(doc.collection_mut(self.collection)),
                        self.limit,
                    );
                    if current == self.last && !failing {
                        continue;
                    }
                    failing = false;
                    self.last = current.clone();
                    StoreNotification::Snapshot {
                        collection: self.collection,
                        entries: current,
                    }
                }
                Err(e) if !failing => {
                    tracing::error!(collection = %self.collection, error = %e, "file subscription read failed");
                    failing = true;
                    StoreNotification::Failed {
                        collection: self.collection,
                        reason: e.to_string(),
                    }
                }
                Err(_) => continue,
            };

            if self.sink.send(notification).is_err() {
                return;
            }
        }
    }
}
