use std::collections::HashMap;
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use serde_json::{Map, Value};

use crate::core::errors::{AccessDeskError, Result};
use crate::core::models::collection::{Collection, Snapshot, StoreNotification, limit_to_last};
use crate::core::traits::record_store::{RecordStore, Subscription};

/// In-process store with synchronous change notification, used to drive the
/// services in unit tests.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Default)]
struct Inner {
    collections: HashMap<Collection, Snapshot>,
    listeners: Vec<Listener>,
    next_id: u64,
    fail_writes: bool,
}

struct Listener {
    id: u64,
    collection: Collection,
    limit: Option<usize>,
    sink: Sender<StoreNotification>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following write fail, to exercise error paths.
    pub fn fail_writes(&self) {
        self.lock().fail_writes = true;
    }

    /// Simulate a transport error on every live subscription of `collection`.
    pub fn break_subscriptions(&self, collection: Collection, reason: &str) {
        let mut inner = self.lock();
        inner.listeners.retain(|l| {
            if l.collection != collection {
                return true;
            }
            let _ = l.sink.send(StoreNotification::Failed {
                collection,
                reason: reason.to_string(),
            });
            false
        });
    }

    /// Number of live subscriptions.
    pub fn listener_count(&self) -> usize {
        self.lock().listeners.len()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self, collection: Collection, change: impl FnOnce(&mut Snapshot)) -> Result<()> {
        let mut inner = self.lock();
        if inner.fail_writes {
            return Err(AccessDeskError::store("write", "permission denied"));
        }
        let snapshot = inner.collections.entry(collection).or_default();
        change(snapshot);
        let snapshot = snapshot.clone();
        inner.listeners.retain(|l| {
            l.collection != collection
                || l
                    .sink
                    .send(StoreNotification::Snapshot {
                        collection,
                        entries: limit_to_last(snapshot.clone(), l.limit),
                    })
                    .is_ok()
        });
        Ok(())
    }
}

impl RecordStore for MemoryStore {
    fn get_all(&self, collection: Collection) -> Result<Snapshot> {
        Ok(self
            .lock()
            .collections
            .get(&collection)
            .cloned()
            .unwrap_or_default())
    }

    fn set(&self, collection: Collection, key: &str, value: Value) -> Result<()> {
        self.write(collection, |snap| {
            snap.insert(key.to_string(), value);
        })
    }

    fn update_fields(
        &self,
        collection: Collection,
        key: &str,
        fields: Map<String, Value>,
    ) -> Result<()> {
        self.write(collection, |snap| {
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
        self.write(collection, |snap| {
            snap.remove(key);
        })
    }

    fn subscribe(
        &self,
        collection: Collection,
        limit: Option<usize>,
        sink: Sender<StoreNotification>,
    ) -> Result<Subscription> {
        let mut inner = self.lock();
        let current = inner.collections.get(&collection).cloned().unwrap_or_default();
        let _ = sink.send(StoreNotification::Snapshot {
            collection,
            entries: limit_to_last(current, limit),
        });

        let id = inner.next_id;
        inner.next_id += 1;
        inner.listeners.push(Listener {
            id,
            collection,
            limit,
            sink,
        });

        let weak: Weak<Mutex<Inner>> = Arc::downgrade(&self.inner);
        Ok(Subscription::new(collection, move || {
            if let Some(inner) = weak.upgrade() {
                let mut inner = inner.lock().unwrap_or_else(|e| e.into_inner());
                inner.listeners.retain(|l| l.id != id);
            }
        }))
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::mpsc;

    #[test]
    fn subscribe_sends_current_snapshot_first() {
        let store = MemoryStore::new();
        store
            .set(Collection::Authorized, "C1", json!({"nome": "Ana"}))
            .unwrap();

        let (tx, rx) = mpsc::channel();
        let _sub = store.subscribe(Collection::Authorized, None, tx).unwrap();

        match rx.try_recv().unwrap() {
            StoreNotification::Snapshot { entries, .. } => assert!(entries.contains_key("C1")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn changes_deliver_full_snapshots() {
        let store = MemoryStore::new();
        let (tx, rx) = mpsc::channel();
        let _sub = store.subscribe(Collection::Authorized, None, tx).unwrap();
        let _initial = rx.try_recv().unwrap();

        store.set(Collection::Authorized, "C1", json!({})).unwrap();
        store.set(Collection::Authorized, "C2", json!({})).unwrap();
        let _first = rx.try_recv().unwrap();
        match rx.try_recv().unwrap() {
            StoreNotification::Snapshot { entries, .. } => assert_eq!(entries.len(), 2),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn other_collections_do_not_notify() {
        let store = MemoryStore::new();
        let (tx, rx) = mpsc::channel();
        let _sub = store.subscribe(Collection::Events, None, tx).unwrap();
        let _initial = rx.try_recv().unwrap();

        store.set(Collection::Authorized, "C1", json!({})).unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn dropping_subscription_unsubscribes() {
        let store = MemoryStore::new();
        let (tx, _rx) = mpsc::channel();
        let sub = store.subscribe(Collection::Events, None, tx).unwrap();
        assert_eq!(store.listener_count(), 1);

        drop(sub);
        assert_eq!(store.listener_count(), 0);
    }

    #[test]
    fn update_fields_merges() {
        let store = MemoryStore::new();
        store
            .set(Collection::Authorized, "C1", json!({"nome": "Ana", "autorizado": true}))
            .unwrap();

        let mut fields = Map::new();
        fields.insert("autorizado".into(), json!(false));
        store
            .update_fields(Collection::Authorized, "C1", fields)
            .unwrap();

        assert_eq!(
            store.get(Collection::Authorized, "C1").unwrap(),
            Some(json!({"nome": "Ana", "autorizado": false}))
        );
    }
}
