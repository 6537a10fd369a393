use std::sync::mpsc::Sender;

use serde_json::{Map, Value};

use crate::core::errors::Result;
use crate::core::models::collection::{Collection, Snapshot, StoreNotification};

/// Port for the hierarchical key-value store holding students and events.
///
/// Implementations live in `adapters::stores` (e.g. FileStore, FirebaseStore).
/// The core layer only depends on this trait, never on a concrete backend.
pub trait RecordStore: Send + Sync {
    /// Read every entry of a collection.
    fn get_all(&self, collection: Collection) -> Result<Snapshot>;

    /// Read one entry, `None` if the key is absent.
    fn get(&self, collection: Collection, key: &str) -> Result<Option<Value>> {
        Ok(self.get_all(collection)?.remove(key))
    }

    /// Replace the entry at `key`.
    fn set(&self, collection: Collection, key: &str, value: Value) -> Result<()>;

    /// Merge `fields` into the entry at `key`, leaving other fields untouched.
    fn update_fields(&self, collection: Collection, key: &str, fields: Map<String, Value>)
    -> Result<()>;

    /// Remove the entry at `key`. Removing an absent key is not an error.
    fn delete(&self, collection: Collection, key: &str) -> Result<()>;

    /// Start pushing full snapshots of `collection` into `sink`.
    ///
    /// The current snapshot is sent right away, then again after every
    /// change. With `limit_to_last`, only the greatest `n` keys are included.
    /// Failures after this call returns arrive as `StoreNotification::Failed`.
    fn subscribe(
        &self,
        collection: Collection,
        limit_to_last: Option<usize>,
        sink: Sender<StoreNotification>,
    ) -> Result<Subscription>;

    /// Human-readable name of this backend (e.g. "file", "firebase").
    fn name(&self) -> &str;
}

/// Live subscription handle. Dropping it unsubscribes.
pub struct Subscription {
    collection: Collection,
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(collection: Collection, cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            collection,
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn collection(&self) -> Collection {
        self.collection
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            tracing::debug!(collection = %self.collection, "unsubscribing");
            cancel();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("collection", &self.collection)
            .finish_non_exhaustive()
    }
}

impl<T: RecordStore + ?Sized> RecordStore for Box<T> {
    fn get_all(&self, collection: Collection) -> Result<Snapshot> {
        (**self).get_all(collection)
    }

    fn get(&self, collection: Collection, key: &str) -> Result<Option<Value>> {
        (**self).get(collection, key)
    }

    fn set(&self, collection: Collection, key: &str, value: Value) -> Result<()> {
        (**self).set(collection, key, value)
    }

    fn update_fields(
        &self,
        collection: Collection,
        key: &str,
        fields: Map<String, Value>,
    ) -> Result<()> {
        (**self).update_fields(collection, key, fields)
    }

    fn delete(&self, collection: Collection, key: &str) -> Result<()> {
        (**self).delete(collection, key)
    }

    fn subscribe(
        &self,
        collection: Collection,
        limit_to_last: Option<usize>,
        sink: Sender<StoreNotification>,
    ) -> Result<Subscription> {
        (**self).subscribe(collection, limit_to_last, sink)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
