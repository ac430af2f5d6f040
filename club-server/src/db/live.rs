//! Live listeners and the commit change feed
//!
//! Every committed transaction produces one [`CommitEvent`]. Listeners whose
//! target the event touches get a fresh snapshot, delivered synchronously on
//! the committing thread once the commit is durable. The same event is then
//! broadcast to [`DocStore::subscribe_changes`] receivers.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use shared::store::{
    ListenCallback, ListenEvent, ListenTarget, ListenerRegistration, LiveSource, Snapshot,
    SnapshotMetadata, TransportError,
};

use super::store::{DocStore, StoreResult};

/// One document touched by a commit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocChange {
    pub collection: String,
    pub id: String,
    pub deleted: bool,
}

/// Change set of one committed transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitEvent {
    pub sequence: u64,
    pub changes: Vec<DocChange>,
}

impl CommitEvent {
    pub fn touches_collection(&self, collection: &str) -> bool {
        self.changes.iter().any(|c| c.collection == collection)
    }

    pub fn touches_document(&self, collection: &str, id: &str) -> bool {
        self.changes
            .iter()
            .any(|c| c.collection == collection && c.id == id)
    }

    fn affects(&self, target: &ListenTarget) -> bool {
        match target {
            ListenTarget::Query(q) => self.touches_collection(&q.collection),
            ListenTarget::Document { collection, id } => self.touches_document(collection, id),
        }
    }
}

struct Listener {
    target: ListenTarget,
    callback: ListenCallback,
    active: AtomicBool,
    /// Serializes snapshot computation and delivery so a listener never
    /// sees an older snapshot after a newer one.
    delivery: Mutex<()>,
}

#[derive(Default)]
pub(crate) struct ListenerRegistry {
    next_id: AtomicU64,
    listeners: DashMap<u64, Arc<Listener>>,
}

impl ListenerRegistry {
    fn insert(&self, listener: Arc<Listener>) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners.insert(id, listener);
        id
    }

    fn remove(&self, id: u64) {
        self.listeners.remove(&id);
    }

    fn affected_by(&self, event: &CommitEvent) -> Vec<Arc<Listener>> {
        self.listeners
            .iter()
            .filter(|entry| event.affects(&entry.value().target))
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.listeners.len()
    }
}

impl DocStore {
    /// Current result set for a listen target. Server snapshots are never
    /// cache-only and never carry pending writes.
    pub fn snapshot(&self, target: &ListenTarget) -> StoreResult<Snapshot> {
        let docs = match target {
            ListenTarget::Query(query) => self.query(query)?,
            ListenTarget::Document { collection, id } => {
                self.get(collection, id)?.into_iter().collect()
            }
        };
        Ok(Snapshot::new(docs, SnapshotMetadata::SERVER))
    }

    /// Number of attached live listeners
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.len()
    }

    fn deliver(&self, listener: &Listener) {
        let _guard = listener.delivery.lock();
        if !listener.active.load(Ordering::Acquire) {
            return;
        }
        let event = match self.snapshot(&listener.target) {
            Ok(snapshot) => ListenEvent::Snapshot(snapshot),
            Err(e) => {
                tracing::warn!(collection = listener.target.collection(), error = %e, "Live snapshot failed");
                ListenEvent::Error(TransportError::unavailable(e.to_string()))
            }
        };
        (listener.callback)(event);
    }

    pub(crate) fn notify_listeners(&self, event: &CommitEvent) {
        for listener in self.inner.listeners.affected_by(event) {
            self.deliver(&listener);
        }
    }
}

impl LiveSource for DocStore {
    fn listen(&self, target: ListenTarget, callback: ListenCallback) -> ListenerRegistration {
        let listener = Arc::new(Listener {
            target,
            callback,
            active: AtomicBool::new(true),
            delivery: Mutex::new(()),
        });
        let id = self.inner.listeners.insert(listener.clone());
        tracing::debug!(id, collection = listener.target.collection(), "Listener attached");

        self.deliver(&listener);

        let registry = Arc::downgrade(&self.inner);
        ListenerRegistration::new(move || {
            listener.active.store(false, Ordering::Release);
            if let Some(inner) = registry.upgrade() {
                inner.listeners.remove(id);
            }
            tracing::debug!(id, "Listener detached");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex as PlMutex;
    use serde_json::json;
    use shared::store::{Filter, Query};

    fn recorder() -> (ListenCallback, Arc<PlMutex<Vec<ListenEvent>>>) {
        let events = Arc::new(PlMutex::new(Vec::new()));
        let sink = events.clone();
        let callback: ListenCallback = Arc::new(move |event| sink.lock().push(event));
        (callback, events)
    }

    fn doc_counts(events: &[ListenEvent]) -> Vec<usize> {
        events
            .iter()
            .map(|e| match e {
                ListenEvent::Snapshot(s) => s.docs.len(),
                ListenEvent::Error(_) => usize::MAX,
            })
            .collect()
    }

    #[test]
    fn test_query_listener_receives_initial_and_changes() {
        let store = DocStore::open_in_memory().unwrap();
        store.set("members", "m1", &json!({"clubId": "c1"})).unwrap();

        let (callback, events) = recorder();
        let target = ListenTarget::Query(Query::new("members").filter(Filter::eq("clubId", "c1")));
        let mut registration = store.listen(target, callback);

        store.set("members", "m2", &json!({"clubId": "c1"})).unwrap();
        store.set("clubs", "c1", &json!({"name": "ignored"})).unwrap();
        store.delete("members", "m1").unwrap();

        assert_eq!(doc_counts(&events.lock()), vec![1, 2, 1]);

        registration.remove();
        store.set("members", "m3", &json!({"clubId": "c1"})).unwrap();
        assert_eq!(events.lock().len(), 3);
        assert_eq!(store.listener_count(), 0);
    }

    #[test]
    fn test_document_listener_only_sees_its_document() {
        let store = DocStore::open_in_memory().unwrap();
        let (callback, events) = recorder();
        let _registration = store.listen(ListenTarget::document("users", "u1"), callback);

        store.set("users", "u2", &json!({"uid": "u2"})).unwrap();
        store.set("users", "u1", &json!({"uid": "u1"})).unwrap();

        let events = events.lock();
        assert_eq!(doc_counts(&events), vec![0, 1]);
        if let ListenEvent::Snapshot(s) = &events[1] {
            assert!(s.metadata.is_confirmed());
            assert_eq!(s.document().unwrap().id, "u1");
        }
    }

    #[test]
    fn test_dropping_registration_detaches() {
        let store = DocStore::open_in_memory().unwrap();
        let (callback, events) = recorder();
        drop(store.listen(ListenTarget::document("users", "u1"), callback));
        store.set("users", "u1", &json!({"uid": "u1"})).unwrap();
        assert_eq!(events.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_change_feed_broadcasts_commits() {
        let store = DocStore::open_in_memory().unwrap();
        let mut rx = store.subscribe_changes();
        store
            .run_transaction(|tx| -> Result<(), crate::db::StoreError> {
                tx.set("members", "m1", &json!({"name": "A"}))?;
                tx.set("users", "u1", &json!({"uid": "u1"}))
            })
            .unwrap();

        let event = rx.recv().await.unwrap();
        assert_eq!(event.sequence, 1);
        assert!(event.touches_document("users", "u1"));
        assert!(event.touches_collection("members"));
        assert!(!event.touches_collection("clubs"));
    }
}
