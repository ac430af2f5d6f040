//! redb-backed document store
//!
//! # Tables
//!
//! | Table | Key | Value | Purpose |
//! |-------|-----|-------|---------|
//! | `documents` | `(collection, id)` | JSON bytes | Document bodies |
//! | `doc_versions` | `(collection, id)` | `u64` | Commit sequence that last wrote the document |
//! | `collection_versions` | `collection` | `u64` | Commit sequence that last wrote the collection |
//! | `meta` | `"seq"` | `u64` | Global commit sequence |
//!
//! Versions are commit sequence numbers, so they only ever grow. An absent
//! document has version `0`.

use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use shared::store::{Document, Query};
use shared::{AppError, AppResult};
use thiserror::Error;
use tokio::sync::broadcast;

use super::live::{CommitEvent, DocChange, ListenerRegistry};
use super::transaction::{CollectionReadSet, PendingWrite, ReadSet, Transaction};

pub(crate) const DOCUMENTS_TABLE: TableDefinition<(&str, &str), &[u8]> =
    TableDefinition::new("documents");

pub(crate) const DOC_VERSIONS_TABLE: TableDefinition<(&str, &str), u64> =
    TableDefinition::new("doc_versions");

pub(crate) const COLLECTION_VERSIONS_TABLE: TableDefinition<&str, u64> =
    TableDefinition::new("collection_versions");

const META_TABLE: TableDefinition<&str, u64> = TableDefinition::new("meta");

const SEQUENCE_KEY: &str = "seq";

/// Default number of attempts before a conflicting transaction gives up
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

const CHANGE_CHANNEL_CAPACITY: usize = 256;

/// Store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("Storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Document not found: {0}/{1}")]
    NotFound(String, String),

    #[error("Invalid document {collection}/{id}: {reason}")]
    InvalidDocument {
        collection: String,
        id: String,
        reason: String,
    },

    #[error("Transaction gave up after {0} conflicting attempts")]
    Contention(u32),
}

pub type StoreResult<T> = Result<T, StoreError>;

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(collection, id) => {
                AppError::not_found(format!("{collection}/{id}"))
            }
            StoreError::Contention(attempts) => AppError::contention(attempts),
            StoreError::InvalidDocument { .. } => AppError::internal(err.to_string()),
            other => AppError::database(other.to_string()),
        }
    }
}

/// Runs on the committing thread after each commit, before the
/// transaction call returns
pub type CommitHook = Arc<dyn Fn(&CommitEvent) + Send + Sync>;

pub(crate) struct StoreInner {
    pub(crate) db: Database,
    max_attempts: u32,
    pub(crate) listeners: ListenerRegistry,
    changes: broadcast::Sender<CommitEvent>,
    commit_hooks: RwLock<Vec<CommitHook>>,
}

/// Embedded document store with optimistic transactions and live listeners
#[derive(Clone)]
pub struct DocStore {
    pub(crate) inner: Arc<StoreInner>,
}

enum CommitOutcome {
    Committed(Option<CommitEvent>),
    Conflict,
}

impl DocStore {
    /// Open or create the store at the given path
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let db = Database::create(path)?;
        Self::init(db)
    }

    /// Open a store that lives only in memory
    pub fn open_in_memory() -> StoreResult<Self> {
        let db = Database::builder().create_with_backend(redb::backends::InMemoryBackend::new())?;
        Self::init(db)
    }

    fn init(db: Database) -> StoreResult<Self> {
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(DOCUMENTS_TABLE)?;
            let _ = write_txn.open_table(DOC_VERSIONS_TABLE)?;
            let _ = write_txn.open_table(COLLECTION_VERSIONS_TABLE)?;
            let mut meta = write_txn.open_table(META_TABLE)?;
            if meta.get(SEQUENCE_KEY)?.is_none() {
                meta.insert(SEQUENCE_KEY, 0u64)?;
            }
        }
        write_txn.commit()?;

        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Ok(Self {
            inner: Arc::new(StoreInner {
                db,
                max_attempts: DEFAULT_MAX_ATTEMPTS,
                listeners: ListenerRegistry::default(),
                changes,
                commit_hooks: RwLock::new(Vec::new()),
            }),
        })
    }

    /// Set the transaction attempt ceiling. Only effective before the store
    /// is shared.
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        if let Some(inner) = Arc::get_mut(&mut self.inner) {
            inner.max_attempts = attempts.max(1);
        }
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.inner.max_attempts
    }

    /// Subscribe to committed change sets
    pub fn subscribe_changes(&self) -> broadcast::Receiver<CommitEvent> {
        self.inner.changes.subscribe()
    }

    /// Register a hook that sees every commit synchronously. Unlike
    /// [`subscribe_changes`](Self::subscribe_changes), the hook has run by
    /// the time the writer's transaction call returns.
    pub fn on_commit(&self, hook: impl Fn(&CommitEvent) + Send + Sync + 'static) {
        self.inner.commit_hooks.write().push(Arc::new(hook));
    }

    /// Current global commit sequence
    pub fn sequence(&self) -> StoreResult<u64> {
        let read_txn = self.inner.db.begin_read()?;
        let meta = read_txn.open_table(META_TABLE)?;
        Ok(meta.get(SEQUENCE_KEY)?.map(|g| g.value()).unwrap_or(0))
    }

    // ========== Transactions ==========

    /// Run `body` as one atomic unit.
    ///
    /// The body reads from a single consistent snapshot and buffers its
    /// writes. At commit every document and collection the body read is
    /// checked against the latest committed versions; if any changed, the
    /// buffered writes are discarded and the body runs again from scratch.
    /// A body error aborts without writing anything.
    pub fn run_transaction<T, E, F>(&self, mut body: F) -> Result<T, E>
    where
        F: FnMut(&mut Transaction) -> Result<T, E>,
        E: From<StoreError>,
    {
        let max_attempts = self.inner.max_attempts;
        for attempt in 1..=max_attempts {
            let mut tx = Transaction::begin(&self.inner.db)?;
            let value = body(&mut tx)?;
            match self.commit(tx)? {
                CommitOutcome::Committed(event) => {
                    if let Some(event) = event {
                        self.publish(event);
                    }
                    return Ok(value);
                }
                CommitOutcome::Conflict => {
                    tracing::debug!(attempt, max_attempts, "Transaction read set changed, retrying");
                }
            }
        }
        tracing::warn!(max_attempts, "Transaction aborted after repeated conflicts");
        Err(StoreError::Contention(max_attempts).into())
    }

    /// Run `f` on the blocking pool so redb calls never stall a runtime
    /// worker
    pub async fn blocking<T, F>(&self, f: F) -> AppResult<T>
    where
        F: FnOnce(&DocStore) -> AppResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let store = self.clone();
        tokio::task::spawn_blocking(move || f(&store))
            .await
            .map_err(|e| AppError::internal(format!("Store task failed: {e}")))?
    }

    /// [`run_transaction`](Self::run_transaction) on the blocking pool
    pub async fn run_transaction_async<T, F>(&self, body: F) -> AppResult<T>
    where
        F: FnMut(&mut Transaction) -> AppResult<T> + Send + 'static,
        T: Send + 'static,
    {
        self.blocking(move |store| store.run_transaction(body)).await
    }

    fn commit(&self, tx: Transaction) -> StoreResult<CommitOutcome> {
        let (reads, collection_reads, writes) = tx.into_parts();
        if writes.is_empty() {
            return Ok(CommitOutcome::Committed(None));
        }

        // redb admits one write transaction at a time, so validation and
        // application below are serialized against every other commit.
        let write_txn = self.inner.db.begin_write()?;
        let read_set_valid = {
            let versions = write_txn.open_table(DOC_VERSIONS_TABLE)?;
            let collection_versions = write_txn.open_table(COLLECTION_VERSIONS_TABLE)?;
            validate_read_set(&versions, &collection_versions, &reads, &collection_reads)?
        };
        if !read_set_valid {
            write_txn.abort()?;
            return Ok(CommitOutcome::Conflict);
        }

        let sequence;
        let mut changes = Vec::with_capacity(writes.len());
        {
            let mut docs = write_txn.open_table(DOCUMENTS_TABLE)?;
            let mut versions = write_txn.open_table(DOC_VERSIONS_TABLE)?;
            let mut collection_versions = write_txn.open_table(COLLECTION_VERSIONS_TABLE)?;
            let mut meta = write_txn.open_table(META_TABLE)?;

            sequence = meta.get(SEQUENCE_KEY)?.map(|g| g.value()).unwrap_or(0) + 1;
            for ((collection, id), write) in &writes {
                let key = (collection.as_str(), id.as_str());
                match write {
                    PendingWrite::Set(data) => {
                        let bytes = serde_json::to_vec(data)?;
                        docs.insert(key, bytes.as_slice())?;
                        versions.insert(key, sequence)?;
                    }
                    PendingWrite::Delete => {
                        docs.remove(key)?;
                        versions.remove(key)?;
                    }
                }
                collection_versions.insert(collection.as_str(), sequence)?;
                changes.push(DocChange {
                    collection: collection.clone(),
                    id: id.clone(),
                    deleted: matches!(write, PendingWrite::Delete),
                });
            }
            meta.insert(SEQUENCE_KEY, sequence)?;
        }
        write_txn.commit()?;

        Ok(CommitOutcome::Committed(Some(CommitEvent { sequence, changes })))
    }

    fn publish(&self, event: CommitEvent) {
        let hooks = self.inner.commit_hooks.read().clone();
        for hook in &hooks {
            hook(&event);
        }
        self.notify_listeners(&event);
        // No receivers is fine
        let _ = self.inner.changes.send(event);
    }

    // ========== Single-document operations ==========

    pub fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Document>> {
        let read_txn = self.inner.db.begin_read()?;
        let docs = read_txn.open_table(DOCUMENTS_TABLE)?;
        match docs.get((collection, id))? {
            Some(guard) => {
                let data: Value = serde_json::from_slice(guard.value())?;
                Ok(Some(Document::new(id, data)))
            }
            None => Ok(None),
        }
    }

    /// Read and decode into the collection schema
    pub fn get_as<T: DeserializeOwned>(&self, collection: &str, id: &str) -> StoreResult<Option<T>> {
        self.get(collection, id)?
            .map(|doc| decode_document(collection, &doc))
            .transpose()
    }

    /// Committed documents matching `query`, in id order unless ordered
    pub fn query(&self, query: &Query) -> StoreResult<Vec<Document>> {
        let read_txn = self.inner.db.begin_read()?;
        let docs = read_txn.open_table(DOCUMENTS_TABLE)?;
        let candidates = scan_collection(&docs, &query.collection)?;
        Ok(query.apply(candidates))
    }

    /// Query and decode every match
    pub fn query_as<T: DeserializeOwned>(&self, query: &Query) -> StoreResult<Vec<T>> {
        self.query(query)?
            .iter()
            .map(|doc| decode_document(&query.collection, doc))
            .collect()
    }

    /// Replace (or create) a document
    pub fn set<T: Serialize>(&self, collection: &str, id: &str, value: &T) -> StoreResult<()> {
        self.run_transaction(|tx| tx.set(collection, id, value))
    }

    /// Shallow-merge `patch` into an existing document; `null` clears a field
    pub fn update(&self, collection: &str, id: &str, patch: Value) -> StoreResult<()> {
        self.run_transaction(|tx| tx.update(collection, id, patch.clone()))
    }

    pub fn delete(&self, collection: &str, id: &str) -> StoreResult<()> {
        self.run_transaction(|tx| {
            tx.delete(collection, id);
            Ok(())
        })
    }

    /// Number of documents in a collection
    pub fn count(&self, collection: &str) -> StoreResult<usize> {
        Ok(self.query(&Query::new(collection))?.len())
    }
}

fn validate_read_set(
    versions: &impl ReadableTable<(&'static str, &'static str), u64>,
    collection_versions: &impl ReadableTable<&'static str, u64>,
    reads: &ReadSet,
    collection_reads: &CollectionReadSet,
) -> StoreResult<bool> {
    for ((collection, id), seen) in reads {
        let current = versions
            .get((collection.as_str(), id.as_str()))?
            .map(|g| g.value())
            .unwrap_or(0);
        if current != *seen {
            tracing::trace!(%collection, %id, seen, current, "Stale document read");
            return Ok(false);
        }
    }
    for (collection, seen) in collection_reads {
        let current = collection_versions
            .get(collection.as_str())?
            .map(|g| g.value())
            .unwrap_or(0);
        if current != *seen {
            tracing::trace!(%collection, seen, current, "Stale collection read");
            return Ok(false);
        }
    }
    Ok(true)
}

pub(crate) fn scan_collection(
    docs: &impl ReadableTable<(&'static str, &'static str), &'static [u8]>,
    collection: &str,
) -> StoreResult<Vec<Document>> {
    let mut out = Vec::new();
    for result in docs.range((collection, "")..)? {
        let (key, value) = result?;
        let (owner, id) = key.value();
        if owner != collection {
            break;
        }
        let data: Value = serde_json::from_slice(value.value())?;
        out.push(Document::new(id, data));
    }
    Ok(out)
}

pub(crate) fn decode_document<T: DeserializeOwned>(
    collection: &str,
    doc: &Document,
) -> StoreResult<T> {
    doc.decode().map_err(|e| StoreError::InvalidDocument {
        collection: collection.to_string(),
        id: doc.id.clone(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use shared::store::Filter;

    #[tokio::test(flavor = "current_thread")]
    async fn test_async_helpers_run_on_the_blocking_pool() {
        let store = DocStore::open_in_memory().unwrap();
        let runtime_thread = std::thread::current().id();

        let ran_on = store
            .blocking(|store| {
                store.set("users", "u1", &json!({"uid": "u1"}))?;
                Ok(std::thread::current().id())
            })
            .await
            .unwrap();
        assert_ne!(ran_on, runtime_thread);

        let seen = store
            .run_transaction_async(|tx| Ok(tx.get("users", "u1")?.is_some()))
            .await
            .unwrap();
        assert!(seen);
    }

    #[test]
    fn test_commit_hooks_run_before_the_writer_returns() {
        let store = DocStore::open_in_memory().unwrap();
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = seen.clone();
        store.on_commit(move |event| {
            sink.lock()
                .extend(event.changes.iter().map(|c| format!("{}/{}", c.collection, c.id)));
        });

        store.set("users", "u1", &json!({"uid": "u1"})).unwrap();
        assert_eq!(*seen.lock(), vec!["users/u1".to_string()]);

        // Read-only transactions commit nothing and fire nothing
        store.run_transaction(|tx| tx.get("users", "u1").map(|_| ())).unwrap();
        assert_eq!(seen.lock().len(), 1);
    }

    #[test]
    fn test_set_get_update_delete() {
        let store = DocStore::open_in_memory().unwrap();
        store
            .set("users", "u1", &json!({"uid": "u1", "status": "pending", "clubId": "c1"}))
            .unwrap();

        store
            .update("users", "u1", json!({"status": "active", "clubId": null}))
            .unwrap();
        let doc = store.get("users", "u1").unwrap().unwrap();
        assert_eq!(doc.data["status"], "active");
        assert!(doc.data.get("clubId").is_none());

        store.delete("users", "u1").unwrap();
        assert!(store.get("users", "u1").unwrap().is_none());
    }

    #[test]
    fn test_update_missing_document_fails() {
        let store = DocStore::open_in_memory().unwrap();
        let err = store.update("users", "ghost", json!({"a": 1})).unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_, _)));
    }

    #[test]
    fn test_query_scopes_to_collection() {
        let store = DocStore::open_in_memory().unwrap();
        store.set("members", "m1", &json!({"clubId": "c1"})).unwrap();
        store.set("members", "m2", &json!({"clubId": "c2"})).unwrap();
        store.set("membersArchive", "m3", &json!({"clubId": "c1"})).unwrap();
        store.set("audit_logs", "a1", &json!({"clubId": "c1"})).unwrap();

        let hits = store
            .query(&Query::new("members").filter(Filter::eq("clubId", "c1")))
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "m1");
        assert_eq!(store.count("members").unwrap(), 2);
    }

    #[test]
    fn test_sequence_advances_per_commit() {
        let store = DocStore::open_in_memory().unwrap();
        assert_eq!(store.sequence().unwrap(), 0);
        store.set("clubs", "c1", &json!({"name": "A"})).unwrap();
        store.set("clubs", "c2", &json!({"name": "B"})).unwrap();
        assert_eq!(store.sequence().unwrap(), 2);
    }

    #[test]
    fn test_file_backed_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("club.redb");
        {
            let store = DocStore::open(&path).unwrap();
            store.set("clubs", "c1", &json!({"id": "c1", "name": "Harbor"})).unwrap();
        }
        let store = DocStore::open(&path).unwrap();
        let doc = store.get("clubs", "c1").unwrap().unwrap();
        assert_eq!(doc.data["name"], "Harbor");
        assert_eq!(store.sequence().unwrap(), 1);
    }
}
