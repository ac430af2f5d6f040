//! Optimistic transaction handle

use std::collections::{BTreeMap, HashMap};

use redb::{Database, ReadTransaction, ReadableDatabase, ReadableTable};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use shared::store::{Document, Query};

use super::store::{
    COLLECTION_VERSIONS_TABLE, DOC_VERSIONS_TABLE, DOCUMENTS_TABLE, StoreError, StoreResult,
    decode_document, scan_collection,
};

pub(crate) type DocKey = (String, String);
pub(crate) type ReadSet = HashMap<DocKey, u64>;
pub(crate) type CollectionReadSet = HashMap<String, u64>;

#[derive(Debug, Clone)]
pub(crate) enum PendingWrite {
    Set(Value),
    Delete,
}

/// Transaction handle passed to a [`DocStore::run_transaction`] body
///
/// Reads see one consistent snapshot plus the transaction's own buffered
/// writes for point reads. Queries only see committed state.
///
/// [`DocStore::run_transaction`]: super::DocStore::run_transaction
pub struct Transaction {
    snapshot: ReadTransaction,
    reads: ReadSet,
    collection_reads: CollectionReadSet,
    writes: BTreeMap<DocKey, PendingWrite>,
}

impl Transaction {
    pub(crate) fn begin(db: &Database) -> StoreResult<Self> {
        Ok(Self {
            snapshot: db.begin_read()?,
            reads: HashMap::new(),
            collection_reads: HashMap::new(),
            writes: BTreeMap::new(),
        })
    }

    pub(crate) fn into_parts(self) -> (ReadSet, CollectionReadSet, BTreeMap<DocKey, PendingWrite>) {
        (self.reads, self.collection_reads, self.writes)
    }

    fn key(collection: &str, id: &str) -> DocKey {
        (collection.to_string(), id.to_string())
    }

    /// Read a document, recording its version for commit-time validation
    pub fn get(&mut self, collection: &str, id: &str) -> StoreResult<Option<Document>> {
        let key = Self::key(collection, id);
        if let Some(write) = self.writes.get(&key) {
            return Ok(match write {
                PendingWrite::Set(data) => Some(Document::new(id, data.clone())),
                PendingWrite::Delete => None,
            });
        }

        let versions = self.snapshot.open_table(DOC_VERSIONS_TABLE)?;
        let version = versions.get((collection, id))?.map(|g| g.value()).unwrap_or(0);
        let docs = self.snapshot.open_table(DOCUMENTS_TABLE)?;
        let doc = match docs.get((collection, id))? {
            Some(guard) => Some(Document::new(id, serde_json::from_slice(guard.value())?)),
            None => None,
        };
        self.reads.entry(key).or_insert(version);
        Ok(doc)
    }

    /// Read and decode into the collection schema
    pub fn get_as<T: DeserializeOwned>(&mut self, collection: &str, id: &str) -> StoreResult<Option<T>> {
        self.get(collection, id)?
            .map(|doc| decode_document(collection, &doc))
            .transpose()
    }

    /// Run a query against the snapshot. Any later commit to the collection
    /// invalidates the transaction, which keeps "no matching document"
    /// checks sound.
    pub fn query(&mut self, query: &Query) -> StoreResult<Vec<Document>> {
        let collection_versions = self.snapshot.open_table(COLLECTION_VERSIONS_TABLE)?;
        let version = collection_versions
            .get(query.collection.as_str())?
            .map(|g| g.value())
            .unwrap_or(0);
        let docs = self.snapshot.open_table(DOCUMENTS_TABLE)?;
        let candidates = scan_collection(&docs, &query.collection)?;
        self.collection_reads
            .entry(query.collection.clone())
            .or_insert(version);
        Ok(query.apply(candidates))
    }

    pub fn query_as<T: DeserializeOwned>(&mut self, query: &Query) -> StoreResult<Vec<T>> {
        self.query(query)?
            .iter()
            .map(|doc| decode_document(&query.collection, doc))
            .collect()
    }

    /// Buffer a full replacement of the document
    pub fn set<T: Serialize>(&mut self, collection: &str, id: &str, value: &T) -> StoreResult<()> {
        let data = serde_json::to_value(value)?;
        if !data.is_object() {
            return Err(StoreError::InvalidDocument {
                collection: collection.to_string(),
                id: id.to_string(),
                reason: "document body must be a JSON object".into(),
            });
        }
        self.writes
            .insert(Self::key(collection, id), PendingWrite::Set(data));
        Ok(())
    }

    /// Buffer a shallow merge into an existing document. `null` values
    /// remove the field.
    pub fn update(&mut self, collection: &str, id: &str, patch: Value) -> StoreResult<()> {
        let mut doc = self
            .get(collection, id)?
            .ok_or_else(|| StoreError::NotFound(collection.to_string(), id.to_string()))?;
        let Value::Object(fields) = patch else {
            return Err(StoreError::InvalidDocument {
                collection: collection.to_string(),
                id: id.to_string(),
                reason: "update patch must be a JSON object".into(),
            });
        };
        if let Value::Object(target) = &mut doc.data {
            for (field, value) in fields {
                if value.is_null() {
                    target.remove(&field);
                } else {
                    target.insert(field, value);
                }
            }
        }
        self.writes
            .insert(Self::key(collection, id), PendingWrite::Set(doc.data));
        Ok(())
    }

    pub fn delete(&mut self, collection: &str, id: &str) {
        self.writes
            .insert(Self::key(collection, id), PendingWrite::Delete);
    }

    /// Number of buffered writes
    pub fn pending_writes(&self) -> usize {
        self.writes.len()
    }
}
