//! Document-store wire types
//!
//! Documents are JSON objects addressed by `(collection, id)`. Queries are a
//! conjunction of field filters with optional ordering and limit. Live
//! listeners receive [`ListenEvent`]s through a callback registered on a
//! [`LiveSource`].

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A stored document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub data: Value,
}

impl Document {
    pub fn new(id: impl Into<String>, data: Value) -> Self {
        Self {
            id: id.into(),
            data,
        }
    }

    /// Decode into the fixed schema of the owning collection
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.data)
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.data.get(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOp {
    Eq,
    Lt,
    Lte,
    Gt,
    Gte,
    /// Field value equals one of the values in the filter's array
    In,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
    pub value: Value,
}

impl Filter {
    pub fn new(field: impl Into<String>, op: FilterOp, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, FilterOp::Eq, value)
    }

    pub fn is_in(field: impl Into<String>, values: Vec<Value>) -> Self {
        Self::new(field, FilterOp::In, Value::Array(values))
    }

    /// Missing fields compare as `null`; range operators never match across
    /// JSON types.
    pub fn matches(&self, data: &Value) -> bool {
        let actual = data.get(&self.field).unwrap_or(&Value::Null);
        match self.op {
            FilterOp::Eq => actual == &self.value,
            FilterOp::In => self
                .value
                .as_array()
                .is_some_and(|values| values.contains(actual)),
            FilterOp::Lt => compare_values(actual, &self.value) == Some(Ordering::Less),
            FilterOp::Lte => matches!(
                compare_values(actual, &self.value),
                Some(Ordering::Less | Ordering::Equal)
            ),
            FilterOp::Gt => compare_values(actual, &self.value) == Some(Ordering::Greater),
            FilterOp::Gte => matches!(
                compare_values(actual, &self.value),
                Some(Ordering::Greater | Ordering::Equal)
            ),
        }
    }
}

fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
}

/// Collection query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub collection: String,
    #[serde(default)]
    pub filters: Vec<Filter>,
    #[serde(default)]
    pub order_by: Option<OrderBy>,
    #[serde(default)]
    pub limit: Option<usize>,
}

impl Query {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            filters: Vec::new(),
            order_by: None,
            limit: None,
        }
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn where_eq(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(Filter::eq(field, value))
    }

    pub fn order_by(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.order_by = Some(OrderBy {
            field: field.into(),
            direction,
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, doc: &Document) -> bool {
        self.filters.iter().all(|f| f.matches(&doc.data))
    }

    /// Filter, order and truncate a candidate set. Input order is kept for
    /// ties and incomparable values.
    pub fn apply(&self, docs: impl IntoIterator<Item = Document>) -> Vec<Document> {
        let mut out: Vec<Document> = docs.into_iter().filter(|d| self.matches(d)).collect();
        if let Some(order) = &self.order_by {
            out.sort_by(|a, b| {
                let left = a.field(&order.field).unwrap_or(&Value::Null);
                let right = b.field(&order.field).unwrap_or(&Value::Null);
                let ord = compare_values(left, right).unwrap_or(Ordering::Equal);
                match order.direction {
                    Direction::Asc => ord,
                    Direction::Desc => ord.reverse(),
                }
            });
        }
        if let Some(limit) = self.limit {
            out.truncate(limit);
        }
        out
    }
}

/// Provenance flags attached to every snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotMetadata {
    pub from_cache: bool,
    pub has_pending_writes: bool,
}

impl SnapshotMetadata {
    /// Confirmed server state
    pub const SERVER: Self = Self {
        from_cache: false,
        has_pending_writes: false,
    };

    /// Neither served from local cache nor carrying unacknowledged local writes
    pub fn is_confirmed(&self) -> bool {
        !self.from_cache && !self.has_pending_writes
    }
}

/// Result set delivered to a listener. Document listeners receive at most
/// one document; an empty set means the document does not exist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub docs: Vec<Document>,
    pub metadata: SnapshotMetadata,
}

impl Snapshot {
    pub fn new(docs: Vec<Document>, metadata: SnapshotMetadata) -> Self {
        Self { docs, metadata }
    }

    pub fn document(&self) -> Option<&Document> {
        self.docs.first()
    }
}

/// What a live listener observes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ListenTarget {
    Query(Query),
    Document { collection: String, id: String },
}

impl ListenTarget {
    pub fn document(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self::Document {
            collection: collection.into(),
            id: id.into(),
        }
    }

    pub fn collection(&self) -> &str {
        match self {
            Self::Query(q) => &q.collection,
            Self::Document { collection, .. } => collection,
        }
    }
}

impl From<Query> for ListenTarget {
    fn from(query: Query) -> Self {
        Self::Query(query)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportErrorCode {
    PermissionDenied,
    Unavailable,
    Unknown,
}

impl TransportErrorCode {
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::PermissionDenied)
    }
}

impl fmt::Display for TransportErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::PermissionDenied => "permission-denied",
            Self::Unavailable => "unavailable",
            Self::Unknown => "unknown",
        })
    }
}

/// Listener failure reported by the store transport
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
#[error("{code}: {message}")]
pub struct TransportError {
    pub code: TransportErrorCode,
    pub message: String,
}

impl TransportError {
    pub fn new(code: TransportErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(TransportErrorCode::Unavailable, message)
    }

    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::new(TransportErrorCode::PermissionDenied, message)
    }

    pub fn is_retryable(&self) -> bool {
        self.code.is_retryable()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ListenEvent {
    Snapshot(Snapshot),
    Error(TransportError),
}

pub type ListenCallback = Arc<dyn Fn(ListenEvent) + Send + Sync>;

/// Handle to an active listener; removing it (or dropping it) detaches the
/// callback. Removal is idempotent.
pub struct ListenerRegistration {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl ListenerRegistration {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Registration with nothing to detach
    pub fn noop() -> Self {
        Self { cancel: None }
    }

    pub fn remove(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }

    pub fn is_active(&self) -> bool {
        self.cancel.is_some()
    }
}

impl Drop for ListenerRegistration {
    fn drop(&mut self) {
        self.remove();
    }
}

impl fmt::Debug for ListenerRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerRegistration")
            .field("active", &self.is_active())
            .finish()
    }
}

/// Push-based change notifications from a document store
pub trait LiveSource: Send + Sync {
    /// Register `callback` for `target`. Implementations deliver an initial
    /// snapshot and then one per change, or an error event.
    fn listen(&self, target: ListenTarget, callback: ListenCallback) -> ListenerRegistration;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

    fn docs() -> Vec<Document> {
        vec![
            Document::new("a", json!({"clubId": "c1", "age": 30, "status": "active"})),
            Document::new("b", json!({"clubId": "c2", "age": 12, "status": "active"})),
            Document::new("c", json!({"clubId": "c1", "age": 45, "status": "inactive"})),
        ]
    }

    #[test]
    fn test_filters() {
        let q = Query::new("members")
            .where_eq("clubId", "c1")
            .filter(Filter::new("age", FilterOp::Gte, 30));
        let ids: Vec<_> = q.apply(docs()).into_iter().map(|d| d.id).collect();
        assert_eq!(ids, vec!["a", "c"]);

        let q = Query::new("members").filter(Filter::is_in(
            "status",
            vec![json!("inactive"), json!("suspended")],
        ));
        assert_eq!(q.apply(docs()).len(), 1);
    }

    #[test]
    fn test_missing_field_matches_null_only() {
        let doc = Document::new("x", json!({"name": "n"}));
        assert!(Filter::eq("userId", Value::Null).matches(&doc.data));
        assert!(!Filter::new("age", FilterOp::Lt, 10).matches(&doc.data));
    }

    #[test]
    fn test_order_and_limit() {
        let q = Query::new("members")
            .order_by("age", Direction::Desc)
            .limit(2);
        let ids: Vec<_> = q.apply(docs()).into_iter().map(|d| d.id).collect();
        assert_eq!(ids, vec!["c", "a"]);
    }

    #[test]
    fn test_registration_removes_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let mut reg = ListenerRegistration::new(move || {
            counter.fetch_add(1, AtomicOrdering::SeqCst);
        });
        reg.remove();
        reg.remove();
        drop(reg);
        assert_eq!(calls.load(AtomicOrdering::SeqCst), 1);
    }

    #[test]
    fn test_snapshot_confirmation() {
        assert!(SnapshotMetadata::SERVER.is_confirmed());
        let cached = SnapshotMetadata {
            from_cache: true,
            has_pending_writes: false,
        };
        assert!(!cached.is_confirmed());
        assert!(!TransportError::permission_denied("rules").is_retryable());
        assert!(TransportError::unavailable("offline").is_retryable());
    }
}
