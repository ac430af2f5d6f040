use std::marker::PhantomData;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use shared::store::{ListenTarget, LiveSource, Snapshot};
use tokio::sync::watch;

use super::{Hooks, LiveView, Record, SubscriptionOptions, SubscriptionState};
use crate::error::ClientError;
use crate::scheduler::Scheduler;

/// Live, typed view of one document
pub struct DocumentSubscription<T> {
    view: LiveView<Record<T>>,
}

/// Builder for a [`DocumentSubscription`]
pub struct DocumentSubscriptionBuilder<T> {
    source: Arc<dyn LiveSource>,
    scheduler: Arc<dyn Scheduler>,
    collection: String,
    id: String,
    options: SubscriptionOptions,
    hooks: Hooks<Record<T>>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> DocumentSubscriptionBuilder<T>
where
    T: DeserializeOwned + Clone + Send + Sync + 'static,
{
    pub fn options(mut self, options: SubscriptionOptions) -> Self {
        self.options = options;
        self
    }

    /// Called with the document (or `None`) and whether it exists
    pub fn on_document_change(
        mut self,
        f: impl Fn(Option<&Record<T>>, bool) + Send + Sync + 'static,
    ) -> Self {
        self.hooks.on_data = Some(Box::new(move |doc: Option<&Record<T>>| f(doc, doc.is_some())));
        self
    }

    pub fn on_error(mut self, f: impl Fn(&ClientError) + Send + Sync + 'static) -> Self {
        self.hooks.on_error = Some(Box::new(f));
        self
    }

    pub fn on_connect(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.hooks.on_connect = Some(Box::new(f));
        self
    }

    pub fn on_disconnect(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.hooks.on_disconnect = Some(Box::new(f));
        self
    }

    /// Attach the listener. An empty document id leaves the subscription
    /// idle, like a disabled one.
    pub fn start(mut self) -> DocumentSubscription<T> {
        if self.id.is_empty() {
            self.options.enabled = false;
        }
        let view = LiveView::start(
            self.source,
            self.scheduler,
            ListenTarget::document(self.collection, self.id),
            Box::new(|snapshot: &Snapshot| snapshot.document().map(Record::decode).transpose()),
            self.options,
            self.hooks,
        );
        DocumentSubscription { view }
    }
}

impl<T> DocumentSubscription<T>
where
    T: DeserializeOwned + Clone + Send + Sync + 'static,
{
    pub fn builder(
        source: Arc<dyn LiveSource>,
        scheduler: Arc<dyn Scheduler>,
        collection: impl Into<String>,
        id: impl Into<String>,
    ) -> DocumentSubscriptionBuilder<T> {
        DocumentSubscriptionBuilder {
            source,
            scheduler,
            collection: collection.into(),
            id: id.into(),
            options: SubscriptionOptions::default(),
            hooks: Hooks::default(),
            _marker: PhantomData,
        }
    }

    pub fn state(&self) -> SubscriptionState<Record<T>> {
        self.view.state()
    }

    pub fn data(&self) -> Option<Record<T>> {
        self.view.state().data
    }

    /// Whether the last confirmed snapshot contained the document
    pub fn exists(&self) -> bool {
        self.view.state().data.is_some()
    }

    pub fn watch(&self) -> watch::Receiver<SubscriptionState<Record<T>>> {
        self.view.watch()
    }

    pub fn is_closed(&self) -> bool {
        self.view.is_closed()
    }

    pub fn refetch(&self) {
        self.view.refetch();
    }

    pub fn unsubscribe(&self) {
        self.view.unsubscribe();
    }
}

/// Subscribe to one document. `on_change` receives `None` while the
/// document does not exist.
pub fn subscribe_document<T>(
    source: Arc<dyn LiveSource>,
    scheduler: Arc<dyn Scheduler>,
    collection: impl Into<String>,
    id: impl Into<String>,
    on_change: impl Fn(Option<&Record<T>>) + Send + Sync + 'static,
    on_error: impl Fn(&ClientError) + Send + Sync + 'static,
) -> DocumentSubscription<T>
where
    T: DeserializeOwned + Clone + Send + Sync + 'static,
{
    DocumentSubscription::builder(source, scheduler, collection, id)
        .on_document_change(move |doc, _| on_change(doc))
        .on_error(on_error)
        .start()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::ManualScheduler;
    use crate::subscription::testing::*;
    use parking_lot::Mutex;
    use serde::Deserialize;
    use serde_json::json;
    use shared::store::Document;

    #[derive(Debug, Clone, PartialEq, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Profile {
        status: String,
    }

    #[test]
    fn test_exists_tracks_document_presence() {
        let source = FakeSource::new();
        let scheduler = ManualScheduler::new();
        let changes = Arc::new(Mutex::new(Vec::new()));
        let sink = changes.clone();

        let sub = DocumentSubscription::<Profile>::builder(
            Arc::new(source.clone()),
            Arc::new(scheduler),
            "users",
            "u1",
        )
        .on_document_change(move |doc, exists| {
            sink.lock().push((doc.map(|d| d.status.clone()), exists));
        })
        .start();

        source.emit(server(vec![]));
        assert!(sub.state().is_connected);
        assert!(!sub.exists());

        source.emit(server(vec![Document::new("u1", json!({"status": "pending"}))]));
        source.emit(server(vec![Document::new("u1", json!({"status": "active"}))]));
        assert!(sub.exists());
        assert_eq!(sub.data().map(|d| d.id), Some("u1".to_string()));

        assert_eq!(
            *changes.lock(),
            vec![
                (None, false),
                (Some("pending".to_string()), true),
                (Some("active".to_string()), true),
            ]
        );
    }

    #[test]
    fn test_empty_id_is_idle() {
        let source = FakeSource::new();
        let sub = subscribe_document::<Profile>(
            Arc::new(source.clone()),
            Arc::new(ManualScheduler::new()),
            "users",
            "",
            |_| {},
            |_| {},
        );
        assert_eq!(source.listen_calls(), 0);
        assert!(!sub.state().is_loading);
        assert!(!sub.exists());
    }

    #[test]
    fn test_document_retry() {
        let source = FakeSource::new();
        let scheduler = ManualScheduler::new();
        let sub = DocumentSubscription::<Profile>::builder(
            Arc::new(source.clone()),
            Arc::new(scheduler.clone()),
            "users",
            "u1",
        )
        .options(SubscriptionOptions::default().with_max_retries(1))
        .start();

        source.emit(unavailable());
        assert!(scheduler.run_next());
        source.emit(unavailable());
        assert!(!scheduler.run_next());
        assert_eq!(sub.state().retry_count, 1);
        assert_eq!(source.listen_calls(), 2);
    }
}
