use std::marker::PhantomData;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use shared::store::{ListenTarget, LiveSource, Query, Snapshot};
use tokio::sync::watch;

use super::{Hooks, LiveView, Record, SubscriptionOptions, SubscriptionState};
use crate::error::{ClientError, ClientResult};
use crate::scheduler::Scheduler;

/// Live, typed view of a collection query
pub struct CollectionSubscription<T> {
    view: LiveView<Vec<Record<T>>>,
}

/// Builder for a [`CollectionSubscription`]
pub struct CollectionSubscriptionBuilder<T> {
    source: Arc<dyn LiveSource>,
    scheduler: Arc<dyn Scheduler>,
    query: Query,
    options: SubscriptionOptions,
    hooks: Hooks<Vec<Record<T>>>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> CollectionSubscriptionBuilder<T>
where
    T: DeserializeOwned + Clone + Send + Sync + 'static,
{
    pub fn options(mut self, options: SubscriptionOptions) -> Self {
        self.options = options;
        self
    }

    pub fn on_change(mut self, f: impl Fn(&[Record<T>]) + Send + Sync + 'static) -> Self {
        self.hooks.on_data = Some(Box::new(move |data: Option<&Vec<Record<T>>>| {
            f(data.map(Vec::as_slice).unwrap_or(&[]))
        }));
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

    /// Attach the listener
    pub fn start(self) -> CollectionSubscription<T> {
        let view = LiveView::start(
            self.source,
            self.scheduler,
            ListenTarget::Query(self.query),
            Box::new(|snapshot: &Snapshot| {
                snapshot
                    .docs
                    .iter()
                    .map(Record::decode)
                    .collect::<ClientResult<Vec<_>>>()
                    .map(Some)
            }),
            self.options,
            self.hooks,
        );
        CollectionSubscription { view }
    }
}

impl<T> CollectionSubscription<T>
where
    T: DeserializeOwned + Clone + Send + Sync + 'static,
{
    pub fn builder(
        source: Arc<dyn LiveSource>,
        scheduler: Arc<dyn Scheduler>,
        query: Query,
    ) -> CollectionSubscriptionBuilder<T> {
        CollectionSubscriptionBuilder {
            source,
            scheduler,
            query,
            options: SubscriptionOptions::default(),
            hooks: Hooks::default(),
            _marker: PhantomData,
        }
    }

    pub fn state(&self) -> SubscriptionState<Vec<Record<T>>> {
        self.view.state()
    }

    /// Latest decoded documents; empty until the first confirmed snapshot
    pub fn data(&self) -> Vec<Record<T>> {
        self.view.state().data.unwrap_or_default()
    }

    pub fn watch(&self) -> watch::Receiver<SubscriptionState<Vec<Record<T>>>> {
        self.view.watch()
    }

    pub fn query(&self) -> Option<&Query> {
        match self.view.target() {
            ListenTarget::Query(query) => Some(query),
            ListenTarget::Document { .. } => None,
        }
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

/// Subscribe to `query`, calling `on_change` with every confirmed result
/// set and `on_error` with every failure. The returned subscription is the
/// unsubscribe handle; dropping it also unsubscribes.
pub fn subscribe_collection<T>(
    source: Arc<dyn LiveSource>,
    scheduler: Arc<dyn Scheduler>,
    query: Query,
    on_change: impl Fn(&[Record<T>]) + Send + Sync + 'static,
    on_error: impl Fn(&ClientError) + Send + Sync + 'static,
) -> CollectionSubscription<T>
where
    T: DeserializeOwned + Clone + Send + Sync + 'static,
{
    CollectionSubscription::builder(source, scheduler, query)
        .on_change(on_change)
        .on_error(on_error)
        .start()
}
