//! Realtime subscriptions
//!
//! A subscription keeps a typed copy of a listen target in sync with a
//! [`LiveSource`]. Its lifecycle:
//!
//! ```text
//! Idle ──start──▶ Loading ──confirmed snapshot──▶ Connected ◀─┐
//!                    ▲                               │         │ confirmed
//!                    │                               └─────────┘ snapshot
//!            retry timer fires                 listener error
//!                    │                               ▼
//!             Retry-scheduled ◀── retryable, budget left ── Error
//! ```
//!
//! Snapshots served from cache or carrying pending local writes never
//! change state. `unsubscribe` is terminal and idempotent.
//!
//! Each (re)start bumps a generation counter; events and timers tagged
//! with an older generation are ignored, so a torn-down listener can never
//! write into the state of its successor.

mod collection;
mod document;

pub use collection::{CollectionSubscription, subscribe_collection};
pub use document::{DocumentSubscription, subscribe_document};

use std::ops::Deref;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use shared::store::{
    Document, ListenCallback, ListenEvent, ListenTarget, ListenerRegistration, LiveSource,
    Snapshot, TransportError,
};
use tokio::sync::watch;

use crate::backoff::Backoff;
use crate::error::{ClientError, ClientResult};
use crate::scheduler::{Scheduler, TimerHandle};

/// A decoded document together with its id
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record<T> {
    pub id: String,
    pub data: T,
}

impl<T: DeserializeOwned> Record<T> {
    pub fn decode(doc: &Document) -> ClientResult<Self> {
        let data = doc
            .decode::<T>()
            .map_err(|e| ClientError::Decode(format!("document {}: {e}", doc.id)))?;
        Ok(Self {
            id: doc.id.clone(),
            data,
        })
    }
}

impl<T> Deref for Record<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.data
    }
}

/// Subscription behaviour
#[derive(Debug, Clone, Copy)]
pub struct SubscriptionOptions {
    /// When false the subscription stays idle
    pub enabled: bool,
    pub retry_on_error: bool,
    /// Also retry listener errors marked non-retryable (permission
    /// denied). Off by default: re-listening cannot change a rules
    /// decision, so those errors surface at once.
    pub retry_permission_denied: bool,
    /// Automatic retries before giving up until `refetch`
    pub max_retries: u32,
    pub backoff: Backoff,
}

impl Default for SubscriptionOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            retry_on_error: true,
            retry_permission_denied: false,
            max_retries: 3,
            backoff: Backoff::SUBSCRIPTION,
        }
    }
}

impl SubscriptionOptions {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_retry_on_error(mut self, retry: bool) -> Self {
        self.retry_on_error = retry;
        self
    }

    pub fn with_retry_permission_denied(mut self, retry: bool) -> Self {
        self.retry_permission_denied = retry;
        self
    }
}

/// Observable state of a subscription
#[derive(Debug, Clone, PartialEq)]
pub struct SubscriptionState<V> {
    pub data: Option<V>,
    pub is_loading: bool,
    pub error: Option<ClientError>,
    pub is_connected: bool,
    pub retry_count: u32,
}

impl<V> Default for SubscriptionState<V> {
    fn default() -> Self {
        Self {
            data: None,
            is_loading: true,
            error: None,
            is_connected: false,
            retry_count: 0,
        }
    }
}

type DecodeFn<V> = Box<dyn Fn(&Snapshot) -> ClientResult<Option<V>> + Send + Sync>;
type DataCallback<V> = Box<dyn Fn(Option<&V>) + Send + Sync>;
type ErrorCallback = Box<dyn Fn(&ClientError) + Send + Sync>;
type Callback = Box<dyn Fn() + Send + Sync>;

/// User hooks, always invoked without internal locks held
pub(crate) struct Hooks<V> {
    pub on_data: Option<DataCallback<V>>,
    pub on_error: Option<ErrorCallback>,
    pub on_connect: Option<Callback>,
    pub on_disconnect: Option<Callback>,
}

impl<V> Default for Hooks<V> {
    fn default() -> Self {
        Self {
            on_data: None,
            on_error: None,
            on_connect: None,
            on_disconnect: None,
        }
    }
}

#[derive(Default)]
struct Control {
    generation: u64,
    registration: Option<ListenerRegistration>,
    retry_timer: Option<TimerHandle>,
    closed: bool,
}

struct Inner<V> {
    source: Arc<dyn LiveSource>,
    scheduler: Arc<dyn Scheduler>,
    target: ListenTarget,
    decode: DecodeFn<V>,
    options: SubscriptionOptions,
    hooks: Hooks<V>,
    state: watch::Sender<SubscriptionState<V>>,
    control: Mutex<Control>,
}

/// Target-agnostic subscription engine shared by the collection and
/// document front ends
pub(crate) struct LiveView<V> {
    inner: Arc<Inner<V>>,
}

impl<V> LiveView<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub(crate) fn start(
        source: Arc<dyn LiveSource>,
        scheduler: Arc<dyn Scheduler>,
        target: ListenTarget,
        decode: DecodeFn<V>,
        options: SubscriptionOptions,
        hooks: Hooks<V>,
    ) -> Self {
        let (state, _) = watch::channel(SubscriptionState::default());
        let inner = Arc::new(Inner {
            source,
            scheduler,
            target,
            decode,
            options,
            hooks,
            state,
            control: Mutex::new(Control::default()),
        });
        Inner::listen(&inner);
        Self { inner }
    }

    pub(crate) fn state(&self) -> SubscriptionState<V> {
        self.inner.state.borrow().clone()
    }

    pub(crate) fn watch(&self) -> watch::Receiver<SubscriptionState<V>> {
        self.inner.state.subscribe()
    }

    pub(crate) fn target(&self) -> &ListenTarget {
        &self.inner.target
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.inner.control.lock().closed
    }

    /// Tear down and re-subscribe immediately with a fresh retry budget
    pub(crate) fn refetch(&self) {
        let (registration, timer) = {
            let mut control = self.inner.control.lock();
            if control.closed {
                return;
            }
            control.generation += 1;
            (control.registration.take(), control.retry_timer.take())
        };
        drop(registration);
        if let Some(timer) = timer {
            timer.cancel();
        }
        self.inner.state.send_modify(|s| {
            s.retry_count = 0;
            s.is_connected = false;
        });
        Inner::listen(&self.inner);
    }

    pub(crate) fn unsubscribe(&self) {
        let (registration, timer) = {
            let mut control = self.inner.control.lock();
            if control.closed {
                return;
            }
            control.closed = true;
            control.generation += 1;
            (control.registration.take(), control.retry_timer.take())
        };
        if let Some(mut registration) = registration {
            registration.remove();
        }
        if let Some(timer) = timer {
            timer.cancel();
        }
        self.inner.state.send_modify(|s| {
            s.is_connected = false;
            s.is_loading = false;
        });
        tracing::debug!(collection = self.inner.target.collection(), "Subscription closed");
        if let Some(on_disconnect) = &self.inner.hooks.on_disconnect {
            on_disconnect();
        }
    }
}

impl<V> Drop for LiveView<V> {
    fn drop(&mut self) {
        let (registration, timer, was_open) = {
            let mut control = self.inner.control.lock();
            let was_open = !control.closed;
            control.closed = true;
            control.generation += 1;
            (control.registration.take(), control.retry_timer.take(), was_open)
        };
        drop(registration);
        if let Some(timer) = timer {
            timer.cancel();
        }
        if was_open && let Some(on_disconnect) = &self.inner.hooks.on_disconnect {
            on_disconnect();
        }
    }
}

impl<V> Inner<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn listen(this: &Arc<Self>) {
        if !this.options.enabled {
            this.state.send_modify(|s| s.is_loading = false);
            return;
        }

        let generation = {
            let mut control = this.control.lock();
            if control.closed {
                return;
            }
            control.generation += 1;
            control.retry_timer = None;
            control.generation
        };
        this.state.send_modify(|s| {
            s.is_loading = true;
            s.error = None;
        });

        let weak: Weak<Self> = Arc::downgrade(this);
        let callback: ListenCallback = Arc::new(move |event| {
            if let Some(inner) = weak.upgrade() {
                Inner::on_event(&inner, generation, event);
            }
        });

        // The source may deliver the first snapshot before returning, so
        // the lock is not held across this call.
        let mut registration = this.source.listen(this.target.clone(), callback);

        let mut control = this.control.lock();
        if control.closed || control.generation != generation {
            drop(control);
            registration.remove();
            return;
        }
        control.registration = Some(registration);
    }

    fn is_current(&self, generation: u64) -> bool {
        let control = self.control.lock();
        !control.closed && control.generation == generation
    }

    fn on_event(this: &Arc<Self>, generation: u64, event: ListenEvent) {
        match event {
            ListenEvent::Snapshot(snapshot) => Self::on_snapshot(this, generation, &snapshot),
            ListenEvent::Error(error) => Self::on_transport_error(this, generation, error),
        }
    }

    fn on_snapshot(this: &Arc<Self>, generation: u64, snapshot: &Snapshot) {
        if !snapshot.metadata.is_confirmed() {
            tracing::trace!(
                collection = this.target.collection(),
                metadata = ?snapshot.metadata,
                "Ignoring unconfirmed snapshot"
            );
            return;
        }
        if !this.is_current(generation) {
            return;
        }

        let data = match (this.decode)(snapshot) {
            Ok(data) => data,
            Err(error) => {
                tracing::warn!(collection = this.target.collection(), %error, "Snapshot decode failed");
                this.state.send_modify(|s| {
                    s.error = Some(error.clone());
                    s.is_loading = false;
                });
                if let Some(on_error) = &this.hooks.on_error {
                    on_error(&error);
                }
                return;
            }
        };

        let mut was_connected = false;
        this.state.send_modify(|s| {
            was_connected = s.is_connected;
            s.data = data.clone();
            s.is_connected = true;
            s.is_loading = false;
            s.error = None;
            s.retry_count = 0;
        });

        if let Some(on_data) = &this.hooks.on_data {
            on_data(data.as_ref());
        }
        if !was_connected {
            tracing::debug!(collection = this.target.collection(), "Subscription connected");
            if let Some(on_connect) = &this.hooks.on_connect {
                on_connect();
            }
        }
    }

    fn on_transport_error(this: &Arc<Self>, generation: u64, transport: TransportError) {
        let error = ClientError::from(transport);
        let (stale, delay) = {
            let mut control = this.control.lock();
            if control.closed || control.generation != generation {
                return;
            }
            // A listener that reported an error delivers nothing further
            control.generation += 1;
            let stale = control.registration.take();

            let retry_count = this.state.borrow().retry_count;
            let delay = (this.options.retry_on_error
                && (error.is_retryable() || this.options.retry_permission_denied)
                && retry_count < this.options.max_retries)
                .then(|| this.options.backoff.delay(retry_count));

            if let Some(delay) = delay {
                let weak = Arc::downgrade(this);
                let scheduled_for = control.generation;
                control.retry_timer = Some(this.scheduler.schedule(
                    delay,
                    Box::new(move || {
                        if let Some(inner) = weak.upgrade() {
                            Inner::retry(&inner, scheduled_for);
                        }
                    }),
                ));
            }
            (stale, delay)
        };
        drop(stale);

        this.state.send_modify(|s| {
            s.error = Some(error.clone());
            s.is_connected = false;
            s.is_loading = false;
        });
        match delay {
            Some(delay) => tracing::warn!(
                collection = this.target.collection(),
                %error,
                retry_in_ms = delay.as_millis() as u64,
                "Listener failed, retry scheduled"
            ),
            None => tracing::warn!(
                collection = this.target.collection(),
                %error,
                "Listener failed, not retrying"
            ),
        }
        if let Some(on_error) = &this.hooks.on_error {
            on_error(&error);
        }
    }

    fn retry(this: &Arc<Self>, generation: u64) {
        {
            let mut control = this.control.lock();
            if control.closed || control.generation != generation {
                return;
            }
            control.retry_timer = None;
        }
        this.state.send_modify(|s| s.retry_count += 1);
        Self::listen(this);
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scriptable [`LiveSource`] for unit tests

    use super::*;
    use shared::store::SnapshotMetadata;

    #[derive(Default)]
    struct Listener {
        callback: Option<ListenCallback>,
        active: bool,
    }

    /// Records every `listen` call and lets the test push events to the
    /// most recent listener
    #[derive(Clone, Default)]
    pub struct FakeSource {
        listeners: Arc<Mutex<Vec<Arc<Mutex<Listener>>>>>,
        initial: Arc<Mutex<Option<ListenEvent>>>,
    }

    impl FakeSource {
        pub fn new() -> Self {
            Self::default()
        }

        /// Deliver `event` synchronously from inside every later `listen`
        pub fn set_initial(&self, event: Option<ListenEvent>) {
            *self.initial.lock() = event;
        }

        pub fn listen_calls(&self) -> usize {
            self.listeners.lock().len()
        }

        pub fn active_listeners(&self) -> usize {
            self.listeners
                .lock()
                .iter()
                .filter(|l| l.lock().active)
                .count()
        }

        /// Push to the newest listener, whether or not it is still active
        pub fn emit(&self, event: ListenEvent) {
            let latest = self.listeners.lock().last().cloned();
            let callback = latest.and_then(|l| {
                let l = l.lock();
                if l.active { l.callback.clone() } else { None }
            });
            if let Some(callback) = callback {
                callback(event);
            }
        }

        /// Push to a specific (possibly detached) listener, bypassing the
        /// active flag
        pub fn emit_to(&self, index: usize, event: ListenEvent) {
            let callback = self.listeners.lock()[index].lock().callback.clone();
            if let Some(callback) = callback {
                callback(event);
            }
        }
    }

    impl LiveSource for FakeSource {
        fn listen(&self, _target: ListenTarget, callback: ListenCallback) -> ListenerRegistration {
            let listener = Arc::new(Mutex::new(Listener {
                callback: Some(callback.clone()),
                active: true,
            }));
            self.listeners.lock().push(listener.clone());
            if let Some(event) = self.initial.lock().clone() {
                callback(event);
            }
            ListenerRegistration::new(move || listener.lock().active = false)
        }
    }

    pub fn server(docs: Vec<Document>) -> ListenEvent {
        ListenEvent::Snapshot(Snapshot::new(docs, SnapshotMetadata::SERVER))
    }

    pub fn cached(docs: Vec<Document>) -> ListenEvent {
        ListenEvent::Snapshot(Snapshot::new(
            docs,
            SnapshotMetadata {
                from_cache: true,
                has_pending_writes: false,
            },
        ))
    }

    pub fn pending_write(docs: Vec<Document>) -> ListenEvent {
        ListenEvent::Snapshot(Snapshot::new(
            docs,
            SnapshotMetadata {
                from_cache: false,
                has_pending_writes: true,
            },
        ))
    }

    pub fn unavailable() -> ListenEvent {
        ListenEvent::Error(TransportError::unavailable("backend unreachable"))
    }
}
