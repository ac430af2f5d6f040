//! Connection health
//!
//! Tracks two signals: whether the host has network at all (fed in by the
//! embedding application) and whether the store itself is reachable
//! (derived from a sentinel listener: a snapshot served from cache means
//! the store is not connected). While online but disconnected the monitor
//! asks the store to re-enable its network with capped exponential
//! backoff, up to `max_reconnect_attempts`.

use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use shared::store::{ListenCallback, ListenEvent, ListenTarget, ListenerRegistration, LiveSource};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::backoff::Backoff;
use crate::error::ClientResult;
use crate::scheduler::{Scheduler, TimerHandle};

/// Store network switches
#[async_trait]
pub trait NetworkControl: Send + Sync {
    async fn enable_network(&self) -> ClientResult<()>;
    async fn disable_network(&self) -> ClientResult<()>;
    /// Cheapest possible round trip, used for latency measurement
    async fn ping(&self) -> ClientResult<()>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionStatus {
    pub is_online: bool,
    pub is_store_connected: bool,
    pub last_connected: Option<DateTime<Utc>>,
    pub reconnect_attempts: u32,
    pub latency: Option<Duration>,
}

impl Default for ConnectionStatus {
    fn default() -> Self {
        Self {
            is_online: true,
            is_store_connected: false,
            last_connected: None,
            reconnect_attempts: 0,
            latency: None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ReconnectOptions {
    pub auto_reconnect: bool,
    pub max_reconnect_attempts: u32,
    pub backoff: Backoff,
    pub latency_probe_interval: Duration,
}

impl Default for ReconnectOptions {
    fn default() -> Self {
        Self {
            auto_reconnect: true,
            max_reconnect_attempts: 5,
            backoff: Backoff::CONNECTION,
            latency_probe_interval: Duration::from_secs(30),
        }
    }
}

type Callback = Box<dyn Fn() + Send + Sync>;
type AttemptCallback = Box<dyn Fn(u32) + Send + Sync>;

#[derive(Default)]
struct MonitorHooks {
    on_connect: Option<Callback>,
    on_disconnect: Option<Callback>,
    on_reconnect_attempt: Option<AttemptCallback>,
}

#[derive(Default)]
struct MonitorControl {
    reconnect_timer: Option<TimerHandle>,
    sentinel: Option<ListenerRegistration>,
    /// Set by `force_offline`; suppresses automatic reconnects
    forced_offline: bool,
    stopped: bool,
}

struct MonitorInner {
    network: Arc<dyn NetworkControl>,
    scheduler: Arc<dyn Scheduler>,
    runtime: Handle,
    options: ReconnectOptions,
    hooks: MonitorHooks,
    status: watch::Sender<ConnectionStatus>,
    control: Mutex<MonitorControl>,
}

/// Connection-health tracker and reconnect driver
pub struct ConnectionMonitor {
    inner: Arc<MonitorInner>,
}

impl ConnectionMonitor {
    pub fn builder(
        network: Arc<dyn NetworkControl>,
        scheduler: Arc<dyn Scheduler>,
        runtime: Handle,
    ) -> ConnectionMonitorBuilder {
        ConnectionMonitorBuilder {
            network,
            scheduler,
            runtime,
            options: ReconnectOptions::default(),
            hooks: MonitorHooks::default(),
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        self.inner.status.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<ConnectionStatus> {
        self.inner.status.subscribe()
    }

    /// Attach the sentinel listener whose snapshot metadata reveals store
    /// connectivity. Replaces any previous sentinel.
    pub fn watch_sentinel(&self, source: &dyn LiveSource, target: ListenTarget) {
        let weak: Weak<MonitorInner> = Arc::downgrade(&self.inner);
        let callback: ListenCallback = Arc::new(move |event| {
            if let Some(inner) = weak.upgrade() {
                MonitorInner::on_sentinel(&inner, event);
            }
        });
        let registration = source.listen(target, callback);

        let stale = {
            let mut control = self.inner.control.lock();
            if control.stopped {
                Some(registration)
            } else {
                control.sentinel.replace(registration)
            }
        };
        if let Some(mut stale) = stale {
            stale.remove();
        }
    }

    /// Host network came up or went down
    pub fn set_online(&self, online: bool) {
        MonitorInner::set_online(&self.inner, online);
    }

    /// Reset the attempt counter and ask the store to reconnect now
    pub async fn reconnect(&self) -> ClientResult<()> {
        self.inner.control.lock().forced_offline = false;
        self.inner.status.send_modify(|s| s.reconnect_attempts = 0);
        self.inner.network.enable_network().await.inspect_err(|e| {
            tracing::warn!(error = %e, "Manual reconnect failed");
        })
    }

    /// Disable the store network and stop automatic reconnects
    pub async fn force_offline(&self) -> ClientResult<()> {
        self.inner.network.disable_network().await.inspect_err(|e| {
            tracing::warn!(error = %e, "Force offline failed");
        })?;
        let timer = {
            let mut control = self.inner.control.lock();
            control.forced_offline = true;
            control.reconnect_timer.take()
        };
        if let Some(timer) = timer {
            timer.cancel();
        }
        self.inner.status.send_modify(|s| s.is_store_connected = false);
        tracing::info!("Store network disabled");
        Ok(())
    }

    /// Re-enable the store network after `force_offline`
    pub async fn force_online(&self) -> ClientResult<()> {
        self.inner.network.enable_network().await.inspect_err(|e| {
            tracing::warn!(error = %e, "Force online failed");
        })?;
        self.inner.control.lock().forced_offline = false;
        tracing::info!("Store network enabled");
        MonitorInner::maybe_schedule_reconnect(&self.inner);
        Ok(())
    }

    /// Time one `ping` round trip and record it
    pub async fn measure_latency(&self) -> ClientResult<Duration> {
        MonitorInner::measure_latency(&self.inner).await
    }

    /// Measure latency periodically while the store is connected
    pub fn spawn_latency_probe(&self, shutdown: CancellationToken) -> JoinHandle<()> {
        let weak = Arc::downgrade(&self.inner);
        let period = self.inner.options.latency_probe_interval;
        self.inner.runtime.spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        let Some(inner) = weak.upgrade() else { break };
                        let connected = inner.status.borrow().is_store_connected;
                        if connected && let Err(e) = MonitorInner::measure_latency(&inner).await {
                            tracing::debug!(error = %e, "Latency probe failed");
                        }
                    }
                }
            }
        })
    }

    /// Detach the sentinel and cancel any pending reconnect
    pub fn stop(&self) {
        self.inner.stop();
    }
}

impl Drop for ConnectionMonitor {
    fn drop(&mut self) {
        self.inner.stop();
    }
}

pub struct ConnectionMonitorBuilder {
    network: Arc<dyn NetworkControl>,
    scheduler: Arc<dyn Scheduler>,
    runtime: Handle,
    options: ReconnectOptions,
    hooks: MonitorHooks,
}

impl ConnectionMonitorBuilder {
    pub fn options(mut self, options: ReconnectOptions) -> Self {
        self.options = options;
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

    pub fn on_reconnect_attempt(mut self, f: impl Fn(u32) + Send + Sync + 'static) -> Self {
        self.hooks.on_reconnect_attempt = Some(Box::new(f));
        self
    }

    pub fn build(self) -> ConnectionMonitor {
        let (status, _) = watch::channel(ConnectionStatus::default());
        ConnectionMonitor {
            inner: Arc::new(MonitorInner {
                network: self.network,
                scheduler: self.scheduler,
                runtime: self.runtime,
                options: self.options,
                hooks: self.hooks,
                status,
                control: Mutex::new(MonitorControl::default()),
            }),
        }
    }
}

impl MonitorInner {
    fn stop(&self) {
        let (timer, sentinel) = {
            let mut control = self.control.lock();
            control.stopped = true;
            (control.reconnect_timer.take(), control.sentinel.take())
        };
        if let Some(timer) = timer {
            timer.cancel();
        }
        if let Some(mut sentinel) = sentinel {
            sentinel.remove();
        }
    }

    fn set_online(this: &Arc<Self>, online: bool) {
        let was_online = this.status.borrow().is_online;
        if was_online == online {
            return;
        }
        if online {
            this.status.send_modify(|s| s.is_online = true);
            tracing::info!("Network online");
            if let Some(on_connect) = &this.hooks.on_connect {
                on_connect();
            }
            Self::maybe_schedule_reconnect(this);
        } else {
            if let Some(timer) = this.control.lock().reconnect_timer.take() {
                timer.cancel();
            }
            this.status.send_modify(|s| {
                s.is_online = false;
                s.is_store_connected = false;
            });
            tracing::warn!("Network offline");
            if let Some(on_disconnect) = &this.hooks.on_disconnect {
                on_disconnect();
            }
        }
    }

    fn on_sentinel(this: &Arc<Self>, event: ListenEvent) {
        if this.control.lock().stopped {
            return;
        }
        let connected = match event {
            ListenEvent::Snapshot(snapshot) => !snapshot.metadata.from_cache,
            ListenEvent::Error(error) => {
                tracing::warn!(%error, "Connection sentinel failed");
                false
            }
        };

        let mut was_connected = false;
        this.status.send_modify(|s| {
            was_connected = s.is_store_connected;
            s.is_store_connected = connected;
            if connected {
                s.last_connected = Some(Utc::now());
                s.reconnect_attempts = 0;
            }
        });

        if connected {
            if let Some(timer) = this.control.lock().reconnect_timer.take() {
                timer.cancel();
            }
            if !was_connected {
                tracing::info!("Store connected");
                if let Some(on_connect) = &this.hooks.on_connect {
                    on_connect();
                }
            }
        } else {
            if was_connected {
                tracing::warn!("Store disconnected");
                if let Some(on_disconnect) = &this.hooks.on_disconnect {
                    on_disconnect();
                }
            }
            Self::maybe_schedule_reconnect(this);
        }
    }

    fn should_reconnect(&self, control: &MonitorControl) -> bool {
        let status = self.status.borrow();
        self.options.auto_reconnect
            && !control.stopped
            && !control.forced_offline
            && status.is_online
            && !status.is_store_connected
            && status.reconnect_attempts < self.options.max_reconnect_attempts
    }

    fn maybe_schedule_reconnect(this: &Arc<Self>) {
        let mut control = this.control.lock();
        if control
            .reconnect_timer
            .as_ref()
            .is_some_and(|t| !t.is_cancelled())
            || !this.should_reconnect(&control)
        {
            return;
        }
        let attempt = this.status.borrow().reconnect_attempts;
        let delay = this.options.backoff.delay(attempt);
        let weak = Arc::downgrade(this);
        control.reconnect_timer = Some(this.scheduler.schedule(
            delay,
            Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    MonitorInner::reconnect_attempt(&inner);
                }
            }),
        ));
        tracing::debug!(attempt, delay_ms = delay.as_millis() as u64, "Reconnect scheduled");
    }

    fn reconnect_attempt(this: &Arc<Self>) {
        {
            let mut control = this.control.lock();
            control.reconnect_timer = None;
            if !this.should_reconnect(&control) {
                return;
            }
        }

        let mut attempt = 0;
        this.status.send_modify(|s| {
            s.reconnect_attempts += 1;
            attempt = s.reconnect_attempts;
        });
        tracing::info!(attempt, "Attempting store reconnect");
        if let Some(on_attempt) = &this.hooks.on_reconnect_attempt {
            on_attempt(attempt);
        }

        let network = this.network.clone();
        this.runtime.spawn(async move {
            if let Err(e) = network.enable_network().await {
                tracing::warn!(attempt, error = %e, "Reconnect attempt failed");
            }
        });

        Self::maybe_schedule_reconnect(this);
    }

    async fn measure_latency(this: &Arc<Self>) -> ClientResult<Duration> {
        let start = Instant::now();
        this.network.ping().await?;
        let latency = start.elapsed();
        this.status.send_modify(|s| s.latency = Some(latency));
        Ok(latency)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClientError;
    use crate::scheduler::ManualScheduler;
    use shared::store::{Snapshot, SnapshotMetadata};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Default)]
    struct FakeNetwork {
        enables: AtomicUsize,
        disables: AtomicUsize,
        fail: AtomicBool,
    }

    #[async_trait]
    impl NetworkControl for FakeNetwork {
        async fn enable_network(&self) -> ClientResult<()> {
            self.enables.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn disable_network(&self) -> ClientResult<()> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(ClientError::Network("refused".into()));
            }
            self.disables.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn ping(&self) -> ClientResult<()> {
            Ok(())
        }
    }

    #[derive(Clone, Default)]
    struct Sentinel {
        callback: Arc<Mutex<Option<ListenCallback>>>,
    }

    impl Sentinel {
        fn emit(&self, from_cache: bool) {
            let callback = self.callback.lock().clone();
            if let Some(callback) = callback {
                callback(ListenEvent::Snapshot(Snapshot::new(
                    vec![],
                    SnapshotMetadata {
                        from_cache,
                        has_pending_writes: false,
                    },
                )));
            }
        }

        fn attached(&self) -> bool {
            self.callback.lock().is_some()
        }
    }

    impl LiveSource for Sentinel {
        fn listen(&self, _target: ListenTarget, callback: ListenCallback) -> ListenerRegistration {
            *self.callback.lock() = Some(callback);
            let slot = self.callback.clone();
            ListenerRegistration::new(move || *slot.lock() = None)
        }
    }

    fn monitor(
        network: &Arc<FakeNetwork>,
        scheduler: &ManualScheduler,
        attempts: &Arc<Mutex<Vec<u32>>>,
    ) -> ConnectionMonitor {
        let sink = attempts.clone();
        ConnectionMonitor::builder(
            network.clone(),
            Arc::new(scheduler.clone()),
            Handle::current(),
        )
        .on_reconnect_attempt(move |n| sink.lock().push(n))
        .build()
    }

    fn target() -> ListenTarget {
        ListenTarget::document(".info", "connected")
    }

    #[tokio::test]
    async fn test_reconnect_backoff_and_ceiling() {
        let network = Arc::new(FakeNetwork::default());
        let scheduler = ManualScheduler::new();
        let attempts = Arc::new(Mutex::new(Vec::new()));
        let monitor = monitor(&network, &scheduler, &attempts);
        let sentinel = Sentinel::default();
        monitor.watch_sentinel(&sentinel, target());

        sentinel.emit(true);
        assert!(!monitor.status().is_store_connected);

        while scheduler.run_next() {}
        tokio::task::yield_now().await;

        assert_eq!(*attempts.lock(), vec![1, 2, 3, 4, 5]);
        assert_eq!(
            scheduler.requested_delays(),
            vec![5, 10, 20, 40, 60]
                .into_iter()
                .map(Duration::from_secs)
                .collect::<Vec<_>>()
        );
        assert_eq!(monitor.status().reconnect_attempts, 5);
        assert_eq!(scheduler.pending(), 0);
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }
        assert_eq!(network.enables.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_connected_snapshot_resets_and_cancels() {
        let network = Arc::new(FakeNetwork::default());
        let scheduler = ManualScheduler::new();
        let attempts = Arc::new(Mutex::new(Vec::new()));
        let monitor = monitor(&network, &scheduler, &attempts);
        let sentinel = Sentinel::default();
        monitor.watch_sentinel(&sentinel, target());

        sentinel.emit(true);
        assert!(scheduler.run_next());
        assert_eq!(monitor.status().reconnect_attempts, 1);
        assert_eq!(scheduler.pending(), 1);

        sentinel.emit(false);
        let status = monitor.status();
        assert!(status.is_store_connected);
        assert_eq!(status.reconnect_attempts, 0);
        assert!(status.last_connected.is_some());
        assert_eq!(scheduler.pending(), 0);
    }

    #[tokio::test]
    async fn test_offline_host_does_not_reconnect() {
        let network = Arc::new(FakeNetwork::default());
        let scheduler = ManualScheduler::new();
        let attempts = Arc::new(Mutex::new(Vec::new()));
        let monitor = monitor(&network, &scheduler, &attempts);
        let sentinel = Sentinel::default();
        monitor.watch_sentinel(&sentinel, target());

        sentinel.emit(false);
        monitor.set_online(false);
        let status = monitor.status();
        assert!(!status.is_online);
        assert!(!status.is_store_connected);
        assert_eq!(scheduler.pending(), 0);

        monitor.set_online(true);
        assert_eq!(scheduler.pending(), 1);
    }

    #[tokio::test]
    async fn test_force_offline_suppresses_auto_reconnect() {
        let network = Arc::new(FakeNetwork::default());
        let scheduler = ManualScheduler::new();
        let attempts = Arc::new(Mutex::new(Vec::new()));
        let monitor = monitor(&network, &scheduler, &attempts);
        let sentinel = Sentinel::default();
        monitor.watch_sentinel(&sentinel, target());
        sentinel.emit(false);

        monitor.force_offline().await.unwrap();
        sentinel.emit(true);
        assert!(!monitor.status().is_store_connected);
        assert_eq!(scheduler.pending(), 0);
        assert_eq!(network.disables.load(Ordering::SeqCst), 1);

        monitor.force_online().await.unwrap();
        assert_eq!(network.enables.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.pending(), 1);

        network.fail.store(true, Ordering::SeqCst);
        assert!(monitor.force_offline().await.is_err());
        assert_eq!(scheduler.pending(), 1);
    }

    #[tokio::test]
    async fn test_manual_reconnect_resets_attempts() {
        let network = Arc::new(FakeNetwork::default());
        let scheduler = ManualScheduler::new();
        let attempts = Arc::new(Mutex::new(Vec::new()));
        let monitor = monitor(&network, &scheduler, &attempts);
        let sentinel = Sentinel::default();
        monitor.watch_sentinel(&sentinel, target());
        sentinel.emit(true);
        while scheduler.run_next() {}
        assert_eq!(monitor.status().reconnect_attempts, 5);

        monitor.reconnect().await.unwrap();
        assert_eq!(monitor.status().reconnect_attempts, 0);
    }

    #[tokio::test]
    async fn test_latency_and_stop() {
        let network = Arc::new(FakeNetwork::default());
        let scheduler = ManualScheduler::new();
        let attempts = Arc::new(Mutex::new(Vec::new()));
        let monitor = monitor(&network, &scheduler, &attempts);
        let sentinel = Sentinel::default();
        monitor.watch_sentinel(&sentinel, target());

        monitor.measure_latency().await.unwrap();
        assert!(monitor.status().latency.is_some());

        assert!(sentinel.attached());
        drop(monitor);
        assert!(!sentinel.attached());
    }
}
