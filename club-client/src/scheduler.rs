//! Cancellable delayed tasks
//!
//! Retry and reconnect timers go through [`Scheduler`] so the backoff logic
//! can run on tokio in production and on [`ManualScheduler`] in tests,
//! where time only moves when the test says so.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;

pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Handle to a scheduled task. Cancelling is idempotent; dropping the
/// handle does not cancel.
#[derive(Debug, Clone, Default)]
pub struct TimerHandle {
    token: CancellationToken,
}

impl TimerHandle {
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

pub trait Scheduler: Send + Sync {
    /// Run `task` once after `delay` unless cancelled first
    fn schedule(&self, delay: Duration, task: Task) -> TimerHandle;
}

/// Timers on a tokio runtime
#[derive(Debug, Clone)]
pub struct TokioScheduler {
    handle: Handle,
}

impl TokioScheduler {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Scheduler bound to the runtime of the calling task, if any
    pub fn try_current() -> Option<Self> {
        Handle::try_current().ok().map(Self::new)
    }
}

impl Scheduler for TokioScheduler {
    fn schedule(&self, delay: Duration, task: Task) -> TimerHandle {
        let timer = TimerHandle::default();
        let token = timer.token.clone();
        self.handle.spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    if !token.is_cancelled() {
                        task();
                    }
                }
            }
        });
        timer
    }
}

struct Pending {
    due: Duration,
    seq: u64,
    timer: TimerHandle,
    task: Task,
}

#[derive(Default)]
struct ManualState {
    now: Duration,
    next_seq: u64,
    pending: Vec<Pending>,
    requested: Vec<Duration>,
}

/// Virtual-time scheduler. Tasks run only from [`advance`](Self::advance)
/// or [`run_next`](Self::run_next), on the caller's thread.
#[derive(Clone, Default)]
pub struct ManualScheduler {
    state: Arc<Mutex<ManualState>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Virtual time elapsed so far
    pub fn now(&self) -> Duration {
        self.state.lock().now
    }

    /// Tasks scheduled and not yet run or cancelled
    pub fn pending(&self) -> usize {
        self.state
            .lock()
            .pending
            .iter()
            .filter(|p| !p.timer.is_cancelled())
            .count()
    }

    /// Every delay ever requested, in order
    pub fn requested_delays(&self) -> Vec<Duration> {
        self.state.lock().requested.clone()
    }

    /// Move virtual time forward, running every task that falls due,
    /// including tasks scheduled by tasks run here.
    pub fn advance(&self, by: Duration) -> usize {
        let target = self.now() + by;
        let mut ran = 0;
        while let Some(task) = self.pop_due(target) {
            task();
            ran += 1;
        }
        self.state.lock().now = target;
        ran
    }

    /// Jump to the earliest pending task and run it
    pub fn run_next(&self) -> bool {
        match self.pop_due(Duration::MAX) {
            Some(task) => {
                task();
                true
            }
            None => false,
        }
    }

    fn pop_due(&self, limit: Duration) -> Option<Task> {
        let mut state = self.state.lock();
        state.pending.retain(|p| !p.timer.is_cancelled());
        let index = state
            .pending
            .iter()
            .enumerate()
            .filter(|(_, p)| p.due <= limit)
            .min_by_key(|(_, p)| (p.due, p.seq))
            .map(|(i, _)| i)?;
        let entry = state.pending.remove(index);
        state.now = state.now.max(entry.due);
        Some(entry.task)
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&self, delay: Duration, task: Task) -> TimerHandle {
        let timer = TimerHandle::default();
        let mut state = self.state.lock();
        let seq = state.next_seq;
        state.next_seq += 1;
        let due = state.now + delay;
        state.requested.push(delay);
        state.pending.push(Pending {
            due,
            seq,
            timer: timer.clone(),
            task,
        });
        timer
    }
}
