//! Single-shot answer timers.
//!
//! A timer owns the future to run on expiry. `disarm` before expiry guarantees
//! the future is dropped without being polled.

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::debug;

/// Work to run when a timer expires.
pub type ExpiryFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerHandle(u64);

impl TimerHandle {
    #[must_use]
    pub fn value(self) -> u64 {
        self.0
    }
}

pub trait TimerService: Send + Sync {
    /// Start a countdown that runs `on_expire` at or after `duration`.
    fn arm(&self, duration: Duration, on_expire: ExpiryFuture) -> TimerHandle;

    /// Cancel a pending countdown. No-op if it already fired or was disarmed.
    fn disarm(&self, handle: TimerHandle);
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

//
// ─── TOKIO ─────────────────────────────────────────────────────────────────────
//

/// Wall-clock timer backed by `tokio::time::sleep`, one task per countdown.
///
/// `arm` must be called from within a Tokio runtime.
#[derive(Clone, Default)]
pub struct TokioTimer {
    inner: Arc<TokioTimerInner>,
}

#[derive(Default)]
struct TokioTimerInner {
    next_id: AtomicU64,
    pending: Mutex<HashMap<u64, JoinHandle<()>>>,
}

impl TokioTimer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of countdowns that have neither fired nor been disarmed.
    #[must_use]
    pub fn pending(&self) -> usize {
        lock(&self.inner.pending).len()
    }
}

impl TimerService for TokioTimer {
    fn arm(&self, duration: Duration, on_expire: ExpiryFuture) -> TimerHandle {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let inner = Arc::clone(&self.inner);

        // the task cannot claim its entry before it is inserted
        let mut pending = lock(&self.inner.pending);
        let task = tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            let armed = lock(&inner.pending).remove(&id).is_some();
            if armed {
                debug!(timer = id, "timer expired");
                on_expire.await;
            }
        });
        pending.insert(id, task);

        debug!(timer = id, secs = duration.as_secs(), "timer armed");
        TimerHandle(id)
    }

    fn disarm(&self, handle: TimerHandle) {
        if let Some(task) = lock(&self.inner.pending).remove(&handle.0) {
            task.abort();
            debug!(timer = handle.0, "timer disarmed");
        }
    }
}

//
// ─── MANUAL ────────────────────────────────────────────────────────────────────
//

/// Timer that never fires on its own. Drivers and tests expire countdowns
/// explicitly with [`ManualTimer::fire`].
#[derive(Clone, Default)]
pub struct ManualTimer {
    inner: Arc<Mutex<ManualState>>,
}

#[derive(Default)]
struct ManualState {
    next_id: u64,
    pending: BTreeMap<u64, (Duration, ExpiryFuture)>,
}

impl ManualTimer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn pending(&self) -> usize {
        lock(&self.inner).pending.len()
    }

    /// Armed handles, oldest first.
    #[must_use]
    pub fn pending_handles(&self) -> Vec<TimerHandle> {
        lock(&self.inner)
            .pending
            .keys()
            .copied()
            .map(TimerHandle)
            .collect()
    }

    /// Duration a pending countdown was armed with.
    #[must_use]
    pub fn armed_duration(&self, handle: TimerHandle) -> Option<Duration> {
        lock(&self.inner).pending.get(&handle.0).map(|(d, _)| *d)
    }

    /// Expire `handle` now. Returns `false` if it was not pending.
    pub async fn fire(&self, handle: TimerHandle) -> bool {
        let entry = lock(&self.inner).pending.remove(&handle.0);
        match entry {
            Some((_, on_expire)) => {
                on_expire.await;
                true
            }
            None => false,
        }
    }

    /// Expire the oldest pending countdown. Returns `false` if none was pending.
    pub async fn fire_next(&self) -> bool {
        let entry = lock(&self.inner).pending.pop_first();
        match entry {
            Some((_, (_, on_expire))) => {
                on_expire.await;
                true
            }
            None => false,
        }
    }
}

impl TimerService for ManualTimer {
    fn arm(&self, duration: Duration, on_expire: ExpiryFuture) -> TimerHandle {
        let mut state = lock(&self.inner);
        let id = state.next_id;
        state.next_id += 1;
        state.pending.insert(id, (duration, on_expire));
        TimerHandle(id)
    }

    fn disarm(&self, handle: TimerHandle) {
        lock(&self.inner).pending.remove(&handle.0);
    }
}
