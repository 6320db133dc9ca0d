//! Delayed task scheduling.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::runtime::Handle;

/// A callback run once when a timer fires.
pub type TimerCallback = Box<dyn FnOnce() + Send + 'static>;

/// Schedules callbacks after a delay.
///
/// Implementations must support delays of at least 32 768 ms, the largest
/// backoff the default policy produces.
pub trait TimerService: Send + Sync + 'static {
    /// Runs `callback` once after `delay`, unless the returned token is
    /// cancelled first.
    fn schedule(&self, delay: Duration, callback: TimerCallback) -> CancelToken;
}

impl<T: TimerService> TimerService for Arc<T> {
    fn schedule(&self, delay: Duration, callback: TimerCallback) -> CancelToken {
        (**self).schedule(delay, callback)
    }
}

/// Handle to a scheduled callback.
///
/// Dropping the token does not cancel the callback.
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
    on_cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl CancelToken {
    /// Creates a token that runs `on_cancel` when cancelled.
    pub fn new<F>(on_cancel: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            on_cancel: Some(Box::new(on_cancel)),
        }
    }

    /// A token whose cancellation only sets the flag.
    pub fn noop() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            on_cancel: None,
        }
    }

    /// A shared flag that flips to `true` once this token is cancelled.
    ///
    /// Timer implementations can check it right before running a callback.
    pub fn flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    /// Cancels the scheduled callback. Has no effect if it already ran.
    pub fn cancel(mut self) {
        self.cancelled.store(true, Ordering::Release);
        if let Some(on_cancel) = self.on_cancel.take() {
            on_cancel();
        }
    }

    /// Whether [`cancel`](Self::cancel) was called.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

impl fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Timer backed by the tokio runtime.
///
/// Each armed timer is its own sleeping task, so callbacks never wait on
/// each other.
#[derive(Debug, Clone, Default)]
pub struct TokioTimer {
    handle: Option<Handle>,
}

impl TokioTimer {
    /// Spawns timers on whichever runtime `schedule` is called from.
    pub fn new() -> Self {
        Self { handle: None }
    }

    /// Spawns timers on the given runtime.
    pub fn with_handle(handle: Handle) -> Self {
        Self {
            handle: Some(handle),
        }
    }
}

impl TimerService for TokioTimer {
    fn schedule(&self, delay: Duration, callback: TimerCallback) -> CancelToken {
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancelled);
        let task = async move {
            tokio::time::sleep(delay).await;
            if !flag.load(Ordering::Acquire) {
                callback();
            }
        };

        let join = match &self.handle {
            Some(handle) => handle.spawn(task),
            None => tokio::spawn(task),
        };
        let abort = join.abort_handle();

        CancelToken {
            cancelled,
            on_cancel: Some(Box::new(move || abort.abort())),
        }
    }
}
