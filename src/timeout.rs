//! Single-shot timeout timer for a request.
//!
//! Setting a duration always cancels any pending timer first, so
//! re-setting restarts the countdown from zero with no accumulation.
//! Expiry hands control to a caller-supplied closure; the request routes
//! it through the normal error-dispatch path.

use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;

struct TimeoutInner {
    duration: Option<Duration>,
    timer: Option<JoinHandle<()>>,
}

/// One-shot timer owned by a single request.
pub(crate) struct TimeoutController {
    inner: Mutex<TimeoutInner>,
}

impl TimeoutController {
    pub(crate) fn new() -> Self {
        Self {
            inner: Mutex::new(TimeoutInner {
                duration: None,
                timer: None,
            }),
        }
    }

    /// The currently configured duration.
    pub(crate) fn duration(&self) -> Option<Duration> {
        self.inner.lock().duration
    }

    /// Replace the timer.
    ///
    /// Any pending timer is aborted. With `Some(duration)` a fresh
    /// one-shot task is spawned that invokes `on_expiry` after the full
    /// duration; with `None` the controller is simply disarmed.
    pub(crate) fn set(&self, duration: Option<Duration>, on_expiry: impl FnOnce() + Send + 'static) {
        let mut inner = self.inner.lock();

        if let Some(timer) = inner.timer.take() {
            timer.abort();
        }
        inner.duration = duration;

        if let Some(duration) = duration {
            tracing::debug!("Timeout armed for {:?}", duration);
            inner.timer = Some(tokio::spawn(async move {
                tokio::time::sleep(duration).await;
                tracing::debug!("Timeout fired");
                on_expiry();
            }));
        }
    }

    /// Abort any pending timer without touching the configured duration.
    pub(crate) fn disarm(&self) {
        if let Some(timer) = self.inner.lock().timer.take() {
            timer.abort();
        }
    }
}

impl Drop for TimeoutController {
    fn drop(&mut self) {
        if let Some(timer) = self.inner.get_mut().timer.take() {
            timer.abort();
        }
    }
}
