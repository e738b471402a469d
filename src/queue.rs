//! Shared request queue with a concurrency cap.
//!
//! The queue is the sole authority on whether a resumed request actually
//! begins executing. `start` either moves the request into the running
//! set and invokes its `on_resume` hook, or parks it in a FIFO wait list
//! until a slot frees up. All bookkeeping lives behind a single mutex;
//! request hooks are always invoked with the lock released.
//!
//! The queue is injected explicitly (`Arc<RequestQueue>`) rather than
//! reached through process-wide state, so a test can hand every request
//! its own queue.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use geodispatch::{QueueConfig, RequestQueue};
//!
//! let queue = Arc::new(RequestQueue::new(QueueConfig { max_running: 2 }));
//! // pass `queue.clone()` to each GeocodeRequest
//! ```

use std::collections::{HashSet, VecDeque};

use parking_lot::Mutex;

use crate::request::{GeocodeRequest, RequestId, WeakRequest};
use crate::state::RequestState;

/// Default maximum concurrently running requests.
pub const DEFAULT_MAX_RUNNING: usize = 4;

/// Configuration for a [`RequestQueue`].
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Maximum requests in the running set. Further starts are parked.
    pub max_running: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_running: DEFAULT_MAX_RUNNING,
        }
    }
}

struct QueueInner {
    /// Every tracked request, running or parked.
    members: HashSet<RequestId>,
    /// Requests whose `on_resume` has been invoked and not yet settled.
    running: HashSet<RequestId>,
    /// Parked requests in arrival order. Weak so the queue never keeps
    /// a dropped request alive.
    waiting: VecDeque<(RequestId, WeakRequest)>,
}

/// Tracks queued requests and decides when each one runs.
pub struct RequestQueue {
    inner: Mutex<QueueInner>,
    max_running: usize,
}

impl RequestQueue {
    /// Create a queue with the given configuration.
    pub fn new(config: QueueConfig) -> Self {
        Self {
            inner: Mutex::new(QueueInner {
                members: HashSet::new(),
                running: HashSet::new(),
                waiting: VecDeque::new(),
            }),
            max_running: config.max_running,
        }
    }

    /// Admit a request and run it if a slot is free, otherwise park it.
    ///
    /// Starting an already-running request is a no-op; starting a
    /// cancelled request is refused.
    pub fn start(&self, request: &GeocodeRequest) {
        if request.state() == RequestState::Cancelled {
            tracing::warn!("Refusing to start cancelled request {}", request.id());
            return;
        }

        let id = request.id();
        let mut q = self.inner.lock();
        q.members.insert(id);

        if q.running.contains(&id) {
            return;
        }

        if q.running.len() >= self.max_running {
            if !q.waiting.iter().any(|(waiting_id, _)| *waiting_id == id) {
                q.waiting.push_back((id, request.downgrade()));
            }
            drop(q);
            tracing::debug!("Queue at capacity, parked request {}", id);
            return;
        }

        q.running.insert(id);
        drop(q);

        tracing::debug!("Started request {}", id);
        request.set_state(RequestState::Running);
        request.on_resume();
    }

    /// Suspend a request. Its running slot (if any) is handed to the
    /// next parked request; queue membership is kept.
    pub fn pause(&self, request: &GeocodeRequest) {
        let id = request.id();
        let promoted = {
            let mut q = self.inner.lock();
            let was_running = q.running.remove(&id);
            q.waiting.retain(|(waiting_id, _)| *waiting_id != id);
            if was_running {
                self.promote_locked(&mut q)
            } else {
                Vec::new()
            }
        };

        tracing::debug!("Paused request {}", id);
        request.set_state(RequestState::Paused);
        request.on_pause();
        Self::run_promoted(promoted);
    }

    /// Remove a request from all bookkeeping. Terminal.
    pub fn cancel(&self, request: &GeocodeRequest) {
        let id = request.id();
        let promoted = {
            let mut q = self.inner.lock();
            q.members.remove(&id);
            let was_running = q.running.remove(&id);
            q.waiting.retain(|(waiting_id, _)| *waiting_id != id);
            if was_running {
                self.promote_locked(&mut q)
            } else {
                Vec::new()
            }
        };

        tracing::debug!("Cancelled request {}", id);
        request.set_state(RequestState::Cancelled);
        request.on_cancel();
        Self::run_promoted(promoted);
    }

    /// Whether the queue currently tracks this request.
    pub fn is_queued(&self, request: &GeocodeRequest) -> bool {
        self.inner.lock().members.contains(&request.id())
    }

    /// Number of tracked requests.
    pub fn len(&self) -> usize {
        self.inner.lock().members.len()
    }

    /// Whether no requests are tracked.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().members.is_empty()
    }

    /// Called by a request after it dispatched an outcome.
    ///
    /// Frees the running slot, applies the `cancel_on_error` eviction
    /// policy, returns the request to idle and promotes parked work.
    pub(crate) fn settle(&self, request: &GeocodeRequest, failed: bool) {
        let id = request.id();
        let evict = failed && request.cancel_on_error();

        let promoted = {
            let mut q = self.inner.lock();
            let was_running = q.running.remove(&id);
            if evict {
                q.members.remove(&id);
                q.waiting.retain(|(waiting_id, _)| *waiting_id != id);
            }
            if was_running {
                self.promote_locked(&mut q)
            } else {
                Vec::new()
            }
        };

        if evict {
            tracing::debug!("Evicted request {} after failure", id);
        }
        if request.state() == RequestState::Running {
            request.set_state(RequestState::Idle);
        }
        Self::run_promoted(promoted);
    }

    /// Move parked requests into free running slots. Caller holds the
    /// lock; returned requests are started with the lock released.
    fn promote_locked(&self, q: &mut QueueInner) -> Vec<GeocodeRequest> {
        let mut promoted = Vec::new();
        while q.running.len() < self.max_running {
            let Some((id, weak)) = q.waiting.pop_front() else {
                break;
            };
            if !q.members.contains(&id) {
                continue;
            }
            match weak.upgrade() {
                Some(request) => {
                    q.running.insert(id);
                    promoted.push(request);
                }
                None => {
                    // Owner dropped the request while it was parked.
                    q.members.remove(&id);
                }
            }
        }
        promoted
    }

    fn run_promoted(promoted: Vec<GeocodeRequest>) {
        for request in promoted {
            tracing::debug!("Promoted request {} from wait list", request.id());
            request.set_state(RequestState::Running);
            request.on_resume();
        }
    }
}

impl Default for RequestQueue {
    fn default() -> Self {
        Self::new(QueueConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = QueueConfig::default();
        assert_eq!(config.max_running, DEFAULT_MAX_RUNNING);
    }

    #[test]
    fn test_fresh_queue_is_empty() {
        let queue = RequestQueue::default();
        assert!(queue.is_empty());
        assert_eq!(queue.len(), 0);
    }
}
