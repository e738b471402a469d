//! Request lifecycle states and change notification.
//!
//! State changes go through an explicit setter that compares old and new,
//! notifies a registered observer, then commits. There is no implicit
//! on-write hook; the comparison and the notification are visible in
//! [`StateCell::set`] and individually testable.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

/// Lifecycle state of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RequestState {
    /// Not executing. The initial state, and the state a request returns
    /// to after an outcome has been dispatched.
    #[default]
    Idle,

    /// The queue has started this request; a service call may be in
    /// flight.
    Running,

    /// Execution suspended; any in-flight call was asked to stop.
    Paused,

    /// Removed from the queue. Terminal.
    Cancelled,
}

impl fmt::Display for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Running => write!(f, "running"),
            Self::Paused => write!(f, "paused"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Observer invoked with `(old, new)` on every committed state change.
pub type StateObserver = Arc<dyn Fn(RequestState, RequestState) + Send + Sync>;

struct StateInner {
    state: RequestState,
    previous: RequestState,
    observer: Option<StateObserver>,
}

/// Holds a request's current and previous state plus the change observer.
///
/// `set` notifies the observer synchronously on the calling thread before
/// committing, so during notification `state()` still reports the old
/// value. `Cancelled` is terminal: attempts to leave it are rejected.
pub(crate) struct StateCell {
    inner: Mutex<StateInner>,
}

impl StateCell {
    pub(crate) fn new() -> Self {
        Self {
            inner: Mutex::new(StateInner {
                state: RequestState::Idle,
                previous: RequestState::Idle,
                observer: None,
            }),
        }
    }

    pub(crate) fn state(&self) -> RequestState {
        self.inner.lock().state
    }

    pub(crate) fn previous(&self) -> RequestState {
        self.inner.lock().previous
    }

    pub(crate) fn set_observer(&self, observer: StateObserver) {
        self.inner.lock().observer = Some(observer);
    }

    /// Transition to `new`, notifying the observer exactly once if the
    /// value actually changes. Returns whether the transition committed.
    pub(crate) fn set(&self, new: RequestState) -> bool {
        let (old, observer) = {
            let inner = self.inner.lock();
            if inner.state == new {
                return false;
            }
            if inner.state == RequestState::Cancelled {
                tracing::warn!("Rejected transition out of cancelled (to {})", new);
                return false;
            }
            (inner.state, inner.observer.clone())
        };

        if let Some(observer) = observer {
            observer(old, new);
        }

        let mut inner = self.inner.lock();
        inner.previous = old;
        inner.state = new;
        tracing::debug!("State changed: {} -> {}", old, new);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_initial_state() {
        let cell = StateCell::new();
        assert_eq!(cell.state(), RequestState::Idle);
        assert_eq!(cell.previous(), RequestState::Idle);
    }

    #[test]
    fn test_set_commits_and_records_previous() {
        let cell = StateCell::new();

        assert!(cell.set(RequestState::Running));
        assert_eq!(cell.state(), RequestState::Running);
        assert_eq!(cell.previous(), RequestState::Idle);

        assert!(cell.set(RequestState::Paused));
        assert_eq!(cell.state(), RequestState::Paused);
        assert_eq!(cell.previous(), RequestState::Running);
    }

    #[test]
    fn test_same_state_does_not_notify() {
        let cell = StateCell::new();
        let notifications = Arc::new(AtomicUsize::new(0));

        let n = notifications.clone();
        cell.set_observer(Arc::new(move |_, _| {
            n.fetch_add(1, Ordering::SeqCst);
        }));

        assert!(!cell.set(RequestState::Idle));
        assert_eq!(notifications.load(Ordering::SeqCst), 0);

        assert!(cell.set(RequestState::Running));
        assert!(!cell.set(RequestState::Running));
        assert_eq!(notifications.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_observer_sees_old_and_new() {
        let cell = StateCell::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let s = seen.clone();
        cell.set_observer(Arc::new(move |old, new| {
            s.lock().push((old, new));
        }));

        cell.set(RequestState::Running);
        cell.set(RequestState::Paused);

        assert_eq!(
            *seen.lock(),
            vec![
                (RequestState::Idle, RequestState::Running),
                (RequestState::Running, RequestState::Paused),
            ]
        );
    }

    #[test]
    fn test_cancelled_is_terminal() {
        let cell = StateCell::new();

        assert!(cell.set(RequestState::Cancelled));
        assert!(!cell.set(RequestState::Running));
        assert!(!cell.set(RequestState::Idle));
        assert_eq!(cell.state(), RequestState::Cancelled);
    }

    #[test]
    fn test_display() {
        assert_eq!(RequestState::Idle.to_string(), "idle");
        assert_eq!(RequestState::Cancelled.to_string(), "cancelled");
    }
}
