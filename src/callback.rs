//! Outcome callbacks and the fan-out dispatch registry.
//!
//! A request holds an ordered list of tagged callbacks, each bound to an
//! [`ExecutionContext`]. Dispatching an outcome walks the list in
//! insertion order and schedules every handler of the matching kind on
//! its context - fan-out, not first-wins. The dispatcher never waits for
//! a handler to finish; ordering between handlers is only guaranteed in
//! submission order, and only when their shared context is serial.

use std::sync::Arc;

use crate::dispatch::ExecutionContext;
use crate::error::GeocodeError;
use crate::service::Placemark;

/// Handler invoked with the results of a successful geocode.
pub type SuccessHandler = Arc<dyn Fn(Vec<Placemark>) + Send + Sync>;

/// Handler invoked with the error of a failed geocode.
pub type FailureHandler = Arc<dyn Fn(GeocodeError) + Send + Sync>;

/// A registered callback, tagged by the outcome kind it handles.
#[derive(Clone)]
pub enum OutcomeCallback {
    /// Invoked with the placemark results on success dispatch.
    OnSuccess {
        context: ExecutionContext,
        handler: SuccessHandler,
    },
    /// Invoked with the error on failure dispatch.
    OnFailure {
        context: ExecutionContext,
        handler: FailureHandler,
    },
}

impl OutcomeCallback {
    /// Create a success callback bound to `context`.
    pub fn on_success<F>(context: ExecutionContext, handler: F) -> Self
    where
        F: Fn(Vec<Placemark>) + Send + Sync + 'static,
    {
        Self::OnSuccess {
            context,
            handler: Arc::new(handler),
        }
    }

    /// Create a failure callback bound to `context`.
    pub fn on_failure<F>(context: ExecutionContext, handler: F) -> Self
    where
        F: Fn(GeocodeError) + Send + Sync + 'static,
    {
        Self::OnFailure {
            context,
            handler: Arc::new(handler),
        }
    }
}

impl std::fmt::Debug for OutcomeCallback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OnSuccess { .. } => write!(f, "OutcomeCallback::OnSuccess"),
            Self::OnFailure { .. } => write!(f, "OutcomeCallback::OnFailure"),
        }
    }
}

/// Ordered, append-only collection of outcome callbacks.
#[derive(Debug, Default)]
pub struct CallbackRegistry {
    entries: Vec<OutcomeCallback>,
}

impl CallbackRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Append a callback. `None` is ignored.
    pub fn add(&mut self, callback: Option<OutcomeCallback>) {
        if let Some(callback) = callback {
            self.entries.push(callback);
        }
    }

    /// Number of registered callbacks.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the registry is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Schedule every success handler with a clone of `results`.
    pub fn dispatch_success(&self, results: &[Placemark]) {
        for entry in &self.entries {
            if let OutcomeCallback::OnSuccess { context, handler } = entry {
                let handler = handler.clone();
                let results = results.to_vec();
                context.schedule(Box::new(move || handler(results)));
            }
        }
    }

    /// Schedule every failure handler with a clone of `error`.
    pub fn dispatch_failure(&self, error: &GeocodeError) {
        for entry in &self.entries {
            if let OutcomeCallback::OnFailure { context, handler } = entry {
                let handler = handler.clone();
                let error = error.clone();
                context.schedule(Box::new(move || handler(error)));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::SerialQueue;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn test_add_none_is_noop() {
        let mut registry = CallbackRegistry::new();
        assert!(registry.is_empty());

        registry.add(None);
        assert_eq!(registry.len(), 0);

        registry.add(Some(OutcomeCallback::on_success(
            ExecutionContext::Concurrent,
            |_| {},
        )));
        registry.add(None);
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_success_dispatch_skips_failure_entries() {
        let successes = Arc::new(AtomicUsize::new(0));
        let failures = Arc::new(AtomicUsize::new(0));

        let mut registry = CallbackRegistry::new();
        let s = successes.clone();
        registry.add(Some(OutcomeCallback::on_success(
            ExecutionContext::Concurrent,
            move |_| {
                s.fetch_add(1, Ordering::SeqCst);
            },
        )));
        let f = failures.clone();
        registry.add(Some(OutcomeCallback::on_failure(
            ExecutionContext::Concurrent,
            move |_| {
                f.fetch_add(1, Ordering::SeqCst);
            },
        )));

        registry.dispatch_success(&[Placemark::new()]);
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(successes.load(Ordering::SeqCst), 1);
        assert_eq!(failures.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failure_dispatch_reaches_every_failure_entry() {
        let failures = Arc::new(AtomicUsize::new(0));

        let mut registry = CallbackRegistry::new();
        for _ in 0..3 {
            let f = failures.clone();
            registry.add(Some(OutcomeCallback::on_failure(
                ExecutionContext::Concurrent,
                move |_| {
                    f.fetch_add(1, Ordering::SeqCst);
                },
            )));
        }

        registry.dispatch_failure(&GeocodeError::NoData);
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(failures.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_serial_context_preserves_insertion_order() {
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let serial = SerialQueue::new();

        let mut registry = CallbackRegistry::new();
        for i in 0..5 {
            let seen = seen.clone();
            registry.add(Some(OutcomeCallback::on_success(
                ExecutionContext::Serial(serial.clone()),
                move |_| {
                    seen.lock().push(i);
                },
            )));
        }

        registry.dispatch_success(&[]);
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(*seen.lock(), vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_handlers_receive_cloned_payload() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

        let mut registry = CallbackRegistry::new();
        registry.add(Some(OutcomeCallback::on_success(
            ExecutionContext::Concurrent,
            move |results| {
                let _ = tx.send(results);
            },
        )));

        let mark = Placemark::new().with_name("Cupertino");
        registry.dispatch_success(std::slice::from_ref(&mark));

        let received = rx.recv().await.unwrap();
        assert_eq!(received, vec![mark]);
    }
}
