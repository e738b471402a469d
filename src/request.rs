//! The geocoding request object.
//!
//! A [`GeocodeRequest`] is a cancelable, pausable unit of work that
//! drives exactly one external geocoding call per attempt and fans the
//! outcome out to every registered callback on its declared execution
//! context. The request composes the crate's building blocks:
//!
//! 1. `resume()` delegates to the injected [`RequestQueue`]; the queue
//!    decides when to invoke `on_resume`.
//! 2. `on_resume` either replays the cached results (the external
//!    service is never invoked twice for one request instance) or opens
//!    a new attempt and spawns the service call chosen by the source.
//! 3. The call's single completion - or the timeout timer, whichever
//!    wins the attempt gate - caches/records the outcome and dispatches
//!    it. Exactly one of success or failure is delivered per attempt.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use geodispatch::{
//!     ExecutionContext, GeocodeRequest, OperationSource, RequestQueue,
//! };
//!
//! let request = GeocodeRequest::new(
//!     OperationSource::address("1 Infinite Loop, Cupertino"),
//!     service,
//!     Arc::new(RequestQueue::default()),
//!     ExecutionContext::Concurrent,
//!     |placemarks| println!("resolved: {placemarks:?}"),
//!     |error| eprintln!("failed: {error}"),
//! );
//! request.resume();
//! ```

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::callback::{CallbackRegistry, OutcomeCallback};
use crate::dispatch::ExecutionContext;
use crate::error::{GeocodeError, Result};
use crate::queue::RequestQueue;
use crate::service::{Coordinate, GeocodingService, Placemark, RegionHint};
use crate::state::{RequestState, StateCell};
use crate::timeout::TimeoutController;

/// Opaque request identity token, generated once at construction.
///
/// Request equality and hashing are defined solely on this token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(Uuid);

impl RequestId {
    fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// What a request asks the geocoding service to resolve.
///
/// Exactly one variant per request, immutable after construction.
#[derive(Debug, Clone)]
pub enum OperationSource {
    /// Reverse geocode a coordinate.
    Coordinate(Coordinate),
    /// Forward geocode a free-form address, optionally region-biased.
    Address {
        query: String,
        region: Option<RegionHint>,
    },
    /// Structured geocode of an opaque key-value dictionary.
    Dictionary(serde_json::Map<String, serde_json::Value>),
}

impl OperationSource {
    /// Convenience constructor for an address source without a region.
    pub fn address(query: impl Into<String>) -> Self {
        Self::Address {
            query: query.into(),
            region: None,
        }
    }
}

/// Gate enforcing exactly one outcome per external call.
struct AttemptGate {
    attempt: u64,
    settled: bool,
}

struct RequestInner {
    id: RequestId,
    source: OperationSource,
    service: Arc<dyn GeocodingService>,
    queue: Arc<RequestQueue>,
    state: StateCell,
    callbacks: Mutex<CallbackRegistry>,
    cached: Mutex<Option<Vec<Placemark>>>,
    last_error: Mutex<Option<GeocodeError>>,
    timeout: TimeoutController,
    call: Mutex<Option<JoinHandle<()>>>,
    gate: Mutex<AttemptGate>,
    cancel_on_error: AtomicBool,
}

impl Drop for RequestInner {
    fn drop(&mut self) {
        // The timer aborts itself via TimeoutController's Drop.
        if let Some(call) = self.call.get_mut().take() {
            call.abort();
        }
    }
}

/// A single asynchronous geocoding request.
///
/// Cheaply cloneable handle; clones refer to the same request. The
/// request exclusively owns its timeout timer and its in-flight service
/// call - dropping the last handle aborts both. The queue holds
/// non-owning membership only.
#[derive(Clone)]
pub struct GeocodeRequest {
    inner: Arc<RequestInner>,
}

/// Non-owning handle used by the queue's wait list.
#[derive(Clone)]
pub(crate) struct WeakRequest {
    inner: Weak<RequestInner>,
}

impl WeakRequest {
    pub(crate) fn upgrade(&self) -> Option<GeocodeRequest> {
        self.inner.upgrade().map(|inner| GeocodeRequest { inner })
    }
}

impl GeocodeRequest {
    /// Create a request in the idle state with an empty cache.
    ///
    /// The mandatory success/failure handler pair is bound to `context`;
    /// further callbacks may be registered with [`add`](Self::add).
    pub fn new<S, F>(
        source: OperationSource,
        service: Arc<dyn GeocodingService>,
        queue: Arc<RequestQueue>,
        context: ExecutionContext,
        on_success: S,
        on_failure: F,
    ) -> Self
    where
        S: Fn(Vec<Placemark>) + Send + Sync + 'static,
        F: Fn(GeocodeError) + Send + Sync + 'static,
    {
        let mut callbacks = CallbackRegistry::new();
        callbacks.add(Some(OutcomeCallback::on_success(context.clone(), on_success)));
        callbacks.add(Some(OutcomeCallback::on_failure(context, on_failure)));

        Self {
            inner: Arc::new(RequestInner {
                id: RequestId::generate(),
                source,
                service,
                queue,
                state: StateCell::new(),
                callbacks: Mutex::new(callbacks),
                cached: Mutex::new(None),
                last_error: Mutex::new(None),
                timeout: TimeoutController::new(),
                call: Mutex::new(None),
                gate: Mutex::new(AttemptGate {
                    attempt: 0,
                    settled: false,
                }),
                cancel_on_error: AtomicBool::new(false),
            }),
        }
    }

    /// The request's identity token.
    #[inline]
    pub fn id(&self) -> RequestId {
        self.inner.id
    }

    /// The immutable operation source.
    #[inline]
    pub fn source(&self) -> &OperationSource {
        &self.inner.source
    }

    /// Current lifecycle state.
    pub fn state(&self) -> RequestState {
        self.inner.state.state()
    }

    /// State before the most recent committed transition.
    pub fn previous_state(&self) -> RequestState {
        self.inner.state.previous()
    }

    /// Register an observer invoked with `(old, new)` on every state
    /// change, synchronously on the mutating thread.
    pub fn on_state_change<F>(&self, observer: F)
    where
        F: Fn(RequestState, RequestState) + Send + Sync + 'static,
    {
        self.inner.state.set_observer(Arc::new(observer));
    }

    /// Register an additional callback. `None` is ignored.
    pub fn add(&self, callback: Option<OutcomeCallback>) {
        self.inner.callbacks.lock().add(callback);
    }

    /// Number of registered callbacks.
    pub fn callback_count(&self) -> usize {
        self.inner.callbacks.lock().len()
    }

    /// Results cached by a previous successful attempt, if any.
    pub fn cached_results(&self) -> Option<Vec<Placemark>> {
        self.inner.cached.lock().clone()
    }

    /// Error recorded by the most recent failed attempt, if any.
    pub fn last_error(&self) -> Option<GeocodeError> {
        self.inner.last_error.lock().clone()
    }

    /// The configured timeout duration.
    pub fn timeout(&self) -> Option<Duration> {
        self.inner.timeout.duration()
    }

    /// Arm or disarm the timeout.
    ///
    /// `Some(duration)` restarts the countdown from zero, canceling any
    /// pending timer; on expiry the request fails with
    /// [`GeocodeError::Timeout`] through the normal error-dispatch path.
    /// `None` cancels any pending timer with no further effect.
    pub fn set_timeout(&self, duration: Option<Duration>) {
        let weak = Arc::downgrade(&self.inner);
        self.inner.timeout.set(duration, move || {
            if let Some(inner) = weak.upgrade() {
                GeocodeRequest { inner }.force_timeout();
            }
        });
    }

    /// Whether the queue drops this request after a failure dispatch.
    pub fn cancel_on_error(&self) -> bool {
        self.inner.cancel_on_error.load(Ordering::Acquire)
    }

    /// Set the failure-eviction policy flag consumed by the queue.
    pub fn set_cancel_on_error(&self, cancel: bool) {
        self.inner.cancel_on_error.store(cancel, Ordering::Release);
    }

    /// Whether the shared queue currently tracks this request.
    pub fn is_queued(&self) -> bool {
        self.inner.queue.is_queued(self)
    }

    /// Ask the queue to start this request. Returns immediately; the
    /// queue invokes `on_resume` once it grants a running slot.
    pub fn resume(&self) {
        self.inner.queue.start(self);
    }

    /// Ask the queue to suspend this request. Any in-flight service
    /// call is asked to stop, best-effort.
    pub fn pause(&self) {
        self.inner.queue.pause(self);
    }

    /// Remove this request from the queue. Terminal.
    pub fn cancel(&self) {
        self.inner.queue.cancel(self);
    }

    pub(crate) fn set_state(&self, state: RequestState) {
        self.inner.state.set(state);
    }

    pub(crate) fn downgrade(&self) -> WeakRequest {
        WeakRequest {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Queue hook: a running slot was granted.
    pub(crate) fn on_resume(&self) {
        let cached = self.inner.cached.lock().clone();
        if let Some(results) = cached {
            tracing::debug!("Replaying cached results for request {}", self.id());
            self.inner.callbacks.lock().dispatch_success(&results);
            self.inner.queue.settle(self, false);
            return;
        }

        *self.inner.last_error.lock() = None;

        let attempt = {
            let mut gate = self.inner.gate.lock();
            gate.attempt += 1;
            gate.settled = false;
            gate.attempt
        };

        let future = match &self.inner.source {
            OperationSource::Coordinate(coordinate) => {
                self.inner.service.reverse_geocode(*coordinate)
            }
            OperationSource::Address { query, region } => {
                self.inner.service.geocode_address(query, *region)
            }
            OperationSource::Dictionary(fields) => {
                self.inner.service.geocode_dictionary(fields)
            }
        };

        tracing::debug!("Issuing service call for request {} (attempt {})", self.id(), attempt);
        let weak = Arc::downgrade(&self.inner);
        let handle = tokio::spawn(async move {
            let outcome = future.await;
            if let Some(inner) = weak.upgrade() {
                GeocodeRequest { inner }.complete(attempt, outcome);
            }
        });

        if let Some(previous) = self.inner.call.lock().replace(handle) {
            previous.abort();
        }
    }

    /// Queue hook: the request was suspended. Best-effort cancellation
    /// of the in-flight call; if the abort loses the race with
    /// completion, the attempt gate still caps dispatch at one outcome.
    pub(crate) fn on_pause(&self) {
        if let Some(call) = self.inner.call.lock().take() {
            tracing::debug!("Aborting in-flight call for request {}", self.id());
            call.abort();
        }
    }

    /// Queue hook: the request was cancelled. Releases the service-call
    /// handle and the timer.
    pub(crate) fn on_cancel(&self) {
        if let Some(call) = self.inner.call.lock().take() {
            call.abort();
        }
        self.inner.timeout.disarm();
    }

    /// Force a timeout failure for the current attempt.
    fn force_timeout(&self) {
        if let Some(call) = self.inner.call.lock().take() {
            call.abort();
        }
        let attempt = self.inner.gate.lock().attempt;
        self.complete(attempt, Err(GeocodeError::Timeout));
    }

    /// Single completion path for service results, service errors and
    /// timer expiry. The attempt gate drops late arrivals.
    fn complete(&self, attempt: u64, outcome: Result<Vec<Placemark>>) {
        {
            let mut gate = self.inner.gate.lock();
            if gate.attempt != attempt || gate.settled {
                tracing::warn!("Dropping late completion for request {} (attempt {})", self.id(), attempt);
                return;
            }
            gate.settled = true;
        }

        self.inner.timeout.disarm();

        // A completion with neither results nor an error is normalized.
        let outcome = match outcome {
            Ok(results) if results.is_empty() => Err(GeocodeError::NoData),
            other => other,
        };

        match outcome {
            Ok(results) => {
                tracing::debug!("Request {} resolved {} placemarks", self.id(), results.len());
                *self.inner.cached.lock() = Some(results.clone());
                self.inner.callbacks.lock().dispatch_success(&results);
                self.inner.queue.settle(self, false);
            }
            Err(error) => {
                tracing::debug!("Request {} failed: {}", self.id(), error);
                *self.inner.last_error.lock() = Some(error.clone());
                self.inner.callbacks.lock().dispatch_failure(&error);
                self.inner.queue.settle(self, true);
            }
        }
    }
}

impl PartialEq for GeocodeRequest {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for GeocodeRequest {}

impl std::hash::Hash for GeocodeRequest {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.inner.id.hash(state);
    }
}

impl fmt::Debug for GeocodeRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeocodeRequest")
            .field("id", &self.inner.id)
            .field("source", &self.inner.source)
            .field("state", &self.state())
            .finish()
    }
}
