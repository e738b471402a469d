//! # geodispatch
//!
//! Cancelable, pausable geocoding requests with context-bound callback
//! dispatch.
//!
//! The crate wraps an injected platform geocoding service in a request
//! object with a full lifecycle: typed success/failure callbacks fanned
//! out on caller-chosen execution contexts, a single-shot timeout that
//! forces a failure outcome, membership in a shared capacity-limited
//! queue, and a result cache that makes a second resume replay the
//! first outcome without re-invoking the service.
//!
//! ## Architecture
//!
//! ```text
//! resume() ──► RequestQueue ──► on_resume ──► GeocodingService call
//!                                   │              │ (one completion)
//!                                   │ cached?      ▼
//!                                   └─────────► dispatch ──► ExecutionContext
//!                 TimeoutController ── timeout ──┘            (per callback)
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use geodispatch::{
//!     ExecutionContext, GeocodeRequest, OperationSource, RequestQueue,
//! };
//!
//! let queue = Arc::new(RequestQueue::default());
//! let request = GeocodeRequest::new(
//!     OperationSource::address("1 Infinite Loop, Cupertino"),
//!     service, // Arc<dyn GeocodingService>
//!     queue,
//!     ExecutionContext::Concurrent,
//!     |placemarks| println!("resolved: {placemarks:?}"),
//!     |error| eprintln!("failed: {error}"),
//! );
//! request.resume();
//! ```

pub mod callback;
pub mod dispatch;
pub mod error;
pub mod queue;
pub mod request;
pub mod service;
pub mod state;

mod timeout;

pub use callback::{CallbackRegistry, FailureHandler, OutcomeCallback, SuccessHandler};
pub use dispatch::{ExecutionContext, SerialQueue};
pub use error::{GeocodeError, Result};
pub use queue::{QueueConfig, RequestQueue};
pub use request::{GeocodeRequest, OperationSource, RequestId};
pub use service::{Coordinate, GeocodingService, Placemark, RegionHint, ServiceFuture};
pub use state::RequestState;
