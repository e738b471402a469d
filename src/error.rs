//! Error types for geodispatch.

use thiserror::Error;

/// Main error type for all geocoding request outcomes.
///
/// Every variant travels the same failure-dispatch path: it is delivered
/// asynchronously to each registered failure callback on its declared
/// execution context, never returned from `resume()`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GeocodeError {
    /// The request's timeout elapsed before the service completed.
    #[error("geocoding timed out")]
    Timeout,

    /// The service completed with neither results nor an error.
    #[error("geocoding returned no data")]
    NoData,

    /// Opaque error reported by the geocoding service, forwarded verbatim.
    #[error("geocoding service error: {0}")]
    Service(String),
}

/// Result type alias using GeocodeError.
pub type Result<T> = std::result::Result<T, GeocodeError>;
