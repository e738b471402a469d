//! The external geocoding service seam and its passthrough data types.
//!
//! The crate never interprets placemark contents; results flow from the
//! service to registered callbacks untouched. A provider implements
//! [`GeocodingService`]; each method resolves to either a non-empty list
//! of placemarks or an error. An empty `Ok` is normalized by the request
//! to [`GeocodeError::NoData`](crate::error::GeocodeError::NoData).

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A WGS84 coordinate pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// A circular region used to bias forward geocoding.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegionHint {
    /// Center of the region.
    pub center: Coordinate,
    /// Radius around the center, in meters.
    pub radius_meters: f64,
}

impl RegionHint {
    pub const fn new(center: Coordinate, radius_meters: f64) -> Self {
        Self {
            center,
            radius_meters,
        }
    }
}

/// A single geocoding result, passed through opaquely.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Placemark {
    /// Human-readable place name, if the provider reported one.
    pub name: Option<String>,
    /// Resolved coordinate, if the provider reported one.
    pub coordinate: Option<Coordinate>,
    /// Provider-specific address components (street, locality, ...).
    pub address: BTreeMap<String, String>,
}

impl Placemark {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the place name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the resolved coordinate.
    #[must_use]
    pub fn with_coordinate(mut self, coordinate: Coordinate) -> Self {
        self.coordinate = Some(coordinate);
        self
    }

    /// Add an address component.
    #[must_use]
    pub fn with_address_field(
        mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.address.insert(key.into(), value.into());
        self
    }
}

/// Boxed future returned by every [`GeocodingService`] operation.
pub type ServiceFuture = Pin<Box<dyn Future<Output = Result<Vec<Placemark>>> + Send>>;

/// An asynchronous geocoding provider.
///
/// Each operation terminates with exactly one outcome. Implementations
/// are free to complete on any thread; the request core guarantees that
/// user callbacks still run on their declared execution contexts.
pub trait GeocodingService: Send + Sync + 'static {
    /// Resolve a coordinate to placemarks (reverse geocoding).
    fn reverse_geocode(&self, coordinate: Coordinate) -> ServiceFuture;

    /// Resolve a free-form address to placemarks (forward geocoding),
    /// optionally biased toward a region.
    fn geocode_address(&self, query: &str, region: Option<RegionHint>) -> ServiceFuture;

    /// Resolve a structured key-value address dictionary to placemarks.
    ///
    /// The dictionary is provider-defined and passed through opaquely.
    fn geocode_dictionary(&self, fields: &serde_json::Map<String, serde_json::Value>)
        -> ServiceFuture;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placemark_builder() {
        let mark = Placemark::new()
            .with_name("Apple Park")
            .with_coordinate(Coordinate::new(37.334, -122.009))
            .with_address_field("locality", "Cupertino");

        assert_eq!(mark.name.as_deref(), Some("Apple Park"));
        assert_eq!(mark.coordinate, Some(Coordinate::new(37.334, -122.009)));
        assert_eq!(mark.address.get("locality").map(String::as_str), Some("Cupertino"));
    }

    #[test]
    fn test_placemark_default_is_empty() {
        let mark = Placemark::new();
        assert!(mark.name.is_none());
        assert!(mark.coordinate.is_none());
        assert!(mark.address.is_empty());
    }
}
