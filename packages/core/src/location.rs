//! GPS fixes, great-circle distance and location pings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::wire;

/// Mean Earth radius in meters used by the haversine formula.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Default maximum distance between technician and site for a check-in.
pub const MAX_CHECK_IN_RADIUS_M: f64 = 20_000.0;

/// Great-circle distance in meters between two points given in degrees.
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();

    let a = (d_phi / 2.0).sin() * (d_phi / 2.0).sin()
        + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin() * (d_lambda / 2.0).sin();
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_M * c
}

/// Latest position reported by the location-tracking collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationFix {
    pub latitude: f64,
    pub longitude: f64,
    pub captured_at: DateTime<Utc>,
    /// The work site selected when the fix was taken, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
}

impl LocationFix {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            captured_at: Utc::now(),
            client_id: None,
        }
    }

    /// Tag the fix with the selected site.
    pub fn with_client_id(mut self, client_id: Option<String>) -> Self {
        self.client_id = client_id;
        self
    }

    /// Both coordinates are real numbers.
    pub fn is_finite(&self) -> bool {
        self.latitude.is_finite() && self.longitude.is_finite()
    }

    /// Distance in meters to the given point.
    pub fn distance_to(&self, latitude: f64, longitude: f64) -> f64 {
        haversine_distance(self.latitude, self.longitude, latitude, longitude)
    }
}

/// A position report for the `ubicacion-usuario` endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingLocationPing {
    #[serde(rename = "id_usuario")]
    pub user_id: String,
    #[serde(rename = "id_clientes", deserialize_with = "wire::lenient_string")]
    pub site_id: String,
    #[serde(with = "wire::coordinate")]
    pub lat: f64,
    #[serde(rename = "log", with = "wire::coordinate")]
    pub lon: f64,
    /// Optional attendance fields sent alongside the position.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PendingLocationPing {
    pub fn new(user_id: impl Into<String>, site_id: impl Into<String>, fix: &LocationFix) -> Self {
        Self {
            user_id: user_id.into(),
            site_id: site_id.into(),
            lat: fix.latitude,
            lon: fix.longitude,
            extra: Map::new(),
        }
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}
