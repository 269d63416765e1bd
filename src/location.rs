use crate::camera::PermissionState;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Coordinate delta below which two fixes count as the same spot (about 11m).
pub const SAME_SPOT_DELTA_DEG: f64 = 0.0001;

/// One raw position report from the device, before filtering.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationFix {
    pub latitude: f64,
    pub longitude: f64,
    /// Horizontal uncertainty radius in meters.
    pub accuracy_m: f64,
}

/// The accepted best-known position.
///
/// Replaced wholesale when a fresh fix passes the acceptance rule; never
/// mutated in place.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationSample {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy_m: f64,
    pub captured_at: DateTime<Utc>,
}

impl LocationSample {
    pub fn from_fix(fix: &LocationFix, captured_at: DateTime<Utc>) -> Self {
        Self {
            latitude: fix.latitude,
            longitude: fix.longitude,
            accuracy_m: fix.accuracy_m,
            captured_at,
        }
    }

    /// HUD line with coordinates to 4 decimal places and the uncertainty
    /// radius, e.g. `Lat: 40.8209, Lon: 14.4228 (±12m)`.
    pub fn summary(&self) -> String {
        format!(
            "Lat: {:.4}, Lon: {:.4} (±{}m)",
            self.latitude,
            self.longitude,
            self.accuracy_m.round() as i64
        )
    }
}

/// Options for a single position read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocationRequest {
    /// Allow a slower read in exchange for better accuracy.
    pub high_accuracy: bool,
    /// Give up on the read after this long.
    pub timeout: Duration,
    /// A cached fix younger than this may be returned instead of a new read.
    pub max_age: Duration,
}

impl Default for LocationRequest {
    fn default() -> Self {
        Self {
            high_accuracy: true,
            timeout: Duration::from_secs(10),
            max_age: Duration::from_secs(30),
        }
    }
}

#[derive(Error, Debug)]
pub enum LocationError {
    #[error("position read timed out")]
    Timeout,

    #[error("position unavailable: {0}")]
    Unavailable(String),

    #[error("geolocation access was denied")]
    AccessDenied,
}

/// The geolocation seam.
#[async_trait]
pub trait LocationSource: Send + Sync {
    /// Current permission state for geolocation access.
    async fn permission(&self) -> PermissionState;

    /// One-shot position read honoring the request options.
    async fn current_position(&self, request: LocationRequest)
    -> Result<LocationFix, LocationError>;
}

/// Whether a fresh fix should replace the current sample.
///
/// A fix wins when there is no current sample, when either coordinate moved
/// by more than [`SAME_SPOT_DELTA_DEG`], or when its accuracy is strictly
/// better. Fixes past the accuracy limit never reach this check.
pub fn supersedes(current: Option<&LocationSample>, fix: &LocationFix) -> bool {
    let Some(current) = current else {
        return true;
    };
    (fix.latitude - current.latitude).abs() > SAME_SPOT_DELTA_DEG
        || (fix.longitude - current.longitude).abs() > SAME_SPOT_DELTA_DEG
        || fix.accuracy_m < current.accuracy_m
}
