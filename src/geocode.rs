use async_trait::async_trait;
use bon::bon;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

/// Public Nominatim instance used when no other endpoint is configured.
pub const DEFAULT_BASE_URL: &str = "https://nominatim.openstreetmap.org";

const USER_AGENT: &str = concat!("geostamp/", env!("CARGO_PKG_VERSION"));

/// The three detail levels queried for every accepted location sample, in
/// priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DetailLevel {
    /// Building-level lookup with the full address breakdown.
    Detailed,
    /// Neighbourhood-level lookup.
    Local,
    /// Coarse area lookup.
    Simple,
}

impl DetailLevel {
    const ALL: [DetailLevel; 3] = [DetailLevel::Detailed, DetailLevel::Local, DetailLevel::Simple];

    fn zoom(self) -> u8 {
        match self {
            DetailLevel::Detailed => 18,
            DetailLevel::Local => 16,
            DetailLevel::Simple => 14,
        }
    }

    fn name(self) -> &'static str {
        match self {
            DetailLevel::Detailed => "detailed",
            DetailLevel::Local => "local",
            DetailLevel::Simple => "simple",
        }
    }

    fn query(self, latitude: f64, longitude: f64) -> Vec<(&'static str, String)> {
        let mut query = vec![
            ("format", "json".to_string()),
            ("lat", latitude.to_string()),
            ("lon", longitude.to_string()),
            ("zoom", self.zoom().to_string()),
        ];
        match self {
            DetailLevel::Detailed => {
                query.push(("addressdetails", "1".to_string()));
                query.push(("namedetails", "1".to_string()));
            }
            DetailLevel::Local => query.push(("addressdetails", "1".to_string())),
            DetailLevel::Simple => {}
        }
        query
    }
}

/// A human-readable place description for a coordinate pair.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ResolvedAddress {
    pub text: String,
    /// False only while the transient placeholder is displayed. A coordinate
    /// fallback still counts as valid.
    pub valid: bool,
}

impl ResolvedAddress {
    /// Transient placeholder shown while resolution is in flight.
    pub fn pending() -> Self {
        Self {
            text: "Getting precise location...".to_string(),
            valid: false,
        }
    }

    pub fn resolved(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            valid: true,
        }
    }

    /// Coordinate fallback installed when no provider returned a usable
    /// address.
    pub fn waiting_fallback(latitude: f64, longitude: f64) -> Self {
        Self::resolved(format!(
            "Waiting for address… ({latitude:.4}, {longitude:.4})"
        ))
    }

    /// Coordinate fallback installed when resolution failed before the
    /// providers could be consulted.
    pub fn near_fallback(latitude: f64, longitude: f64) -> Self {
        Self::resolved(format!("Near {latitude:.4}, {longitude:.4}"))
    }
}

/// Wire shape of a Nominatim `reverse` response.
#[derive(Debug, Clone, Default, Deserialize)]
struct ReverseReply {
    display_name: Option<String>,
    address: Option<AddressParts>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct AddressParts {
    road: Option<String>,
    neighbourhood: Option<String>,
    suburb: Option<String>,
    village: Option<String>,
    town: Option<String>,
    city: Option<String>,
    county: Option<String>,
    state: Option<String>,
    country: Option<String>,
}

#[derive(Error, Debug)]
pub enum GeocodeError {
    #[error("coordinates are not finite")]
    InvalidCoordinates,

    #[error("geocoding request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("geocoding endpoint returned status {0}")]
    Status(u16),
}

/// Turns coordinates into a human-readable place string.
///
/// Implementations never fail visibly: exhaustion and transport errors
/// degrade to a coordinate-derived label.
#[async_trait]
pub trait AddressResolver: Send + Sync {
    async fn resolve(&self, latitude: f64, longitude: f64) -> ResolvedAddress;
}

/// Reverse geocoder speaking the Nominatim `reverse` API.
///
/// Every lookup issues the three detail levels concurrently, waits for all of
/// them to settle, and picks the first usable result in detailed, local,
/// simple order.
pub struct NominatimResolver {
    http: reqwest::Client,
    base_url: String,
}

#[bon]
impl NominatimResolver {
    /// Constructs a resolver via a builder pattern.
    ///
    /// # Builder Arguments
    ///
    /// * `base_url: String` - (Default: [`DEFAULT_BASE_URL`]) Root of the
    ///   Nominatim instance to query.
    ///
    /// # Errors
    ///
    /// Fails only if the underlying HTTP client cannot be constructed.
    #[builder]
    pub fn new(
        #[builder(default = DEFAULT_BASE_URL.to_string())] base_url: String,
    ) -> Result<Self, GeocodeError> {
        let http = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self { http, base_url })
    }

    async fn fetch(
        &self,
        level: DetailLevel,
        latitude: f64,
        longitude: f64,
    ) -> Result<Option<String>, GeocodeError> {
        let url = format!("{}/reverse", self.base_url);
        let response = self
            .http
            .get(&url)
            .query(&level.query(latitude, longitude))
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(GeocodeError::Status(status.as_u16()));
        }
        let reply: ReverseReply = response.json().await?;
        Ok(match level {
            DetailLevel::Detailed => detailed_label(&reply),
            DetailLevel::Local | DetailLevel::Simple => reply.display_name,
        })
    }

    async fn try_resolve(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<Option<String>, GeocodeError> {
        if !latitude.is_finite() || !longitude.is_finite() {
            return Err(GeocodeError::InvalidCoordinates);
        }
        let (detailed, local, simple) = tokio::join!(
            self.fetch(DetailLevel::Detailed, latitude, longitude),
            self.fetch(DetailLevel::Local, latitude, longitude),
            self.fetch(DetailLevel::Simple, latitude, longitude),
        );
        Ok(select_address([detailed, local, simple]))
    }
}

#[async_trait]
impl AddressResolver for NominatimResolver {
    async fn resolve(&self, latitude: f64, longitude: f64) -> ResolvedAddress {
        match self.try_resolve(latitude, longitude).await {
            Ok(Some(text)) => ResolvedAddress::resolved(text),
            Ok(None) => {
                debug!(latitude, longitude, "no provider returned a usable address");
                ResolvedAddress::waiting_fallback(latitude, longitude)
            }
            Err(err) => {
                warn!(%err, "address resolution failed before completing");
                ResolvedAddress::near_fallback(latitude, longitude)
            }
        }
    }
}

/// Short label assembled from the structured address breakdown.
///
/// Parts are collected in a fixed order and joined by commas; with fewer than
/// two parts the provider's display name is used instead. A reply without a
/// display name counts as not found.
fn detailed_label(reply: &ReverseReply) -> Option<String> {
    let display_name = reply.display_name.as_ref()?;
    let Some(address) = &reply.address else {
        return Some(display_name.clone());
    };

    let candidates = [
        address.road.as_deref(),
        address.neighbourhood.as_deref(),
        address.suburb.as_deref(),
        address.village.as_deref(),
        address.town.as_deref(),
        address.city.as_deref(),
        address
            .county
            .as_deref()
            .filter(|county| address.city.as_deref() != Some(*county)),
        address.state.as_deref(),
        address.country.as_deref(),
    ];
    let parts: Vec<&str> = candidates.into_iter().flatten().collect();

    if parts.len() >= 2 {
        Some(parts.join(", "))
    } else {
        Some(display_name.clone())
    }
}

/// Pick the first usable result in priority order after all three requests
/// settled. Failed sources are logged and skipped.
fn select_address(results: [Result<Option<String>, GeocodeError>; 3]) -> Option<String> {
    for (level, result) in DetailLevel::ALL.into_iter().zip(results) {
        match result {
            Ok(Some(text)) if !text.is_empty() => return Some(text),
            Ok(_) => debug!(level = level.name(), "provider returned no address"),
            Err(err) => debug!(level = level.name(), %err, "provider lookup failed"),
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reply(display_name: Option<&str>, address: Option<AddressParts>) -> ReverseReply {
        ReverseReply {
            display_name: display_name.map(str::to_string),
            address,
        }
    }

    #[test]
    fn detail_levels_vary_only_by_zoom_and_breakdown_flags() {
        let detailed = DetailLevel::Detailed.query(40.0, 14.0);
        assert!(detailed.contains(&("zoom", "18".to_string())));
        assert!(detailed.contains(&("addressdetails", "1".to_string())));
        assert!(detailed.contains(&("namedetails", "1".to_string())));

        let local = DetailLevel::Local.query(40.0, 14.0);
        assert!(local.contains(&("zoom", "16".to_string())));
        assert!(local.contains(&("addressdetails", "1".to_string())));
        assert!(!local.iter().any(|(key, _)| *key == "namedetails"));

        let simple = DetailLevel::Simple.query(40.0, 14.0);
        assert!(simple.contains(&("zoom", "14".to_string())));
        assert!(!simple.iter().any(|(key, _)| *key == "addressdetails"));
    }

    #[test]
    fn detailed_label_joins_parts_in_fixed_order() {
        let address = AddressParts {
            road: Some("Via Vesuvio".to_string()),
            suburb: Some("Massa di Somma".to_string()),
            city: Some("Naples".to_string()),
            state: Some("Campania".to_string()),
            country: Some("Italy".to_string()),
            ..AddressParts::default()
        };
        let label = detailed_label(&reply(Some("unused display name"), Some(address)));
        assert_eq!(
            label.as_deref(),
            Some("Via Vesuvio, Massa di Somma, Naples, Campania, Italy")
        );
    }

    #[test]
    fn detailed_label_skips_county_matching_the_city() {
        let address = AddressParts {
            city: Some("Amsterdam".to_string()),
            county: Some("Amsterdam".to_string()),
            country: Some("Netherlands".to_string()),
            ..AddressParts::default()
        };
        let label = detailed_label(&reply(Some("display"), Some(address)));
        assert_eq!(label.as_deref(), Some("Amsterdam, Netherlands"));
    }

    #[test]
    fn detailed_label_falls_back_to_display_name_below_two_parts() {
        let address = AddressParts {
            country: Some("Italy".to_string()),
            ..AddressParts::default()
        };
        let label = detailed_label(&reply(Some("Somewhere in Italy"), Some(address)));
        assert_eq!(label.as_deref(), Some("Somewhere in Italy"));

        let no_breakdown = detailed_label(&reply(Some("Somewhere in Italy"), None));
        assert_eq!(no_breakdown.as_deref(), Some("Somewhere in Italy"));
    }

    #[test]
    fn detailed_label_treats_a_missing_display_name_as_not_found() {
        assert_eq!(detailed_label(&reply(None, None)), None);
    }

    #[test]
    fn selection_prefers_the_detailed_result() {
        let picked = select_address([
            Ok(Some("Via Vesuvio, Naples".to_string())),
            Ok(Some("Naples, Italy".to_string())),
            Ok(Some("Italy".to_string())),
        ]);
        assert_eq!(picked.as_deref(), Some("Via Vesuvio, Naples"));
    }

    #[test]
    fn selection_falls_through_failed_and_empty_sources() {
        let picked = select_address([
            Err(GeocodeError::Status(500)),
            Ok(Some("Naples, Italy".to_string())),
            Ok(Some("Italy".to_string())),
        ]);
        assert_eq!(picked.as_deref(), Some("Naples, Italy"));

        let empty_then_simple = select_address([
            Ok(None),
            Ok(Some(String::new())),
            Ok(Some("Italy".to_string())),
        ]);
        assert_eq!(empty_then_simple.as_deref(), Some("Italy"));
    }

    #[test]
    fn selection_yields_nothing_when_every_source_is_unusable() {
        let picked = select_address([
            Err(GeocodeError::Status(503)),
            Ok(None),
            Err(GeocodeError::Status(429)),
        ]);
        assert_eq!(picked, None);
    }

    #[test]
    fn fallback_labels_use_four_decimal_places_and_are_valid() {
        let waiting = ResolvedAddress::waiting_fallback(40.82088, 14.42281);
        assert_eq!(waiting.text, "Waiting for address… (40.8209, 14.4228)");
        assert!(waiting.valid);

        let near = ResolvedAddress::near_fallback(40.82088, 14.42281);
        assert_eq!(near.text, "Near 40.8209, 14.4228");
        assert!(near.valid);
    }

    #[test]
    fn the_pending_placeholder_is_not_valid() {
        assert!(!ResolvedAddress::pending().valid);
    }

    #[tokio::test]
    async fn non_finite_coordinates_degrade_to_the_near_fallback() {
        let resolver = NominatimResolver::builder().build().unwrap();
        let address = resolver.resolve(f64::NAN, 14.42281).await;
        assert!(address.valid);
        assert!(address.text.starts_with("Near "));
    }
}
