//! Core types for the location subsystem.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// A latitude/longitude pair as returned by the places provider.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

impl fmt::Display for LatLng {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.lat, self.lng)
    }
}

/// Which search semantics to ask the provider for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    /// Keyword search around the bias coordinate.
    Nearby,
    /// Free-text search, optionally biased towards a coordinate.
    Text,
}

impl SearchMode {
    /// Endpoint name used by the provider and as a cache key prefix.
    pub fn endpoint(self) -> &'static str {
        match self {
            Self::Nearby => "nearbysearch",
            Self::Text => "textsearch",
        }
    }

    /// The mode actually sent for `bias`: nearby search needs a location.
    pub fn for_bias(self, bias: Option<LatLng>) -> Self {
        if bias.is_none() {
            Self::Text
        } else {
            self
        }
    }
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.endpoint())
    }
}

// ─── Known facts ─────────────────────────────────────────────────

/// What is already known about an event before resolution.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EventFacts {
    /// Identifier used in log lines (e.g. "2016casj").
    pub key: String,
    pub venue: Option<String>,
    /// Multi-line venue address, lines separated by `\n`.
    pub venue_address: Option<String>,
    pub city: Option<String>,
    pub state_prov: Option<String>,
    pub country: Option<String>,
    pub postal_code: Option<String>,
    /// Freeform "City, State, Country" string.
    pub location: Option<String>,
}

/// What is already known about a team before resolution.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TeamFacts {
    pub key: String,
    /// Full team name, usually sponsors and school joined by `&` or `/`.
    pub name: Option<String>,
    pub location: Option<String>,
}

/// Returns the trimmed value when it holds any non-whitespace text.
pub(crate) fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

impl EventFacts {
    pub fn has_location_text(&self) -> bool {
        non_blank(&self.location).is_some()
    }
}

impl TeamFacts {
    /// The trimmed location text, if any.
    pub fn location_text(&self) -> Option<&str> {
        non_blank(&self.location)
    }
}

// ─── Provider payloads ───────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    pub location: LatLng,
}

/// A coarse place search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawCandidate {
    pub place_id: String,
    #[serde(default)]
    pub name: String,
    pub geometry: Geometry,
    #[serde(default)]
    pub types: Vec<String>,
}

impl RawCandidate {
    pub fn new(place_id: &str, name: &str, lat_lng: LatLng, types: &[&str]) -> Self {
        Self {
            place_id: place_id.to_string(),
            name: name.to_string(),
            geometry: Geometry { location: lat_lng },
            types: types.iter().map(|t| t.to_string()).collect(),
        }
    }
}

/// One tagged component of a detailed address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddressComponent {
    #[serde(default)]
    pub long_name: String,
    #[serde(default)]
    pub short_name: String,
    #[serde(default)]
    pub types: Vec<String>,
}

impl AddressComponent {
    pub fn new(long_name: &str, short_name: &str, types: &[&str]) -> Self {
        Self {
            long_name: long_name.to_string(),
            short_name: short_name.to_string(),
            types: types.iter().map(|t| t.to_string()).collect(),
        }
    }

    fn has_type(&self, tag: &str) -> bool {
        self.types.iter().any(|t| t == tag)
    }
}

/// Place details keyed by place id.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RawDetail {
    #[serde(default)]
    pub formatted_address: Option<String>,
    #[serde(default)]
    pub address_components: Vec<AddressComponent>,
    /// The untouched provider payload.
    #[serde(default)]
    pub payload: serde_json::Value,
}

#[derive(Deserialize)]
struct DetailFields {
    #[serde(default)]
    formatted_address: Option<String>,
    #[serde(default)]
    address_components: Vec<AddressComponent>,
}

impl RawDetail {
    /// Extract the typed fields from a raw details `result` object, keeping
    /// the whole object alongside.
    pub fn from_payload(payload: serde_json::Value) -> Result<Self, LocationError> {
        let fields: DetailFields = serde_json::from_value(payload.clone())
            .map_err(|e| LocationError::InvalidResponse(e.to_string()))?;
        Ok(Self {
            formatted_address: fields.formatted_address,
            address_components: fields.address_components,
            payload,
        })
    }
}

// ─── Normalized output ───────────────────────────────────────────

/// A search result merged with its place details.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NormalizedLocation {
    pub place_id: String,
    pub name: String,
    pub lat_lng: Option<LatLng>,
    #[serde(default)]
    pub types: Vec<String>,
    pub formatted_address: Option<String>,
    pub street_number: Option<String>,
    pub street: Option<String>,
    pub city: Option<String>,
    pub state_prov: Option<String>,
    pub state_prov_short: Option<String>,
    pub country: Option<String>,
    pub country_short: Option<String>,
    pub postal_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub place_details: Option<serde_json::Value>,
}

impl NormalizedLocation {
    /// Build from a search result, enriching with details when available.
    ///
    /// Each address component fills the first field its tags match, checked
    /// in the order street number, route, locality, state, country, postal
    /// code. Without a locality the state stands in for the city.
    pub fn from_parts(candidate: &RawCandidate, detail: Option<RawDetail>) -> Self {
        let mut location = Self {
            place_id: candidate.place_id.clone(),
            name: candidate.name.clone(),
            lat_lng: Some(candidate.geometry.location),
            types: candidate.types.clone(),
            ..Self::default()
        };

        let Some(detail) = detail else {
            return location;
        };

        let mut has_city = false;
        for component in &detail.address_components {
            if component.has_type("street_number") {
                location.street_number = Some(component.long_name.clone());
            } else if component.has_type("route") {
                location.street = Some(component.long_name.clone());
            } else if component.has_type("locality") {
                location.city = Some(component.long_name.clone());
                has_city = true;
            } else if component.has_type("administrative_area_level_1") {
                location.state_prov = Some(component.long_name.clone());
                location.state_prov_short = Some(component.short_name.clone());
            } else if component.has_type("country") {
                location.country = Some(component.long_name.clone());
                location.country_short = Some(component.short_name.clone());
            } else if component.has_type("postal_code") {
                location.postal_code = Some(component.long_name.clone());
            }
        }

        if !has_city && location.state_prov.is_some() {
            location.city = location.state_prov.clone();
        }

        location.formatted_address = detail.formatted_address;
        location.place_details = Some(detail.payload);
        location
    }

    pub fn has_type(&self, tag: &str) -> bool {
        self.types.iter().any(|t| t == tag)
    }

    pub fn has_any_type(&self, tags: &[&str]) -> bool {
        tags.iter().any(|tag| self.has_type(tag))
    }
}

/// A candidate with the score it earned and the query that surfaced it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredCandidate {
    pub location: NormalizedLocation,
    pub score: f64,
    pub query: String,
}

/// Final answer of one resolution run.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Resolution {
    pub location: Option<NormalizedLocation>,
    pub score: f64,
    /// The query whose candidate won, if any.
    pub query: Option<String>,
}

impl Resolution {
    /// The zero-score result for subjects with nothing to search for.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Whether a location was found and its score meets `threshold`.
    pub fn is_accepted(&self, threshold: f64) -> bool {
        self.location.is_some() && self.score >= threshold
    }

    /// Keep the location only if the score meets `threshold`.
    pub fn accepted(self, threshold: f64) -> Option<NormalizedLocation> {
        if self.is_accepted(threshold) {
            self.location
        } else {
            None
        }
    }
}

impl From<ScoredCandidate> for Resolution {
    fn from(scored: ScoredCandidate) -> Self {
        Self {
            location: Some(scored.location),
            score: scored.score,
            query: Some(scored.query),
        }
    }
}

// ─── Errors ──────────────────────────────────────────────────────

/// Errors raised by the provider client and configuration loading.
///
/// The resolution engine never surfaces these; provider failures degrade to
/// "no data" inside [`super::resolver::PlaceSource`] implementations.
#[derive(Debug, Error)]
pub enum LocationError {
    #[error("network error: {0}")]
    Network(String),
    #[error("{endpoint} returned status {status}")]
    Status { endpoint: String, status: String },
    #[error("invalid API response: {0}")]
    InvalidResponse(String),
    #[error("no API key configured for {0}")]
    MissingApiKey(&'static str),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
