//! Google Places provider: place search, place details, geocoding and time
//! zone lookup over the Maps web services.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{info, warn};

use super::resolver::PlaceSource;
use super::types::{LatLng, LocationError, RawCandidate, RawDetail, SearchMode};

pub const DEFAULT_BASE_URL: &str = "https://maps.googleapis.com/maps/api";
pub const DEFAULT_USER_AGENT: &str = "Geomatch/0.3 (location-resolver)";
const DEFAULT_RADIUS_M: u32 = 25_000;
const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Connection settings for [`GooglePlacesClient`].
#[derive(Debug, Clone)]
pub struct PlacesConfig {
    /// Maps web service key. Searches and details need one.
    pub api_key: Option<String>,
    pub base_url: String,
    /// Search radius around the bias coordinate, in metres.
    pub radius_m: u32,
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for PlacesConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            radius_m: DEFAULT_RADIUS_M,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl PlacesConfig {
    pub fn with_api_key(api_key: impl Into<String>) -> Self {
        Self { api_key: Some(api_key.into()), ..Self::default() }
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

// ─── Response envelopes ──────────────────────────────────────────

/// Status-tagged wrapper the Maps services put around every payload.
#[derive(Deserialize, Debug)]
struct Envelope<T> {
    status: String,
    #[serde(default = "Option::default")]
    results: Option<T>,
    #[serde(default = "Option::default")]
    result: Option<T>,
    #[serde(default)]
    error_message: Option<String>,
}

/// `Ok(None)` for ZERO_RESULTS, the payload for OK, an error otherwise.
fn unwrap_envelope<T>(envelope: Envelope<T>, endpoint: &str) -> Result<Option<T>, LocationError> {
    match envelope.status.as_str() {
        "OK" => envelope
            .results
            .or(envelope.result)
            .map(Some)
            .ok_or_else(|| LocationError::InvalidResponse(format!("{endpoint}: OK without payload"))),
        "ZERO_RESULTS" => Ok(None),
        other => Err(LocationError::Status {
            endpoint: endpoint.to_string(),
            status: match envelope.error_message {
                Some(msg) => format!("{other} ({msg})"),
                None => other.to_string(),
            },
        }),
    }
}

#[derive(Deserialize, Debug)]
struct GeocodeResult {
    geometry: super::types::Geometry,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct TimezoneResponse {
    status: String,
    #[serde(default)]
    time_zone_id: Option<String>,
}

/// Drop characters the search endpoints cannot take verbatim.
fn ascii_only(query: &str) -> String {
    query.chars().filter(char::is_ascii).collect()
}

// ─── Client ──────────────────────────────────────────────────────

/// Blocking client for the Maps web services.
pub struct GooglePlacesClient {
    agent: ureq::Agent,
    config: PlacesConfig,
}

impl GooglePlacesClient {
    pub fn new(config: PlacesConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build();
        Self { agent, config }
    }

    pub fn config(&self) -> &PlacesConfig {
        &self.config
    }

    fn api_key(&self, what: &'static str) -> Result<&str, LocationError> {
        self.config.api_key.as_deref().ok_or(LocationError::MissingApiKey(what))
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}/json", self.config.base_url, path)
    }

    /// Query parameters for a place search.
    fn search_params(&self, query: &str, bias: Option<LatLng>, mode: SearchMode, key: &str) -> Vec<(&'static str, String)> {
        let text_key = match mode {
            SearchMode::Nearby => "keyword",
            SearchMode::Text => "query",
        };
        let mut params = vec![("key", key.to_string()), (text_key, ascii_only(query))];
        if let Some(lat_lng) = bias {
            params.push(("location", lat_lng.to_string()));
            params.push(("radius", self.config.radius_m.to_string()));
        }
        params
    }

    fn get_json<T: DeserializeOwned>(&self, path: &str, params: &[(&str, String)]) -> Result<T, LocationError> {
        let mut request = self.agent.get(&self.url(path));
        for (name, value) in params {
            request = request.query(name, value);
        }
        let response = request.call().map_err(|e| LocationError::Network(e.to_string()))?;
        response
            .into_json()
            .map_err(|e| LocationError::InvalidResponse(e.to_string()))
    }

    /// Search for places. Nearby search needs a location, so without a bias
    /// it is sent as a text search. Blank queries are never sent.
    pub fn try_search(
        &self,
        query: &str,
        bias: Option<LatLng>,
        mode: SearchMode,
    ) -> Result<Vec<RawCandidate>, LocationError> {
        if ascii_only(query).trim().is_empty() {
            return Ok(Vec::new());
        }
        let key = self.api_key("place search")?;
        let mode = mode.for_bias(bias);
        let endpoint = format!("place/{}", mode.endpoint());
        let envelope: Envelope<Vec<RawCandidate>> =
            self.get_json(&endpoint, &self.search_params(query, bias, mode, key))?;
        let results = unwrap_envelope(envelope, &endpoint)?;
        if results.is_none() {
            info!(%mode, query, bias = ?bias, "no place search results");
        }
        Ok(results.unwrap_or_default())
    }

    pub fn try_details(&self, place_id: &str) -> Result<Option<RawDetail>, LocationError> {
        let key = self.api_key("place details")?;
        let params = [("placeid", place_id.to_string()), ("key", key.to_string())];
        let envelope: Envelope<serde_json::Value> = self.get_json("place/details", &params)?;
        match unwrap_envelope(envelope, "place/details")? {
            Some(payload) => RawDetail::from_payload(payload).map(Some),
            None => {
                info!(place_id, "no place details result");
                Ok(None)
            }
        }
    }

    /// Geocode free text. Works without a key, at a lower rate limit.
    pub fn try_geocode(&self, address: &str) -> Result<Option<LatLng>, LocationError> {
        let mut params = vec![("address", address.to_string())];
        match self.config.api_key.as_deref() {
            Some(key) => params.push(("key", key.to_string())),
            None => warn!("no API key for geocoding; requests are rate limited by IP"),
        }
        let envelope: Envelope<Vec<GeocodeResult>> = self.get_json("geocode", &params)?;
        let results = unwrap_envelope(envelope, "geocode")?.unwrap_or_default();
        if results.is_empty() {
            info!(address, "no geocode results");
        }
        Ok(results.first().map(|r| r.geometry.location))
    }

    pub fn try_timezone(&self, lat_lng: LatLng) -> Result<Option<String>, LocationError> {
        let mut params = vec![("location", lat_lng.to_string()), ("timestamp", "0".to_string())];
        if let Some(key) = self.config.api_key.as_deref() {
            params.push(("key", key.to_string()));
        }
        let response: TimezoneResponse = self.get_json("timezone", &params)?;
        match response.status.as_str() {
            "OK" => Ok(response.time_zone_id),
            "ZERO_RESULTS" => Ok(None),
            other => Err(LocationError::Status { endpoint: "timezone".into(), status: other.to_string() }),
        }
    }
}

impl PlaceSource for GooglePlacesClient {
    fn search_places(&self, query: &str, bias: Option<LatLng>, mode: SearchMode) -> Vec<RawCandidate> {
        self.try_search(query, bias, mode).unwrap_or_else(|e| {
            warn!(%mode, query, error = %e, "place search failed");
            Vec::new()
        })
    }

    fn place_details(&self, place_id: &str) -> Option<RawDetail> {
        self.try_details(place_id).unwrap_or_else(|e| {
            warn!(place_id, error = %e, "place details failed");
            None
        })
    }

    fn geocode(&self, address: &str) -> Option<LatLng> {
        self.try_geocode(address).unwrap_or_else(|e| {
            warn!(address, error = %e, "geocoding failed");
            None
        })
    }

    fn timezone_id(&self, lat_lng: LatLng) -> Option<String> {
        self.try_timezone(lat_lng).unwrap_or_else(|e| {
            warn!(%lat_lng, error = %e, "time zone lookup failed");
            None
        })
    }
}
