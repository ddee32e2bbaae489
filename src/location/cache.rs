//! File-based provider response cache at ~/.geomatch/places_cache.json.
//!
//! TTL: 30 days. Keys: `<mode>:<bias>:<query>`, `details:<place_id>`,
//! `geocode:<address>`, `timezone:<lat>,<lng>`. Geocode and search keys are
//! case-insensitive. Only successful responses (including "nothing found")
//! are stored; failures are retried next time.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};

use super::providers::GooglePlacesClient;
use super::resolver::PlaceSource;
use super::types::{LatLng, LocationError, RawCandidate, RawDetail, SearchMode};

const CACHE_TTL_MS: i64 = 30 * 24 * 3600 * 1000; // 30 days in ms

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CachedPayload {
    Search { results: Vec<RawCandidate> },
    Details { detail: Option<RawDetail> },
    Geocode { lat_lng: Option<LatLng> },
    Timezone { tz: Option<String> },
}

#[derive(Serialize, Deserialize, Clone)]
struct CacheEntry {
    payload: CachedPayload,
    timestamp: i64,
}

/// The response cache.
pub struct PlaceCache {
    path: Option<PathBuf>,
    entries: HashMap<String, CacheEntry>,
}

impl PlaceCache {
    /// Load cache from the default location (~/.geomatch/places_cache.json).
    pub fn load() -> Self {
        Self::load_from(Self::default_path())
    }

    /// Load cache from a specific path.
    pub fn load_from(path: PathBuf) -> Self {
        let entries = Self::read_file(&path).unwrap_or_default();
        Self { path: Some(path), entries }
    }

    /// A cache that lives only as long as the process.
    pub fn in_memory() -> Self {
        Self { path: None, entries: HashMap::new() }
    }

    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".geomatch")
            .join("places_cache.json")
    }

    fn read_file(path: &Path) -> Option<HashMap<String, CacheEntry>> {
        let data = fs::read_to_string(path).ok()?;
        serde_json::from_str(&data).ok()
    }

    /// Search results depend on the coordinate they were biased towards,
    /// and on the mode actually sent for that bias.
    pub fn search_key(mode: SearchMode, query: &str, bias: Option<LatLng>) -> String {
        let endpoint = mode.for_bias(bias).endpoint();
        let bias = bias.map_or_else(|| "none".to_string(), |lat_lng| lat_lng.to_string());
        format!("{}:{}:{}", endpoint, bias, query.to_lowercase())
    }

    pub fn details_key(place_id: &str) -> String {
        format!("details:{place_id}")
    }

    pub fn geocode_key(address: &str) -> String {
        format!("geocode:{}", address.to_lowercase())
    }

    pub fn timezone_key(lat_lng: LatLng) -> String {
        format!("timezone:{lat_lng}")
    }

    /// Look up a payload. Returns None if missing or expired.
    pub fn get(&self, key: &str) -> Option<CachedPayload> {
        let entry = self.entries.get(key)?;
        let now = chrono::Utc::now().timestamp_millis();
        if now - entry.timestamp > CACHE_TTL_MS {
            return None; // expired
        }
        Some(entry.payload.clone())
    }

    /// Store a payload and persist to disk.
    pub fn put(&mut self, key: String, payload: CachedPayload) -> Result<(), LocationError> {
        let entry = CacheEntry { payload, timestamp: chrono::Utc::now().timestamp_millis() };
        self.entries.insert(key, entry);
        self.persist()
    }

    fn persist(&self) -> Result<(), LocationError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&self.entries)
            .map_err(|e| LocationError::InvalidResponse(e.to_string()))?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ─── Caching source ──────────────────────────────────────────────

/// [`GooglePlacesClient`] behind a [`PlaceCache`].
pub struct CachedPlaceSource {
    client: GooglePlacesClient,
    cache: Mutex<PlaceCache>,
}

impl CachedPlaceSource {
    pub fn new(client: GooglePlacesClient, cache: PlaceCache) -> Self {
        Self { client, cache: Mutex::new(cache) }
    }

    fn lookup(&self, key: &str) -> Option<CachedPayload> {
        let cache = self.cache.lock().ok()?;
        let hit = cache.get(key);
        if hit.is_some() {
            debug!(key, "cache hit");
        }
        hit
    }

    fn store(&self, key: String, payload: CachedPayload) {
        let Ok(mut cache) = self.cache.lock() else {
            return;
        };
        if let Err(e) = cache.put(key, payload) {
            warn!(error = %e, "could not persist places cache");
        }
    }
}

impl PlaceSource for CachedPlaceSource {
    fn search_places(&self, query: &str, bias: Option<LatLng>, mode: SearchMode) -> Vec<RawCandidate> {
        let key = PlaceCache::search_key(mode, query, bias);
        if let Some(CachedPayload::Search { results }) = self.lookup(&key) {
            return results;
        }
        match self.client.try_search(query, bias, mode) {
            Ok(results) => {
                self.store(key, CachedPayload::Search { results: results.clone() });
                results
            }
            Err(e) => {
                warn!(%mode, query, error = %e, "place search failed");
                Vec::new()
            }
        }
    }

    fn place_details(&self, place_id: &str) -> Option<RawDetail> {
        let key = PlaceCache::details_key(place_id);
        if let Some(CachedPayload::Details { detail }) = self.lookup(&key) {
            return detail;
        }
        match self.client.try_details(place_id) {
            Ok(detail) => {
                self.store(key, CachedPayload::Details { detail: detail.clone() });
                detail
            }
            Err(e) => {
                warn!(place_id, error = %e, "place details failed");
                None
            }
        }
    }

    fn geocode(&self, address: &str) -> Option<LatLng> {
        let key = PlaceCache::geocode_key(address);
        if let Some(CachedPayload::Geocode { lat_lng }) = self.lookup(&key) {
            return lat_lng;
        }
        match self.client.try_geocode(address) {
            Ok(lat_lng) => {
                self.store(key, CachedPayload::Geocode { lat_lng });
                lat_lng
            }
            Err(e) => {
                warn!(address, error = %e, "geocoding failed");
                None
            }
        }
    }

    fn timezone_id(&self, lat_lng: LatLng) -> Option<String> {
        let key = PlaceCache::timezone_key(lat_lng);
        if let Some(CachedPayload::Timezone { tz }) = self.lookup(&key) {
            return tz;
        }
        match self.client.try_timezone(lat_lng) {
            Ok(tz) => {
                self.store(key, CachedPayload::Timezone { tz: tz.clone() });
                tz
            }
            Err(e) => {
                warn!(%lat_lng, error = %e, "time zone lookup failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::providers::PlacesConfig;
    use tempfile::TempDir;

    fn test_cache() -> (PlaceCache, TempDir) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("places_cache.json");
        (PlaceCache::load_from(path), dir)
    }

    fn lhs() -> RawCandidate {
        RawCandidate::new("lhs", "Lincoln High School", LatLng::new(40.8, -96.7), &["school"])
    }

    #[test]
    fn test_cache_put_get() {
        let (mut cache, _dir) = test_cache();
        let key = PlaceCache::search_key(SearchMode::Nearby, "Lincoln High School", Some(LatLng::new(40.8, -96.7)));
        cache.put(key.clone(), CachedPayload::Search { results: vec![lhs()] }).unwrap();

        assert_eq!(cache.get(&key), Some(CachedPayload::Search { results: vec![lhs()] }));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_search_keys_case_insensitive_and_per_mode() {
        let bias = Some(LatLng::new(40.8, -96.7));
        assert_eq!(
            PlaceCache::search_key(SearchMode::Text, "Lincoln HS", bias),
            PlaceCache::search_key(SearchMode::Text, "LINCOLN hs", bias)
        );
        assert_ne!(
            PlaceCache::search_key(SearchMode::Text, "Lincoln", bias),
            PlaceCache::search_key(SearchMode::Nearby, "Lincoln", bias)
        );
    }

    #[test]
    fn test_search_keys_per_bias() {
        let san_jose = Some(LatLng::new(37.33, -121.89));
        let portland = Some(LatLng::new(45.5, -122.6));
        assert_ne!(
            PlaceCache::search_key(SearchMode::Nearby, "Gym", san_jose),
            PlaceCache::search_key(SearchMode::Nearby, "Gym", portland)
        );
        assert_ne!(
            PlaceCache::search_key(SearchMode::Nearby, "Gym", san_jose),
            PlaceCache::search_key(SearchMode::Nearby, "Gym", None)
        );
        // Unbiased nearby searches go out as text searches and share their entry.
        assert_eq!(
            PlaceCache::search_key(SearchMode::Nearby, "Gym", None),
            PlaceCache::search_key(SearchMode::Text, "Gym", None)
        );
        assert_eq!(PlaceCache::search_key(SearchMode::Nearby, "Gym", None), "textsearch:none:gym");
    }

    #[test]
    fn test_cached_source_keeps_biases_apart() {
        let san_jose = LatLng::new(37.33, -121.89);
        let portland = LatLng::new(45.5, -122.6);
        let pdx_gym = RawCandidate::new("pdx-gym", "Gym", portland, &["gym", "point_of_interest"]);

        let mut cache = PlaceCache::in_memory();
        cache
            .put(PlaceCache::search_key(SearchMode::Nearby, "Gym", Some(portland)), CachedPayload::Search { results: vec![pdx_gym.clone()] })
            .unwrap();
        cache
            .put(PlaceCache::search_key(SearchMode::Nearby, "Gym", None), CachedPayload::Search { results: vec![pdx_gym.clone()] })
            .unwrap();

        // No API key: a cache miss comes back empty.
        let source = CachedPlaceSource::new(GooglePlacesClient::new(PlacesConfig::default()), cache);
        assert!(source.search_places("Gym", Some(san_jose), SearchMode::Nearby).is_empty());
        assert_eq!(source.search_places("Gym", Some(portland), SearchMode::Nearby), vec![pdx_gym]);
    }

    #[test]
    fn test_cache_miss() {
        let (cache, _dir) = test_cache();
        assert!(cache.get("details:nothing").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_cache_persistence() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("places_cache.json");

        {
            let mut cache = PlaceCache::load_from(path.clone());
            cache
                .put(PlaceCache::geocode_key("Lincoln, NE"), CachedPayload::Geocode { lat_lng: Some(LatLng::new(40.8, -96.7)) })
                .unwrap();
            cache.put(PlaceCache::details_key("gone"), CachedPayload::Details { detail: None }).unwrap();
        }

        let cache = PlaceCache::load_from(path);
        assert_eq!(
            cache.get(&PlaceCache::geocode_key("lincoln, ne")),
            Some(CachedPayload::Geocode { lat_lng: Some(LatLng::new(40.8, -96.7)) })
        );
        assert_eq!(
            cache.get(&PlaceCache::details_key("gone")),
            Some(CachedPayload::Details { detail: None })
        );
    }

    #[test]
    fn test_expired_entries_ignored() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("places_cache.json");
        let json = r#"{
            "timezone:1,2": {"payload": {"kind": "timezone", "tz": "UTC"}, "timestamp": 0}
        }"#;
        fs::write(&path, json).unwrap();

        let cache = PlaceCache::load_from(path);
        assert_eq!(cache.len(), 1);
        assert!(cache.get("timezone:1,2").is_none());
    }

    #[test]
    fn test_corrupt_file_starts_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("places_cache.json");
        fs::write(&path, "not json").unwrap();
        assert!(PlaceCache::load_from(path).is_empty());
    }

    #[test]
    fn test_cached_source_serves_hits_without_network() {
        let mut cache = PlaceCache::in_memory();
        cache
            .put(
                PlaceCache::search_key(SearchMode::Nearby, "Lincoln High School", Some(LatLng::new(1.0, 2.0))),
                CachedPayload::Search { results: vec![lhs()] },
            )
            .unwrap();
        cache.put(PlaceCache::details_key("lhs"), CachedPayload::Details { detail: None }).unwrap();
        cache
            .put(PlaceCache::geocode_key("Lincoln, NE"), CachedPayload::Geocode { lat_lng: Some(LatLng::new(1.0, 2.0)) })
            .unwrap();
        cache
            .put(PlaceCache::timezone_key(LatLng::new(1.0, 2.0)), CachedPayload::Timezone { tz: Some("America/Chicago".into()) })
            .unwrap();

        // No API key: anything reaching the client would come back empty.
        let source = CachedPlaceSource::new(GooglePlacesClient::new(PlacesConfig::default()), cache);

        let bias = Some(LatLng::new(1.0, 2.0));
        assert_eq!(source.search_places("Lincoln High School", bias, SearchMode::Nearby), vec![lhs()]);
        assert!(source.place_details("lhs").is_none());
        assert_eq!(source.geocode("Lincoln, NE"), Some(LatLng::new(1.0, 2.0)));
        assert_eq!(source.timezone_id(LatLng::new(1.0, 2.0)).as_deref(), Some("America/Chicago"));
    }

    #[test]
    fn test_failures_are_not_cached() {
        let source = CachedPlaceSource::new(GooglePlacesClient::new(PlacesConfig::default()), PlaceCache::in_memory());
        assert!(source.search_places("Lincoln", None, SearchMode::Text).is_empty());
        assert!(source.cache.lock().unwrap().is_empty());
    }
}
