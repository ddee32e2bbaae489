//! Location resolver: query → candidates → scores → best match.
//!
//! Event flow:  queries → single-result pass (early exit on 1.0) → deferred multi-result pass
//! Team flow:   name fragments → ranked candidates per query, once per search mode → better mode wins

use tracing::{debug, info, warn};

use super::queries::{coarse_address, event_queries, team_queries};
use super::scoring::{event_score, ranked_team_score, ScoringParams};
use super::types::{
    EventFacts, LatLng, NormalizedLocation, RawCandidate, RawDetail, Resolution,
    ScoredCandidate, SearchMode, TeamFacts,
};

/// The places provider as seen by the resolver.
///
/// Every method fails soft: transport errors, bad statuses and missing
/// credentials come back as "no data" and are logged by the implementation.
pub trait PlaceSource {
    /// Candidate places for `query`, in provider rank order.
    fn search_places(&self, query: &str, bias: Option<LatLng>, mode: SearchMode) -> Vec<RawCandidate>;

    /// Address details for a place id.
    fn place_details(&self, place_id: &str) -> Option<RawDetail>;

    /// Approximate coordinate for free-text address.
    fn geocode(&self, address: &str) -> Option<LatLng>;

    /// IANA time zone id at a coordinate.
    fn timezone_id(&self, _lat_lng: LatLng) -> Option<String> {
        None
    }
}

impl<S: PlaceSource + ?Sized> PlaceSource for Box<S> {
    fn search_places(&self, query: &str, bias: Option<LatLng>, mode: SearchMode) -> Vec<RawCandidate> {
        (**self).search_places(query, bias, mode)
    }

    fn place_details(&self, place_id: &str) -> Option<RawDetail> {
        (**self).place_details(place_id)
    }

    fn geocode(&self, address: &str) -> Option<LatLng> {
        (**self).geocode(address)
    }

    fn timezone_id(&self, lat_lng: LatLng) -> Option<String> {
        (**self).timezone_id(lat_lng)
    }
}

/// Keep `scored` if it beats the current best. Scores of zero never win.
fn keep_best(best: &mut Option<ScoredCandidate>, scored: ScoredCandidate) {
    let current = best.as_ref().map_or(0.0, |b| b.score);
    if scored.score > current {
        *best = Some(scored);
    }
}

fn is_perfect(score: f64) -> bool {
    score >= 1.0
}

/// Resolves event and team locations against a [`PlaceSource`].
pub struct LocationResolver<S> {
    source: S,
    params: ScoringParams,
}

impl<S: PlaceSource> LocationResolver<S> {
    pub fn new(source: S) -> Self {
        Self::with_params(source, ScoringParams::default())
    }

    pub fn with_params(source: S, params: ScoringParams) -> Self {
        Self { source, params }
    }

    pub fn params(&self) -> &ScoringParams {
        &self.params
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Merge a search result with its details.
    fn candidate(&self, raw: &RawCandidate) -> NormalizedLocation {
        let detail = self.source.place_details(&raw.place_id);
        NormalizedLocation::from_parts(raw, detail)
    }

    fn score_event_candidate(&self, facts: &EventFacts, query: &str, raw: &RawCandidate) -> ScoredCandidate {
        let location = self.candidate(raw);
        let score = event_score(facts, query, &location, &self.params);
        ScoredCandidate { location, score, query: query.to_string() }
    }

    // ─── Events ──────────────────────────────────────────────────

    /// Find the best place for an event.
    ///
    /// Queries returning exactly one candidate are scored first, in query
    /// order. Queries returning several are deferred and scored afterwards,
    /// still in query order. A perfect score ends the search at once.
    pub fn resolve_event_location(&self, facts: &EventFacts) -> Resolution {
        if !facts.has_location_text() {
            return Resolution::empty();
        }

        let queries = event_queries(facts);
        let bias = coarse_address(facts).and_then(|address| self.source.geocode(&address));

        let mut best: Option<ScoredCandidate> = None;
        let mut deferred: Vec<(&str, Vec<RawCandidate>)> = Vec::new();

        for query in &queries {
            let mut results = self.source.search_places(query, bias, SearchMode::Nearby);
            match results.len() {
                0 => {}
                1 => {
                    let raw = results.remove(0);
                    let scored = self.score_event_candidate(facts, query, &raw);
                    if is_perfect(scored.score) {
                        self.log_score("Event", &facts.key, scored.score);
                        return scored.into();
                    }
                    keep_best(&mut best, scored);
                }
                _ => deferred.push((query.as_str(), results)),
            }
        }

        for (query, results) in &deferred {
            for raw in results {
                let scored = self.score_event_candidate(facts, query, raw);
                if is_perfect(scored.score) {
                    self.log_score("Event", &facts.key, scored.score);
                    return scored.into();
                }
                keep_best(&mut best, scored);
            }
        }

        let resolution = best.map(Resolution::from).unwrap_or_default();
        self.log_score("Event", &facts.key, resolution.score);
        resolution
    }

    /// Resolve and apply the event acceptance threshold.
    pub fn update_event_location(&self, facts: &EventFacts) -> Option<NormalizedLocation> {
        let resolution = self.resolve_event_location(facts);
        self.accept("Event", &facts.key, resolution, self.params.event_accept_threshold)
    }

    // ─── Teams ───────────────────────────────────────────────────

    /// Find the best place for a team, trying nearby search and then text
    /// search and keeping the better result. A perfect nearby result skips
    /// the text search.
    pub fn resolve_team_location(&self, facts: &TeamFacts) -> Resolution {
        let Some(location) = facts.location_text() else {
            return Resolution::empty();
        };

        let queries = team_queries(facts.name.as_deref());
        let bias = self.source.geocode(location);

        let nearby = self.run_team_queries(&queries, bias, SearchMode::Nearby);
        let resolution = if is_perfect(nearby.score) {
            nearby
        } else {
            debug!(team = %facts.key, nearby_score = nearby.score, "trying text search");
            let text = self.run_team_queries(&queries, bias, SearchMode::Text);
            if text.score > nearby.score {
                text
            } else {
                nearby
            }
        };

        self.log_score("Team", &facts.key, resolution.score);
        resolution
    }

    /// Resolve a team using a single search mode.
    pub fn resolve_team_location_with_mode(&self, facts: &TeamFacts, mode: SearchMode) -> Resolution {
        let Some(location) = facts.location_text() else {
            return Resolution::empty();
        };
        let queries = team_queries(facts.name.as_deref());
        let bias = self.source.geocode(location);
        self.run_team_queries(&queries, bias, mode)
    }

    fn run_team_queries(&self, queries: &[String], bias: Option<LatLng>, mode: SearchMode) -> Resolution {
        let mut best: Option<ScoredCandidate> = None;

        for query in queries {
            let results = self.source.search_places(query, bias, mode);
            for (rank, raw) in results.iter().take(self.params.max_team_candidates).enumerate() {
                let location = self.candidate(raw);
                let score = ranked_team_score(query, &location, rank, &self.params);
                let scored = ScoredCandidate { location, score, query: query.clone() };
                if is_perfect(score) {
                    return scored.into();
                }
                keep_best(&mut best, scored);
            }
        }

        best.map(Resolution::from).unwrap_or_default()
    }

    /// Resolve and apply the team acceptance threshold.
    pub fn update_team_location(&self, facts: &TeamFacts) -> Option<NormalizedLocation> {
        let resolution = self.resolve_team_location(facts);
        self.accept("Team", &facts.key, resolution, self.params.team_accept_threshold)
    }

    // ─── Time zones ──────────────────────────────────────────────

    /// IANA time zone for a location, geocoding the text when no
    /// coordinate is known. Ids the IANA database does not know are dropped.
    pub fn timezone_id(&self, location: &str, lat_lng: Option<LatLng>) -> Option<String> {
        let lat_lng = match lat_lng {
            Some(coord) => coord,
            None => self.source.geocode(location)?,
        };
        let tz = self.source.timezone_id(lat_lng)?;
        match tz.parse::<chrono_tz::Tz>() {
            Ok(_) => Some(tz),
            Err(_) => {
                warn!(tz = %tz, %lat_lng, "provider returned unknown time zone");
                None
            }
        }
    }

    // ─── Helpers ─────────────────────────────────────────────────

    fn accept(
        &self,
        subject: &str,
        key: &str,
        resolution: Resolution,
        threshold: f64,
    ) -> Option<NormalizedLocation> {
        let score = resolution.score;
        let accepted = resolution.accepted(threshold);
        if accepted.is_none() {
            warn!(subject, key, score, threshold, "discarding location below acceptance threshold");
        }
        accepted
    }

    fn log_score(&self, subject: &str, key: &str, score: f64) {
        if score < self.params.review_threshold {
            warn!(subject, key, score, "{} {} location score: {}", subject, key, score);
        } else {
            info!(subject, key, score, "{} {} location score: {}", subject, key, score);
        }
    }
}
