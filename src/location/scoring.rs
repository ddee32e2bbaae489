//! Candidate scoring against known facts.
//!
//! Both scores land in `[0, 1]`; 1.0 means "certainly this place" and lets
//! the engine stop early.

use super::similarity::similarity;
use super::types::{non_blank, EventFacts, LocationError, NormalizedLocation};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Types that mark a specific building or venue rather than an area.
const POINT_TYPES: &[&str] = &["point_of_interest", "premise"];

/// Types expected for places a team is named after.
const SCHOOL_TYPES: &[&str] = &["school", "university"];

// ─── Parameters ──────────────────────────────────────────────────

/// Tuned scoring constants. Defaults reproduce the reference policy; a JSON
/// file may override any subset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringParams {
    /// Address similarities at or below this earn nothing.
    pub partial_credit_threshold: f64,
    /// Raw event score that maps to 1.0.
    pub event_max_score: f64,
    /// Flat credit when a point of interest's name appears in the query.
    pub name_match_bonus: f64,
    /// Multiplier for event candidates that are not a point of interest.
    pub non_point_penalty: f64,
    /// Exponent applied to team name similarity.
    pub team_similarity_exponent: f64,
    /// Multiplier for team candidates that are not schools.
    pub non_school_penalty: f64,
    /// Per-rank decay of team candidates within one query's results.
    pub rank_decay: f64,
    /// Team candidates examined per query.
    pub max_team_candidates: usize,
    /// Minimum score to apply an event resolution.
    pub event_accept_threshold: f64,
    /// Minimum score to apply a team resolution.
    pub team_accept_threshold: f64,
    /// Scores under this are logged as warnings for manual review.
    pub review_threshold: f64,
}

impl Default for ScoringParams {
    fn default() -> Self {
        Self {
            partial_credit_threshold: 0.5,
            event_max_score: 5.0,
            name_match_bonus: 3.0,
            non_point_penalty: 0.5,
            team_similarity_exponent: 1.0 / 3.0,
            non_school_penalty: 0.7,
            rank_decay: 0.7,
            max_team_candidates: 5,
            event_accept_threshold: 0.5,
            team_accept_threshold: 0.7,
            review_threshold: 0.8,
        }
    }
}

impl ScoringParams {
    /// Load overrides from a JSON file. Missing keys keep their defaults.
    pub fn load_from(path: &Path) -> Result<Self, LocationError> {
        let data = std::fs::read_to_string(path)?;
        let params: Self = serde_json::from_str(&data)
            .map_err(|e| LocationError::Config(format!("{}: {}", path.display(), e)))?;
        params.validate()?;
        Ok(params)
    }

    fn validate(&self) -> Result<(), LocationError> {
        if self.event_max_score <= 0.0 {
            return Err(LocationError::Config("event_max_score must be positive".into()));
        }
        if self.team_similarity_exponent <= 0.0 {
            return Err(LocationError::Config(
                "team_similarity_exponent must be positive".into(),
            ));
        }
        let fractions = [
            ("partial_credit_threshold", self.partial_credit_threshold),
            ("non_point_penalty", self.non_point_penalty),
            ("non_school_penalty", self.non_school_penalty),
            ("rank_decay", self.rank_decay),
        ];
        for (name, value) in fractions {
            if !(0.0..=1.0).contains(&value) {
                return Err(LocationError::Config(format!("{name} must be within 0..=1")));
            }
        }
        Ok(())
    }

    /// Credit for a city, state or postal code comparison: the similarity
    /// itself once it clears the threshold.
    pub fn partial_credit(&self, similarity: f64) -> f64 {
        if similarity > self.partial_credit_threshold {
            similarity
        } else {
            0.0
        }
    }

    /// Credit for the country comparison: all or nothing.
    pub fn binary_credit(&self, similarity: f64) -> f64 {
        if similarity > self.partial_credit_threshold {
            1.0
        } else {
            0.0
        }
    }
}

// ─── Event scoring ───────────────────────────────────────────────

fn field_similarity(candidate: Option<&str>, known: &str) -> f64 {
    similarity(candidate.unwrap_or(""), known)
}

/// Score an event candidate found by `query`.
///
/// Country is all-or-nothing; state, city and postal code earn partial
/// credit. A point of interest whose name appears in the query gets the
/// name bonus, anything else earns the plain name similarity. Non-point
/// candidates are halved, so they never exceed 0.5.
pub fn event_score(
    facts: &EventFacts,
    query: &str,
    candidate: &NormalizedLocation,
    params: &ScoringParams,
) -> f64 {
    let mut score = 0.0;

    if let Some(country) = non_blank(&facts.country) {
        let partial = field_similarity(candidate.country.as_deref(), country)
            .max(field_similarity(candidate.country_short.as_deref(), country));
        score += params.binary_credit(partial);
    }
    if let Some(state) = non_blank(&facts.state_prov) {
        let partial = field_similarity(candidate.state_prov.as_deref(), state)
            .max(field_similarity(candidate.state_prov_short.as_deref(), state));
        score += params.partial_credit(partial);
    }
    if let Some(city) = non_blank(&facts.city) {
        score += params.partial_credit(field_similarity(candidate.city.as_deref(), city));
    }
    if let Some(postal) = non_blank(&facts.postal_code) {
        score += params.partial_credit(field_similarity(candidate.postal_code.as_deref(), postal));
    }

    let is_point = candidate.has_any_type(POINT_TYPES);
    if is_point && !candidate.name.is_empty() && query.contains(candidate.name.as_str()) {
        score += params.name_match_bonus;
    } else {
        score += similarity(&candidate.name, query);
    }

    if !is_point {
        score *= params.non_point_penalty;
    }

    (score / params.event_max_score).clamp(0.0, 1.0)
}

// ─── Team scoring ────────────────────────────────────────────────

/// Score a team candidate found by `query_name`, before rank decay.
pub fn team_score(query_name: &str, candidate: &NormalizedLocation, params: &ScoringParams) -> f64 {
    let mut score = similarity(query_name, &candidate.name).powf(params.team_similarity_exponent);
    if !candidate.has_any_type(SCHOOL_TYPES) {
        score *= params.non_school_penalty;
    }
    score.clamp(0.0, 1.0)
}

/// Team score discounted by the candidate's zero-based provider rank.
pub fn ranked_team_score(
    query_name: &str,
    candidate: &NormalizedLocation,
    rank: usize,
    params: &ScoringParams,
) -> f64 {
    let decay = params.rank_decay.powi(i32::try_from(rank).unwrap_or(i32::MAX));
    team_score(query_name, candidate, params) * decay
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn lincoln_facts() -> EventFacts {
        EventFacts {
            key: "2016nelin".into(),
            venue: Some("Lincoln High School".into()),
            city: Some("Lincoln".into()),
            state_prov: Some("NE".into()),
            country: Some("USA".into()),
            location: Some("Lincoln, NE, USA".into()),
            ..Default::default()
        }
    }

    fn place(name: &str, types: &[&str]) -> NormalizedLocation {
        NormalizedLocation {
            place_id: "p1".into(),
            name: name.into(),
            types: types.iter().map(|t| t.to_string()).collect(),
            city: Some("Lincoln".into()),
            state_prov: Some("Nebraska".into()),
            state_prov_short: Some("NE".into()),
            country: Some("United States".into()),
            country_short: Some("US".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_perfect_event_match() {
        let params = ScoringParams::default();
        let candidate = place("Lincoln High School", &["school", "point_of_interest"]);
        let score = event_score(&lincoln_facts(), "Lincoln High School", &candidate, &params);
        assert_relative_eq!(score, 1.0);
    }

    #[test]
    fn test_non_point_never_above_half() {
        let params = ScoringParams::default();
        let candidate = place("Lincoln High School", &["locality", "political"]);
        let facts = EventFacts { postal_code: Some("68508".into()), ..lincoln_facts() };
        let candidate = NormalizedLocation { postal_code: Some("68508".into()), ..candidate };
        let score = event_score(&facts, "Lincoln High School", &candidate, &params);
        assert!(score <= 0.5, "{score}");
        assert!(score > 0.4);
    }

    #[test]
    fn test_missing_types_do_not_fail() {
        let params = ScoringParams::default();
        let candidate = NormalizedLocation { name: "Somewhere".into(), ..Default::default() };
        let score = event_score(&lincoln_facts(), "Lincoln High School", &candidate, &params);
        assert!((0.0..=0.5).contains(&score));
        let team = team_score("Lincoln High School", &candidate, &params);
        assert!((0.0..=0.7).contains(&team));
    }

    #[test]
    fn test_country_credit_is_binary() {
        let params = ScoringParams::default();
        assert_relative_eq!(params.binary_credit(0.51), params.binary_credit(0.99));
        assert_relative_eq!(params.binary_credit(0.51), 1.0);
        assert_relative_eq!(params.binary_credit(0.5), 0.0);
    }

    #[test]
    fn test_address_credit_is_partial() {
        let params = ScoringParams::default();
        assert!(params.partial_credit(0.51) < params.partial_credit(0.99));
        assert_relative_eq!(params.partial_credit(0.51), 0.51);
        assert_relative_eq!(params.partial_credit(0.4), 0.0);
    }

    #[test]
    fn test_event_country_binary_state_partial() {
        let params = ScoringParams::default();
        let gym = |country: &str, state: &str| NormalizedLocation {
            name: "Gym".into(),
            types: vec!["gym".into(), "point_of_interest".into()],
            country: Some(country.into()),
            state_prov: Some(state.into()),
            ..Default::default()
        };

        // "usb" is a weaker but still passing country match than "usa".
        assert!(similarity("usb", "USA") > 0.5 && similarity("usb", "USA") < 1.0);
        let country_only = EventFacts { country: Some("USA".into()), ..Default::default() };
        assert_relative_eq!(
            event_score(&country_only, "Gym", &gym("USA", ""), &params),
            event_score(&country_only, "Gym", &gym("USB", ""), &params)
        );

        let with_state = EventFacts { state_prov: Some("NE".into()), ..country_only };
        let exact = event_score(&with_state, "Gym", &gym("USA", "NE"), &params);
        let close = event_score(&with_state, "Gym", &gym("USA", "NEB"), &params);
        assert_relative_eq!(exact, 1.0);
        assert_relative_eq!(close, 4.8 / 5.0, epsilon = 1e-12);
    }

    #[test]
    fn test_name_bonus_requires_substring() {
        let params = ScoringParams::default();
        let candidate = place("Lincoln High School", &["school", "point_of_interest"]);
        let facts = EventFacts { venue: None, city: None, state_prov: None, country: None, ..lincoln_facts() };
        let with_bonus = event_score(&facts, "Lincoln High School Gym", &candidate, &params);
        assert_relative_eq!(with_bonus, 3.0 / 5.0);
        let without = event_score(&facts, "Lincoln HS", &candidate, &params);
        assert!(without < with_bonus);
    }

    #[test]
    fn test_team_score_school_bonus() {
        let params = ScoringParams::default();
        let school = place("Lincoln High School", &["school", "establishment"]);
        let store = place("Lincoln High School", &["store"]);
        assert_relative_eq!(team_score("Lincoln High School", &school, &params), 1.0);
        assert_relative_eq!(team_score("Lincoln High School", &store, &params), 0.7);
    }

    #[test]
    fn test_team_score_cube_root_boost() {
        let params = ScoringParams::default();
        let school = place("abcd", &["school"]);
        // similarity 0.75 before the cube root.
        let score = team_score("bcde", &school, &params);
        assert_relative_eq!(score, 0.75_f64.powf(1.0 / 3.0), epsilon = 1e-12);
        assert!(score > 0.75);
    }

    #[test]
    fn test_rank_decay() {
        let params = ScoringParams::default();
        let school = place("Lincoln High School", &["school"]);
        assert_relative_eq!(ranked_team_score("Lincoln High School", &school, 0, &params), 1.0);
        assert_relative_eq!(ranked_team_score("Lincoln High School", &school, 2, &params), 0.49, epsilon = 1e-12);
    }

    #[test]
    fn test_scores_bounded() {
        let params = ScoringParams::default();
        let names = ["", "Lincoln", "Lincoln High School", "zzz"];
        for name in names {
            for types in [&["school"][..], &["premise"][..], &[][..]] {
                let c = place(name, types);
                for q in names {
                    let e = event_score(&lincoln_facts(), q, &c, &params);
                    let t = team_score(q, &c, &params);
                    assert!((0.0..=1.0).contains(&e));
                    assert!((0.0..=1.0).contains(&t));
                }
            }
        }
    }

    #[test]
    fn test_params_partial_override() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"rank_decay": 0.5, "team_accept_threshold": 0.6}}"#).unwrap();
        let params = ScoringParams::load_from(file.path()).unwrap();
        assert_relative_eq!(params.rank_decay, 0.5);
        assert_relative_eq!(params.team_accept_threshold, 0.6);
        assert_relative_eq!(params.event_max_score, 5.0);
    }

    #[test]
    fn test_params_reject_invalid() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"event_max_score": 0}}"#).unwrap();
        assert!(matches!(
            ScoringParams::load_from(file.path()),
            Err(LocationError::Config(_))
        ));
    }
}
