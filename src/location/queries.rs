//! Search query generation from venue addresses and team names.
//!
//! Queries come out deduplicated, most trusted first. Order is never
//! re-sorted later; it decides which candidate wins ties.

use super::types::{non_blank, EventFacts};

/// The venue occupies at most this many leading address lines.
const VENUE_LINES: usize = 2;

/// Team name fragments still holding this many separators are whole
/// multi-sponsor strings rather than a single school or sponsor.
const MAX_SEPARATORS: usize = 3;

/// Ordered, duplicate-free list of trimmed, non-blank query strings.
#[derive(Debug, Default)]
struct QueryList(Vec<String>);

impl QueryList {
    fn push(&mut self, query: &str) {
        let query = query.trim();
        if !query.is_empty() && !self.0.iter().any(|q| q == query) {
            self.0.push(query.to_string());
        }
    }
}

/// Queries for an event: venue name first, then address-line permutations.
///
/// For each of the first two address lines, the lines joined from the front
/// up to it, then the line itself. Afterwards, for every line, the lines
/// joined from it to the end.
pub fn event_queries(facts: &EventFacts) -> Vec<String> {
    let mut queries = QueryList::default();
    if let Some(venue) = non_blank(&facts.venue) {
        queries.push(venue);
    }

    if let Some(address) = non_blank(&facts.venue_address) {
        let lines = address_lines(address);
        for i in 0..lines.len().min(VENUE_LINES) {
            queries.push(&lines[..=i].join(" "));
            queries.push(lines[i]);
        }
        for i in 0..lines.len() {
            queries.push(&lines[i..].join(" "));
        }
    }

    queries.0
}

/// Address text used for the coarse bias geocode: every line but the first,
/// which normally names the venue.
pub fn coarse_address(facts: &EventFacts) -> Option<String> {
    let address = non_blank(&facts.venue_address)?;
    let lines = address_lines(address);
    let rest = lines.get(1..).unwrap_or_default().join(" ");
    if rest.trim().is_empty() {
        None
    } else {
        Some(rest)
    }
}

fn address_lines(address: &str) -> Vec<&str> {
    address.split('\n').map(|line| line.trim_end_matches('\r')).collect()
}

/// Candidate school or sponsor names guessed from a team name.
///
/// Order: last fragment split on `&`, last split on `/`, first split on
/// `&`, first split on `/`.
pub fn team_queries(name: Option<&str>) -> Vec<String> {
    let mut queries = QueryList::default();
    let Some(name) = name.map(str::trim).filter(|n| !n.is_empty()) else {
        return queries.0;
    };

    let by_amp: Vec<&str> = name.split('&').collect();
    let by_slash: Vec<&str> = name.split('/').collect();
    let picks = [by_amp.last(), by_slash.last(), by_amp.first(), by_slash.first()];

    for fragment in picks.into_iter().flatten() {
        if separator_count(fragment) >= MAX_SEPARATORS {
            continue;
        }
        queries.push(fragment);
    }

    queries.0
}

fn separator_count(fragment: &str) -> usize {
    let amp = fragment.matches('&').count();
    let slash = fragment.matches('/').count();
    amp.max(slash)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(venue: Option<&str>, address: Option<&str>) -> EventFacts {
        EventFacts {
            venue: venue.map(String::from),
            venue_address: address.map(String::from),
            location: Some("San Jose, CA, USA".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_event_queries_full_address() {
        let facts = event(
            Some("SJSU Event Center"),
            Some("SJSU Event Center\n290 S 7th St\nSan Jose, CA 95112\nUSA"),
        );
        assert_eq!(
            event_queries(&facts),
            vec![
                "SJSU Event Center",
                "SJSU Event Center 290 S 7th St",
                "290 S 7th St",
                "SJSU Event Center 290 S 7th St San Jose, CA 95112 USA",
                "290 S 7th St San Jose, CA 95112 USA",
                "San Jose, CA 95112 USA",
                "USA",
            ]
        );
    }

    #[test]
    fn test_event_queries_without_venue() {
        let facts = event(None, Some("Gym\nLincoln, NE"));
        assert_eq!(
            event_queries(&facts),
            vec!["Gym", "Gym Lincoln, NE", "Lincoln, NE"]
        );
    }

    #[test]
    fn test_event_queries_skip_blank_lines() {
        let facts = event(None, Some("Gym\n\n1 Main St"));
        assert_eq!(
            event_queries(&facts),
            vec!["Gym", "Gym  1 Main St", "1 Main St"]
        );
        let facts = event(Some("  "), Some("\n  \n"));
        assert!(event_queries(&facts).is_empty());
    }

    #[test]
    fn test_event_queries_venue_only() {
        let facts = event(Some("Lincoln High School"), None);
        assert_eq!(event_queries(&facts), vec!["Lincoln High School"]);
        assert!(event_queries(&event(None, None)).is_empty());
    }

    #[test]
    fn test_coarse_address_skips_venue_line() {
        let facts = event(None, Some("Gym\n1 Main St\nLincoln, NE"));
        assert_eq!(coarse_address(&facts).as_deref(), Some("1 Main St Lincoln, NE"));
        assert!(coarse_address(&event(None, Some("Gym"))).is_none());
        assert!(coarse_address(&event(None, None)).is_none());
    }

    #[test]
    fn test_team_queries_sponsors_and_school() {
        let q = team_queries(Some("NASA/Google/BAE & Lincoln High School"));
        assert_eq!(
            q,
            vec![
                "Lincoln High School",
                "BAE & Lincoln High School",
                "NASA/Google/BAE",
                "NASA",
            ]
        );
    }

    #[test]
    fn test_team_queries_skip_long_sponsor_lists() {
        let q = team_queries(Some("A/B/C/D&School"));
        // The first '&' fragment still holds three slashes.
        assert_eq!(q, vec!["School", "D&School", "A"]);
    }

    #[test]
    fn test_team_queries_plain_name() {
        assert_eq!(team_queries(Some("Lincoln High School")), vec!["Lincoln High School"]);
        assert!(team_queries(None).is_empty());
        assert!(team_queries(Some("  ")).is_empty());
    }
}
