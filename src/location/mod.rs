//! Location resolution subsystem for Geomatch.
//!
//! Turns noisy venue and team location text into a normalized place record:
//! query generation, a places-provider collaborator, candidate scoring and
//! two-phase arbitration.

pub mod cache;
pub mod providers;
pub mod queries;
pub mod resolver;
pub mod scoring;
pub mod similarity;
pub mod types;

pub use cache::{CachedPlaceSource, PlaceCache};
pub use providers::{GooglePlacesClient, PlacesConfig};
pub use resolver::{LocationResolver, PlaceSource};
pub use scoring::ScoringParams;
pub use similarity::similarity;
pub use types::{
    AddressComponent, EventFacts, LatLng, LocationError, NormalizedLocation, RawCandidate,
    RawDetail, Resolution, ScoredCandidate, SearchMode, TeamFacts,
};
