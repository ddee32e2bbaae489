use crate::location::{LocationResolver, PlaceSource};

/// Provider behind the HTTP API; boxed so tests can swap in a fake.
pub type DynPlaceSource = Box<dyn PlaceSource + Send + Sync>;

pub struct AppState {
    pub resolver: LocationResolver<DynPlaceSource>,
}

impl AppState {
    pub fn new(resolver: LocationResolver<DynPlaceSource>) -> Self {
        Self { resolver }
    }
}
