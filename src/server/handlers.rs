use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

use crate::location::{EventFacts, LatLng, NormalizedLocation, Resolution, TeamFacts};

use super::state::AppState;

// ─── Error response ──────────────────────────────────────────────

#[derive(Serialize)]
struct ApiErrorBody {
    error: String,
    code: u16,
}

pub(super) struct ApiError(StatusCode, String);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiErrorBody {
            error: self.1,
            code: self.0.as_u16(),
        };
        (self.0, Json(body)).into_response()
    }
}

fn api_error(status: StatusCode, msg: impl Into<String>) -> ApiError {
    ApiError(status, msg.into())
}

/// Run blocking provider calls off the async workers.
async fn blocking<T, F>(state: Arc<AppState>, f: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&AppState) -> T + Send + 'static,
{
    tokio::task::spawn_blocking(move || f(&state))
        .await
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, format!("resolver task failed: {e}")))
}

// ─── GET /api/health ─────────────────────────────────────────────

pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

// ─── POST /api/resolve/{event,team} ──────────────────────────────

#[derive(Serialize, Debug)]
pub struct ResolveResponse {
    pub key: String,
    pub score: f64,
    pub accepted: bool,
    pub threshold: f64,
    pub query: Option<String>,
    pub location: Option<NormalizedLocation>,
}

impl ResolveResponse {
    fn new(key: String, resolution: Resolution, threshold: f64) -> Self {
        Self {
            key,
            score: resolution.score,
            accepted: resolution.is_accepted(threshold),
            threshold,
            query: resolution.query,
            location: resolution.location,
        }
    }
}

pub async fn resolve_event(
    State(state): State<Arc<AppState>>,
    Json(facts): Json<EventFacts>,
) -> Result<Json<ResolveResponse>, ApiError> {
    let start = Instant::now();
    let key = facts.key.clone();
    let (resolution, threshold) = blocking(state, move |s| {
        (
            s.resolver.resolve_event_location(&facts),
            s.resolver.params().event_accept_threshold,
        )
    })
    .await?;

    tracing::info!(
        key = %key,
        score = resolution.score,
        elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
        "POST /api/resolve/event"
    );
    Ok(Json(ResolveResponse::new(key, resolution, threshold)))
}

pub async fn resolve_team(
    State(state): State<Arc<AppState>>,
    Json(facts): Json<TeamFacts>,
) -> Result<Json<ResolveResponse>, ApiError> {
    let start = Instant::now();
    let key = facts.key.clone();
    let (resolution, threshold) = blocking(state, move |s| {
        (
            s.resolver.resolve_team_location(&facts),
            s.resolver.params().team_accept_threshold,
        )
    })
    .await?;

    tracing::info!(
        key = %key,
        score = resolution.score,
        elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
        "POST /api/resolve/team"
    );
    Ok(Json(ResolveResponse::new(key, resolution, threshold)))
}

// ─── GET /api/timezone ───────────────────────────────────────────

#[derive(Deserialize)]
pub struct TimezoneQuery {
    pub location: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
}

#[derive(Serialize)]
pub struct TimezoneResponse {
    pub tz: String,
}

pub async fn timezone(
    State(state): State<Arc<AppState>>,
    Query(params): Query<TimezoneQuery>,
) -> Result<Json<TimezoneResponse>, ApiError> {
    let lat_lng = match (params.lat, params.lng) {
        (Some(lat), Some(lng)) => {
            if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
                return Err(api_error(
                    StatusCode::BAD_REQUEST,
                    "Invalid coordinates. Lat: -90..90, Lng: -180..180",
                ));
            }
            Some(LatLng::new(lat, lng))
        }
        _ => None,
    };
    let location = params.location.unwrap_or_default();
    if lat_lng.is_none() && location.trim().is_empty() {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "Provide 'location' or 'lat'+'lng' parameters",
        ));
    }

    let tz = blocking(state, move |s| s.resolver.timezone_id(&location, lat_lng)).await?;
    match tz {
        Some(tz) => Ok(Json(TimezoneResponse { tz })),
        None => Err(api_error(StatusCode::NOT_FOUND, "No time zone found")),
    }
}
