//! Route handler functions for all API endpoints.
//!
//! Each handler extracts parameters via axum extractors, validates the
//! domain against the allowlist before touching storage, and returns
//! JSON responses in the widget's wire format.

use axum::extract::{Query, State};
use axum::http::{header, HeaderMap};
use axum::response::IntoResponse;
use axum::Json;
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use herenow_storage::NewVisit;

use crate::error::ApiError;
use crate::state::AppState;
use crate::widget;

// =============================================================================
// Request / response types
// =============================================================================

/// Body of POST /api/track. Required fields are Options so a missing
/// key produces the contract's 400 body instead of a deserialization
/// rejection.
#[derive(Debug, Deserialize)]
pub struct TrackRequest {
    pub domain: Option<String>,
    pub path: Option<String>,
    pub user_id: Option<String>,
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TrackResponse {
    pub success: bool,
    pub event_id: String,
}

#[derive(Debug, Deserialize)]
pub struct StatsParams {
    pub domain: Option<String>,
    pub path: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatsResponse {
    pub here: u64,
    pub now: u64,
    pub domain: String,
    pub path: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub uptime_secs: u64,
}

// =============================================================================
// Validation helpers
// =============================================================================

/// Treat an absent or empty parameter the same way: the contract's 400.
fn require<'a>(value: &'a Option<String>, name: &'static str) -> Result<&'a str, ApiError> {
    match value.as_deref() {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ApiError::MissingParameter(name)),
    }
}

// =============================================================================
// Handler functions
// =============================================================================

/// POST /api/track - append one visit event.
pub async fn track(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<TrackRequest>,
) -> Result<Json<TrackResponse>, ApiError> {
    let domain = require(&body.domain, "domain")?.to_string();
    let path = require(&body.path, "path")?.to_string();

    if !state.allowlist.is_allowed(&domain) {
        return Err(ApiError::DomainNotAllowed);
    }

    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();

    let event = state
        .events
        .record_visit(NewVisit {
            domain,
            path,
            visitor_id: body.user_id,
            session_id: body.session_id,
            user_agent,
        })
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to record visit event");
            ApiError::TrackFailed
        })?;

    Ok(Json(TrackResponse {
        success: true,
        event_id: event.id.to_string(),
    }))
}

/// GET /api/stats - presence counts for one page, through the cache.
pub async fn stats(
    State(state): State<AppState>,
    Query(params): Query<StatsParams>,
) -> Result<Json<StatsResponse>, ApiError> {
    let domain = require(&params.domain, "domain")?.to_string();
    let path = require(&params.path, "path")?.to_string();

    if !state.allowlist.is_allowed(&domain) {
        return Err(ApiError::DomainNotAllowed);
    }

    let window = Duration::seconds(state.config.tracking.activity_window_secs as i64);
    let snapshot = state
        .cache
        .get_or_compute(&domain, &path, || {
            state.events.aggregate(&domain, &path, Utc::now(), window)
        })
        .map_err(|e| {
            tracing::error!(error = %e, domain = %domain, path = %path, "Failed to aggregate stats");
            ApiError::StatsFailed {
                details: e.to_string(),
                domain: domain.clone(),
                path: path.clone(),
            }
        })?;

    Ok(Json(StatsResponse {
        here: snapshot.here,
        now: snapshot.now,
        domain: snapshot.domain,
        path: snapshot.path,
    }))
}

/// GET /widget.js - the generated instrumentation script.
///
/// Rendered per-request: the configured public base URL wins, otherwise
/// the request's Host header decides where the script calls back to.
pub async fn widget_js(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    let api_base = match &state.config.server.public_base_url {
        Some(url) => url.trim_end_matches('/').to_string(),
        None => {
            let host = headers
                .get(header::HOST)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("localhost");
            format!("http://{}", host)
        }
    };

    let params = widget::WidgetParams {
        api_base,
        activity_window_ms: state.config.tracking.activity_window_secs * 1000,
        stats_refresh_ms: state.config.cache.ttl_secs * 1000,
    };
    let script = widget::render(&params, &state.allowlist);

    (
        [
            (header::CONTENT_TYPE, "application/javascript"),
            (header::CACHE_CONTROL, "public, max-age=3600"),
        ],
        script,
    )
}

/// GET /health - health check.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        service: "herenow-api".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

/// GET / - service info.
pub async fn root() -> Json<serde_json::Value> {
    Json(json!({
        "name": "here/now analytics API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "track": "POST /api/track",
            "stats": "GET /api/stats",
            "widget": "GET /widget.js",
            "health": "GET /health",
        },
    }))
}
