use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::NaiveDate;
use serde::Serialize;
use tower_http::trace::TraceLayer;

use crate::engine::{Engine, EngineError};
use crate::model::{parse_instant, CalendarEvent, Zoned};

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/check/{agent}/{duration}/{start}", get(check))
        .route("/query/{agent}/{duration}/{start}/{end}", get(query))
        .route("/coordinate/{duration}/{start}/{end}", get(coordinate))
        .route("/underutilized/{agent}/{date}", get(underutilized))
        .route("/fits/{agent}/{start}/{end}", get(fits))
        .route("/calendar/{agent}", get(calendar))
        .route("/download-calendar/{agent}", get(download_calendar))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ── Response envelopes ──────────────────────────────────────────

#[derive(Serialize)]
struct CheckResponse {
    available: bool,
}

#[derive(Serialize)]
struct TimesResponse {
    available_times: Vec<Zoned>,
}

struct ApiError(EngineError);

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            EngineError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            EngineError::NotFound(_) => StatusCode::NOT_FOUND,
            EngineError::DataFault(_) => StatusCode::BAD_GATEWAY,
        };
        if status == StatusCode::BAD_GATEWAY {
            tracing::error!("calendar fault: {}", self.0);
        }
        (status, Json(serde_json::json!({ "error": self.0.to_string() }))).into_response()
    }
}

fn observe(endpoint: &'static str, started: Instant, outcome: &Result<Response, ApiError>) {
    let status = match outcome {
        Ok(_) => "ok",
        Err(ApiError(EngineError::InvalidInput(_))) => "invalid_input",
        Err(ApiError(EngineError::NotFound(_))) => "not_found",
        Err(ApiError(EngineError::DataFault(_))) => "data_fault",
    };
    metrics::counter!(
        crate::observability::REQUESTS_TOTAL,
        "endpoint" => endpoint,
        "status" => status
    )
    .increment(1);
    metrics::histogram!(
        crate::observability::REQUEST_DURATION_SECONDS,
        "endpoint" => endpoint
    )
    .record(started.elapsed().as_secs_f64());
}

// ── Handlers ────────────────────────────────────────────────────

fn instant(state: &AppState, s: &str) -> Result<Zoned, ApiError> {
    parse_instant(s, state.engine.config().timezone)
        .ok_or_else(|| ApiError(EngineError::InvalidInput(format!("unparseable instant '{s}'"))))
}

async fn check(
    State(state): State<AppState>,
    Path((agent, duration, start)): Path<(String, i64, String)>,
) -> Result<Response, ApiError> {
    let started = Instant::now();
    let result = (|| {
        let at = instant(&state, &start)?;
        let available = state.engine.point_check(&agent, at, duration)?;
        Ok(Json(CheckResponse { available }).into_response())
    })();
    observe("check", started, &result);
    result
}

async fn query(
    State(state): State<AppState>,
    Path((agent, duration, start, end)): Path<(String, i64, String, String)>,
) -> Result<Response, ApiError> {
    let started = Instant::now();
    let result = (|| {
        let start = instant(&state, &start)?;
        let end = instant(&state, &end)?;
        let available_times = state.engine.range_query(&agent, start, end, duration)?;
        Ok(Json(TimesResponse { available_times }).into_response())
    })();
    observe("query", started, &result);
    result
}

/// Agents come in as a comma-separated `agents` query parameter, e.g.
/// `/coordinate/15/2024-12-02T09:00/2024-12-02T12:00?agents=janedoe,joedoe`.
async fn coordinate(
    State(state): State<AppState>,
    Path((duration, start, end)): Path<(i64, String, String)>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, ApiError> {
    let started = Instant::now();
    let result = (|| {
        let agents: Vec<String> = params
            .get("agents")
            .map(|s| {
                s.split(',')
                    .map(str::trim)
                    .filter(|a| !a.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        let start = instant(&state, &start)?;
        let end = instant(&state, &end)?;
        let available_times = state.engine.coordinate(&agents, start, end, duration)?;
        Ok(Json(TimesResponse { available_times }).into_response())
    })();
    observe("coordinate", started, &result);
    result
}

async fn underutilized(
    State(state): State<AppState>,
    Path((agent, date)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let started = Instant::now();
    let result = (|| {
        let date = NaiveDate::parse_from_str(&date, "%Y-%m-%d").map_err(|_| {
            ApiError(EngineError::InvalidInput(format!("unparseable date '{date}'")))
        })?;
        let available_times = state.engine.underutilized(&agent, date)?;
        Ok(Json(TimesResponse { available_times }).into_response())
    })();
    observe("underutilized", started, &result);
    result
}

async fn fits(
    State(state): State<AppState>,
    Path((agent, start, end)): Path<(String, String, String)>,
) -> Result<Response, ApiError> {
    let started = Instant::now();
    let result = (|| {
        let start = instant(&state, &start)?;
        let end = instant(&state, &end)?;
        let available = state.engine.fits(&agent, start, end)?;
        Ok(Json(CheckResponse { available }).into_response())
    })();
    observe("fits", started, &result);
    result
}

async fn calendar(
    State(state): State<AppState>,
    Path(agent): Path<String>,
) -> Result<Response, ApiError> {
    let started = Instant::now();
    let result = (|| {
        let events: Vec<CalendarEvent> = state.engine.calendar(&agent)?;
        Ok(Json(events).into_response())
    })();
    observe("calendar", started, &result);
    result
}

/// Serve the agent's backing .ics file verbatim.
async fn download_calendar(
    State(state): State<AppState>,
    Path(agent): Path<String>,
) -> Result<Response, ApiError> {
    let started = Instant::now();
    let result = (|| {
        let path = state.engine.config().roster.get(&agent).ok_or_else(|| {
            ApiError(EngineError::NotFound(format!("no calendar for agent {agent}")))
        })?;
        let text = std::fs::read_to_string(path).map_err(|e| {
            ApiError(EngineError::DataFault(format!(
                "reading {}: {e}",
                path.display()
            )))
        })?;
        Ok(([(header::CONTENT_TYPE, "text/calendar")], text).into_response())
    })();
    observe("download_calendar", started, &result);
    result
}
