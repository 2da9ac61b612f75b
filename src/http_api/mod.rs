use std::{net::SocketAddr, sync::Arc, time::Duration as StdDuration};

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::{Duration, Local, NaiveDate, NaiveDateTime};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use crate::{
    Aggregator, CalendarEvent, EngineSnapshot, ScheduleError, ServiceCommand, ServiceError,
};

pub type Clock = Arc<dyn Fn() -> NaiveDateTime + Send + Sync>;

const DEFAULT_WINDOW_DAYS: i64 = 365;

#[derive(Clone)]
pub struct AppState {
    calendar: Arc<RwLock<Aggregator>>,
    clock: Clock,
}

impl AppState {
    pub fn new(aggregator: Aggregator) -> Self {
        Self::with_shared(Arc::new(RwLock::new(aggregator)))
    }

    pub fn with_shared(calendar: Arc<RwLock<Aggregator>>) -> Self {
        Self {
            calendar,
            clock: Arc::new(|| Local::now().naive_local()),
        }
    }

    /// Replaces the wall clock, e.g. with a fixed instant in tests.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn calendar(&self) -> Arc<RwLock<Aggregator>> {
        self.calendar.clone()
    }

    fn now(&self) -> NaiveDateTime {
        (self.clock)()
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    message: String,
}

#[derive(Debug)]
enum ApiError {
    NotFound(String),
    Conflict(String),
    Invalid(String),
}

#[derive(Debug, Deserialize)]
struct DatePayload {
    date: NaiveDate,
}

#[derive(Debug, Deserialize)]
struct WindowQuery {
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
}

impl ApiError {
    fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }
}

impl From<ServiceError> for ApiError {
    fn from(value: ServiceError) -> Self {
        match value {
            ServiceError::UnknownEntity(id) => ApiError::NotFound(format!("schedule {id} not found")),
            ServiceError::Schedule(err @ ScheduleError::Removed { .. }) => {
                ApiError::NotFound(err.to_string())
            }
            ServiceError::Schedule(err) => ApiError::Conflict(err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, message) = match self {
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, "not_found", message),
            ApiError::Conflict(message) => (StatusCode::CONFLICT, "unresolvable", message),
            ApiError::Invalid(message) => (StatusCode::BAD_REQUEST, "invalid_request", message),
        };
        (status, Json(ErrorBody { error, message })).into_response()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/schedules", get(list_schedules))
        .route("/schedules/:id", get(get_schedule).delete(delete_schedule))
        .route("/schedules/:id/add_date", post(add_date))
        .route("/schedules/:id/remove_date", post(remove_date))
        .route("/schedules/:id/update_state", post(update_state))
        .route("/calendar", get(list_events))
        .route("/calendar/next", get(next_event))
        .with_state(state)
}

/// Serves the API and refreshes every schedule (throttled) once per `refresh_every`.
pub async fn serve(
    addr: SocketAddr,
    aggregator: Aggregator,
    refresh_every: StdDuration,
) -> std::io::Result<()> {
    let state = AppState::new(aggregator);
    refresh(&state).await;

    let background = state.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(refresh_every);
        loop {
            ticker.tick().await;
            refresh(&background).await;
        }
    });

    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "garbage collection HTTP API listening");
    axum::serve(listener, app).await
}

/// Throttled refresh of every schedule on the blocking pool, since
/// `refresh_all` fans out over rayon. Returns how many schedules failed.
pub async fn refresh(state: &AppState) -> usize {
    let now = state.now();
    let calendar = state.calendar();
    let errors = match tokio::task::spawn_blocking(move || calendar.read().refresh_all(now)).await {
        Ok(errors) => errors,
        Err(err) => {
            warn!(error = %err, "periodic refresh task failed");
            return 0;
        }
    };
    for err in &errors {
        warn!(entity = %err.entity(), error = %err, "periodic refresh failed");
    }
    errors.len()
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

async fn list_schedules(State(state): State<AppState>) -> Json<Vec<EngineSnapshot>> {
    let calendar = state.calendar();
    let snapshots = calendar.read().snapshot();
    Json(snapshots)
}

async fn get_schedule(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<EngineSnapshot>, ApiError> {
    snapshot_of(&state, &id).map(Json)
}

async fn delete_schedule(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let calendar = state.calendar();
    let removed = calendar.write().remove_engine(&id);
    if !removed {
        return Err(ApiError::not_found(format!("schedule {id} not found")));
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn add_date(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<DatePayload>,
) -> Result<Json<EngineSnapshot>, ApiError> {
    let command = ServiceCommand::AddDate {
        entity_id: id.clone(),
        date: payload.date,
    };
    run_command(&state, &id, command)
}

async fn remove_date(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<DatePayload>,
) -> Result<Json<EngineSnapshot>, ApiError> {
    let command = ServiceCommand::RemoveDate {
        entity_id: id.clone(),
        date: payload.date,
    };
    run_command(&state, &id, command)
}

async fn update_state(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<EngineSnapshot>, ApiError> {
    let command = ServiceCommand::UpdateState {
        entity_id: id.clone(),
    };
    run_command(&state, &id, command)
}

async fn list_events(
    State(state): State<AppState>,
    Query(window): Query<WindowQuery>,
) -> Result<Json<Vec<CalendarEvent>>, ApiError> {
    let start = window.start.unwrap_or_else(|| state.now().date());
    let end = window
        .end
        .unwrap_or_else(|| start + Duration::days(DEFAULT_WINDOW_DAYS));
    if end < start {
        return Err(ApiError::Invalid(format!(
            "window end {end} is before start {start}"
        )));
    }
    let calendar = state.calendar();
    let events = calendar.read().list_events(start, end);
    Ok(Json(events))
}

async fn next_event(State(state): State<AppState>) -> Result<Json<CalendarEvent>, ApiError> {
    let calendar = state.calendar();
    let soonest = calendar.read().soonest();
    soonest
        .map(Json)
        .ok_or_else(|| ApiError::not_found("no upcoming collection"))
}

fn run_command(
    state: &AppState,
    id: &str,
    command: ServiceCommand,
) -> Result<Json<EngineSnapshot>, ApiError> {
    let now = state.now();
    {
        let calendar = state.calendar();
        let guard = calendar.read();
        guard.dispatch(command, now)?;
    }
    snapshot_of(state, id).map(Json)
}

fn snapshot_of(state: &AppState, id: &str) -> Result<EngineSnapshot, ApiError> {
    let calendar = state.calendar();
    let engine = calendar
        .read()
        .get(id)
        .ok_or_else(|| ApiError::not_found(format!("schedule {id} not found")))?;
    let snapshot = engine.lock().snapshot();
    Ok(snapshot)
}
