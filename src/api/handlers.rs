//! HTTP request handlers

use super::assets::{get_index_html, serve_static};
use super::sse::sse_stream;
use super::types::{
    ChoiceRequest, ErrorResponse, GeolocationReport, MountRequest, QueuedResponse,
    SessionResponse, SuccessResponse,
};
use super::AppState;
use crate::runtime::SessionError;
use crate::state_machine::{
    ContextError, Coordinates, Event, FractureContext, GeolocationError, LocationMethod,
};
use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Chat page
        .route("/", get(serve_page))
        .route("/assets/*path", get(serve_static))
        // Session lifecycle
        .route("/api/session", get(get_session))
        .route("/api/session/mount", post(mount_session))
        .route("/api/session/teardown", post(teardown_session))
        // Live updates
        .route("/api/session/stream", get(stream_session))
        // User actions
        .route("/api/session/choice", post(choose))
        .route("/api/session/location-method", post(select_location_method))
        .route("/api/session/geolocation", post(report_geolocation))
        // Version
        .route("/version", get(get_version))
        .with_state(state)
}

// ============================================================
// Page
// ============================================================

async fn serve_page() -> impl IntoResponse {
    match get_index_html() {
        Some(content) => Html(content).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Html("<h1>404 - chat page not found</h1>".to_string()),
        )
            .into_response(),
    }
}

// ============================================================
// Session Lifecycle
// ============================================================

async fn mount_session(
    State(state): State<AppState>,
    Json(req): Json<MountRequest>,
) -> Result<Json<SessionResponse>, AppError> {
    let fracture = match req {
        MountRequest::Context {
            body_part,
            confidence,
        } => FractureContext::new(body_part, confidence),
        MountRequest::Prediction(prediction) => FractureContext::from_prediction(&prediction),
    }?;

    tracing::info!(
        body_part = %fracture.body_part(),
        confidence = fracture.confidence(),
        "Mounting assistant"
    );
    let snapshot = state.sessions.mount(fracture).await?;
    Ok(Json(snapshot.into()))
}

async fn get_session(State(state): State<AppState>) -> Result<Json<SessionResponse>, AppError> {
    state
        .sessions
        .snapshot()
        .map(|snapshot| Json(snapshot.into()))
        .ok_or_else(|| AppError::NotFound(SessionError::NotMounted.to_string()))
}

async fn teardown_session(
    State(state): State<AppState>,
) -> Result<Json<SuccessResponse>, AppError> {
    state.sessions.teardown().await?;
    Ok(Json(SuccessResponse { success: true }))
}

// ============================================================
// Streaming
// ============================================================

async fn stream_session(State(state): State<AppState>) -> impl IntoResponse {
    // Subscribe before reading the snapshot so nothing falls in between
    let session_rx = state.sessions.subscribe();
    let location_rx = state.sessions.geolocator().subscribe();
    let init = state.sessions.snapshot().map(SessionResponse::from);
    sse_stream(init, session_rx, location_rx)
}

// ============================================================
// User Actions
// ============================================================

async fn choose(
    State(state): State<AppState>,
    Json(req): Json<ChoiceRequest>,
) -> Result<Json<QueuedResponse>, AppError> {
    state
        .sessions
        .send_event(Event::Choose { choice: req.choice })
        .await?;
    Ok(Json(QueuedResponse { queued: true }))
}

async fn select_location_method(
    State(state): State<AppState>,
    Json(method): Json<LocationMethod>,
) -> Result<Json<QueuedResponse>, AppError> {
    state
        .sessions
        .send_event(Event::SelectLocationMethod { method })
        .await?;
    Ok(Json(QueuedResponse { queued: true }))
}

async fn report_geolocation(
    State(state): State<AppState>,
    Json(report): Json<GeolocationReport>,
) -> Result<Json<SuccessResponse>, AppError> {
    let result = match report {
        GeolocationReport::Position {
            latitude,
            longitude,
        } => match Coordinates::new(latitude, longitude) {
            Some(coords) => Ok(coords),
            None => {
                // The waiting dialogue still gets an answer
                state
                    .sessions
                    .geolocator()
                    .report(Err(GeolocationError::PositionUnavailable));
                return Err(AppError::BadRequest(
                    "Coordinates out of range".to_string(),
                ));
            }
        },
        GeolocationReport::Failure { error } => Err(GeolocationError::from_code(error)),
    };

    if !state.sessions.geolocator().report(result) {
        return Err(AppError::Conflict(
            "No position request is pending".to_string(),
        ));
    }
    Ok(Json(SuccessResponse { success: true }))
}

async fn get_version() -> &'static str {
    concat!("fracture-assistant ", env!("CARGO_PKG_VERSION"))
}

// ============================================================
// Error Handling
// ============================================================

#[derive(Debug)]
enum AppError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    Unprocessable(String),
    Internal(String),
}

impl From<ContextError> for AppError {
    fn from(e: ContextError) -> Self {
        match e {
            ContextError::InvalidConfidence(_) => AppError::BadRequest(e.to_string()),
            ContextError::NoFracture => AppError::Unprocessable(e.to_string()),
        }
    }
}

impl From<SessionError> for AppError {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::NotMounted => AppError::NotFound(e.to_string()),
            SessionError::Closed | SessionError::Store(_) => AppError::Internal(e.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::Unprocessable(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}
