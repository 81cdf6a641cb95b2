//! Live session control and break reminders

use axum::{extract::State, Json};
use dms::{BreakAction, BreakStatus, LiveSnapshot, SessionSummary};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::info;

use crate::{ApiError, SharedState};

#[derive(Debug, Serialize)]
pub struct SessionView {
    #[serde(flatten)]
    pub snapshot: LiveSnapshot,
    pub running: bool,
    pub break_status: Option<BreakStatus>,
}

#[derive(Debug, Serialize)]
pub struct PauseResponse {
    pub paused: bool,
}

#[derive(Debug, Deserialize)]
pub struct ThresholdRequest {
    pub seconds: f64,
}

#[derive(Debug, Deserialize)]
pub struct ConfidenceRequest {
    pub confidence: f32,
}

#[derive(Debug, Deserialize)]
pub struct BreakRequest {
    pub action: BreakAction,
}

#[derive(Debug, Serialize)]
pub struct BreakResponse {
    pub action: String,
    /// Present when the driver chose to stop
    pub summary: Option<SessionSummary>,
}

async fn view(state: &SharedState) -> SessionView {
    let snapshot = state.runner.session().lock().await.snapshot(Instant::now());
    SessionView {
        snapshot,
        running: state.runner.is_running(),
        break_status: state.runner.break_status(),
    }
}

/// GET /api/v1/session
pub async fn get_session(State(state): State<SharedState>) -> Json<SessionView> {
    Json(view(&state).await)
}

/// POST /api/v1/session/stop
pub async fn stop_session(State(state): State<SharedState>) -> Result<Json<SessionSummary>, ApiError> {
    let summary = state.runner.stop().await?;
    info!("Session stopped through the API");
    Ok(Json(summary))
}

/// POST /api/v1/session/pause
pub async fn toggle_pause(State(state): State<SharedState>) -> Json<PauseResponse> {
    let paused = state.runner.session().lock().await.toggle_pause();
    Json(PauseResponse { paused })
}

/// POST /api/v1/session/yawn/reset
pub async fn reset_yawns(State(state): State<SharedState>) -> Json<SessionView> {
    state.runner.session().lock().await.reset_yawns();
    Json(view(&state).await)
}

/// PUT /api/v1/session/threshold
pub async fn set_threshold(
    State(state): State<SharedState>,
    Json(req): Json<ThresholdRequest>,
) -> Result<Json<SessionView>, ApiError> {
    if !req.seconds.is_finite() {
        return Err(ApiError::BadRequest("seconds must be a number".to_string()));
    }
    state.runner.session().lock().await.set_alert_threshold(req.seconds);
    Ok(Json(view(&state).await))
}

/// PUT /api/v1/session/confidence
pub async fn set_confidence(
    State(state): State<SharedState>,
    Json(req): Json<ConfidenceRequest>,
) -> Result<Json<SessionView>, ApiError> {
    state.runner.session().lock().await.set_confidence(req.confidence)?;
    Ok(Json(view(&state).await))
}

/// GET /api/v1/break
pub async fn get_break(State(state): State<SharedState>) -> Json<Option<BreakStatus>> {
    Json(state.runner.break_status())
}

/// POST /api/v1/break
pub async fn answer_break(
    State(state): State<SharedState>,
    Json(req): Json<BreakRequest>,
) -> Result<Json<BreakResponse>, ApiError> {
    let summary = state.runner.handle_break(req.action).await?;
    Ok(Json(BreakResponse {
        action: format!("{:?}", req.action),
        summary,
    }))
}
