//! Emergency contact controls

use alerting::DispatchReport;
use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::info;

use crate::{ApiError, SharedState};

#[derive(Debug, Deserialize)]
pub struct EnabledRequest {
    pub enabled: bool,
}

#[derive(Debug, Serialize)]
pub struct EmergencyStatus {
    pub enabled: bool,
    pub window_active: bool,
    pub window_remaining_s: f64,
}

fn status(state: &SharedState) -> EmergencyStatus {
    let gate = state.runner.gate();
    let now = Instant::now();
    EmergencyStatus {
        enabled: gate.is_enabled(),
        window_active: gate.is_window_active(now),
        window_remaining_s: gate
            .active_until()
            .map_or(0.0, |until| until.saturating_duration_since(now).as_secs_f64()),
    }
}

/// PUT /api/v1/emergency/enabled
pub async fn set_enabled(
    State(state): State<SharedState>,
    Json(req): Json<EnabledRequest>,
) -> Json<EmergencyStatus> {
    state.runner.gate().set_enabled(req.enabled);
    Json(status(&state))
}

/// POST /api/v1/emergency/send
///
/// Waits for the attempt; the outcome is in the body, not the status code.
pub async fn send_now(State(state): State<SharedState>) -> Result<Json<DispatchReport>, ApiError> {
    info!("Manual emergency requested");
    let report = state.runner.send_manual_emergency().await?;
    Ok(Json(report))
}

/// DELETE /api/v1/emergency/window
pub async fn clear_window(State(state): State<SharedState>) -> Json<EmergencyStatus> {
    state.runner.gate().clear_active_window();
    Json(status(&state))
}

#[cfg(test)]
mod tests {
    use crate::test_support::*;
    use axum::http::StatusCode;
    use serde_json::json;
    use storage::UserSettings;

    #[tokio::test]
    async fn test_disable_emergency() {
        let app = test_app();
        let (status, body) = call(
            &app.router,
            "PUT",
            "/api/v1/emergency/enabled",
            Some(json!({ "enabled": false })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["enabled"], false);
        assert!(!app.state.runner.gate().is_enabled());
    }

    #[tokio::test]
    async fn test_manual_send_without_contact() {
        let app = test_app();
        let (status, body) = call(&app.router, "POST", "/api/v1/emergency/send", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["kind"], "manual");
        assert_eq!(body["ok"], false);
        assert!(app.notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn test_manual_send_then_clear_window() {
        let app = test_app();
        UserSettings {
            user_name: "Lee".into(),
            emergency_whatsapp: "+15550100".into(),
        }
        .save(&app.state.settings_path)
        .unwrap();

        let (_, body) = call(&app.router, "POST", "/api/v1/emergency/send", None).await;
        assert_eq!(body["ok"], true);
        assert_eq!(app.notifier.sent().len(), 1);
        assert!(app.notifier.sent()[0].1.contains("Lee"));

        let (_, body) = call(&app.router, "DELETE", "/api/v1/emergency/window", None).await;
        assert_eq!(body["window_active"], false);
        assert!(app.state.runner.gate().active_until().is_none());
    }
}
