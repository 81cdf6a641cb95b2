//! User settings and past trip files

use alerting::normalize_number;
use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::path::Path as FsPath;
use storage::{
    analyze_log, delete_file, list_log_files, list_report_files, StateBuckets, UserSettings,
    DEFAULT_BUCKET_SECONDS,
};
use tracing::info;

use crate::{ApiError, SharedState};

#[derive(Debug, Serialize)]
pub struct FileListing {
    pub logs: Vec<String>,
    pub reports: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub deleted: String,
}

#[derive(Debug, Deserialize)]
pub struct AnalyticsQuery {
    pub bucket_seconds: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct AnalyticsResponse {
    pub file: String,
    #[serde(flatten)]
    pub buckets: StateBuckets,
}

fn check_file_name(name: &str) -> Result<(), ApiError> {
    // Bare file names only
    let is_plain = FsPath::new(name)
        .file_name()
        .map_or(false, |f| f.to_str() == Some(name));
    if is_plain {
        Ok(())
    } else {
        Err(ApiError::BadRequest(format!("invalid file name '{}'", name)))
    }
}

/// GET /api/v1/settings
pub async fn get_settings(State(state): State<SharedState>) -> Json<UserSettings> {
    Json(UserSettings::load(&state.settings_path))
}

/// PUT /api/v1/settings
pub async fn put_settings(
    State(state): State<SharedState>,
    Json(settings): Json<UserSettings>,
) -> Result<Json<UserSettings>, ApiError> {
    if let Some(number) = settings.emergency_number() {
        if normalize_number(number).is_none() {
            return Err(ApiError::BadRequest(format!(
                "'{}' is not a phone number",
                number
            )));
        }
    }
    settings.save(&state.settings_path)?;
    info!("User settings updated");
    Ok(Json(settings))
}

/// GET /api/v1/files
pub async fn list_files(State(state): State<SharedState>) -> Json<FileListing> {
    Json(FileListing {
        logs: list_log_files(&state.log_dir),
        reports: list_report_files(&state.report_dir),
    })
}

/// DELETE /api/v1/files/:kind/:name
pub async fn delete_file_handler(
    State(state): State<SharedState>,
    Path((kind, name)): Path<(String, String)>,
) -> Result<Json<DeleteResponse>, ApiError> {
    let dir = match kind.as_str() {
        "logs" => &state.log_dir,
        "reports" => &state.report_dir,
        other => return Err(ApiError::NotFound(format!("no file kind '{}'", other))),
    };

    check_file_name(&name)?;

    if delete_file(&dir.join(&name)) {
        info!("Deleted {}/{}", kind, name);
        Ok(Json(DeleteResponse { deleted: name }))
    } else {
        Err(ApiError::NotFound(name))
    }
}

/// GET /api/v1/files/logs/:name/analytics
pub async fn log_analytics(
    State(state): State<SharedState>,
    Path((kind, name)): Path<(String, String)>,
    Query(query): Query<AnalyticsQuery>,
) -> Result<Json<AnalyticsResponse>, ApiError> {
    if kind != "logs" {
        return Err(ApiError::NotFound(format!("no analytics for '{}'", kind)));
    }
    check_file_name(&name)?;

    let path = state.log_dir.join(&name);
    if !path.is_file() {
        return Err(ApiError::NotFound(name));
    }
    let buckets = analyze_log(&path, query.bucket_seconds.unwrap_or(DEFAULT_BUCKET_SECONDS))?;
    Ok(Json(AnalyticsResponse { file: name, buckets }))
}
