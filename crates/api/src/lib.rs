//! Drowsiness Monitor control surface
//!
//! Wires camera, classifier, session and notifier together and exposes the
//! running session over a small REST API.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tower_http::trace::TraceLayer;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

pub mod config;
mod routes;

pub use self::config::{AppConfig, LoggingConfig, CONFIG_FILE};

use alerting::{
    EmergencyDispatcher, EmergencyGate, Geolocator, IpInfoLocator, LogNotifier, NoLocation,
    Notifier, WebhookNotifier,
};
use camera_capture::ImageDirSource;
use dms::{DetectionSession, NullAudio, SessionPaths, SessionRunner};
use inference_engine::{Classifier, NullClassifier, OnnxClassifier};

/// API error types
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Dms(#[from] dms::DmsError),

    #[error(transparent)]
    Storage(#[from] storage::StorageError),

    #[error(transparent)]
    Alert(#[from] alerting::AlertError),

    #[error(transparent)]
    Camera(#[from] camera_capture::CameraError),

    #[error("Configuration error: {0}")]
    Config(#[from] ::config::ConfigError),

    #[error("Metrics exporter error: {0}")]
    Metrics(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadRequest(_) | ApiError::Dms(dms::DmsError::Config(_)) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Dms(dms::DmsError::SessionStopped) => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            warn!("Request failed: {}", self);
        }
        (status, Json(ErrorBody { error: self.to_string() })).into_response()
    }
}

/// Application state shared across handlers
pub struct AppState {
    pub runner: SessionRunner,
    pub settings_path: PathBuf,
    pub log_dir: PathBuf,
    pub report_dir: PathBuf,
    /// `None` when no recorder is installed (tests)
    pub metrics: Option<PrometheusHandle>,
    /// Version string
    pub version: String,
    /// Start time
    pub start_time: Instant,
}

pub type SharedState = Arc<AppState>;

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub session_running: bool,
    pub paused: bool,
}

/// Create the application router
pub fn create_router(state: SharedState) -> Router {
    Router::new()
        .route("/api/v1/health", get(health_handler))
        .route("/api/v1/session", get(routes::session::get_session))
        .route("/api/v1/session/stop", post(routes::session::stop_session))
        .route("/api/v1/session/pause", post(routes::session::toggle_pause))
        .route("/api/v1/session/yawn/reset", post(routes::session::reset_yawns))
        .route("/api/v1/session/threshold", put(routes::session::set_threshold))
        .route("/api/v1/session/confidence", put(routes::session::set_confidence))
        .route("/api/v1/break", get(routes::session::get_break).post(routes::session::answer_break))
        .route("/api/v1/emergency/enabled", put(routes::emergency::set_enabled))
        .route("/api/v1/emergency/send", post(routes::emergency::send_now))
        .route("/api/v1/emergency/window", delete(routes::emergency::clear_window))
        .route(
            "/api/v1/settings",
            get(routes::settings::get_settings).put(routes::settings::put_settings),
        )
        .route("/api/v1/files", get(routes::settings::list_files))
        .route("/api/v1/files/:kind/:name", delete(routes::settings::delete_file_handler))
        .route("/api/v1/files/:kind/:name/analytics", get(routes::settings::log_analytics))
        .route("/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check handler
async fn health_handler(State(state): State<SharedState>) -> Json<HealthResponse> {
    let paused = state.runner.session().lock().await.is_paused();
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: state.version.clone(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        session_running: state.runner.is_running(),
        paused,
    })
}

/// Prometheus scrape endpoint
async fn metrics_handler(State(state): State<SharedState>) -> Response {
    match &state.metrics {
        Some(handle) => {
            let snapshot = state.runner.session().lock().await.snapshot(Instant::now());
            metrics::gauge!("dms_session_running").set(if state.runner.is_running() { 1.0 } else { 0.0 });
            metrics::gauge!("dms_alertness_percent").set(snapshot.alertness_pct);
            metrics::gauge!("dms_drowsy_timer_seconds").set(snapshot.drowsy_timer_s);
            handle.render().into_response()
        }
        None => (StatusCode::SERVICE_UNAVAILABLE, "metrics recorder not installed").into_response(),
    }
}

/// Initialize logging
pub fn init_logging(config: &LoggingConfig) {
    let level = config.level.parse::<Level>().unwrap_or(Level::INFO);
    let builder = FmtSubscriber::builder().with_max_level(level).with_target(true);

    let result = if config.json {
        tracing::subscriber::set_global_default(builder.json().finish())
    } else {
        tracing::subscriber::set_global_default(builder.finish())
    };
    if let Err(e) = result {
        eprintln!("Logging already initialized: {}", e);
    }
}

/// Install the global Prometheus recorder
pub fn init_metrics() -> Result<PrometheusHandle, ApiError> {
    PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| ApiError::Metrics(e.to_string()))
}

fn build_classifier(config: &AppConfig) -> Box<dyn Classifier> {
    match OnnxClassifier::new(&config.model) {
        Ok(classifier) => Box::new(classifier),
        Err(e) => {
            warn!("Detection model not loaded ({}); continuing without it", e);
            Box::new(NullClassifier)
        }
    }
}

fn build_dispatcher(config: &AppConfig) -> Result<EmergencyDispatcher, ApiError> {
    let notifier_cfg = &config.notifier;

    let notifier: Arc<dyn Notifier> = match &notifier_cfg.webhook_url {
        Some(url) => Arc::new(WebhookNotifier::new(
            url.clone(),
            Duration::from_secs(notifier_cfg.webhook_timeout_s),
        )?),
        None => {
            info!("No webhook configured; emergency messages will only be logged");
            Arc::new(LogNotifier::new())
        }
    };

    let locator: Arc<dyn Geolocator> = if notifier_cfg.geolocation {
        Arc::new(IpInfoLocator::new(
            notifier_cfg.geolocation_url.clone(),
            Duration::from_secs(notifier_cfg.geolocation_timeout_s),
        )?)
    } else {
        Arc::new(NoLocation)
    };

    Ok(EmergencyDispatcher::new(
        notifier,
        locator,
        config.storage.settings_path.clone(),
        config.dms.gate.active_window_min,
    ))
}

/// Start a session and build the shared state around it
pub fn start(config: &AppConfig, metrics: Option<PrometheusHandle>) -> Result<SharedState, ApiError> {
    let source = ImageDirSource::open(&config.camera)?;
    let dispatcher = build_dispatcher(config)?;
    let gate = Arc::new(EmergencyGate::new(&config.dms.gate));
    let paths = SessionPaths {
        log_dir: config.storage.log_dir.clone(),
        report_dir: config.storage.report_dir.clone(),
    };

    let session = DetectionSession::start(
        &config.dms,
        build_classifier(config),
        gate,
        &paths,
        Instant::now(),
    );
    let runner = SessionRunner::spawn(
        session,
        Box::new(source),
        config.camera.frame_interval(),
        Arc::new(NullAudio),
        dispatcher,
    );

    Ok(Arc::new(AppState {
        runner,
        settings_path: config.storage.settings_path.clone(),
        log_dir: config.storage.log_dir.clone(),
        report_dir: config.storage.report_dir.clone(),
        metrics,
        version: env!("CARGO_PKG_VERSION").to_string(),
        start_time: Instant::now(),
    }))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Could not listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

/// Run the monitor until Ctrl-C, then stop the session and write the report
pub async fn run(config: AppConfig, metrics: Option<PrometheusHandle>) -> Result<(), ApiError> {
    let state = start(&config, metrics)?;
    let app = create_router(Arc::clone(&state));

    info!("Starting API server on {}", config.server.bind);
    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    match state.runner.stop().await {
        Ok(summary) => {
            let report = summary
                .report_path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default();
            info!(
                "Trip finished: report '{}', max streak {:.0}s, alertness {:.0}%, suggested break {} min",
                report,
                summary.metrics.max_drowsy_streak_s,
                summary.metrics.avg_alertness_pct,
                summary.metrics.recommended_break_min
            );
        }
        Err(dms::DmsError::SessionStopped) => info!("Session was already stopped"),
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use alerting::GateConfig;
    use camera_capture::{StaticSource, VideoFrame};
    use dms::DmsConfig;
    use inference_engine::{ScriptHandle, ScriptedClassifier};

    pub struct TestApp {
        pub router: Router,
        pub state: SharedState,
        pub script: ScriptHandle,
        pub notifier: Arc<LogNotifier>,
        pub _dir: tempfile::TempDir,
    }

    pub fn test_app() -> TestApp {
        let dir = tempfile::tempdir().unwrap();
        let config = DmsConfig::default();
        let gate = Arc::new(EmergencyGate::new(&GateConfig::default()));
        let (classifier, script) = ScriptedClassifier::new();
        let paths = SessionPaths {
            log_dir: dir.path().join("logs"),
            report_dir: dir.path().join("reports"),
        };
        let session = DetectionSession::start(&config, Box::new(classifier), gate, &paths, Instant::now());

        let settings_path = dir.path().join("user_settings.json");
        let notifier = Arc::new(LogNotifier::new());
        let dispatcher = EmergencyDispatcher::new(notifier.clone(), Arc::new(NoLocation), settings_path.clone(), 15);
        let runner = SessionRunner::spawn(
            session,
            Box::new(StaticSource::new(VideoFrame::filled(4, 4, [100, 100, 100]))),
            Duration::from_millis(30),
            Arc::new(NullAudio),
            dispatcher,
        );

        let state = Arc::new(AppState {
            runner,
            settings_path,
            log_dir: paths.log_dir,
            report_dir: paths.report_dir,
            metrics: None,
            version: "test".to_string(),
            start_time: Instant::now(),
        });
        TestApp {
            router: create_router(Arc::clone(&state)),
            state,
            script,
            notifier,
            _dir: dir,
        }
    }

    pub async fn call(
        router: &Router,
        method: &str,
        uri: &str,
        body: Option<serde_json::Value>,
    ) -> (StatusCode, serde_json::Value) {
        use axum::body::Body;
        use axum::http::Request;
        use tower::ServiceExt;

        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(match body {
                Some(json) => Body::from(json.to_string()),
                None => Body::empty(),
            })
            .unwrap();

        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, json)
    }
}
