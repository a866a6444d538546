//! Status and progress endpoints.
//!
//! `/status` mirrors the original status page (uptime, processed count);
//! `/progress` mirrors the progress page (recent log lines, recently
//! processed files), served as JSON.

use crate::api::AppState;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;
use std::time::Duration;

const RECENT_LOG_LINES: usize = 500;
const RECENT_PROCESSED_LINES: usize = 50;

/// GET /health - Health check endpoint
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": state.recorder.uptime().as_secs(),
    }))
}

/// GET /version - Version information endpoint
pub async fn version() -> impl IntoResponse {
    Json(json!({
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// GET /status - Uptime and processed count
pub async fn status(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "running",
        "uptime": format_uptime(state.recorder.uptime()),
        "files_processed": state.recorder.processed_count(),
    }))
}

/// GET /progress - Recent log messages and recently processed files
pub async fn progress(State(state): State<AppState>) -> impl IntoResponse {
    let log = state
        .recorder
        .recent_log(RECENT_LOG_LINES)
        .unwrap_or_default();
    let processed = state
        .recorder
        .recent_processed(RECENT_PROCESSED_LINES)
        .unwrap_or_default();

    Json(json!({
        "recent_log": log,
        "recently_processed": processed,
    }))
}

fn format_uptime(uptime: Duration) -> String {
    let total = uptime.as_secs();
    let days = total / 86_400;
    let hours = (total % 86_400) / 3_600;
    let minutes = (total % 3_600) / 60;
    let seconds = total % 60;
    format!("{days}d {hours}h {minutes}m {seconds}s")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::StateRecorder;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use std::sync::Arc;
    use tempfile::TempDir;
    use tower::util::ServiceExt;

    #[test]
    fn uptime_formats_like_the_status_page() {
        assert_eq!(format_uptime(Duration::from_secs(0)), "0d 0h 0m 0s");
        assert_eq!(
            format_uptime(Duration::from_secs(86_400 + 3_600 + 61)),
            "1d 1h 1m 1s"
        );
        assert_eq!(format_uptime(Duration::from_secs(90_061)), "1d 1h 1m 1s");
    }

    #[tokio::test]
    async fn status_reports_processed_count() {
        let dir = TempDir::new().unwrap();
        let recorder = Arc::new(StateRecorder::start(dir.path()).unwrap());
        recorder.record("a.torrent").await.unwrap();
        recorder.record("b.torrent").await.unwrap();

        let app = crate::api::create_router(recorder);
        let response = app
            .oneshot(Request::builder().uri("/status").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["files_processed"], 2);
        assert_eq!(body["status"], "running");
    }

    #[tokio::test]
    async fn progress_tails_the_ledger() {
        let dir = TempDir::new().unwrap();
        let recorder = Arc::new(StateRecorder::start(dir.path()).unwrap());
        recorder.record("done.torrent").await.unwrap();

        let app = crate::api::create_router(recorder);
        let response = app
            .oneshot(Request::builder().uri("/progress").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        let processed = body["recently_processed"].as_array().unwrap();
        assert_eq!(processed.len(), 1);
        assert!(processed[0].as_str().unwrap().ends_with("done.torrent"));
    }
}
