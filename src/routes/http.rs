// GET handlers: version, raw record, JSON activity report.
// Every request re-reads the record file, like any other consumer.

use axum::{
    extract::State,
    http::{StatusCode, header},
    response::IntoResponse,
};

use super::AppState;
use crate::models::ActivityReport;
use crate::poller::{classify, read_record};

/// GET /version — returns service name and version (from Cargo.toml at build time).
pub(super) async fn version_handler() -> impl IntoResponse {
    axum::Json(serde_json::json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// GET /activity — the record as published, `text/plain`. 503 until a valid record exists.
pub(super) async fn activity_raw_handler(State(state): State<AppState>) -> impl IntoResponse {
    match read_record(&state.record_path) {
        Ok(value) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            format!("{}\n", value),
        ),
        Err(e) => {
            tracing::debug!(error = %e, "record unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
                String::new(),
            )
        }
    }
}

/// GET /api/activity — `{value, threshold, active}`; unreadable records report no activity.
pub(super) async fn activity_json_handler(State(state): State<AppState>) -> impl IntoResponse {
    let value = read_record(&state.record_path).ok();
    axum::Json(ActivityReport {
        value,
        threshold: state.threshold,
        active: value.is_some_and(|v| classify(v, state.threshold).is_active()),
    })
}
