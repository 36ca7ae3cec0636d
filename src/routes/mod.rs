// Read-only HTTP access path to the published record

mod http;

use axum::{Router, routing::get};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) record_path: Arc<PathBuf>,
    pub(crate) threshold: u64,
}

pub fn app(record_path: PathBuf, threshold: u64) -> Router {
    let state = AppState {
        record_path: Arc::new(record_path),
        threshold,
    };
    Router::new()
        .route("/version", get(http::version_handler)) // GET /version
        .route("/activity", get(http::activity_raw_handler)) // GET /activity
        .route("/api/activity", get(http::activity_json_handler)) // GET /api/activity
        .layer(CorsLayer::new().allow_origin(Any))
        .with_state(state)
}
