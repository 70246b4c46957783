use axum::routing::{get, post};
use axum::Router;

use crate::handlers::measure;
use crate::state::AppState;

/// Measurement routes, mounted at the root.
///
/// ```text
/// POST /measure            -> submit_measurement
/// GET  /status/{job_id}    -> get_status
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/measure", post(measure::submit_measurement))
        .route("/status/{job_id}", get(measure::get_status))
}
