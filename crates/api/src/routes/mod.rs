pub mod health;
pub mod measure;

use axum::Router;

use crate::state::AppState;

/// Build the measurement route tree.
///
/// Route hierarchy:
///
/// ```text
/// /measure                 submit a measurement (POST)
/// /status/{job_id}         poll job status (GET)
/// ```
///
/// Liveness and health routes live in [`health`] and are merged separately.
pub fn api_routes() -> Router<AppState> {
    Router::new().merge(measure::router())
}
