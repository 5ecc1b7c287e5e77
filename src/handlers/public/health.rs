use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use crate::app::AppState;
use crate::constants::{error_codes, messages};
use crate::database::RoutineBackend;
use crate::middleware::{error_response, success_response};

/// GET /health - pings the database through the shared pool
pub async fn health<B: RoutineBackend>(State(state): State<AppState<B>>) -> impl IntoResponse {
    match state.db.health_check().await {
        Ok(()) => (
            StatusCode::OK,
            Json(success_response(json!({ "status": "ok", "database": "ok" }))),
        ),
        Err(e) => {
            tracing::warn!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(error_response(
                    messages::DATABASE_UNAVAILABLE,
                    Some(error_codes::SERVICE_UNAVAILABLE),
                )),
            )
        }
    }
}
