use axum::Router;

use crate::app::AppState;
use crate::database::RoutineBackend;

pub mod v1;

/// Versioned API surface
pub fn api_routes<B: RoutineBackend>() -> Router<AppState<B>> {
    Router::new().nest("/v1", v1::router())
}
