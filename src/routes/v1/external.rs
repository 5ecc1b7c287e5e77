use axum::Router;

use crate::app::AppState;
use crate::database::RoutineBackend;

/// Public routes
pub fn router<B: RoutineBackend>() -> Router<AppState<B>> {
    Router::new()
}
