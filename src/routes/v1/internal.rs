use axum::Router;

use crate::app::AppState;
use crate::database::RoutineBackend;

/// Routes for signed-in users; credentials come from `CrudController`
pub fn router<B: RoutineBackend>() -> Router<AppState<B>> {
    Router::new()
}
