use axum::Router;

use crate::app::AppState;
use crate::database::RoutineBackend;

pub mod external;
pub mod internal;

pub fn router<B: RoutineBackend>() -> Router<AppState<B>> {
    Router::new()
        .nest("/internal", internal::router())
        .nest("/external", external::router())
}
