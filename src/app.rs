use axum::{
    extract::{DefaultBodyLimit, OriginalUri},
    http::{header, HeaderValue, Method},
    middleware,
    routing::get,
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::config::{AppConfig, Environment};
use crate::database::{DataAccess, PgBackend, RoutineBackend};
use crate::error::ApiError;
use crate::handlers;
use crate::middleware::error_log_middleware;
use crate::routes;

/// Shared handler state
pub struct AppState<B: RoutineBackend = PgBackend> {
    pub db: Arc<DataAccess<B>>,
}

impl<B: RoutineBackend> AppState<B> {
    pub fn new(db: DataAccess<B>) -> Self {
        Self { db: Arc::new(db) }
    }
}

impl AppState<PgBackend> {
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(DataAccess::from_config(config))
    }
}

impl<B: RoutineBackend> Clone for AppState<B> {
    fn clone(&self) -> Self {
        Self { db: self.db.clone() }
    }
}

pub fn app<B: RoutineBackend>(state: AppState<B>, config: &AppConfig) -> Router {
    let mut router = Router::new()
        // Public
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health::<B>))
        .merge(routes::api_routes())
        .fallback(not_found)
        // Global middleware
        .layer(DefaultBodyLimit::max(config.api.max_request_size_bytes))
        .layer(middleware::from_fn(error_log_middleware))
        .layer(cors_layer(config));

    if config.api.enable_request_logging {
        router = router.layer(TraceLayer::new_for_http());
    }

    router.with_state(state)
}

async fn not_found(method: Method, OriginalUri(uri): OriginalUri) -> ApiError {
    ApiError::route_not_found(method.as_str(), uri.path())
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    if !config.api.enable_cors {
        return CorsLayer::new();
    }
    if config.environment == Environment::Development {
        return CorsLayer::permissive();
    }

    let methods = [
        Method::GET,
        Method::POST,
        Method::PUT,
        Method::PATCH,
        Method::DELETE,
        Method::OPTIONS,
    ];
    let headers = [header::CONTENT_TYPE, header::AUTHORIZATION];

    // A wildcard cannot be listed alongside credentials
    if config.api.cors_origins.iter().any(|origin| origin.trim() == "*") {
        tracing::warn!("CORS origins include '*'; allowing any origin without credentials");
        return CorsLayer::new()
            .allow_origin(AllowOrigin::any())
            .allow_methods(methods)
            .allow_headers(headers);
    }

    let origins = config
        .api
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect::<Vec<_>>();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(methods)
        .allow_headers(headers)
        .allow_credentials(true)
}
