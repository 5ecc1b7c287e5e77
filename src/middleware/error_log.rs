use axum::{extract::Request, middleware::Next, response::Response};

use crate::error::ErrorContext;

/// Log every error response with the request it answered
pub async fn error_log_middleware(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let response = next.run(request).await;

    if let Some(context) = response.extensions().get::<ErrorContext>() {
        let status = response.status().as_u16();
        let details = context.details.as_deref().unwrap_or("");
        if response.status().is_server_error() {
            tracing::error!(%method, %path, status, code = context.code, message = %context.message, details, "Request failed");
        } else {
            tracing::warn!(%method, %path, status, code = context.code, message = %context.message, details, "Request rejected");
        }
    }

    response
}
