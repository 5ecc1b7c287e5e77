// HTTP API Error Types
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};

use crate::constants::{error_codes, messages};
use crate::database::DatabaseError;
use crate::validation::{FieldIssue, ValidationFailure};

/// HTTP API error with appropriate status codes and client-friendly messages
#[derive(Debug)]
pub enum ApiError {
    // 400 Bad Request
    Validation {
        message: String,
        details: Vec<FieldIssue>,
    },
    BadRequest(String),
    InvalidJson(String),

    // 401 Unauthorized
    Unauthorized(String),

    // 403 Forbidden
    Forbidden(String),

    // 404 Not Found
    NotFound(String),
    RouteNotFound { method: String, path: String },

    // 409 Conflict
    Conflict(String),

    // 500, or 503 when the database is unreachable
    Database(DatabaseError),

    // 500 Internal Server Error; the string is detail, never the client message
    Internal(String),
}

/// What went wrong, attached to error responses for the logging layer
#[derive(Debug, Clone)]
pub struct ErrorContext {
    pub code: &'static str,
    pub message: String,
    pub details: Option<String>,
}

impl ApiError {
    /// Get HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation { .. } | ApiError::BadRequest(_) | ApiError::InvalidJson(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) | ApiError::RouteNotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Database(e) if e.is_connection() => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Database(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get error code for client handling
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::Validation { .. } => error_codes::VALIDATION_ERROR,
            ApiError::BadRequest(_) => error_codes::BAD_REQUEST,
            ApiError::InvalidJson(_) => error_codes::INVALID_JSON,
            ApiError::Unauthorized(_) => error_codes::UNAUTHORIZED,
            ApiError::Forbidden(_) => error_codes::FORBIDDEN,
            ApiError::NotFound(_) | ApiError::RouteNotFound { .. } => error_codes::NOT_FOUND,
            ApiError::Conflict(_) => error_codes::CONFLICT,
            ApiError::Database(e) if e.is_connection() => error_codes::SERVICE_UNAVAILABLE,
            ApiError::Database(_) => error_codes::DATABASE_ERROR,
            ApiError::Internal(_) => error_codes::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get client-safe error message
    pub fn message(&self) -> &str {
        match self {
            ApiError::Validation { message, .. } => message,
            ApiError::BadRequest(msg)
            | ApiError::InvalidJson(msg)
            | ApiError::Unauthorized(msg)
            | ApiError::Forbidden(msg)
            | ApiError::NotFound(msg)
            | ApiError::Conflict(msg) => msg,
            ApiError::RouteNotFound { .. } => messages::ROUTE_NOT_FOUND,
            ApiError::Database(e) if e.is_connection() => messages::DATABASE_UNAVAILABLE,
            ApiError::Database(_) => messages::DATABASE_ERROR,
            ApiError::Internal(_) => messages::INTERNAL_SERVER_ERROR,
        }
    }

    /// Server-side detail for errors whose client message is generic
    fn hidden_details(&self) -> Option<String> {
        match self {
            ApiError::Database(e) => Some(e.to_string()),
            ApiError::Internal(detail) => Some(detail.clone()),
            _ => None,
        }
    }

    /// Convert to JSON response body
    pub fn to_json(&self, expose_details: bool) -> Value {
        let mut error = json!({
            "code": self.error_code(),
            "message": self.message(),
        });

        match self {
            ApiError::Validation { details, .. } => {
                error["details"] = json!(details);
            }
            ApiError::RouteNotFound { method, path } => {
                error["path"] = json!(path);
                error["method"] = json!(method);
            }
            _ => {
                if let Some(details) = self.hidden_details().filter(|_| expose_details) {
                    error["details"] = json!(details);
                }
            }
        }

        json!({
            "success": false,
            "error": error,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        })
    }

    pub fn context(&self) -> ErrorContext {
        let details = match self {
            ApiError::Validation { details, .. } => Some(
                details
                    .iter()
                    .map(|issue| format!("{}: {}", issue.field(), issue.message))
                    .collect::<Vec<_>>()
                    .join("; "),
            ),
            _ => self.hidden_details(),
        };

        ErrorContext {
            code: self.error_code(),
            message: self.message().to_string(),
            details,
        }
    }
}

// Static constructor methods
impl ApiError {
    pub fn validation(details: Vec<FieldIssue>) -> Self {
        ApiError::Validation {
            message: messages::VALIDATION_FAILED.to_string(),
            details,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn invalid_json(message: impl Into<String>) -> Self {
        ApiError::InvalidJson(message.into())
    }

    pub fn unauthorized() -> Self {
        ApiError::Unauthorized(messages::UNAUTHORIZED.to_string())
    }

    pub fn forbidden() -> Self {
        ApiError::Forbidden(messages::FORBIDDEN.to_string())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn route_not_found(method: impl Into<String>, path: impl Into<String>) -> Self {
        ApiError::RouteNotFound {
            method: method.into(),
            path: path.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        ApiError::Conflict(message.into())
    }

    pub fn internal(detail: impl Into<String>) -> Self {
        ApiError::Internal(detail.into())
    }
}

impl From<ValidationFailure> for ApiError {
    fn from(failure: ValidationFailure) -> Self {
        ApiError::validation(failure.issues)
    }
}

impl From<DatabaseError> for ApiError {
    fn from(err: DatabaseError) -> Self {
        ApiError::Database(err)
    }
}

// Standard error trait implementations
impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ApiError {}

// Automatic HTTP response conversion for Axum
impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let expose = crate::config::config().environment.exposes_error_details();
        let mut response = (self.status_code(), Json(self.to_json(expose))).into_response();
        response.extensions_mut().insert(self.context());
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::{IssueCode, PathSegment};

    fn issue(field: &str) -> FieldIssue {
        FieldIssue::new(
            IssueCode::TooSmall,
            &[PathSegment::Key(field.to_string())],
            "Number must be greater than 0",
        )
    }

    #[test]
    fn validation_error_carries_details() {
        let err = ApiError::validation(vec![issue("id")]);
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);

        let body = err.to_json(false);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
        assert_eq!(body["error"]["message"], "validationFailed");
        assert_eq!(body["error"]["details"][0]["path"], json!(["id"]));
        assert!(body["timestamp"].is_string());
    }

    #[test]
    fn route_not_found_names_path_and_method() {
        let body = ApiError::route_not_found("GET", "/nope").to_json(true);
        assert_eq!(body["error"]["code"], "NOT_FOUND");
        assert_eq!(body["error"]["message"], "routeNotFound");
        assert_eq!(body["error"]["path"], "/nope");
        assert_eq!(body["error"]["method"], "GET");
    }

    #[test]
    fn database_details_hidden_unless_exposed() {
        let err = ApiError::from(DatabaseError::QueryError {
            routine: "spFileList".to_string(),
            message: "boom".to_string(),
        });
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.error_code(), "DATABASE_ERROR");
        assert!(err.to_json(false)["error"].get("details").is_none());
        assert_eq!(
            err.to_json(true)["error"]["details"],
            "Routine 'spFileList' failed: boom"
        );
    }

    #[test]
    fn unreachable_database_is_unavailable() {
        let err = ApiError::from(DatabaseError::ConnectionError("refused".to_string()));
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err.message(), "databaseUnavailable");
    }

    #[test]
    fn response_carries_error_context() {
        let response = ApiError::bad_request("badInput").into_response();
        let context = response.extensions().get::<ErrorContext>().unwrap();
        assert_eq!(context.code, "BAD_REQUEST");
        assert_eq!(context.message, "badInput");
    }
}
