use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::constants::error_codes;

fn timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// `{success: true, data, timestamp}`
pub fn success_response<T: Serialize>(data: T) -> Value {
    json!({
        "success": true,
        "data": data,
        "timestamp": timestamp(),
    })
}

/// `{success: true, data, metadata: {..metadata, timestamp}}`
///
/// Non-object metadata is ignored; a caller-supplied `timestamp` is
/// overwritten.
pub fn success_response_with_metadata<T: Serialize>(data: T, metadata: Option<Value>) -> Value {
    let mut meta = match metadata {
        Some(Value::Object(map)) => map,
        _ => Map::new(),
    };
    meta.insert("timestamp".to_string(), Value::String(timestamp()));

    json!({
        "success": true,
        "data": data,
        "metadata": meta,
    })
}

/// `{success: false, error: {code, message}, timestamp}`, code defaulting to
/// `VALIDATION_ERROR`
pub fn error_response(message: &str, code: Option<&str>) -> Value {
    json!({
        "success": false,
        "error": {
            "code": code.unwrap_or(error_codes::VALIDATION_ERROR),
            "message": message,
        },
        "timestamp": timestamp(),
    })
}

/// Wrapper for API responses that automatically adds success envelope
#[derive(Debug)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub status_code: Option<StatusCode>,
}

impl<T: Serialize> ApiResponse<T> {
    /// Create a successful API response with default 200 status
    pub fn success(data: T) -> Self {
        Self {
            data,
            status_code: None,
        }
    }

    pub fn with_status(data: T, status_code: StatusCode) -> Self {
        Self {
            data,
            status_code: Some(status_code),
        }
    }

    pub fn created(data: T) -> Self {
        Self::with_status(data, StatusCode::CREATED)
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let status = self.status_code.unwrap_or(StatusCode::OK);

        match serde_json::to_value(&self.data) {
            Ok(data) => (status, Json(success_response(data))).into_response(),
            Err(e) => {
                tracing::error!("Failed to serialize response data: {}", e);
                crate::error::ApiError::internal(e.to_string()).into_response()
            }
        }
    }
}

pub type ApiResult<T> = Result<ApiResponse<T>, crate::error::ApiError>;
