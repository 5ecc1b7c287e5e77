use axum::Json;
use serde_json::{json, Value};

use crate::middleware::success_response;

/// GET / - service name, version and mount points
pub async fn root() -> Json<Value> {
    Json(success_response(json!({
        "name": "autoclean-api",
        "version": env!("CARGO_PKG_VERSION"),
        "environment": crate::config::config().environment,
        "endpoints": {
            "health": "/health (public)",
            "internal": "/v1/internal/* (authenticated)",
            "external": "/v1/external/* (public)",
        },
    })))
}
